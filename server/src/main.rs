use clap::Parser;
use log::{error, info};
use server::network::{MatchServer, ServerConfig};
use std::sync::Arc;
use std::time::Duration;

/// Main-method of the application.
/// Parses command-line arguments, binds the server and runs it until
/// interrupted.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    // Command line arguments
    #[derive(Parser, Debug)]
    #[clap(author, version, about)]
    struct Args {
        /// Server IP address to bind to
        #[clap(short = 'H', long, default_value = "127.0.0.1")]
        host: String,
        /// Server port to listen on
        #[clap(short, long, default_value = "8080")]
        port: u16,
        /// Client version string accepted at handshake
        #[clap(long, default_value = shared::DEFAULT_PROTOCOL_VERSION)]
        client_version: String,
        /// Idle session timeout in seconds
        #[clap(short = 't', long, default_value = "12")]
        session_timeout: u64,
        /// Game server ports available for rooms (one mirror per port)
        #[clap(long, value_delimiter = ',', default_value = "9101,9102,9103,9104")]
        room_ports: Vec<u16>,
    }

    let args = Args::parse();

    let config = ServerConfig {
        host: args.host,
        port: args.port,
        version: args.client_version,
        session_timeout: Duration::from_secs(args.session_timeout),
        room_ports: args.room_ports,
        ..ServerConfig::default()
    };

    let server = Arc::new(MatchServer::bind(config).await?);

    let server_handle = {
        let server = Arc::clone(&server);
        tokio::spawn(async move {
            if let Err(e) = server.run().await {
                error!("server error: {}", e);
            }
        })
    };

    // Handle shutdown gracefully
    tokio::select! {
        result = server_handle => {
            if let Err(e) = result {
                error!("server task panicked: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("received ctrl-c, shutting down gracefully");
            server.stop().await;
        }
    }

    Ok(())
}
