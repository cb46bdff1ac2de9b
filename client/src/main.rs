use clap::Parser;
use client::MatchClient;
use serde_json::json;
use std::time::Duration;

/// Scripted smoke client: connect, sign in, look around the lobby, log
/// out. Useful for poking a running server by hand.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    #[derive(Parser, Debug)]
    #[clap(author, version, about)]
    struct Args {
        /// Server address to connect to
        #[clap(short, long, default_value = "127.0.0.1:8080")]
        server: String,
        /// Client version string sent in the handshake
        #[clap(long, default_value = shared::DEFAULT_PROTOCOL_VERSION)]
        client_version: String,
        /// Account name (created on first use)
        #[clap(short, long, default_value = "smoketest")]
        user: String,
        /// Account password
        #[clap(long, default_value = "secret1")]
        password: String,
    }

    let args = Args::parse();

    let (mut client, ack) = MatchClient::connect(&args.server, &args.client_version).await?;
    println!("handshake: {}", ack["message"]);

    let login = client
        .request(json!({
            "action": "SSAFYlogin",
            "userName": args.user,
            "password": args.password,
        }))
        .await?;
    println!("login: {} (userId {})", login["message"], login["userId"]);

    let pong = client.request(json!({"action": "alivePing"})).await?;
    println!("ping: {}", pong["message"]);

    let ccu = client.request(json!({"action": "CCU"})).await?;
    println!("concurrent users: {}", ccu["ccu"]);

    let rooms = client.request(json!({"action": "listRooms"})).await?;
    println!("open rooms: {}", rooms["rooms"]);

    client.send(&json!({"action": "logout"})).await?;
    if client.closed_by_server(Duration::from_secs(2)).await {
        println!("logged out");
    }

    Ok(())
}
