//! # Matchmaking Client Library
//!
//! Protocol client for the matchmaking server: opens the persistent TCP
//! connection, performs the version (or mirror) handshake and speaks the
//! strictly sequential request/response protocol. Server pushes that
//! arrive while a response is awaited are buffered and handed out through
//! [`MatchClient::next_push`].

use log::debug;
use serde_json::{json, Value};
use shared::{encode_frame, push, FrameDecoder};
use std::collections::VecDeque;
use std::error::Error;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

/// One connection to the matchmaking server, client or mirror role.
pub struct MatchClient {
    stream: TcpStream,
    decoder: FrameDecoder,
    pending_pushes: VecDeque<Value>,
    session_token: Option<String>,
}

impl MatchClient {
    /// Connects as a normal client and performs the version handshake.
    /// Returns the client together with the server's handshake response.
    pub async fn connect(
        addr: &str,
        version: &str,
    ) -> Result<(MatchClient, Value), Box<dyn Error>> {
        let mut client = MatchClient::open(addr).await?;
        client.send(&json!({"version": version})).await?;
        let ack = client.recv_response().await?;
        Ok((client, ack))
    }

    /// Connects with a handshake that doubles as the first request; the
    /// returned document is the response to that request.
    pub async fn connect_with_request(
        addr: &str,
        version: &str,
        request: Value,
    ) -> Result<(MatchClient, Value), Box<dyn Error>> {
        let mut handshake = request;
        handshake["version"] = json!(version);
        let mut client = MatchClient::open(addr).await?;
        client.send(&handshake).await?;
        let resp = client.recv_response().await?;
        client.note_token(&resp);
        Ok((client, resp))
    }

    /// Connects as the mirror (room-authority) process for a game port.
    pub async fn connect_mirror(
        addr: &str,
        port: u16,
    ) -> Result<(MatchClient, Value), Box<dyn Error>> {
        let mut client = MatchClient::open(addr).await?;
        client
            .send(&json!({"connectionType": "mirror", "port": port}))
            .await?;
        let ack = client.recv_response().await?;
        Ok((client, ack))
    }

    async fn open(addr: &str) -> Result<MatchClient, Box<dyn Error>> {
        let stream = TcpStream::connect(addr).await?;
        Ok(MatchClient {
            stream,
            decoder: FrameDecoder::new(),
            pending_pushes: VecDeque::new(),
            session_token: None,
        })
    }

    /// Sends one request and awaits its response, buffering any pushes
    /// that arrive in between.
    pub async fn request(&mut self, body: Value) -> Result<Value, Box<dyn Error>> {
        self.send(&body).await?;
        let resp = self.recv_response().await?;
        self.note_token(&resp);
        Ok(resp)
    }

    /// Writes one raw frame; used for requests that get no response
    /// (logout) and for protocol tests.
    pub async fn send(&mut self, doc: &Value) -> Result<(), Box<dyn Error>> {
        self.stream.write_all(encode_frame(doc).as_bytes()).await?;
        Ok(())
    }

    /// Writes raw bytes to the socket, bypassing frame encoding.
    pub async fn send_raw(&mut self, bytes: &[u8]) -> Result<(), Box<dyn Error>> {
        self.stream.write_all(bytes).await?;
        Ok(())
    }

    /// Next server push, buffered or read within `wait`. Errors when the
    /// deadline passes or the connection closes first.
    pub async fn next_push(&mut self, wait: Duration) -> Result<Value, Box<dyn Error>> {
        if let Some(doc) = self.pending_pushes.pop_front() {
            return Ok(doc);
        }
        timeout(wait, async {
            loop {
                match self.read_frame().await? {
                    Some(doc) if push::is_push(&doc) => return Ok(doc),
                    Some(doc) => debug!("dropping unexpected frame: {}", doc),
                    None => return Err("connection closed by server".into()),
                }
            }
        })
        .await
        .map_err(|_| Box::<dyn Error>::from("no push within deadline"))?
    }

    /// Waits up to `wait` for the server to close the connection,
    /// discarding any frames still in flight. Returns true on close.
    pub async fn closed_by_server(&mut self, wait: Duration) -> bool {
        let outcome = timeout(wait, async {
            loop {
                match self.read_frame().await {
                    Ok(Some(_)) => {}
                    Ok(None) | Err(_) => return,
                }
            }
        })
        .await;
        outcome.is_ok()
    }

    /// Token issued at registration or by the last successful login.
    pub fn session_token(&self) -> Option<&str> {
        self.session_token.as_deref()
    }

    fn note_token(&mut self, resp: &Value) {
        if let Some(token) = resp["sessionToken"].as_str() {
            self.session_token = Some(token.to_owned());
        }
    }

    /// Awaits the next response frame, buffering pushes encountered on
    /// the way. Useful after [`send`](MatchClient::send) when a request
    /// and its response are handled separately.
    pub async fn recv_response(&mut self) -> Result<Value, Box<dyn Error>> {
        loop {
            match self.read_frame().await? {
                Some(doc) if push::is_push(&doc) => self.pending_pushes.push_back(doc),
                Some(doc) => return Ok(doc),
                None => return Err("connection closed by server".into()),
            }
        }
    }

    async fn read_frame(&mut self) -> Result<Option<Value>, Box<dyn Error>> {
        loop {
            if let Some(doc) = self.decoder.next_frame()? {
                return Ok(Some(doc));
            }
            let mut buf = [0u8; 4096];
            let n = self.stream.read(&mut buf).await?;
            if n == 0 {
                return Ok(None);
            }
            self.decoder.push_bytes(&buf[..n]);
        }
    }
}
