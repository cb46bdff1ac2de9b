use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

/// Upper bound on a single frame; a buffer that grows past this without a
/// newline is discarded as a whole.
pub const MAX_FRAME_LEN: usize = 64 * 1024;

pub const DEFAULT_PROTOCOL_VERSION: &str = "1.0";
pub const DEFAULT_SESSION_TIMEOUT_SECS: u64 = 12;
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 10;
pub const DEFAULT_BROADCAST_INTERVAL_SECS: u64 = 3;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("frame exceeds maximum length")]
    Oversized,
}

/// Incremental decoder for newline-delimited JSON frames.
///
/// Feed raw socket reads with [`push_bytes`](FrameDecoder::push_bytes) and
/// drain complete documents with [`next_frame`](FrameDecoder::next_frame).
/// A malformed line is consumed and reported without poisoning the frames
/// behind it, so the caller decides whether the error is fatal.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Extracts at most one complete JSON document from the buffer.
    ///
    /// Returns `Ok(None)` when more bytes are needed. Blank lines are
    /// skipped. An unterminated line past [`MAX_FRAME_LEN`] clears the
    /// buffer and reports [`FrameError::Oversized`].
    pub fn next_frame(&mut self) -> Result<Option<Value>, FrameError> {
        loop {
            let Some(pos) = self.buf.iter().position(|&b| b == b'\n') else {
                if self.buf.len() > MAX_FRAME_LEN {
                    self.buf.clear();
                    return Err(FrameError::Oversized);
                }
                return Ok(None);
            };

            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            let mut line = &line[..line.len() - 1];
            if line.ends_with(b"\r") {
                line = &line[..line.len() - 1];
            }
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            return serde_json::from_slice(line)
                .map(Some)
                .map_err(FrameError::from);
        }
    }
}

/// Serializes a document into its wire form (JSON plus a trailing newline).
pub fn encode_frame(doc: &Value) -> String {
    let mut s = doc.to_string();
    s.push('\n');
    s
}

/// First frame on a connection, classifying the peer.
#[derive(Debug, Clone, PartialEq)]
pub enum Handshake {
    /// A room-authority process announcing the game port it serves.
    Mirror { port: u16 },
    /// A normal client; may piggyback its first request on the handshake.
    Client {
        version: Option<String>,
        request: Option<Value>,
    },
}

impl Handshake {
    pub fn parse(doc: &Value) -> Handshake {
        if doc.get("connectionType").and_then(Value::as_str) == Some("mirror") {
            if let Some(port) = doc
                .get("port")
                .and_then(Value::as_u64)
                .and_then(|p| u16::try_from(p).ok())
            {
                return Handshake::Mirror { port };
            }
        }
        Handshake::Client {
            version: doc.get("version").and_then(Value::as_str).map(str::to_owned),
            request: doc.get("action").is_some().then(|| doc.clone()),
        }
    }
}

/// One row of the concurrent-user broadcast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserEntry {
    pub nick_name: String,
    pub status: String,
}

/// One row of a `listRooms` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomInfo {
    pub room_id: i64,
    pub room_name: String,
    pub host_id: i64,
    pub ip_address: String,
    pub port: u16,
    pub max_players: u32,
    pub current_players: u32,
}

/// Constructors for request/response frames.
pub mod response {
    use super::*;

    pub fn ok(message: &str) -> Value {
        json!({"status": "success", "message": message})
    }

    pub fn error(message: &str) -> Value {
        json!({"status": "error", "message": message})
    }

    pub fn pong(token: &str) -> Value {
        json!({
            "action": "refreshSession",
            "status": "success",
            "message": "pong",
            "sessionToken": token,
        })
    }

    pub fn ccu(count: usize) -> Value {
        json!({"action": "CCU", "status": "success", "ccu": count})
    }

    pub fn room_capacity(count: usize) -> Value {
        json!({"action": "roomCapacity", "status": "success", "roomCapacity": count})
    }

    pub fn is_success(doc: &Value) -> bool {
        doc.get("status").and_then(Value::as_str) == Some("success")
    }
}

/// Constructors for server-initiated push frames. Pushes carry an `action`
/// but never a `status`, which is how clients tell them apart from
/// responses.
pub mod push {
    use super::*;

    pub fn ccu_list(users: &[UserEntry]) -> Value {
        json!({"action": "CCUList", "users": users})
    }

    pub fn new_login(nick_name: &str) -> Value {
        json!({"action": "newLogin", "nickName": nick_name})
    }

    pub fn chat(nick_name: &str, message: &str) -> Value {
        json!({"action": "chat", "nickName": nick_name, "message": message})
    }

    /// Relayed to a room's mirror process after the room is created.
    pub fn set_room(created: &Value) -> Value {
        json!({
            "action": "setRoom",
            "roomId": created["roomId"],
            "roomName": created["roomName"],
            "maxPlayers": created["maxPlayers"],
        })
    }

    pub fn is_push(doc: &Value) -> bool {
        doc.get("action").is_some() && doc.get("status").is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decoder_waits_for_complete_line() {
        let mut dec = FrameDecoder::new();
        dec.push_bytes(b"{\"action\":");
        assert!(dec.next_frame().unwrap().is_none());
        dec.push_bytes(b"\"login\"}");
        assert!(dec.next_frame().unwrap().is_none());
        dec.push_bytes(b"\n");
        let doc = dec.next_frame().unwrap().unwrap();
        assert_eq!(doc["action"], "login");
    }

    #[test]
    fn decoder_yields_one_frame_per_call() {
        let mut dec = FrameDecoder::new();
        dec.push_bytes(b"{\"a\":1}\n{\"a\":2}\n");
        assert_eq!(dec.next_frame().unwrap().unwrap()["a"], 1);
        assert_eq!(dec.next_frame().unwrap().unwrap()["a"], 2);
        assert!(dec.next_frame().unwrap().is_none());
    }

    #[test]
    fn decoder_recovers_after_malformed_line() {
        let mut dec = FrameDecoder::new();
        dec.push_bytes(b"not json\n{\"a\":3}\n");
        assert!(matches!(dec.next_frame(), Err(FrameError::Malformed(_))));
        assert_eq!(dec.next_frame().unwrap().unwrap()["a"], 3);
    }

    #[test]
    fn decoder_skips_blank_lines_and_crlf() {
        let mut dec = FrameDecoder::new();
        dec.push_bytes(b"\r\n  \n{\"a\":4}\r\n");
        assert_eq!(dec.next_frame().unwrap().unwrap()["a"], 4);
    }

    #[test]
    fn decoder_rejects_oversized_frame() {
        let mut dec = FrameDecoder::new();
        dec.push_bytes(&vec![b'x'; MAX_FRAME_LEN + 1]);
        assert!(matches!(dec.next_frame(), Err(FrameError::Oversized)));
        // Buffer is discarded; the stream can continue.
        dec.push_bytes(b"{\"a\":5}\n");
        assert_eq!(dec.next_frame().unwrap().unwrap()["a"], 5);
    }

    #[test]
    fn encode_appends_newline() {
        let frame = encode_frame(&json!({"a": 1}));
        assert!(frame.ends_with('\n'));
        let mut dec = FrameDecoder::new();
        dec.push_bytes(frame.as_bytes());
        assert_eq!(dec.next_frame().unwrap().unwrap()["a"], 1);
    }

    #[test]
    fn handshake_mirror() {
        let doc = json!({"connectionType": "mirror", "port": 9101});
        assert_eq!(Handshake::parse(&doc), Handshake::Mirror { port: 9101 });
    }

    #[test]
    fn handshake_mirror_without_port_is_not_a_mirror() {
        let doc = json!({"connectionType": "mirror"});
        assert!(matches!(Handshake::parse(&doc), Handshake::Client { .. }));
    }

    #[test]
    fn handshake_client_with_piggybacked_request() {
        let doc = json!({"version": "1.0", "action": "login", "userName": "alice"});
        match Handshake::parse(&doc) {
            Handshake::Client { version, request } => {
                assert_eq!(version.as_deref(), Some("1.0"));
                assert_eq!(request.unwrap()["action"], "login");
            }
            other => panic!("unexpected handshake: {:?}", other),
        }
    }

    #[test]
    fn handshake_client_without_version() {
        let doc = json!({"hello": true});
        assert_eq!(
            Handshake::parse(&doc),
            Handshake::Client {
                version: None,
                request: None
            }
        );
    }

    #[test]
    fn pushes_are_distinguishable_from_responses() {
        assert!(push::is_push(&push::new_login("alice")));
        assert!(push::is_push(&push::ccu_list(&[])));
        assert!(!push::is_push(&response::ok("connected")));
        assert!(!push::is_push(&response::pong("tok")));
    }

    #[test]
    fn user_entry_uses_wire_field_names() {
        let entry = UserEntry {
            nick_name: "alice".into(),
            status: "waiting".into(),
        };
        let doc = serde_json::to_value(&entry).unwrap();
        assert_eq!(doc["nickName"], "alice");
        assert_eq!(doc["status"], "waiting");
    }

    #[test]
    fn set_room_copies_room_fields() {
        let created = json!({
            "status": "success",
            "roomId": 7,
            "roomName": "Room1",
            "maxPlayers": 4,
            "port": 9101,
        });
        let relayed = push::set_room(&created);
        assert_eq!(relayed["action"], "setRoom");
        assert_eq!(relayed["roomId"], 7);
        assert_eq!(relayed["roomName"], "Room1");
        assert_eq!(relayed["maxPlayers"], 4);
        assert!(relayed.get("port").is_none());
    }
}
