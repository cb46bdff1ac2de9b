//! Per-connection session state.
//!
//! A [`Session`] is shared between the connection's read task, its writer
//! task, the registry (as a weak reference) and the background timers. The
//! mutable protocol state lives behind a small mutex; the outbound side is
//! an unbounded channel drained by the writer task that owns the socket's
//! write half.

use log::debug;
use serde_json::Value;
use shared::{encode_frame, UserEntry};
use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};

/// Where an authenticated player currently is, lobby-wise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerStatus {
    Waiting,
    InRoom(i64),
    InGame,
}

impl fmt::Display for PlayerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlayerStatus::Waiting => write!(f, "waiting"),
            PlayerStatus::InRoom(room_id) => write!(f, "in room {}", room_id),
            PlayerStatus::InGame => write!(f, "in game"),
        }
    }
}

/// What kind of peer this connection represents.
///
/// Mirror connections are identified by the game port they serve; player
/// identity fields exist only on the `Player` variant, so the two kinds
/// cannot be cross-read.
#[derive(Debug, Clone)]
pub enum SessionRole {
    /// Connected and handshaken, but not logged in.
    Anonymous,
    /// Logged-in game client.
    Player {
        user_id: i64,
        user_name: String,
        nick_name: String,
        status: PlayerStatus,
    },
    /// Room-authority process for one game port.
    Mirror { port: u16 },
}

struct SessionState {
    role: SessionRole,
    token: Option<String>,
    last_activity: Instant,
}

/// Server-side state for one live connection.
pub struct Session {
    addr: SocketAddr,
    outbound: Mutex<Option<mpsc::UnboundedSender<String>>>,
    closed_tx: watch::Sender<bool>,
    torn_down: AtomicBool,
    addr_guarded: AtomicBool,
    state: Mutex<SessionState>,
}

impl Session {
    /// Creates a session around an outbound frame queue. The returned
    /// watch receiver resolves once teardown begins, which lets the read
    /// task stop waiting on a socket that is being closed from elsewhere.
    pub fn new(
        addr: SocketAddr,
        outbound: mpsc::UnboundedSender<String>,
    ) -> (Arc<Session>, watch::Receiver<bool>) {
        let (closed_tx, closed_rx) = watch::channel(false);
        let session = Arc::new(Session {
            addr,
            outbound: Mutex::new(Some(outbound)),
            closed_tx,
            torn_down: AtomicBool::new(false),
            addr_guarded: AtomicBool::new(false),
            state: Mutex::new(SessionState {
                role: SessionRole::Anonymous,
                token: None,
                last_activity: Instant::now(),
            }),
        });
        (session, closed_rx)
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Queues a frame for delivery. Returns false when the outbound side
    /// is already closed; callers treat that as a skipped recipient, never
    /// as an error of their own.
    pub fn push(&self, doc: &Value) -> bool {
        let guard = self.outbound.lock().unwrap();
        match guard.as_ref() {
            Some(tx) => tx.send(encode_frame(doc)).is_ok(),
            None => false,
        }
    }

    /// Refreshes the activity clock; called for every inbound frame.
    pub fn touch(&self) {
        self.state.lock().unwrap().last_activity = Instant::now();
    }

    pub fn is_active(&self, timeout: Duration) -> bool {
        self.state.lock().unwrap().last_activity.elapsed() < timeout
    }

    pub fn token(&self) -> Option<String> {
        self.state.lock().unwrap().token.clone()
    }

    pub fn set_token(&self, token: Option<String>) {
        self.state.lock().unwrap().token = token;
    }

    pub fn role(&self) -> SessionRole {
        self.state.lock().unwrap().role.clone()
    }

    pub fn user_id(&self) -> Option<i64> {
        match self.state.lock().unwrap().role {
            SessionRole::Player { user_id, .. } => Some(user_id),
            _ => None,
        }
    }

    pub fn nick_name(&self) -> Option<String> {
        match &self.state.lock().unwrap().role {
            SessionRole::Player { nick_name, .. } => Some(nick_name.clone()),
            _ => None,
        }
    }

    pub fn status(&self) -> Option<PlayerStatus> {
        match self.state.lock().unwrap().role {
            SessionRole::Player { status, .. } => Some(status),
            _ => None,
        }
    }

    pub fn set_status(&self, new_status: PlayerStatus) {
        if let SessionRole::Player { status, .. } = &mut self.state.lock().unwrap().role {
            *status = new_status;
        }
    }

    pub fn is_mirror(&self) -> bool {
        matches!(self.state.lock().unwrap().role, SessionRole::Mirror { .. })
    }

    pub fn mirror_port(&self) -> Option<u16> {
        match self.state.lock().unwrap().role {
            SessionRole::Mirror { port } => Some(port),
            _ => None,
        }
    }

    /// Adopts a logged-in identity. The player starts in the waiting state.
    pub fn adopt_player(&self, user_id: i64, user_name: &str, nick_name: &str) {
        self.state.lock().unwrap().role = SessionRole::Player {
            user_id,
            user_name: user_name.to_owned(),
            nick_name: nick_name.to_owned(),
            status: PlayerStatus::Waiting,
        };
    }

    pub fn set_nick_name(&self, new_nick: &str) {
        if let SessionRole::Player { nick_name, .. } = &mut self.state.lock().unwrap().role {
            *nick_name = new_nick.to_owned();
        }
    }

    pub fn make_mirror(&self, port: u16) {
        self.state.lock().unwrap().role = SessionRole::Mirror { port };
    }

    /// Snapshot row for the concurrent-user broadcast; None for mirrors
    /// and anonymous sessions.
    pub fn user_entry(&self) -> Option<UserEntry> {
        match &self.state.lock().unwrap().role {
            SessionRole::Player {
                nick_name, status, ..
            } => Some(UserEntry {
                nick_name: nick_name.clone(),
                status: status.to_string(),
            }),
            _ => None,
        }
    }

    /// Marks this session as holding its source address's connection slot.
    pub fn guard_address(&self) {
        self.addr_guarded.store(true, Ordering::Release);
    }

    /// Whether teardown must release the address slot. Sessions rejected
    /// by the duplicate-address policy never held it.
    pub fn address_guarded(&self) -> bool {
        self.addr_guarded.load(Ordering::Acquire)
    }

    /// Claims the right to run teardown. Only the first caller gets true;
    /// the closed signal is raised so the read task stops immediately.
    pub fn begin_teardown(&self) -> bool {
        let first = !self.torn_down.swap(true, Ordering::AcqRel);
        if first {
            let _ = self.closed_tx.send(true);
            debug!("session {} entering teardown", self.addr);
        }
        first
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down.load(Ordering::Acquire)
    }

    /// Drops the outbound sender, which ends the writer task and closes
    /// the socket. Safe to call more than once.
    pub fn close_outbound(&self) {
        self.outbound.lock().unwrap().take();
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("addr", &self.addr)
            .field("role", &self.state.lock().unwrap().role)
            .finish()
    }
}
