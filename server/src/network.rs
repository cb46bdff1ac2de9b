//! Server network layer: TCP transport, connection state machine, timers
//! and broadcast fan-out.
//!
//! Each accepted socket is split into a read task driving the session's
//! request/response loop and a writer task that owns the write half and
//! drains the session's outbound queue. Cross-session effects only go
//! through the registry or through another session's outbound queue, so a
//! session's own fields are never touched from a foreign connection task.

use crate::handlers::Handlers;
use crate::registry::SessionRegistry;
use crate::router::{route, HandlerGroup, LocalAction, Route};
use crate::session::{PlayerStatus, Session};
use log::{debug, error, info, warn};
use serde_json::{json, Value};
use shared::{push, response, FrameDecoder, Handshake};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch, Notify, RwLock};
use tokio::time::interval;

/// Runtime configuration for one server instance.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Client version string the handshake must match exactly.
    pub version: String,
    /// Idle cutoff enforced by the liveness supervisor.
    pub session_timeout: Duration,
    /// Period of the liveness supervisor.
    pub sweep_interval: Duration,
    /// Period of the concurrent-user broadcast.
    pub broadcast_interval: Duration,
    /// Game-server ports available for rooms; one mirror per port.
    pub room_ports: Vec<u16>,
    /// Reject a second concurrent connection from the same source address.
    pub single_session_per_address: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: "127.0.0.1".to_owned(),
            port: 8080,
            version: shared::DEFAULT_PROTOCOL_VERSION.to_owned(),
            session_timeout: Duration::from_secs(shared::DEFAULT_SESSION_TIMEOUT_SECS),
            sweep_interval: Duration::from_secs(shared::DEFAULT_SWEEP_INTERVAL_SECS),
            broadcast_interval: Duration::from_secs(shared::DEFAULT_BROADCAST_INTERVAL_SECS),
            room_ports: vec![9101, 9102, 9103, 9104],
            single_session_per_address: true,
        }
    }
}

/// State shared by the accept loop, every connection task and the timers.
pub(crate) struct ServerContext {
    pub(crate) registry: RwLock<SessionRegistry>,
    pub(crate) handlers: Handlers,
    pub(crate) config: ServerConfig,
    running: AtomicBool,
    shutdown: Notify,
}

/// The matchmaking server: accept loop plus background timers.
pub struct MatchServer {
    listener: TcpListener,
    ctx: Arc<ServerContext>,
}

impl MatchServer {
    /// Binds the listening socket and builds the shared state. Use port 0
    /// in `config` to let the OS pick a port (tests do).
    pub async fn bind(config: ServerConfig) -> Result<MatchServer, Box<dyn std::error::Error>> {
        let listener = TcpListener::bind((config.host.as_str(), config.port)).await?;
        info!("server listening on {}", listener.local_addr()?);
        let handlers = Handlers::in_memory(&config.host, &config.room_ports);
        let ctx = Arc::new(ServerContext {
            registry: RwLock::new(SessionRegistry::new()),
            handlers,
            config,
            running: AtomicBool::new(false),
            shutdown: Notify::new(),
        });
        Ok(MatchServer { listener, ctx })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Runs the accept loop until [`stop`](MatchServer::stop) is called.
    /// The liveness supervisor and broadcast scheduler run as background
    /// tasks for the same span.
    pub async fn run(&self) -> Result<(), Box<dyn std::error::Error>> {
        self.ctx.running.store(true, Ordering::Release);
        spawn_liveness_supervisor(Arc::clone(&self.ctx));
        spawn_broadcast_scheduler(Arc::clone(&self.ctx));
        info!("server started, waiting for connections");

        loop {
            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, addr)) => spawn_connection(stream, addr, Arc::clone(&self.ctx)),
                    Err(e) => error!("failed to accept connection: {}", e),
                },
                _ = self.ctx.shutdown.notified() => break,
            }
        }
        Ok(())
    }

    /// Stops the accept loop and both timers, then tears down every
    /// registered session. Idempotent; later calls are no-ops.
    pub async fn stop(&self) {
        if !self.ctx.running.swap(false, Ordering::AcqRel) {
            return;
        }
        self.ctx.shutdown.notify_waiters();

        let sessions = self.ctx.registry.read().await.all_sessions();
        for session in sessions {
            teardown(&self.ctx, &session, "server shutting down").await;
        }
        info!("server stopped");
    }
}

fn spawn_liveness_supervisor(ctx: Arc<ServerContext>) {
    tokio::spawn(async move {
        let mut ticker = interval(ctx.config.sweep_interval);
        ticker.tick().await; // the first tick completes immediately
        loop {
            ticker.tick().await;
            if !ctx.running.load(Ordering::Acquire) {
                break;
            }
            debug!("sweeping for inactive sessions");
            let expired = ctx
                .registry
                .write()
                .await
                .sweep(ctx.config.session_timeout);
            for session in expired {
                teardown(&ctx, &session, "session timed out").await;
            }
        }
    });
}

fn spawn_broadcast_scheduler(ctx: Arc<ServerContext>) {
    tokio::spawn(async move {
        let mut ticker = interval(ctx.config.broadcast_interval);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if !ctx.running.load(Ordering::Acquire) {
                break;
            }
            let (snapshot, recipients) = {
                let registry = ctx.registry.read().await;
                (registry.player_snapshot(), registry.waiting_sessions())
            };
            if !recipients.is_empty() {
                deliver(&push::ccu_list(&snapshot), &recipients);
            }
        }
    });
}

/// Pushes a login notice to the waiting population, computed fresh.
pub(crate) async fn broadcast_login(ctx: &Arc<ServerContext>, nick_name: &str) {
    let recipients = ctx.registry.read().await.waiting_sessions();
    deliver(&push::new_login(nick_name), &recipients);
}

/// Relays a chat line to the waiting population, computed fresh.
pub(crate) async fn broadcast_chat(ctx: &Arc<ServerContext>, nick_name: &str, message: &str) {
    let recipients = ctx.registry.read().await.waiting_sessions();
    deliver(&push::chat(nick_name, message), &recipients);
}

/// Fire-and-forget delivery: a recipient whose outbound side is gone is
/// skipped, and actual write failures are handled by that recipient's own
/// writer task, so one bad socket never stalls the rest.
fn deliver(frame: &Value, recipients: &[Arc<Session>]) {
    for session in recipients {
        if !session.push(frame) {
            debug!("broadcast skipped closed session {}", session.addr());
        }
    }
}

fn spawn_connection(stream: TcpStream, addr: SocketAddr, ctx: Arc<ServerContext>) {
    info!("new connection from {}", addr);
    let (read_half, write_half) = stream.into_split();
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    let (session, closed_rx) = Session::new(addr, outbound_tx);

    spawn_writer(write_half, outbound_rx, Arc::clone(&session), Arc::clone(&ctx));
    tokio::spawn(async move {
        Connection {
            ctx,
            session,
            reader: read_half,
            closed: closed_rx,
            decoder: FrameDecoder::new(),
        }
        .run()
        .await;
    });
}

/// Writer task: owns the socket's write half and drains the outbound
/// queue. A write failure tears the session down through the normal path.
fn spawn_writer(
    mut write_half: OwnedWriteHalf,
    mut outbound_rx: mpsc::UnboundedReceiver<String>,
    session: Arc<Session>,
    ctx: Arc<ServerContext>,
) {
    tokio::spawn(async move {
        while let Some(frame) = outbound_rx.recv().await {
            if let Err(e) = write_half.write_all(frame.as_bytes()).await {
                warn!("write to {} failed: {}", session.addr(), e);
                teardown(&ctx, &session, "write error").await;
                break;
            }
        }
        let _ = write_half.shutdown().await;
    });
}

enum Inbound {
    Frame(Value),
    Closed,
    Malformed,
}

/// Per-connection driver: handshake, then the strictly one-in-flight
/// request/response loop, then teardown.
struct Connection {
    ctx: Arc<ServerContext>,
    session: Arc<Session>,
    reader: OwnedReadHalf,
    closed: watch::Receiver<bool>,
    decoder: FrameDecoder,
}

impl Connection {
    async fn run(mut self) {
        let reason = self.serve().await;
        teardown(&self.ctx, &self.session, &reason).await;
    }

    /// Drives the connection to completion and returns the teardown
    /// reason.
    async fn serve(&mut self) -> String {
        // The handshake is the one place a malformed frame is fatal.
        let handshake = match self.read_frame().await {
            Inbound::Frame(doc) => Handshake::parse(&doc),
            Inbound::Closed => return "connection closed during handshake".into(),
            Inbound::Malformed => return "malformed handshake".into(),
        };

        match handshake {
            Handshake::Mirror { port } => {
                // Mirrors bypass version and address checks.
                self.session.make_mirror(port);
                self.ctx
                    .registry
                    .write()
                    .await
                    .register_mirror(&self.session, port);
                info!("mirror connection established for port {}", port);
                self.session.push(&response::ok("mirror connected"));
            }
            Handshake::Client { version, request } => {
                if self.ctx.config.single_session_per_address {
                    let ip = self.session.addr().ip();
                    if !self.ctx.registry.write().await.allow_connection(ip) {
                        self.session
                            .push(&response::error("address already connected"));
                        return "duplicate connection from same address".into();
                    }
                    self.session.guard_address();
                }
                if version.as_deref() != Some(self.ctx.config.version.as_str()) {
                    return "client version mismatch".into();
                }
                self.ctx.registry.write().await.register(&self.session);
                match request {
                    // The handshake may double as the first request.
                    Some(first) => {
                        if let Some(reason) = self.dispatch(first).await {
                            return reason;
                        }
                    }
                    None => {
                        self.session.push(&response::ok("connected"));
                    }
                }
            }
        }

        loop {
            match self.read_frame().await {
                Inbound::Frame(doc) => {
                    self.session.touch();
                    if let Some(reason) = self.dispatch(doc).await {
                        return reason;
                    }
                }
                Inbound::Closed => return "connection closed by peer".into(),
                Inbound::Malformed => {
                    self.session.push(&response::error("malformed request"));
                }
            }
        }
    }

    /// Reads until the decoder yields one document, the peer goes away or
    /// an external teardown raises the closed signal.
    async fn read_frame(&mut self) -> Inbound {
        loop {
            match self.decoder.next_frame() {
                Ok(Some(doc)) => return Inbound::Frame(doc),
                Ok(None) => {}
                Err(e) => {
                    warn!("decode error from {}: {}", self.session.addr(), e);
                    return Inbound::Malformed;
                }
            }

            let mut buf = [0u8; 4096];
            tokio::select! {
                result = self.reader.read(&mut buf) => match result {
                    Ok(0) => return Inbound::Closed,
                    Ok(n) => self.decoder.push_bytes(&buf[..n]),
                    Err(e) => {
                        debug!("read error from {}: {}", self.session.addr(), e);
                        return Inbound::Closed;
                    }
                },
                _ = self.closed.changed() => return Inbound::Closed,
            }
        }
    }

    /// Handles one request document. Returns Some(reason) when the
    /// request ends the connection.
    async fn dispatch(&mut self, request: Value) -> Option<String> {
        let Some(action) = request
            .get("action")
            .and_then(Value::as_str)
            .map(str::to_owned)
        else {
            self.session.push(&response::error("missing action field"));
            return None;
        };
        debug!("request {} from {}", action, self.session.addr());

        match route(&action) {
            Route::Local(LocalAction::AlivePing) => {
                let token = self.session.token().unwrap_or_default();
                self.session.push(&response::pong(&token));
                None
            }
            Route::Local(LocalAction::Logout) => {
                let who = self
                    .session
                    .nick_name()
                    .unwrap_or_else(|| self.session.addr().to_string());
                info!("{} logged out", who);
                Some("logout requested".into())
            }
            Route::Local(LocalAction::RoomCapacity) => {
                let count = self.ctx.registry.read().await.count_mirrors();
                self.session.push(&response::room_capacity(count));
                None
            }
            Route::Local(LocalAction::Ccu) => {
                let count = self.ctx.registry.read().await.count_sessions();
                self.session.push(&response::ccu(count));
                None
            }
            Route::Local(LocalAction::Chat) => {
                let Some(nick_name) = self.session.nick_name() else {
                    self.session.push(&response::error("authentication required"));
                    return None;
                };
                let Some(message) = request.get("message").and_then(Value::as_str) else {
                    self.session.push(&response::error("missing message field"));
                    return None;
                };
                broadcast_chat(&self.ctx, &nick_name, message).await;
                self.session.push(&response::ok("chat relayed"));
                None
            }
            Route::Domain(group) => {
                self.dispatch_domain(group, &action, request).await;
                None
            }
            Route::Unknown => {
                warn!("unknown action {} from {}", action, self.session.addr());
                self.session.push(&response::error("unknown action"));
                None
            }
        }
    }

    async fn dispatch_domain(&mut self, group: HandlerGroup, action: &str, mut request: Value) {
        if group.requires_auth() && self.session.user_id().is_none() {
            self.session.push(&response::error("authentication required"));
            return;
        }
        if group.requires_mirror() && !self.session.is_mirror() {
            self.session.push(&response::error("not authorized"));
            return;
        }
        // Act on behalf of the logged-in caller, overriding any id the
        // client put in the request itself.
        if let Some(user_id) = self.session.user_id() {
            request["userId"] = json!(user_id);
        }

        let handler = match group {
            HandlerGroup::Auth => &self.ctx.handlers.auth,
            HandlerGroup::Room => &self.ctx.handlers.room,
            HandlerGroup::Game => &self.ctx.handlers.game,
        };
        let mut resp = handler.handle(request);
        if response::is_success(&resp) {
            resp = self.apply_side_effects(action, resp).await;
        }
        self.session.push(&resp);
    }

    /// Cross-cutting updates keyed on (action, success) after a handler
    /// returns.
    async fn apply_side_effects(&mut self, action: &str, resp: Value) -> Value {
        match action {
            "login" | "SSAFYlogin" => self.complete_login(resp).await,
            "createRoom" => self.relay_room_to_mirror(resp).await,
            "joinRoom" => {
                if let Some(room_id) = resp["roomId"].as_i64() {
                    self.session.set_status(PlayerStatus::InRoom(room_id));
                }
                resp
            }
            "exitRoom" => {
                self.session.set_status(PlayerStatus::Waiting);
                resp
            }
            "gameStart" | "gameEnd" => {
                let users: Vec<i64> = resp["users"]
                    .as_array()
                    .map(|users| users.iter().filter_map(Value::as_i64).collect())
                    .unwrap_or_default();
                self.ctx
                    .registry
                    .read()
                    .await
                    .set_users_status(&users, action == "gameStart");
                resp
            }
            "updateNickName" => {
                if let Some(nick_name) = resp["nickName"].as_str() {
                    self.session.set_nick_name(nick_name);
                }
                resp
            }
            _ => resp,
        }
    }

    /// Adopts the identity from a successful login, issues a fresh token
    /// and announces the login. Last login wins: a live session the user
    /// holds elsewhere is evicted first.
    async fn complete_login(&mut self, mut resp: Value) -> Value {
        let (Some(user_id), Some(user_name)) = (
            resp["userId"].as_i64(),
            resp["userName"].as_str().map(str::to_owned),
        ) else {
            return response::error("login response missing identity");
        };
        let nick_name = resp["nickName"].as_str().unwrap_or(&user_name).to_owned();

        let prior = self.ctx.registry.write().await.lookup_user(user_id);
        if let Some(prior) = prior {
            if !Arc::ptr_eq(&prior, &self.session) {
                info!("user {} already online, evicting previous session", user_id);
                teardown(&self.ctx, &prior, "logged in from another connection").await;
            }
        }

        self.session.adopt_player(user_id, &user_name, &nick_name);
        let token = self.ctx.registry.write().await.register(&self.session);
        resp["sessionToken"] = json!(token);
        info!("user {} logged in as {} ({})", user_name, nick_name, user_id);
        broadcast_login(&self.ctx, &nick_name).await;
        resp
    }

    /// Forwards a freshly created room to its mirror. A room whose mirror
    /// is missing is a consistency error: the creation is rolled back and
    /// the client sees a handler-level failure.
    async fn relay_room_to_mirror(&mut self, resp: Value) -> Value {
        let Some(port) = resp["port"].as_u64().and_then(|p| u16::try_from(p).ok()) else {
            return response::error("room created without a game port");
        };
        let mirror = self.ctx.registry.write().await.lookup_mirror(port);
        let Some(mirror) = mirror else {
            error!("no mirror session for port {}, rolling back room", port);
            if let Some(user_id) = self.session.user_id() {
                let _ = self
                    .ctx
                    .handlers
                    .room
                    .handle(json!({"action": "exitRoom", "userId": user_id}));
            }
            return response::error("no mirror server for room");
        };

        mirror.push(&push::set_room(&resp));
        if let Some(room_id) = resp["roomId"].as_i64() {
            self.session.set_status(PlayerStatus::InRoom(room_id));
        }
        resp
    }
}

/// Tears a session down exactly once: best-effort room exit for logged-in
/// players, deregistration from every index, then closing the transport.
/// Every failure path funnels here, and failures inside teardown itself
/// are logged and swallowed so it always completes.
pub(crate) async fn teardown(ctx: &Arc<ServerContext>, session: &Arc<Session>, reason: &str) {
    if !session.begin_teardown() {
        return;
    }
    info!("closing session {}: {}", session.addr(), reason);

    if let Some(user_id) = session.user_id() {
        let resp = ctx
            .handlers
            .room
            .handle(json!({"action": "exitRoom", "userId": user_id}));
        if response::is_success(&resp) {
            info!("user {} auto-left their room on disconnect", user_id);
        }
    }

    {
        let mut registry = ctx.registry.write().await;
        if let Some(token) = session.token() {
            registry.remove(&token, session.user_id());
        }
        if let Some(port) = session.mirror_port() {
            registry.remove_mirror(port, session);
        }
        if session.address_guarded() {
            registry.release_connection(&session.addr().ip());
        }
    }
    session.close_outbound();
}
