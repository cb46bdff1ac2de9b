//! Domain request handlers behind the session core.
//!
//! The session layer treats handlers as opaque: a request document goes
//! in, a response document with at least `status` and `message` comes
//! out, synchronously. The in-memory implementations here stand where the
//! production deployment would put database-backed services; they share
//! one store the way the original services share one connection pool.

use log::info;
use serde_json::{json, Value};
use shared::RoomInfo;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Uniform contract between the session core and domain logic.
///
/// Handlers run synchronously inside the connection task, so
/// implementations must stay fast; a blocking backend belongs behind
/// `spawn_blocking` on its own side of this boundary.
pub trait RequestHandler: Send + Sync {
    fn handle(&self, request: Value) -> Value;
}

/// The three handler groups the router dispatches to.
pub struct Handlers {
    pub auth: Arc<dyn RequestHandler>,
    pub room: Arc<dyn RequestHandler>,
    pub game: Arc<dyn RequestHandler>,
}

impl Handlers {
    /// Builds the in-memory handler set over a shared store. `room_ports`
    /// is the pool of game-server ports available for rooms; each port is
    /// expected to have a mirror process connected.
    pub fn in_memory(host_ip: &str, room_ports: &[u16]) -> Handlers {
        let store = Arc::new(Mutex::new(MatchStore::new(host_ip, room_ports)));
        Handlers {
            auth: Arc::new(AuthHandler {
                store: Arc::clone(&store),
            }),
            room: Arc::new(RoomHandler {
                store: Arc::clone(&store),
            }),
            game: Arc::new(GameHandler { store }),
        }
    }
}

fn error(message: &str) -> Value {
    json!({"status": "error", "message": message})
}

// Name validation: explicit allow-list of ASCII alphanumerics plus the
// Hangul syllable block.

fn is_allowed_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || ('가'..='힣').contains(&c)
}

fn is_valid_user_name(name: &str) -> bool {
    if name.is_empty() || name.len() > 30 {
        return false;
    }
    // Reserved for mirror connections.
    if name.to_ascii_lowercase().contains("mirror") {
        return false;
    }
    let is_email = match name.find('@') {
        Some(at) => name[at..].contains('.'),
        None => false,
    };
    if is_email {
        name.chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '@' | '.' | '_' | '-' | '+'))
    } else {
        name.chars().all(|c| c.is_ascii_alphanumeric())
    }
}

fn is_valid_nick_name(name: &str) -> bool {
    !name.is_empty() && name.len() <= 24 && name.chars().all(is_allowed_char)
}

fn is_valid_room_name(name: &str) -> bool {
    if name.is_empty() || name.len() > 40 {
        return false;
    }
    // A single trailing '$' marker is tolerated.
    let name = name.strip_suffix('$').unwrap_or(name);
    name.chars().all(|c| is_allowed_char(c) || c == ' ')
}

struct UserRecord {
    user_id: i64,
    user_name: String,
    password: String,
    nick_name: String,
}

#[derive(PartialEq)]
enum RoomState {
    Waiting,
    InProgress,
}

struct RoomRecord {
    room_id: i64,
    room_name: String,
    host_id: i64,
    ip_address: String,
    port: u16,
    max_players: u32,
    players: Vec<i64>,
    state: RoomState,
}

struct GameRecord {
    game_id: i64,
    room_id: i64,
    users: Vec<i64>,
    finished: bool,
}

/// In-memory stand-in for the user/room/game repositories.
struct MatchStore {
    users: HashMap<i64, UserRecord>,
    users_by_name: HashMap<String, i64>,
    rooms: HashMap<i64, RoomRecord>,
    games: HashMap<i64, GameRecord>,
    host_ip: String,
    free_ports: Vec<u16>,
    next_user_id: i64,
    next_room_id: i64,
    next_game_id: i64,
}

impl MatchStore {
    fn new(host_ip: &str, room_ports: &[u16]) -> Self {
        MatchStore {
            users: HashMap::new(),
            users_by_name: HashMap::new(),
            rooms: HashMap::new(),
            games: HashMap::new(),
            host_ip: host_ip.to_owned(),
            free_ports: room_ports.to_vec(),
            next_user_id: 1,
            next_room_id: 1,
            next_game_id: 1,
        }
    }

    fn create_user(&mut self, user_name: &str, password: &str) -> i64 {
        let user_id = self.next_user_id;
        self.next_user_id += 1;
        self.users.insert(
            user_id,
            UserRecord {
                user_id,
                user_name: user_name.to_owned(),
                password: password.to_owned(),
                // Nickname defaults to the account name until changed.
                nick_name: user_name.to_owned(),
            },
        );
        self.users_by_name.insert(user_name.to_owned(), user_id);
        user_id
    }

    fn find_by_name(&self, user_name: &str) -> Option<&UserRecord> {
        self.users_by_name
            .get(user_name)
            .and_then(|id| self.users.get(id))
    }

    fn room_of(&self, user_id: i64) -> Option<i64> {
        self.rooms
            .values()
            .find(|room| room.players.contains(&user_id))
            .map(|room| room.room_id)
    }

    fn create_room_with_host(
        &mut self,
        host_id: i64,
        room_name: &str,
        max_players: u32,
    ) -> Result<&RoomRecord, &'static str> {
        if self.room_of(host_id).is_some() {
            return Err("already in a room");
        }
        let Some(port) = self.free_ports.pop() else {
            return Err("no game server slot available");
        };
        let room_id = self.next_room_id;
        self.next_room_id += 1;
        self.rooms.insert(
            room_id,
            RoomRecord {
                room_id,
                room_name: room_name.to_owned(),
                host_id,
                ip_address: self.host_ip.clone(),
                port,
                max_players,
                players: vec![host_id],
                state: RoomState::Waiting,
            },
        );
        Ok(&self.rooms[&room_id])
    }

    fn add_player(&mut self, room_id: i64, user_id: i64) -> Result<(), &'static str> {
        if self.room_of(user_id).is_some() {
            return Err("already in a room");
        }
        let Some(room) = self.rooms.get_mut(&room_id) else {
            return Err("room not found");
        };
        if room.state != RoomState::Waiting || room.players.len() as u32 >= room.max_players {
            return Err("room is full or already playing");
        }
        room.players.push(user_id);
        Ok(())
    }

    /// Removes a user from whatever room they occupy; an emptied room is
    /// closed and its port returned to the pool.
    fn remove_player(&mut self, user_id: i64) -> Option<i64> {
        let room_id = self.room_of(user_id)?;
        let room = self.rooms.get_mut(&room_id).expect("room_of returned it");
        room.players.retain(|id| *id != user_id);
        if room.players.is_empty() {
            let closed = self.rooms.remove(&room_id).expect("present");
            self.free_ports.push(closed.port);
            info!("room {} emptied and closed, port {} freed", room_id, closed.port);
        }
        Some(room_id)
    }

    fn open_rooms(&self) -> Vec<RoomInfo> {
        let mut rooms: Vec<RoomInfo> = self
            .rooms
            .values()
            .filter(|room| room.state == RoomState::Waiting)
            .map(|room| RoomInfo {
                room_id: room.room_id,
                room_name: room.room_name.clone(),
                host_id: room.host_id,
                ip_address: room.ip_address.clone(),
                port: room.port,
                max_players: room.max_players,
                current_players: room.players.len() as u32,
            })
            .collect();
        rooms.sort_by_key(|room| room.room_id);
        rooms
    }

    fn start_game(&mut self, room_id: i64) -> Result<&GameRecord, &'static str> {
        let Some(room) = self.rooms.get_mut(&room_id) else {
            return Err("room not found");
        };
        if room.state != RoomState::Waiting {
            return Err("room is already playing");
        }
        room.state = RoomState::InProgress;
        let game_id = self.next_game_id;
        self.next_game_id += 1;
        self.games.insert(
            game_id,
            GameRecord {
                game_id,
                room_id,
                users: room.players.clone(),
                finished: false,
            },
        );
        Ok(&self.games[&game_id])
    }

    fn end_game(&mut self, game_id: i64) -> Result<(i64, Vec<i64>), &'static str> {
        let Some(game) = self.games.get_mut(&game_id) else {
            return Err("game not found");
        };
        if game.finished {
            return Err("game already ended");
        }
        game.finished = true;
        let room_id = game.room_id;
        let users = game.users.clone();
        if let Some(room) = self.rooms.get_mut(&room_id) {
            room.state = RoomState::Waiting;
        }
        Ok((room_id, users))
    }
}

struct AuthHandler {
    store: Arc<Mutex<MatchStore>>,
}

impl AuthHandler {
    fn register(&self, request: &Value) -> Value {
        let (Some(user_name), Some(password)) = (
            request["userName"].as_str(),
            request["password"].as_str(),
        ) else {
            return error("missing required fields");
        };
        if !is_valid_user_name(user_name) {
            return error("invalid user name format");
        }
        if password.len() < 6 {
            return error("password must be at least 6 characters");
        }
        let mut store = self.store.lock().unwrap();
        if store.find_by_name(user_name).is_some() {
            return error("user name already exists");
        }
        let user_id = store.create_user(user_name, password);
        info!("new account {} created (id {})", user_name, user_id);
        json!({
            "action": "register",
            "status": "success",
            "message": "account created",
            "userId": user_id,
            "userName": user_name,
        })
    }

    fn login(&self, request: &Value) -> Value {
        let (Some(user_name), Some(password)) = (
            request["userName"].as_str(),
            request["password"].as_str(),
        ) else {
            return error("missing required fields");
        };
        let store = self.store.lock().unwrap();
        let Some(user) = store.find_by_name(user_name) else {
            return error("no such user");
        };
        if user.password != password {
            return error("wrong password");
        }
        json!({
            "action": "login",
            "status": "success",
            "message": "login successful",
            "userId": user.user_id,
            "userName": user.user_name,
            "nickName": user.nick_name,
        })
    }

    /// Register-if-absent, then log in; the single-sign-on entry point.
    fn register_check_and_login(&self, request: &Value) -> Value {
        let (Some(user_name), Some(password)) = (
            request["userName"].as_str(),
            request["password"].as_str(),
        ) else {
            return error("missing required fields");
        };
        {
            let mut store = self.store.lock().unwrap();
            if store.find_by_name(user_name).is_none() {
                if !is_valid_user_name(user_name) {
                    return error("invalid user name format");
                }
                store.create_user(user_name, password);
            }
        }
        self.login(request)
    }

    fn update_nick_name(&self, request: &Value) -> Value {
        let (Some(user_id), Some(nick_name)) =
            (request["userId"].as_i64(), request["nickName"].as_str())
        else {
            return error("missing required fields");
        };
        if !is_valid_nick_name(nick_name) {
            return error("invalid nickname format");
        }
        let mut store = self.store.lock().unwrap();
        let Some(user) = store.users.get_mut(&user_id) else {
            return error("nickname update failed");
        };
        user.nick_name = nick_name.to_owned();
        info!("user {} renamed to {}", user_id, nick_name);
        json!({
            "action": "updateNickName",
            "status": "success",
            "message": "nickname updated",
            "nickName": nick_name,
        })
    }
}

impl RequestHandler for AuthHandler {
    fn handle(&self, request: Value) -> Value {
        match request["action"].as_str() {
            Some("register") => self.register(&request),
            Some("login") => self.login(&request),
            Some("SSAFYlogin") => self.register_check_and_login(&request),
            Some("updateNickName") => self.update_nick_name(&request),
            _ => error("unknown auth action"),
        }
    }
}

struct RoomHandler {
    store: Arc<Mutex<MatchStore>>,
}

impl RoomHandler {
    fn create_room(&self, request: &Value) -> Value {
        let (Some(room_name), Some(user_id), Some(max_players)) = (
            request["roomName"].as_str(),
            request["userId"].as_i64(),
            request["maxPlayers"].as_u64(),
        ) else {
            return error("missing required fields");
        };
        if !is_valid_room_name(room_name) {
            return error("room name must be 1-40 bytes of letters, digits or spaces");
        }
        if !(2..=8).contains(&max_players) {
            return error("max players must be between 2 and 8");
        }
        let mut store = self.store.lock().unwrap();
        match store.create_room_with_host(user_id, room_name, max_players as u32) {
            Ok(room) => {
                info!(
                    "user {} created room {} (id {}, port {})",
                    user_id, room.room_name, room.room_id, room.port
                );
                json!({
                    "action": "createRoom",
                    "status": "success",
                    "message": "room created",
                    "roomId": room.room_id,
                    "roomName": room.room_name,
                    "maxPlayers": room.max_players,
                    "ipAddress": room.ip_address,
                    "port": room.port,
                })
            }
            Err(reason) => error(reason),
        }
    }

    fn join_room(&self, request: &Value) -> Value {
        let (Some(room_id), Some(user_id)) =
            (request["roomId"].as_i64(), request["userId"].as_i64())
        else {
            return error("missing required fields");
        };
        let mut store = self.store.lock().unwrap();
        match store.add_player(room_id, user_id) {
            Ok(()) => {
                info!("user {} joined room {}", user_id, room_id);
                json!({
                    "action": "joinRoom",
                    "status": "success",
                    "message": "joined room",
                    "roomId": room_id,
                })
            }
            Err(reason) => error(reason),
        }
    }

    fn exit_room(&self, request: &Value) -> Value {
        let Some(user_id) = request["userId"].as_i64() else {
            return error("missing required fields");
        };
        let mut store = self.store.lock().unwrap();
        match store.remove_player(user_id) {
            Some(room_id) => {
                info!("user {} left room {}", user_id, room_id);
                json!({
                    "action": "exitRoom",
                    "status": "success",
                    "message": "left room",
                })
            }
            None => error("user is not in any room"),
        }
    }

    fn list_rooms(&self) -> Value {
        let store = self.store.lock().unwrap();
        json!({
            "action": "listRooms",
            "status": "success",
            "message": "open room list",
            "rooms": store.open_rooms(),
        })
    }
}

impl RequestHandler for RoomHandler {
    fn handle(&self, request: Value) -> Value {
        match request["action"].as_str() {
            Some("createRoom") => self.create_room(&request),
            Some("joinRoom") => self.join_room(&request),
            Some("exitRoom") => self.exit_room(&request),
            Some("listRooms") => self.list_rooms(),
            _ => error("unknown room action"),
        }
    }
}

struct GameHandler {
    store: Arc<Mutex<MatchStore>>,
}

impl GameHandler {
    fn game_start(&self, request: &Value) -> Value {
        let Some(room_id) = request["roomId"].as_i64() else {
            return error("missing required fields");
        };
        let mut store = self.store.lock().unwrap();
        match store.start_game(room_id) {
            Ok(game) => {
                info!("room {} started game {}", room_id, game.game_id);
                json!({
                    "action": "gameStart",
                    "status": "success",
                    "message": "game started",
                    "gameId": game.game_id,
                    "users": game.users,
                })
            }
            Err(reason) => error(reason),
        }
    }

    fn game_end(&self, request: &Value) -> Value {
        let Some(game_id) = request["gameId"].as_i64() else {
            return error("missing required fields");
        };
        let mut store = self.store.lock().unwrap();
        match store.end_game(game_id) {
            Ok((room_id, users)) => {
                info!("game {} in room {} ended", game_id, room_id);
                json!({
                    "action": "gameEnd",
                    "status": "success",
                    "message": "game ended",
                    "roomId": room_id,
                    "users": users,
                })
            }
            Err(reason) => error(reason),
        }
    }
}

impl RequestHandler for GameHandler {
    fn handle(&self, request: Value) -> Value {
        match request["action"].as_str() {
            Some("gameStart") => self.game_start(&request),
            Some("gameEnd") => self.game_end(&request),
            _ => error("unknown game action"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::response::is_success;

    fn handlers() -> Handlers {
        Handlers::in_memory("127.0.0.1", &[9101, 9102])
    }

    fn register(handlers: &Handlers, name: &str) -> i64 {
        let resp = handlers.auth.handle(json!({
            "action": "register", "userName": name, "password": "secret1",
        }));
        assert!(is_success(&resp), "register failed: {}", resp["message"]);
        resp["userId"].as_i64().unwrap()
    }

    #[test]
    fn user_name_validation() {
        assert!(is_valid_user_name("alice01"));
        assert!(!is_valid_user_name("철수123")); // Hangul allowed only in nick/room names
        assert!(is_valid_user_name("alice.smith@example.com"));
        assert!(!is_valid_user_name(""));
        assert!(!is_valid_user_name("has space"));
        assert!(!is_valid_user_name("MirrorUser"));
        assert!(!is_valid_user_name(&"a".repeat(31)));
        assert!(!is_valid_user_name("한글@example.com"));
    }

    #[test]
    fn nick_and_room_name_validation() {
        assert!(is_valid_nick_name("Alice"));
        assert!(is_valid_nick_name("철수"));
        assert!(!is_valid_nick_name("has space"));
        assert!(!is_valid_nick_name(&"a".repeat(25)));

        assert!(is_valid_room_name("Room 1"));
        assert!(is_valid_room_name("한글방"));
        assert!(is_valid_room_name("Room1$"));
        assert!(!is_valid_room_name("Room$1"));
        assert!(!is_valid_room_name(""));
        assert!(!is_valid_room_name(&"a".repeat(41)));
    }

    #[test]
    fn register_then_login() {
        let handlers = handlers();
        let user_id = register(&handlers, "alice");

        let resp = handlers.auth.handle(json!({
            "action": "login", "userName": "alice", "password": "secret1",
        }));
        assert!(is_success(&resp));
        assert_eq!(resp["userId"].as_i64(), Some(user_id));
        assert_eq!(resp["nickName"], "alice");
    }

    #[test]
    fn register_rejects_duplicates_and_weak_passwords() {
        let handlers = handlers();
        register(&handlers, "alice");

        let dup = handlers.auth.handle(json!({
            "action": "register", "userName": "alice", "password": "secret1",
        }));
        assert!(!is_success(&dup));

        let weak = handlers.auth.handle(json!({
            "action": "register", "userName": "bob", "password": "short",
        }));
        assert!(!is_success(&weak));
    }

    #[test]
    fn login_rejects_bad_credentials() {
        let handlers = handlers();
        register(&handlers, "alice");

        let wrong = handlers.auth.handle(json!({
            "action": "login", "userName": "alice", "password": "wrong-pass",
        }));
        assert!(!is_success(&wrong));
        assert_eq!(wrong["message"], "wrong password");

        let unknown = handlers.auth.handle(json!({
            "action": "login", "userName": "nobody", "password": "secret1",
        }));
        assert!(!is_success(&unknown));
    }

    #[test]
    fn ssafy_login_creates_account_on_first_use() {
        let handlers = handlers();
        let first = handlers.auth.handle(json!({
            "action": "SSAFYlogin", "userName": "carol", "password": "secret1",
        }));
        assert!(is_success(&first));
        assert_eq!(first["action"], "login");

        let again = handlers.auth.handle(json!({
            "action": "SSAFYlogin", "userName": "carol", "password": "secret1",
        }));
        assert!(is_success(&again));
        assert_eq!(again["userId"], first["userId"]);
    }

    #[test]
    fn nickname_update_validates_and_persists() {
        let handlers = handlers();
        let user_id = register(&handlers, "alice");

        let bad = handlers.auth.handle(json!({
            "action": "updateNickName", "userId": user_id, "nickName": "no spaces!",
        }));
        assert!(!is_success(&bad));

        let ok = handlers.auth.handle(json!({
            "action": "updateNickName", "userId": user_id, "nickName": "Ace",
        }));
        assert!(is_success(&ok));

        let login = handlers.auth.handle(json!({
            "action": "login", "userName": "alice", "password": "secret1",
        }));
        assert_eq!(login["nickName"], "Ace");
    }

    #[test]
    fn room_lifecycle() {
        let handlers = handlers();
        let host = register(&handlers, "host");
        let guest = register(&handlers, "guest");

        let created = handlers.room.handle(json!({
            "action": "createRoom", "userId": host, "roomName": "Room1", "maxPlayers": 2,
        }));
        assert!(is_success(&created));
        let room_id = created["roomId"].as_i64().unwrap();
        assert_eq!(created["ipAddress"], "127.0.0.1");
        assert!(created["port"].as_u64().is_some());

        let listed = handlers.room.handle(json!({"action": "listRooms"}));
        assert_eq!(listed["rooms"][0]["roomId"].as_i64(), Some(room_id));
        assert_eq!(listed["rooms"][0]["currentPlayers"], 1);

        let joined = handlers.room.handle(json!({
            "action": "joinRoom", "userId": guest, "roomId": room_id,
        }));
        assert!(is_success(&joined));

        // Room is now full.
        let third = register(&handlers, "third");
        let full = handlers.room.handle(json!({
            "action": "joinRoom", "userId": third, "roomId": room_id,
        }));
        assert!(!is_success(&full));

        let left = handlers.room.handle(json!({"action": "exitRoom", "userId": guest}));
        assert!(is_success(&left));
        let left_again = handlers.room.handle(json!({"action": "exitRoom", "userId": guest}));
        assert!(!is_success(&left_again));
    }

    #[test]
    fn create_room_validates_inputs() {
        let handlers = handlers();
        let host = register(&handlers, "host");

        let bad_name = handlers.room.handle(json!({
            "action": "createRoom", "userId": host, "roomName": "bad!name", "maxPlayers": 4,
        }));
        assert!(!is_success(&bad_name));

        let bad_size = handlers.room.handle(json!({
            "action": "createRoom", "userId": host, "roomName": "Room1", "maxPlayers": 9,
        }));
        assert!(!is_success(&bad_size));

        let ok = handlers.room.handle(json!({
            "action": "createRoom", "userId": host, "roomName": "Room1", "maxPlayers": 4,
        }));
        assert!(is_success(&ok));

        let twice = handlers.room.handle(json!({
            "action": "createRoom", "userId": host, "roomName": "Room2", "maxPlayers": 4,
        }));
        assert!(!is_success(&twice));
        assert_eq!(twice["message"], "already in a room");
    }

    #[test]
    fn room_ports_are_a_finite_pool() {
        let handlers = handlers();
        let mut hosts = Vec::new();
        for i in 0..2 {
            let host = register(&handlers, &format!("host{}", i));
            let resp = handlers.room.handle(json!({
                "action": "createRoom", "userId": host, "roomName": "Room", "maxPlayers": 4,
            }));
            assert!(is_success(&resp));
            hosts.push(host);
        }
        let extra = register(&handlers, "extra");
        let resp = handlers.room.handle(json!({
            "action": "createRoom", "userId": extra, "roomName": "Room", "maxPlayers": 4,
        }));
        assert!(!is_success(&resp));
        assert_eq!(resp["message"], "no game server slot available");

        // Emptying a room returns its port to the pool.
        let exit = handlers.room.handle(json!({"action": "exitRoom", "userId": hosts[0]}));
        assert!(is_success(&exit));
        let retry = handlers.room.handle(json!({
            "action": "createRoom", "userId": extra, "roomName": "Room", "maxPlayers": 4,
        }));
        assert!(is_success(&retry));
    }

    #[test]
    fn game_start_and_end_flip_room_state() {
        let handlers = handlers();
        let host = register(&handlers, "host");
        let guest = register(&handlers, "guest");
        let created = handlers.room.handle(json!({
            "action": "createRoom", "userId": host, "roomName": "Room1", "maxPlayers": 4,
        }));
        let room_id = created["roomId"].as_i64().unwrap();
        handlers.room.handle(json!({
            "action": "joinRoom", "userId": guest, "roomId": room_id,
        }));

        let started = handlers.game.handle(json!({"action": "gameStart", "roomId": room_id}));
        assert!(is_success(&started));
        let game_id = started["gameId"].as_i64().unwrap();
        let users: Vec<i64> = started["users"]
            .as_array()
            .unwrap()
            .iter()
            .map(|u| u.as_i64().unwrap())
            .collect();
        assert!(users.contains(&host) && users.contains(&guest));

        // An in-progress room accepts no joins and is not listed.
        let third = register(&handlers, "third");
        let join = handlers.room.handle(json!({
            "action": "joinRoom", "userId": third, "roomId": room_id,
        }));
        assert!(!is_success(&join));
        let listed = handlers.room.handle(json!({"action": "listRooms"}));
        assert!(listed["rooms"].as_array().unwrap().is_empty());

        let again = handlers.game.handle(json!({"action": "gameStart", "roomId": room_id}));
        assert!(!is_success(&again));

        let ended = handlers.game.handle(json!({"action": "gameEnd", "gameId": game_id}));
        assert!(is_success(&ended));
        assert_eq!(ended["roomId"].as_i64(), Some(room_id));

        let ended_twice = handlers.game.handle(json!({"action": "gameEnd", "gameId": game_id}));
        assert!(!is_success(&ended_twice));
    }
}
