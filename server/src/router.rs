//! Maps request action strings to their capability group and the
//! preconditions a session must meet before the request reaches a handler.

/// Domain handler group a request is dispatched to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerGroup {
    Auth,
    Room,
    Game,
}

impl HandlerGroup {
    /// Whether the caller must be logged in.
    pub fn requires_auth(self) -> bool {
        matches!(self, HandlerGroup::Room)
    }

    /// Whether the caller must be a mirror connection.
    pub fn requires_mirror(self) -> bool {
        matches!(self, HandlerGroup::Game)
    }
}

/// Actions the session layer answers itself, without a domain handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalAction {
    AlivePing,
    Logout,
    RoomCapacity,
    Ccu,
    Chat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Domain(HandlerGroup),
    Local(LocalAction),
    Unknown,
}

/// Classifies an action string. Unknown actions are reported back to the
/// client as errors; they never close the connection.
pub fn route(action: &str) -> Route {
    match action {
        "register" | "login" | "SSAFYlogin" | "updateNickName" => {
            Route::Domain(HandlerGroup::Auth)
        }
        "createRoom" | "joinRoom" | "exitRoom" | "listRooms" => Route::Domain(HandlerGroup::Room),
        "gameStart" | "gameEnd" => Route::Domain(HandlerGroup::Game),
        "alivePing" => Route::Local(LocalAction::AlivePing),
        "logout" => Route::Local(LocalAction::Logout),
        "roomCapacity" => Route::Local(LocalAction::RoomCapacity),
        "CCU" => Route::Local(LocalAction::Ccu),
        "chat" => Route::Local(LocalAction::Chat),
        _ => Route::Unknown,
    }
}
