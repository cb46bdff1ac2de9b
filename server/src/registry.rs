//! Session registry and cross-session indexes for the matchmaking server
//!
//! This module handles the server-wide bookkeeping of live connections:
//! - Token-to-session resolution for request authentication
//! - User-to-token mapping enforcing one live session per user
//! - Mirror-port indexing for room-authority connections
//! - Source-address tracking for the single-connection-per-address policy
//!
//! The registry never owns a session: it stores weak references and the
//! connection's own tasks hold the strong ones, so a session that dies
//! without deregistering shows up as a resolvable-to-nothing entry that is
//! purged lazily on the next lookup or sweep.

use crate::session::{PlayerStatus, Session};
use log::{debug, info};
use shared::UserEntry;
use std::collections::{HashMap, HashSet};
use std::net::IpAddr;
use std::sync::{Arc, Weak};
use std::time::Duration;
use uuid::Uuid;

/// Process-wide index of live sessions.
///
/// All methods take `&mut self` (or `&self` for pure reads); the server
/// wraps the registry in `Arc<RwLock<..>>`, which serializes every
/// cross-map operation and keeps the maps mutually consistent without any
/// internal lock ordering concerns.
#[derive(Default)]
pub struct SessionRegistry {
    /// Live sessions indexed by their opaque token.
    sessions: HashMap<String, Weak<Session>>,
    /// Token currently held by each logged-in user.
    tokens: HashMap<i64, String>,
    /// Mirror sessions indexed by the game port they serve.
    mirrors: HashMap<u16, Weak<Session>>,
    /// Source addresses with a connection slot in use.
    connected_addrs: HashSet<IpAddr>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a session under a freshly generated token.
    ///
    /// If this same session was already registered under another token
    /// (a re-login on a live connection), the old mapping is evicted
    /// first, so a session holds at most one token at a time. When the
    /// session carries a logged-in identity the user index is updated to
    /// point at the new token. The token is also stored on the session.
    pub fn register(&mut self, session: &Arc<Session>) -> String {
        let weak = Arc::downgrade(session);

        let prior = self
            .sessions
            .iter()
            .find(|(_, w)| w.ptr_eq(&weak))
            .map(|(token, _)| token.clone());
        if let Some(old_token) = prior {
            info!("evicting previous token {} before re-registration", old_token);
            self.sessions.remove(&old_token);
            self.tokens.retain(|_, token| *token != old_token);
        }

        let token = Uuid::new_v4().to_string();
        self.sessions.insert(token.clone(), weak);
        if let Some(user_id) = session.user_id() {
            info!("user {} bound to session token {}", user_id, token);
            self.tokens.insert(user_id, token.clone());
        }
        session.set_token(Some(token.clone()));
        token
    }

    /// Registers a mirror session under its game port, evicting any entry
    /// the same session held before (a mirror re-announcing itself).
    pub fn register_mirror(&mut self, session: &Arc<Session>, port: u16) {
        let weak = Arc::downgrade(session);
        let prior = self
            .mirrors
            .iter()
            .find(|(_, w)| w.ptr_eq(&weak))
            .map(|(port, _)| *port);
        if let Some(old_port) = prior {
            info!("mirror re-registering, dropping old port {}", old_port);
            self.mirrors.remove(&old_port);
        }
        self.mirrors.insert(port, weak);
        info!("mirror session registered for port {}", port);
    }

    /// Resolves a token to a live session.
    ///
    /// A token whose session is already gone is treated as absent and the
    /// stale entry is purged as a side effect, never reported as an error.
    pub fn lookup(&mut self, token: &str) -> Option<Arc<Session>> {
        match self.sessions.get(token).and_then(Weak::upgrade) {
            Some(session) => Some(session),
            None => {
                if self.sessions.remove(token).is_some() {
                    debug!("purged stale session entry for token {}", token);
                    self.tokens.retain(|_, t| *t != token);
                }
                None
            }
        }
    }

    /// Resolves a mirror port to a live session, purging stale entries.
    pub fn lookup_mirror(&mut self, port: u16) -> Option<Arc<Session>> {
        match self.mirrors.get(&port).and_then(Weak::upgrade) {
            Some(session) => Some(session),
            None => {
                if self.mirrors.remove(&port).is_some() {
                    debug!("purged stale mirror entry for port {}", port);
                }
                None
            }
        }
    }

    /// Resolves a user id to their current live session, if any.
    pub fn lookup_user(&mut self, user_id: i64) -> Option<Arc<Session>> {
        let token = self.tokens.get(&user_id)?.clone();
        self.lookup(&token)
    }

    /// Removes a token and, when it still points at this token, the user
    /// mapping. Absent entries are a no-op, so the call is idempotent and
    /// a teardown racing a newer login cannot unbind the newer session.
    pub fn remove(&mut self, token: &str, user_id: Option<i64>) {
        let removed = self.sessions.remove(token).is_some();
        if let Some(user_id) = user_id {
            if self.tokens.get(&user_id).map(String::as_str) == Some(token) {
                self.tokens.remove(&user_id);
            }
        }
        if removed {
            info!("session token {} removed", token);
        }
    }

    /// Removes a mirror entry, but only while it still belongs to this
    /// session (or is already dead); a replacement mirror on the same
    /// port is left untouched. Idempotent.
    pub fn remove_mirror(&mut self, port: u16, session: &Arc<Session>) {
        let weak = Arc::downgrade(session);
        let owned = match self.mirrors.get(&port) {
            Some(w) => w.ptr_eq(&weak) || w.upgrade().is_none(),
            None => return,
        };
        if owned {
            self.mirrors.remove(&port);
            info!("mirror session for port {} removed", port);
        }
    }

    pub fn is_logged_in(&self, user_id: i64) -> bool {
        self.tokens.contains_key(&user_id)
    }

    /// Concurrent-user count (CCU). Counts registered entries, matching
    /// what the sweep has not yet purged.
    pub fn count_sessions(&self) -> usize {
        self.sessions.len()
    }

    /// Number of connected mirrors, which bounds how many rooms can run.
    pub fn count_mirrors(&self) -> usize {
        self.mirrors.len()
    }

    /// Snapshot of logged-in sessions currently in the waiting state; the
    /// recipient set for every broadcast.
    pub fn waiting_sessions(&self) -> Vec<Arc<Session>> {
        self.sessions
            .values()
            .filter_map(Weak::upgrade)
            .filter(|s| s.status() == Some(PlayerStatus::Waiting))
            .collect()
    }

    /// (nickname, status) rows for every logged-in player, the payload of
    /// the periodic concurrent-user broadcast.
    pub fn player_snapshot(&self) -> Vec<UserEntry> {
        self.sessions
            .values()
            .filter_map(Weak::upgrade)
            .filter_map(|s| s.user_entry())
            .collect()
    }

    /// Flips the listed users between in-game and waiting when a mirror
    /// reports a game starting or ending.
    pub fn set_users_status(&self, user_ids: &[i64], in_game: bool) {
        let status = if in_game {
            PlayerStatus::InGame
        } else {
            PlayerStatus::Waiting
        };
        for user_id in user_ids {
            let session = self
                .tokens
                .get(user_id)
                .and_then(|token| self.sessions.get(token))
                .and_then(Weak::upgrade);
            if let Some(session) = session {
                session.set_status(status);
            }
        }
    }

    /// Every live session, mirrors included; used to fan out teardown at
    /// server shutdown.
    pub fn all_sessions(&self) -> Vec<Arc<Session>> {
        self.sessions
            .values()
            .chain(self.mirrors.values())
            .filter_map(Weak::upgrade)
            .collect()
    }

    /// Claims the connection slot for a source address. Returns false when
    /// the address already has a live connection.
    pub fn allow_connection(&mut self, addr: IpAddr) -> bool {
        self.connected_addrs.insert(addr)
    }

    /// Releases a source address's connection slot. Idempotent.
    pub fn release_connection(&mut self, addr: &IpAddr) {
        self.connected_addrs.remove(addr);
    }

    /// One supervisor pass: purges entries whose session is gone and
    /// returns the still-live sessions that have been idle longer than
    /// `timeout`, already deregistered, for the caller to tear down.
    pub fn sweep(&mut self, timeout: Duration) -> Vec<Arc<Session>> {
        let mut stale = Vec::new();
        let mut expired = Vec::new();
        for (token, weak) in &self.sessions {
            match weak.upgrade() {
                None => stale.push(token.clone()),
                Some(session) if !session.is_active(timeout) => {
                    expired.push((token.clone(), session));
                }
                Some(_) => {}
            }
        }

        for token in stale {
            info!("session {} already gone, purging", token);
            self.sessions.remove(&token);
            self.tokens.retain(|_, t| *t != token);
        }
        for (token, session) in &expired {
            info!("session {} idle past {:?}, scheduling teardown", token, timeout);
            self.remove(token, session.user_id());
        }
        expired.into_iter().map(|(_, session)| session).collect()
    }
}

/// Test suite for registry bookkeeping: registration and eviction, stale
/// entry self-healing, idempotent removal, the address policy and the
/// supervisor sweep.
#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn test_session(port: u16) -> Arc<Session> {
        let (tx, _rx) = mpsc::unbounded_channel();
        let addr = format!("127.0.0.1:{}", port).parse().unwrap();
        let (session, _closed) = Session::new(addr, tx);
        session
    }

    fn logged_in_session(port: u16, user_id: i64, nick: &str) -> Arc<Session> {
        let session = test_session(port);
        session.adopt_player(user_id, nick, nick);
        session
    }

    #[test]
    fn register_assigns_token_and_binds_user() {
        let mut registry = SessionRegistry::new();
        let session = logged_in_session(40001, 7, "alice");

        let token = registry.register(&session);
        assert_eq!(session.token(), Some(token.clone()));
        assert!(registry.is_logged_in(7));
        assert!(registry.lookup(&token).is_some());
        assert_eq!(registry.count_sessions(), 1);
    }

    #[test]
    fn reregistration_evicts_previous_token() {
        let mut registry = SessionRegistry::new();
        let session = logged_in_session(40001, 7, "alice");

        let first = registry.register(&session);
        let second = registry.register(&session);
        assert_ne!(first, second);
        assert!(registry.lookup(&first).is_none());
        assert!(registry.lookup(&second).is_some());
        assert_eq!(registry.count_sessions(), 1);
        assert!(registry.is_logged_in(7));
    }

    #[test]
    fn anonymous_registration_does_not_bind_a_user() {
        let mut registry = SessionRegistry::new();
        let session = test_session(40001);
        let token = registry.register(&session);
        assert!(registry.lookup(&token).is_some());
        assert!(registry.tokens.is_empty());
    }

    #[test]
    fn lookup_purges_stale_entry_without_touching_others() {
        let mut registry = SessionRegistry::new();
        let dead = logged_in_session(40001, 1, "gone");
        let live = logged_in_session(40002, 2, "here");

        let dead_token = registry.register(&dead);
        let live_token = registry.register(&live);
        drop(dead); // simulated crash: no deregistration

        assert!(registry.lookup(&dead_token).is_none());
        assert!(!registry.is_logged_in(1));
        assert!(registry.lookup(&live_token).is_some());
        assert!(registry.is_logged_in(2));
        assert_eq!(registry.count_sessions(), 1);
    }

    #[test]
    fn remove_is_idempotent() {
        let mut registry = SessionRegistry::new();
        let session = logged_in_session(40001, 7, "alice");
        let token = registry.register(&session);

        registry.remove(&token, Some(7));
        assert!(!registry.is_logged_in(7));
        assert_eq!(registry.count_sessions(), 0);
        // Second call with the same arguments is a no-op.
        registry.remove(&token, Some(7));
        assert_eq!(registry.count_sessions(), 0);
    }

    #[test]
    fn remove_with_stale_token_keeps_newer_binding() {
        let mut registry = SessionRegistry::new();
        let old = logged_in_session(40001, 7, "alice");
        let new = logged_in_session(40002, 7, "alice");

        let old_token = registry.register(&old);
        let new_token = registry.register(&new);
        // The old session tears down late; the user index must keep
        // pointing at the newer login.
        registry.remove(&old_token, Some(7));
        assert!(registry.is_logged_in(7));
        assert!(registry.lookup(&new_token).is_some());
    }

    #[test]
    fn mirror_register_lookup_remove() {
        let mut registry = SessionRegistry::new();
        let mirror = test_session(40001);
        mirror.make_mirror(9101);

        registry.register_mirror(&mirror, 9101);
        assert_eq!(registry.count_mirrors(), 1);
        assert!(registry.lookup_mirror(9101).is_some());
        assert!(registry.lookup_mirror(9999).is_none());

        registry.remove_mirror(9101, &mirror);
        assert_eq!(registry.count_mirrors(), 0);
        registry.remove_mirror(9101, &mirror); // idempotent
    }

    #[test]
    fn mirror_removal_spares_replacement_on_same_port() {
        let mut registry = SessionRegistry::new();
        let old = test_session(40001);
        let new = test_session(40002);
        old.make_mirror(9101);
        new.make_mirror(9101);

        registry.register_mirror(&old, 9101);
        registry.register_mirror(&new, 9101);
        registry.remove_mirror(9101, &old);
        assert!(registry.lookup_mirror(9101).is_some());
    }

    #[test]
    fn stale_mirror_lookup_self_heals() {
        let mut registry = SessionRegistry::new();
        let mirror = test_session(40001);
        mirror.make_mirror(9101);
        registry.register_mirror(&mirror, 9101);
        drop(mirror);

        assert!(registry.lookup_mirror(9101).is_none());
        assert_eq!(registry.count_mirrors(), 0);
    }

    #[test]
    fn lookup_user_follows_the_token_index() {
        let mut registry = SessionRegistry::new();
        let session = logged_in_session(40001, 7, "alice");
        registry.register(&session);

        let found = registry.lookup_user(7).unwrap();
        assert!(Arc::ptr_eq(&found, &session));
        assert!(registry.lookup_user(8).is_none());
    }

    #[test]
    fn waiting_sessions_excludes_busy_anonymous_and_mirrors() {
        let mut registry = SessionRegistry::new();
        let waiting = logged_in_session(40001, 1, "a");
        let in_room = logged_in_session(40002, 2, "b");
        in_room.set_status(PlayerStatus::InRoom(3));
        let anonymous = test_session(40003);
        let mirror = test_session(40004);
        mirror.make_mirror(9101);

        registry.register(&waiting);
        registry.register(&in_room);
        registry.register(&anonymous);
        registry.register_mirror(&mirror, 9101);

        let recipients = registry.waiting_sessions();
        assert_eq!(recipients.len(), 1);
        assert!(Arc::ptr_eq(&recipients[0], &waiting));

        // The snapshot payload still lists every logged-in player.
        let snapshot = registry.player_snapshot();
        assert_eq!(snapshot.len(), 2);
    }

    #[test]
    fn set_users_status_flips_listed_players() {
        let mut registry = SessionRegistry::new();
        let a = logged_in_session(40001, 1, "a");
        let b = logged_in_session(40002, 2, "b");
        registry.register(&a);
        registry.register(&b);

        registry.set_users_status(&[1, 2], true);
        assert_eq!(a.status(), Some(PlayerStatus::InGame));
        assert_eq!(b.status(), Some(PlayerStatus::InGame));

        registry.set_users_status(&[1], false);
        assert_eq!(a.status(), Some(PlayerStatus::Waiting));
        assert_eq!(b.status(), Some(PlayerStatus::InGame));
    }

    #[test]
    fn connection_slot_per_address() {
        let mut registry = SessionRegistry::new();
        let addr: IpAddr = "10.0.0.1".parse().unwrap();

        assert!(registry.allow_connection(addr));
        assert!(!registry.allow_connection(addr));
        registry.release_connection(&addr);
        assert!(registry.allow_connection(addr));
        // Releasing twice is harmless.
        registry.release_connection(&addr);
        registry.release_connection(&addr);
    }

    #[test]
    fn sweep_purges_dead_and_deregisters_expired() {
        let mut registry = SessionRegistry::new();
        let dead = logged_in_session(40001, 1, "dead");
        let idle = logged_in_session(40002, 2, "idle");
        registry.register(&dead);
        registry.register(&idle);
        drop(dead);

        // Zero timeout makes every live session count as idle.
        let expired = registry.sweep(Duration::ZERO);
        assert_eq!(expired.len(), 1);
        assert!(Arc::ptr_eq(&expired[0], &idle));
        assert_eq!(registry.count_sessions(), 0);
        assert!(!registry.is_logged_in(1));
        assert!(!registry.is_logged_in(2));
        assert!(registry.waiting_sessions().is_empty());
    }

    #[test]
    fn sweep_keeps_active_sessions() {
        let mut registry = SessionRegistry::new();
        let session = logged_in_session(40001, 1, "live");
        let token = registry.register(&session);
        session.touch();

        let expired = registry.sweep(Duration::from_secs(60));
        assert!(expired.is_empty());
        assert!(registry.lookup(&token).is_some());
    }
}
