//! # Matchmaking Server Library
//!
//! This library implements the central session server for the multiplayer
//! game: clients connect over a single persistent TCP socket, handshake,
//! authenticate and manage rooms, while per-room "mirror" processes hold
//! privileged connections that relay game lifecycle events back into the
//! lobby.
//!
//! ## Core Responsibilities
//!
//! ### Connection Multiplexing
//! One socket per client carries a strictly sequential request/response
//! protocol of newline-delimited JSON frames. Each connection is driven by
//! its own read task; responses and server pushes go out through a
//! dedicated writer task, so no connection can stall another.
//!
//! ### Session Bookkeeping
//! A process-wide registry maps session tokens, user ids, mirror ports and
//! source addresses to live sessions, holding only weak references. It
//! enforces one live session per authenticated user and self-heals stale
//! entries left behind by crashed connections.
//!
//! ### Supervision and Broadcast
//! A liveness timer reaps sessions idle past the configured timeout, and a
//! broadcast timer pushes the concurrent-user snapshot to every waiting
//! player; login and chat events trigger additional broadcasts.
//!
//! ## Module Organization
//!
//! - [`session`]: per-connection state, covering the role (anonymous,
//!   player or mirror), token, activity clock and outbound frame queue.
//! - [`registry`]: the cross-session indexes and their consistency rules.
//! - [`router`]: action-string classification and per-group
//!   preconditions.
//! - [`handlers`]: the opaque domain-handler contract plus the in-memory
//!   auth/room/game implementations behind it.
//! - [`network`]: TCP transport, the connection state machine, both
//!   recurring timers and server shutdown.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::{MatchServer, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = MatchServer::bind(ServerConfig::default()).await?;
//!
//!     // Accepts connections, supervises session liveness and broadcasts
//!     // the concurrent-user list until stop() is called.
//!     server.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! Transport failures are fatal to their connection and funnel into a
//! single idempotent teardown path; protocol and authorization errors are
//! answered with structured error frames and leave the connection open.
//! Nothing a handler returns can escape the dispatch boundary and crash a
//! connection task.

pub mod handlers;
pub mod network;
pub mod registry;
pub mod router;
pub mod session;
