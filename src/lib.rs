//! Peer presence and media session synchronization engine.
//!
//! ARCHITECTURE
//! ============
//! Each participant runs one [`session`] loop. It discovers peers through a
//! [`transport`], negotiates a direct media connection to every one of them
//! (full mesh), replicates presence and whiteboard state with idempotent
//! merges, and infers which inbound stream is a camera and which a screen
//! share. There is no authority beyond the thin signaling relay.
//!
//! ```text
//! user command ─► session ─► presence store ─► outbox ─► transport ─► peers
//!                    │                                        │
//!                    └─► connection manager ◄── signals ◄─────┘
//!                              │
//!                              └─► inbound tracks ─► stream classifier
//! ```
//!
//! Media capture and the media connections themselves sit behind the
//! [`media::MediaDevices`] and [`peer::PeerConnector`] traits; [`synthetic`]
//! provides codec-free implementations of both.

pub mod config;
pub mod ids;
pub mod media;
pub mod peer;
pub mod protocol;
pub mod services;
pub mod session;
pub mod state;
pub mod synthetic;
pub mod transport;

pub use config::SessionConfig;
pub use ids::{DeskItemId, ElementId, PeerId, RoomId, StreamId};
pub use session::{Command, Profile, RoomView, SessionError, SessionHandle, SessionStatus, join};
pub use state::{DeskItem, DeskItemKind, PresenceRecord, WhiteboardAction, WhiteboardElement};
pub use transport::{LocalHub, RelayTransport, Transport, TransportError};
