//! Engine components driven by the session loop.
//!
//! ARCHITECTURE
//! ============
//! Every service here is plain state plus methods; none of them owns a
//! task except the per-peer connection workers and the debounce timers.
//! The session controller is the only caller and the only owner.

pub mod classifier;
pub mod connection;
pub mod debounce;
pub mod presence;
pub mod speaking;
pub mod whiteboard;
