//! Domain services used by the websocket route.
//!
//! ARCHITECTURE
//! ============
//! Service modules own membership and delivery so route handlers can stay
//! focused on protocol translation.

pub mod room;
