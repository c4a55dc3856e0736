//! Terminal sessions: pty launching and the WebSocket relay.

pub mod pty;
pub mod relay;
