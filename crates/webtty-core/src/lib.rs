//! webtty-core: shared library for the webtty session broker.
//!
//! Provides the error taxonomy, per-run access tokens, shell profiles and
//! their resolution into process invocations, terminal themes, browser
//! client settings and terminal geometry.

pub mod client;
pub mod error;
pub mod geometry;
pub mod profile;
pub mod theme;
pub mod token;

// Re-export commonly used items at crate root.
pub use client::ClientConfig;
pub use error::{WebttyError, WebttyResult};
pub use geometry::Geometry;
pub use profile::{join_words, CommandLine, Profile, Profiles, DEFAULT_PROFILE};
pub use theme::{Theme, ThemeKeyIssue};
pub use token::{generate_token, AccessToken, TOKEN_LENGTH};
