//! Session/identity context: who is signed in, with which role.

pub mod context;
pub mod navigator;
pub mod state;
pub mod validate;

#[cfg(test)]
pub(crate) mod testing;

pub use context::{MountedSession, SessionContext, SignUpRequest};
pub use navigator::{Navigator, RecordingNavigator, Routes, TracingNavigator};
pub use state::SessionState;
