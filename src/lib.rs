pub mod auth;
pub mod cli;
pub mod config;
pub mod devserver;
pub mod error;
pub mod profile;
pub mod session;
