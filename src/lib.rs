// Public API for integration tests and potential library usage

pub mod api;
pub mod auth;
pub mod config;
pub mod engine;
pub mod error;
pub mod projector;
pub mod protocol;
pub mod session;
pub mod state;
pub mod types;
pub mod ws;

// Re-export broadcast for testing
pub mod broadcast;
