//! Library crate for quizbot, exposing the engine for the binary and integration tests.

pub mod bank;
pub mod config;
pub mod dto;
pub mod error;
pub mod messages;
pub mod players;
pub mod services;
pub mod state;
pub mod store;
