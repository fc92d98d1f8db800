//! DocBot client library — session management, backend gateway, and the
//! conversation controller shared by the CLI.

pub mod auth;
pub mod backend;
pub mod config;
pub mod controller;
pub mod health;
pub mod simulate;
pub mod transcript;
