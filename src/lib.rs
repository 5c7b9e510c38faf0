//! # Picker Proxy Library
//!
//! OAuth session broker and server-side proxy for the Google Photos Picker
//! and Google Drive APIs, plus the client-side controller used by the
//! `picker-client` binary.

pub mod client;
pub mod config;
pub mod error;
pub mod google;
pub mod handlers;
pub mod models;
pub mod oauth;
pub mod proxy;
pub mod server;
pub mod session;
pub mod telemetry;
