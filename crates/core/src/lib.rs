//! Functional core for socialgate.
//!
//! Pure types and functions shared by the HTTP layer. Nothing in here performs
//! I/O; network calls and storage live in `socialgate_auth`.

pub mod auth;
