//! Mock identity provider for development and testing.
//!
//! Serves stand-ins for the Google, Meta and Apple authorization, token and
//! profile endpoints so complete logins can run without real credentials.

mod server;
mod templates;

pub use server::{endpoints, MockCode, MockIdpServer};
