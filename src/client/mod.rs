//! Command-line client for the upload API.
//!
//! The server is stateless; everything a user "sees" between requests, such
//! as the selected knowledge base or the optimistic status of a fresh
//! upload, lives here.

pub mod api_client;
pub mod commands;
pub mod poller;
pub mod selection;
pub mod tracker;
