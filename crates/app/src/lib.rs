//! Headless events client: keeps one events view in sync with the backend
//! and serves its state over a small local HTTP API.

pub mod config;
pub mod error;
pub mod middleware;
pub mod rest;
pub mod routes;
pub mod state;
pub mod view;
