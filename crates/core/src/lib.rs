//! Entity model, push-message contract and reconciliation store for the
//! event-management client.

pub mod auth;
pub mod events;
pub mod model;
pub mod store;
