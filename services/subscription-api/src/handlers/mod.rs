//! REST API handlers

pub mod admin;
pub mod health;
pub mod plans;
pub mod shared;
pub mod subscriptions;
pub mod webhook;

pub use admin::*;
pub use health::*;
pub use plans::*;
pub use subscriptions::*;
pub use webhook::*;
