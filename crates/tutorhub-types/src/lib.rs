//! TutorHub Types - Shared domain types
//!
//! This crate contains the domain vocabulary of tutor subscription billing:
//! - Identifiers for tutors, plans and subscriptions
//! - Plan catalog entries and their validation rules
//! - Subscription status, billing cycle and payment order ids
//! - Lifecycle events and payment webhook payloads
//! - Pagination for list queries

pub mod error;
pub mod event;
pub mod ids;
pub mod pagination;
pub mod payment;
pub mod plan;
pub mod subscription;

pub use error::*;
pub use event::*;
pub use ids::*;
pub use pagination::*;
pub use payment::*;
pub use plan::*;
pub use subscription::*;
