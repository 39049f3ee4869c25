//! TutorHub DB - Persistence for plans, subscriptions and their event log
//!
//! SQLx/PostgreSQL repositories plus an in-memory backend with the same
//! atomicity guarantees.
//!
//! # Example
//!
//! ```rust,ignore
//! use tutorhub_db::{create_pool, run_migrations, Repositories};
//!
//! let pool = create_pool("postgres://localhost/tutorhub").await?;
//! run_migrations(&pool).await?;
//! let repos = Repositories::new(pool);
//!
//! let current = repos.subscriptions.find_by_tutor_id(TutorId(7)).await?;
//! ```

pub mod error;
pub mod memory;
pub mod models;
pub mod pg;
pub mod pool;
pub mod repo;

pub use error::{DbError, DbResult};
pub use memory::MemoryStore;
pub use pg::Repositories;
pub use pool::{create_pool, run_migrations, DbPool};
pub use repo::*;
