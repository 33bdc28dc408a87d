//! Session module - conversational session lifecycle
//!
//! This module provides session management for Agentry, including:
//! - Session identity ([`SessionKey`]) and records ([`Session`])
//! - Two interchangeable stores: in-memory and file-backed
//! - [`SessionManager`] with idempotent `ensure_exists`
//! - [`SessionServiceFactory`] choosing the store per agent
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use agentry::session::{InMemorySessionStore, SessionManager};
//!
//! # tokio_test::block_on(async {
//! let manager = SessionManager::new(Arc::new(InMemorySessionStore::new()), "EchoAgent");
//! manager.ensure_exists("u1", "s1").await.unwrap();
//! manager.ensure_exists("u1", "s1").await.unwrap();
//! assert_eq!(manager.list().await.unwrap().len(), 1);
//! # });
//! ```

pub mod factory;
pub mod manager;
pub mod store;
pub mod types;

pub use factory::SessionServiceFactory;
pub use manager::SessionManager;
pub use store::{FileSessionStore, InMemorySessionStore, SessionStore};
pub use types::{Session, SessionKey};
