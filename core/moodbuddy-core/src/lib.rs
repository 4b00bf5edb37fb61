//! # moodbuddy-core
//!
//! Core library for MoodBuddy, providing the session, profile, and
//! route-gating logic shared by all clients (web shell, TUI, tests).
//!
//! ## Design Principles
//!
//! - **Synchronous**: No async runtime dependency. Clients can wrap with async if needed.
//! - **Not thread-safe**: Clients provide their own synchronization (`Mutex`, `RwLock`).
//! - **Explicit lifecycle**: The session store is constructed and shut down
//!   explicitly; there is no global singleton. After [`SessionStore::shutdown`]
//!   every late async result is discarded rather than applied.
//! - **Pure routing policy**: [`session::guard::decide`] classifies session state
//!   into a route decision; performing the actual navigation is the caller's job.
//! - **Nothing is fatal**: every failure path settles the store at
//!   `loading = false` with well-defined identity/profile values.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use moodbuddy_core::{SessionStore, decide};
//!
//! let mut store = SessionStore::new(backend, rows);
//! store.initialize();
//! let decision = decide(&store.snapshot(), "/dashboard");
//! ```

// Public modules
pub mod backend;
pub mod config;
pub mod error;
pub mod session;
pub mod stubs;
pub mod types;

// Re-export commonly used items at crate root
pub use backend::{AuthEvent, CredentialBackend, ProfileRows};
pub use config::SessionConfig;
pub use error::{AuthError, Result, StoreError};
pub use session::guard::{decide, RouteDecision};
pub use session::reconciler::resolve_profile;
pub use session::store::SessionStore;
pub use types::*;
