//! Session lifecycle: store, profile reconciliation, and route gating.
//!
//! Data flow: credential backend → [`store::SessionStore`] →
//! [`reconciler::resolve_profile`] on identity change → updated snapshot →
//! [`guard::decide`] → view layer.

pub mod guard;
pub mod reconciler;
pub mod store;

pub use guard::{decide, RouteDecision};
pub use reconciler::resolve_profile;
pub use store::SessionStore;
