//! Route gating as a pure decision function.
//!
//! [`decide`] is a total classification over the observable snapshot fields.
//! It never navigates; callers subscribe to snapshot changes and perform the
//! redirect themselves. A new decision is produced on every state change, so
//! [`RouteDecision::ShowLoading`] is terminal only for the current render.

use serde::Serialize;

use crate::types::SessionSnapshot;

/// What the view layer should do with a requested path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum RouteDecision {
    /// Session resolution is still in flight; render a loading state.
    ShowLoading,
    /// No authenticated identity; `return_to` is the path to resume after login.
    RedirectToLogin { return_to: String },
    /// Identity present but no completed profile; finish onboarding first.
    RedirectToOnboarding { return_to: String },
    /// Render the requested view.
    Allow,
}

/// Classifies the current session state for a requested path.
///
/// An identity without a completed profile row (missing or
/// `profile_completed = false`) is routed to onboarding; a freshly
/// auto-created default row therefore still gates.
pub fn decide(snapshot: &SessionSnapshot, requested_path: &str) -> RouteDecision {
    match (snapshot.loading, &snapshot.identity, &snapshot.profile) {
        (true, _, _) => RouteDecision::ShowLoading,
        (false, None, _) => RouteDecision::RedirectToLogin {
            return_to: requested_path.to_string(),
        },
        (false, Some(_), Some(profile)) if profile.profile_completed => RouteDecision::Allow,
        (false, Some(_), _) => RouteDecision::RedirectToOnboarding {
            return_to: requested_path.to_string(),
        },
    }
}
