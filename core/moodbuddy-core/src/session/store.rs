//! In-memory session state, kept synchronized with the credential backend.
//!
//! The store owns the `{identity, profile, loading, error}` tuple that the
//! route guard and view layer observe. All mutations happen on the caller's
//! thread, either through an explicit call (`sign_in`, `sign_out`) or a
//! delivered auth event. Two gates protect against the async hazards:
//!
//! - a **liveness flag**, cleared by [`SessionStore::shutdown`], checked
//!   before every state mutation that can arrive after teardown;
//! - a **generation token** per identity-resolution attempt, so a stale
//!   resolution completing after a newer one has applied is discarded
//!   silently instead of cross-assigning identity and profile.
//!
//! The store is never left stuck at `loading = true`: every path, including
//! every failure path, settles `loading` before returning.

use std::sync::Arc;
use std::thread;

use tracing::{debug, info, warn};

use crate::backend::{AuthEvent, CredentialBackend, ProfileRows};
use crate::config::SessionConfig;
use crate::error::{AuthError, Result, StoreError};
use crate::session::reconciler::resolve_profile;
use crate::types::{Identity, Profile, Session, SessionSnapshot};

/// Raw message the hosted backends emit for bad credential pairs; normalized
/// into [`AuthError::InvalidCredentials`] before reaching callers.
const INVALID_LOGIN_MARKER: &str = "Invalid login credentials";

/// Client-side session/profile state with an explicit lifecycle.
///
/// Construct with [`SessionStore::new`], call [`SessionStore::initialize`]
/// once at startup, deliver backend notifications through
/// [`SessionStore::handle_auth_event`], and call [`SessionStore::shutdown`]
/// on teardown. Not internally synchronized; wrap in a `Mutex` if shared.
pub struct SessionStore {
    backend: Arc<dyn CredentialBackend>,
    rows: Arc<dyn ProfileRows>,
    config: SessionConfig,

    identity: Option<Identity>,
    profile: Option<Profile>,
    loading: bool,
    error: Option<String>,
    redirect_path: Option<String>,

    /// Cleared by `shutdown`; no state mutation is applied once false.
    alive: bool,
    /// Monotonically increasing token; only the newest resolution may apply.
    generation: u64,
}

impl SessionStore {
    pub fn new(backend: Arc<dyn CredentialBackend>, rows: Arc<dyn ProfileRows>) -> Self {
        Self::with_config(backend, rows, SessionConfig::default())
    }

    pub fn with_config(
        backend: Arc<dyn CredentialBackend>,
        rows: Arc<dyn ProfileRows>,
        config: SessionConfig,
    ) -> Self {
        SessionStore {
            backend,
            rows,
            config,
            identity: None,
            profile: None,
            loading: true,
            error: None,
            redirect_path: None,
            alive: true,
            generation: 0,
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Read accessors
    // ─────────────────────────────────────────────────────────────────────

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub fn profile(&self) -> Option<&Profile> {
        self.profile.as_ref()
    }

    pub fn loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn redirect_path(&self) -> Option<&str> {
        self.redirect_path.as_deref()
    }

    pub fn is_live(&self) -> bool {
        self.alive
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            identity: self.identity.clone(),
            profile: self.profile.clone(),
            loading: self.loading,
            error: self.error.clone(),
        }
    }

    /// Remembers the path a redirected navigation should return to after
    /// login or onboarding.
    pub fn set_redirect_path(&mut self, path: Option<String>) {
        self.redirect_path = path;
    }

    // ─────────────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────────────

    /// Restores the persisted session at startup.
    ///
    /// Transient fetch failures are retried up to the configured bound with a
    /// fixed backoff; any other fetch error, or exhausting the bound, settles
    /// the store signed-out rather than blocking. `loading` clears only after
    /// profile resolution completes (success or terminal failure).
    pub fn initialize(&mut self) {
        self.loading = true;

        let mut attempt = 0u32;
        let session = loop {
            attempt += 1;
            match self.backend.get_session() {
                Ok(session) => break session,
                Err(err @ AuthError::Transient(_)) => {
                    warn!(attempt, error = %err, "Initial session fetch failed");
                    if attempt >= self.config.max_session_fetch_attempts || !self.alive {
                        info!("Giving up on session restore; settling signed out");
                        self.identity = None;
                        self.profile = None;
                        self.loading = false;
                        return;
                    }
                    thread::sleep(self.config.retry_backoff);
                }
                Err(err) => {
                    // Not worth retrying; a repeat call would fail the same way
                    warn!(error = %err, "Session restore failed; settling signed out");
                    self.identity = None;
                    self.profile = None;
                    self.loading = false;
                    return;
                }
            }
        };

        match session {
            Some(session) => {
                debug!(
                    user_id = %session.identity.id,
                    email = %session.identity.email,
                    "Restored session"
                );
                self.resolve_identity(session.identity);
            }
            None => {
                debug!("No persisted session");
                self.identity = None;
                self.profile = None;
            }
        }

        self.loading = false;
    }

    /// Marks the store as torn down. Auth events and resolution results that
    /// arrive afterwards are discarded; this is the unsubscribe step.
    pub fn shutdown(&mut self) {
        debug!("Shutting down session store");
        self.alive = false;
    }

    // ─────────────────────────────────────────────────────────────────────
    // Backend notifications
    // ─────────────────────────────────────────────────────────────────────

    /// Handles an auth-state-change notification pushed by the backend.
    ///
    /// Runs the same identity→profile resolution as [`SessionStore::initialize`].
    pub fn handle_auth_event(&mut self, event: AuthEvent, session: Option<Session>) {
        if !self.alive {
            debug!(?event, "Auth event after shutdown ignored");
            return;
        }

        debug!(
            ?event,
            user = session.as_ref().map(|s| s.identity.email.as_str()),
            "Auth state changed"
        );

        match session {
            Some(session) => self.resolve_identity(session.identity),
            None => {
                self.generation += 1; // orphan any in-flight resolution
                self.identity = None;
                self.profile = None;
            }
        }

        self.loading = false;
    }

    // ─────────────────────────────────────────────────────────────────────
    // Actions
    // ─────────────────────────────────────────────────────────────────────

    /// Verifies credentials and resolves the profile, creating one if absent.
    ///
    /// Invalid-credential failures collapse to the single fixed
    /// [`AuthError::InvalidCredentials`] message. If profile resolution fails
    /// even after a creation attempt, the whole operation fails: the error is
    /// returned and no partial identity/profile state is left behind.
    pub fn sign_in(&mut self, email: &str, password: &str) -> Result<Identity> {
        info!(email, "Starting sign in");
        self.error = None;
        self.loading = true;

        let result = self.sign_in_inner(email, password);
        self.loading = false;

        match result {
            Ok(identity) => {
                debug!(user_id = %identity.id, "Sign in complete");
                Ok(identity)
            }
            Err(err) => {
                warn!(error = %err, "Sign in failed");
                self.identity = None;
                self.profile = None;
                self.error = Some(err.to_string());
                Err(err)
            }
        }
    }

    fn sign_in_inner(&mut self, email: &str, password: &str) -> Result<Identity> {
        let session = self
            .backend
            .sign_in_with_password(email, password)
            .map_err(normalize_sign_in_error)?;

        let identity = session.identity;
        let generation = self.begin_resolution();

        let profile =
            resolve_profile(self.rows.as_ref(), &identity.id, &identity.email).map_err(|err| {
                warn!(user_id = %identity.id, error = %err, "Profile resolution failed after sign in");
                AuthError::ProfileUnavailable
            })?;

        if !self.alive || generation != self.generation {
            debug!(generation, "Sign-in resolution superseded; discarding");
            return Err(AuthError::Backend(
                "sign-in superseded by a newer auth change".to_string(),
            ));
        }

        self.identity = Some(identity.clone());
        self.profile = Some(profile);
        Ok(identity)
    }

    /// Signs out at the backend and clears local state.
    ///
    /// Local identity/profile are cleared even when the backend call fails; a
    /// stale local session is worse than an extra sign-in prompt. The backend
    /// error is still returned.
    pub fn sign_out(&mut self) -> Result<()> {
        info!("Signing out");
        let result = self.backend.sign_out();

        self.generation += 1; // orphan any in-flight resolution
        self.identity = None;
        self.profile = None;
        self.error = result.as_ref().err().map(|err| err.to_string());
        self.loading = false;

        if let Err(err) = &result {
            warn!(error = %err, "Backend sign-out failed; local state cleared anyway");
        }
        result
    }

    /// Starts the password-reset email flow. Backend errors pass through
    /// unchanged.
    pub fn reset_password(&self, email: &str) -> Result<()> {
        debug!(email, "Requesting password reset");
        self.backend
            .reset_password_for_email(email, &self.config.password_reset_redirect)
    }

    /// Updates the password after a reset. Backend errors pass through
    /// unchanged.
    pub fn update_password(&self, new_password: &str) -> Result<()> {
        debug!("Updating password");
        self.backend.update_password(new_password)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Identity resolution
    // ─────────────────────────────────────────────────────────────────────

    /// Claims a new generation token for a resolution attempt. Any older
    /// in-flight attempt is orphaned from this point on.
    pub fn begin_resolution(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    /// Applies a completed resolution, unless the store has been shut down or
    /// a newer attempt has superseded this one.
    ///
    /// A resolution failure is not fatal: the identity is kept and the
    /// profile settles at `None`, which routes the user to onboarding rather
    /// than blocking forever.
    pub fn apply_resolution(
        &mut self,
        generation: u64,
        identity: Identity,
        outcome: std::result::Result<Profile, StoreError>,
    ) {
        if !self.alive {
            debug!(generation, "Resolution after shutdown discarded");
            return;
        }
        if generation != self.generation {
            debug!(
                generation,
                latest = self.generation,
                "Stale resolution discarded"
            );
            return;
        }

        self.profile = match outcome {
            Ok(profile) => Some(profile),
            Err(err) => {
                warn!(user_id = %identity.id, error = %err, "Profile resolution failed");
                None
            }
        };
        self.identity = Some(identity);
    }

    fn resolve_identity(&mut self, identity: Identity) {
        let generation = self.begin_resolution();
        let outcome = resolve_profile(self.rows.as_ref(), &identity.id, &identity.email);
        self.apply_resolution(generation, identity, outcome);
    }
}

fn normalize_sign_in_error(err: AuthError) -> AuthError {
    match err {
        AuthError::InvalidCredentials => AuthError::InvalidCredentials,
        AuthError::Backend(message) if message.contains(INVALID_LOGIN_MARKER) => {
            AuthError::InvalidCredentials
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::guard::{decide, RouteDecision};
    use crate::stubs::{MemoryRows, StubCredentialBackend};
    use crate::types::Role;

    fn store_with(
        backend: Arc<StubCredentialBackend>,
        rows: Arc<MemoryRows>,
    ) -> SessionStore {
        SessionStore::with_config(backend, rows, SessionConfig::without_backoff())
    }

    #[test]
    fn test_initialize_without_session_settles_signed_out() {
        let backend = Arc::new(StubCredentialBackend::new());
        let rows = Arc::new(MemoryRows::new());
        let mut store = store_with(backend, rows);

        assert!(store.loading());
        store.initialize();

        assert!(!store.loading());
        assert!(store.identity().is_none());
        assert!(store.profile().is_none());
    }

    #[test]
    fn test_initialize_restores_session_and_resolves_profile() {
        let backend = Arc::new(StubCredentialBackend::new());
        let identity = backend.register("u1@test.edu", "Student123!");
        backend.set_current_session(Some(Session::new(identity.clone())));
        let rows = Arc::new(MemoryRows::new());
        let mut store = store_with(backend, Arc::clone(&rows));

        store.initialize();

        assert!(!store.loading());
        assert_eq!(store.identity().unwrap().id, identity.id);
        assert_eq!(store.profile().unwrap().role, Role::Student);
        assert_eq!(rows.profile_count(), 1);
    }

    #[test]
    fn test_initialize_retries_transient_failures_then_succeeds() {
        let backend = Arc::new(StubCredentialBackend::new());
        let identity = backend.register("u1@test.edu", "Student123!");
        backend.set_current_session(Some(Session::new(identity)));
        backend.fail_session_fetches(2);
        let rows = Arc::new(MemoryRows::new());
        let mut store = store_with(backend, rows);

        store.initialize();

        // Third attempt succeeded within the bound of 3
        assert!(!store.loading());
        assert!(store.identity().is_some());
    }

    #[test]
    fn test_initialize_never_leaves_loading_stuck() {
        let backend = Arc::new(StubCredentialBackend::new());
        backend.fail_session_fetches(10);
        let rows = Arc::new(MemoryRows::new());
        let mut store = store_with(Arc::clone(&backend), rows);

        store.initialize();

        assert!(!store.loading());
        assert!(store.identity().is_none());
        // Exactly 3 attempts were made before giving up
        assert_eq!(backend.session_fetch_attempts(), 3);
    }

    #[test]
    fn test_initialize_does_not_retry_non_transient_failures() {
        let backend = Arc::new(StubCredentialBackend::new());
        backend.fail_session_fetches_fatally("api key revoked");
        let rows = Arc::new(MemoryRows::new());
        let mut store = store_with(Arc::clone(&backend), rows);

        store.initialize();

        assert!(!store.loading());
        assert!(store.identity().is_none());
        // A non-transient failure settles signed out on the first attempt
        assert_eq!(backend.session_fetch_attempts(), 1);
    }

    #[test]
    fn test_sign_in_creates_profile_and_routes_to_onboarding() {
        let backend = Arc::new(StubCredentialBackend::new());
        backend.register("u1@test.edu", "Student123!");
        let rows = Arc::new(MemoryRows::new());
        let mut store = store_with(backend, Arc::clone(&rows));
        store.initialize();

        let identity = store.sign_in("u1@test.edu", "Student123!").unwrap();
        assert_eq!(store.identity().unwrap().id, identity.id);

        let profile = store.profile().unwrap();
        assert_eq!(profile.role, Role::Student);
        assert!(!profile.profile_completed);

        // The auto-created default row is incomplete, so the guard gates
        assert_eq!(
            decide(&store.snapshot(), "/dashboard"),
            RouteDecision::RedirectToOnboarding {
                return_to: "/dashboard".to_string()
            }
        );
    }

    #[test]
    fn test_sign_in_with_missing_profile_row_redirects_to_onboarding() {
        let backend = Arc::new(StubCredentialBackend::new());
        let identity = backend.register("u1@test.edu", "Student123!");
        backend.set_current_session(Some(Session::new(identity)));
        let rows = Arc::new(MemoryRows::new());
        rows.set_unavailable(true);
        let mut store = store_with(backend, rows);

        // Resolution fails: identity restored, profile settles at None
        store.initialize();

        assert!(!store.loading());
        assert!(store.identity().is_some());
        assert!(store.profile().is_none());
        assert_eq!(
            decide(&store.snapshot(), "/dashboard"),
            RouteDecision::RedirectToOnboarding {
                return_to: "/dashboard".to_string()
            }
        );
    }

    #[test]
    fn test_sign_in_normalizes_invalid_credentials() {
        let backend = Arc::new(StubCredentialBackend::new());
        backend.register("u1@test.edu", "Student123!");
        let rows = Arc::new(MemoryRows::new());
        let mut store = store_with(backend, rows);
        store.initialize();

        let err = store.sign_in("u1@test.edu", "wrong").unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
        assert_eq!(store.error(), Some("Invalid email or password"));
        assert!(store.identity().is_none());
        assert!(!store.loading());
    }

    #[test]
    fn test_sign_in_fails_whole_operation_when_resolution_fails() {
        let backend = Arc::new(StubCredentialBackend::new());
        backend.register("u1@test.edu", "Student123!");
        let rows = Arc::new(MemoryRows::new());
        rows.set_unavailable(true);
        let mut store = store_with(backend, rows);
        store.initialize();

        let err = store.sign_in("u1@test.edu", "Student123!").unwrap_err();
        assert!(matches!(err, AuthError::ProfileUnavailable));

        // No partial state: neither identity nor profile stuck around
        assert!(store.identity().is_none());
        assert!(store.profile().is_none());
        assert!(!store.loading());
    }

    #[test]
    fn test_sign_out_clears_state_even_when_backend_fails() {
        let backend = Arc::new(StubCredentialBackend::new());
        backend.register("u1@test.edu", "Student123!");
        let rows = Arc::new(MemoryRows::new());
        let mut store = store_with(Arc::clone(&backend), rows);
        store.initialize();
        store.sign_in("u1@test.edu", "Student123!").unwrap();

        backend.fail_next_sign_out();
        let result = store.sign_out();

        assert!(result.is_err());
        assert!(store.identity().is_none());
        assert!(store.profile().is_none());
    }

    #[test]
    fn test_sign_out_success_clears_error() {
        let backend = Arc::new(StubCredentialBackend::new());
        backend.register("u1@test.edu", "Student123!");
        let rows = Arc::new(MemoryRows::new());
        let mut store = store_with(backend, rows);
        store.initialize();
        store.sign_in("u1@test.edu", "Student123!").unwrap();

        store.sign_out().unwrap();
        assert!(store.error().is_none());
    }

    #[test]
    fn test_auth_event_sign_out_clears_identity_and_profile() {
        let backend = Arc::new(StubCredentialBackend::new());
        backend.register("u1@test.edu", "Student123!");
        let rows = Arc::new(MemoryRows::new());
        let mut store = store_with(backend, rows);
        store.initialize();
        store.sign_in("u1@test.edu", "Student123!").unwrap();

        store.handle_auth_event(AuthEvent::SignedOut, None);

        assert!(store.identity().is_none());
        assert!(store.profile().is_none());
        assert!(!store.loading());
    }

    #[test]
    fn test_auth_event_resolves_profile_for_new_identity() {
        let backend = Arc::new(StubCredentialBackend::new());
        let identity = backend.register("u2@test.edu", "Staff123!");
        let rows = Arc::new(MemoryRows::new());
        let mut store = store_with(backend, Arc::clone(&rows));
        store.initialize();

        store.handle_auth_event(AuthEvent::SignedIn, Some(Session::new(identity.clone())));

        assert_eq!(store.identity().unwrap().id, identity.id);
        assert!(store.profile().is_some());
        assert_eq!(rows.profile_count(), 1);
    }

    #[test]
    fn test_events_after_shutdown_are_ignored() {
        let backend = Arc::new(StubCredentialBackend::new());
        let identity = backend.register("u1@test.edu", "Student123!");
        let rows = Arc::new(MemoryRows::new());
        let mut store = store_with(backend, rows);
        store.initialize();

        store.shutdown();
        store.handle_auth_event(AuthEvent::SignedIn, Some(Session::new(identity)));

        assert!(store.identity().is_none());
        assert!(store.profile().is_none());
    }

    #[test]
    fn test_stale_resolution_is_discarded() {
        let backend = Arc::new(StubCredentialBackend::new());
        let rows = Arc::new(MemoryRows::new());
        let mut store = store_with(backend, rows);
        store.initialize();

        let u1 = Identity {
            id: "u1".to_string(),
            email: "u1@test.edu".to_string(),
            email_confirmed: true,
        };
        let u2 = Identity {
            id: "u2".to_string(),
            email: "u2@test.edu".to_string(),
            email_confirmed: true,
        };

        // Two overlapping resolutions: u1 starts first, u2 supersedes it
        let gen_u1 = store.begin_resolution();
        let gen_u2 = store.begin_resolution();

        store.apply_resolution(gen_u2, u2.clone(), Ok(Profile::new_default("u2", &u2.email)));
        // The stale u1 result arrives late and must be discarded
        store.apply_resolution(gen_u1, u1, Ok(Profile::new_default("u1", "u1@test.edu")));

        assert_eq!(store.identity().unwrap().id, "u2");
        assert_eq!(store.profile().unwrap().id, "u2");
    }

    #[test]
    fn test_resolution_after_shutdown_is_discarded() {
        let backend = Arc::new(StubCredentialBackend::new());
        let rows = Arc::new(MemoryRows::new());
        let mut store = store_with(backend, rows);
        store.initialize();

        let generation = store.begin_resolution();
        store.shutdown();

        let u1 = Identity {
            id: "u1".to_string(),
            email: "u1@test.edu".to_string(),
            email_confirmed: true,
        };
        store.apply_resolution(generation, u1, Ok(Profile::new_default("u1", "u1@test.edu")));

        assert!(store.identity().is_none());
    }

    #[test]
    fn test_redirect_path_round_trip() {
        let backend = Arc::new(StubCredentialBackend::new());
        let rows = Arc::new(MemoryRows::new());
        let mut store = store_with(backend, rows);

        assert!(store.redirect_path().is_none());
        store.set_redirect_path(Some("/dashboard/mood".to_string()));
        assert_eq!(store.redirect_path(), Some("/dashboard/mood"));
        store.set_redirect_path(None);
        assert!(store.redirect_path().is_none());
    }

    #[test]
    fn test_reset_password_passes_backend_error_through() {
        let backend = Arc::new(StubCredentialBackend::new());
        backend.fail_next_password_call("rate limited");
        let rows = Arc::new(MemoryRows::new());
        let store = store_with(backend, rows);

        let err = store.reset_password("u1@test.edu").unwrap_err();
        assert!(matches!(err, AuthError::Backend(message) if message == "rate limited"));
    }

    #[test]
    fn test_update_password_passes_through() {
        let backend = Arc::new(StubCredentialBackend::new());
        backend.register("u1@test.edu", "Student123!");
        let rows = Arc::new(MemoryRows::new());
        let mut store = store_with(Arc::clone(&backend), rows);
        store.initialize();
        store.sign_in("u1@test.edu", "Student123!").unwrap();

        store.update_password("NewPass456!").unwrap();
        store.sign_out().unwrap();

        // The new password is live at the backend
        assert!(store.sign_in("u1@test.edu", "Student123!").is_err());
        assert!(store.sign_in("u1@test.edu", "NewPass456!").is_ok());
    }

    #[test]
    fn test_normalize_maps_raw_backend_message() {
        let raw = AuthError::Backend("Invalid login credentials".to_string());
        assert!(matches!(
            normalize_sign_in_error(raw),
            AuthError::InvalidCredentials
        ));

        let other = AuthError::Backend("service unavailable".to_string());
        assert!(matches!(
            normalize_sign_in_error(other),
            AuthError::Backend(_)
        ));
    }
}
