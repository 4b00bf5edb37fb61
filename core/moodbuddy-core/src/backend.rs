//! Contracts for the external collaborators of the session layer.
//!
//! The credential backend verifies passwords, issues sessions, and pushes
//! auth-state-change notifications; the row store holds profile rows keyed on
//! the identity id. Both are black boxes behind these traits — production
//! clients wire in the hosted service adapters, tests use [`crate::stubs`].

use crate::error::{AuthError, StoreError};
use crate::types::{Profile, Session};

/// Auth-state-change notification kinds pushed by the credential backend.
///
/// Clients deliver these to [`crate::SessionStore::handle_auth_event`]; after
/// [`crate::SessionStore::shutdown`] deliveries are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthEvent {
    SignedIn,
    SignedOut,
    TokenRefreshed,
    PasswordRecovery,
    UserUpdated,
}

/// Credential verification and session issuance, as provided by the hosted
/// auth service.
pub trait CredentialBackend {
    /// Returns the currently persisted session, if any.
    fn get_session(&self) -> Result<Option<Session>, AuthError>;

    /// Verifies the credential pair and issues a session.
    ///
    /// Implementations surface the backend's raw failure; normalizing
    /// invalid-credential messages is the session store's job.
    fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session, AuthError>;

    fn sign_out(&self) -> Result<(), AuthError>;

    /// Starts the password-reset email flow. `redirect_to` is the path the
    /// reset link should land on.
    fn reset_password_for_email(&self, email: &str, redirect_to: &str) -> Result<(), AuthError>;

    /// Updates the password of the currently authenticated identity.
    fn update_password(&self, new_password: &str) -> Result<(), AuthError>;
}

/// Profile row storage keyed exactly on the identity id.
///
/// `insert_profile` must fail with [`StoreError::DuplicateKey`] when a row
/// with the same id already exists; the reconciler relies on that signal to
/// collapse concurrent-creation races.
pub trait ProfileRows {
    fn get_profile(&self, id: &str) -> Result<Option<Profile>, StoreError>;

    fn insert_profile(&self, profile: &Profile) -> Result<(), StoreError>;

    /// Backfills the email column only. Used when an existing row predates
    /// email capture.
    fn update_profile_email(&self, id: &str, email: &str) -> Result<(), StoreError>;

    /// Full-row update, e.g. on onboarding completion.
    fn update_profile(&self, profile: &Profile) -> Result<(), StoreError>;
}
