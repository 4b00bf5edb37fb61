//! Deterministic in-memory backends for tests and local harnesses.
//!
//! [`StubCredentialBackend`] plays the hosted auth service: registered
//! email/password pairs, session issuance, and scripted failures for the
//! retry and sign-out policy tests. [`MemoryRows`] plays the row store,
//! including duplicate-key signaling and an injectable insert race.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use ulid::Ulid;

use crate::backend::{CredentialBackend, ProfileRows};
use crate::error::{AuthError, StoreError};
use crate::types::{Identity, Profile, Session};

// ═══════════════════════════════════════════════════════════════════════════════
// Credential backend stub
// ═══════════════════════════════════════════════════════════════════════════════

struct Account {
    password: String,
    identity: Identity,
}

#[derive(Default)]
struct StubState {
    accounts: HashMap<String, Account>,
    current: Option<Session>,
    transient_failures_remaining: u32,
    fatal_session_fetch: Option<String>,
    session_fetch_attempts: u32,
    fail_next_sign_out: bool,
    fail_next_password_call: Option<String>,
    last_reset_request: Option<(String, String)>,
}

/// In-memory credential backend with scripted failure modes.
#[derive(Default)]
pub struct StubCredentialBackend {
    state: Mutex<StubState>,
}

impl StubCredentialBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, StubState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Registers an account and returns the identity the backend will issue
    /// for it.
    pub fn register(&self, email: &str, password: &str) -> Identity {
        let identity = Identity {
            id: Ulid::new().to_string(),
            email: email.to_string(),
            email_confirmed: true,
        };
        self.state().accounts.insert(
            email.to_string(),
            Account {
                password: password.to_string(),
                identity: identity.clone(),
            },
        );
        identity
    }

    /// Sets the session `get_session` will report, simulating a persisted
    /// login from a previous run.
    pub fn set_current_session(&self, session: Option<Session>) {
        self.state().current = session;
    }

    /// The next `count` calls to `get_session` fail with a transient error.
    pub fn fail_session_fetches(&self, count: u32) {
        self.state().transient_failures_remaining = count;
    }

    /// Every `get_session` call fails with this non-transient message.
    pub fn fail_session_fetches_fatally(&self, message: &str) {
        self.state().fatal_session_fetch = Some(message.to_string());
    }

    pub fn session_fetch_attempts(&self) -> u32 {
        self.state().session_fetch_attempts
    }

    pub fn fail_next_sign_out(&self) {
        self.state().fail_next_sign_out = true;
    }

    /// The next reset/update password call fails with this message.
    pub fn fail_next_password_call(&self, message: &str) {
        self.state().fail_next_password_call = Some(message.to_string());
    }

    /// `(email, redirect_to)` of the most recent password-reset request.
    pub fn last_reset_request(&self) -> Option<(String, String)> {
        self.state().last_reset_request.clone()
    }
}

impl CredentialBackend for StubCredentialBackend {
    fn get_session(&self) -> Result<Option<Session>, AuthError> {
        let mut state = self.state();
        state.session_fetch_attempts += 1;
        if state.transient_failures_remaining > 0 {
            state.transient_failures_remaining -= 1;
            return Err(AuthError::Transient("connection refused".to_string()));
        }
        if let Some(message) = &state.fatal_session_fetch {
            return Err(AuthError::Backend(message.clone()));
        }
        Ok(state.current.clone())
    }

    fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let mut state = self.state();
        let identity = match state.accounts.get(email) {
            Some(account) if account.password == password => account.identity.clone(),
            // Raw hosted-backend message; the session store normalizes it.
            _ => return Err(AuthError::Backend("Invalid login credentials".to_string())),
        };
        let session = Session::new(identity);
        state.current = Some(session.clone());
        Ok(session)
    }

    fn sign_out(&self) -> Result<(), AuthError> {
        let mut state = self.state();
        if state.fail_next_sign_out {
            state.fail_next_sign_out = false;
            // Backend keeps its session; the client clears local state anyway
            return Err(AuthError::Backend("sign out failed".to_string()));
        }
        state.current = None;
        Ok(())
    }

    fn reset_password_for_email(&self, email: &str, redirect_to: &str) -> Result<(), AuthError> {
        let mut state = self.state();
        if let Some(message) = state.fail_next_password_call.take() {
            return Err(AuthError::Backend(message));
        }
        state.last_reset_request = Some((email.to_string(), redirect_to.to_string()));
        Ok(())
    }

    fn update_password(&self, new_password: &str) -> Result<(), AuthError> {
        let mut state = self.state();
        if let Some(message) = state.fail_next_password_call.take() {
            return Err(AuthError::Backend(message));
        }
        let email = match &state.current {
            Some(session) => session.identity.email.clone(),
            None => return Err(AuthError::Backend("not authenticated".to_string())),
        };
        match state.accounts.get_mut(&email) {
            Some(account) => {
                account.password = new_password.to_string();
                Ok(())
            }
            None => Err(AuthError::Backend("unknown account".to_string())),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Row store stub
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Default)]
struct RowsState {
    profiles: HashMap<String, Profile>,
    unavailable: bool,
    fail_next_email_update: bool,
    insert_race: Option<Profile>,
}

/// In-memory profile rows with duplicate-key semantics.
#[derive(Default)]
pub struct MemoryRows {
    state: Mutex<RowsState>,
}

impl MemoryRows {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, RowsState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// All operations fail with [`StoreError::Unavailable`] while set.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state().unavailable = unavailable;
    }

    /// The next `update_profile_email` call fails.
    pub fn fail_next_email_update(&self) {
        self.state().fail_next_email_update = true;
    }

    /// On the next insert, this competitor row lands first and the insert
    /// fails with a duplicate key, simulating a lost creation race.
    pub fn inject_insert_race(&self, competitor: Profile) {
        self.state().insert_race = Some(competitor);
    }

    pub fn profile_count(&self) -> usize {
        self.state().profiles.len()
    }
}

impl ProfileRows for MemoryRows {
    fn get_profile(&self, id: &str) -> Result<Option<Profile>, StoreError> {
        let state = self.state();
        if state.unavailable {
            return Err(StoreError::Unavailable("row store offline".to_string()));
        }
        Ok(state.profiles.get(id).cloned())
    }

    fn insert_profile(&self, profile: &Profile) -> Result<(), StoreError> {
        let mut state = self.state();
        if state.unavailable {
            return Err(StoreError::Unavailable("row store offline".to_string()));
        }
        if let Some(competitor) = state.insert_race.take() {
            state.profiles.insert(competitor.id.clone(), competitor);
        }
        if state.profiles.contains_key(&profile.id) {
            return Err(StoreError::DuplicateKey {
                id: profile.id.clone(),
            });
        }
        state.profiles.insert(profile.id.clone(), profile.clone());
        Ok(())
    }

    fn update_profile_email(&self, id: &str, email: &str) -> Result<(), StoreError> {
        let mut state = self.state();
        if state.unavailable {
            return Err(StoreError::Unavailable("row store offline".to_string()));
        }
        if state.fail_next_email_update {
            state.fail_next_email_update = false;
            return Err(StoreError::Unavailable("write rejected".to_string()));
        }
        match state.profiles.get_mut(id) {
            Some(profile) => {
                profile.email = email.to_string();
                Ok(())
            }
            None => Err(StoreError::MissingRow { id: id.to_string() }),
        }
    }

    fn update_profile(&self, profile: &Profile) -> Result<(), StoreError> {
        let mut state = self.state();
        if state.unavailable {
            return Err(StoreError::Unavailable("row store offline".to_string()));
        }
        match state.profiles.get_mut(&profile.id) {
            Some(existing) => {
                *existing = profile.clone();
                Ok(())
            }
            None => Err(StoreError::MissingRow {
                id: profile.id.clone(),
            }),
        }
    }
}
