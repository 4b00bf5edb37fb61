//! Profile reconciliation: ensure exactly one profile row exists for an
//! identity, creating a default row on first observation.
//!
//! The fetch and the insert are not atomic, so a concurrent path (another
//! tab, a delivered auth event) can win the creation race. A duplicate-key
//! failure on insert is therefore an expected outcome, converted into a
//! re-fetch rather than an error.

use tracing::{debug, info, warn};

use crate::backend::ProfileRows;
use crate::error::StoreError;
use crate::types::Profile;

/// Returns the profile for `identity_id`, creating a default row if none
/// exists yet.
///
/// Side effect: if an existing row is missing its email, it is patched with
/// the known `email` before returning (one backend write; a failed patch is
/// downgraded to a warning and the returned row carries the email anyway).
pub fn resolve_profile(
    rows: &dyn ProfileRows,
    identity_id: &str,
    email: &str,
) -> Result<Profile, StoreError> {
    debug!(identity_id, "Resolving profile");

    if let Some(mut profile) = rows.get_profile(identity_id)? {
        if profile.email.is_empty() && !email.is_empty() {
            debug!(identity_id, "Backfilling missing profile email");
            if let Err(err) = rows.update_profile_email(identity_id, email) {
                warn!(identity_id, error = %err, "Failed to backfill profile email");
            }
            profile.email = email.to_string();
        }
        return Ok(profile);
    }

    info!(identity_id, "No profile found; creating default row");
    let fresh = Profile::new_default(identity_id, email);
    match rows.insert_profile(&fresh) {
        Ok(()) => Ok(fresh),
        Err(StoreError::DuplicateKey { .. }) => {
            // Lost the creation race; the concurrently inserted row wins.
            debug!(identity_id, "Profile insert raced; re-fetching winner");
            rows.get_profile(identity_id)?.ok_or_else(|| {
                StoreError::Unavailable(
                    "profile disappeared after duplicate-key insert".to_string(),
                )
            })
        }
        Err(err) => Err(err),
    }
}
