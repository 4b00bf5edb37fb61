//! Core types shared across all MoodBuddy clients.
//!
//! These types are the "lingua franca" of the session layer. The identity and
//! session mirrors are owned by the credential backend; the client never
//! mutates them except through backend calls. Profiles are application rows
//! keyed on the identity id.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

// ═══════════════════════════════════════════════════════════════════════════════
// Identity & Session (backend-owned, read-only mirrors)
// ═══════════════════════════════════════════════════════════════════════════════

/// The authenticated principal as known to the credential backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    pub email: String,
    pub email_confirmed: bool,
}

/// A backend-issued, time-bounded authorization for an identity.
///
/// The client holds this as a read-only mirror; expiry and refresh are the
/// backend's business.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub identity: Identity,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn new(identity: Identity) -> Self {
        Session {
            identity,
            expires_at: None,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Profile
// ═══════════════════════════════════════════════════════════════════════════════

/// Role of the account holder. Constrained to this set by the row store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Staff,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Staff => "staff",
        }
    }

    pub fn parse(value: &str) -> Option<Role> {
        match value {
            "student" => Some(Role::Student),
            "staff" => Some(Role::Staff),
            _ => None,
        }
    }
}

/// Age bracket captured during onboarding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgeGroup {
    Kids,
    Teens,
    Adults,
}

impl AgeGroup {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgeGroup::Kids => "kids",
            AgeGroup::Teens => "teens",
            AgeGroup::Adults => "adults",
        }
    }

    pub fn parse(value: &str) -> Option<AgeGroup> {
        match value {
            "kids" => Some(AgeGroup::Kids),
            "teens" => Some(AgeGroup::Teens),
            "adults" => Some(AgeGroup::Adults),
            _ => None,
        }
    }
}

/// Application profile row extending an identity with role and onboarding data.
///
/// One-to-one with [`Identity`] (`id` is the identity id). Created lazily by
/// the profile reconciler on first observation of an identity with no matching
/// row; never deleted by the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub full_name: String,
    pub role: Role,
    #[serde(default)]
    pub grade_level: Option<String>,
    #[serde(default)]
    pub age_group: Option<AgeGroup>,
    #[serde(default)]
    pub specialization: Option<String>,
    pub profile_completed: bool,
    pub email: String,
}

impl Profile {
    /// The row the reconciler inserts when an identity has no profile yet.
    pub fn new_default(identity_id: &str, email: &str) -> Self {
        Profile {
            id: identity_id.to_string(),
            full_name: String::new(),
            role: Role::Student,
            grade_level: None,
            age_group: None,
            specialization: None,
            profile_completed: false,
            email: email.to_string(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Mood entries
// ═══════════════════════════════════════════════════════════════════════════════

/// Coarse mood bucket. Constrained to this set by the row store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoodType {
    Great,
    Good,
    Okay,
    Down,
    Bad,
}

impl MoodType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MoodType::Great => "great",
            MoodType::Good => "good",
            MoodType::Okay => "okay",
            MoodType::Down => "down",
            MoodType::Bad => "bad",
        }
    }

    pub fn parse(value: &str) -> Option<MoodType> {
        match value {
            "great" => Some(MoodType::Great),
            "good" => Some(MoodType::Good),
            "okay" => Some(MoodType::Okay),
            "down" => Some(MoodType::Down),
            "bad" => Some(MoodType::Bad),
            _ => None,
        }
    }
}

/// Mood rating on the inclusive 1–5 scale enforced by the row store.
///
/// Deserialization goes through [`MoodLevel::new`], so an out-of-range value
/// on the wire is rejected before it ever reaches the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct MoodLevel(u8);

impl MoodLevel {
    pub fn new(level: u8) -> Result<MoodLevel, StoreError> {
        if (1..=5).contains(&level) {
            Ok(MoodLevel(level))
        } else {
            Err(StoreError::Validation(format!(
                "mood_level must be between 1 and 5, got {}",
                level
            )))
        }
    }

    pub fn value(&self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for MoodLevel {
    type Error = StoreError;

    fn try_from(level: u8) -> Result<MoodLevel, StoreError> {
        MoodLevel::new(level)
    }
}

impl From<MoodLevel> for u8 {
    fn from(level: MoodLevel) -> u8 {
        level.0
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Session snapshot (what the view layer observes)
// ═══════════════════════════════════════════════════════════════════════════════

/// Point-in-time view of the session store consumed by the route guard and
/// the view layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub identity: Option<Identity>,
    pub profile: Option<Profile>,
    pub loading: bool,
    #[serde(default)]
    pub error: Option<String>,
}
