//! # moodbuddy-store
//!
//! SQLite persistence for MoodBuddy rows: the profile table consumed by the
//! session layer's reconciler, and the mood-entry table behind the tracking
//! views. One writer at a time; the schema carries the same `CHECK`
//! constraints the hosted service enforced, so constraint failures surface
//! as typed errors instead of corrupt rows.

pub mod db;

pub use db::{Db, MoodEntry, NewMoodEntry};
