//! Debug utility for exercising the full session lifecycle against a
//! throwaway SQLite database: restore, sign-in, profile reconciliation,
//! route decisions, mood entries, sign-out.

use std::env;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use moodbuddy_core::{
    decide, MoodLevel, MoodType, ProfileRows, SessionConfig, SessionStore,
    stubs::StubCredentialBackend,
};
use moodbuddy_store::{Db, NewMoodEntry};

fn init_logging() {
    let debug_enabled = env::var("MOODBUDDY_DEBUG_LOG")
        .map(|value| matches!(value.as_str(), "1" | "true" | "TRUE" | "yes" | "YES"))
        .unwrap_or(false);
    let filter = if debug_enabled {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn main() {
    init_logging();

    println!("═══════════════════════════════════════════════════════════");
    println!("  MoodBuddy Session Check - Lifecycle Harness");
    println!("═══════════════════════════════════════════════════════════");
    println!();

    let dir = match tempfile::tempdir() {
        Ok(dir) => dir,
        Err(err) => {
            eprintln!("Failed to create temp dir: {}", err);
            std::process::exit(1);
        }
    };
    let db_path = dir.path().join("moodbuddy.db");
    println!("Database: {}", db_path.display());

    let db = match Db::new(db_path) {
        Ok(db) => Arc::new(db),
        Err(err) => {
            eprintln!("Failed to initialize database: {}", err);
            std::process::exit(1);
        }
    };

    let backend = Arc::new(StubCredentialBackend::new());
    backend.register("student@test.edu", "Student123!");
    backend.register("staff@test.edu", "Staff123!");

    let rows: Arc<dyn ProfileRows> = Arc::clone(&db) as Arc<dyn ProfileRows>;
    let mut store = SessionStore::with_config(backend, rows, SessionConfig::default());

    println!();
    println!("── Initialize (no persisted session) ─────────────────────");
    store.initialize();
    println!("  identity: {:?}", store.identity().map(|i| &i.email));
    println!("  decision: {:?}", decide(&store.snapshot(), "/dashboard"));

    println!();
    println!("── Sign in with bad password ─────────────────────────────");
    match store.sign_in("student@test.edu", "wrong") {
        Ok(_) => println!("  unexpected success"),
        Err(err) => println!("  error: {}", err),
    }

    println!();
    println!("── Sign in as student@test.edu ───────────────────────────");
    match store.sign_in("student@test.edu", "Student123!") {
        Ok(identity) => {
            println!("  signed in: {} ({})", identity.email, identity.id);
            let profile = store.profile().expect("profile resolved on sign-in");
            println!(
                "  profile: role={} completed={}",
                profile.role.as_str(),
                profile.profile_completed
            );
            println!("  decision: {:?}", decide(&store.snapshot(), "/dashboard"));
        }
        Err(err) => {
            eprintln!("  sign in failed: {}", err);
            std::process::exit(1);
        }
    }

    println!();
    println!("── Complete onboarding ───────────────────────────────────");
    let mut profile = store.profile().expect("profile present").clone();
    profile.full_name = "Demo Student".to_string();
    profile.grade_level = Some("11th".to_string());
    profile.profile_completed = true;
    if let Err(err) = db.update_profile(&profile) {
        eprintln!("  onboarding update failed: {}", err);
        std::process::exit(1);
    }
    // Re-resolve the way a delivered auth event would
    let identity = store.identity().expect("identity present").clone();
    let generation = store.begin_resolution();
    let outcome = moodbuddy_core::resolve_profile(db.as_ref(), &identity.id, &identity.email);
    store.apply_resolution(generation, identity.clone(), outcome);
    println!("  decision: {:?}", decide(&store.snapshot(), "/dashboard"));

    println!();
    println!("── Record a mood entry ───────────────────────────────────");
    let entry = NewMoodEntry {
        user_id: identity.id.clone(),
        mood_level: MoodLevel::new(4).expect("4 is in range"),
        mood_type: MoodType::Good,
        notes: Some("session-check run".to_string()),
        activities: None,
    };
    match db.insert_mood_entry(entry) {
        Ok(row) => println!("  recorded: {} level={}", row.id, row.mood_level.value()),
        Err(err) => println!("  insert failed: {}", err),
    }
    match db.list_mood_entries(&identity.id, 10) {
        Ok(entries) => println!("  entries for user: {}", entries.len()),
        Err(err) => println!("  list failed: {}", err),
    }

    println!();
    println!("── Sign out ──────────────────────────────────────────────");
    match store.sign_out() {
        Ok(()) => println!("  signed out"),
        Err(err) => println!("  backend error (local state cleared): {}", err),
    }
    println!("  decision: {:?}", decide(&store.snapshot(), "/dashboard"));

    store.shutdown();
    println!();
    println!("Done.");
}
