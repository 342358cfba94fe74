//! Integration tests for the `slotbook` CLI binary.
//!
//! Each test works on its own state file in a temporary directory and drives the
//! binary the way a user would: register parties, publish slots, book, and watch the
//! state file and JSON output.

// `Command::cargo_bin` was deprecated in assert_cmd 2.1.2 in favor of
// `cargo::cargo_bin_cmd!`. Allow it until we migrate.
#![allow(deprecated)]

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use tempfile::TempDir;

// ── Helpers ─────────────────────────────────────────────────────────────────

struct Fixture {
    _dir: TempDir,
    state: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let state = dir.path().join("state.json");
        Self { _dir: dir, state }
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("slotbook").unwrap();
        cmd.env_remove("SLOTBOOK_CONFIG")
            .env_remove("RUST_LOG")
            .arg("--state")
            .arg(&self.state);
        cmd
    }

    /// Run a command that must succeed and return its JSON output.
    fn json(&self, args: &[&str]) -> Value {
        let output = self.cmd().args(args).assert().success().get_output().clone();
        serde_json::from_slice(&output.stdout).expect("stdout must be JSON")
    }

    /// Provider `ada` and requesters `sam`, `kim`.
    fn with_parties() -> Self {
        let fx = Self::new();
        fx.json(&[
            "register", "provider", "--id", "ada", "--name", "Dr. Ada", "--email",
            "ada@uni.example", "--department", "Maths",
        ]);
        for id in ["sam", "kim"] {
            let email = format!("{}@students.example", id);
            fx.json(&[
                "register", "requester", "--id", id, "--name", id, "--email", &email,
            ]);
        }
        fx
    }

    fn state_json(&self) -> Value {
        read_json(&self.state)
    }
}

fn read_json(path: &Path) -> Value {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

// ─────────────────────────────────────────────────────────────────────────────
// Registration and state file
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn first_write_creates_state_file() {
    let fx = Fixture::with_parties();
    let state = fx.state_json();
    assert_eq!(state["providers"][0]["id"], "ada");
    assert_eq!(state["providers"][0]["department"], "Maths");
    assert_eq!(state["requesters"].as_array().unwrap().len(), 2);
}

#[test]
fn read_only_commands_do_not_create_state() {
    let fx = Fixture::new();
    fx.cmd()
        .args(["slots", "list", "--provider", "ada"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Provider not found: ada"));
    assert!(!fx.state.exists());
}

#[test]
fn duplicate_registration_fails() {
    let fx = Fixture::with_parties();
    fx.cmd()
        .args([
            "register", "requester", "--id", "sam", "--name", "Sam", "--email", "s@x",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Already registered"));
}

#[test]
fn state_path_can_come_from_environment() {
    let fx = Fixture::new();
    Command::cargo_bin("slotbook")
        .unwrap()
        .env("SLOTBOOK_STATE", &fx.state)
        .args([
            "register", "requester", "--id", "sam", "--name", "Sam", "--email", "s@x",
        ])
        .assert()
        .success();
    assert_eq!(fx.state_json()["requesters"][0]["id"], "sam");
}

// ─────────────────────────────────────────────────────────────────────────────
// Slots and bookings
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn publish_book_and_list_free() {
    let fx = Fixture::with_parties();
    let slots = fx.json(&[
        "slots", "add", "--as", "provider:ada", "--provider", "ada", "Mon 09:00-10:00",
        "Tue 14:00-15:00",
    ]);
    assert_eq!(slots.as_array().unwrap().len(), 2);
    assert_eq!(slots[0]["window"]["day"], "Mon");

    let booking = fx.json(&[
        "book", "--as", "requester:sam", "--provider", "ada", "Mon 09:00-10:00", "--title",
        "Thesis",
    ]);
    assert_eq!(booking["requester"], "sam");
    assert_eq!(booking["title"], "Thesis");

    let free = fx.json(&["slots", "free", "--provider", "ada"]);
    let free = free.as_array().unwrap();
    assert_eq!(free.len(), 1);
    assert_eq!(free[0]["window"]["day"], "Tue");
}

#[test]
fn double_booking_is_rejected_with_conflict_message() {
    let fx = Fixture::with_parties();
    fx.json(&[
        "slots", "add", "--as", "provider:ada", "--provider", "ada", "Mon 09:00-10:00",
    ]);
    fx.json(&[
        "book", "--as", "requester:sam", "--provider", "ada", "Mon 09:00-10:00",
    ]);

    fx.cmd()
        .args([
            "book", "--as", "requester:kim", "--provider", "ada", "Mon 09:00-10:00",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("This slot is already booked"));

    let bookings = fx.json(&["bookings", "list", "--provider", "ada"]);
    assert_eq!(bookings.as_array().unwrap().len(), 1);
}

#[test]
fn booking_a_window_with_no_slot_is_unavailable() {
    let fx = Fixture::with_parties();
    fx.json(&[
        "slots", "add", "--as", "provider:ada", "--provider", "ada", "Mon 09:00-10:00",
    ]);
    fx.cmd()
        .args([
            "book", "--as", "requester:sam", "--provider", "ada", "Mon 09:00-09:30",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("This slot is not available"));
}

#[test]
fn slot_update_moves_booking_and_logs_notification() {
    let fx = Fixture::with_parties();
    let slots = fx.json(&[
        "slots", "add", "--as", "provider:ada", "--provider", "ada", "Mon 09:00-10:00",
    ]);
    let slot_id = slots[0]["id"].as_u64().unwrap().to_string();
    let booking = fx.json(&[
        "book", "--as", "requester:sam", "--provider", "ada", "Mon 09:00-10:00",
    ]);
    let booking_id = booking["id"].as_u64().unwrap().to_string();

    fx.cmd()
        .args([
            "slots", "update", "--as", "provider:ada", "--provider", "ada", "--slot", &slot_id,
            "Mon 09:00-09:30",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"updated\""))
        .stderr(predicate::str::contains("sam@students.example"));

    let moved = fx.json(&["bookings", "get", &booking_id]);
    assert_eq!(moved["booking"]["window"]["end"], "09:30");
    assert_eq!(moved["provider"]["name"], "Dr. Ada");
    assert_eq!(moved["provider"]["department"], "Maths");
    assert_eq!(moved["requester"]["email"], "sam@students.example");
}

#[test]
fn slot_delete_cancels_booking() {
    let fx = Fixture::with_parties();
    let slots = fx.json(&[
        "slots", "add", "--as", "provider:ada", "--provider", "ada", "Mon 09:00-10:00",
    ]);
    let slot_id = slots[0]["id"].as_u64().unwrap().to_string();
    fx.json(&[
        "book", "--as", "requester:sam", "--provider", "ada", "Mon 09:00-10:00",
    ]);

    let removal = fx.json(&[
        "slots", "delete", "--as", "provider:ada", "--provider", "ada", "--slot", &slot_id,
    ]);
    assert_eq!(removal["cascade"]["cancelled"].as_array().unwrap().len(), 1);

    let bookings = fx.json(&["bookings", "list", "--requester", "sam"]);
    assert!(bookings.as_array().unwrap().is_empty());
}

#[test]
fn other_provider_cannot_touch_slots() {
    let fx = Fixture::with_parties();
    fx.cmd()
        .args([
            "slots", "add", "--as", "provider:bob", "--provider", "ada", "Mon 09:00-10:00",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Not authorized"));
}

#[test]
fn booking_update_within_slot_and_cancel() {
    let fx = Fixture::with_parties();
    fx.json(&[
        "slots", "add", "--as", "provider:ada", "--provider", "ada", "Mon 09:00-11:00",
    ]);
    let booking = fx.json(&[
        "book", "--as", "requester:sam", "--provider", "ada", "Mon 09:00-11:00",
    ]);
    let id = booking["id"].as_u64().unwrap().to_string();

    let updated = fx.json(&[
        "bookings", "update", "--as", "requester:sam", &id, "--start", "09:30", "--end",
        "10:00",
    ]);
    assert_eq!(updated["window"]["start"], "09:30");

    fx.cmd()
        .args(["bookings", "update", "--as", "requester:sam", &id, "--start", "08:00"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("This slot is not available"));

    fx.json(&["bookings", "cancel", "--as", "provider:ada", &id]);
    fx.cmd()
        .args(["bookings", "get", &id])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Booking not found"));
}

#[test]
fn overlaps_and_next_free_slot() {
    let fx = Fixture::with_parties();
    fx.json(&[
        "slots", "add", "--as", "provider:ada", "--provider", "ada", "Mon 09:00-09:30",
        "Mon 09:15-10:45",
    ]);

    let overlaps = fx.json(&["slots", "overlaps", "--provider", "ada"]);
    assert_eq!(overlaps[0]["overlap_minutes"], 15);

    let next = fx.json(&["slots", "free", "--provider", "ada", "--min-minutes", "60"]);
    assert_eq!(next["window"]["start"], "09:15");

    let none = fx.json(&["slots", "free", "--provider", "ada", "--min-minutes", "120"]);
    assert!(none.is_null());
}

// ─────────────────────────────────────────────────────────────────────────────
// Argument validation
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn malformed_arguments_are_rejected_by_parser() {
    let fx = Fixture::with_parties();
    fx.cmd()
        .args([
            "slots", "add", "--as", "provider:ada", "--provider", "ada", "Mon 10:00-09:00",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid time range"));

    fx.cmd()
        .args([
            "book", "--as", "boss:ada", "--provider", "ada", "Mon 09:00-10:00",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid principal"));
}

#[test]
fn config_file_is_validated() {
    let fx = Fixture::new();
    let config = fx.state.with_file_name("engine.json");
    std::fs::write(&config, r#"{"notifications": {"max_attempts": 0}}"#).unwrap();

    fx.cmd()
        .arg("--config")
        .arg(&config)
        .args(["slots", "list", "--provider", "ada"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load config"));
}
