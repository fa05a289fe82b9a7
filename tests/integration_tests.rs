//! Integration tests for the refurb CLI
//!
//! These tests run the built binary against throwaway project directories.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// Helper to create a refurb Command
fn refurb() -> Command {
    cargo_bin_cmd!("refurb")
}

/// Helper to create a temporary project directory
fn create_temp_project() -> TempDir {
    TempDir::new().unwrap()
}

fn add_customer(dir: &TempDir, email: &str) {
    refurb()
        .current_dir(dir.path())
        .args(["customer", "add", email, "--password", "secret"])
        .assert()
        .success();
}

// =============================================================================
// Basic CLI Tests
// =============================================================================

mod cli_basics {
    use super::*;

    #[test]
    fn test_refurb_help() {
        refurb()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("serve"))
            .stdout(predicate::str::contains("milestone"));
    }

    #[test]
    fn test_refurb_version() {
        refurb().arg("--version").assert().success();
    }

    #[test]
    fn test_unknown_command_fails() {
        refurb().arg("teleport").assert().failure();
    }
}

// =============================================================================
// Progress and Milestone Views
// =============================================================================

mod progress_views {
    use super::*;

    #[test]
    fn test_progress_for_shipped_order() {
        refurb()
            .args(["progress", "shipped"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Order Placed"))
            .stdout(predicate::str::contains("Delivered"))
            .stdout(predicate::str::contains("Progress: 90%"));
    }

    #[test]
    fn test_progress_for_cancelled_order_has_no_active_stage() {
        refurb()
            .args(["progress", "cancelled"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[x]").not())
            .stdout(predicate::str::contains("Progress: 0%"))
            .stdout(predicate::str::contains("does not count toward impact"));
    }

    #[test]
    fn test_progress_rejects_unknown_status() {
        refurb()
            .args(["progress", "teleported"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("teleported"));
    }

    #[test]
    fn test_milestone_midway() {
        let dir = create_temp_project();
        refurb()
            .current_dir(dir.path())
            .args(["milestone", "2600"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Previous milestone: 2000"))
            .stdout(predicate::str::contains("Next milestone: 3000"))
            .stdout(predicate::str::contains("Progress: 60.0%"))
            .stdout(predicate::str::contains("Remaining: 400"))
            .stdout(predicate::str::contains("Laptops needed: 1"));
    }

    #[test]
    fn test_milestone_custom_unit_size() {
        let dir = create_temp_project();
        refurb()
            .current_dir(dir.path())
            .args(["milestone", "250", "--unit-size", "100", "--per-unit", "25"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Previous milestone: 200"))
            .stdout(predicate::str::contains("Next milestone: 300"))
            .stdout(predicate::str::contains("Progress: 50.0%"))
            .stdout(predicate::str::contains("Laptops needed: 2"));
    }

    #[test]
    fn test_milestone_rejects_zero_unit_size() {
        let dir = create_temp_project();
        refurb()
            .current_dir(dir.path())
            .args(["milestone", "100", "--unit-size", "0"])
            .assert()
            .failure();
    }
}

// =============================================================================
// Configuration
// =============================================================================

mod config_commands {
    use super::*;

    #[test]
    fn test_config_init_creates_file() {
        let dir = create_temp_project();
        refurb()
            .current_dir(dir.path())
            .args(["config", "init"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Created portal.toml"));

        let content = fs::read_to_string(dir.path().join(".refurb/portal.toml")).unwrap();
        assert!(content.contains("[impact]"));
        assert!(content.contains("per_unit_contribution"));
    }

    #[test]
    fn test_config_init_does_not_overwrite() {
        let dir = create_temp_project();
        fs::create_dir_all(dir.path().join(".refurb")).unwrap();
        fs::write(dir.path().join(".refurb/portal.toml"), "[server]\nport = 9000\n").unwrap();

        refurb()
            .current_dir(dir.path())
            .args(["config", "init"])
            .assert()
            .success()
            .stdout(predicate::str::contains("already exists"));

        let content = fs::read_to_string(dir.path().join(".refurb/portal.toml")).unwrap();
        assert!(content.contains("9000"));
    }

    #[test]
    fn test_config_validate_reports_warnings() {
        let dir = create_temp_project();
        fs::create_dir_all(dir.path().join(".refurb")).unwrap();
        fs::write(
            dir.path().join(".refurb/portal.toml"),
            "[impact]\nunit_size = 0.0\n",
        )
        .unwrap();

        refurb()
            .current_dir(dir.path())
            .args(["config", "validate"])
            .assert()
            .success()
            .stdout(predicate::str::contains("unit_size"));
    }

    #[test]
    fn test_config_validate_defaults() {
        let dir = create_temp_project();
        refurb()
            .current_dir(dir.path())
            .args(["config", "validate"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Using defaults"));
    }

    #[test]
    fn test_config_show_explicit_path() {
        let dir = create_temp_project();
        let path = dir.path().join("custom.toml");
        fs::write(&path, "[server]\nport = 4100\n").unwrap();

        refurb()
            .current_dir(dir.path())
            .arg("--config")
            .arg(&path)
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("port = 4100"));
    }

    #[test]
    fn test_malformed_config_fails() {
        let dir = create_temp_project();
        fs::create_dir_all(dir.path().join(".refurb")).unwrap();
        fs::write(dir.path().join(".refurb/portal.toml"), "[server\nport = ").unwrap();

        refurb()
            .current_dir(dir.path())
            .args(["milestone", "10"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("portal.toml"));
    }
}

// =============================================================================
// Database Seeding
// =============================================================================

mod records {
    use super::*;

    #[test]
    fn test_init_db_creates_database() {
        let dir = create_temp_project();
        refurb()
            .current_dir(dir.path())
            .arg("init-db")
            .assert()
            .success()
            .stdout(predicate::str::contains("Portal database initialized"));

        assert!(dir.path().join(".refurb/portal.db").exists());
    }

    #[test]
    fn test_init_db_custom_path() {
        let dir = create_temp_project();
        refurb()
            .current_dir(dir.path())
            .args(["init-db", "--db-path", "data/other.db"])
            .assert()
            .success();

        assert!(dir.path().join("data/other.db").exists());
    }

    #[test]
    fn test_customer_add() {
        let dir = create_temp_project();
        refurb()
            .current_dir(dir.path())
            .args([
                "customer",
                "add",
                "buyer@example.com",
                "--password",
                "secret",
                "--name",
                "Buyer Co",
            ])
            .assert()
            .success()
            .stdout(predicate::str::contains("buyer@example.com"))
            .stdout(predicate::str::contains("Buyer Co"));
    }

    #[test]
    fn test_customer_add_duplicate_fails() {
        let dir = create_temp_project();
        add_customer(&dir, "buyer@example.com");

        refurb()
            .current_dir(dir.path())
            .args(["customer", "add", "buyer@example.com", "--password", "x"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("already exists"));
    }

    #[test]
    fn test_order_add() {
        let dir = create_temp_project();
        add_customer(&dir, "buyer@example.com");

        refurb()
            .current_dir(dir.path())
            .args([
                "order",
                "add",
                "buyer@example.com",
                "--model",
                "ThinkPad T480",
                "--quantity",
                "4",
                "--status",
                "shipped",
            ])
            .assert()
            .success()
            .stdout(predicate::str::contains("RF-"))
            .stdout(predicate::str::contains("4 x ThinkPad T480"))
            .stdout(predicate::str::contains("shipped"));
    }

    #[test]
    fn test_order_add_unknown_customer_fails() {
        let dir = create_temp_project();
        refurb()
            .current_dir(dir.path())
            .args(["order", "add", "ghost@example.com", "--model", "X1"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("ghost@example.com"));
    }

    #[test]
    fn test_order_add_rejects_bad_status() {
        let dir = create_temp_project();
        add_customer(&dir, "buyer@example.com");

        refurb()
            .current_dir(dir.path())
            .args([
                "order",
                "add",
                "buyer@example.com",
                "--model",
                "X1",
                "--status",
                "unknown",
            ])
            .assert()
            .failure();
    }
}
