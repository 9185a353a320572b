use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;
use tempfile::TempDir;

/// Nothing listens here, so any request fails fast
const UNREACHABLE_API: &str = "http://127.0.0.1:9/api";

/// Where the cart for `UNREACHABLE_API` is kept
fn cart_file(dir: &Path) -> std::path::PathBuf {
    dir.join("carts").join("127.0.0.1_9_api.json")
}

fn ylab(data_dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("ylab").unwrap();
    cmd.env("YLAB_DATA_DIR", data_dir)
        .env("YLAB_API_URL", UNREACHABLE_API)
        .env_remove("YLAB_PASSWORD");
    cmd
}

fn seed_cart(dir: &Path) {
    let cart = r#"[
        {
            "resource": {
                "id": 1,
                "name": "Raspberry Pi 5",
                "cost": 50,
                "quantity": 8,
                "max_per_team": 2,
                "type": "matériel",
                "is_active": true,
                "created_at": "2025-05-12T09:00:00Z",
                "updated_at": "2025-05-12T09:00:00Z"
            },
            "quantity": 2
        }
    ]"#;
    let path = cart_file(dir);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, cart).unwrap();
}

fn seed_session(dir: &Path, expires_at: &str) {
    let session = format!(
        r#"{{"token":"abc","role":"team","expires_at":"{}","name":"Alpha"}}"#,
        expires_at
    );
    std::fs::write(dir.join("session.json"), session).unwrap();
}

// =============================================================================
// GENERAL
// =============================================================================

#[test]
fn test_no_args_shows_help() {
    let dir = TempDir::new().unwrap();
    ylab(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage:"));
}

#[test]
fn test_version_flag() {
    let dir = TempDir::new().unwrap();
    ylab(dir.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("ylab"));
}

#[test]
fn test_help_flag() {
    let dir = TempDir::new().unwrap();
    ylab(dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("YLab Market"))
        .stdout(predicate::str::contains("cart"));
}

// =============================================================================
// CART (offline)
// =============================================================================

#[test]
fn test_empty_cart() {
    let dir = TempDir::new().unwrap();
    ylab(dir.path())
        .args(["cart", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Cart is empty."));
}

#[test]
fn test_empty_cart_json() {
    let dir = TempDir::new().unwrap();
    let output = ylab(dir.path())
        .args(["cart", "show", "--json"])
        .assert()
        .success();

    let stdout = String::from_utf8(output.get_output().stdout.clone()).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(parsed, serde_json::json!([]));
}

#[test]
fn test_seeded_cart_totals() {
    let dir = TempDir::new().unwrap();
    seed_cart(dir.path());

    ylab(dir.path())
        .args(["cart", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Raspberry Pi 5"))
        .stdout(predicate::str::contains("2 item(s), 100 credits"));
}

#[test]
fn test_set_to_zero_removes_item() {
    let dir = TempDir::new().unwrap();
    seed_cart(dir.path());

    ylab(dir.path())
        .args(["cart", "set", "1", "0"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Cart is empty."));

    ylab(dir.path())
        .args(["cart", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Cart is empty."));
}

#[test]
fn test_remove_unknown_item() {
    let dir = TempDir::new().unwrap();
    ylab(dir.path())
        .args(["cart", "remove", "3"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("not in the cart"));
}

#[test]
fn test_clear_cart() {
    let dir = TempDir::new().unwrap();
    seed_cart(dir.path());

    ylab(dir.path())
        .args(["cart", "clear"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Cart is empty."));
}

#[test]
fn test_cart_is_kept_per_server() {
    let dir = TempDir::new().unwrap();
    seed_cart(dir.path());

    ylab(dir.path())
        .args(["--api-url", "http://other-server.invalid/api", "cart", "show", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Raspberry Pi 5").not());

    ylab(dir.path())
        .args(["cart", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Raspberry Pi 5"));
}

#[test]
fn test_corrupt_cart_file() {
    let dir = TempDir::new().unwrap();
    let path = cart_file(dir.path());
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, "{oops").unwrap();

    ylab(dir.path())
        .args(["cart", "show"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("corrupt"));
}

#[test]
fn test_checkout_rejects_short_comment() {
    let dir = TempDir::new().unwrap();
    seed_cart(dir.path());

    ylab(dir.path())
        .args(["cart", "checkout", "--comment", "too short"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Comment must be at least 10 characters"));
}

#[test]
fn test_checkout_empty_cart() {
    let dir = TempDir::new().unwrap();
    ylab(dir.path())
        .args(["cart", "checkout", "--comment", "Pour le prototype IoT"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("the cart is empty"));
}

// =============================================================================
// AUTHENTICATION REQUIRED (exit 3)
// =============================================================================

#[test]
fn test_checkout_requires_login() {
    let dir = TempDir::new().unwrap();
    seed_cart(dir.path());

    ylab(dir.path())
        .args(["cart", "checkout", "--comment", "Pour le prototype IoT"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("Not logged in"));
}

#[test]
fn test_cart_add_requires_login() {
    let dir = TempDir::new().unwrap();
    ylab(dir.path())
        .args(["cart", "add", "1", "2"])
        .assert()
        .code(3);
}

#[test]
fn test_orders_requires_login() {
    let dir = TempDir::new().unwrap();
    ylab(dir.path()).arg("orders").assert().code(3);
}

#[test]
fn test_whoami_without_session() {
    let dir = TempDir::new().unwrap();
    ylab(dir.path())
        .arg("whoami")
        .assert()
        .code(3)
        .stderr(predicate::str::contains("Not logged in"));
}

#[test]
fn test_expired_session_is_discarded() {
    let dir = TempDir::new().unwrap();
    seed_session(dir.path(), "2020-01-01T00:00:00Z");

    ylab(dir.path()).arg("orders").assert().code(3);
    assert!(!dir.path().join("session.json").exists());
}

#[test]
fn test_admin_commands_need_admin_session() {
    let dir = TempDir::new().unwrap();
    seed_session(dir.path(), "2999-01-01T00:00:00Z");

    ylab(dir.path())
        .args(["admin", "teams"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("requires the admin role"));
}

#[test]
fn test_logout_without_session() {
    let dir = TempDir::new().unwrap();
    ylab(dir.path())
        .arg("logout")
        .assert()
        .success()
        .stdout(predicate::str::contains("Not logged in."));
}

// =============================================================================
// INPUT AND API ERRORS
// =============================================================================

#[test]
fn test_decide_batch_rejects_malformed_items() {
    let dir = TempDir::new().unwrap();
    ylab(dir.path())
        .args(["admin", "decide-batch", "12:confirm", "13:approve"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Invalid action 'approve'"));
}

#[test]
fn test_vote_rejects_zero_stake() {
    let dir = TempDir::new().unwrap();
    ylab(dir.path())
        .args(["vote", "1", "Oui", "--stake", "0"])
        .assert()
        .code(1);
}

#[test]
fn test_profile_email_is_validated_locally() {
    let dir = TempDir::new().unwrap();
    ylab(dir.path())
        .args(["profile", "email", "not-an-email"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Invalid email format"));
}

#[test]
fn test_unreachable_api() {
    let dir = TempDir::new().unwrap();
    ylab(dir.path())
        .args(["catalog", "list"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Request failed"));
}

#[test]
fn test_login_with_unreachable_api() {
    let dir = TempDir::new().unwrap();
    ylab(dir.path())
        .args(["login", "team", "Alpha", "--password", "secret"])
        .assert()
        .code(2);
    assert!(!dir.path().join("session.json").exists());
}
