#![allow(dead_code)]

use std::path::Path;
use std::process::Output;

use serde_json::{Value, json};
use tokio::process::Command;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub fn user() -> Value {
    json!({ "id": 7, "username": "alice", "email": "alice@example.com", "roles": ["athlete"] })
}

/// Mount login, verify and refresh endpoints on `server`.
pub async fn mount_backend(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 1,
            "info": "ok",
            "data": { "token": "T1", "user": user(), "expiresIn": 3_600_000 }
        })))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .and(header("authorization", "Bearer T1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token": "T2",
            "user": user(),
            "expiresIn": 3_600_000
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/auth/verify"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 1,
            "data": { "user": user() }
        })))
        .mount(server)
        .await;
}

/// Run the CLI against `server` with session files under `data_dir`.
pub async fn run_cli(args: &[&str], server: &MockServer, data_dir: &Path) -> Output {
    Command::new(env!("CARGO_BIN_EXE_pulseauth"))
        .args(args)
        .env("PULSEAUTH_API_URL", server.uri())
        .env("PULSEAUTH_DATA_DIR", data_dir)
        .env_remove("PULSEAUTH_PASSWORD")
        .env_remove("PULSEAUTH_LEAD_TIME_SECS")
        .env("NO_COLOR", "1")
        .output()
        .await
        .expect("Failed to execute CLI")
}

/// Run the CLI and expect success, returning stdout.
pub async fn run_cli_success(args: &[&str], server: &MockServer, data_dir: &Path) -> String {
    let output = run_cli(args, server, data_dir).await;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        panic!("CLI command failed: {:?}\nstderr: {}", args, stderr);
    }
    String::from_utf8_lossy(&output.stdout).to_string()
}

pub fn stored_session(data_dir: &Path) -> Option<Value> {
    let raw = std::fs::read_to_string(data_dir.join("session")).ok()?;
    Some(serde_json::from_str(&raw).expect("session file is JSON"))
}
