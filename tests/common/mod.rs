#![allow(dead_code)]

use std::process::{Child, Command, Stdio};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use reqwest::StatusCode;
use serde_json::{json, Value};

pub const ADMIN_EMAIL: &str = "admin@lexcase.test";
pub const ADMIN_PASSWORD: &str = "admin-password";

static SERVER: OnceLock<TestServer> = OnceLock::new();

pub struct TestServer {
    pub port: u16,
    pub base_url: String,
    child: Child,
}

impl TestServer {
    fn spawn() -> Result<Self> {
        // Pick an unused port for isolation
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);

        // Each test binary gets its own server with a fresh in-memory store
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_lexcase-api"));
        cmd.env("LEXCASE_API_PORT", port.to_string())
            .env("APP_ENV", "development")
            .env("STORAGE_BACKEND", "memory")
            .env("JWT_SECRET", "integration-test-secret")
            .env("STORAGE_BOOTSTRAP_ADMIN_EMAIL", ADMIN_EMAIL)
            .env("STORAGE_BOOTSTRAP_ADMIN_PASSWORD", ADMIN_PASSWORD)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());

        let child = cmd.spawn().context("failed to spawn server binary")?;

        Ok(Self { port, base_url, child })
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let client = reqwest::Client::new();
        let deadline = Instant::now() + timeout;
        loop {
            if Instant::now() > deadline {
                break;
            }
            let url = format!("{}/health", self.base_url);
            if let Ok(resp) = client.get(&url).send().await {
                if resp.status() == StatusCode::OK {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(150)).await;
        }
        anyhow::bail!("server did not become ready on {} within {:?}", self.base_url, timeout)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

pub async fn ensure_server() -> Result<&'static TestServer> {
    let server = SERVER.get_or_init(|| TestServer::spawn().expect("failed to spawn server binary"));
    server.wait_ready(Duration::from_secs(10)).await?;
    Ok(server)
}

/// Log in and return the bearer token.
pub async fn login(server: &TestServer, email: &str, password: &str) -> Result<String> {
    let res = reqwest::Client::new()
        .post(server.url("/auth/login"))
        .json(&json!({ "email": email, "password": password }))
        .send()
        .await?;
    anyhow::ensure!(res.status() == StatusCode::OK, "login for {} failed: {}", email, res.status());
    let body: Value = res.json().await?;
    body["data"]["token"]
        .as_str()
        .map(str::to_string)
        .context("login response has no token")
}

pub async fn admin_token(server: &TestServer) -> Result<String> {
    login(server, ADMIN_EMAIL, ADMIN_PASSWORD).await
}

/// POST `body` as `token` and return status plus parsed JSON.
pub async fn post(server: &TestServer, token: &str, path: &str, body: Value) -> Result<(StatusCode, Value)> {
    let res = reqwest::Client::new()
        .post(server.url(path))
        .bearer_auth(token)
        .json(&body)
        .send()
        .await?;
    let status = res.status();
    Ok((status, res.json().await.unwrap_or(Value::Null)))
}

pub async fn get(server: &TestServer, token: &str, path: &str) -> Result<(StatusCode, Value)> {
    let res = reqwest::Client::new()
        .get(server.url(path))
        .bearer_auth(token)
        .send()
        .await?;
    let status = res.status();
    Ok((status, res.json().await.unwrap_or(Value::Null)))
}

/// Create a user as admin and return its id.
pub async fn create_user(server: &TestServer, admin: &str, email: &str, role: &str) -> Result<String> {
    let (status, body) = post(
        server,
        admin,
        "/api/users",
        json!({ "name": email, "email": email, "password": "password123", "role": role }),
    )
    .await?;
    anyhow::ensure!(status == StatusCode::CREATED, "create user {} failed: {} {}", email, status, body);
    body["data"]["id"].as_str().map(str::to_string).context("user has no id")
}

/// Create a client record and return its id.
pub async fn create_client(server: &TestServer, token: &str, name: &str) -> Result<String> {
    let (status, body) = post(server, token, "/api/clients", json!({ "name": name })).await?;
    anyhow::ensure!(status == StatusCode::CREATED, "create client failed: {} {}", status, body);
    body["data"]["id"].as_str().map(str::to_string).context("client has no id")
}
