mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::json;

#[tokio::test]
async fn health_endpoint_reports_storage() -> Result<()> {
    let server = common::ensure_server().await?;

    let res = reqwest::Client::new().get(server.url("/health")).send().await?;
    assert_eq!(res.status(), StatusCode::OK);

    let body = res.json::<serde_json::Value>().await?;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["storage"], "memory");
    assert_eq!(body["data"]["degraded_identifiers"], 0);
    Ok(())
}

#[tokio::test]
async fn bootstrap_admin_can_log_in_and_whoami() -> Result<()> {
    let server = common::ensure_server().await?;
    let token = common::admin_token(server).await?;

    let (status, body) = common::get(server, &token, "/api/auth/whoami").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["email"], common::ADMIN_EMAIL);
    assert_eq!(body["data"]["role"], "admin");
    assert!(body["data"].get("password_hash").is_none(), "hash leaked: {}", body);
    Ok(())
}

#[tokio::test]
async fn wrong_password_is_unauthorized() -> Result<()> {
    let server = common::ensure_server().await?;

    let res = reqwest::Client::new()
        .post(server.url("/auth/login"))
        .json(&json!({ "email": common::ADMIN_EMAIL, "password": "not-the-password" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let body = res.json::<serde_json::Value>().await?;
    assert_eq!(body["error"], true);
    assert_eq!(body["code"], "UNAUTHORIZED");
    Ok(())
}

#[tokio::test]
async fn protected_routes_require_a_token() -> Result<()> {
    let server = common::ensure_server().await?;

    let res = reqwest::Client::new().get(server.url("/api/cases")).send().await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let (status, _) = common::get(server, "not.a.jwt", "/api/cases").await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn malformed_login_body_is_a_bad_request() -> Result<()> {
    let server = common::ensure_server().await?;

    let res = reqwest::Client::new()
        .post(server.url("/auth/login"))
        .header("content-type", "application/json")
        .body("{ not json")
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn registered_client_gets_a_token_but_no_staff_access() -> Result<()> {
    let server = common::ensure_server().await?;

    let res = reqwest::Client::new()
        .post(server.url("/auth/register"))
        .json(&json!({ "name": "Pat Client", "email": "pat@home.test", "password": "password123" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::CREATED);
    let body = res.json::<serde_json::Value>().await?;
    let token = body["data"]["token"].as_str().unwrap().to_string();
    assert_eq!(body["data"]["user"]["role"], "client");

    let (status, _) = common::get(server, &token, "/api/users").await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, clients) = common::get(server, &token, "/api/clients").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(clients["data"].as_array().map(Vec::len), Some(1));
    Ok(())
}
