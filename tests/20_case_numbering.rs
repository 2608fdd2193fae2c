mod common;

use anyhow::Result;
use chrono::{Datelike, Utc};
use reqwest::StatusCode;
use serde_json::json;

// One test per binary: the numbering below assumes nothing else creates cases
// or invoices on this server.
#[tokio::test]
async fn cases_and_invoices_are_numbered_sequentially_per_year() -> Result<()> {
    let server = common::ensure_server().await?;
    let admin = common::admin_token(server).await?;
    let year = Utc::now().year();

    let client_id = common::create_client(server, &admin, "Numbering Co").await?;

    for n in 1..=3 {
        let (status, body) = common::post(
            server,
            &admin,
            "/api/cases",
            json!({ "title": format!("Matter {}", n), "client_id": client_id }),
        )
        .await?;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        assert_eq!(body["data"]["case_number"], format!("CASE-{}-{:04}", year, n));
        assert_eq!(body["data"]["number_degraded"], false);
    }

    // A supplied number is kept, and does not consume a sequence value.
    let (status, body) = common::post(
        server,
        &admin,
        "/api/cases",
        json!({ "title": "Imported", "client_id": client_id, "case_number": "CASE-2019-0042" }),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["data"]["case_number"], "CASE-2019-0042");

    // Reusing a number is a conflict.
    let (status, body) = common::post(
        server,
        &admin,
        "/api/cases",
        json!({ "title": "Duplicate", "client_id": client_id, "case_number": "CASE-2019-0042" }),
    )
    .await?;
    assert_eq!(status, StatusCode::CONFLICT, "{}", body);

    let (status, body) = common::post(
        server,
        &admin,
        "/api/cases",
        json!({ "title": "Matter 4", "client_id": client_id }),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["data"]["case_number"], format!("CASE-{}-0004", year));

    // Invoices run on their own sequence.
    for n in 1..=2 {
        let (status, body) = common::post(
            server,
            &admin,
            "/api/invoices",
            json!({
                "client_id": client_id,
                "items": [{ "description": "Consultation", "quantity": "1", "rate": "250.00" }]
            }),
        )
        .await?;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        assert_eq!(body["data"]["invoice_number"], format!("INV-{}-{:04}", year, n));
    }

    let (status, body) = common::get(server, &admin, "/api/cases?degraded=true").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().map(Vec::len), Some(0));
    Ok(())
}
