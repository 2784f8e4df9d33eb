mod common;

use anyhow::Result;
use axum::http::StatusCode;
use common::{body_to_vec, error_message, json_body, TestApp};
use serde::Deserialize;
use uuid::Uuid;

#[derive(Deserialize)]
struct RecipientResponse {
    id: Uuid,
    name: String,
    street: Option<String>,
    #[allow(dead_code)]
    number: Option<String>,
    complement: Option<String>,
    state: Option<String>,
    #[allow(dead_code)]
    city: Option<String>,
    #[allow(dead_code)]
    zip_code: Option<String>,
}

#[tokio::test]
async fn recipient_crud_flow() -> Result<()> {
    let app = TestApp::new();
    app.insert_user("Admin", "admin@fastfeet.com", "123456")
        .await?;
    let token = app.login_token("admin@fastfeet.com", "123456").await?;

    let create = app
        .post_json(
            "/recipients",
            &serde_json::json!({
                "name": "Ana Souza",
                "street": "Rua Beco das Garrafas",
                "number": "42",
                "state": "RJ",
                "city": "Rio de Janeiro",
                "zip_code": "22011-010"
            }),
            Some(&token),
        )
        .await?;
    assert_eq!(create.status(), StatusCode::OK);
    let created: RecipientResponse = serde_json::from_slice(&body_to_vec(create.into_body()).await?)?;
    assert_eq!(created.name, "Ana Souza");
    assert_eq!(created.state.as_deref(), Some("RJ"));
    assert_eq!(created.complement, None);

    let duplicate = app
        .post_json(
            "/recipients",
            &serde_json::json!({"name": "Ana Souza"}),
            Some(&token),
        )
        .await?;
    assert_eq!(duplicate.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_message(duplicate).await?, "Recipient already exists.");

    let update = app
        .put_json(
            &format!("/recipients/{}", created.id),
            &serde_json::json!({
                "street": "Avenida Atlântica",
                "complement": "Apto 71"
            }),
            Some(&token),
        )
        .await?;
    assert_eq!(update.status(), StatusCode::OK);
    let updated: RecipientResponse = serde_json::from_slice(&body_to_vec(update.into_body()).await?)?;
    assert_eq!(updated.street.as_deref(), Some("Avenida Atlântica"));
    assert_eq!(updated.complement.as_deref(), Some("Apto 71"));
    assert_eq!(updated.name, "Ana Souza");

    let missing = app
        .put_json(
            &format!("/recipients/{}", Uuid::new_v4()),
            &serde_json::json!({"street": "anywhere"}),
            Some(&token),
        )
        .await?;
    assert_eq!(missing.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_message(missing).await?, "Recipient not found.");

    Ok(())
}

#[tokio::test]
async fn renaming_onto_an_existing_recipient_is_refused() -> Result<()> {
    let app = TestApp::new();
    app.insert_user("Admin", "admin@fastfeet.com", "123456")
        .await?;
    let token = app.login_token("admin@fastfeet.com", "123456").await?;

    app.post_json(
        "/recipients",
        &serde_json::json!({"name": "Ana Souza"}),
        Some(&token),
    )
    .await?;
    let second = app
        .post_json(
            "/recipients",
            &serde_json::json!({"name": "Bruno Lima"}),
            Some(&token),
        )
        .await?;
    let second: RecipientResponse = serde_json::from_slice(&body_to_vec(second.into_body()).await?)?;

    let clash = app
        .put_json(
            &format!("/recipients/{}", second.id),
            &serde_json::json!({"name": "Ana Souza"}),
            Some(&token),
        )
        .await?;
    assert_eq!(clash.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_message(clash).await?, "Recipient already exists.");

    // Re-sending the current name is a no-op, not a clash.
    let same = app
        .put_json(
            &format!("/recipients/{}", second.id),
            &serde_json::json!({"name": "Bruno Lima", "city": "Recife"}),
            Some(&token),
        )
        .await?;
    assert_eq!(same.status(), StatusCode::OK);

    Ok(())
}

#[tokio::test]
async fn recipient_payload_is_validated() -> Result<()> {
    let app = TestApp::new();
    app.insert_user("Admin", "admin@fastfeet.com", "123456")
        .await?;
    let token = app.login_token("admin@fastfeet.com", "123456").await?;

    let nameless = app
        .post_json(
            "/recipients",
            &serde_json::json!({"city": "Recife"}),
            Some(&token),
        )
        .await?;
    assert_eq!(nameless.status(), StatusCode::BAD_REQUEST);
    let body = json_body(nameless).await?;
    assert_eq!(body["error"], "Validation failed.");
    assert!(body["errors"]
        .as_array()
        .unwrap()
        .iter()
        .any(|m| m == "name is a required field"));

    let long_state = app
        .post_json(
            "/recipients",
            &serde_json::json!({"name": "Carla", "state": "RIO"}),
            Some(&token),
        )
        .await?;
    assert_eq!(long_state.status(), StatusCode::BAD_REQUEST);
    let body = json_body(long_state).await?;
    assert!(body["errors"]
        .as_array()
        .unwrap()
        .iter()
        .any(|m| m == "state must be at most 2 characters"));

    Ok(())
}

#[tokio::test]
async fn listing_paginates_and_filters() -> Result<()> {
    let app = TestApp::new();
    app.insert_user("Admin", "admin@fastfeet.com", "123456")
        .await?;
    let token = app.login_token("admin@fastfeet.com", "123456").await?;

    for name in ["Ana", "Amanda", "Bruno"] {
        let response = app
            .post_json(
                "/recipients",
                &serde_json::json!({"name": name}),
                Some(&token),
            )
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
    }

    let first_page = app.get("/recipients?pageLimit=2", Some(&token)).await?;
    assert_eq!(first_page.status(), StatusCode::OK);
    assert_eq!(first_page.headers()["x-api-total"], "3");
    assert_eq!(first_page.headers()["x-api-totalpages"], "2");
    let rows: Vec<RecipientResponse> =
        serde_json::from_slice(&body_to_vec(first_page.into_body()).await?)?;
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].name, "Ana");
    assert_eq!(rows[1].name, "Amanda");

    let second_page = app
        .get("/recipients?page=2&pageLimit=2", Some(&token))
        .await?;
    let rows: Vec<RecipientResponse> =
        serde_json::from_slice(&body_to_vec(second_page.into_body()).await?)?;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].name, "Bruno");

    let filtered = app.get("/recipients?q=an", Some(&token)).await?;
    assert_eq!(filtered.headers()["x-api-total"], "2");
    let rows: Vec<RecipientResponse> =
        serde_json::from_slice(&body_to_vec(filtered.into_body()).await?)?;
    let names: Vec<&str> = rows.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["Ana", "Amanda"]);

    Ok(())
}
