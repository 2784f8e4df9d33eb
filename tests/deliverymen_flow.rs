mod common;

use anyhow::Result;
use axum::http::{Method, StatusCode};
use common::{body_to_vec, day_at, error_message, TestApp};
use serde::Deserialize;
use uuid::Uuid;

#[derive(Deserialize)]
struct DeliverymanResponse {
    id: Uuid,
    name: String,
    email: String,
    avatar_id: Option<Uuid>,
    avatar: Option<FileInfo>,
}

#[derive(Deserialize)]
struct FileInfo {
    id: Uuid,
    name: String,
    #[allow(dead_code)]
    path: String,
    url: String,
}

#[derive(Deserialize)]
struct DeliveryRow {
    id: Uuid,
    product: String,
    status: String,
    deliveryman_id: Option<Uuid>,
    deliveryman: Option<DeliverymanResponse>,
}

#[tokio::test]
async fn deliveryman_crud_with_avatar() -> Result<()> {
    let app = TestApp::new();
    app.insert_user("Admin", "admin@fastfeet.com", "123456")
        .await?;
    let token = app.login_token("admin@fastfeet.com", "123456").await?;

    let create = app
        .post_json(
            "/deliverymen",
            &serde_json::json!({"name": "John Doe", "email": "john@fastfeet.com"}),
            Some(&token),
        )
        .await?;
    assert_eq!(create.status(), StatusCode::OK);
    let created: DeliverymanResponse =
        serde_json::from_slice(&body_to_vec(create.into_body()).await?)?;
    assert_eq!(created.name, "John Doe");
    assert_eq!(created.email, "john@fastfeet.com");
    assert!(created.avatar.is_none());

    // Same email under another name still counts as a duplicate.
    let duplicate = app
        .post_json(
            "/deliverymen",
            &serde_json::json!({"name": "Johnny", "email": "john@fastfeet.com"}),
            Some(&token),
        )
        .await?;
    assert_eq!(duplicate.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_message(duplicate).await?, "Deliveryman already exists.");

    let upload = app
        .send_file(
            Method::POST,
            "/files",
            "file",
            "avatar.jpg",
            "image/jpeg",
            b"jpeg bytes",
            Some(&token),
        )
        .await?;
    assert_eq!(upload.status(), StatusCode::OK);
    let avatar: FileInfo = serde_json::from_slice(&body_to_vec(upload.into_body()).await?)?;

    let update = app
        .put_json(
            &format!("/deliverymen/{}", created.id),
            &serde_json::json!({"avatar_id": avatar.id}),
            Some(&token),
        )
        .await?;
    assert_eq!(update.status(), StatusCode::OK);
    let updated: DeliverymanResponse =
        serde_json::from_slice(&body_to_vec(update.into_body()).await?)?;
    assert_eq!(updated.avatar_id, Some(avatar.id));
    let embedded = updated.avatar.expect("avatar embed");
    assert_eq!(embedded.name, "avatar.jpg");
    assert!(embedded.url.starts_with("http://localhost:3333/files/"));

    let listing = app.get("/deliverymen", Some(&token)).await?;
    assert_eq!(listing.headers()["x-api-total"], "1");
    let rows: Vec<DeliverymanResponse> =
        serde_json::from_slice(&body_to_vec(listing.into_body()).await?)?;
    assert_eq!(rows.len(), 1);
    assert!(rows[0].avatar.is_some());

    let bad_avatar = app
        .put_json(
            &format!("/deliverymen/{}", created.id),
            &serde_json::json!({"avatar_id": Uuid::new_v4()}),
            Some(&token),
        )
        .await?;
    assert_eq!(bad_avatar.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_message(bad_avatar).await?, "Avatar not found.");

    Ok(())
}

#[tokio::test]
async fn update_duplicate_checks_name_and_email_separately() -> Result<()> {
    let app = TestApp::new();
    app.insert_user("Admin", "admin@fastfeet.com", "123456")
        .await?;
    let token = app.login_token("admin@fastfeet.com", "123456").await?;

    app.create_deliveryman(&token, "John Doe", "john@fastfeet.com")
        .await?;
    let second = app
        .create_deliveryman(&token, "Jane Roe", "jane@fastfeet.com")
        .await?;

    let name_clash = app
        .put_json(
            &format!("/deliverymen/{second}"),
            &serde_json::json!({"name": "John Doe"}),
            Some(&token),
        )
        .await?;
    assert_eq!(name_clash.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_message(name_clash).await?, "Name already exists.");

    let email_clash = app
        .put_json(
            &format!("/deliverymen/{second}"),
            &serde_json::json!({"email": "john@fastfeet.com"}),
            Some(&token),
        )
        .await?;
    assert_eq!(email_clash.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_message(email_clash).await?, "Email already exists.");

    // Keeping the current values is allowed.
    let same = app
        .put_json(
            &format!("/deliverymen/{second}"),
            &serde_json::json!({"name": "Jane Roe", "email": "jane@fastfeet.com"}),
            Some(&token),
        )
        .await?;
    assert_eq!(same.status(), StatusCode::OK);

    let unknown = app
        .put_json(
            &format!("/deliverymen/{}", Uuid::new_v4()),
            &serde_json::json!({"name": "Nobody"}),
            Some(&token),
        )
        .await?;
    assert_eq!(unknown.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_message(unknown).await?, "Deliveryman not found.");

    Ok(())
}

#[tokio::test]
async fn deleting_a_deliveryman_detaches_his_deliveries() -> Result<()> {
    let app = TestApp::new();
    app.insert_user("Admin", "admin@fastfeet.com", "123456")
        .await?;
    let token = app.login_token("admin@fastfeet.com", "123456").await?;

    let recipient = app.create_recipient(&token, "Ana Souza").await?;
    let deliveryman = app
        .create_deliveryman(&token, "John Doe", "john@fastfeet.com")
        .await?;
    let delivery = app
        .create_delivery(&token, recipient, deliveryman, "Monitor")
        .await?;

    let removal = app
        .delete(&format!("/deliverymen/{deliveryman}"), Some(&token))
        .await?;
    assert_eq!(removal.status(), StatusCode::OK);

    let reloaded = app
        .get(&format!("/deliveries/{delivery}"), Some(&token))
        .await?;
    let row: DeliveryRow = serde_json::from_slice(&body_to_vec(reloaded.into_body()).await?)?;
    assert_eq!(row.deliveryman_id, None);
    assert!(row.deliveryman.is_none());

    let gone = app
        .delete(&format!("/deliverymen/{deliveryman}"), Some(&token))
        .await?;
    assert_eq!(gone.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_message(gone).await?, "Deliveryman not found.");

    Ok(())
}

#[tokio::test]
async fn own_delivery_listing_splits_on_delivered() -> Result<()> {
    let app = TestApp::new();
    app.insert_user("Admin", "admin@fastfeet.com", "123456")
        .await?;
    let token = app.login_token("admin@fastfeet.com", "123456").await?;

    let recipient = app.create_recipient(&token, "Ana Souza").await?;
    let deliveryman = app
        .create_deliveryman(&token, "John Doe", "john@fastfeet.com")
        .await?;

    let pending = app
        .create_delivery(&token, recipient, deliveryman, "Pending parcel")
        .await?;
    let finished = app
        .create_delivery(&token, recipient, deliveryman, "Finished parcel")
        .await?;
    let canceled = app
        .create_delivery(&token, recipient, deliveryman, "Canceled parcel")
        .await?;

    let collect = app
        .post_json(
            &format!("/deliveries/{finished}/collection"),
            &serde_json::json!({}),
            Some(&token),
        )
        .await?;
    assert_eq!(collect.status(), StatusCode::OK);
    app.set_now(day_at(15, 0, 0));
    let dropoff = app
        .send_file(
            Method::PUT,
            &format!("/deliveries/{finished}/collection"),
            "signature",
            "signature.png",
            "image/png",
            b"signature bytes",
            Some(&token),
        )
        .await?;
    assert_eq!(dropoff.status(), StatusCode::OK);

    let cancel = app
        .delete(&format!("/deliveries/{canceled}"), Some(&token))
        .await?;
    assert_eq!(cancel.status(), StatusCode::OK);

    let open = app
        .get(&format!("/deliverymen/{deliveryman}/deliveries"), Some(&token))
        .await?;
    assert_eq!(open.headers()["x-api-total"], "1");
    let rows: Vec<DeliveryRow> = serde_json::from_slice(&body_to_vec(open.into_body()).await?)?;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].id, pending);
    assert_eq!(rows[0].product, "Pending parcel");
    assert_eq!(rows[0].status, "pending");

    let done = app
        .get(
            &format!("/deliverymen/{deliveryman}/deliveries?delivered=true"),
            Some(&token),
        )
        .await?;
    let rows: Vec<DeliveryRow> = serde_json::from_slice(&body_to_vec(done.into_body()).await?)?;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].product, "Finished parcel");
    assert_eq!(rows[0].status, "delivered");

    // An empty `delivered` value still means the open deliveries.
    let empty_flag = app
        .get(
            &format!("/deliverymen/{deliveryman}/deliveries?delivered="),
            Some(&token),
        )
        .await?;
    let rows: Vec<DeliveryRow> =
        serde_json::from_slice(&body_to_vec(empty_flag.into_body()).await?)?;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].product, "Pending parcel");

    let unknown = app
        .get(
            &format!("/deliverymen/{}/deliveries", Uuid::new_v4()),
            Some(&token),
        )
        .await?;
    assert_eq!(unknown.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_message(unknown).await?, "Deliveryman not found.");

    Ok(())
}
