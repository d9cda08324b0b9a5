mod common;

use anyhow::Result;
use axum::http::StatusCode;
use common::{acquire_db_lock, body_to_vec, TestApp};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

#[derive(Deserialize)]
struct EntityInfo {
    id: Uuid,
    name: String,
    code: String,
    kind: String,
    folder_path: Option<String>,
    auto_create_folder: bool,
    document_count: i64,
}

#[tokio::test]
async fn creating_an_entity_provisions_its_folder() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    let response = app
        .post_json(
            "/api/entities",
            &json!({
                "name": "Acme Corporation",
                "code": "ACME",
                "is_company": true
            }),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_to_vec(response.into_body()).await?;
    let entity: EntityInfo = serde_json::from_slice(&body)?;

    assert_eq!(entity.name, "Acme Corporation");
    assert_eq!(entity.code, "ACME");
    assert_eq!(entity.kind, "company");
    assert_eq!(entity.document_count, 0);
    assert!(entity.auto_create_folder);

    let expected_dir = app.main_folder().join("Acme_Corporation");
    assert!(expected_dir.is_dir(), "entity folder should exist on disk");
    assert_eq!(
        entity.folder_path.as_deref(),
        Some(expected_dir.to_str().unwrap())
    );

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn renaming_an_entity_keeps_the_original_folder() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    let response = app
        .post_json("/api/entities", &json!({"name": "Gomez y Asociados"}))
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_to_vec(response.into_body()).await?;
    let entity: EntityInfo = serde_json::from_slice(&body)?;
    let original_path = entity.folder_path.clone().expect("folder path set");

    let response = app
        .patch_json(
            &format!("/api/entities/{}", entity.id),
            &json!({"name": "Gomez Asociados SC"}),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_to_vec(response.into_body()).await?;
    let renamed: EntityInfo = serde_json::from_slice(&body)?;

    assert_eq!(renamed.name, "Gomez Asociados SC");
    assert_eq!(renamed.folder_path.as_deref(), Some(original_path.as_str()));
    assert!(app.main_folder().join("Gomez_y_Asociados").is_dir());
    assert!(!app.main_folder().join("Gomez_Asociados_SC").exists());

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn duplicate_entity_codes_are_rejected() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    let first = app
        .post_json("/api/entities", &json!({"name": "Alpha", "code": "AL"}))
        .await?;
    assert_eq!(first.status(), StatusCode::CREATED);

    let second = app
        .post_json("/api/entities", &json!({"name": "Aluminium Ltd", "code": "AL"}))
        .await?;
    assert_eq!(second.status(), StatusCode::BAD_REQUEST);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn enabling_auto_provisioning_creates_the_folder_later() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    let response = app
        .post_json(
            "/api/entities",
            &json!({"name": "Manual Only", "auto_create_folder": false}),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_to_vec(response.into_body()).await?;
    let entity: EntityInfo = serde_json::from_slice(&body)?;
    assert!(entity.folder_path.is_none());
    assert!(!app.main_folder().join("Manual_Only").exists());

    let response = app
        .patch_json(
            &format!("/api/entities/{}", entity.id),
            &json!({"auto_create_folder": true}),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_to_vec(response.into_body()).await?;
    let updated: EntityInfo = serde_json::from_slice(&body)?;

    assert!(updated.folder_path.is_some());
    assert!(app.main_folder().join("Manual_Only").is_dir());

    app.cleanup().await?;
    Ok(())
}
