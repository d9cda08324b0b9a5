mod common;

use anyhow::Result;
use axum::http::StatusCode;
use common::{acquire_db_lock, body_to_vec, TestApp};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

#[derive(Deserialize)]
struct DocumentDetail {
    document: DocumentInfo,
    history: Vec<HistoryInfo>,
}

#[derive(Deserialize)]
struct DocumentInfo {
    id: Uuid,
    title: String,
    status: String,
    structured_name: String,
    display_name: String,
    suggested_filename: String,
    original_filename: Option<String>,
    assigned_user_ids: Vec<Uuid>,
}

#[derive(Deserialize)]
struct HistoryInfo {
    previous_status: Option<String>,
    new_status: String,
    change_reason: Option<String>,
}

#[derive(Deserialize)]
struct EntityInfo {
    id: Uuid,
}

#[derive(Deserialize)]
struct CategoryDetail {
    category: CategoryInfo,
}

#[derive(Deserialize)]
struct CategoryInfo {
    id: Uuid,
}

#[derive(Deserialize)]
struct DocumentTypeInfo {
    id: Uuid,
    name: String,
}

struct Catalog {
    entity_id: Uuid,
    category_id: Uuid,
    doc_type_id: Uuid,
}

async fn seed_catalog(app: &TestApp) -> Result<Catalog> {
    let response = app
        .post_json(
            "/api/entities",
            &json!({"name": "Acme Corporation", "code": "ABC", "is_company": true}),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    let entity: EntityInfo = serde_json::from_slice(&body_to_vec(response.into_body()).await?)?;

    let response = app
        .post_json("/api/categories", &json!({"name": "Fiscal", "code": "FIS"}))
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    let category: CategoryDetail =
        serde_json::from_slice(&body_to_vec(response.into_body()).await?)?;

    let response = app
        .post_json(
            "/api/document-types",
            &json!({"name": "Invoice", "code": "INV", "category_id": category.category.id}),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    let doc_type: DocumentTypeInfo =
        serde_json::from_slice(&body_to_vec(response.into_body()).await?)?;

    Ok(Catalog {
        entity_id: entity.id,
        category_id: category.category.id,
        doc_type_id: doc_type.id,
    })
}

#[tokio::test]
async fn upload_builds_names_and_opens_the_history() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    let admin = app.insert_user("admin", "admin").await?;
    let catalog = seed_catalog(&app).await?;

    let response = app
        .upload_document(
            "factura 42.pdf",
            b"%PDF-1.4 fake invoice",
            &[
                ("category_id", &catalog.category_id.to_string()),
                ("document_type_id", &catalog.doc_type_id.to_string()),
                ("entity_id", &catalog.entity_id.to_string()),
                ("document_date", "2025-10-14"),
                ("user_id", &admin.to_string()),
            ],
        )
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    let detail: DocumentDetail = serde_json::from_slice(&body_to_vec(response.into_body()).await?)?;

    assert_eq!(detail.document.title, "factura 42");
    assert_eq!(detail.document.status, "pending");
    assert_eq!(detail.document.structured_name, "ABC_FIS_INV_20251014");
    assert_eq!(
        detail.document.display_name,
        "Acme Corporation - Fiscal - Invoice - 14/10/2025"
    );
    assert_eq!(
        detail.document.suggested_filename,
        "ABC_FIS_INV_20251014.pdf"
    );
    assert_eq!(
        detail.document.original_filename.as_deref(),
        Some("factura 42.pdf")
    );
    assert_eq!(detail.history.len(), 1);
    assert_eq!(detail.history[0].previous_status, None);
    assert_eq!(detail.history[0].new_status, "pending");
    assert_eq!(detail.history[0].change_reason.as_deref(), Some("created"));

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn identical_bytes_resolve_to_the_existing_document() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;
    app.insert_user("admin", "admin").await?;

    let first = app
        .upload_document("scan.pdf", b"%PDF-1.4 same bytes", &[])
        .await?;
    assert_eq!(first.status(), StatusCode::CREATED);
    let first_detail: DocumentDetail =
        serde_json::from_slice(&body_to_vec(first.into_body()).await?)?;

    let second = app
        .upload_document("renamed.pdf", b"%PDF-1.4 same bytes", &[])
        .await?;
    assert_eq!(second.status(), StatusCode::OK);
    let second_detail: DocumentDetail =
        serde_json::from_slice(&body_to_vec(second.into_body()).await?)?;

    assert_eq!(first_detail.document.id, second_detail.document.id);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn only_pdf_uploads_are_accepted() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    let response = app.upload_document("notes.txt", b"plain text", &[]).await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn every_status_change_appends_exactly_one_history_row() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;
    let admin = app.insert_user("admin", "admin").await?;

    let response = app
        .upload_document("lifecycle.pdf", b"%PDF-1.4 lifecycle", &[])
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    let detail: DocumentDetail = serde_json::from_slice(&body_to_vec(response.into_body()).await?)?;
    let doc_id = detail.document.id;

    let response = app
        .post_json(
            &format!("/api/documents/{doc_id}/status"),
            &json!({"status": "approved", "user_id": admin, "reason": "looks good"}),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let change: serde_json::Value = serde_json::from_slice(&body_to_vec(response.into_body()).await?)?;
    assert_eq!(change["changed"], true);

    // Saving the same status again writes no row.
    let response = app
        .post_json(
            &format!("/api/documents/{doc_id}/status"),
            &json!({"status": "approved", "user_id": admin}),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let change: serde_json::Value = serde_json::from_slice(&body_to_vec(response.into_body()).await?)?;
    assert_eq!(change["changed"], false);

    // Editing unrelated fields writes no row either.
    let response = app
        .patch_json(
            &format!("/api/documents/{doc_id}"),
            &json!({"notes": "checked twice"}),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.get(&format!("/api/documents/{doc_id}")).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let detail: DocumentDetail = serde_json::from_slice(&body_to_vec(response.into_body()).await?)?;

    assert_eq!(detail.history.len(), 2);
    assert_eq!(detail.history[1].previous_status.as_deref(), Some("pending"));
    assert_eq!(detail.history[1].new_status, "approved");
    assert_eq!(detail.history[1].change_reason.as_deref(), Some("looks good"));

    let response = app
        .post_json(
            &format!("/api/documents/{doc_id}/status"),
            &json!({"status": "misfiled"}),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn uncategorized_documents_fall_back_to_their_title() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    let response = app
        .upload_document(
            "loose scan.pdf",
            b"%PDF-1.4 loose",
            &[("title", "Electricity bill")],
        )
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    let detail: DocumentDetail = serde_json::from_slice(&body_to_vec(response.into_body()).await?)?;

    assert_eq!(detail.document.structured_name, "Electricity bill");
    assert_eq!(detail.document.display_name, "Electricity bill");

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn serving_returns_the_stored_bytes_inline() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    let payload = b"%PDF-1.4 servable bytes";
    let response = app.upload_document("served.pdf", payload, &[]).await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    let detail: DocumentDetail = serde_json::from_slice(&body_to_vec(response.into_body()).await?)?;

    let response = app
        .get(&format!("/api/documents/{}/file", detail.document.id))
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok()),
        Some("application/pdf")
    );
    let disposition = response
        .headers()
        .get("content-disposition")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(disposition.starts_with("inline"));
    let bytes = body_to_vec(response.into_body()).await?;
    assert_eq!(bytes, payload);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn unassigned_users_cannot_see_other_peoples_documents() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    let admin = app.insert_user("admin", "admin").await?;
    let clerk = app.insert_user("clerk", "employee").await?;
    let auditor = app.insert_user("auditor", "employee").await?;

    let response = app
        .upload_document(
            "private.pdf",
            b"%PDF-1.4 private",
            &[
                ("user_id", &admin.to_string()),
                ("assigned_user_ids", &clerk.to_string()),
            ],
        )
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    let detail: DocumentDetail = serde_json::from_slice(&body_to_vec(response.into_body()).await?)?;
    let doc_id = detail.document.id;
    assert_eq!(detail.document.assigned_user_ids, vec![clerk]);

    // Denial is indistinguishable from a missing document.
    let response = app
        .get(&format!("/api/documents/{doc_id}?user_id={auditor}"))
        .await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let response = app
        .get(&format!("/api/documents/{doc_id}/file?user_id={auditor}"))
        .await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .get(&format!("/api/documents/{doc_id}?user_id={clerk}"))
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.get(&format!("/api/documents?user_id={auditor}")).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let listed: Vec<serde_json::Value> =
        serde_json::from_slice(&body_to_vec(response.into_body()).await?)?;
    assert!(listed.is_empty());

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn document_types_filter_by_category() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    let catalog = seed_catalog(&app).await?;

    let response = app
        .post_json("/api/categories", &json!({"name": "Legal", "code": "LEG"}))
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    let legal: CategoryDetail = serde_json::from_slice(&body_to_vec(response.into_body()).await?)?;

    let response = app
        .post_json(
            "/api/document-types",
            &json!({"name": "Contract", "code": "CON", "category_id": legal.category.id}),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .get(&format!(
            "/api/document-types?category_id={}",
            catalog.category_id
        ))
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let types: Vec<DocumentTypeInfo> =
        serde_json::from_slice(&body_to_vec(response.into_body()).await?)?;
    assert_eq!(types.len(), 1);
    assert_eq!(types[0].name, "Invoice");

    // The same code may exist under a different category.
    let response = app
        .post_json(
            "/api/document-types",
            &json!({"name": "Invoice copy", "code": "INV", "category_id": legal.category.id}),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);

    // But not twice within one category.
    let response = app
        .post_json(
            "/api/document-types",
            &json!({"name": "Another invoice", "code": "INV", "category_id": catalog.category_id}),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let _ = catalog.doc_type_id;
    app.cleanup().await?;
    Ok(())
}
