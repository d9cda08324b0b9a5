use std::{collections::HashMap, path::Path as FsPath};

use axum::extract::{Json, Multipart, Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, Utc};
use diesel::dsl::exists;
use diesel::{prelude::*, select, PgConnection};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{error, info};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::history;
use crate::models::{
    is_valid_payment_status, payment_status_label, status_label, Category, Document, DocumentType,
    Entity, NewDocument, NewDocumentAssignment, User, STATUS_PENDING,
};
use crate::naming::{self, NameSource};
use crate::schema::{
    categories, document_assignments, document_history, document_types, documents, entities, users,
};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct DocumentListQuery {
    pub status: Option<String>,
    pub category_id: Option<Uuid>,
    pub entity_id: Option<Uuid>,
    pub assigned_user_id: Option<Uuid>,
    pub search: Option<String>,
    pub user_id: Option<Uuid>,
}

#[derive(Deserialize)]
pub struct ActorQuery {
    pub user_id: Option<Uuid>,
}

#[derive(Serialize)]
pub struct DocumentResponse {
    pub id: Uuid,
    pub title: String,
    pub status: String,
    pub status_label: String,
    pub payment_status: String,
    pub payment_status_label: String,
    pub category_id: Option<Uuid>,
    pub category_name: Option<String>,
    pub document_type_id: Option<Uuid>,
    pub document_type_name: Option<String>,
    pub entity_id: Option<Uuid>,
    pub entity_name: Option<String>,
    pub document_date: Option<String>,
    pub due_date: Option<String>,
    pub notes: Option<String>,
    pub tags: Option<String>,
    pub original_filename: Option<String>,
    pub imported_from_folder: bool,
    pub structured_name: String,
    pub display_name: String,
    pub suggested_filename: String,
    pub created_by: Option<Uuid>,
    pub assigned_user_ids: Vec<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<i64>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Serialize)]
pub struct HistoryEntry {
    pub id: Uuid,
    pub previous_status: Option<String>,
    pub new_status: String,
    pub changed_by: Option<Uuid>,
    pub change_reason: Option<String>,
    pub created_at: String,
}

#[derive(Serialize)]
pub struct DocumentDetailResponse {
    pub document: DocumentResponse,
    pub history: Vec<HistoryEntry>,
}

#[derive(Deserialize)]
pub struct UpdateDocumentRequest {
    pub title: Option<String>,
    pub category_id: Option<Uuid>,
    pub document_type_id: Option<Uuid>,
    pub entity_id: Option<Uuid>,
    pub document_date: Option<String>,
    pub due_date: Option<String>,
    pub payment_status: Option<String>,
    pub status: Option<String>,
    pub notes: Option<String>,
    pub tags: Option<String>,
    pub user_id: Option<Uuid>,
    pub change_reason: Option<String>,
}

#[derive(Deserialize)]
pub struct ChangeStatusRequest {
    pub status: String,
    pub user_id: Option<Uuid>,
    pub reason: Option<String>,
}

#[derive(Serialize)]
pub struct ChangeStatusResponse {
    pub changed: bool,
    pub status: String,
}

#[derive(AsChangeset, Default)]
#[diesel(table_name = documents)]
struct DocumentChangeset<'a> {
    title: Option<&'a str>,
    category_id: Option<Uuid>,
    document_type_id: Option<Uuid>,
    entity_id: Option<Uuid>,
    document_date: Option<NaiveDate>,
    due_date: Option<NaiveDate>,
    payment_status: Option<&'a str>,
    notes: Option<&'a str>,
    tags: Option<&'a str>,
}

struct UploadFields {
    bytes: Vec<u8>,
    original_name: String,
    title: Option<String>,
    category_id: Option<Uuid>,
    document_type_id: Option<Uuid>,
    entity_id: Option<Uuid>,
    document_date: Option<NaiveDate>,
    due_date: Option<NaiveDate>,
    payment_status: Option<String>,
    notes: Option<String>,
    tags: Option<String>,
    user_id: Option<Uuid>,
    assigned_user_ids: Vec<Uuid>,
}

pub async fn list_documents(
    State(state): State<AppState>,
    Query(params): Query<DocumentListQuery>,
) -> AppResult<Json<Vec<DocumentResponse>>> {
    let mut conn = state.db()?;

    let mut docs_query = documents::table.into_boxed();

    if let Some(user_id) = params.user_id {
        let actor = load_user(&mut conn, user_id)?;
        if !actor.can_view_all_documents() {
            let assigned_ids = documents_assigned_to(&mut conn, user_id)?;
            docs_query = docs_query.filter(
                documents::created_by
                    .eq(user_id)
                    .or(documents::id.eq_any(assigned_ids)),
            );
        }
    }

    if let Some(ref status) = params.status {
        docs_query = docs_query.filter(documents::status.eq(status.clone()));
    }
    if let Some(category_id) = params.category_id {
        docs_query = docs_query.filter(documents::category_id.eq(category_id));
    }
    if let Some(entity_id) = params.entity_id {
        docs_query = docs_query.filter(documents::entity_id.eq(entity_id));
    }
    if let Some(assigned_user_id) = params.assigned_user_id {
        let assigned_ids = documents_assigned_to(&mut conn, assigned_user_id)?;
        docs_query = docs_query.filter(documents::id.eq_any(assigned_ids));
    }
    if let Some(search) = params
        .search
        .as_ref()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
    {
        let pattern = format!("%{search}%");
        docs_query = docs_query.filter(
            documents::title
                .ilike(pattern.clone())
                .or(documents::notes.ilike(pattern)),
        );
    }

    let docs: Vec<Document> = docs_query
        .order(documents::created_at.desc())
        .load(&mut conn)?;

    let doc_ids: Vec<Uuid> = docs.iter().map(|doc| doc.id).collect();
    let refs = load_reference_maps(&mut conn, &docs)?;
    let mut assignments_map = load_assignments_for_documents(&mut conn, &doc_ids)?;

    let response = docs
        .into_iter()
        .map(|doc| {
            let assigned = assignments_map.remove(&doc.id).unwrap_or_default();
            to_document_response(doc, &refs, assigned, None)
        })
        .collect();

    Ok(Json(response))
}

pub async fn get_document(
    State(state): State<AppState>,
    Path(document_id): Path<Uuid>,
    Query(params): Query<ActorQuery>,
) -> AppResult<Json<DocumentDetailResponse>> {
    let mut conn = state.db()?;

    let doc: Document = documents::table.find(document_id).first(&mut conn)?;
    ensure_document_access(&mut conn, &doc, params.user_id)?;

    let refs = load_reference_maps(&mut conn, std::slice::from_ref(&doc))?;
    let mut assignments_map = load_assignments_for_documents(&mut conn, &[document_id])?;
    let history = load_history(&mut conn, document_id)?;
    let file_path = doc.file_path.clone();
    drop(conn);

    let size_bytes = match file_path {
        Some(path) => state.storage.file_size(&path).await.ok().map(|s| s as i64),
        None => None,
    };

    let assigned = assignments_map.remove(&document_id).unwrap_or_default();
    Ok(Json(DocumentDetailResponse {
        document: to_document_response(doc, &refs, assigned, size_bytes),
        history,
    }))
}

pub async fn upload_document(
    State(state): State<AppState>,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<DocumentDetailResponse>)> {
    let fields = collect_upload_fields(multipart).await?;

    if fields.bytes.is_empty() {
        error!("upload rejected: empty file payload");
        return Err(AppError::bad_request("file field must not be empty"));
    }
    if !fields
        .original_name
        .to_ascii_lowercase()
        .ends_with(".pdf")
    {
        return Err(AppError::bad_request("only PDF files are accepted"));
    }
    if let Some(ref payment_status) = fields.payment_status {
        if !is_valid_payment_status(payment_status) {
            return Err(AppError::bad_request(format!(
                "invalid payment status '{payment_status}'"
            )));
        }
    }

    let checksum = hex::encode(Sha256::digest(&fields.bytes));

    let mut conn = state.db()?;
    validate_references(&mut conn, &fields)?;

    // Identical bytes uploaded twice resolve to the already-stored document.
    let existing: Option<Document> = documents::table
        .filter(documents::checksum.eq(&checksum))
        .first(&mut conn)
        .optional()?;
    if let Some(doc) = existing {
        info!(document_id = %doc.id, checksum = %checksum, "upload matched existing document");
        let detail = build_detail(&mut conn, doc)?;
        return Ok((StatusCode::OK, Json(detail)));
    }
    drop(conn);

    let now = Local::now();
    let clean_filename = clean_upload_filename(&fields.original_name);
    let month_prefix = now.format("%Y/%m").to_string();
    let mut storage_path = format!("documents/{month_prefix}/{clean_filename}");
    if state.storage.exists(&storage_path).await {
        // A different document already claimed that name this month.
        storage_path = format!(
            "documents/{month_prefix}/{}_{clean_filename}",
            now.format("%Y%m%d_%H%M%S")
        );
    }

    state
        .storage
        .put_file(&storage_path, fields.bytes.clone())
        .await
        .map_err(|err| {
            error!(error = %err, path = %storage_path, "failed to store document");
            AppError::internal(format!("failed to store document: {err}"))
        })?;

    let title = match fields.title.as_deref().map(str::trim) {
        Some(title) if !title.is_empty() => title.to_string(),
        _ => derive_document_title(&fields.original_name),
    };

    let new_document = NewDocument {
        id: Uuid::new_v4(),
        title,
        file_path: Some(storage_path),
        checksum: Some(checksum),
        category_id: fields.category_id,
        document_type_id: fields.document_type_id,
        entity_id: fields.entity_id,
        document_date: fields.document_date,
        due_date: fields.due_date,
        status: STATUS_PENDING.to_string(),
        payment_status: fields
            .payment_status
            .clone()
            .unwrap_or_else(|| "not_applicable".to_string()),
        created_by: fields.user_id,
        notes: fields.notes.clone(),
        tags: fields.tags.clone(),
        original_filename: Some(fields.original_name.clone()),
        imported_from_folder: false,
    };

    let mut conn = state.db()?;
    let document = conn.transaction::<Document, AppError, _>(|conn| {
        diesel::insert_into(documents::table)
            .values(&new_document)
            .execute(conn)?;
        let document: Document = documents::table.find(new_document.id).first(conn)?;
        history::record_creation(conn, &document)?;

        if !fields.assigned_user_ids.is_empty() {
            let rows: Vec<NewDocumentAssignment> = fields
                .assigned_user_ids
                .iter()
                .map(|user_id| NewDocumentAssignment {
                    document_id: document.id,
                    user_id: *user_id,
                })
                .collect();
            diesel::insert_into(document_assignments::table)
                .values(&rows)
                .on_conflict_do_nothing()
                .execute(conn)?;
        }

        Ok(document)
    })?;

    info!(
        document_id = %document.id,
        original_name = %fields.original_name,
        "document upload succeeded"
    );

    let detail = build_detail(&mut conn, document)?;
    Ok((StatusCode::CREATED, Json(detail)))
}

pub async fn update_document(
    State(state): State<AppState>,
    Path(document_id): Path<Uuid>,
    Json(payload): Json<UpdateDocumentRequest>,
) -> AppResult<Json<DocumentDetailResponse>> {
    let mut conn = state.db()?;

    let document: Document = documents::table.find(document_id).first(&mut conn)?;
    ensure_document_access(&mut conn, &document, payload.user_id)?;

    let document_date = payload
        .document_date
        .as_deref()
        .map(parse_date)
        .transpose()?;
    let due_date = payload.due_date.as_deref().map(parse_date).transpose()?;

    if let Some(ref payment_status) = payload.payment_status {
        if !is_valid_payment_status(payment_status) {
            return Err(AppError::bad_request(format!(
                "invalid payment status '{payment_status}'"
            )));
        }
    }

    if let Some(category_id) = payload.category_id {
        let found: Option<Category> = categories::table
            .find(category_id)
            .first(&mut conn)
            .optional()?;
        if found.is_none() {
            return Err(AppError::bad_request("category does not exist"));
        }
    }
    if let Some(document_type_id) = payload.document_type_id {
        let found: Option<DocumentType> = document_types::table
            .find(document_type_id)
            .first(&mut conn)
            .optional()?;
        if found.is_none() {
            return Err(AppError::bad_request("document type does not exist"));
        }
    }
    if let Some(entity_id) = payload.entity_id {
        let found: Option<Entity> = entities::table.find(entity_id).first(&mut conn).optional()?;
        if found.is_none() {
            return Err(AppError::bad_request("entity does not exist"));
        }
    }

    let title = match payload.title.as_deref().map(str::trim) {
        Some("") => return Err(AppError::bad_request("title must not be empty")),
        other => other,
    };

    let changeset = DocumentChangeset {
        title,
        category_id: payload.category_id,
        document_type_id: payload.document_type_id,
        entity_id: payload.entity_id,
        document_date,
        due_date,
        payment_status: payload.payment_status.as_deref(),
        notes: payload.notes.as_deref(),
        tags: payload.tags.as_deref(),
    };

    let has_field_changes = title.is_some()
        || payload.category_id.is_some()
        || payload.document_type_id.is_some()
        || payload.entity_id.is_some()
        || document_date.is_some()
        || due_date.is_some()
        || payload.payment_status.is_some()
        || payload.notes.is_some()
        || payload.tags.is_some();

    if has_field_changes {
        let now = Utc::now().naive_utc();
        diesel::update(documents::table.find(document_id))
            .set((&changeset, documents::updated_at.eq(now)))
            .execute(&mut conn)?;
    }

    if let Some(ref status) = payload.status {
        history::change_status(
            &mut conn,
            document_id,
            status,
            payload.user_id,
            payload.change_reason.as_deref(),
        )?;
    }

    let updated: Document = documents::table.find(document_id).first(&mut conn)?;
    let detail = build_detail(&mut conn, updated)?;
    Ok(Json(detail))
}

/// The one sanctioned way to move a document through its lifecycle: mutates
/// the status and appends the audit row as a single unit.
pub async fn change_document_status(
    State(state): State<AppState>,
    Path(document_id): Path<Uuid>,
    Json(payload): Json<ChangeStatusRequest>,
) -> AppResult<Json<ChangeStatusResponse>> {
    let mut conn = state.db()?;

    let document: Document = documents::table.find(document_id).first(&mut conn)?;
    ensure_document_access(&mut conn, &document, payload.user_id)?;

    let changed = history::change_status(
        &mut conn,
        document_id,
        &payload.status,
        payload.user_id,
        payload.reason.as_deref(),
    )?;

    Ok(Json(ChangeStatusResponse {
        changed,
        status: payload.status,
    }))
}

pub async fn serve_document(
    State(state): State<AppState>,
    Path(document_id): Path<Uuid>,
    Query(params): Query<ActorQuery>,
) -> AppResult<impl IntoResponse> {
    let mut conn = state.db()?;

    let doc: Document = documents::table.find(document_id).first(&mut conn)?;
    ensure_document_access(&mut conn, &doc, params.user_id)?;
    drop(conn);

    let file_path = doc.file_path.ok_or_else(AppError::not_found)?;
    let bytes = state.storage.read_file(&file_path).await.map_err(|err| {
        error!(document_id = %document_id, error = %err, "stored file missing");
        AppError::not_found()
    })?;

    let served_name = FsPath::new(&file_path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("document.pdf");
    let content_type = mime_guess::from_path(&file_path)
        .first_raw()
        .unwrap_or("application/pdf");
    let disposition =
        inline_content_disposition(served_name).unwrap_or_else(|| "inline".to_string());

    Ok((
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
            (header::CACHE_CONTROL, "public, max-age=3600".to_string()),
        ],
        bytes,
    ))
}

async fn collect_upload_fields(mut multipart: Multipart) -> AppResult<UploadFields> {
    let mut bytes: Option<Vec<u8>> = None;
    let mut original_name: Option<String> = None;
    let mut title = None;
    let mut category_id = None;
    let mut document_type_id = None;
    let mut entity_id = None;
    let mut document_date = None;
    let mut due_date = None;
    let mut payment_status = None;
    let mut notes = None;
    let mut tags = None;
    let mut user_id = None;
    let mut assigned_user_ids = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(|err| {
        error!(error = %err, "invalid multipart data");
        AppError::bad_request(format!("invalid multipart data: {err}"))
    })? {
        let name = field.name().map(|n| n.to_string());
        match name.as_deref() {
            Some("file") => {
                original_name = field.file_name().map(|n| n.to_string());
                let data = field.bytes().await.map_err(|err| {
                    error!(error = %err, "failed to read file bytes");
                    AppError::bad_request(format!("failed to read file bytes: {err}"))
                })?;
                bytes = Some(data.to_vec());
            }
            Some("title") => title = Some(read_text_field(field).await?),
            Some("category_id") => category_id = parse_uuid_field(field, "category_id").await?,
            Some("document_type_id") => {
                document_type_id = parse_uuid_field(field, "document_type_id").await?
            }
            Some("entity_id") => entity_id = parse_uuid_field(field, "entity_id").await?,
            Some("document_date") => {
                let value = read_text_field(field).await?;
                if !value.trim().is_empty() {
                    document_date = Some(parse_date(&value)?);
                }
            }
            Some("due_date") => {
                let value = read_text_field(field).await?;
                if !value.trim().is_empty() {
                    due_date = Some(parse_date(&value)?);
                }
            }
            Some("payment_status") => payment_status = Some(read_text_field(field).await?),
            Some("notes") => notes = Some(read_text_field(field).await?),
            Some("tags") => tags = Some(read_text_field(field).await?),
            Some("user_id") => user_id = parse_uuid_field(field, "user_id").await?,
            Some("assigned_user_ids") => {
                let value = read_text_field(field).await?;
                for part in value.split(',') {
                    let trimmed = part.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    let parsed = Uuid::parse_str(trimmed).map_err(|_| {
                        AppError::bad_request("assigned_user_ids must be comma-separated UUIDs")
                    })?;
                    assigned_user_ids.push(parsed);
                }
            }
            _ => {}
        }
    }

    let bytes = bytes.ok_or_else(|| {
        error!("upload rejected: missing file field");
        AppError::bad_request("file field is required")
    })?;
    let original_name = original_name.ok_or_else(|| {
        error!("upload rejected: missing original filename");
        AppError::bad_request("filename is required")
    })?;

    assigned_user_ids.sort();
    assigned_user_ids.dedup();

    Ok(UploadFields {
        bytes,
        original_name,
        title,
        category_id,
        document_type_id,
        entity_id,
        document_date,
        due_date,
        payment_status,
        notes,
        tags,
        user_id,
        assigned_user_ids,
    })
}

async fn read_text_field(field: axum::extract::multipart::Field<'_>) -> AppResult<String> {
    field
        .text()
        .await
        .map_err(|err| AppError::bad_request(format!("invalid field value: {err}")))
}

async fn parse_uuid_field(
    field: axum::extract::multipart::Field<'_>,
    name: &str,
) -> AppResult<Option<Uuid>> {
    let value = read_text_field(field).await?;
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    Uuid::parse_str(trimmed)
        .map(Some)
        .map_err(|_| AppError::bad_request(format!("{name} must be a valid UUID")))
}

fn validate_references(conn: &mut PgConnection, fields: &UploadFields) -> AppResult<()> {
    if let Some(category_id) = fields.category_id {
        let found: Option<Category> = categories::table.find(category_id).first(conn).optional()?;
        if found.is_none() {
            return Err(AppError::bad_request("category does not exist"));
        }
    }
    if let Some(document_type_id) = fields.document_type_id {
        let found: Option<DocumentType> = document_types::table
            .find(document_type_id)
            .first(conn)
            .optional()?;
        if found.is_none() {
            return Err(AppError::bad_request("document type does not exist"));
        }
    }
    if let Some(entity_id) = fields.entity_id {
        let found: Option<Entity> = entities::table.find(entity_id).first(conn).optional()?;
        if found.is_none() {
            return Err(AppError::bad_request("entity does not exist"));
        }
    }
    if let Some(user_id) = fields.user_id {
        let found: Option<User> = users::table.find(user_id).first(conn).optional()?;
        if found.is_none() {
            return Err(AppError::bad_request("user does not exist"));
        }
    }
    if !fields.assigned_user_ids.is_empty() {
        let found: Vec<User> = users::table
            .filter(users::id.eq_any(&fields.assigned_user_ids))
            .load(conn)?;
        if found.len() != fields.assigned_user_ids.len() {
            return Err(AppError::bad_request(
                "one or more assigned users do not exist",
            ));
        }
    }
    Ok(())
}

fn load_user(conn: &mut PgConnection, user_id: Uuid) -> AppResult<User> {
    users::table
        .find(user_id)
        .first(conn)
        .optional()?
        .ok_or_else(|| AppError::bad_request("user does not exist"))
}

/// Visibility rule for a single document. Denials look exactly like a missing
/// document so unauthorized callers learn nothing.
fn ensure_document_access(
    conn: &mut PgConnection,
    doc: &Document,
    user_id: Option<Uuid>,
) -> AppResult<()> {
    let Some(user_id) = user_id else {
        return Ok(());
    };

    let user: Option<User> = users::table.find(user_id).first(conn).optional()?;
    let Some(user) = user else {
        return Err(AppError::not_found());
    };

    if user.can_view_all_documents() || doc.created_by == Some(user_id) {
        return Ok(());
    }

    let assigned: bool = select(exists(
        document_assignments::table
            .filter(document_assignments::document_id.eq(doc.id))
            .filter(document_assignments::user_id.eq(user_id)),
    ))
    .get_result(conn)?;

    if assigned {
        Ok(())
    } else {
        Err(AppError::not_found())
    }
}

fn documents_assigned_to(conn: &mut PgConnection, user_id: Uuid) -> AppResult<Vec<Uuid>> {
    let ids = document_assignments::table
        .filter(document_assignments::user_id.eq(user_id))
        .select(document_assignments::document_id)
        .load(conn)?;
    Ok(ids)
}

struct ReferenceMaps {
    categories: HashMap<Uuid, Category>,
    document_types: HashMap<Uuid, DocumentType>,
    entities: HashMap<Uuid, Entity>,
}

fn load_reference_maps(conn: &mut PgConnection, docs: &[Document]) -> AppResult<ReferenceMaps> {
    let mut category_ids: Vec<Uuid> = docs.iter().filter_map(|d| d.category_id).collect();
    let mut type_ids: Vec<Uuid> = docs.iter().filter_map(|d| d.document_type_id).collect();
    let mut entity_ids: Vec<Uuid> = docs.iter().filter_map(|d| d.entity_id).collect();
    category_ids.sort();
    category_ids.dedup();
    type_ids.sort();
    type_ids.dedup();
    entity_ids.sort();
    entity_ids.dedup();

    let categories_map = if category_ids.is_empty() {
        HashMap::new()
    } else {
        categories::table
            .filter(categories::id.eq_any(&category_ids))
            .load::<Category>(conn)?
            .into_iter()
            .map(|c| (c.id, c))
            .collect()
    };
    let types_map = if type_ids.is_empty() {
        HashMap::new()
    } else {
        document_types::table
            .filter(document_types::id.eq_any(&type_ids))
            .load::<DocumentType>(conn)?
            .into_iter()
            .map(|t| (t.id, t))
            .collect()
    };
    let entities_map = if entity_ids.is_empty() {
        HashMap::new()
    } else {
        entities::table
            .filter(entities::id.eq_any(&entity_ids))
            .load::<Entity>(conn)?
            .into_iter()
            .map(|e| (e.id, e))
            .collect()
    };

    Ok(ReferenceMaps {
        categories: categories_map,
        document_types: types_map,
        entities: entities_map,
    })
}

fn load_assignments_for_documents(
    conn: &mut PgConnection,
    document_ids: &[Uuid],
) -> AppResult<HashMap<Uuid, Vec<Uuid>>> {
    if document_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let rows: Vec<(Uuid, Uuid)> = document_assignments::table
        .filter(document_assignments::document_id.eq_any(document_ids))
        .select((
            document_assignments::document_id,
            document_assignments::user_id,
        ))
        .load(conn)?;

    let mut map: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
    for (doc_id, user_id) in rows {
        map.entry(doc_id).or_default().push(user_id);
    }
    Ok(map)
}

fn load_history(conn: &mut PgConnection, document_id: Uuid) -> AppResult<Vec<HistoryEntry>> {
    let rows: Vec<crate::models::DocumentHistory> = document_history::table
        .filter(document_history::document_id.eq(document_id))
        .order(document_history::created_at.asc())
        .load(conn)?;

    Ok(rows
        .into_iter()
        .map(|entry| HistoryEntry {
            id: entry.id,
            previous_status: entry.previous_status,
            new_status: entry.new_status,
            changed_by: entry.changed_by,
            change_reason: entry.change_reason,
            created_at: to_iso(entry.created_at),
        })
        .collect())
}

fn build_detail(conn: &mut PgConnection, document: Document) -> AppResult<DocumentDetailResponse> {
    let refs = load_reference_maps(conn, std::slice::from_ref(&document))?;
    let mut assignments_map = load_assignments_for_documents(conn, &[document.id])?;
    let history = load_history(conn, document.id)?;
    let assigned = assignments_map.remove(&document.id).unwrap_or_default();
    Ok(DocumentDetailResponse {
        document: to_document_response(document, &refs, assigned, None),
        history,
    })
}

fn to_document_response(
    doc: Document,
    refs: &ReferenceMaps,
    assigned_user_ids: Vec<Uuid>,
    size_bytes: Option<i64>,
) -> DocumentResponse {
    let category = doc.category_id.and_then(|id| refs.categories.get(&id));
    let doc_type = doc.document_type_id.and_then(|id| refs.document_types.get(&id));
    let entity = doc.entity_id.and_then(|id| refs.entities.get(&id));

    let code_source = NameSource {
        entity: entity.map(|e| e.code.as_str()),
        category: category.map(|c| c.code.as_str()),
        doc_type: doc_type.map(|t| t.code.as_str()),
        date: doc.document_date,
        title: &doc.title,
    };
    let structured = naming::structured_name(&code_source, None);
    let suggested_filename = naming::pdf_filename(&code_source, None);
    let display = naming::display_name(&NameSource {
        entity: entity.map(|e| e.name.as_str()),
        category: category.map(|c| c.name.as_str()),
        doc_type: doc_type.map(|t| t.name.as_str()),
        date: doc.document_date,
        title: &doc.title,
    });

    DocumentResponse {
        id: doc.id,
        status_label: status_label(&doc.status).to_string(),
        payment_status_label: payment_status_label(&doc.payment_status).to_string(),
        category_name: category.map(|c| c.name.clone()),
        document_type_name: doc_type.map(|t| t.name.clone()),
        entity_name: entity.map(|e| e.name.clone()),
        title: doc.title,
        status: doc.status,
        payment_status: doc.payment_status,
        category_id: doc.category_id,
        document_type_id: doc.document_type_id,
        entity_id: doc.entity_id,
        document_date: doc.document_date.map(|d| d.format("%Y-%m-%d").to_string()),
        due_date: doc.due_date.map(|d| d.format("%Y-%m-%d").to_string()),
        notes: doc.notes,
        tags: doc.tags,
        original_filename: doc.original_filename,
        imported_from_folder: doc.imported_from_folder,
        structured_name: structured,
        display_name: display,
        suggested_filename,
        created_by: doc.created_by,
        assigned_user_ids,
        size_bytes,
        created_at: to_iso(doc.created_at),
        updated_at: to_iso(doc.updated_at),
    }
}

fn parse_date(raw: &str) -> AppResult<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| AppError::bad_request("dates must use the YYYY-MM-DD format"))
}

fn derive_document_title(original: &str) -> String {
    let trimmed = original.trim();
    if trimmed.is_empty() {
        return "Document".to_string();
    }

    FsPath::new(trimmed)
        .file_stem()
        .and_then(|s| s.to_str())
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .unwrap_or_else(|| trimmed.to_string())
}

/// Upload filenames keep alphanumerics, spaces, `-` and `_` in the stem and
/// retain the original extension.
fn clean_upload_filename(original: &str) -> String {
    let path = FsPath::new(original);
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(original);
    let extension = path.extension().and_then(|e| e.to_str());

    let clean_stem: String = stem
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_'))
        .collect();
    let clean_stem = clean_stem.trim_end();
    let clean_stem = if clean_stem.is_empty() {
        "document"
    } else {
        clean_stem
    };

    match extension {
        Some(ext) => format!("{clean_stem}.{ext}"),
        None => clean_stem.to_string(),
    }
}

fn inline_content_disposition(filename: &str) -> Option<String> {
    if filename.is_empty() {
        return None;
    }

    let sanitized: String = filename
        .chars()
        .map(|ch| match ch {
            '"' | '\\' => '_',
            _ => ch,
        })
        .collect();

    let encoded =
        percent_encoding::utf8_percent_encode(&sanitized, percent_encoding::NON_ALPHANUMERIC);
    Some(format!(
        "inline; filename=\"{}\"; filename*=UTF-8''{}",
        sanitized, encoded
    ))
}

pub(crate) fn to_iso(dt: NaiveDateTime) -> String {
    DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc).to_rfc3339()
}
