use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use diesel::{dsl::count_star, prelude::*, result::DatabaseErrorKind};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{Category, DocumentType, NewDocumentType},
    provision,
    schema::{categories, document_types, documents},
    state::AppState,
};

#[derive(Serialize)]
pub struct DocumentTypeEntry {
    pub id: Uuid,
    pub name: String,
    pub code: String,
    pub category_id: Uuid,
    pub description: Option<String>,
    pub is_active: bool,
    pub usage_count: i64,
}

#[derive(Deserialize)]
pub struct DocumentTypeListQuery {
    pub category_id: Option<Uuid>,
}

#[derive(Deserialize)]
pub struct CreateDocumentTypeRequest {
    pub name: String,
    #[serde(default)]
    pub code: Option<String>,
    pub category_id: Uuid,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

#[derive(Deserialize)]
pub struct UpdateDocumentTypeRequest {
    pub name: Option<String>,
    pub code: Option<String>,
    pub description: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(AsChangeset, Default)]
#[diesel(table_name = document_types)]
struct DocumentTypeChangeset<'a> {
    name: Option<&'a str>,
    code: Option<&'a str>,
    description: Option<&'a str>,
    is_active: Option<bool>,
}

const fn default_true() -> bool {
    true
}

/// Without a filter this is the full catalog; with `?category_id=` it is the
/// dependent-dropdown payload — only that category's active types.
pub async fn list_document_types(
    State(state): State<AppState>,
    Query(query): Query<DocumentTypeListQuery>,
) -> AppResult<Json<Vec<DocumentTypeEntry>>> {
    let mut conn = state.db()?;

    let type_list: Vec<DocumentType> = match query.category_id {
        Some(category_id) => document_types::table
            .filter(document_types::category_id.eq(category_id))
            .filter(document_types::is_active.eq(true))
            .order(document_types::name.asc())
            .load(&mut conn)?,
        None => document_types::table
            .order(document_types::name.asc())
            .load(&mut conn)?,
    };

    let usage_rows: Vec<(Option<Uuid>, i64)> = documents::table
        .filter(documents::document_type_id.is_not_null())
        .group_by(documents::document_type_id)
        .select((documents::document_type_id, count_star()))
        .load(&mut conn)?;
    let usage_map: HashMap<Uuid, i64> = usage_rows
        .into_iter()
        .filter_map(|(id, count)| id.map(|id| (id, count)))
        .collect();

    let response = type_list
        .into_iter()
        .map(|doc_type| {
            let usage_count = *usage_map.get(&doc_type.id).unwrap_or(&0);
            build_entry(doc_type, usage_count)
        })
        .collect();

    Ok(Json(response))
}

pub async fn create_document_type(
    State(state): State<AppState>,
    Json(payload): Json<CreateDocumentTypeRequest>,
) -> AppResult<(StatusCode, Json<DocumentTypeEntry>)> {
    let name = payload.name.trim();
    if name.is_empty() {
        return Err(AppError::bad_request("name must not be empty"));
    }

    let mut conn = state.db()?;
    let category: Option<Category> = categories::table
        .find(payload.category_id)
        .first(&mut conn)
        .optional()?;
    if category.is_none() {
        return Err(AppError::bad_request("category does not exist"));
    }

    let code = match payload.code.as_deref().map(str::trim) {
        Some("") => return Err(AppError::bad_request("code must not be empty")),
        Some(code) => code.to_string(),
        None => {
            let derived = provision::sanitize_name(name).to_uppercase();
            if derived.is_empty() {
                return Err(AppError::bad_request(
                    "code could not be derived from the name, supply one explicitly",
                ));
            }
            derived
        }
    };

    let new_id = Uuid::new_v4();
    let new_type = NewDocumentType {
        id: new_id,
        name: name.to_string(),
        code,
        category_id: payload.category_id,
        description: payload.description,
        is_active: payload.is_active,
    };

    match diesel::insert_into(document_types::table)
        .values(&new_type)
        .execute(&mut conn)
    {
        Ok(_) => {}
        Err(diesel::result::Error::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
            return Err(AppError::bad_request(
                "document type code already exists for this category",
            ));
        }
        Err(err) => return Err(AppError::from(err)),
    }

    let doc_type: DocumentType = document_types::table.find(new_id).first(&mut conn)?;
    Ok((StatusCode::CREATED, Json(build_entry(doc_type, 0))))
}

pub async fn update_document_type(
    State(state): State<AppState>,
    Path(doc_type_id): Path<Uuid>,
    Json(payload): Json<UpdateDocumentTypeRequest>,
) -> AppResult<Json<DocumentTypeEntry>> {
    let mut conn = state.db()?;
    let existing: DocumentType = document_types::table.find(doc_type_id).first(&mut conn)?;

    let mut new_name: Option<String> = None;
    if let Some(ref candidate) = payload.name {
        let trimmed = candidate.trim();
        if trimmed.is_empty() {
            return Err(AppError::bad_request("name must not be empty"));
        }
        if trimmed != existing.name {
            new_name = Some(trimmed.to_string());
        }
    }

    let mut new_code: Option<String> = None;
    if let Some(ref candidate) = payload.code {
        let trimmed = candidate.trim();
        if trimmed.is_empty() {
            return Err(AppError::bad_request("code must not be empty"));
        }
        if trimmed != existing.code {
            let duplicate = document_types::table
                .filter(document_types::category_id.eq(existing.category_id))
                .filter(document_types::code.eq(trimmed))
                .filter(document_types::id.ne(doc_type_id))
                .first::<DocumentType>(&mut conn)
                .optional()?;
            if duplicate.is_some() {
                return Err(AppError::bad_request(
                    "document type code already exists for this category",
                ));
            }
            new_code = Some(trimmed.to_string());
        }
    }

    let changeset = DocumentTypeChangeset {
        name: new_name.as_deref(),
        code: new_code.as_deref(),
        description: payload.description.as_deref(),
        is_active: payload.is_active,
    };

    let now = Utc::now().naive_utc();
    diesel::update(document_types::table.find(doc_type_id))
        .set((&changeset, document_types::updated_at.eq(now)))
        .execute(&mut conn)?;

    let updated: DocumentType = document_types::table.find(doc_type_id).first(&mut conn)?;
    let usage_count: i64 = documents::table
        .filter(documents::document_type_id.eq(doc_type_id))
        .select(count_star())
        .first(&mut conn)?;

    Ok(Json(build_entry(updated, usage_count)))
}

/// Deleting a type in use is allowed: referencing documents fall back to an
/// unset type rather than blocking the cleanup.
pub async fn delete_document_type(
    State(state): State<AppState>,
    Path(doc_type_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let mut conn = state.db()?;

    let deleted = diesel::delete(document_types::table.find(doc_type_id)).execute(&mut conn)?;
    if deleted == 0 {
        return Err(AppError::not_found());
    }
    Ok(StatusCode::NO_CONTENT)
}

fn build_entry(doc_type: DocumentType, usage_count: i64) -> DocumentTypeEntry {
    DocumentTypeEntry {
        id: doc_type.id,
        name: doc_type.name,
        code: doc_type.code,
        category_id: doc_type.category_id,
        description: doc_type.description,
        is_active: doc_type.is_active,
        usage_count,
    }
}
