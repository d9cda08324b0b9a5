use axum::{
    extract::{Query, State},
    Json,
};
use diesel::{dsl::count_star, prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    config::UsageType,
    error::AppResult,
    models::{Category, Document, DocumentType, Entity, STATUS_PENDING},
    schema::{categories, document_assignments, documents, document_types, entities, users},
    state::AppState,
};

use super::documents::to_iso;
use super::entities::entity_kind;

const PENDING_DOCUMENT_LIMIT: i64 = 20;

#[derive(Deserialize)]
pub struct DashboardQuery {
    pub user_id: Option<Uuid>,
}

#[derive(Serialize)]
pub struct PendingDocument {
    pub id: Uuid,
    pub title: String,
    pub original_filename: Option<String>,
    pub imported_from_folder: bool,
    pub created_at: String,
}

#[derive(Serialize)]
pub struct EntityOption {
    pub id: Uuid,
    pub name: String,
    pub code: String,
    pub kind: &'static str,
}

#[derive(Serialize)]
pub struct CategoryOption {
    pub id: Uuid,
    pub name: String,
}

#[derive(Serialize)]
pub struct DocumentTypeOption {
    pub id: Uuid,
    pub name: String,
    pub category_id: Uuid,
}

#[derive(Serialize)]
pub struct DashboardResponse {
    pub pending_documents: Vec<PendingDocument>,
    pub pending_count: i64,
    pub total_documents: i64,
    pub categories: Vec<CategoryOption>,
    pub document_types: Vec<DocumentTypeOption>,
    pub entities: Vec<EntityOption>,
    pub usage_type: &'static str,
    pub person_label: &'static str,
}

pub async fn dashboard(
    State(state): State<AppState>,
    Query(params): Query<DashboardQuery>,
) -> AppResult<Json<DashboardResponse>> {
    let mut conn = state.db()?;

    // Non-privileged callers only count and see their own documents.
    let restrict_to: Option<Uuid> = match params.user_id {
        Some(user_id) => {
            let user: Option<crate::models::User> =
                users::table.find(user_id).first(&mut conn).optional()?;
            match user {
                Some(user) if user.can_view_all_documents() => None,
                Some(_) => Some(user_id),
                None => Some(user_id),
            }
        }
        None => None,
    };

    let (pending_documents, pending_count, total_documents) = match restrict_to {
        None => {
            let pending: Vec<Document> = documents::table
                .filter(documents::status.eq(STATUS_PENDING))
                .order(documents::created_at.desc())
                .limit(PENDING_DOCUMENT_LIMIT)
                .load(&mut conn)?;
            let pending_count: i64 = documents::table
                .filter(documents::status.eq(STATUS_PENDING))
                .select(count_star())
                .first(&mut conn)?;
            let total: i64 = documents::table.select(count_star()).first(&mut conn)?;
            (pending, pending_count, total)
        }
        Some(user_id) => {
            let assigned_ids: Vec<Uuid> = document_assignments::table
                .filter(document_assignments::user_id.eq(user_id))
                .select(document_assignments::document_id)
                .load(&mut conn)?;

            let pending: Vec<Document> = documents::table
                .filter(documents::status.eq(STATUS_PENDING))
                .filter(
                    documents::created_by
                        .eq(user_id)
                        .or(documents::id.eq_any(assigned_ids.clone())),
                )
                .order(documents::created_at.desc())
                .limit(PENDING_DOCUMENT_LIMIT)
                .load(&mut conn)?;
            let pending_count: i64 = documents::table
                .filter(documents::status.eq(STATUS_PENDING))
                .filter(
                    documents::created_by
                        .eq(user_id)
                        .or(documents::id.eq_any(assigned_ids.clone())),
                )
                .select(count_star())
                .first(&mut conn)?;
            let total: i64 = documents::table
                .filter(
                    documents::created_by
                        .eq(user_id)
                        .or(documents::id.eq_any(assigned_ids)),
                )
                .select(count_star())
                .first(&mut conn)?;
            (pending, pending_count, total)
        }
    };

    let category_list: Vec<Category> = categories::table
        .filter(categories::is_active.eq(true))
        .order(categories::name.asc())
        .load(&mut conn)?;
    let type_list: Vec<DocumentType> = document_types::table
        .filter(document_types::is_active.eq(true))
        .order(document_types::name.asc())
        .load(&mut conn)?;

    let usage_type = state.config.usage_type;
    let entity_list: Vec<Entity> = match usage_type {
        UsageType::Company => entities::table
            .order((entities::is_department.desc(), entities::name.asc()))
            .load(&mut conn)?,
        UsageType::Personal => entities::table
            .order((entities::is_company.asc(), entities::name.asc()))
            .load(&mut conn)?,
    };

    Ok(Json(DashboardResponse {
        pending_documents: pending_documents
            .into_iter()
            .map(|doc| PendingDocument {
                id: doc.id,
                title: doc.title,
                original_filename: doc.original_filename,
                imported_from_folder: doc.imported_from_folder,
                created_at: to_iso(doc.created_at),
            })
            .collect(),
        pending_count,
        total_documents,
        categories: category_list
            .into_iter()
            .map(|category| CategoryOption {
                id: category.id,
                name: category.name,
            })
            .collect(),
        document_types: type_list
            .into_iter()
            .map(|doc_type| DocumentTypeOption {
                id: doc_type.id,
                name: doc_type.name,
                category_id: doc_type.category_id,
            })
            .collect(),
        entities: entity_list
            .into_iter()
            .map(|entity| EntityOption {
                kind: entity_kind(usage_type, entity.is_company, entity.is_department),
                id: entity.id,
                name: entity.name,
                code: entity.code,
            })
            .collect(),
        usage_type: usage_type.as_str(),
        person_label: usage_type.person_label(),
    }))
}
