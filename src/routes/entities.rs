use std::collections::HashMap;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use diesel::{dsl::count_star, prelude::*, result::DatabaseErrorKind};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::{
    config::UsageType,
    error::{AppError, AppResult},
    models::{Entity, NewEntity},
    provision,
    schema::{documents, entities},
    state::AppState,
};

use super::documents::to_iso;

#[derive(Serialize)]
pub struct EntitySummary {
    pub id: Uuid,
    pub name: String,
    pub code: String,
    pub description: Option<String>,
    pub kind: &'static str,
    pub is_company: bool,
    pub is_department: bool,
    pub folder_path: Option<String>,
    pub auto_create_folder: bool,
    pub document_count: i64,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Deserialize)]
pub struct CreateEntityRequest {
    pub name: String,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_company: bool,
    #[serde(default)]
    pub is_department: bool,
    #[serde(default = "default_true")]
    pub auto_create_folder: bool,
}

#[derive(Deserialize)]
pub struct UpdateEntityRequest {
    pub name: Option<String>,
    pub code: Option<String>,
    pub description: Option<String>,
    pub is_company: Option<bool>,
    pub is_department: Option<bool>,
    pub auto_create_folder: Option<bool>,
}

#[derive(AsChangeset, Default)]
#[diesel(table_name = entities)]
struct EntityChangeset<'a> {
    name: Option<&'a str>,
    code: Option<&'a str>,
    description: Option<&'a str>,
    is_company: Option<bool>,
    is_department: Option<bool>,
    auto_create_folder: Option<bool>,
}

const fn default_true() -> bool {
    true
}

/// Label shown for an entity, depending on how the deployment is used.
pub(super) fn entity_kind(usage: UsageType, is_company: bool, is_department: bool) -> &'static str {
    match usage {
        UsageType::Company => {
            if is_department {
                "department"
            } else if is_company {
                "company"
            } else {
                "external"
            }
        }
        UsageType::Personal => {
            if is_company {
                "company"
            } else {
                "entity"
            }
        }
    }
}

pub async fn list_entities(State(state): State<AppState>) -> AppResult<Json<Vec<EntitySummary>>> {
    let mut conn = state.db()?;

    // Departments lead in company mode, people in personal mode.
    let entity_list: Vec<Entity> = match state.config.usage_type {
        UsageType::Company => entities::table
            .order((entities::is_department.desc(), entities::name.asc()))
            .load(&mut conn)?,
        UsageType::Personal => entities::table
            .order((entities::is_company.asc(), entities::name.asc()))
            .load(&mut conn)?,
    };

    let usage_rows: Vec<(Option<Uuid>, i64)> = documents::table
        .filter(documents::entity_id.is_not_null())
        .group_by(documents::entity_id)
        .select((documents::entity_id, count_star()))
        .load(&mut conn)?;
    let usage_map: HashMap<Uuid, i64> = usage_rows
        .into_iter()
        .filter_map(|(id, count)| id.map(|id| (id, count)))
        .collect();

    let usage_type = state.config.usage_type;
    let response = entity_list
        .into_iter()
        .map(|entity| {
            let document_count = *usage_map.get(&entity.id).unwrap_or(&0);
            build_summary(entity, usage_type, document_count)
        })
        .collect();

    Ok(Json(response))
}

pub async fn create_entity(
    State(state): State<AppState>,
    Json(payload): Json<CreateEntityRequest>,
) -> AppResult<(StatusCode, Json<EntitySummary>)> {
    let name = payload.name.trim();
    if name.is_empty() {
        return Err(AppError::bad_request("name must not be empty"));
    }

    let code = resolve_code(payload.code.as_deref(), name)?;
    let new_id = Uuid::new_v4();
    let new_entity = NewEntity {
        id: new_id,
        name: name.to_string(),
        code,
        description: payload.description,
        is_company: payload.is_company,
        is_department: payload.is_department,
        auto_create_folder: payload.auto_create_folder,
    };

    let mut conn = state.db()?;
    match diesel::insert_into(entities::table)
        .values(&new_entity)
        .execute(&mut conn)
    {
        Ok(_) => {}
        Err(diesel::result::Error::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
            return Err(AppError::bad_request("entity code already exists"));
        }
        Err(err) => return Err(AppError::from(err)),
    }

    let entity: Entity = entities::table.find(new_id).first(&mut conn)?;
    if entity.auto_create_folder {
        if let Err(err) = provision::ensure_entity_folder(&mut conn, &entity, &state.config.main_folder)
        {
            warn!(entity = %entity.name, error = %err, "failed to provision entity folder");
        }
    }

    let entity: Entity = entities::table.find(new_id).first(&mut conn)?;
    let usage_type = state.config.usage_type;
    Ok((
        StatusCode::CREATED,
        Json(build_summary(entity, usage_type, 0)),
    ))
}

pub async fn update_entity(
    State(state): State<AppState>,
    Path(entity_id): Path<Uuid>,
    Json(payload): Json<UpdateEntityRequest>,
) -> AppResult<Json<EntitySummary>> {
    let mut conn = state.db()?;
    let existing: Entity = entities::table.find(entity_id).first(&mut conn)?;

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
            let duplicate = entities::table
                .filter(entities::code.eq(trimmed))
                .filter(entities::id.ne(entity_id))
                .first::<Entity>(&mut conn)
                .optional()?;
            if duplicate.is_some() {
                return Err(AppError::bad_request("entity code already exists"));
            }
            new_code = Some(trimmed.to_string());
        }
    }

    let changeset = EntityChangeset {
        name: new_name.as_deref(),
        code: new_code.as_deref(),
        description: payload.description.as_deref(),
        is_company: payload.is_company,
        is_department: payload.is_department,
        auto_create_folder: payload.auto_create_folder,
    };

    let now = Utc::now().naive_utc();
    diesel::update(entities::table.find(entity_id))
        .set((&changeset, entities::updated_at.eq(now)))
        .execute(&mut conn)?;

    let updated: Entity = entities::table.find(entity_id).first(&mut conn)?;

    // Newly enabled auto-provisioning gets its folder right away. A renamed
    // entity keeps whatever folder it already had.
    let newly_enabled = updated.auto_create_folder && !existing.auto_create_folder;
    if newly_enabled || (updated.auto_create_folder && updated.folder_path.is_none()) {
        if let Err(err) = provision::ensure_entity_folder(&mut conn, &updated, &state.config.main_folder)
        {
            warn!(entity = %updated.name, error = %err, "failed to provision entity folder");
        }
    }

    let updated: Entity = entities::table.find(entity_id).first(&mut conn)?;
    let document_count: i64 = documents::table
        .filter(documents::entity_id.eq(entity_id))
        .select(count_star())
        .first(&mut conn)?;

    Ok(Json(build_summary(
        updated,
        state.config.usage_type,
        document_count,
    )))
}

fn resolve_code(provided: Option<&str>, name: &str) -> AppResult<String> {
    if let Some(code) = provided {
        let trimmed = code.trim();
        if trimmed.is_empty() {
            return Err(AppError::bad_request("code must not be empty"));
        }
        return Ok(trimmed.to_string());
    }

    let derived = provision::sanitize_name(name).to_uppercase();
    if derived.is_empty() {
        return Err(AppError::bad_request(
            "code could not be derived from the name, supply one explicitly",
        ));
    }
    Ok(derived)
}

fn build_summary(entity: Entity, usage_type: UsageType, document_count: i64) -> EntitySummary {
    EntitySummary {
        id: entity.id,
        kind: entity_kind(usage_type, entity.is_company, entity.is_department),
        name: entity.name,
        code: entity.code,
        description: entity.description,
        is_company: entity.is_company,
        is_department: entity.is_department,
        folder_path: entity.folder_path,
        auto_create_folder: entity.auto_create_folder,
        document_count,
        created_at: to_iso(entity.created_at),
        updated_at: to_iso(entity.updated_at),
    }
}
