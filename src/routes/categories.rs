use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use diesel::{prelude::*, result::DatabaseErrorKind, PgConnection};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{Category, Entity, NewCategory, NewCategoryEntity},
    provision,
    schema::{categories, category_entities, entities},
    state::AppState,
};

use super::documents::to_iso;

#[derive(Serialize)]
pub struct CategorySummary {
    pub id: Uuid,
    pub name: String,
    pub code: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub applies_to_all: bool,
    pub entity_ids: Vec<Uuid>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Serialize)]
pub struct CategoryDetailResponse {
    pub category: CategorySummary,
    pub folders_created: usize,
}

#[derive(Deserialize)]
pub struct CreateCategoryRequest {
    pub name: String,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default = "default_true")]
    pub applies_to_all: bool,
    #[serde(default)]
    pub entity_ids: Vec<Uuid>,
}

#[derive(Deserialize)]
pub struct UpdateCategoryRequest {
    pub name: Option<String>,
    pub code: Option<String>,
    pub description: Option<String>,
    pub is_active: Option<bool>,
    pub applies_to_all: Option<bool>,
    pub entity_ids: Option<Vec<Uuid>>,
}

#[derive(AsChangeset, Default)]
#[diesel(table_name = categories)]
struct CategoryChangeset<'a> {
    name: Option<&'a str>,
    code: Option<&'a str>,
    description: Option<&'a str>,
    is_active: Option<bool>,
    applies_to_all: Option<bool>,
}

const fn default_true() -> bool {
    true
}

pub async fn list_categories(
    State(state): State<AppState>,
) -> AppResult<Json<Vec<CategorySummary>>> {
    let mut conn = state.db()?;

    let category_list: Vec<Category> = categories::table
        .order(categories::name.asc())
        .load(&mut conn)?;

    let mut response = Vec::with_capacity(category_list.len());
    for category in category_list {
        let entity_ids = linked_entity_ids(&mut conn, category.id)?;
        response.push(build_summary(category, entity_ids));
    }

    Ok(Json(response))
}

pub async fn create_category(
    State(state): State<AppState>,
    Json(payload): Json<CreateCategoryRequest>,
) -> AppResult<(StatusCode, Json<CategoryDetailResponse>)> {
    let name = payload.name.trim();
    if name.is_empty() {
        return Err(AppError::bad_request("name must not be empty"));
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

    let mut conn = state.db()?;
    if !payload.applies_to_all {
        ensure_entities_exist(&mut conn, &payload.entity_ids)?;
    }

    let new_id = Uuid::new_v4();
    let new_category = NewCategory {
        id: new_id,
        name: name.to_string(),
        code,
        description: payload.description,
        is_active: payload.is_active,
        applies_to_all: payload.applies_to_all,
    };

    match diesel::insert_into(categories::table)
        .values(&new_category)
        .execute(&mut conn)
    {
        Ok(_) => {}
        Err(diesel::result::Error::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
            return Err(AppError::bad_request("category code already exists"));
        }
        Err(err) => return Err(AppError::from(err)),
    }

    if !payload.applies_to_all {
        replace_entity_links(&mut conn, new_id, &payload.entity_ids)?;
    }

    let category: Category = categories::table.find(new_id).first(&mut conn)?;
    let folders_created = provision_folders(&mut conn, &category);
    let entity_ids = linked_entity_ids(&mut conn, new_id)?;

    Ok((
        StatusCode::CREATED,
        Json(CategoryDetailResponse {
            category: build_summary(category, entity_ids),
            folders_created,
        }),
    ))
}

pub async fn update_category(
    State(state): State<AppState>,
    Path(category_id): Path<Uuid>,
    Json(payload): Json<UpdateCategoryRequest>,
) -> AppResult<Json<CategoryDetailResponse>> {
    let mut conn = state.db()?;
    let existing: Category = categories::table.find(category_id).first(&mut conn)?;

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
            let duplicate = categories::table
                .filter(categories::code.eq(trimmed))
                .filter(categories::id.ne(category_id))
                .first::<Category>(&mut conn)
                .optional()?;
            if duplicate.is_some() {
                return Err(AppError::bad_request("category code already exists"));
            }
            new_code = Some(trimmed.to_string());
        }
    }

    if let Some(ref entity_ids) = payload.entity_ids {
        ensure_entities_exist(&mut conn, entity_ids)?;
    }

    let changeset = CategoryChangeset {
        name: new_name.as_deref(),
        code: new_code.as_deref(),
        description: payload.description.as_deref(),
        is_active: payload.is_active,
        applies_to_all: payload.applies_to_all,
    };

    let now = Utc::now().naive_utc();
    diesel::update(categories::table.find(category_id))
        .set((&changeset, categories::updated_at.eq(now)))
        .execute(&mut conn)?;

    if let Some(ref entity_ids) = payload.entity_ids {
        replace_entity_links(&mut conn, category_id, entity_ids)?;
    }

    let updated: Category = categories::table.find(category_id).first(&mut conn)?;
    // Re-provisioning is additive: entities that drop out of the applicable
    // set keep the folders they already have.
    let folders_created = provision_folders(&mut conn, &updated);
    let entity_ids = linked_entity_ids(&mut conn, category_id)?;

    Ok(Json(CategoryDetailResponse {
        category: build_summary(updated, entity_ids),
        folders_created,
    }))
}

fn provision_folders(conn: &mut PgConnection, category: &Category) -> usize {
    if !category.is_active {
        return 0;
    }
    match provision::ensure_category_folders(conn, category) {
        Ok(count) => count,
        Err(err) => {
            warn!(category = %category.name, error = %err, "failed to provision category folders");
            0
        }
    }
}

fn ensure_entities_exist(conn: &mut PgConnection, entity_ids: &[Uuid]) -> AppResult<()> {
    if entity_ids.is_empty() {
        return Ok(());
    }
    let found: Vec<Entity> = entities::table
        .filter(entities::id.eq_any(entity_ids))
        .load(conn)?;
    if found.len() != entity_ids.len() {
        return Err(AppError::bad_request("one or more entities do not exist"));
    }
    Ok(())
}

fn replace_entity_links(
    conn: &mut PgConnection,
    category_id: Uuid,
    entity_ids: &[Uuid],
) -> AppResult<()> {
    diesel::delete(
        category_entities::table.filter(category_entities::category_id.eq(category_id)),
    )
    .execute(conn)?;

    let rows: Vec<NewCategoryEntity> = entity_ids
        .iter()
        .map(|entity_id| NewCategoryEntity {
            category_id,
            entity_id: *entity_id,
        })
        .collect();
    if !rows.is_empty() {
        diesel::insert_into(category_entities::table)
            .values(&rows)
            .on_conflict_do_nothing()
            .execute(conn)?;
    }
    Ok(())
}

fn linked_entity_ids(conn: &mut PgConnection, category_id: Uuid) -> AppResult<Vec<Uuid>> {
    let mut ids: Vec<Uuid> = category_entities::table
        .filter(category_entities::category_id.eq(category_id))
        .select(category_entities::entity_id)
        .load(conn)?;
    ids.sort();
    Ok(ids)
}

fn build_summary(category: Category, entity_ids: Vec<Uuid>) -> CategorySummary {
    CategorySummary {
        id: category.id,
        name: category.name,
        code: category.code,
        description: category.description,
        is_active: category.is_active,
        applies_to_all: category.applies_to_all,
        entity_ids,
        created_at: to_iso(category.created_at),
        updated_at: to_iso(category.updated_at),
    }
}
