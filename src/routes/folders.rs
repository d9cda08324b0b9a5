use axum::{extract::State, Json};
use serde::Serialize;

use crate::{error::AppResult, provision, state::AppState};

#[derive(Serialize)]
pub struct RebuildFoldersResponse {
    pub entities_provisioned: usize,
    pub category_folders_created: usize,
}

/// Re-materializes the whole folder tree from the current records. Safe to
/// run any time: provisioning is idempotent and never deletes anything.
pub async fn rebuild_folders(
    State(state): State<AppState>,
) -> AppResult<Json<RebuildFoldersResponse>> {
    let mut conn = state.db()?;
    let report = provision::rebuild_all(&mut conn, &state.config.main_folder)?;
    Ok(Json(RebuildFoldersResponse {
        entities_provisioned: report.entities_provisioned,
        category_folders_created: report.category_folders_created,
    }))
}
