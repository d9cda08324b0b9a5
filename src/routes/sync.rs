use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::{
    error::{AppError, AppResult},
    state::AppState,
    sync::{self, SyncError},
};

#[derive(Deserialize)]
pub struct RunSyncQuery {
    #[serde(default)]
    pub dry_run: bool,
}

#[derive(Serialize)]
pub struct RunSyncResponse {
    pub dry_run: bool,
    pub processed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub pending: usize,
}

#[derive(Serialize)]
pub struct SyncStatusResponse {
    pub watched_folder: String,
    pub folder_exists: bool,
    pub pending_count: usize,
    pub processed_count: usize,
    pub pending_files: Vec<String>,
}

pub async fn run_sync(
    State(state): State<AppState>,
    Query(query): Query<RunSyncQuery>,
) -> AppResult<Json<RunSyncResponse>> {
    let mut conn = state.db()?;
    let report = sync::run(&mut conn, &state.config, query.dry_run).map_err(map_sync_error)?;

    let pending = sync::scan_watched_folder(&state.config.watched_folder)
        .map(|files| files.len())
        .unwrap_or(0);

    Ok(Json(RunSyncResponse {
        dry_run: query.dry_run,
        processed: report.processed,
        skipped: report.skipped,
        failed: report.failed,
        pending,
    }))
}

pub async fn sync_status(State(state): State<AppState>) -> AppResult<Json<SyncStatusResponse>> {
    let watched = state.config.watched_folder.clone();
    let folder_exists = watched.is_dir();

    let pending_files = if folder_exists {
        sync::scan_watched_folder(&watched)?
    } else {
        Vec::new()
    };
    let pending_count = pending_files.len();

    let processed_count = if folder_exists {
        match std::fs::read_dir(watched.join("processed")) {
            Ok(entries) => entries.filter_map(Result::ok).count(),
            Err(_) => 0,
        }
    } else {
        0
    };

    let pending_files = pending_files
        .into_iter()
        .take(10)
        .filter_map(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .map(|name| name.to_string())
        })
        .collect();

    Ok(Json(SyncStatusResponse {
        watched_folder: watched.to_string_lossy().into_owned(),
        folder_exists,
        pending_count,
        processed_count,
        pending_files,
    }))
}

fn map_sync_error(err: SyncError) -> AppError {
    match err {
        SyncError::WatchedFolderMissing(_) | SyncError::NoDefaultUser => {
            AppError::bad_request(err.to_string())
        }
        other => AppError::internal(other),
    }
}
