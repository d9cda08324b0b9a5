use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::Local;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::history;
use crate::models::{Category, Document, NewCategory, NewDocument, User, STATUS_PENDING};
use crate::provision::sanitize_name;
use crate::schema::{categories, documents, users};

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("watched folder does not exist: {0}")]
    WatchedFolderMissing(PathBuf),
    #[error("no users available to own imported documents")]
    NoDefaultUser,
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),
    #[error("filesystem error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Default, Serialize)]
pub struct SyncReport {
    pub processed: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// PDF files sitting directly in `dir` — no recursion, extension matched
/// case-insensitively.
pub fn scan_watched_folder(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut pdfs = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let is_pdf = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("pdf"))
            .unwrap_or(false);
        if is_pdf {
            pdfs.push(path);
        }
    }
    pdfs.sort();
    Ok(pdfs)
}

/// Reconciles the watched folder against the documents table. Each new PDF is
/// archived into `<watched>/processed/`, a timestamped working copy is staged
/// under `<main>/Pending/`, and a pending document is registered for it.
/// Files whose name already matches a stored original filename are skipped so
/// repeated runs never ingest twice. Per-file failures are logged and the
/// remaining files still get processed. With `dry_run` nothing is touched;
/// the report only counts what would happen.
pub fn run(
    conn: &mut PgConnection,
    config: &AppConfig,
    dry_run: bool,
) -> Result<SyncReport, SyncError> {
    let watched = config.watched_folder.as_path();
    if !watched.is_dir() {
        return Err(SyncError::WatchedFolderMissing(watched.to_path_buf()));
    }

    let pdf_files = scan_watched_folder(watched)?;
    let mut report = SyncReport::default();
    if pdf_files.is_empty() {
        info!(folder = %watched.display(), "no new PDF files in watched folder");
        return Ok(report);
    }

    let default_category = default_sync_category(conn, &config.sync_category)?;
    let default_user: User = users::table
        .order(users::created_at.asc())
        .first(conn)
        .optional()?
        .ok_or(SyncError::NoDefaultUser)?;

    for pdf_file in &pdf_files {
        let Some(file_name) = pdf_file.file_name().and_then(|n| n.to_str()) else {
            warn!(path = %pdf_file.display(), "skipping file with non-UTF-8 name");
            report.skipped += 1;
            continue;
        };

        let existing: Option<Document> = documents::table
            .filter(documents::original_filename.eq(file_name))
            .first(conn)
            .optional()?;
        if existing.is_some() {
            warn!(file = %file_name, "document already registered, skipping");
            report.skipped += 1;
            continue;
        }

        if dry_run {
            info!(file = %file_name, "dry run, would process");
            report.processed += 1;
            continue;
        }

        match ingest_file(conn, config, pdf_file, file_name, &default_category, &default_user) {
            Ok(document_id) => {
                info!(file = %file_name, document_id = %document_id, "imported document");
                report.processed += 1;
            }
            Err(err) => {
                error!(file = %file_name, error = %err, "failed to import document");
                report.failed += 1;
            }
        }
    }

    Ok(report)
}

fn ingest_file(
    conn: &mut PgConnection,
    config: &AppConfig,
    pdf_file: &Path,
    file_name: &str,
    category: &Category,
    owner: &User,
) -> Result<Uuid, SyncError> {
    let processed_folder = config.watched_folder.join("processed");
    fs::create_dir_all(&processed_folder)?;
    let staging_folder = config.staging_folder();
    fs::create_dir_all(&staging_folder)?;

    let timestamp = Local::now().format("%Y%m%d_%H%M%S");

    // A same-named file already archived gets overwritten here; the duplicate
    // guard above only covers files that made it into the documents table.
    let processed_path = processed_folder.join(file_name);
    move_file(pdf_file, &processed_path)?;

    let staged_name = format!("{timestamp}_{file_name}");
    let staged_path = staging_folder.join(&staged_name);
    fs::copy(&processed_path, &staged_path)?;

    let staged_bytes = fs::read(&staged_path)?;
    let checksum = hex::encode(Sha256::digest(&staged_bytes));

    let relative_path = staged_path
        .strip_prefix(&config.main_folder)
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_else(|_| staged_path.to_string_lossy().into_owned());

    let title = Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(file_name)
        .to_string();

    let new_document = NewDocument {
        id: Uuid::new_v4(),
        title,
        file_path: Some(relative_path),
        checksum: Some(checksum),
        category_id: Some(category.id),
        document_type_id: None,
        entity_id: None,
        document_date: None,
        due_date: None,
        status: STATUS_PENDING.to_string(),
        payment_status: "not_applicable".to_string(),
        created_by: Some(owner.id),
        notes: Some(format!(
            "Imported automatically from the watched folder on {}",
            Local::now().format("%Y-%m-%d %H:%M")
        )),
        tags: None,
        original_filename: Some(file_name.to_string()),
        imported_from_folder: true,
    };

    let document: Document = conn.transaction::<Document, diesel::result::Error, _>(|conn| {
        diesel::insert_into(documents::table)
            .values(&new_document)
            .execute(conn)?;
        let document: Document = documents::table.find(new_document.id).first(conn)?;
        history::record_creation(conn, &document)?;
        Ok(document)
    })?;

    Ok(document.id)
}

fn default_sync_category(
    conn: &mut PgConnection,
    name: &str,
) -> Result<Category, diesel::result::Error> {
    if let Some(category) = categories::table
        .filter(categories::name.eq(name))
        .first::<Category>(conn)
        .optional()?
    {
        return Ok(category);
    }

    let new_category = NewCategory {
        id: Uuid::new_v4(),
        name: name.to_string(),
        code: sanitize_name(name).to_uppercase(),
        description: Some("Documents imported automatically from the watched folder".to_string()),
        is_active: true,
        applies_to_all: true,
    };
    diesel::insert_into(categories::table)
        .values(&new_category)
        .execute(conn)?;
    info!(category = %name, "created default sync category");
    categories::table.find(new_category.id).first(conn)
}

/// Rename when possible, copy-and-delete when the rename crosses devices.
fn move_file(source: &Path, target: &Path) -> io::Result<()> {
    match fs::rename(source, target) {
        Ok(()) => Ok(()),
        Err(_) => {
            fs::copy(source, target)?;
            fs::remove_file(source)
        }
    }
}
