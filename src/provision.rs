use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use diesel::pg::PgConnection;
use diesel::prelude::*;
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::{Category, Entity};
use crate::schema::{categories, category_entities, entities};

/// Filesystem token for an entity or category name: alphanumerics, spaces,
/// `-` and `_` survive, everything else is stripped, then spaces become `_`.
/// The rule must stay stable — existing folder trees were built with it.
pub fn sanitize_name(raw: &str) -> String {
    let kept: String = raw
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_'))
        .collect();
    kept.trim().replace(' ', "_")
}

#[derive(Debug, Default)]
pub struct RebuildReport {
    pub entities_provisioned: usize,
    pub category_folders_created: usize,
}

/// Creates `base/<token>` for the entity (idempotent), records the folder
/// path on the entity the first time only, then materializes a subdirectory
/// for every active category that applies to it. Returns the entity folder.
///
/// Renaming an entity later never moves an already-provisioned folder.
pub fn ensure_entity_folder(
    conn: &mut PgConnection,
    entity: &Entity,
    base: &Path,
) -> anyhow::Result<PathBuf> {
    let token = sanitize_name(&entity.name);
    // An all-symbol name sanitizes to nothing; the code is always a safe token.
    let token = if token.is_empty() {
        entity.code.clone()
    } else {
        token
    };

    let entity_dir = match &entity.folder_path {
        Some(existing) => PathBuf::from(existing),
        None => base.join(&token),
    };
    fs::create_dir_all(&entity_dir)?;

    if entity.folder_path.is_none() {
        diesel::update(entities::table.find(entity.id))
            .set(entities::folder_path.eq(entity_dir.to_string_lossy().into_owned()))
            .execute(conn)?;
        info!(entity = %entity.name, path = %entity_dir.display(), "provisioned entity folder");
    }

    let active: Vec<Category> = categories::table
        .filter(categories::is_active.eq(true))
        .load(conn)?;
    let linked: HashSet<Uuid> = category_entities::table
        .filter(category_entities::entity_id.eq(entity.id))
        .select(category_entities::category_id)
        .load::<Uuid>(conn)?
        .into_iter()
        .collect();

    for category in active {
        if !category.applies_to_all && !linked.contains(&category.id) {
            continue;
        }
        let subdir = entity_dir.join(sanitize_name(&category.name));
        if let Err(err) = fs::create_dir_all(&subdir) {
            warn!(
                entity = %entity.name,
                category = %category.name,
                error = %err,
                "failed to create category folder"
            );
        }
    }

    Ok(entity_dir)
}

/// Creates the category's subdirectory under every applicable entity that
/// already has a provisioned folder. Entities without one are skipped, and a
/// failure on one entity never aborts the rest. Strictly additive: folders
/// are never removed when applicability shrinks. Returns how many entity
/// folders received the subdirectory.
pub fn ensure_category_folders(
    conn: &mut PgConnection,
    category: &Category,
) -> anyhow::Result<usize> {
    let applicable: Vec<Entity> = if category.applies_to_all {
        entities::table
            .filter(entities::auto_create_folder.eq(true))
            .load(conn)?
    } else {
        let linked: Vec<Uuid> = category_entities::table
            .filter(category_entities::category_id.eq(category.id))
            .select(category_entities::entity_id)
            .load(conn)?;
        entities::table
            .filter(entities::id.eq_any(linked))
            .filter(entities::auto_create_folder.eq(true))
            .load(conn)?
    };

    let dir_name = sanitize_name(&category.name);
    let mut affected = 0;

    for entity in applicable {
        let Some(folder_path) = entity.folder_path.as_deref() else {
            continue;
        };
        let subdir = Path::new(folder_path).join(&dir_name);
        match fs::create_dir_all(&subdir) {
            Ok(()) => affected += 1,
            Err(err) => warn!(
                entity = %entity.name,
                category = %category.name,
                error = %err,
                "failed to create category folder"
            ),
        }
    }

    Ok(affected)
}

/// Re-provisions every auto-provisioning entity and every active category.
pub fn rebuild_all(conn: &mut PgConnection, base: &Path) -> anyhow::Result<RebuildReport> {
    let mut report = RebuildReport::default();

    let auto_entities: Vec<Entity> = entities::table
        .filter(entities::auto_create_folder.eq(true))
        .order(entities::name.asc())
        .load(conn)?;
    for entity in &auto_entities {
        match ensure_entity_folder(conn, entity, base) {
            Ok(_) => report.entities_provisioned += 1,
            Err(err) => warn!(entity = %entity.name, error = %err, "failed to provision entity"),
        }
    }

    let active: Vec<Category> = categories::table
        .filter(categories::is_active.eq(true))
        .order(categories::name.asc())
        .load(conn)?;
    for category in &active {
        match ensure_category_folders(conn, category) {
            Ok(count) => report.category_folders_created += count,
            Err(err) => warn!(
                category = %category.name,
                error = %err,
                "failed to provision category folders"
            ),
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::sanitize_name;

    #[test]
    fn strips_special_characters_and_joins_words() {
        assert_eq!(sanitize_name("Acme, S.A. de C.V."), "Acme_SA_de_CV");
        assert_eq!(sanitize_name("Recursos Humanos"), "Recursos_Humanos");
        assert_eq!(sanitize_name("already_safe-name"), "already_safe-name");
    }

    #[test]
    fn is_deterministic() {
        let name = "Gómez & Asociados (México)";
        assert_eq!(sanitize_name(name), sanitize_name(name));
    }

    #[test]
    fn trims_before_replacing_spaces() {
        assert_eq!(sanitize_name("  padded name  "), "padded_name");
        assert_eq!(sanitize_name("!!!"), "");
    }
}
