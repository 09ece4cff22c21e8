//! Owner-scoped script operations.
//!
//! Every mutation hands the owner id to the store together with the script
//! id, and the store applies both in the same statement. There is no
//! separate ownership read, so a concurrent request cannot slip in between
//! a check and a write.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, warn};

use vault_types::models::{Script, ScriptSummary};

use crate::clock;
use crate::ids;
use crate::models::{ScriptRow, ScriptSummaryRow};
use crate::store::ScriptStore;

/// Characters of code kept in a list-view preview.
pub const PREVIEW_CHARS: usize = 200;
pub const PREVIEW_MARKER: &str = "...";
pub const DEFAULT_SCRIPT_NAME: &str = "Untitled Script";

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("{0}")]
    Validation(&'static str),
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, RepositoryError>;

#[derive(Clone)]
pub struct ScriptRepository {
    store: Arc<dyn ScriptStore>,
}

impl ScriptRepository {
    pub fn new(store: Arc<dyn ScriptStore>) -> Self {
        Self { store }
    }

    pub fn create(&self, owner_id: &str, name: Option<&str>, code: &str) -> Result<Script> {
        if owner_id.trim().is_empty() {
            return Err(RepositoryError::Validation("owner is required"));
        }
        if code.is_empty() {
            return Err(RepositoryError::Validation("code is required"));
        }

        let name = match name.map(str::trim) {
            Some(name) if !name.is_empty() => name,
            _ => DEFAULT_SCRIPT_NAME,
        };

        let row = ScriptRow {
            id: ids::script_id(),
            name: name.to_string(),
            code: code.to_string(),
            owner_id: owner_id.to_string(),
            created_at: clock::format_timestamp(clock::now()),
            updated_at: None,
        };
        self.store.insert_script(&row)?;

        debug!(script_id = %row.id, owner_id, code_len = row.code.len(), "Script created");
        Ok(script_from_row(row))
    }

    /// No ownership check: callers decide who may see the code.
    pub fn get_by_id(&self, id: &str) -> Result<Option<Script>> {
        if id.is_empty() {
            return Ok(None);
        }
        Ok(self.store.get_script(id)?.map(script_from_row))
    }

    pub fn list_by_owner(&self, owner_id: &str) -> Result<Vec<ScriptSummary>> {
        let rows = self.store.list_scripts_by_owner(owner_id, PREVIEW_CHARS)?;
        Ok(rows.into_iter().map(summary_from_row).collect())
    }

    /// `None` when the id is unknown or owned by someone else; the two are
    /// indistinguishable here.
    pub fn update_code(&self, id: &str, owner_id: &str, new_code: &str) -> Result<Option<Script>> {
        if new_code.is_empty() {
            return Err(RepositoryError::Validation("code is required"));
        }

        let updated_at = clock::format_timestamp(clock::now());
        let row = self.store.update_script_code(id, owner_id, new_code, &updated_at)?;

        if row.is_some() {
            debug!(script_id = id, owner_id, "Script code updated");
        }
        Ok(row.map(script_from_row))
    }

    pub fn update_name(&self, id: &str, owner_id: &str, new_name: &str) -> Result<Option<Script>> {
        let new_name = new_name.trim();
        if new_name.is_empty() {
            return Err(RepositoryError::Validation("name is required"));
        }

        let updated_at = clock::format_timestamp(clock::now());
        let row = self.store.update_script_name(id, owner_id, new_name, &updated_at)?;

        if row.is_some() {
            debug!(script_id = id, owner_id, "Script renamed");
        }
        Ok(row.map(script_from_row))
    }

    /// `false` for unknown or non-owned ids.
    pub fn delete(&self, id: &str, owner_id: &str) -> Result<bool> {
        let removed = self.store.delete_script(id, owner_id)?;
        if removed {
            debug!(script_id = id, owner_id, "Script deleted");
        }
        Ok(removed)
    }
}

/// Cuts `code` to the preview length, marking truncation. Stores already
/// bound what they return; this is the one place the marker is decided.
pub fn preview(code: &str, total_chars: usize) -> String {
    let mut preview: String = code.chars().take(PREVIEW_CHARS).collect();
    if total_chars > PREVIEW_CHARS {
        preview.push_str(PREVIEW_MARKER);
    }
    preview
}

fn script_from_row(row: ScriptRow) -> Script {
    let created_at = timestamp_or_default(&row.created_at, &row.id);
    let updated_at = row.updated_at.as_deref().map(|raw| timestamp_or_default(raw, &row.id));

    Script {
        id: row.id,
        name: row.name,
        code: row.code,
        owner_id: row.owner_id,
        created_at,
        updated_at,
    }
}

fn summary_from_row(row: ScriptSummaryRow) -> ScriptSummary {
    let created_at = timestamp_or_default(&row.created_at, &row.id);
    let updated_at = row.updated_at.as_deref().map(|raw| timestamp_or_default(raw, &row.id));
    let code_length = usize::try_from(row.code_length).unwrap_or_default();

    ScriptSummary {
        code_preview: preview(&row.code_preview, code_length),
        id: row.id,
        name: row.name,
        created_at,
        updated_at,
        code_length,
    }
}

fn timestamp_or_default(raw: &str, script_id: &str) -> DateTime<Utc> {
    clock::parse_timestamp(raw).unwrap_or_else(|| {
        warn!("Corrupt timestamp '{}' on script '{}'", raw, script_id);
        DateTime::default()
    })
}
