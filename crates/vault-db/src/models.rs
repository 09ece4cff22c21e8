/// Database row types — these map directly to SQLite rows.
/// Distinct from vault-types API models to keep the DB layer independent.
/// Timestamps stay as the stored text; the repository parses them.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptRow {
    pub id: String,
    pub name: String,
    pub code: String,
    pub owner_id: String,
    pub created_at: String,
    pub updated_at: Option<String>,
}

/// A script row with the code already cut down to a preview by the store.
/// `code_length` is the character count of the full code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptSummaryRow {
    pub id: String,
    pub name: String,
    pub created_at: String,
    pub updated_at: Option<String>,
    pub code_length: i64,
    pub code_preview: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRow {
    pub id: String,
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub created_at: String,
}
