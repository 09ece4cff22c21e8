use anyhow::Result;

use crate::models::{ScriptRow, ScriptSummaryRow, UserRow};

/// Persistence for script rows.
///
/// Every owner-scoped mutation must apply the `id AND owner_id` check and the
/// write as one step (one statement, or one lock acquisition), never as a
/// read followed by a separate write.
pub trait ScriptStore: Send + Sync {
    fn insert_script(&self, row: &ScriptRow) -> Result<()>;

    fn get_script(&self, id: &str) -> Result<Option<ScriptRow>>;

    /// Newest first. `preview_chars` bounds how much of each code body is
    /// returned.
    fn list_scripts_by_owner(
        &self,
        owner_id: &str,
        preview_chars: usize,
    ) -> Result<Vec<ScriptSummaryRow>>;

    fn update_script_code(
        &self,
        id: &str,
        owner_id: &str,
        code: &str,
        updated_at: &str,
    ) -> Result<Option<ScriptRow>>;

    fn update_script_name(
        &self,
        id: &str,
        owner_id: &str,
        name: &str,
        updated_at: &str,
    ) -> Result<Option<ScriptRow>>;

    /// Returns whether a row was removed.
    fn delete_script(&self, id: &str, owner_id: &str) -> Result<bool>;
}

/// Persistence for user accounts.
pub trait UserStore: Send + Sync {
    /// Inserts unless the email is already taken. Returns whether the row
    /// was inserted.
    fn create_user(&self, row: &UserRow) -> Result<bool>;

    fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>>;

    fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>>;
}
