use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use anyhow::{Result, anyhow};

use crate::models::{ScriptRow, ScriptSummaryRow, UserRow};
use crate::store::{ScriptStore, UserStore};

/// Process-local store for tests and local demos.
///
/// Data lives only as long as the process and is invisible to other
/// processes. Each operation holds the relevant lock for its whole
/// check-and-write.
#[derive(Default)]
pub struct MemoryStore {
    scripts: Mutex<HashMap<String, ScriptRow>>,
    users: Mutex<Users>,
}

#[derive(Default)]
struct Users {
    by_id: HashMap<String, UserRow>,
    id_by_email: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn scripts(&self) -> Result<MutexGuard<'_, HashMap<String, ScriptRow>>> {
        self.scripts.lock().map_err(|e| anyhow!("Script map lock poisoned: {}", e))
    }

    fn users(&self) -> Result<MutexGuard<'_, Users>> {
        self.users.lock().map_err(|e| anyhow!("User map lock poisoned: {}", e))
    }

    fn update_owned<F>(&self, id: &str, owner_id: &str, apply: F) -> Result<Option<ScriptRow>>
    where
        F: FnOnce(&mut ScriptRow),
    {
        let mut scripts = self.scripts()?;
        match scripts.get_mut(id) {
            Some(row) if row.owner_id == owner_id => {
                apply(row);
                Ok(Some(row.clone()))
            }
            _ => Ok(None),
        }
    }
}

impl ScriptStore for MemoryStore {
    fn insert_script(&self, row: &ScriptRow) -> Result<()> {
        let mut scripts = self.scripts()?;
        if scripts.contains_key(&row.id) {
            return Err(anyhow!("Duplicate script id: {}", row.id));
        }
        scripts.insert(row.id.clone(), row.clone());
        Ok(())
    }

    fn get_script(&self, id: &str) -> Result<Option<ScriptRow>> {
        Ok(self.scripts()?.get(id).cloned())
    }

    fn list_scripts_by_owner(
        &self,
        owner_id: &str,
        preview_chars: usize,
    ) -> Result<Vec<ScriptSummaryRow>> {
        let scripts = self.scripts()?;
        let mut owned: Vec<&ScriptRow> =
            scripts.values().filter(|row| row.owner_id == owner_id).collect();
        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));

        Ok(owned
            .into_iter()
            .map(|row| ScriptSummaryRow {
                id: row.id.clone(),
                name: row.name.clone(),
                created_at: row.created_at.clone(),
                updated_at: row.updated_at.clone(),
                code_length: row.code.chars().count() as i64,
                code_preview: row.code.chars().take(preview_chars).collect(),
            })
            .collect())
    }

    fn update_script_code(
        &self,
        id: &str,
        owner_id: &str,
        code: &str,
        updated_at: &str,
    ) -> Result<Option<ScriptRow>> {
        self.update_owned(id, owner_id, |row| {
            row.code = code.to_string();
            row.updated_at = Some(updated_at.to_string());
        })
    }

    fn update_script_name(
        &self,
        id: &str,
        owner_id: &str,
        name: &str,
        updated_at: &str,
    ) -> Result<Option<ScriptRow>> {
        self.update_owned(id, owner_id, |row| {
            row.name = name.to_string();
            row.updated_at = Some(updated_at.to_string());
        })
    }

    fn delete_script(&self, id: &str, owner_id: &str) -> Result<bool> {
        let mut scripts = self.scripts()?;
        if scripts.get(id).is_some_and(|row| row.owner_id == owner_id) {
            scripts.remove(id);
            return Ok(true);
        }
        Ok(false)
    }
}

impl UserStore for MemoryStore {
    fn create_user(&self, row: &UserRow) -> Result<bool> {
        let mut users = self.users()?;
        if users.id_by_email.contains_key(&row.email) {
            return Ok(false);
        }
        users.id_by_email.insert(row.email.clone(), row.id.clone());
        users.by_id.insert(row.id.clone(), row.clone());
        Ok(true)
    }

    fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        let users = self.users()?;
        Ok(users
            .id_by_email
            .get(email)
            .and_then(|id| users.by_id.get(id))
            .cloned())
    }

    fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        Ok(self.users()?.by_id.get(id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owner_mismatch_leaves_row_untouched() {
        let store = MemoryStore::new();
        store
            .insert_script(&ScriptRow {
                id: "scr_1".into(),
                name: "n".into(),
                code: "print(1)".into(),
                owner_id: "u1".into(),
                created_at: "2024-01-01T00:00:00.000000000Z".into(),
                updated_at: None,
            })
            .unwrap();

        assert!(store.update_script_code("scr_1", "u2", "x", "later").unwrap().is_none());
        assert!(!store.delete_script("scr_1", "u2").unwrap());

        let row = store.get_script("scr_1").unwrap().unwrap();
        assert_eq!(row.code, "print(1)");
        assert!(row.updated_at.is_none());
    }

    #[test]
    fn email_index_follows_inserts() {
        let store = MemoryStore::new();
        let user = UserRow {
            id: "usr_1".into(),
            email: "a@example.com".into(),
            username: "a".into(),
            password_hash: "hash".into(),
            created_at: "2024-01-01T00:00:00.000000000Z".into(),
        };
        assert!(store.create_user(&user).unwrap());
        assert!(!store.create_user(&UserRow { id: "usr_2".into(), ..user.clone() }).unwrap());

        assert_eq!(store.get_user_by_email("a@example.com").unwrap(), Some(user));
        assert!(store.get_user_by_id("usr_2").unwrap().is_none());
    }
}
