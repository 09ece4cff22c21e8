use crate::Database;
use crate::models::{ScriptRow, ScriptSummaryRow, UserRow};
use crate::store::{ScriptStore, UserStore};
use anyhow::Result;
use rusqlite::{Connection, Row};

const SCRIPT_COLUMNS: &str = "id, name, code, owner_id, created_at, updated_at";
const USER_COLUMNS: &str = "id, email, username, password_hash, created_at";

impl ScriptStore for Database {
    fn insert_script(&self, row: &ScriptRow) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO scripts (id, name, code, owner_id, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    row.id,
                    row.name,
                    row.code,
                    row.owner_id,
                    row.created_at,
                    row.updated_at
                ],
            )?;
            Ok(())
        })
    }

    fn get_script(&self, id: &str) -> Result<Option<ScriptRow>> {
        self.with_conn(|conn| query_script_by_id(conn, id))
    }

    fn list_scripts_by_owner(
        &self,
        owner_id: &str,
        preview_chars: usize,
    ) -> Result<Vec<ScriptSummaryRow>> {
        self.with_conn(|conn| query_summaries_by_owner(conn, owner_id, preview_chars))
    }

    fn update_script_code(
        &self,
        id: &str,
        owner_id: &str,
        code: &str,
        updated_at: &str,
    ) -> Result<Option<ScriptRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!(
                    "UPDATE scripts SET code = ?3, updated_at = ?4
                     WHERE id = ?1 AND owner_id = ?2
                     RETURNING {SCRIPT_COLUMNS}"
                ),
                rusqlite::params![id, owner_id, code, updated_at],
                map_script_row,
            )
            .optional()
        })
    }

    fn update_script_name(
        &self,
        id: &str,
        owner_id: &str,
        name: &str,
        updated_at: &str,
    ) -> Result<Option<ScriptRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!(
                    "UPDATE scripts SET name = ?3, updated_at = ?4
                     WHERE id = ?1 AND owner_id = ?2
                     RETURNING {SCRIPT_COLUMNS}"
                ),
                rusqlite::params![id, owner_id, name, updated_at],
                map_script_row,
            )
            .optional()
        })
    }

    fn delete_script(&self, id: &str, owner_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let removed = conn.execute(
                "DELETE FROM scripts WHERE id = ?1 AND owner_id = ?2",
                (id, owner_id),
            )?;
            Ok(removed == 1)
        })
    }
}

impl UserStore for Database {
    fn create_user(&self, row: &UserRow) -> Result<bool> {
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT INTO users (id, email, username, password_hash, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(email) DO NOTHING",
                (&row.id, &row.email, &row.username, &row.password_hash, &row.created_at),
            )?;
            Ok(inserted == 1)
        })
    }

    fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email", email))
    }

    fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id", id))
    }
}

fn map_script_row(row: &Row<'_>) -> rusqlite::Result<ScriptRow> {
    Ok(ScriptRow {
        id: row.get(0)?,
        name: row.get(1)?,
        code: row.get(2)?,
        owner_id: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

fn query_script_by_id(conn: &Connection, id: &str) -> Result<Option<ScriptRow>> {
    let mut stmt = conn.prepare(&format!("SELECT {SCRIPT_COLUMNS} FROM scripts WHERE id = ?1"))?;

    stmt.query_row([id], map_script_row).optional()
}

fn query_summaries_by_owner(
    conn: &Connection,
    owner_id: &str,
    preview_chars: usize,
) -> Result<Vec<ScriptSummaryRow>> {
    // SQLite's length()/substr() stop at an embedded NUL, so the preview is
    // cut on this side.
    let mut stmt = conn.prepare(
        "SELECT id, name, created_at, updated_at, code
         FROM scripts
         WHERE owner_id = ?1
         ORDER BY created_at DESC, id DESC",
    )?;

    let rows = stmt
        .query_map([owner_id], |row| {
            let code: String = row.get(4)?;
            Ok(ScriptSummaryRow {
                id: row.get(0)?,
                name: row.get(1)?,
                created_at: row.get(2)?,
                updated_at: row.get(3)?,
                code_length: code.chars().count() as i64,
                code_preview: code.chars().take(preview_chars).collect(),
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

/// `column` is one of our own constants, never caller input.
fn query_user(conn: &Connection, column: &str, value: &str) -> Result<Option<UserRow>> {
    let mut stmt =
        conn.prepare(&format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = ?1"))?;

    stmt.query_row([value], |row| {
        Ok(UserRow {
            id: row.get(0)?,
            email: row.get(1)?,
            username: row.get(2)?,
            password_hash: row.get(3)?,
            created_at: row.get(4)?,
        })
    })
    .optional()
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: &str, owner: &str, code: &str, created_at: &str) -> ScriptRow {
        ScriptRow {
            id: id.into(),
            name: "n".into(),
            code: code.into(),
            owner_id: owner.into(),
            created_at: created_at.into(),
            updated_at: None,
        }
    }

    #[test]
    fn compound_predicate_guards_updates_and_deletes() {
        let db = Database::open_in_memory().unwrap();
        db.insert_script(&row("scr_1", "u1", "print(1)", "2024-01-01T00:00:00.000000000Z"))
            .unwrap();

        let ts = "2024-01-02T00:00:00.000000000Z";
        assert!(db.update_script_code("scr_1", "u2", "x", ts).unwrap().is_none());
        assert!(db.update_script_name("scr_1", "u2", "x", ts).unwrap().is_none());
        assert!(!db.delete_script("scr_1", "u2").unwrap());
        assert_eq!(db.get_script("scr_1").unwrap().unwrap().code, "print(1)");

        let updated = db.update_script_code("scr_1", "u1", "x", ts).unwrap().unwrap();
        assert_eq!(updated.code, "x");
        assert_eq!(updated.updated_at.as_deref(), Some(ts));

        assert!(db.delete_script("scr_1", "u1").unwrap());
        assert!(db.get_script("scr_1").unwrap().is_none());
    }

    #[test]
    fn listing_truncates_in_sql_and_orders_newest_first() {
        let db = Database::open_in_memory().unwrap();
        let long = "é".repeat(250);
        db.insert_script(&row("scr_a", "u1", &long, "2024-01-01T00:00:00.000000000Z"))
            .unwrap();
        db.insert_script(&row("scr_b", "u1", "short", "2024-01-02T00:00:00.000000000Z"))
            .unwrap();
        db.insert_script(&row("scr_c", "u2", "other", "2024-01-03T00:00:00.000000000Z"))
            .unwrap();

        let rows = db.list_scripts_by_owner("u1", 200).unwrap();
        let ids: Vec<&str> = rows.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["scr_b", "scr_a"]);
        assert_eq!(rows[1].code_length, 250);
        assert_eq!(rows[1].code_preview.chars().count(), 200);
    }

    #[test]
    fn duplicate_email_is_not_inserted() {
        let db = Database::open_in_memory().unwrap();
        let user = UserRow {
            id: "usr_1".into(),
            email: "a@example.com".into(),
            username: "a".into(),
            password_hash: "hash".into(),
            created_at: "2024-01-01T00:00:00.000000000Z".into(),
        };
        assert!(db.create_user(&user).unwrap());

        let dup = UserRow { id: "usr_2".into(), ..user.clone() };
        assert!(!db.create_user(&dup).unwrap());

        assert_eq!(db.get_user_by_email("a@example.com").unwrap().unwrap().id, "usr_1");
        assert!(db.get_user_by_id("usr_2").unwrap().is_none());
    }
}
