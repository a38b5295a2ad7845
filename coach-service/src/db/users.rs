//! User document operations.

use rusqlite::{OptionalExtension, params};
use tracing::warn;

use super::Database;
use super::models::UserData;
use crate::error::{DatabaseError, ServiceResult};

impl Database {
    /// Get a user document by LINE user id
    pub fn get_user(&self, user_id: &str) -> ServiceResult<Option<UserData>> {
        let conn = self.lock()?;

        let data: Option<String> = conn
            .query_row(
                "SELECT data FROM users WHERE id = ?1",
                params![user_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(DatabaseError::Query)?;

        data.map(|json| serde_json::from_str(&json).map_err(DatabaseError::Serialization))
            .transpose()
            .map_err(Into::into)
    }

    /// Replace the whole user document
    pub fn put_user(&self, user: &UserData) -> ServiceResult<()> {
        let conn = self.lock()?;

        let data = serde_json::to_string(user).map_err(DatabaseError::Serialization)?;

        conn.execute(
            r#"
            INSERT INTO users (id, data, updated_at) VALUES (?1, ?2, datetime('now'))
            ON CONFLICT(id) DO UPDATE SET
                data = excluded.data,
                updated_at = excluded.updated_at
            "#,
            params![user.id, data],
        )
        .map_err(DatabaseError::Query)?;

        Ok(())
    }

    /// All user documents; rows that fail to decode are skipped
    pub fn list_users(&self) -> ServiceResult<Vec<UserData>> {
        let conn = self.lock()?;

        let mut stmt = conn
            .prepare("SELECT id, data FROM users ORDER BY id")
            .map_err(DatabaseError::Query)?;

        let rows = stmt
            .query_map([], |row| {
                let id: String = row.get(0)?;
                let data: String = row.get(1)?;
                Ok((id, data))
            })
            .map_err(DatabaseError::Query)?;

        let mut users = Vec::new();
        for row in rows {
            let (id, data) = row.map_err(DatabaseError::Query)?;
            match serde_json::from_str::<UserData>(&data) {
                Ok(user) => users.push(user),
                Err(e) => warn!(user_id = %id, error = %e, "Skipping undecodable user document"),
            }
        }

        Ok(users)
    }
}

#[cfg(test)]
mod tests {
    use crate::db::models::{Handedness, UserData};
    use crate::db::test_database;

    fn user(id: &str) -> UserData {
        UserData {
            id: id.to_string(),
            name: "Amy".to_string(),
            handedness: Handedness::Right,
            folder_paths: Default::default(),
            portfolio: Default::default(),
            gpt_conversation_ids: Default::default(),
        }
    }

    #[test]
    fn test_put_and_get_user() {
        let (_dir, db) = test_database();

        assert!(db.get_user("U1").unwrap().is_none());

        let mut u = user("U1");
        db.put_user(&u).unwrap();
        u.handedness = Handedness::Left;
        db.put_user(&u).unwrap();

        let loaded = db.get_user("U1").unwrap().unwrap();
        assert_eq!(loaded.handedness, Handedness::Left);
    }

    #[test]
    fn test_list_users_skips_undecodable() {
        let (_dir, db) = test_database();

        db.put_user(&user("U1")).unwrap();
        db.lock()
            .unwrap()
            .execute(
                "INSERT INTO users (id, data) VALUES ('U2', '{not json')",
                [],
            )
            .unwrap();

        let users = db.list_users().unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].id, "U1");
    }
}
