use helpdesk_types::models::{Role, User, UserId};
use rusqlite::Connection;
use tracing::{debug, info};

use crate::error::is_unique_violation;
use crate::models::{OptionalExt, USER_COLUMNS, UserRow};
use crate::password;
use crate::{Database, StoreError, StoreResult, begin_write};

/// Account registration and credential checks.
pub struct UserStore<'a> {
    db: &'a Database,
}

impl<'a> UserStore<'a> {
    pub(crate) fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Create an account. The password is stored only as an Argon2id hash.
    pub fn register(&self, username: &str, password: &str, role: Role) -> StoreResult<UserId> {
        if username.trim().is_empty() {
            return Err(StoreError::InvalidInput("username must not be empty"));
        }
        if password.is_empty() {
            return Err(StoreError::InvalidInput("password must not be empty"));
        }

        // Hash before taking the writer lock
        let hashed_password = password::hash_password(password)?;

        let user_id = self.db.with_conn_mut(|conn| {
            let tx = begin_write(conn)?;
            match tx.execute(
                "INSERT INTO users (username, hashed_password, role) VALUES (?1, ?2, ?3)",
                (username, &hashed_password, role.as_str()),
            ) {
                Err(e) if is_unique_violation(&e) => {
                    return Err(StoreError::DuplicateUsername(username.to_string()));
                }
                result => {
                    result?;
                }
            }
            let id = tx.last_insert_rowid();
            tx.commit()?;
            Ok(UserId::from_row(id))
        })?;

        info!("Registered user {} ({}) as {}", username, user_id, role);
        Ok(user_id)
    }

    /// Check credentials. Unknown user and wrong password both come back as
    /// [`StoreError::AuthFailure`].
    pub fn authenticate(&self, username: &str, password: &str) -> StoreResult<User> {
        let row = self
            .db
            .with_conn(|conn| query_user_by_username(conn, username))?;

        match row {
            Some(row) if password::verify_password(password, &row.hashed_password) => {
                debug!("Login succeeded for {}", username);
                Ok(row.into_user())
            }
            Some(_) => {
                debug!("Login failed for {}", username);
                Err(StoreError::AuthFailure)
            }
            None => {
                password::verify_against_dummy(password)?;
                debug!("Login failed for {}", username);
                Err(StoreError::AuthFailure)
            }
        }
    }

    /// Usernames of every Support account, alphabetical.
    pub fn list_support_usernames(&self) -> StoreResult<Vec<String>> {
        self.db.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT username FROM users WHERE role = ?1 ORDER BY username")?;
            let names = stmt
                .query_map([Role::Support.as_str()], |row| row.get(0))?
                .collect::<std::result::Result<Vec<String>, _>>()?;
            Ok(names)
        })
    }
}

fn query_user_by_username(conn: &Connection, username: &str) -> StoreResult<Option<UserRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM users WHERE username = ?1",
        USER_COLUMNS
    ))?;

    let row = stmt.query_row([username], UserRow::from_row).optional()?;
    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::open_temp;
    use std::time::Instant;

    fn user_count(db: &Database) -> i64 {
        db.with_conn(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM users", [], |r| r.get(0))?))
            .unwrap()
    }

    #[test]
    fn register_then_authenticate_returns_same_role() {
        let (_dir, db) = open_temp();
        let users = db.users();

        let id = users.register("alice", "s3cret-pass", Role::Support).unwrap();
        let user = users.authenticate("alice", "s3cret-pass").unwrap();

        assert_eq!(user.user_id, id);
        assert_eq!(user.username, "alice");
        assert_eq!(user.role, Role::Support);
    }

    #[test]
    fn duplicate_username_is_rejected_without_a_second_row() {
        let (_dir, db) = open_temp();
        let users = db.users();

        users.register("bob", "first-pass", Role::Client).unwrap();
        let err = users.register("bob", "other-pass", Role::Support).unwrap_err();

        assert!(matches!(err, StoreError::DuplicateUsername(ref name) if name == "bob"));
        assert_eq!(user_count(&db), 1);
        assert_eq!(users.authenticate("bob", "first-pass").unwrap().role, Role::Client);
    }

    #[test]
    fn wrong_password_and_unknown_user_look_the_same() {
        let (_dir, db) = open_temp();
        let users = db.users();
        users.register("carol", "right-pass", Role::Client).unwrap();

        let wrong_password = users.authenticate("carol", "wrong-pass").unwrap_err();
        let unknown_user = users.authenticate("mallory", "right-pass").unwrap_err();

        assert!(matches!(wrong_password, StoreError::AuthFailure));
        assert!(matches!(unknown_user, StoreError::AuthFailure));
        assert_eq!(wrong_password.to_string(), unknown_user.to_string());
    }

    #[test]
    fn unknown_user_costs_a_password_verification() {
        let (_dir, db) = open_temp();
        let users = db.users();
        users.register("erin", "right-pass", Role::Client).unwrap();
        assert!(password::dummy_hash().unwrap().starts_with("$argon2id$"));

        let time = |username: &str| {
            let start = Instant::now();
            for _ in 0..3 {
                assert!(matches!(
                    users.authenticate(username, "wrong-pass"),
                    Err(StoreError::AuthFailure)
                ));
            }
            start.elapsed()
        };
        let wrong_password = time("erin");
        let unknown_user = time("nobody");

        // Loose bound: a skipped Argon2 run is orders of magnitude faster
        assert!(
            unknown_user * 4 >= wrong_password,
            "unknown user took {:?}, wrong password {:?}",
            unknown_user,
            wrong_password
        );
    }

    #[test]
    fn password_is_never_stored_in_plaintext() {
        let (_dir, db) = open_temp();
        db.users().register("dave", "plain-text-pass", Role::Client).unwrap();

        let stored: String = db
            .with_conn(|conn| {
                Ok(conn.query_row(
                    "SELECT hashed_password FROM users WHERE username = 'dave'",
                    [],
                    |r| r.get(0),
                )?)
            })
            .unwrap();

        assert_ne!(stored, "plain-text-pass");
        assert!(stored.starts_with("$argon2id$"));
    }

    #[test]
    fn empty_username_is_invalid_input() {
        let (_dir, db) = open_temp();

        let err = db.users().register("   ", "pass", Role::Client).unwrap_err();
        assert!(matches!(err, StoreError::InvalidInput(_)));
        assert_eq!(user_count(&db), 0);
    }

    #[test]
    fn unknown_role_text_maps_to_invalid_role() {
        let err: StoreError = "Admin".parse::<Role>().unwrap_err().into();
        assert!(matches!(err, StoreError::InvalidRole(ref role) if role == "Admin"));
    }

    #[test]
    fn support_directory_lists_only_support_accounts() {
        let (_dir, db) = open_temp();
        let users = db.users();
        users.register("zoe", "pass-1", Role::Support).unwrap();
        users.register("client1", "pass-2", Role::Client).unwrap();
        users.register("adam", "pass-3", Role::Support).unwrap();

        assert_eq!(users.list_support_usernames().unwrap(), vec!["adam", "zoe"]);
    }
}
