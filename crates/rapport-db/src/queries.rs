use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, Row, TransactionBehavior, params};
use tracing::debug;
use uuid::Uuid;

use rapport_core::ports::{Change, Persistence, UserAccount};
use rapport_core::search::UserQuery;
use rapport_types::models::{Photo, Role, User};

use crate::Database;
use crate::models::{PhotoRow, UserRow, format_date, format_time};

// Main photo url is resolved by join so listing users is a single query.
const USER_SELECT: &str = "
    SELECT u.id, u.username, u.password_hash, u.password_salt, u.gender, u.date_of_birth,
           u.known_as, u.created_at, u.last_active, u.introduction, u.looking_for,
           u.interests, u.city, u.country, p.url
    FROM users u
    LEFT JOIN photos p ON p.user_id = u.id AND p.is_main = 1";

const PHOTO_SELECT: &str = "
    SELECT id, user_id, url, description, date_added, is_main, public_id, is_approved
    FROM photos";

impl Persistence for Database {
    fn find_user_by_username(&self, username: &str) -> Result<Option<UserAccount>> {
        let username = username.to_lowercase();
        let row = self.with_conn(|conn| {
            let sql = format!("{} WHERE u.username = ?1", USER_SELECT);
            Ok(conn.query_row(&sql, [&username], user_row).optional()?)
        })?;

        row.map(|row| {
            let credential = row.credential();
            Ok(UserAccount {
                user: row.into_user()?,
                credential,
            })
        })
        .transpose()
    }

    fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>> {
        let row = self.with_conn(|conn| {
            let sql = format!("{} WHERE u.id = ?1", USER_SELECT);
            Ok(conn.query_row(&sql, [id.to_string()], user_row).optional()?)
        })?;
        row.map(UserRow::into_user).transpose()
    }

    fn roles_for_user(&self, id: Uuid) -> Result<Vec<Role>> {
        let names = self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT role_name FROM user_roles WHERE user_id = ?1")?;
            let names = stmt
                .query_map([id.to_string()], |row| row.get::<_, String>(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(names)
        })?;

        let mut roles = names
            .iter()
            .map(|name| name.parse::<Role>().map_err(anyhow::Error::msg))
            .collect::<Result<Vec<_>>>()?;
        roles.sort();
        Ok(roles)
    }

    fn find_photo(&self, id: Uuid) -> Result<Option<Photo>> {
        let row = self.with_conn(|conn| {
            let sql = format!("{} WHERE id = ?1", PHOTO_SELECT);
            Ok(conn.query_row(&sql, [id.to_string()], photo_row).optional()?)
        })?;
        row.map(PhotoRow::into_photo).transpose()
    }

    fn photos_for_user(&self, user_id: Uuid) -> Result<Vec<Photo>> {
        let sql = format!("{} WHERE user_id = ?1 ORDER BY date_added, id", PHOTO_SELECT);
        self.query_photos(&sql, &user_id.to_string())
    }

    fn photos_awaiting_approval(&self) -> Result<Vec<Photo>> {
        let rows = self.with_conn(|conn| {
            let sql = format!("{} WHERE is_approved = 0 ORDER BY date_added, id", PHOTO_SELECT);
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], photo_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })?;
        rows.into_iter().map(PhotoRow::into_photo).collect()
    }

    fn like_exists(&self, liker_id: Uuid, likee_id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            Ok(conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM likes WHERE liker_id = ?1 AND likee_id = ?2)",
                params![liker_id.to_string(), likee_id.to_string()],
                |row| row.get(0),
            )?)
        })
    }

    fn list_users(&self, query: &UserQuery) -> Result<Vec<User>> {
        let rows = self.with_conn(|conn| {
            let sql = format!("{} WHERE u.id <> ?1 AND u.gender = ?2", USER_SELECT);
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(
                    params![
                        query.requester_id.to_string(),
                        query.target_gender().as_str()
                    ],
                    user_row,
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })?;
        rows.into_iter().map(UserRow::into_user).collect()
    }

    fn apply(&self, changes: &[Change]) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            for change in changes {
                if !apply_change(&tx, change)? {
                    debug!("Precondition failed, rolling back: {:?}", change);
                    // Dropping `tx` rolls back.
                    return Ok(false);
                }
            }
            tx.commit()?;
            Ok(true)
        })
    }
}

impl Database {
    fn query_photos(&self, sql: &str, param: &str) -> Result<Vec<Photo>> {
        let rows = self.with_conn(|conn| {
            let mut stmt = conn.prepare(sql)?;
            let rows = stmt
                .query_map([param], photo_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })?;
        rows.into_iter().map(PhotoRow::into_photo).collect()
    }
}

fn user_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        password_hash: row.get(2)?,
        password_salt: row.get(3)?,
        gender: row.get(4)?,
        date_of_birth: row.get(5)?,
        known_as: row.get(6)?,
        created_at: row.get(7)?,
        last_active: row.get(8)?,
        introduction: row.get(9)?,
        looking_for: row.get(10)?,
        interests: row.get(11)?,
        city: row.get(12)?,
        country: row.get(13)?,
        photo_url: row.get(14)?,
    })
}

fn photo_row(row: &Row<'_>) -> rusqlite::Result<PhotoRow> {
    Ok(PhotoRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        url: row.get(2)?,
        description: row.get(3)?,
        date_added: row.get(4)?,
        is_main: row.get(5)?,
        public_id: row.get(6)?,
        is_approved: row.get(7)?,
    })
}

fn exists(conn: &Connection, sql: &str, param: &str) -> Result<bool> {
    Ok(conn.query_row(sql, [param], |row| row.get(0))?)
}

fn user_exists(conn: &Connection, user_id: &str) -> Result<bool> {
    exists(conn, "SELECT EXISTS(SELECT 1 FROM users WHERE id = ?1)", user_id)
}

fn has_main_photo(conn: &Connection, user_id: &str) -> Result<bool> {
    exists(
        conn,
        "SELECT EXISTS(SELECT 1 FROM photos WHERE user_id = ?1 AND is_main = 1)",
        user_id,
    )
}

fn insert_roles(conn: &Connection, user_id: &str, roles: &[Role]) -> Result<()> {
    for role in roles {
        conn.execute(
            "INSERT OR IGNORE INTO user_roles (user_id, role_name) VALUES (?1, ?2)",
            params![user_id, role.as_str()],
        )?;
    }
    Ok(())
}

/// Checks the change's precondition and performs it. `Ok(false)` when the
/// precondition does not hold.
fn apply_change(conn: &Connection, change: &Change) -> Result<bool> {
    match change {
        Change::InsertUser {
            user,
            credential,
            roles,
        } => {
            if exists(
                conn,
                "SELECT EXISTS(SELECT 1 FROM users WHERE username = ?1)",
                &credential.username,
            )? {
                return Ok(false);
            }
            let id = user.id.to_string();
            conn.execute(
                "INSERT INTO users (id, username, password_hash, password_salt, gender,
                    date_of_birth, known_as, created_at, last_active, introduction,
                    looking_for, interests, city, country)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
                params![
                    id,
                    credential.username,
                    credential.password_hash,
                    credential.password_salt,
                    user.gender.as_str(),
                    format_date(&user.date_of_birth),
                    user.known_as,
                    format_time(&user.created_at),
                    format_time(&user.last_active),
                    user.introduction,
                    user.looking_for,
                    user.interests,
                    user.city,
                    user.country,
                ],
            )?;
            insert_roles(conn, &id, roles)?;
            Ok(true)
        }
        Change::UpdateProfile { user_id, profile } => {
            let n = conn.execute(
                "UPDATE users SET introduction = ?1, looking_for = ?2, interests = ?3,
                    city = ?4, country = ?5
                 WHERE id = ?6",
                params![
                    profile.introduction,
                    profile.looking_for,
                    profile.interests,
                    profile.city,
                    profile.country,
                    user_id.to_string(),
                ],
            )?;
            Ok(n == 1)
        }
        Change::TouchLastActive { user_id, at } => {
            let n = conn.execute(
                "UPDATE users SET last_active = ?1 WHERE id = ?2",
                params![format_time(at), user_id.to_string()],
            )?;
            Ok(n == 1)
        }
        Change::ReplaceRoles { user_id, roles } => {
            let id = user_id.to_string();
            if !user_exists(conn, &id)? {
                return Ok(false);
            }
            conn.execute("DELETE FROM user_roles WHERE user_id = ?1", [&id])?;
            insert_roles(conn, &id, roles)?;
            Ok(true)
        }
        Change::InsertPhoto(photo) => {
            let owner = photo.user_id.to_string();
            if !user_exists(conn, &owner)? {
                return Ok(false);
            }
            if photo.is_main && has_main_photo(conn, &owner)? {
                return Ok(false);
            }
            conn.execute(
                "INSERT INTO photos (id, user_id, url, description, date_added, is_main,
                    public_id, is_approved)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    photo.id.to_string(),
                    owner,
                    photo.url,
                    photo.description,
                    format_time(&photo.date_added),
                    photo.is_main,
                    photo.public_id,
                    photo.is_approved,
                ],
            )?;
            Ok(true)
        }
        Change::SwapMainPhoto { user_id, from, to } => {
            let owner = user_id.to_string();
            // Demote first: the partial unique index allows one main per user.
            match from {
                Some(from) => {
                    let n = conn.execute(
                        "UPDATE photos SET is_main = 0
                         WHERE id = ?1 AND user_id = ?2 AND is_main = 1",
                        params![from.to_string(), owner],
                    )?;
                    if n != 1 {
                        return Ok(false);
                    }
                }
                None => {
                    if has_main_photo(conn, &owner)? {
                        return Ok(false);
                    }
                }
            }
            let n = conn.execute(
                "UPDATE photos SET is_main = 1
                 WHERE id = ?1 AND user_id = ?2 AND is_main = 0",
                params![to.to_string(), owner],
            )?;
            Ok(n == 1)
        }
        Change::DeletePhoto { user_id, photo_id } => {
            let n = conn.execute(
                "DELETE FROM photos WHERE id = ?1 AND user_id = ?2 AND is_main = 0",
                params![photo_id.to_string(), user_id.to_string()],
            )?;
            Ok(n == 1)
        }
        Change::ApprovePhoto { photo_id } => {
            let n = conn.execute(
                "UPDATE photos SET is_approved = 1 WHERE id = ?1",
                [photo_id.to_string()],
            )?;
            Ok(n == 1)
        }
        Change::InsertLike(like) => {
            let n = conn.execute(
                "INSERT OR IGNORE INTO likes (liker_id, likee_id, created_at)
                 VALUES (?1, ?2, ?3)",
                params![
                    like.liker_id.to_string(),
                    like.likee_id.to_string(),
                    format_time(&like.created_at),
                ],
            )?;
            Ok(n == 1)
        }
    }
}
