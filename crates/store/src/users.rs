use sqlx::postgres::{PgArguments, PgRow};
use sqlx::{Arguments, PgExecutor, Row};
use twolane_auth::password;
use twolane_contracts::{
    NewUser, Patch, User, UserCars, UserDetail, UserDrives, UserPosts, UserUpdate,
};

use crate::update::{USER_FIELDS, compile_known};
use crate::{Store, StoreError, encode};

const USER_COLUMNS: &str = "username, email, is_admin, created_at";

pub(crate) fn user_from_row(row: &PgRow) -> Result<User, sqlx::Error> {
    Ok(User {
        username: row.try_get("username")?,
        email: row.try_get("email")?,
        is_admin: row.try_get("is_admin")?,
        created_at: row.try_get("created_at")?,
    })
}

pub(crate) async fn user_id<'e, E>(exec: E, username: &str) -> Result<Option<i32>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query_scalar("SELECT id FROM users WHERE username = $1")
        .bind(username)
        .fetch_optional(exec)
        .await
}

impl Store {
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<User, StoreError> {
        let row = self
            .timed(
                sqlx::query(&format!(
                    "SELECT {USER_COLUMNS}, hashed_pw FROM users WHERE username = $1"
                ))
                .bind(username)
                .fetch_optional(&self.pool),
            )
            .await?;

        let hashed_pw = row
            .as_ref()
            .map(|r| r.try_get::<String, _>("hashed_pw"))
            .transpose()?;

        if !password::verify(password.to_string(), hashed_pw).await {
            return Err(StoreError::InvalidCredentials);
        }

        match row {
            Some(row) => Ok(user_from_row(&row)?),
            None => Err(StoreError::InvalidCredentials),
        }
    }

    pub async fn register(&self, new_user: &NewUser) -> Result<User, StoreError> {
        let hashed_pw = password::hash(new_user.password.clone()).await?;

        let row = self
            .timed(
                sqlx::query(&format!(
                    "INSERT INTO users (username, hashed_pw, email, is_admin) VALUES ($1, $2, $3, $4) RETURNING {USER_COLUMNS}"
                ))
                .bind(&new_user.username)
                .bind(&hashed_pw)
                .bind(&new_user.email)
                .bind(new_user.is_admin)
                .fetch_one(&self.pool),
            )
            .await?;

        tracing::info!(username = %new_user.username, is_admin = new_user.is_admin, "user registered");
        Ok(user_from_row(&row)?)
    }

    pub async fn find_all_users(&self) -> Result<Vec<User>, StoreError> {
        let rows = self
            .timed(
                sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY username"))
                    .fetch_all(&self.pool),
            )
            .await?;

        Ok(rows
            .iter()
            .map(user_from_row)
            .collect::<Result<Vec<_>, _>>()?)
    }

    pub async fn get_user(&self, username: &str) -> Result<UserDetail, StoreError> {
        let row = self
            .timed(
                sqlx::query(
                    "SELECT u.username, u.email, u.is_admin, u.created_at, \
                     COALESCE((SELECT array_agg(c.id ORDER BY c.id) FROM cars c WHERE c.owner_id = u.id), '{}') AS cars, \
                     COALESCE((SELECT array_agg(ud.drive_id ORDER BY ud.drive_id) FROM users_drives ud WHERE ud.user_id = u.id), '{}') AS drives \
                     FROM users u WHERE u.username = $1",
                )
                .bind(username)
                .fetch_optional(&self.pool),
            )
            .await?
            .ok_or(StoreError::NotFound("user"))?;

        Ok(UserDetail {
            user: user_from_row(&row)?,
            cars: row.try_get("cars")?,
            drives: row.try_get("drives")?,
        })
    }

    pub async fn update_user(
        &self,
        username: &str,
        update: &UserUpdate,
    ) -> Result<User, StoreError> {
        let mut request = update.to_update_request();
        if let Patch::Value(plain) = &update.password {
            request.insert("password", password::hash(plain.clone()).await?);
        }

        let compiled = compile_known(&request, &USER_FIELDS)?;
        let sql = format!(
            "UPDATE users SET {} WHERE username = ${} RETURNING {USER_COLUMNS}",
            compiled.set_clause(),
            compiled.next_param()
        );

        let mut args = PgArguments::default();
        compiled.bind_values(&mut args)?;
        args.add(username).map_err(encode)?;

        let row = self
            .timed(sqlx::query_with(&sql, args).fetch_optional(&self.pool))
            .await?
            .ok_or(StoreError::NotFound("user"))?;

        tracing::info!(username, fields = compiled.assignments.len(), "user updated");
        Ok(user_from_row(&row)?)
    }

    pub async fn remove_user(&self, username: &str) -> Result<(), StoreError> {
        let result = self
            .timed(
                sqlx::query("DELETE FROM users WHERE username = $1")
                    .bind(username)
                    .execute(&self.pool),
            )
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("user"));
        }
        tracing::info!(username, "user removed");
        Ok(())
    }

    pub async fn user_cars(&self, username: &str) -> Result<UserCars, StoreError> {
        Ok(UserCars {
            username: username.to_string(),
            cars: self.cars_for(username).await?,
        })
    }

    pub async fn user_drives(&self, username: &str) -> Result<UserDrives, StoreError> {
        let drives = self
            .timed(async {
                let id = user_id(&self.pool, username)
                    .await?
                    .ok_or(StoreError::NotFound("user"))?;
                let rows = sqlx::query(
                    "SELECT d.id, d.title, d.description, d.route_link, d.created_at \
                     FROM drives d JOIN users_drives ud ON ud.drive_id = d.id \
                     WHERE ud.user_id = $1 ORDER BY d.created_at, d.id",
                )
                .bind(id)
                .fetch_all(&self.pool)
                .await?;
                Ok::<_, StoreError>(rows)
            })
            .await?;

        Ok(UserDrives {
            username: username.to_string(),
            drives: drives
                .iter()
                .map(crate::drives::drive_from_row)
                .collect::<Result<Vec<_>, _>>()?,
        })
    }

    pub async fn user_posts(&self, username: &str) -> Result<UserPosts, StoreError> {
        let rows = self
            .timed(async {
                let id = user_id(&self.pool, username)
                    .await?
                    .ok_or(StoreError::NotFound("user"))?;
                let rows = sqlx::query(
                    "SELECT id, title, body, user_id, created_at FROM posts \
                     WHERE user_id = $1 ORDER BY created_at DESC, id DESC",
                )
                .bind(id)
                .fetch_all(&self.pool)
                .await?;
                Ok::<_, StoreError>(rows)
            })
            .await?;

        let posts = rows
            .iter()
            .map(|row| crate::posts::post_from_row(row, Some(username.to_string())))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(UserPosts {
            username: username.to_string(),
            posts,
        })
    }

    pub async fn join_drive(&self, username: &str, drive_id: i32) -> Result<(), StoreError> {
        self.timed(async {
            let mut tx = self.pool.begin().await?;

            let user = user_id(&mut *tx, username)
                .await?
                .ok_or(StoreError::NotFound("user"))?;
            let drive: Option<i32> = sqlx::query_scalar("SELECT id FROM drives WHERE id = $1")
                .bind(drive_id)
                .fetch_optional(&mut *tx)
                .await?;
            if drive.is_none() {
                return Err(StoreError::NotFound("drive"));
            }

            sqlx::query("INSERT INTO users_drives (user_id, drive_id) VALUES ($1, $2)")
                .bind(user)
                .bind(drive_id)
                .execute(&mut *tx)
                .await?;

            tx.commit().await?;
            Ok::<(), StoreError>(())
        })
        .await?;

        tracing::info!(username, drive_id, "drive joined");
        Ok(())
    }

    pub async fn leave_drive(&self, username: &str, drive_id: i32) -> Result<(), StoreError> {
        let result = self
            .timed(
                sqlx::query(
                    "DELETE FROM users_drives ud USING users u \
                     WHERE ud.user_id = u.id AND u.username = $1 AND ud.drive_id = $2",
                )
                .bind(username)
                .bind(drive_id)
                .execute(&self.pool),
            )
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("drive membership"));
        }
        tracing::info!(username, drive_id, "drive left");
        Ok(())
    }
}
