use sqlx::postgres::{PgArguments, PgRow};
use sqlx::{Arguments, Row};
use twolane_contracts::{MutationScope, NewPost, Post, PostUpdate};

use crate::update::{POST_FIELDS, compile_known};
use crate::{Store, StoreError, encode};

const POST_SELECT: &str = "SELECT p.id, p.title, p.body, p.user_id, u.username, p.created_at \
                           FROM posts p LEFT JOIN users u ON u.id = p.user_id";

pub(crate) fn post_from_row(row: &PgRow, username: Option<String>) -> Result<Post, sqlx::Error> {
    Ok(Post {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        body: row.try_get("body")?,
        user_id: row.try_get("user_id")?,
        username,
        created_at: row.try_get("created_at")?,
    })
}

fn joined_post_from_row(row: &PgRow) -> Result<Post, sqlx::Error> {
    post_from_row(row, row.try_get("username")?)
}

impl Store {
    pub async fn all_posts(&self) -> Result<Vec<Post>, StoreError> {
        let rows = self
            .timed(
                sqlx::query(&format!("{POST_SELECT} ORDER BY p.created_at DESC, p.id DESC"))
                    .fetch_all(&self.pool),
            )
            .await?;

        Ok(rows
            .iter()
            .map(joined_post_from_row)
            .collect::<Result<Vec<_>, _>>()?)
    }

    pub async fn get_post(&self, id: i32) -> Result<Post, StoreError> {
        let row = self
            .timed(
                sqlx::query(&format!("{POST_SELECT} WHERE p.id = $1"))
                    .bind(id)
                    .fetch_optional(&self.pool),
            )
            .await?
            .ok_or(StoreError::NotFound("post"))?;

        Ok(joined_post_from_row(&row)?)
    }

    pub async fn create_post(&self, username: &str, post: &NewPost) -> Result<Post, StoreError> {
        let row = self
            .timed(
                sqlx::query(
                    "INSERT INTO posts (user_id, title, body) \
                     SELECT id, $2, $3 FROM users WHERE username = $1 \
                     RETURNING id, title, body, user_id, created_at",
                )
                .bind(username)
                .bind(&post.title)
                .bind(&post.body)
                .fetch_optional(&self.pool),
            )
            .await?
            .ok_or(StoreError::NotFound("user"))?;

        let post = post_from_row(&row, Some(username.to_string()))?;
        tracing::info!(username, post_id = post.id, "post created");
        Ok(post)
    }

    pub async fn update_post(
        &self,
        id: i32,
        update: &PostUpdate,
        scope: &MutationScope,
    ) -> Result<Post, StoreError> {
        let compiled = compile_known(&update.to_update_request(), &POST_FIELDS)?;
        let id_param = compiled.next_param();

        let mut args = PgArguments::default();
        compiled.bind_values(&mut args)?;
        args.add(id).map_err(encode)?;

        let scope_clause = match scope {
            MutationScope::Any => String::new(),
            MutationScope::AuthoredBy(author) => {
                args.add(author.as_str()).map_err(encode)?;
                format!(
                    " AND user_id = (SELECT id FROM users WHERE username = ${})",
                    id_param + 1
                )
            }
        };

        let sql = format!(
            "WITH updated AS (UPDATE posts SET {} WHERE id = ${}{} RETURNING *) \
             SELECT p.id, p.title, p.body, p.user_id, u.username, p.created_at \
             FROM updated p LEFT JOIN users u ON u.id = p.user_id",
            compiled.set_clause(),
            id_param,
            scope_clause
        );

        let row = self
            .timed(sqlx::query_with(&sql, args).fetch_optional(&self.pool))
            .await?
            .ok_or(StoreError::NotFound("post"))?;

        Ok(joined_post_from_row(&row)?)
    }

    pub async fn remove_post(&self, id: i32, scope: &MutationScope) -> Result<(), StoreError> {
        let query = match scope {
            MutationScope::Any => sqlx::query("DELETE FROM posts WHERE id = $1").bind(id),
            MutationScope::AuthoredBy(author) => sqlx::query(
                "DELETE FROM posts WHERE id = $1 \
                 AND user_id = (SELECT id FROM users WHERE username = $2)",
            )
            .bind(id)
            .bind(author.as_str()),
        };

        let result = self.timed(query.execute(&self.pool)).await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("post"));
        }
        tracing::info!(post_id = id, "post removed");
        Ok(())
    }
}
