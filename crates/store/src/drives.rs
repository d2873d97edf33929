use sqlx::postgres::{PgArguments, PgRow};
use sqlx::{Arguments, Postgres, QueryBuilder, Row};
use twolane_contracts::{Drive, DriveSearch, DriveUpdate, NewDrive};

use crate::update::{DRIVE_FIELDS, compile_known};
use crate::{Store, StoreError, encode, escape_like};

const DRIVE_COLUMNS: &str = "id, title, description, route_link, created_at";

pub(crate) fn drive_from_row(row: &PgRow) -> Result<Drive, sqlx::Error> {
    Ok(Drive {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        route_link: row.try_get("route_link")?,
        created_at: row.try_get("created_at")?,
    })
}

impl Store {
    pub async fn create_drive(&self, drive: &NewDrive) -> Result<Drive, StoreError> {
        let row = self
            .timed(
                sqlx::query(&format!(
                    "INSERT INTO drives (title, description, route_link) VALUES ($1, $2, $3) RETURNING {DRIVE_COLUMNS}"
                ))
                .bind(&drive.title)
                .bind(&drive.description)
                .bind(&drive.route_link)
                .fetch_one(&self.pool),
            )
            .await?;

        let drive = drive_from_row(&row)?;
        tracing::info!(drive_id = drive.id, "drive created");
        Ok(drive)
    }

    pub async fn search_drives(&self, search: &DriveSearch) -> Result<Vec<Drive>, StoreError> {
        let mut qb: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {DRIVE_COLUMNS} FROM drives WHERE TRUE"));

        if let Some(title) = search.title_filter() {
            qb.push(" AND title ILIKE ")
                .push_bind(format!("%{}%", escape_like(title)));
        }
        if let Some(day) = search.created_on {
            qb.push(" AND (created_at AT TIME ZONE 'UTC')::date = ")
                .push_bind(day);
        }
        qb.push(" ORDER BY created_at, id");

        let rows = self
            .timed(qb.build().fetch_all(&self.pool))
            .await?;

        Ok(rows
            .iter()
            .map(drive_from_row)
            .collect::<Result<Vec<_>, _>>()?)
    }

    pub async fn get_drive(&self, title: &str) -> Result<Drive, StoreError> {
        let row = self
            .timed(
                sqlx::query(&format!("SELECT {DRIVE_COLUMNS} FROM drives WHERE title = $1"))
                    .bind(title)
                    .fetch_optional(&self.pool),
            )
            .await?
            .ok_or(StoreError::NotFound("drive"))?;

        Ok(drive_from_row(&row)?)
    }

    pub async fn update_drive(
        &self,
        title: &str,
        update: &DriveUpdate,
    ) -> Result<Drive, StoreError> {
        let compiled = compile_known(&update.to_update_request(), &DRIVE_FIELDS)?;
        let sql = format!(
            "UPDATE drives SET {} WHERE title = ${} RETURNING {DRIVE_COLUMNS}",
            compiled.set_clause(),
            compiled.next_param()
        );

        let mut args = PgArguments::default();
        compiled.bind_values(&mut args)?;
        args.add(title).map_err(encode)?;

        let row = self
            .timed(sqlx::query_with(&sql, args).fetch_optional(&self.pool))
            .await?
            .ok_or(StoreError::NotFound("drive"))?;

        Ok(drive_from_row(&row)?)
    }

    pub async fn remove_drive(&self, title: &str) -> Result<(), StoreError> {
        let result = self
            .timed(
                sqlx::query("DELETE FROM drives WHERE title = $1")
                    .bind(title)
                    .execute(&self.pool),
            )
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("drive"));
        }
        tracing::info!(title, "drive removed");
        Ok(())
    }
}
