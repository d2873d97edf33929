use sqlx::postgres::{PgArguments, PgRow};
use sqlx::{Arguments, Row};
use twolane_contracts::{Car, CarUpdate, NewCar};

use crate::update::{CAR_FIELDS, compile_known};
use crate::users::user_id;
use crate::{Store, StoreError, encode};

fn car_from_row(row: &PgRow) -> Result<Car, sqlx::Error> {
    Ok(Car {
        id: row.try_get("id")?,
        owner_id: row.try_get("owner_id")?,
        make: row.try_get("make")?,
        model: row.try_get("model")?,
        model_year: row.try_get("model_year")?,
    })
}

impl Store {
    pub async fn cars_for(&self, username: &str) -> Result<Vec<Car>, StoreError> {
        let rows = self
            .timed(async {
                let owner = user_id(&self.pool, username)
                    .await?
                    .ok_or(StoreError::NotFound("user"))?;
                let rows = sqlx::query(
                    "SELECT id, owner_id, make, model, model_year FROM cars WHERE owner_id = $1 ORDER BY id",
                )
                .bind(owner)
                .fetch_all(&self.pool)
                .await?;
                Ok::<_, StoreError>(rows)
            })
            .await?;

        Ok(rows
            .iter()
            .map(car_from_row)
            .collect::<Result<Vec<_>, _>>()?)
    }

    pub async fn car_for(&self, username: &str, car_id: i32) -> Result<Car, StoreError> {
        let row = self
            .timed(
                sqlx::query(
                    "SELECT c.id, c.owner_id, c.make, c.model, c.model_year \
                     FROM cars c JOIN users u ON u.id = c.owner_id \
                     WHERE u.username = $1 AND c.id = $2",
                )
                .bind(username)
                .bind(car_id)
                .fetch_optional(&self.pool),
            )
            .await?
            .ok_or(StoreError::NotFound("car"))?;

        Ok(car_from_row(&row)?)
    }

    pub async fn add_car(&self, username: &str, car: &NewCar) -> Result<Car, StoreError> {
        let row = self
            .timed(
                sqlx::query(
                    "INSERT INTO cars (owner_id, make, model, model_year) \
                     SELECT id, $2, $3, $4 FROM users WHERE username = $1 \
                     RETURNING id, owner_id, make, model, model_year",
                )
                .bind(username)
                .bind(&car.make)
                .bind(&car.model)
                .bind(car.model_year)
                .fetch_optional(&self.pool),
            )
            .await?
            .ok_or(StoreError::NotFound("user"))?;

        let car = car_from_row(&row)?;
        tracing::info!(username, car_id = car.id, "car added");
        Ok(car)
    }

    pub async fn update_car(
        &self,
        username: &str,
        car_id: i32,
        update: &CarUpdate,
    ) -> Result<Car, StoreError> {
        let compiled = compile_known(&update.to_update_request(), &CAR_FIELDS)?;
        let owner_param = compiled.next_param();
        let sql = format!(
            "UPDATE cars SET {} FROM users u \
             WHERE cars.owner_id = u.id AND u.username = ${} AND cars.id = ${} \
             RETURNING cars.id, cars.owner_id, cars.make, cars.model, cars.model_year",
            compiled.set_clause(),
            owner_param,
            owner_param + 1
        );

        let mut args = PgArguments::default();
        compiled.bind_values(&mut args)?;
        args.add(username).map_err(encode)?;
        args.add(car_id).map_err(encode)?;

        let row = self
            .timed(sqlx::query_with(&sql, args).fetch_optional(&self.pool))
            .await?
            .ok_or(StoreError::NotFound("car"))?;

        Ok(car_from_row(&row)?)
    }

    pub async fn remove_car(&self, username: &str, car_id: i32) -> Result<(), StoreError> {
        let result = self
            .timed(
                sqlx::query(
                    "DELETE FROM cars USING users u \
                     WHERE cars.owner_id = u.id AND u.username = $1 AND cars.id = $2",
                )
                .bind(username)
                .bind(car_id)
                .execute(&self.pool),
            )
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("car"));
        }
        tracing::info!(username, car_id, "car removed");
        Ok(())
    }
}
