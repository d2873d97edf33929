fn test_db_url() -> Option<String> {
    std::env::var("TWOLANE_TEST_DB_URL")
        .ok()
        .or_else(|| std::env::var("DATABASE_URL").ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn migrations_apply_and_enforce_relations() {
    let Some(db_url) = test_db_url() else {
        eprintln!("skipping DB migration test; set TWOLANE_TEST_DB_URL to enable");
        return;
    };

    let schema = format!("twolane_test_{}", ulid::Ulid::new()).to_lowercase();

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(1)
        .connect(&db_url)
        .await
        .expect("DB connect should succeed");

    sqlx::query(&format!("CREATE SCHEMA {}", schema))
        .execute(&pool)
        .await
        .expect("create schema should succeed");
    sqlx::query(&format!("SET search_path TO {}", schema))
        .execute(&pool)
        .await
        .expect("set search_path should succeed");

    twolane_store::migrate(&pool)
        .await
        .expect("migrations should apply");
    twolane_store::migrate(&pool)
        .await
        .expect("migrations should be idempotent");

    let user_id: i32 = sqlx::query_scalar(
        "INSERT INTO users (username, hashed_pw) VALUES ('u1', 'x') RETURNING id",
    )
    .fetch_one(&pool)
    .await
    .expect("insert user should succeed");

    let dup = sqlx::query("INSERT INTO users (username, hashed_pw) VALUES ('u1', 'y')")
        .execute(&pool)
        .await
        .expect_err("duplicate username must be rejected");
    let dup = twolane_store::StoreError::from(dup);
    assert!(
        matches!(dup, twolane_store::StoreError::Conflict("username already taken")),
        "unexpected error: {dup:?}"
    );

    let drive_id: i32 = sqlx::query_scalar(
        "INSERT INTO drives (title, route_link) VALUES ('commute', 'https://maps.example/r1') RETURNING id",
    )
    .fetch_one(&pool)
    .await
    .expect("insert drive should succeed");

    sqlx::query("INSERT INTO cars (owner_id, make, model) VALUES ($1, 'Saab', '900')")
        .bind(user_id)
        .execute(&pool)
        .await
        .expect("insert car should succeed");
    sqlx::query("INSERT INTO users_drives (user_id, drive_id) VALUES ($1, $2)")
        .bind(user_id)
        .bind(drive_id)
        .execute(&pool)
        .await
        .expect("join drive should succeed");
    sqlx::query("INSERT INTO posts (user_id, title, body) VALUES ($1, 't', 'b')")
        .bind(user_id)
        .execute(&pool)
        .await
        .expect("insert post should succeed");

    sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(user_id)
        .execute(&pool)
        .await
        .expect("delete user should succeed");

    let cars: i64 = sqlx::query_scalar("SELECT count(*) FROM cars")
        .fetch_one(&pool)
        .await
        .expect("count cars");
    let joined: i64 = sqlx::query_scalar("SELECT count(*) FROM users_drives")
        .fetch_one(&pool)
        .await
        .expect("count memberships");
    let orphan_posts: i64 =
        sqlx::query_scalar("SELECT count(*) FROM posts WHERE user_id IS NULL")
            .fetch_one(&pool)
            .await
            .expect("count posts");

    assert_eq!(cars, 0, "cars cascade with their owner");
    assert_eq!(joined, 0, "memberships cascade with the user");
    assert_eq!(orphan_posts, 1, "posts outlive their author");

    let _ = sqlx::query(&format!("DROP SCHEMA {} CASCADE", schema))
        .execute(&pool)
        .await;

    pool.close().await;
}
