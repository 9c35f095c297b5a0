use sqlx::PgPool;
use std::env;
use std::sync::OnceLock;
use tokio::sync::{Mutex, MutexGuard};

use ifumsa_backend::AppState;

fn split_db_url(url: &str) -> Result<(String, String), String> {
    let (base, query) = match url.split_once('?') {
        Some((base, query)) => (base.to_string(), Some(query)),
        None => (url.to_string(), None),
    };

    let db_start = base
        .rfind('/')
        .ok_or_else(|| "invalid database url".to_string())?;
    if db_start + 1 >= base.len() {
        return Err("database name is empty".to_string());
    }

    let db_name = base[db_start + 1..].to_string();
    let mut admin_url = format!("{}postgres", &base[..db_start + 1]);
    if let Some(query) = query {
        admin_url = format!("{admin_url}?{query}");
    }

    Ok((admin_url, db_name))
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

static TEST_DB_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

pub struct TestDb {
    pub pool: PgPool,
    _guard: MutexGuard<'static, ()>,
}

pub async fn init_test_db() -> TestDb {
    dotenvy::dotenv().ok();
    let test_url = env::var("TEST_DATABASE_URL").expect("TEST_DATABASE_URL must be set");
    let (admin_url, db_name) = split_db_url(&test_url).expect("invalid TEST_DATABASE_URL format");

    let lock = TEST_DB_LOCK.get_or_init(|| Mutex::new(()));
    let guard = lock.lock().await;

    let admin_pool = PgPool::connect(&admin_url).await.expect("connect admin db");

    let _ = sqlx::query("SELECT pg_advisory_lock(424242)")
        .execute(&admin_pool)
        .await;

    let quoted_name = quote_identifier(&db_name);
    let drop_sql = format!("DROP DATABASE IF EXISTS {quoted_name} WITH (FORCE)");
    let create_sql = format!("CREATE DATABASE {quoted_name}");

    let _ = sqlx::query(&drop_sql).execute(&admin_pool).await;
    let create_result = sqlx::query(&create_sql).execute(&admin_pool).await;
    if let Err(e) = create_result {
        eprintln!("create test db error: {e}");
        let _ = sqlx::query(&drop_sql).execute(&admin_pool).await;
        sqlx::query(&create_sql)
            .execute(&admin_pool)
            .await
            .expect("create test db retry");
    }

    let _ = sqlx::query("SELECT pg_advisory_unlock(424242)")
        .execute(&admin_pool)
        .await;

    admin_pool.close().await;

    let pool = PgPool::connect(&test_url).await.expect("connect test db");
    sqlx::migrate!().run(&pool).await.expect("migrations");
    TestDb { pool, _guard: guard }
}

pub fn build_state(pool: PgPool) -> AppState {
    // Point outbound mail at a dead endpoint so best-effort sends fail fast.
    if env::var("MAIL_API_BASE_URL").is_err() {
        env::set_var("MAIL_API_BASE_URL", "http://127.0.0.1:1");
    }

    AppState {
        pool,
        admin_emails: vec!["admin@ifumsa.org".to_string()],
        mail_api_key: "test-mail".to_string(),
        mail_from: "IFUMSA <noreply@ifumsa.org>".to_string(),
        ai_api_key: "test-ai".to_string(),
        jwt_secret: "test-secret".to_string(),
    }
}

/// Seeds a user and returns its id.
pub async fn insert_user(pool: &PgPool, username: &str, email: &str) -> i32 {
    use sqlx::Row;
    sqlx::query(
        r#"INSERT INTO users (username, email, password_hash)
           VALUES ($1, $2, $3)
           RETURNING id"#,
    )
    .bind(username)
    .bind(email)
    .bind("test-hash")
    .fetch_one(pool)
    .await
    .expect("insert user")
    .get("id")
}

/// Seeds a product and returns its id.
pub async fn insert_product(pool: &PgPool, title: &str, price: &str) -> i32 {
    use sqlx::Row;
    sqlx::query(
        r#"INSERT INTO products (title, price, category)
           VALUES ($1, $2::numeric, 'books')
           RETURNING id"#,
    )
    .bind(title)
    .bind(price)
    .fetch_one(pool)
    .await
    .expect("insert product")
    .get("id")
}
