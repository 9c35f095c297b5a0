use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};

/// Daily cap on AI question-generation calls per user.
pub const DAILY_GENERATION_LIMIT: i32 = 20;
pub const GENERATION_ACTION: &str = "ai_generation";

/// Fixed daily window: the counter resets when the stored window started
/// before the current UTC day. Not a sliding window.
pub fn window_expired(window_start: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    window_start.date_naive() < now.date_naive()
}

/// Checks the `(user_id, action)` counter against `limit` and consumes one
/// unit if allowed. Returns `false` when the caller is over the limit.
pub async fn check_and_consume(
    pool: &PgPool,
    user_id: i32,
    action: &str,
    limit: i32,
) -> Result<bool, sqlx::Error> {
    sqlx::query(
        r#"INSERT INTO rate_limits (user_id, action, count, window_start)
           VALUES ($1, $2, 0, NOW())
           ON CONFLICT (user_id, action) DO NOTHING"#,
    )
    .bind(user_id)
    .bind(action)
    .execute(pool)
    .await?;

    let row = sqlx::query(
        r#"SELECT count, window_start FROM rate_limits
           WHERE user_id = $1 AND action = $2"#,
    )
    .bind(user_id)
    .bind(action)
    .fetch_one(pool)
    .await?;

    let count: i32 = row.get("count");
    let window_start: DateTime<Utc> = row.get("window_start");

    if window_expired(window_start, Utc::now()) {
        sqlx::query(
            r#"UPDATE rate_limits
               SET count = 1, window_start = NOW()
               WHERE user_id = $1 AND action = $2"#,
        )
        .bind(user_id)
        .bind(action)
        .execute(pool)
        .await?;
        return Ok(true);
    }

    if count >= limit {
        return Ok(false);
    }

    sqlx::query(
        r#"UPDATE rate_limits
           SET count = count + 1
           WHERE user_id = $1 AND action = $2"#,
    )
    .bind(user_id)
    .bind(action)
    .execute(pool)
    .await?;

    Ok(true)
}
