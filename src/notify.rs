// Notification dispatcher: the in-app record is the primary write, email
// delivery is best-effort and never fails the caller.

use sqlx::Row;

use crate::{mailer, AppState};

pub const TYPE_EVENT: &str = "event";
pub const TYPE_PAYMENT: &str = "payment";
pub const TYPE_PAYMENT_APPROVAL: &str = "payment_approval";
pub const TYPE_REMINDER: &str = "reminder";

/// Persists an in-app notification and, when `email_html` is given, tries to
/// email the recipient. The email failing only produces a log line.
pub async fn dispatch(
    state: &AppState,
    recipient_id: i32,
    kind: &str,
    title: &str,
    message: &str,
    metadata: serde_json::Value,
    email_html: Option<&str>,
) -> Result<i32, sqlx::Error> {
    let row = sqlx::query(
        r#"INSERT INTO notifications (recipient_id, type, title, message, metadata)
           VALUES ($1, $2, $3, $4, $5)
           RETURNING id"#,
    )
    .bind(recipient_id)
    .bind(kind)
    .bind(title)
    .bind(message)
    .bind(metadata)
    .fetch_one(&state.pool)
    .await?;

    let notification_id: i32 = row.get("id");

    if let Some(html) = email_html {
        let email = sqlx::query("SELECT email FROM users WHERE id = $1")
            .bind(recipient_id)
            .fetch_optional(&state.pool)
            .await
            .ok()
            .flatten()
            .map(|r| r.get::<String, _>("email"));

        if let Some(email) = email {
            if let Err(e) =
                mailer::send_email(&state.mail_api_key, &state.mail_from, &email, title, html)
                    .await
            {
                log::warn!(
                    "notification email failed recipient_id={} err={}",
                    recipient_id,
                    e
                );
            }
        }
    }

    Ok(notification_id)
}

/// In-app fan-out to every registered user. Used for event announcements;
/// no email leg, and each recipient failure is logged and skipped.
pub async fn notify_all_users(
    state: &AppState,
    kind: &str,
    title: &str,
    message: &str,
    metadata: serde_json::Value,
) {
    let rows = match sqlx::query("SELECT id FROM users")
        .fetch_all(&state.pool)
        .await
    {
        Ok(rows) => rows,
        Err(e) => {
            log::error!("user fan-out lookup failed: {e}");
            return;
        }
    };

    for row in rows {
        let recipient_id: i32 = row.get("id");
        if let Err(e) = dispatch(
            state,
            recipient_id,
            kind,
            title,
            message,
            metadata.clone(),
            None,
        )
        .await
        {
            log::error!("user fan-out failed recipient_id={} err={}", recipient_id, e);
        }
    }
}

/// Fans one notification out to every user whose email is on the admin list.
/// Each recipient is independent: one failure is logged and the loop goes on.
pub async fn notify_admins(
    state: &AppState,
    kind: &str,
    title: &str,
    message: &str,
    metadata: serde_json::Value,
) {
    let rows = match sqlx::query("SELECT id FROM users WHERE LOWER(email) = ANY($1)")
        .bind(&state.admin_emails)
        .fetch_all(&state.pool)
        .await
    {
        Ok(rows) => rows,
        Err(e) => {
            log::error!("admin fan-out lookup failed: {e}");
            return;
        }
    };

    for row in rows {
        let admin_id: i32 = row.get("id");
        if let Err(e) = dispatch(
            state,
            admin_id,
            kind,
            title,
            message,
            metadata.clone(),
            Some(&format!("<p>{}</p>", message)),
        )
        .await
        {
            log::error!("admin fan-out failed recipient_id={} err={}", admin_id, e);
        }
    }
}
