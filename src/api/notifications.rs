use actix_web::web::ReqData;
use actix_web::{delete, get, put, web, HttpResponse, Responder};
use serde::Deserialize;
use serde_json::json;
use sqlx::Row;

use crate::models::Notification;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub unread: Option<bool>,
}

#[get("/notifications")]
pub async fn list_notifications(
    state: web::Data<AppState>,
    user_id: ReqData<i32>,
    query: web::Query<ListQuery>,
) -> impl Responder {
    let limit = query.limit.unwrap_or(20).clamp(1, 100);
    let offset = (query.page.unwrap_or(1).max(1) - 1) * limit;
    let unread_only = query.unread.unwrap_or(false);

    let rows = sqlx::query(
        r#"SELECT id, recipient_id, type, title, message, is_read, metadata, created_at
           FROM notifications
           WHERE recipient_id = $1 AND (NOT $2 OR is_read = false)
           ORDER BY created_at DESC
           LIMIT $3 OFFSET $4"#,
    )
    .bind(*user_id)
    .bind(unread_only)
    .bind(limit)
    .bind(offset)
    .fetch_all(&state.pool)
    .await;

    match rows {
        Ok(rows) => {
            let notifications: Vec<Notification> = rows
                .into_iter()
                .map(|r| Notification {
                    id: r.get("id"),
                    recipient_id: r.get("recipient_id"),
                    kind: r.get("type"),
                    title: r.get("title"),
                    message: r.get("message"),
                    is_read: r.get("is_read"),
                    metadata: r.get("metadata"),
                    created_at: r.get("created_at"),
                })
                .collect();
            HttpResponse::Ok().json(json!({ "notifications": notifications }))
        }
        Err(e) => {
            log::error!("list_notifications error: {e}");
            HttpResponse::InternalServerError().finish()
        }
    }
}

#[put("/notifications/{id}/read")]
pub async fn mark_read(
    state: web::Data<AppState>,
    user_id: ReqData<i32>,
    path: web::Path<i32>,
) -> impl Responder {
    let result = sqlx::query(
        r#"UPDATE notifications SET is_read = true
           WHERE id = $1 AND recipient_id = $2"#,
    )
    .bind(path.into_inner())
    .bind(*user_id)
    .execute(&state.pool)
    .await;

    match result {
        Ok(r) if r.rows_affected() == 0 => {
            HttpResponse::NotFound().json(json!({ "error": "notification not found" }))
        }
        Ok(_) => HttpResponse::Ok().json(json!({ "read": true })),
        Err(e) => {
            log::error!("mark_read error: {e}");
            HttpResponse::InternalServerError().finish()
        }
    }
}

#[put("/notifications/read-all")]
pub async fn mark_all_read(state: web::Data<AppState>, user_id: ReqData<i32>) -> impl Responder {
    match sqlx::query("UPDATE notifications SET is_read = true WHERE recipient_id = $1")
        .bind(*user_id)
        .execute(&state.pool)
        .await
    {
        Ok(r) => HttpResponse::Ok().json(json!({ "read": r.rows_affected() })),
        Err(e) => {
            log::error!("mark_all_read error: {e}");
            HttpResponse::InternalServerError().finish()
        }
    }
}

#[delete("/notifications/{id}")]
pub async fn delete_notification(
    state: web::Data<AppState>,
    user_id: ReqData<i32>,
    path: web::Path<i32>,
) -> impl Responder {
    let result = sqlx::query(
        r#"DELETE FROM notifications WHERE id = $1 AND recipient_id = $2"#,
    )
    .bind(path.into_inner())
    .bind(*user_id)
    .execute(&state.pool)
    .await;

    match result {
        Ok(r) if r.rows_affected() == 0 => {
            HttpResponse::NotFound().json(json!({ "error": "notification not found" }))
        }
        Ok(_) => HttpResponse::Ok().json(json!({ "deleted": true })),
        Err(e) => {
            log::error!("delete_notification error: {e}");
            HttpResponse::InternalServerError().finish()
        }
    }
}
