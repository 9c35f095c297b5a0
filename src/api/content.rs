// Announcements and events: admin-authored, publicly listed.

use actix_web::{delete, get, post, put, web, HttpResponse, Responder};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use sqlx::Row;

use crate::models::{Announcement, Event};
use crate::{notify, AppState};

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

fn page_bounds(query: &PageQuery) -> (i64, i64) {
    let limit = query.limit.unwrap_or(20).clamp(1, 100);
    let offset = (query.page.unwrap_or(1).max(1) - 1) * limit;
    (limit, offset)
}

#[get("/api/announcements")]
pub async fn list_announcements(
    state: web::Data<AppState>,
    query: web::Query<PageQuery>,
) -> impl Responder {
    let (limit, offset) = page_bounds(&query);

    let rows = sqlx::query(
        r#"SELECT id, title, body, is_active, display_order, created_at
           FROM announcements
           WHERE is_active = true
           ORDER BY display_order ASC, created_at DESC
           LIMIT $1 OFFSET $2"#,
    )
    .bind(limit)
    .bind(offset)
    .fetch_all(&state.pool)
    .await;

    match rows {
        Ok(rows) => {
            let announcements: Vec<Announcement> = rows
                .into_iter()
                .map(|r| Announcement {
                    id: r.get("id"),
                    title: r.get("title"),
                    body: r.get("body"),
                    is_active: r.get("is_active"),
                    display_order: r.get("display_order"),
                    created_at: r.get("created_at"),
                })
                .collect();
            HttpResponse::Ok().json(json!({ "announcements": announcements }))
        }
        Err(e) => {
            log::error!("list_announcements error: {e}");
            HttpResponse::InternalServerError().finish()
        }
    }
}

#[get("/api/events")]
pub async fn list_events(
    state: web::Data<AppState>,
    query: web::Query<PageQuery>,
) -> impl Responder {
    let (limit, offset) = page_bounds(&query);

    let rows = sqlx::query(
        r#"SELECT id, title, description, location, start_date, end_date, is_active
           FROM events
           WHERE is_active = true
           ORDER BY start_date ASC
           LIMIT $1 OFFSET $2"#,
    )
    .bind(limit)
    .bind(offset)
    .fetch_all(&state.pool)
    .await;

    match rows {
        Ok(rows) => {
            let events: Vec<Event> = rows
                .into_iter()
                .map(|r| Event {
                    id: r.get("id"),
                    title: r.get("title"),
                    description: r.get("description"),
                    location: r.get("location"),
                    start_date: r.get("start_date"),
                    end_date: r.get("end_date"),
                    is_active: r.get("is_active"),
                })
                .collect();
            HttpResponse::Ok().json(json!({ "events": events }))
        }
        Err(e) => {
            log::error!("list_events error: {e}");
            HttpResponse::InternalServerError().finish()
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AnnouncementRequest {
    pub title: String,
    pub body: String,
    pub is_active: Option<bool>,
    pub display_order: Option<i32>,
}

#[post("/announcements")]
pub async fn admin_create_announcement(
    state: web::Data<AppState>,
    payload: web::Json<AnnouncementRequest>,
) -> impl Responder {
    if payload.title.trim().is_empty() || payload.body.trim().is_empty() {
        return HttpResponse::BadRequest().json(json!({ "error": "title and body are required" }));
    }

    let row = match sqlx::query(
        r#"INSERT INTO announcements (title, body, is_active, display_order)
           VALUES ($1, $2, $3, $4)
           RETURNING id"#,
    )
    .bind(payload.title.trim())
    .bind(payload.body.trim())
    .bind(payload.is_active.unwrap_or(true))
    .bind(payload.display_order.unwrap_or(0))
    .fetch_one(&state.pool)
    .await
    {
        Ok(r) => r,
        Err(e) => {
            log::error!("create announcement error: {e}");
            return HttpResponse::InternalServerError().finish();
        }
    };

    HttpResponse::Ok().json(json!({ "id": row.get::<i32, _>("id") }))
}

#[put("/announcements/{id}")]
pub async fn admin_update_announcement(
    state: web::Data<AppState>,
    path: web::Path<i32>,
    payload: web::Json<AnnouncementRequest>,
) -> impl Responder {
    let result = sqlx::query(
        r#"UPDATE announcements
           SET title = $1, body = $2, is_active = $3, display_order = $4, updated_at = NOW()
           WHERE id = $5"#,
    )
    .bind(payload.title.trim())
    .bind(payload.body.trim())
    .bind(payload.is_active.unwrap_or(true))
    .bind(payload.display_order.unwrap_or(0))
    .bind(path.into_inner())
    .execute(&state.pool)
    .await;

    match result {
        Ok(r) if r.rows_affected() == 0 => {
            HttpResponse::NotFound().json(json!({ "error": "announcement not found" }))
        }
        Ok(_) => HttpResponse::Ok().json(json!({ "updated": true })),
        Err(e) => {
            log::error!("update announcement error: {e}");
            HttpResponse::InternalServerError().finish()
        }
    }
}

#[delete("/announcements/{id}")]
pub async fn admin_delete_announcement(
    state: web::Data<AppState>,
    path: web::Path<i32>,
) -> impl Responder {
    match sqlx::query("DELETE FROM announcements WHERE id = $1")
        .bind(path.into_inner())
        .execute(&state.pool)
        .await
    {
        Ok(r) if r.rows_affected() == 0 => {
            HttpResponse::NotFound().json(json!({ "error": "announcement not found" }))
        }
        Ok(_) => HttpResponse::Ok().json(json!({ "deleted": true })),
        Err(e) => {
            log::error!("delete announcement error: {e}");
            HttpResponse::InternalServerError().finish()
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct EventRequest {
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub is_active: Option<bool>,
}

#[post("/events")]
pub async fn admin_create_event(
    state: web::Data<AppState>,
    payload: web::Json<EventRequest>,
) -> impl Responder {
    if payload.title.trim().is_empty() {
        return HttpResponse::BadRequest().json(json!({ "error": "title is required" }));
    }

    let row = match sqlx::query(
        r#"INSERT INTO events (title, description, location, start_date, end_date, is_active)
           VALUES ($1, $2, $3, $4, $5, $6)
           RETURNING id"#,
    )
    .bind(payload.title.trim())
    .bind(payload.description.as_deref())
    .bind(payload.location.as_deref())
    .bind(payload.start_date)
    .bind(payload.end_date)
    .bind(payload.is_active.unwrap_or(true))
    .fetch_one(&state.pool)
    .await
    {
        Ok(r) => r,
        Err(e) => {
            log::error!("create event error: {e}");
            return HttpResponse::InternalServerError().finish();
        }
    };

    let event_id: i32 = row.get("id");

    if payload.is_active.unwrap_or(true) {
        notify::notify_all_users(
            &state,
            notify::TYPE_EVENT,
            payload.title.trim(),
            &format!("New event: {}", payload.title.trim()),
            json!({ "event_id": event_id }),
        )
        .await;
    }

    HttpResponse::Ok().json(json!({ "id": event_id }))
}

#[put("/events/{id}")]
pub async fn admin_update_event(
    state: web::Data<AppState>,
    path: web::Path<i32>,
    payload: web::Json<EventRequest>,
) -> impl Responder {
    let result = sqlx::query(
        r#"UPDATE events
           SET title = $1, description = $2, location = $3, start_date = $4,
               end_date = $5, is_active = $6, updated_at = NOW()
           WHERE id = $7"#,
    )
    .bind(payload.title.trim())
    .bind(payload.description.as_deref())
    .bind(payload.location.as_deref())
    .bind(payload.start_date)
    .bind(payload.end_date)
    .bind(payload.is_active.unwrap_or(true))
    .bind(path.into_inner())
    .execute(&state.pool)
    .await;

    match result {
        Ok(r) if r.rows_affected() == 0 => {
            HttpResponse::NotFound().json(json!({ "error": "event not found" }))
        }
        Ok(_) => HttpResponse::Ok().json(json!({ "updated": true })),
        Err(e) => {
            log::error!("update event error: {e}");
            HttpResponse::InternalServerError().finish()
        }
    }
}

#[delete("/events/{id}")]
pub async fn admin_delete_event(
    state: web::Data<AppState>,
    path: web::Path<i32>,
) -> impl Responder {
    match sqlx::query("DELETE FROM events WHERE id = $1")
        .bind(path.into_inner())
        .execute(&state.pool)
        .await
    {
        Ok(r) if r.rows_affected() == 0 => {
            HttpResponse::NotFound().json(json!({ "error": "event not found" }))
        }
        Ok(_) => HttpResponse::Ok().json(json!({ "deleted": true })),
        Err(e) => {
            log::error!("delete event error: {e}");
            HttpResponse::InternalServerError().finish()
        }
    }
}
