// Display-only card records: masked last-4 and expiry, never a real PAN
// or CVV.

use actix_web::web::ReqData;
use actix_web::{delete, get, post, put, web, HttpResponse, Responder};
use serde::Deserialize;
use serde_json::json;
use sqlx::Row;

use crate::models::Card;
use crate::AppState;

#[get("/cards")]
pub async fn list_cards(state: web::Data<AppState>, user_id: ReqData<i32>) -> impl Responder {
    let rows = sqlx::query(
        r#"SELECT id, card_type, last4, expiry_month, expiry_year, is_default
           FROM cards
           WHERE user_id = $1
           ORDER BY created_at ASC"#,
    )
    .bind(*user_id)
    .fetch_all(&state.pool)
    .await;

    match rows {
        Ok(rows) => {
            let cards: Vec<Card> = rows
                .into_iter()
                .map(|r| Card {
                    id: r.get("id"),
                    card_type: r.get("card_type"),
                    last4: r.get("last4"),
                    expiry_month: r.get("expiry_month"),
                    expiry_year: r.get("expiry_year"),
                    is_default: r.get("is_default"),
                })
                .collect();
            HttpResponse::Ok().json(json!({ "cards": cards }))
        }
        Err(e) => {
            log::error!("list_cards error: {e}");
            HttpResponse::InternalServerError().finish()
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AddCardRequest {
    pub card_type: String,
    pub last4: String,
    pub expiry_month: i32,
    pub expiry_year: i32,
    pub is_default: Option<bool>,
}

#[post("/cards")]
pub async fn add_card(
    state: web::Data<AppState>,
    user_id: ReqData<i32>,
    payload: web::Json<AddCardRequest>,
) -> impl Responder {
    let user_id = *user_id;

    if payload.last4.len() != 4 || !payload.last4.chars().all(|c| c.is_ascii_digit()) {
        return HttpResponse::BadRequest().json(json!({ "error": "last4 must be 4 digits" }));
    }
    if !(1..=12).contains(&payload.expiry_month) {
        return HttpResponse::BadRequest().json(json!({ "error": "expiry_month must be 1-12" }));
    }

    let make_default = payload.is_default.unwrap_or(false);
    if make_default {
        if let Err(e) = sqlx::query("UPDATE cards SET is_default = false WHERE user_id = $1")
            .bind(user_id)
            .execute(&state.pool)
            .await
        {
            log::error!("add_card clear defaults error: {e}");
            return HttpResponse::InternalServerError().finish();
        }
    }

    let row = match sqlx::query(
        r#"INSERT INTO cards (user_id, card_type, last4, expiry_month, expiry_year, is_default)
           VALUES ($1, $2, $3, $4, $5, $6)
           RETURNING id"#,
    )
    .bind(user_id)
    .bind(payload.card_type.trim())
    .bind(&payload.last4)
    .bind(payload.expiry_month)
    .bind(payload.expiry_year)
    .bind(make_default)
    .fetch_one(&state.pool)
    .await
    {
        Ok(r) => r,
        Err(e) => {
            log::error!("add_card insert error: {e}");
            return HttpResponse::InternalServerError().finish();
        }
    };

    HttpResponse::Ok().json(json!({ "id": row.get::<i32, _>("id") }))
}

/// Clears every default for the user before setting the new one, so at most
/// one card is ever flagged.
#[put("/cards/{id}/default")]
pub async fn set_default_card(
    state: web::Data<AppState>,
    user_id: ReqData<i32>,
    path: web::Path<i32>,
) -> impl Responder {
    let user_id = *user_id;
    let card_id = path.into_inner();

    if let Err(e) = sqlx::query("UPDATE cards SET is_default = false WHERE user_id = $1")
        .bind(user_id)
        .execute(&state.pool)
        .await
    {
        log::error!("set_default clear error: {e}");
        return HttpResponse::InternalServerError().finish();
    }

    let result = sqlx::query(
        r#"UPDATE cards SET is_default = true WHERE id = $1 AND user_id = $2"#,
    )
    .bind(card_id)
    .bind(user_id)
    .execute(&state.pool)
    .await;

    match result {
        Ok(r) if r.rows_affected() == 0 => {
            HttpResponse::NotFound().json(json!({ "error": "card not found" }))
        }
        Ok(_) => HttpResponse::Ok().json(json!({ "default": card_id })),
        Err(e) => {
            log::error!("set_default error: {e}");
            HttpResponse::InternalServerError().finish()
        }
    }
}

#[delete("/cards/{id}")]
pub async fn delete_card(
    state: web::Data<AppState>,
    user_id: ReqData<i32>,
    path: web::Path<i32>,
) -> impl Responder {
    let result = sqlx::query("DELETE FROM cards WHERE id = $1 AND user_id = $2")
        .bind(path.into_inner())
        .bind(*user_id)
        .execute(&state.pool)
        .await;

    match result {
        Ok(r) if r.rows_affected() == 0 => {
            HttpResponse::NotFound().json(json!({ "error": "card not found" }))
        }
        Ok(_) => HttpResponse::Ok().json(json!({ "deleted": true })),
        Err(e) => {
            log::error!("delete_card error: {e}");
            HttpResponse::InternalServerError().finish()
        }
    }
}
