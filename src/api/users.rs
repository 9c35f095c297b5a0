// src/api/users.rs

use actix_web::web::ReqData;
use actix_web::{get, put, web, HttpResponse, Responder};
use serde::Deserialize;
use serde_json::json;
use sqlx::postgres::PgRow;
use sqlx::Row;

use crate::models::UserProfile;
use crate::AppState;

fn map_profile_row(r: &PgRow) -> UserProfile {
    UserProfile {
        id: r.get("id"),
        username: r.get("username"),
        email: r.get("email"),
        first_name: r.get("first_name"),
        last_name: r.get("last_name"),
        role: r.get("role"),
        bio: r.get("bio"),
        profile_picture: r.get("profile_picture"),
        onboarding_complete: r.get("onboarding_complete"),
        created_at: r.get("created_at"),
    }
}

const PROFILE_COLUMNS: &str = "id, username, email, first_name, last_name, role, bio, \
     profile_picture, onboarding_complete, created_at";

#[get("/users/me")]
pub async fn get_me(state: web::Data<AppState>, user_id: ReqData<i32>) -> impl Responder {
    let sql = format!("SELECT {PROFILE_COLUMNS} FROM users WHERE id = $1");
    match sqlx::query(&sql).bind(*user_id).fetch_optional(&state.pool).await {
        Ok(Some(row)) => HttpResponse::Ok().json(json!({ "user": map_profile_row(&row) })),
        Ok(None) => HttpResponse::NotFound().json(json!({ "error": "user not found" })),
        Err(e) => {
            log::error!("get_me error: {e}");
            HttpResponse::InternalServerError().finish()
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub bio: Option<String>,
    pub profile_picture: Option<String>,
    pub onboarding_complete: Option<bool>,
}

#[put("/users/me")]
pub async fn update_me(
    state: web::Data<AppState>,
    user_id: ReqData<i32>,
    payload: web::Json<UpdateProfileRequest>,
) -> impl Responder {
    let sql = format!(
        "UPDATE users
         SET first_name = COALESCE($1, first_name),
             last_name = COALESCE($2, last_name),
             bio = COALESCE($3, bio),
             profile_picture = COALESCE($4, profile_picture),
             onboarding_complete = COALESCE($5, onboarding_complete),
             updated_at = NOW()
         WHERE id = $6
         RETURNING {PROFILE_COLUMNS}"
    );

    match sqlx::query(&sql)
        .bind(payload.first_name.as_deref())
        .bind(payload.last_name.as_deref())
        .bind(payload.bio.as_deref())
        .bind(payload.profile_picture.as_deref())
        .bind(payload.onboarding_complete)
        .bind(*user_id)
        .fetch_optional(&state.pool)
        .await
    {
        Ok(Some(row)) => HttpResponse::Ok().json(json!({ "user": map_profile_row(&row) })),
        Ok(None) => HttpResponse::NotFound().json(json!({ "error": "user not found" })),
        Err(e) => {
            log::error!("update_me error: {e}");
            HttpResponse::InternalServerError().finish()
        }
    }
}
