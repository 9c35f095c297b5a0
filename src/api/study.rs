use actix_multipart::Multipart;
use actix_web::web::ReqData;
use actix_web::{delete, get, post, put, web, HttpResponse, Responder};
use futures_util::StreamExt;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::Deserialize;
use serde_json::json;
use sqlx::{PgPool, Row};

use crate::api::quizzes::{parse_questions, strip_answers, validate_questions};
use crate::models::QuizQuestion;
use crate::{ai_client, quota, AppState};

pub const SHARE_CODE_LEN: usize = 8;

pub fn share_code_candidate() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SHARE_CODE_LEN)
        .map(char::from)
        .collect()
}

/// Unbounded retry against the stored codes; the random space is large
/// enough that this terminates almost immediately.
async fn generate_share_code(pool: &PgPool) -> Result<String, sqlx::Error> {
    loop {
        let code = share_code_candidate();
        let exists = sqlx::query("SELECT 1 AS one FROM quizzes WHERE share_code = $1")
            .bind(&code)
            .fetch_optional(pool)
            .await?
            .is_some();
        if !exists {
            return Ok(code);
        }
    }
}

#[get("/study/quizzes")]
pub async fn list_my_quizzes(state: web::Data<AppState>, user_id: ReqData<i32>) -> impl Responder {
    let rows = sqlx::query(
        r#"SELECT id, title, description, category, duration_minutes,
                  jsonb_array_length(questions) as question_count,
                  is_shared, share_code, created_at
           FROM quizzes
           WHERE created_by = $1
           ORDER BY created_at DESC"#,
    )
    .bind(*user_id)
    .fetch_all(&state.pool)
    .await;

    match rows {
        Ok(rows) => {
            let quizzes: Vec<serde_json::Value> = rows
                .iter()
                .map(|r| {
                    json!({
                        "id": r.get::<i32, _>("id"),
                        "title": r.get::<String, _>("title"),
                        "description": r.get::<Option<String>, _>("description"),
                        "category": r.get::<String, _>("category"),
                        "duration_minutes": r.get::<i32, _>("duration_minutes"),
                        "question_count": r.get::<i32, _>("question_count"),
                        "is_shared": r.get::<bool, _>("is_shared"),
                        "share_code": r.get::<Option<String>, _>("share_code"),
                    })
                })
                .collect();
            HttpResponse::Ok().json(json!({ "quizzes": quizzes }))
        }
        Err(e) => {
            log::error!("list_my_quizzes error: {e}");
            HttpResponse::InternalServerError().finish()
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct StudyQuizRequest {
    pub title: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub duration_minutes: Option<i32>,
    pub questions: Vec<QuizQuestion>,
}

#[post("/study/quizzes")]
pub async fn create_my_quiz(
    state: web::Data<AppState>,
    user_id: ReqData<i32>,
    payload: web::Json<StudyQuizRequest>,
) -> impl Responder {
    if payload.title.trim().is_empty() {
        return HttpResponse::BadRequest().json(json!({ "error": "title is required" }));
    }
    if let Err(msg) = validate_questions(&payload.questions) {
        return HttpResponse::BadRequest().json(json!({ "error": msg }));
    }

    let row = match sqlx::query(
        r#"INSERT INTO quizzes (title, description, category, duration_minutes, questions, created_by)
           VALUES ($1, $2, $3, $4, $5, $6)
           RETURNING id"#,
    )
    .bind(payload.title.trim())
    .bind(payload.description.as_deref())
    .bind(payload.category.as_deref().unwrap_or("General"))
    .bind(payload.duration_minutes.unwrap_or(10))
    .bind(json!(payload.questions))
    .bind(*user_id)
    .fetch_one(&state.pool)
    .await
    {
        Ok(r) => r,
        Err(e) => {
            log::error!("create_my_quiz error: {e}");
            return HttpResponse::InternalServerError().finish();
        }
    };

    HttpResponse::Ok().json(json!({ "id": row.get::<i32, _>("id") }))
}

/// Owners see their quizzes with the full answer key.
#[get("/study/quizzes/{id}")]
pub async fn get_my_quiz(
    state: web::Data<AppState>,
    user_id: ReqData<i32>,
    path: web::Path<i32>,
) -> impl Responder {
    let row = match sqlx::query(
        r#"SELECT id, title, description, category, duration_minutes, questions,
                  is_shared, share_code, shared_at, created_at
           FROM quizzes
           WHERE id = $1 AND created_by = $2"#,
    )
    .bind(path.into_inner())
    .bind(*user_id)
    .fetch_optional(&state.pool)
    .await
    {
        Ok(Some(r)) => r,
        Ok(None) => return HttpResponse::NotFound().json(json!({ "error": "quiz not found" })),
        Err(e) => {
            log::error!("get_my_quiz error: {e}");
            return HttpResponse::InternalServerError().finish();
        }
    };

    HttpResponse::Ok().json(json!({
        "quiz": {
            "id": row.get::<i32, _>("id"),
            "title": row.get::<String, _>("title"),
            "description": row.get::<Option<String>, _>("description"),
            "category": row.get::<String, _>("category"),
            "duration_minutes": row.get::<i32, _>("duration_minutes"),
            "questions": row.get::<serde_json::Value, _>("questions"),
            "is_shared": row.get::<bool, _>("is_shared"),
            "share_code": row.get::<Option<String>, _>("share_code"),
            "shared_at": row.get::<Option<chrono::DateTime<chrono::Utc>>, _>("shared_at"),
        }
    }))
}

#[put("/study/quizzes/{id}")]
pub async fn update_my_quiz(
    state: web::Data<AppState>,
    user_id: ReqData<i32>,
    path: web::Path<i32>,
    payload: web::Json<StudyQuizRequest>,
) -> impl Responder {
    if let Err(msg) = validate_questions(&payload.questions) {
        return HttpResponse::BadRequest().json(json!({ "error": msg }));
    }

    let result = sqlx::query(
        r#"UPDATE quizzes
           SET title = $1, description = $2, category = COALESCE($3, category),
               duration_minutes = COALESCE($4, duration_minutes),
               questions = $5, updated_at = NOW()
           WHERE id = $6 AND created_by = $7"#,
    )
    .bind(payload.title.trim())
    .bind(payload.description.as_deref())
    .bind(payload.category.as_deref())
    .bind(payload.duration_minutes)
    .bind(json!(payload.questions))
    .bind(path.into_inner())
    .bind(*user_id)
    .execute(&state.pool)
    .await;

    match result {
        Ok(r) if r.rows_affected() == 0 => {
            HttpResponse::NotFound().json(json!({ "error": "quiz not found" }))
        }
        Ok(_) => HttpResponse::Ok().json(json!({ "updated": true })),
        Err(e) => {
            log::error!("update_my_quiz error: {e}");
            HttpResponse::InternalServerError().finish()
        }
    }
}

#[delete("/study/quizzes/{id}")]
pub async fn delete_my_quiz(
    state: web::Data<AppState>,
    user_id: ReqData<i32>,
    path: web::Path<i32>,
) -> impl Responder {
    match sqlx::query("DELETE FROM quizzes WHERE id = $1 AND created_by = $2")
        .bind(path.into_inner())
        .bind(*user_id)
        .execute(&state.pool)
        .await
    {
        Ok(r) if r.rows_affected() == 0 => {
            HttpResponse::NotFound().json(json!({ "error": "quiz not found" }))
        }
        Ok(_) => HttpResponse::Ok().json(json!({ "deleted": true })),
        Err(e) => {
            log::error!("delete_my_quiz error: {e}");
            HttpResponse::InternalServerError().finish()
        }
    }
}

/// One-way share enable. The first call generates the code; repeat calls are
/// no-ops that report the same code.
#[post("/study/quizzes/{id}/share")]
pub async fn share_my_quiz(
    state: web::Data<AppState>,
    user_id: ReqData<i32>,
    path: web::Path<i32>,
) -> impl Responder {
    let quiz_id = path.into_inner();

    let row = match sqlx::query(
        r#"SELECT is_shared, share_code FROM quizzes WHERE id = $1 AND created_by = $2"#,
    )
    .bind(quiz_id)
    .bind(*user_id)
    .fetch_optional(&state.pool)
    .await
    {
        Ok(Some(r)) => r,
        Ok(None) => return HttpResponse::NotFound().json(json!({ "error": "quiz not found" })),
        Err(e) => {
            log::error!("share_my_quiz lookup error: {e}");
            return HttpResponse::InternalServerError().finish();
        }
    };

    let is_shared: bool = row.get("is_shared");
    if is_shared {
        let code: Option<String> = row.get("share_code");
        return HttpResponse::Ok().json(json!({ "shared": true, "share_code": code }));
    }

    let code = match generate_share_code(&state.pool).await {
        Ok(c) => c,
        Err(e) => {
            log::error!("share code generation error: {e}");
            return HttpResponse::InternalServerError().finish();
        }
    };

    let result = sqlx::query(
        r#"UPDATE quizzes
           SET is_shared = true, share_code = $1, shared_at = NOW()
           WHERE id = $2 AND created_by = $3"#,
    )
    .bind(&code)
    .bind(quiz_id)
    .bind(*user_id)
    .execute(&state.pool)
    .await;

    match result {
        Ok(_) => HttpResponse::Ok().json(json!({ "shared": true, "share_code": code })),
        Err(e) => {
            log::error!("share_my_quiz update error: {e}");
            HttpResponse::InternalServerError().finish()
        }
    }
}

/// Public, unauthenticated fetch of a shared quiz. Served without the
/// answer key, like any quiz being taken.
#[get("/api/study/shared/{code}")]
pub async fn get_shared_quiz(state: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    let code = path.into_inner();

    let row = match sqlx::query(
        r#"SELECT id, title, description, category, duration_minutes, questions
           FROM quizzes
           WHERE share_code = $1 AND is_shared = true"#,
    )
    .bind(&code)
    .fetch_optional(&state.pool)
    .await
    {
        Ok(Some(r)) => r,
        Ok(None) => return HttpResponse::NotFound().json(json!({ "error": "quiz not found" })),
        Err(e) => {
            log::error!("get_shared_quiz error: {e}");
            return HttpResponse::InternalServerError().finish();
        }
    };

    let questions = parse_questions(row.get("questions"));

    HttpResponse::Ok().json(json!({
        "quiz": {
            "title": row.get::<String, _>("title"),
            "description": row.get::<Option<String>, _>("description"),
            "category": row.get::<String, _>("category"),
            "duration_minutes": row.get::<i32, _>("duration_minutes"),
            "questions": strip_answers(&questions),
        }
    }))
}

/// Copies a shared quiz into the caller's collection as an independent
/// record; edits to the original never affect the copy.
#[post("/study/shared/{code}/save")]
pub async fn save_shared_quiz(
    state: web::Data<AppState>,
    user_id: ReqData<i32>,
    path: web::Path<String>,
) -> impl Responder {
    let code = path.into_inner();

    let row = match sqlx::query(
        r#"INSERT INTO quizzes (title, description, category, duration_minutes, questions, created_by)
           SELECT title, description, category, duration_minutes, questions, $1
           FROM quizzes
           WHERE share_code = $2 AND is_shared = true
           RETURNING id"#,
    )
    .bind(*user_id)
    .bind(&code)
    .fetch_optional(&state.pool)
    .await
    {
        Ok(Some(r)) => r,
        Ok(None) => return HttpResponse::NotFound().json(json!({ "error": "quiz not found" })),
        Err(e) => {
            log::error!("save_shared_quiz error: {e}");
            return HttpResponse::InternalServerError().finish();
        }
    };

    HttpResponse::Ok().json(json!({ "id": row.get::<i32, _>("id") }))
}

/// Multipart input for generation: an optional `topic` text field, an
/// optional `count`, and an optional document consumed as UTF-8 text.
async fn read_generation_fields(mut payload: Multipart) -> (Option<String>, Option<String>, usize) {
    let mut topic: Option<String> = None;
    let mut document: Option<String> = None;
    let mut count = 10usize;

    while let Some(item) = payload.next().await {
        let mut field = match item {
            Ok(f) => f,
            Err(_) => continue,
        };

        let name = field
            .content_disposition()
            .get_name()
            .unwrap_or_default()
            .to_string();

        let mut bytes: Vec<u8> = Vec::new();
        while let Some(chunk) = field.next().await {
            if let Ok(data) = chunk {
                bytes.extend_from_slice(&data);
            }
        }
        let text = String::from_utf8_lossy(&bytes).to_string();

        match name.as_str() {
            "topic" => {
                if !text.trim().is_empty() {
                    topic = Some(text.trim().to_string());
                }
            }
            "count" => {
                if let Ok(n) = text.trim().parse::<usize>() {
                    count = n.clamp(1, 20);
                }
            }
            "document" | "file" => {
                if !text.trim().is_empty() {
                    document = Some(text);
                }
            }
            _ => {}
        }
    }

    (topic, document, count)
}

/// AI-backed question generation, capped per user per UTC day. Admin-listed
/// emails bypass the quota.
#[post("/study/generate")]
pub async fn generate_questions(
    state: web::Data<AppState>,
    user_id: ReqData<i32>,
    payload: Multipart,
) -> impl Responder {
    let user_id = *user_id;

    let (topic, document, count) = read_generation_fields(payload).await;

    if topic.is_none() && document.is_none() {
        return HttpResponse::BadRequest().json(json!({
            "error": "provide a topic or a document"
        }));
    }

    let email = match sqlx::query("SELECT email FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(&state.pool)
        .await
    {
        Ok(Some(r)) => r.get::<String, _>("email"),
        Ok(None) => return HttpResponse::Unauthorized().json(json!({ "error": "unknown user" })),
        Err(e) => {
            log::error!("generate user lookup error: {e}");
            return HttpResponse::InternalServerError().finish();
        }
    };

    if !state.is_admin_email(&email) {
        match quota::check_and_consume(
            &state.pool,
            user_id,
            quota::GENERATION_ACTION,
            quota::DAILY_GENERATION_LIMIT,
        )
        .await
        {
            Ok(true) => {}
            Ok(false) => {
                return HttpResponse::TooManyRequests().json(json!({
                    "error": "daily generation limit reached"
                }));
            }
            Err(e) => {
                log::error!("generation quota error: {e}");
                return HttpResponse::InternalServerError().finish();
            }
        }
    }

    match ai_client::generate_questions(
        &state.ai_api_key,
        topic.as_deref(),
        document.as_deref(),
        count,
    )
    .await
    {
        Ok(questions) => HttpResponse::Ok().json(json!({ "questions": questions })),
        Err(e) => {
            log::error!("question generation failed user_id={} err={}", user_id, e);
            HttpResponse::BadGateway().json(json!({ "error": "question generation failed" }))
        }
    }
}
