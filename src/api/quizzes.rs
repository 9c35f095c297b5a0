// src/api/quizzes.rs

use actix_web::web::ReqData;
use actix_web::{delete, get, post, put, web, HttpResponse, Responder};
use serde::Deserialize;
use serde_json::json;
use sqlx::postgres::PgRow;
use sqlx::Row;

use crate::models::{QuizQuestion, QuizSummary};
use crate::AppState;

/// Percentage score rounded to the nearest integer.
pub fn compute_score(correct: usize, total: usize) -> i32 {
    if total == 0 {
        return 0;
    }
    ((correct as f64 / total as f64) * 100.0).round() as i32
}

/// Validates author-supplied questions before they are stored.
pub fn validate_questions(questions: &[QuizQuestion]) -> Result<(), String> {
    if questions.is_empty() {
        return Err("at least one question is required".to_string());
    }
    for (i, q) in questions.iter().enumerate() {
        if q.question.trim().is_empty() {
            return Err(format!("question {} has no text", i + 1));
        }
        if q.options.len() < 2 {
            return Err(format!("question {} needs at least two options", i + 1));
        }
        if q.correct_answer >= q.options.len() {
            return Err(format!("question {} answer index is out of range", i + 1));
        }
    }
    Ok(())
}

/// The shape served while a quiz is being taken: no answer key.
pub fn strip_answers(questions: &[QuizQuestion]) -> Vec<serde_json::Value> {
    questions
        .iter()
        .map(|q| {
            json!({
                "question": q.question,
                "options": q.options,
            })
        })
        .collect()
}

pub fn parse_questions(value: serde_json::Value) -> Vec<QuizQuestion> {
    serde_json::from_value(value).unwrap_or_default()
}

fn map_summary_row(r: &PgRow) -> QuizSummary {
    let question_count: i32 = r.get("question_count");
    QuizSummary {
        id: r.get("id"),
        title: r.get("title"),
        description: r.get("description"),
        category: r.get("category"),
        duration_minutes: r.get("duration_minutes"),
        question_count: question_count.max(0) as usize,
        created_at: r.get("created_at"),
    }
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub category: Option<String>,
}

/// Curated quiz list: metadata plus a question count, never the questions.
#[get("/quiz")]
pub async fn list_quizzes(
    state: web::Data<AppState>,
    query: web::Query<ListQuery>,
) -> impl Responder {
    let rows = match &query.category {
        Some(category) => {
            sqlx::query(
                r#"SELECT id, title, description, category, duration_minutes,
                          jsonb_array_length(questions) as question_count, created_at
                   FROM quizzes
                   WHERE is_published = true AND category = $1
                   ORDER BY created_at DESC"#,
            )
            .bind(category)
            .fetch_all(&state.pool)
            .await
        }
        None => {
            sqlx::query(
                r#"SELECT id, title, description, category, duration_minutes,
                          jsonb_array_length(questions) as question_count, created_at
                   FROM quizzes
                   WHERE is_published = true
                   ORDER BY created_at DESC"#,
            )
            .fetch_all(&state.pool)
            .await
        }
    };

    match rows {
        Ok(rows) => {
            let quizzes: Vec<QuizSummary> = rows.iter().map(map_summary_row).collect();
            HttpResponse::Ok().json(json!({ "quizzes": quizzes }))
        }
        Err(e) => {
            log::error!("list_quizzes error: {e}");
            HttpResponse::InternalServerError().finish()
        }
    }
}

/// Serves a quiz for taking: `correct_answer` and `explanation` are stripped.
#[get("/quiz/{id}")]
pub async fn get_quiz(state: web::Data<AppState>, path: web::Path<i32>) -> impl Responder {
    let row = match sqlx::query(
        r#"SELECT id, title, description, category, duration_minutes, questions
           FROM quizzes
           WHERE id = $1 AND is_published = true"#,
    )
    .bind(path.into_inner())
    .fetch_optional(&state.pool)
    .await
    {
        Ok(Some(r)) => r,
        Ok(None) => return HttpResponse::NotFound().json(json!({ "error": "quiz not found" })),
        Err(e) => {
            log::error!("get_quiz error: {e}");
            return HttpResponse::InternalServerError().finish();
        }
    };

    let questions = parse_questions(row.get("questions"));

    HttpResponse::Ok().json(json!({
        "quiz": {
            "id": row.get::<i32, _>("id"),
            "title": row.get::<String, _>("title"),
            "description": row.get::<Option<String>, _>("description"),
            "category": row.get::<String, _>("category"),
            "duration_minutes": row.get::<i32, _>("duration_minutes"),
            "questions": strip_answers(&questions),
        }
    }))
}

#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    pub answers: Vec<i64>,
    pub time_spent: Option<i32>,
}

/// Scores a completed pass and persists the attempt. The response carries the
/// full per-question breakdown, answer key included.
#[post("/quiz/{id}/submit")]
pub async fn submit_quiz(
    state: web::Data<AppState>,
    user_id: ReqData<i32>,
    path: web::Path<i32>,
    payload: web::Json<SubmitRequest>,
) -> impl Responder {
    let user_id = *user_id;
    let quiz_id = path.into_inner();

    let row = match sqlx::query(
        r#"SELECT questions FROM quizzes WHERE id = $1 AND is_published = true"#,
    )
    .bind(quiz_id)
    .fetch_optional(&state.pool)
    .await
    {
        Ok(Some(r)) => r,
        Ok(None) => return HttpResponse::NotFound().json(json!({ "error": "quiz not found" })),
        Err(e) => {
            log::error!("submit_quiz lookup error: {e}");
            return HttpResponse::InternalServerError().finish();
        }
    };

    let questions = parse_questions(row.get("questions"));
    if questions.is_empty() {
        return HttpResponse::BadRequest().json(json!({ "error": "quiz has no questions" }));
    }

    let total = questions.len();
    let mut correct = 0usize;
    let mut breakdown = Vec::with_capacity(total);

    for (i, q) in questions.iter().enumerate() {
        let answer = payload.answers.get(i).copied();
        let is_correct = answer == Some(q.correct_answer as i64);
        if is_correct {
            correct += 1;
        }
        breakdown.push(json!({
            "question": q.question,
            "options": q.options,
            "your_answer": answer,
            "correct_answer": q.correct_answer,
            "correct": is_correct,
            "explanation": q.explanation,
        }));
    }

    let score = compute_score(correct, total);

    let attempt = sqlx::query(
        r#"INSERT INTO quiz_attempts (user_id, quiz_id, answers, score, total_questions, time_spent)
           VALUES ($1, $2, $3, $4, $5, $6)
           RETURNING id"#,
    )
    .bind(user_id)
    .bind(quiz_id)
    .bind(json!(payload.answers))
    .bind(score)
    .bind(total as i32)
    .bind(payload.time_spent)
    .fetch_one(&state.pool)
    .await;

    let attempt_id: i32 = match attempt {
        Ok(r) => r.get("id"),
        Err(e) => {
            log::error!("submit_quiz attempt insert error: {e}");
            return HttpResponse::InternalServerError().finish();
        }
    };

    HttpResponse::Ok().json(json!({
        "attempt_id": attempt_id,
        "score": score,
        "total_questions": total,
        "correct": correct,
        "questions": breakdown,
    }))
}

#[get("/quiz/attempts")]
pub async fn list_attempts(state: web::Data<AppState>, user_id: ReqData<i32>) -> impl Responder {
    let rows = sqlx::query(
        r#"SELECT a.id, a.quiz_id, q.title, a.score, a.total_questions, a.time_spent, a.created_at
           FROM quiz_attempts a
           JOIN quizzes q ON q.id = a.quiz_id
           WHERE a.user_id = $1
           ORDER BY a.created_at DESC"#,
    )
    .bind(*user_id)
    .fetch_all(&state.pool)
    .await;

    match rows {
        Ok(rows) => {
            let attempts: Vec<serde_json::Value> = rows
                .iter()
                .map(|r| {
                    json!({
                        "id": r.get::<i32, _>("id"),
                        "quiz_id": r.get::<i32, _>("quiz_id"),
                        "title": r.get::<String, _>("title"),
                        "score": r.get::<i32, _>("score"),
                        "total_questions": r.get::<i32, _>("total_questions"),
                        "time_spent": r.get::<Option<i32>, _>("time_spent"),
                        "created_at": r.get::<Option<chrono::DateTime<chrono::Utc>>, _>("created_at"),
                    })
                })
                .collect();
            HttpResponse::Ok().json(json!({ "attempts": attempts }))
        }
        Err(e) => {
            log::error!("list_attempts error: {e}");
            HttpResponse::InternalServerError().finish()
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct QuizRequest {
    pub title: String,
    pub description: Option<String>,
    pub category: String,
    pub duration_minutes: Option<i32>,
    pub questions: Vec<QuizQuestion>,
    pub is_published: Option<bool>,
}

#[post("/quizzes")]
pub async fn admin_create_quiz(
    state: web::Data<AppState>,
    payload: web::Json<QuizRequest>,
) -> impl Responder {
    if payload.title.trim().is_empty() {
        return HttpResponse::BadRequest().json(json!({ "error": "title is required" }));
    }
    if let Err(msg) = validate_questions(&payload.questions) {
        return HttpResponse::BadRequest().json(json!({ "error": msg }));
    }

    let row = match sqlx::query(
        r#"INSERT INTO quizzes (title, description, category, duration_minutes, questions, is_published)
           VALUES ($1, $2, $3, $4, $5, $6)
           RETURNING id"#,
    )
    .bind(payload.title.trim())
    .bind(payload.description.as_deref())
    .bind(payload.category.trim())
    .bind(payload.duration_minutes.unwrap_or(10))
    .bind(json!(payload.questions))
    .bind(payload.is_published.unwrap_or(true))
    .fetch_one(&state.pool)
    .await
    {
        Ok(r) => r,
        Err(e) => {
            log::error!("admin create quiz error: {e}");
            return HttpResponse::InternalServerError().finish();
        }
    };

    HttpResponse::Ok().json(json!({ "id": row.get::<i32, _>("id") }))
}

#[put("/quizzes/{id}")]
pub async fn admin_update_quiz(
    state: web::Data<AppState>,
    path: web::Path<i32>,
    payload: web::Json<QuizRequest>,
) -> impl Responder {
    if let Err(msg) = validate_questions(&payload.questions) {
        return HttpResponse::BadRequest().json(json!({ "error": msg }));
    }

    let result = sqlx::query(
        r#"UPDATE quizzes
           SET title = $1, description = $2, category = $3, duration_minutes = $4,
               questions = $5, is_published = $6, updated_at = NOW()
           WHERE id = $7 AND created_by IS NULL"#,
    )
    .bind(payload.title.trim())
    .bind(payload.description.as_deref())
    .bind(payload.category.trim())
    .bind(payload.duration_minutes.unwrap_or(10))
    .bind(json!(payload.questions))
    .bind(payload.is_published.unwrap_or(true))
    .bind(path.into_inner())
    .execute(&state.pool)
    .await;

    match result {
        Ok(r) if r.rows_affected() == 0 => {
            HttpResponse::NotFound().json(json!({ "error": "quiz not found" }))
        }
        Ok(_) => HttpResponse::Ok().json(json!({ "updated": true })),
        Err(e) => {
            log::error!("admin update quiz error: {e}");
            HttpResponse::InternalServerError().finish()
        }
    }
}

#[delete("/quizzes/{id}")]
pub async fn admin_delete_quiz(
    state: web::Data<AppState>,
    path: web::Path<i32>,
) -> impl Responder {
    match sqlx::query("DELETE FROM quizzes WHERE id = $1 AND created_by IS NULL")
        .bind(path.into_inner())
        .execute(&state.pool)
        .await
    {
        Ok(r) if r.rows_affected() == 0 => {
            HttpResponse::NotFound().json(json!({ "error": "quiz not found" }))
        }
        Ok(_) => HttpResponse::Ok().json(json!({ "deleted": true })),
        Err(e) => {
            log::error!("admin delete quiz error: {e}");
            HttpResponse::InternalServerError().finish()
        }
    }
}
