// src/api/payments.rs

use actix_web::web::ReqData;
use actix_web::{get, post, put, web, HttpResponse, Responder};
use rand::Rng;
use serde::Deserialize;
use serde_json::json;
use sqlx::PgPool;
use utoipa::ToSchema;

use crate::models::{Payment, PaymentStatus};
use crate::{db, notify, AppState};

pub const ANNUAL_DUES_TITLE: &str = "Annual Dues";
pub const ANNUAL_DUES_AMOUNT: &str = "1000";
pub const DEFAULT_APPROVAL_MESSAGE: &str = "Your payment has been approved.";

/// Receipt-code collision retries before giving up and letting the unique
/// index arbitrate.
const RECEIPT_CODE_ATTEMPTS: u32 = 5;

/// Human-shareable payment identifier: `PAY-<epoch-millis>-<8 hex chars>`.
pub fn generate_reference() -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    let bytes: [u8; 4] = rand::thread_rng().gen();
    format!("PAY-{}-{}", millis, hex::encode(bytes))
}

/// 3 random bytes rendered as 6 uppercase hex characters.
pub fn receipt_code_candidate() -> String {
    let bytes: [u8; 3] = rand::thread_rng().gen();
    hex::encode(bytes).to_uppercase()
}

/// Collision-checks candidates against stored receipt codes, a bounded
/// number of times. On exhaustion the last candidate is returned anyway;
/// the unique index on `receipt_code` is the final arbiter.
async fn generate_receipt_code(pool: &PgPool) -> Result<String, sqlx::Error> {
    let mut code = receipt_code_candidate();
    for _ in 0..RECEIPT_CODE_ATTEMPTS {
        let exists = sqlx::query("SELECT 1 AS one FROM payments WHERE receipt_code = $1")
            .bind(&code)
            .fetch_optional(pool)
            .await?
            .is_some();
        if !exists {
            return Ok(code);
        }
        code = receipt_code_candidate();
    }
    Ok(code)
}

#[derive(Debug)]
pub enum TransitionError {
    Invalid { from: String, to: String },
    Db(sqlx::Error),
}

impl From<sqlx::Error> for TransitionError {
    fn from(value: sqlx::Error) -> Self {
        Self::Db(value)
    }
}

/// Applies a status transition to a payment: checks the transition table,
/// performs the primary write, then runs the side-effect groups. Each side
/// effect is isolated; a notification or cart-clear failure is logged and
/// never fails the transition itself.
pub async fn apply_status_transition(
    state: &AppState,
    payment: &Payment,
    next: PaymentStatus,
    approval_message: Option<&str>,
    verified_by: Option<i32>,
) -> Result<Payment, TransitionError> {
    let current = PaymentStatus::parse(&payment.status).ok_or_else(|| {
        TransitionError::Invalid {
            from: payment.status.clone(),
            to: next.as_str().to_string(),
        }
    })?;

    if !current.can_transition(next) {
        return Err(TransitionError::Invalid {
            from: current.as_str().to_string(),
            to: next.as_str().to_string(),
        });
    }

    let updated = if next == PaymentStatus::Confirmed {
        let receipt_code = generate_receipt_code(&state.pool).await?;
        let sql = format!(
            "UPDATE payments
             SET status = $1, verified_at = NOW(), verified_by = $2,
                 receipt_code = $3, updated_at = NOW()
             WHERE id = $4
             RETURNING {}",
            db::PAYMENT_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(next.as_str())
            .bind(verified_by)
            .bind(&receipt_code)
            .bind(payment.id)
            .fetch_one(&state.pool)
            .await?;
        db::map_payment_row(&row)
    } else {
        let sql = format!(
            "UPDATE payments
             SET status = $1, updated_at = NOW()
             WHERE id = $2
             RETURNING {}",
            db::PAYMENT_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(next.as_str())
            .bind(payment.id)
            .fetch_one(&state.pool)
            .await?;
        db::map_payment_row(&row)
    };

    run_transition_side_effects(state, &updated, next, approval_message).await;

    Ok(updated)
}

async fn run_transition_side_effects(
    state: &AppState,
    payment: &Payment,
    next: PaymentStatus,
    approval_message: Option<&str>,
) {
    let metadata = json!({
        "payment_id": payment.id,
        "reference": payment.reference,
    });

    if next == PaymentStatus::Submitted {
        notify::notify_admins(
            state,
            notify::TYPE_PAYMENT,
            "Payment proof submitted",
            &format!(
                "Payment {} ({}) is awaiting verification.",
                payment.reference, payment.title
            ),
            metadata.clone(),
        )
        .await;
    }

    if matches!(next, PaymentStatus::Confirmed | PaymentStatus::Completed) {
        let message = approval_message.unwrap_or(DEFAULT_APPROVAL_MESSAGE);
        let mut approval_metadata = metadata.clone();
        if let Some(obj) = approval_metadata.as_object_mut() {
            obj.insert("approval_message".into(), json!(message));
            if let Some(code) = &payment.receipt_code {
                obj.insert("receipt_code".into(), json!(code));
            }
        }
        if let Err(e) = notify::dispatch(
            state,
            payment.user_id,
            notify::TYPE_PAYMENT_APPROVAL,
            "Payment approved",
            message,
            approval_metadata,
            Some(&format!("<p>{}</p>", message)),
        )
        .await
        {
            log::error!(
                "payment approval notification failed payment_id={} err={}",
                payment.id,
                e
            );
        }
    }

    if next == PaymentStatus::Completed {
        if let Err(e) = db::clear_cart(&state.pool, payment.user_id).await {
            log::error!(
                "cart clear after completion failed user_id={} err={}",
                payment.user_id,
                e
            );
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/payment/create",
    tag = "payments",
    responses(
        (status = 200, description = "Pending payment created", body = Payment),
        (status = 400, description = "Cart is empty")
    )
)]
#[post("/payment/create")]
pub async fn create_payment(
    state: web::Data<AppState>,
    user_id: ReqData<i32>,
) -> impl Responder {
    let user_id = *user_id;

    let cart = match db::load_cart(&state.pool, user_id).await {
        Ok(c) => c,
        Err(e) => {
            log::error!("create_payment cart load error: {e}");
            return HttpResponse::InternalServerError().finish();
        }
    };

    if cart.items.is_empty() {
        return HttpResponse::BadRequest().json(json!({ "error": "Cart is empty" }));
    }

    let title = cart
        .items
        .iter()
        .map(|i| i.title.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    let product_ids: Vec<i32> = cart.items.iter().map(|i| i.product_id).collect();
    let reference = generate_reference();

    let sql = format!(
        "INSERT INTO payments (user_id, title, description, amount, status, reference, product_ids)
         VALUES ($1, $2, $3, $4::numeric, 'pending', $5, $6)
         RETURNING {}",
        db::PAYMENT_COLUMNS
    );
    let row = match sqlx::query(&sql)
        .bind(user_id)
        .bind(&title)
        .bind("Store checkout")
        .bind(&cart.total)
        .bind(&reference)
        .bind(&product_ids)
        .fetch_one(&state.pool)
        .await
    {
        Ok(r) => r,
        Err(e) => {
            if let Some(field) = db::duplicate_key_field(&e) {
                return HttpResponse::Conflict().json(json!({
                    "error": format!("{field} already exists"),
                    "field": field
                }));
            }
            log::error!("create_payment insert error: {e}");
            return HttpResponse::InternalServerError().finish();
        }
    };

    HttpResponse::Ok().json(json!({ "payment": db::map_payment_row(&row) }))
}

/// Idempotent per user: an existing pending/submitted dues payment is
/// returned instead of creating a duplicate.
#[post("/payment/annual-dues")]
pub async fn create_annual_dues(
    state: web::Data<AppState>,
    user_id: ReqData<i32>,
) -> impl Responder {
    let user_id = *user_id;

    let existing_sql = format!(
        "SELECT {} FROM payments
         WHERE user_id = $1 AND title = $2 AND status IN ('pending', 'submitted')
         ORDER BY created_at DESC
         LIMIT 1",
        db::PAYMENT_COLUMNS
    );
    match sqlx::query(&existing_sql)
        .bind(user_id)
        .bind(ANNUAL_DUES_TITLE)
        .fetch_optional(&state.pool)
        .await
    {
        Ok(Some(row)) => {
            return HttpResponse::Ok().json(json!({
                "payment": db::map_payment_row(&row),
                "existing": true
            }));
        }
        Ok(None) => {}
        Err(e) => {
            log::error!("annual dues lookup error: {e}");
            return HttpResponse::InternalServerError().finish();
        }
    }

    let reference = generate_reference();
    let sql = format!(
        "INSERT INTO payments (user_id, title, description, amount, status, reference)
         VALUES ($1, $2, $3, $4::numeric, 'pending', $5)
         RETURNING {}",
        db::PAYMENT_COLUMNS
    );
    let row = match sqlx::query(&sql)
        .bind(user_id)
        .bind(ANNUAL_DUES_TITLE)
        .bind("Annual membership dues")
        .bind(ANNUAL_DUES_AMOUNT)
        .bind(&reference)
        .fetch_one(&state.pool)
        .await
    {
        Ok(r) => r,
        Err(e) => {
            log::error!("annual dues insert error: {e}");
            return HttpResponse::InternalServerError().finish();
        }
    };

    HttpResponse::Ok().json(json!({ "payment": db::map_payment_row(&row) }))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SubmitProofRequest {
    pub proof_image: String,
}

/// Attaches a base64 bank-transfer proof to a pending payment and moves it
/// to `submitted`. Cart clearing and the admin fan-out are best-effort.
#[post("/payment/{id}/proof")]
pub async fn submit_proof(
    state: web::Data<AppState>,
    user_id: ReqData<i32>,
    path: web::Path<i32>,
    payload: web::Json<SubmitProofRequest>,
) -> impl Responder {
    let user_id = *user_id;
    let payment_id = path.into_inner();

    if payload.proof_image.trim().is_empty() {
        return HttpResponse::BadRequest().json(json!({ "error": "proof_image is required" }));
    }

    let payment = match db::get_payment(&state.pool, payment_id).await {
        Ok(Some(p)) => p,
        Ok(None) => return HttpResponse::NotFound().json(json!({ "error": "payment not found" })),
        Err(e) => {
            log::error!("submit_proof lookup error: {e}");
            return HttpResponse::InternalServerError().finish();
        }
    };

    if payment.user_id != user_id {
        return HttpResponse::NotFound().json(json!({ "error": "payment not found" }));
    }

    if payment.status != PaymentStatus::Pending.as_str() {
        return HttpResponse::BadRequest().json(json!({
            "error": format!("payment is {}, proof requires pending", payment.status)
        }));
    }

    let sql = format!(
        "UPDATE payments
         SET proof_image = $1, status = 'submitted', updated_at = NOW()
         WHERE id = $2
         RETURNING {}",
        db::PAYMENT_COLUMNS
    );
    let updated = match sqlx::query(&sql)
        .bind(&payload.proof_image)
        .bind(payment_id)
        .fetch_one(&state.pool)
        .await
    {
        Ok(r) => db::map_payment_row(&r),
        Err(e) => {
            log::error!("submit_proof update error: {e}");
            return HttpResponse::InternalServerError().finish();
        }
    };

    if let Err(e) = db::clear_cart(&state.pool, user_id).await {
        log::error!("cart clear after proof failed user_id={} err={}", user_id, e);
    }

    notify::notify_admins(
        &state,
        notify::TYPE_PAYMENT,
        "Payment proof submitted",
        &format!(
            "Payment {} ({}) is awaiting verification.",
            updated.reference, updated.title
        ),
        json!({ "payment_id": updated.id, "reference": updated.reference }),
    )
    .await;

    HttpResponse::Ok().json(json!({ "payment": updated }))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct WebhookRequest {
    pub reference: String,
    pub status: String,
    #[serde(rename = "approvalMessage")]
    pub approval_message: Option<String>,
}

#[utoipa::path(
    post,
    path = "/api/payment/webhook",
    tag = "payments",
    request_body = WebhookRequest,
    responses(
        (status = 200, description = "Transition applied", body = Payment),
        (status = 400, description = "Unknown status or disallowed transition"),
        (status = 404, description = "Unknown reference")
    )
)]
#[post("/api/payment/webhook")]
pub async fn payment_webhook(
    state: web::Data<AppState>,
    payload: web::Json<WebhookRequest>,
) -> impl Responder {
    let Some(next) = PaymentStatus::parse(&payload.status) else {
        return HttpResponse::BadRequest().json(json!({
            "error": format!("unknown status '{}'", payload.status)
        }));
    };

    let payment = match db::get_payment_by_reference(&state.pool, &payload.reference).await {
        Ok(Some(p)) => p,
        Ok(None) => return HttpResponse::NotFound().json(json!({ "error": "payment not found" })),
        Err(e) => {
            log::error!("webhook lookup error: {e}");
            return HttpResponse::InternalServerError().finish();
        }
    };

    match apply_status_transition(
        &state,
        &payment,
        next,
        payload.approval_message.as_deref(),
        None,
    )
    .await
    {
        Ok(updated) => HttpResponse::Ok().json(json!({ "payment": updated })),
        Err(TransitionError::Invalid { from, to }) => HttpResponse::BadRequest().json(json!({
            "error": format!("cannot transition from {from} to {to}")
        })),
        Err(TransitionError::Db(e)) => {
            if let Some(field) = db::duplicate_key_field(&e) {
                return HttpResponse::Conflict().json(json!({
                    "error": format!("{field} already exists"),
                    "field": field
                }));
            }
            log::error!("webhook transition error: {e}");
            HttpResponse::InternalServerError().finish()
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    /// Comma-separated status filter, e.g. `?status=pending,submitted`.
    pub status: Option<String>,
}

#[get("/payment/history")]
pub async fn payment_history(
    state: web::Data<AppState>,
    user_id: ReqData<i32>,
    query: web::Query<HistoryQuery>,
) -> impl Responder {
    let user_id = *user_id;

    let statuses: Vec<String> = query
        .status
        .as_deref()
        .unwrap_or_default()
        .split(',')
        .filter_map(|s| PaymentStatus::parse(s.trim()))
        .map(|s| s.as_str().to_string())
        .collect();

    let rows = if statuses.is_empty() {
        let sql = format!(
            "SELECT {} FROM payments WHERE user_id = $1 ORDER BY created_at DESC",
            db::PAYMENT_COLUMNS
        );
        sqlx::query(&sql).bind(user_id).fetch_all(&state.pool).await
    } else {
        let sql = format!(
            "SELECT {} FROM payments
             WHERE user_id = $1 AND status = ANY($2)
             ORDER BY created_at DESC",
            db::PAYMENT_COLUMNS
        );
        sqlx::query(&sql)
            .bind(user_id)
            .bind(&statuses)
            .fetch_all(&state.pool)
            .await
    };

    match rows {
        Ok(rows) => {
            let payments: Vec<Payment> = rows.iter().map(db::map_payment_row).collect();
            HttpResponse::Ok().json(json!({ "payments": payments }))
        }
        Err(e) => {
            log::error!("payment history error: {e}");
            HttpResponse::InternalServerError().finish()
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AdminListQuery {
    pub status: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[get("/payments")]
pub async fn admin_list_payments(
    state: web::Data<AppState>,
    query: web::Query<AdminListQuery>,
) -> impl Responder {
    let limit = query.limit.unwrap_or(50).clamp(1, 200);
    let offset = (query.page.unwrap_or(1).max(1) - 1) * limit;

    let status = query
        .status
        .as_deref()
        .and_then(PaymentStatus::parse)
        .map(|s| s.as_str().to_string());

    let rows = match status {
        Some(status) => {
            let sql = format!(
                "SELECT {} FROM payments WHERE status = $1
                 ORDER BY created_at DESC LIMIT $2 OFFSET $3",
                db::PAYMENT_COLUMNS
            );
            sqlx::query(&sql)
                .bind(status)
                .bind(limit)
                .bind(offset)
                .fetch_all(&state.pool)
                .await
        }
        None => {
            let sql = format!(
                "SELECT {} FROM payments ORDER BY created_at DESC LIMIT $1 OFFSET $2",
                db::PAYMENT_COLUMNS
            );
            sqlx::query(&sql)
                .bind(limit)
                .bind(offset)
                .fetch_all(&state.pool)
                .await
        }
    };

    match rows {
        Ok(rows) => {
            let payments: Vec<Payment> = rows.iter().map(db::map_payment_row).collect();
            HttpResponse::Ok().json(json!({ "payments": payments }))
        }
        Err(e) => {
            log::error!("admin payment list error: {e}");
            HttpResponse::InternalServerError().finish()
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
    #[serde(rename = "approvalMessage")]
    pub approval_message: Option<String>,
    pub admin_notes: Option<String>,
}

#[put("/payments/{id}/status")]
pub async fn admin_update_status(
    state: web::Data<AppState>,
    admin_id: ReqData<i32>,
    path: web::Path<i32>,
    payload: web::Json<UpdateStatusRequest>,
) -> impl Responder {
    let payment_id = path.into_inner();

    let Some(next) = PaymentStatus::parse(&payload.status) else {
        return HttpResponse::BadRequest().json(json!({
            "error": format!("unknown status '{}'", payload.status)
        }));
    };

    let payment = match db::get_payment(&state.pool, payment_id).await {
        Ok(Some(p)) => p,
        Ok(None) => return HttpResponse::NotFound().json(json!({ "error": "payment not found" })),
        Err(e) => {
            log::error!("admin status lookup error: {e}");
            return HttpResponse::InternalServerError().finish();
        }
    };

    if let Some(notes) = payload.admin_notes.as_deref() {
        if let Err(e) = sqlx::query("UPDATE payments SET admin_notes = $1 WHERE id = $2")
            .bind(notes)
            .bind(payment_id)
            .execute(&state.pool)
            .await
        {
            log::error!("admin notes update error: {e}");
        }
    }

    match apply_status_transition(
        &state,
        &payment,
        next,
        payload.approval_message.as_deref(),
        Some(*admin_id),
    )
    .await
    {
        Ok(updated) => HttpResponse::Ok().json(json!({ "payment": updated })),
        Err(TransitionError::Invalid { from, to }) => HttpResponse::BadRequest().json(json!({
            "error": format!("cannot transition from {from} to {to}")
        })),
        Err(TransitionError::Db(e)) => {
            if let Some(field) = db::duplicate_key_field(&e) {
                return HttpResponse::Conflict().json(json!({
                    "error": format!("{field} already exists"),
                    "field": field
                }));
            }
            log::error!("admin transition error: {e}");
            HttpResponse::InternalServerError().finish()
        }
    }
}
