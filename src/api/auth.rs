// src/api/auth.rs

use actix_web::body::MessageBody;
use actix_web::dev::{Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::{post, web, Error, HttpMessage, HttpResponse, Responder};
use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::{Duration, Utc};
use futures_util::future::{ready, LocalBoxFuture, Ready};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sqlx::Row;
use std::task::{Context, Poll};
use utoipa::ToSchema;

use crate::{db, AppState};

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: i32,
    exp: usize,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    pub token: String,
    pub user_id: i32,
}

#[utoipa::path(
    post,
    path = "/auth/register",
    tag = "auth",
    request_body = RegisterRequest,
    responses(
        (status = 200, description = "Account created", body = AuthResponse),
        (status = 400, description = "Invalid input"),
        (status = 409, description = "Email or username already taken")
    )
)]
#[post("/auth/register")]
pub async fn register(
    state: web::Data<AppState>,
    payload: web::Json<RegisterRequest>,
) -> impl Responder {
    let username = payload.username.trim();
    let email = payload.email.trim().to_lowercase();

    if username.is_empty() || !email.contains('@') || payload.password.len() < 8 {
        return HttpResponse::BadRequest().json(serde_json::json!({
            "error": "username, valid email and a password of at least 8 characters are required"
        }));
    }

    let password_hash = match hash(&payload.password, DEFAULT_COST) {
        Ok(h) => h,
        Err(e) => {
            log::error!("bcrypt hash error: {e}");
            return HttpResponse::InternalServerError().finish();
        }
    };

    let row = match sqlx::query(
        r#"INSERT INTO users (username, email, password_hash, first_name, last_name)
           VALUES ($1, $2, $3, $4, $5)
           RETURNING id"#,
    )
    .bind(username)
    .bind(&email)
    .bind(password_hash)
    .bind(payload.first_name.as_deref())
    .bind(payload.last_name.as_deref())
    .fetch_one(&state.pool)
    .await
    {
        Ok(r) => r,
        Err(e) => {
            if let Some(field) = db::duplicate_key_field(&e) {
                return HttpResponse::Conflict().json(serde_json::json!({
                    "error": format!("{field} already exists"),
                    "field": field
                }));
            }
            log::error!("register db error: {e}");
            return HttpResponse::InternalServerError().finish();
        }
    };

    let user_id: i32 = row.get("id");

    let token = match generate_jwt(&state.jwt_secret, user_id) {
        Ok(t) => t,
        Err(e) => {
            log::error!("jwt encode error: {e}");
            return HttpResponse::InternalServerError().finish();
        }
    };

    HttpResponse::Ok().json(AuthResponse { token, user_id })
}

#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = AuthResponse),
        (status = 401, description = "Invalid credentials")
    )
)]
#[post("/auth/login")]
pub async fn login(state: web::Data<AppState>, payload: web::Json<LoginRequest>) -> impl Responder {
    let email = payload.email.trim().to_lowercase();

    let row = match sqlx::query(r#"SELECT id, password_hash FROM users WHERE email = $1"#)
        .bind(&email)
        .fetch_optional(&state.pool)
        .await
    {
        Ok(r) => r,
        Err(e) => {
            log::error!("login db error: {e}");
            return HttpResponse::InternalServerError().finish();
        }
    };

    let Some(row) = row else {
        return HttpResponse::Unauthorized().json(serde_json::json!({
            "error": "invalid credentials"
        }));
    };

    let user_id: i32 = row.get("id");
    let password_hash: String = row.get("password_hash");

    match verify(&payload.password, &password_hash) {
        Ok(true) => {}
        Ok(false) => {
            return HttpResponse::Unauthorized().json(serde_json::json!({
                "error": "invalid credentials"
            }));
        }
        Err(e) => {
            log::error!("bcrypt verify error: {e}");
            return HttpResponse::InternalServerError().finish();
        }
    };

    let token = match generate_jwt(&state.jwt_secret, user_id) {
        Ok(t) => t,
        Err(e) => {
            log::error!("jwt encode error: {e}");
            return HttpResponse::InternalServerError().finish();
        }
    };

    HttpResponse::Ok().json(AuthResponse { token, user_id })
}

fn generate_jwt(secret: &str, user_id: i32) -> Result<String, jsonwebtoken::errors::Error> {
    let expiration = Utc::now()
        .checked_add_signed(Duration::days(30))
        .expect("valid timestamp")
        .timestamp() as usize;

    let claims = Claims {
        sub: user_id,
        exp: expiration,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_ref()),
    )
}

/// Middleware that validates `Authorization: Bearer <jwt>` and stores the
/// authenticated `i32` user id in the request extensions.
pub struct JwtMiddleware;

impl<S, B> Transform<S, ServiceRequest> for JwtMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = JwtMiddlewareInner<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(JwtMiddlewareInner { service }))
    }
}

pub struct JwtMiddlewareInner<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for JwtMiddlewareInner<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&self, mut req: ServiceRequest) -> Self::Future {
        let secret = match req.app_data::<web::Data<AppState>>() {
            Some(state) => state.jwt_secret.clone(),
            None => {
                return Box::pin(async move {
                    Err(actix_web::error::ErrorInternalServerError(
                        "application state missing",
                    ))
                })
            }
        };

        let auth_header = req
            .headers()
            .get(actix_web::http::header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .unwrap_or("");

        if let Some(token) = auth_header.strip_prefix("Bearer ") {
            match decode::<Claims>(
                token,
                &DecodingKey::from_secret(secret.as_ref()),
                &Validation::default(),
            ) {
                Ok(token_data) => {
                    req.extensions_mut().insert(token_data.claims.sub);
                    let fut = self.service.call(req);
                    return Box::pin(async move { fut.await });
                }
                Err(_) => {
                    return Box::pin(async move {
                        Err(actix_web::error::ErrorUnauthorized("Invalid token"))
                    })
                }
            }
        }

        Box::pin(async move {
            Err(actix_web::error::ErrorUnauthorized(
                "Missing or invalid Authorization header",
            ))
        })
    }
}

/// Middleware for `/api/admin`: the caller must either hold the `admin` role
/// or have an email on the configured admin list. Runs after `JwtMiddleware`.
pub struct AdminGuard;

impl<S, B> Transform<S, ServiceRequest> for AdminGuard
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = AdminGuardInner<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AdminGuardInner {
            service: std::rc::Rc::new(service),
        }))
    }
}

pub struct AdminGuardInner<S> {
    service: std::rc::Rc<S>,
}

impl<S, B> Service<ServiceRequest> for AdminGuardInner<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let state = match req.app_data::<web::Data<AppState>>() {
            Some(state) => state.clone(),
            None => {
                return Box::pin(async move {
                    Err(actix_web::error::ErrorInternalServerError(
                        "application state missing",
                    ))
                })
            }
        };

        let user_id = req.extensions().get::<i32>().copied();
        let service = self.service.clone();

        Box::pin(async move {
            let Some(user_id) = user_id else {
                return Err(actix_web::error::ErrorUnauthorized("Not authenticated"));
            };

            let row = sqlx::query("SELECT role, email FROM users WHERE id = $1")
                .bind(user_id)
                .fetch_optional(&state.pool)
                .await
                .map_err(|e| {
                    log::error!("admin guard lookup error: {e}");
                    actix_web::error::ErrorInternalServerError("lookup failed")
                })?;

            let Some(row) = row else {
                return Err(actix_web::error::ErrorUnauthorized("Unknown user"));
            };

            let role: String = row.get("role");
            let email: String = row.get("email");

            if role != "admin" && !state.is_admin_email(&email) {
                return Err(actix_web::error::ErrorForbidden("Admin access required"));
            }

            service.call(req).await
        })
    }
}
