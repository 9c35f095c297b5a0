use actix_web::{web, App, HttpResponse, HttpServer, Responder};
use dotenvy::dotenv;
use sqlx::PgPool;
use std::env;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use ifumsa_backend::{api, docs, AppState};

async fn index() -> impl Responder {
    HttpResponse::Ok().body("Service ready!")
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    env_logger::Builder::from_default_env()
        .format_timestamp_millis()
        .init();

    let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = PgPool::connect(&database_url)
        .await
        .expect("Failed to connect to DB");

    sqlx::migrate!()
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    let jwt_secret = env::var("JWT_SECRET").expect("JWT_SECRET required");
    let admin_emails: Vec<String> = env::var("ADMIN_EMAILS")
        .unwrap_or_default()
        .split(',')
        .map(|e| e.trim().to_lowercase())
        .filter(|e| !e.is_empty())
        .collect();
    if admin_emails.is_empty() {
        log::warn!("ADMIN_EMAILS is empty; only stored admin roles grant admin access");
    }

    let mail_api_key = env::var("MAIL_API_KEY").unwrap_or_default();
    if mail_api_key.is_empty() {
        log::warn!("MAIL_API_KEY not set; notification emails will fail and be logged");
    }
    let mail_from =
        env::var("MAIL_FROM").unwrap_or_else(|_| "IFUMSA <noreply@ifumsa.org>".to_string());
    let ai_api_key = env::var("AI_API_KEY").expect("AI_API_KEY required");

    let state = web::Data::new(AppState {
        pool,
        admin_emails,
        mail_api_key,
        mail_from,
        ai_api_key,
        jwt_secret,
    });

    let port: u16 = env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);

    log::info!("starting on 0.0.0.0:{port}");

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .route("/", web::get().to(index))
            .service(
                SwaggerUi::new("/docs/{_:.*}")
                    .url("/api-docs/openapi.json", docs::ApiDoc::openapi()),
            )
            // Public routes
            .service(api::auth::register)
            .service(api::auth::login)
            .service(api::payments::payment_webhook)
            .service(api::study::get_shared_quiz)
            .service(api::content::list_announcements)
            .service(api::content::list_events)
            // Authenticated routes
            .service(
                web::scope("/api")
                    .wrap(api::auth::JwtMiddleware)
                    .service(
                        web::scope("/admin")
                            .wrap(api::auth::AdminGuard)
                            .service(api::payments::admin_list_payments)
                            .service(api::payments::admin_update_status)
                            .service(api::products::admin_create_product)
                            .service(api::products::admin_update_product)
                            .service(api::products::admin_delete_product)
                            .service(api::quizzes::admin_create_quiz)
                            .service(api::quizzes::admin_update_quiz)
                            .service(api::quizzes::admin_delete_quiz)
                            .service(api::content::admin_create_announcement)
                            .service(api::content::admin_update_announcement)
                            .service(api::content::admin_delete_announcement)
                            .service(api::content::admin_create_event)
                            .service(api::content::admin_update_event)
                            .service(api::content::admin_delete_event),
                    )
                    .service(api::users::get_me)
                    .service(api::users::update_me)
                    .service(api::products::list_products)
                    .service(api::products::get_product)
                    .service(api::cart::get_cart)
                    .service(api::cart::add_item)
                    .service(api::cart::update_item)
                    .service(api::cart::remove_item)
                    .service(api::cart::clear_cart)
                    .service(api::payments::create_payment)
                    .service(api::payments::create_annual_dues)
                    .service(api::payments::submit_proof)
                    .service(api::payments::payment_history)
                    // `/quiz/attempts` must match before `/quiz/{id}`
                    .service(api::quizzes::list_attempts)
                    .service(api::quizzes::list_quizzes)
                    .service(api::quizzes::get_quiz)
                    .service(api::quizzes::submit_quiz)
                    .service(api::study::list_my_quizzes)
                    .service(api::study::create_my_quiz)
                    .service(api::study::get_my_quiz)
                    .service(api::study::update_my_quiz)
                    .service(api::study::delete_my_quiz)
                    .service(api::study::share_my_quiz)
                    .service(api::study::save_shared_quiz)
                    .service(api::study::generate_questions)
                    .service(api::notifications::list_notifications)
                    .service(api::notifications::mark_all_read)
                    .service(api::notifications::mark_read)
                    .service(api::notifications::delete_notification)
                    .service(api::cards::list_cards)
                    .service(api::cards::add_card)
                    .service(api::cards::set_default_card)
                    .service(api::cards::delete_card),
            )
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await
}
