use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::api::auth::register,
        crate::api::auth::login,
        crate::api::payments::create_payment,
        crate::api::payments::payment_webhook
    ),
    components(
        schemas(
            crate::api::auth::RegisterRequest,
            crate::api::auth::LoginRequest,
            crate::api::auth::AuthResponse,
            crate::api::payments::SubmitProofRequest,
            crate::api::payments::WebhookRequest,
            crate::models::Payment,
            crate::models::PaymentStatus,
            crate::models::QuizQuestion
        )
    ),
    tags(
        (name = "auth", description = "Authentication"),
        (name = "payments", description = "Checkout and payment verification")
    )
)]
pub struct ApiDoc;
