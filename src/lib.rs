pub mod ai_client;
pub mod api;
pub mod db;
pub mod docs;
pub mod mailer;
pub mod models;
pub mod notify;
pub mod quota;

use sqlx::PgPool;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    /// Lowercased emails granted admin access regardless of stored role.
    pub admin_emails: Vec<String>,
    pub mail_api_key: String,
    pub mail_from: String,
    pub ai_api_key: String,
    pub jwt_secret: String,
}

/// Case-insensitive membership check against the configured admin list.
pub fn email_is_listed(list: &[String], email: &str) -> bool {
    let email = email.trim().to_lowercase();
    list.iter().any(|e| e == &email)
}

impl AppState {
    pub fn is_admin_email(&self, email: &str) -> bool {
        email_is_listed(&self.admin_emails, email)
    }
}
