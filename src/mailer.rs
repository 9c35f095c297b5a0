// Thin client for the HTTP mail-delivery API.
// Delivery is best-effort everywhere: callers log failures and move on.

use serde::Serialize;
use serde_json::Value;
use std::fmt;

const MAIL_API_BASE: &str = "https://api.resend.com";

#[derive(Debug)]
pub enum MailError {
    Http(reqwest::Error),
    Api { status: u16, body: String },
}

impl fmt::Display for MailError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MailError::Http(e) => write!(f, "http error: {e}"),
            MailError::Api { status, body } => {
                write!(f, "mail api error status={status} body={body}")
            }
        }
    }
}

impl From<reqwest::Error> for MailError {
    fn from(value: reqwest::Error) -> Self {
        Self::Http(value)
    }
}

#[derive(Debug, Serialize)]
struct SendEmailRequest<'a> {
    from: &'a str,
    to: Vec<&'a str>,
    subject: &'a str,
    html: &'a str,
}

fn base_url() -> String {
    std::env::var("MAIL_API_BASE_URL").unwrap_or_else(|_| MAIL_API_BASE.to_string())
}

pub async fn send_email(
    api_key: &str,
    from: &str,
    to: &str,
    subject: &str,
    html: &str,
) -> Result<(), MailError> {
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/emails", base_url()))
        .header("Authorization", format!("Bearer {}", api_key))
        .json(&SendEmailRequest {
            from,
            to: vec![to],
            subject,
            html,
        })
        .send()
        .await?;

    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(MailError::Api {
            status: status.as_u16(),
            body,
        });
    }

    // Response body is advisory; drain it so connection reuse works.
    let _ = resp.json::<Value>().await;
    Ok(())
}
