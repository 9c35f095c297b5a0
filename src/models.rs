// src/models.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Payment lifecycle. Transitions are checked against an explicit table:
/// forward movement plus `rejected` from any non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Submitted,
    Confirmed,
    Completed,
    Rejected,
}

impl PaymentStatus {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "submitted" => Some(Self::Submitted),
            "confirmed" => Some(Self::Confirmed),
            "completed" => Some(Self::Completed),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Submitted => "submitted",
            Self::Confirmed => "confirmed",
            Self::Completed => "completed",
            Self::Rejected => "rejected",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Rejected)
    }

    pub fn can_transition(&self, next: PaymentStatus) -> bool {
        match self {
            Self::Pending => matches!(
                next,
                Self::Submitted | Self::Confirmed | Self::Rejected
            ),
            Self::Submitted => matches!(
                next,
                Self::Confirmed | Self::Completed | Self::Rejected
            ),
            Self::Confirmed => matches!(next, Self::Completed | Self::Rejected),
            Self::Completed | Self::Rejected => false,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UserProfile {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: String,
    pub bio: Option<String>,
    pub profile_picture: Option<String>,
    pub onboarding_complete: bool,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct Product {
    pub id: i32,
    pub title: String,
    pub description: Option<String>,
    pub price: String,
    pub image: Option<String>,
    pub category: String,
    pub author: Option<String>,
    pub stock: i32,
    pub is_available: bool,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct CartItem {
    pub product_id: i32,
    pub title: String,
    pub quantity: i32,
    pub price: String,
}

#[derive(Debug, Serialize)]
pub struct Cart {
    pub id: i32,
    pub user_id: i32,
    pub items: Vec<CartItem>,
    pub total: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Payment {
    pub id: i32,
    pub user_id: i32,
    pub title: String,
    pub description: Option<String>,
    pub amount: String,
    pub status: String,
    pub reference: String,
    pub product_ids: Option<Vec<i32>>,
    pub verified_by: Option<i32>,
    pub verified_at: Option<DateTime<Utc>>,
    pub receipt_code: Option<String>,
    pub admin_notes: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct Notification {
    pub id: i32,
    pub recipient_id: i32,
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub message: String,
    pub is_read: bool,
    pub metadata: serde_json::Value,
    pub created_at: Option<DateTime<Utc>>,
}

/// One quiz question as stored in the `questions` jsonb column.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct QuizQuestion {
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: usize,
    #[serde(default)]
    pub explanation: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct QuizSummary {
    pub id: i32,
    pub title: String,
    pub description: Option<String>,
    pub category: String,
    pub duration_minutes: i32,
    pub question_count: usize,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct Card {
    pub id: i32,
    pub card_type: String,
    pub last4: String,
    pub expiry_month: i32,
    pub expiry_year: i32,
    pub is_default: bool,
}

#[derive(Debug, Serialize)]
pub struct Announcement {
    pub id: i32,
    pub title: String,
    pub body: String,
    pub is_active: bool,
    pub display_order: i32,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct Event {
    pub id: i32,
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub is_active: bool,
}
