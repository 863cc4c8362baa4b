use super::party::AccountId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

record_id!(
    /// Identity of an outbox entry.
    NotificationId
);

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum NotificationCategory {
    Info,
    Request,
    Booking,
    Dispute,
    Payment,
}

impl NotificationCategory {
    pub const fn label(self) -> &'static str {
        match self {
            NotificationCategory::Info => "info",
            NotificationCategory::Request => "request",
            NotificationCategory::Booking => "booking",
            NotificationCategory::Dispute => "dispute",
            NotificationCategory::Payment => "payment",
        }
    }
}

/// What the orchestrator wants said, before it has an outbox id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub receiver: AccountId,
    pub title: String,
    pub message: String,
    pub category: NotificationCategory,
}

impl Notice {
    pub fn new(
        receiver: AccountId,
        title: impl Into<String>,
        message: impl Into<String>,
        category: NotificationCategory,
    ) -> Self {
        Self {
            receiver,
            title: title.into(),
            message: message.into(),
            category,
        }
    }
}

/// An outbox entry, written in the same commit as the state change that caused it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationIntent {
    pub id: NotificationId,
    pub receiver: AccountId,
    pub title: String,
    pub message: String,
    pub category: NotificationCategory,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub attempts: u32,
    #[serde(default)]
    pub delivery: DeliveryState,
}

impl NotificationIntent {
    pub fn from_notice(id: NotificationId, notice: Notice, now: DateTime<Utc>) -> Self {
        Self {
            id,
            receiver: notice.receiver,
            title: notice.title,
            message: notice.message,
            category: notice.category,
            created_at: now,
            attempts: 0,
            delivery: DeliveryState::Pending,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Default)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum DeliveryState {
    #[default]
    Pending,
    Delivered { at: DateTime<Utc> },
    Abandoned { at: DateTime<Utc>, last_error: String },
}

impl DeliveryState {
    /// When the intent stopped being retried, if it has.
    pub fn settled_at(&self) -> Option<DateTime<Utc>> {
        match self {
            DeliveryState::Pending => None,
            DeliveryState::Delivered { at } | DeliveryState::Abandoned { at, .. } => Some(*at),
        }
    }
}

/// Result of one delivery attempt, reported back to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    Failed { error: String },
    Abandoned { error: String },
}
