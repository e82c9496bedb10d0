//! Card rows and their display helpers

pub mod share;

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A row of the `cards` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub user_id: Uuid,
    pub share_id: String,
}

/// Insert payload (id and created_at are assigned by the backend)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewCard {
    pub content: String,
    pub share_id: String,
    pub user_id: Uuid,
}

impl NewCard {
    /// Build a card from raw compose input. Returns None for blank input.
    pub fn from_input(text: &str, user_id: Uuid) -> Option<Self> {
        let content = text.trim();
        if content.is_empty() {
            return None;
        }

        Some(Self {
            content: content.to_string(),
            share_id: share::generate_share_id(),
            user_id,
        })
    }
}

/// Format a timestamp in local time, e.g. `Oct 19, 2026, 3:04:05 PM`
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    format_in(ts.with_timezone(&Local))
}

fn format_in<Tz: chrono::TimeZone>(ts: DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    ts.format("%b %-d, %Y, %-I:%M:%S %p").to_string()
}
