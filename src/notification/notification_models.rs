use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Recurrence rule of a scheduled notification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Repeat {
    #[default]
    None,
    Daily,
    Weekly,
}

impl Repeat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Repeat::None => "none",
            Repeat::Daily => "daily",
            Repeat::Weekly => "weekly",
        }
    }
}

impl std::fmt::Display for Repeat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Repeat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Repeat::None),
            "daily" => Ok(Repeat::Daily),
            "weekly" => Ok(Repeat::Weekly),
            other => Err(format!("unknown repeat rule '{}'", other)),
        }
    }
}

impl TryFrom<String> for Repeat {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// One occurrence of a scheduled push notification.
///
/// `sent` only ever moves from `false` to `true`; the flip is the claim that
/// guards against double delivery.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Notification {
    pub id: i64,
    pub owner_id: Option<Uuid>,
    pub title: String,
    pub body: String,
    pub scheduled_time: DateTime<Utc>,
    #[sqlx(try_from = "String")]
    pub repeat: Repeat,
    pub sent: bool,
    pub created_at: DateTime<Utc>,
}

/// Fields supplied when inserting a notification row.
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub owner_id: Option<Uuid>,
    pub title: String,
    pub body: String,
    pub scheduled_time: DateTime<Utc>,
    pub repeat: Repeat,
}

impl NewNotification {
    /// The next occurrence of `previous`, due at `scheduled_time`.
    pub fn next_of(previous: &Notification, scheduled_time: DateTime<Utc>) -> Self {
        Self {
            owner_id: previous.owner_id,
            title: previous.title.clone(),
            body: previous.body.clone(),
            scheduled_time,
            repeat: previous.repeat,
        }
    }
}

/// Result of the atomic sent-flag claim.
#[derive(Debug, Clone)]
pub enum ClaimOutcome {
    /// This caller flipped `sent`; `next` is the chained occurrence, if any.
    Claimed {
        notification: Notification,
        next: Option<Notification>,
    },
    AlreadySent,
    NotFound,
}
