use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::timestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Application,
    Appointment,
    Payment,
    Message,
    System,
}

impl NotificationKind {
    pub const ALL: [NotificationKind; 5] = [
        NotificationKind::Application,
        NotificationKind::Appointment,
        NotificationKind::Payment,
        NotificationKind::Message,
        NotificationKind::System,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            NotificationKind::Application => "application",
            NotificationKind::Appointment => "appointment",
            NotificationKind::Payment => "payment",
            NotificationKind::Message => "message",
            NotificationKind::System => "system",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            NotificationKind::Application => "Applications",
            NotificationKind::Appointment => "Appointments",
            NotificationKind::Payment => "Payments",
            NotificationKind::Message => "Messages",
            NotificationKind::System => "System",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub read: bool,
    #[serde(default, with = "timestamp::option")]
    pub created_at: Option<OffsetDateTime>,
}
