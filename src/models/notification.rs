use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub recipient_id: String,
    /// 弱引用，里程碑删除后仍保留
    pub milestone_id: Option<String>,
    pub kind: NotificationType,
    pub title: String,
    pub message: String,
    pub is_read: bool,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateNotificationRequest {
    pub recipient_id: String,
    pub milestone_id: Option<String>,
    pub notification_type: NotificationType,
    pub title: String,
    pub message: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum NotificationType {
    MilestoneCreated,
    MilestoneUpdated,
    MilestoneDeleted,
    MilestoneReminder,
}

impl NotificationType {
    pub fn default_title(&self) -> &'static str {
        match self {
            Self::MilestoneCreated => "New Milestone Created",
            Self::MilestoneUpdated => "Milestone Updated",
            Self::MilestoneDeleted => "Milestone Deleted",
            Self::MilestoneReminder => "Milestone Reminder",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationQuery {
    pub unread_only: Option<bool>,
}
