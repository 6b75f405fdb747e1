use crate::{
    error::{AppError, Result},
    models::notification::*,
    services::store::NotificationStore,
};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// 通知服务
///
/// 通知只作为里程碑迁移或提醒任务的副作用产生，之后只允许已读状态变化。
#[derive(Clone)]
pub struct NotificationService {
    store: Arc<dyn NotificationStore>,
}

impl NotificationService {
    pub fn new(store: Arc<dyn NotificationStore>) -> Self {
        Self { store }
    }

    pub async fn create_notification(&self, request: CreateNotificationRequest) -> Result<Notification> {
        let notification = Notification {
            id: Uuid::new_v4().to_string(),
            recipient_id: request.recipient_id,
            milestone_id: request.milestone_id,
            kind: request.notification_type,
            title: request.title,
            message: request.message,
            is_read: false,
            read_at: None,
            created_at: Utc::now(),
        };

        let created = self.store.insert_notification(notification).await?;
        debug!(
            "Notification {} ({:?}) created for {}",
            created.id, created.kind, created.recipient_id
        );
        Ok(created)
    }

    /// 尽力而为：失败只记录日志，不影响触发它的里程碑写入
    pub async fn emit(
        &self,
        recipient_id: &str,
        milestone_id: Option<&str>,
        notification_type: NotificationType,
        message: String,
    ) -> Option<Notification> {
        let request = CreateNotificationRequest {
            recipient_id: recipient_id.to_string(),
            milestone_id: milestone_id.map(str::to_string),
            notification_type,
            title: notification_type.default_title().to_string(),
            message,
        };

        match self.create_notification(request).await {
            Ok(notification) => Some(notification),
            Err(e) => {
                warn!(
                    "Failed to send {:?} notification to {}: {}",
                    notification_type, recipient_id, e
                );
                None
            }
        }
    }

    pub async fn get_user_notifications(&self, user_id: &str, unread_only: bool) -> Result<Vec<Notification>> {
        self.store.list_notifications(user_id, unread_only).await
    }

    pub async fn unread_count(&self, user_id: &str) -> Result<u64> {
        self.store.count_unread_notifications(user_id).await
    }

    /// 幂等；不属于调用方的通知按不存在处理
    pub async fn mark_as_read(&self, user_id: &str, notification_id: &str) -> Result<Notification> {
        let existing = self
            .store
            .get_notification(notification_id)
            .await?
            .filter(|notification| notification.recipient_id == user_id)
            .ok_or_else(|| AppError::not_found("Notification"))?;

        if existing.is_read {
            return Ok(existing);
        }

        self.store
            .mark_notification_read(notification_id, Utc::now())
            .await?
            .ok_or_else(|| AppError::not_found("Notification"))
    }

    pub async fn mark_all_as_read(&self, user_id: &str) -> Result<u64> {
        let marked = self
            .store
            .mark_all_notifications_read(user_id, Utc::now())
            .await?;

        info!("Marked {} notifications as read for {}", marked, user_id);
        Ok(marked)
    }
}
