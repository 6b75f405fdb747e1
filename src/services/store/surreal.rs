use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

use super::{MilestoneStore, NotificationStore, StudentStore};
use crate::error::{AppError, Result};
use crate::models::{
    milestone::{Milestone, MilestoneStatus},
    notification::Notification,
    student::Student,
};
use crate::services::Database;

/// 统一把记录 ID 还原为纯字符串
const MILESTONE_FIELDS: &str = "SELECT *, meta::id(id) AS id FROM milestone";
const NOTIFICATION_FIELDS: &str = "SELECT *, meta::id(id) AS id FROM notification";
const STUDENT_FIELDS: &str = "SELECT *, meta::id(id) AS id FROM student";

/// SurrealDB 存储
#[derive(Clone)]
pub struct SurrealStorage {
    db: Arc<Database>,
}

impl SurrealStorage {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// 序列化为记录内容，去掉 id 及调用方指定的字段
    fn content<T: Serialize>(record: &T, skip: &[&str]) -> Result<Value> {
        let mut value = serde_json::to_value(record)?;
        if let Some(object) = value.as_object_mut() {
            object.remove("id");
            for field in skip {
                object.remove(*field);
            }
        }
        Ok(value)
    }

    async fn fetch<T: DeserializeOwned>(&self, sql: &str, params: Value) -> Result<Vec<T>> {
        let mut response = self.db.query_with_params(sql, params).await?;
        let rows: Vec<Value> = response.take(0)?;

        rows.into_iter()
            .map(|row| serde_json::from_value(row).map_err(AppError::from))
            .collect()
    }

    async fn fetch_one<T: DeserializeOwned>(&self, sql: &str, params: Value) -> Result<Option<T>> {
        Ok(self.fetch(sql, params).await?.into_iter().next())
    }
}

#[async_trait]
impl MilestoneStore for SurrealStorage {
    async fn create_milestone(&self, milestone: Milestone) -> Result<Milestone> {
        if self.get_student(&milestone.student_id).await?.is_none() {
            return Err(AppError::NotFound(format!(
                "Student {} not found",
                milestone.student_id
            )));
        }

        milestone.check_invariants()?;

        let content = Self::content(&milestone, &[])?;
        self.db
            .query_with_params(
                "CREATE type::thing('milestone', $id) CONTENT $content RETURN NONE",
                json!({ "id": milestone.id, "content": content }),
            )
            .await?;

        debug!("Created milestone record {}", milestone.id);
        Ok(milestone)
    }

    async fn get_milestone(&self, id: &str) -> Result<Option<Milestone>> {
        let sql = format!("{} WHERE id = type::thing('milestone', $id)", MILESTONE_FIELDS);
        self.fetch_one(&sql, json!({ "id": id })).await
    }

    async fn list_milestones_by_student(&self, student_id: &str) -> Result<Vec<Milestone>> {
        let sql = format!(
            "{} WHERE studentId = $student_id ORDER BY dueDate ASC, createdAt ASC",
            MILESTONE_FIELDS
        );
        self.fetch(&sql, json!({ "student_id": student_id })).await
    }

    async fn list_milestones_by_status(
        &self,
        status: MilestoneStatus,
        student_ids: &[String],
    ) -> Result<Vec<Milestone>> {
        if student_ids.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            "{} WHERE status = $status AND studentId INSIDE $student_ids ORDER BY dueDate ASC, createdAt ASC",
            MILESTONE_FIELDS
        );
        self.fetch(
            &sql,
            json!({ "status": status.to_string(), "student_ids": student_ids }),
        )
        .await
    }

    async fn list_milestones_with_reminder_between(
        &self,
        from: NaiveDate,
        until: NaiveDate,
    ) -> Result<Vec<Milestone>> {
        // 日期以 ISO-8601 字符串存储，字典序即时间序
        let sql = format!(
            "{} WHERE reminderDate >= $from AND reminderDate < $until ORDER BY reminderDate ASC",
            MILESTONE_FIELDS
        );
        self.fetch(&sql, json!({ "from": from, "until": until })).await
    }

    async fn update_milestone(&self, milestone: Milestone, expected_version: u64) -> Result<Milestone> {
        milestone.check_invariants()?;

        let mut next = milestone;
        next.version = expected_version + 1;
        let content = Self::content(&next, &["studentId", "reminderSentFor"])?;

        let mut response = self
            .db
            .query_with_params(
                "UPDATE type::thing('milestone', $id) MERGE $content WHERE version = $expected RETURN meta::id(id) AS id",
                json!({ "id": next.id, "content": content, "expected": expected_version }),
            )
            .await?;
        let updated: Vec<Value> = response.take(0)?;

        if updated.is_empty() {
            return match self.get_milestone(&next.id).await? {
                Some(current) => Err(AppError::Conflict(format!(
                    "Milestone {} was modified concurrently (expected version {}, found {})",
                    next.id, expected_version, current.version
                ))),
                None => Err(AppError::NotFound(format!("Milestone {} not found", next.id))),
            };
        }

        self.get_milestone(&next.id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Milestone {} not found", next.id)))
    }

    async fn claim_reminder(&self, id: &str, reminder_date: NaiveDate) -> Result<bool> {
        let mut response = self
            .db
            .query_with_params(
                r#"
                    UPDATE type::thing('milestone', $id)
                    SET reminderSentFor = $date
                    WHERE reminderDate = $date AND reminderSentFor != $date
                    RETURN meta::id(id) AS id
                "#,
                json!({ "id": id, "date": reminder_date }),
            )
            .await?;
        let claimed: Vec<Value> = response.take(0)?;
        Ok(!claimed.is_empty())
    }

    async fn delete_milestone(&self, id: &str) -> Result<Milestone> {
        let existing = self
            .get_milestone(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Milestone {} not found", id)))?;

        self.db
            .query_with_params(
                "DELETE type::thing('milestone', $id)",
                json!({ "id": id }),
            )
            .await?;

        Ok(existing)
    }
}

#[async_trait]
impl NotificationStore for SurrealStorage {
    async fn insert_notification(&self, notification: Notification) -> Result<Notification> {
        let content = Self::content(&notification, &[])?;
        self.db
            .query_with_params(
                "CREATE type::thing('notification', $id) CONTENT $content RETURN NONE",
                json!({ "id": notification.id, "content": content }),
            )
            .await?;
        Ok(notification)
    }

    async fn get_notification(&self, id: &str) -> Result<Option<Notification>> {
        let sql = format!("{} WHERE id = type::thing('notification', $id)", NOTIFICATION_FIELDS);
        self.fetch_one(&sql, json!({ "id": id })).await
    }

    async fn list_notifications(&self, recipient_id: &str, unread_only: bool) -> Result<Vec<Notification>> {
        let filter = if unread_only { " AND isRead = false" } else { "" };
        let sql = format!(
            "{} WHERE recipientId = $recipient_id{} ORDER BY createdAt DESC",
            NOTIFICATION_FIELDS, filter
        );
        self.fetch(&sql, json!({ "recipient_id": recipient_id })).await
    }

    async fn mark_notification_read(&self, id: &str, at: DateTime<Utc>) -> Result<Option<Notification>> {
        self.db
            .query_with_params(
                "UPDATE type::thing('notification', $id) SET isRead = true, readAt = $at WHERE isRead = false RETURN NONE",
                json!({ "id": id, "at": at }),
            )
            .await?;

        self.get_notification(id).await
    }

    async fn mark_all_notifications_read(&self, recipient_id: &str, at: DateTime<Utc>) -> Result<u64> {
        let mut response = self
            .db
            .query_with_params(
                "UPDATE notification SET isRead = true, readAt = $at WHERE recipientId = $recipient_id AND isRead = false RETURN meta::id(id) AS id",
                json!({ "recipient_id": recipient_id, "at": at }),
            )
            .await?;
        let marked: Vec<Value> = response.take(0)?;
        Ok(marked.len() as u64)
    }

    async fn count_unread_notifications(&self, recipient_id: &str) -> Result<u64> {
        let mut response = self
            .db
            .query_with_params(
                "SELECT count() AS count FROM notification WHERE recipientId = $recipient_id AND isRead = false GROUP ALL",
                json!({ "recipient_id": recipient_id }),
            )
            .await?;
        let rows: Vec<Value> = response.take(0)?;

        Ok(rows
            .first()
            .and_then(|row| row.get("count"))
            .and_then(Value::as_u64)
            .unwrap_or(0))
    }
}

#[async_trait]
impl StudentStore for SurrealStorage {
    async fn get_student(&self, id: &str) -> Result<Option<Student>> {
        let sql = format!("{} WHERE id = type::thing('student', $id)", STUDENT_FIELDS);
        self.fetch_one(&sql, json!({ "id": id })).await
    }

    async fn list_students_by_advisor(&self, advisor_id: &str) -> Result<Vec<Student>> {
        let sql = format!("{} WHERE advisorId = $advisor_id ORDER BY name ASC", STUDENT_FIELDS);
        self.fetch(&sql, json!({ "advisor_id": advisor_id })).await
    }

    async fn upsert_student(&self, student: Student) -> Result<Student> {
        let stored = match self.get_student(&student.id).await? {
            Some(existing) => Student {
                created_at: existing.created_at,
                ..student
            },
            None => student,
        };

        let content = Self::content(&stored, &[])?;
        self.db
            .query_with_params(
                "UPDATE type::thing('student', $id) CONTENT $content RETURN NONE",
                json!({ "id": stored.id, "content": content }),
            )
            .await?;

        Ok(stored)
    }
}
