//! 持久化抽象
//!
//! 工作流引擎、通知服务与提醒任务只依赖这里的 trait，
//! 具体实现有进程内存储（开发与测试）和 SurrealDB 两种。

pub mod memory;
pub mod surreal;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use crate::error::Result;
use crate::models::{
    milestone::{Milestone, MilestoneStatus},
    notification::Notification,
    student::Student,
};

pub use memory::MemoryStorage;
pub use surreal::SurrealStorage;

#[async_trait]
pub trait MilestoneStore: Send + Sync {
    /// 写入新记录；学生不存在时返回 `NotFound`
    async fn create_milestone(&self, milestone: Milestone) -> Result<Milestone>;

    async fn get_milestone(&self, id: &str) -> Result<Option<Milestone>>;

    /// 按 due_date 升序
    async fn list_milestones_by_student(&self, student_id: &str) -> Result<Vec<Milestone>>;

    /// 限定在给定学生集合内，按 due_date 升序
    async fn list_milestones_by_status(
        &self,
        status: MilestoneStatus,
        student_ids: &[String],
    ) -> Result<Vec<Milestone>>;

    /// reminder_date 落在 `[from, until)` 内的里程碑
    async fn list_milestones_with_reminder_between(
        &self,
        from: NaiveDate,
        until: NaiveDate,
    ) -> Result<Vec<Milestone>>;

    /// 整条替换，`expected_version` 不一致时返回 `Conflict`。
    /// reminder_sent_for 由提醒任务独占维护，这里保留存储中的值。
    async fn update_milestone(&self, milestone: Milestone, expected_version: u64) -> Result<Milestone>;

    /// 为 `(id, reminder_date)` 占用一次提醒；已发送过或日期已变化时返回 false
    async fn claim_reminder(&self, id: &str, reminder_date: NaiveDate) -> Result<bool>;

    /// 删除并返回删除前的记录
    async fn delete_milestone(&self, id: &str) -> Result<Milestone>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn insert_notification(&self, notification: Notification) -> Result<Notification>;

    async fn get_notification(&self, id: &str) -> Result<Option<Notification>>;

    /// 最新的在前
    async fn list_notifications(&self, recipient_id: &str, unread_only: bool) -> Result<Vec<Notification>>;

    /// 已读的记录保持原 read_at 不变
    async fn mark_notification_read(&self, id: &str, at: DateTime<Utc>) -> Result<Option<Notification>>;

    /// 返回本次被标记的条数
    async fn mark_all_notifications_read(&self, recipient_id: &str, at: DateTime<Utc>) -> Result<u64>;

    async fn count_unread_notifications(&self, recipient_id: &str) -> Result<u64>;
}

#[async_trait]
pub trait StudentStore: Send + Sync {
    async fn get_student(&self, id: &str) -> Result<Option<Student>>;

    async fn list_students_by_advisor(&self, advisor_id: &str) -> Result<Vec<Student>>;

    async fn upsert_student(&self, student: Student) -> Result<Student>;
}
