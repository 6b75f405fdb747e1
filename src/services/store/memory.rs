use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use dashmap::DashMap;
use std::sync::Arc;

use super::{MilestoneStore, NotificationStore, StudentStore};
use crate::error::{AppError, Result};
use crate::models::{
    milestone::{Milestone, MilestoneStatus},
    notification::Notification,
    student::Student,
};

/// 进程内存储
///
/// 每条记录的修改都在 DashMap 分片锁内完成，单记录写入是原子的。
#[derive(Clone, Default)]
pub struct MemoryStorage {
    milestones: Arc<DashMap<String, Milestone>>,
    students: Arc<DashMap<String, Student>>,
    notifications: Arc<DashMap<String, Notification>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MilestoneStore for MemoryStorage {
    async fn create_milestone(&self, milestone: Milestone) -> Result<Milestone> {
        if !self.students.contains_key(&milestone.student_id) {
            return Err(AppError::NotFound(format!(
                "Student {} not found",
                milestone.student_id
            )));
        }

        milestone.check_invariants()?;

        match self.milestones.entry(milestone.id.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(AppError::Conflict(format!(
                "Milestone {} already exists",
                milestone.id
            ))),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(milestone.clone());
                Ok(milestone)
            }
        }
    }

    async fn get_milestone(&self, id: &str) -> Result<Option<Milestone>> {
        Ok(self.milestones.get(id).map(|entry| entry.value().clone()))
    }

    async fn list_milestones_by_student(&self, student_id: &str) -> Result<Vec<Milestone>> {
        let mut milestones: Vec<Milestone> = self
            .milestones
            .iter()
            .filter(|entry| entry.student_id == student_id)
            .map(|entry| entry.value().clone())
            .collect();

        milestones.sort_by(|a, b| a.due_date.cmp(&b.due_date).then_with(|| a.created_at.cmp(&b.created_at)));
        Ok(milestones)
    }

    async fn list_milestones_by_status(
        &self,
        status: MilestoneStatus,
        student_ids: &[String],
    ) -> Result<Vec<Milestone>> {
        let mut milestones: Vec<Milestone> = self
            .milestones
            .iter()
            .filter(|entry| entry.status == status && student_ids.contains(&entry.student_id))
            .map(|entry| entry.value().clone())
            .collect();

        milestones.sort_by(|a, b| a.due_date.cmp(&b.due_date).then_with(|| a.created_at.cmp(&b.created_at)));
        Ok(milestones)
    }

    async fn list_milestones_with_reminder_between(
        &self,
        from: NaiveDate,
        until: NaiveDate,
    ) -> Result<Vec<Milestone>> {
        let mut milestones: Vec<Milestone> = self
            .milestones
            .iter()
            .filter(|entry| matches!(entry.reminder_date, Some(date) if date >= from && date < until))
            .map(|entry| entry.value().clone())
            .collect();

        milestones.sort_by(|a, b| a.reminder_date.cmp(&b.reminder_date));
        Ok(milestones)
    }

    async fn update_milestone(&self, mut milestone: Milestone, expected_version: u64) -> Result<Milestone> {
        milestone.check_invariants()?;

        let mut current = self
            .milestones
            .get_mut(&milestone.id)
            .ok_or_else(|| AppError::NotFound(format!("Milestone {} not found", milestone.id)))?;

        if current.version != expected_version {
            return Err(AppError::Conflict(format!(
                "Milestone {} was modified concurrently (expected version {}, found {})",
                milestone.id, expected_version, current.version
            )));
        }

        milestone.student_id = current.student_id.clone();
        milestone.reminder_sent_for = current.reminder_sent_for;
        milestone.version = expected_version + 1;
        *current = milestone.clone();

        Ok(milestone)
    }

    async fn claim_reminder(&self, id: &str, reminder_date: NaiveDate) -> Result<bool> {
        let Some(mut current) = self.milestones.get_mut(id) else {
            return Ok(false);
        };

        if current.reminder_date != Some(reminder_date) || current.reminder_sent_for == Some(reminder_date) {
            return Ok(false);
        }

        current.reminder_sent_for = Some(reminder_date);
        Ok(true)
    }

    async fn delete_milestone(&self, id: &str) -> Result<Milestone> {
        self.milestones
            .remove(id)
            .map(|(_, milestone)| milestone)
            .ok_or_else(|| AppError::NotFound(format!("Milestone {} not found", id)))
    }
}

#[async_trait]
impl NotificationStore for MemoryStorage {
    async fn insert_notification(&self, notification: Notification) -> Result<Notification> {
        self.notifications
            .insert(notification.id.clone(), notification.clone());
        Ok(notification)
    }

    async fn get_notification(&self, id: &str) -> Result<Option<Notification>> {
        Ok(self.notifications.get(id).map(|entry| entry.value().clone()))
    }

    async fn list_notifications(&self, recipient_id: &str, unread_only: bool) -> Result<Vec<Notification>> {
        let mut notifications: Vec<Notification> = self
            .notifications
            .iter()
            .filter(|entry| entry.recipient_id == recipient_id && (!unread_only || !entry.is_read))
            .map(|entry| entry.value().clone())
            .collect();

        notifications.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(notifications)
    }

    async fn mark_notification_read(&self, id: &str, at: DateTime<Utc>) -> Result<Option<Notification>> {
        let Some(mut notification) = self.notifications.get_mut(id) else {
            return Ok(None);
        };

        if !notification.is_read {
            notification.is_read = true;
            notification.read_at = Some(at);
        }

        Ok(Some(notification.clone()))
    }

    async fn mark_all_notifications_read(&self, recipient_id: &str, at: DateTime<Utc>) -> Result<u64> {
        let mut marked = 0;

        for mut entry in self.notifications.iter_mut() {
            if entry.recipient_id == recipient_id && !entry.is_read {
                entry.is_read = true;
                entry.read_at = Some(at);
                marked += 1;
            }
        }

        Ok(marked)
    }

    async fn count_unread_notifications(&self, recipient_id: &str) -> Result<u64> {
        Ok(self
            .notifications
            .iter()
            .filter(|entry| entry.recipient_id == recipient_id && !entry.is_read)
            .count() as u64)
    }
}

#[async_trait]
impl StudentStore for MemoryStorage {
    async fn get_student(&self, id: &str) -> Result<Option<Student>> {
        Ok(self.students.get(id).map(|entry| entry.value().clone()))
    }

    async fn list_students_by_advisor(&self, advisor_id: &str) -> Result<Vec<Student>> {
        let mut students: Vec<Student> = self
            .students
            .iter()
            .filter(|entry| entry.is_advised_by(advisor_id))
            .map(|entry| entry.value().clone())
            .collect();

        students.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(students)
    }

    async fn upsert_student(&self, student: Student) -> Result<Student> {
        let stored = match self.students.get(&student.id) {
            Some(existing) => Student {
                created_at: existing.created_at,
                ..student
            },
            None => student,
        };

        self.students.insert(stored.id.clone(), stored.clone());
        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn student(id: &str, advisor: Option<&str>) -> Student {
        let now = Utc::now();
        Student {
            id: id.to_string(),
            name: format!("Student {}", id),
            email: None,
            advisor_id: advisor.map(str::to_string),
            created_at: now,
            updated_at: now,
        }
    }

    fn milestone(id: &str, student_id: &str, due: (i32, u32, u32)) -> Milestone {
        let now = Utc::now();
        Milestone {
            id: id.to_string(),
            student_id: student_id.to_string(),
            title: format!("Milestone {}", id),
            description: "description".to_string(),
            status: MilestoneStatus::Planned,
            is_major: false,
            due_date: NaiveDate::from_ymd_opt(due.0, due.1, due.2).unwrap(),
            reminder_date: None,
            reminder_sent_for: None,
            feedback: None,
            verified: false,
            verified_by: None,
            verified_at: None,
            last_reviewed_by: None,
            last_reviewed_at: None,
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_create_requires_existing_student() {
        let storage = MemoryStorage::new();
        let result = storage.create_milestone(milestone("m1", "ghost", (2025, 6, 1))).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_list_by_student_sorted_by_due_date() {
        let storage = MemoryStorage::new();
        storage.upsert_student(student("s1", None)).await.unwrap();
        storage.upsert_student(student("s2", None)).await.unwrap();

        storage.create_milestone(milestone("late", "s1", (2025, 9, 1))).await.unwrap();
        storage.create_milestone(milestone("early", "s1", (2025, 3, 1))).await.unwrap();
        storage.create_milestone(milestone("other", "s2", (2025, 1, 1))).await.unwrap();

        let listed = storage.list_milestones_by_student("s1").await.unwrap();
        let ids: Vec<&str> = listed.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["early", "late"]);
    }

    #[tokio::test]
    async fn test_list_by_status_restricted_to_students() {
        let storage = MemoryStorage::new();
        storage.upsert_student(student("s1", None)).await.unwrap();
        storage.upsert_student(student("s2", None)).await.unwrap();

        let mut pending = milestone("m1", "s1", (2025, 6, 1));
        pending.status = MilestoneStatus::PendingApproval;
        storage.create_milestone(pending).await.unwrap();

        let mut other = milestone("m2", "s2", (2025, 6, 1));
        other.status = MilestoneStatus::PendingApproval;
        storage.create_milestone(other).await.unwrap();

        storage.create_milestone(milestone("m3", "s1", (2025, 6, 1))).await.unwrap();

        let listed = storage
            .list_milestones_by_status(MilestoneStatus::PendingApproval, &["s1".to_string()])
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, "m1");
    }

    #[tokio::test]
    async fn test_update_checks_version() {
        let storage = MemoryStorage::new();
        storage.upsert_student(student("s1", None)).await.unwrap();
        let created = storage.create_milestone(milestone("m1", "s1", (2025, 6, 1))).await.unwrap();

        let mut edit = created.clone();
        edit.title = "Renamed".to_string();
        let updated = storage.update_milestone(edit, 1).await.unwrap();
        assert_eq!(updated.version, 2);

        let mut stale = created.clone();
        stale.title = "Stale".to_string();
        let result = storage.update_milestone(stale, 1).await;
        assert!(matches!(result, Err(AppError::Conflict(_))));

        let stored = storage.get_milestone("m1").await.unwrap().unwrap();
        assert_eq!(stored.title, "Renamed");
    }

    #[tokio::test]
    async fn test_update_rejects_verified_without_completed() {
        let storage = MemoryStorage::new();
        storage.upsert_student(student("s1", None)).await.unwrap();
        let created = storage.create_milestone(milestone("m1", "s1", (2025, 6, 1))).await.unwrap();

        let mut bad = created.clone();
        bad.verified = true;
        bad.verified_by = Some("a1".to_string());
        bad.verified_at = Some(Utc::now());
        let result = storage.update_milestone(bad, 1).await;
        assert!(matches!(result, Err(AppError::InvalidState(_))));
    }

    #[tokio::test]
    async fn test_claim_reminder_once_per_date() {
        let storage = MemoryStorage::new();
        storage.upsert_student(student("s1", None)).await.unwrap();
        let date = NaiveDate::from_ymd_opt(2025, 5, 25).unwrap();
        let mut with_reminder = milestone("m1", "s1", (2025, 6, 1));
        with_reminder.reminder_date = Some(date);
        storage.create_milestone(with_reminder).await.unwrap();

        assert!(storage.claim_reminder("m1", date).await.unwrap());
        assert!(!storage.claim_reminder("m1", date).await.unwrap());

        let other_day = NaiveDate::from_ymd_opt(2025, 5, 26).unwrap();
        assert!(!storage.claim_reminder("m1", other_day).await.unwrap());
        assert!(!storage.claim_reminder("missing", date).await.unwrap());
    }

    #[tokio::test]
    async fn test_update_preserves_reminder_claim() {
        let storage = MemoryStorage::new();
        storage.upsert_student(student("s1", None)).await.unwrap();
        let date = NaiveDate::from_ymd_opt(2025, 5, 25).unwrap();
        let mut with_reminder = milestone("m1", "s1", (2025, 6, 1));
        with_reminder.reminder_date = Some(date);
        let created = storage.create_milestone(with_reminder).await.unwrap();

        assert!(storage.claim_reminder("m1", date).await.unwrap());

        let mut edit = created.clone();
        edit.description = "edited after the reminder went out".to_string();
        let updated = storage.update_milestone(edit, created.version).await.unwrap();
        assert_eq!(updated.reminder_sent_for, Some(date));
    }

    #[tokio::test]
    async fn test_delete_missing_is_not_found() {
        let storage = MemoryStorage::new();
        let result = storage.delete_milestone("missing").await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_upsert_student_keeps_created_at() {
        let storage = MemoryStorage::new();
        let first = storage.upsert_student(student("s1", None)).await.unwrap();

        let mut reassigned = student("s1", Some("a1"));
        reassigned.created_at = Utc::now() + chrono::Duration::days(1);
        let stored = storage.upsert_student(reassigned).await.unwrap();

        assert_eq!(stored.created_at, first.created_at);
        assert!(stored.is_advised_by("a1"));
        assert_eq!(storage.list_students_by_advisor("a1").await.unwrap().len(), 1);
    }
}
