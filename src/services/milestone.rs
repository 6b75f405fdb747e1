//! 里程碑工作流引擎
//!
//! 所有对 `status` 的写入都经过这里的迁移检查：
//!
//! | 角色 | 允许的迁移 |
//! |------|-----------|
//! | 学生（本人） | Planned ↔ InProgress，Planned/InProgress → PendingApproval |
//! | 导师（已分配） | PendingApproval → Completed（批准/认证），PendingApproval → InProgress（要求修改） |
//! | 管理员 | 任意（行政更正，会清除失效的认证信息） |

use crate::{
    error::{AppError, Result},
    models::{milestone::*, notification::NotificationType, student::Student},
    services::{
        auth::{AuthUser, Role},
        store::{MilestoneStore, StudentStore},
        NotificationService,
    },
    utils::validation::normalize_text,
};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;
use validator::Validate;

#[derive(Clone)]
pub struct MilestoneService {
    milestones: Arc<dyn MilestoneStore>,
    students: Arc<dyn StudentStore>,
    notification_service: NotificationService,
}

impl MilestoneService {
    pub fn new(
        milestones: Arc<dyn MilestoneStore>,
        students: Arc<dyn StudentStore>,
        notification_service: NotificationService,
    ) -> Self {
        Self {
            milestones,
            students,
            notification_service,
        }
    }

    pub async fn create_milestone(&self, actor: &AuthUser, request: CreateMilestoneRequest) -> Result<Milestone> {
        debug!("Creating milestone for student {} by {}", request.student_id, actor.id);

        request.validate()?;

        let student = self.load_student(&request.student_id).await?;

        let may_create = match actor.role {
            Role::Student => actor.id == student.id,
            Role::Advisor => student.is_advised_by(&actor.id),
            Role::Admin => true,
        };
        if !may_create {
            return Err(AppError::forbidden("Not allowed to create milestones for this student"));
        }

        let status = request.status.unwrap_or_default();
        if status == MilestoneStatus::Completed && !actor.is_admin() {
            return Err(AppError::invalid_state(
                "Milestones can only be completed through advisor approval",
            ));
        }

        let now = Utc::now();
        let milestone = Milestone {
            id: Uuid::new_v4().to_string(),
            student_id: student.id.clone(),
            title: normalize_text(&request.title),
            description: normalize_text(&request.description),
            status,
            is_major: request.is_major.unwrap_or(false),
            due_date: request.due_date,
            reminder_date: request.reminder_date,
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
        };

        let created = self.milestones.create_milestone(milestone).await?;

        self.notification_service
            .emit(
                &created.student_id,
                Some(&created.id),
                NotificationType::MilestoneCreated,
                format!(
                    "Milestone \"{}\" has been created with due date {}.",
                    created.title, created.due_date
                ),
            )
            .await;

        info!("Milestone {} created for student {}", created.id, created.student_id);
        Ok(created)
    }

    pub async fn get_milestone(&self, actor: &AuthUser, milestone_id: &str) -> Result<Milestone> {
        let milestone = self.load(milestone_id).await?;
        let student = self.load_student(&milestone.student_id).await?;
        ensure_can_view(actor, &student)?;
        Ok(milestone)
    }

    pub async fn list_student_milestones(&self, actor: &AuthUser, student_id: &str) -> Result<Vec<Milestone>> {
        debug!("Listing milestones for student {} by {}", student_id, actor.id);

        let student = self.load_student(student_id).await?;
        ensure_can_view(actor, &student)?;
        self.milestones.list_milestones_by_student(student_id).await
    }

    pub async fn update_milestone(
        &self,
        actor: &AuthUser,
        milestone_id: &str,
        request: UpdateMilestoneRequest,
    ) -> Result<Milestone> {
        debug!("Updating milestone {} by {}", milestone_id, actor.id);

        request.validate()?;
        if request.is_empty() {
            return Err(AppError::validation("No fields to update"));
        }

        let mut milestone = self.load(milestone_id).await?;
        let expected_version = milestone.version;
        let previous_status = milestone.status;

        match actor.role {
            Role::Student if actor.id == milestone.student_id => {
                if !milestone.status.is_student_editable() {
                    return Err(AppError::InvalidState(format!(
                        "Milestone is {} and can no longer be edited",
                        milestone.status
                    )));
                }
                if let Some(next) = request.status {
                    if !milestone.status.student_can_move_to(next) {
                        return Err(AppError::InvalidState(format!(
                            "Cannot move milestone from {} to {}",
                            milestone.status, next
                        )));
                    }
                }
            }
            Role::Admin => {
                if let Some(next) = request.status {
                    if next != milestone.status {
                        warn!(
                            "Administrative status correction on milestone {}: {} -> {} by {}",
                            milestone.id, milestone.status, next, actor.id
                        );
                    }
                }
            }
            _ => return Err(AppError::forbidden("Only the owning student can update this milestone")),
        }

        let mut changes = Vec::new();

        if let Some(title) = request.title {
            milestone.title = normalize_text(&title);
            changes.push("title");
        }
        if let Some(description) = request.description {
            milestone.description = normalize_text(&description);
            changes.push("description");
        }
        if let Some(due_date) = request.due_date {
            milestone.due_date = due_date;
            changes.push("due date");
        }
        if let Some(is_major) = request.is_major {
            milestone.is_major = is_major;
            changes.push("major flag");
        }
        if let Some(reminder_date) = request.reminder_date {
            milestone.reminder_date = reminder_date;
            changes.push("reminder date");
        }
        if let Some(status) = request.status {
            milestone.status = status;
            if status != MilestoneStatus::Completed {
                milestone.clear_verification();
            }
        }

        milestone.updated_at = Utc::now();
        let updated = self.milestones.update_milestone(milestone, expected_version).await?;

        let message = if updated.status != previous_status {
            format!(
                "Milestone \"{}\" status changed from {} to {}.",
                updated.title, previous_status, updated.status
            )
        } else if changes.is_empty() {
            format!("Milestone \"{}\" has been updated.", updated.title)
        } else {
            format!("Milestone \"{}\" updated: {}.", updated.title, changes.join(", "))
        };

        self.notification_service
            .emit(
                &updated.student_id,
                Some(&updated.id),
                NotificationType::MilestoneUpdated,
                message,
            )
            .await;

        info!("Milestone {} updated to version {}", updated.id, updated.version);
        Ok(updated)
    }

    pub async fn delete_milestone(&self, actor: &AuthUser, milestone_id: &str) -> Result<()> {
        debug!("Deleting milestone {} by {}", milestone_id, actor.id);

        let milestone = self.load(milestone_id).await?;

        match actor.role {
            Role::Student if actor.id == milestone.student_id => {
                if !milestone.status.is_student_editable() {
                    return Err(AppError::InvalidState(format!(
                        "Milestone is {} and can no longer be deleted",
                        milestone.status
                    )));
                }
            }
            Role::Admin => {}
            _ => return Err(AppError::forbidden("Only the owning student can delete this milestone")),
        }

        let deleted = self.milestones.delete_milestone(milestone_id).await?;

        self.notification_service
            .emit(
                &deleted.student_id,
                Some(&deleted.id),
                NotificationType::MilestoneDeleted,
                format!("Milestone \"{}\" has been deleted.", deleted.title),
            )
            .await;

        info!("Milestone {} deleted", deleted.id);
        Ok(())
    }

    /// 导师留言，不改变状态
    pub async fn add_feedback(
        &self,
        advisor: &AuthUser,
        milestone_id: &str,
        request: FeedbackRequest,
    ) -> Result<Milestone> {
        request.validate()?;

        let mut milestone = self.load(milestone_id).await?;
        self.ensure_assigned_advisor(advisor, &milestone).await?;
        let expected_version = milestone.version;

        let now = Utc::now();
        milestone.feedback = Some(normalize_text(&request.feedback));
        milestone.record_review(&advisor.id, now);
        milestone.updated_at = now;

        let updated = self.milestones.update_milestone(milestone, expected_version).await?;
        info!("Advisor {} left feedback on milestone {}", advisor.id, updated.id);
        Ok(updated)
    }

    /// PendingApproval → Completed，并写入认证信息
    pub async fn approve_milestone(
        &self,
        advisor: &AuthUser,
        milestone_id: &str,
        request: ReviewRequest,
    ) -> Result<Milestone> {
        request.validate()?;

        let mut milestone = self.load(milestone_id).await?;
        self.ensure_assigned_advisor(advisor, &milestone).await?;
        ensure_pending(&milestone)?;
        let expected_version = milestone.version;

        let now = Utc::now();
        if let Some(feedback) = request.feedback {
            milestone.feedback = Some(normalize_text(&feedback));
        }
        milestone.mark_verified(&advisor.id, now);
        milestone.record_review(&advisor.id, now);
        milestone.updated_at = now;

        let updated = self.milestones.update_milestone(milestone, expected_version).await?;
        info!("Advisor {} approved milestone {}", advisor.id, updated.id);
        Ok(updated)
    }

    /// 认证即批准
    pub async fn verify_milestone(
        &self,
        advisor: &AuthUser,
        milestone_id: &str,
        request: ReviewRequest,
    ) -> Result<Milestone> {
        self.approve_milestone(advisor, milestone_id, request).await
    }

    /// PendingApproval → InProgress，并附带修改意见
    pub async fn request_changes(
        &self,
        advisor: &AuthUser,
        milestone_id: &str,
        request: FeedbackRequest,
    ) -> Result<Milestone> {
        request.validate()?;

        let mut milestone = self.load(milestone_id).await?;
        self.ensure_assigned_advisor(advisor, &milestone).await?;
        ensure_pending(&milestone)?;
        let expected_version = milestone.version;

        let now = Utc::now();
        milestone.status = MilestoneStatus::InProgress;
        milestone.feedback = Some(normalize_text(&request.feedback));
        milestone.record_review(&advisor.id, now);
        milestone.updated_at = now;

        let updated = self.milestones.update_milestone(milestone, expected_version).await?;
        info!("Advisor {} requested changes on milestone {}", advisor.id, updated.id);
        Ok(updated)
    }

    /// 导师名下所有学生待审核的里程碑
    pub async fn pending_milestones(&self, advisor: &AuthUser) -> Result<Vec<PendingMilestone>> {
        advisor.require_role(Role::Advisor)?;

        let students = self.students.list_students_by_advisor(&advisor.id).await?;
        let student_ids: Vec<String> = students.iter().map(|s| s.id.clone()).collect();
        let names: HashMap<String, String> = students
            .into_iter()
            .map(|s| (s.id, s.name))
            .collect();

        let pending = self
            .milestones
            .list_milestones_by_status(MilestoneStatus::PendingApproval, &student_ids)
            .await?;

        Ok(pending
            .into_iter()
            .map(|milestone| PendingMilestone {
                student_name: names.get(&milestone.student_id).cloned().unwrap_or_default(),
                milestone,
            })
            .collect())
    }

    async fn load(&self, milestone_id: &str) -> Result<Milestone> {
        self.milestones
            .get_milestone(milestone_id)
            .await?
            .ok_or_else(|| AppError::not_found("Milestone"))
    }

    async fn load_student(&self, student_id: &str) -> Result<Student> {
        self.students
            .get_student(student_id)
            .await?
            .ok_or_else(|| AppError::not_found("Student"))
    }

    async fn ensure_assigned_advisor(&self, actor: &AuthUser, milestone: &Milestone) -> Result<()> {
        actor.require_role(Role::Advisor)?;

        let student = self.load_student(&milestone.student_id).await?;
        if !student.is_advised_by(&actor.id) {
            warn!(
                "Advisor {} attempted to review milestone {} of unassigned student {}",
                actor.id, milestone.id, student.id
            );
            return Err(AppError::forbidden("You are not the assigned advisor for this student"));
        }

        Ok(())
    }
}

fn ensure_can_view(actor: &AuthUser, student: &Student) -> Result<()> {
    let allowed = match actor.role {
        Role::Student => actor.id == student.id,
        Role::Advisor => student.is_advised_by(&actor.id),
        Role::Admin => true,
    };

    if !allowed {
        return Err(AppError::forbidden("Not allowed to view this student's milestones"));
    }
    Ok(())
}

fn ensure_pending(milestone: &Milestone) -> Result<()> {
    if milestone.status != MilestoneStatus::PendingApproval {
        return Err(AppError::InvalidState(format!(
            "Milestone is {} and not awaiting approval",
            milestone.status
        )));
    }
    Ok(())
}
