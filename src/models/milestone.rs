use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use validator::Validate;

use crate::error::{AppError, Result};
use crate::utils::{serde_helpers::nullable, validation::validate_not_blank};

/// 学业里程碑
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Milestone {
    pub id: String,
    /// 所属学生，创建后不可变
    pub student_id: String,
    pub title: String,
    pub description: String,
    pub status: MilestoneStatus,
    pub is_major: bool,
    pub due_date: NaiveDate,
    pub reminder_date: Option<NaiveDate>,
    /// 最近一次已发送提醒所对应的 reminder_date
    #[serde(default)]
    pub reminder_sent_for: Option<NaiveDate>,
    pub feedback: Option<String>,
    pub verified: bool,
    pub verified_by: Option<String>,
    pub verified_at: Option<DateTime<Utc>>,
    pub last_reviewed_by: Option<String>,
    pub last_reviewed_at: Option<DateTime<Utc>>,
    /// 乐观锁版本号，每次写入 +1
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum MilestoneStatus {
    Planned,
    #[serde(alias = "In Progress", alias = "in_progress")]
    InProgress,
    #[serde(alias = "Pending Approval", alias = "pending_approval")]
    PendingApproval,
    Completed,
}

impl Default for MilestoneStatus {
    fn default() -> Self {
        Self::Planned
    }
}

impl fmt::Display for MilestoneStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Planned => "Planned",
            Self::InProgress => "InProgress",
            Self::PendingApproval => "PendingApproval",
            Self::Completed => "Completed",
        };
        f.write_str(label)
    }
}

impl MilestoneStatus {
    pub const ALL: [MilestoneStatus; 4] = [
        Self::Planned,
        Self::InProgress,
        Self::PendingApproval,
        Self::Completed,
    ];

    /// 学生只能编辑尚未提交审核的里程碑
    pub fn is_student_editable(&self) -> bool {
        matches!(self, Self::Planned | Self::InProgress)
    }

    /// 学生通过普通更新可以进行的状态迁移
    pub fn student_can_move_to(&self, next: MilestoneStatus) -> bool {
        use MilestoneStatus::*;

        match (self, next) {
            (from, to) if *from == to => from.is_student_editable(),
            (Planned, InProgress) | (InProgress, Planned) => true,
            (Planned, PendingApproval) | (InProgress, PendingApproval) => true,
            _ => false,
        }
    }
}

impl Milestone {
    /// 检查记录级不变量：verified 蕴含 Completed，审核元数据成对出现
    pub fn check_invariants(&self) -> Result<()> {
        if self.verified && self.status != MilestoneStatus::Completed {
            return Err(AppError::InvalidState(format!(
                "Milestone {} cannot be verified while {}",
                self.id, self.status
            )));
        }

        if self.verified != (self.verified_by.is_some() && self.verified_at.is_some()) {
            return Err(AppError::InvalidState(format!(
                "Milestone {} has inconsistent verification metadata",
                self.id
            )));
        }

        if self.last_reviewed_by.is_some() != self.last_reviewed_at.is_some() {
            return Err(AppError::InvalidState(format!(
                "Milestone {} has inconsistent review metadata",
                self.id
            )));
        }

        Ok(())
    }

    pub fn record_review(&mut self, advisor_id: &str, at: DateTime<Utc>) {
        self.last_reviewed_by = Some(advisor_id.to_string());
        self.last_reviewed_at = Some(at);
    }

    pub fn mark_verified(&mut self, advisor_id: &str, at: DateTime<Utc>) {
        self.status = MilestoneStatus::Completed;
        self.verified = true;
        self.verified_by = Some(advisor_id.to_string());
        self.verified_at = Some(at);
    }

    pub fn clear_verification(&mut self) {
        self.verified = false;
        self.verified_by = None;
        self.verified_at = None;
    }

    /// 提醒是否已针对当前 reminder_date 发送过
    pub fn reminder_pending(&self) -> bool {
        match self.reminder_date {
            Some(date) => self.reminder_sent_for != Some(date),
            None => false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateMilestoneRequest {
    #[validate(length(max = 200), custom = "validate_not_blank")]
    pub title: String,

    #[validate(length(max = 5000), custom = "validate_not_blank")]
    pub description: String,

    pub due_date: NaiveDate,
    pub status: Option<MilestoneStatus>,
    pub is_major: Option<bool>,
    pub reminder_date: Option<NaiveDate>,

    #[validate(length(min = 1))]
    pub student_id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateMilestoneRequest {
    #[validate(length(max = 200), custom = "validate_not_blank")]
    pub title: Option<String>,

    #[validate(length(max = 5000), custom = "validate_not_blank")]
    pub description: Option<String>,

    pub due_date: Option<NaiveDate>,
    pub status: Option<MilestoneStatus>,
    pub is_major: Option<bool>,

    /// 缺省表示不修改，显式 null 表示清除
    #[serde(default, with = "nullable", skip_serializing_if = "Option::is_none")]
    pub reminder_date: Option<Option<NaiveDate>>,
}

impl UpdateMilestoneRequest {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.due_date.is_none()
            && self.status.is_none()
            && self.is_major.is_none()
            && self.reminder_date.is_none()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FeedbackRequest {
    #[validate(length(max = 5000), custom = "validate_not_blank")]
    pub feedback: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ReviewRequest {
    #[validate(length(max = 5000), custom = "validate_not_blank")]
    pub feedback: Option<String>,
}

/// 导师待审核队列条目
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingMilestone {
    #[serde(flatten)]
    pub milestone: Milestone,
    pub student_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample() -> Milestone {
        let now = Utc::now();
        Milestone {
            id: "m1".to_string(),
            student_id: "s1".to_string(),
            title: "Proposal Defense".to_string(),
            description: "Defend thesis proposal".to_string(),
            status: MilestoneStatus::Planned,
            is_major: false,
            due_date: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
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

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&MilestoneStatus::PendingApproval).unwrap();
        assert_eq!(json, "\"PendingApproval\"");

        let parsed: MilestoneStatus = serde_json::from_str("\"In Progress\"").unwrap();
        assert_eq!(parsed, MilestoneStatus::InProgress);

        assert!(serde_json::from_str::<MilestoneStatus>("\"Archived\"").is_err());
    }

    #[test]
    fn test_verified_requires_completed() {
        let mut milestone = sample();
        milestone.verified = true;
        milestone.verified_by = Some("a1".to_string());
        milestone.verified_at = Some(Utc::now());
        assert!(matches!(milestone.check_invariants(), Err(AppError::InvalidState(_))));

        milestone.status = MilestoneStatus::Completed;
        assert!(milestone.check_invariants().is_ok());
    }

    #[test]
    fn test_review_metadata_pairing() {
        let mut milestone = sample();
        milestone.last_reviewed_by = Some("a1".to_string());
        assert!(milestone.check_invariants().is_err());

        milestone.record_review("a1", Utc::now());
        assert!(milestone.check_invariants().is_ok());
    }

    #[test]
    fn test_reminder_pending() {
        let mut milestone = sample();
        assert!(!milestone.reminder_pending());

        let date = NaiveDate::from_ymd_opt(2025, 5, 25).unwrap();
        milestone.reminder_date = Some(date);
        assert!(milestone.reminder_pending());

        milestone.reminder_sent_for = Some(date);
        assert!(!milestone.reminder_pending());
    }

    #[test]
    fn test_update_request_null_reminder_clears() {
        let request: UpdateMilestoneRequest =
            serde_json::from_str(r#"{"reminderDate": null}"#).unwrap();
        assert_eq!(request.reminder_date, Some(None));
        assert!(!request.is_empty());

        let request: UpdateMilestoneRequest = serde_json::from_str(r#"{}"#).unwrap();
        assert_eq!(request.reminder_date, None);
        assert!(request.is_empty());
    }

    #[test]
    fn test_create_request_rejects_unknown_fields() {
        let body = r#"{
            "title": "t", "description": "d", "dueDate": "2025-06-01",
            "studentId": "s1", "verified": true
        }"#;
        assert!(serde_json::from_str::<CreateMilestoneRequest>(body).is_err());
    }

    fn any_status() -> impl Strategy<Value = MilestoneStatus> {
        prop::sample::select(MilestoneStatus::ALL.to_vec())
    }

    proptest! {
        #[test]
        fn student_never_reaches_completed(from in any_status(), to in any_status()) {
            if to == MilestoneStatus::Completed {
                prop_assert!(!from.student_can_move_to(to));
            }
        }

        #[test]
        fn student_cannot_leave_locked_states(from in any_status(), to in any_status()) {
            if !from.is_student_editable() {
                prop_assert!(!from.student_can_move_to(to));
            }
        }
    }
}
