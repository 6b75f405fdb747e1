use crate::{
    error::{AppError, Result},
    models::student::*,
    services::{
        auth::{AuthUser, Role},
        store::StudentStore,
    },
    utils::validation::normalize_text,
};
use chrono::Utc;
use std::sync::Arc;
use tracing::info;
use validator::Validate;

/// 学生档案查询与导师分配
#[derive(Clone)]
pub struct StudentService {
    store: Arc<dyn StudentStore>,
}

impl StudentService {
    pub fn new(store: Arc<dyn StudentStore>) -> Self {
        Self { store }
    }

    pub async fn get_student(&self, actor: &AuthUser, student_id: &str) -> Result<Student> {
        let student = self
            .store
            .get_student(student_id)
            .await?
            .ok_or_else(|| AppError::not_found("Student"))?;

        let allowed = match actor.role {
            Role::Student => actor.id == student.id,
            Role::Advisor => student.is_advised_by(&actor.id),
            Role::Admin => true,
        };
        if !allowed {
            return Err(AppError::forbidden("Not allowed to view this student"));
        }

        Ok(student)
    }

    pub async fn list_advisees(&self, advisor: &AuthUser) -> Result<Vec<Student>> {
        advisor.require_role(Role::Advisor)?;
        self.store.list_students_by_advisor(&advisor.id).await
    }

    /// 仅管理员可以登记学生或调整导师分配
    pub async fn upsert_student(
        &self,
        actor: &AuthUser,
        student_id: &str,
        request: UpsertStudentRequest,
    ) -> Result<Student> {
        actor.require_role(Role::Admin)?;
        request.validate()?;

        if student_id.trim().is_empty() {
            return Err(AppError::validation("Student id must not be empty"));
        }

        let now = Utc::now();
        let student = Student {
            id: student_id.to_string(),
            name: normalize_text(&request.name),
            email: request.email,
            advisor_id: request.advisor_id.filter(|id| !id.trim().is_empty()),
            created_at: now,
            updated_at: now,
        };

        let stored = self.store.upsert_student(student).await?;
        info!(
            "Student {} saved with advisor {:?} by {}",
            stored.id, stored.advisor_id, actor.id
        );
        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::store::MemoryStorage;

    fn request(advisor: Option<&str>) -> UpsertStudentRequest {
        UpsertStudentRequest {
            name: "Ada Lovelace".to_string(),
            email: Some("ada@example.edu".to_string()),
            advisor_id: advisor.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_only_admin_can_upsert() {
        let service = StudentService::new(Arc::new(MemoryStorage::new()));
        let student = AuthUser::new("s1", Role::Student);

        let result = service.upsert_student(&student, "s1", request(Some("a1"))).await;
        assert!(matches!(result, Err(AppError::Authorization(_))));
    }

    #[tokio::test]
    async fn test_assigned_advisor_sees_student() {
        let service = StudentService::new(Arc::new(MemoryStorage::new()));
        let admin = AuthUser::new("root", Role::Admin);
        service.upsert_student(&admin, "s1", request(Some("a1"))).await.unwrap();

        assert!(service.get_student(&AuthUser::new("a1", Role::Advisor), "s1").await.is_ok());
        assert!(matches!(
            service.get_student(&AuthUser::new("a2", Role::Advisor), "s1").await,
            Err(AppError::Authorization(_))
        ));

        let advisees = service.list_advisees(&AuthUser::new("a1", Role::Advisor)).await.unwrap();
        assert_eq!(advisees.len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_email_rejected() {
        let service = StudentService::new(Arc::new(MemoryStorage::new()));
        let admin = AuthUser::new("root", Role::Admin);
        let mut bad = request(None);
        bad.email = Some("not-an-email".to_string());

        let result = service.upsert_student(&admin, "s1", bad).await;
        assert!(matches!(result, Err(AppError::ValidatorError(_))));
    }
}
