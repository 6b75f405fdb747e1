use crate::{
    config::Config,
    services::{
        auth::AuthService,
        milestone::MilestoneService,
        notification::NotificationService,
        reminder::ReminderScheduler,
        store::{MilestoneStore, NotificationStore, StudentStore},
        student::StudentService,
    },
};
use std::sync::Arc;

/// 应用程序的共享状态
/// 包含所有服务和配置的引用
#[derive(Clone)]
pub struct AppState {
    /// 应用配置
    pub config: Config,

    /// 认证服务
    pub auth_service: AuthService,

    /// 里程碑工作流服务
    pub milestone_service: MilestoneService,

    /// 通知服务
    pub notification_service: NotificationService,

    /// 学生服务
    pub student_service: StudentService,

    /// 提醒调度器
    pub reminder_scheduler: ReminderScheduler,
}

impl AppState {
    /// 基于同一组存储装配全部服务
    pub fn new<S>(config: Config, storage: Arc<S>) -> Self
    where
        S: MilestoneStore + NotificationStore + StudentStore + 'static,
    {
        let milestones: Arc<dyn MilestoneStore> = storage.clone();
        let notifications: Arc<dyn NotificationStore> = storage.clone();
        let students: Arc<dyn StudentStore> = storage;

        let notification_service = NotificationService::new(notifications);
        let milestone_service = MilestoneService::new(
            milestones.clone(),
            students.clone(),
            notification_service.clone(),
        );
        let reminder_scheduler =
            ReminderScheduler::new(milestones, notification_service.clone(), &config);

        Self {
            auth_service: AuthService::new(&config),
            milestone_service,
            notification_service,
            student_service: StudentService::new(students),
            reminder_scheduler,
            config,
        }
    }
}
