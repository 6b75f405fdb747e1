pub mod database;
pub mod store;
pub mod auth;
pub mod student;
pub mod milestone;
pub mod notification;
pub mod reminder;

// 重新导出常用类型
pub use database::Database;
pub use auth::AuthService;
pub use student::StudentService;
pub use milestone::MilestoneService;
pub use notification::NotificationService;
pub use reminder::ReminderScheduler;
