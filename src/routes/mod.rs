pub mod advisor;
pub mod milestones;
pub mod notifications;
pub mod students;
