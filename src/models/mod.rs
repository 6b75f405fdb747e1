pub mod milestone;
pub mod notification;
pub mod response;
pub mod student;
