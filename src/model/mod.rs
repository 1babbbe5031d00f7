pub mod analytics;
pub mod conversation;
pub mod knowledge;
pub mod leave_request;
pub mod role;
pub mod user;
