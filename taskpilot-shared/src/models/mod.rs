/// Domain models for TaskPilot
///
/// # Models
///
/// - `user`: User accounts and the credential store trait
/// - `task`: Personal tasks, the task store trait, and the ownership-scoped repository
///
/// Storage implementations live in the `db` module.

pub mod task;
pub mod user;
