/// API route handlers
///
/// This module contains all route handlers organized by resource:
///
/// - `health`: Health check endpoint
/// - `auth`: Account and session endpoints (register, login, logout, me)
/// - `tasks`: Personal task endpoints

pub mod auth;
pub mod health;
pub mod tasks;
