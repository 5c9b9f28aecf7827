//! # TaskPilot Shared Library
//!
//! Core of the TaskPilot personal task tracker: account registration, login,
//! signed sessions, and ownership-scoped task storage. The HTTP server in
//! `taskpilot-api` is a thin layer over [`service::TaskPilot`].
//!
//! ## Module Organization
//!
//! - `auth`: Password hashing, login verification, sessions, and the Axum guard
//! - `clock`: Injectable time source
//! - `db`: Connection pool, migrations, and the Postgres and in-memory stores
//! - `error`: Core and storage error types
//! - `models`: Users, tasks, and the store traits
//! - `service`: The `TaskPilot` facade

pub mod auth;
pub mod clock;
pub mod db;
pub mod error;
pub mod models;
pub mod service;

/// Current version of the TaskPilot shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
