/// Middleware modules for the API server
///
/// - `security`: Security response headers
///
/// The session guard lives in `taskpilot_shared::auth::middleware`.

pub mod security;
