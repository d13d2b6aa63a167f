pub mod access_log;
pub mod admin_auth;
pub mod api_key;
