pub mod auth;
pub mod client;
pub mod login;
pub mod types;
