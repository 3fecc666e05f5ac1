pub mod auth;
pub mod claude_api;
pub mod config;
pub mod database_validator;
pub mod flashcard_generator;
pub mod generation;
pub mod session_cleanup;
