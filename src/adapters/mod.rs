pub mod health_handler;
pub mod prompt_handler;
