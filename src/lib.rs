pub mod config;
pub mod errors;
pub mod portal;
pub mod progress;
pub mod session;
