//! CLI command implementations.

mod ask;
mod chat;
mod config;
mod debug;
mod doctor;
mod web;

pub use ask::run_ask;
pub use chat::run_chat;
pub use config::run_config;
pub use debug::run_debug;
pub use doctor::run_doctor;
pub use web::run_web;
