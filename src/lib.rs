pub mod advisory;
pub mod api;
pub mod catalog;
pub mod config;
pub mod engine;
pub mod error;
pub mod estimation;
pub mod lifecycle;
pub mod scheduler;
pub mod state;
pub mod store;
