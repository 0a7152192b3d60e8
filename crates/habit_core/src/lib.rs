pub mod config;
pub mod error;
pub mod habit_api;
pub mod model;
pub mod notify;
pub mod period;
pub mod storage;
