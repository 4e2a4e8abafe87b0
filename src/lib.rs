pub mod api;
pub mod config;
pub mod export;
pub mod observability;
pub mod storage;
pub mod submission;
