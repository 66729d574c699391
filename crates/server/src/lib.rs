pub mod api;
pub mod config;
pub mod error;
pub mod ratelimit_factory;
pub mod repository_factory;
pub mod service;
pub mod storage_factory;
pub mod telemetry;
