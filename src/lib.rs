pub mod cache;
pub mod config;
pub mod engine;
pub mod model;
pub mod observability;
pub mod service;
pub mod store;
pub mod sweeper;
