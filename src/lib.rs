pub mod codec;
pub mod config;
pub mod engine;
pub mod limits;
pub mod model;
pub mod monitor;
pub mod notify;
pub mod observability;
pub mod records;
pub mod service;
pub mod store;
