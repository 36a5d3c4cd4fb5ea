pub mod config;
pub mod logging;
pub mod pipeline;
pub mod protocols;
pub mod service;
pub mod streaming;
