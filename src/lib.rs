pub mod collectors;
pub mod config;
pub mod exec;
pub mod gpu;
pub mod http;
pub mod snapshot;
