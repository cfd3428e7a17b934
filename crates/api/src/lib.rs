//! HTTP API: write path (publishes events) and read path (queries + joiner).

pub mod app;
pub mod middleware;
pub mod shutdown;
