pub mod config;
pub mod error;
pub mod fetch;
pub mod hls;
pub mod intercept;
pub mod metrics;
pub mod server;
pub mod session;
pub mod subtitle;
