pub mod calibration;
pub mod config;
pub mod engine;
pub mod export;
pub mod factors;
pub mod feed;
pub mod http_cache;
pub mod http_client;
pub mod logging;
pub mod memory;
pub mod patterns;
pub mod resolution;
pub mod scoring;
pub mod stats;
pub mod store;
pub mod weights;
