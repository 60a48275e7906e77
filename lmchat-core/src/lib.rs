pub mod classifier;
pub mod config;
pub mod delta;
pub mod error;
pub mod frame;
pub mod http_client;
pub mod model;
pub mod normalizer;
pub mod providers;
pub mod relay;
pub mod session;
pub mod settings;
pub mod stats;
pub mod telemetry;
#[cfg(test)]
pub mod test_util;
