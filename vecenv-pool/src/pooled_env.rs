//! Pool of worker threads executing environments in parallel.
mod base;
mod config;
pub use base::PooledVecEnv;
pub use config::PooledVecEnvConfig;
