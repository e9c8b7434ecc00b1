pub mod backend;
pub mod config;
pub mod error;
pub mod message;
pub mod model_cache;
pub mod provider;
pub mod registry;
pub mod reply;
pub mod session;
#[cfg(test)]
pub mod testing;
