pub mod classifier;
pub mod config;
pub mod encoder;
pub mod provider;
pub mod routes;
pub mod upload;
