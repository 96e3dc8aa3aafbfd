pub mod collector;
pub mod config;
pub mod error;
pub mod identity;
pub mod locator;
pub mod registry;
pub mod server;
pub mod stats;
pub mod window;
