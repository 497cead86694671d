pub mod config;
pub mod error;
pub mod index;
pub mod loader;
pub mod storage;
pub mod utils;
