pub mod config;
pub mod contestant;
pub mod error;
pub mod logging;
pub mod output;
pub mod scoring;
pub mod session;
pub mod store;

pub use error::EngineError;
