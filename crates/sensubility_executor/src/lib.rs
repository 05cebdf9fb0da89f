pub mod cache;
pub mod error;
pub mod executor;

pub use cache::ScriptCache;
pub use error::ExecutorError;
pub use executor::Executor;
