pub mod config;
pub mod error;
pub mod job;
pub mod table;

pub use config::Config;
pub use error::*;
pub use job::*;
pub use table::*;
