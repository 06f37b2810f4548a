//! CLI command implementations

pub mod config;
pub mod list;
pub mod show;

pub use config::execute as config;
pub use list::execute as list;
pub use show::execute as show;
