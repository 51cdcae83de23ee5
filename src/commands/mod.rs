//! CLI command implementations.

pub mod lookup;
pub mod research;
pub mod serve;

pub use lookup::LookupCommand;
pub use research::ResearchCommand;
pub use serve::ServeCommand;
