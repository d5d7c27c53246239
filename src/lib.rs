//! omerotag - declarative tagging of object-graph nodes from naming and attribute rules

pub mod config;
pub mod exit;
pub mod extensions;
pub mod loader;

pub use config::TaggerConfig;
pub use exit::exit_code;
pub use extensions::AliasExtension;
pub use loader::load_rule_records;
