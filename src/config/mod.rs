//! User configuration: file locations and `settings.conf` parsing.

pub mod parsing;
pub mod paths;
pub mod settings;

pub use settings::Settings;
