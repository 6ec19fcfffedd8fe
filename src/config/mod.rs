//! Configuration: resolved settings plus the filesystem paths derived from them.

mod paths;
mod settings;

pub use paths::Paths;
pub use settings::Settings;
