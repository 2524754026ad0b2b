// Utility modules

pub mod paths;
pub mod sync;

pub use paths::{fragment_path, recipe_base_dir, resolve_against};
pub use sync::lock_or_recover;
