// Path helpers for recipe and fragment lookup
// Recipes live in <data>/recipes/*.yaml, fragments in <data>/fragments/<a>/<b>.yaml

use std::path::{Path, PathBuf};

/// Resolve `path` against `root` unless it is already absolute
pub fn resolve_against(root: &Path, path: &str) -> PathBuf {
    let candidate = Path::new(path);
    if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        root.join(candidate)
    }
}

/// Data directory of a recipe: the parent of the directory holding it
pub fn recipe_base_dir(recipe_path: &Path) -> PathBuf {
    recipe_path
        .parent()
        .and_then(Path::parent)
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// File for a dotted fragment id, e.g. `system.prompt` -> `fragments/system/prompt.yaml`
pub fn fragment_path(base_dir: &Path, fragment_id: &str) -> PathBuf {
    base_dir
        .join("fragments")
        .join(format!("{}.yaml", fragment_id.replace('.', "/")))
}
