pub mod fs;

use std::path::{Path, PathBuf};

/// Join `relative` onto `base`, rejecting absolute paths and `..` components.
///
/// Returns `None` when the result could escape `base`.
pub fn join_confined(base: &Path, relative: &str) -> Option<PathBuf> {
    let candidate = Path::new(relative);
    if relative.is_empty() || candidate.is_absolute() {
        return None;
    }
    let escapes = candidate.components().any(|c| {
        !matches!(c, std::path::Component::Normal(_) | std::path::Component::CurDir)
    });
    if escapes {
        return None;
    }
    Some(base.join(candidate))
}
