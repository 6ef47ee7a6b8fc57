// src/watch/translate.rs

//! Raw path -> logical unit.
//!
//! The unit name is read from the artifact itself rather than derived from
//! the path, so nested and synthetic classes resolve to their real names.
//! A file that is half-written, vanished, or not a class file fails
//! translation; callers skip such events.

use std::path::Path;

use tracing::trace;

use crate::analyze::class_name;
use crate::errors::{ReloadqError, Result};
use crate::event::UnitId;
use crate::fs::FileSystem;
use crate::watch::patterns::ScopeWatchProfile;

/// Convert a path into a string relative to `root`, with forward slashes.
///
/// Returns `None` if the path is not under `root`.
pub fn relative_str(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    Some(rel.to_string_lossy().replace('\\', "/"))
}

/// Map `path` to the unit it defines under `profile`.
pub fn translate(fs: &dyn FileSystem, profile: &ScopeWatchProfile, path: &Path) -> Result<UnitId> {
    let root = profile
        .root_of(path)
        .ok_or_else(|| ReloadqError::translation(path, "not under any scope root"))?;
    let rel = relative_str(root, path)
        .ok_or_else(|| ReloadqError::translation(path, "cannot relativize"))?;

    if !profile.is_artifact(&rel) {
        return Err(ReloadqError::translation(path, "not a tracked artifact"));
    }

    // Cheap rejection before touching the file.
    let scope_dir = profile.scope().as_path();
    if !Path::new(&rel).starts_with(&scope_dir) {
        return Err(ReloadqError::translation(
            path,
            format!("outside base scope '{}'", profile.scope()),
        ));
    }

    if !fs.is_file(path) {
        return Err(ReloadqError::translation(path, "not a regular file"));
    }
    let bytes = fs
        .read(path)
        .map_err(|e| ReloadqError::translation(path, format!("{e:#}")))?;
    let unit = class_name(&bytes)
        .map(UnitId::from)
        .map_err(|e| ReloadqError::translation(path, e.to_string()))?;

    if !profile.scope().contains(&unit) {
        return Err(ReloadqError::translation(
            path,
            format!("class {unit} is outside base scope '{}'", profile.scope()),
        ));
    }

    trace!(?path, %unit, "translated path");
    Ok(unit)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::fs::mock::MockFileSystem;

    /// Smallest class file `class_name` accepts: magic, versions and a
    /// constant pool holding just the class name.
    fn class_bytes(internal_name: &str) -> Vec<u8> {
        let mut out = vec![0xCA, 0xFE, 0xBA, 0xBE, 0, 0, 0, 61];
        out.extend_from_slice(&3u16.to_be_bytes());
        out.push(1);
        out.extend_from_slice(&(internal_name.len() as u16).to_be_bytes());
        out.extend_from_slice(internal_name.as_bytes());
        out.push(7);
        out.extend_from_slice(&1u16.to_be_bytes());
        out.extend_from_slice(&0x0021u16.to_be_bytes());
        out.extend_from_slice(&2u16.to_be_bytes());
        out
    }

    fn profile() -> ScopeWatchProfile {
        ScopeWatchProfile::new(
            "app".into(),
            "com.example".into(),
            vec![PathBuf::from("/out")],
            &[],
        )
        .unwrap()
    }

    #[test]
    fn reads_unit_name_from_artifact() {
        let fs = MockFileSystem::new();
        fs.add_file("/out/com/example/Foo$1.class", class_bytes("com/example/Foo$1"));

        let unit = translate(&fs, &profile(), Path::new("/out/com/example/Foo$1.class")).unwrap();
        assert_eq!(unit, UnitId::from("com.example.Foo$1"));
    }

    #[test]
    fn missing_or_truncated_files_fail() {
        let fs = MockFileSystem::new();
        fs.add_file("/out/com/example/Half.class", vec![0xCA, 0xFE]);

        let gone = translate(&fs, &profile(), Path::new("/out/com/example/Gone.class"));
        assert!(matches!(gone, Err(ReloadqError::Translation { .. })));

        let half = translate(&fs, &profile(), Path::new("/out/com/example/Half.class"));
        assert!(matches!(half, Err(ReloadqError::Translation { .. })));
    }

    #[test]
    fn rejects_paths_outside_scope_or_pattern() {
        let fs = MockFileSystem::new();
        fs.add_file("/out/org/other/Bar.class", class_bytes("org/other/Bar"));
        fs.add_file("/out/com/example/app.properties", b"k=v".to_vec());

        assert!(translate(&fs, &profile(), Path::new("/out/org/other/Bar.class")).is_err());
        assert!(translate(&fs, &profile(), Path::new("/out/com/example/app.properties")).is_err());
        assert!(translate(&fs, &profile(), Path::new("/elsewhere/com/example/Foo.class")).is_err());
    }

    #[test]
    fn class_declaring_foreign_package_is_rejected() {
        let fs = MockFileSystem::new();
        fs.add_file("/out/com/example/Moved.class", class_bytes("org/moved/Moved"));

        let err = translate(&fs, &profile(), Path::new("/out/com/example/Moved.class")).unwrap_err();
        assert!(err.to_string().contains("outside base scope"));
    }

    #[test]
    fn relative_str_uses_forward_slashes() {
        assert_eq!(
            relative_str(Path::new("/out"), Path::new("/out/a/B.class")).as_deref(),
            Some("a/B.class")
        );
        assert_eq!(relative_str(Path::new("/out"), Path::new("/x/B.class")), None);
    }
}
