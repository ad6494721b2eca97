//! Application discovery under a working directory.

use std::path::Path;

use walkdir::{DirEntry, WalkDir};

use super::fam::{AppManifest, MANIFEST_FILE_NAME, load_manifest_file};
use crate::errors::{UfbtError, UfbtResult};

/// Deepest level searched for manifests, counting the root's children as 1.
const MAX_DISCOVERY_DEPTH: usize = 3;

/// Build output directory, never searched.
const DIST_DIR_NAME: &str = "dist";

fn is_skipped_dir(entry: &DirEntry) -> bool {
    if entry.depth() == 0 || !entry.file_type().is_dir() {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    name.starts_with('.') || name == DIST_DIR_NAME
}

/// Finds every application declared under `root`, sorted by id.
///
/// Hidden directories and `dist/` are not searched.
///
/// # Errors
///
/// Returns [`UfbtError::Configuration`] if a manifest is malformed or two
/// manifests declare the same application id.
pub fn discover_apps(root: &Path) -> UfbtResult<Vec<AppManifest>> {
    let mut apps: Vec<AppManifest> = Vec::new();

    let manifests = WalkDir::new(root)
        .max_depth(MAX_DISCOVERY_DEPTH)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_skipped_dir(e))
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file() && e.file_name() == MANIFEST_FILE_NAME);

    for entry in manifests {
        tracing::debug!(path = %entry.path().display(), "reading application manifest");
        for app in load_manifest_file(entry.path())? {
            if let Some(existing) = apps.iter().find(|a| a.app_id == app.app_id) {
                return Err(UfbtError::configuration(format!(
                    "application '{}' is declared in both {} and {}",
                    app.app_id,
                    existing.manifest_dir.display(),
                    app.manifest_dir.display()
                )));
            }
            apps.push(app);
        }
    }

    apps.sort_by(|a, b| a.app_id.cmp(&b.app_id));
    Ok(apps)
}

/// Picks the application to build.
///
/// With `app_id`, the matching buildable application is returned. Without
/// it, the single buildable application is returned.
///
/// # Errors
///
/// Returns [`UfbtError::Configuration`] if there is no buildable
/// application, `app_id` matches none, or several candidates exist and no
/// `app_id` was given.
pub fn select_app<'a>(apps: &'a [AppManifest], app_id: Option<&str>) -> UfbtResult<&'a AppManifest> {
    let buildable: Vec<&AppManifest> = apps.iter().filter(|a| a.is_buildable()).collect();
    let candidates = || {
        buildable
            .iter()
            .map(|a| a.app_id.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    };

    if let Some(id) = app_id {
        return buildable.iter().copied().find(|a| a.app_id == id).ok_or_else(|| {
            UfbtError::configuration(format!(
                "no buildable application '{id}' (found: {})",
                if buildable.is_empty() { "none".to_string() } else { candidates() }
            ))
        });
    }

    match buildable.as_slice() {
        [] => Err(UfbtError::configuration(format!(
            "no buildable application found (looked for {MANIFEST_FILE_NAME})"
        ))),
        [single] => Ok(single),
        _ => Err(UfbtError::configuration(format!(
            "multiple applications found: {}; choose one with --app-id",
            candidates()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::TempDir;
    use std::fs;

    fn write_app(root: &Path, rel: &str, id: &str, kind: &str) {
        let dir = root.join(rel);
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join(MANIFEST_FILE_NAME),
            format!("App(appid=\"{id}\", apptype=FlipperAppType.{kind}, entry_point=\"{id}_main\")"),
        )
        .unwrap();
    }

    #[test]
    fn discovers_nested_apps_sorted() {
        let temp = TempDir::new().unwrap();
        write_app(temp.path(), "", "root_app", "EXTERNAL");
        write_app(temp.path(), "apps/zeta", "zeta", "EXTERNAL");
        write_app(temp.path(), "alpha", "alpha", "PLUGIN");

        let apps = discover_apps(temp.path()).unwrap();
        let ids: Vec<_> = apps.iter().map(|a| a.app_id.as_str()).collect();
        assert_eq!(ids, vec!["alpha", "root_app", "zeta"]);
    }

    #[test]
    fn skips_hidden_dist_and_deep_dirs() {
        let temp = TempDir::new().unwrap();
        write_app(temp.path(), ".git/x", "hidden", "EXTERNAL");
        write_app(temp.path(), "dist/copy", "copied", "EXTERNAL");
        write_app(temp.path(), "a/b/c/d", "too_deep", "EXTERNAL");

        assert!(discover_apps(temp.path()).unwrap().is_empty());
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let temp = TempDir::new().unwrap();
        write_app(temp.path(), "one", "same", "EXTERNAL");
        write_app(temp.path(), "two", "same", "EXTERNAL");

        let err = discover_apps(temp.path()).unwrap_err();
        assert!(err.to_string().contains("same"));
    }

    fn apps_in(temp: &TempDir) -> Vec<AppManifest> {
        write_app(temp.path(), "appA", "appA", "EXTERNAL");
        write_app(temp.path(), "appB", "appB", "EXTERNAL");
        write_app(temp.path(), "svc", "svc", "SERVICE");
        discover_apps(temp.path()).unwrap()
    }

    #[test]
    fn ambiguous_selection_lists_candidates() {
        let temp = TempDir::new().unwrap();
        let apps = apps_in(&temp);

        let err = select_app(&apps, None).unwrap_err();
        let message = err.to_string();
        assert!(matches!(err, UfbtError::Configuration { .. }));
        assert!(message.contains("appA, appB"));
        assert!(!message.contains("svc"));
    }

    #[test]
    fn explicit_selection() {
        let temp = TempDir::new().unwrap();
        let apps = apps_in(&temp);

        assert_eq!(select_app(&apps, Some("appB")).unwrap().app_id, "appB");
        assert!(select_app(&apps, Some("svc")).is_err());
        assert!(select_app(&apps, Some("missing")).is_err());
    }

    #[test]
    fn single_buildable_is_selected() {
        let temp = TempDir::new().unwrap();
        write_app(temp.path(), "only", "only", "EXTERNAL");
        write_app(temp.path(), "svc", "svc", "SERVICE");
        let apps = discover_apps(temp.path()).unwrap();

        assert_eq!(select_app(&apps, None).unwrap().app_id, "only");
    }

    #[test]
    fn nothing_buildable() {
        let err = select_app(&[], None).unwrap_err();
        assert!(err.to_string().contains("no buildable application"));
    }
}
