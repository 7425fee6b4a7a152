//! Test suite discovery
//!
//! Scans suite directories for `testsuite_*.py` scripts and turns them into
//! run descriptors with workspace subpaths assigned. Discovery order (path
//! sort within each directory, directories in the order given) fixes the
//! report ordering.

use anyhow::Result;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::config::EngineSettings;
use crate::models::RunDescriptor;
use crate::workspace::Workspace;

const SUITE_PREFIX: &str = "testsuite_";
const SUITE_EXT: &str = "py";

/// Find suite scripts under the given directories, sorted by file name for a
/// stable discovery order. A missing directory is recoverable.
pub fn find_suite_scripts(dirs: &[PathBuf]) -> Vec<PathBuf> {
    let mut scripts = Vec::new();
    for dir in dirs {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Skipping suite directory {}: {e}", dir.display());
                continue;
            }
        };
        let mut in_dir: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_file() && is_suite_script(p))
            .collect();
        in_dir.sort();
        debug!("Found {} suites in {}", in_dir.len(), dir.display());
        scripts.extend(in_dir);
    }
    scripts
}

/// Build run descriptors for every discovered suite. Duplicate suite names
/// across directories are dropped with a warning so per-suite workspace
/// paths stay disjoint.
pub fn discover_suites(
    dirs: &[PathBuf],
    workspace: &Workspace,
    settings: &EngineSettings,
) -> Result<Vec<RunDescriptor>> {
    let mut descriptors = Vec::new();
    let mut seen = std::collections::BTreeSet::new();

    for script in find_suite_scripts(dirs) {
        let suite = suite_name(&script);
        if !seen.insert(suite.clone()) {
            warn!("Duplicate suite name '{suite}' at {}, dropped", script.display());
            continue;
        }

        let paths = workspace.for_suite(&suite)?;
        let mut descriptor = RunDescriptor::new(
            suite.clone(),
            script,
            paths.run_dir,
            paths.tmp_dir,
            descriptors.len(),
        );
        if settings.skip_suites.iter().any(|s| s == &suite) {
            descriptor = descriptor.with_skip_reason("skipped by configuration");
        }
        if let Some(secs) = settings.run_timeout_secs {
            descriptor = descriptor.with_timeout(secs);
        }
        descriptors.push(descriptor);
    }

    Ok(descriptors)
}

fn is_suite_script(path: &Path) -> bool {
    let name = match path.file_name().and_then(|n| n.to_str()) {
        Some(name) => name,
        None => return false,
    };
    name.starts_with(SUITE_PREFIX)
        && path.extension().map(|e| e == SUITE_EXT).unwrap_or(false)
}

fn suite_name(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("unknown")
        .trim_start_matches(SUITE_PREFIX)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn touch(dir: &Path, name: &str) {
        std::fs::write(dir.join(name), "# suite").unwrap();
    }

    #[test]
    fn finds_only_suite_scripts() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "testsuite_b.py");
        touch(dir.path(), "testsuite_a.py");
        touch(dir.path(), "helper.py");
        touch(dir.path(), "testsuite_notes.txt");

        let scripts = find_suite_scripts(&[dir.path().to_path_buf()]);
        let names: Vec<String> = scripts.iter().map(|p| suite_name(p)).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn missing_directory_is_recoverable() {
        let dir = tempdir().unwrap();
        let scripts = find_suite_scripts(&[dir.path().join("absent")]);
        assert!(scripts.is_empty());
    }

    #[test]
    fn descriptors_get_disjoint_paths_and_indices() {
        let dir = tempdir().unwrap();
        let suites = dir.path().join("suites");
        std::fs::create_dir(&suites).unwrap();
        touch(&suites, "testsuite_alpha.py");
        touch(&suites, "testsuite_beta.py");

        let ws = Workspace::prepare(dir.path().join("outputs")).unwrap();
        let settings = EngineSettings::default();
        let descriptors = discover_suites(&[suites], &ws, &settings).unwrap();

        assert_eq!(descriptors.len(), 2);
        assert_eq!(descriptors[0].suite, "alpha");
        assert_eq!(descriptors[0].index, 0);
        assert_eq!(descriptors[1].index, 1);
        assert_ne!(descriptors[0].run_dir, descriptors[1].run_dir);
    }

    #[test]
    fn configured_skips_are_marked() {
        let dir = tempdir().unwrap();
        let suites = dir.path().join("suites");
        std::fs::create_dir(&suites).unwrap();
        touch(&suites, "testsuite_alpha.py");
        touch(&suites, "testsuite_beta.py");

        let ws = Workspace::prepare(dir.path().join("outputs")).unwrap();
        let mut settings = EngineSettings::default();
        settings.skip_suites = vec!["beta".to_string()];
        let descriptors = discover_suites(&[suites], &ws, &settings).unwrap();

        assert!(descriptors[0].skip_reason.is_none());
        assert!(descriptors[1].skip_reason.is_some());
    }
}
