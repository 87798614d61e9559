//! Locate the newest result artifact written by the evaluation program.
//!
//! Patterns are glob-style and relative to a base directory: `*` and `?`
//! match within one path segment, `**` matches any number of segments.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use regex::Regex;
use tracing::debug;
use walkdir::WalkDir;

use crate::error::{Result, SweepError};

/// Finds files matching a glob pattern under a base directory.
#[derive(Debug, Clone)]
pub struct ResultLocator {
    base: PathBuf,
    pattern: String,
    matcher: Regex,
    /// Deepest directory with no wildcard in its path.
    walk_root: PathBuf,
    max_depth: Option<usize>,
}

impl ResultLocator {
    pub fn new(base: impl Into<PathBuf>, pattern: &str) -> Result<Self> {
        let mut base = base.into();
        let mut rel = pattern.trim();
        if let Some(stripped) = rel.strip_prefix('/') {
            base = PathBuf::from("/");
            rel = stripped;
        }
        while let Some(stripped) = rel.strip_prefix("./") {
            rel = stripped;
        }
        if rel.is_empty() {
            return Err(SweepError::InvalidConfig(
                "result pattern must not be empty".to_string(),
            ));
        }

        let matcher = Regex::new(&glob_to_regex(rel)).map_err(|e| {
            SweepError::InvalidConfig(format!("result pattern {:?}: {}", pattern, e))
        })?;

        let segments: Vec<&str> = rel.split('/').filter(|s| !s.is_empty()).collect();
        let literal = segments
            .iter()
            .take_while(|s| !s.contains(['*', '?']))
            .count();
        let walk_root = segments[..literal]
            .iter()
            .fold(base.clone(), |acc, s| acc.join(s));
        let max_depth = if rel.contains("**") {
            None
        } else {
            Some(segments.len() - literal)
        };

        Ok(Self {
            base,
            pattern: pattern.to_string(),
            matcher,
            walk_root,
            max_depth,
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Every regular file currently matching the pattern.
    pub fn candidates(&self) -> Vec<PathBuf> {
        if !self.walk_root.exists() {
            return Vec::new();
        }

        // Run directories are often symlinks into a results store.
        let mut walker = WalkDir::new(&self.walk_root).follow_links(true);
        if let Some(depth) = self.max_depth {
            walker = walker.max_depth(depth);
        }

        walker
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(|e| self.matches(e.path()))
            .map(|e| e.into_path())
            .collect()
    }

    /// The most recently created matching file, if any.
    pub fn latest(&self) -> Option<PathBuf> {
        newest(stamped(self.candidates()))
    }

    /// Record the matching files present now, so a later
    /// [`latest_since`](Self::latest_since) can tell fresh artifacts apart.
    pub fn snapshot(&self) -> ArtifactSnapshot {
        let stamps = self
            .candidates()
            .into_iter()
            .filter_map(|path| modified_time(&path).map(|time| (path, time)))
            .collect();
        ArtifactSnapshot { stamps }
    }

    /// The most recently created matching file that did not exist in
    /// `before`, or has been rewritten since.
    pub fn latest_since(&self, before: &ArtifactSnapshot) -> Option<PathBuf> {
        let fresh = self
            .candidates()
            .into_iter()
            .filter(|path| match before.stamps.get(path) {
                Some(seen) => modified_time(path).map_or(false, |now| now != *seen),
                None => true,
            });
        newest(stamped(fresh))
    }

    fn matches(&self, path: &Path) -> bool {
        let Ok(rel) = path.strip_prefix(&self.base) else {
            return false;
        };
        let rel: Vec<String> = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        self.matcher.is_match(&rel.join("/"))
    }
}

/// Matching files and their modification times at one point in time.
#[derive(Debug, Clone, Default)]
pub struct ArtifactSnapshot {
    stamps: HashMap<PathBuf, SystemTime>,
}

impl ArtifactSnapshot {
    pub fn len(&self) -> usize {
        self.stamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stamps.is_empty()
    }
}

fn stamped(paths: impl IntoIterator<Item = PathBuf>) -> impl Iterator<Item = (PathBuf, SystemTime)> {
    paths.into_iter().filter_map(|path| match creation_time(&path) {
        Some(time) => Some((path, time)),
        None => {
            debug!(path = ?path, "Skipping artifact without a readable timestamp");
            None
        }
    })
}

/// Pick the newest entry; equal timestamps go to the lexicographically largest path.
pub fn newest(candidates: impl IntoIterator<Item = (PathBuf, SystemTime)>) -> Option<PathBuf> {
    candidates
        .into_iter()
        .max_by(|(pa, ta), (pb, tb)| ta.cmp(tb).then_with(|| pa.cmp(pb)))
        .map(|(path, _)| path)
}

fn creation_time(path: &Path) -> Option<SystemTime> {
    let meta = std::fs::metadata(path).ok()?;
    meta.created().or_else(|_| meta.modified()).ok()
}

fn modified_time(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).ok()?.modified().ok()
}

fn glob_to_regex(pattern: &str) -> String {
    let mut out = String::from("^");
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' if chars.peek() == Some(&'*') => {
                chars.next();
                if chars.peek() == Some(&'/') {
                    chars.next();
                    out.push_str("(?:[^/]+/)*");
                } else {
                    out.push_str(".*");
                }
            }
            '*' => out.push_str("[^/]*"),
            '?' => out.push_str("[^/]"),
            other => out.push_str(&regex::escape(other.encode_utf8(&mut [0u8; 4]))),
        }
    }
    out.push('$');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::Duration;

    fn touch(root: &Path, rel: &str) -> PathBuf {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        fs::write(&path, b"{}").expect("write");
        path
    }

    #[test]
    fn test_glob_to_regex() {
        let re = Regex::new(&glob_to_regex("runs/*/evaluation_results_*.json")).expect("regex");
        assert!(re.is_match("runs/20260101/evaluation_results_1.json"));
        assert!(!re.is_match("runs/a/b/evaluation_results_1.json"));
        assert!(!re.is_match("runs/a/evaluation_results_1.jsonl"));
        assert!(!re.is_match("runsXa/evaluation_results_1.json"));

        let re = Regex::new(&glob_to_regex("runs/**/r?.json")).expect("regex");
        assert!(re.is_match("runs/r1.json"));
        assert!(re.is_match("runs/a/b/r2.json"));
        assert!(!re.is_match("runs/a/r10.json"));
    }

    #[test]
    fn test_candidates_respect_pattern_depth() {
        let dir = tempfile::tempdir().expect("tempdir");
        let hit = touch(dir.path(), "runs/a/evaluation_results_1.json");
        touch(dir.path(), "runs/a/deeper/evaluation_results_2.json");
        touch(dir.path(), "runs/a/summary.json");
        touch(dir.path(), "other/b/evaluation_results_3.json");

        let locator =
            ResultLocator::new(dir.path(), "runs/*/evaluation_results_*.json").expect("locator");
        assert_eq!(locator.candidates(), vec![hit]);
    }

    #[test]
    fn test_latest_none_when_nothing_matches() {
        let dir = tempfile::tempdir().expect("tempdir");
        let locator =
            ResultLocator::new(dir.path(), "runs/*/evaluation_results_*.json").expect("locator");
        assert!(locator.latest().is_none());
    }

    #[test]
    fn test_latest_single_match() {
        let dir = tempfile::tempdir().expect("tempdir");
        let hit = touch(dir.path(), "runs/x/evaluation_results_x.json");
        let locator =
            ResultLocator::new(dir.path(), "./runs/*/evaluation_results_*.json").expect("locator");
        assert_eq!(locator.latest(), Some(hit));
    }

    #[test]
    fn test_newest_prefers_later_timestamp() {
        let t0 = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000);
        let t1 = t0 + Duration::from_secs(5);
        let picked = newest(vec![
            (PathBuf::from("runs/z/r.json"), t0),
            (PathBuf::from("runs/a/r.json"), t1),
        ]);
        assert_eq!(picked, Some(PathBuf::from("runs/a/r.json")));
    }

    #[test]
    fn test_newest_tie_breaks_on_largest_path() {
        let t = SystemTime::UNIX_EPOCH + Duration::from_secs(42);
        let picked = newest(vec![
            (PathBuf::from("runs/b/r.json"), t),
            (PathBuf::from("runs/c/r.json"), t),
            (PathBuf::from("runs/a/r.json"), t),
        ]);
        assert_eq!(picked, Some(PathBuf::from("runs/c/r.json")));
    }

    #[test]
    fn test_latest_since_ignores_untouched_artifacts() {
        let dir = tempfile::tempdir().expect("tempdir");
        touch(dir.path(), "runs/old/evaluation_results_old.json");
        let locator =
            ResultLocator::new(dir.path(), "runs/*/evaluation_results_*.json").expect("locator");

        let before = locator.snapshot();
        assert_eq!(before.len(), 1);
        assert!(locator.latest().is_some());
        assert_eq!(locator.latest_since(&before), None);

        let fresh = touch(dir.path(), "runs/new/evaluation_results_new.json");
        assert_eq!(locator.latest_since(&before), Some(fresh));
    }

    #[test]
    fn test_latest_since_sees_rewritten_artifact() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = touch(dir.path(), "runs/fixed/evaluation_results_fixed.json");
        let locator =
            ResultLocator::new(dir.path(), "runs/*/evaluation_results_*.json").expect("locator");
        let before = locator.snapshot();

        let file = fs::OpenOptions::new()
            .write(true)
            .open(&path)
            .expect("open");
        let later = fs::metadata(&path)
            .and_then(|m| m.modified())
            .expect("mtime")
            + Duration::from_secs(10);
        file.set_modified(later).expect("set mtime");

        assert_eq!(locator.latest_since(&before), Some(path));
    }

    #[test]
    fn test_latest_since_empty_snapshot_matches_latest() {
        let dir = tempfile::tempdir().expect("tempdir");
        let locator =
            ResultLocator::new(dir.path(), "runs/*/evaluation_results_*.json").expect("locator");
        let before = locator.snapshot();
        assert!(before.is_empty());

        let hit = touch(dir.path(), "runs/a/evaluation_results_a.json");
        assert_eq!(locator.latest_since(&before), locator.latest());
        assert_eq!(locator.latest(), Some(hit));
    }

    #[cfg(unix)]
    #[test]
    fn test_candidates_follow_symlinked_run_dirs() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = tempfile::tempdir().expect("store");
        touch(store.path(), "run7/evaluation_results_7.json");
        fs::create_dir_all(dir.path().join("runs")).expect("mkdir");
        std::os::unix::fs::symlink(store.path().join("run7"), dir.path().join("runs/run7"))
            .expect("symlink");

        let locator =
            ResultLocator::new(dir.path(), "runs/*/evaluation_results_*.json").expect("locator");
        assert_eq!(
            locator.candidates(),
            vec![dir.path().join("runs/run7/evaluation_results_7.json")]
        );
    }

    #[test]
    fn test_empty_pattern_rejected() {
        assert!(ResultLocator::new(".", "  ").is_err());
    }
}
