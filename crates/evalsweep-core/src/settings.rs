//! Typed view over the evaluation program's settings file.
//!
//! The settings file is ordinary source text. Three module-level assignments
//! (`FACTS_LIMIT = 25` and friends) are the only lines the sweep owns; every
//! other byte, including line terminators, must survive a rewrite untouched.
//!
//! [`SettingsFile`] holds the file as its original line sequence plus the
//! location of each owned assignment. [`SettingsTarget`] is the single-owner
//! handle the sweep threads through its pipeline: writes take `&mut self`, so
//! two writers cannot exist at once.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use regex::Regex;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::domain::ParameterTuple;
use crate::error::{Result, SweepError};

/// Names of the three assignments the sweep rewrites.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SettingNames {
    pub facts: String,
    pub entities: String,
    pub episodes: String,
}

impl Default for SettingNames {
    fn default() -> Self {
        Self {
            facts: "FACTS_LIMIT".to_string(),
            entities: "ENTITIES_LIMIT".to_string(),
            episodes: "EPISODES_LIMIT".to_string(),
        }
    }
}

impl SettingNames {
    /// Names in settings order: facts, entities, episodes.
    pub fn as_array(&self) -> [&str; 3] {
        [&self.facts, &self.entities, &self.episodes]
    }

    /// Names must be non-empty identifiers and pairwise distinct.
    pub fn validate(&self) -> Result<()> {
        let names = self.as_array();
        for name in names {
            let valid = !name.is_empty()
                && name
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.');
            if !valid {
                return Err(SweepError::InvalidConfig(format!(
                    "setting name {:?} must be a non-empty identifier",
                    name
                )));
            }
        }
        if names[0] == names[1] || names[0] == names[2] || names[1] == names[2] {
            return Err(SweepError::InvalidConfig(format!(
                "setting names must be distinct, got {:?}",
                names
            )));
        }
        Ok(())
    }
}

/// Trailing comment written next to a rewritten assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Annotation {
    /// A grid point under evaluation.
    Trial,
    /// The winner committed after the sweep.
    Optimum,
}

impl Annotation {
    pub fn comment(&self) -> &'static str {
        match self {
            Annotation::Trial => "Trial value from grid search",
            Annotation::Optimum => "OPTIMIZED - Best from grid search",
        }
    }
}

/// A parsed settings file.
#[derive(Debug, Clone)]
pub struct SettingsFile {
    names: SettingNames,
    /// Original lines, each with its terminator (`\n`, `\r\n`, or none on the last line).
    lines: Vec<String>,
    /// Line indices of each owned assignment, in settings order.
    slots: [Vec<usize>; 3],
}

impl SettingsFile {
    /// Parse settings text, locating every assignment to one of `names`.
    pub fn parse(text: &str, names: &SettingNames) -> Result<Self> {
        names.validate()?;
        let matchers = assignment_matchers(names)?;

        let lines: Vec<String> = text.split_inclusive('\n').map(str::to_string).collect();
        let mut slots: [Vec<usize>; 3] = Default::default();
        for (idx, line) in lines.iter().enumerate() {
            for (slot, matcher) in slots.iter_mut().zip(&matchers) {
                if matcher.is_match(line) {
                    slot.push(idx);
                }
            }
        }

        Ok(Self {
            names: names.clone(),
            lines,
            slots,
        })
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Line indices (0-based) where `name` is assigned.
    pub fn occurrences(&self, name: &str) -> &[usize] {
        self.names
            .as_array()
            .iter()
            .position(|n| *n == name)
            .map(|i| self.slots[i].as_slice())
            .unwrap_or(&[])
    }

    /// Names with no assignment line.
    pub fn missing(&self) -> Vec<&str> {
        self.names
            .as_array()
            .into_iter()
            .zip(&self.slots)
            .filter(|(_, slot)| slot.is_empty())
            .map(|(name, _)| name)
            .collect()
    }

    /// Require exactly one assignment line per name.
    pub fn ensure_complete(&self, path: &Path) -> Result<()> {
        for (name, slot) in self.names.as_array().into_iter().zip(&self.slots) {
            match slot.len() {
                1 => {}
                0 => {
                    return Err(SweepError::MissingSetting {
                        name: name.to_string(),
                        path: path.to_path_buf(),
                    })
                }
                count => {
                    return Err(SweepError::DuplicateSetting {
                        name: name.to_string(),
                        count,
                        path: path.to_path_buf(),
                    })
                }
            }
        }
        Ok(())
    }

    /// Currently assigned tuple, if all three settings hold integer literals.
    pub fn current(&self) -> Option<ParameterTuple> {
        let mut values = [0u32; 3];
        for ((value, slot), name) in values
            .iter_mut()
            .zip(&self.slots)
            .zip(self.names.as_array())
        {
            let idx = *slot.first()?;
            *value = parse_assigned_value(&self.lines[idx], name)?;
        }
        Some(ParameterTuple::from(values))
    }

    /// Rewrite every owned assignment to the tuple's values.
    pub fn apply(&mut self, tuple: ParameterTuple, annotation: Annotation) {
        let names = self.names.clone();
        for ((slot, name), value) in self
            .slots
            .iter()
            .zip(names.as_array())
            .zip(tuple.values())
        {
            for &idx in slot {
                let terminator = line_terminator(&self.lines[idx]);
                self.lines[idx] = format!(
                    "{} = {}  # {}{}",
                    name,
                    value,
                    annotation.comment(),
                    terminator
                );
            }
        }
    }

    pub fn render(&self) -> String {
        self.lines.concat()
    }
}

/// Single-owner handle on the settings file of the evaluation program.
#[derive(Debug)]
pub struct SettingsTarget {
    path: PathBuf,
    names: SettingNames,
    strict: bool,
}

impl SettingsTarget {
    /// `strict` turns a missing or repeated assignment into an error instead
    /// of a logged no-op.
    pub fn new(path: impl Into<PathBuf>, names: SettingNames, strict: bool) -> Self {
        Self {
            path: path.into(),
            names,
            strict,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn names(&self) -> &SettingNames {
        &self.names
    }

    /// Read and parse the file, enforcing the strictness policy.
    pub fn load(&self) -> Result<SettingsFile> {
        let text = fs::read_to_string(&self.path).map_err(|source| SweepError::ConfigIo {
            path: self.path.clone(),
            source,
        })?;
        let file = SettingsFile::parse(&text, &self.names)?;

        if self.strict {
            file.ensure_complete(&self.path)?;
        } else {
            for name in file.missing() {
                warn!(path = ?self.path, setting = %name, "Setting not found; leaving it unchanged");
            }
        }
        Ok(file)
    }

    /// Rewrite the three assignments to `tuple` and write the file back.
    pub fn apply(&mut self, tuple: ParameterTuple, annotation: Annotation) -> Result<()> {
        let mut file = self.load()?;
        file.apply(tuple, annotation);
        self.write(&file.render())?;
        debug!(
            path = ?self.path,
            facts = tuple.facts_limit,
            entities = tuple.entities_limit,
            episodes = tuple.episodes_limit,
            annotation = annotation.comment(),
            "Settings rewritten"
        );
        Ok(())
    }

    /// Replace the file via a sibling temp file and rename, keeping permissions.
    fn write(&self, contents: &str) -> Result<()> {
        let io_err = |source: std::io::Error| SweepError::ConfigIo {
            path: self.path.clone(),
            source,
        };

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let permissions = fs::metadata(&self.path).map_err(io_err)?.permissions();

        let mut tmp = NamedTempFile::new_in(dir).map_err(io_err)?;
        tmp.write_all(contents.as_bytes()).map_err(io_err)?;
        tmp.as_file().set_permissions(permissions).map_err(io_err)?;
        tmp.persist(&self.path).map_err(|e| io_err(e.error))?;
        Ok(())
    }
}

fn assignment_matchers(names: &SettingNames) -> Result<[Regex; 3]> {
    let build = |name: &str| {
        Regex::new(&format!(r"^{}[ \t]*=", regex::escape(name)))
            .map_err(|e| SweepError::InvalidConfig(format!("setting name {:?}: {}", name, e)))
    };
    Ok([
        build(&names.facts)?,
        build(&names.entities)?,
        build(&names.episodes)?,
    ])
}

fn parse_assigned_value(line: &str, name: &str) -> Option<u32> {
    let rest = line.strip_prefix(name)?.trim_start_matches([' ', '\t']);
    let rest = rest.strip_prefix('=')?.trim_start_matches([' ', '\t']);
    let digits: String = rest.chars().take_while(char::is_ascii_digit).collect();
    digits.parse().ok()
}

fn line_terminator(line: &str) -> &'static str {
    if line.ends_with("\r\n") {
        "\r\n"
    } else if line.ends_with('\n') {
        "\n"
    } else {
        ""
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
import os

# Retrieval limits
FACTS_LIMIT = 20      # default
ENTITIES_LIMIT = 10
EPISODES_LIMIT = 3
FACTS_LIMIT_NOTE = \"unrelated\"

def main():
    return FACTS_LIMIT
";

    fn parse(text: &str) -> SettingsFile {
        SettingsFile::parse(text, &SettingNames::default()).expect("parse settings")
    }

    #[test]
    fn test_parse_locates_assignments() {
        let file = parse(SAMPLE);
        assert_eq!(file.occurrences("FACTS_LIMIT"), &[3]);
        assert_eq!(file.occurrences("ENTITIES_LIMIT"), &[4]);
        assert_eq!(file.occurrences("EPISODES_LIMIT"), &[5]);
        assert!(file.missing().is_empty());
        assert_eq!(file.current(), Some(ParameterTuple::new(20, 10, 3)));
    }

    #[test]
    fn test_indented_and_suffixed_names_are_not_owned() {
        let file = parse("    FACTS_LIMIT = 1\nFACTS_LIMITS = 2\n");
        assert!(file.occurrences("FACTS_LIMIT").is_empty());
    }

    #[test]
    fn test_apply_rewrites_only_owned_lines() {
        let mut file = parse(SAMPLE);
        file.apply(ParameterTuple::new(50, 5, 0), Annotation::Trial);
        let rendered = file.render();

        let before: Vec<&str> = SAMPLE.lines().collect();
        let after: Vec<&str> = rendered.lines().collect();
        assert_eq!(before.len(), after.len());

        let changed: Vec<usize> = (0..before.len())
            .filter(|&i| before[i] != after[i])
            .collect();
        assert_eq!(changed, vec![3, 4, 5]);
        assert_eq!(after[3], "FACTS_LIMIT = 50  # Trial value from grid search");
        assert_eq!(after[4], "ENTITIES_LIMIT = 5  # Trial value from grid search");
        assert_eq!(after[5], "EPISODES_LIMIT = 0  # Trial value from grid search");
        assert!(rendered.ends_with("return FACTS_LIMIT\n"));
    }

    #[test]
    fn test_apply_preserves_crlf_and_missing_final_newline() {
        let text = "A = 1\r\nFACTS_LIMIT = 1\r\nENTITIES_LIMIT = 2\r\nEPISODES_LIMIT = 3";
        let mut file = parse(text);
        file.apply(ParameterTuple::new(7, 8, 9), Annotation::Optimum);
        assert_eq!(
            file.render(),
            "A = 1\r\n\
             FACTS_LIMIT = 7  # OPTIMIZED - Best from grid search\r\n\
             ENTITIES_LIMIT = 8  # OPTIMIZED - Best from grid search\r\n\
             EPISODES_LIMIT = 9  # OPTIMIZED - Best from grid search"
        );
    }

    #[test]
    fn test_ensure_complete_reports_missing_and_duplicates() {
        let file = parse("FACTS_LIMIT = 1\nENTITIES_LIMIT = 2\n");
        let err = file
            .ensure_complete(Path::new("cfg.py"))
            .expect_err("missing episodes");
        assert!(matches!(err, SweepError::MissingSetting { ref name, .. } if name == "EPISODES_LIMIT"));

        let file = parse("FACTS_LIMIT = 1\nFACTS_LIMIT = 2\nENTITIES_LIMIT = 2\nEPISODES_LIMIT = 0\n");
        let err = file
            .ensure_complete(Path::new("cfg.py"))
            .expect_err("duplicate facts");
        assert!(matches!(err, SweepError::DuplicateSetting { count: 2, .. }));
    }

    #[test]
    fn test_setting_names_validation() {
        assert!(SettingNames::default().validate().is_ok());

        let dup = SettingNames {
            facts: "X".to_string(),
            entities: "X".to_string(),
            episodes: "Y".to_string(),
        };
        assert!(dup.validate().is_err());

        let empty = SettingNames {
            facts: String::new(),
            ..SettingNames::default()
        };
        assert!(empty.validate().is_err());

        let spaced = SettingNames {
            facts: "FACTS LIMIT".to_string(),
            ..SettingNames::default()
        };
        assert!(spaced.validate().is_err());
    }

    #[test]
    fn test_target_apply_roundtrip_on_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("zep_evaluate.py");
        fs::write(&path, SAMPLE).expect("write sample");

        let mut target = SettingsTarget::new(&path, SettingNames::default(), true);
        target
            .apply(ParameterTuple::new(35, 10, 5), Annotation::Trial)
            .expect("apply");

        let loaded = target.load().expect("reload");
        assert_eq!(loaded.current(), Some(ParameterTuple::new(35, 10, 5)));
        assert_eq!(loaded.line_count(), SAMPLE.lines().count());
    }

    #[test]
    fn test_target_strict_missing_setting_is_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("cfg.py");
        fs::write(&path, "FACTS_LIMIT = 1\n").expect("write");

        let mut target = SettingsTarget::new(&path, SettingNames::default(), true);
        let err = target
            .apply(ParameterTuple::new(1, 2, 3), Annotation::Trial)
            .expect_err("strict mode must fail");
        assert!(matches!(err, SweepError::MissingSetting { .. }));
        assert_eq!(fs::read_to_string(&path).expect("read"), "FACTS_LIMIT = 1\n");
    }

    #[test]
    fn test_target_lenient_missing_setting_is_noop() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("cfg.py");
        fs::write(&path, "FACTS_LIMIT = 1\nother = 2\n").expect("write");

        let mut target = SettingsTarget::new(&path, SettingNames::default(), false);
        target
            .apply(ParameterTuple::new(9, 2, 3), Annotation::Trial)
            .expect("lenient apply");
        assert_eq!(
            fs::read_to_string(&path).expect("read"),
            "FACTS_LIMIT = 9  # Trial value from grid search\nother = 2\n"
        );
    }

    #[test]
    fn test_target_missing_file_is_config_io() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut target =
            SettingsTarget::new(dir.path().join("absent.py"), SettingNames::default(), true);
        let err = target
            .apply(ParameterTuple::new(1, 2, 3), Annotation::Trial)
            .expect_err("missing file");
        assert!(matches!(err, SweepError::ConfigIo { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_target_preserves_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("cfg.py");
        fs::write(&path, SAMPLE).expect("write");
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).expect("chmod");

        let mut target = SettingsTarget::new(&path, SettingNames::default(), true);
        target
            .apply(ParameterTuple::new(1, 2, 3), Annotation::Trial)
            .expect("apply");

        let mode = fs::metadata(&path).expect("metadata").permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }
}
