use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub columns: ColumnLayout,
    pub normalize: NormalizeConfig,
    pub matching: MatchPolicy,
    /// Student discipline name -> reference discipline name.
    pub aliases: BTreeMap<String, String>,
    pub dedup_description_lines: bool,
    pub empty_placeholder: String,
    pub result_column: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            columns: ColumnLayout::default(),
            normalize: NormalizeConfig::default(),
            matching: MatchPolicy::default(),
            aliases: BTreeMap::new(),
            dedup_description_lines: true,
            empty_placeholder: "No data to process".to_string(),
            result_column: "Final Result".to_string(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnLayout {
    pub reference_discipline: String,
    pub reference_level: String,
    pub reference_description: String,
    pub reference_satisfactory: String,
    pub reference_good: String,
    pub reference_excellent: String,
    /// Tried in order; the first present column identifies the student.
    pub student_identity: Vec<String>,
    /// `{n}` is replaced by the slot ordinal.
    pub student_discipline: String,
    pub student_grade: String,
    pub student_short_name: String,
    pub slots: usize,
}

impl Default for ColumnLayout {
    fn default() -> Self {
        Self {
            reference_discipline: "Discipline".to_string(),
            reference_level: "Level".to_string(),
            reference_description: "Description".to_string(),
            reference_satisfactory: "Satisfactory".to_string(),
            reference_good: "Good".to_string(),
            reference_excellent: "Excellent".to_string(),
            student_identity: vec![
                "Email".to_string(),
                "Student".to_string(),
                "Name".to_string(),
            ],
            student_discipline: "Discipline {n}".to_string(),
            student_grade: "Grade {n}".to_string(),
            student_short_name: "Short Name {n}".to_string(),
            slots: 3,
        }
    }
}

impl ColumnLayout {
    pub fn discipline_column(&self, ordinal: usize) -> String {
        slot_column(&self.student_discipline, ordinal)
    }

    pub fn grade_column(&self, ordinal: usize) -> String {
        slot_column(&self.student_grade, ordinal)
    }

    pub fn short_name_column(&self, ordinal: usize) -> String {
        slot_column(&self.student_short_name, ordinal)
    }
}

fn slot_column(template: &str, ordinal: usize) -> String {
    template.replace("{n}", &ordinal.to_string())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizeConfig {
    pub case_insensitive: bool,
    pub strip_prefixes: Vec<String>,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            case_insensitive: true,
            strip_prefixes: vec![
                "Independent exam in ".to_string(),
                "Независимый экзамен по ".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchPolicy {
    pub substring_fallback: bool,
    pub best_grade_wins: bool,
    pub capitalize_display: bool,
}

impl Default for MatchPolicy {
    fn default() -> Self {
        Self {
            substring_fallback: true,
            best_grade_wins: true,
            capitalize_display: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_documented_policy() {
        let config = Config::default();
        assert!(config.matching.substring_fallback);
        assert!(config.matching.best_grade_wins);
        assert!(config.dedup_description_lines);
        assert_eq!(config.empty_placeholder, "No data to process");
        assert_eq!(config.columns.slots, 3);
    }

    #[test]
    fn slot_columns_substitute_ordinal() {
        let layout = ColumnLayout::default();
        assert_eq!(layout.discipline_column(2), "Discipline 2");
        assert_eq!(layout.grade_column(3), "Grade 3");
        assert_eq!(layout.short_name_column(1), "Short Name 1");
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "matching": {{ "substring_fallback": false }},
                "aliases": {{ "Digital literacy": "Digital literacy basics" }},
                "columns": {{ "student_grade": "Score {{n}}" }}
            }}"#
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert!(!config.matching.substring_fallback);
        assert!(config.matching.best_grade_wins);
        assert_eq!(config.aliases.len(), 1);
        assert_eq!(config.columns.grade_column(1), "Score 1");
        assert_eq!(config.columns.discipline_column(1), "Discipline 1");
    }

    #[test]
    fn invalid_json_is_reported() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();

        let err = Config::load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
