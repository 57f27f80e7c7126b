use std::collections::HashMap;

use crate::models::{non_blank, Grade, ReferenceRow, SkillEntry};
use crate::normalize::{dedup_lines, DisciplineNormalizer};
use crate::processing_log::{LogKind, ProcessingLog};

/// Read-only lookup from (normalized discipline, grade) to skill description.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceIndex {
    descriptions: HashMap<(String, Grade), String>,
    disciplines: Vec<String>,
}

impl ReferenceIndex {
    pub fn get(&self, discipline: &str, grade: Grade) -> Option<&str> {
        self.descriptions
            .get(&(discipline.to_string(), grade))
            .map(String::as_str)
    }

    pub fn contains_discipline(&self, discipline: &str) -> bool {
        self.disciplines.iter().any(|known| known == discipline)
    }

    /// Discipline keys in the order they first appeared in the source.
    pub fn disciplines(&self) -> &[String] {
        &self.disciplines
    }

    pub fn grades_for(&self, discipline: &str) -> Vec<Grade> {
        Grade::ALL
            .into_iter()
            .filter(|grade| self.get(discipline, *grade).is_some())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.descriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptions.is_empty()
    }
}

/// Why a reference row did not make it into the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowRejection {
    MissingDiscipline,
    MissingLevel,
    MissingDescription,
    UnrecognizedLevel(String),
}

impl RowRejection {
    fn kind(&self) -> LogKind {
        match self {
            RowRejection::UnrecognizedLevel(_) => LogKind::UnrecognizedGrade,
            _ => LogKind::RowSkipped,
        }
    }

    fn describe(&self) -> String {
        match self {
            RowRejection::MissingDiscipline => "missing discipline".to_string(),
            RowRejection::MissingLevel => "missing level".to_string(),
            RowRejection::MissingDescription => "missing description".to_string(),
            RowRejection::UnrecognizedLevel(level) => format!("unrecognized level '{level}'"),
        }
    }
}

pub struct ReferenceIndexBuilder {
    normalizer: DisciplineNormalizer,
    dedup_description_lines: bool,
    index: ReferenceIndex,
    origins: HashMap<(String, Grade), usize>,
    log: ProcessingLog,
}

impl ReferenceIndexBuilder {
    pub fn new(normalizer: DisciplineNormalizer, dedup_description_lines: bool) -> Self {
        Self {
            normalizer,
            dedup_description_lines,
            index: ReferenceIndex::default(),
            origins: HashMap::new(),
            log: ProcessingLog::new(),
        }
    }

    pub fn validate(&self, row: &ReferenceRow) -> Result<SkillEntry, RowRejection> {
        let discipline =
            non_blank(row.discipline.as_deref()).ok_or(RowRejection::MissingDiscipline)?;
        let level = non_blank(row.level.as_deref()).ok_or(RowRejection::MissingLevel)?;
        let description =
            non_blank(row.description.as_deref()).ok_or(RowRejection::MissingDescription)?;
        let level =
            Grade::parse(level).ok_or_else(|| RowRejection::UnrecognizedLevel(level.to_string()))?;

        let discipline = self.normalizer.key(discipline);
        if discipline.is_empty() {
            return Err(RowRejection::MissingDiscipline);
        }

        let description = if self.dedup_description_lines {
            dedup_lines(description)
        } else {
            description.to_string()
        };

        Ok(SkillEntry {
            discipline,
            level,
            description,
        })
    }

    /// Adds one row. Invalid rows are logged and skipped; a repeated key overwrites the
    /// earlier description.
    pub fn push(&mut self, row: ReferenceRow) {
        let entry = match self.validate(&row) {
            Ok(entry) => entry,
            Err(rejection) => {
                self.log.push(
                    rejection.kind(),
                    format!("reference line {}: skipped, {}", row.line, rejection.describe()),
                );
                return;
            }
        };

        let key = (entry.discipline.clone(), entry.level);
        if let Some(previous) = self.origins.insert(key.clone(), row.line) {
            self.log.push(
                LogKind::DuplicateSuppressed,
                format!(
                    "reference line {}: '{}' ({}) overrides line {}",
                    row.line, entry.discipline, entry.level, previous
                ),
            );
        }
        if !self.index.contains_discipline(&entry.discipline) {
            self.index.disciplines.push(entry.discipline.clone());
        }
        self.index.descriptions.insert(key, entry.description);
    }

    pub fn extend(&mut self, rows: impl IntoIterator<Item = ReferenceRow>) {
        for row in rows {
            self.push(row);
        }
    }

    pub fn build(mut self) -> (ReferenceIndex, ProcessingLog) {
        self.log.push(
            LogKind::Info,
            format!(
                "reference index built: {} disciplines, {} descriptions",
                self.index.disciplines.len(),
                self.index.len()
            ),
        );
        tracing::info!(
            disciplines = self.index.disciplines.len(),
            descriptions = self.index.len(),
            "reference index built"
        );
        (self.index, self.log)
    }
}
