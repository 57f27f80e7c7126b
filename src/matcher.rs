use std::collections::HashMap;

use crate::config::MatchPolicy;
use crate::models::{non_blank, Grade, Slot, StudentRecord};
use crate::normalize::{capitalize_first, DisciplineNormalizer};
use crate::processing_log::{LogKind, ProcessingLog};
use crate::reference::ReferenceIndex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Exact,
    Alias,
    /// First index discipline, in source order, where either name contains the other.
    /// Short names can land on an unrelated discipline, so these are flagged in the log.
    Containment,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    ColumnsAbsent,
    MissingField,
    UnrecognizedGrade(String),
    LowerThanRecorded { discipline: String, grade: Grade, recorded: Grade },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnmatchReason {
    UnknownDiscipline,
    NoDescriptionForGrade { discipline: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotOutcome {
    Matched {
        raw: String,
        discipline: String,
        grade: Grade,
        resolution: Resolution,
    },
    Upgraded {
        discipline: String,
        from: Grade,
        to: Grade,
    },
    Duplicate {
        discipline: String,
        grade: Grade,
    },
    Skipped(SkipReason),
    Unmatched {
        raw: String,
        grade: Grade,
        reason: UnmatchReason,
    },
}

impl SlotOutcome {
    fn log_line(&self, ordinal: usize) -> (LogKind, String) {
        let prefix = format!("  slot {ordinal}:");
        match self {
            SlotOutcome::Matched {
                raw,
                discipline,
                grade,
                resolution,
            } => {
                let how = match resolution {
                    Resolution::Exact => "",
                    Resolution::Alias => " by alias",
                    Resolution::Containment => " by containment",
                };
                (
                    LogKind::Matched,
                    format!("{prefix} '{raw}' ({grade}) matched '{discipline}'{how}"),
                )
            }
            SlotOutcome::Upgraded {
                discipline,
                from,
                to,
            } => (
                LogKind::Matched,
                format!("{prefix} '{discipline}' upgraded from {from} to {to}"),
            ),
            SlotOutcome::Duplicate { discipline, grade } => (
                LogKind::DuplicateSuppressed,
                format!("{prefix} '{discipline}' ({grade}) already recorded, skipped"),
            ),
            SlotOutcome::Skipped(SkipReason::ColumnsAbsent) => (
                LogKind::RowSkipped,
                format!("{prefix} skipped, columns not present in source"),
            ),
            SlotOutcome::Skipped(SkipReason::MissingField) => (
                LogKind::RowSkipped,
                format!("{prefix} skipped, missing discipline or grade"),
            ),
            SlotOutcome::Skipped(SkipReason::UnrecognizedGrade(label)) => (
                LogKind::UnrecognizedGrade,
                format!("{prefix} unrecognized grade '{label}', skipped"),
            ),
            SlotOutcome::Skipped(SkipReason::LowerThanRecorded {
                discipline,
                grade,
                recorded,
            }) => (
                LogKind::DuplicateSuppressed,
                format!("{prefix} '{discipline}' ({grade}) suppressed, {recorded} already recorded"),
            ),
            SlotOutcome::Unmatched {
                raw,
                grade,
                reason: UnmatchReason::UnknownDiscipline,
            } => (
                LogKind::NoMatchFound,
                format!("{prefix} '{raw}' ({grade}) not found in reference"),
            ),
            SlotOutcome::Unmatched {
                raw,
                grade,
                reason: UnmatchReason::NoDescriptionForGrade { discipline },
            } => (
                LogKind::NoMatchFound,
                format!("{prefix} '{raw}' matched '{discipline}' but it has no {grade} description"),
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultEntry {
    pub discipline: String,
    pub grade: Grade,
    pub display: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StudentResult {
    pub entries: Vec<ResultEntry>,
    pub outcomes: Vec<SlotOutcome>,
}

impl StudentResult {
    fn position_of(&self, discipline: &str, grade: Option<Grade>) -> Option<usize> {
        self.entries.iter().position(|entry| {
            entry.discipline == discipline && grade.map_or(true, |grade| entry.grade == grade)
        })
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn text(&self, placeholder: &str) -> String {
        if self.entries.is_empty() {
            return placeholder.to_string();
        }
        self.entries
            .iter()
            .map(|entry| format!("{}:\n{}", entry.display, entry.description))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

pub struct StudentRecordMatcher<'a> {
    index: &'a ReferenceIndex,
    normalizer: &'a DisciplineNormalizer,
    aliases: HashMap<String, String>,
    policy: MatchPolicy,
}

impl<'a> StudentRecordMatcher<'a> {
    pub fn new(
        index: &'a ReferenceIndex,
        normalizer: &'a DisciplineNormalizer,
        policy: MatchPolicy,
    ) -> Self {
        Self {
            index,
            normalizer,
            aliases: HashMap::new(),
            policy,
        }
    }

    pub fn with_aliases<'b>(mut self, aliases: impl IntoIterator<Item = (&'b String, &'b String)>) -> Self {
        self.aliases = aliases
            .into_iter()
            .map(|(from, to)| (self.normalizer.key(from), self.normalizer.key(to)))
            .filter(|(from, to)| !from.is_empty() && !to.is_empty())
            .collect();
        self
    }

    pub fn resolve(&self, raw: &str) -> Option<(String, Resolution)> {
        let key = self.normalizer.key(raw);
        if key.is_empty() {
            return None;
        }
        if self.index.contains_discipline(&key) {
            return Some((key, Resolution::Exact));
        }
        if let Some(target) = self.aliases.get(&key) {
            if self.index.contains_discipline(target) {
                return Some((target.clone(), Resolution::Alias));
            }
        }
        if !self.policy.substring_fallback {
            return None;
        }

        let needle = key.to_lowercase();
        self.index
            .disciplines()
            .iter()
            .find(|known| {
                let known = known.to_lowercase();
                known.contains(&needle) || needle.contains(&known)
            })
            .map(|known| (known.clone(), Resolution::Containment))
    }

    pub fn match_record(&self, record: &StudentRecord, log: &mut ProcessingLog) -> StudentResult {
        log.push(
            LogKind::Info,
            format!("student {} (line {})", record.identity, record.line),
        );

        let mut result = StudentResult::default();
        for slot in &record.slots {
            let outcome = self.visit_slot(slot, &mut result);
            let (kind, message) = outcome.log_line(slot.ordinal);
            log.push(kind, message);
            result.outcomes.push(outcome);
        }

        if result.is_empty() {
            log.push(LogKind::Info, "  result: empty");
        } else {
            log.push(
                LogKind::Info,
                format!("  result: {} entries", result.entries.len()),
            );
        }
        result
    }

    fn visit_slot(&self, slot: &Slot, result: &mut StudentResult) -> SlotOutcome {
        if !slot.present {
            return SlotOutcome::Skipped(SkipReason::ColumnsAbsent);
        }
        let (Some(raw), Some(label)) = (
            non_blank(slot.discipline.as_deref()),
            non_blank(slot.grade.as_deref()),
        ) else {
            return SlotOutcome::Skipped(SkipReason::MissingField);
        };
        let Some(grade) = Grade::parse(label) else {
            return SlotOutcome::Skipped(SkipReason::UnrecognizedGrade(label.to_string()));
        };
        let Some((discipline, resolution)) = self.resolve(raw) else {
            return SlotOutcome::Unmatched {
                raw: raw.to_string(),
                grade,
                reason: UnmatchReason::UnknownDiscipline,
            };
        };
        let Some(description) = self.index.get(&discipline, grade) else {
            return SlotOutcome::Unmatched {
                raw: raw.to_string(),
                grade,
                reason: UnmatchReason::NoDescriptionForGrade { discipline },
            };
        };

        if result.position_of(&discipline, Some(grade)).is_some() {
            return SlotOutcome::Duplicate { discipline, grade };
        }

        let entry = ResultEntry {
            discipline: discipline.clone(),
            grade,
            display: self.display_name(slot, raw),
            description: description.to_string(),
        };

        if self.policy.best_grade_wins {
            if let Some(position) = result.position_of(&discipline, None) {
                let recorded = result.entries[position].grade;
                if grade < recorded {
                    return SlotOutcome::Skipped(SkipReason::LowerThanRecorded {
                        discipline,
                        grade,
                        recorded,
                    });
                }
                result.entries[position] = entry;
                return SlotOutcome::Upgraded {
                    discipline,
                    from: recorded,
                    to: grade,
                };
            }
        }

        result.entries.push(entry);
        SlotOutcome::Matched {
            raw: raw.to_string(),
            discipline,
            grade,
            resolution,
        }
    }

    fn display_name(&self, slot: &Slot, raw: &str) -> String {
        let name = non_blank(slot.short_name.as_deref())
            .unwrap_or_else(|| self.normalizer.display(raw));
        if self.policy.capitalize_display {
            capitalize_first(name)
        } else {
            name.to_string()
        }
    }
}
