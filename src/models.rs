use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Grade {
    Satisfactory,
    Good,
    Excellent,
}

impl Grade {
    pub const ALL: [Grade; 3] = [Grade::Satisfactory, Grade::Good, Grade::Excellent];

    /// Accepts the English label, the Russian label used in exported rosters, or the
    /// five-point score. Matching ignores surrounding whitespace and case.
    pub fn parse(label: &str) -> Option<Grade> {
        let label = label.trim().to_lowercase();
        match label.as_str() {
            "satisfactory" | "удовлетворительно" | "3" => Some(Grade::Satisfactory),
            "good" | "хорошо" | "4" => Some(Grade::Good),
            "excellent" | "отлично" | "5" => Some(Grade::Excellent),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Grade::Satisfactory => "Satisfactory",
            Grade::Good => "Good",
            Grade::Excellent => "Excellent",
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A validated reference row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkillEntry {
    pub discipline: String,
    pub level: Grade,
    pub description: String,
}

/// One reference row in per-triple form, before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceRow {
    pub line: usize,
    pub discipline: Option<String>,
    pub level: Option<String>,
    pub description: Option<String>,
}

/// One reference row in document-table form: a discipline with one description column
/// per grade.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WideReferenceRow {
    pub line: usize,
    pub discipline: Option<String>,
    pub satisfactory: Option<String>,
    pub good: Option<String>,
    pub excellent: Option<String>,
}

impl WideReferenceRow {
    pub fn into_rows(self) -> Vec<ReferenceRow> {
        let columns = [
            (Grade::Satisfactory, self.satisfactory),
            (Grade::Good, self.good),
            (Grade::Excellent, self.excellent),
        ];

        columns
            .into_iter()
            .map(|(grade, description)| ReferenceRow {
                line: self.line,
                discipline: self.discipline.clone(),
                level: Some(grade.label().to_string()),
                description,
            })
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Slot {
    pub ordinal: usize,
    pub discipline: Option<String>,
    pub short_name: Option<String>,
    pub grade: Option<String>,
    /// False when the source has no discipline or grade column for this ordinal.
    pub present: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudentRecord {
    pub line: usize,
    pub identity: String,
    pub cells: Vec<String>,
    pub slots: Vec<Slot>,
}

/// Treats whitespace-only text as absent.
pub fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}
