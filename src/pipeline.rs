use serde::Serialize;

use crate::config::Config;
use crate::matcher::{StudentRecordMatcher, StudentResult};
use crate::models::ReferenceRow;
use crate::normalize::DisciplineNormalizer;
use crate::processing_log::{LogKind, ProcessingLog};
use crate::reference::{ReferenceIndex, ReferenceIndexBuilder};
use crate::source::{OutputTable, ReferenceSource, StudentTable};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    pub students: usize,
    pub empty_results: usize,
    pub entries: usize,
    pub reference_disciplines: usize,
    pub reference_descriptions: usize,
    pub skipped: usize,
    pub unrecognized_grades: usize,
    pub no_match: usize,
    pub duplicates: usize,
}

#[derive(Debug, Clone)]
pub struct RunOutput {
    pub table: OutputTable,
    pub results: Vec<StudentResult>,
    pub log: ProcessingLog,
    pub stats: RunStats,
}

pub fn build_index(
    rows: impl IntoIterator<Item = ReferenceRow>,
    config: &Config,
) -> (ReferenceIndex, ProcessingLog) {
    let normalizer = DisciplineNormalizer::new(&config.normalize);
    let mut builder = ReferenceIndexBuilder::new(normalizer, config.dedup_description_lines);
    builder.extend(rows);
    builder.build()
}

/// Builds the reference index from every row, then matches each student in input order.
pub fn run(reference: ReferenceSource, students: &StudentTable, config: &Config) -> RunOutput {
    let ReferenceSource {
        rows: reference_rows,
        log: reference_source_log,
        ..
    } = reference;
    let (index, reference_log) = build_index(reference_rows, config);

    let mut log = ProcessingLog::new();
    log.extend(reference_source_log);
    log.extend(reference_log);
    log.extend(students.log.clone());
    log.push(
        LogKind::Info,
        format!("processing {} students", students.records.len()),
    );

    let mut headers: Vec<String> = students
        .headers
        .iter()
        .enumerate()
        .filter(|(column, _)| !students.helper_columns.contains(column))
        .map(|(_, header)| header.clone())
        .collect();
    let wanted = config.result_column.trim().to_lowercase();
    let result_column = headers
        .iter()
        .position(|header| header.trim().to_lowercase() == wanted);
    match result_column {
        Some(column) => log.push(
            LogKind::Info,
            format!(
                "existing '{}' column (position {}) is overwritten with results",
                headers[column],
                column + 1
            ),
        ),
        None => headers.push(config.result_column.clone()),
    }

    let normalizer = DisciplineNormalizer::new(&config.normalize);
    let matcher = StudentRecordMatcher::new(&index, &normalizer, config.matching.clone())
        .with_aliases(&config.aliases);

    let mut rows = Vec::with_capacity(students.records.len());
    let mut results = Vec::with_capacity(students.records.len());
    for record in &students.records {
        let result = matcher.match_record(record, &mut log);
        let text = result.text(&config.empty_placeholder);

        let mut row: Vec<String> = record
            .cells
            .iter()
            .enumerate()
            .filter(|(column, _)| !students.helper_columns.contains(column))
            .map(|(_, value)| value.clone())
            .collect();
        match result_column {
            Some(column) => row[column] = text,
            None => row.push(text),
        }
        rows.push(row);
        results.push(result);
    }

    log.push(
        LogKind::Info,
        format!("processed {} students", students.records.len()),
    );

    let stats = RunStats {
        students: results.len(),
        empty_results: results.iter().filter(|result| result.is_empty()).count(),
        entries: results.iter().map(|result| result.entries.len()).sum(),
        reference_disciplines: index.disciplines().len(),
        reference_descriptions: index.len(),
        skipped: log.count(LogKind::RowSkipped),
        unrecognized_grades: log.count(LogKind::UnrecognizedGrade),
        no_match: log.count(LogKind::NoMatchFound),
        duplicates: log.count(LogKind::DuplicateSuppressed),
    };
    tracing::info!(
        students = stats.students,
        empty = stats.empty_results,
        entries = stats.entries,
        "matching finished"
    );

    RunOutput {
        table: OutputTable { headers, rows },
        results,
        log,
        stats,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ColumnLayout;
    use crate::source::{read_reference, read_students};

    const REFERENCE: &str = "Discipline,Level,Description\n\
        Math,Good,Solves linear equations\n\
        Math,Excellent,Proves theorems\n\
        Independent exam in Digital literacy,Satisfactory,Uses email\n";

    const STUDENTS: &str = "Email,Discipline 1,Short Name 1,Grade 1,Discipline 2,Grade 2,Discipline 3,Grade 3\n\
        avery@example.com,Math,,Good,History,Excellent,Math,Passed\n\
        jules@example.com,Independent exam in Digital literacy,Digital literacy,Satisfactory,Math,Good,Math,Excellent\n\
        kiara@example.com,History,,Good,,,,\n";

    fn run_fixture(config: &Config) -> RunOutput {
        let layout = ColumnLayout::default();
        let reference = read_reference(REFERENCE.as_bytes(), &layout).unwrap();
        let students = read_students(STUDENTS.as_bytes(), &layout).unwrap();
        run(reference, &students, config)
    }

    #[test]
    fn appends_result_column_and_drops_short_names() {
        let output = run_fixture(&Config::default());

        assert_eq!(
            output.table.headers,
            vec![
                "Email",
                "Discipline 1",
                "Grade 1",
                "Discipline 2",
                "Grade 2",
                "Discipline 3",
                "Grade 3",
                "Final Result"
            ]
        );
        assert_eq!(output.table.rows.len(), 3);
        assert!(output.table.rows.iter().all(|row| row.len() == 8));
    }

    #[test]
    fn produces_one_result_per_student() {
        let output = run_fixture(&Config::default());
        let results: Vec<&str> = output
            .table
            .rows
            .iter()
            .map(|row| row[7].as_str())
            .collect();

        assert_eq!(results[0], "Math:\nSolves linear equations");
        assert_eq!(
            results[1],
            "Digital literacy:\nUses email\n\nMath:\nProves theorems"
        );
        assert_eq!(results[2], "No data to process");
    }

    #[test]
    fn stats_count_every_outcome() {
        let output = run_fixture(&Config::default());

        assert_eq!(output.stats.students, 3);
        assert_eq!(output.stats.empty_results, 1);
        assert_eq!(output.stats.entries, 3);
        assert_eq!(output.stats.reference_descriptions, 3);
        assert_eq!(output.stats.unrecognized_grades, 1);
        assert_eq!(output.stats.no_match, 2);
        assert_eq!(output.stats.skipped, 2);
    }

    #[test]
    fn placeholder_is_configurable() {
        let config = Config {
            empty_placeholder: String::new(),
            ..Config::default()
        };
        let output = run_fixture(&config);
        assert_eq!(output.table.rows[2][7], "");
    }

    #[test]
    fn repeated_runs_are_identical() {
        let config = Config::default();
        let first = run_fixture(&config);
        let second = run_fixture(&config);

        assert_eq!(first.table, second.table);
        assert_eq!(first.log.render(), second.log.render());
    }

    #[test]
    fn reference_log_precedes_student_log() {
        let output = run_fixture(&Config::default());
        let lines = output.log.lines();

        assert!(lines[0].contains("reference index built"));
        assert!(lines[1].contains("processing 3 students"));
        assert!(lines.last().unwrap().contains("processed 3 students"));
    }

    #[test]
    fn existing_result_column_is_overwritten() {
        let layout = ColumnLayout::default();
        let reference = read_reference(REFERENCE.as_bytes(), &layout).unwrap();
        let students = read_students(
            "Email,Final Result,Discipline 1,Grade 1\n\
             avery@example.com,stale text,Math,Good\n"
                .as_bytes(),
            &layout,
        )
        .unwrap();
        let output = run(reference, &students, &Config::default());

        assert_eq!(
            output.table.headers,
            vec!["Email", "Final Result", "Discipline 1", "Grade 1"]
        );
        assert_eq!(
            output.table.rows[0],
            vec!["avery@example.com", "Math:\nSolves linear equations", "Math", "Good"]
        );
        assert!(output.log.render().contains("existing 'Final Result' column"));
    }
}
