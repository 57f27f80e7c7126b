use std::io;
use std::path::Path;

use csv::StringRecord;
use sha2::{Digest, Sha256};

use crate::config::ColumnLayout;
use crate::error::{SourceError, SourceFormatError};
use crate::models::{ReferenceRow, Slot, StudentRecord, WideReferenceRow};
use crate::processing_log::{LogKind, ProcessingLog};

const REFERENCE: &str = "reference";
const STUDENTS: &str = "student";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceShape {
    /// One row per (discipline, level, description).
    Flat,
    /// One row per discipline with a description column per grade.
    Wide,
}

#[derive(Debug, Clone)]
pub struct ReferenceSource {
    pub shape: ReferenceShape,
    pub rows: Vec<ReferenceRow>,
    pub digest: String,
    /// Rows that could not be read at all.
    pub log: ProcessingLog,
}

#[derive(Debug, Clone)]
pub struct StudentTable {
    pub headers: Vec<String>,
    pub records: Vec<StudentRecord>,
    /// Short-name columns, used only for display and dropped from the output.
    pub helper_columns: Vec<usize>,
    pub log: ProcessingLog,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

struct SlotColumns {
    ordinal: usize,
    discipline: Option<usize>,
    grade: Option<usize>,
    short_name: Option<usize>,
}

impl SlotColumns {
    fn present(&self) -> bool {
        self.discipline.is_some() && self.grade.is_some()
    }
}

struct SourceRecord {
    line: usize,
    position: usize,
    record: StringRecord,
}

pub fn load_reference(path: &Path, layout: &ColumnLayout) -> Result<ReferenceSource, SourceError> {
    let bytes = std::fs::read(path)?;
    read_reference(&bytes, layout)
}

pub fn read_reference(bytes: &[u8], layout: &ColumnLayout) -> Result<ReferenceSource, SourceError> {
    let mut reader = csv_reader(bytes);
    let headers = read_headers(&mut reader, REFERENCE)?;

    let discipline = require(&headers, &layout.reference_discipline, REFERENCE)?;
    let level = find_column(&headers, &layout.reference_level);
    let description = find_column(&headers, &layout.reference_description);
    let wide = (
        find_column(&headers, &layout.reference_satisfactory),
        find_column(&headers, &layout.reference_good),
        find_column(&headers, &layout.reference_excellent),
    );

    let mut log = ProcessingLog::new();
    let (shape, rows) = match (level, description, wide) {
        (Some(level), Some(description), _) => {
            let rows = decoded_records(&mut reader, REFERENCE, &mut log)?
                .into_iter()
                .map(|source| ReferenceRow {
                    line: source.line,
                    discipline: cell(&source.record, discipline),
                    level: cell(&source.record, level),
                    description: cell(&source.record, description),
                })
                .collect();
            (ReferenceShape::Flat, rows)
        }
        (_, _, (Some(satisfactory), Some(good), Some(excellent))) => {
            let rows = decoded_records(&mut reader, REFERENCE, &mut log)?
                .into_iter()
                .flat_map(|source| {
                    WideReferenceRow {
                        line: source.line,
                        discipline: cell(&source.record, discipline),
                        satisfactory: cell(&source.record, satisfactory),
                        good: cell(&source.record, good),
                        excellent: cell(&source.record, excellent),
                    }
                    .into_rows()
                })
                .collect();
            (ReferenceShape::Wide, rows)
        }
        _ => {
            let missing = if level.is_none() {
                &layout.reference_level
            } else {
                &layout.reference_description
            };
            return Err(missing_column(REFERENCE, missing).into());
        }
    };

    Ok(ReferenceSource {
        shape,
        rows,
        digest: sha256_hex(bytes),
        log,
    })
}

pub fn load_students(path: &Path, layout: &ColumnLayout) -> Result<StudentTable, SourceError> {
    let file = std::fs::File::open(path)?;
    read_students(file, layout)
}

pub fn read_students<R: io::Read>(
    reader: R,
    layout: &ColumnLayout,
) -> Result<StudentTable, SourceError> {
    let mut reader = csv_reader(reader);
    let headers = read_headers(&mut reader, STUDENTS)?;

    let identity = layout
        .student_identity
        .iter()
        .find_map(|column| find_column(&headers, column));

    let slot_columns: Vec<SlotColumns> = (1..=layout.slots)
        .map(|ordinal| SlotColumns {
            ordinal,
            discipline: find_column(&headers, &layout.discipline_column(ordinal)),
            grade: find_column(&headers, &layout.grade_column(ordinal)),
            short_name: find_column(&headers, &layout.short_name_column(ordinal)),
        })
        .collect();

    if !slot_columns.iter().any(SlotColumns::present) {
        let column = match slot_columns.first() {
            Some(first) if first.discipline.is_some() => layout.grade_column(1),
            _ => layout.discipline_column(1),
        };
        return Err(missing_column(STUDENTS, &column).into());
    }

    let helper_columns = slot_columns
        .iter()
        .filter_map(|columns| columns.short_name)
        .collect();

    let mut log = ProcessingLog::new();
    let mut records = Vec::new();
    for SourceRecord {
        line,
        position,
        record,
    } in decoded_records(&mut reader, STUDENTS, &mut log)?
    {
        let identity = identity
            .and_then(|column| cell(&record, column))
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| format!("Student {}", position + 1));

        let slots = slot_columns
            .iter()
            .map(|columns| Slot {
                ordinal: columns.ordinal,
                discipline: columns.discipline.and_then(|column| cell(&record, column)),
                short_name: columns.short_name.and_then(|column| cell(&record, column)),
                grade: columns.grade.and_then(|column| cell(&record, column)),
                present: columns.present(),
            })
            .collect();

        if record.len() > headers.len() {
            log.push(
                LogKind::Info,
                format!(
                    "{STUDENTS} line {line}: {} cells beyond the header row dropped",
                    record.len() - headers.len()
                ),
            );
        }
        let mut cells: Vec<String> = record.iter().map(str::to_string).collect();
        cells.resize(headers.len(), String::new());

        records.push(StudentRecord {
            line,
            identity,
            cells,
            slots,
        });
    }

    Ok(StudentTable {
        headers: headers.iter().map(str::to_string).collect(),
        records,
        helper_columns,
        log,
    })
}

pub fn write_output<W: io::Write>(table: &OutputTable, writer: W) -> Result<(), SourceError> {
    let mut writer = csv::Writer::from_writer(writer);
    writer.write_record(&table.headers)?;
    for row in &table.rows {
        writer.write_record(row)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn save_output(path: &Path, table: &OutputTable) -> Result<(), SourceError> {
    let file = std::fs::File::create(path)?;
    write_output(table, file)
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

fn csv_reader<R: io::Read>(reader: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(reader)
}

fn read_headers<R: io::Read>(
    reader: &mut csv::Reader<R>,
    source_name: &str,
) -> Result<StringRecord, SourceError> {
    let headers = reader.headers()?.clone();
    if headers.iter().all(|header| header.trim().is_empty()) {
        return Err(SourceFormatError::Empty {
            source_name: source_name.to_string(),
        }
        .into());
    }
    Ok(headers)
}

/// Reads every data row. Rows that fail to parse or are not valid UTF-8 are logged and
/// skipped; only I/O failures abort.
fn decoded_records<R: io::Read>(
    reader: &mut csv::Reader<R>,
    source_name: &str,
    log: &mut ProcessingLog,
) -> Result<Vec<SourceRecord>, SourceError> {
    let mut records = Vec::new();
    for (position, result) in reader.byte_records().enumerate() {
        let fallback_line = position + 2;
        let record = match result {
            Ok(record) => record,
            Err(err) if err.is_io_error() => return Err(err.into()),
            Err(err) => {
                let line = err
                    .position()
                    .map(|position| position.line() as usize)
                    .unwrap_or(fallback_line);
                log.push(
                    LogKind::RowSkipped,
                    format!("{source_name} line {line}: skipped, unreadable row ({err})"),
                );
                continue;
            }
        };

        let line = record
            .position()
            .map(|position| position.line() as usize)
            .unwrap_or(fallback_line);
        match StringRecord::from_byte_record(record) {
            Ok(record) => records.push(SourceRecord {
                line,
                position,
                record,
            }),
            Err(_) => log.push(
                LogKind::RowSkipped,
                format!("{source_name} line {line}: skipped, not valid UTF-8"),
            ),
        }
    }
    Ok(records)
}

fn find_column(headers: &StringRecord, name: &str) -> Option<usize> {
    let wanted = name.trim().to_lowercase();
    headers
        .iter()
        .position(|header| header.trim().to_lowercase() == wanted)
}

fn require(headers: &StringRecord, name: &str, source_name: &str) -> Result<usize, SourceError> {
    find_column(headers, name).ok_or_else(|| missing_column(source_name, name).into())
}

fn missing_column(source_name: &str, column: &str) -> SourceFormatError {
    SourceFormatError::MissingColumn {
        source_name: source_name.to_string(),
        column: column.to_string(),
    }
}

fn cell(record: &StringRecord, column: usize) -> Option<String> {
    record.get(column).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_reference_is_read_per_row() {
        let csv = "Discipline,Level,Description\nMath,Good,Solves equations\nArt,Excellent,\"Paints\nSculpts\"\n";
        let source = read_reference(csv.as_bytes(), &ColumnLayout::default()).unwrap();

        assert_eq!(source.shape, ReferenceShape::Flat);
        assert_eq!(source.rows.len(), 2);
        assert_eq!(source.rows[0].line, 2);
        assert_eq!(source.rows[1].description.as_deref(), Some("Paints\nSculpts"));
        assert_eq!(source.digest, sha256_hex(csv.as_bytes()));
    }

    #[test]
    fn wide_reference_expands_to_triples() {
        let csv = "Discipline,Satisfactory,Good,Excellent\nMath,adds,solves,proves\n";
        let source = read_reference(csv.as_bytes(), &ColumnLayout::default()).unwrap();

        assert_eq!(source.shape, ReferenceShape::Wide);
        assert_eq!(source.rows.len(), 3);
        assert_eq!(source.rows[2].level.as_deref(), Some("Excellent"));
        assert_eq!(source.rows[2].description.as_deref(), Some("proves"));
    }

    #[test]
    fn reference_without_level_columns_names_missing_column() {
        let csv = "Discipline,Description\nMath,x\n";
        let err = read_reference(csv.as_bytes(), &ColumnLayout::default()).unwrap_err();

        match err {
            SourceError::Format(SourceFormatError::MissingColumn { column, source_name }) => {
                assert_eq!(column, "Level");
                assert_eq!(source_name, "reference");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn reference_without_discipline_fails() {
        let csv = "Subject,Level,Description\nMath,Good,x\n";
        let err = read_reference(csv.as_bytes(), &ColumnLayout::default()).unwrap_err();
        assert!(err.to_string().contains("'Discipline'"));
    }

    #[test]
    fn empty_source_is_rejected() {
        let err = read_students("".as_bytes(), &ColumnLayout::default()).unwrap_err();
        assert!(matches!(
            err,
            SourceError::Format(SourceFormatError::Empty { .. })
        ));
    }

    #[test]
    fn students_read_slots_and_helper_columns() {
        let csv = "Email,Discipline 1,Short Name 1,Grade 1,Discipline 2,Grade 2\n\
                   avery@example.com,Independent exam in Math,Math,Good,Art,Excellent\n\
                   ,Physics,,Satisfactory\n";
        let table = read_students(csv.as_bytes(), &ColumnLayout::default()).unwrap();

        assert_eq!(table.helper_columns, vec![2]);
        assert_eq!(table.records.len(), 2);

        let first = &table.records[0];
        assert_eq!(first.identity, "avery@example.com");
        assert_eq!(first.slots.len(), 3);
        assert_eq!(first.slots[0].short_name.as_deref(), Some("Math"));
        assert!(first.slots[1].present);
        assert!(!first.slots[2].present);

        let second = &table.records[1];
        assert_eq!(second.identity, "Student 2");
        assert_eq!(second.cells.len(), 6);
        assert_eq!(second.slots[1].discipline, None);
    }

    #[test]
    fn students_without_slot_columns_fail() {
        let csv = "Email,Discipline 1\na@example.com,Math\n";
        let err = read_students(csv.as_bytes(), &ColumnLayout::default()).unwrap_err();
        assert!(err.to_string().contains("'Grade 1'"));
    }

    #[test]
    fn output_is_written_as_csv() {
        let table = OutputTable {
            headers: vec!["Email".to_string(), "Final Result".to_string()],
            rows: vec![vec![
                "a@example.com".to_string(),
                "Math:\nSolves".to_string(),
            ]],
        };
        let mut buffer = Vec::new();
        write_output(&table, &mut buffer).unwrap();

        let written = String::from_utf8(buffer).unwrap();
        assert_eq!(written, "Email,Final Result\na@example.com,\"Math:\nSolves\"\n");
    }

    #[test]
    fn digest_is_stable_hex() {
        let digest = sha256_hex(b"abc");
        assert_eq!(
            digest,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn reference_row_with_invalid_utf8_is_skipped() {
        let mut csv = b"Discipline,Level,Description\nMath,Good,Solves\nArt,Good,bad ".to_vec();
        csv.extend_from_slice(&[0xff, 0xfe]);
        csv.extend_from_slice(b"\nMusic,Excellent,Sings\n");

        let source = read_reference(&csv, &ColumnLayout::default()).unwrap();

        let disciplines: Vec<&str> = source
            .rows
            .iter()
            .filter_map(|row| row.discipline.as_deref())
            .collect();
        assert_eq!(disciplines, vec!["Math", "Music"]);
        assert_eq!(source.log.count(LogKind::RowSkipped), 1);
        assert!(source.log.render().contains("reference line 3: skipped, not valid UTF-8"));
    }

    #[test]
    fn student_row_with_invalid_utf8_is_skipped() {
        let mut csv = b"Email,Discipline 1,Grade 1\na@example.com,Math,Good\nb@example.com,Art ".to_vec();
        csv.extend_from_slice(&[0xc3, 0x28]);
        csv.extend_from_slice(b",Good\nc@example.com,Music,Excellent\n");

        let table = read_students(csv.as_slice(), &ColumnLayout::default()).unwrap();

        let identities: Vec<&str> = table
            .records
            .iter()
            .map(|record| record.identity.as_str())
            .collect();
        assert_eq!(identities, vec!["a@example.com", "c@example.com"]);
        assert_eq!(table.records[1].line, 4);
        assert!(table.log.render().contains("student line 3: skipped, not valid UTF-8"));
    }

    #[test]
    fn cells_beyond_header_are_reported() {
        let csv = "Email,Discipline 1,Grade 1\nb@example.com,Math,Good,extra note\n";
        let table = read_students(csv.as_bytes(), &ColumnLayout::default()).unwrap();

        assert_eq!(table.records[0].cells, vec!["b@example.com", "Math", "Good"]);
        assert!(table
            .log
            .render()
            .contains("student line 2: 1 cells beyond the header row dropped"));
    }

    #[test]
    fn files_round_trip_through_a_run() {
        use std::io::Write;

        let reference_csv = "Discipline,Satisfactory,Good,Excellent\n\
                             Math,Adds numbers,Solves linear equations,Proves theorems\n";
        let students_csv = "Email,Discipline 1,Short Name 1,Grade 1\n\
                            avery@example.com,Independent exam in Math,Mathematics,Good\n\
                            jules@example.com,History,,Excellent\n";

        let mut reference_file = tempfile::NamedTempFile::new().unwrap();
        reference_file.write_all(reference_csv.as_bytes()).unwrap();
        let mut students_file = tempfile::NamedTempFile::new().unwrap();
        students_file.write_all(students_csv.as_bytes()).unwrap();
        let out_file = tempfile::NamedTempFile::new().unwrap();

        let layout = ColumnLayout::default();
        let reference = load_reference(reference_file.path(), &layout).unwrap();
        assert_eq!(reference.shape, ReferenceShape::Wide);
        assert_eq!(
            reference.digest,
            sha256_hex(&std::fs::read(reference_file.path()).unwrap())
        );

        let students = load_students(students_file.path(), &layout).unwrap();
        let output = crate::pipeline::run(reference, &students, &crate::config::Config::default());
        save_output(out_file.path(), &output.table).unwrap();

        let mut reader = csv::Reader::from_path(out_file.path()).unwrap();
        let headers: Vec<String> = reader.headers().unwrap().iter().map(str::to_string).collect();
        assert_eq!(headers, vec!["Email", "Discipline 1", "Grade 1", "Final Result"]);

        let rows: Vec<StringRecord> = reader.records().map(Result::unwrap).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(&rows[0][3], "Mathematics:\nSolves linear equations");
        assert_eq!(&rows[1][3], "No data to process");
    }
}
