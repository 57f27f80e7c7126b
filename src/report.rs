use std::fmt::Write;

use chrono::{DateTime, Utc};

use crate::matcher::{SlotOutcome, StudentResult};
use crate::pipeline::RunStats;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnmatchedSummary {
    pub discipline: String,
    pub count: usize,
}

pub fn summarize_unmatched(results: &[StudentResult]) -> Vec<UnmatchedSummary> {
    let mut map: std::collections::HashMap<String, usize> = std::collections::HashMap::new();

    for outcome in results.iter().flat_map(|result| result.outcomes.iter()) {
        if let SlotOutcome::Unmatched { raw, .. } = outcome {
            *map.entry(raw.clone()).or_insert(0) += 1;
        }
    }

    let mut summaries: Vec<UnmatchedSummary> = map
        .into_iter()
        .map(|(discipline, count)| UnmatchedSummary { discipline, count })
        .collect();

    summaries.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.discipline.cmp(&b.discipline)));
    summaries
}

pub fn build_report(
    reference_digest: &str,
    generated_at: DateTime<Utc>,
    stats: &RunStats,
    results: &[StudentResult],
) -> String {
    let unmatched = summarize_unmatched(results);

    let mut output = String::new();

    let _ = writeln!(output, "# Skill Certificate Run");
    let _ = writeln!(
        output,
        "Generated {} from reference sha256 {}",
        generated_at.format("%Y-%m-%d %H:%M UTC"),
        reference_digest
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Reference");
    let _ = writeln!(
        output,
        "- {} disciplines, {} descriptions",
        stats.reference_disciplines, stats.reference_descriptions
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Students");
    let _ = writeln!(output, "- {} processed", stats.students);
    let _ = writeln!(output, "- {} skill entries written", stats.entries);
    let _ = writeln!(output, "- {} with no matching skills", stats.empty_results);
    let _ = writeln!(output);
    let _ = writeln!(output, "## Issues");
    let _ = writeln!(output, "- skipped: {}", stats.skipped);
    let _ = writeln!(output, "- unrecognized grades: {}", stats.unrecognized_grades);
    let _ = writeln!(output, "- no match: {}", stats.no_match);
    let _ = writeln!(output, "- duplicates suppressed: {}", stats.duplicates);
    let _ = writeln!(output);
    let _ = writeln!(output, "## Unmatched Disciplines");

    if unmatched.is_empty() {
        let _ = writeln!(output, "Every discipline was found in the reference.");
    } else {
        for summary in unmatched.iter().take(10) {
            let _ = writeln!(output, "- {}: {} slots", summary.discipline, summary.count);
        }
    }

    output
}
