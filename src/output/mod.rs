//! Output formatters for run summaries, result listings and mutant diffs.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use colored::Colorize;
use serde::Serialize;
use similar::TextDiff;

use crate::cache::CachedMutant;
use crate::core::Result;
use crate::mutation::{MutationStatus, RunSummary};

/// Output format enum.
#[derive(Clone, Copy, Debug, Default)]
pub enum Format {
    Json,
    #[default]
    Text,
}

/// Result listing sections, in display order.
const SECTIONS: [(&str, &str, &[MutationStatus]); 4] = [
    ("timeout", "Timed out ⏰", &[MutationStatus::Timeout]),
    ("suspicious", "Suspicious 🤔", &[MutationStatus::Suspicious]),
    ("survived", "Survived 🙁", &[MutationStatus::Survived]),
    (
        "skipped",
        "Untested/skipped 🔇",
        &[MutationStatus::Skipped, MutationStatus::Untested],
    ),
];

impl Format {
    pub fn format<T: Serialize, W: Write>(&self, data: &T, writer: &mut W) -> Result<()> {
        serde_json::to_writer_pretty(&mut *writer, data)?;
        writeln!(writer)?;
        Ok(())
    }

    /// Totals of a finished run.
    pub fn write_summary<W: Write>(&self, summary: &RunSummary, writer: &mut W) -> Result<()> {
        match self {
            Format::Json => self.format(summary, writer),
            Format::Text => {
                writeln!(writer)?;
                writeln!(writer, "{summary}")?;
                writeln!(
                    writer,
                    "Mutation score: {:.1}%",
                    summary.mutation_score() * 100.0
                )?;
                Ok(())
            }
        }
    }

    /// Mutants that were not killed, grouped by status and file.
    pub fn write_results<W: Write>(&self, mutants: &[CachedMutant], writer: &mut W) -> Result<()> {
        let grouped = group_results(mutants);
        if let Format::Json = self {
            return self.format(&grouped, writer);
        }

        writeln!(writer, "To apply a mutant on disk:")?;
        writeln!(writer, "    mutiny apply <id>")?;
        writeln!(writer)?;
        writeln!(writer, "To show a mutant:")?;
        writeln!(writer, "    mutiny show <id>")?;
        writeln!(writer)?;

        for (key, title, _) in SECTIONS {
            let Some(files) = grouped.get(key) else {
                continue;
            };
            let count: usize = files.values().map(Vec::len).sum();
            let header = format!("{title} ({count})");
            let header = match key {
                "survived" => header.as_str().red().bold(),
                "skipped" => header.as_str().dimmed(),
                _ => header.as_str().yellow().bold(),
            };
            writeln!(writer)?;
            writeln!(writer, "{header}")?;
            for (filename, ids) in files {
                writeln!(writer)?;
                writeln!(writer, "---- {filename} ({}) ----", ids.len())?;
                writeln!(writer)?;
                writeln!(writer, "{}", id_ranges(ids))?;
            }
        }
        Ok(())
    }

    pub fn write_ids<W: Write>(&self, ids: &[i64], writer: &mut W) -> Result<()> {
        match self {
            Format::Json => self.format(&ids, writer),
            Format::Text => {
                let line: Vec<String> = ids.iter().map(i64::to_string).collect();
                writeln!(writer, "{}", line.join(" "))?;
                Ok(())
            }
        }
    }

    /// Mutant diffs, each headed by its id and status.
    pub fn write_mutants<W: Write>(
        &self,
        shown: &[(CachedMutant, String)],
        writer: &mut W,
    ) -> Result<()> {
        match self {
            Format::Json => {
                #[derive(Serialize)]
                struct Shown<'a> {
                    id: i64,
                    filename: &'a Path,
                    line: usize,
                    status: MutationStatus,
                    diff: &'a str,
                }
                let shown: Vec<Shown<'_>> = shown
                    .iter()
                    .map(|(mutant, diff)| Shown {
                        id: mutant.id,
                        filename: &mutant.filename,
                        line: mutant.address.line_number + 1,
                        status: mutant.status,
                        diff,
                    })
                    .collect();
                self.format(&shown, writer)
            }
            Format::Text => {
                for (mutant, diff) in shown {
                    writeln!(
                        writer,
                        "# {}: {} [{}]",
                        mutant.id,
                        mutant.filename.display(),
                        mutant.status
                    )?;
                    writeln!(writer, "{diff}")?;
                }
                Ok(())
            }
        }
    }
}

type Grouped = BTreeMap<&'static str, BTreeMap<String, Vec<i64>>>;

fn group_results(mutants: &[CachedMutant]) -> Grouped {
    let mut grouped: Grouped = BTreeMap::new();
    for mutant in mutants {
        let Some((key, _, _)) = SECTIONS
            .iter()
            .find(|(_, _, statuses)| statuses.contains(&mutant.status))
        else {
            continue;
        };
        grouped
            .entry(*key)
            .or_default()
            .entry(mutant.filename.display().to_string())
            .or_default()
            .push(mutant.id);
    }
    for files in grouped.values_mut() {
        for ids in files.values_mut() {
            ids.sort_unstable();
        }
    }
    grouped
}

/// Collapse sorted ids into runs: `1-3, 5, 7-8`.
pub fn id_ranges(ids: &[i64]) -> String {
    let mut runs: Vec<(i64, i64)> = Vec::new();
    for &id in ids {
        match runs.last_mut() {
            Some((_, end)) if *end + 1 == id => *end = id,
            _ => runs.push((id, id)),
        }
    }
    runs.into_iter()
        .map(|(start, end)| {
            if start == end {
                start.to_string()
            } else {
                format!("{start}-{end}")
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Unified diff between a file and its mutated form.
pub fn unified_diff(filename: &Path, original: &str, mutated: &str) -> String {
    let name = filename.display().to_string();
    TextDiff::from_lines(original, mutated)
        .unified_diff()
        .context_radius(3)
        .header(&name, &name)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mutation::MutantAddress;
    use std::path::PathBuf;

    fn mutant(id: i64, filename: &str, status: MutationStatus) -> CachedMutant {
        CachedMutant {
            id,
            filename: PathBuf::from(filename),
            address: MutantAddress::new(0, 0, "x = 1"),
            status,
            tests_hash: None,
        }
    }

    #[test]
    fn test_id_ranges() {
        assert_eq!(id_ranges(&[]), "");
        assert_eq!(id_ranges(&[4]), "4");
        assert_eq!(id_ranges(&[1, 2, 3, 5, 7, 8]), "1-3, 5, 7-8");
    }

    #[test]
    fn test_group_results_skips_killed() {
        let mutants = vec![
            mutant(1, "a.py", MutationStatus::Killed),
            mutant(3, "a.py", MutationStatus::Survived),
            mutant(2, "a.py", MutationStatus::Survived),
            mutant(4, "b.py", MutationStatus::Untested),
            mutant(5, "b.py", MutationStatus::Skipped),
        ];
        let grouped = group_results(&mutants);
        assert_eq!(grouped["survived"]["a.py"], vec![2, 3]);
        assert_eq!(grouped["skipped"]["b.py"], vec![4, 5]);
        assert!(!grouped.contains_key("timeout"));
    }

    #[test]
    fn test_write_results_text() {
        let mutants = vec![
            mutant(1, "src/a.py", MutationStatus::Survived),
            mutant(2, "src/a.py", MutationStatus::Survived),
            mutant(3, "src/b.py", MutationStatus::Timeout),
        ];
        let mut out = Vec::new();
        Format::Text.write_results(&mutants, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("mutiny apply <id>"));
        assert!(text.contains("---- src/a.py (2) ----"));
        assert!(text.contains("1-2"));
        assert!(text.find("Timed out").unwrap() < text.find("Survived").unwrap());
    }

    #[test]
    fn test_write_results_json() {
        let mutants = vec![mutant(9, "a.py", MutationStatus::Suspicious)];
        let mut out = Vec::new();
        Format::Json.write_results(&mutants, &mut out).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["suspicious"]["a.py"][0], 9);
    }

    #[test]
    fn test_write_ids() {
        let mut out = Vec::new();
        Format::Text.write_ids(&[1, 4, 9], &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "1 4 9\n");
    }

    #[test]
    fn test_unified_diff() {
        let diff = unified_diff(Path::new("a.py"), "x = 1\ny = 2\n", "x = 2\ny = 2\n");
        assert!(diff.starts_with("--- a.py\n+++ a.py\n"));
        assert!(diff.contains("-x = 1\n"));
        assert!(diff.contains("+x = 2\n"));
    }

    #[test]
    fn test_write_mutants_json() {
        let shown = vec![(mutant(2, "a.py", MutationStatus::Survived), "diff".to_string())];
        let mut out = Vec::new();
        Format::Json.write_mutants(&shown, &mut out).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value[0]["id"], 2);
        assert_eq!(value[0]["line"], 1);
        assert_eq!(value[0]["status"], "survived");
    }

    #[test]
    fn test_write_summary_text() {
        let summary = RunSummary {
            total: 4,
            killed: 3,
            survived: 1,
            ..RunSummary::default()
        };
        let mut out = Vec::new();
        Format::Text.write_summary(&summary, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("4 mutants: 3 killed, 1 survived"));
        assert!(text.contains("Mutation score: 75.0%"));
    }
}
