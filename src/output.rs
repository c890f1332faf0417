use std::io::{self, Write};

use serde::Serialize;

use crate::app::{
    BackupResult, ClassifyReport, EventLevel, ProgressEvent, ProgressSink, ReferenceResult,
    TemplateResult,
};
use crate::domain::RiskLabel;
use crate::reconcile::ReconcileSummary;

const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const RED: &str = "\x1b[31m";
const RESET: &str = "\x1b[0m";

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Interactive,
    NonInteractive,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_classify(report: &ClassifyReport) -> io::Result<()> {
        Self::print_json(report)
    }

    pub fn print_reconcile(summary: &ReconcileSummary) -> io::Result<()> {
        Self::print_json(summary)
    }

    pub fn print_reference(result: &ReferenceResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_backup(result: &BackupResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_template(result: &TemplateResult) -> io::Result<()> {
        Self::print_json(result)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}

/// Human-readable tables on stdout; warnings and errors on stderr.
pub struct TextOutput;

impl TextOutput {
    pub fn print_classify(report: &ClassifyReport) -> io::Result<()> {
        let mut out = io::stdout().lock();
        let color = match report.result.risk {
            RiskLabel::High => RED,
            RiskLabel::Moderate => YELLOW,
            RiskLabel::Low => GREEN,
        };

        writeln!(out, "{CYAN}Pathogenicity analysis{RESET}")?;
        writeln!(
            out,
            "input: {} (gram {}, {} reference records)",
            report.input, report.gram, report.reference_records
        )?;
        writeln!(out, "total score: {:.2}", report.result.total_score)?;
        writeln!(out, "{color}classification: {}{RESET}", report.result.label)?;
        writeln!(out)?;

        let gene_width = column_width("gene", report.result.details.iter().map(|d| d.gene.as_str()));
        let category_width = column_width(
            "category",
            report
                .result
                .details
                .iter()
                .map(|d| d.category.as_str())
                .chain(report.categories.keys().map(String::as_str)),
        );

        writeln!(out, "{:<gene_width$}  {:<category_width$}  {:>8}", "gene", "category", "score")?;
        for detail in &report.result.details {
            writeln!(
                out,
                "{:<gene_width$}  {:<category_width$}  {:>8.2}",
                detail.gene, detail.category, detail.score
            )?;
        }
        writeln!(out)?;

        writeln!(out, "{:<category_width$}  {:>5}  {:>9}", "category", "genes", "score sum")?;
        for (category, stats) in &report.categories {
            writeln!(
                out,
                "{:<category_width$}  {:>5}  {:>9.2}",
                category, stats.count, stats.score_sum
            )?;
        }
        Ok(())
    }

    pub fn print_reconcile(summary: &ReconcileSummary) -> io::Result<()> {
        let mut out = io::stdout().lock();
        writeln!(out, "{CYAN}Reference reconciliation{RESET}")?;
        writeln!(out, "{GREEN}automatic records: {}{RESET}", summary.automatic)?;
        match summary.manual {
            Some(count) => writeln!(out, "{GREEN}manual records: {count}{RESET}")?,
            None => writeln!(out, "{YELLOW}manual records: none (table not found){RESET}")?,
        }
        if !summary.skipped_organisms.is_empty() {
            writeln!(
                out,
                "{YELLOW}skipped organisms: {}{RESET}",
                summary.skipped_organisms.join(", ")
            )?;
        }
        writeln!(out, "total: {} records in {}", summary.total, summary.reference_path)?;
        Ok(())
    }

    pub fn print_reference(result: &ReferenceResult) -> io::Result<()> {
        let mut out = io::stdout().lock();
        writeln!(out, "{CYAN}{} ({} records){RESET}", result.path, result.records.len())?;
        let gene_width = column_width("gene", result.records.iter().map(|r| r.gene.as_str()));
        let category_width =
            column_width("category", result.records.iter().map(|r| r.category.as_str()));
        writeln!(
            out,
            "{:<gene_width$}  {:<category_width$}  {:<4}  {:>6}  evidence",
            "gene", "category", "gram", "weight"
        )?;
        for record in &result.records {
            writeln!(
                out,
                "{:<gene_width$}  {:<category_width$}  {:<4}  {:>6.2}  {}",
                record.gene, record.category, record.gram, record.weight, record.evidence
            )?;
        }
        Ok(())
    }

    pub fn print_backup(result: &BackupResult) -> io::Result<()> {
        println!("{GREEN}backup of {} written to {}{RESET}", result.source, result.backup);
        Ok(())
    }

    pub fn print_template(result: &TemplateResult) -> io::Result<()> {
        println!("{GREEN}template written to {}{RESET}", result.path);
        Ok(())
    }
}

impl ProgressSink for TextOutput {
    fn event(&self, event: ProgressEvent) {
        if let Some(line) = event_line(&event) {
            eprintln!("{line}");
        }
    }
}

/// Phase messages stay quiet unless they carry a timing.
fn event_line(event: &ProgressEvent) -> Option<String> {
    match (event.level, event.elapsed) {
        (EventLevel::Info, None) => None,
        (EventLevel::Info, Some(elapsed)) => Some(format!(
            "{CYAN}{} ({:.2}s){RESET}",
            event.message,
            elapsed.as_secs_f64()
        )),
        (EventLevel::Warning, _) => Some(format!("{YELLOW}warning: {}{RESET}", event.message)),
        (EventLevel::Error, _) => Some(format!("{RED}error: {}{RESET}", event.message)),
    }
}

fn column_width<'a>(header: &str, values: impl Iterator<Item = &'a str>) -> usize {
    values
        .map(|value| value.chars().count())
        .chain(std::iter::once(header.len()))
        .max()
        .unwrap_or(header.len())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn info_lines_show_elapsed_time() {
        let event = ProgressEvent::info("phase=Done; 3 records written")
            .with_elapsed(Duration::from_millis(1250));
        let line = event_line(&event).unwrap();
        assert!(line.contains("phase=Done; 3 records written (1.25s)"));
        assert!(event_line(&ProgressEvent::info("phase=Fetch")).is_none());
    }

    #[test]
    fn warnings_are_always_shown() {
        let line = event_line(&ProgressEvent::warning("skipped organism 562")).unwrap();
        assert!(line.contains("warning: skipped organism 562"));
    }
}
