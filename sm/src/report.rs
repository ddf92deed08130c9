//! Terminal rendering of breakdowns and creation reports

use std::fmt::Write as _;

use colored::Colorize;

use crate::domain::Breakdown;
use crate::tickets::CreationReport;

const SEPARATOR: &str = "────────────────────────────────────────";

/// `N epics, M stories, P story points total`
pub fn summary_line(breakdown: &Breakdown) -> String {
    format!(
        "{} epics, {} stories, {} story points total",
        breakdown.total_epics, breakdown.total_stories, breakdown.total_story_points
    )
}

/// Colored tree view of a breakdown
pub fn render_breakdown(breakdown: &Breakdown) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{}",
        format!("Project Breakdown: {}", breakdown.project_name).magenta().bold()
    );
    let _ = writeln!(out, "{} {}", "Overview:".bold(), breakdown.overview);
    let _ = writeln!(out, "Processed in {} chunks", breakdown.processed_chunks);
    let _ = writeln!(out, "{}", SEPARATOR.dimmed());

    for (i, epic) in breakdown.epics.iter().enumerate() {
        let _ = writeln!(out, "{}", format!("Epic {}: {}", i + 1, epic.title).cyan().bold());
        let chunk = epic.chunk.map(|c| format!(" | Chunk: {}", c)).unwrap_or_default();
        let _ = writeln!(out, "Priority: {}{}", epic.priority, chunk);
        let _ = writeln!(out, "Description: {}", epic.description);

        for (j, story) in epic.stories.iter().enumerate() {
            let _ = writeln!(out, "  {}", format!("Story {}.{}: {}", i + 1, j + 1, story.title).bold());
            let _ = writeln!(out, "    Points: {} | Priority: {}", story.story_points, story.priority);
            let _ = writeln!(out, "    Description: {}", story.description);
            if !story.acceptance_criteria.is_empty() {
                let _ = writeln!(out, "    Acceptance Criteria:");
                for criterion in &story.acceptance_criteria {
                    let _ = writeln!(out, "      • {}", criterion);
                }
            }
            if !story.dependencies.is_empty() {
                let _ = writeln!(out, "    Dependencies: {}", story.dependencies.join(", "));
            }
        }
        let _ = writeln!(out, "{}", SEPARATOR.dimmed());
    }

    let _ = writeln!(out, "{} {}", "Summary:".green().bold(), summary_line(breakdown));
    out
}

/// Closing summary of a creation run
pub fn render_creation_report(report: &CreationReport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{}",
        format!(
            "Created {} epics and {} stories",
            report.epics.len(),
            report.stories.len()
        )
        .green()
        .bold()
    );
    for epic in &report.epics {
        let children = report.stories.iter().filter(|s| s.parent_key == epic.key).count();
        let _ = writeln!(out, "  {} {} ({} stories)", epic.key, epic.title, children);
    }
    if !report.skipped.is_empty() {
        let _ = writeln!(
            out,
            "{}",
            format!("{} stories skipped:", report.skipped.len()).yellow().bold()
        );
        for skipped in &report.skipped {
            let _ = writeln!(
                out,
                "  {} / {}: {}",
                skipped.epic_title, skipped.story_title, skipped.error
            );
        }
    }
    out
}
