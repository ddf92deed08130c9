//! Analysis files: JSON record, markdown summary, per-chunk snapshots

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, FixedOffset, Local};
use eyre::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::chunker::Chunk;
use crate::config::ProcessingMode;
use crate::domain::{Breakdown, Epic};

/// Saved analysis: the breakdown plus when and how it was produced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub project_breakdown: Breakdown,
    pub analysis_time: DateTime<FixedOffset>,
    /// Size of the description file in bytes
    #[serde(default)]
    pub input_file_size: u64,
    pub processing_mode: String,
}

/// One chunk's text and the epics the model found in it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkSnapshot {
    pub chunk_index: usize,
    pub content: String,
    pub epics: Vec<Epic>,
}

/// Paths written by [`save_analysis`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedAnalysis {
    pub analysis_path: PathBuf,
    pub summary_path: PathBuf,
}

fn timestamp() -> String {
    Local::now().format("%Y%m%d-%H%M%S").to_string()
}

/// File name stem shared by everything saved for `input`
fn base_name(input: &Path) -> String {
    input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "project".to_string())
}

/// Write `<input>-analysis-<ts>.json` and `<input>-summary-<ts>.md` into `output_dir`
pub fn save_analysis(
    breakdown: &Breakdown,
    input: &Path,
    output_dir: &Path,
    mode: ProcessingMode,
) -> Result<SavedAnalysis> {
    debug!(input = %input.display(), output_dir = %output_dir.display(), %mode, "save_analysis: called");
    fs::create_dir_all(output_dir)
        .context(format!("Failed to create output directory {}", output_dir.display()))?;

    let base = base_name(input);
    let stamp = timestamp();
    let record = AnalysisRecord {
        project_breakdown: breakdown.clone(),
        analysis_time: Local::now().fixed_offset(),
        input_file_size: fs::metadata(input).map(|m| m.len()).unwrap_or(0),
        processing_mode: mode.to_string(),
    };

    let analysis_path = output_dir.join(format!("{}-analysis-{}.json", base, stamp));
    let json = serde_json::to_string_pretty(&record).context("Failed to serialize analysis")?;
    fs::write(&analysis_path, json).context(format!("Failed to write {}", analysis_path.display()))?;

    let summary_path = output_dir.join(format!("{}-summary-{}.md", base, stamp));
    fs::write(&summary_path, summary_markdown(breakdown))
        .context(format!("Failed to write {}", summary_path.display()))?;

    info!(analysis = %analysis_path.display(), summary = %summary_path.display(), "save_analysis: saved");
    Ok(SavedAnalysis {
        analysis_path,
        summary_path,
    })
}

/// Write one chunk's text and raw epics as `<input>-chunk-<n>-<ts>.json`
pub fn save_chunk_result(chunk: &Chunk, breakdown: &Breakdown, input: &Path, output_dir: &Path) -> Result<PathBuf> {
    debug!(chunk_index = chunk.index(), output_dir = %output_dir.display(), "save_chunk_result: called");
    fs::create_dir_all(output_dir)
        .context(format!("Failed to create output directory {}", output_dir.display()))?;
    let snapshot = ChunkSnapshot {
        chunk_index: chunk.index(),
        content: chunk.content().to_string(),
        epics: breakdown.epics.clone(),
    };
    let path = output_dir.join(format!("{}-chunk-{}-{}.json", base_name(input), chunk.index(), timestamp()));
    let json = serde_json::to_string_pretty(&snapshot).context("Failed to serialize chunk result")?;
    fs::write(&path, json).context(format!("Failed to write {}", path.display()))?;
    Ok(path)
}

/// Load a saved analysis, wrapped or bare
///
/// Totals are recomputed from the tree and titles are validated.
pub fn load_analysis(path: &Path) -> Result<Breakdown> {
    debug!(path = %path.display(), "load_analysis: called");
    let content = fs::read_to_string(path).context(format!("Failed to read analysis file {}", path.display()))?;
    let mut value: serde_json::Value = serde_json::from_str(&content).context("Analysis file is not valid JSON")?;

    let inner = if value.get("project_breakdown").is_some() {
        value["project_breakdown"].take()
    } else {
        value
    };
    let mut breakdown: Breakdown = serde_json::from_value(inner).context("Analysis file has an unexpected shape")?;

    if let Err(message) = breakdown.validate() {
        bail!("Invalid analysis file {}: {}", path.display(), message);
    }
    breakdown.recompute_totals();
    Ok(breakdown)
}

/// Markdown summary of a breakdown
pub fn summary_markdown(breakdown: &Breakdown) -> String {
    let mut md = String::new();
    let _ = writeln!(md, "# {}\n", breakdown.project_name);
    let _ = writeln!(md, "**Overview:** {}\n", breakdown.overview);
    let _ = writeln!(md, "**Total Epics:** {}", breakdown.total_epics);
    let _ = writeln!(md, "**Total Stories:** {}", breakdown.total_stories);
    let _ = writeln!(md, "**Total Story Points:** {}\n", breakdown.total_story_points);

    for (i, epic) in breakdown.epics.iter().enumerate() {
        let _ = writeln!(md, "## Epic {}: {}\n", i + 1, epic.title);
        match epic.chunk {
            Some(chunk) => {
                let _ = writeln!(md, "**Priority:** {} | **Chunk:** {}\n", epic.priority, chunk);
            }
            None => {
                let _ = writeln!(md, "**Priority:** {}\n", epic.priority);
            }
        }
        let _ = writeln!(md, "{}\n", epic.description);

        for (j, story) in epic.stories.iter().enumerate() {
            let _ = writeln!(md, "### Story {}.{}: {}\n", i + 1, j + 1, story.title);
            let _ = writeln!(
                md,
                "**Points:** {} | **Priority:** {}\n",
                story.story_points, story.priority
            );
            let _ = writeln!(md, "{}\n", story.description);

            if !story.acceptance_criteria.is_empty() {
                md.push_str("**Acceptance Criteria:**\n");
                for criterion in &story.acceptance_criteria {
                    let _ = writeln!(md, "- {}", criterion);
                }
                md.push('\n');
            }

            if !story.dependencies.is_empty() {
                let _ = writeln!(md, "**Dependencies:** {}\n", story.dependencies.join(", "));
            }
        }
    }
    md
}
