//! Roadmap markdown: phase headings followed by step tables.
//!
//! ```text
//! ## Phase 1: Foundations
//!
//! | Step | Description      | Status      | Plan | PR   |
//! |------|------------------|-------------|------|------|
//! | 1.1  | Parse the config | done        | #12  | #15  |
//! | 1.2  | Wire the store   | in-progress | #16  | -    |
//! ```
//!
//! Any other heading ends the current phase. Table rows outside a phase are
//! ignored.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::graph::NodeStatus;

static PHASE_HEADING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^#{2,4}\s+phase\s+(?P<number>\d+[a-z]?)\b\s*[:.\-]?\s*(?P<name>.*?)\s*$")
        .expect("phase heading pattern is valid")
});

static ANY_HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#{1,6}\s").expect("heading pattern is valid"));

static SEPARATOR_CELL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^:?-{3,}:?$").expect("separator pattern is valid"));

const STATUS_COLUMN: usize = 2;
const PLAN_COLUMN: usize = 3;
const PR_COLUMN: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoadmapStep {
    pub id: String,
    pub description: String,
    pub status: NodeStatus,
    pub plan: Option<String>,
    pub pr: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoadmapPhase {
    /// Phase number as written, e.g. `1` or `2A`.
    pub number: String,
    pub name: String,
    pub steps: Vec<RoadmapStep>,
}

/// Cell changes for one roadmap row. `None` leaves a cell as it is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepUpdate {
    pub status: Option<NodeStatus>,
    pub plan: Option<String>,
    pub pr: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoadmapError {
    #[error("roadmap step {0:?} not found")]
    StepNotFound(String),
}

enum Line<'a> {
    PhaseHeading { number: String, name: String },
    OtherHeading,
    Row(Vec<&'a str>),
    Text,
}

fn classify(line: &str) -> Line<'_> {
    let trimmed = line.trim();
    if let Some(caps) = PHASE_HEADING.captures(trimmed) {
        return Line::PhaseHeading {
            number: caps["number"].to_ascii_uppercase(),
            name: caps["name"].to_owned(),
        };
    }
    if ANY_HEADING.is_match(trimmed) {
        return Line::OtherHeading;
    }
    match table_cells(trimmed) {
        Some(cells) => Line::Row(cells),
        None => Line::Text,
    }
}

/// Cells of a markdown table row, or `None` for anything else. Header and
/// separator rows are not steps and also yield `None`.
fn table_cells(line: &str) -> Option<Vec<&str>> {
    let inner = line.strip_prefix('|')?;
    let inner = inner.strip_suffix('|').unwrap_or(inner);
    let cells: Vec<&str> = inner.split('|').map(str::trim).collect();

    let first = cells.first()?;
    if first.eq_ignore_ascii_case("step") {
        return None;
    }
    if cells.iter().all(|c| SEPARATOR_CELL.is_match(c)) {
        return None;
    }
    if step_id(first).is_empty() {
        return None;
    }
    Some(cells)
}

fn step_id(cell: &str) -> &str {
    cell.trim_matches(|c| c == '`' || c == '*').trim()
}

fn optional_cell(cells: &[&str], index: usize) -> Option<String> {
    cells
        .get(index)
        .map(|c| c.trim())
        .filter(|c| !c.is_empty() && *c != "-")
        .map(str::to_owned)
}

fn step_from_cells(cells: &[&str]) -> RoadmapStep {
    let plan = optional_cell(cells, PLAN_COLUMN);
    let pr = optional_cell(cells, PR_COLUMN);
    let explicit = optional_cell(cells, STATUS_COLUMN).and_then(|s| s.parse::<NodeStatus>().ok());
    let status = explicit.unwrap_or(if pr.is_some() {
        NodeStatus::Done
    } else if plan.is_some() {
        NodeStatus::InProgress
    } else {
        NodeStatus::Pending
    });

    RoadmapStep {
        id: step_id(cells[0]).to_owned(),
        description: cells.get(1).map(|c| c.to_string()).unwrap_or_default(),
        status,
        plan,
        pr,
    }
}

/// Parse every phase and its steps from roadmap markdown.
pub fn parse_roadmap(markdown: &str) -> Vec<RoadmapPhase> {
    let mut phases: Vec<RoadmapPhase> = Vec::new();
    let mut in_phase = false;

    for line in markdown.lines() {
        match classify(line) {
            Line::PhaseHeading { number, name } => {
                phases.push(RoadmapPhase {
                    number,
                    name,
                    steps: Vec::new(),
                });
                in_phase = true;
            }
            Line::OtherHeading => in_phase = false,
            Line::Row(cells) if in_phase => {
                if let Some(phase) = phases.last_mut() {
                    phase.steps.push(step_from_cells(&cells));
                }
            }
            Line::Row(_) | Line::Text => {}
        }
    }

    phases
}

fn render_row(cells: &[String]) -> String {
    format!("| {} |", cells.join(" | "))
}

/// Rewrite the row of `step_id`, changing only the cells named by `update`.
///
/// Every other line, including its line ending, is left untouched. The
/// first matching row inside a phase is the one rewritten.
pub fn update_roadmap_step(
    markdown: &str,
    step_id_to_update: &str,
    update: &StepUpdate,
) -> Result<String, RoadmapError> {
    let mut out = String::with_capacity(markdown.len() + 16);
    let mut in_phase = false;
    let mut updated = false;

    for raw_line in markdown.split_inclusive('\n') {
        let content = raw_line.trim_end_matches(['\n', '\r']);
        let ending = &raw_line[content.len()..];

        match classify(content) {
            Line::PhaseHeading { .. } => in_phase = true,
            Line::OtherHeading => in_phase = false,
            Line::Row(cells) if in_phase && !updated && step_id(cells[0]) == step_id_to_update => {
                let mut cells: Vec<String> = cells.iter().map(|c| c.to_string()).collect();
                if cells.len() <= PR_COLUMN {
                    cells.resize(PR_COLUMN + 1, "-".to_owned());
                }
                if let Some(status) = update.status {
                    cells[STATUS_COLUMN] = status.to_string();
                }
                if let Some(plan) = &update.plan {
                    cells[PLAN_COLUMN] = plan.clone();
                }
                if let Some(pr) = &update.pr {
                    cells[PR_COLUMN] = pr.clone();
                }

                let indent = &content[..content.len() - content.trim_start().len()];
                out.push_str(indent);
                out.push_str(&render_row(&cells));
                out.push_str(ending);
                updated = true;
                continue;
            }
            Line::Row(_) | Line::Text => {}
        }
        out.push_str(raw_line);
    }

    if updated {
        Ok(out)
    } else {
        Err(RoadmapError::StepNotFound(step_id_to_update.to_owned()))
    }
}
