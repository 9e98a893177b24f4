//! Project phase detection (§4.12 step 4)
//!
//! Classifies a session's phase from the ratio of read/write/decision
//! tool-usage signals tallied over its observations.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectPhase {
    Research,
    Planning,
    Implementation,
    Review,
    Complete,
}

impl ProjectPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectPhase::Research => "RESEARCH",
            ProjectPhase::Planning => "PLANNING",
            ProjectPhase::Implementation => "IMPLEMENTATION",
            ProjectPhase::Review => "REVIEW",
            ProjectPhase::Complete => "COMPLETE",
        }
    }
}

/// Tallied tool-usage signals for one session, used to infer its phase.
#[derive(Debug, Clone, Copy, Default)]
pub struct ToolUsageCounts {
    pub reads: u32,
    pub writes: u32,
    pub decisions: u32,
    pub reviews: u32,
    pub completions: u32,
}

const READ_HEAVY_RATIO: f32 = 0.6;
const WRITE_HEAVY_RATIO: f32 = 0.6;
const LOW_WRITE_RATIO: f32 = 0.2;

/// Detect the project phase from tool-usage ratios: read-heavy → research,
/// write-heavy → implementation, decisions + low-write → planning, explicit
/// review/completion signals take priority when present.
pub fn detect_phase(counts: &ToolUsageCounts) -> ProjectPhase {
    if counts.completions > 0 {
        return ProjectPhase::Complete;
    }
    if counts.reviews > 0 && counts.reviews >= counts.writes {
        return ProjectPhase::Review;
    }

    let total = (counts.reads + counts.writes + counts.decisions).max(1) as f32;
    let read_ratio = counts.reads as f32 / total;
    let write_ratio = counts.writes as f32 / total;

    if counts.decisions > 0 && write_ratio < LOW_WRITE_RATIO {
        return ProjectPhase::Planning;
    }
    if write_ratio >= WRITE_HEAVY_RATIO {
        return ProjectPhase::Implementation;
    }
    if read_ratio >= READ_HEAVY_RATIO {
        return ProjectPhase::Research;
    }
    ProjectPhase::Implementation
}
