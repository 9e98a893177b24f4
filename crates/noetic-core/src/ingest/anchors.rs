//! Anchor id generation (§4.12 step 3)
//!
//! An anchor id is `<category-prefix>-<slugified-title>-<spec-number>`,
//! unique within one memory file. Collisions append `-2`, `-3`, ... in
//! generation order.

use super::ObservationKind;
use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

fn slug_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^a-z0-9]+").expect("valid slug regex"))
}

fn category_prefix(kind: ObservationKind) -> &'static str {
    match kind {
        ObservationKind::Feature => "feat",
        ObservationKind::Bugfix => "fix",
        ObservationKind::Refactor => "refactor",
        ObservationKind::Decision => "decision",
        ObservationKind::Research => "research",
        ObservationKind::Discovery => "discovery",
        ObservationKind::Observation => "obs",
    }
}

/// Lowercase, hyphen-joined slug of `title`, trimmed of leading/trailing
/// hyphens so the result always satisfies the anchor id charset.
pub fn slugify(title: &str) -> String {
    let lowered = title.to_lowercase();
    let slug = slug_re().replace_all(&lowered, "-");
    slug.trim_matches('-').to_string()
}

/// Generator that hands out collision-free anchor ids for one memory file.
#[derive(Debug, Default)]
pub struct AnchorIdAllocator {
    seen: HashSet<String>,
}

impl AnchorIdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next anchor id for an observation of `kind` titled
    /// `title`, under spec number `spec_number`. Appends `-2`, `-3`, ... on
    /// collision with a previously allocated id in this allocator.
    pub fn allocate(&mut self, kind: ObservationKind, title: &str, spec_number: u32) -> String {
        let prefix = category_prefix(kind);
        let slug = slugify(title);
        let slug = if slug.is_empty() { "untitled".to_string() } else { slug };
        let base = format!("{prefix}-{slug}-{spec_number}");

        if self.seen.insert(base.clone()) {
            return base;
        }

        let mut suffix = 2;
        loop {
            let candidate = format!("{base}-{suffix}");
            if self.seen.insert(candidate.clone()) {
                return candidate;
            }
            suffix += 1;
        }
    }
}
