//! Pre-flight Gate (C4)
//!
//! Validation run before any expensive operation (embedding call, persisted
//! write). Cheap checks run first; all failures and warnings are collected
//! with a `PFxxx` code and a human-readable suggestion.

use crate::budget::TokenBudget;
use crate::config::PreflightConfig;
use regex::Regex;
use std::sync::OnceLock;

/// Approximate fixed overhead an embedding call adds on top of content
/// tokens, per the spec's ~150-token estimate.
const EMBEDDING_CALL_OVERHEAD_TOKENS: usize = 150;

fn anchor_open_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"<!--\s*ANCHOR:([^\s>-]+(?:-[^\s>-]+)*)\s*-->").expect("valid anchor regex")
    })
}

fn anchor_id_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9/-]*$").expect("valid anchor id regex"))
}

/// One finding from a pre-flight run: a code, severity, message, and a
/// recovery suggestion.
#[derive(Debug, Clone, PartialEq)]
pub struct Finding {
    pub code: &'static str,
    pub fatal: bool,
    pub message: String,
    pub suggestion: String,
}

impl Finding {
    fn fatal(code: &'static str, message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self {
            code,
            fatal: true,
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    fn warning(code: &'static str, message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self {
            code,
            fatal: false,
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }
}

/// Optional context for duplicate detection, supplied by the caller since
/// it requires a storage/search lookup this module does not perform itself.
#[derive(Debug, Clone, Default)]
pub struct DuplicateContext {
    /// An existing row id with the identical `content_hash`, if any.
    pub exact_match_id: Option<i64>,
    /// The top-1 neighbor's similarity (0-100), if an embedding and
    /// `findSimilar`-style lookup were supplied.
    pub nearest_similarity: Option<f32>,
}

/// Full report produced by a pre-flight run.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub pass: bool,
    /// In dry-run mode, `pass` is always `true`; this carries what the
    /// verdict would have been for real.
    pub would_pass: bool,
    pub findings: Vec<Finding>,
}

impl Report {
    pub fn fatal_findings(&self) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(|f| f.fatal)
    }
}

fn validate_anchors(content: &str, strict: bool, findings: &mut Vec<Finding>) {
    let mut seen = std::collections::HashSet::new();
    let mut openers: Vec<(String, usize)> = Vec::new();

    for caps in anchor_open_re().captures_iter(content) {
        let id = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
        let pos = caps.get(0).unwrap().start();

        if !anchor_id_re().is_match(id) {
            let finding = Finding {
                code: "PF003-ANCHOR_ID_INVALID",
                fatal: strict,
                message: format!("anchor id '{id}' does not match ^[A-Za-z0-9][A-Za-z0-9/-]*$"),
                suggestion: "use only letters, digits, '-' and '/' in anchor ids".into(),
            };
            findings.push(finding);
            continue;
        }

        if !seen.insert(id.to_string()) {
            findings.push(Finding {
                code: "PF001-ANCHOR_FORMAT_INVALID",
                fatal: strict,
                message: format!("duplicate anchor id '{id}'"),
                suggestion: "anchor ids must be unique within a document".into(),
            });
            continue;
        }

        openers.push((id.to_string(), pos));
    }

    for (id, open_pos) in &openers {
        let closer = format!("<!-- /ANCHOR:{id} -->");
        let closed_after = content[*open_pos..]
            .find(&closer)
            .map(|rel| rel + open_pos)
            .is_some();
        if !closed_after {
            findings.push(Finding {
                code: "PF002-ANCHOR_UNCLOSED",
                fatal: strict,
                message: format!("anchor '{id}' has no matching closer after its opener"),
                suggestion: format!("add `<!-- /ANCHOR:{id} -->` after the opening tag"),
            });
        }
    }
}

/// Run the full pre-flight gate against `content`. `duplicates` carries
/// externally-computed duplicate-detection results (this module does no
/// storage lookups itself). `dry_run`, if true, never blocks: `pass` is
/// forced to `true` but `would_pass` carries the real verdict.
pub fn run(
    content: &str,
    config: &PreflightConfig,
    budget: &TokenBudget,
    duplicates: &DuplicateContext,
    force: bool,
    dry_run: bool,
) -> Report {
    let mut findings = Vec::new();
    let len = content.chars().count();

    if len < config.min_content_length {
        findings.push(Finding::fatal(
            "PF031-CONTENT_TOO_SMALL",
            format!("content is {len} characters, minimum is {}", config.min_content_length),
            "provide more substantive content before indexing",
        ));
    }
    if len > config.max_content_length {
        findings.push(Finding::fatal(
            "PF030-CONTENT_TOO_LARGE",
            format!("content is {len} characters, maximum is {}", config.max_content_length),
            "split the content into smaller memories",
        ));
    }

    validate_anchors(content, config.anchor_strict, &mut findings);

    let content_tokens = budget.estimate_tokens_str(content);
    let total_tokens = content_tokens + EMBEDDING_CALL_OVERHEAD_TOKENS;
    let max_tokens = config.max_memory_tokens;
    let warning_at = (max_tokens as f64 * config.token_warning_threshold) as usize;

    if total_tokens > max_tokens {
        findings.push(Finding::fatal(
            "PF020-TOKEN_BUDGET_EXCEEDED",
            format!("estimated {total_tokens} tokens exceeds budget of {max_tokens}"),
            "shorten the content or raise MCP_MAX_MEMORY_TOKENS",
        ));
    } else if total_tokens >= warning_at {
        findings.push(Finding::warning(
            "PF021-TOKEN_BUDGET_WARNING",
            format!("estimated {total_tokens} tokens is within {}% of the budget", (config.token_warning_threshold * 100.0) as u32),
            "consider trimming before the content grows further",
        ));
    }

    if let Some(existing_id) = duplicates.exact_match_id {
        if !force {
            findings.push(Finding::fatal(
                "PF011-DUPLICATE_EXACT",
                format!("identical content already exists as memory {existing_id}"),
                "pass force=true to index anyway, or update the existing memory instead",
            ));
        } else {
            findings.push(Finding::warning(
                "PF010-DUPLICATE_DETECTED",
                format!("identical content exists as memory {existing_id}, forced through"),
                "review memory {existing_id} for redundancy",
            ));
        }
    } else if let Some(similarity) = duplicates.nearest_similarity {
        if similarity >= config.duplicate_similarity_threshold * 100.0 {
            findings.push(Finding::warning(
                "PF012-DUPLICATE_SIMILAR",
                format!("nearest neighbor is {similarity:.2}% similar"),
                "consider reinforcing the existing memory instead of creating a new one",
            ));
        }
    }

    let would_pass = findings.iter().all(|f| !f.fatal);
    let pass = dry_run || would_pass;

    Report {
        pass,
        would_pass,
        findings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TokenBudgetConfig;

    fn budget() -> TokenBudget {
        TokenBudget::new(TokenBudgetConfig::default())
    }

    fn cfg() -> PreflightConfig {
        PreflightConfig::default()
    }

    #[test]
    fn rejects_content_too_short() {
        let report = run("tiny", &cfg(), &budget(), &DuplicateContext::default(), false, false);
        assert!(!report.pass);
        assert!(report.findings.iter().any(|f| f.code == "PF031-CONTENT_TOO_SMALL"));
    }

    #[test]
    fn rejects_content_too_long() {
        let content = "x".repeat(200_000);
        let report = run(&content, &cfg(), &budget(), &DuplicateContext::default(), false, false);
        assert!(!report.pass);
        assert!(report.findings.iter().any(|f| f.code == "PF030-CONTENT_TOO_LARGE"));
    }

    #[test]
    fn accepts_well_formed_anchor() {
        let content = "some long enough content here with an anchor below\n<!-- ANCHOR:decision-1 -->\nbody text\n<!-- /ANCHOR:decision-1 -->\n";
        let mut findings = Vec::new();
        validate_anchors(content, true, &mut findings);
        assert!(findings.is_empty());
    }

    #[test]
    fn flags_unclosed_anchor_in_strict_mode() {
        let content = "padding padding padding\n<!-- ANCHOR:decision-1 -->\nbody with no closer\n";
        let mut findings = Vec::new();
        validate_anchors(content, true, &mut findings);
        assert!(findings.iter().any(|f| f.code == "PF002-ANCHOR_UNCLOSED" && f.fatal));
    }

    #[test]
    fn unclosed_anchor_is_warning_outside_strict_mode() {
        let content = "padding padding padding\n<!-- ANCHOR:decision-1 -->\nbody with no closer\n";
        let mut findings = Vec::new();
        validate_anchors(content, false, &mut findings);
        assert!(findings.iter().any(|f| f.code == "PF002-ANCHOR_UNCLOSED" && !f.fatal));
    }

    #[test]
    fn rejects_invalid_anchor_id_format() {
        let content = "padding padding padding\n<!-- ANCHOR:_bad_id -->\nbody\n<!-- /ANCHOR:_bad_id -->\n";
        let mut findings = Vec::new();
        validate_anchors(content, true, &mut findings);
        assert!(findings.iter().any(|f| f.code == "PF003-ANCHOR_ID_INVALID"));
    }

    #[test]
    fn rejects_duplicate_anchor_ids() {
        let content = "padding padding padding\n<!-- ANCHOR:a -->\nbody\n<!-- /ANCHOR:a -->\n<!-- ANCHOR:a -->\nbody2\n<!-- /ANCHOR:a -->\n";
        let mut findings = Vec::new();
        validate_anchors(content, true, &mut findings);
        assert!(findings.iter().any(|f| f.code == "PF001-ANCHOR_FORMAT_INVALID"));
    }

    #[test]
    fn exact_duplicate_is_fatal_without_force() {
        let dup = DuplicateContext {
            exact_match_id: Some(7),
            nearest_similarity: None,
        };
        let content = "content long enough to pass the minimum length check easily";
        let report = run(content, &cfg(), &budget(), &dup, false, false);
        assert!(!report.pass);
        assert!(report.findings.iter().any(|f| f.code == "PF011-DUPLICATE_EXACT"));
    }

    #[test]
    fn exact_duplicate_passes_when_forced() {
        let dup = DuplicateContext {
            exact_match_id: Some(7),
            nearest_similarity: None,
        };
        let content = "content long enough to pass the minimum length check easily";
        let report = run(content, &cfg(), &budget(), &dup, true, false);
        assert!(report.pass);
        assert!(report.findings.iter().any(|f| f.code == "PF010-DUPLICATE_DETECTED"));
    }

    #[test]
    fn similar_duplicate_is_a_warning_not_fatal() {
        let dup = DuplicateContext {
            exact_match_id: None,
            nearest_similarity: Some(97.0),
        };
        let content = "content long enough to pass the minimum length check easily";
        let report = run(content, &cfg(), &budget(), &dup, false, false);
        assert!(report.pass);
        assert!(report.findings.iter().any(|f| f.code == "PF012-DUPLICATE_SIMILAR" && !f.fatal));
    }

    #[test]
    fn dry_run_never_blocks_but_reports_would_pass() {
        let content = "tiny";
        let report = run(content, &cfg(), &budget(), &DuplicateContext::default(), false, true);
        assert!(report.pass);
        assert!(!report.would_pass);
    }

    #[test]
    fn token_budget_warning_below_fatal_threshold() {
        let cfg = PreflightConfig {
            max_memory_tokens: 200,
            token_warning_threshold: 0.5,
            ..PreflightConfig::default()
        };
        let content = "x".repeat(400);
        let report = run(&content, &cfg, &budget(), &DuplicateContext::default(), false, false);
        assert!(report.pass);
        assert!(report.findings.iter().any(|f| f.code == "PF021-TOKEN_BUDGET_WARNING"));
    }

    #[test]
    fn token_budget_exceeded_is_fatal() {
        let cfg = PreflightConfig {
            max_memory_tokens: 50,
            ..PreflightConfig::default()
        };
        let content = "x".repeat(400);
        let report = run(&content, &cfg, &budget(), &DuplicateContext::default(), false, false);
        assert!(!report.pass);
        assert!(report.findings.iter().any(|f| f.code == "PF020-TOKEN_BUDGET_EXCEEDED"));
    }
}
