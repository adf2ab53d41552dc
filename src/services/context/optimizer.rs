//! Context Optimizer
//!
//! Two independent levers keep an oracle request within budget:
//!
//! - **Message compression** collapses everything older than the newest
//!   `keep_recent` messages into one system summary once the transcript is
//!   longer than `max_messages`.
//! - **File selection** ranks files by how often recent messages reference
//!   them and greedily packs the best ones under the file-count and byte
//!   ceilings.
//!
//! Neither lever fails on oversized input; they trim best-effort.

use std::collections::HashMap;

use prompt_forge_core::{ChatMessage, ChatRole, FileSet};
use regex::Regex;

use crate::models::settings::ContextBudget;
use crate::utils::error::{AppError, AppResult};

/// Weight of an explicit `File: path` marker
const MARKER_WEIGHT: u32 = 3;
/// Weight of an import/require specifier
const IMPORT_WEIGHT: u32 = 2;
/// Weight of a bare path-like token
const PATH_WEIGHT: u32 = 1;

/// Result of a combined optimization pass.
#[derive(Debug, Clone)]
pub struct OptimizedContext {
    pub messages: Vec<ChatMessage>,
    pub files: FileSet,
    /// Messages folded into the summary
    pub summarized: usize,
    /// Files left out of the payload
    pub files_dropped: usize,
    /// Output size over input size (diagnostics only)
    pub compression_ratio: f64,
}

/// Compiled reference patterns.
struct ReferencePatterns {
    marker: Regex,
    import: Regex,
    path: Regex,
}

impl ReferencePatterns {
    fn compile() -> Result<Self, regex::Error> {
        Ok(Self {
            marker: Regex::new(r"(?i)\bfile:\s*`?([\w@./-]+)")?,
            import: Regex::new(
                r#"(?:\bimport\s+(?:[^'"\n]*?\bfrom\s+)?|\brequire\(\s*|\bfrom\s+|@import\s+(?:url\()?)['"]([^'"\n]+)['"]"#,
            )?,
            path: Regex::new(r"(?:[\w@.-]+/)+[\w.-]+|\b[\w-]+\.[A-Za-z]{1,5}\b")?,
        })
    }
}

/// Budget-driven transcript and file trimming.
pub struct ContextOptimizer {
    budget: ContextBudget,
    patterns: ReferencePatterns,
}

impl ContextOptimizer {
    pub fn new(budget: ContextBudget) -> AppResult<Self> {
        let patterns = ReferencePatterns::compile()
            .map_err(|e| AppError::internal(format!("Invalid reference pattern: {}", e)))?;
        Ok(Self { budget, patterns })
    }

    /// Collapse older messages into one summary when the transcript is too long.
    pub fn compress_messages(&self, messages: &[ChatMessage]) -> Vec<ChatMessage> {
        if messages.len() <= self.budget.max_messages {
            return messages.to_vec();
        }

        let keep = self.budget.keep_recent.min(messages.len());
        let split = messages.len() - keep;
        let (older, recent) = messages.split_at(split);

        let mut out = Vec::with_capacity(recent.len() + 1);
        out.push(self.summarize(older));
        out.extend_from_slice(recent);

        tracing::debug!(
            "[ContextOptimizer] Summarized {} of {} messages",
            older.len(),
            messages.len()
        );
        out
    }

    fn summarize(&self, older: &[ChatMessage]) -> ChatMessage {
        let latest = |role: ChatRole| {
            older
                .iter()
                .rev()
                .find(|m| m.role == role && !m.content.trim().is_empty())
                .map(|m| truncate_chars(m.content.trim(), self.budget.summary_chars))
        };

        let mut text = format!(
            "Summary of {} earlier messages (omitted for brevity).",
            older.len()
        );
        if let Some(request) = latest(ChatRole::User) {
            text.push_str(&format!("\nLatest earlier request: {}", request));
        }
        if let Some(response) = latest(ChatRole::Model) {
            text.push_str(&format!("\nLatest earlier response: {}", response));
        }
        ChatMessage::system(text)
    }

    /// Pick the most referenced files that fit the budget.
    pub fn select_files(&self, messages: &[ChatMessage], files: &FileSet) -> FileSet {
        let scores = self.score_files(messages, files);

        let mut ranked: Vec<(&String, &String, u32)> = files
            .iter()
            .map(|(path, content)| (path, content, scores.get(path.as_str()).copied().unwrap_or(0)))
            .collect();
        ranked.sort_by(|a, b| b.2.cmp(&a.2).then_with(|| a.0.cmp(b.0)));

        let mut selected = FileSet::new();
        let mut total_bytes = 0usize;
        for (path, content, _) in ranked {
            if selected.len() >= self.budget.max_files {
                break;
            }
            let size = content.len();
            if size > self.budget.max_file_bytes || total_bytes + size > self.budget.max_total_bytes {
                continue;
            }
            total_bytes += size;
            selected.insert(path.clone(), content.clone());
        }

        if selected.len() < files.len() {
            tracing::debug!(
                "[ContextOptimizer] Selected {}/{} files ({} bytes)",
                selected.len(),
                files.len(),
                total_bytes
            );
        }
        selected
    }

    /// Reference frequency per path over the recent scan window.
    fn score_files<'a>(&self, messages: &[ChatMessage], files: &'a FileSet) -> HashMap<&'a str, u32> {
        let mut scores: HashMap<&str, u32> = HashMap::new();
        let start = messages.len().saturating_sub(self.budget.scan_window);

        for message in &messages[start..] {
            let text = &message.content;
            let mut bump = |token: &str, weight: u32| {
                let token = normalize_token(token);
                if token.is_empty() {
                    return;
                }
                for path in files.keys() {
                    if path_matches(path, token) {
                        *scores.entry(path.as_str()).or_insert(0) += weight;
                    }
                }
            };

            for caps in self.patterns.marker.captures_iter(text) {
                bump(&caps[1], MARKER_WEIGHT);
            }
            for caps in self.patterns.import.captures_iter(text) {
                bump(&caps[1], IMPORT_WEIGHT);
            }
            for m in self.patterns.path.find_iter(text) {
                bump(m.as_str(), PATH_WEIGHT);
            }
        }

        scores
    }

    /// Compress the transcript, then select files against the compressed transcript.
    pub fn optimize(&self, messages: &[ChatMessage], files: &FileSet) -> OptimizedContext {
        let compressed = self.compress_messages(messages);
        let selected = self.select_files(&compressed, files);

        let before = transcript_size(messages) + files_size(files);
        let after = transcript_size(&compressed) + files_size(&selected);
        let compression_ratio = if before == 0 {
            1.0
        } else {
            after as f64 / before as f64
        };

        let summarized = if messages.len() > self.budget.max_messages {
            messages.len() - self.budget.keep_recent.min(messages.len())
        } else {
            0
        };

        OptimizedContext {
            summarized,
            files_dropped: files.len() - selected.len(),
            messages: compressed,
            files: selected,
            compression_ratio,
        }
    }
}

fn transcript_size(messages: &[ChatMessage]) -> usize {
    messages.iter().map(|m| m.content.len()).sum()
}

fn files_size(files: &FileSet) -> usize {
    files.values().map(|c| c.len()).sum()
}

/// Truncate on a char boundary, marking the cut.
fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars).collect();
    out.push('…');
    out
}

/// Strip relative prefixes and surrounding punctuation from a path-like token.
fn normalize_token(token: &str) -> &str {
    let quote = |c: char| matches!(c, '`' | '\'' | '"' | ',' | ';' | ':' | '(' | ')');
    let mut t = token
        .trim_start_matches(quote)
        .trim_end_matches(|c: char| quote(c) || c == '.');
    loop {
        if let Some(rest) = t.strip_prefix("./") {
            t = rest;
        } else if let Some(rest) = t.strip_prefix("../") {
            t = rest;
        } else if let Some(rest) = t.strip_prefix("@/") {
            t = rest;
        } else if let Some(rest) = t.strip_prefix('/') {
            t = rest;
        } else {
            break;
        }
    }
    t
}

/// Whether a normalized token refers to `path`, with or without extension.
fn path_matches(path: &str, token: &str) -> bool {
    if path == token || path.ends_with(&format!("/{}", token)) {
        return true;
    }
    match path.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() && !stem.ends_with('/') => {
            stem == token || stem.ends_with(&format!("/{}", token))
        }
        _ => false,
    }
}
