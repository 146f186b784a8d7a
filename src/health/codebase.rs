// src/health/codebase.rs
// Walks the source tree collecting line-level matches against the
// deprecated-pattern rule set. Zero matches means healthy.

use serde::Serialize;
use serde_json::json;
use std::path::PathBuf;
use walkdir::WalkDir;

use super::ProbeReport;
use crate::repair::rules::{line_is_deprecated, SOURCE_EXTENSIONS};

#[derive(Debug, Clone, Serialize)]
pub struct PatternMatch {
    pub file: String,
    pub line: usize,
    pub snippet: String,
}

pub struct CodebaseScanner {
    root: PathBuf,
}

impl CodebaseScanner {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn scan(&self) -> Vec<PatternMatch> {
        let mut matches = Vec::new();
        if !self.root.exists() {
            return matches;
        }

        for entry in WalkDir::new(&self.root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
        {
            let path = entry.path();
            let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
                continue;
            };
            if !SOURCE_EXTENSIONS.contains(&ext) {
                continue;
            }

            let Ok(text) = std::fs::read_to_string(path) else {
                // Binary or unreadable files are the repair engine's problem,
                // not a health finding.
                continue;
            };

            let display = path
                .strip_prefix(&self.root)
                .unwrap_or(path)
                .display()
                .to_string();
            for (i, line) in text.lines().enumerate() {
                if line_is_deprecated(line) {
                    matches.push(PatternMatch {
                        file: display.clone(),
                        line: i + 1,
                        snippet: line.trim().to_string(),
                    });
                }
            }
        }

        matches
    }

    pub fn check(&self) -> ProbeReport {
        let matches = self.scan();
        let detail = json!({
            "deprecated_references": matches.len(),
            "matches": matches,
        });

        if matches.is_empty() {
            ProbeReport::ok("no legacy Gemini SDK references found", detail)
        } else {
            ProbeReport::warn(
                format!("found {} deprecated reference(s)", matches.len()),
                detail,
            )
        }
    }
}
