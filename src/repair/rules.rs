// src/repair/rules.rs
// Versioned allow-list of deprecated-pattern rewrite rules for the legacy
// Gemini SDK migration. Detection and rewrite share this one table; the
// rewrite itself is a pure function over text so it can be tested with no
// filesystem.
//
// Invariant: no rule's replacement may match any rule's matcher, which makes
// a second pass over already-rewritten text a no-op.

use serde::Serialize;

pub const RULESET_VERSION: u32 = 2;

/// Source file extensions the scanner and rewriter consider.
pub const SOURCE_EXTENSIONS: &[&str] = &["ts", "tsx", "js", "jsx"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    /// Replace every occurrence of the matcher within the line.
    ReplaceSubstring,
    /// Replace the whole matching line with the replacement text.
    ReplaceLine,
}

#[derive(Debug, Clone, Copy)]
pub struct RewriteRule {
    pub matcher: &'static str,
    pub replacement: &'static str,
    pub kind: RuleKind,
}

/// Ordered longest-matcher-first so `.generateTextStream(` is rewritten
/// before the shorter `.generateText(` can touch it.
pub static REWRITE_RULES: &[RewriteRule] = &[
    RewriteRule {
        matcher: "@google-ai/generativelanguage",
        replacement: "@google/generative-ai",
        kind: RuleKind::ReplaceSubstring,
    },
    RewriteRule {
        matcher: ".generateTextStream(",
        replacement: ".generateContentStream(",
        kind: RuleKind::ReplaceSubstring,
    },
    RewriteRule {
        matcher: ".generateMessage(",
        replacement: ".generateContent(",
        kind: RuleKind::ReplaceSubstring,
    },
    RewriteRule {
        matcher: ".generateText(",
        replacement: ".generateContent(",
        kind: RuleKind::ReplaceSubstring,
    },
    RewriteRule {
        matcher: ".startChat(",
        replacement: ".startChatSession(",
        kind: RuleKind::ReplaceSubstring,
    },
    RewriteRule {
        matcher: ".listModels",
        replacement: "// [auto-fix] deprecated model-listing call removed; use getGenerativeModel instead",
        kind: RuleKind::ReplaceLine,
    },
];

/// One line-level change produced by [`apply_to_text`].
#[derive(Debug, Clone, Serialize)]
pub struct LineFix {
    pub line: usize,
    pub before: String,
    pub after: String,
}

/// True if the line would be flagged by the codebase probe.
pub fn line_is_deprecated(line: &str) -> bool {
    REWRITE_RULES.iter().any(|rule| line.contains(rule.matcher))
}

/// Apply the rule table to `text`, returning the rewritten text and the
/// per-line fix list. Pure: no I/O, deterministic, and idempotent by the
/// rule-table invariant above.
pub fn apply_to_text(text: &str) -> (String, Vec<LineFix>) {
    let mut fixes = Vec::new();
    let lines: Vec<String> = text
        .split('\n')
        .enumerate()
        .map(|(i, original)| {
            let mut line = original.to_string();
            for rule in REWRITE_RULES {
                if !line.contains(rule.matcher) {
                    continue;
                }
                line = match rule.kind {
                    RuleKind::ReplaceSubstring => line.replace(rule.matcher, rule.replacement),
                    RuleKind::ReplaceLine => rule.replacement.to_string(),
                };
            }
            if line != original {
                fixes.push(LineFix {
                    line: i + 1,
                    before: original.trim().to_string(),
                    after: line.trim().to_string(),
                });
            }
            line
        })
        .collect();

    (lines.join("\n"), fixes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_replacement_matches_any_matcher() {
        for rule in REWRITE_RULES {
            for other in REWRITE_RULES {
                assert!(
                    !rule.replacement.contains(other.matcher),
                    "replacement for {:?} still matches {:?}",
                    rule.matcher,
                    other.matcher
                );
            }
        }
    }

    #[test]
    fn test_method_rewrites() {
        let src = "const out = await model.generateText(prompt);\n\
                   const stream = model.generateTextStream(prompt);\n\
                   const chat = model.startChat({ history });";
        let (rewritten, fixes) = apply_to_text(src);

        assert!(rewritten.contains(".generateContent(prompt)"));
        assert!(rewritten.contains(".generateContentStream(prompt)"));
        assert!(rewritten.contains(".startChatSession({ history })"));
        assert_eq!(fixes.len(), 3);
        assert_eq!(fixes[0].line, 1);
    }

    #[test]
    fn test_list_models_line_is_replaced_whole() {
        let src = "  const models = await genAI.listModels();";
        let (rewritten, fixes) = apply_to_text(src);

        assert!(!rewritten.contains(".listModels"));
        assert!(rewritten.starts_with("// [auto-fix]"));
        assert_eq!(fixes.len(), 1);
    }

    #[test]
    fn test_import_package_rewrite() {
        let src = "import { TextServiceClient } from \"@google-ai/generativelanguage\";";
        let (rewritten, fixes) = apply_to_text(src);

        assert!(rewritten.contains("@google/generative-ai"));
        assert!(!rewritten.contains("@google-ai/generativelanguage"));
        assert_eq!(fixes.len(), 1);
    }

    #[test]
    fn test_apply_twice_is_idempotent() {
        let src = "model.generateText(p);\nmodel.listModels();\nmodel.startChat(x);";
        let (once, first_fixes) = apply_to_text(src);
        let (twice, second_fixes) = apply_to_text(&once);

        assert_eq!(first_fixes.len(), 3);
        assert!(second_fixes.is_empty());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_clean_text_is_untouched() {
        let src = "const model = genAI.getGenerativeModel({ model: 'gemini-1.5-pro' });";
        let (rewritten, fixes) = apply_to_text(src);
        assert_eq!(rewritten, src);
        assert!(fixes.is_empty());
        assert!(!line_is_deprecated(src));
    }
}
