// src/repair/mod.rs

//! Applies the deprecated-SDK rewrite rules across the configured source
//! tree and patches the environment override file. Dry-run computes the
//! identical fix list without touching storage; a failed individual patch
//! is collected into the notes and never aborts the rest.

pub mod rules;

use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::error::VigilError;
use crate::health::environment::{read_env_file, resolve_key, PRIVATE_KEYS, PUBLIC_KEYS};
use rules::{apply_to_text, RULESET_VERSION, SOURCE_EXTENSIONS};

const KEY_PLACEHOLDER: &str = "YOUR_API_KEY_HERE";

#[derive(Debug, Clone, Serialize)]
pub struct FileFix {
    pub file: String,
    pub line: usize,
    pub before: String,
    pub after: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FixReport {
    pub dry_run: bool,
    /// Version of the rule table that produced these fixes.
    pub ruleset_version: u32,
    pub fixes: Vec<FileFix>,
    pub notes: Vec<String>,
    pub env_patched: bool,
    pub message: String,
}

pub struct RepairEngine {
    scan_root: PathBuf,
    env_file: PathBuf,
}

impl RepairEngine {
    pub fn new(scan_root: PathBuf, env_file: PathBuf) -> Self {
        Self {
            scan_root,
            env_file,
        }
    }

    /// Run both patch classes: source rewrites, then the env-file patch.
    /// Running twice in succession reports zero additional fixes on the
    /// second run.
    pub fn apply(&self, dry_run: bool) -> FixReport {
        let mut fixes = Vec::new();
        let mut notes = Vec::new();

        self.rewrite_sources(dry_run, &mut fixes, &mut notes);
        let env_patched = self.patch_env(dry_run, &mut notes);

        let message = if fixes.is_empty() && !env_patched {
            "no deprecated Gemini SDK code found".to_string()
        } else {
            format!(
                "{} {} code change(s){}",
                if dry_run { "previewed" } else { "patched" },
                fixes.len(),
                if env_patched { " + env file updated" } else { "" }
            )
        };

        info!("repair run complete: {}", message);

        FixReport {
            dry_run,
            ruleset_version: RULESET_VERSION,
            fixes,
            notes,
            env_patched,
            message,
        }
    }

    fn rewrite_sources(&self, dry_run: bool, fixes: &mut Vec<FileFix>, notes: &mut Vec<String>) {
        if !self.scan_root.exists() {
            notes.push(format!(
                "scan root {} not found; skipping source rewrites",
                self.scan_root.display()
            ));
            return;
        }

        for entry in WalkDir::new(&self.scan_root)
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

            let text = match std::fs::read_to_string(path) {
                Ok(text) => text,
                Err(e) => {
                    notes.push(
                        VigilError::Rewrite {
                            path: path.display().to_string(),
                            reason: format!("unreadable: {}", e),
                        }
                        .to_string(),
                    );
                    continue;
                }
            };

            let (rewritten, line_fixes) = apply_to_text(&text);
            if line_fixes.is_empty() {
                continue;
            }

            let display = self.relative_display(path);
            for fix in &line_fixes {
                fixes.push(FileFix {
                    file: display.clone(),
                    line: fix.line,
                    before: fix.before.clone(),
                    after: fix.after.clone(),
                });
            }

            if !dry_run {
                if let Err(e) = std::fs::write(path, rewritten) {
                    notes.push(
                        VigilError::Rewrite {
                            path: display,
                            reason: format!("write failed: {}", e),
                        }
                        .to_string(),
                    );
                } else {
                    debug!("rewrote {} ({} fixes)", path.display(), line_fixes.len());
                }
            }
        }
    }

    /// Create the missing override file, append a placeholder private key,
    /// and sync the public-exposed variant to the private one when only one
    /// is set or they disagree.
    fn patch_env(&self, dry_run: bool, notes: &mut Vec<String>) -> bool {
        let file_env = read_env_file(&self.env_file);
        let mut patched: BTreeMap<String, String> = file_env.clone().into_iter().collect();
        let mut changed = false;

        if !self.env_file.exists() {
            notes.push(format!("created missing {}", self.env_file.display()));
            changed = true;
        }

        let private = resolve_key(&file_env, PRIVATE_KEYS);
        let public = resolve_key(&file_env, PUBLIC_KEYS);

        match (&private, &public) {
            (None, _) => {
                notes.push("added GOOGLE_API_KEY placeholder".to_string());
                patched.insert("GOOGLE_API_KEY".to_string(), KEY_PLACEHOLDER.to_string());
                changed = true;
            }
            (Some(key), None) => {
                notes.push("synced PUBLIC_GOOGLE_API_KEY to GOOGLE_API_KEY".to_string());
                patched.insert("PUBLIC_GOOGLE_API_KEY".to_string(), key.clone());
                changed = true;
            }
            (Some(key), Some(pub_key)) if key != pub_key => {
                notes.push("updated PUBLIC_GOOGLE_API_KEY to match GOOGLE_API_KEY".to_string());
                patched.insert("PUBLIC_GOOGLE_API_KEY".to_string(), key.clone());
                changed = true;
            }
            _ => {}
        }

        if changed && !dry_run {
            let body: String = patched
                .iter()
                .map(|(k, v)| format!("{}={}\n", k, v))
                .collect();
            if let Err(e) = std::fs::write(&self.env_file, body) {
                notes.push(
                    VigilError::Rewrite {
                        path: self.env_file.display().to_string(),
                        reason: format!("env write failed: {}", e),
                    }
                    .to_string(),
                );
                return false;
            }
        }

        changed
    }

    fn relative_display(&self, path: &Path) -> String {
        path.strip_prefix(&self.scan_root)
            .unwrap_or(path)
            .display()
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn engine(dir: &TempDir) -> RepairEngine {
        RepairEngine::new(dir.path().join("src"), dir.path().join(".env.local"))
    }

    fn write_source(dir: &TempDir, name: &str, body: &str) -> PathBuf {
        let src = dir.path().join("src");
        std::fs::create_dir_all(&src).unwrap();
        let path = src.join(name);
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_apply_rewrites_and_is_idempotent() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(".env.local"), "GOOGLE_API_KEY=AIzaTest\nPUBLIC_GOOGLE_API_KEY=AIzaTest\n").unwrap();
        let path = write_source(&dir, "client.ts", "const r = model.generateText(p);\n");

        let engine = engine(&dir);
        let first = engine.apply(false);
        assert_eq!(first.fixes.len(), 1);
        assert_eq!(first.ruleset_version, RULESET_VERSION);
        assert!(std::fs::read_to_string(&path)
            .unwrap()
            .contains(".generateContent(p)"));

        let second = engine.apply(false);
        assert!(second.fixes.is_empty());
        assert!(!second.env_patched);
        assert!(second.message.contains("no deprecated"));
    }

    #[test]
    fn test_dry_run_previews_without_writing() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(".env.local"), "GOOGLE_API_KEY=AIzaTest\nPUBLIC_GOOGLE_API_KEY=AIzaTest\n").unwrap();
        let body = "const r = model.generateText(p);\n";
        let path = write_source(&dir, "client.ts", body);

        let engine = engine(&dir);
        let preview = engine.apply(true);
        assert_eq!(preview.fixes.len(), 1);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), body);

        // A real run reports the identical fix list.
        let real = engine.apply(false);
        assert_eq!(real.fixes.len(), preview.fixes.len());
        assert_eq!(real.fixes[0].after, preview.fixes[0].after);
    }

    #[test]
    fn test_env_patch_creates_file_and_placeholder() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        let engine = engine(&dir);

        let report = engine.apply(false);
        assert!(report.env_patched);

        let env = read_env_file(&dir.path().join(".env.local"));
        assert_eq!(env.get("GOOGLE_API_KEY").unwrap(), KEY_PLACEHOLDER);
    }

    #[test]
    fn test_env_patch_syncs_public_key() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join(".env.local"), "GOOGLE_API_KEY=AIzaPrivate\n").unwrap();

        let engine = engine(&dir);
        let report = engine.apply(false);
        assert!(report.env_patched);

        let env = read_env_file(&dir.path().join(".env.local"));
        assert_eq!(env.get("PUBLIC_GOOGLE_API_KEY").unwrap(), "AIzaPrivate");

        // Second pass reports nothing new.
        assert!(!engine.apply(false).env_patched);
    }

    #[test]
    fn test_unreadable_source_is_noted_not_fatal() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(".env.local"), "GOOGLE_API_KEY=AIzaTest\nPUBLIC_GOOGLE_API_KEY=AIzaTest\n").unwrap();
        write_source(&dir, "good.ts", "model.generateMessage(x);\n");
        // Invalid UTF-8 forces a read failure for one file.
        std::fs::write(dir.path().join("src").join("bad.ts"), [0xff, 0xfe, 0x00]).unwrap();

        let engine = engine(&dir);
        let report = engine.apply(false);
        assert_eq!(report.fixes.len(), 1);
        assert!(report.notes.iter().any(|n| n.contains("bad.ts")));
    }
}
