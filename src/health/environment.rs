// src/health/environment.rs
// Layered configuration validation: the local override file wins over the
// process environment. Findings name the specific missing or mismatched
// keys so the repair engine can patch them individually.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::json;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use super::ProbeReport;

/// Accepted names for the private credential, in resolution order.
pub const PRIVATE_KEYS: &[&str] = &["GOOGLE_API_KEY", "GEMINI_API_KEY"];
/// Accepted names for its public-exposed variant.
pub const PUBLIC_KEYS: &[&str] = &["PUBLIC_GOOGLE_API_KEY", "PUBLIC_GEMINI_API_KEY"];

static ENV_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*([\w.-]+)\s*=\s*(.*?)\s*$").expect("env line regex"));

/// Parse a dotenv-style file into a map. A missing file is an empty map.
pub fn read_env_file(path: &Path) -> HashMap<String, String> {
    let Ok(content) = std::fs::read_to_string(path) else {
        return HashMap::new();
    };

    let mut env = HashMap::new();
    for line in content.lines() {
        if let Some(caps) = ENV_LINE.captures(line) {
            let value = caps[2].trim_matches('"').to_string();
            env.insert(caps[1].to_string(), value);
        }
    }
    env
}

/// Resolve the first present value for any of `names`: override file first,
/// then the process environment.
pub fn resolve_key(file_env: &HashMap<String, String>, names: &[&str]) -> Option<String> {
    for name in names {
        if let Some(value) = file_env.get(*name) {
            if !value.is_empty() {
                return Some(value.clone());
            }
        }
    }
    for name in names {
        if let Ok(value) = std::env::var(name) {
            if !value.is_empty() {
                return Some(value);
            }
        }
    }
    None
}

pub struct EnvironmentCheck {
    env_file: PathBuf,
}

impl EnvironmentCheck {
    pub fn new(env_file: PathBuf) -> Self {
        Self { env_file }
    }

    pub fn check(&self) -> ProbeReport {
        let file_env = read_env_file(&self.env_file);
        let private = resolve_key(&file_env, PRIVATE_KEYS);
        let public = resolve_key(&file_env, PUBLIC_KEYS);

        let mut fixes: Vec<String> = Vec::new();
        if !self.env_file.exists() {
            fixes.push(format!("{} missing", self.env_file.display()));
        }
        match (&private, &public) {
            (None, _) => fixes.push("missing GOOGLE_API_KEY".to_string()),
            (Some(_), None) => {
                fixes.push("PUBLIC_GOOGLE_API_KEY missing, needs syncing".to_string())
            }
            (Some(key), Some(pub_key)) if key != pub_key => {
                fixes.push("PUBLIC_GOOGLE_API_KEY does not match GOOGLE_API_KEY".to_string())
            }
            _ => {}
        }

        // Keys that do not look Google-issued are worth a note, but the live
        // probe is the authority on whether they work.
        let key_format = match &private {
            Some(key) if key.starts_with("AIza") => "google-style",
            Some(_) => "nonstandard",
            None => "absent",
        };

        let detail = json!({
            "file": self.env_file.display().to_string(),
            "google_api_key": if private.is_some() { "present" } else { "missing" },
            "public_key": if public.is_some() { "present" } else { "missing" },
            "key_format": key_format,
            "fixes": fixes,
        });

        if fixes.is_empty() {
            ProbeReport::ok("environment healthy", detail)
        } else {
            ProbeReport::warn(format!("detected {} issue(s)", fixes.len()), detail)
        }
    }
}
