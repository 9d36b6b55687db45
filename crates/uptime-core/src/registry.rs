//! Endpoint registry: the static list of monitored endpoints.
//!
//! Entries come from a TOML file of `[[monitor]]` tables or, when no file is
//! configured, from a flat comma-separated URL list. The registry is built
//! once at startup and never mutated afterwards.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("monitor config {path} does not exist")]
    MissingFile { path: String },
    #[error("failed to read monitor config {path}: {reason}")]
    Io { path: String, reason: String },
    #[error("failed to parse monitor config {path}: {reason}")]
    Parse { path: String, reason: String },
}

/// A monitored HTTP endpoint with its check parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EndpointSpec {
    pub name: String,
    pub url: String,
    /// Environment label: configured, inferred from the URL, or the raw URL.
    pub env: String,
    /// Normalized surface label ("Front Door", "VM", ...), if any.
    pub surface: Option<String>,
    /// Uppercased HTTP verb.
    pub method: String,
    pub expected_status: u16,
    pub description: String,
}

impl EndpointSpec {
    /// Label used in reports and alerts: the name, with the surface appended
    /// in parentheses when present.
    pub fn display_name(&self) -> String {
        match &self.surface {
            Some(surface) => format!("{} ({})", self.name, surface),
            None => self.name.clone(),
        }
    }
}

/// Raw `[[monitor]]` table as written in the monitors file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MonitorEntry {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub env: Option<String>,
    #[serde(default)]
    pub surface: Option<String>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub expected_status: Option<RawStatus>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// `expected_status` accepts both an integer and a quoted string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawStatus {
    Int(i64),
    Text(String),
}

#[derive(Debug, Deserialize)]
struct MonitorFile {
    #[serde(default)]
    monitor: Vec<MonitorEntry>,
}

/// Where the registry is loaded from.
///
/// `explicit` distinguishes an operator-specified monitors file (missing
/// file is a hard error) from the conventional default path (missing file
/// falls back to `fallback_urls`).
#[derive(Debug, Clone)]
pub struct RegistrySource {
    pub path: PathBuf,
    pub explicit: bool,
    pub fallback_urls: Vec<String>,
}

impl RegistrySource {
    pub fn load(&self) -> Result<Vec<EndpointSpec>, ConfigError> {
        if self.path.is_file() {
            let raw = std::fs::read_to_string(&self.path).map_err(|e| ConfigError::Io {
                path: self.path.display().to_string(),
                reason: e.to_string(),
            })?;
            let file: MonitorFile = toml::from_str(&raw).map_err(|e| ConfigError::Parse {
                path: self.path.display().to_string(),
                reason: e.to_string(),
            })?;

            let endpoints = build_endpoints(&file.monitor);
            if !endpoints.is_empty() {
                return Ok(endpoints);
            }
        } else if self.explicit {
            return Err(ConfigError::MissingFile {
                path: self.path.display().to_string(),
            });
        }

        Ok(from_url_list(&self.fallback_urls))
    }
}

/// Build specs from parsed entries, preserving input order. Entries without
/// a URL are skipped. Duplicate URLs are kept as-is; status memory keys by
/// URL, so duplicates share a memory slot.
pub fn build_endpoints(entries: &[MonitorEntry]) -> Vec<EndpointSpec> {
    let mut specs = Vec::with_capacity(entries.len());

    for entry in entries {
        let url = match entry.url.as_deref().map(str::trim) {
            Some(u) if !u.is_empty() => u.to_string(),
            _ => continue,
        };

        let env = match entry.env.as_deref().map(str::trim) {
            Some(e) if !e.is_empty() => e.to_string(),
            _ => infer_env(&url),
        };

        let name = match entry.name.as_deref().map(str::trim) {
            Some(n) if !n.is_empty() => n.to_string(),
            _ => env.clone(),
        };

        let method = entry
            .method
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(str::to_uppercase)
            .unwrap_or_else(|| "GET".to_string());

        specs.push(EndpointSpec {
            name,
            url,
            env,
            surface: normalize_surface(entry.surface.as_deref()),
            method,
            expected_status: coerce_expected_status(entry.expected_status.as_ref()),
            description: entry
                .description
                .as_deref()
                .map(str::trim)
                .unwrap_or_default()
                .to_string(),
        });
    }

    specs
}

/// Synthesize minimal specs from a bare URL list.
pub fn from_url_list(urls: &[String]) -> Vec<EndpointSpec> {
    urls.iter()
        .map(|u| u.trim())
        .filter(|u| !u.is_empty())
        .enumerate()
        .map(|(idx, url)| EndpointSpec {
            name: format!("Monitor-{}", idx + 1),
            url: url.to_string(),
            env: infer_env(url),
            surface: Some("Custom".to_string()),
            method: "GET".to_string(),
            expected_status: 200,
            description: String::new(),
        })
        .collect()
}

/// Split a comma-separated URL list, as given in `MONITOR_URLS`.
pub fn parse_url_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Infer an environment label from the URL. Substring checks are ordered:
/// "dev" wins over "preprod", which wins over "prod".
fn infer_env(url: &str) -> String {
    let lower = url.to_lowercase();
    if lower.contains("dev") {
        "Development".to_string()
    } else if lower.contains("preprod") || lower.contains("pre-prod") {
        "Pre-Production".to_string()
    } else if lower.contains("prod") {
        "Production".to_string()
    } else {
        url.to_string()
    }
}

fn normalize_surface(raw: Option<&str>) -> Option<String> {
    let raw = raw.map(str::trim).filter(|s| !s.is_empty())?;
    let normalized = raw.replace('_', "-").to_lowercase();
    match normalized.as_str() {
        "frontdoor" | "front-door" => Some("Front Door".to_string()),
        "vm" | "virtual-machine" => Some("VM".to_string()),
        _ => Some(title_case(raw)),
    }
}

/// Capitalize the first letter of every alphabetic run, like Python's
/// `str.title`.
fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut at_word_start = true;
    for ch in s.chars() {
        if ch.is_alphabetic() {
            if at_word_start {
                out.extend(ch.to_uppercase());
                at_word_start = false;
            } else {
                out.extend(ch.to_lowercase());
            }
        } else {
            out.push(ch);
            at_word_start = true;
        }
    }
    out
}

fn coerce_expected_status(raw: Option<&RawStatus>) -> u16 {
    let value = match raw {
        Some(RawStatus::Int(i)) => *i,
        Some(RawStatus::Text(s)) => match s.trim().parse::<i64>() {
            Ok(i) => i,
            Err(_) => return 200,
        },
        None => return 200,
    };

    if (100..=599).contains(&value) {
        value as u16
    } else {
        200
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn entry(url: &str) -> MonitorEntry {
        MonitorEntry {
            url: Some(url.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn fallback_list_infers_env_labels() {
        let source = RegistrySource {
            path: PathBuf::from("/nonexistent/monitors.toml"),
            explicit: false,
            fallback_urls: vec![
                "https://dev.x.com".to_string(),
                "https://prod.x.com".to_string(),
            ],
        };

        let specs = source.load().unwrap();
        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0].env, "Development");
        assert_eq!(specs[1].env, "Production");
        assert_eq!(specs[0].method, "GET");
        assert_eq!(specs[0].expected_status, 200);
        assert_eq!(specs[0].name, "Monitor-1");
        assert_eq!(specs[1].name, "Monitor-2");
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let source = RegistrySource {
            path: PathBuf::from("/nonexistent/monitors.toml"),
            explicit: true,
            fallback_urls: vec!["https://prod.x.com".to_string()],
        };

        let err = source.load().unwrap_err();
        assert!(matches!(err, ConfigError::MissingFile { .. }));
    }

    #[test]
    fn load_parses_monitors_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("monitors.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        write!(
            f,
            r#"
[[monitor]]
name = "Payments API"
env = "Production"
surface = "front_door"
method = "get"
expected_status = 200
url = "https://api.example.com/health"
description = "primary front door"

[[monitor]]
url = "https://vm.preprod.example.com/health"
surface = "vm"
expected_status = "204"
"#
        )
        .unwrap();

        let source = RegistrySource {
            path,
            explicit: true,
            fallback_urls: vec![],
        };
        let specs = source.load().unwrap();

        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0].display_name(), "Payments API (Front Door)");
        assert_eq!(specs[0].method, "GET");
        assert_eq!(specs[0].description, "primary front door");

        assert_eq!(specs[1].env, "Pre-Production");
        assert_eq!(specs[1].name, "Pre-Production");
        assert_eq!(specs[1].surface.as_deref(), Some("VM"));
        assert_eq!(specs[1].expected_status, 204);
    }

    #[test]
    fn file_with_no_usable_entries_falls_back_to_urls() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("monitors.toml");
        std::fs::write(&path, "[[monitor]]\nname = \"no url\"\n").unwrap();

        let source = RegistrySource {
            path,
            explicit: true,
            fallback_urls: vec!["https://x.com".to_string()],
        };
        let specs = source.load().unwrap();
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].url, "https://x.com");
        assert_eq!(specs[0].surface.as_deref(), Some("Custom"));
    }

    #[test]
    fn unparsable_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("monitors.toml");
        std::fs::write(&path, "[[monitor\nbroken").unwrap();

        let source = RegistrySource {
            path,
            explicit: false,
            fallback_urls: vec![],
        };
        let err = source.load().unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn entries_without_url_are_skipped_and_order_is_preserved() {
        let entries = vec![
            entry("https://a.example.com"),
            MonitorEntry::default(),
            entry("https://b.example.com"),
        ];
        let specs = build_endpoints(&entries);
        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0].url, "https://a.example.com");
        assert_eq!(specs[1].url, "https://b.example.com");
    }

    #[test]
    fn duplicate_urls_are_kept() {
        let entries = vec![entry("https://a.example.com"), entry("https://a.example.com")];
        let specs = build_endpoints(&entries);
        assert_eq!(specs.len(), 2);
    }

    #[test]
    fn name_falls_back_to_env_label() {
        let specs = build_endpoints(&[entry("https://api.prod.example.com")]);
        assert_eq!(specs[0].name, "Production");
        assert_eq!(specs[0].display_name(), "Production");
    }

    #[test]
    fn env_inference_prefers_dev_over_prod() {
        assert_eq!(infer_env("https://dev.preprod.example.com"), "Development");
        assert_eq!(infer_env("https://preprod.example.com"), "Pre-Production");
        assert_eq!(infer_env("https://pre-prod.example.com"), "Pre-Production");
        assert_eq!(infer_env("https://PROD.example.com"), "Production");
        assert_eq!(infer_env("https://example.com"), "https://example.com");
    }

    #[test]
    fn surface_normalization() {
        assert_eq!(normalize_surface(Some("front_door")).as_deref(), Some("Front Door"));
        assert_eq!(normalize_surface(Some("frontdoor")).as_deref(), Some("Front Door"));
        assert_eq!(normalize_surface(Some("vm")).as_deref(), Some("VM"));
        assert_eq!(normalize_surface(Some("virtual_machine")).as_deref(), Some("VM"));
        assert_eq!(normalize_surface(Some("load_balancer")).as_deref(), Some("Load_Balancer"));
        assert_eq!(normalize_surface(Some("  ")), None);
        assert_eq!(normalize_surface(None), None);
    }

    #[test]
    fn expected_status_coercion() {
        assert_eq!(coerce_expected_status(Some(&RawStatus::Int(204))), 204);
        assert_eq!(coerce_expected_status(Some(&RawStatus::Text("418".into()))), 418);
        assert_eq!(coerce_expected_status(Some(&RawStatus::Text("teapot".into()))), 200);
        assert_eq!(coerce_expected_status(Some(&RawStatus::Int(9999))), 200);
        assert_eq!(coerce_expected_status(None), 200);
    }

    #[test]
    fn parse_url_list_trims_and_drops_empties() {
        let urls = parse_url_list(" https://a.com , ,https://b.com,");
        assert_eq!(urls, vec!["https://a.com", "https://b.com"]);
    }
}
