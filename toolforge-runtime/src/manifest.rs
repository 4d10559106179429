//! Static metadata extraction from a staged tool package: the exposed port
//! from the build manifest, name/description from package metadata, and a
//! best-effort price scan of the sources. The post-launch schema probe is
//! authoritative over everything parsed here.

use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{DeployError, Result};

/// Name/description declared by the package, with fallbacks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToolMeta {
    pub name: String,
    pub description: Option<String>,
}

impl Default for ToolMeta {
    fn default() -> Self {
        Self {
            name: "unnamed-tool".to_string(),
            description: None,
        }
    }
}

static EXPOSE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^EXPOSE\s+(\d+)").unwrap());

static PRICE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"(?i)price:\s*([\d.]+)").unwrap(),
        Regex::new(r"(?i)price\s*=\s*([\d.]+)").unwrap(),
        Regex::new(r#"(?i)["']price["']\s*:\s*([\d.]+)"#).unwrap(),
    ]
});

/// The workload's internal listening port: the first line-anchored
/// `EXPOSE <port>` directive in the Dockerfile. Absence is a hard failure
/// before any remote work begins.
pub fn parse_expose_port(dir: &Path) -> Result<u16> {
    let dockerfile = dir.join("Dockerfile");
    let content = std::fs::read_to_string(&dockerfile)
        .map_err(|err| DeployError::Validation(format!("Missing Dockerfile: {err}")))?;

    EXPOSE_RE
        .captures(&content)
        .and_then(|caps| caps[1].parse::<u16>().ok())
        .ok_or_else(|| {
            DeployError::Validation("No EXPOSE directive found in Dockerfile".to_string())
        })
}

/// Read `package.json` name/description. Missing or malformed metadata falls
/// back to defaults rather than failing the deployment.
pub fn parse_tool_meta(dir: &Path) -> ToolMeta {
    let pkg_path = dir.join("package.json");
    let Ok(raw) = std::fs::read_to_string(&pkg_path) else {
        return ToolMeta::default();
    };
    let Ok(pkg) = serde_json::from_str::<serde_json::Value>(&raw) else {
        return ToolMeta::default();
    };

    ToolMeta {
        name: pkg
            .get("name")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .unwrap_or("unnamed-tool")
            .to_string(),
        description: pkg
            .get("description")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string()),
    }
}

fn search_file(path: &Path) -> Option<f64> {
    let content = std::fs::read_to_string(path).ok()?;
    for pattern in PRICE_PATTERNS.iter() {
        if let Some(caps) = pattern.captures(&content) {
            if let Ok(price) = caps[1].parse::<f64>() {
                if price > 0.0 {
                    return Some(price);
                }
            }
        }
    }
    None
}

fn walk_sources(dir: &Path, files: &mut Vec<PathBuf>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    let mut entries: Vec<_> = entries.flatten().collect();
    entries.sort_by_key(|e| e.file_name());
    for entry in entries {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name == "node_modules" || name.starts_with('.') {
            continue;
        }
        let path = entry.path();
        if path.is_dir() {
            walk_sources(&path, files);
        } else if matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("ts" | "js" | "tsx" | "jsx")
        ) {
            files.push(path);
        }
    }
}

/// Scan the package sources for a declared price (`price: 0.02` and
/// friends), preferring `src/` over the package root. Returns 0 (free) when
/// nothing is found.
pub fn parse_static_price(dir: &Path) -> f64 {
    for base in [dir.join("src"), dir.to_path_buf()] {
        let mut files = Vec::new();
        walk_sources(&base, &mut files);
        for file in files {
            if let Some(price) = search_file(&file) {
                return price;
            }
        }
    }
    0.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn staged(files: &[(&str, &str)]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for (rel, content) in files {
            let path = dir.path().join(rel);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).unwrap();
            }
            std::fs::write(path, content).unwrap();
        }
        dir
    }

    #[test]
    fn expose_port_first_directive_wins() {
        let dir = staged(&[("Dockerfile", "FROM node:20\nEXPOSE 3000\nEXPOSE 4000\n")]);
        assert_eq!(parse_expose_port(dir.path()).unwrap(), 3000);
    }

    #[test]
    fn expose_must_be_line_anchored_and_uppercase() {
        let dir = staged(&[("Dockerfile", "# EXPOSE 3000\nexpose 3000\n")]);
        let err = parse_expose_port(dir.path()).unwrap_err();
        assert!(matches!(err, DeployError::Validation(_)));
    }

    #[test]
    fn missing_dockerfile_is_a_validation_error() {
        let dir = staged(&[]);
        assert!(matches!(
            parse_expose_port(dir.path()),
            Err(DeployError::Validation(_))
        ));
    }

    #[test]
    fn tool_meta_reads_package_json() {
        let dir = staged(&[(
            "package.json",
            r#"{"name": "summarizer", "description": "Summarizes text"}"#,
        )]);
        let meta = parse_tool_meta(dir.path());
        assert_eq!(meta.name, "summarizer");
        assert_eq!(meta.description.as_deref(), Some("Summarizes text"));
    }

    #[test]
    fn tool_meta_falls_back_on_missing_or_malformed() {
        let missing = staged(&[]);
        assert_eq!(parse_tool_meta(missing.path()), ToolMeta::default());

        let malformed = staged(&[("package.json", "{not json")]);
        assert_eq!(parse_tool_meta(malformed.path()), ToolMeta::default());
    }

    #[test]
    fn price_scan_prefers_src_and_skips_node_modules() {
        let dir = staged(&[
            ("node_modules/dep/index.js", "price: 9.99"),
            ("src/config.ts", "export const config = { price: 0.02 };"),
            ("index.ts", "price: 0.5"),
        ]);
        assert_eq!(parse_static_price(dir.path()), 0.02);
    }

    #[test]
    fn price_defaults_to_free() {
        let dir = staged(&[("src/index.ts", "export {}")]);
        assert_eq!(parse_static_price(dir.path()), 0.0);
    }
}
