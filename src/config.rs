use anyhow::{Context, Result, bail};
use std::path::{Path, PathBuf};

use crate::client::{ClientConfig, DEFAULT_TIMEOUT};

/// Placeholder portal used when nothing else is configured.
///
/// The DKAN project's demo site may run a DKAN release that no longer serves
/// `/api/action/datastore/search.json`; set `DKANAPI_URL` or `.dkanapirc` to a
/// portal that does.
pub const DEFAULT_URL: &str = "https://demo.getdkan.org";

#[derive(Debug, Default)]
struct RcConfig {
    url: Option<String>,
    verify: Option<bool>,
}

/// Where configuration is looked up. Production code reads the process
/// environment; tests pass their own.
pub(crate) struct Lookup<'a> {
    pub(crate) env: &'a dyn Fn(&str) -> Option<String>,
    pub(crate) cwd: Option<PathBuf>,
    pub(crate) home: Option<PathBuf>,
}

pub(crate) fn load_config(url: Option<String>, verify: Option<bool>) -> crate::Result<ClientConfig> {
    let env = |k: &str| std::env::var(k).ok();
    let lookup = Lookup {
        env: &env,
        cwd: std::env::current_dir().ok(),
        home: dirs::home_dir(),
    };
    resolve(url, verify, &lookup).map_err(|e| crate::Error::configuration(format!("{:#}", e)))
}

pub(crate) fn resolve(
    url: Option<String>,
    verify: Option<bool>,
    lookup: &Lookup<'_>,
) -> Result<ClientConfig> {
    let mut url = url.or_else(|| (lookup.env)("DKANAPI_URL"));
    let mut file_verify: Option<bool> = None;

    if url.is_none() || verify.is_none() {
        for rc_path in &rc_candidates(lookup) {
            if rc_path.exists() {
                let cfg = read_rc(rc_path).with_context(|| {
                    format!("failed to read configuration file {}", rc_path.display())
                })?;

                if url.is_none() {
                    url = cfg.url;
                }
                file_verify = cfg.verify;
                break;
            }
        }
    }

    let url = url
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty())
        .unwrap_or_else(|| DEFAULT_URL.to_string());

    if !(url.starts_with("http://") || url.starts_with("https://")) {
        bail!("invalid portal url [{}] (expected http:// or https://)", url);
    }

    let verify = verify.or(file_verify).unwrap_or(true);

    Ok(ClientConfig {
        url,
        verify,
        timeout: DEFAULT_TIMEOUT,
    })
}

fn read_rc(path: &Path) -> Result<RcConfig> {
    let text = std::fs::read_to_string(path)?;
    let mut cfg = RcConfig::default();

    // `url:` may carry its value on the following line.
    let mut pending_key: Option<&str> = None;

    for (lineno, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some(pk) = pending_key.take() {
            if !looks_like_key(line) {
                let v = strip_quotes(line);
                if pk == "url" {
                    cfg.url = Some(v.to_string());
                }
                continue;
            }
        }

        if let Some((k, v)) = line.split_once(':') {
            let k = k.trim();
            let v = strip_quotes(v.trim());
            match k {
                "url" => {
                    if !v.is_empty() {
                        cfg.url = Some(v.to_string());
                    } else {
                        pending_key = Some("url");
                    }
                }
                "verify" => {
                    if !v.is_empty() {
                        cfg.verify = Some(parse_bool(v).with_context(|| {
                            format!("line {}: invalid verify value", lineno + 1)
                        })?);
                    }
                }
                _ => {}
            }
        }
    }

    Ok(cfg)
}

// A URL such as `https://host` also contains a colon, so only bare words count as keys.
fn looks_like_key(line: &str) -> bool {
    line.split_once(':')
        .is_some_and(|(k, _)| !k.is_empty() && k.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'))
        && !line.contains("://")
}

fn parse_bool(v: &str) -> Result<bool> {
    match v.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => bail!("expected 0/1 or true/false, got [{}]", other),
    }
}

fn strip_quotes(s: &str) -> &str {
    let s = s.trim();
    if (s.starts_with('"') && s.ends_with('"') && s.len() >= 2)
        || (s.starts_with('\'') && s.ends_with('\'') && s.len() >= 2)
    {
        &s[1..s.len() - 1]
    } else {
        s
    }
}

fn rc_candidates(lookup: &Lookup<'_>) -> Vec<PathBuf> {
    // 1) DKANAPI_RC (explicit)
    // 2) ./.dkanapirc
    // 3) ~/.dkanapirc
    if let Some(p) = (lookup.env)("DKANAPI_RC") {
        return vec![PathBuf::from(p)];
    }

    let mut v = Vec::new();
    if let Some(cwd) = &lookup.cwd {
        v.push(cwd.join(".dkanapirc"));
    }
    if let Some(home) = &lookup.home {
        v.push(home.join(".dkanapirc"));
    }
    v
}
