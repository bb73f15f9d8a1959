use log::debug;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::client::ClientConfig;
use crate::error::{PowerError, Result};

/// Default base URL of the POWER endpoint family.
pub const DEFAULT_URL: &str = "https://power.larc.nasa.gov/api";

/// Default per-request timeout.
pub(crate) const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Default)]
struct RcConfig {
    url: Option<String>,
    verify: Option<bool>,
    timeout: Option<u64>,
}

/// Resolves the client configuration using (in order of precedence):
/// - explicit `url`/`verify` arguments
/// - the `NASAPOWER_URL` environment variable
/// - a config file from `NASAPOWER_RC`, `./.nasapowerrc`, or `~/.nasapowerrc`
/// - built-in defaults (the service needs no key, so nothing is required)
pub(crate) fn load_config(url: Option<String>, verify: Option<bool>) -> Result<ClientConfig> {
    let mut url = url.or_else(|| std::env::var("NASAPOWER_URL").ok());
    let mut file_verify: Option<bool> = None;
    let mut file_timeout: Option<u64> = None;

    if url.is_none() || verify.is_none() {
        for rc_path in rc_candidates() {
            if rc_path.exists() {
                debug!("reading configuration from {}", rc_path.display());
                let cfg = read_rc(&rc_path)?;

                if url.is_none() {
                    url = cfg.url;
                }
                file_verify = cfg.verify;
                file_timeout = cfg.timeout;
                break;
            }
        }
    }

    Ok(ClientConfig {
        url: url.unwrap_or_else(|| DEFAULT_URL.to_string()),
        verify: verify.or(file_verify).unwrap_or(true),
        timeout: file_timeout
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TIMEOUT),
    })
}

fn read_rc(path: &Path) -> Result<RcConfig> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        PowerError::configuration(format!(
            "failed to read configuration file {}: {e}",
            path.display()
        ))
    })?;

    let mut cfg = RcConfig::default();

    for raw in text.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some((k, v)) = line.split_once(':') {
            let k = k.trim();
            let v = strip_quotes(v.trim());
            match k {
                "url" => {
                    if !v.is_empty() {
                        cfg.url = Some(v.to_string());
                    }
                }
                "verify" => {
                    if !v.is_empty() {
                        cfg.verify = Some(v != "0");
                    }
                }
                "timeout" => {
                    let secs = v.parse::<u64>().map_err(|_| {
                        PowerError::configuration(format!(
                            "timeout in {} must be a number of seconds (got {v:?})",
                            path.display()
                        ))
                    })?;
                    cfg.timeout = Some(secs);
                }
                _ => {}
            }
        }
    }

    Ok(cfg)
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

fn rc_candidates() -> Vec<PathBuf> {
    // Search order:
    // 1) NASAPOWER_RC (explicit)
    // 2) ./.nasapowerrc (current working directory)
    // 3) ~/.nasapowerrc
    if let Ok(p) = std::env::var("NASAPOWER_RC") {
        return vec![PathBuf::from(p)];
    }

    let mut v = Vec::new();
    if let Ok(cwd) = std::env::current_dir() {
        v.push(cwd.join(".nasapowerrc"));
    }
    if let Some(home) = dirs::home_dir() {
        v.push(home.join(".nasapowerrc"));
    }
    v
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn rc_file_parses_url_verify_and_timeout() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# mirror for integration tests").unwrap();
        writeln!(file, "url: \"http://localhost:9000/api\"").unwrap();
        writeln!(file, "verify: 0").unwrap();
        writeln!(file, "timeout: 5").unwrap();

        let cfg = read_rc(file.path()).unwrap();
        assert_eq!(cfg.url.as_deref(), Some("http://localhost:9000/api"));
        assert_eq!(cfg.verify, Some(false));
        assert_eq!(cfg.timeout, Some(5));
    }

    #[test]
    fn rc_file_rejects_bad_timeout() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "timeout: soon").unwrap();
        assert!(matches!(
            read_rc(file.path()),
            Err(PowerError::Configuration(_))
        ));
    }

    #[test]
    fn quotes_are_stripped() {
        assert_eq!(strip_quotes("'x'"), "x");
        assert_eq!(strip_quotes("\"x\""), "x");
        assert_eq!(strip_quotes("x"), "x");
    }
}
