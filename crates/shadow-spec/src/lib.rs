//! Parsing and canonical representation of repository specifications for the
//! shadow lifecycle engine.
//!
//! A [`RepoSpec`] identifies one repository to include in a shadow: its forge
//! coordinates (`org`/`name`), an optional ref, and an optional local working
//! copy to snapshot from.

use std::path::{Path, PathBuf};

use regex::Regex;
use serde::{Deserialize, Serialize};

mod error;
pub use error::{Error, Result};

/// Canonical identity of a repository participating in a shadow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoSpec {
    pub org: String,
    pub name: String,
    #[serde(rename = "ref", skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot_commit: Option<String>,
}

impl RepoSpec {
    /// `org/name`, the forge-facing identity of this repository.
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.org, self.name)
    }

    /// Whether this spec is backed by a local working copy.
    pub fn is_local(&self) -> bool {
        self.local_path.is_some()
    }

    /// Human-facing label including ref and local-source annotation.
    pub fn display_name(&self) -> String {
        let mut base = self.full_name();
        if let Some(r) = &self.reference {
            base = format!("{base}@{r}");
        }
        if let Some(p) = &self.local_path {
            base = format!("{base} (local: {})", p.display());
        }
        base
    }

    /// Parse `org/name`, `org/name@ref`, or `https://<forge>/org/name[.git][@ref]`.
    ///
    /// Whitespace anywhere in the input is rejected rather than trimmed.
    pub fn parse(spec: &str) -> Result<Self> {
        if spec.chars().any(char::is_whitespace) {
            return Err(Error::invalid_input(format!(
                "repository spec must not contain whitespace: {spec:?}"
            )));
        }

        if let Some(caps) = url_re().captures(spec) {
            let org = caps.get(1).unwrap().as_str().to_string();
            let name = caps.get(2).unwrap().as_str().to_string();
            let reference = caps.get(3).map(|m| m.as_str().to_string());
            return Ok(Self {
                org,
                name,
                reference,
                local_path: None,
                snapshot_commit: None,
            });
        }

        if let Some(caps) = simple_re().captures(spec) {
            let org = caps.get(1).unwrap().as_str().to_string();
            let name = caps.get(2).unwrap().as_str().to_string();
            let reference = caps.get(3).map(|m| m.as_str().to_string());
            return Ok(Self {
                org,
                name,
                reference,
                local_path: None,
                snapshot_commit: None,
            });
        }

        Err(Error::invalid_input(format!(
            "not a valid repository specification: {spec:?}"
        )))
    }

    /// Parse a local mapping `<local_path>:<org/name>[@ref]`.
    ///
    /// The path is split on the *last* `:` so that Windows-style drive
    /// letters and paths containing `:` are tolerated. `local_path` is
    /// expanded and made absolute; it must contain a top-level git
    /// directory, otherwise this fails with [`Error::InvalidLocalPath`].
    pub fn parse_local(mapping: &str) -> Result<Self> {
        if mapping.chars().any(char::is_whitespace) {
            return Err(Error::invalid_input(format!(
                "local mapping must not contain whitespace: {mapping:?}"
            )));
        }

        let (path_str, repo_spec) = mapping.rsplit_once(':').ok_or_else(|| {
            Error::invalid_input(format!(
                "expected '<path>:<org>/<name>[@ref]', got: {mapping:?}"
            ))
        })?;

        let expanded = expand_tilde(path_str);
        let local_path = expanded
            .canonicalize()
            .map_err(|_| Error::invalid_local_path(expanded.display().to_string()))?;

        if !local_path.join(".git").exists() {
            return Err(Error::invalid_local_path(local_path.display().to_string()));
        }

        let mut base = Self::parse(repo_spec)?;
        base.local_path = Some(local_path);
        Ok(base)
    }
}

impl std::fmt::Display for RepoSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(local_path) = &self.local_path {
            write!(f, "{}:{}", local_path.display(), self.full_name())?;
        } else {
            write!(f, "{}", self.full_name())?;
        }
        if let Some(r) = &self.reference {
            write!(f, "@{r}")?;
        }
        Ok(())
    }
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs_home() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

fn dirs_home() -> Option<PathBuf> {
    std::env::var_os("HOME").map(PathBuf::from)
}

fn url_re() -> &'static Regex {
    static RE: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^https?://[^/]+/([^/]+)/([^/@.]+)(?:\.git)?(?:@(.+))?$").unwrap()
    })
}

fn simple_re() -> &'static Regex {
    static RE: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^([^/@]+)/([^/@]+)(?:@(.+))?$").unwrap())
}

/// Validate that `path` is usable as a [`RepoSpec::local_path`].
pub fn validate_local_repo(path: &Path) -> Result<PathBuf> {
    let absolute = path
        .canonicalize()
        .map_err(|_| Error::invalid_local_path(path.display().to_string()))?;
    if !absolute.join(".git").exists() {
        return Err(Error::invalid_local_path(absolute.display().to_string()));
    }
    Ok(absolute)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_form() {
        let spec = RepoSpec::parse("acme/r1").unwrap();
        assert_eq!(spec.org, "acme");
        assert_eq!(spec.name, "r1");
        assert_eq!(spec.reference, None);
        assert!(!spec.is_local());
    }

    #[test]
    fn parses_simple_form_with_ref() {
        let spec = RepoSpec::parse("acme/r1@feature/x").unwrap();
        assert_eq!(spec.org, "acme");
        assert_eq!(spec.name, "r1");
        assert_eq!(spec.reference.as_deref(), Some("feature/x"));
    }

    #[test]
    fn parses_url_form() {
        let spec = RepoSpec::parse("https://github.com/acme/r1.git@main").unwrap();
        assert_eq!(spec.org, "acme");
        assert_eq!(spec.name, "r1");
        assert_eq!(spec.reference.as_deref(), Some("main"));
    }

    #[test]
    fn rejects_whitespace() {
        assert!(RepoSpec::parse("acme/ r1").is_err());
    }

    #[test]
    fn rejects_garbage() {
        assert!(RepoSpec::parse("not-a-spec").is_err());
    }

    #[test]
    fn round_trips_through_display() {
        let spec = RepoSpec::parse("acme/r1@main").unwrap();
        let again = RepoSpec::parse(&spec.to_string()).unwrap();
        assert_eq!(spec, again);
    }

    #[test]
    fn parse_local_requires_git_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mapping = format!("{}:acme/r1", dir.path().display());
        let err = RepoSpec::parse_local(&mapping).unwrap_err();
        assert!(matches!(err, Error::InvalidLocalPath { .. }));
    }

    #[test]
    fn parse_local_succeeds_with_git_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join(".git")).unwrap();
        let mapping = format!("{}:acme/r1@main", dir.path().display());
        let spec = RepoSpec::parse_local(&mapping).unwrap();
        assert_eq!(spec.full_name(), "acme/r1");
        assert_eq!(spec.reference.as_deref(), Some("main"));
        assert!(spec.is_local());
    }
}
