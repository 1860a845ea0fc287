//! Path access control engine
//!
//! Every filesystem path the loader touches is evaluated against a
//! [`PathPolicy`] before it is read. The engine rejects traversal attempts,
//! virtual filesystem roots, and user-configured restricted paths, while
//! supporting deliberate glob-based exceptions.
//!
//! Evaluation never returns an error: malformed input is itself a denial
//! reason, so a single bad path can never abort a whole run.

use crate::config::SecurityConfig;
use crate::error::{Error, Result};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};

/// Virtual filesystem roots that are never readable, regardless of patterns.
const ALWAYS_DENIED: &[&str] = &["/proc", "/sys", "/dev", "/run", "/var/run"];

/// System directories blocked by default but downgradable to a warning.
const SOFT_DENIED: &[&str] = &["/etc", "/root", "/boot", "/sbin", "/usr/sbin"];

/// How soft-blocked system directories are treated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoftBlockMode {
    /// Deny access (default)
    Deny,
    /// Log a warning and allow access
    Warn,
}

/// Why a path was allowed or denied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionReason {
    /// No rule matched
    Allowed,
    /// An allow pattern matched
    AllowPattern,
    /// A soft-blocked root matched but policy is in warn mode
    SoftBlockWaived,
    /// Path was relative, contained traversal, or could not be resolved
    InvalidPath,
    /// Path does not exist and existence was required
    NotFound,
    /// Path is under a virtual filesystem root
    AlwaysBlocked,
    /// Path is under a user-configured restricted root
    CustomRestricted,
    /// A denied glob pattern matched
    PatternDenied,
    /// Path is under a soft-blocked system directory
    SoftBlocked,
}

/// Result of evaluating one candidate path
#[derive(Debug, Clone)]
pub struct PathDecision {
    pub allowed: bool,
    pub reason: DecisionReason,
    /// The glob pattern that decided the outcome, if any
    pub matched_pattern: Option<String>,
    /// The canonical path, when resolution succeeded
    pub canonical: Option<PathBuf>,
}

impl PathDecision {
    /// Human-readable explanation for logs and error messages
    pub fn describe(&self) -> String {
        let base = match self.reason {
            DecisionReason::Allowed => "allowed",
            DecisionReason::AllowPattern => "allowed by pattern",
            DecisionReason::SoftBlockWaived => "restricted directory allowed in warn mode",
            DecisionReason::InvalidPath => "path is relative, contains traversal, or cannot be resolved",
            DecisionReason::NotFound => "path does not exist",
            DecisionReason::AlwaysBlocked => "path is under a virtual filesystem",
            DecisionReason::CustomRestricted => "path is under a restricted directory",
            DecisionReason::PatternDenied => "path matches a denied pattern",
            DecisionReason::SoftBlocked => "path is under a restricted system directory",
        };
        match &self.matched_pattern {
            Some(pattern) => format!("{} ('{}')", base, pattern),
            None => base.to_string(),
        }
    }

    fn allowed(reason: DecisionReason, canonical: PathBuf) -> Self {
        Self {
            allowed: true,
            reason,
            matched_pattern: None,
            canonical: Some(canonical),
        }
    }

    fn denied(reason: DecisionReason) -> Self {
        Self {
            allowed: false,
            reason,
            matched_pattern: None,
            canonical: None,
        }
    }
}

/// Immutable path access policy
///
/// Pattern order is preserved so denials can report which pattern matched.
#[derive(Debug)]
pub struct PathPolicy {
    always_denied: Vec<PathBuf>,
    soft_denied: Vec<PathBuf>,
    restricted: Vec<PathBuf>,
    denied_patterns: Vec<String>,
    denied_set: GlobSet,
    allowed_patterns: Vec<String>,
    allowed_set: GlobSet,
    soft_block_mode: SoftBlockMode,
}

impl PathPolicy {
    /// Build a policy from explicit parts.
    ///
    /// Fails with [`Error::Config`] if a restricted path is relative or a
    /// glob pattern does not compile. Restricted entries are never resolved
    /// against the working directory.
    pub fn new(
        restricted: &[PathBuf],
        denied_patterns: &[String],
        allowed_patterns: &[String],
        soft_block_mode: SoftBlockMode,
    ) -> Result<Self> {
        let mut normalized = Vec::with_capacity(restricted.len());
        for path in restricted {
            if !path.is_absolute() {
                return Err(Error::Config(format!(
                    "restricted path '{}' is not absolute",
                    path.display()
                )));
            }
            // Resolve symlinks so configured roots match canonical candidates.
            let resolved = std::fs::canonicalize(path).unwrap_or_else(|_| lexical_normalize(path));
            normalized.push(resolved);
        }

        Ok(Self {
            always_denied: ALWAYS_DENIED.iter().map(PathBuf::from).collect(),
            soft_denied: SOFT_DENIED.iter().map(PathBuf::from).collect(),
            restricted: normalized,
            denied_set: compile_globs(denied_patterns)?,
            denied_patterns: denied_patterns.to_vec(),
            allowed_set: compile_globs(allowed_patterns)?,
            allowed_patterns: allowed_patterns.to_vec(),
            soft_block_mode,
        })
    }

    /// Build a policy from the security section of the config
    pub fn from_config(security: &SecurityConfig) -> Result<Self> {
        let mode = match security.soft_block_mode.as_str() {
            "warn" => SoftBlockMode::Warn,
            _ => SoftBlockMode::Deny,
        };
        Self::new(
            &security.restricted_paths,
            &security.denied_patterns,
            &security.allowed_patterns,
            mode,
        )
    }

    /// Evaluate a candidate path against this policy.
    ///
    /// Tier order: literal roots (always-denied, restricted) are checked
    /// before any pattern and cannot be overridden; allow patterns
    /// short-circuit denied patterns and soft blocks; soft blocks apply last
    /// and honor [`SoftBlockMode`].
    pub fn evaluate(&self, candidate: &Path, require_exists: bool) -> PathDecision {
        let expanded = match expand_tilde(candidate) {
            Some(p) => p,
            None => {
                warn!(path = %candidate.display(), "cannot expand user home in path");
                return PathDecision::denied(DecisionReason::InvalidPath);
            }
        };

        // Reject traversal before normalization removes the evidence.
        if expanded
            .components()
            .any(|c| matches!(c, Component::ParentDir))
        {
            warn!(path = %candidate.display(), "path contains parent-directory traversal");
            return PathDecision::denied(DecisionReason::InvalidPath);
        }

        if !expanded.is_absolute() {
            warn!(path = %candidate.display(), "relative paths must be anchored by the caller");
            return PathDecision::denied(DecisionReason::InvalidPath);
        }

        let canonical = match std::fs::canonicalize(&expanded) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                if require_exists {
                    return PathDecision::denied(DecisionReason::NotFound);
                }
                lexical_normalize(&expanded)
            }
            Err(e) => {
                warn!(path = %expanded.display(), error = %e, "failed to resolve path");
                return PathDecision::denied(DecisionReason::InvalidPath);
            }
        };

        if require_exists && !canonical.exists() {
            return PathDecision::denied(DecisionReason::NotFound);
        }

        // Literal tier: never overridable by patterns.
        for root in &self.always_denied {
            if canonical.starts_with(root) {
                warn!(
                    path = %canonical.display(),
                    root = %root.display(),
                    "denied: virtual filesystem root"
                );
                return PathDecision::denied(DecisionReason::AlwaysBlocked);
            }
        }

        for root in &self.restricted {
            if canonical.starts_with(root) {
                warn!(
                    path = %canonical.display(),
                    root = %root.display(),
                    "denied: restricted path"
                );
                return PathDecision::denied(DecisionReason::CustomRestricted);
            }
        }

        if let Some(pattern) = self.first_match(&self.allowed_set, &self.allowed_patterns, &canonical)
        {
            debug!(path = %canonical.display(), pattern = %pattern, "allowed by pattern");
            return PathDecision::allowed(DecisionReason::AllowPattern, canonical);
        }

        if let Some(pattern) = self.first_match(&self.denied_set, &self.denied_patterns, &canonical)
        {
            warn!(
                path = %canonical.display(),
                pattern = %pattern,
                "denied: matched denied pattern"
            );
            return PathDecision {
                allowed: false,
                reason: DecisionReason::PatternDenied,
                matched_pattern: Some(pattern),
                canonical: None,
            };
        }

        for root in &self.soft_denied {
            if canonical.starts_with(root) {
                match self.soft_block_mode {
                    SoftBlockMode::Deny => {
                        warn!(
                            path = %canonical.display(),
                            root = %root.display(),
                            "denied: soft-blocked system directory"
                        );
                        return PathDecision::denied(DecisionReason::SoftBlocked);
                    }
                    SoftBlockMode::Warn => {
                        warn!(
                            path = %canonical.display(),
                            root = %root.display(),
                            "allowing soft-blocked system directory (warn mode)"
                        );
                        return PathDecision::allowed(DecisionReason::SoftBlockWaived, canonical);
                    }
                }
            }
        }

        PathDecision::allowed(DecisionReason::Allowed, canonical)
    }

    fn first_match(&self, set: &GlobSet, patterns: &[String], path: &Path) -> Option<String> {
        set.matches(path)
            .into_iter()
            .next()
            .map(|i| patterns[i].clone())
    }
}

/// Compile glob patterns with path-aware `*` (does not cross separators;
/// `**` does), case-sensitive, anchored to the full canonical path.
fn compile_globs(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = GlobBuilder::new(pattern)
            .literal_separator(true)
            .build()
            .map_err(|e| Error::Config(format!("invalid glob pattern '{}': {}", pattern, e)))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| Error::Config(format!("failed to compile glob patterns: {}", e)))
}

/// Expand a leading `~` to the invoking user's home directory.
///
/// Returns None when expansion is needed but no home directory is known,
/// or for `~otheruser` forms.
fn expand_tilde(path: &Path) -> Option<PathBuf> {
    let raw = path.to_string_lossy();
    if raw == "~" {
        return dirs::home_dir();
    }
    if let Some(rest) = raw.strip_prefix("~/") {
        return dirs::home_dir().map(|home| home.join(rest));
    }
    if raw.starts_with('~') {
        // ~user expansion is not supported for a single-user CLI.
        return None;
    }
    Some(path.to_path_buf())
}

/// Collapse `.` components without touching the filesystem.
///
/// Only reached for nonexistent paths; `..` has already been rejected.
fn lexical_normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_policy() -> PathPolicy {
        PathPolicy::new(&[], &[], &[], SoftBlockMode::Deny).unwrap()
    }

    #[test]
    fn test_relative_path_denied() {
        let policy = open_policy();
        let decision = policy.evaluate(Path::new("docs/adr"), false);
        assert!(!decision.allowed);
        assert_eq!(decision.reason, DecisionReason::InvalidPath);
    }

    #[test]
    fn test_traversal_denied() {
        let policy = open_policy();
        let decision = policy.evaluate(Path::new("/tmp/../etc/passwd"), false);
        assert!(!decision.allowed);
        assert_eq!(decision.reason, DecisionReason::InvalidPath);
    }

    #[test]
    fn test_virtual_filesystem_root_denied() {
        let policy = open_policy();
        let decision = policy.evaluate(Path::new("/proc/self/status"), false);
        assert!(!decision.allowed);
        assert_eq!(decision.reason, DecisionReason::AlwaysBlocked);
    }

    #[test]
    fn test_prefix_boundary_respected() {
        let tmp = TempDir::new().unwrap();
        let etc = tmp.path().join("etc");
        let etcetera = tmp.path().join("etcetera");
        std::fs::create_dir(&etc).unwrap();
        std::fs::create_dir(&etcetera).unwrap();
        std::fs::write(etcetera.join("notes.md"), "ok").unwrap();

        let policy =
            PathPolicy::new(&[etc], &[], &[], SoftBlockMode::Deny).unwrap();

        let under_sibling = policy.evaluate(&etcetera.join("notes.md"), true);
        assert!(under_sibling.allowed, "sibling dir must not match by prefix");

        let under_root = policy.evaluate(&tmp.path().join("etc"), false);
        assert!(!under_root.allowed);
        assert_eq!(under_root.reason, DecisionReason::CustomRestricted);
    }

    #[test]
    fn test_allow_pattern_overrides_denied_pattern() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("keep.md");
        std::fs::write(&file, "x").unwrap();

        let policy = PathPolicy::new(
            &[],
            &["**/*.md".to_string()],
            &["**/keep.md".to_string()],
            SoftBlockMode::Deny,
        )
        .unwrap();

        let decision = policy.evaluate(&file, true);
        assert!(decision.allowed);
        assert_eq!(decision.reason, DecisionReason::AllowPattern);
    }

    #[test]
    fn test_denied_pattern_reports_match() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("secret.md");
        std::fs::write(&file, "x").unwrap();

        let policy = PathPolicy::new(
            &[],
            &["**/secret.*".to_string()],
            &[],
            SoftBlockMode::Deny,
        )
        .unwrap();

        let decision = policy.evaluate(&file, true);
        assert!(!decision.allowed);
        assert_eq!(decision.reason, DecisionReason::PatternDenied);
        assert_eq!(decision.matched_pattern.as_deref(), Some("**/secret.*"));
    }

    #[test]
    fn test_restricted_root_beats_allow_pattern() {
        let tmp = TempDir::new().unwrap();
        let vault = tmp.path().join("vault");
        std::fs::create_dir(&vault).unwrap();
        let file = vault.join("adr.md");
        std::fs::write(&file, "x").unwrap();

        let policy = PathPolicy::new(
            &[vault],
            &[],
            &["**/*.md".to_string()],
            SoftBlockMode::Deny,
        )
        .unwrap();

        let decision = policy.evaluate(&file, true);
        assert!(!decision.allowed);
        assert_eq!(decision.reason, DecisionReason::CustomRestricted);
    }

    #[test]
    fn test_single_star_does_not_cross_separators() {
        let tmp = TempDir::new().unwrap();
        let nested = tmp.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();
        let file = nested.join("doc.md");
        std::fs::write(&file, "x").unwrap();

        let shallow = format!("{}/*.md", tmp.path().display());
        let policy =
            PathPolicy::new(&[], &[shallow], &[], SoftBlockMode::Deny).unwrap();

        // The pattern only covers files directly under the tempdir.
        let decision = policy.evaluate(&file, true);
        assert!(decision.allowed);
    }

    #[test]
    fn test_not_found_when_existence_required() {
        let policy = open_policy();
        let decision = policy.evaluate(Path::new("/tmp/archivist-no-such-file.md"), true);
        assert!(!decision.allowed);
        assert_eq!(decision.reason, DecisionReason::NotFound);
    }

    #[test]
    fn test_missing_path_allowed_when_existence_optional() {
        let policy = open_policy();
        let decision = policy.evaluate(Path::new("/tmp/archivist-no-such-file.md"), false);
        assert!(decision.allowed);
    }

    #[test]
    fn test_soft_block_modes() {
        let deny = PathPolicy::new(&[], &[], &[], SoftBlockMode::Deny).unwrap();
        let decision = deny.evaluate(Path::new("/etc/hosts"), false);
        assert!(!decision.allowed);
        assert_eq!(decision.reason, DecisionReason::SoftBlocked);

        let warn = PathPolicy::new(&[], &[], &[], SoftBlockMode::Warn).unwrap();
        let decision = warn.evaluate(Path::new("/etc/hosts"), false);
        assert!(decision.allowed);
        assert_eq!(decision.reason, DecisionReason::SoftBlockWaived);
    }

    #[test]
    fn test_relative_restricted_path_rejected_at_construction() {
        let err = PathPolicy::new(
            &[PathBuf::from("etc/secrets")],
            &[],
            &[],
            SoftBlockMode::Deny,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_invalid_glob_rejected_at_construction() {
        let err = PathPolicy::new(
            &[],
            &["[".to_string()],
            &[],
            SoftBlockMode::Deny,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
