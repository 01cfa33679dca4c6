//! Shared helpers, limits and the config error type.

use std::path::Path;

use tracing::warn;

// ── Limits ────────────────────────────────────────────────────────

/// Maximum flow conditions loaded from one config document.
pub(super) const MAX_FLOW_CONDITIONS: usize = 4096;
/// Maximum matches per flow condition (indices are 16-bit).
pub(super) const MAX_MATCHES_PER_CONDITION: usize = 65_535;
/// Maximum MAC mappings.
pub(super) const MAX_MAC_MAPS: usize = 4096;
/// Maximum allow-listed hosts per MAC mapping.
pub(super) const MAX_ALLOWED_HOSTS: usize = 65_536;

// ── Config errors ──────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("I/O error reading config: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(String),

    #[error("validation error: {field}: {message}")]
    Validation { field: String, message: String },
}

impl From<serde_yaml_ng::Error> for ConfigError {
    fn from(e: serde_yaml_ng::Error) -> Self {
        Self::Yaml(e.to_string())
    }
}

impl ConfigError {
    pub(super) fn validation(field: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.to_string(),
        }
    }
}

/// Log a warning if a file is world-readable (Unix only).
#[cfg(unix)]
pub(super) fn warn_if_world_readable(path: &Path, label: &str) {
    use std::os::unix::fs::PermissionsExt;
    if let Ok(metadata) = std::fs::metadata(path) {
        let mode = metadata.permissions().mode();
        if mode & 0o004 != 0 {
            warn!(
                path = %path.display(),
                mode = format!("{mode:04o}"),
                "{label} is world-readable, consider chmod 640 or stricter",
            );
        }
    }
}

#[cfg(not(unix))]
pub(super) fn warn_if_world_readable(_path: &Path, _label: &str) {}

/// Enforce a maximum count on a config collection.
pub(super) fn check_limit(field: &str, count: usize, max: usize) -> Result<(), ConfigError> {
    if count > max {
        return Err(ConfigError::validation(
            field,
            format!("count {count} exceeds maximum {max}"),
        ));
    }
    Ok(())
}
