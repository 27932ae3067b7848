//! Lifecycle configuration (TOML).

use crate::volume::device_waiter::PollPolicy;
use crate::volume::format_mounter::{FormatHelper, DEFAULT_FORMAT_HELPER, DEFAULT_FS_TYPE};
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_PLUGIN_DIR: &str = "/var/lib/blockvol/plugins/aws-ebs";
const DEFAULT_FORMAT_TIMEOUT_SECS: u64 = 10 * 60;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LifecycleConfig {
    /// Host-local directory that owns the global mount points (`<plugin_dir>/mounts/<volume>`).
    pub plugin_dir: PathBuf,
    pub device_poll: PollPolicy,
    /// Format-and-mount helper executable.
    pub format_helper: String,
    /// Filesystem used for volumes whose handle leaves the fs type empty.
    pub default_fs_type: String,
    pub format_timeout_secs: u64,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            plugin_dir: PathBuf::from(DEFAULT_PLUGIN_DIR),
            device_poll: PollPolicy::default(),
            format_helper: DEFAULT_FORMAT_HELPER.to_string(),
            default_fs_type: DEFAULT_FS_TYPE.to_string(),
            format_timeout_secs: DEFAULT_FORMAT_TIMEOUT_SECS,
        }
    }
}

impl LifecycleConfig {
    /// Default configuration rooted at `plugin_dir`.
    pub fn with_plugin_dir(plugin_dir: impl Into<PathBuf>) -> Self {
        Self {
            plugin_dir: plugin_dir.into(),
            ..Self::default()
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("invalid config {}", path.display()))
    }

    pub fn parse(toml_str: &str) -> Result<Self> {
        let cfg: Self = toml::from_str(toml_str).context("failed to parse lifecycle config")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.plugin_dir.is_absolute() {
            return Err(anyhow!(
                "plugin_dir must be absolute, got {}",
                self.plugin_dir.display()
            ));
        }
        if self.device_poll.attempts == 0 {
            return Err(anyhow!("device_poll.attempts must be at least 1"));
        }
        if self.format_helper.trim().is_empty() {
            return Err(anyhow!("format_helper must not be empty"));
        }
        if self.default_fs_type.trim().is_empty() {
            return Err(anyhow!("default_fs_type must not be empty"));
        }
        if self.format_timeout_secs == 0 {
            return Err(anyhow!("format_timeout_secs must be at least 1"));
        }
        Ok(())
    }

    /// `fs_type`, or the configured default when it is empty.
    pub fn resolve_fs_type<'a>(&'a self, fs_type: &'a str) -> &'a str {
        if fs_type.is_empty() {
            &self.default_fs_type
        } else {
            fs_type
        }
    }

    pub fn format_helper(&self) -> FormatHelper {
        FormatHelper {
            program: self.format_helper.clone(),
            timeout: Duration::from_secs(self.format_timeout_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_reference_policy() {
        let cfg = LifecycleConfig::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.device_poll.attempts, 10);
        assert_eq!(cfg.device_poll.interval(), Duration::from_secs(1));
        assert_eq!(cfg.default_fs_type, "ext4");
        assert_eq!(
            cfg.format_helper,
            "/usr/share/google/safe_format_and_mount"
        );
    }

    #[test]
    fn parse_overrides_selected_fields() {
        let doc = r#"
plugin_dir = "/srv/blockvol"
default_fs_type = "xfs"

[device_poll]
attempts = 30
"#;
        let cfg = LifecycleConfig::parse(doc).unwrap();
        assert_eq!(cfg.plugin_dir, PathBuf::from("/srv/blockvol"));
        assert_eq!(cfg.default_fs_type, "xfs");
        assert_eq!(cfg.device_poll.attempts, 30);
        assert_eq!(cfg.device_poll.interval_ms, 1000);
        assert_eq!(cfg.format_timeout_secs, DEFAULT_FORMAT_TIMEOUT_SECS);
    }

    #[test]
    fn parse_rejects_zero_attempts() {
        let err = LifecycleConfig::parse("[device_poll]\nattempts = 0\n").unwrap_err();
        assert!(format!("{:#}", err).contains("attempts"));
    }

    #[test]
    fn parse_rejects_relative_plugin_dir() {
        assert!(LifecycleConfig::parse("plugin_dir = \"var/lib\"\n").is_err());
    }

    #[test]
    fn parse_rejects_unknown_keys() {
        assert!(LifecycleConfig::parse("mount_retries = 3\n").is_err());
    }

    #[test]
    fn load_reads_file_and_names_it_on_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blockvol.toml");
        fs::write(&path, "format_timeout_secs = 120\n").unwrap();
        assert_eq!(LifecycleConfig::load(&path).unwrap().format_timeout_secs, 120);

        fs::write(&path, "format_helper = \"\"\n").unwrap();
        let err = LifecycleConfig::load(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("blockvol.toml"));
    }

    #[test]
    fn empty_fs_type_resolves_to_configured_default() {
        let mut cfg = LifecycleConfig::default();
        cfg.default_fs_type = "xfs".to_string();
        assert_eq!(cfg.resolve_fs_type(""), "xfs");
        assert_eq!(cfg.resolve_fs_type("ext4"), "ext4");
    }

    #[test]
    fn format_helper_carries_timeout() {
        let mut cfg = LifecycleConfig::default();
        cfg.format_timeout_secs = 42;
        assert_eq!(cfg.format_helper().timeout, Duration::from_secs(42));
    }
}
