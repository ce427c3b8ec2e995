use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CoreConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub audit: AuditConfig,
    #[serde(default)]
    pub backup: BackupConfig,
    #[serde(default)]
    pub export: ExportConfig,
}

impl CoreConfig {
    pub fn load(root: &Path) -> Result<Self> {
        let path = root.join("config.toml");
        let mut cfg = if path.exists() {
            let text = fs::read_to_string(&path)
                .with_context(|| format!("reading config file {}", path.display()))?;
            toml::from_str::<CoreConfig>(&text)
                .with_context(|| format!("parsing config file {}", path.display()))?
        } else {
            tracing::info!(
                "No config file found at {}. Using CoreConfig::default().",
                path.display()
            );
            CoreConfig::default()
        };
        cfg.resolve_paths(root);
        Ok(cfg)
    }

    fn resolve_paths(&mut self, root: &Path) {
        self.database.path = absolutize(root, &self.database.path);
        self.backup.dir = absolutize(root, &self.backup.dir);
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "DatabaseConfig::default_path")]
    pub path: PathBuf,
}

impl DatabaseConfig {
    fn default_path() -> PathBuf {
        PathBuf::from("meddic_data.db")
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: Self::default_path(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuditConfig {
    #[serde(default = "AuditConfig::default_enabled")]
    pub enabled: bool,
}

impl AuditConfig {
    fn default_enabled() -> bool {
        true
    }
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: Self::default_enabled(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackupConfig {
    #[serde(default = "BackupConfig::default_enabled")]
    pub enabled: bool,
    #[serde(default = "BackupConfig::default_dir")]
    pub dir: PathBuf,
    #[serde(default = "BackupConfig::default_retention_days")]
    pub retention_days: u32,
}

impl BackupConfig {
    fn default_enabled() -> bool {
        true
    }

    fn default_dir() -> PathBuf {
        PathBuf::from("backups")
    }

    fn default_retention_days() -> u32 {
        30
    }
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            enabled: Self::default_enabled(),
            dir: Self::default_dir(),
            retention_days: Self::default_retention_days(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExportConfig {
    #[serde(default = "ExportConfig::default_true")]
    pub csv_enabled: bool,
    #[serde(default = "ExportConfig::default_true")]
    pub document_enabled: bool,
    #[serde(default = "ExportConfig::default_line_width")]
    pub line_width: usize,
    #[serde(default = "ExportConfig::default_lines_per_page")]
    pub lines_per_page: usize,
}

impl ExportConfig {
    fn default_true() -> bool {
        true
    }

    fn default_line_width() -> usize {
        80
    }

    fn default_lines_per_page() -> usize {
        60
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            csv_enabled: true,
            document_enabled: true,
            line_width: Self::default_line_width(),
            lines_per_page: Self::default_lines_per_page(),
        }
    }
}

fn absolutize(root: &Path, value: &Path) -> PathBuf {
    if value.is_absolute() {
        value.to_path_buf()
    } else {
        root.join(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults_under_root() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = CoreConfig::load(dir.path()).unwrap();
        assert!(cfg.audit.enabled);
        assert_eq!(cfg.backup.retention_days, 30);
        assert_eq!(cfg.export.line_width, 80);
        assert_eq!(cfg.database.path, dir.path().join("meddic_data.db"));
        assert_eq!(cfg.backup.dir, dir.path().join("backups"));
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("config.toml"),
            "[audit]\nenabled = false\n\n[export]\nline_width = 60\n",
        )
        .unwrap();
        let cfg = CoreConfig::load(dir.path()).unwrap();
        assert!(!cfg.audit.enabled);
        assert_eq!(cfg.export.line_width, 60);
        assert_eq!(cfg.export.lines_per_page, 60);
        assert!(cfg.backup.enabled);
    }
}
