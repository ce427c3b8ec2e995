// meddic-core/src/commands/init.rs

use anyhow::{Context, Result};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::config::CoreConfig;

#[derive(Debug, Clone)]
pub struct InitReport {
    pub root: PathBuf,
    pub created: Vec<String>,
    pub existed: Vec<String>,
    pub config: CoreConfig,
}

/// Resolve the workspace root. Allow override via MEDDIC_ROOT (tests/scripts).
pub fn default_root() -> PathBuf {
    std::env::var_os("MEDDIC_ROOT")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(".meddic"))
}

/// Ensure the workspace layout exists (idempotent) and load its config.
pub fn ensure_initialized(root: &Path) -> Result<InitReport> {
    let mut seed = Seeder::new(root);
    seed.dir(root)?;
    seed.file(&root.join("config.toml"), DEFAULT_CONFIG_TOML)?;

    let config = CoreConfig::load(root)?;
    if let Some(parent) = config.database.path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create_dir_all({parent:?})"))?;
    }
    if config.backup.enabled {
        seed.dir(&config.backup.dir)?;
    }

    Ok(InitReport {
        root: root.to_path_buf(),
        created: seed.created,
        existed: seed.existed,
        config,
    })
}

/// Creates missing workspace entries and records what it found, by path
/// relative to the root (`.` for the root itself).
struct Seeder<'a> {
    root: &'a Path,
    created: Vec<String>,
    existed: Vec<String>,
}

impl<'a> Seeder<'a> {
    fn new(root: &'a Path) -> Self {
        Self {
            root,
            created: Vec::new(),
            existed: Vec::new(),
        }
    }

    fn label(&self, path: &Path) -> String {
        match path.strip_prefix(self.root) {
            Ok(rel) if rel.as_os_str().is_empty() => ".".to_string(),
            Ok(rel) => rel.to_string_lossy().into_owned(),
            Err(_) => path.to_string_lossy().into_owned(),
        }
    }

    fn dir(&mut self, path: &Path) -> Result<()> {
        let label = self.label(path);
        if path.exists() {
            self.existed.push(label);
        } else {
            fs::create_dir_all(path).with_context(|| format!("create_dir_all({path:?})"))?;
            self.created.push(label);
        }
        Ok(())
    }

    /// Write `content` only when the file is absent; never overwrites.
    fn file(&mut self, path: &Path, content: &str) -> Result<()> {
        let label = self.label(path);
        if path.exists() {
            self.existed.push(label);
        } else {
            write_atomic(path, content.as_bytes())?;
            self.created.push(label);
        }
        Ok(())
    }
}

/// Temp file + rename: readers see either no file or the whole file.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = path.with_extension("tmp");
    let mut file = File::create(&tmp).with_context(|| format!("create {tmp:?}"))?;
    file.write_all(bytes)?;
    file.sync_all()?;
    drop(file);
    fs::rename(&tmp, path).with_context(|| format!("rename {tmp:?} -> {path:?}"))
}

// ---------- defaults ----------

const DEFAULT_CONFIG_TOML: &str = r#"# MEDDIC workspace configuration. Relative paths resolve against this directory.

[database]
path = "meddic_data.db"

[audit]
enabled = true

[backup]
enabled = true
dir = "backups"
retention_days = 30

[export]
csv_enabled = true
document_enabled = true
line_width = 80
lines_per_page = 60
"#;
