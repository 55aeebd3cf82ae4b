//! Database builder for fluent configuration

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tessera_core::{TesseraError, TesseraResult};
use tessera_durability::{DurabilityMode, Journal, NullJournal};

use super::config::{TesseraConfig, CONFIG_FILE_NAME};
use super::Database;

// ============================================================================
// Database Builder Pattern
// ============================================================================

/// Builder for Database configuration
///
/// # Three Ways to Open a Database
///
/// ```ignore
/// use tessera_engine::Database;
///
/// // 1. Persistent, settings from tessera.toml
/// let db = Database::open("/data/contacts")?;
///
/// // 2. Builder: settings given here override tessera.toml
/// let db = Database::builder()
///     .path("/data/contacts")
///     .durability(DurabilityMode::Always)
///     .open()?;
///
/// // 3. Ephemeral (no files, testing)
/// let db = Database::ephemeral("scratch")?;
/// ```
///
/// Durability only applies with a path. Without one, the database keeps
/// nothing on disk unless a custom [`Journal`] is supplied.
#[derive(Default)]
pub struct DatabaseBuilder {
    name: Option<String>,
    path: Option<PathBuf>,
    durability: Option<DurabilityMode>,
    gc_interval: Option<u64>,
    journal: Option<Box<dyn Journal>>,
}

impl DatabaseBuilder {
    /// Create new builder with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set database name
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set data directory
    pub fn path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Set durability mode
    pub fn durability(mut self, mode: DurabilityMode) -> Self {
        self.durability = Some(mode);
        self
    }

    /// Set commits between version-chain sweeps
    pub fn gc_interval(mut self, commits: u64) -> Self {
        self.gc_interval = Some(commits);
        self
    }

    /// Commit through `journal` instead of the on-disk journal
    ///
    /// Only valid without a path. Used to inject storage failures.
    pub fn journal(mut self, journal: Box<dyn Journal>) -> Self {
        self.journal = Some(journal);
        self
    }

    /// Open the database
    pub fn open(self) -> TesseraResult<Arc<Database>> {
        let DatabaseBuilder {
            name,
            path,
            durability,
            gc_interval,
            journal,
        } = self;

        match (path, journal) {
            (Some(_), Some(_)) => Err(TesseraError::invalid_input(
                "a custom journal cannot be combined with a path",
            )),
            (Some(path), None) => {
                let config_path = path.join(CONFIG_FILE_NAME);
                let base = if config_path.exists() {
                    TesseraConfig::from_file(&config_path)?
                } else {
                    TesseraConfig::default()
                };
                let config = overlay(base, name, durability, gc_interval);
                Database::open_with_config(path, config)
            }
            (None, journal) => {
                let config = overlay(TesseraConfig::default(), name, durability, gc_interval);
                Database::in_memory(config, journal.unwrap_or_else(|| Box::new(NullJournal)))
            }
        }
    }
}

fn overlay(
    mut config: TesseraConfig,
    name: Option<String>,
    durability: Option<DurabilityMode>,
    gc_interval: Option<u64>,
) -> TesseraConfig {
    if let Some(name) = name {
        config.name = name;
    }
    if let Some(mode) = durability {
        config.durability = mode.to_string();
    }
    if let Some(n) = gc_interval {
        config.gc_interval = n;
    }
    config
}

impl fmt::Debug for DatabaseBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseBuilder")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("durability", &self.durability)
            .field("gc_interval", &self.gc_interval)
            .field("custom_journal", &self.journal.is_some())
            .finish()
    }
}
