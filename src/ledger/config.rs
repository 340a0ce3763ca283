use std::path::{Path, PathBuf};

use crate::error::{GeneticError, Result};

/// Batch sizes and output locations of the [`Ledger`](super::Ledger).
///
/// Paths left unset simply disable the corresponding output.
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    records_to_ascii: usize,
    records_to_checkpoint: usize,
    ascii_path: Option<PathBuf>,
    checkpoint_path: Option<PathBuf>,
    silent: bool,
}

impl LedgerConfig {
    /// Returns a builder for creating a `LedgerConfig` instance.
    ///
    /// # Example
    ///
    /// ```rust
    /// use genpool::ledger::LedgerConfig;
    ///
    /// let config = LedgerConfig::builder()
    ///     .records_to_ascii(500)
    ///     .ascii_path("history.log")
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(config.records_to_ascii(), 500);
    /// assert_eq!(config.records_to_checkpoint(), 1000);
    /// ```
    pub fn builder() -> LedgerConfigBuilder {
        LedgerConfigBuilder::default()
    }

    /// Attempts between two appends to the ASCII log.
    pub fn records_to_ascii(&self) -> usize {
        self.records_to_ascii
    }

    /// Stored records between two JSON checkpoints.
    pub fn records_to_checkpoint(&self) -> usize {
        self.records_to_checkpoint
    }

    pub fn ascii_path(&self) -> Option<&Path> {
        self.ascii_path.as_deref()
    }

    pub fn checkpoint_path(&self) -> Option<&Path> {
        self.checkpoint_path.as_deref()
    }

    /// When set, nothing is ever written to disk.
    pub fn silent(&self) -> bool {
        self.silent
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            records_to_ascii: 1000,
            records_to_checkpoint: 1000,
            ascii_path: None,
            checkpoint_path: None,
            silent: false,
        }
    }
}

/// Builder for `LedgerConfig`.
#[derive(Debug, Clone, Default)]
pub struct LedgerConfigBuilder {
    records_to_ascii: Option<usize>,
    records_to_checkpoint: Option<usize>,
    ascii_path: Option<PathBuf>,
    checkpoint_path: Option<PathBuf>,
    silent: Option<bool>,
}

impl LedgerConfigBuilder {
    pub fn records_to_ascii(mut self, value: usize) -> Self {
        self.records_to_ascii = Some(value);
        self
    }

    pub fn records_to_checkpoint(mut self, value: usize) -> Self {
        self.records_to_checkpoint = Some(value);
        self
    }

    pub fn ascii_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.ascii_path = Some(path.into());
        self
    }

    pub fn checkpoint_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.checkpoint_path = Some(path.into());
        self
    }

    pub fn silent(mut self, value: bool) -> Self {
        self.silent = Some(value);
        self
    }

    /// # Errors
    ///
    /// Returns a `GeneticError::Configuration` error if a batch size is 0.
    pub fn build(self) -> Result<LedgerConfig> {
        let defaults = LedgerConfig::default();
        let config = LedgerConfig {
            records_to_ascii: self.records_to_ascii.unwrap_or(defaults.records_to_ascii),
            records_to_checkpoint: self
                .records_to_checkpoint
                .unwrap_or(defaults.records_to_checkpoint),
            ascii_path: self.ascii_path,
            checkpoint_path: self.checkpoint_path,
            silent: self.silent.unwrap_or(defaults.silent),
        };
        if config.records_to_ascii == 0 || config.records_to_checkpoint == 0 {
            return Err(GeneticError::Configuration(
                "Ledger batch sizes must be at least 1".to_string(),
            ));
        }
        Ok(config)
    }
}
