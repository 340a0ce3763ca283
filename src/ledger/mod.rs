//! # Lineage Ledger
//!
//! Append-only record of every optimization attempt: who the parents were,
//! which id the child got, whether it was accepted into the pool and whether
//! the attempt produced anything at all.
//!
//! Exactly one ledger exists per run. It is built once and shared through an
//! `Arc` with every task that needs it.
//!
//! Records are batched:
//!
//! - every `records_to_ascii` attempts the accumulated records are appended
//!   to a human-readable log and cleared from memory;
//! - every `records_to_checkpoint` stored records the totals and the records
//!   not yet flushed are written as a JSON checkpoint (retried once, then
//!   given up with an error log).
//!
//! Memory therefore stays bounded by one ASCII batch. The log plus the last
//! checkpoint together hold the full history.
//!
//! Silent mode keeps all counters and batching but writes nothing.

mod config;

use std::fs::{self, OpenOptions};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::error::{GeneticError, Result, ResultExt};

pub use config::{LedgerConfig, LedgerConfigBuilder};

/// Format tag written into every ledger checkpoint.
pub const CHECKPOINT_FORMAT: &str = "genpool-ledger";
/// Current ledger checkpoint version.
pub const CHECKPOINT_VERSION: u32 = 1;

const ASCII_HEADER: &str = "The following genetic history was created during the run.";
const ASCII_COLUMNS: &str =
    "Child\tMother\tFather\tgot accepted?\tunsuccessful genetic operations?\tfitness";

/// One attempt's outcome. Immutable once created.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LineageRecord {
    pub child: u64,
    pub mother: u64,
    pub father: u64,
    pub accepted: bool,
    pub was_null: bool,
    /// Fitness of the child when one was produced.
    pub child_fitness: Option<f64>,
}

impl LineageRecord {
    /// An attempt that produced no viable child.
    pub fn null(child: u64, mother: u64, father: u64) -> Self {
        Self {
            child,
            mother,
            father,
            accepted: false,
            was_null: true,
            child_fitness: None,
        }
    }

    /// An attempt that produced a child with the given outcome.
    pub fn offspring(child: u64, mother: u64, father: u64, fitness: f64, accepted: bool) -> Self {
        Self {
            child,
            mother,
            father,
            accepted,
            was_null: false,
            child_fitness: Some(fitness),
        }
    }

    fn to_ascii(self) -> String {
        let fitness = self
            .child_fitness
            .map(|f| format!("{:.10}", f))
            .unwrap_or_else(|| "-".to_string());
        format!(
            "{}\t{}\t{}\t{}\t{}\t{}",
            self.child, self.mother, self.father, self.accepted, self.was_null, fitness
        )
    }
}

/// Rolling counters over all attempts.
///
/// `total == accepted + null + rejected` always holds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerTotals {
    pub total: u64,
    pub accepted: u64,
    pub null: u64,
    pub rejected: u64,
}

impl LedgerTotals {
    pub fn percent_accepted(&self) -> f64 {
        percent(self.accepted, self.total)
    }

    pub fn percent_null(&self) -> f64 {
        percent(self.null, self.total)
    }
}

fn percent(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        100.0 * part as f64 / total as f64
    }
}

/// A self-describing, versioned copy of the ledger: rolling totals plus
/// the records not yet written to the ASCII log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub format: String,
    pub version: u32,
    pub totals: LedgerTotals,
    pub records: Vec<LineageRecord>,
}

#[derive(Serialize)]
struct SnapshotRef<'a> {
    format: &'static str,
    version: u32,
    totals: LedgerTotals,
    records: &'a [LineageRecord],
}

#[derive(Debug, Default)]
struct LedgerState {
    totals: LedgerTotals,
    /// Records not yet flushed to the ASCII log.
    pending: Vec<LineageRecord>,
    attempts_since_flush: usize,
    records_since_checkpoint: usize,
    ascii_flushes: usize,
    header_written: bool,
}

/// The run-wide lineage ledger.
#[derive(Debug)]
pub struct Ledger {
    config: LedgerConfig,
    state: RwLock<LedgerState>,
}

impl Ledger {
    pub fn new(config: LedgerConfig) -> Self {
        Self {
            config,
            state: RwLock::new(LedgerState::default()),
        }
    }

    /// Restores totals and unflushed records from a checkpoint written by
    /// this ledger. The restored records go out with the next ASCII flush.
    pub fn resume(config: LedgerConfig, checkpoint: impl AsRef<Path>) -> Result<Self> {
        let path = checkpoint.as_ref();
        let file = fs::File::open(path)
            .context(format!("Failed to open ledger checkpoint {}", path.display()))?;
        let reader = BufReader::new(file);
        let snapshot: LedgerSnapshot = serde_json::from_reader(reader)?;
        if snapshot.format != CHECKPOINT_FORMAT || snapshot.version != CHECKPOINT_VERSION {
            return Err(GeneticError::Configuration(format!(
                "{} is not a version {} ledger checkpoint (found {} v{})",
                path.display(),
                CHECKPOINT_VERSION,
                snapshot.format,
                snapshot.version
            )));
        }
        info!(
            path = %path.display(),
            attempts = snapshot.totals.total,
            pending = snapshot.records.len(),
            "resumed ledger from checkpoint"
        );
        let header_written = config.ascii_path().is_some_and(Path::exists);
        let state = LedgerState {
            totals: snapshot.totals,
            attempts_since_flush: snapshot.records.len(),
            pending: snapshot.records,
            header_written,
            ..LedgerState::default()
        };
        Ok(Self {
            config,
            state: RwLock::new(state),
        })
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Records one attempt.
    ///
    /// Totals are always updated; the record itself is stored only when a
    /// child was produced (`record.child_fitness` is set).
    pub fn add_family(&self, record: LineageRecord) {
        let mut state = self.state.write();

        state.totals.total += 1;
        if record.was_null {
            state.totals.null += 1;
        } else if record.accepted {
            state.totals.accepted += 1;
        } else {
            state.totals.rejected += 1;
        }

        if record.child_fitness.is_some() {
            state.pending.push(record);
            state.records_since_checkpoint += 1;
            if state.records_since_checkpoint >= self.config.records_to_checkpoint() {
                self.checkpoint(&state);
                state.records_since_checkpoint = 0;
            }
        }

        state.attempts_since_flush += 1;
        if state.attempts_since_flush >= self.config.records_to_ascii() {
            self.flush(&mut state);
        }
    }

    /// Writes out a pending partial batch. Does nothing if no attempt was
    /// recorded since the last flush.
    pub fn flush_records(&self) {
        let mut state = self.state.write();
        if state.attempts_since_flush != 0 {
            self.flush(&mut state);
        }
    }

    /// Appends the summary statistics to the log and returns them.
    pub fn write_total_stats(&self) -> LedgerTotals {
        let state = self.state.read();
        let totals = state.totals;
        info!(
            total = totals.total,
            accepted = totals.accepted,
            null = totals.null,
            rejected = totals.rejected,
            "genetic history summary"
        );

        if let (false, Some(path)) = (self.config.silent(), self.config.ascii_path()) {
            let summary = [
                format!("Total number of genetic operations: {}", totals.total),
                format!(
                    "Null individuals: {} ({:3.1} %)",
                    totals.null,
                    totals.percent_null()
                ),
                format!(
                    "Accepted individuals: {} ({:3.1} %)",
                    totals.accepted,
                    totals.percent_accepted()
                ),
            ];
            if let Err(e) = append_lines(path, &summary) {
                error!(error = %e, path = %path.display(), "failed to write history summary");
            }
        }
        totals
    }

    pub fn totals(&self) -> LedgerTotals {
        self.state.read().totals
    }

    /// Records stored but not yet flushed to the ASCII log.
    pub fn pending_records(&self) -> usize {
        self.state.read().pending.len()
    }

    /// Number of ASCII flush events so far.
    pub fn ascii_flushes(&self) -> usize {
        self.state.read().ascii_flushes
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        let state = self.state.read();
        LedgerSnapshot {
            format: CHECKPOINT_FORMAT.to_string(),
            version: CHECKPOINT_VERSION,
            totals: state.totals,
            records: state.pending.clone(),
        }
    }

    fn flush(&self, state: &mut LedgerState) {
        let records = std::mem::take(&mut state.pending);
        state.attempts_since_flush = 0;
        state.ascii_flushes += 1;
        debug!(records = records.len(), "flushing genetic history");

        let path = match (self.config.silent(), self.config.ascii_path()) {
            (false, Some(path)) => path,
            _ => return,
        };
        let mut lines = Vec::with_capacity(records.len() + 2);
        if !state.header_written {
            lines.push(ASCII_HEADER.to_string());
            lines.push(ASCII_COLUMNS.to_string());
        }
        lines.extend(records.into_iter().map(LineageRecord::to_ascii));

        match append_lines(path, &lines) {
            Ok(()) => state.header_written = true,
            Err(e) => error!(error = %e, path = %path.display(), "failed to append genetic history"),
        }
    }

    fn checkpoint(&self, state: &LedgerState) {
        let path = match (self.config.silent(), self.config.checkpoint_path()) {
            (false, Some(path)) => path,
            _ => return,
        };
        let snapshot = SnapshotRef {
            format: CHECKPOINT_FORMAT,
            version: CHECKPOINT_VERSION,
            totals: state.totals,
            records: &state.pending,
        };
        if let Err(first) = write_json(path, &snapshot) {
            warn!(error = %first, path = %path.display(), "ledger checkpoint failed, retrying once");
            if let Err(second) = write_json(path, &snapshot) {
                error!(error = %second, path = %path.display(), "ledger checkpoint abandoned");
            }
        }
    }
}

fn append_lines(path: &Path, lines: &[String]) -> Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .context(format!("Failed to open history log {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    for line in lines {
        writeln!(writer, "{}", line)?;
    }
    writer.flush()?;
    Ok(())
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let tmp = path.with_extension("tmp");
    {
        let file = fs::File::create(&tmp)
            .context(format!("Failed to create checkpoint {}", tmp.display()))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, value)?;
        writer.flush()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn silent(records_to_ascii: usize) -> Ledger {
        let config = LedgerConfig::builder()
            .records_to_ascii(records_to_ascii)
            .silent(true)
            .build()
            .unwrap();
        Ledger::new(config)
    }

    #[test]
    fn test_totals_partition_attempts() {
        let ledger = silent(100);
        ledger.add_family(LineageRecord::null(1, 0, 0));
        ledger.add_family(LineageRecord::offspring(2, 0, 1, -1.0, true));
        ledger.add_family(LineageRecord::offspring(3, 0, 1, 5.0, false));
        ledger.add_family(LineageRecord::offspring(4, 1, 0, 4.0, false));

        let totals = ledger.totals();
        assert_eq!(totals.total, 4);
        assert_eq!(totals.null, 1);
        assert_eq!(totals.accepted, 1);
        assert_eq!(totals.rejected, 2);
        assert_eq!(totals.total, totals.accepted + totals.null + totals.rejected);
        // The null attempt carries no individual and is not stored.
        assert_eq!(ledger.pending_records(), 3);
    }

    #[test]
    fn test_flush_records_only_when_attempts_pending() {
        let ledger = silent(10);
        ledger.flush_records();
        assert_eq!(ledger.ascii_flushes(), 0);
        ledger.add_family(LineageRecord::null(1, 0, 0));
        ledger.flush_records();
        assert_eq!(ledger.ascii_flushes(), 1);
        assert_eq!(ledger.pending_records(), 0);
    }

    #[test]
    fn test_percentages_guard_zero() {
        let totals = LedgerTotals::default();
        assert_eq!(totals.percent_null(), 0.0);
        let totals = LedgerTotals {
            total: 4,
            accepted: 1,
            null: 2,
            rejected: 1,
        };
        assert_eq!(totals.percent_accepted(), 25.0);
        assert_eq!(totals.percent_null(), 50.0);
    }

    #[test]
    fn test_ascii_line_layout() {
        let line = LineageRecord::offspring(7, 3, 4, 1.5, true).to_ascii();
        assert_eq!(line, "7\t3\t4\ttrue\tfalse\t1.5000000000");
        assert!(LineageRecord::null(8, 3, 4).to_ascii().ends_with("\ttrue\t-"));
    }
}
