use std::fs;
use std::sync::Arc;
use std::thread;

use genpool::ledger::{Ledger, LedgerConfig, LineageRecord};
use tempfile::TempDir;

fn offspring(child: u64) -> LineageRecord {
    LineageRecord::offspring(child, 1, 2, child as f64 * 0.5, child % 2 == 0)
}

#[test]
fn test_ascii_flushes_in_batches() {
    let dir = TempDir::new().unwrap();
    let log = dir.path().join("history.log");
    let config = LedgerConfig::builder()
        .records_to_ascii(5)
        .ascii_path(&log)
        .build()
        .unwrap();
    let ledger = Ledger::new(config);

    for child in 0..12 {
        ledger.add_family(offspring(child));
        let expected = (child as usize + 1) / 5;
        assert_eq!(ledger.ascii_flushes(), expected);
    }
    assert_eq!(ledger.ascii_flushes(), 2);
    assert_eq!(ledger.pending_records(), 2);

    let text = fs::read_to_string(&log).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 2 + 10);
    assert!(lines[0].starts_with("The following genetic history"));
    assert_eq!(lines[2], "0\t1\t2\ttrue\tfalse\t0.0000000000");
    assert!(lines[11].starts_with("9\t"));

    ledger.flush_records();
    assert_eq!(ledger.pending_records(), 0);
    assert_eq!(fs::read_to_string(&log).unwrap().lines().count(), 14);
}

#[test]
fn test_totals_balance_with_null_children() {
    let ledger = Ledger::new(LedgerConfig::builder().silent(true).build().unwrap());
    ledger.add_family(LineageRecord::null(10, 1, 2));
    ledger.add_family(LineageRecord::offspring(11, 1, 2, 0.1, true));
    ledger.add_family(LineageRecord::offspring(12, 1, 2, 9.0, false));
    ledger.add_family(LineageRecord::null(13, 2, 1));

    let totals = ledger.totals();
    assert_eq!(totals.total, 4);
    assert_eq!(totals.null, 2);
    assert_eq!(totals.accepted, 1);
    assert_eq!(totals.rejected, 1);
    assert_eq!(totals.percent_null(), 50.0);
    // Null attempts are counted but not stored.
    assert_eq!(ledger.pending_records(), 2);
}

#[test]
fn test_totals_balance_under_concurrency() {
    let ledger = Arc::new(Ledger::new(
        LedgerConfig::builder()
            .records_to_ascii(7)
            .silent(true)
            .build()
            .unwrap(),
    ));
    let handles: Vec<_> = (0..4u64)
        .map(|t| {
            let ledger = Arc::clone(&ledger);
            thread::spawn(move || {
                for i in 0..250u64 {
                    let child = t * 1000 + i;
                    if i % 5 == 0 {
                        ledger.add_family(LineageRecord::null(child, 0, 1));
                    } else {
                        ledger.add_family(offspring(child));
                    }
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let totals = ledger.write_total_stats();
    assert_eq!(totals.total, 1000);
    assert_eq!(totals.null, 200);
    assert_eq!(totals.total, totals.accepted + totals.null + totals.rejected);
    assert_eq!(ledger.ascii_flushes(), 1000 / 7);
}

#[test]
fn test_checkpoint_and_resume() {
    let dir = TempDir::new().unwrap();
    let checkpoint = dir.path().join("ledger.json");
    let config = LedgerConfig::builder()
        .records_to_checkpoint(4)
        .checkpoint_path(&checkpoint)
        .build()
        .unwrap();
    let ledger = Ledger::new(config.clone());

    for child in 0..3 {
        ledger.add_family(offspring(child));
    }
    assert!(!checkpoint.exists());
    ledger.add_family(offspring(3));
    assert!(checkpoint.exists());
    for child in 4..8 {
        ledger.add_family(offspring(child));
    }

    let resumed = Ledger::resume(config, &checkpoint).unwrap();
    assert_eq!(resumed.totals(), ledger.totals());
    // Nothing reached the ASCII log yet, so every record is still pending.
    assert_eq!(resumed.snapshot().records.len(), 8);
    assert_eq!(resumed.pending_records(), 8);
    resumed.flush_records();
    assert_eq!(resumed.pending_records(), 0);
    assert_eq!(resumed.ascii_flushes(), 1);
}

#[test]
fn test_checkpoint_holds_only_unflushed_records() {
    let dir = TempDir::new().unwrap();
    let log = dir.path().join("history.log");
    let checkpoint = dir.path().join("ledger.json");
    let config = LedgerConfig::builder()
        .records_to_ascii(3)
        .records_to_checkpoint(4)
        .ascii_path(&log)
        .checkpoint_path(&checkpoint)
        .build()
        .unwrap();
    let ledger = Ledger::new(config.clone());

    // Children 0..3 are flushed to the log, child 3 triggers the checkpoint.
    for child in 0..4 {
        ledger.add_family(offspring(child));
    }
    assert_eq!(ledger.ascii_flushes(), 1);
    assert_eq!(ledger.pending_records(), 1);

    let resumed = Ledger::resume(config, &checkpoint).unwrap();
    assert_eq!(resumed.totals().total, 4);
    let records = resumed.snapshot().records;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].child, 3);

    // The log already has its header, the resumed ledger only appends.
    resumed.flush_records();
    let text = fs::read_to_string(&log).unwrap();
    assert_eq!(text.lines().count(), 2 + 4);
    assert_eq!(text.matches("The following genetic history").count(), 1);
}

#[test]
fn test_failed_checkpoint_is_abandoned_and_counting_restarts() {
    let dir = TempDir::new().unwrap();
    let target = dir.path().join("missing");
    let checkpoint = target.join("ledger.json");
    let ledger = Ledger::new(
        LedgerConfig::builder()
            .records_to_checkpoint(3)
            .checkpoint_path(&checkpoint)
            .build()
            .unwrap(),
    );

    for child in 0..3 {
        ledger.add_family(offspring(child));
    }
    assert!(!checkpoint.exists());
    assert_eq!(ledger.totals().total, 3);

    // Once the directory exists, the next checkpoint is due a full batch
    // after the abandoned one.
    fs::create_dir(&target).unwrap();
    for child in 3..5 {
        ledger.add_family(offspring(child));
    }
    assert!(!checkpoint.exists());
    ledger.add_family(offspring(5));
    assert!(checkpoint.exists());
    assert_eq!(ledger.totals().total, 6);
}

#[test]
fn test_silent_ledger_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let log = dir.path().join("history.log");
    let checkpoint = dir.path().join("ledger.json");
    let config = LedgerConfig::builder()
        .records_to_ascii(2)
        .records_to_checkpoint(2)
        .ascii_path(&log)
        .checkpoint_path(&checkpoint)
        .silent(true)
        .build()
        .unwrap();
    let ledger = Ledger::new(config);

    for child in 0..6 {
        ledger.add_family(offspring(child));
    }
    ledger.flush_records();
    ledger.write_total_stats();

    assert_eq!(ledger.ascii_flushes(), 3);
    assert!(!log.exists());
    assert!(!checkpoint.exists());
}

#[test]
fn test_summary_is_appended_to_log() {
    let dir = TempDir::new().unwrap();
    let log = dir.path().join("history.log");
    let ledger = Ledger::new(
        LedgerConfig::builder()
            .records_to_ascii(1)
            .ascii_path(&log)
            .build()
            .unwrap(),
    );
    ledger.add_family(offspring(2));
    ledger.add_family(LineageRecord::null(3, 1, 2));
    ledger.write_total_stats();

    let text = fs::read_to_string(&log).unwrap();
    assert!(text.contains("Total number of genetic operations: 2"));
    assert!(text.contains("Null individuals: 1 (50.0 %)"));
    assert!(text.contains("Accepted individuals: 1 (50.0 %)"));
}
