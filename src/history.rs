//! history.rs: durable publish history.
//!
//! Two files under the data dir:
//! - `publish_records.jsonl`: one `PublishRecord` per line, append-only.
//! - `posting_state.json`: small summary, replaced atomically (tmp + rename).
//!
//! Only real (non-simulated) records are written. A torn trailing line from a
//! crash is skipped on load rather than failing startup. Memory holds the
//! records read at open (until the scheduler takes them for its rebuild) plus
//! the last `RECENT_CAPACITY` appended records; the full history stays on disk.

use std::collections::VecDeque;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, ScoutError};
use crate::model::PublishRecord;

pub const RECORDS_FILE: &str = "publish_records.jsonl";
pub const SUMMARY_FILE: &str = "posting_state.json";
pub const RECENT_CAPACITY: usize = 500;

/// Snapshot of posting state written after every committed publish.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PostingSummary {
    pub day: Option<NaiveDate>,
    pub posted_today: u32,
    pub last_publish: Option<DateTime<Utc>>,
    pub published_ids: Vec<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug)]
pub struct HistoryStore {
    records_path: PathBuf,
    summary_path: PathBuf,
    loaded: Vec<PublishRecord>,
    recent: VecDeque<PublishRecord>,
    summary: Option<PostingSummary>,
}

impl HistoryStore {
    /// Open (creating the directory if needed) and load both files.
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).map_err(|e| {
            ScoutError::Storage(format!("creating {}: {e}", dir.display()))
        })?;
        let records_path = dir.join(RECORDS_FILE);
        let summary_path = dir.join(SUMMARY_FILE);

        let loaded = load_records(&records_path)?;
        let summary = load_summary(&summary_path)?;
        tracing::info!(
            target: "history",
            records = loaded.len(),
            has_summary = summary.is_some(),
            "history loaded"
        );
        let start = loaded.len().saturating_sub(RECENT_CAPACITY);
        let recent = loaded[start..].iter().cloned().collect();
        Ok(Self {
            records_path,
            summary_path,
            loaded,
            recent,
            summary,
        })
    }

    /// Store that never touches disk. Used for dry-run ledgers and tests;
    /// unlike a persistent store it accepts simulated records.
    pub fn in_memory() -> Self {
        Self {
            records_path: PathBuf::new(),
            summary_path: PathBuf::new(),
            loaded: Vec::new(),
            recent: VecDeque::new(),
            summary: None,
        }
    }

    fn is_persistent(&self) -> bool {
        !self.records_path.as_os_str().is_empty()
    }

    pub fn append(&mut self, record: &PublishRecord) -> Result<()> {
        if self.is_persistent() {
            if record.simulated {
                return Err(ScoutError::Storage(
                    "simulated records are never persisted".into(),
                ));
            }
            let mut line = serde_json::to_string(record)?;
            line.push('\n');
            let mut f = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.records_path)?;
            f.write_all(line.as_bytes())?;
            f.flush()?;
        }
        if self.recent.len() == RECENT_CAPACITY {
            self.recent.pop_front();
        }
        self.recent.push_back(record.clone());
        Ok(())
    }

    pub fn write_summary(&mut self, summary: &PostingSummary) -> Result<()> {
        if self.is_persistent() {
            let tmp = self.summary_path.with_extension("json.tmp");
            let json = serde_json::to_vec_pretty(summary)?;
            let mut f = File::create(&tmp)?;
            f.write_all(&json)?;
            f.sync_all()?;
            fs::rename(&tmp, &self.summary_path)?;
        }
        self.summary = Some(summary.clone());
        Ok(())
    }

    /// Records read from disk at open, until taken.
    pub fn loaded_records(&self) -> &[PublishRecord] {
        &self.loaded
    }

    /// Hand the startup records over for state reconstruction and drop them
    /// from the store.
    pub fn take_loaded(&mut self) -> Vec<PublishRecord> {
        std::mem::take(&mut self.loaded)
    }

    pub fn summary(&self) -> Option<&PostingSummary> {
        self.summary.as_ref()
    }

    /// Last `n` records, oldest first. At most `RECENT_CAPACITY` are kept.
    pub fn recent(&self, n: usize) -> Vec<PublishRecord> {
        let start = self.recent.len().saturating_sub(n);
        self.recent.range(start..).cloned().collect()
    }
}

fn load_records(path: &Path) -> Result<Vec<PublishRecord>> {
    let f = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(ScoutError::Storage(format!("opening {}: {e}", path.display()))),
    };
    let mut out = Vec::new();
    for (n, line) in BufReader::new(f).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<PublishRecord>(&line) {
            Ok(r) if !r.simulated => out.push(r),
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(target: "history", line = n + 1, error = %e, "skipping unreadable record");
            }
        }
    }
    Ok(out)
}

fn load_summary(path: &Path) -> Result<Option<PostingSummary>> {
    match fs::read_to_string(path) {
        Ok(s) => match serde_json::from_str(&s) {
            Ok(summary) => Ok(Some(summary)),
            Err(e) => {
                // Records are the source of truth; a bad summary only loses the cross-check.
                tracing::warn!(target: "history", error = %e, "ignoring unreadable posting summary");
                Ok(None)
            }
        },
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(ScoutError::Storage(format!("reading {}: {e}", path.display()))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PublishOutcome;
    use chrono::TimeZone;

    fn rec(id: &str, outcome: PublishOutcome) -> PublishRecord {
        PublishRecord {
            thread_id: id.into(),
            group: "smallbusiness".into(),
            published_at: Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap(),
            outcome,
            text: "reply".into(),
            simulated: false,
            detail: None,
        }
    }

    #[test]
    fn records_and_summary_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut s = HistoryStore::open(dir.path()).unwrap();
            s.append(&rec("a", PublishOutcome::Posted)).unwrap();
            s.append(&rec("b", PublishOutcome::Failed)).unwrap();
            s.write_summary(&PostingSummary {
                posted_today: 1,
                published_ids: vec!["a".into()],
                ..Default::default()
            })
            .unwrap();
        }
        let s = HistoryStore::open(dir.path()).unwrap();
        assert_eq!(s.loaded_records().len(), 2);
        assert_eq!(s.summary().unwrap().posted_today, 1);
        assert_eq!(s.recent(1)[0].thread_id, "b");
        assert!(!dir.path().join("posting_state.json.tmp").exists());
    }

    #[test]
    fn torn_line_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let line = serde_json::to_string(&rec("a", PublishOutcome::Posted)).unwrap();
        fs::write(
            dir.path().join(RECORDS_FILE),
            format!("{line}\n{{\"thread_id\":\"b\",\"outc"),
        )
        .unwrap();
        let s = HistoryStore::open(dir.path()).unwrap();
        assert_eq!(s.loaded_records().len(), 1);
    }

    #[test]
    fn simulated_records_never_reach_disk() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = HistoryStore::open(dir.path()).unwrap();
        let mut r = rec("a", PublishOutcome::Posted);
        r.simulated = true;
        assert!(s.append(&r).is_err());
        assert!(s.recent(10).is_empty());
        assert!(!dir.path().join(RECORDS_FILE).exists());

        let mut mem = HistoryStore::in_memory();
        mem.append(&r).unwrap();
        assert_eq!(mem.recent(10).len(), 1);
    }

    #[test]
    fn recent_window_stays_bounded_while_disk_keeps_everything() {
        let dir = tempfile::tempdir().unwrap();
        let total = RECENT_CAPACITY + 25;
        {
            let mut s = HistoryStore::open(dir.path()).unwrap();
            for i in 0..total {
                s.append(&rec(&format!("t{i}"), PublishOutcome::SkippedDuplicate)).unwrap();
            }
            assert_eq!(s.recent.len(), RECENT_CAPACITY);
            let all = s.recent(usize::MAX);
            assert_eq!(all.first().unwrap().thread_id, "t25");
            assert_eq!(all.last().unwrap().thread_id, format!("t{}", total - 1));
        }

        let mut s = HistoryStore::open(dir.path()).unwrap();
        assert_eq!(s.loaded_records().len(), total);
        assert_eq!(s.recent(usize::MAX).len(), RECENT_CAPACITY);
        assert_eq!(s.take_loaded().len(), total);
        assert!(s.loaded_records().is_empty());
        assert_eq!(s.recent(1)[0].thread_id, format!("t{}", total - 1));

        let mut mem = HistoryStore::in_memory();
        for i in 0..total {
            mem.append(&rec(&format!("m{i}"), PublishOutcome::SkippedDuplicate)).unwrap();
        }
        assert_eq!(mem.recent(usize::MAX).len(), RECENT_CAPACITY);
    }
}
