//! The local database of snapshot contents and object checksums
//! (specification §3-4.10), plus the bookkeeping surface layered on top
//! of the same schema that the original implementation exposes beyond
//! the four cleaning operations (specification §13.2).
//!
//! The local database is consulted when creating a snapshot to decide
//! what data can be reused from old snapshots, and it drives segment
//! cleaning; populating `block_index`/`subblock_signatures` during a new
//! backup run is a write-path concern external to this core. This crate
//! owns the schema, the read-side views onto it, and the four
//! transactional operations that mutate it: garbage collection,
//! benefit-ranked cleaning selection, expiry marking, and age-bucket
//! balancing.

#![warn(missing_docs)]

pub mod cleaning;
mod config;
mod error;
mod schema;

pub use cleaning::{
    balance_expired_objects, get_segment_cleaning_list, mark_segment_expired, SegmentCleaningInfo,
};
pub use config::CleanerConfig;
pub use error::{LocalDbError, Result};

use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

/// One row of the `snapshots` table.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotRow {
    /// Database id.
    pub id: i64,
    /// Backup scheme name (e.g. `"daily"`, `"weekly"`).
    pub scheme: String,
    /// Snapshot name.
    pub name: String,
    /// Julian-day timestamp the snapshot was taken.
    pub timestamp: f64,
    /// Retention intent level; higher intent snapshots supersede lower
    /// ones of the same scheme when pruning.
    pub intent: f64,
}

/// Read-only view over one segment's size and liveness, as exposed by
/// the `segment_info` view (joining `segments` with `segment_utilization`).
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentInfo {
    /// Database id of the segment.
    pub id: i64,
    /// Bytes referenced by any current snapshot's utilization record.
    pub used_bytes: f64,
    /// Total size of the segment, in bytes.
    pub size_bytes: f64,
    /// Julian-day timestamp the segment was written.
    pub mtime: f64,
    /// Snapshot id at or before which this segment's objects were
    /// marked expired, or `None` if the segment is still fully live.
    pub expire_time: Option<i64>,
}

/// One segment's estimated utilization by a specific set of snapshots,
/// as computed by [`LocalDatabase::segment_utilizations`].
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentUtilization {
    /// Database id of the segment.
    pub segment_id: i64,
    /// Largest `bytes_referenced` recorded for this segment across the
    /// requested snapshots — a lower bound on how much of the segment
    /// those snapshots still need.
    pub bytes_referenced: i64,
    /// Total size of the segment, in bytes.
    pub size_bytes: i64,
    /// `bytes_referenced / size_bytes`.
    pub utilization: f64,
}

/// Outcome of a [`LocalDatabase::garbage_collect`] pass: how many rows
/// were removed from each table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GcReport {
    /// Rows removed from `segment_utilization`.
    pub segment_utilization_deleted: usize,
    /// Rows removed from `segments`.
    pub segments_deleted: usize,
    /// Rows removed from `block_index`.
    pub block_index_deleted: usize,
    /// Rows removed from `subblock_signatures`.
    pub subblock_signatures_deleted: usize,
}

/// Outcome of a [`LocalDatabase::clean`] pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CleaningReport {
    /// The garbage collection pass that preceded segment selection.
    pub gc: GcReport,
    /// Segments selected for rewrite, in the order they were expired.
    pub expired_segments: Vec<SegmentCleaningInfo>,
}

/// Access to the local database of snapshot contents and object checksums.
///
/// Wraps a single SQLite connection; the schema is created on
/// [`LocalDatabase::open`] if not already present. All mutating
/// operations commit their own transaction (or, for [`LocalDatabase::clean`],
/// one transaction spanning several of the primitive operations) rather
/// than requiring the caller to call a separate commit step, since this
/// crate has no long-lived multi-statement write session of its own.
pub struct LocalDatabase {
    conn: Connection,
}

impl LocalDatabase {
    /// Open (creating if necessary) the local database at `path`,
    /// initializing its schema.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref())?;
        conn.execute_batch(schema::SCHEMA)?;
        Ok(LocalDatabase { conn })
    }

    /// Open a private, in-memory local database. Used by tests and by
    /// callers that only need a scratch database for one run.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(schema::SCHEMA)?;
        Ok(LocalDatabase { conn })
    }

    /// Direct access to the underlying connection, for callers (e.g. the
    /// external backup writer) that need to insert `snapshots`/`segments`/
    /// `block_index` rows this crate doesn't write itself.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// The distinct backup scheme names present in the database, sorted.
    pub fn list_schemes(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("select distinct scheme from snapshots order by scheme")?;
        let schemes = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(schemes)
    }

    /// Every snapshot recorded for `scheme`, sorted by name.
    pub fn list_snapshots(&self, scheme: &str) -> Result<Vec<SnapshotRow>> {
        let mut stmt = self.conn.prepare(
            "select snapshotid, scheme, name, timestamp, intent \
             from snapshots where scheme = ? order by name",
        )?;
        let rows = stmt
            .query_map(params![scheme], |row| {
                Ok(SnapshotRow {
                    id: row.get(0)?,
                    scheme: row.get(1)?,
                    name: row.get(2)?,
                    timestamp: row.get(3)?,
                    intent: row.get(4)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Remove one `snapshots` row.
    ///
    /// Does not cascade: dependent `segment_utilization`/`segments`/
    /// `block_index` rows are left in place until a subsequent
    /// [`LocalDatabase::garbage_collect`] call, matching the original
    /// implementation's documented warning.
    ///
    /// Returns whether a row was actually deleted.
    pub fn delete_snapshot(&self, snapshot_id: i64) -> Result<bool> {
        let deleted = self
            .conn
            .execute("delete from snapshots where snapshotid = ?", params![snapshot_id])?;
        Ok(deleted > 0)
    }

    /// Delete superseded snapshots for `scheme`, keeping the most recent
    /// unconditionally.
    ///
    /// `intent` names the retention level of the snapshot about to be
    /// taken next (e.g. a higher intent for a weekly snapshot than a
    /// daily one). Walking snapshots from youngest to oldest, a snapshot
    /// is deleted if its own intent is lower than the highest intent
    /// seen among younger snapshots (it has been superseded), or if its
    /// intent equals the requested `intent` (the caller is about to
    /// replace it). The most recent snapshot for the scheme is always
    /// kept regardless.
    ///
    /// Returns the ids of the snapshots deleted, then runs
    /// [`LocalDatabase::garbage_collect`] so dependent rows don't linger.
    pub fn prune_old_snapshots(&mut self, scheme: &str, intent: f64) -> Result<Vec<i64>> {
        let tx = self.conn.transaction()?;
        let mut deleted = Vec::new();

        {
            let mut stmt = tx.prepare(
                "select snapshotid, intent, julianday('now') - timestamp as age \
                 from snapshots where scheme = ? order by age",
            )?;
            let rows: Vec<(i64, f64)> = stmt
                .query_map(params![scheme], |row| Ok((row.get(0)?, row.get(1)?)))?
                .collect::<rusqlite::Result<_>>()?;

            let mut max_intent = intent;
            for (i, (id, snap_intent)) in rows.iter().enumerate() {
                let first = i == 0;
                let can_delete = *snap_intent < max_intent || *snap_intent == intent;
                if can_delete && !first {
                    tx.execute("delete from snapshots where snapshotid = ?", params![id])?;
                    deleted.push(*id);
                }
                max_intent = max_intent.max(*snap_intent);
            }
        }

        run_garbage_collect(&tx)?;
        tx.commit()?;
        Ok(deleted)
    }

    /// Read back one segment's size/liveness statistics, if it exists.
    pub fn segment_info(&self, segment_id: i64) -> Result<Option<SegmentInfo>> {
        self.conn
            .query_row(
                "select segmentid, used, size, mtime, expire_time from segment_info where segmentid = ?",
                params![segment_id],
                |row| {
                    Ok(SegmentInfo {
                        id: row.get(0)?,
                        used_bytes: row.get(1)?,
                        size_bytes: row.get(2)?,
                        mtime: row.get(3)?,
                        expire_time: row.get(4)?,
                    })
                },
            )
            .optional()
            .map_err(LocalDbError::from)
    }

    /// Estimate how much of each segment referenced by `snapshot_ids` is
    /// still needed, as a lower bound (`max` over the per-snapshot
    /// `bytes_referenced` figures, since the same object may be counted
    /// by multiple snapshots).
    pub fn segment_utilizations(&self, snapshot_ids: &[i64]) -> Result<Vec<SegmentUtilization>> {
        if snapshot_ids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = std::iter::repeat("?")
            .take(snapshot_ids.len())
            .collect::<Vec<_>>()
            .join(",");
        let sql = format!(
            "select u.segmentid, max(u.bytes_referenced), s.data_size \
             from segment_utilization u \
             join segments s on s.segmentid = u.segmentid \
             where u.snapshotid in ({}) \
             group by u.segmentid",
            placeholders
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let params: Vec<&dyn rusqlite::ToSql> =
            snapshot_ids.iter().map(|id| id as &dyn rusqlite::ToSql).collect();
        let rows = stmt
            .query_map(params.as_slice(), |row| {
                let bytes_referenced: i64 = row.get(1)?;
                let size_bytes: i64 = row.get(2)?;
                Ok(SegmentUtilization {
                    segment_id: row.get(0)?,
                    bytes_referenced,
                    size_bytes,
                    utilization: bytes_referenced as f64 / size_bytes as f64,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Delete unreachable rows: `segment_utilization` rows whose
    /// snapshot no longer exists, `segments` no longer referenced by any
    /// utilization row, `block_index` rows in deleted segments, and
    /// `subblock_signatures` rows for deleted objects. All four deletes
    /// run in one transaction.
    pub fn garbage_collect(&mut self) -> Result<GcReport> {
        let tx = self.conn.transaction()?;
        let report = run_garbage_collect(&tx)?;
        tx.commit()?;
        Ok(report)
    }

    /// Rank not-yet-expired segments by [`get_segment_cleaning_list`],
    /// mark every segment at or above `config.clean_benefit_threshold`
    /// as expired via [`mark_segment_expired`], then call
    /// [`balance_expired_objects`] to regroup every currently-expired
    /// object into age buckets. A garbage-collection pass runs first so
    /// cleaning never considers a segment only reachable through a
    /// since-deleted snapshot. The whole pass is one transaction.
    pub fn clean(&mut self, config: &CleanerConfig) -> Result<CleaningReport> {
        config.validate()?;
        let tx = self.conn.transaction()?;

        let gc = run_garbage_collect(&tx)?;

        let candidates = get_segment_cleaning_list(&tx, config.age_boost)?;
        let selected: Vec<SegmentCleaningInfo> = candidates
            .into_iter()
            .filter(|s| s.cleaning_benefit >= config.clean_benefit_threshold)
            .collect();

        for segment in &selected {
            mark_segment_expired(&tx, segment.id)?;
            tracing::info!(
                segment_id = segment.id,
                benefit = segment.cleaning_benefit,
                "marking segment expired for cleaning"
            );
        }

        balance_expired_objects(&tx)?;
        tx.commit()?;

        Ok(CleaningReport {
            gc,
            expired_segments: selected,
        })
    }
}

fn run_garbage_collect(conn: &Connection) -> Result<GcReport> {
    let segment_utilization_deleted = conn.execute(
        "delete from segment_utilization \
         where snapshotid not in (select snapshotid from snapshots)",
        [],
    )?;
    let segments_deleted = conn.execute(
        "delete from segments where segmentid not in \
         (select segmentid from segment_utilization)",
        [],
    )?;
    let block_index_deleted = conn.execute(
        "delete from block_index where segmentid not in (select segmentid from segments)",
        [],
    )?;
    let subblock_signatures_deleted = conn.execute(
        "delete from subblock_signatures where blockid not in (select blockid from block_index)",
        [],
    )?;

    tracing::debug!(
        segment_utilization_deleted,
        segments_deleted,
        block_index_deleted,
        subblock_signatures_deleted,
        "garbage collection pass complete"
    );

    Ok(GcReport {
        segment_utilization_deleted,
        segments_deleted,
        block_index_deleted,
        subblock_signatures_deleted,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seed_snapshot(db: &LocalDatabase, scheme: &str, name: &str, age_days: f64, intent: f64) -> i64 {
        db.conn
            .execute(
                "insert into snapshots (scheme, name, timestamp, intent) \
                 values (?, ?, julianday('now') - ?, ?)",
                params![scheme, name, age_days, intent],
            )
            .unwrap();
        db.conn.last_insert_rowid()
    }

    fn seed_segment(db: &LocalDatabase, uuid: &str, data_size: i64, age_days: f64) -> i64 {
        db.conn
            .execute(
                "insert into segments (segment, timestamp, data_size, disk_size, type) \
                 values (?, julianday('now') - ?, ?, ?, 'data')",
                params![uuid, age_days, data_size, data_size],
            )
            .unwrap();
        db.conn.last_insert_rowid()
    }

    fn seed_utilization(db: &LocalDatabase, snapshot_id: i64, segment_id: i64, bytes_referenced: i64) {
        db.conn
            .execute(
                "insert into segment_utilization (snapshotid, segmentid, bytes_referenced) \
                 values (?, ?, ?)",
                params![snapshot_id, segment_id, bytes_referenced],
            )
            .unwrap();
    }

    #[test]
    fn schema_is_idempotent_to_reopen() {
        let db = LocalDatabase::open_in_memory().unwrap();
        // Re-running the schema script against the same connection must
        // not fail on "table already exists".
        db.conn.execute_batch(schema::SCHEMA).unwrap();
    }

    #[test]
    fn list_schemes_is_sorted_and_distinct() {
        let db = LocalDatabase::open_in_memory().unwrap();
        seed_snapshot(&db, "weekly", "w1", 1.0, 7.0);
        seed_snapshot(&db, "daily", "d1", 1.0, 1.0);
        seed_snapshot(&db, "daily", "d2", 2.0, 1.0);

        assert_eq!(db.list_schemes().unwrap(), vec!["daily", "weekly"]);
    }

    #[test]
    fn list_snapshots_filters_by_scheme_and_sorts_by_name() {
        let db = LocalDatabase::open_in_memory().unwrap();
        seed_snapshot(&db, "daily", "b", 1.0, 1.0);
        seed_snapshot(&db, "daily", "a", 2.0, 1.0);
        seed_snapshot(&db, "weekly", "z", 1.0, 7.0);

        let rows = db.list_snapshots("daily").unwrap();
        let names: Vec<&str> = rows.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn delete_snapshot_reports_whether_a_row_was_removed() {
        let db = LocalDatabase::open_in_memory().unwrap();
        let id = seed_snapshot(&db, "daily", "only", 1.0, 1.0);

        assert!(db.delete_snapshot(id).unwrap());
        assert!(!db.delete_snapshot(id).unwrap());
    }

    #[test]
    fn garbage_collect_removes_unreachable_rows_and_is_idempotent() {
        let mut db = LocalDatabase::open_in_memory().unwrap();
        let snap = seed_snapshot(&db, "daily", "keep", 1.0, 1.0);
        let seg_live = seed_segment(&db, "seg-live", 1000, 5.0);
        let seg_orphan = seed_segment(&db, "seg-orphan", 1000, 5.0);
        seed_utilization(&db, snap, seg_live, 500);

        db.conn
            .execute(
                "insert into block_index (segmentid, object_id, timestamp, size) values (?, 'a1', julianday('now'), 10)",
                params![seg_orphan],
            )
            .unwrap();

        let report = db.garbage_collect().unwrap();
        assert_eq!(report.segments_deleted, 1);
        assert_eq!(report.block_index_deleted, 1);

        let second = db.garbage_collect().unwrap();
        assert_eq!(second, GcReport::default());
    }

    #[test]
    fn prune_old_snapshots_keeps_most_recent_and_demotes_superseded() {
        let mut db = LocalDatabase::open_in_memory().unwrap();
        // youngest first when ordered by age: recent(intent 1), then a
        // weekly with higher intent, then an old daily.
        seed_snapshot(&db, "daily", "recent", 1.0, 1.0);
        seed_snapshot(&db, "daily", "weekly-ish", 5.0, 7.0);
        seed_snapshot(&db, "daily", "old", 10.0, 1.0);

        let deleted = db.prune_old_snapshots("daily", 1.0).unwrap();
        let remaining = db.list_snapshots("daily").unwrap();
        let names: Vec<&str> = remaining.iter().map(|r| r.name.as_str()).collect();

        // "recent" is kept unconditionally. "weekly-ish" has higher
        // intent than the running max (1.0) so it survives and raises
        // the bar. "old" has intent 1.0, which both is below the new
        // max_intent (7.0) and equals the requested intent, so it goes.
        assert!(names.contains(&"recent"));
        assert!(names.contains(&"weekly-ish"));
        assert!(!names.contains(&"old"));
        assert_eq!(deleted.len(), 1);
    }

    #[test]
    fn segment_utilizations_takes_the_max_across_snapshots() {
        let db = LocalDatabase::open_in_memory().unwrap();
        let s1 = seed_snapshot(&db, "daily", "s1", 2.0, 1.0);
        let s2 = seed_snapshot(&db, "daily", "s2", 1.0, 1.0);
        let seg = seed_segment(&db, "seg-a", 1000, 5.0);
        seed_utilization(&db, s1, seg, 250);
        seed_utilization(&db, s2, seg, 750);

        let utilizations = db.segment_utilizations(&[s1, s2]).unwrap();
        assert_eq!(utilizations.len(), 1);
        assert_eq!(utilizations[0].bytes_referenced, 750);
        assert_eq!(utilizations[0].utilization, 0.75);
    }

    #[test]
    fn segment_utilizations_of_empty_snapshot_list_is_empty() {
        let db = LocalDatabase::open_in_memory().unwrap();
        assert!(db.segment_utilizations(&[]).unwrap().is_empty());
    }

    #[test]
    fn clean_expires_high_benefit_segments_and_buckets_them() {
        let mut db = LocalDatabase::open_in_memory().unwrap();
        let snap = seed_snapshot(&db, "daily", "keep", 1.0, 1.0);

        // A mostly-stale segment: 25% utilized, 10 days old -> high benefit.
        let stale = seed_segment(&db, "stale-seg", 1000, 10.0);
        seed_utilization(&db, snap, stale, 250);
        db.conn
            .execute(
                "insert into block_index (segmentid, object_id, timestamp, size) \
                 values (?, 'obj1', julianday('now') - 10.0, 250)",
                params![stale],
            )
            .unwrap();

        let report = db.clean(&CleanerConfig::for_testing()).unwrap();
        assert_eq!(report.expired_segments.len(), 1);
        assert_eq!(report.expired_segments[0].id, stale);

        let expired: i64 = db
            .conn
            .query_row("select expired from block_index where segmentid = ?", params![stale], |r| r.get(0))
            .unwrap();
        assert!(expired >= 0);
    }

    #[test]
    fn clean_rejects_invalid_config() {
        let mut db = LocalDatabase::open_in_memory().unwrap();
        let bad = CleanerConfig::default().with_retained_intent(-1.0);
        assert!(db.clean(&bad).is_err());
    }
}
