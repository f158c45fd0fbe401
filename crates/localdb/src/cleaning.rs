//! Segment cleaning bookkeeping: ranking segments by reclaimable space,
//! marking them expired, and grouping expired objects into age buckets
//! so a rewrite groups old data together rather than scattering it
//! across every new segment (specification §4.10).

use crate::error::Result;
use rusqlite::{params, Connection};

/// Usage statistics for one segment, as needed to rank it for cleaning.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentCleaningInfo {
    /// Database id of the segment.
    pub id: i64,
    /// Estimated bytes still referenced by current snapshots.
    pub used_bytes: f64,
    /// Total size of the segment, in bytes.
    pub size_bytes: f64,
    /// Julian-day timestamp the segment was written.
    pub mtime: f64,
    /// Age of the segment, in days, as of the time of the query.
    pub age_days: f64,
    /// Heuristic benefit of cleaning this segment: higher is better to clean first.
    pub cleaning_benefit: f64,
}

/// Rank every current, not-yet-expired segment by estimated cleaning
/// benefit, highest benefit first.
///
/// `age_boost` (in days) is added to every segment's age before scoring,
/// letting callers make cleaning more aggressive ahead of a long-lived
/// snapshot (e.g. boost by 7 days before a weekly snapshot).
///
/// The benefit heuristic: `u` is the fraction of the segment still
/// utilized. `(1 - u)` is the space reclaimable; `(age_days + age_boost)`
/// favors cleaning old segments over young ones; `(u + 0.1)` penalizes
/// segments that are mostly still live, since rewriting them costs more
/// than the space they free.
pub fn get_segment_cleaning_list(
    conn: &Connection,
    age_boost: f64,
) -> Result<Vec<SegmentCleaningInfo>> {
    let mut stmt = conn.prepare(
        "select segmentid, used, size, mtime, julianday('now') - mtime as age \
         from segment_info where expire_time is null",
    )?;

    let mut segments = Vec::new();
    let rows = stmt.query_map([], |row| {
        let id: i64 = row.get(0)?;
        let used_bytes: Option<f64> = row.get(1)?;
        let size_bytes: f64 = row.get(2)?;
        let mtime: f64 = row.get(3)?;
        let age_days: Option<f64> = row.get(4)?;
        Ok((id, used_bytes.unwrap_or(0.0), size_bytes, mtime, age_days.unwrap_or(0.0)))
    })?;

    for row in rows {
        let (id, used_bytes, size_bytes, mtime, age_days) = row?;
        let u = used_bytes / size_bytes;
        let cleaning_benefit = (1.0 - u) * (age_days + age_boost) / (u + 0.1);
        segments.push(SegmentCleaningInfo {
            id,
            used_bytes,
            size_bytes,
            mtime,
            age_days,
            cleaning_benefit,
        });
    }

    segments.sort_by(|a, b| b.cleaning_benefit.total_cmp(&a.cleaning_benefit));
    Ok(segments)
}

/// Mark a segment's objects as expired, so a future snapshot that would
/// have reused them instead writes fresh copies and no future snapshot
/// depends on this segment.
///
/// Also stamps the segment's `expire_time` with the most recent
/// snapshot id, recording which snapshots might still reference it.
/// The subsequent `expired = 0` write on `block_index` is a deliberate
/// no-op when objects are already grouped by [`balance_expired_objects`]
/// into higher-numbered buckets — it only takes effect the first time a
/// segment is expired, before any bucket balancing has run.
pub fn mark_segment_expired(conn: &Connection, segment_id: i64) -> Result<()> {
    let last_snapshot_id: Option<i64> =
        conn.query_row("select max(snapshotid) from snapshots", [], |r| r.get(0))?;
    conn.execute(
        "update segments set expire_time = ? where segmentid = ?",
        params![last_snapshot_id, segment_id],
    )?;
    conn.execute(
        "update block_index set expired = 0 where segmentid = ?",
        params![segment_id],
    )?;
    Ok(())
}

const MIN_AGE: f64 = cumulus_core::MIN_AGE_DAYS;

/// Regroup expired objects into age buckets, so that when they're
/// rewritten into new segments during cleaning, objects of similar age
/// end up together rather than scattered across every new segment.
///
/// The number of buckets and their age cutoffs are chosen dynamically
/// from the distribution of expired object ages, aiming for roughly two
/// segments' worth of data per bucket.
pub fn balance_expired_objects(conn: &Connection) -> Result<()> {
    conn.execute(
        "update block_index set expired = 0 where expired is not null",
        [],
    )?;

    let segment_size_estimate: Option<f64> = conn.query_row(
        "select avg(data_size) from segments where segmentid in \
         (select distinct segmentid from block_index where expired is not null)",
        [],
        |r| r.get(0),
    )?;
    let Some(segment_size_estimate) = segment_size_estimate.filter(|v| *v > 0.0) else {
        return Ok(());
    };

    let now: f64 = conn.query_row("select julianday('now')", [], |r| r.get(0))?;

    conn.execute(
        "update block_index set timestamp = ? where timestamp > ? and expired is not null",
        params![now, now],
    )?;

    let mut stmt = conn.prepare(
        "select round(? - timestamp) as age, count(*), sum(size) \
         from block_index where expired = 0 group by age order by age",
    )?;
    let mut distribution: Vec<(f64, i64, f64)> = stmt
        .query_map(params![now], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?))
        })?
        .collect::<rusqlite::Result<_>>()?;

    let total_bytes: f64 = distribution.iter().map(|(_, _, size)| size).sum();
    let target_buckets = 2.0 * (total_bytes / segment_size_estimate).powf(0.4);
    let min_size = 1.5 * segment_size_estimate;
    let target_size = f64::max(2.0 * segment_size_estimate, total_bytes / target_buckets);

    tracing::debug!(
        segment_size_estimate,
        total_bytes,
        target_buckets,
        min_size,
        target_size,
        "balancing expired objects"
    );

    distribution.reverse();
    let mut cutoffs: Vec<f64> = Vec::new();
    let mut bucket_size = 0.0f64;
    let mut min_age_bucket = false;

    for (age, _items, size) in &distribution {
        if bucket_size >= target_size || (*age < MIN_AGE && !min_age_bucket) {
            if bucket_size < target_size && !cutoffs.is_empty() {
                cutoffs.pop();
            }
            cutoffs.push(*age);
            bucket_size = 0.0;
        }
        bucket_size += size;
        if *age < MIN_AGE {
            min_age_bucket = true;
        }
    }

    if bucket_size >= min_size || !min_age_bucket {
        cutoffs.push(-1.0);
    }
    cutoffs.push(-1.0);

    tracing::debug!(?cutoffs, "chosen age bucket cutoffs");

    cutoffs.reverse();
    for (i, cutoff) in cutoffs.iter().enumerate() {
        conn.execute(
            "update block_index set expired = ? \
             where round(? - timestamp) > ? and expired is not null",
            params![i as i64, now, cutoff],
        )?;
    }

    Ok(())
}
