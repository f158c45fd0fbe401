//! SQLite schema for the local database of snapshot contents and object
//! checksums (specification §3).
//!
//! The local database is consulted when creating a snapshot to decide
//! what data can be reused from old snapshots, and it drives segment
//! cleaning. This crate only implements the read side and the cleaning
//! bookkeeping; populating `block_index`/`subblock_signatures` during a
//! new backup run is a write-path concern outside this core.

pub(crate) const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS snapshots (
    snapshotid INTEGER PRIMARY KEY,
    scheme     TEXT NOT NULL,
    name       TEXT NOT NULL,
    timestamp  REAL NOT NULL,
    intent     REAL NOT NULL DEFAULT 1.0
);

CREATE TABLE IF NOT EXISTS segments (
    segmentid   INTEGER PRIMARY KEY,
    segment     TEXT NOT NULL UNIQUE,
    timestamp   REAL NOT NULL,
    data_size   INTEGER NOT NULL,
    disk_size   INTEGER,
    type        TEXT,
    expire_time INTEGER REFERENCES snapshots(snapshotid)
);

CREATE TABLE IF NOT EXISTS segment_utilization (
    snapshotid       INTEGER NOT NULL REFERENCES snapshots(snapshotid),
    segmentid        INTEGER NOT NULL REFERENCES segments(segmentid),
    bytes_referenced INTEGER NOT NULL,
    PRIMARY KEY (snapshotid, segmentid)
);

CREATE TABLE IF NOT EXISTS block_index (
    blockid   INTEGER PRIMARY KEY,
    segmentid INTEGER NOT NULL REFERENCES segments(segmentid),
    object_id TEXT NOT NULL,
    checksum  TEXT,
    timestamp REAL NOT NULL,
    size      INTEGER NOT NULL,
    expired   INTEGER
);

CREATE TABLE IF NOT EXISTS subblock_signatures (
    blockid    INTEGER NOT NULL UNIQUE REFERENCES block_index(blockid),
    algorithm  TEXT NOT NULL,
    signatures BLOB NOT NULL
);

CREATE INDEX IF NOT EXISTS block_index_segmentid ON block_index(segmentid);
CREATE INDEX IF NOT EXISTS segment_utilization_segmentid ON segment_utilization(segmentid);

CREATE VIEW IF NOT EXISTS segment_info AS
    SELECT s.segmentid                          AS segmentid,
           coalesce(sum(u.bytes_referenced), 0)  AS used,
           s.data_size                           AS size,
           s.timestamp                           AS mtime,
           s.expire_time                         AS expire_time
    FROM segments s
    LEFT JOIN segment_utilization u ON u.segmentid = s.segmentid
    GROUP BY s.segmentid;
"#;
