use cumulus_backend::LocalBackend;
use cumulus_core::{Algorithm, ChecksumCreator};
use cumulus_restore::{restore_snapshot, verify_snapshot, RestoreSelection};
use cumulus_snapshot::SnapshotDescriptor;
use cumulus_store::CumulusStore;
use std::io::Cursor;
use tempfile::tempdir;

const SEGMENT: &str = "0e8f1234-1234-1234-1234-aaaaaaaaaaaa";

fn put_segment(dir: &std::path::Path, objects: &[(&str, &[u8])]) {
    let mut builder = tar::Builder::new(Vec::new());
    for (name, data) in objects {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, format!("{}/{}", SEGMENT, name), *data)
            .unwrap();
    }
    let tar_bytes = builder.into_inner().unwrap();
    let backend = LocalBackend::new(dir);
    backend
        .put(&format!("{}.tar", SEGMENT), &mut Cursor::new(tar_bytes))
        .unwrap();
}

fn checksum_of(data: &[u8]) -> String {
    let mut creator = ChecksumCreator::new(Algorithm::Sha1);
    creator.update(data);
    creator.compute()
}

#[test]
fn restores_a_single_file_snapshot() {
    let backend_dir = tempdir().unwrap();
    let dest_dir = tempdir().unwrap();

    let file_data = b"hello, restored world";
    let checksum = checksum_of(file_data);
    let data_ref = format!("{}/data1", SEGMENT);

    let log_entry = format!(
        "name: greeting.txt\ntype: f\nmode: 0644\nmtime: 1700000000\nctime: 1700000000\nlinks: 1\nuser: 1000\ngroup: 1000\nsize: {}\nchecksum: {}\ndata: {}\n\n",
        file_data.len(),
        checksum,
        data_ref
    );

    put_segment(
        backend_dir.path(),
        &[("root", log_entry.as_bytes()), ("data1", file_data)],
    );

    let store = CumulusStore::new(Box::new(LocalBackend::new(backend_dir.path()))).unwrap();
    let descriptor = SnapshotDescriptor {
        format: "Cumulus Snapshot v0.11".to_string(),
        version: vec![0, 11],
        root: format!("{}/root", SEGMENT),
        fields: cumulus_metadata::parse_full(
            format!("Format: Cumulus Snapshot v0.11\nRoot: {}/root\nSegments: {}\n", SEGMENT, SEGMENT).lines(),
        ),
    };

    restore_snapshot(
        &store,
        &descriptor,
        dest_dir.path(),
        &RestoreSelection::everything(),
    )
    .unwrap();

    let restored = std::fs::read(dest_dir.path().join("greeting.txt")).unwrap();
    assert_eq!(restored, file_data);
}

#[test]
fn verify_reports_clean_snapshot() {
    let backend_dir = tempdir().unwrap();

    let file_data = b"verify me";
    let checksum = checksum_of(file_data);
    let data_ref = format!("{}/data1", SEGMENT);
    let log_entry = format!(
        "name: file.txt\ntype: f\nmode: 0644\nmtime: 1700000000\nsize: {}\nchecksum: {}\ndata: {}\n\n",
        file_data.len(),
        checksum,
        data_ref
    );
    put_segment(
        backend_dir.path(),
        &[("root", log_entry.as_bytes()), ("data1", file_data)],
    );

    let store = CumulusStore::new(Box::new(LocalBackend::new(backend_dir.path()))).unwrap();
    let descriptor = SnapshotDescriptor {
        format: "Cumulus Snapshot v0.11".to_string(),
        version: vec![0, 11],
        root: format!("{}/root", SEGMENT),
        fields: cumulus_metadata::parse_full(
            format!("Format: Cumulus Snapshot v0.11\nRoot: {}/root\nSegments: {}\n", SEGMENT, SEGMENT).lines(),
        ),
    };

    let report = verify_snapshot(&store, &descriptor).unwrap();
    assert!(report.is_clean(), "{:?}", report);
}
