//! Archive download and extraction.

mod common;

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use qcloud_client::archive::{RAW_DOWNLOAD_FILE, extract_archive, write_stream_to_temp};
use qcloud_client::{ArchivePipeline, UnpackOutcome};

/// Relative path → contents of every file under `root`.
fn snapshot_tree(root: &Path) -> BTreeMap<String, Vec<u8>> {
    fn walk(root: &Path, dir: &Path, out: &mut BTreeMap<String, Vec<u8>>) {
        for entry in fs::read_dir(dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                walk(root, &path, out);
            } else {
                let rel = path.strip_prefix(root).unwrap().to_string_lossy().replace('\\', "/");
                out.insert(rel, fs::read(&path).unwrap());
            }
        }
    }
    let mut out = BTreeMap::new();
    walk(root, root, &mut out);
    out
}

fn sample_members() -> Vec<(&'static str, Vec<u8>)> {
    vec![
        ("results.npy", (0u8..=255).cycle().take(20_000).collect()),
        ("stdout.log", b"shots: 1000\n".to_vec()),
        ("logs/device/trace.txt", b"calibration ok".to_vec()),
        ("empty.txt", Vec::new()),
    ]
}

fn build(members: &[(&'static str, Vec<u8>)]) -> Vec<u8> {
    let borrowed: Vec<(&str, &[u8])> = members.iter().map(|(n, d)| (*n, d.as_slice())).collect();
    common::tar_gz(&borrowed)
}

#[test]
fn round_trip_reproduces_files() {
    let members = sample_members();
    let base = tempfile::tempdir().unwrap();
    let spool = tempfile::tempdir().unwrap();
    let pipeline = ArchivePipeline::new(base.path().join("job")).with_temp_dir(spool.path());

    let outcome = pipeline.unpack(build(&members).as_slice()).unwrap();

    assert_eq!(outcome, UnpackOutcome::Extracted);
    let expected: BTreeMap<String, Vec<u8>> = members
        .into_iter()
        .map(|(n, d)| (n.to_string(), d))
        .collect();
    assert_eq!(snapshot_tree(pipeline.results_folder()), expected);
}

#[test]
fn temp_file_removed_after_success_and_corruption() {
    let base = tempfile::tempdir().unwrap();
    let spool = tempfile::tempdir().unwrap();
    let pipeline = ArchivePipeline::new(base.path().join("job")).with_temp_dir(spool.path());

    pipeline.unpack(build(&sample_members()).as_slice()).unwrap();
    assert_eq!(fs::read_dir(spool.path()).unwrap().count(), 0);

    let outcome = pipeline.unpack(&b"<html>502 Bad Gateway</html>"[..]).unwrap();
    assert!(matches!(outcome, UnpackOutcome::Corrupt { .. }));
    assert_eq!(fs::read_dir(spool.path()).unwrap().count(), 0);
}

#[test]
fn garbled_deflate_stream_is_corrupt() {
    // Valid 10-byte gzip header followed by a reserved deflate block type.
    let mut garbled = build(&sample_members());
    for byte in garbled.iter_mut().skip(10) {
        *byte = 0xFF;
    }
    let base = tempfile::tempdir().unwrap();
    let pipeline = ArchivePipeline::new(base.path().join("job"));

    let outcome = pipeline.unpack(garbled.as_slice()).unwrap();

    let preserved = pipeline.member(RAW_DOWNLOAD_FILE);
    assert_eq!(
        outcome,
        UnpackOutcome::Corrupt {
            preserved: Some(preserved.clone())
        }
    );
    assert_eq!(fs::read(preserved).unwrap(), garbled);
}

#[test]
fn extracting_twice_overwrites_members() {
    let base = tempfile::tempdir().unwrap();
    let dest = base.path().join("job");
    let first = write_stream_to_temp(build(&sample_members()).as_slice()).unwrap();
    extract_archive(first.path(), &dest).unwrap();
    let once = snapshot_tree(&dest);

    let second = write_stream_to_temp(build(&sample_members()).as_slice()).unwrap();
    extract_archive(second.path(), &dest).unwrap();
    assert_eq!(snapshot_tree(&dest), once);

    let updated = write_stream_to_temp(
        common::tar_gz(&[("stdout.log", &b"second run\n"[..])]).as_slice(),
    )
    .unwrap();
    extract_archive(updated.path(), &dest).unwrap();
    let after = snapshot_tree(&dest);
    assert_eq!(after.len(), once.len());
    assert_eq!(after["stdout.log"], b"second run\n");
}

#[test]
fn results_dir_created_with_parents() {
    let base = tempfile::tempdir().unwrap();
    let dest = base.path().join("a").join("b").join("pid");
    let archive = write_stream_to_temp(build(&sample_members()).as_slice()).unwrap();

    extract_archive(archive.path(), &dest).unwrap();
    assert!(dest.join("results.npy").is_file());
}
