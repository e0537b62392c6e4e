// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Point-in-time copies of disk images.
//!
//! A snapshot is a byte-for-byte copy of a disk image stored as
//! `<YYYYMMDD_HHMMSS>_<label>.img` in a per-OS snapshot directory. Restoring
//! copies a snapshot back over the disk image, keeping a `.bak` copy of the
//! image it replaces until the restore has succeeded.

use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Local, NaiveDateTime, TimeZone};

use crate::error::{Error, Result};

pub const SNAPSHOT_EXTENSION: &str = "img";
const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";
const TIMESTAMP_LEN: usize = "YYYYMMDD_HHMMSS".len();

/// Replaces every character other than ASCII letters, digits, `_` and `-`
/// with `_`.
pub fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// The file name used for a snapshot labelled `name` taken at `at`.
pub fn snapshot_file_name<Tz: TimeZone>(name: &str, at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!(
        "{}_{}.{SNAPSHOT_EXTENSION}",
        at.format(TIMESTAMP_FORMAT),
        sanitize_name(name)
    )
}

/// Where `restore` keeps the image it is about to overwrite.
pub fn backup_path(disk_image: &Utf8Path) -> Utf8PathBuf {
    Utf8PathBuf::from(format!("{disk_image}.bak"))
}

/// Copies `src` to `dst`, carrying over permissions and, where the platform
/// allows, access and modification times.
pub fn copy_preserving(src: &Utf8Path, dst: &Utf8Path) -> std::io::Result<()> {
    std::fs::copy(src, dst)?;

    let metadata = std::fs::metadata(src)?;
    let times = metadata.accessed().and_then(|accessed| {
        Ok(std::fs::FileTimes::new()
            .set_accessed(accessed)
            .set_modified(metadata.modified()?))
    });

    let applied = times.and_then(|times| {
        std::fs::OpenOptions::new().write(true).open(dst)?.set_times(times)
    });

    if let Err(e) = applied {
        tracing::debug!(%dst, error = %e, "could not preserve file times");
    }

    Ok(())
}

/// Copies `disk_image` into `snapshot_dir` under a name built from the
/// current local time and `name`. Returns the snapshot's path.
///
/// A snapshot with the same label taken within the same second replaces the
/// earlier one.
pub fn create(
    disk_image: &Utf8Path,
    snapshot_dir: &Utf8Path,
    name: &str,
) -> Result<Utf8PathBuf> {
    create_at(disk_image, snapshot_dir, name, &Local::now())
}

pub fn create_at<Tz: TimeZone>(
    disk_image: &Utf8Path,
    snapshot_dir: &Utf8Path,
    name: &str,
    at: &DateTime<Tz>,
) -> Result<Utf8PathBuf>
where
    Tz::Offset: std::fmt::Display,
{
    if !disk_image.is_file() {
        return Err(Error::SourceMissing { path: disk_image.to_owned() });
    }

    std::fs::create_dir_all(snapshot_dir)
        .map_err(Error::io("creating snapshot directory", snapshot_dir))?;

    let destination = snapshot_dir.join(snapshot_file_name(name, at));
    if destination.exists() {
        tracing::warn!(%destination, "replacing existing snapshot");
    }

    tracing::info!(source = %disk_image, %destination, "creating snapshot");
    copy_preserving(disk_image, &destination)
        .map_err(Error::io("copying disk image to", &destination))?;

    Ok(destination)
}

/// A snapshot file found in a snapshot directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SnapshotInfo {
    pub path: Utf8PathBuf,
    pub file_name: String,

    /// The time embedded in the file name, if the name follows the snapshot
    /// naming pattern.
    pub timestamp: Option<NaiveDateTime>,

    /// The label following the timestamp, or the whole file stem for files
    /// that don't carry a timestamp.
    pub label: String,
}

impl SnapshotInfo {
    fn from_path(path: Utf8PathBuf) -> Option<Self> {
        let file_name = path.file_name()?.to_owned();
        let stem = path.file_stem()?;

        let parsed = stem
            .get(..TIMESTAMP_LEN)
            .zip(stem.get(TIMESTAMP_LEN..))
            .and_then(|(ts, rest)| {
                let label = rest.strip_prefix('_')?;
                let ts =
                    NaiveDateTime::parse_from_str(ts, TIMESTAMP_FORMAT).ok()?;
                Some((ts, label.to_owned()))
            });

        let (timestamp, label) = match parsed {
            Some((ts, label)) => (Some(ts), label),
            None => (None, stem.to_owned()),
        };

        Some(Self { path, file_name, timestamp, label })
    }
}

/// Lists the `.img` files in `snapshot_dir` in directory enumeration order.
/// A missing directory has no snapshots.
pub fn list(snapshot_dir: &Utf8Path) -> Result<Vec<SnapshotInfo>> {
    let entries = match snapshot_dir.read_dir_utf8() {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(Vec::new())
        }
        Err(e) => {
            return Err(Error::io("listing snapshots in", snapshot_dir)(e))
        }
    };

    let mut snapshots = Vec::new();
    for entry in entries {
        let entry =
            entry.map_err(Error::io("listing snapshots in", snapshot_dir))?;
        let path = entry.path();
        if path.extension() != Some(SNAPSHOT_EXTENSION) || !path.is_file() {
            continue;
        }

        if let Some(info) = SnapshotInfo::from_path(path.to_owned()) {
            snapshots.push(info);
        }
    }

    Ok(snapshots)
}

/// Sorts snapshots oldest first. Snapshots without a parseable timestamp sort
/// after all others, by file name.
pub fn sort_chronologically(snapshots: &mut [SnapshotInfo]) {
    snapshots.sort_by(|a, b| match (a.timestamp, b.timestamp) {
        (Some(x), Some(y)) => x.cmp(&y).then_with(|| a.label.cmp(&b.label)),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => a.file_name.cmp(&b.file_name),
    });
}

/// Finds the snapshot the user asked for: an existing path, or a file name
/// (with or without the `.img` extension) inside `snapshot_dir`.
pub fn resolve(snapshot_dir: &Utf8Path, name: &str) -> Result<Utf8PathBuf> {
    let as_path = Utf8Path::new(name);
    let candidates = [
        as_path.to_owned(),
        snapshot_dir.join(name),
        snapshot_dir.join(format!("{name}.{SNAPSHOT_EXTENSION}")),
    ];

    candidates
        .into_iter()
        .find(|c| c.is_file())
        .ok_or_else(|| Error::SourceMissing { path: snapshot_dir.join(name) })
}

/// Replaces `disk_image` with a copy of `snapshot`.
///
/// If `disk_image` exists it is first copied to [`backup_path`]; a failure
/// there aborts the restore before the image is touched. If copying the
/// snapshot fails and leaves no disk image behind, the backup is copied back
/// into place. The backup is removed once the image is intact; otherwise it
/// is left for manual recovery and named in the returned error.
///
/// A `snapshot` that is `disk_image` itself or its backup is refused before
/// anything is copied.
pub fn restore(disk_image: &Utf8Path, snapshot: &Utf8Path) -> Result<()> {
    restore_with(disk_image, snapshot, copy_preserving)
}

fn restore_with<F>(
    disk_image: &Utf8Path,
    snapshot: &Utf8Path,
    mut copy: F,
) -> Result<()>
where
    F: FnMut(&Utf8Path, &Utf8Path) -> std::io::Result<()>,
{
    if !snapshot.is_file() {
        return Err(Error::SourceMissing { path: snapshot.to_owned() });
    }

    if same_file(snapshot, disk_image)
        || same_file(snapshot, &backup_path(disk_image))
    {
        return Err(Error::SnapshotIsTarget {
            snapshot: snapshot.to_owned(),
            disk_image: disk_image.to_owned(),
        });
    }

    let failed = |source: std::io::Error, backup: Option<Utf8PathBuf>| {
        Error::RestoreFailed {
            snapshot: snapshot.to_owned(),
            source,
            backup,
        }
    };

    let backup = if disk_image.exists() {
        let backup = backup_path(disk_image);
        tracing::info!(%disk_image, %backup, "backing up current disk image");
        copy(disk_image, &backup).map_err(|e| failed(e, None))?;
        Some(backup)
    } else {
        None
    };

    tracing::info!(%snapshot, %disk_image, "restoring snapshot");
    match copy(snapshot, disk_image) {
        Ok(()) => {
            if let Some(backup) = backup {
                remove_backup(&backup);
            }

            Ok(())
        }
        Err(e) => {
            tracing::warn!(%snapshot, error = %e, "snapshot copy failed");
            let retained = match backup {
                Some(backup) if !disk_image.exists() => {
                    match copy(&backup, disk_image) {
                        Ok(()) => {
                            tracing::info!(%disk_image, "rolled back from backup");
                            remove_backup(&backup);
                            None
                        }
                        Err(rollback) => {
                            tracing::warn!(
                                %backup,
                                error = %rollback,
                                "rollback from backup failed"
                            );
                            Some(backup)
                        }
                    }
                }
                other => other,
            };

            Err(failed(e, retained))
        }
    }
}

/// Whether `a` and `b` both exist and resolve to the same file.
fn same_file(a: &Utf8Path, b: &Utf8Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

fn remove_backup(backup: &Utf8Path) {
    if let Err(e) = std::fs::remove_file(backup) {
        tracing::warn!(%backup, error = %e, "failed to remove backup");
    }
}

#[cfg(test)]
mod test {
    use super::*;

    struct Fixture {
        _dir: tempfile::TempDir,
        root: Utf8PathBuf,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let root = Utf8Path::from_path(dir.path()).unwrap().to_owned();
            Self { _dir: dir, root }
        }

        fn disk(&self, contents: &[u8]) -> Utf8PathBuf {
            let path = self.root.join("win98.img");
            std::fs::write(&path, contents).unwrap();
            path
        }

        fn snapshot(&self, contents: &[u8]) -> Utf8PathBuf {
            let dir = self.root.join("snapshots");
            std::fs::create_dir_all(&dir).unwrap();
            let path = dir.join("20240101_120000_clean.img");
            std::fs::write(&path, contents).unwrap();
            path
        }
    }

    fn noon() -> DateTime<chrono::Utc> {
        chrono::Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn sanitized_file_names() {
        assert_eq!(
            snapshot_file_name("My Save #1", &noon()),
            "20240101_120000_My_Save__1.img"
        );
        assert_eq!(sanitize_name("fresh-install_2"), "fresh-install_2");
        assert_eq!(sanitize_name("a/b\\c.d é"), "a_b_c_d__");
    }

    #[test]
    fn create_copies_image() {
        let f = Fixture::new();
        let disk = f.disk(b"disk contents");
        let dir = f.root.join("snapshots");

        let snap = create_at(&disk, &dir, "My Save #1", &noon()).unwrap();
        assert_eq!(snap, dir.join("20240101_120000_My_Save__1.img"));
        assert_eq!(std::fs::read(&snap).unwrap(), b"disk contents");

        let name = snap.file_name().unwrap();
        assert!(name
            .trim_end_matches(".img")
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-'));
    }

    #[test]
    fn create_preserves_modification_time() {
        let f = Fixture::new();
        let disk = f.disk(b"x");
        let old = std::time::SystemTime::UNIX_EPOCH
            + std::time::Duration::from_secs(1_000_000_000);
        std::fs::OpenOptions::new()
            .write(true)
            .open(&disk)
            .unwrap()
            .set_modified(old)
            .unwrap();

        let snap = create_at(&disk, &f.root.join("s"), "t", &noon()).unwrap();
        assert_eq!(std::fs::metadata(&snap).unwrap().modified().unwrap(), old);
    }

    #[test]
    fn create_same_second_same_name_overwrites() {
        let f = Fixture::new();
        let dir = f.root.join("snapshots");

        let disk = f.disk(b"first");
        let a = create_at(&disk, &dir, "save", &noon()).unwrap();
        std::fs::write(&disk, b"second").unwrap();
        let b = create_at(&disk, &dir, "save", &noon()).unwrap();

        assert_eq!(a, b);
        assert_eq!(std::fs::read(&b).unwrap(), b"second");
        assert_eq!(list(&dir).unwrap().len(), 1);
    }

    #[test]
    fn create_requires_source() {
        let f = Fixture::new();
        let missing = f.root.join("win95.img");
        let dir = f.root.join("snapshots_win95");

        assert!(matches!(
            create(&missing, &dir, "x"),
            Err(Error::SourceMissing { .. })
        ));
        assert!(!dir.exists());
    }

    #[test]
    fn list_parses_names_and_sorts() {
        let f = Fixture::new();
        let dir = f.root.join("snapshots");
        std::fs::create_dir_all(&dir).unwrap();
        for name in [
            "20240301_080000_later.img",
            "notes.txt",
            "imported.img",
            "20231231_235959_earlier_one.img",
        ] {
            std::fs::write(dir.join(name), b"").unwrap();
        }
        std::fs::create_dir(dir.join("folder.img")).unwrap();

        let mut snaps = list(&dir).unwrap();
        assert_eq!(snaps.len(), 3);

        sort_chronologically(&mut snaps);
        let labels: Vec<_> = snaps.iter().map(|s| s.label.as_str()).collect();
        assert_eq!(labels, ["earlier_one", "later", "imported"]);
        assert_eq!(
            snaps[0].timestamp,
            NaiveDateTime::parse_from_str("20231231_235959", TIMESTAMP_FORMAT)
                .ok()
        );
        assert_eq!(snaps[2].timestamp, None);
    }

    #[test]
    fn list_missing_directory_is_empty() {
        let f = Fixture::new();
        assert!(list(&f.root.join("nope")).unwrap().is_empty());
    }

    #[test]
    fn resolve_accepts_names_and_paths() {
        let f = Fixture::new();
        let snap = f.snapshot(b"s");
        let dir = snap.parent().unwrap();

        assert_eq!(resolve(dir, "20240101_120000_clean").unwrap(), snap);
        assert_eq!(resolve(dir, "20240101_120000_clean.img").unwrap(), snap);
        assert_eq!(resolve(dir, snap.as_str()).unwrap(), snap);
        assert!(matches!(
            resolve(dir, "missing"),
            Err(Error::SourceMissing { .. })
        ));
    }

    #[test]
    fn restore_replaces_image_and_removes_backup() {
        let f = Fixture::new();
        let disk = f.disk(b"current");
        let snap = f.snapshot(b"snapshot");

        restore(&disk, &snap).unwrap();
        assert_eq!(std::fs::read(&disk).unwrap(), b"snapshot");
        assert!(!backup_path(&disk).exists());
        assert_eq!(std::fs::read(&snap).unwrap(), b"snapshot");
    }

    #[test]
    fn restore_without_existing_image() {
        let f = Fixture::new();
        let disk = f.root.join("win98.img");
        let snap = f.snapshot(b"snapshot");

        restore(&disk, &snap).unwrap();
        assert_eq!(std::fs::read(&disk).unwrap(), b"snapshot");
    }

    #[test]
    fn interrupted_restore_rolls_back_from_backup() {
        let f = Fixture::new();
        let disk = f.disk(b"precious");
        let snap = f.snapshot(b"snapshot");

        let result = restore_with(&disk, &snap, |src, dst| {
            if src == snap.as_path() {
                // The copy dies part way through and takes the target with it.
                std::fs::write(dst, b"sna")?;
                std::fs::remove_file(dst)?;
                Err(std::io::Error::new(
                    std::io::ErrorKind::PermissionDenied,
                    "destination became unwritable",
                ))
            } else {
                copy_preserving(src, dst)
            }
        });

        match result {
            Err(Error::RestoreFailed { backup, source, .. }) => {
                assert_eq!(backup, None);
                assert_eq!(
                    source.kind(),
                    std::io::ErrorKind::PermissionDenied
                );
            }
            other => panic!("expected restore failure: {other:?}"),
        }

        assert_eq!(std::fs::read(&disk).unwrap(), b"precious");
        assert!(!backup_path(&disk).exists());
    }

    #[test]
    fn failed_restore_with_image_present_keeps_backup() {
        let f = Fixture::new();
        let disk = f.disk(b"precious");
        let snap = f.snapshot(b"snapshot");

        let result = restore_with(&disk, &snap, |src, dst| {
            if src == snap.as_path() {
                std::fs::write(dst, b"sna")?;
                Err(std::io::Error::new(std::io::ErrorKind::Other, "disk full"))
            } else {
                copy_preserving(src, dst)
            }
        });

        let bak = backup_path(&disk);
        match result {
            Err(Error::RestoreFailed { backup, .. }) => {
                assert_eq!(backup.as_ref(), Some(&bak))
            }
            other => panic!("expected restore failure: {other:?}"),
        }

        assert_eq!(std::fs::read(&bak).unwrap(), b"precious");
    }

    #[test]
    fn restore_aborts_when_backup_cannot_be_made() {
        let f = Fixture::new();
        let disk = f.disk(b"precious");
        let snap = f.snapshot(b"snapshot");

        // A directory in the backup's place makes the backup copy fail.
        std::fs::create_dir(backup_path(&disk)).unwrap();

        assert!(matches!(
            restore(&disk, &snap),
            Err(Error::RestoreFailed { backup: None, .. })
        ));
        assert_eq!(std::fs::read(&disk).unwrap(), b"precious");
    }

    #[test]
    fn failed_restore_without_prior_image() {
        let f = Fixture::new();
        let disk = f.root.join("win95.img");
        let snap = f.snapshot(b"snapshot");

        let result = restore_with(&disk, &snap, |_, _| {
            Err(std::io::Error::new(std::io::ErrorKind::Other, "nope"))
        });

        assert!(matches!(
            result,
            Err(Error::RestoreFailed { backup: None, .. })
        ));
        assert!(!disk.exists());
        assert!(!backup_path(&disk).exists());
    }

    #[test]
    fn restore_rejects_disk_image_as_snapshot() {
        let f = Fixture::new();
        let disk = f.disk(b"only copy of my disk");

        // Reached through `resolve`, which accepts any existing path.
        let snap = resolve(&f.root.join("snapshots"), disk.as_str()).unwrap();
        assert!(matches!(
            restore(&disk, &snap),
            Err(Error::SnapshotIsTarget { .. })
        ));

        let aliased = f.root.join(".").join("win98.img");
        assert!(matches!(
            restore(&disk, &aliased),
            Err(Error::SnapshotIsTarget { .. })
        ));

        assert_eq!(std::fs::read(&disk).unwrap(), b"only copy of my disk");
        assert!(!backup_path(&disk).exists());
    }

    #[test]
    fn restore_rejects_backup_as_snapshot() {
        let f = Fixture::new();
        let disk = f.disk(b"current");
        let backup = backup_path(&disk);
        std::fs::write(&backup, b"older").unwrap();

        assert!(matches!(
            restore(&disk, &backup),
            Err(Error::SnapshotIsTarget { .. })
        ));
        assert_eq!(std::fs::read(&disk).unwrap(), b"current");
        assert_eq!(std::fs::read(&backup).unwrap(), b"older");
    }

    #[test]
    fn restore_requires_snapshot() {
        let f = Fixture::new();
        let disk = f.disk(b"precious");

        assert!(matches!(
            restore(&disk, &f.root.join("snapshots/none.img")),
            Err(Error::SourceMissing { .. })
        ));
        assert!(!backup_path(&disk).exists());
    }
}
