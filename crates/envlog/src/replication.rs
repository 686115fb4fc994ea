//! Copying datastores to a remote share.
//!
//! The share (SMB/CIFS or NFS) is expected to be mounted by the system; the
//! upload is a plain file copy into `<share>/<path>/`.

use crate::error::ReplicationError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Where replicated datastores go.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicationTarget {
    /// Mount point of the remote share.
    pub share: PathBuf,
    /// Directory below the mount point.
    #[serde(default)]
    pub path: String,
}

impl ReplicationTarget {
    /// Directory that receives the copies.
    pub fn destination_dir(&self) -> PathBuf {
        self.share.join(self.path.trim_start_matches('/'))
    }
}

/// Blob upload capability.
pub trait Replicator {
    /// Uploads `local` as `remote`, a path relative to the replication target.
    fn upload(&self, local: &Path, remote: &str) -> Result<(), ReplicationError>;
}

/// Replicates by copying into a mounted share.
#[derive(Debug, Clone)]
pub struct ShareReplicator {
    target: ReplicationTarget,
}

impl ShareReplicator {
    pub fn new(target: ReplicationTarget) -> Self {
        Self { target }
    }
}

impl Replicator for ShareReplicator {
    fn upload(&self, local: &Path, remote: &str) -> Result<(), ReplicationError> {
        if !local.is_file() {
            return Err(ReplicationError::MissingSource(local.to_path_buf()));
        }

        let destination = self.target.destination_dir().join(remote);
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent).map_err(io_error(parent))?;
        }

        // Stage next to the destination, then rename over it.
        let mut staging = destination.clone().into_os_string();
        staging.push(".part");
        let staging = PathBuf::from(staging);

        fs::copy(local, &staging).map_err(io_error(&staging))?;
        fs::rename(&staging, &destination).map_err(io_error(&destination))?;

        debug!("Copied {} to {}", local.display(), destination.display());
        Ok(())
    }
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> ReplicationError {
    let path = path.to_path_buf();
    move |source| ReplicationError::Io { path, source }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_copies_file() {
        let local_dir = tempfile::tempdir().unwrap();
        let share = tempfile::tempdir().unwrap();
        let local = local_dir.path().join("cpu.sqlite3");
        fs::write(&local, b"first").unwrap();

        let replicator = ShareReplicator::new(ReplicationTarget {
            share: share.path().to_path_buf(),
            path: "/envlog/home".to_string(),
        });
        replicator.upload(&local, "cpu.sqlite3").unwrap();

        let copy = share.path().join("envlog/home/cpu.sqlite3");
        assert_eq!(fs::read(&copy).unwrap(), b"first");
        assert!(!share.path().join("envlog/home/cpu.sqlite3.part").exists());

        // a later run replaces the copy
        fs::write(&local, b"second").unwrap();
        replicator.upload(&local, "cpu.sqlite3").unwrap();
        assert_eq!(fs::read(&copy).unwrap(), b"second");
    }

    #[test]
    fn test_upload_missing_source() {
        let share = tempfile::tempdir().unwrap();
        let replicator = ShareReplicator::new(ReplicationTarget {
            share: share.path().to_path_buf(),
            path: String::new(),
        });
        let err = replicator
            .upload(Path::new("/nonexistent/cpu.sqlite3"), "cpu.sqlite3")
            .unwrap_err();
        assert!(matches!(err, ReplicationError::MissingSource(_)));
    }

    #[test]
    fn test_upload_unwritable_share() {
        let local_dir = tempfile::tempdir().unwrap();
        let local = local_dir.path().join("cpu.sqlite3");
        fs::write(&local, b"data").unwrap();

        // a regular file where the share directory should be
        let blocker = local_dir.path().join("share");
        fs::write(&blocker, b"").unwrap();

        let replicator = ShareReplicator::new(ReplicationTarget {
            share: blocker,
            path: "envlog".to_string(),
        });
        assert!(matches!(
            replicator.upload(&local, "cpu.sqlite3"),
            Err(ReplicationError::Io { .. })
        ));
    }
}
