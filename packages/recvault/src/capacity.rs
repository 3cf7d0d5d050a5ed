//! Free-space check and oldest-first eviction for the recording directory.

use std::{
    io,
    path::{Path, PathBuf},
    time::{SystemTime, UNIX_EPOCH},
};

use tracing::{debug, info, warn};

use crate::store;

const MIB: u64 = 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VolumeSpace {
    pub total: u64,
    pub usable: u64,
}

/// Reports total and usable bytes for the volume holding a directory.
pub trait SpaceProbe: Send + Sync {
    fn space(&self, dir: &Path) -> io::Result<VolumeSpace>;
}

/// Asks the filesystem holding the directory itself (`statvfs`), so tmpfs
/// and network mounts report their own numbers.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemSpace;

impl SpaceProbe for SystemSpace {
    fn space(&self, dir: &Path) -> io::Result<VolumeSpace> {
        let stat = rustix::fs::statvfs(dir)?;
        Ok(VolumeSpace {
            total: stat.f_blocks.saturating_mul(stat.f_frsize),
            usable: stat.f_bavail.saturating_mul(stat.f_frsize),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReclaimReport {
    pub target: u64,
    pub freed: u64,
    pub deleted: Vec<String>,
}

/// Bytes to reclaim, or `None` while at least a fifth of the volume is free.
pub fn reclaim_target(space: VolumeSpace) -> Option<u64> {
    if space.total == 0 || space.usable.saturating_mul(5) > space.total {
        return None;
    }
    Some(space.total / 5)
}

pub fn reclaim_if_needed(dir: &Path, probe: &dyn SpaceProbe) -> Option<ReclaimReport> {
    let space = match probe.space(dir) {
        Ok(space) => space,
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "cannot read volume space, skipping cleanup");
            return None;
        }
    };
    debug!(
        total_mb = space.total / MIB,
        usable_mb = space.usable / MIB,
        "storage stats"
    );
    let target = reclaim_target(space)?;
    Some(evict_oldest(dir, target))
}

/// Deletes regular files oldest-first until more than `target` bytes are
/// freed. The file that crosses the target is deleted too.
pub fn evict_oldest(dir: &Path, target: u64) -> ReclaimReport {
    evict(regular_files(dir), target)
}

/// A failed delete frees nothing and does not stop the sweep.
fn evict(mut files: Vec<Candidate>, target: u64) -> ReclaimReport {
    let mut report = ReclaimReport {
        target,
        ..ReclaimReport::default()
    };
    files.sort_by(|a, b| a.modified.cmp(&b.modified).then_with(|| a.name.cmp(&b.name)));

    info!(target_mb = target / MIB, candidates = files.len(), "deleting old files");
    for file in files {
        if report.freed > target {
            break;
        }
        if store::delete(&file.path) {
            report.freed += file.size;
            info!(name = %file.name, size = file.size, "deleted old file");
            report.deleted.push(file.name);
        }
    }
    info!(freed_mb = report.freed / MIB, freed = report.freed, "cleanup finished");
    report
}

struct Candidate {
    name: String,
    path: PathBuf,
    size: u64,
    modified: SystemTime,
}

fn regular_files(dir: &Path) -> Vec<Candidate> {
    let entries = match std::fs::read_dir(dir) {
        Ok(e) => e,
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "cannot list directory for cleanup");
            return Vec::new();
        }
    };
    entries
        .filter_map(Result::ok)
        .filter_map(|entry| {
            let meta = entry.metadata().ok()?;
            meta.is_file().then(|| Candidate {
                name: entry.file_name().to_string_lossy().into_owned(),
                path: entry.path(),
                size: meta.len(),
                modified: meta.modified().unwrap_or(UNIX_EPOCH),
            })
        })
        .collect()
}
