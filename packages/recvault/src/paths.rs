//! Candidate storage locations for the recording directory.
//!
//! Probing is read-only: nothing here creates directories. The caller picks
//! one of the returned paths and hands it to [`crate::server::Server::activate`].

use std::path::{Path, PathBuf};

/// SD-card style mount points, most common first.
pub const SD_CARD_PREFIXES: &[&str] = &[
    "/storage/sdcard1",
    "/mnt/extSdCard",
    "/storage/extSdCard",
    "/mnt/sdcard2",
    "/storage/external_SD",
    "/mnt/external_sd",
    "/storage/removable/sdcard1",
];

/// USB mass-storage mount points, checked after every SD-card prefix.
pub const USB_PREFIXES: &[&str] = &[
    "/storage/usbdisk",
    "/storage/usbotg",
    "/storage/usb-storage",
    "/mnt/usb_storage",
    "/mnt/usb",
    "/storage/UsbDriveA",
    "/storage/UsbDriveB",
    "/mnt/media_rw/usbdisk",
    "/removable/usbdisk1",
    "/storage/external_storage/sdcard2",
    "/storage/external_storage/usb",
    "/mnt/sdcard/usbStorage",
    "/mnt/sdcard/external_sd",
];

pub fn list_candidate_paths(app_dirs: &[PathBuf], app_subpath: &Path) -> Vec<PathBuf> {
    let prefixes = SD_CARD_PREFIXES
        .iter()
        .chain(USB_PREFIXES.iter())
        .map(PathBuf::from);
    candidates_from(app_dirs, prefixes, app_subpath)
}

pub fn candidates_from(
    app_dirs: &[PathBuf],
    prefixes: impl IntoIterator<Item = PathBuf>,
    app_subpath: &Path,
) -> Vec<PathBuf> {
    let mut out: Vec<PathBuf> = app_dirs
        .iter()
        .filter(|dir| is_writable_dir(dir))
        .cloned()
        .collect();
    // Only the prefix has to be writable; the app-scoped subpath is created on activation.
    out.extend(
        prefixes
            .into_iter()
            .filter(|prefix| is_writable_dir(prefix))
            .map(|prefix| prefix.join(app_subpath)),
    );
    out
}

/// The default pick: the last candidate, i.e. the most external volume found.
pub fn preferred_candidate(candidates: &[PathBuf]) -> Option<&Path> {
    candidates.last().map(PathBuf::as_path)
}

/// Asks the kernel (`access(W_OK)`) rather than reading mode bits, so owner,
/// group and read-only mounts are all accounted for.
fn is_writable_dir(path: &Path) -> bool {
    path.is_dir() && rustix::fs::access(path, rustix::fs::Access::WRITE_OK).is_ok()
}
