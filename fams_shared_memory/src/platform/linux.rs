//! Linux-specific shared memory operations

use crate::error::{QueueError, QueueResult};
use memmap2::{MmapMut, MmapOptions};
use nix::unistd::getpid;
use std::fs::OpenOptions;
use std::io::ErrorKind;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

/// Directory backing POSIX shared memory objects.
pub const SHM_DIR: &str = "/dev/shm";

/// Prefix of every queue segment file.
pub const SEGMENT_PREFIX: &str = "fams_";

/// Memory mapping options for new segments
#[derive(Debug, Clone, Copy)]
pub struct MemoryConfig {
    /// Prefault the mapping (MAP_POPULATE)
    pub populate: bool,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self { populate: true }
    }
}

/// Backing file path of a queue segment
pub fn segment_path(name: &str) -> PathBuf {
    Path::new(SHM_DIR).join(format!("{SEGMENT_PREFIX}{name}"))
}

/// Create a new memory-mapped segment; fails if the file already exists
pub fn create_segment_mmap(path: &Path, size: usize, config: &MemoryConfig) -> QueueResult<MmapMut> {
    let file = OpenOptions::new()
        .create_new(true)
        .read(true)
        .write(true)
        .mode(0o600) // Owner read/write only
        .open(path)?;

    file.set_len(size as u64)?;

    let mut mmap_options = MmapOptions::new();
    if config.populate {
        mmap_options.populate();
    }

    let mmap = unsafe { mmap_options.map_mut(&file)? };
    Ok(mmap)
}

/// Attach to an existing segment
pub fn attach_segment_mmap(path: &Path) -> QueueResult<MmapMut> {
    let file = OpenOptions::new().read(true).write(true).open(path)?;
    let mmap = unsafe { MmapOptions::new().map_mut(&file)? };
    Ok(mmap)
}

/// Size of an existing segment file
pub fn segment_len(path: &Path) -> QueueResult<u64> {
    Ok(std::fs::metadata(path)?.len())
}

/// Remove a segment file. Missing files are not an error.
pub fn remove_segment(path: &Path) -> QueueResult<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(QueueError::Io { source: e }),
    }
}

/// Check if process is alive using kill(pid, 0)
pub fn is_process_alive(pid: u32) -> bool {
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    match kill(Pid::from_raw(pid as i32), None) {
        Ok(_) => true,
        Err(nix::Error::ESRCH) => false,
        Err(nix::Error::EPERM) => true, // exists, not ours
        Err(_) => false,
    }
}

/// Get current process ID
pub fn get_current_pid() -> u32 {
    getpid().as_raw() as u32
}
