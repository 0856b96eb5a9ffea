//! Cross-process blocking message queue.
//!
//! A [`SharedQueue`] is a bounded ring of length-prefixed records inside a
//! shared memory segment. Senders block while the ring is full, receivers
//! block while it is empty, and [`SharedQueue::signal_end`] wakes everybody
//! in every attached process.

use crate::error::{QueueError, QueueResult};
use crate::platform::{
    MemoryConfig, attach_segment_mmap, create_segment_mmap, get_current_pid, is_process_alive,
    remove_segment, segment_len, segment_path,
};
use crate::segment::{QueueHeader, QueueState, RECORD_PREFIX_LEN, header_len, validate_capacity};
use memmap2::MmapMut;
use nix::sys::time::TimeSpec;
use nix::time::{ClockId, clock_gettime};
use std::cell::UnsafeCell;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::ptr::NonNull;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Result of a receive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Received {
    /// One complete message.
    Message(Vec<u8>),
    /// End-of-stream was signaled on the queue.
    EndOfStream,
}

/// Named, capacity-bounded, cross-process FIFO.
///
/// The creating handle owns the segment and unlinks it on [`release`] or
/// drop. Handles from [`open`] only attach.
///
/// [`release`]: SharedQueue::release
/// [`open`]: SharedQueue::open
pub struct SharedQueue {
    name: String,
    path: PathBuf,
    header: NonNull<QueueHeader>,
    ring: NonNull<u8>,
    capacity: usize,
    owner: bool,
    released: AtomicBool,
    _mmap: MmapMut,
}

// All access to the mapping goes through the process-shared mutex or atomics.
unsafe impl Send for SharedQueue {}
unsafe impl Sync for SharedQueue {}

fn validate_name(name: &str) -> QueueResult<()> {
    if name.is_empty() || name.contains('/') || name.len() > 200 {
        return Err(QueueError::InvalidName {
            name: name.to_string(),
        });
    }
    Ok(())
}

impl SharedQueue {
    /// Create a queue with a ring of `capacity` bytes.
    ///
    /// A leftover segment of the same name whose creator is dead is removed
    /// first.
    ///
    /// # Errors
    ///
    /// - [`QueueError::InvalidName`] / [`QueueError::InvalidCapacity`]
    /// - [`QueueError::AlreadyExists`] if a live process owns the name
    /// - [`QueueError::Io`] / [`QueueError::Sync`] if the OS resource cannot be set up
    pub fn create(name: &str, capacity: usize) -> QueueResult<Self> {
        validate_name(name)?;
        validate_capacity(capacity)?;

        let path = segment_path(name);
        if path.exists() {
            Self::reclaim_stale(name, &path)?;
        }

        let creator_pid = get_current_pid();
        let mut mmap = create_segment_mmap(&path, header_len() + capacity, &MemoryConfig::default())
            .map_err(|e| match e {
                QueueError::Io { source } if source.kind() == ErrorKind::AlreadyExists => {
                    QueueError::AlreadyExists {
                        name: name.to_string(),
                    }
                }
                other => other,
            })?;

        let header = mmap.as_mut_ptr() as *mut QueueHeader;
        if let Err(e) = unsafe { QueueHeader::initialize(header, capacity, creator_pid) } {
            let _ = remove_segment(&path);
            return Err(e);
        }

        info!(queue = %name, capacity, "created shared queue");
        Self::from_mapping(name, path, mmap, capacity, true)
    }

    /// Attach to an existing queue.
    ///
    /// # Errors
    ///
    /// - [`QueueError::NotFound`] if no segment exists
    /// - [`QueueError::InvalidHeader`] if it is not a ready queue segment
    pub fn open(name: &str) -> QueueResult<Self> {
        validate_name(name)?;
        let path = segment_path(name);

        let len = segment_len(&path).map_err(|e| Self::not_found(name, e))? as usize;
        if len < header_len() {
            return Err(QueueError::InvalidHeader {
                name: name.to_string(),
                reason: format!("segment is only {len} bytes"),
            });
        }

        let mut mmap = attach_segment_mmap(&path).map_err(|e| Self::not_found(name, e))?;
        let header = mmap.as_mut_ptr() as *mut QueueHeader;
        let capacity = unsafe { (*header).validate(name, mmap.len())? };

        debug!(queue = %name, capacity, "attached to shared queue");
        Self::from_mapping(name, path, mmap, capacity, false)
    }

    fn not_found(name: &str, e: QueueError) -> QueueError {
        match e {
            QueueError::Io { source } if source.kind() == ErrorKind::NotFound => QueueError::NotFound {
                name: name.to_string(),
            },
            other => other,
        }
    }

    fn from_mapping(
        name: &str,
        path: PathBuf,
        mut mmap: MmapMut,
        capacity: usize,
        owner: bool,
    ) -> QueueResult<Self> {
        let base = NonNull::new(mmap.as_mut_ptr()).ok_or_else(|| QueueError::InvalidHeader {
            name: name.to_string(),
            reason: "null mapping".to_string(),
        })?;
        let ring = unsafe { base.add(header_len()) };
        Ok(Self {
            name: name.to_string(),
            path,
            header: base.cast::<QueueHeader>(),
            ring,
            capacity,
            owner,
            released: AtomicBool::new(false),
            _mmap: mmap,
        })
    }

    fn reclaim_stale(name: &str, path: &Path) -> QueueResult<()> {
        let len = segment_len(path)? as usize;
        if len >= header_len() {
            let mmap = attach_segment_mmap(path)?;
            let header = unsafe { &*(mmap.as_ptr() as *const QueueHeader) };
            let pid = header.creator_pid();
            if header.validate(name, len).is_ok() && is_process_alive(pid) {
                return Err(QueueError::AlreadyExists {
                    name: name.to_string(),
                });
            }
            warn!(queue = %name, creator_pid = pid, "reclaiming stale queue segment");
        } else {
            warn!(queue = %name, len, "removing truncated queue segment");
        }
        remove_segment(path)
    }

    #[inline]
    fn header(&self) -> &QueueHeader {
        unsafe { self.header.as_ref() }
    }

    /// Queue name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Ring capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// True for the handle that created the segment.
    pub fn is_owner(&self) -> bool {
        self.owner
    }

    /// Pid of the creating process.
    pub fn creator_pid(&self) -> u32 {
        self.header().creator_pid()
    }

    /// Messages currently queued.
    pub fn message_count(&self) -> usize {
        self.header().messages.load(Ordering::Acquire) as usize
    }

    /// Ring bytes currently occupied, length prefixes included.
    pub fn used_bytes(&self) -> usize {
        self.header().used.load(Ordering::Acquire) as usize
    }

    /// True once end-of-stream has been signaled.
    pub fn is_ended(&self) -> bool {
        self.header().state().contains(QueueState::ENDED)
    }

    /// Enqueue one message, blocking while the ring is full.
    ///
    /// # Errors
    ///
    /// - [`QueueError::EmptyMessage`] for an empty slice
    /// - [`QueueError::MessageTooLarge`] if the message can never fit
    /// - [`QueueError::Ended`] once end-of-stream was signaled
    pub fn send(&self, message: &[u8]) -> QueueResult<()> {
        if message.is_empty() {
            return Err(QueueError::EmptyMessage);
        }
        let record = RECORD_PREFIX_LEN + message.len();
        if record > self.capacity {
            return Err(QueueError::MessageTooLarge {
                size: message.len(),
                capacity: self.capacity,
            });
        }

        let guard = self.lock()?;
        let header = self.header();
        loop {
            if header.state().contains(QueueState::ENDED) {
                return Err(QueueError::Ended {
                    name: self.name.clone(),
                });
            }
            let used = header.used.load(Ordering::Relaxed) as usize;
            if self.capacity - used >= record {
                break;
            }
            guard.wait(&header.not_full, None)?;
        }

        let head = header.head.load(Ordering::Relaxed) as usize;
        let used = header.used.load(Ordering::Relaxed) as usize;
        let tail = (head + used) % self.capacity;
        let prefix = (message.len() as u32).to_le_bytes();
        unsafe {
            self.ring_write(tail, &prefix);
            self.ring_write((tail + RECORD_PREFIX_LEN) % self.capacity, message);
        }
        header.used.store((used + record) as u64, Ordering::Release);
        header.messages.fetch_add(1, Ordering::AcqRel);

        unsafe { libc::pthread_cond_signal(header.not_empty.get()) };
        Ok(())
    }

    /// Dequeue the next message, blocking while the ring is empty.
    ///
    /// Returns [`Received::EndOfStream`] immediately once end-of-stream was
    /// signaled, even if messages are still queued.
    pub fn receive(&self) -> QueueResult<Received> {
        // Without a deadline the wait never times out.
        Ok(self.receive_until(None)?.unwrap_or(Received::EndOfStream))
    }

    /// Like [`receive`](Self::receive) but gives up after `timeout`, returning `None`.
    pub fn receive_timeout(&self, timeout: Duration) -> QueueResult<Option<Received>> {
        let now = clock_gettime(ClockId::CLOCK_MONOTONIC)?;
        let deadline = now + TimeSpec::from(timeout);
        self.receive_until(Some(deadline))
    }

    fn receive_until(&self, deadline: Option<TimeSpec>) -> QueueResult<Option<Received>> {
        let guard = self.lock()?;
        let header = self.header();
        loop {
            if header.state().contains(QueueState::ENDED) {
                return Ok(Some(Received::EndOfStream));
            }
            if header.messages.load(Ordering::Relaxed) > 0 {
                break;
            }
            if guard.wait(&header.not_empty, deadline.as_ref())? {
                return Ok(None);
            }
        }

        let message = self.pop_locked()?;
        unsafe { libc::pthread_cond_broadcast(header.not_full.get()) };
        Ok(Some(Received::Message(message)))
    }

    fn pop_locked(&self) -> QueueResult<Vec<u8>> {
        let header = self.header();
        let head = header.head.load(Ordering::Relaxed) as usize;
        let used = header.used.load(Ordering::Relaxed) as usize;

        let mut prefix = [0u8; RECORD_PREFIX_LEN];
        unsafe { self.ring_read(head, &mut prefix) };
        let len = u32::from_le_bytes(prefix) as usize;
        let record = RECORD_PREFIX_LEN + len;
        if len == 0 || record > used {
            self.reset_ring_locked();
            return Err(QueueError::InvalidHeader {
                name: self.name.clone(),
                reason: format!("corrupt record of {len} bytes with {used} used"),
            });
        }

        let mut message = vec![0u8; len];
        unsafe { self.ring_read((head + RECORD_PREFIX_LEN) % self.capacity, &mut message) };

        header
            .head
            .store(((head + record) % self.capacity) as u64, Ordering::Relaxed);
        header.used.store((used - record) as u64, Ordering::Release);
        header.messages.fetch_sub(1, Ordering::AcqRel);
        Ok(message)
    }

    fn reset_ring_locked(&self) {
        let header = self.header();
        error!(queue = %self.name, "queue ring inconsistent, discarding queued messages");
        header.head.store(0, Ordering::Relaxed);
        header.used.store(0, Ordering::Release);
        header.messages.store(0, Ordering::Release);
        unsafe { libc::pthread_cond_broadcast(header.not_full.get()) };
    }

    /// Signal end-of-stream. Idempotent.
    ///
    /// Wakes every sender and receiver blocked on this queue in any process.
    pub fn signal_end(&self) -> QueueResult<()> {
        let _guard = self.lock()?;
        let header = self.header();
        let previous = header
            .state
            .fetch_or(QueueState::ENDED.bits(), Ordering::AcqRel);
        unsafe {
            libc::pthread_cond_broadcast(header.not_empty.get());
            libc::pthread_cond_broadcast(header.not_full.get());
        }
        if previous & QueueState::ENDED.bits() == 0 {
            info!(queue = %self.name, pending = self.message_count(), "end of stream signaled");
        }
        Ok(())
    }

    /// Unlink the OS resource. Only the creating handle unlinks; other
    /// handles return `Ok` without effect.
    ///
    /// Processes that still map the segment keep working on their mapping,
    /// but the name becomes free for a new queue.
    pub fn release(&self) -> QueueResult<()> {
        if !self.owner {
            debug!(queue = %self.name, "release ignored on non-owning handle");
            return Ok(());
        }
        if self.released.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        remove_segment(&self.path)?;
        info!(queue = %self.name, "released shared queue");
        Ok(())
    }

    /// # Safety
    ///
    /// Caller holds the queue mutex and `pos < capacity`.
    unsafe fn ring_write(&self, pos: usize, data: &[u8]) {
        let first = data.len().min(self.capacity - pos);
        unsafe {
            std::ptr::copy_nonoverlapping(data.as_ptr(), self.ring.as_ptr().add(pos), first);
            std::ptr::copy_nonoverlapping(
                data.as_ptr().add(first),
                self.ring.as_ptr(),
                data.len() - first,
            );
        }
    }

    /// # Safety
    ///
    /// Caller holds the queue mutex and `pos < capacity`.
    unsafe fn ring_read(&self, pos: usize, out: &mut [u8]) {
        let first = out.len().min(self.capacity - pos);
        unsafe {
            std::ptr::copy_nonoverlapping(self.ring.as_ptr().add(pos), out.as_mut_ptr(), first);
            std::ptr::copy_nonoverlapping(
                self.ring.as_ptr(),
                out.as_mut_ptr().add(first),
                out.len() - first,
            );
        }
    }

    fn lock(&self) -> QueueResult<LockGuard<'_>> {
        let rc = unsafe { libc::pthread_mutex_lock(self.header().mutex.get()) };
        self.after_acquire("pthread_mutex_lock", rc)?;
        Ok(LockGuard { queue: self })
    }

    /// Handle the return code of a call that (re)acquires the mutex.
    fn after_acquire(&self, operation: &'static str, rc: i32) -> QueueResult<()> {
        match rc {
            0 => Ok(()),
            libc::EOWNERDEAD => {
                warn!(queue = %self.name, "previous lock holder died, recovering queue");
                let rc = unsafe { libc::pthread_mutex_consistent(self.header().mutex.get()) };
                if rc != 0 {
                    unsafe { libc::pthread_mutex_unlock(self.header().mutex.get()) };
                    return Err(QueueError::Sync {
                        operation: "pthread_mutex_consistent",
                        code: rc,
                    });
                }
                self.repair_ring_locked();
                Ok(())
            }
            code => Err(QueueError::Sync { operation, code }),
        }
    }

    fn repair_ring_locked(&self) {
        let header = self.header();
        let used = header.used.load(Ordering::Relaxed) as usize;
        let head = header.head.load(Ordering::Relaxed) as usize;
        let messages = header.messages.load(Ordering::Relaxed);
        if used > self.capacity || head >= self.capacity || (messages == 0) != (used == 0) {
            self.reset_ring_locked();
        }
    }
}

impl std::fmt::Debug for SharedQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedQueue")
            .field("name", &self.name)
            .field("capacity", &self.capacity)
            .field("owner", &self.owner)
            .field("messages", &self.message_count())
            .field("ended", &self.is_ended())
            .finish()
    }
}

impl Drop for SharedQueue {
    fn drop(&mut self) {
        if self.owner && !self.released.load(Ordering::Acquire) {
            if let Err(e) = remove_segment(&self.path) {
                warn!(queue = %self.name, "failed to unlink queue segment: {}", e);
            }
        }
    }
}

/// Holds the queue mutex; unlocks on drop.
struct LockGuard<'a> {
    queue: &'a SharedQueue,
}

impl LockGuard<'_> {
    /// Wait on `cond`. Returns `true` if `deadline` passed.
    fn wait(&self, cond: &UnsafeCell<libc::pthread_cond_t>, deadline: Option<&TimeSpec>) -> QueueResult<bool> {
        let mutex = self.queue.header().mutex.get();
        let rc = unsafe {
            match deadline {
                None => libc::pthread_cond_wait(cond.get(), mutex),
                Some(deadline) => {
                    let abstime: &libc::timespec = deadline.as_ref();
                    libc::pthread_cond_timedwait(cond.get(), mutex, abstime)
                }
            }
        };
        match rc {
            libc::ETIMEDOUT => Ok(true),
            rc => self.queue.after_acquire("pthread_cond_wait", rc).map(|_| false),
        }
    }
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        unsafe { libc::pthread_mutex_unlock(self.queue.header().mutex.get()) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unique(name: &str) -> String {
        format!("unit_{}_{}", name, get_current_pid())
    }

    #[test]
    fn test_ring_wraps_messages() {
        let queue = SharedQueue::create(&unique("wrap"), 64).unwrap();
        // 4 + 20 bytes per record; the third send wraps around the ring end.
        for round in 0..10u8 {
            let message = [round; 20];
            queue.send(&message).unwrap();
            queue.send(&message).unwrap();
            assert_eq!(queue.receive().unwrap(), Received::Message(message.to_vec()));
            assert_eq!(queue.receive().unwrap(), Received::Message(message.to_vec()));
        }
        assert_eq!(queue.used_bytes(), 0);
        assert_eq!(queue.message_count(), 0);
    }

    #[test]
    fn test_message_too_large_and_empty() {
        let queue = SharedQueue::create(&unique("too_large"), 64).unwrap();
        assert!(matches!(
            queue.send(&[0u8; 61]),
            Err(QueueError::MessageTooLarge { size: 61, capacity: 64 })
        ));
        assert!(queue.send(&[0u8; 60]).is_ok());
        assert!(matches!(queue.send(&[]), Err(QueueError::EmptyMessage)));
    }

    #[test]
    fn test_receive_timeout_on_empty_queue() {
        let queue = SharedQueue::create(&unique("timeout"), 4096).unwrap();
        let result = queue.receive_timeout(Duration::from_millis(20)).unwrap();
        assert_eq!(result, None);
    }

    #[test]
    fn test_invalid_names() {
        assert!(matches!(
            SharedQueue::create("", 4096),
            Err(QueueError::InvalidName { .. })
        ));
        assert!(matches!(
            SharedQueue::create("a/b", 4096),
            Err(QueueError::InvalidName { .. })
        ));
    }

    #[test]
    fn test_drop_unlinks_owner_segment() {
        let name = unique("drop");
        {
            let _queue = SharedQueue::create(&name, 4096).unwrap();
            assert!(segment_path(&name).exists());
        }
        assert!(!segment_path(&name).exists());
    }
}
