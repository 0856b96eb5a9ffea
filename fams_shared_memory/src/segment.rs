//! Queue segment header.
//!
//! Every queue segment starts with a [`QueueHeader`] followed by the ring
//! buffer. The header carries a process-shared robust mutex and two
//! condition variables, so any process mapping the segment can block on it.

use crate::error::{QueueError, QueueResult};
use bitflags::bitflags;
use static_assertions::const_assert_eq;
use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::ptr::addr_of_mut;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// Magic bytes identifying a queue segment: `"FAMS_MQ\0"`.
pub const QUEUE_MAGIC: [u8; 8] = *b"FAMS_MQ\0";

/// Header layout version. Bumped on any change to [`QueueHeader`].
pub const QUEUE_LAYOUT_VERSION: u32 = 1;

/// Smallest ring capacity in bytes.
pub const MIN_CAPACITY: usize = 64;

/// Largest ring capacity in bytes (1 GiB).
pub const MAX_CAPACITY: usize = 1 << 30;

/// Length prefix written before every message in the ring.
pub const RECORD_PREFIX_LEN: usize = 4;

bitflags! {
    /// Lifecycle flags of a queue.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct QueueState: u32 {
        /// Header and synchronisation primitives are ready.
        const INITIALIZED = 0x0001;
        /// End-of-stream signaled; receivers drain nothing further.
        const ENDED       = 0x0002;
    }
}

/// Queue segment header, cache-line aligned and shared between processes.
///
/// `head`, `used` and `messages` are only modified while `mutex` is held.
/// They are atomics so that statistics can be read without locking.
#[repr(C, align(64))]
pub struct QueueHeader {
    /// Must equal [`QUEUE_MAGIC`].
    pub magic: [u8; 8],
    /// Must equal [`QUEUE_LAYOUT_VERSION`].
    pub layout_version: u32,
    /// [`QueueState`] bits.
    pub state: AtomicU32,
    /// Pid of the creating process.
    pub creator_pid: AtomicU32,
    _reserved: u32,
    /// Ring capacity in bytes.
    pub capacity: u64,
    /// Read position in the ring.
    pub head: AtomicU64,
    /// Bytes occupied by queued records.
    pub used: AtomicU64,
    /// Number of queued messages.
    pub messages: AtomicU64,
    pub(crate) mutex: UnsafeCell<libc::pthread_mutex_t>,
    pub(crate) not_empty: UnsafeCell<libc::pthread_cond_t>,
    pub(crate) not_full: UnsafeCell<libc::pthread_cond_t>,
}

const_assert_eq!(core::mem::align_of::<QueueHeader>(), 64);
const_assert_eq!(core::mem::size_of::<QueueHeader>() % 64, 0);

/// Byte length of the header, i.e. offset of the ring.
#[inline]
pub const fn header_len() -> usize {
    core::mem::size_of::<QueueHeader>()
}

/// Check a requested ring capacity.
pub fn validate_capacity(capacity: usize) -> QueueResult<()> {
    if !(MIN_CAPACITY..=MAX_CAPACITY).contains(&capacity) {
        return Err(QueueError::InvalidCapacity {
            capacity,
            min: MIN_CAPACITY,
            max: MAX_CAPACITY,
        });
    }
    Ok(())
}

fn check(operation: &'static str, code: i32) -> QueueResult<()> {
    if code == 0 {
        Ok(())
    } else {
        Err(QueueError::Sync { operation, code })
    }
}

impl QueueHeader {
    /// Initialise a header in freshly created, zero-filled shared memory.
    ///
    /// The `INITIALIZED` flag is published last with release ordering.
    ///
    /// # Safety
    ///
    /// `ptr` must point to writable memory of at least [`header_len`] bytes,
    /// aligned to 64, that no other process uses yet.
    pub unsafe fn initialize(ptr: *mut QueueHeader, capacity: usize, creator_pid: u32) -> QueueResult<()> {
        unsafe {
            addr_of_mut!((*ptr).magic).write(QUEUE_MAGIC);
            addr_of_mut!((*ptr).layout_version).write(QUEUE_LAYOUT_VERSION);
            addr_of_mut!((*ptr).state).write(AtomicU32::new(0));
            addr_of_mut!((*ptr).creator_pid).write(AtomicU32::new(creator_pid));
            addr_of_mut!((*ptr)._reserved).write(0);
            addr_of_mut!((*ptr).capacity).write(capacity as u64);
            addr_of_mut!((*ptr).head).write(AtomicU64::new(0));
            addr_of_mut!((*ptr).used).write(AtomicU64::new(0));
            addr_of_mut!((*ptr).messages).write(AtomicU64::new(0));

            let mut mutex_attr = MaybeUninit::<libc::pthread_mutexattr_t>::uninit();
            check("pthread_mutexattr_init", libc::pthread_mutexattr_init(mutex_attr.as_mut_ptr()))?;
            let mutex_result = check(
                "pthread_mutexattr_setpshared",
                libc::pthread_mutexattr_setpshared(mutex_attr.as_mut_ptr(), libc::PTHREAD_PROCESS_SHARED),
            )
            .and_then(|_| {
                check(
                    "pthread_mutexattr_setrobust",
                    libc::pthread_mutexattr_setrobust(mutex_attr.as_mut_ptr(), libc::PTHREAD_MUTEX_ROBUST),
                )
            })
            .and_then(|_| {
                check(
                    "pthread_mutex_init",
                    libc::pthread_mutex_init(UnsafeCell::raw_get(addr_of_mut!((*ptr).mutex)), mutex_attr.as_ptr()),
                )
            });
            libc::pthread_mutexattr_destroy(mutex_attr.as_mut_ptr());
            mutex_result?;

            let mut cond_attr = MaybeUninit::<libc::pthread_condattr_t>::uninit();
            check("pthread_condattr_init", libc::pthread_condattr_init(cond_attr.as_mut_ptr()))?;
            let cond_result = check(
                "pthread_condattr_setpshared",
                libc::pthread_condattr_setpshared(cond_attr.as_mut_ptr(), libc::PTHREAD_PROCESS_SHARED),
            )
            .and_then(|_| {
                check(
                    "pthread_condattr_setclock",
                    libc::pthread_condattr_setclock(cond_attr.as_mut_ptr(), libc::CLOCK_MONOTONIC),
                )
            })
            .and_then(|_| {
                check(
                    "pthread_cond_init",
                    libc::pthread_cond_init(UnsafeCell::raw_get(addr_of_mut!((*ptr).not_empty)), cond_attr.as_ptr()),
                )
            })
            .and_then(|_| {
                check(
                    "pthread_cond_init",
                    libc::pthread_cond_init(UnsafeCell::raw_get(addr_of_mut!((*ptr).not_full)), cond_attr.as_ptr()),
                )
            });
            libc::pthread_condattr_destroy(cond_attr.as_mut_ptr());
            cond_result?;

            (*ptr)
                .state
                .store(QueueState::INITIALIZED.bits(), Ordering::Release);
        }
        Ok(())
    }

    /// Validate magic, version, state and size against the mapping length.
    ///
    /// Returns the ring capacity.
    pub fn validate(&self, name: &str, mapped_len: usize) -> QueueResult<usize> {
        let invalid = |reason: String| QueueError::InvalidHeader {
            name: name.to_string(),
            reason,
        };
        if self.magic != QUEUE_MAGIC {
            return Err(invalid("bad magic".to_string()));
        }
        if self.layout_version != QUEUE_LAYOUT_VERSION {
            return Err(invalid(format!(
                "layout version {} (expected {})",
                self.layout_version, QUEUE_LAYOUT_VERSION
            )));
        }
        if !self.state().contains(QueueState::INITIALIZED) {
            return Err(invalid("not initialized".to_string()));
        }
        let capacity = self.capacity as usize;
        validate_capacity(capacity)?;
        if header_len() + capacity != mapped_len {
            return Err(invalid(format!(
                "mapping is {mapped_len} bytes, header declares {}",
                header_len() + capacity
            )));
        }
        Ok(capacity)
    }

    /// Current state flags.
    #[inline]
    pub fn state(&self) -> QueueState {
        QueueState::from_bits_truncate(self.state.load(Ordering::Acquire))
    }

    /// Pid of the creating process.
    #[inline]
    pub fn creator_pid(&self) -> u32 {
        self.creator_pid.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[repr(C, align(64))]
    struct Backing([u8; 1024]);

    #[test]
    fn test_header_is_cache_line_multiple() {
        assert_eq!(header_len() % 64, 0);
        assert!(header_len() >= 64);
        assert!(header_len() <= 1024);
    }

    #[test]
    fn test_validate_capacity() {
        assert!(validate_capacity(MIN_CAPACITY).is_ok());
        assert!(validate_capacity(MAX_CAPACITY).is_ok());
        assert!(matches!(
            validate_capacity(MIN_CAPACITY - 1),
            Err(QueueError::InvalidCapacity { .. })
        ));
        assert!(validate_capacity(MAX_CAPACITY + 1).is_err());
    }

    #[test]
    fn test_initialize_and_validate() {
        let mut backing = Box::new(Backing([0; 1024]));
        let ptr = backing.0.as_mut_ptr() as *mut QueueHeader;
        unsafe { QueueHeader::initialize(ptr, 4096, 42).unwrap() };

        let header = unsafe { &*ptr };
        assert_eq!(header.state(), QueueState::INITIALIZED);
        assert_eq!(header.creator_pid(), 42);
        assert_eq!(header.validate("t", header_len() + 4096).unwrap(), 4096);
        assert!(matches!(
            header.validate("t", header_len() + 8192),
            Err(QueueError::InvalidHeader { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_uninitialized() {
        let backing = Box::new(Backing([0; 1024]));
        let header = unsafe { &*(backing.0.as_ptr() as *const QueueHeader) };
        assert!(matches!(
            header.validate("t", header_len() + 4096),
            Err(QueueError::InvalidHeader { .. })
        ));
    }
}
