//! Cross-process queue tests.
//!
//! Uses `fork()` so producer and consumer are distinct OS processes sharing
//! the queue only through `/dev/shm`:
//! - Frames sent by a child arrive whole and in order in the parent
//! - `signal_end` in the parent wakes a child blocked in `receive`

use fams_common::frame::outside::OutsideBatch;
use fams_common::frame::{DecodedFrame, decode};
use fams_shared_memory::{Received, SharedQueue};
use std::time::Duration;

fn child_exit(code: i32) -> ! {
    unsafe { libc::_exit(code) }
}

fn wait_child(pid: libc::pid_t) -> i32 {
    let mut status: libc::c_int = 0;
    unsafe {
        libc::waitpid(pid, &mut status, 0);
    }
    assert!(libc::WIFEXITED(status), "child did not exit normally");
    libc::WEXITSTATUS(status)
}

fn batch(i: usize) -> OutsideBatch {
    OutsideBatch {
        accumulated_time: vec![format!("2024-05-01 10:00:{:02}", i % 60)],
        room_temp: vec![i as f64],
        humidity: vec![50.0],
        atmospheric_pressure: vec![1013.0],
    }
}

/// Test: child process produces frames, parent consumes them.
#[test]
fn cross_process_frames_arrive_in_order() {
    const FRAMES: usize = 200;
    let name = format!("xproc_frames_{}", std::process::id());
    // Small ring so the child hits backpressure.
    let queue = SharedQueue::create(&name, 1024).expect("parent: create queue");

    // Safety: fork() is unsafe but this is a controlled test environment.
    let pid = unsafe { libc::fork() };

    if pid == 0 {
        // ── CHILD PROCESS (producer) ──
        let producer = match SharedQueue::open(&name) {
            Ok(q) => q,
            Err(_) => child_exit(2),
        };
        for i in 0..FRAMES {
            let bytes = match batch(i).encode() {
                Ok(b) => b,
                Err(_) => child_exit(3),
            };
            if producer.send(&bytes).is_err() {
                child_exit(4);
            }
        }
        child_exit(0);
    }

    // ── PARENT PROCESS (consumer) ──
    assert!(pid > 0, "fork failed");

    for i in 0..FRAMES {
        let bytes = match queue.receive_timeout(Duration::from_secs(10)).expect("receive") {
            Some(Received::Message(bytes)) => bytes,
            other => panic!("frame {i}: unexpected {other:?}"),
        };
        match decode(&bytes).expect("decode") {
            DecodedFrame::Outside(frame) => {
                assert_eq!(frame.room_temp().next(), Some(i as f64));
            }
            other => panic!("unexpected category {:?}", other.category()),
        }
    }

    assert_eq!(wait_child(pid), 0);
    assert_eq!(queue.message_count(), 0);
}

/// Test: end-of-stream crosses the process boundary.
#[test]
fn cross_process_signal_end_wakes_child() {
    let name = format!("xproc_end_{}", std::process::id());
    let queue = SharedQueue::create(&name, 4096).expect("parent: create queue");

    let pid = unsafe { libc::fork() };

    if pid == 0 {
        // ── CHILD PROCESS (blocked consumer) ──
        let consumer = match SharedQueue::open(&name) {
            Ok(q) => q,
            Err(_) => child_exit(2),
        };
        match consumer.receive() {
            Ok(Received::EndOfStream) => child_exit(0),
            Ok(Received::Message(_)) => child_exit(3),
            Err(_) => child_exit(4),
        }
    }

    assert!(pid > 0, "fork failed");
    std::thread::sleep(Duration::from_millis(200));
    queue.signal_end().expect("signal_end");

    assert_eq!(wait_child(pid), 0);
    queue.release().expect("release");
}
