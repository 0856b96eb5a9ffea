//! Backpressure and end-of-stream behaviour

use fams_shared_memory::{QueueError, QueueResult, Received, SharedQueue};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

fn unique(name: &str) -> String {
    format!("flow_{}_{}", name, std::process::id())
}

#[test]
fn test_full_queue_blocks_writer_until_drained() -> QueueResult<()> {
    // 4 records of 4 + 60 bytes fill a 256-byte ring exactly.
    let queue = Arc::new(SharedQueue::create(&unique("backpressure"), 256)?);
    for i in 0..4u8 {
        queue.send(&[i; 60])?;
    }
    assert_eq!(queue.used_bytes(), 256);

    let sent = Arc::new(AtomicUsize::new(0));
    let writer = {
        let queue = Arc::clone(&queue);
        let sent = Arc::clone(&sent);
        std::thread::spawn(move || -> QueueResult<()> {
            queue.send(&[9u8; 60])?;
            sent.store(1, Ordering::SeqCst);
            Ok(())
        })
    };

    std::thread::sleep(Duration::from_millis(100));
    assert_eq!(sent.load(Ordering::SeqCst), 0, "writer must block while full");

    assert_eq!(queue.receive()?, Received::Message(vec![0u8; 60]));
    writer.join().unwrap()?;
    assert_eq!(sent.load(Ordering::SeqCst), 1);

    // Nothing lost, nothing duplicated, order preserved.
    for expected in [1u8, 2, 3, 9] {
        assert_eq!(queue.receive()?, Received::Message(vec![expected; 60]));
    }
    assert_eq!(queue.message_count(), 0);
    Ok(())
}

#[test]
fn test_signal_end_wakes_blocked_receivers() -> QueueResult<()> {
    fams_shared_memory::init_tracing();
    let queue = Arc::new(SharedQueue::create(&unique("wake"), 4096)?);

    let receivers: Vec<_> = (0..3)
        .map(|_| {
            let queue = Arc::clone(&queue);
            std::thread::spawn(move || queue.receive())
        })
        .collect();

    std::thread::sleep(Duration::from_millis(50));
    let signaled = Instant::now();
    queue.signal_end()?;

    for receiver in receivers {
        assert_eq!(receiver.join().unwrap()?, Received::EndOfStream);
    }
    assert!(signaled.elapsed() < Duration::from_secs(2));
    Ok(())
}

#[test]
fn test_end_of_stream_is_sticky_and_idempotent() -> QueueResult<()> {
    let queue = SharedQueue::create(&unique("sticky"), 4096)?;
    queue.send(b"pending")?;

    queue.signal_end()?;
    queue.signal_end()?;
    assert!(queue.is_ended());

    // Pending messages are not delivered after end-of-stream.
    for _ in 0..3 {
        assert_eq!(queue.receive()?, Received::EndOfStream);
    }
    assert_eq!(
        queue.receive_timeout(Duration::from_secs(5))?,
        Some(Received::EndOfStream)
    );
    assert!(matches!(queue.send(b"late"), Err(QueueError::Ended { .. })));
    Ok(())
}

#[test]
fn test_signal_end_unblocks_full_writer() -> QueueResult<()> {
    let queue = Arc::new(SharedQueue::create(&unique("writer_end"), 64)?);
    queue.send(&[1u8; 60])?;

    let writer = {
        let queue = Arc::clone(&queue);
        std::thread::spawn(move || queue.send(&[2u8; 60]))
    };
    std::thread::sleep(Duration::from_millis(50));
    queue.signal_end()?;

    assert!(matches!(
        writer.join().unwrap(),
        Err(QueueError::Ended { .. })
    ));
    Ok(())
}

#[test]
fn test_end_seen_through_other_handle() -> QueueResult<()> {
    let name = unique("other_handle");
    let owner = SharedQueue::create(&name, 4096)?;
    let consumer = Arc::new(SharedQueue::open(&name)?);

    let waiting = {
        let consumer = Arc::clone(&consumer);
        std::thread::spawn(move || consumer.receive())
    };
    std::thread::sleep(Duration::from_millis(50));
    owner.signal_end()?;

    assert_eq!(waiting.join().unwrap()?, Received::EndOfStream);
    assert!(consumer.is_ended());
    Ok(())
}
