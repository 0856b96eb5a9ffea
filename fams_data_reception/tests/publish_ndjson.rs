//! Publishing NDJSON input to a live queue

use fams_common::frame::{Category, DecodedFrame, decode, peek_category};
use fams_data_reception::{Publisher, ReceptionError};
use fams_shared_memory::{QueueError, Received, SharedQueue};
use std::io::{Cursor, Write};
use tempfile::NamedTempFile;

fn unique(name: &str) -> String {
    format!("reception_{}_{}", name, std::process::id())
}

const OUTSIDE: &str = r#"{"category":"outside","batch":{"accumulated_time":["2024-05-01 10:00:00","2024-05-01 10:00:10"],"room_temp":[21.5,22.0],"humidity":[48.0,47.5],"atmospheric_pressure":[1012.0,1011.8]}}"#;
const SENSOR: &str = r#"{"category":"sensor","batch":{"accumulated_time":["2024-05-01 10:00:00"],"cistern_code":["C01"],"port_type":[6],"value":[7.9]}}"#;
const UNEVEN: &str = r#"{"category":"nitrification","batch":{"accumulated_time":["2024-05-01 10:00:00"],"water_temp":[]}}"#;

#[test]
fn test_publish_lines_skips_bad_documents() {
    let queue = SharedQueue::create(&unique("lines"), 1 << 16).unwrap();
    let mut publisher = Publisher::open(queue.name()).unwrap();

    let input = format!("{OUTSIDE}\n\nnot json\n{UNEVEN}\n{SENSOR}\n");
    let stats = publisher.publish_lines(Cursor::new(input)).unwrap();

    assert_eq!(stats.published, 2);
    assert_eq!(stats.rejected, 2);
    assert_eq!(queue.message_count(), 2);

    let Received::Message(first) = queue.receive().unwrap() else {
        panic!("expected a message");
    };
    match decode(&first).unwrap() {
        DecodedFrame::Outside(frame) => {
            assert_eq!(frame.room_temp().collect::<Vec<_>>(), vec![21.5, 22.0]);
        }
        other => panic!("unexpected {:?}", other.category()),
    }
    let Received::Message(second) = queue.receive().unwrap() else {
        panic!("expected a message");
    };
    assert_eq!(peek_category(&second).unwrap(), Category::Sensor);
    assert_eq!(stats.bytes, (first.len() + second.len()) as u64);
}

#[test]
fn test_publish_from_file() {
    let queue = SharedQueue::create(&unique("file"), 1 << 16).unwrap();
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "{SENSOR}").unwrap();
    writeln!(file, "{SENSOR}").unwrap();

    let mut publisher = Publisher::open(queue.name()).unwrap();
    let reader = std::io::BufReader::new(std::fs::File::open(file.path()).unwrap());
    let stats = publisher.publish_lines(reader).unwrap();
    assert_eq!(stats.published, 2);
    assert_eq!(queue.message_count(), 2);
}

#[test]
fn test_ended_queue_stops_publishing() {
    let queue = SharedQueue::create(&unique("ended"), 1 << 16).unwrap();
    queue.signal_end().unwrap();
    let mut publisher = Publisher::open(queue.name()).unwrap();

    let err = publisher
        .publish_lines(Cursor::new(format!("{SENSOR}\n{SENSOR}\n")))
        .unwrap_err();
    assert!(matches!(err, ReceptionError::Queue(QueueError::Ended { .. })));
    assert_eq!(publisher.stats().published, 0);
}

#[test]
fn test_open_without_daemon() {
    let err = Publisher::open(&unique("absent")).unwrap_err();
    assert!(matches!(err, ReceptionError::Queue(QueueError::NotFound { .. })));
}
