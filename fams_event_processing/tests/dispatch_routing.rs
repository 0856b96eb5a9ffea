//! Dispatcher routing over real shared queues

use fams_common::config::QueueSettings;
use fams_common::frame::outside::OutsideBatch;
use fams_common::frame::sensor::SensorBatch;
use fams_common::frame::Category;
use fams_event_processing::QueueSet;
use fams_event_processing::dispatcher::{Dispatcher, Route};
use fams_shared_memory::{Received, SharedQueue};
use std::thread;
use std::time::Duration;

fn queue_settings(tag: &str, capacity: usize) -> QueueSettings {
    let mut settings = QueueSettings::default().with_prefix(&format!("route_{}_{}_", tag, std::process::id()));
    for spec in [
        &mut settings.ingress,
        &mut settings.sensor,
        &mut settings.cistern,
        &mut settings.nitrification,
        &mut settings.outside,
        &mut settings.water_replace,
    ] {
        spec.capacity_bytes = capacity;
    }
    settings
}

fn sensor_frame(value: f64) -> Vec<u8> {
    SensorBatch {
        accumulated_time: vec!["2024-05-01 10:00:00".into()],
        cistern_code: vec!["C01".into()],
        port_type: vec![6],
        value: vec![value],
    }
    .encode()
    .unwrap()
}

fn outside_frame() -> Vec<u8> {
    OutsideBatch {
        accumulated_time: vec!["2024-05-01 10:00:00".into()],
        room_temp: vec![21.0],
        humidity: vec![50.0],
        atmospheric_pressure: vec![1012.0],
    }
    .encode()
    .unwrap()
}

#[test]
fn test_routes_by_tag_and_drops_unknown() {
    let queues = QueueSet::create_all(&queue_settings("mixed", 4096)).unwrap();
    let mut dispatcher = Dispatcher::new(&queues);

    let first = sensor_frame(7.1);
    let second = sensor_frame(7.2);
    let unknown = vec![0xEE, 1, 0, 0, 1, 2, 3];
    assert_eq!(dispatcher.dispatch(&first), Route::Forwarded(Category::Sensor));
    assert_eq!(dispatcher.dispatch(&outside_frame()), Route::Forwarded(Category::Outside));
    assert_eq!(dispatcher.dispatch(&second), Route::Forwarded(Category::Sensor));
    assert_eq!(dispatcher.dispatch(&unknown), Route::Dropped);
    assert_eq!(dispatcher.dispatch(&[]), Route::Dropped);

    let stats = dispatcher.stats();
    assert_eq!(stats.received, 5);
    assert_eq!(stats.routed_to(Category::Sensor), 2);
    assert_eq!(stats.routed_to(Category::Outside), 1);
    assert_eq!(stats.dropped, 2);

    let sensor = queues.egress(Category::Sensor);
    assert_eq!(sensor.message_count(), 2);
    // Bytes are forwarded untouched and in order.
    assert_eq!(sensor.receive().unwrap(), Received::Message(first));
    assert_eq!(sensor.receive().unwrap(), Received::Message(second));
    assert_eq!(queues.egress(Category::Outside).message_count(), 1);
    for category in [Category::Cistern, Category::Nitrification, Category::WaterReplace] {
        assert_eq!(queues.egress(category).message_count(), 0);
    }
}

#[test]
fn test_forward_error_does_not_stop_dispatch() {
    let queues = QueueSet::create_all(&queue_settings("ended", 4096)).unwrap();
    queues.egress(Category::Outside).signal_end().unwrap();
    let mut dispatcher = Dispatcher::new(&queues);

    assert_eq!(dispatcher.dispatch(&outside_frame()), Route::Failed(Category::Outside));
    assert_eq!(dispatcher.dispatch(&sensor_frame(7.0)), Route::Forwarded(Category::Sensor));
    assert_eq!(dispatcher.stats().forward_errors, 1);
}

#[test]
fn test_run_stops_at_end_of_stream() {
    let settings = queue_settings("run", 4096);
    let queues = QueueSet::create_all(&settings).unwrap();

    let stats = thread::scope(|scope| {
        let worker = scope.spawn(|| Dispatcher::new(&queues).run());

        let producer = SharedQueue::open(&settings.ingress.name).unwrap();
        for i in 0..10 {
            producer.send(&sensor_frame(f64::from(i))).unwrap();
        }
        producer.send(&outside_frame()).unwrap();

        // Wait until the dispatcher drained the ingress queue.
        let sensor = queues.egress(Category::Sensor);
        for _ in 0..200 {
            if sensor.message_count() == 10 && queues.ingress().message_count() == 0 {
                break;
            }
            thread::sleep(Duration::from_millis(10));
        }
        queues.ingress().signal_end().unwrap();
        worker.join().unwrap()
    });

    assert_eq!(stats.received, 11);
    assert_eq!(stats.routed_to(Category::Sensor), 10);
    assert_eq!(stats.routed_to(Category::Outside), 1);
}
