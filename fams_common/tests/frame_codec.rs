//! Frame codec properties: round-trip, truncation, typed decoding.

use fams_common::consts::{CODE_SLOT_LEN, TIME_SLOT_LEN};
use fams_common::frame::cistern::{self, CisternBatch, CisternFrame};
use fams_common::frame::nitrification::NitrificationBatch;
use fams_common::frame::outside::OutsideBatch;
use fams_common::frame::sensor::SensorBatch;
use fams_common::frame::water_replace::WaterReplaceBatch;
use fams_common::frame::{Category, DecodedFrame, FrameError, FrameView, decode};
use proptest::prelude::*;

fn ascii_text(max: usize) -> impl Strategy<Value = String> {
    proptest::string::string_regex(&format!("[ -~]{{0,{max}}}")).unwrap()
}

fn finite() -> impl Strategy<Value = f64> {
    -1.0e9f64..1.0e9f64
}

proptest! {
    #[test]
    fn prop_sensor_roundtrip(
        samples in prop::collection::vec(
            (ascii_text(TIME_SLOT_LEN - 1), ascii_text(CODE_SLOT_LEN - 1), any::<i32>(), finite()),
            0..40,
        )
    ) {
        let batch = SensorBatch {
            accumulated_time: samples.iter().map(|s| s.0.clone()).collect(),
            cistern_code: samples.iter().map(|s| s.1.clone()).collect(),
            port_type: samples.iter().map(|s| s.2).collect(),
            value: samples.iter().map(|s| s.3).collect(),
        };
        let bytes = batch.encode().unwrap();
        match decode(&bytes).unwrap() {
            DecodedFrame::Sensor(frame) => {
                prop_assert_eq!(frame.sample_count(), samples.len());
                prop_assert_eq!(frame.to_batch(), batch);
            }
            other => prop_assert!(false, "decoded as {:?}", other.category()),
        }
    }

    #[test]
    fn prop_outside_roundtrip_with_uneven_sections(
        times in prop::collection::vec(ascii_text(TIME_SLOT_LEN - 1), 0..10),
        room in prop::collection::vec(finite(), 0..10),
        humidity in prop::collection::vec(finite(), 0..10),
        pressure in prop::collection::vec(finite(), 0..10),
    ) {
        let batch = OutsideBatch {
            accumulated_time: times,
            room_temp: room,
            humidity,
            atmospheric_pressure: pressure,
        };
        let bytes = batch.encode().unwrap();
        let view = FrameView::parse(&bytes).unwrap();
        prop_assert_eq!(view.count(0), batch.accumulated_time.len());
        prop_assert_eq!(view.count(3), batch.atmospheric_pressure.len());
        match decode(&bytes).unwrap() {
            DecodedFrame::Outside(frame) => prop_assert_eq!(frame.to_batch(), batch),
            other => prop_assert!(false, "decoded as {:?}", other.category()),
        }
    }

    #[test]
    fn prop_text_truncation_law(long in "[A-Za-z0-9]{25,60}", code in "[A-Z0-9]{6,20}") {
        let batch = SensorBatch {
            accumulated_time: vec![long.clone()],
            cistern_code: vec![code.clone()],
            port_type: vec![1],
            value: vec![1.0],
        };
        let bytes = batch.encode().unwrap();
        let decoded = match decode(&bytes).unwrap() {
            DecodedFrame::Sensor(frame) => frame.to_batch(),
            other => return Err(TestCaseError::fail(format!("decoded as {:?}", other.category()))),
        };
        prop_assert_eq!(&decoded.accumulated_time[0], &long[..TIME_SLOT_LEN - 1]);
        prop_assert_eq!(&decoded.cistern_code[0], &code[..CODE_SLOT_LEN - 1]);
    }
}

#[test]
fn test_encoded_length_is_exact() {
    let batch = WaterReplaceBatch {
        accumulated_time: vec!["2024-05-01 10:00:00".into(); 3],
        water_level: vec![120.0, 121.0, 119.5],
        water_temp: vec![17.0, 17.1, 17.2],
    };
    let bytes = batch.encode().unwrap();
    let header = 4 + 3 * 8;
    assert_eq!(bytes.len(), header + 3 * TIME_SLOT_LEN + 3 * 8 + 3 * 8);
}

#[test]
fn test_typed_view_rejects_other_category() {
    let bytes = NitrificationBatch {
        accumulated_time: vec!["t".into()],
        water_temp: vec![20.0],
    }
    .encode()
    .unwrap();
    let view = FrameView::parse(&bytes).unwrap();
    let err = CisternFrame::new(view).unwrap_err();
    assert_eq!(
        err,
        FrameError::CategoryMismatch {
            expected: Category::Cistern,
            found: Category::Nitrification,
        }
    );
}

#[test]
fn test_unknown_tag_is_a_checked_case() {
    let mut bytes = OutsideBatch::default().encode().unwrap();
    bytes[0] = 0xEE;
    assert_eq!(
        decode(&bytes).unwrap_err(),
        FrameError::UnknownCategory { tag: 0xEE }
    );
}

#[test]
fn test_cistern_values_by_section() {
    let batch = CisternBatch {
        accumulated_time: vec!["2024-05-01 10:00:00".into()],
        cistern_code: vec!["C01".into()],
        inflow_temp: vec![20.0],
        outflow_temp: vec![20.5],
        upper_illuminance: vec![300.0],
        lower_illuminance: vec![120.0],
        conductivity: vec![45000.0],
        ph: vec![8.1],
    };
    let bytes = batch.encode().unwrap();
    let frame = CisternFrame::new(FrameView::parse(&bytes).unwrap()).unwrap();
    assert_eq!(frame.sample_count(), 1);
    assert_eq!(frame.values(cistern::PH).next(), Some(8.1));
    assert_eq!(frame.values(cistern::CONDUCTIVITY).next(), Some(45000.0));
    assert_eq!(frame.cistern_code().next(), Some("C01"));
}

#[test]
fn test_batch_json_uses_field_names() {
    let batch: NitrificationBatch = serde_json::from_str(
        r#"{"accumulated_time":["2024-05-01 10:00:00"],"water_temp":[19.5]}"#,
    )
    .unwrap();
    assert_eq!(batch.water_temp, vec![19.5]);

    let json = serde_json::to_value(&batch).unwrap();
    assert_eq!(json["accumulated_time"][0], "2024-05-01 10:00:00");
}
