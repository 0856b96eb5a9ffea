//! Batch documents accepted by the publisher.

use crate::error::{ReceptionError, ReceptionResult};
use fams_common::consts::{CODE_SLOT_LEN, TIME_SLOT_LEN};
use fams_common::frame::Category;
use fams_common::frame::cistern::CisternBatch;
use fams_common::frame::nitrification::NitrificationBatch;
use fams_common::frame::outside::OutsideBatch;
use fams_common::frame::sensor::SensorBatch;
use fams_common::frame::water_replace::WaterReplaceBatch;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// One batch of one category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "category", content = "batch", rename_all = "snake_case")]
pub enum BatchRequest {
    /// Per-port cistern sensor readings.
    Sensor(SensorBatch),
    /// Full cistern readings.
    Cistern(CisternBatch),
    /// Nitrification tank readings.
    Nitrification(NitrificationBatch),
    /// Outdoor readings.
    Outside(OutsideBatch),
    /// Water-replacement tank readings.
    WaterReplace(WaterReplaceBatch),
}

impl BatchRequest {
    /// Parse one JSON document.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Category of the batch.
    pub fn category(&self) -> Category {
        match self {
            Self::Sensor(_) => Category::Sensor,
            Self::Cistern(_) => Category::Cistern,
            Self::Nitrification(_) => Category::Nitrification,
            Self::Outside(_) => Category::Outside,
            Self::WaterReplace(_) => Category::WaterReplace,
        }
    }

    /// Length of every parallel array, in section order.
    pub fn section_lengths(&self) -> Vec<usize> {
        match self {
            Self::Sensor(b) => vec![
                b.accumulated_time.len(),
                b.cistern_code.len(),
                b.port_type.len(),
                b.value.len(),
            ],
            Self::Cistern(b) => vec![
                b.accumulated_time.len(),
                b.cistern_code.len(),
                b.inflow_temp.len(),
                b.outflow_temp.len(),
                b.upper_illuminance.len(),
                b.lower_illuminance.len(),
                b.conductivity.len(),
                b.ph.len(),
            ],
            Self::Nitrification(b) => vec![b.accumulated_time.len(), b.water_temp.len()],
            Self::Outside(b) => vec![
                b.accumulated_time.len(),
                b.room_temp.len(),
                b.humidity.len(),
                b.atmospheric_pressure.len(),
            ],
            Self::WaterReplace(b) => vec![
                b.accumulated_time.len(),
                b.water_level.len(),
                b.water_temp.len(),
            ],
        }
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.section_lengths().first().copied().unwrap_or(0)
    }

    /// Whether the batch holds no sample.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reject empty batches and unequal parallel arrays.
    ///
    /// Text longer than its slot is accepted and truncated by the encoder; a
    /// warning is logged.
    ///
    /// # Errors
    ///
    /// Returns [`ReceptionError::InvalidBatch`] describing the problem.
    pub fn validate(&self) -> ReceptionResult<()> {
        let lengths = self.section_lengths();
        let invalid = |reason: String| ReceptionError::InvalidBatch {
            category: self.category(),
            reason,
        };
        if self.is_empty() {
            return Err(invalid("no samples".to_string()));
        }
        if lengths.iter().any(|n| *n != lengths[0]) {
            return Err(invalid(format!("section lengths differ: {lengths:?}")));
        }

        let times: &[String] = match self {
            Self::Sensor(b) => b.accumulated_time.as_slice(),
            Self::Cistern(b) => b.accumulated_time.as_slice(),
            Self::Nitrification(b) => b.accumulated_time.as_slice(),
            Self::Outside(b) => b.accumulated_time.as_slice(),
            Self::WaterReplace(b) => b.accumulated_time.as_slice(),
        };
        let codes: &[String] = match self {
            Self::Sensor(b) => b.cistern_code.as_slice(),
            Self::Cistern(b) => b.cistern_code.as_slice(),
            _ => &[],
        };
        if let Some(long) = times.iter().find(|t| t.len() >= TIME_SLOT_LEN) {
            warn!(category = %self.category(), time = %long, "timestamp will be truncated");
        }
        if let Some(long) = codes.iter().find(|c| c.len() >= CODE_SLOT_LEN) {
            warn!(category = %self.category(), code = %long, "cistern code will be truncated");
        }
        Ok(())
    }

    /// Encode as a frame.
    ///
    /// # Errors
    ///
    /// Returns the encoder's [`fams_common::frame::FrameError`].
    pub fn to_frame(&self) -> ReceptionResult<Vec<u8>> {
        let bytes = match self {
            Self::Sensor(b) => b.encode()?,
            Self::Cistern(b) => b.encode()?,
            Self::Nitrification(b) => b.encode()?,
            Self::Outside(b) => b.encode()?,
            Self::WaterReplace(b) => b.encode()?,
        };
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fams_common::frame::{DecodedFrame, decode};

    #[test]
    fn test_parse_tagged_document() {
        let request = BatchRequest::from_json(
            r#"{"category":"water_replace","batch":{"accumulated_time":["2024-05-01 10:00:00"],"water_level":[120.5],"water_temp":[19.0]}}"#,
        )
        .unwrap();
        assert_eq!(request.category(), Category::WaterReplace);
        assert_eq!(request.len(), 1);
        request.validate().unwrap();

        let bytes = request.to_frame().unwrap();
        match decode(&bytes).unwrap() {
            DecodedFrame::WaterReplace(frame) => {
                assert_eq!(frame.water_level().collect::<Vec<_>>(), vec![120.5]);
            }
            other => panic!("unexpected {:?}", other.category()),
        }
    }

    #[test]
    fn test_unknown_category_rejected() {
        let err = BatchRequest::from_json(r#"{"category":"pond","batch":{}}"#).unwrap_err();
        assert!(err.to_string().contains("pond"));
    }

    #[test]
    fn test_uneven_batch_rejected() {
        let request = BatchRequest::Sensor(SensorBatch {
            accumulated_time: vec!["2024-05-01 10:00:00".into(); 2],
            cistern_code: vec!["C01".into(); 2],
            port_type: vec![1],
            value: vec![18.0, 18.5],
        });
        let err = request.validate().unwrap_err();
        assert!(matches!(
            err,
            ReceptionError::InvalidBatch { category: Category::Sensor, .. }
        ));
        assert!(err.to_string().contains("[2, 2, 1, 2]"));
    }

    #[test]
    fn test_empty_batch_rejected() {
        let request = BatchRequest::Outside(OutsideBatch::default());
        assert!(request.is_empty());
        assert!(request.validate().is_err());
    }
}
