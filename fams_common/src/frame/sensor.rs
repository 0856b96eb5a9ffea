//! Multi-channel port sensor frames.
//!
//! One sample per index: `(accumulated_time[i], cistern_code[i],
//! port_type[i], value[i])`. The port type selects the metric.

use super::layout::{ElementKind, Layout, SectionSpec};
use super::{Category, Elements, FrameError, FrameView, SectionData, encode};
use crate::consts::{CODE_SLOT_LEN, TIME_SLOT_LEN};
use serde::{Deserialize, Serialize};

/// Section index of `accumulated_time`.
pub const ACCUMULATED_TIME: usize = 0;
/// Section index of `cistern_code`.
pub const CISTERN_CODE: usize = 1;
/// Section index of `port_type`.
pub const PORT_TYPE: usize = 2;
/// Section index of `value`.
pub const VALUE: usize = 3;

/// Wire layout.
pub const LAYOUT: Layout = Layout {
    category: Category::Sensor,
    sections: &[
        SectionSpec::new("accumulated_time", ElementKind::Text(TIME_SLOT_LEN)),
        SectionSpec::new("cistern_code", ElementKind::Text(CODE_SLOT_LEN)),
        SectionSpec::new("port_type", ElementKind::I32),
        SectionSpec::new("value", ElementKind::F64),
    ],
};

/// Owned sensor batch, as produced by reception.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorBatch {
    /// Sample timestamps.
    pub accumulated_time: Vec<String>,
    /// Cistern code per sample.
    pub cistern_code: Vec<String>,
    /// Port type per sample.
    pub port_type: Vec<i32>,
    /// Measured value per sample.
    pub value: Vec<f64>,
}

impl SensorBatch {
    /// Encode as a frame.
    pub fn encode(&self) -> Result<Vec<u8>, FrameError> {
        encode(
            Category::Sensor,
            &[
                SectionData::Text(&self.accumulated_time),
                SectionData::Text(&self.cistern_code),
                SectionData::I32(&self.port_type),
                SectionData::F64(&self.value),
            ],
        )
    }
}

/// Typed view over a sensor frame.
#[derive(Debug, Clone)]
pub struct SensorFrame<'a> {
    view: FrameView<'a>,
}

impl<'a> SensorFrame<'a> {
    /// Wrap a parsed view, rejecting any other category.
    pub fn new(view: FrameView<'a>) -> Result<Self, FrameError> {
        if view.category() != Category::Sensor {
            return Err(FrameError::CategoryMismatch {
                expected: Category::Sensor,
                found: view.category(),
            });
        }
        Ok(Self { view })
    }

    /// Sample timestamps.
    pub fn accumulated_time(&self) -> Elements<'a, &'a str> {
        self.view.texts(ACCUMULATED_TIME)
    }

    /// Cistern codes.
    pub fn cistern_code(&self) -> Elements<'a, &'a str> {
        self.view.texts(CISTERN_CODE)
    }

    /// Port types.
    pub fn port_type(&self) -> Elements<'a, i32> {
        self.view.i32s(PORT_TYPE)
    }

    /// Values.
    pub fn value(&self) -> Elements<'a, f64> {
        self.view.f64s(VALUE)
    }

    /// Number of complete samples (shortest section).
    pub fn sample_count(&self) -> usize {
        (0..LAYOUT.sections.len())
            .map(|i| self.view.count(i))
            .min()
            .unwrap_or(0)
    }

    /// Copy into an owned batch.
    pub fn to_batch(&self) -> SensorBatch {
        SensorBatch {
            accumulated_time: self.accumulated_time().map(str::to_owned).collect(),
            cistern_code: self.cistern_code().map(str::to_owned).collect(),
            port_type: self.port_type().collect(),
            value: self.value().collect(),
        }
    }
}
