//! Water-replacement tank frames.

use super::layout::{ElementKind, Layout, SectionSpec};
use super::{Category, Elements, FrameError, FrameView, SectionData, encode};
use crate::consts::TIME_SLOT_LEN;
use serde::{Deserialize, Serialize};

/// Section index of `accumulated_time`.
pub const ACCUMULATED_TIME: usize = 0;
/// Section index of `water_level`.
pub const WATER_LEVEL: usize = 1;
/// Section index of `water_temp`.
pub const WATER_TEMP: usize = 2;

/// Wire layout.
pub const LAYOUT: Layout = Layout {
    category: Category::WaterReplace,
    sections: &[
        SectionSpec::new("accumulated_time", ElementKind::Text(TIME_SLOT_LEN)),
        SectionSpec::new("water_level", ElementKind::F64),
        SectionSpec::new("water_temp", ElementKind::F64),
    ],
};

/// Owned water-replacement batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WaterReplaceBatch {
    /// Sample timestamps.
    pub accumulated_time: Vec<String>,
    /// Tank water level.
    pub water_level: Vec<f64>,
    /// Tank water temperature.
    pub water_temp: Vec<f64>,
}

impl WaterReplaceBatch {
    /// Encode as a frame.
    pub fn encode(&self) -> Result<Vec<u8>, FrameError> {
        encode(
            Category::WaterReplace,
            &[
                SectionData::Text(&self.accumulated_time),
                SectionData::F64(&self.water_level),
                SectionData::F64(&self.water_temp),
            ],
        )
    }
}

/// Typed view over a water-replacement frame.
#[derive(Debug, Clone)]
pub struct WaterReplaceFrame<'a> {
    view: FrameView<'a>,
}

impl<'a> WaterReplaceFrame<'a> {
    /// Wrap a parsed view, rejecting any other category.
    pub fn new(view: FrameView<'a>) -> Result<Self, FrameError> {
        if view.category() != Category::WaterReplace {
            return Err(FrameError::CategoryMismatch {
                expected: Category::WaterReplace,
                found: view.category(),
            });
        }
        Ok(Self { view })
    }

    /// Sample timestamps.
    pub fn accumulated_time(&self) -> Elements<'a, &'a str> {
        self.view.texts(ACCUMULATED_TIME)
    }

    /// Tank water level.
    pub fn water_level(&self) -> Elements<'a, f64> {
        self.view.f64s(WATER_LEVEL)
    }

    /// Tank water temperature.
    pub fn water_temp(&self) -> Elements<'a, f64> {
        self.view.f64s(WATER_TEMP)
    }

    /// Copy into an owned batch.
    pub fn to_batch(&self) -> WaterReplaceBatch {
        WaterReplaceBatch {
            accumulated_time: self.accumulated_time().map(str::to_owned).collect(),
            water_level: self.water_level().collect(),
            water_temp: self.water_temp().collect(),
        }
    }
}
