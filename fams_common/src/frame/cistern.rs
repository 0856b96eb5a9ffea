//! Cistern (tank) frames.
//!
//! Each index is one reading of a tank sensor set. Conductivity travels raw;
//! the event processing side converts it to salinity.

use super::layout::{ElementKind, Layout, SectionSpec};
use super::{Category, Elements, FrameError, FrameView, SectionData, encode};
use crate::consts::{CODE_SLOT_LEN, TIME_SLOT_LEN};
use serde::{Deserialize, Serialize};

/// Section index of `accumulated_time`.
pub const ACCUMULATED_TIME: usize = 0;
/// Section index of `cistern_code`.
pub const CISTERN_CODE: usize = 1;
/// Section index of `inflow_temp`.
pub const INFLOW_TEMP: usize = 2;
/// Section index of `outflow_temp`.
pub const OUTFLOW_TEMP: usize = 3;
/// Section index of `upper_illuminance`.
pub const UPPER_ILLUMINANCE: usize = 4;
/// Section index of `lower_illuminance`.
pub const LOWER_ILLUMINANCE: usize = 5;
/// Section index of `conductivity`.
pub const CONDUCTIVITY: usize = 6;
/// Section index of `ph`.
pub const PH: usize = 7;

/// Wire layout.
pub const LAYOUT: Layout = Layout {
    category: Category::Cistern,
    sections: &[
        SectionSpec::new("accumulated_time", ElementKind::Text(TIME_SLOT_LEN)),
        SectionSpec::new("cistern_code", ElementKind::Text(CODE_SLOT_LEN)),
        SectionSpec::new("inflow_temp", ElementKind::F64),
        SectionSpec::new("outflow_temp", ElementKind::F64),
        SectionSpec::new("upper_illuminance", ElementKind::F64),
        SectionSpec::new("lower_illuminance", ElementKind::F64),
        SectionSpec::new("conductivity", ElementKind::F64),
        SectionSpec::new("ph", ElementKind::F64),
    ],
};

/// Owned cistern batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CisternBatch {
    /// Sample timestamps.
    pub accumulated_time: Vec<String>,
    /// Cistern code per sample.
    pub cistern_code: Vec<String>,
    /// Inflow water temperature.
    pub inflow_temp: Vec<f64>,
    /// Outflow water temperature.
    pub outflow_temp: Vec<f64>,
    /// Upper central illuminance.
    pub upper_illuminance: Vec<f64>,
    /// Lower central illuminance.
    pub lower_illuminance: Vec<f64>,
    /// Raw conductivity reading.
    pub conductivity: Vec<f64>,
    /// pH.
    pub ph: Vec<f64>,
}

impl CisternBatch {
    /// Encode as a frame.
    pub fn encode(&self) -> Result<Vec<u8>, FrameError> {
        encode(
            Category::Cistern,
            &[
                SectionData::Text(&self.accumulated_time),
                SectionData::Text(&self.cistern_code),
                SectionData::F64(&self.inflow_temp),
                SectionData::F64(&self.outflow_temp),
                SectionData::F64(&self.upper_illuminance),
                SectionData::F64(&self.lower_illuminance),
                SectionData::F64(&self.conductivity),
                SectionData::F64(&self.ph),
            ],
        )
    }
}

/// Typed view over a cistern frame.
#[derive(Debug, Clone)]
pub struct CisternFrame<'a> {
    view: FrameView<'a>,
}

impl<'a> CisternFrame<'a> {
    /// Wrap a parsed view, rejecting any other category.
    pub fn new(view: FrameView<'a>) -> Result<Self, FrameError> {
        if view.category() != Category::Cistern {
            return Err(FrameError::CategoryMismatch {
                expected: Category::Cistern,
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

    /// Any numeric section by index (`INFLOW_TEMP` ..= `PH`).
    pub fn values(&self, section: usize) -> Elements<'a, f64> {
        self.view.f64s(section)
    }

    /// Number of complete samples (shortest section).
    pub fn sample_count(&self) -> usize {
        (0..LAYOUT.sections.len())
            .map(|i| self.view.count(i))
            .min()
            .unwrap_or(0)
    }

    /// Copy into an owned batch.
    pub fn to_batch(&self) -> CisternBatch {
        CisternBatch {
            accumulated_time: self.accumulated_time().map(str::to_owned).collect(),
            cistern_code: self.cistern_code().map(str::to_owned).collect(),
            inflow_temp: self.values(INFLOW_TEMP).collect(),
            outflow_temp: self.values(OUTFLOW_TEMP).collect(),
            upper_illuminance: self.values(UPPER_ILLUMINANCE).collect(),
            lower_illuminance: self.values(LOWER_ILLUMINANCE).collect(),
            conductivity: self.values(CONDUCTIVITY).collect(),
            ph: self.values(PH).collect(),
        }
    }
}
