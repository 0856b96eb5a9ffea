//! Outdoor (weather) frames.

use super::layout::{ElementKind, Layout, SectionSpec};
use super::{Category, Elements, FrameError, FrameView, SectionData, encode};
use crate::consts::TIME_SLOT_LEN;
use serde::{Deserialize, Serialize};

/// Section index of `accumulated_time`.
pub const ACCUMULATED_TIME: usize = 0;
/// Section index of `room_temp`.
pub const ROOM_TEMP: usize = 1;
/// Section index of `humidity`.
pub const HUMIDITY: usize = 2;
/// Section index of `atmospheric_pressure`.
pub const ATMOSPHERIC_PRESSURE: usize = 3;

/// Wire layout.
pub const LAYOUT: Layout = Layout {
    category: Category::Outside,
    sections: &[
        SectionSpec::new("accumulated_time", ElementKind::Text(TIME_SLOT_LEN)),
        SectionSpec::new("room_temp", ElementKind::F64),
        SectionSpec::new("humidity", ElementKind::F64),
        SectionSpec::new("atmospheric_pressure", ElementKind::F64),
    ],
};

/// Owned outdoor batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutsideBatch {
    /// Sample timestamps.
    pub accumulated_time: Vec<String>,
    /// Room temperature.
    pub room_temp: Vec<f64>,
    /// Relative humidity.
    pub humidity: Vec<f64>,
    /// Atmospheric pressure.
    pub atmospheric_pressure: Vec<f64>,
}

impl OutsideBatch {
    /// Encode as a frame.
    pub fn encode(&self) -> Result<Vec<u8>, FrameError> {
        encode(
            Category::Outside,
            &[
                SectionData::Text(&self.accumulated_time),
                SectionData::F64(&self.room_temp),
                SectionData::F64(&self.humidity),
                SectionData::F64(&self.atmospheric_pressure),
            ],
        )
    }
}

/// Typed view over an outdoor frame.
#[derive(Debug, Clone)]
pub struct OutsideFrame<'a> {
    view: FrameView<'a>,
}

impl<'a> OutsideFrame<'a> {
    /// Wrap a parsed view, rejecting any other category.
    pub fn new(view: FrameView<'a>) -> Result<Self, FrameError> {
        if view.category() != Category::Outside {
            return Err(FrameError::CategoryMismatch {
                expected: Category::Outside,
                found: view.category(),
            });
        }
        Ok(Self { view })
    }

    /// Sample timestamps.
    pub fn accumulated_time(&self) -> Elements<'a, &'a str> {
        self.view.texts(ACCUMULATED_TIME)
    }

    /// Room temperature.
    pub fn room_temp(&self) -> Elements<'a, f64> {
        self.view.f64s(ROOM_TEMP)
    }

    /// Relative humidity.
    pub fn humidity(&self) -> Elements<'a, f64> {
        self.view.f64s(HUMIDITY)
    }

    /// Atmospheric pressure.
    pub fn atmospheric_pressure(&self) -> Elements<'a, f64> {
        self.view.f64s(ATMOSPHERIC_PRESSURE)
    }

    /// Copy into an owned batch.
    pub fn to_batch(&self) -> OutsideBatch {
        OutsideBatch {
            accumulated_time: self.accumulated_time().map(str::to_owned).collect(),
            room_temp: self.room_temp().collect(),
            humidity: self.humidity().collect(),
            atmospheric_pressure: self.atmospheric_pressure().collect(),
        }
    }
}
