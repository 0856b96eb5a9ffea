//! Frame category tag.

use super::layout::Layout;
use super::{cistern, nitrification, outside, sensor, water_replace};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Category of a frame. The discriminant is the wire tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum Category {
    /// Multi-channel port sensor.
    Sensor = 1,
    /// Cistern (tank) sensor.
    Cistern = 2,
    /// Nitrification tank sensor.
    Nitrification = 3,
    /// Outdoor / weather sensor.
    Outside = 4,
    /// Water-replacement tank sensor.
    WaterReplace = 5,
}

impl Category {
    /// Every category, in tag order.
    pub const ALL: [Category; 5] = [
        Self::Sensor,
        Self::Cistern,
        Self::Nitrification,
        Self::Outside,
        Self::WaterReplace,
    ];

    /// Convert from raw tag. Returns `None` for unknown tags.
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Sensor),
            2 => Some(Self::Cistern),
            3 => Some(Self::Nitrification),
            4 => Some(Self::Outside),
            5 => Some(Self::WaterReplace),
            _ => None,
        }
    }

    /// Raw wire tag.
    #[inline]
    pub const fn tag(self) -> u8 {
        self as u8
    }

    /// Lowercase name used in config and logs.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Sensor => "sensor",
            Self::Cistern => "cistern",
            Self::Nitrification => "nitrification",
            Self::Outside => "outside",
            Self::WaterReplace => "water_replace",
        }
    }

    /// Section layout of this category.
    pub const fn layout(self) -> &'static Layout {
        match self {
            Self::Sensor => &sensor::LAYOUT,
            Self::Cistern => &cistern::LAYOUT,
            Self::Nitrification => &nitrification::LAYOUT,
            Self::Outside => &outside::LAYOUT,
            Self::WaterReplace => &water_replace::LAYOUT,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
