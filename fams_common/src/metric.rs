//! Sensor metric catalogue.
//!
//! Multi-channel sensors report a numeric port type next to every value.
//! Tank, nitrification, outdoor and water-replacement sensors report
//! fixed fields that map onto the same catalogue, so the threshold monitor
//! can treat every sample as a `(resource, metric, value)` triple.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Metric measured by a sensor channel. Discriminants are the wire port types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum MetricType {
    /// Cistern inflow water temperature (°C).
    InflowTemp = 1,
    /// Cistern outflow water temperature (°C).
    OutflowTemp = 2,
    /// Upper central illuminance (lx).
    UpperIlluminance = 3,
    /// Lower central illuminance (lx).
    LowerIlluminance = 4,
    /// Practical salinity (PSU), derived from conductivity.
    Salinity = 5,
    /// pH.
    Ph = 6,
    /// Dissolved oxygen (mg/L).
    DissolvedOxygen = 7,
    /// Ammonium (mg/L).
    Ammonium = 8,
    /// Nitrite (mg/L).
    Nitrite = 9,
    /// Nitrate (mg/L).
    Nitrate = 10,
    /// Turbidity (NTU).
    Turbidity = 11,
    /// Water-replacement tank level (cm).
    ReplaceTankWaterLevel = 12,
    /// Water-replacement tank temperature (°C).
    ReplaceTankWaterTemp = 13,
    /// Nitrification tank water temperature (°C).
    NitrificationWaterTemp = 14,
    /// Outdoor room temperature (°C).
    RoomTemp = 15,
    /// Outdoor relative humidity (%).
    Humidity = 16,
    /// Outdoor atmospheric pressure (hPa).
    AtmosphericPressure = 17,
}

impl MetricType {
    /// Every metric, in port type order.
    pub const ALL: [MetricType; 17] = [
        Self::InflowTemp,
        Self::OutflowTemp,
        Self::UpperIlluminance,
        Self::LowerIlluminance,
        Self::Salinity,
        Self::Ph,
        Self::DissolvedOxygen,
        Self::Ammonium,
        Self::Nitrite,
        Self::Nitrate,
        Self::Turbidity,
        Self::ReplaceTankWaterLevel,
        Self::ReplaceTankWaterTemp,
        Self::NitrificationWaterTemp,
        Self::RoomTemp,
        Self::Humidity,
        Self::AtmosphericPressure,
    ];

    /// Convert from a wire port type. Returns `None` for unknown ports.
    #[inline]
    pub const fn from_port_type(port_type: i32) -> Option<Self> {
        if port_type < 1 || port_type > 17 {
            return None;
        }
        Some(Self::ALL[(port_type - 1) as usize])
    }

    /// Wire port type.
    #[inline]
    pub const fn port_type(self) -> i32 {
        self as i32
    }

    /// Human readable label used in alert mails.
    pub const fn label(self) -> &'static str {
        match self {
            Self::InflowTemp => "inflow water temperature",
            Self::OutflowTemp => "outflow water temperature",
            Self::UpperIlluminance => "upper illuminance",
            Self::LowerIlluminance => "lower illuminance",
            Self::Salinity => "salinity",
            Self::Ph => "pH",
            Self::DissolvedOxygen => "dissolved oxygen",
            Self::Ammonium => "ammonium",
            Self::Nitrite => "nitrite",
            Self::Nitrate => "nitrate",
            Self::Turbidity => "turbidity",
            Self::ReplaceTankWaterLevel => "replacement tank water level",
            Self::ReplaceTankWaterTemp => "replacement tank water temperature",
            Self::NitrificationWaterTemp => "nitrification tank water temperature",
            Self::RoomTemp => "room temperature",
            Self::Humidity => "humidity",
            Self::AtmosphericPressure => "atmospheric pressure",
        }
    }

    /// Measurement unit.
    pub const fn unit(self) -> &'static str {
        match self {
            Self::InflowTemp
            | Self::OutflowTemp
            | Self::ReplaceTankWaterTemp
            | Self::NitrificationWaterTemp
            | Self::RoomTemp => "°C",
            Self::UpperIlluminance | Self::LowerIlluminance => "lx",
            Self::Salinity => "PSU",
            Self::Ph => "",
            Self::DissolvedOxygen | Self::Ammonium | Self::Nitrite | Self::Nitrate => "mg/L",
            Self::Turbidity => "NTU",
            Self::ReplaceTankWaterLevel => "cm",
            Self::Humidity => "%",
            Self::AtmosphericPressure => "hPa",
        }
    }

    /// Upsert statement used by multi-channel sensor frames for this port.
    pub const fn upsert_statement(self) -> &'static str {
        match self {
            Self::InflowTemp => "UPSERT_SENSOR_PORT_TYPE_1",
            Self::OutflowTemp => "UPSERT_SENSOR_PORT_TYPE_2",
            Self::UpperIlluminance => "UPSERT_SENSOR_PORT_TYPE_3",
            Self::LowerIlluminance => "UPSERT_SENSOR_PORT_TYPE_4",
            Self::Salinity => "UPSERT_SENSOR_PORT_TYPE_5",
            Self::Ph => "UPSERT_SENSOR_PORT_TYPE_6",
            Self::DissolvedOxygen => "UPSERT_SENSOR_PORT_TYPE_7",
            Self::Ammonium => "UPSERT_SENSOR_PORT_TYPE_8",
            Self::Nitrite => "UPSERT_SENSOR_PORT_TYPE_9",
            Self::Nitrate => "UPSERT_SENSOR_PORT_TYPE_10",
            Self::Turbidity => "UPSERT_SENSOR_PORT_TYPE_11",
            Self::ReplaceTankWaterLevel => "UPSERT_SENSOR_PORT_TYPE_12",
            Self::ReplaceTankWaterTemp => "UPSERT_SENSOR_PORT_TYPE_13",
            Self::NitrificationWaterTemp => "UPSERT_SENSOR_PORT_TYPE_14",
            Self::RoomTemp => "UPSERT_SENSOR_PORT_TYPE_15",
            Self::Humidity => "UPSERT_SENSOR_PORT_TYPE_16",
            Self::AtmosphericPressure => "UPSERT_SENSOR_PORT_TYPE_17",
        }
    }

    /// Table and column that store this metric for port sensor frames.
    pub const fn storage(self) -> (&'static str, &'static str) {
        match self {
            Self::InflowTemp => ("sensor_cistern_data", "inflow_temp"),
            Self::OutflowTemp => ("sensor_cistern_data", "outflow_temp"),
            Self::UpperIlluminance => ("sensor_cistern_data", "upper_central_ill"),
            Self::LowerIlluminance => ("sensor_cistern_data", "lower_central_ill"),
            Self::Salinity => ("sensor_cistern_data", "salt"),
            Self::Ph => ("sensor_cistern_data", "ph"),
            Self::DissolvedOxygen => ("sensor_cistern_data", "dissolved_oxygen"),
            Self::Ammonium => ("sensor_cistern_data", "ammonium"),
            Self::Nitrite => ("sensor_cistern_data", "nitrite"),
            Self::Nitrate => ("sensor_cistern_data", "nitrate"),
            Self::Turbidity => ("sensor_cistern_data", "turbidity"),
            Self::ReplaceTankWaterLevel => ("sensor_replace_tank_data", "water_level"),
            Self::ReplaceTankWaterTemp => ("sensor_replace_tank_data", "water_temp"),
            Self::NitrificationWaterTemp => ("sensor_nitrification_tank_data", "water_temp"),
            Self::RoomTemp => ("sensor_outside_data", "room_temp"),
            Self::Humidity => ("sensor_outside_data", "humidity"),
            Self::AtmosphericPressure => ("sensor_outside_data", "atmospheric_pressure"),
        }
    }
}

impl fmt::Display for MetricType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
