//! Frame to sample extraction.
//!
//! A frame carries parallel arrays; a [`Sample`] is one index across them,
//! already shaped as the upsert it turns into plus the metric values the
//! monitor checks.

use crate::salinity::cistern_salinity;
use crate::store::Param;
use crate::store::statements::{
    UPSERT_SENSOR_CISTERN_DATA, UPSERT_SENSOR_NITRIFICATION_TANK_DATA, UPSERT_SENSOR_OUTSIDE_DATA,
    UPSERT_SENSOR_REPLACE_TANK_DATA,
};
use fams_common::consts::{NITRIFICATION_RESOURCE, OUTSIDE_RESOURCE, WATER_REPLACE_RESOURCE};
use fams_common::frame::cistern::{self, CisternFrame};
use fams_common::frame::nitrification::NitrificationFrame;
use fams_common::frame::outside::OutsideFrame;
use fams_common::frame::sensor::SensorFrame;
use fams_common::frame::water_replace::WaterReplaceFrame;
use fams_common::frame::{Category, FrameError, FrameView};
use fams_common::metric::MetricType;

/// One sample ready to persist.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// Sample timestamp.
    pub time: String,
    /// Resource id.
    pub resource: String,
    /// Upsert statement.
    pub statement: &'static str,
    /// Upsert parameters: `[time, resource, values...]`.
    pub params: Vec<Param>,
    /// Values subject to threshold checks.
    pub metrics: Vec<(MetricType, f64)>,
}

impl Sample {
    fn new(
        time: &str,
        resource: &str,
        statement: &'static str,
        metrics: Vec<(MetricType, f64)>,
        stored: &[f64],
    ) -> Self {
        let mut params = Vec::with_capacity(2 + stored.len());
        params.push(Param::from(time));
        params.push(Param::from(resource));
        params.extend(stored.iter().map(|v| Param::Float(*v)));
        Self {
            time: time.to_string(),
            resource: resource.to_string(),
            statement,
            params,
            metrics,
        }
    }
}

/// Samples of one frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extraction {
    /// Complete samples, in frame order.
    pub samples: Vec<Sample>,
    /// Samples dropped for an unknown port type.
    pub unknown_ports: Vec<i32>,
    /// Section counts when the parallel arrays differ in length.
    pub uneven: Option<Vec<usize>>,
}

/// Turn a parsed frame into samples.
///
/// Unequal parallel arrays are cut to the shortest and reported in
/// [`Extraction::uneven`].
///
/// # Errors
///
/// Only [`FrameError::CategoryMismatch`] from the typed views, which cannot
/// happen for a view parsed from its own tag.
pub fn extract(view: &FrameView<'_>, conductivity_coefficient: f64) -> Result<Extraction, FrameError> {
    let counts: Vec<usize> = (0..view.layout().sections.len())
        .map(|i| view.count(i))
        .collect();
    let shortest = counts.iter().copied().min().unwrap_or(0);
    let uneven = counts.iter().any(|c| *c != shortest).then(|| counts.clone());

    let mut extraction = match view.category() {
        Category::Sensor => sensor_samples(&SensorFrame::new(view.clone())?, shortest),
        Category::Cistern => cistern_samples(
            &CisternFrame::new(view.clone())?,
            shortest,
            conductivity_coefficient,
        ),
        Category::Nitrification => nitrification_samples(&NitrificationFrame::new(view.clone())?, shortest),
        Category::Outside => outside_samples(&OutsideFrame::new(view.clone())?, shortest),
        Category::WaterReplace => water_replace_samples(&WaterReplaceFrame::new(view.clone())?, shortest),
    };
    extraction.uneven = uneven;
    Ok(extraction)
}

fn sensor_samples(frame: &SensorFrame<'_>, n: usize) -> Extraction {
    let mut extraction = Extraction::default();
    let rows = frame
        .accumulated_time()
        .zip(frame.cistern_code())
        .zip(frame.port_type())
        .zip(frame.value())
        .take(n);
    for (((time, code), port), value) in rows {
        match MetricType::from_port_type(port) {
            Some(metric) => extraction.samples.push(Sample::new(
                time,
                code,
                metric.upsert_statement(),
                vec![(metric, value)],
                &[value],
            )),
            None => extraction.unknown_ports.push(port),
        }
    }
    extraction
}

fn cistern_samples(frame: &CisternFrame<'_>, n: usize, coefficient: f64) -> Extraction {
    let times: Vec<&str> = frame.accumulated_time().take(n).collect();
    let codes: Vec<&str> = frame.cistern_code().take(n).collect();
    let column = |section| frame.values(section).take(n).collect::<Vec<f64>>();
    let inflow = column(cistern::INFLOW_TEMP);
    let outflow = column(cistern::OUTFLOW_TEMP);
    let upper = column(cistern::UPPER_ILLUMINANCE);
    let lower = column(cistern::LOWER_ILLUMINANCE);
    let conductivity = column(cistern::CONDUCTIVITY);
    let ph = column(cistern::PH);

    let samples = (0..n)
        .map(|i| {
            let salinity = cistern_salinity(conductivity[i], coefficient, inflow[i]);
            Sample::new(
                times[i],
                codes[i],
                UPSERT_SENSOR_CISTERN_DATA,
                vec![
                    (MetricType::InflowTemp, inflow[i]),
                    (MetricType::OutflowTemp, outflow[i]),
                    (MetricType::UpperIlluminance, upper[i]),
                    (MetricType::LowerIlluminance, lower[i]),
                    (MetricType::Salinity, salinity),
                    (MetricType::Ph, ph[i]),
                ],
                &[inflow[i], outflow[i], upper[i], lower[i], salinity, ph[i]],
            )
        })
        .collect();
    Extraction {
        samples,
        ..Default::default()
    }
}

fn nitrification_samples(frame: &NitrificationFrame<'_>, n: usize) -> Extraction {
    let samples = frame
        .accumulated_time()
        .zip(frame.water_temp())
        .take(n)
        .map(|(time, temp)| {
            Sample::new(
                time,
                NITRIFICATION_RESOURCE,
                UPSERT_SENSOR_NITRIFICATION_TANK_DATA,
                vec![(MetricType::NitrificationWaterTemp, temp)],
                &[temp],
            )
        })
        .collect();
    Extraction {
        samples,
        ..Default::default()
    }
}

fn outside_samples(frame: &OutsideFrame<'_>, n: usize) -> Extraction {
    let samples = frame
        .accumulated_time()
        .zip(frame.room_temp())
        .zip(frame.humidity())
        .zip(frame.atmospheric_pressure())
        .take(n)
        .map(|(((time, room), humidity), pressure)| {
            Sample::new(
                time,
                OUTSIDE_RESOURCE,
                UPSERT_SENSOR_OUTSIDE_DATA,
                vec![
                    (MetricType::RoomTemp, room),
                    (MetricType::Humidity, humidity),
                    (MetricType::AtmosphericPressure, pressure),
                ],
                &[room, humidity, pressure],
            )
        })
        .collect();
    Extraction {
        samples,
        ..Default::default()
    }
}

fn water_replace_samples(frame: &WaterReplaceFrame<'_>, n: usize) -> Extraction {
    let samples = frame
        .accumulated_time()
        .zip(frame.water_level())
        .zip(frame.water_temp())
        .take(n)
        .map(|((time, level), temp)| {
            Sample::new(
                time,
                WATER_REPLACE_RESOURCE,
                UPSERT_SENSOR_REPLACE_TANK_DATA,
                vec![
                    (MetricType::ReplaceTankWaterLevel, level),
                    (MetricType::ReplaceTankWaterTemp, temp),
                ],
                &[level, temp],
            )
        })
        .collect();
    Extraction {
        samples,
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fams_common::frame::cistern::CisternBatch;
    use fams_common::frame::outside::OutsideBatch;
    use fams_common::frame::sensor::SensorBatch;
    use fams_common::frame::water_replace::WaterReplaceBatch;

    fn times(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("2024-05-01 10:00:{i:02}")).collect()
    }

    #[test]
    fn test_outside_samples() {
        let bytes = OutsideBatch {
            accumulated_time: times(3),
            room_temp: vec![18.0, 41.0, 19.0],
            humidity: vec![40.0, 41.0, 42.0],
            atmospheric_pressure: vec![1010.0, 1011.0, 1012.0],
        }
        .encode()
        .unwrap();
        let view = FrameView::parse(&bytes).unwrap();
        let extraction = extract(&view, 0.757).unwrap();

        assert_eq!(extraction.samples.len(), 3);
        assert!(extraction.uneven.is_none());
        let second = &extraction.samples[1];
        assert_eq!(second.resource, "outside");
        assert_eq!(second.statement, UPSERT_SENSOR_OUTSIDE_DATA);
        assert_eq!(second.params.len(), 5);
        assert_eq!(second.params[2], Param::Float(41.0));
        assert_eq!(second.metrics[0], (MetricType::RoomTemp, 41.0));
    }

    #[test]
    fn test_sensor_unknown_port_skipped() {
        let bytes = SensorBatch {
            accumulated_time: times(3),
            cistern_code: vec!["C01".into(), "C01".into(), "C02".into()],
            port_type: vec![6, 42, 1],
            value: vec![7.5, 1.0, 18.0],
        }
        .encode()
        .unwrap();
        let extraction = extract(&FrameView::parse(&bytes).unwrap(), 0.757).unwrap();

        assert_eq!(extraction.samples.len(), 2);
        assert_eq!(extraction.unknown_ports, vec![42]);
        assert_eq!(extraction.samples[0].statement, "UPSERT_SENSOR_PORT_TYPE_6");
        assert_eq!(extraction.samples[1].resource, "C02");
        assert_eq!(extraction.samples[1].metrics, vec![(MetricType::InflowTemp, 18.0)]);
    }

    #[test]
    fn test_uneven_sections_cut_to_shortest() {
        let bytes = WaterReplaceBatch {
            accumulated_time: times(4),
            water_level: vec![120.0, 121.0],
            water_temp: vec![20.0, 20.5, 21.0],
        }
        .encode()
        .unwrap();
        let extraction = extract(&FrameView::parse(&bytes).unwrap(), 0.757).unwrap();

        assert_eq!(extraction.samples.len(), 2);
        assert_eq!(extraction.uneven, Some(vec![4, 2, 3]));
        assert_eq!(extraction.samples[1].resource, "water_replace");
        assert_eq!(
            extraction.samples[1].metrics,
            vec![
                (MetricType::ReplaceTankWaterLevel, 121.0),
                (MetricType::ReplaceTankWaterTemp, 20.5)
            ]
        );
    }

    #[test]
    fn test_cistern_stores_salinity() {
        let bytes = CisternBatch {
            accumulated_time: times(1),
            cistern_code: vec!["C07".into()],
            inflow_temp: vec![15.0],
            outflow_temp: vec![16.0],
            upper_illuminance: vec![300.0],
            lower_illuminance: vec![120.0],
            conductivity: vec![56_690.0],
            ph: vec![8.1],
        }
        .encode()
        .unwrap();
        let extraction = extract(&FrameView::parse(&bytes).unwrap(), 0.757).unwrap();

        let sample = &extraction.samples[0];
        assert_eq!(sample.resource, "C07");
        assert_eq!(sample.params.len(), 8);
        let (metric, salinity) = sample.metrics[4];
        assert_eq!(metric, MetricType::Salinity);
        assert!((salinity - 35.0).abs() < 1e-2);
        assert_eq!(sample.params[6], Param::Float(salinity));
        assert_eq!(sample.params[7], Param::Float(8.1));
    }
}
