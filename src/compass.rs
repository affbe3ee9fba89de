//! Qibla compass
//!
//! A heading sensor pushes raw samples into a channel; the subscription turns
//! each one into a reading relative to the Qibla bearing and publishes the
//! latest on a `watch`. Dropping the subscription drops the receiving end,
//! which is the sensor's signal to stop.

use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::ephemeris::Ephemeris;
use crate::error::{CoreError, CoreResult};
use crate::types::Coordinates;

/// One raw orientation event
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HeadingSample {
    /// Platform compass heading, already clockwise from north
    pub compass_heading: Option<f64>,
    /// Device orientation alpha, counter-clockwise on most platforms
    pub alpha: Option<f64>,
}

/// Clockwise-from-north heading in [0, 360)
///
/// Falls back to `(360 - alpha) % 360` when the platform heading is absent.
/// That conversion assumes alpha turns counter-clockwise, which holds on the
/// devices this was checked against but is not guaranteed everywhere.
pub fn normalize_heading(sample: HeadingSample) -> f64 {
    let heading = match sample.compass_heading {
        Some(heading) => heading,
        None => (360.0 - sample.alpha.unwrap_or(0.0)) % 360.0,
    };
    heading.rem_euclid(360.0)
}

/// How far to turn the arrow so it points at the Qibla, in [0, 360)
pub fn rotation_angle(qibla_bearing: f64, heading: f64) -> f64 {
    (qibla_bearing - heading).rem_euclid(360.0)
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompassReading {
    pub qibla_direction: f64,
    pub device_heading: f64,
    pub rotation_angle: f64,
    /// False until the first sample arrives
    pub is_calibrated: bool,
}

/// Source of device orientation events
pub trait HeadingSensor {
    /// Begin emitting samples; the sensor stops once the receiver is dropped
    fn start(&mut self) -> CoreResult<mpsc::Receiver<HeadingSample>>;
}

pub struct QiblaCompass;

impl QiblaCompass {
    /// Start the sensor and track the arrow rotation for `coords`
    ///
    /// Must be called from within a tokio runtime.
    pub fn subscribe(
        sensor: &mut dyn HeadingSensor,
        ephemeris: &dyn Ephemeris,
        coords: &Coordinates,
    ) -> CoreResult<CompassSubscription> {
        let qibla = ephemeris.qibla_bearing(coords);
        let mut samples = sensor.start().map_err(|e| match e {
            CoreError::SensorUnavailable(_) => e,
            other => CoreError::SensorUnavailable(other.to_string()),
        })?;
        info!(qibla_bearing = qibla, coordinates = %coords, "Compass listening");

        let (reading_tx, reading_rx) = watch::channel(CompassReading {
            qibla_direction: qibla,
            ..CompassReading::default()
        });

        let task = tokio::spawn(async move {
            while let Some(sample) = samples.recv().await {
                let heading = normalize_heading(sample);
                reading_tx.send_replace(CompassReading {
                    qibla_direction: qibla,
                    device_heading: heading,
                    rotation_angle: rotation_angle(qibla, heading),
                    is_calibrated: true,
                });
            }
            warn!("Heading sensor stream ended");
        });

        Ok(CompassSubscription {
            readings: reading_rx,
            task: Some(task),
        })
    }
}

/// Live compass readings; dropping it stops the listener
pub struct CompassSubscription {
    readings: watch::Receiver<CompassReading>,
    task: Option<JoinHandle<()>>,
}

impl CompassSubscription {
    pub fn latest(&self) -> CompassReading {
        *self.readings.borrow()
    }

    pub fn readings(&self) -> watch::Receiver<CompassReading> {
        self.readings.clone()
    }
}

impl Drop for CompassSubscription {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            debug!("Compass unsubscribed");
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ephemeris::SolarEphemeris;

    struct ChannelSensor {
        tx: Option<mpsc::Sender<HeadingSample>>,
        fail: bool,
    }

    impl ChannelSensor {
        fn new() -> Self {
            Self { tx: None, fail: false }
        }
    }

    impl HeadingSensor for ChannelSensor {
        fn start(&mut self) -> CoreResult<mpsc::Receiver<HeadingSample>> {
            if self.fail {
                return Err(CoreError::SensorUnavailable("motion permission denied".to_string()));
            }
            let (tx, rx) = mpsc::channel(8);
            self.tx = Some(tx);
            Ok(rx)
        }
    }

    fn new_york() -> Coordinates {
        Coordinates::new(40.7128, -74.0060).unwrap()
    }

    #[test]
    fn test_normalize_heading_prefers_platform_heading() {
        let sample = HeadingSample {
            compass_heading: Some(90.0),
            alpha: Some(10.0),
        };
        assert_eq!(normalize_heading(sample), 90.0);
    }

    #[test]
    fn test_normalize_heading_alpha_fallback() {
        let from_alpha = |alpha| {
            normalize_heading(HeadingSample {
                compass_heading: None,
                alpha: Some(alpha),
            })
        };
        assert_eq!(from_alpha(90.0), 270.0);
        assert_eq!(from_alpha(0.0), 0.0);
        assert_eq!(from_alpha(360.0), 0.0);
        assert_eq!(normalize_heading(HeadingSample::default()), 0.0);
    }

    #[test]
    fn test_rotation_angle_wraps() {
        assert_eq!(rotation_angle(58.0, 0.0), 58.0);
        assert_eq!(rotation_angle(58.0, 90.0), 328.0);
        assert_eq!(rotation_angle(10.0, 10.0), 0.0);
    }

    #[tokio::test]
    async fn test_subscription_tracks_latest_sample() {
        let mut sensor = ChannelSensor::new();
        let sub = QiblaCompass::subscribe(&mut sensor, &SolarEphemeris, &new_york()).unwrap();
        assert!(!sub.latest().is_calibrated);
        let qibla = sub.latest().qibla_direction;
        assert!((qibla - 58.48).abs() < 0.1);

        let mut readings = sub.readings();
        let tx = sensor.tx.clone().unwrap();
        tx.send(HeadingSample {
            compass_heading: Some(30.0),
            alpha: None,
        })
        .await
        .unwrap();
        readings.changed().await.unwrap();

        let reading = sub.latest();
        assert!(reading.is_calibrated);
        assert_eq!(reading.device_heading, 30.0);
        assert!((reading.rotation_angle - (qibla - 30.0)).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_drop_stops_listener() {
        let mut sensor = ChannelSensor::new();
        let sub = QiblaCompass::subscribe(&mut sensor, &SolarEphemeris, &new_york()).unwrap();
        let tx = sensor.tx.take().unwrap();
        drop(sub);
        tokio::task::yield_now().await;
        tx.closed().await;
        assert!(tx.is_closed());
    }

    #[test]
    fn test_sensor_failure_is_sensor_unavailable() {
        let mut sensor = ChannelSensor::new();
        sensor.fail = true;
        let err = QiblaCompass::subscribe(&mut sensor, &SolarEphemeris, &new_york())
            .err()
            .unwrap();
        assert!(matches!(err, CoreError::SensorUnavailable(_)));
    }
}
