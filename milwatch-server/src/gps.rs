//! Background GPS reader.
//!
//! Opens the NMEA device, takes the first valid GGA fix within the fix
//! timeout, publishes it, then sleeps until the next attempt. The device
//! is read as a plain character stream; line speed is configured outside
//! the process (e.g. `stty -F /dev/ttyACM0 9600`).

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use milwatch_core::nmea::parse_gga;
use milwatch_core::{Coord, LocationProvider};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;

/// Read `device` until a valid fix arrives, EOF, or `fix_timeout` elapses.
pub async fn read_fix(device: &Path, fix_timeout: Duration) -> std::io::Result<Option<Coord>> {
    let file = tokio::fs::File::open(device).await?;
    let mut lines = BufReader::new(file).lines();

    let search = async {
        while let Some(line) = lines.next_line().await? {
            if let Some(fix) = parse_gga(&line) {
                return Ok(Some(fix));
            }
        }
        Ok::<_, std::io::Error>(None)
    };

    match tokio::time::timeout(fix_timeout, search).await {
        Ok(result) => result,
        Err(_) => Ok(None),
    }
}

pub struct GpsReader {
    device: PathBuf,
    provider: Arc<LocationProvider>,
    fix_timeout: Duration,
    interval: Duration,
}

impl GpsReader {
    pub fn new(
        device: impl Into<PathBuf>,
        provider: Arc<LocationProvider>,
        fix_timeout: Duration,
        interval: Duration,
    ) -> Self {
        GpsReader {
            device: device.into(),
            provider,
            fix_timeout,
            interval,
        }
    }

    /// One attempt. Returns whether a fix was published.
    pub async fn poll_once(&self) -> bool {
        match read_fix(&self.device, self.fix_timeout).await {
            Ok(Some(fix)) => {
                let published = self.provider.update_fix(fix.lat, fix.lon);
                tracing::info!(lat = fix.lat, lon = fix.lon, "GPS location updated");
                published
            }
            Ok(None) => {
                tracing::warn!(
                    device = %self.device.display(),
                    timeout_secs = self.fix_timeout.as_secs(),
                    "No GPS fix; keeping previous location"
                );
                false
            }
            Err(e) => {
                tracing::warn!(device = %self.device.display(), error = %e, "GPS device error");
                false
            }
        }
    }

    /// Poll forever (until stopped). Errors never escape.
    pub async fn run(self, stop: CancellationToken) {
        loop {
            self.poll_once().await;
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = stop.cancelled() => return,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use milwatch_core::LocationSource;

    fn provider() -> Arc<LocationProvider> {
        Arc::new(LocationProvider::new(Coord::new(38.95, -77.38)))
    }

    #[tokio::test]
    async fn test_first_valid_fix_published() {
        let dir = tempfile::tempdir().unwrap();
        let device = dir.path().join("gps.nmea");
        std::fs::write(
            &device,
            "$GPRMC,123519,A,4807.038,N,01131.000,E,022.4,084.4,230394,003.1,W\n\
             $GPGGA,123519,,,,,0,00,,,M,,M,,\n\
             $GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,*47\n",
        )
        .unwrap();

        let p = provider();
        let reader = GpsReader::new(
            &device,
            Arc::clone(&p),
            Duration::from_secs(5),
            Duration::from_secs(600),
        );
        assert!(reader.poll_once().await);
        let loc = p.current();
        assert_eq!(loc.source, LocationSource::Gps);
        assert!((loc.lat - 48.1173).abs() < 1e-4);
    }

    #[tokio::test]
    async fn test_no_fix_keeps_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let device = dir.path().join("gps.nmea");
        std::fs::write(&device, "$GPGGA,123519,,,,,0,00,,,M,,M,,\n").unwrap();

        let p = provider();
        let reader = GpsReader::new(
            &device,
            Arc::clone(&p),
            Duration::from_secs(5),
            Duration::from_secs(600),
        );
        assert!(!reader.poll_once().await);
        assert_eq!(p.current().source, LocationSource::Fallback);
    }

    #[tokio::test]
    async fn test_missing_device_is_not_fatal() {
        let p = provider();
        let reader = GpsReader::new(
            "/nonexistent/milwatch-gps",
            Arc::clone(&p),
            Duration::from_secs(1),
            Duration::from_secs(600),
        );
        assert!(!reader.poll_once().await);

        let stop = CancellationToken::new();
        let task = tokio::spawn(reader.run(stop.clone()));
        stop.cancel();
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("reader should stop")
            .unwrap();
        assert_eq!(p.current().source, LocationSource::Fallback);
    }
}
