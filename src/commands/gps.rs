use crate::args::GpsArgs;
use crate::error::LinkResult;
use crate::shared::cadence::{Cadence, read_when_due};
use crate::shared::channel::SerialChannel;
use crate::shared::clock::{Clock, SystemClock};
use crate::shared::nmea::NmeaDecoder;
use crate::shared::signal::RunFlag;
use crate::tracker::location::{Fix, LocationTracker, Publish};
use crate::tracker::upload::payload;
use anyhow::Result;
use tracing::{info, warn};

// Stands in for the upload pipeline: reports what would have been sent.
#[derive(Default)]
struct DryRun {
    would_upload: u64,
}

impl Publish for DryRun {
    fn publish(&mut self, fix: Fix) -> LinkResult<()> {
        self.would_upload += 1;
        info!(payload = %payload(&fix), "Would upload");
        Ok(())
    }
}

// Public gps command entrypoint. Same sampling cadence and change detection as
// `track`, with no modem involved.
pub fn run_gps(args: GpsArgs) -> Result<()> {
    let running = RunFlag::install()?;
    let mut gps = SerialChannel::open(&args.gps.gps_port, args.gps.gps_baud, args.frame.read_timeout())?;
    let clock = SystemClock;
    let mut reader = args.frame.reader();
    let mut tracker = LocationTracker::new(NmeaDecoder::new());
    let mut sink = DryRun::default();
    let mut cadence = Cadence::new(args.gps.interval());
    let name = gps.name().to_string();

    info!(gps = %name, interval = ?args.gps.interval(), "Monitoring GPS");
    while running.is_running() {
        let Some(frame) = read_when_due(&mut gps, &name, &mut reader, &clock, &mut cadence) else {
            clock.sleep(args.gps.idle());
            continue;
        };
        if let Some(fault) = frame.fault() {
            warn!("{fault}");
        }
        let evaluation = tracker.ingest(frame.as_bytes(), &mut sink)?;
        let state = evaluation.state;
        match evaluation.fault {
            Some(fault) => info!(bytes = frame.len(), "{fault}"),
            None => info!(
                bytes = frame.len(),
                updated = state.updated,
                "Latitude= {:.9} Longitude= {:.9}",
                state.current.latitude,
                state.current.longitude
            ),
        }
        cadence.mark(&clock);
    }

    let stats = tracker.decoder().stats();
    info!(
        sentences = stats.passed,
        bad_checksum = stats.failed_checksum,
        with_fix = stats.with_fix,
        changes = sink.would_upload,
        "GPS monitor stopped"
    );
    Ok(())
}
