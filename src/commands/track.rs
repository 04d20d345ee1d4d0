use crate::args::TrackArgs;
use crate::diagnostics::{Action, DiagnosticsServer, View};
use crate::modem::engine::Engine;
use crate::modem::setup;
use crate::shared::cadence::{Cadence, read_when_due};
use crate::shared::channel::{SerialChannel, open_console};
use crate::shared::clock::{Clock, SystemClock};
use crate::shared::lock::PortLock;
use crate::shared::nmea::NmeaDecoder;
use crate::shared::signal::RunFlag;
use crate::tracker::location::LocationTracker;
use crate::tracker::upload::UploadPipeline;
use anyhow::{Context, Result};
use std::thread;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionEnd {
    Stopped,
    Restart,
}

// Public track command entrypoint.
// A restart request ends the session, which drops the serial ports, the
// listener and all tracker state, then starts over from the modem reset.
pub fn run_track(args: TrackArgs) -> Result<()> {
    let running = RunFlag::install()?;
    let mut session = 0_u32;

    while running.is_running() {
        session += 1;
        info!(session, "Starting tracker session");
        match run_session(&args, &running)? {
            SessionEnd::Stopped => break,
            SessionEnd::Restart => {
                warn!(
                    delay = ?args.restart_delay(),
                    "Restart requested, abandoning modem and network state"
                );
                thread::sleep(args.restart_delay());
            }
        }
    }

    info!("Tracker stopped");
    Ok(())
}

fn run_session(args: &TrackArgs, running: &RunFlag) -> Result<SessionEnd> {
    let modem_lock = PortLock::acquire(&args.modem.lock_dir, &args.modem.modem_port)?;
    debug!(lock = %modem_lock.path().display(), "Holding modem lock");
    let modem = SerialChannel::open(
        &args.modem.modem_port,
        args.modem.modem_baud,
        args.frame.read_timeout(),
    )?;
    let mut gps = SerialChannel::open(&args.gps.gps_port, args.gps.gps_baud, args.frame.read_timeout())?;
    let console = open_console(
        args.modem.console_port.as_deref(),
        args.modem.console_baud,
        args.frame.read_timeout(),
    )?;

    let mut diagnostics = DiagnosticsServer::bind(&args.http_bind)?;
    let addr = diagnostics
        .local_addr()
        .context("reading diagnostics server address failed")?;
    info!(%addr, "HTTP server started");

    let clock = SystemClock;
    let mut engine = Engine::new(modem, console, clock, args.modem.engine_config(&args.frame));
    setup::bring_up(&mut engine, &args.cloud_url, args.boot_wait())
        .context("modem bring-up failed")?;

    let upload = args.upload_config();
    let mut tracker = LocationTracker::new(NmeaDecoder::new());
    let mut gps_reader = args.frame.reader();
    let mut gps_cadence = Cadence::new(args.gps.interval());
    let gps_name = gps.name().to_string();
    info!(gps = %gps_name, interval = ?args.gps.interval(), "Tracking");

    // Diagnostics first, then GPS, every iteration. An upload blocks both.
    while running.is_running() {
        let view = View {
            state: tracker.state(),
            last_response: engine.last_response(),
        };
        if diagnostics.poll(&view) == Action::Restart {
            info!(exchanges = engine.exchanges(), "Session torn down for restart");
            return Ok(SessionEnd::Restart);
        }

        let Some(frame) = read_when_due(&mut gps, &gps_name, &mut gps_reader, &clock, &mut gps_cadence)
        else {
            clock.sleep(args.gps.idle());
            continue;
        };
        if let Some(fault) = frame.fault() {
            warn!(gps = %gps_name, "{fault}");
        }
        debug!(bytes = frame.len(), "{}", String::from_utf8_lossy(frame.as_bytes()));

        let mut pipeline = UploadPipeline::new(&mut engine, &upload);
        match tracker.ingest(frame.as_bytes(), &mut pipeline) {
            Ok(evaluation) => {
                if let Some(fault) = evaluation.fault {
                    debug!("{fault}");
                }
            }
            // At most once: the position is already the reported baseline.
            Err(err) => warn!("Position upload dropped: {err}"),
        }
        gps_cadence.mark(&clock);
    }

    info!(exchanges = engine.exchanges(), "Session stopped");
    Ok(SessionEnd::Stopped)
}
