use crate::error::{Fault, LinkResult};
use crate::modem::command::Command;
use crate::modem::reader::{DEFAULT_FRAME_CAPACITY, DEFAULT_SETTLE_DELAY, FrameReader};
use crate::shared::channel::ByteChannel;
use crate::shared::clock::Clock;
use chrono::{DateTime, Utc};
use std::borrow::Cow;
use std::time::Duration;
use tracing::{debug, trace, warn};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub frame_capacity: usize,
    pub settle: Duration,
    // Idle sleep between availability checks while waiting on the modem.
    pub poll_interval: Duration,
    // Upper bound for fill-wait exchanges. `None` keeps them unbounded.
    pub fill_ceiling: Option<Duration>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            frame_capacity: DEFAULT_FRAME_CAPACITY,
            settle: DEFAULT_SETTLE_DELAY,
            poll_interval: DEFAULT_POLL_INTERVAL,
            fill_ceiling: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Flushing,
    Sent,
    Waiting,
    Done,
}

// Everything captured during one exchange's listening window. A missing reply
// and an empty one look the same; the only hint is `Fault::Timeout` on an
// empty capture.
#[derive(Debug, Clone)]
pub struct Response {
    command: String,
    raw: Vec<u8>,
    received_at: DateTime<Utc>,
    faults: Vec<Fault>,
}

impl Response {
    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.raw)
    }

    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }

    pub fn faults(&self) -> &[Fault] {
        &self.faults
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }
}

// Synchronous AT command/response engine.
// Each `execute` walks `Idle -> Flushing -> Sent -> Waiting -> Done`. Every
// burst of modem output replaces the captured frame, so the response is the
// last burst. No retries at this layer.
pub struct Engine<M, C, K> {
    modem: M,
    console: C,
    clock: K,
    reader: FrameReader,
    config: EngineConfig,
    phase: Phase,
    last_response: Option<Response>,
    exchanges: u64,
}

impl<M, C, K> Engine<M, C, K>
where
    M: ByteChannel,
    C: ByteChannel,
    K: Clock,
{
    pub fn new(modem: M, console: C, clock: K, config: EngineConfig) -> Self {
        let reader = FrameReader::new(config.frame_capacity, config.settle);
        Self {
            modem,
            console,
            clock,
            reader,
            config,
            phase: Phase::Idle,
            last_response: None,
            exchanges: 0,
        }
    }

    #[cfg(test)]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn exchanges(&self) -> u64 {
        self.exchanges
    }

    pub fn last_response(&self) -> Option<&Response> {
        self.last_response.as_ref()
    }

    #[cfg(test)]
    pub fn modem(&self) -> &M {
        &self.modem
    }

    #[cfg(test)]
    pub fn console(&self) -> &C {
        &self.console
    }

    pub fn clock(&self) -> &K {
        &self.clock
    }

    // Run one exchange and publish its response.
    // A timed exchange returns once `cmd.timeout()` has elapsed, and a reply
    // still streaming in at that point is cut at the deadline. A fill-wait
    // exchange ignores the timeout and only ends at the configured ceiling;
    // without one it blocks the whole control loop for good.
    pub fn execute(&mut self, cmd: &Command) -> LinkResult<&Response> {
        self.enter(Phase::Flushing);
        let stale = self.console.discard_input()? + self.modem.discard_input()?;
        if stale > 0 {
            trace!(stale, "Discarded buffered bytes before exchange");
        }
        self.reader.clear();

        let text = cmd.text();
        debug!(command = %text, timeout = ?cmd.timeout(), fill = cmd.fills_buffer(), "Sending modem command");
        self.modem.write_line(&text)?;
        let sent_at = self.clock.now();
        self.enter(Phase::Sent);

        if cmd.fills_buffer() && self.config.fill_ceiling.is_none() {
            warn!(command = %text, "Fill-wait exchange has no ceiling and may block indefinitely");
        }

        self.enter(Phase::Waiting);
        let deadline = (!cmd.fills_buffer()).then(|| sent_at + cmd.timeout());
        let mut faults = Vec::new();
        loop {
            if self.modem.available()? > 0 {
                self.reader.read_until(&mut self.modem, &self.clock, deadline)?;
            } else {
                self.clock.sleep(self.config.poll_interval);
            }

            let elapsed = self.clock.elapsed_since(sent_at);
            if !cmd.fills_buffer() {
                if elapsed >= cmd.timeout() {
                    break;
                }
                continue;
            }
            if let Some(ceiling) = self.config.fill_ceiling
                && elapsed >= ceiling
            {
                warn!(command = %text, ?ceiling, "Fill-wait exchange hit its ceiling");
                faults.push(Fault::UnboundedWait(ceiling));
                break;
            }
        }

        let frame = self.reader.frame();
        faults.extend(frame.fault());
        if frame.is_empty() && !cmd.fills_buffer() {
            faults.push(Fault::Timeout(cmd.timeout()));
        }

        if let Err(err) = self.console.write_all(frame.as_bytes()) {
            warn!("Echoing modem response to console failed: {err}");
        }
        debug!(command = %text, response = %String::from_utf8_lossy(frame.as_bytes()), "Modem response");

        // Reuse the previous response's allocation.
        let mut raw = self
            .last_response
            .take()
            .map(|previous| previous.raw)
            .unwrap_or_default();
        raw.clear();
        raw.extend_from_slice(frame.as_bytes());

        self.exchanges += 1;
        self.enter(Phase::Done);
        Ok(self.last_response.insert(Response {
            command: text,
            raw,
            received_at: Utc::now(),
            faults,
        }))
    }

    fn enter(&mut self, phase: Phase) {
        trace!(from = ?self.phase, to = ?phase, "Exchange phase");
        self.phase = phase;
    }
}
