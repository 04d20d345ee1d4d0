use crate::modem::reader::{FrameReader, RawFrame};
use crate::shared::channel::ByteChannel;
use crate::shared::clock::Clock;
use std::time::{Duration, Instant};
use tracing::warn;

// Rate limit for a polled source. The first check is always due; after a
// `mark`, the next one is due only once strictly more than `interval` passed.
#[derive(Debug, Clone, Copy)]
pub struct Cadence {
    interval: Duration,
    last: Option<Instant>,
}

impl Cadence {
    pub fn new(interval: Duration) -> Self {
        Self { interval, last: None }
    }

    pub fn is_due<K: Clock + ?Sized>(&self, clock: &K) -> bool {
        self.last.is_none_or(|at| clock.elapsed_since(at) > self.interval)
    }

    pub fn mark<K: Clock + ?Sized>(&mut self, clock: &K) {
        self.last = Some(clock.now());
    }
}

// Read one frame from `source` when the cadence allows it and bytes are waiting.
// A link error is logged and costs one interval instead of ending the caller's
// loop. The caller marks the cadence once it has handled the frame.
pub fn read_when_due<'r, S, K>(
    source: &mut S,
    name: &str,
    reader: &'r mut FrameReader,
    clock: &K,
    cadence: &mut Cadence,
) -> Option<RawFrame<'r>>
where
    S: ByteChannel + ?Sized,
    K: Clock + ?Sized,
{
    if !cadence.is_due(clock) {
        return None;
    }

    match source.available() {
        Ok(0) => return None,
        Ok(_) => {}
        Err(err) => {
            warn!(source = name, "Polling failed, skipping this cycle: {err}");
            cadence.mark(clock);
            return None;
        }
    }

    match reader.read(source, clock) {
        Ok(frame) => Some(frame),
        Err(err) => {
            warn!(source = name, "Read failed, skipping this cycle: {err}");
            cadence.mark(clock);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{LinkError, LinkResult};
    use crate::modem::reader::DEFAULT_SETTLE_DELAY;
    use crate::shared::testing::{ManualClock, ScriptedChannel};
    use std::io;

    struct UnpluggedPort;

    impl ByteChannel for UnpluggedPort {
        fn available(&mut self) -> LinkResult<usize> {
            Err(LinkError::Io(io::Error::new(io::ErrorKind::BrokenPipe, "device unplugged")))
        }

        fn read_byte(&mut self) -> LinkResult<Option<u8>> {
            Ok(None)
        }

        fn write_all(&mut self, _bytes: &[u8]) -> LinkResult<()> {
            Ok(())
        }
    }

    #[test]
    fn first_check_is_due_immediately() {
        let clock = ManualClock::new();
        assert!(Cadence::new(Duration::from_secs(10)).is_due(&clock));
    }

    #[test]
    fn due_only_after_more_than_the_interval() {
        let clock = ManualClock::new();
        let mut cadence = Cadence::new(Duration::from_secs(10));
        cadence.mark(&clock);

        clock.advance(Duration::from_secs(5));
        assert!(!cadence.is_due(&clock));
        clock.advance(Duration::from_secs(5));
        assert!(!cadence.is_due(&clock));
        clock.advance(Duration::from_millis(1));
        assert!(cadence.is_due(&clock));
    }

    #[test]
    fn reads_first_frame_then_waits_for_the_interval() {
        let clock = ManualClock::new();
        let mut gps = ScriptedChannel::new(clock.clone()).with_buffered(b"$GPGGA\r\n");
        let mut reader = FrameReader::new(64, DEFAULT_SETTLE_DELAY);
        let mut cadence = Cadence::new(Duration::from_secs(10));

        let frame = read_when_due(&mut gps, "gps", &mut reader, &clock, &mut cadence);
        assert_eq!(frame.map(|f| f.as_bytes().to_vec()), Some(b"$GPGGA\r\n".to_vec()));
        cadence.mark(&clock);

        gps.deliver_after(Duration::from_secs(1), b"$GPRMC\r\n");
        clock.advance(Duration::from_secs(2));
        assert!(read_when_due(&mut gps, "gps", &mut reader, &clock, &mut cadence).is_none());
        // Not consumed while the cadence holds it back.
        assert_eq!(gps.available().unwrap(), 8);

        clock.advance(Duration::from_secs(9));
        let frame = read_when_due(&mut gps, "gps", &mut reader, &clock, &mut cadence);
        assert_eq!(frame.map(|f| f.len()), Some(8));
    }

    #[test]
    fn nothing_waiting_is_not_a_read() {
        let clock = ManualClock::new();
        let mut gps = ScriptedChannel::new(clock.clone());
        let mut reader = FrameReader::new(64, DEFAULT_SETTLE_DELAY);
        let mut cadence = Cadence::new(Duration::from_secs(10));

        assert!(read_when_due(&mut gps, "gps", &mut reader, &clock, &mut cadence).is_none());
        assert!(cadence.is_due(&clock));
    }

    #[test]
    fn link_error_skips_one_interval_instead_of_failing() {
        let clock = ManualClock::new();
        let mut reader = FrameReader::new(64, DEFAULT_SETTLE_DELAY);
        let mut cadence = Cadence::new(Duration::from_secs(10));

        assert!(read_when_due(&mut UnpluggedPort, "gps", &mut reader, &clock, &mut cadence).is_none());
        assert!(!cadence.is_due(&clock));
        clock.advance(Duration::from_secs(11));
        assert!(cadence.is_due(&clock));
    }
}
