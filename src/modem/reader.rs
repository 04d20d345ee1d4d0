use crate::error::{Fault, LinkResult};
use crate::shared::channel::ByteChannel;
use crate::shared::clock::Clock;
use std::time::{Duration, Instant};
use tracing::warn;

// 4096 usable bytes plus the terminator.
pub const DEFAULT_FRAME_CAPACITY: usize = 4097;
// Gap left between availability checks so chunked transmissions read as one frame.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(2);

// Fixed-capacity scratch buffer drained from a serial source.
// Allocated once and overwritten on every read. A frame always ends in a NUL
// byte, so at most `capacity - 1` payload bytes fit; anything beyond that is
// truncated and the frame is flagged as overflowed.
pub struct FrameReader {
    buf: Box<[u8]>,
    len: usize,
    overflowed: bool,
    settle: Duration,
}

// View of the most recent frame, terminator included.
#[derive(Debug, Clone, Copy)]
pub struct RawFrame<'a> {
    terminated: &'a [u8],
    overflowed: bool,
    capacity: usize,
}

impl FrameReader {
    pub fn new(capacity: usize, settle: Duration) -> Self {
        let capacity = capacity.max(2);
        Self {
            buf: vec![0_u8; capacity].into_boxed_slice(),
            len: 0,
            overflowed: false,
            settle,
        }
    }

    // Zero the whole buffer and forget the previous frame.
    pub fn clear(&mut self) {
        self.buf.fill(0);
        self.len = 0;
        self.overflowed = false;
    }

    // Drain whatever `source` has buffered into the scratch buffer: one byte
    // per availability check, then the settle delay. Stops when the source runs
    // dry or the buffer holds `capacity - 1` bytes; the byte that would not fit
    // is consumed and dropped and the frame is marked overflowed.
    pub fn read<S, C>(&mut self, source: &mut S, clock: &C) -> LinkResult<RawFrame<'_>>
    where
        S: ByteChannel + ?Sized,
        C: Clock + ?Sized,
    {
        self.read_until(source, clock, None)
    }

    // Same as `read`, but never drains past `deadline`: the settle delay is cut
    // short at the deadline and whatever is still queued stays in the source.
    pub fn read_until<S, C>(
        &mut self,
        source: &mut S,
        clock: &C,
        deadline: Option<Instant>,
    ) -> LinkResult<RawFrame<'_>>
    where
        S: ByteChannel + ?Sized,
        C: Clock + ?Sized,
    {
        self.clear();
        let limit = self.buf.len() - 1;

        while source.available()? > 0 {
            if deadline.is_some_and(|at| clock.now() >= at) {
                break;
            }
            let Some(byte) = source.read_byte()? else {
                break;
            };
            if self.len == limit {
                self.overflowed = true;
                warn!(capacity = self.buf.len(), "Frame buffer full, truncating");
                break;
            }
            self.buf[self.len] = byte;
            self.len += 1;
            let pause = match deadline {
                Some(at) => self.settle.min(at.saturating_duration_since(clock.now())),
                None => self.settle,
            };
            clock.sleep(pause);
        }

        self.buf[self.len] = 0;
        Ok(self.frame())
    }

    pub fn frame(&self) -> RawFrame<'_> {
        RawFrame {
            terminated: &self.buf[..=self.len],
            overflowed: self.overflowed,
            capacity: self.buf.len(),
        }
    }
}

impl<'a> RawFrame<'a> {
    pub fn as_bytes(&self) -> &'a [u8] {
        &self.terminated[..self.terminated.len() - 1]
    }

    #[cfg(test)]
    pub fn with_nul(&self) -> &'a [u8] {
        self.terminated
    }

    pub fn len(&self) -> usize {
        self.terminated.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn fault(&self) -> Option<Fault> {
        self.overflowed.then_some(Fault::BufferOverflow {
            capacity: self.capacity,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::testing::{ManualClock, ScriptedChannel};

    #[test]
    fn returns_exact_bytes_null_terminated() {
        let clock = ManualClock::new();
        let mut source = ScriptedChannel::new(clock.clone()).with_buffered(b"OK\r\n");
        let mut reader = FrameReader::new(16, DEFAULT_SETTLE_DELAY);

        let frame = reader.read(&mut source, &clock).unwrap();
        assert_eq!(frame.as_bytes(), b"OK\r\n");
        assert_eq!(frame.with_nul(), b"OK\r\n\0");
        assert_eq!(frame.fault(), None);
    }

    #[test]
    fn second_read_has_no_remnants_of_first() {
        let clock = ManualClock::new();
        let mut reader = FrameReader::new(64, DEFAULT_SETTLE_DELAY);

        let mut long = ScriptedChannel::new(clock.clone()).with_buffered(b"+QHTTPPUT: 0,200,12\r\n");
        reader.read(&mut long, &clock).unwrap();

        let mut short = ScriptedChannel::new(clock.clone()).with_buffered(b"OK");
        let frame = reader.read(&mut short, &clock).unwrap();
        assert_eq!(frame.with_nul(), b"OK\0");
        assert!(reader.buf[3..].iter().all(|byte| *byte == 0));
    }

    #[test]
    fn empty_source_clears_previous_frame() {
        let clock = ManualClock::new();
        let mut reader = FrameReader::new(32, DEFAULT_SETTLE_DELAY);
        let mut source = ScriptedChannel::new(clock.clone()).with_buffered(b"ERROR");
        reader.read(&mut source, &clock).unwrap();

        let frame = reader.read(&mut source, &clock).unwrap();
        assert!(frame.is_empty());
        assert_eq!(frame.with_nul(), b"\0");
    }

    #[test]
    fn overflow_keeps_capacity_minus_one_and_flags() {
        let clock = ManualClock::new();
        let input: Vec<u8> = (0..40_u8).map(|i| b'a' + (i % 26)).collect();
        let mut source = ScriptedChannel::new(clock.clone()).with_buffered(&input);
        let mut reader = FrameReader::new(16, DEFAULT_SETTLE_DELAY);

        let frame = reader.read(&mut source, &clock).unwrap();
        assert_eq!(frame.len(), 15);
        assert_eq!(frame.as_bytes(), &input[..15]);
        assert_eq!(frame.with_nul().last(), Some(&0));
        assert_eq!(frame.fault(), Some(Fault::BufferOverflow { capacity: 16 }));
        // The byte that hit the bound is consumed, the rest stay queued.
        assert_eq!(source.available().unwrap(), 40 - 16);
    }

    #[test]
    fn exactly_capacity_bytes_overflows() {
        let clock = ManualClock::new();
        let mut source = ScriptedChannel::new(clock.clone()).with_buffered(&[b'x'; 8]);
        let mut reader = FrameReader::new(8, DEFAULT_SETTLE_DELAY);

        let frame = reader.read(&mut source, &clock).unwrap();
        assert_eq!(frame.len(), 7);
        assert!(frame.fault().is_some());
    }

    #[test]
    fn chunks_arriving_within_settle_gap_join_one_frame() {
        let clock = ManualClock::new();
        let mut source = ScriptedChannel::new(clock.clone()).with_buffered(b"AT\r\r\n");
        // Lands while the first chunk is still being drained.
        source.deliver_after(Duration::from_millis(4), b"OK\r\n");
        // Lands after the line went quiet: belongs to the next frame.
        source.deliver_after(Duration::from_millis(500), b"+CREG: 1\r\n");
        let mut reader = FrameReader::new(64, DEFAULT_SETTLE_DELAY);

        let frame = reader.read(&mut source, &clock).unwrap();
        assert_eq!(frame.as_bytes(), b"AT\r\r\nOK\r\n");
        assert_eq!(clock.elapsed(), DEFAULT_SETTLE_DELAY * 9);
    }

    #[test]
    fn deadline_stops_the_drain_and_leaves_the_rest_queued() {
        let clock = ManualClock::new();
        let mut source = ScriptedChannel::new(clock.clone()).with_buffered(&[b'y'; 100]);
        let mut reader = FrameReader::new(256, DEFAULT_SETTLE_DELAY);
        let deadline = clock.now() + Duration::from_millis(5);

        let frame = reader.read_until(&mut source, &clock, Some(deadline)).unwrap();
        // Bytes at 0, 2 and 4 ms; the third settle is cut to 1 ms.
        assert_eq!(frame.len(), 3);
        assert_eq!(frame.fault(), None);
        assert_eq!(clock.elapsed(), Duration::from_millis(5));
        assert_eq!(source.available().unwrap(), 97);
    }
}
