// Test doubles shared by the unit tests: virtual time and a scripted serial line.
use crate::error::LinkResult;
use crate::shared::channel::ByteChannel;
use crate::shared::clock::Clock;
use std::cell::Cell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::{Duration, Instant};

// Clock whose `sleep` advances virtual time instantly.
pub struct ManualClock {
    origin: Instant,
    offset: Cell<Duration>,
}

impl ManualClock {
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            origin: Instant::now(),
            offset: Cell::new(Duration::ZERO),
        })
    }

    pub fn advance(&self, by: Duration) {
        self.offset.set(self.offset.get() + by);
    }

    pub fn elapsed(&self) -> Duration {
        self.offset.get()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + self.offset.get()
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }
}

// Serial line that delivers chunks at scheduled virtual times and answers each
// written line with the next scripted reply.
pub struct ScriptedChannel {
    clock: Rc<ManualClock>,
    pending: Vec<(Duration, Vec<u8>)>,
    buffered: VecDeque<u8>,
    replies: VecDeque<Vec<(Duration, Vec<u8>)>>,
    written: Vec<u8>,
    lines: Vec<String>,
}

impl ScriptedChannel {
    pub fn new(clock: Rc<ManualClock>) -> Self {
        Self {
            clock,
            pending: Vec::new(),
            buffered: VecDeque::new(),
            replies: VecDeque::new(),
            written: Vec::new(),
            lines: Vec::new(),
        }
    }

    // Bytes already waiting in the receive buffer.
    pub fn with_buffered(mut self, bytes: &[u8]) -> Self {
        self.buffered.extend(bytes);
        self
    }

    // Bytes that arrive `after` the current virtual time.
    pub fn deliver_after(&mut self, after: Duration, bytes: &[u8]) {
        let at = self.clock.elapsed() + after;
        self.pending.push((at, bytes.to_vec()));
    }

    // Reply for the next written line, as chunks relative to the write.
    pub fn reply(mut self, chunks: &[(u64, &str)]) -> Self {
        self.replies.push_back(
            chunks
                .iter()
                .map(|(ms, text)| (Duration::from_millis(*ms), text.as_bytes().to_vec()))
                .collect(),
        );
        self
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    fn release_due(&mut self) {
        let now = self.clock.elapsed();
        let mut idx = 0;
        while idx < self.pending.len() {
            if self.pending[idx].0 <= now {
                let (_, bytes) = self.pending.remove(idx);
                self.buffered.extend(bytes);
            } else {
                idx += 1;
            }
        }
    }
}

impl ByteChannel for ScriptedChannel {
    fn available(&mut self) -> LinkResult<usize> {
        self.release_due();
        Ok(self.buffered.len())
    }

    fn read_byte(&mut self) -> LinkResult<Option<u8>> {
        self.release_due();
        Ok(self.buffered.pop_front())
    }

    fn write_all(&mut self, bytes: &[u8]) -> LinkResult<()> {
        self.written.extend_from_slice(bytes);
        while let Some(end) = self.written.windows(2).position(|pair| pair == b"\r\n") {
            let line: Vec<u8> = self.written.drain(..end + 2).collect();
            self.lines
                .push(String::from_utf8_lossy(&line[..end]).into_owned());
            if let Some(chunks) = self.replies.pop_front() {
                for (after, bytes) in chunks {
                    self.deliver_after(after, &bytes);
                }
            }
        }
        Ok(())
    }
}

// Console that records echoes and can be preloaded with stray input.
#[derive(Default)]
pub struct RecordingConsole {
    pub input: VecDeque<u8>,
    pub echoed: Vec<u8>,
}

impl ByteChannel for RecordingConsole {
    fn available(&mut self) -> LinkResult<usize> {
        Ok(self.input.len())
    }

    fn read_byte(&mut self) -> LinkResult<Option<u8>> {
        Ok(self.input.pop_front())
    }

    fn write_all(&mut self, bytes: &[u8]) -> LinkResult<()> {
        self.echoed.extend_from_slice(bytes);
        Ok(())
    }
}

// NMEA helper: wrap a sentence body with `$`, its XOR checksum and CRLF.
pub fn nmea_sentence(body: &str) -> String {
    let checksum = body.bytes().fold(0_u8, |acc, byte| acc ^ byte);
    format!("${body}*{checksum:02X}\r\n")
}
