use crate::error::{LinkError, LinkResult};
use anyhow::{Context, Result};
use serialport::SerialPort;
use std::io::{self, Read, Write};
use std::time::Duration;

// Line-oriented byte stream as seen by the modem engine and the GPS path:
// poll how much is buffered, pull single bytes, push whole lines.
pub trait ByteChannel {
    fn available(&mut self) -> LinkResult<usize>;

    // `None` means the source had nothing after all (a short read timeout).
    fn read_byte(&mut self) -> LinkResult<Option<u8>>;

    fn write_all(&mut self, bytes: &[u8]) -> LinkResult<()>;

    fn write_line(&mut self, line: &str) -> LinkResult<()> {
        self.write_all(line.as_bytes())?;
        self.write_all(b"\r\n")
    }

    // Drop everything currently buffered and return how many bytes went.
    fn discard_input(&mut self) -> LinkResult<usize> {
        let mut discarded = 0;
        while self.available()? > 0 {
            if self.read_byte()?.is_none() {
                break;
            }
            discarded += 1;
        }
        Ok(discarded)
    }
}

impl<T: ByteChannel + ?Sized> ByteChannel for Box<T> {
    fn available(&mut self) -> LinkResult<usize> {
        (**self).available()
    }

    fn read_byte(&mut self) -> LinkResult<Option<u8>> {
        (**self).read_byte()
    }

    fn write_all(&mut self, bytes: &[u8]) -> LinkResult<()> {
        (**self).write_all(bytes)
    }

    fn discard_input(&mut self) -> LinkResult<usize> {
        (**self).discard_input()
    }
}

// Serial port backed channel (modem UART, GPS UART, optional debug console).
pub struct SerialChannel {
    name: String,
    port: Box<dyn SerialPort>,
}

impl SerialChannel {
    pub fn open(path: &str, baud_rate: u32, read_timeout: Duration) -> Result<Self> {
        let port = serialport::new(path, baud_rate)
            .timeout(read_timeout)
            .open()
            .with_context(|| format!("opening serial port failed: {} @ {}", path, baud_rate))?;
        Ok(Self {
            name: path.to_string(),
            port,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl ByteChannel for SerialChannel {
    fn available(&mut self) -> LinkResult<usize> {
        let pending = self
            .port
            .bytes_to_read()
            .map_err(|err| LinkError::from(err).chain(format!("polling {}", self.name)))?;
        Ok(pending as usize)
    }

    fn read_byte(&mut self) -> LinkResult<Option<u8>> {
        let mut byte = [0_u8; 1];
        match self.port.read(&mut byte) {
            Ok(0) => Ok(None),
            Ok(_) => Ok(Some(byte[0])),
            Err(err) if err.kind() == io::ErrorKind::TimedOut => Ok(None),
            Err(err) => Err(LinkError::from(err).chain(format!("reading {}", self.name))),
        }
    }

    fn write_all(&mut self, bytes: &[u8]) -> LinkResult<()> {
        self.port
            .write_all(bytes)
            .and_then(|_| self.port.flush())
            .map_err(|err| LinkError::from(err).chain(format!("writing {}", self.name)))
    }
}

// Diagnostic channel for the engine: a debug UART when given, stdout otherwise.
pub fn open_console(
    port: Option<&str>,
    baud_rate: u32,
    read_timeout: Duration,
) -> Result<Box<dyn ByteChannel>> {
    match port {
        Some(path) => Ok(Box::new(SerialChannel::open(path, baud_rate, read_timeout)?)),
        None => Ok(Box::new(StdoutConsole)),
    }
}

// Diagnostic console on the process stdout. It never has input to flush.
#[derive(Debug, Default)]
pub struct StdoutConsole;

impl ByteChannel for StdoutConsole {
    fn available(&mut self) -> LinkResult<usize> {
        Ok(0)
    }

    fn read_byte(&mut self) -> LinkResult<Option<u8>> {
        Ok(None)
    }

    fn write_all(&mut self, bytes: &[u8]) -> LinkResult<()> {
        let mut out = io::stdout().lock();
        out.write_all(bytes)?;
        out.flush()?;
        Ok(())
    }
}
