use crate::error::LinkResult;
use crate::modem::command::{AtCommand, Command};
use crate::modem::engine::Engine;
use crate::shared::channel::ByteChannel;
use crate::shared::clock::Clock;
use crate::tracker::location::{Fix, Publish};
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct UploadConfig {
    // Seconds the modem waits for the body after `CONNECT`.
    pub input_timeout_secs: u16,
    // Seconds the modem waits for the server's answer.
    pub response_timeout_secs: u16,
    pub command_timeout: Duration,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            input_timeout_secs: 30,
            response_timeout_secs: 60,
            command_timeout: crate::modem::command::DEFAULT_COMMAND_TIMEOUT,
        }
    }
}

// `{"lat":<lat>,"long":<lon>}` with exactly nine fractional digits.
pub fn payload(fix: &Fix) -> String {
    format!("{{\"lat\":{:.9},\"long\":{:.9}}}", fix.latitude, fix.longitude)
}

// HTTP PUT of a position through the modem: declare the body length, then
// send the body. Delivery is assumed once both exchanges finish; the
// modem's status lines are logged and otherwise ignored.
pub struct UploadPipeline<'a, M, C, K> {
    engine: &'a mut Engine<M, C, K>,
    config: &'a UploadConfig,
}

impl<'a, M, C, K> UploadPipeline<'a, M, C, K>
where
    M: ByteChannel,
    C: ByteChannel,
    K: Clock,
{
    pub fn new(engine: &'a mut Engine<M, C, K>, config: &'a UploadConfig) -> Self {
        Self { engine, config }
    }
}

impl<M, C, K> Publish for UploadPipeline<'_, M, C, K>
where
    M: ByteChannel,
    C: ByteChannel,
    K: Clock,
{
    fn publish(&mut self, fix: Fix) -> LinkResult<()> {
        let body = payload(&fix);
        let declare = Command::new(AtCommand::HttpPut {
            length: body.len(),
            input_timeout_secs: self.config.input_timeout_secs,
            response_timeout_secs: self.config.response_timeout_secs,
        })
        .with_timeout(self.config.command_timeout);
        let send = Command::new(AtCommand::Body(body)).with_timeout(self.config.command_timeout);

        for cmd in [&declare, &send] {
            let response = self
                .engine
                .execute(cmd)
                .map_err(|err| err.chain("uploading position"))?;
            for fault in response.faults() {
                warn!(command = %cmd, "{fault}");
            }
        }
        info!(payload = %send, "Position uploaded");
        Ok(())
    }
}
