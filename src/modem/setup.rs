use crate::error::LinkResult;
use crate::modem::command::{AtCommand, Command, HttpSetting};
use crate::modem::engine::Engine;
use crate::shared::channel::ByteChannel;
use crate::shared::clock::Clock;
use std::time::Duration;
use tracing::{info, warn};

pub const DEFAULT_BOOT_WAIT: Duration = Duration::from_secs(30);

// Drop any PDP context and packet attach, then reboot the radio (`CFUN=1,1`).
pub fn reset_sequence() -> Vec<Command> {
    vec![
        AtCommand::Attention.into(),
        AtCommand::ActivateContext(0).into(),
        AtCommand::AttachPacketService(false).into(),
        AtCommand::SetFunctionality { level: 1, reset: true }.into(),
    ]
}

// Attach, bring PDP context 1 up and point the HTTP client at `url` with a
// JSON content type and automatic response output.
pub fn http_sequence(url: &str) -> Vec<Command> {
    vec![
        AtCommand::AttachPacketService(true).into(),
        AtCommand::ConfigureContext { context: 1, protocol: 1 }.into(),
        AtCommand::ActivateContext(1).into(),
        AtCommand::HttpConfig(HttpSetting::SslContextId(1)).into(),
        AtCommand::HttpConfig(HttpSetting::Url(url.to_string())).into(),
        AtCommand::HttpConfig(HttpSetting::ContextId(1)).into(),
        AtCommand::HttpConfig(HttpSetting::ResponseHeader(true)).into(),
        AtCommand::HttpConfig(HttpSetting::ResponseOutputAuto(true)).into(),
        AtCommand::HttpConfig(HttpSetting::RequestHeader(
            "Content-Type: application/json".to_string(),
        ))
        .into(),
    ]
}

// Each step is one exchange; replies are logged, never interpreted.
pub fn run_sequence<M, C, K>(
    engine: &mut Engine<M, C, K>,
    label: &str,
    commands: &[Command],
) -> LinkResult<()>
where
    M: ByteChannel,
    C: ByteChannel,
    K: Clock,
{
    for (step, cmd) in commands.iter().enumerate() {
        let response = engine
            .execute(cmd)
            .map_err(|err| err.chain(format!("{label} step {} ({cmd})", step + 1)))?;
        for fault in response.faults() {
            warn!(sequence = label, command = %cmd, "{fault}");
        }
    }
    Ok(())
}

pub fn bring_up<M, C, K>(
    engine: &mut Engine<M, C, K>,
    url: &str,
    boot_wait: Duration,
) -> LinkResult<()>
where
    M: ByteChannel,
    C: ByteChannel,
    K: Clock,
{
    info!("Resetting modem");
    run_sequence(engine, "reset", &reset_sequence())?;

    info!(?boot_wait, "Waiting for modem to reboot");
    engine.clock().sleep(boot_wait);

    info!(url, "Enabling packet data and HTTP client");
    run_sequence(engine, "http", &http_sequence(url))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modem::engine::EngineConfig;
    use crate::shared::testing::{ManualClock, RecordingConsole, ScriptedChannel};

    #[test]
    fn bring_up_issues_reset_then_http_configuration() {
        let clock = ManualClock::new();
        let modem = ScriptedChannel::new(clock.clone());
        let mut engine = Engine::new(
            modem,
            RecordingConsole::default(),
            clock.clone(),
            EngineConfig::default(),
        );

        bring_up(&mut engine, "https://tracker.example/gps.json", DEFAULT_BOOT_WAIT).unwrap();

        let lines = engine.modem().lines();
        assert_eq!(
            lines,
            &[
                "AT",
                "AT+QIACT=0",
                "AT+CGATT=0",
                "AT+CFUN=1,1",
                "AT+CGATT=1",
                "AT+QICSGP=1,1",
                "AT+QIACT=1",
                "AT+QHTTPCFG=\"sslctxid\",1",
                "AT+QHTTPCFG=\"url\",\"https://tracker.example/gps.json\"",
                "AT+QHTTPCFG=\"contextid\",1",
                "AT+QHTTPCFG=\"responseheader\",1",
                "AT+QHTTPCFG=\"rspout/auto\",1",
                "AT+QHTTPCFG=\"header\",\"Content-Type: application/json\"",
            ]
        );
        // 13 default 4 s windows plus the reboot wait.
        assert!(clock.elapsed() >= Duration::from_secs(13 * 4 + 30));
    }
}
