use crate::args::SendArgs;
use crate::modem::command::{AtCommand, Command};
use crate::modem::engine::Engine;
use crate::shared::channel::{SerialChannel, open_console};
use crate::shared::clock::SystemClock;
use crate::shared::lock::PortLock;
use anyhow::{Context, Result};
use tracing::{info, warn};

// Public send command entrypoint. Runs each given line as one exchange, the
// same way the tracker does, and leaves interpretation to the operator.
pub fn run_send(args: SendArgs) -> Result<()> {
    let _lock = PortLock::acquire(&args.modem.lock_dir, &args.modem.modem_port)?;
    let modem = SerialChannel::open(
        &args.modem.modem_port,
        args.modem.modem_baud,
        args.frame.read_timeout(),
    )?;
    let console = open_console(
        args.modem.console_port.as_deref(),
        args.modem.console_baud,
        args.frame.read_timeout(),
    )?;
    let mut engine = Engine::new(
        modem,
        console,
        SystemClock,
        args.modem.engine_config(&args.frame),
    );

    for text in &args.commands {
        let mut cmd = Command::new(AtCommand::Raw(text.clone()))
            .with_timeout(args.modem.command_timeout());
        if args.fill {
            cmd = cmd.filling_buffer();
        }

        let response = engine
            .execute(&cmd)
            .with_context(|| format!("exchange failed: {text}"))?;
        for fault in response.faults() {
            warn!(command = %text, "{fault}");
        }
        info!(
            command = %text,
            bytes = response.raw().len(),
            at = %response.received_at().format("%H:%M:%S%.3f"),
            "Exchange complete"
        );
    }
    Ok(())
}
