use anyhow::{Context, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

// Shared run flag cleared by Ctrl-C. Loops check it between iterations only;
// an exchange already on the wire runs to its own deadline.
#[derive(Clone)]
pub struct RunFlag(Arc<AtomicBool>);

impl RunFlag {
    pub fn install() -> Result<Self> {
        let flag = Self(Arc::new(AtomicBool::new(true)));
        let for_signal = flag.clone();
        ctrlc::set_handler(move || for_signal.stop())
            .context("installing Ctrl-C handler failed")?;
        Ok(flag)
    }

    pub fn is_running(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn stop(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}
