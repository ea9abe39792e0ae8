use crate::config::CueKind;
use crate::models::Device;
use std::io::Write;
use std::sync::Arc;

/// Signal for a human watching the console. Fired on recovery.
pub trait Cue: Send + Sync {
    fn chime(&self, device: &Device);
}

/// Rings the terminal bell.
pub struct TerminalBell;

impl Cue for TerminalBell {
    fn chime(&self, device: &Device) {
        let mut out = std::io::stdout().lock();
        if out.write_all(b"\x07").and_then(|_| out.flush()).is_err() {
            tracing::debug!(device = %device.name, "terminal bell unavailable");
        }
    }
}

pub struct SilentCue;

impl Cue for SilentCue {
    fn chime(&self, _device: &Device) {}
}

pub fn cue_from_config(kind: CueKind) -> Arc<dyn Cue> {
    match kind {
        CueKind::Bell => Arc::new(TerminalBell),
        CueKind::Silent => Arc::new(SilentCue),
    }
}
