/*!
# Watchtower DevKit - Test doubles for the monitor

Helpers for exercising the monitor without a network:
- `ScriptedProbe`: per-address probe outcomes played back in order
- `RecordingAlertSink`, `RecordingCue`, `MemoryLog`: capture what was sent
- `TestHarness`: a wired monitor + scheduler with expectations on alerts
*/

pub mod probe_stub;
pub mod sinks;
pub mod test_utils;

pub use probe_stub::ScriptedProbe;
pub use sinks::{MemoryLog, RecordingAlertSink, RecordingCue, SentAlert};
pub use test_utils::TestHarness;
