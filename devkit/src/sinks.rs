use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use watchtower_kernel::models::Device;
use watchtower_kernel::notify::{AlertSink, Cue, LogLine, LogSink, NotifyError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentAlert {
    pub subject: String,
    pub body: String,
}

/// Alert sink that remembers every alert. Can be switched to failing.
pub struct RecordingAlertSink {
    name: String,
    sent: Mutex<Vec<SentAlert>>,
    attempts: Mutex<usize>,
    failing: AtomicBool,
}

impl RecordingAlertSink {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            sent: Mutex::new(Vec::new()),
            attempts: Mutex::new(0),
            failing: AtomicBool::new(false),
        }
    }

    /// A sink whose every delivery is rejected.
    pub fn failing(name: &str) -> Self {
        let sink = Self::new(name);
        sink.set_failing(true);
        sink
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<SentAlert> {
        self.sent.lock().clone()
    }

    pub fn subjects(&self) -> Vec<String> {
        self.sent.lock().iter().map(|a| a.subject.clone()).collect()
    }

    /// Deliveries tried, failed ones included.
    pub fn attempts(&self) -> usize {
        *self.attempts.lock()
    }

    pub fn clear(&self) {
        self.sent.lock().clear();
        *self.attempts.lock() = 0;
    }
}

#[async_trait]
impl AlertSink for RecordingAlertSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn notify(&self, subject: &str, body: &str) -> Result<(), NotifyError> {
        *self.attempts.lock() += 1;
        if self.failing.load(Ordering::SeqCst) {
            return Err(NotifyError::Rejected(format!("{} is down", self.name)));
        }
        self.sent.lock().push(SentAlert { subject: subject.to_string(), body: body.to_string() });
        Ok(())
    }
}

/// Cue that records the names of devices it chimed for.
#[derive(Default)]
pub struct RecordingCue {
    chimes: Mutex<Vec<String>>,
}

impl RecordingCue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn chimes(&self) -> Vec<String> {
        self.chimes.lock().clone()
    }
}

impl Cue for RecordingCue {
    fn chime(&self, device: &Device) {
        self.chimes.lock().push(device.name.clone());
    }
}

/// Unbounded in-memory log sink.
#[derive(Default)]
pub struct MemoryLog {
    lines: Mutex<Vec<LogLine>>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.lines.lock().iter().map(|l| l.message.clone()).collect()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines.lock().iter().any(|l| l.message.contains(needle))
    }

    pub fn count(&self, needle: &str) -> usize {
        self.lines.lock().iter().filter(|l| l.message.contains(needle)).count()
    }

    pub fn clear(&self) {
        self.lines.lock().clear();
    }
}

impl LogSink for MemoryLog {
    fn write(&self, line: &LogLine) {
        self.lines.lock().push(line.clone());
    }
}
