use std::time::Duration;

/// Timing knobs for the scan loop. Network timeouts live on the clients.
#[derive(Clone, Debug)]
pub struct ScanConfig {
    /// Trigger autofocus every this many frames.
    pub refocus_interval: u64,
    /// Pause after each periodic autofocus trigger.
    pub refocus_settle: Duration,
    /// Pause after the camera starts, before touching focus controls.
    pub warmup: Duration,
    /// Pause after switching to continuous autofocus.
    pub focus_settle: Duration,
    /// Pause after the initial autofocus trigger.
    pub autofocus_settle: Duration,
    /// Stop after this many frames; `None` runs until quit.
    pub max_frames: Option<u64>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            refocus_interval: 30,
            refocus_settle: Duration::from_millis(200),
            warmup: Duration::from_secs(2),
            focus_settle: Duration::from_secs(1),
            autofocus_settle: Duration::from_secs(2),
            max_frames: None,
        }
    }
}

impl ScanConfig {
    /// Default cadence with every settle delay removed.
    pub fn without_delays() -> Self {
        Self {
            refocus_settle: Duration::ZERO,
            warmup: Duration::ZERO,
            focus_settle: Duration::ZERO,
            autofocus_settle: Duration::ZERO,
            ..Self::default()
        }
    }
}
