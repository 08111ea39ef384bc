use std::time::Duration;

use crate::engine::RawProgress;

/// Percentage at which the engine is assumed to be muxing or transcoding.
pub const FINALIZING_THRESHOLD: f64 = 99.9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaylistPosition {
    /// 1-based item number
    pub current: usize,
    pub total: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressPhase {
    Downloading,
    Finalizing,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProgressEvent {
    pub downloaded_bytes: u64,
    pub total_bytes: u64,
    pub speed_bps: u64,
    pub eta_secs: u64,
    pub percentage: f64,
    pub playlist: Option<PlaylistPosition>,
}

impl ProgressEvent {
    pub fn phase(&self) -> ProgressPhase {
        if self.percentage >= FINALIZING_THRESHOLD {
            ProgressPhase::Finalizing
        } else {
            ProgressPhase::Downloading
        }
    }

    pub fn eta(&self) -> Option<Duration> {
        (self.eta_secs > 0).then(|| Duration::from_secs(self.eta_secs))
    }
}

/// `downloaded / total * 100`, clamped to [0, 100]; 0 when the total is unknown.
pub fn percentage(downloaded: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (downloaded as f64 / total as f64 * 100.0).clamp(0.0, 100.0)
}

/// Counts finished playlist items against the resolved item count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaylistCounter {
    finished: usize,
    total: usize,
}

impl PlaylistCounter {
    pub fn new(total: usize) -> Self {
        Self {
            finished: 0,
            total: total.max(1),
        }
    }

    pub fn finished(&self) -> usize {
        self.finished
    }

    pub fn total(&self) -> usize {
        self.total
    }

    /// Record one finished item and return its position.
    pub fn finish_item(&mut self) -> PlaylistPosition {
        self.finished += 1;
        // The engine may yield more items than the flat pass counted.
        self.total = self.total.max(self.finished);
        PlaylistPosition {
            current: self.finished,
            total: self.total,
        }
    }

    /// Position of the item currently transferring.
    pub fn in_progress(&self) -> PlaylistPosition {
        PlaylistPosition {
            current: (self.finished + 1).min(self.total),
            total: self.total,
        }
    }
}

/// Turns raw engine checkpoints into `ProgressEvent`s.
#[derive(Debug, Clone, Default)]
pub struct ProgressAggregator {
    playlist: Option<PlaylistCounter>,
}

impl ProgressAggregator {
    pub fn single() -> Self {
        Self { playlist: None }
    }

    pub fn playlist(total: usize) -> Self {
        Self {
            playlist: Some(PlaylistCounter::new(total)),
        }
    }

    pub fn translate(&self, raw: &RawProgress) -> ProgressEvent {
        let downloaded_bytes = non_negative(raw.downloaded_bytes);
        let total_bytes = match non_negative(raw.total_bytes) {
            0 => non_negative(raw.total_bytes_estimate),
            total => total,
        };

        ProgressEvent {
            downloaded_bytes,
            total_bytes,
            speed_bps: non_negative(raw.speed),
            eta_secs: non_negative(raw.eta),
            percentage: percentage(downloaded_bytes, total_bytes),
            playlist: self.playlist.map(|counter| counter.in_progress()),
        }
    }

    /// Advance the playlist counter; `None` outside playlist mode.
    pub fn finish_item(&mut self) -> Option<PlaylistPosition> {
        self.playlist.as_mut().map(PlaylistCounter::finish_item)
    }

    pub fn counter(&self) -> Option<&PlaylistCounter> {
        self.playlist.as_ref()
    }
}

fn non_negative(value: Option<f64>) -> u64 {
    match value {
        Some(v) if v.is_finite() && v > 0.0 => v as u64,
        _ => 0,
    }
}

pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", size as u64, UNITS[unit_index])
    } else {
        format!("{:.1} {}", size, UNITS[unit_index])
    }
}

pub fn format_speed(bytes_per_second: u64) -> String {
    if bytes_per_second == 0 {
        return "calculating...".to_string();
    }
    format!("{}/s", format_bytes(bytes_per_second))
}

/// `M:SS` countdown, or a placeholder while the engine has no estimate.
pub fn format_eta(seconds: u64) -> String {
    if seconds == 0 {
        return "calculating...".to_string();
    }
    format!("{}:{:02}", seconds / 60, seconds % 60)
}
