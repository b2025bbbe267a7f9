//! Host transport information
//!
//! The host reports tempo, play state and position once per block. A change
//! from a stopped/paused state into playback or recording asks the script to
//! re-run `@init`, unless the script opted out via `ext_noinit`.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Transport states as seen by scripts (`play_state`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PlaybackState {
    Stopped,
    /// Audio is actively playing (default state)
    #[default]
    Playing,
    Paused,
    Recording,
    RecordingPaused,
}

impl PlaybackState {
    /// Numeric value stored in the `play_state` variable
    pub fn as_value(self) -> f64 {
        match self {
            PlaybackState::Stopped => 0.0,
            PlaybackState::Playing => 1.0,
            PlaybackState::Paused => 2.0,
            PlaybackState::Recording => 5.0,
            PlaybackState::RecordingPaused => 6.0,
        }
    }

    /// Check whether audio is being rendered in real time
    pub fn is_running(self) -> bool {
        matches!(self, PlaybackState::Playing | PlaybackState::Recording)
    }
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaybackState::Stopped => write!(f, "Stopped"),
            PlaybackState::Playing => write!(f, "Playing"),
            PlaybackState::Paused => write!(f, "Paused"),
            PlaybackState::Recording => write!(f, "Recording"),
            PlaybackState::RecordingPaused => write!(f, "RecordingPaused"),
        }
    }
}

/// Transport snapshot supplied by the host
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeInfo {
    /// Tempo in beats per minute
    pub tempo: f64,
    pub playback_state: PlaybackState,
    /// Position in seconds
    pub time_position: f64,
    /// Position in quarter notes
    pub beat_position: f64,
    /// Numerator and denominator
    pub time_signature: (u32, u32),
}

impl Default for TimeInfo {
    fn default() -> Self {
        Self {
            tempo: 120.0,
            playback_state: PlaybackState::Playing,
            time_position: 0.0,
            beat_position: 0.0,
            time_signature: (4, 4),
        }
    }
}

impl TimeInfo {
    /// Check whether moving from `previous` to `self` starts playback
    pub fn starts_playback(&self, previous: &TimeInfo) -> bool {
        !previous.playback_state.is_running() && self.playback_state.is_running()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_time_info() {
        let info = TimeInfo::default();
        assert_eq!(info.tempo, 120.0);
        assert_eq!(info.playback_state, PlaybackState::Playing);
        assert_eq!(info.time_signature, (4, 4));
    }

    #[test]
    fn test_play_state_values() {
        assert_eq!(PlaybackState::Stopped.as_value(), 0.0);
        assert_eq!(PlaybackState::Recording.as_value(), 5.0);
        assert_eq!(PlaybackState::RecordingPaused.to_string(), "RecordingPaused");
    }

    #[test]
    fn test_starts_playback() {
        let stopped = TimeInfo {
            playback_state: PlaybackState::Stopped,
            ..TimeInfo::default()
        };
        let playing = TimeInfo::default();
        let recording = TimeInfo {
            playback_state: PlaybackState::Recording,
            ..TimeInfo::default()
        };

        assert!(playing.starts_playback(&stopped));
        assert!(recording.starts_playback(&stopped));
        assert!(!recording.starts_playback(&playing));
        assert!(!stopped.starts_playback(&playing));
    }
}
