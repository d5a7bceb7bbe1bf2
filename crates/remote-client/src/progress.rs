use std::time::Duration;

use remote_proto::format::format_secs;
use remote_proto::protocol::{ControlPanelState, PlaybackState, PositionUpdate};

/// Local clock for the current track position.  Resynchronised by every
/// push and advanced by the core's tick between pushes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackProgress {
    pub position: Option<f64>,
    pub length: Option<f64>,
    pub playing: bool,
}

impl TrackProgress {
    pub fn apply_state(&mut self, state: &ControlPanelState) {
        self.set(state.playback_state, state.track_position, state.track_length);
    }

    pub fn apply_update(&mut self, update: &PositionUpdate) {
        self.set(update.playback_state, update.track_position, update.track_length);
    }

    fn set(&mut self, playback: PlaybackState, position: Option<f64>, length: Option<f64>) {
        self.playing = playback == PlaybackState::Playing;
        self.position = position;
        // Position-only deltas may omit the length of an unchanged track.
        if position.is_none() {
            self.length = None;
        } else if length.is_some() {
            self.length = length;
        }
    }

    /// No position means no active track; the display must be disabled.
    pub fn enabled(&self) -> bool {
        self.position.is_some()
    }

    /// Advances the clock; returns `true` if the position moved.
    pub fn tick(&mut self, elapsed: Duration) -> bool {
        if !self.playing {
            return false;
        }
        let Some(position) = self.position else {
            return false;
        };
        let mut next = position + elapsed.as_secs_f64();
        if let Some(length) = self.length {
            next = next.min(length);
        }
        self.position = Some(next);
        next != position
    }

    /// `"mm:ss/mm:ss"`, or `None` when disabled.
    pub fn hint(&self) -> Option<String> {
        let position = self.position?;
        Some(format!(
            "{}/{}",
            format_secs(position),
            format_secs(self.length.unwrap_or(0.0))
        ))
    }
}
