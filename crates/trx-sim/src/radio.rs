//! Virtual radio simulation
//!
//! Provides a simulated radio that produces the `status-update` frames a
//! trx-control server pushes when a radio's state changes.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::time::Instant;
use trx_protocol::{RadioId, STATUS_UPDATE_REQUEST};

/// A simulated radio behind a trx-control server
#[derive(Debug)]
pub struct VirtualRadio {
    /// Radio name as the server knows it
    id: RadioId,
    /// Current frequency in Hz
    frequency_hz: u64,
    /// Current operating mode
    mode: String,
    /// Status-update frames not yet taken
    pending_output: VecDeque<String>,
    /// Last state change timestamp
    last_change: Instant,
}

/// Configuration for creating a virtual radio
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VirtualRadioConfig {
    /// Radio name
    pub id: String,
    /// Initial frequency in Hz
    pub initial_frequency_hz: u64,
    /// Initial operating mode
    pub initial_mode: String,
}

impl Default for VirtualRadioConfig {
    fn default() -> Self {
        Self {
            id: "ft817".to_string(),
            initial_frequency_hz: 14_074_000, // 20m FT8
            initial_mode: "USB".to_string(),
        }
    }
}

impl VirtualRadio {
    /// Create a new virtual radio tuned to 20m FT8
    pub fn new(id: impl Into<RadioId>) -> Self {
        Self {
            id: id.into(),
            frequency_hz: 14_074_000,
            mode: "USB".to_string(),
            pending_output: VecDeque::new(),
            last_change: Instant::now(),
        }
    }

    /// Create a virtual radio from configuration
    pub fn from_config(config: VirtualRadioConfig) -> Self {
        Self {
            id: RadioId::new(config.id),
            frequency_hz: config.initial_frequency_hz,
            mode: config.initial_mode,
            pending_output: VecDeque::new(),
            last_change: Instant::now(),
        }
    }

    /// Get the radio's identifier
    pub fn id(&self) -> &RadioId {
        &self.id
    }

    /// Get the current frequency in Hz
    pub fn frequency_hz(&self) -> u64 {
        self.frequency_hz
    }

    /// Get the current operating mode
    pub fn mode(&self) -> &str {
        &self.mode
    }

    /// Get the time of last state change
    pub fn last_change(&self) -> Instant {
        self.last_change
    }

    /// Tune the radio and queue a status update
    pub fn set_frequency(&mut self, hz: u64) {
        if self.frequency_hz != hz {
            self.frequency_hz = hz;
            self.changed();
        }
    }

    /// Change mode and queue a status update
    pub fn set_mode(&mut self, mode: impl Into<String>) {
        let mode = mode.into();
        if self.mode != mode {
            self.mode = mode;
            self.changed();
        }
    }

    /// The `status-update` frame describing the current state
    pub fn status_frame(&self) -> String {
        json!({
            "request": STATUS_UPDATE_REQUEST,
            "from": self.id,
            "status": {
                "frequency": self.frequency_hz.to_string(),
                "mode": self.mode,
            },
        })
        .to_string()
    }

    /// Queue a status update for the current state
    pub fn send_status_report(&mut self) {
        self.pending_output.push_back(self.status_frame());
    }

    /// Take the next pending frame
    pub fn take_output(&mut self) -> Option<String> {
        self.pending_output.pop_front()
    }

    /// Check if there is pending output
    pub fn has_output(&self) -> bool {
        !self.pending_output.is_empty()
    }

    fn changed(&mut self) {
        self.last_change = Instant::now();
        self.send_status_report();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trx_protocol::{translate, Translation};

    #[test]
    fn test_status_frame_translates() {
        let radio = VirtualRadio::new("ft817");
        match translate(&radio.status_frame()).unwrap() {
            Translation::Forward(msg) => {
                assert_eq!(msg.radio.as_str(), "ft817");
                assert_eq!(msg.frequency, "14074000");
                assert_eq!(msg.mode, "USB");
            }
            other => panic!("Expected Forward, got {:?}", other),
        }
    }

    #[test]
    fn test_changes_queue_updates() {
        let mut radio = VirtualRadio::new("ic7300");
        assert!(!radio.has_output());

        radio.set_frequency(7_074_000);
        radio.set_mode("LSB");
        // No change, no update
        radio.set_mode("LSB");

        let first = radio.take_output().unwrap();
        let second = radio.take_output().unwrap();
        assert!(radio.take_output().is_none());
        assert!(first.contains("7074000") && first.contains("USB"));
        assert!(second.contains("7074000") && second.contains("LSB"));
    }

    #[test]
    fn test_from_config() {
        let radio = VirtualRadio::from_config(VirtualRadioConfig {
            id: "ft991".to_string(),
            initial_frequency_hz: 3_573_000,
            initial_mode: "DATA-U".to_string(),
        });
        assert_eq!(radio.id().as_str(), "ft991");
        assert_eq!(radio.frequency_hz(), 3_573_000);
        assert_eq!(radio.mode(), "DATA-U");
    }
}
