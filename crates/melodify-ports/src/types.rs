use serde::{Deserialize, Serialize};
use std::fmt;

pub type Micros = i64; // absolute time since piece start
pub type SampleTime = u64; // audio sample index, monotonic while stream running

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceId(pub String);

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AudioOutputDevice {
    pub id: DeviceId,
    pub name: String,
    pub default_config: AudioConfig,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct AudioConfig {
    pub sample_rate_hz: u32,
    pub channels: u16, // fixed 2 in v1
    pub buffer_size_frames: Option<u32>,
}

/// Linear amplitude in 0..=1; note triggers carry one of these, derived
/// from MIDI velocity through a perceptual curve.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize, Default)]
pub struct Gain01(pub f32);

impl Gain01 {
    pub fn new(value: f32) -> Self {
        Self(value.clamp(0.0, 1.0))
    }

    pub fn get(self) -> f32 {
        self.0
    }
}

/// One tone trigger or release, addressed to the synth.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum KeyEvent {
    On { key: u8, gain: Gain01 },
    Off { key: u8 },
}

/// A key event stamped with the sample time it should take effect at.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScheduledKeyEvent {
    pub at: SampleTime,
    pub event: KeyEvent,
}
