//! State carried across deep sleep
//!
//! [`CycleState`] is the only data that survives between wakes. The firmware
//! keeps it in RTC fast memory as a postcard-encoded [`RetainedImage`]
//! tagged with a magic word; anything that does not decode cleanly is
//! treated as a cold start.

use log::{info, warn};
use serde::{Deserialize, Serialize};
use thiserror_no_std::Error;

use crate::history::RingBuffer;
use crate::trend::BatteryHistory;

/// Battery voltages kept for trend detection
pub const HISTORY_CAPACITY: usize = 10;

/// Bytes reserved in retained memory for the encoded state
pub const RETAINED_STATE_SIZE: usize = 128;

/// Tags a valid image; bump the low byte when the layout changes.
const RETAINED_MAGIC: u32 = 0x5350_5201;

pub type VoltageHistory = BatteryHistory<HISTORY_CAPACITY>;

/// Why the chip came out of reset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeCause {
    /// Power applied or reset pressed; retained memory is not trustworthy
    PowerOn,
    /// Timer wake from deep sleep
    Timer,
    /// Any other wake source
    External,
}

impl WakeCause {
    pub const fn label(self) -> &'static str {
        match self {
            Self::PowerOn => "power-on / reset",
            Self::Timer => "timer",
            Self::External => "external",
        }
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateError {
    #[error("retained state is corrupt")]
    Corrupt,
    #[error("retained state does not fit the retained region")]
    Encode,
}

/// State persisted across deep sleep
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CycleState {
    pub boot_count: u32,
    /// Consecutive failed uploads, reset on success
    pub failed_uploads: u32,
    pub battery_history: VoltageHistory,
    /// Sleep scheduled at the end of the previous cycle
    pub last_sleep_minutes: u32,
}

impl CycleState {
    pub fn apply_upload_result(&mut self, success: bool) {
        if success {
            self.failed_uploads = 0;
        } else {
            self.failed_uploads = self.failed_uploads.saturating_add(1);
        }
    }

    /// Recover the state after a wake.
    ///
    /// Only a timer wake trusts retained memory; every other wake cause, and
    /// any image that fails to decode, starts from the default state.
    pub fn restore(bytes: &[u8], wake: WakeCause) -> Self {
        if wake != WakeCause::Timer {
            info!("Cold start ({}), resetting cycle state", wake.label());
            return Self::default();
        }

        match Self::decode(bytes) {
            Ok(state) => state,
            Err(e) => {
                warn!("Discarding retained state: {}", e);
                Self::default()
            }
        }
    }

    pub fn encode(&self, buf: &mut [u8; RETAINED_STATE_SIZE]) -> Result<usize, StateError> {
        let image = RetainedImage::from(self);
        postcard::to_slice(&image, buf)
            .map(|used| used.len())
            .map_err(|_| StateError::Encode)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, StateError> {
        let image: RetainedImage = postcard::from_bytes(bytes).map_err(|_| StateError::Corrupt)?;
        if image.magic != RETAINED_MAGIC {
            return Err(StateError::Corrupt);
        }

        let ring = RingBuffer::from_raw_parts(
            image.history,
            usize::from(image.write_index),
            image.full,
        )
        .ok_or(StateError::Corrupt)?;

        Ok(Self {
            boot_count: image.boot_count,
            failed_uploads: image.failed_uploads,
            battery_history: BatteryHistory::from_ring(ring),
            last_sleep_minutes: image.last_sleep_minutes,
        })
    }
}

/// Wire layout of the retained state
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
struct RetainedImage {
    magic: u32,
    boot_count: u32,
    failed_uploads: u32,
    last_sleep_minutes: u32,
    history: [f32; HISTORY_CAPACITY],
    write_index: u8,
    full: bool,
}

impl From<&CycleState> for RetainedImage {
    fn from(state: &CycleState) -> Self {
        let (slots, write_index, full) = state.battery_history.ring().raw_parts();
        Self {
            magic: RETAINED_MAGIC,
            boot_count: state.boot_count,
            failed_uploads: state.failed_uploads,
            last_sleep_minutes: state.last_sleep_minutes,
            history: *slots,
            // Always below HISTORY_CAPACITY
            write_index: write_index as u8,
            full,
        }
    }
}
