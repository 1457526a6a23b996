//! Status LED blink codes

use embedded_hal::digital::OutputPin;
use embedded_hal_async::delay::DelayNs;

use crate::cycle::SuppressReason;
use crate::policy::PowerState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlinkPattern {
    UploadSucceeded,
    UploadFailed,
    WifiFailed,
    LowBattery,
    Uvlo,
    SensorFault,
}

impl BlinkPattern {
    /// Number of flashes and the on/off time of each
    pub const fn timing(self) -> (u8, u32) {
        match self {
            Self::UploadSucceeded => (2, 200),
            Self::UploadFailed => (4, 100),
            Self::WifiFailed => (6, 100),
            Self::LowBattery => (7, 100),
            Self::Uvlo => (10, 50),
            Self::SensorFault => (3, 100),
        }
    }

    /// Pattern shown when the radio is kept off
    pub fn for_suppressed(reason: SuppressReason, state: PowerState) -> Self {
        match (reason, state) {
            (SuppressReason::PowerSafety, PowerState::Uvlo) => Self::Uvlo,
            (SuppressReason::PowerSafety, _) => Self::LowBattery,
            (SuppressReason::BatteryFault | SuppressReason::SensorFault, _) => Self::SensorFault,
        }
    }
}

/// Flash `pattern` on the LED. Pin errors are ignored; the LED is cosmetic.
pub async fn show<L, D>(led: &mut L, delay: &mut D, pattern: BlinkPattern)
where
    L: OutputPin,
    D: DelayNs,
{
    let (count, period_ms) = pattern.timing();
    for _ in 0..count {
        let _ = led.set_high();
        delay.delay_ms(period_ms).await;
        let _ = led.set_low();
        delay.delay_ms(period_ms).await;
    }
}
