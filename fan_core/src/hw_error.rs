//! Maps `Box<dyn Error>` from trait boundaries to typed `FanError`.
//!
//! The traits in `fan_traits` use `Box<dyn Error + Send + Sync>`; this module
//! converts those to our typed error enum, with an optional feature-gated path
//! for `fan_hardware::HwError` downcasting.

use crate::error::FanError;

/// Map a trait-boundary error to a typed `FanError`.
///
/// Known hardware error types are downcast first; anything else becomes a
/// generic `FanError::Hardware` carrying the message.
pub fn map_hw_error(e: &(dyn std::error::Error + 'static)) -> FanError {
    #[cfg(feature = "hardware-errors")]
    {
        use fan_hardware::error::HwError;
        if let Some(hw) = e.downcast_ref::<HwError>() {
            return match hw {
                HwError::Gpio(_) | HwError::Pwm(_) | HwError::Io(_) => {
                    FanError::HardwareFault(hw.to_string())
                }
                HwError::AlreadySubscribed | HwError::Disconnected => {
                    FanError::Hardware(hw.to_string())
                }
            };
        }
    }

    FanError::Hardware(e.to_string())
}

/// Shorthand for turning a boxed trait error into an `eyre::Report`.
pub(crate) fn report(e: &fan_traits::BoxError) -> eyre::Report {
    eyre::Report::new(map_hw_error(&**e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_errors_keep_their_message() {
        let e = std::io::Error::other("line busy");
        match map_hw_error(&e) {
            FanError::Hardware(msg) => assert!(msg.contains("line busy")),
            other => panic!("unexpected mapping: {other:?}"),
        }
    }

    #[cfg(feature = "hardware-errors")]
    #[test]
    fn gpio_errors_are_faults() {
        let e = fan_hardware::error::HwError::Gpio("no such pin".into());
        assert!(matches!(map_hw_error(&e), FanError::HardwareFault(_)));
        let e = fan_hardware::error::HwError::AlreadySubscribed;
        assert!(matches!(map_hw_error(&e), FanError::Hardware(_)));
    }
}
