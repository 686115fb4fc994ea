//! Error types for the envlog hardware library.

use embedded_hal::i2c::ErrorKind;
use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when talking to a sensor.
#[derive(Error, Debug)]
pub enum Error {
    /// The I2C bus device could not be opened.
    #[error("I2C bus {bus} unavailable: {reason}")]
    BusUnavailable { bus: String, reason: String },

    /// A transfer on the I2C bus failed.
    #[error("I2C transfer with 0x{address:02X} failed: {kind}")]
    I2c { address: u8, kind: ErrorKind },

    /// The device answered but its identification register was wrong.
    #[error("Unexpected chip id at 0x{address:02X}: 0x{actual:02X}")]
    WrongChipId { address: u8, actual: u8 },

    /// Reading a sysfs metric failed.
    #[error("Failed to read {path}: {source}")]
    Sysfs {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// A sysfs metric did not contain a number.
    #[error("Malformed value in {path}: {value:?}")]
    Malformed { path: String, value: String },
}

impl Error {
    /// Wraps an `embedded-hal` bus error for the device at `address`.
    pub(crate) fn i2c<E: embedded_hal::i2c::Error>(address: u8, err: E) -> Self {
        Error::I2c {
            address,
            kind: err.kind(),
        }
    }

    /// Returns true when the device did not acknowledge its address.
    pub fn is_no_acknowledge(&self) -> bool {
        matches!(
            self,
            Error::I2c {
                kind: ErrorKind::NoAcknowledge(_),
                ..
            }
        )
    }
}
