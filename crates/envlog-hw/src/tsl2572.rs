//! AMS TSL2572 ambient light sensor.
//!
//! Every register access goes through the command byte (bit 7 set); reads of
//! the two 16-bit ADC channels use the auto-increment protocol.

use crate::{Error, Result};
use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use tracing::debug;

/// Id register values of the TSL25721/25725 and TSL25723/25727 variants.
pub const CHIP_IDS: [u8; 2] = [0x34, 0x3D];

const COMMAND: u8 = 0x80;
const AUTO_INCREMENT: u8 = 0x20;

const REG_ENABLE: u8 = 0x00;
const REG_ATIME: u8 = 0x01;
const REG_CONTROL: u8 = 0x0F;
const REG_ID: u8 = 0x12;
const REG_STATUS: u8 = 0x13;
const REG_C0DATA: u8 = 0x14;

const ENABLE_PON: u8 = 0x01;
const ENABLE_AEN: u8 = 0x02;
const STATUS_AVALID: u8 = 0x01;

/// 37 integration cycles of 2.73 ms.
const ATIME: u8 = 0xDB;
const CYCLE_MS: f64 = 2.73;
const COUNTS_PER_CYCLE: u32 = 1024;

/// Readings above this share of full scale are treated as saturated.
const SATURATION: f64 = 0.9;

const POWER_ON_MS: u32 = 3;
const POLL_INTERVAL_MS: u32 = 10;
const MAX_POLLS: usize = 5;

/// Glass attenuation factor for an uncovered sensor.
const GLASS_ATTENUATION: f64 = 1.0;

/// Analog gain settings (CONTROL.AGAIN).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gain {
    X1 = 0b00,
    X8 = 0b01,
    X16 = 0b10,
    X120 = 0b11,
}

impl Gain {
    /// Gains tried by the auto-ranging measurement, most sensitive first.
    const AUTO_ORDER: [Gain; 4] = [Gain::X120, Gain::X16, Gain::X8, Gain::X1];

    /// Returns the multiplication factor.
    pub fn factor(&self) -> f64 {
        match self {
            Gain::X1 => 1.0,
            Gain::X8 => 8.0,
            Gain::X16 => 16.0,
            Gain::X120 => 120.0,
        }
    }
}

/// Raw channel counts of one integration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Channels {
    c0: u16,
    c1: u16,
}

fn integration_ms() -> f64 {
    (256 - ATIME as u32) as f64 * CYCLE_MS
}

fn full_scale() -> u32 {
    ((256 - ATIME as u32) * COUNTS_PER_CYCLE).min(u16::MAX as u32)
}

/// Converts channel counts to lux using the datasheet equation.
fn lux(channels: Channels, gain: Gain) -> f64 {
    let c0 = channels.c0 as f64;
    let c1 = channels.c1 as f64;
    let cpl = integration_ms() * gain.factor() / (GLASS_ATTENUATION * 60.0);
    let lux1 = (c0 - 1.87 * c1) / cpl;
    let lux2 = (0.63 * c0 - c1) / cpl;
    lux1.max(lux2).max(0.0)
}

/// TSL2572 driver.
pub struct Tsl2572<I2C, D> {
    i2c: I2C,
    delay: D,
    address: u8,
}

impl<I2C: I2c, D: DelayNs> Tsl2572<I2C, D> {
    /// Creates a driver for the device at `address`.
    pub fn new(i2c: I2C, delay: D, address: u8) -> Self {
        Self {
            i2c,
            delay,
            address,
        }
    }

    /// Probes the id register.
    pub fn check_id(&mut self) -> Result<()> {
        let id = self.read_register(REG_ID)?;
        if !CHIP_IDS.contains(&id) {
            return Err(Error::WrongChipId {
                address: self.address,
                actual: id,
            });
        }
        debug!("TSL2572 0x{:02X} identified (id 0x{:02X})", self.address, id);
        Ok(())
    }

    /// Measures illuminance in lux, choosing the most sensitive gain that
    /// does not saturate.
    ///
    /// Returns `Ok(None)` when the ADC never reports a valid integration.
    pub fn single_auto_measure(&mut self) -> Result<Option<f64>> {
        let threshold = (full_scale() as f64 * SATURATION) as u16;
        let mut last = None;

        for gain in Gain::AUTO_ORDER {
            let Some(channels) = self.integrate(gain)? else {
                return Ok(None);
            };
            last = Some((channels, gain));
            if channels.c0 < threshold && channels.c1 < threshold {
                break;
            }
            debug!("TSL2572 saturated at {:?}, lowering gain", gain);
        }

        Ok(last.map(|(channels, gain)| lux(channels, gain)))
    }

    /// Runs a single integration at `gain` and powers the device down again.
    fn integrate(&mut self, gain: Gain) -> Result<Option<Channels>> {
        self.write_register(REG_ENABLE, ENABLE_PON)?;
        self.delay.delay_ms(POWER_ON_MS);
        self.write_register(REG_ATIME, ATIME)?;
        self.write_register(REG_CONTROL, gain as u8)?;
        self.write_register(REG_ENABLE, ENABLE_PON | ENABLE_AEN)?;
        self.delay.delay_ms((integration_ms() * 1.2) as u32);

        let mut valid = false;
        for _ in 0..MAX_POLLS {
            if self.read_register(REG_STATUS)? & STATUS_AVALID != 0 {
                valid = true;
                break;
            }
            self.delay.delay_ms(POLL_INTERVAL_MS);
        }

        let channels = if valid {
            let mut data = [0u8; 4];
            self.i2c
                .write_read(
                    self.address,
                    &[COMMAND | AUTO_INCREMENT | REG_C0DATA],
                    &mut data,
                )
                .map_err(|e| Error::i2c(self.address, e))?;
            Some(Channels {
                c0: u16::from_le_bytes([data[0], data[1]]),
                c1: u16::from_le_bytes([data[2], data[3]]),
            })
        } else {
            debug!("TSL2572 0x{:02X} integration not valid", self.address);
            None
        };

        self.write_register(REG_ENABLE, 0x00)?;
        Ok(channels)
    }

    fn read_register(&mut self, reg: u8) -> Result<u8> {
        let mut buf = [0u8; 1];
        self.i2c
            .write_read(self.address, &[COMMAND | reg], &mut buf)
            .map_err(|e| Error::i2c(self.address, e))?;
        Ok(buf[0])
    }

    fn write_register(&mut self, reg: u8, value: u8) -> Result<()> {
        self.i2c
            .write(self.address, &[COMMAND | reg, value])
            .map_err(|e| Error::i2c(self.address, e))
    }
}
