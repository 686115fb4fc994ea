//! Bosch BME280 pressure, humidity and temperature sensor.
//!
//! Conversions run in forced mode with x1 oversampling on every channel; the
//! compensation follows the floating point formulas of the datasheet
//! (section 8.1).

use crate::{Error, Result};
use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use tracing::debug;

/// Value of the id register on a genuine BME280.
pub const CHIP_ID: u8 = 0x60;

const REG_CALIB_TP: u8 = 0x88;
const REG_CHIP_ID: u8 = 0xD0;
const REG_CALIB_H: u8 = 0xE1;
const REG_CTRL_HUM: u8 = 0xF2;
const REG_STATUS: u8 = 0xF3;
const REG_CTRL_MEAS: u8 = 0xF4;
const REG_DATA: u8 = 0xF7;

const CALIB_TP_LEN: usize = 26;
const CALIB_H_LEN: usize = 7;

/// osrs_h = x1
const CTRL_HUM_X1: u8 = 0x01;
/// osrs_t = x1, osrs_p = x1, mode = forced
const CTRL_MEAS_FORCED: u8 = (0b001 << 5) | (0b001 << 2) | 0b01;

const STATUS_MEASURING: u8 = 0x08;

/// ADC value reported for a skipped temperature or pressure conversion.
const SKIPPED_20BIT: u32 = 0x80000;

/// Typical conversion time for x1/x1/x1 is about 8 ms.
const CONVERSION_WAIT_MS: u32 = 10;
const POLL_INTERVAL_MS: u32 = 2;
const MAX_POLLS: usize = 10;

/// Factory trimming parameters stored in the sensor NVM.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibration {
    t1: u16,
    t2: i16,
    t3: i16,
    p1: u16,
    p2: i16,
    p3: i16,
    p4: i16,
    p5: i16,
    p6: i16,
    p7: i16,
    p8: i16,
    p9: i16,
    h1: u8,
    h2: i16,
    h3: u8,
    h4: i16,
    h5: i16,
    h6: i8,
}

impl Calibration {
    /// Decodes the two calibration blocks (0x88..=0xA1 and 0xE1..=0xE7).
    pub fn parse(tp: &[u8; CALIB_TP_LEN], h: &[u8; CALIB_H_LEN]) -> Self {
        let u16_at = |i: usize| u16::from_le_bytes([tp[i], tp[i + 1]]);
        let i16_at = |i: usize| i16::from_le_bytes([tp[i], tp[i + 1]]);

        // H4 and H5 share the nibbles of 0xE5.
        let h4 = ((h[3] as i8 as i16) << 4) | (h[4] & 0x0F) as i16;
        let h5 = ((h[5] as i8 as i16) << 4) | (h[4] >> 4) as i16;

        Self {
            t1: u16_at(0),
            t2: i16_at(2),
            t3: i16_at(4),
            p1: u16_at(6),
            p2: i16_at(8),
            p3: i16_at(10),
            p4: i16_at(12),
            p5: i16_at(14),
            p6: i16_at(16),
            p7: i16_at(18),
            p8: i16_at(20),
            p9: i16_at(22),
            h1: tp[25],
            h2: i16::from_le_bytes([h[0], h[1]]),
            h3: h[2],
            h4,
            h5,
            h6: h[6] as i8,
        }
    }

    /// Returns (temperature in °C, t_fine).
    fn temperature(&self, adc_t: u32) -> (f64, f64) {
        let adc_t = adc_t as f64;
        let t1 = self.t1 as f64;
        let var1 = (adc_t / 16384.0 - t1 / 1024.0) * self.t2 as f64;
        let var2 = (adc_t / 131072.0 - t1 / 8192.0).powi(2) * self.t3 as f64;
        let t_fine = var1 + var2;
        (t_fine / 5120.0, t_fine)
    }

    /// Pressure in Pa.
    fn pressure(&self, adc_p: u32, t_fine: f64) -> f64 {
        let mut var1 = t_fine / 2.0 - 64000.0;
        let mut var2 = var1 * var1 * self.p6 as f64 / 32768.0;
        var2 += var1 * self.p5 as f64 * 2.0;
        var2 = var2 / 4.0 + self.p4 as f64 * 65536.0;
        var1 = (self.p3 as f64 * var1 * var1 / 524288.0 + self.p2 as f64 * var1) / 524288.0;
        var1 = (1.0 + var1 / 32768.0) * self.p1 as f64;
        if var1 == 0.0 {
            // avoid division by zero on an unprogrammed part
            return 0.0;
        }
        let mut p = 1048576.0 - adc_p as f64;
        p = (p - var2 / 4096.0) * 6250.0 / var1;
        let var1 = self.p9 as f64 * p * p / 2147483648.0;
        let var2 = p * self.p8 as f64 / 32768.0;
        p + (var1 + var2 + self.p7 as f64) / 16.0
    }

    /// Relative humidity in %RH, clamped to 0..=100.
    fn humidity(&self, adc_h: u32, t_fine: f64) -> f64 {
        let mut h = t_fine - 76800.0;
        h = (adc_h as f64 - (self.h4 as f64 * 64.0 + self.h5 as f64 / 16384.0 * h))
            * (self.h2 as f64 / 65536.0
                * (1.0
                    + self.h6 as f64 / 67108864.0
                        * h
                        * (1.0 + self.h3 as f64 / 67108864.0 * h)));
        h *= 1.0 - self.h1 as f64 * h / 524288.0;
        h.clamp(0.0, 100.0)
    }
}

/// One compensated reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    /// Temperature in °C.
    pub temperature: f64,
    /// Relative humidity in %RH.
    pub humidity: f64,
    /// Pressure in hPa.
    pub pressure: f64,
}

/// BME280 driver.
pub struct Bme280<I2C, D> {
    i2c: I2C,
    delay: D,
    address: u8,
    calibration: Option<Calibration>,
}

impl<I2C: I2c, D: DelayNs> Bme280<I2C, D> {
    /// Creates a driver for the device at `address`. No bus traffic happens
    /// until [`Bme280::check_id`] or [`Bme280::forced`] is called.
    pub fn new(i2c: I2C, delay: D, address: u8) -> Self {
        Self {
            i2c,
            delay,
            address,
            calibration: None,
        }
    }

    /// Probes the id register and loads the calibration data.
    pub fn check_id(&mut self) -> Result<()> {
        let id = self.read_register(REG_CHIP_ID)?;
        if id != CHIP_ID {
            return Err(Error::WrongChipId {
                address: self.address,
                actual: id,
            });
        }
        self.calibration = Some(self.read_calibration()?);
        debug!("BME280 0x{:02X} identified", self.address);
        Ok(())
    }

    /// Runs one forced-mode conversion.
    ///
    /// Returns `Ok(None)` when the device keeps reporting a conversion in
    /// progress or reports skipped channels.
    pub fn forced(&mut self) -> Result<Option<Measurement>> {
        let calibration = match self.calibration {
            Some(calibration) => calibration,
            None => {
                let calibration = self.read_calibration()?;
                self.calibration = Some(calibration);
                calibration
            }
        };

        // ctrl_hum only takes effect after a write to ctrl_meas
        self.write_register(REG_CTRL_HUM, CTRL_HUM_X1)?;
        self.write_register(REG_CTRL_MEAS, CTRL_MEAS_FORCED)?;
        self.delay.delay_ms(CONVERSION_WAIT_MS);

        if !self.wait_idle()? {
            debug!("BME280 0x{:02X} still measuring", self.address);
            return Ok(None);
        }

        let mut data = [0u8; 8];
        self.i2c
            .write_read(self.address, &[REG_DATA], &mut data)
            .map_err(|e| Error::i2c(self.address, e))?;

        let adc_p = (data[0] as u32) << 12 | (data[1] as u32) << 4 | (data[2] as u32) >> 4;
        let adc_t = (data[3] as u32) << 12 | (data[4] as u32) << 4 | (data[5] as u32) >> 4;
        let adc_h = (data[6] as u32) << 8 | data[7] as u32;

        if adc_t == SKIPPED_20BIT || adc_p == SKIPPED_20BIT {
            debug!("BME280 0x{:02X} returned skipped channels", self.address);
            return Ok(None);
        }

        let (temperature, t_fine) = calibration.temperature(adc_t);
        let pressure = calibration.pressure(adc_p, t_fine) / 100.0;
        let humidity = calibration.humidity(adc_h, t_fine);

        Ok(Some(Measurement {
            temperature,
            humidity,
            pressure,
        }))
    }

    fn wait_idle(&mut self) -> Result<bool> {
        for _ in 0..MAX_POLLS {
            if self.read_register(REG_STATUS)? & STATUS_MEASURING == 0 {
                return Ok(true);
            }
            self.delay.delay_ms(POLL_INTERVAL_MS);
        }
        Ok(false)
    }

    fn read_calibration(&mut self) -> Result<Calibration> {
        let mut tp = [0u8; CALIB_TP_LEN];
        let mut h = [0u8; CALIB_H_LEN];
        self.i2c
            .write_read(self.address, &[REG_CALIB_TP], &mut tp)
            .map_err(|e| Error::i2c(self.address, e))?;
        self.i2c
            .write_read(self.address, &[REG_CALIB_H], &mut h)
            .map_err(|e| Error::i2c(self.address, e))?;
        Ok(Calibration::parse(&tp, &h))
    }

    fn read_register(&mut self, reg: u8) -> Result<u8> {
        let mut buf = [0u8; 1];
        self.i2c
            .write_read(self.address, &[reg], &mut buf)
            .map_err(|e| Error::i2c(self.address, e))?;
        Ok(buf[0])
    }

    fn write_register(&mut self, reg: u8, value: u8) -> Result<()> {
        self.i2c
            .write(self.address, &[reg, value])
            .map_err(|e| Error::i2c(self.address, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{NoDelay, RegisterBus};
    use embedded_hal::i2c::{ErrorKind, NoAcknowledgeSource};

    const ADDRESS: u8 = 0x76;

    /// Datasheet example trimming for T and P, humidity from a real part.
    fn calibration_bytes() -> ([u8; CALIB_TP_LEN], [u8; CALIB_H_LEN]) {
        let words: [i32; 12] = [
            27504, 26435, -1000, 36477, -10685, 3024, 2855, 140, -7, 15500, -14600, 6000,
        ];
        let mut tp = [0u8; CALIB_TP_LEN];
        for (i, w) in words.iter().enumerate() {
            let bytes = (*w as u16).to_le_bytes();
            tp[i * 2] = bytes[0];
            tp[i * 2 + 1] = bytes[1];
        }
        tp[25] = 75; // H1

        // H2 = 362, H3 = 0, H4 = 313, H5 = 50, H6 = 30
        let h = [0x6A, 0x01, 0x00, 0x13, 0x29, 0x03, 0x1E];
        (tp, h)
    }

    fn bus() -> RegisterBus {
        let mut bus = RegisterBus::new(ADDRESS, 0xFF);
        let (tp, h) = calibration_bytes();
        bus.load(REG_CALIB_TP, &tp);
        bus.load(REG_CALIB_H, &h);
        bus.regs[REG_CHIP_ID as usize] = CHIP_ID;
        bus
    }

    fn load_adc(bus: &mut RegisterBus, adc_p: u32, adc_t: u32, adc_h: u16) {
        bus.load(
            REG_DATA,
            &[
                (adc_p >> 12) as u8,
                (adc_p >> 4) as u8,
                ((adc_p & 0x0F) << 4) as u8,
                (adc_t >> 12) as u8,
                (adc_t >> 4) as u8,
                ((adc_t & 0x0F) << 4) as u8,
                (adc_h >> 8) as u8,
                adc_h as u8,
            ],
        );
    }

    #[test]
    fn test_parse_calibration() {
        let (tp, h) = calibration_bytes();
        let cal = Calibration::parse(&tp, &h);
        assert_eq!(cal.t1, 27504);
        assert_eq!(cal.t3, -1000);
        assert_eq!(cal.p8, -14600);
        assert_eq!(cal.h1, 75);
        assert_eq!(cal.h2, 362);
        assert_eq!(cal.h4, 313);
        assert_eq!(cal.h5, 50);
        assert_eq!(cal.h6, 30);
    }

    #[test]
    fn test_compensation_matches_datasheet() {
        let (tp, h) = calibration_bytes();
        let cal = Calibration::parse(&tp, &h);
        let (temp, t_fine) = cal.temperature(519888);
        assert!((temp - 25.08).abs() < 0.01, "temperature {}", temp);

        let pressure = cal.pressure(415148, t_fine) / 100.0;
        assert!((pressure - 1006.53).abs() < 0.5, "pressure {}", pressure);
    }

    #[test]
    fn test_check_id() {
        let mut sensor = Bme280::new(bus(), NoDelay, ADDRESS);
        assert!(sensor.check_id().is_ok());

        let mut wrong = bus();
        wrong.regs[REG_CHIP_ID as usize] = 0x58; // BMP280
        let mut sensor = Bme280::new(wrong, NoDelay, ADDRESS);
        assert!(matches!(
            sensor.check_id(),
            Err(Error::WrongChipId { actual: 0x58, .. })
        ));
    }

    #[test]
    fn test_check_id_absent_device() {
        let mut sensor = Bme280::new(bus(), NoDelay, 0x77);
        let err = sensor.check_id().unwrap_err();
        assert!(err.is_no_acknowledge());
    }

    #[test]
    fn test_forced_measurement() {
        let mut bus = bus();
        load_adc(&mut bus, 415148, 519888, 0x6000);
        let mut sensor = Bme280::new(bus, NoDelay, ADDRESS);
        sensor.check_id().unwrap();

        let m = sensor.forced().unwrap().expect("measurement");
        assert!((m.temperature - 25.08).abs() < 0.01);
        assert!((m.pressure - 1006.53).abs() < 0.5);
        assert!((0.0..=100.0).contains(&m.humidity));
        assert!(sensor.i2c.wrote(REG_CTRL_HUM, CTRL_HUM_X1));
        assert!(sensor.i2c.wrote(REG_CTRL_MEAS, CTRL_MEAS_FORCED));
    }

    #[test]
    fn test_forced_not_ready() {
        let mut bus = bus();
        load_adc(&mut bus, 415148, 519888, 0x6000);
        bus.regs[REG_STATUS as usize] = STATUS_MEASURING;
        let mut sensor = Bme280::new(bus, NoDelay, ADDRESS);
        assert_eq!(sensor.forced().unwrap(), None);
    }

    #[test]
    fn test_forced_skipped_channel() {
        let mut bus = bus();
        load_adc(&mut bus, 415148, SKIPPED_20BIT, 0x6000);
        let mut sensor = Bme280::new(bus, NoDelay, ADDRESS);
        assert_eq!(sensor.forced().unwrap(), None);
    }

    #[test]
    fn test_forced_bus_error() {
        let mut bus = bus();
        bus.fail = Some(ErrorKind::Bus);
        let mut sensor = Bme280::new(bus, NoDelay, ADDRESS);
        assert!(matches!(
            sensor.forced(),
            Err(Error::I2c {
                kind: ErrorKind::Bus,
                ..
            })
        ));

        let mut bus = self::bus();
        bus.fail = Some(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Data));
        let mut sensor = Bme280::new(bus, NoDelay, ADDRESS);
        assert!(sensor.forced().unwrap_err().is_no_acknowledge());
    }
}
