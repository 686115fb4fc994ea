//! In-memory register-map bus for driver tests.

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{ErrorKind, ErrorType, I2c, NoAcknowledgeSource, Operation};

/// A fake I2C peripheral backed by a 256-byte register file.
///
/// The first byte of every write selects the register (after masking with
/// `register_mask`), following bytes are stored with auto-increment.
pub struct RegisterBus {
    address: u8,
    register_mask: u8,
    pointer: u8,
    pub regs: [u8; 256],
    pub writes: Vec<(u8, u8)>,
    pub fail: Option<ErrorKind>,
}

impl RegisterBus {
    pub fn new(address: u8, register_mask: u8) -> Self {
        Self {
            address,
            register_mask,
            pointer: 0,
            regs: [0; 256],
            writes: Vec::new(),
            fail: None,
        }
    }

    pub fn load(&mut self, start: u8, bytes: &[u8]) {
        for (i, b) in bytes.iter().enumerate() {
            self.regs[start as usize + i] = *b;
        }
    }

    pub fn wrote(&self, reg: u8, value: u8) -> bool {
        self.writes.contains(&(reg, value))
    }
}

impl ErrorType for RegisterBus {
    type Error = ErrorKind;
}

impl I2c for RegisterBus {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        if let Some(kind) = self.fail {
            return Err(kind);
        }
        if address != self.address {
            return Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address));
        }

        for op in operations {
            match op {
                Operation::Write(bytes) => {
                    if let Some((first, rest)) = bytes.split_first() {
                        self.pointer = first & self.register_mask;
                        for (i, b) in rest.iter().enumerate() {
                            let reg = self.pointer.wrapping_add(i as u8);
                            self.regs[reg as usize] = *b;
                            self.writes.push((reg, *b));
                        }
                    }
                }
                Operation::Read(buf) => {
                    for (i, b) in buf.iter_mut().enumerate() {
                        *b = self.regs[self.pointer.wrapping_add(i as u8) as usize];
                    }
                }
            }
        }
        Ok(())
    }
}

/// Delay that returns immediately.
pub struct NoDelay;

impl DelayNs for NoDelay {
    fn delay_ns(&mut self, _ns: u32) {}
}
