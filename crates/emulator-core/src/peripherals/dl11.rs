//! DL11 serial line console.
//!
//! Four word registers: receiver status (`RCSR`), receiver buffer (`RBUF`),
//! transmitter status (`XCSR`) and transmitter buffer (`XBUF`). Input bytes
//! are queued by the host; output bytes go straight to a writer.

use std::collections::VecDeque;
use std::io::Write;

use crate::memory::Device;
use crate::TrapKind;

/// Conventional console base address.
pub const DL11_BASE: u16 = 0o177560;
/// Window size in bytes.
pub const DL11_LEN: u16 = 8;

/// Receiver status register offset.
pub const RCSR: u16 = 0;
/// Receiver buffer register offset.
pub const RBUF: u16 = 2;
/// Transmitter status register offset.
pub const XCSR: u16 = 4;
/// Transmitter buffer register offset.
pub const XBUF: u16 = 6;

/// Status bit: receiver has a byte / transmitter can accept one.
pub const CSR_READY: u16 = 0o200;
/// Status bit: interrupt enable. Stored but never acted on.
pub const CSR_INTERRUPT_ENABLE: u16 = 0o100;

/// Console device writing transmitted bytes to `W`.
#[derive(Debug)]
pub struct Dl11<W: Write> {
    input: VecDeque<u8>,
    output: W,
    rcsr: u16,
    xcsr: u16,
}

impl<W: Write> Dl11<W> {
    /// Creates a console with an empty input queue.
    #[must_use]
    pub const fn new(output: W) -> Self {
        Self {
            input: VecDeque::new(),
            output,
            rcsr: 0,
            xcsr: 0,
        }
    }

    /// Queues bytes for the receiver.
    pub fn push_input(&mut self, bytes: &[u8]) {
        self.input.extend(bytes);
    }

    /// Builder form of [`Dl11::push_input`].
    #[must_use]
    pub fn with_input(mut self, bytes: &[u8]) -> Self {
        self.push_input(bytes);
        self
    }

    /// Bytes waiting in the receiver.
    #[must_use]
    pub fn pending_input(&self) -> usize {
        self.input.len()
    }

    fn register(&mut self, reg: u16) -> Result<u16, TrapKind> {
        match reg {
            RCSR => {
                let ready = if self.input.is_empty() { 0 } else { CSR_READY };
                Ok(self.rcsr | ready)
            }
            RBUF => Ok(self.input.pop_front().map_or(0, u16::from)),
            XCSR => Ok(self.xcsr | CSR_READY),
            XBUF => Ok(0),
            _ => Err(TrapKind::MemoryManagement),
        }
    }

    fn transmit(&mut self, byte: u8) -> Result<(), TrapKind> {
        self.output
            .write_all(&[byte])
            .and_then(|()| self.output.flush())
            .map_err(|err| {
                log::warn!("console output failed: {err}");
                TrapKind::MemoryManagement
            })
    }
}

impl<W: Write> Device for Dl11<W> {
    fn name(&self) -> &str {
        "dl11"
    }

    fn load(&mut self, offset: u16, buf: &mut [u8]) -> Result<(), TrapKind> {
        let reg = offset & !1;
        if buf.len() == 1 && offset & 1 == 1 {
            // high byte: no side effects
            let value = match reg {
                RBUF | XBUF => 0,
                _ => self.register(reg)?,
            };
            buf[0] = value.to_le_bytes()[1];
            return Ok(());
        }
        let value = self.register(reg)?;
        let bytes = value.to_le_bytes();
        buf.copy_from_slice(&bytes[..buf.len()]);
        Ok(())
    }

    fn store(&mut self, offset: u16, buf: &[u8]) -> Result<(), TrapKind> {
        let reg = offset & !1;
        let high_byte_only = buf.len() == 1 && offset & 1 == 1;
        match reg {
            RCSR | XCSR if high_byte_only => Ok(()),
            RCSR => {
                self.rcsr = u16::from(buf[0]) & CSR_INTERRUPT_ENABLE;
                Ok(())
            }
            XCSR => {
                self.xcsr = u16::from(buf[0]) & CSR_INTERRUPT_ENABLE;
                Ok(())
            }
            XBUF if high_byte_only => Ok(()),
            XBUF => self.transmit(buf[0]),
            RBUF => Ok(()),
            _ => Err(TrapKind::MemoryManagement),
        }
    }
}
