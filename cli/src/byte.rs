// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Byte streams.
//!
//! [`ByteIo`] is the interface a UART (or USB CDC endpoint, or test double)
//! provides to the shell. A driver only has to implement the non-blocking
//! single-byte operations [`get`](ByteIo::get) and [`put`](ByteIo::put); the
//! bulk operations have default implementations in terms of those, which a
//! driver with a FIFO may want to override.
//!
//! Results follow the `nb` convention: `WouldBlock` means "nothing right
//! now, try again later," and is not an error.

/// A bidirectional byte stream.
pub trait ByteIo {
    /// Error reported by the device.
    type Error;

    /// Takes one received byte, if one is waiting.
    fn get(&mut self) -> nb::Result<u8, Self::Error>;

    /// Queues one byte for transmission, if there's room.
    fn put(&mut self, byte: u8) -> nb::Result<(), Self::Error>;

    /// Takes as many received bytes as are waiting, up to `buf.len()`.
    /// Returns the number of bytes stored.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        for (n, slot) in buf.iter_mut().enumerate() {
            match self.get() {
                Ok(b) => *slot = b,
                Err(nb::Error::WouldBlock) => return Ok(n),
                Err(nb::Error::Other(e)) => return Err(e),
            }
        }
        Ok(buf.len())
    }

    /// Sends all of `bytes`, waiting for room as needed.
    ///
    /// The wait is a busy loop on [`put`](Self::put). If the transmitter
    /// never drains, this never returns, and neither does whoever called it
    /// (including the scheduler, when called from a service).
    fn write(&mut self, bytes: &[u8]) -> Result<(), Self::Error> {
        for &b in bytes {
            nb::block!(self.put(b))?;
        }
        Ok(())
    }

    /// Sends a string, waiting for room as needed.
    fn write_str(&mut self, s: &str) -> Result<(), Self::Error> {
        self.write(s.as_bytes())
    }

    /// Sends `byte` `times` times, waiting for room as needed.
    fn put_repeat(&mut self, byte: u8, times: usize) -> Result<(), Self::Error> {
        for _ in 0..times {
            nb::block!(self.put(byte))?;
        }
        Ok(())
    }

    /// Discards everything that has been received but not yet read.
    fn rx_reset(&mut self) {
        while self.get().is_ok() {}
    }
}

/// Adapts a [`ByteIo`] to [`core::fmt::Write`], so that `write!` works on
/// it.
///
/// `fmt::Error` carries no information, so the device error that caused a
/// failed write is kept here; see [`take_error`](Self::take_error).
pub struct Writer<'a, IO: ByteIo> {
    io: &'a mut IO,
    error: Option<IO::Error>,
}

impl<'a, IO: ByteIo> Writer<'a, IO> {
    /// Wraps `io`.
    pub fn new(io: &'a mut IO) -> Self {
        Self { io, error: None }
    }

    /// Returns the device error from the first failed write, if any.
    pub fn take_error(&mut self) -> Option<IO::Error> {
        self.error.take()
    }
}

impl<IO: ByteIo> core::fmt::Debug for Writer<'_, IO> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Writer")
            .field("failed", &self.error.is_some())
            .finish_non_exhaustive()
    }
}

impl<IO: ByteIo> core::fmt::Write for Writer<'_, IO> {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        if self.error.is_some() {
            return Err(core::fmt::Error);
        }
        self.io.write_str(s).map_err(|e| {
            self.error = Some(e);
            core::fmt::Error
        })
    }
}
