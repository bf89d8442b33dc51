//! Sector-aligned write pipeline.
//!
//! The sink is forward-only; a running sector counter is checked against
//! every declared write position so the emitted image can never drift
//! from the planned layout.

use std::io::{self, Write};

use crate::error::{Error, Result};
use crate::item::Item;
use crate::spec::SECTOR_SIZE;

pub(crate) const ZERO_SECTOR: [u8; SECTOR_SIZE as usize] = [0u8; SECTOR_SIZE as usize];

pub(crate) struct SectorStream<W: Write> {
  sink: W,
  write_sec_pos: u32,
}

impl<W: Write> SectorStream<W> {
  pub fn new(sink: W) -> Self {
    Self { sink, write_sec_pos: 0 }
  }

  pub fn position(&self) -> u32 {
    self.write_sec_pos
  }

  /// Writes `buffer` at `sector`, zero-padding up to the next sector
  /// boundary. Fails with [`Error::InvalidWrite`] when `sector` does not
  /// match the running position.
  pub fn write_sector(&mut self, buffer: &[u8], sector: u32) -> Result<()> {
    if sector != self.write_sec_pos {
      return Err(Error::InvalidWrite {
        expected: sector,
        actual: self.write_sec_pos,
      });
    }

    log::trace!("writing {} bytes at sector {sector}", buffer.len());
    self.sink.write_all(buffer)?;
    self.write_sec_pos += self.pad_to_boundary(buffer.len() as u64)?;
    Ok(())
  }

  /// Copies the item's bytes to the sink, pads to the next boundary and
  /// closes the item.
  pub fn write_item_aligned(&mut self, item: &mut Item) -> Result<u64> {
    let n = io::copy(item, &mut self.sink)?;
    self.write_sec_pos += self.pad_to_boundary(n)?;
    item.close();
    Ok(n)
  }

  /// Pads a write of `len` bytes out to the sector boundary; returns the
  /// number of sectors covered.
  fn pad_to_boundary(&mut self, len: u64) -> Result<u32> {
    let sector_size = u64::from(SECTOR_SIZE);
    let mut sectors = (len / sector_size) as u32;

    let trailing = (len % sector_size) as usize;
    if trailing != 0 {
      sectors += 1;
      self.sink.write_all(&ZERO_SECTOR[..SECTOR_SIZE as usize - trailing])?;
    }

    Ok(sectors)
  }
}
