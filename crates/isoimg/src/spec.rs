//! ECMA-119 on-disk record types and their byte-exact encoders.
//!
//! Every encoder here has a deterministic output length fixed by its
//! inputs; the layout planner relies on that to do sector arithmetic
//! before any byte is produced.

use chrono::{Datelike, Timelike};

use crate::error::{Error, Result};

/// Logical sector size. All image offsets are multiples of this.
pub const SECTOR_SIZE: u32 = 2048;

/// ECMA-119 standard identifier, present in every volume descriptor.
pub const STANDARD_IDENTIFIER: &[u8; 5] = b"CD001";

/// El Torito boot system identifier (boot volume descriptor, bytes 7..39).
pub const EL_TORITO_IDENTIFIER: &[u8] = b"EL TORITO SPECIFICATION";

pub(crate) const VOLUME_TYPE_BOOT: u8 = 0;
pub(crate) const VOLUME_TYPE_PRIMARY: u8 = 1;
pub(crate) const VOLUME_TYPE_TERMINATOR: u8 = 255;

/// Sectors needed to hold `size` bytes; zero-length needs zero sectors.
pub(crate) fn sectors_for(size: u64) -> u32 {
  ((size + u64::from(SECTOR_SIZE) - 1) / u64::from(SECTOR_SIZE)) as u32
}

/// ECMA-119 7.2.3 / 7.3.3 both-byte-order fields: little-endian first.
fn put_both_u16(out: &mut [u8], value: u16) {
  out[0..2].copy_from_slice(&value.to_le_bytes());
  out[2..4].copy_from_slice(&value.to_be_bytes());
}

fn put_both_u32(out: &mut [u8], value: u32) {
  out[0..4].copy_from_slice(&value.to_le_bytes());
  out[4..8].copy_from_slice(&value.to_be_bytes());
}

/// Space-padded character field (a-characters and d-characters alike are
/// recorded filler-padded; oversized values are clipped to the field).
fn put_str(out: &mut [u8], value: &str) {
  let bytes = value.as_bytes();
  let len = bytes.len().min(out.len());
  out[..len].copy_from_slice(&bytes[..len]);
  out[len..].fill(b' ');
}

bitflags::bitflags! {
  /// Directory record file flags, ECMA-119 9.1.6.
  #[derive(Debug, Clone, Copy, PartialEq, Eq)]
  pub struct FileFlags: u8 {
    const EXISTENCE = 1 << 0;
    const DIRECTORY = 1 << 1;
    const ASSOCIATED_FILE = 1 << 2;
    const RECORD = 1 << 3;
    const PROTECTION = 1 << 4;
    const MULTI_EXTENT = 1 << 7;
  }
}

/// 17-byte digit-string timestamp used in volume descriptors (ECMA-119 8.4.26.1).
#[derive(Debug, Clone, Copy, Default)]
pub struct VolumeDescriptorTimestamp {
  pub year: u16,
  pub month: u8,
  pub day: u8,
  pub hour: u8,
  pub minute: u8,
  pub second: u8,
  pub hundredths: u8,
  /// Offset from GMT in 15-minute intervals.
  pub gmt_offset: i8,
}

impl VolumeDescriptorTimestamp {
  pub fn from_datetime(dt: chrono::DateTime<chrono::Utc>) -> Self {
    Self {
      year: dt.year().clamp(0, 9999) as u16,
      month: dt.month() as u8,
      day: dt.day() as u8,
      hour: dt.hour() as u8,
      minute: dt.minute() as u8,
      second: dt.second() as u8,
      hundredths: (dt.timestamp_subsec_millis() / 10) as u8,
      gmt_offset: 0,
    }
  }

  pub fn encode(&self) -> [u8; 17] {
    let mut out = [0u8; 17];
    let digits = format!(
      "{:04}{:02}{:02}{:02}{:02}{:02}{:02}",
      self.year, self.month, self.day, self.hour, self.minute, self.second, self.hundredths
    );
    out[..16].copy_from_slice(digits.as_bytes());
    out[16] = self.gmt_offset as u8;
    out
  }
}

/// 7-byte numeric timestamp recorded in directory records (ECMA-119 9.1.5).
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordingTimestamp {
  pub years_since_1900: u8,
  pub month: u8,
  pub day: u8,
  pub hour: u8,
  pub minute: u8,
  pub second: u8,
  pub gmt_offset: i8,
}

impl RecordingTimestamp {
  pub fn from_datetime(dt: chrono::DateTime<chrono::Utc>) -> Self {
    Self {
      years_since_1900: (dt.year().clamp(1900, 2155) - 1900) as u8,
      month: dt.month() as u8,
      day: dt.day() as u8,
      hour: dt.hour() as u8,
      minute: dt.minute() as u8,
      second: dt.second() as u8,
      gmt_offset: 0,
    }
  }

  pub fn encode(&self) -> [u8; 7] {
    [
      self.years_since_1900,
      self.month,
      self.day,
      self.hour,
      self.minute,
      self.second,
      self.gmt_offset as u8,
    ]
  }
}

/// One directory record (ECMA-119 9.1). The serialized length is fully
/// determined by the identifier: `33 + len + pad`, even-aligned.
#[derive(Debug, Clone)]
pub struct DirectoryRecord {
  /// First sector of the described extent.
  pub extent_location: u32,
  /// Extent length in bytes.
  pub extent_length: u32,
  pub recorded_at: RecordingTimestamp,
  pub flags: FileFlags,
  /// `\x00` for self, `\x01` for parent, otherwise a mangled identifier.
  pub identifier: String,
}

impl DirectoryRecord {
  pub(crate) const SELF_IDENTIFIER: &'static str = "\u{0}";
  pub(crate) const PARENT_IDENTIFIER: &'static str = "\u{1}";

  /// Serialized length of a record carrying `identifier_len` identifier bytes.
  pub fn encoded_len_for(identifier_len: usize) -> u32 {
    (33 + identifier_len + (identifier_len + 1) % 2) as u32
  }

  pub fn encoded_len(&self) -> u32 {
    Self::encoded_len_for(self.identifier.len())
  }

  /// Returns a copy of this record re-identified as `\x00` or `\x01`.
  pub(crate) fn with_identifier(&self, identifier: &str) -> Self {
    Self {
      identifier: identifier.to_owned(),
      ..self.clone()
    }
  }

  pub fn encode(&self) -> Result<Vec<u8>> {
    let id = self.identifier.as_bytes();
    if id.is_empty() || id.len() > 0xff - 33 {
      return Err(Error::Encode("directory record identifier length out of range"));
    }

    let len = self.encoded_len() as usize;
    let mut out = vec![0u8; len];
    out[0] = len as u8;
    out[1] = 0; // extended attribute record length
    put_both_u32(&mut out[2..10], self.extent_location);
    put_both_u32(&mut out[10..18], self.extent_length);
    out[18..25].copy_from_slice(&self.recorded_at.encode());
    out[25] = self.flags.bits();
    out[26] = 0; // file unit size, not interleaved
    out[27] = 0; // interleave gap
    put_both_u16(&mut out[28..32], 1); // volume sequence number
    out[32] = id.len() as u8;
    out[33..33 + id.len()].copy_from_slice(id);
    // out[33 + id.len()] stays zero when the identifier length is even
    Ok(out)
  }
}

/// Primary volume descriptor body (ECMA-119 8.4). Identifier fields are
/// caller-settable; `volume_space_size` and the root record are filled in
/// during emission.
#[derive(Debug, Clone)]
pub struct PrimaryVolumeDescriptorBody {
  pub system_identifier: String,
  pub volume_identifier: String,
  pub volume_space_size: u32,
  pub volume_set_size: u16,
  pub volume_sequence_number: u16,
  pub logical_block_size: u16,
  pub volume_set_identifier: String,
  pub publisher_identifier: String,
  pub data_preparer_identifier: String,
  pub application_identifier: String,
  pub copyright_file_identifier: String,
  pub abstract_file_identifier: String,
  pub bibliographic_file_identifier: String,
  pub creation: VolumeDescriptorTimestamp,
  pub modification: VolumeDescriptorTimestamp,
  pub expiration: VolumeDescriptorTimestamp,
  pub effective: VolumeDescriptorTimestamp,
  pub(crate) root_record: Option<DirectoryRecord>,
}

impl PrimaryVolumeDescriptorBody {
  pub fn encode(&self) -> Result<[u8; 2048]> {
    let root = self
      .root_record
      .as_ref()
      .ok_or(Error::Encode("primary volume descriptor has no root directory record"))?;
    let root_bytes = root.encode()?;
    if root_bytes.len() != 34 {
      return Err(Error::Encode("root directory record must be 34 bytes"));
    }

    let mut out = descriptor_header(VOLUME_TYPE_PRIMARY);
    put_str(&mut out[8..40], &self.system_identifier);
    put_str(&mut out[40..72], &self.volume_identifier);
    put_both_u32(&mut out[80..88], self.volume_space_size);
    put_both_u16(&mut out[120..124], self.volume_set_size);
    put_both_u16(&mut out[124..128], self.volume_sequence_number);
    put_both_u16(&mut out[128..132], self.logical_block_size);
    // path tables: declared zero-length at location zero
    put_both_u32(&mut out[132..140], 0);
    out[140..156].fill(0);
    out[156..190].copy_from_slice(&root_bytes);
    put_str(&mut out[190..318], &self.volume_set_identifier);
    put_str(&mut out[318..446], &self.publisher_identifier);
    put_str(&mut out[446..574], &self.data_preparer_identifier);
    put_str(&mut out[574..702], &self.application_identifier);
    put_str(&mut out[702..739], &self.copyright_file_identifier);
    put_str(&mut out[739..776], &self.abstract_file_identifier);
    put_str(&mut out[776..813], &self.bibliographic_file_identifier);
    out[813..830].copy_from_slice(&self.creation.encode());
    out[830..847].copy_from_slice(&self.modification.encode());
    out[847..864].copy_from_slice(&self.expiration.encode());
    out[864..881].copy_from_slice(&self.effective.encode());
    out[881] = 1; // file structure version
    Ok(out)
  }
}

/// El Torito boot record volume descriptor (type 0).
#[derive(Debug, Clone, Copy)]
pub struct BootVolumeDescriptorBody {
  /// First sector of the boot catalog, recorded little-endian in
  /// BootSystemUse bytes 0..4.
  pub catalog_location: u32,
}

impl BootVolumeDescriptorBody {
  pub fn encode(&self) -> [u8; 2048] {
    let mut out = descriptor_header(VOLUME_TYPE_BOOT);
    out[7..7 + EL_TORITO_IDENTIFIER.len()].copy_from_slice(EL_TORITO_IDENTIFIER);
    out[71..75].copy_from_slice(&self.catalog_location.to_le_bytes());
    out
  }
}

/// Volume descriptor set terminator (type 255).
pub fn encode_terminator() -> [u8; 2048] {
  descriptor_header(VOLUME_TYPE_TERMINATOR)
}

fn descriptor_header(kind: u8) -> [u8; 2048] {
  let mut out = [0u8; 2048];
  out[0] = kind;
  out[1..6].copy_from_slice(STANDARD_IDENTIFIER);
  out[6] = 1; // descriptor version
  out
}
