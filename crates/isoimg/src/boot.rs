//! El Torito boot catalog assembly and boot-info table patching.
//!
//! The catalog occupies a single sector staged as an ordinary file; its
//! bytes are written here once the layout has fixed every extent
//! location. See the El Torito 1.0 specification and the boot_sectors
//! notes shipped with libisofs.

use crate::error::{Error, Result};
use crate::fs::{NodeId, Payload, Tree};
use crate::item::SharedBytes;

/// Platform a catalog entry targets.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
  X86 = 0x00,
  Ppc = 0x01,
  Mac = 0x02,
  Efi = 0xef,
}

/// Boot media emulation requested from the firmware.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootMedia {
  NoEmulation = 0,
  Floppy122 = 1,
  Floppy144 = 2,
  Floppy288 = 3,
  HardDisk = 4,
}

/// Configuration of one boot catalog entry.
#[derive(Debug, Clone, Copy)]
pub struct BootEntry {
  pub platform: Platform,
  pub emulation: BootMedia,
  /// Patch a boot-info table into the image before emission. Requires
  /// the boot image to be staged fully buffered.
  pub boot_info_table: bool,
}

/// A boot entry bound to its staged boot image.
pub(crate) struct StagedBootEntry {
  pub entry: BootEntry,
  pub node: NodeId,
  /// Backing buffer of the boot image when `boot_info_table` is set.
  pub buffer: Option<SharedBytes>,
}

/// The 16-bit word that makes the 32-byte validation entry sum to zero.
pub(crate) fn checksum_complement(entry: &[u8]) -> u16 {
  let mut sum = 0u16;
  for chunk in entry.chunks_exact(2) {
    sum = sum.wrapping_add(u16::from_le_bytes([chunk[0], chunk[1]]));
  }
  0u16.wrapping_sub(sum)
}

fn validation_entry(platform: Platform) -> [u8; 32] {
  let mut out = [0u8; 32];
  out[0] = 0x01;
  out[1] = platform as u8;
  // 24-byte manufacturer field stays zero
  out[30] = 0x55;
  out[31] = 0xaa;
  let checksum = checksum_complement(&out);
  out[28..30].copy_from_slice(&checksum.to_le_bytes());
  out
}

fn section_header(platform: Platform, last: bool) -> [u8; 32] {
  let mut out = [0u8; 32];
  out[0] = if last { 0x91 } else { 0x90 };
  out[1] = platform as u8;
  out[2..4].copy_from_slice(&1u16.to_le_bytes()); // entries in this section
  out
}

/// Initial/default entry and section entries share one layout.
fn image_entry(entry: &BootEntry, load_rba: u32, image_size: u64) -> Result<[u8; 32]> {
  let mut out = [0u8; 32];
  out[0] = 0x88; // bootable
  out[1] = entry.emulation as u8;
  // load segment 0 selects the firmware default (0x7C0)

  // BIOS loads four virtual sectors; EFI firmware wants the whole image
  let sector_count: u16 = match entry.platform {
    Platform::Efi => u16::try_from((image_size + 511) / 512)
      .map_err(|_| Error::Encode("boot image sector count exceeds the catalog field"))?,
    _ => 4,
  };
  out[6..8].copy_from_slice(&sector_count.to_le_bytes());
  out[8..12].copy_from_slice(&load_rba.to_le_bytes());
  Ok(out)
}

fn placement(staged: &StagedBootEntry, tree: &Tree) -> (u32, u64) {
  let node = &tree.nodes[staged.node];
  let (Some(location), Payload::File(item)) = (node.meta.target_sector, &node.payload) else {
    unreachable!("boot image has no assigned extent");
  };
  (location, item.size())
}

/// Assembles the boot catalog for `entries`, the first of which is the
/// default. Fails when the catalog would overflow its single sector.
pub(crate) fn encode_catalog(entries: &[StagedBootEntry], tree: &Tree) -> Result<Vec<u8>> {
  let Some(default) = entries.first() else {
    return Err(Error::Encode("boot catalog requires at least one entry"));
  };

  let mut out = Vec::with_capacity(64 * entries.len());
  out.extend_from_slice(&validation_entry(default.entry.platform));
  let (load_rba, size) = placement(default, tree);
  out.extend_from_slice(&image_entry(&default.entry, load_rba, size)?);

  for (index, staged) in entries.iter().enumerate().skip(1) {
    out.extend_from_slice(&section_header(staged.entry.platform, index == entries.len() - 1));
    let (load_rba, size) = placement(staged, tree);
    out.extend_from_slice(&image_entry(&staged.entry, load_rba, size)?);
  }

  if out.len() > 2048 {
    return Err(Error::Encode("boot catalog exceeds one sector"));
  }
  Ok(out)
}

/// Rewrites bytes 8..24 of a buffered boot image with the boot-info
/// table: primary descriptor LBA, the image's own LBA and byte length,
/// and a checksum over the 32-bit little-endian words from offset 64.
pub(crate) fn patch_boot_info_table(buffer: &SharedBytes, file_location: u32) -> Result<()> {
  let mut data = buffer.borrow_mut();
  if data.len() < 64 {
    return Err(Error::Encode("boot image too small for a boot info table"));
  }

  let mut checksum = 0u32;
  for chunk in data[64..].chunks(4) {
    let mut word = [0u8; 4];
    word[..chunk.len()].copy_from_slice(chunk);
    checksum = checksum.wrapping_add(u32::from_le_bytes(word));
  }

  let length = data.len() as u32;
  data[8..12].copy_from_slice(&16u32.to_le_bytes());
  data[12..16].copy_from_slice(&file_location.to_le_bytes());
  data[16..20].copy_from_slice(&length.to_le_bytes());
  data[20..24].copy_from_slice(&checksum.to_le_bytes());
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::item::Item;
  use crate::layout;
  use crate::spec::RecordingTimestamp;
  use std::cell::RefCell;
  use std::rc::Rc;

  fn staged(tree: &mut Tree, name: &str, size: usize, entry: BootEntry) -> StagedBootEntry {
    let node = tree.insert("", name, Item::from(vec![0u8; size])).unwrap();
    StagedBootEntry { entry, node, buffer: None }
  }

  fn x86_entry() -> BootEntry {
    BootEntry {
      platform: Platform::X86,
      emulation: BootMedia::NoEmulation,
      boot_info_table: false,
    }
  }

  #[test]
  fn validation_entry_words_sum_to_zero() {
    let entry = validation_entry(Platform::X86);
    let mut sum = 0u16;
    for chunk in entry.chunks_exact(2) {
      sum = sum.wrapping_add(u16::from_le_bytes([chunk[0], chunk[1]]));
    }
    assert_eq!(sum, 0);
    assert_eq!(entry[30], 0x55);
    assert_eq!(entry[31], 0xaa);
  }

  #[test]
  fn default_entry_references_the_boot_image() {
    let mut tree = Tree::new();
    let entries = vec![staged(&mut tree, "BOOT.BIN;1", 2048, x86_entry())];
    layout::plan(&mut tree, 18, RecordingTimestamp::default()).unwrap();

    let catalog = encode_catalog(&entries, &tree).unwrap();
    assert_eq!(catalog.len(), 64);
    assert_eq!(catalog[32], 0x88);
    assert_eq!(catalog[33], BootMedia::NoEmulation as u8);
    assert_eq!(&catalog[38..40], &4u16.to_le_bytes());
    let lba = tree.nodes[entries[0].node].meta.target_sector.unwrap();
    assert_eq!(&catalog[40..44], &lba.to_le_bytes());
  }

  #[test]
  fn secondary_entries_get_section_headers() {
    let mut tree = Tree::new();
    let efi = BootEntry {
      platform: Platform::Efi,
      emulation: BootMedia::NoEmulation,
      boot_info_table: false,
    };
    let entries = vec![
      staged(&mut tree, "BIOS.BIN;1", 2048, x86_entry()),
      staged(&mut tree, "EFI.IMG;1", 3000, efi),
    ];
    layout::plan(&mut tree, 18, RecordingTimestamp::default()).unwrap();

    let catalog = encode_catalog(&entries, &tree).unwrap();
    assert_eq!(catalog.len(), 128);
    assert_eq!(catalog[64], 0x91); // final section header
    assert_eq!(catalog[65], Platform::Efi as u8);
    assert_eq!(catalog[96], 0x88);
    // EFI images count 512-byte virtual sectors
    assert_eq!(&catalog[102..104], &6u16.to_le_bytes());
  }

  #[test]
  fn boot_info_table_is_patched_in_place() {
    let mut image = vec![0u8; 2048];
    image[64] = 1;
    image[2047] = 2;
    let buffer = Rc::new(RefCell::new(image));

    patch_boot_info_table(&buffer, 21).unwrap();

    let data = buffer.borrow();
    assert_eq!(&data[8..12], &16u32.to_le_bytes());
    assert_eq!(&data[12..16], &21u32.to_le_bytes());
    assert_eq!(&data[16..20], &2048u32.to_le_bytes());

    let mut expected = 0u32;
    for chunk in data[64..].chunks(4) {
      let mut word = [0u8; 4];
      word[..chunk.len()].copy_from_slice(chunk);
      expected = expected.wrapping_add(u32::from_le_bytes(word));
    }
    assert_eq!(&data[20..24], &expected.to_le_bytes());
  }

  #[test]
  fn undersized_boot_images_are_rejected() {
    let buffer = Rc::new(RefCell::new(vec![0u8; 32]));
    assert!(matches!(
      patch_boot_info_table(&buffer, 20),
      Err(Error::Encode(_))
    ));
  }
}
