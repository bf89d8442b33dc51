//! Staging an image's contents and writing them out in one pass.

use std::cell::RefCell;
use std::io::{Read, Write};
use std::path::Path;
use std::rc::Rc;

use crate::boot::{self, BootEntry, StagedBootEntry};
use crate::error::{Error, Result};
use crate::fs::{NodeId, Payload, Tree};
use crate::item::{Item, SharedBytes};
use crate::layout;
use crate::mangle;
use crate::sector::{SectorStream, ZERO_SECTOR};
use crate::spec::{
  self, BootVolumeDescriptorBody, PrimaryVolumeDescriptorBody, RecordingTimestamp,
  VolumeDescriptorTimestamp,
};

/// Default on-image path of the El Torito boot catalog.
pub const DEFAULT_CATALOG: &str = "BOOT.CAT";

/// Stages a tree of content sources and emits a complete ISO 9660 image
/// to an append-only sink.
///
/// All staged paths are mangled to the ECMA-119 d-character identifier
/// form. Emission consumes the staged directory extents, so a writer
/// produces at most one image.
pub struct ImageWriter {
  /// Primary volume descriptor body. Identifier fields may be adjusted
  /// freely before [`ImageWriter::write_to`].
  pub primary: PrimaryVolumeDescriptorBody,
  /// Path of the boot catalog on the image.
  pub catalog: String,
  tree: Tree,
  boot: Vec<StagedBootEntry>,
  created_at: chrono::DateTime<chrono::Utc>,
}

impl Default for ImageWriter {
  fn default() -> Self {
    Self::new()
  }
}

impl ImageWriter {
  pub fn new() -> Self {
    let now = chrono::Utc::now();
    let stamp = VolumeDescriptorTimestamp::from_datetime(now);

    Self {
      primary: PrimaryVolumeDescriptorBody {
        system_identifier: std::env::consts::OS.to_uppercase(),
        volume_identifier: "UNNAMED".to_owned(),
        volume_space_size: 0, // fixed during emission
        volume_set_size: 1,
        volume_sequence_number: 1,
        logical_block_size: spec::SECTOR_SIZE as u16,
        volume_set_identifier: String::new(),
        publisher_identifier: String::new(),
        data_preparer_identifier: String::new(),
        application_identifier: "ISOIMG".to_owned(),
        copyright_file_identifier: String::new(),
        abstract_file_identifier: String::new(),
        bibliographic_file_identifier: String::new(),
        creation: stamp,
        modification: stamp,
        expiration: VolumeDescriptorTimestamp::default(),
        effective: stamp,
        root_record: None,
      },
      catalog: DEFAULT_CATALOG.to_owned(),
      tree: Tree::new(),
      boot: Vec::new(),
      created_at: now,
    }
  }

  /// Stages `content` under `iso_path`, creating intermediate
  /// directories. Every path component is mangled to ISO 9660 form.
  pub fn add_file(&mut self, content: impl Into<Item>, iso_path: &str) -> Result<()> {
    self.stage(content.into(), iso_path)?;
    Ok(())
  }

  /// Stages a file from the local filesystem. No handle is opened until
  /// emission reaches the file's extent.
  pub fn add_local(&mut self, local_path: impl AsRef<Path>, iso_path: &str) -> Result<()> {
    self.add_file(Item::from_local(local_path)?, iso_path)
  }

  /// Recursively stages every regular file below `local_dir` under
  /// `iso_prefix`.
  pub fn add_local_directory(
    &mut self,
    local_dir: impl AsRef<Path>,
    iso_prefix: &str,
  ) -> Result<()> {
    let local_dir = local_dir.as_ref();

    for entry in walkdir::WalkDir::new(local_dir) {
      let entry = entry.map_err(std::io::Error::from)?;
      if !entry.file_type().is_file() {
        continue;
      }

      let Ok(relative) = entry.path().strip_prefix(local_dir) else {
        continue;
      };
      let relative = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");

      self.add_local(entry.path(), &format!("{iso_prefix}/{relative}"))?;
    }

    Ok(())
  }

  /// Stages `content` like [`ImageWriter::add_file`] and registers it as
  /// an El Torito boot image. The first entry added becomes the default.
  ///
  /// When `entry.boot_info_table` is set the image is buffered at
  /// staging time so its header can be rewritten once extent locations
  /// are fixed.
  pub fn add_boot(
    &mut self,
    entry: BootEntry,
    content: impl Into<Item>,
    iso_path: &str,
  ) -> Result<()> {
    let mut item = content.into();

    if entry.boot_info_table && item.shared_bytes().is_none() {
      let mut data = Vec::new();
      item.read_to_end(&mut data)?;
      item.close();
      item = Item::from(data);
    }
    let buffer = if entry.boot_info_table {
      item.shared_bytes()
    } else {
      None
    };

    let node = self.stage(item, iso_path)?;
    self.boot.push(StagedBootEntry { entry, node, buffer });
    Ok(())
  }

  fn stage(&mut self, item: Item, iso_path: &str) -> Result<NodeId> {
    let (dir_path, file_name) = mangle::mangle_path(iso_path);
    self.tree.insert(&dir_path, &file_name, item)
  }

  /// Emits the image: reserved system area, volume descriptors, then
  /// every extent in layout order. The sink is written strictly forward;
  /// on error it is left partially filled.
  pub fn write_to(&mut self, sink: impl Write) -> Result<()> {
    // the boot catalog is staged as a regular file whose bytes are
    // filled in after layout has fixed its location
    let catalog = if self.boot.is_empty() {
      None
    } else {
      let buffer: SharedBytes = Rc::new(RefCell::new(vec![0u8; spec::SECTOR_SIZE as usize]));
      let catalog_path = self.catalog.clone();
      let node = self.stage(Item::from_shared(Rc::clone(&buffer)), &catalog_path)?;
      Some((buffer, node))
    };

    let descriptor_count = 2 + u32::from(catalog.is_some());
    let timestamp = RecordingTimestamp::from_datetime(self.created_at);
    let layout = layout::plan(&mut self.tree, 16 + descriptor_count, timestamp)?;

    self.primary.volume_space_size = 16 + descriptor_count + layout.total_sectors;
    self.primary.root_record = Some(layout.root_record.clone());

    let boot_descriptor = match &catalog {
      Some((buffer, node)) => {
        let Some(catalog_location) = self.tree.nodes[*node].meta.target_sector else {
          unreachable!("boot catalog has no assigned extent");
        };

        let encoded = boot::encode_catalog(&self.boot, &self.tree)?;
        buffer.borrow_mut()[..encoded.len()].copy_from_slice(&encoded);

        for staged in &self.boot {
          if let Some(image) = &staged.buffer {
            let Some(location) = self.tree.nodes[staged.node].meta.target_sector else {
              unreachable!("boot image has no assigned extent");
            };
            boot::patch_boot_info_table(image, location)?;
          }
        }

        Some(BootVolumeDescriptorBody { catalog_location })
      }
      None => None,
    };

    let mut stream = SectorStream::new(sink);
    for sector in 0..16 {
      stream.write_sector(&ZERO_SECTOR, sector)?;
    }

    let mut sector = 16;
    stream.write_sector(&self.primary.encode()?, sector)?;
    sector += 1;
    if let Some(descriptor) = boot_descriptor {
      stream.write_sector(&descriptor.encode(), sector)?;
      sector += 1;
    }
    stream.write_sector(&spec::encode_terminator(), sector)?;

    for &id in &layout.emission {
      let Some(target) = self.tree.nodes[id].meta.target_sector else {
        unreachable!("emitted item has no assigned extent");
      };
      if target != stream.position() {
        return Err(Error::InvalidWrite {
          expected: target,
          actual: stream.position(),
        });
      }

      match &mut self.tree.nodes[id].payload {
        Payload::Dir(dir) => {
          let extent = std::mem::take(&mut dir.extent);
          if !extent.is_empty() {
            stream.write_sector(&extent, target)?;
          }
        }
        Payload::File(item) => {
          let written = stream.write_item_aligned(item)?;
          log::debug!("wrote {written} bytes at LBA {target}");
        }
      }
    }

    Ok(())
  }
}
