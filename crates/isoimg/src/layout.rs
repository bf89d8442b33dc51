//! Image layout: extent allocation and directory-extent assembly.
//!
//! A single pass over the staged tree assigns every extent a location
//! from a monotonically advancing free-sector cursor and materializes
//! each directory's on-disk records. The order in which items are
//! allocated is also the order in which they are emitted, so the
//! emitter never needs to seek.

use std::collections::VecDeque;

use crate::error::{Error, Result};
use crate::fs::{NodeId, Payload, Tree, ROOT};
use crate::spec::{self, DirectoryRecord, FileFlags, RecordingTimestamp};

pub(crate) struct Layout {
  /// Items in allocation (= emission = LBA) order.
  pub emission: Vec<NodeId>,
  /// Sectors allocated past the descriptor area.
  pub total_sectors: u32,
  /// The root directory's record, as recorded in the primary descriptor.
  pub root_record: DirectoryRecord,
}

/// Walks the tree, assigning extent locations starting at
/// `first_free_sector` and building every directory extent.
pub(crate) fn plan(
  tree: &mut Tree,
  first_free_sector: u32,
  timestamp: RecordingTimestamp,
) -> Result<Layout> {
  Planner {
    tree,
    first_free_sector,
    free_sector: first_free_sector,
    timestamp,
    queue: VecDeque::new(),
    emission: Vec::new(),
  }
  .run()
}

struct Planner<'a> {
  tree: &'a mut Tree,
  first_free_sector: u32,
  free_sector: u32,
  timestamp: RecordingTimestamp,
  queue: VecDeque<NodeId>,
  emission: Vec<NodeId>,
}

impl Planner<'_> {
  fn alloc_sectors(&mut self, count: u32) -> u32 {
    let location = self.free_sector;
    self.free_sector += count;
    location
  }

  fn run(mut self) -> Result<Layout> {
    let root_sectors = self.tree.dir(ROOT).sectors();
    let root_location = self.alloc_sectors(root_sectors);
    let root_record = DirectoryRecord {
      extent_location: root_location,
      extent_length: root_sectors * spec::SECTOR_SIZE,
      recorded_at: self.timestamp,
      flags: FileFlags::DIRECTORY,
      identifier: DirectoryRecord::SELF_IDENTIFIER.to_owned(),
    };
    // the root is its own parent
    self.tree.nodes[ROOT]
      .meta
      .assign(root_record.clone(), root_record.clone(), root_location);

    self.queue.push_back(ROOT);
    while let Some(id) = self.queue.pop_front() {
      match &self.tree.nodes[id].payload {
        Payload::Dir(_) => self.process_directory(id)?,
        Payload::File(_) => self.process_file(id)?,
      }
    }

    Ok(Layout {
      emission: self.emission,
      total_sectors: self.free_sector - self.first_free_sector,
      root_record,
    })
  }

  /// Allocates extents for every child of `id` in lexicographic order
  /// while building the directory's extent bytes. Children are queued
  /// for processing once their location is fixed.
  fn process_directory(&mut self, id: NodeId) -> Result<()> {
    let (Some(own), Some(parent)) = (
      self.tree.nodes[id].meta.own_record.clone(),
      self.tree.nodes[id].meta.parent_record.clone(),
    ) else {
      unreachable!("directory visited before its extent was allocated");
    };

    let children: Vec<(String, NodeId)> = self
      .tree
      .dir(id)
      .children
      .iter()
      .map(|(name, child)| (name.clone(), *child))
      .collect();

    if children.is_empty() {
      // zero-length extent, nothing to record
      self.emission.push(id);
      return Ok(());
    }

    let mut buf = Vec::with_capacity(spec::SECTOR_SIZE as usize);
    buf.extend_from_slice(&own.with_identifier(DirectoryRecord::SELF_IDENTIFIER).encode()?);
    buf.extend_from_slice(&parent.with_identifier(DirectoryRecord::PARENT_IDENTIFIER).encode()?);

    for (name, child) in children {
      let (flags, extent_length, extent_sectors) = match &self.tree.nodes[child].payload {
        Payload::Dir(dir) => {
          let sectors = dir.sectors();
          (FileFlags::DIRECTORY, sectors * spec::SECTOR_SIZE, sectors)
        }
        Payload::File(item) => {
          if item.size() > u64::from(u32::MAX) {
            return Err(Error::FileTooLarge(self.tree.nodes[child].meta.path.clone()));
          }
          (FileFlags::empty(), item.size() as u32, item.sectors())
        }
      };

      let location = self.alloc_sectors(extent_sectors);
      log::debug!(
        "allocated {extent_sectors} sector(s) at LBA {location} for {}",
        self.tree.nodes[child].meta.path
      );

      let record = DirectoryRecord {
        extent_location: location,
        extent_length,
        recorded_at: self.timestamp,
        flags,
        identifier: name,
      };
      self.tree.nodes[child].meta.assign(record.clone(), own.clone(), location);
      self.queue.push_back(child);

      let data = record.encode()?;
      // a record may not straddle a sector boundary
      let offset = buf.len() % spec::SECTOR_SIZE as usize;
      if offset + data.len() > spec::SECTOR_SIZE as usize {
        buf.resize(buf.len() + spec::SECTOR_SIZE as usize - offset, 0);
      }
      buf.extend_from_slice(&data);
    }

    let extent_len = self.tree.dir(id).extent_len() as usize;
    debug_assert!(buf.len() <= extent_len);
    buf.resize(extent_len, 0);
    self.tree.dir_mut(id).extent = buf;

    self.emission.push(id);
    Ok(())
  }

  fn process_file(&mut self, id: NodeId) -> Result<()> {
    let Payload::File(item) = &self.tree.nodes[id].payload else {
      unreachable!("file queue entry is not a file");
    };
    if item.size() > u64::from(u32::MAX) {
      return Err(Error::FileTooLarge(self.tree.nodes[id].meta.path.clone()));
    }

    self.emission.push(id);
    Ok(())
  }
}
