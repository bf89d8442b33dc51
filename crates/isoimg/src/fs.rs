//! In-memory staging of the logical file hierarchy.
//!
//! Nodes live in an arena indexed by [`NodeId`]; the tree owns both the
//! staged items and their layout metadata, so the planner's back
//! references are plain indices instead of shared ownership.

use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::item::Item;
use crate::spec::{self, DirectoryRecord};

pub(crate) type NodeId = usize;

pub(crate) const ROOT: NodeId = 0;

/// Placement metadata, filled exactly once by the layout planner.
#[derive(Default)]
pub(crate) struct ItemMeta {
  /// Mangled path this node was staged under.
  pub path: String,
  /// This node's directory record; presence means layout has visited it.
  pub own_record: Option<DirectoryRecord>,
  /// The containing directory's record.
  pub parent_record: Option<DirectoryRecord>,
  /// First sector of this node's extent.
  pub target_sector: Option<u32>,
}

impl ItemMeta {
  pub fn assign(&mut self, own: DirectoryRecord, parent: DirectoryRecord, target_sector: u32) {
    debug_assert!(self.own_record.is_none(), "metadata assigned twice");
    self.own_record = Some(own);
    self.parent_record = Some(parent);
    self.target_sector = Some(target_sector);
  }
}

pub(crate) enum Payload {
  Dir(DirNode),
  File(Item),
}

pub(crate) struct Node {
  pub payload: Payload,
  pub meta: ItemMeta,
}

/// A staged directory: named children plus the buffer its on-disk extent
/// is materialized into during planning.
#[derive(Default)]
pub(crate) struct DirNode {
  pub children: BTreeMap<String, NodeId>,
  pub extent: Vec<u8>,
}

impl DirNode {
  /// Sectors occupied by this directory's extent. Each record is kept
  /// inside a single sector, so the count anticipates boundary padding.
  /// A childless directory records nothing and occupies no sectors.
  pub fn sectors(&self) -> u32 {
    if self.children.is_empty() {
      return 0;
    }

    let mut sectors = 0u32;
    let mut occupied = 68u32; // the 0x00 and 0x01 entries

    for name in self.children.keys() {
      let record_len = DirectoryRecord::encoded_len_for(name.len());
      if occupied + record_len > spec::SECTOR_SIZE {
        sectors += 1;
        occupied = record_len;
      } else {
        occupied += record_len;
      }
    }

    if occupied > 0 {
      sectors += 1;
    }
    sectors
  }

  pub fn extent_len(&self) -> u32 {
    self.sectors() * spec::SECTOR_SIZE
  }
}

pub(crate) struct Tree {
  pub nodes: Vec<Node>,
}

impl Tree {
  pub fn new() -> Self {
    Self {
      nodes: vec![Node {
        payload: Payload::Dir(DirNode::default()),
        meta: ItemMeta::default(),
      }],
    }
  }

  pub fn dir(&self, id: NodeId) -> &DirNode {
    match &self.nodes[id].payload {
      Payload::Dir(dir) => dir,
      Payload::File(_) => panic!("node {id} is not a directory"),
    }
  }

  pub fn dir_mut(&mut self, id: NodeId) -> &mut DirNode {
    match &mut self.nodes[id].payload {
      Payload::Dir(dir) => dir,
      Payload::File(_) => panic!("node {id} is not a directory"),
    }
  }

  /// Resolves `dir_path` (already mangled, `/`-separated) to a directory
  /// node, creating intermediate directories as needed. Descending into a
  /// staged file fails with [`Error::IsDir`].
  pub fn get_dir(&mut self, dir_path: &str) -> Result<NodeId> {
    let mut pos = ROOT;

    for segment in dir_path.split('/').filter(|s| !s.is_empty()) {
      let existing = self.dir(pos).children.get(segment).copied();

      pos = match existing {
        Some(id) => match &self.nodes[id].payload {
          Payload::Dir(_) => id,
          Payload::File(_) => return Err(Error::IsDir(self.nodes[id].meta.path.clone())),
        },
        None => {
          let path = join_path(&self.nodes[pos].meta.path, segment);
          let id = self.push(Payload::Dir(DirNode::default()), path);
          self.dir_mut(pos).children.insert(segment.to_owned(), id);
          id
        }
      };
    }

    Ok(pos)
  }

  /// Stages `item` as `name` under the directory at `dir_path`.
  pub fn insert(&mut self, dir_path: &str, name: &str, item: Item) -> Result<NodeId> {
    let pos = self.get_dir(dir_path)?;
    let path = join_path(&self.nodes[pos].meta.path, name);

    if self.dir(pos).children.contains_key(name) {
      return Err(Error::AlreadyExists(path));
    }

    let id = self.push(Payload::File(item), path);
    self.dir_mut(pos).children.insert(name.to_owned(), id);
    Ok(id)
  }

  fn push(&mut self, payload: Payload, path: String) -> NodeId {
    let id = self.nodes.len();
    self.nodes.push(Node {
      payload,
      meta: ItemMeta {
        path,
        ..ItemMeta::default()
      },
    });
    id
  }
}

fn join_path(dir: &str, name: &str) -> String {
  if dir.is_empty() {
    name.to_owned()
  } else {
    format!("{dir}/{name}")
  }
}
