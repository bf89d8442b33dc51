//! Single-pass ISO 9660 / ECMA-119 image writer.
//!
//! Callers stage a tree of files backed by lazy content sources, then
//! emit a complete image onto any `std::io::Write` sink: reserved
//! system area, volume descriptors, directory extents and file
//! payloads, each aligned to the 2048-byte logical sector. El Torito
//! boot entries (BIOS and EFI) are supported, including boot-info-table
//! patching.
//!
//! Only the primary ECMA-119 volume structures are produced; Joliet and
//! Rock Ridge extensions are out of scope.
//!
//! # Example
//!
//! ```no_run
//! use isoimg::ImageWriter;
//!
//! # fn main() -> isoimg::Result<()> {
//! let mut writer = ImageWriter::new();
//! writer.primary.volume_identifier = "MY_DISC".to_owned();
//!
//! writer.add_file(b"Hello, world!\n".as_slice(), "docs/hello.txt")?;
//! writer.add_local("/tmp/kernel.img", "boot/kernel.img")?;
//!
//! let out = std::fs::File::create("my_disc.iso")?;
//! writer.write_to(std::io::BufWriter::new(out))?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod mangle;
pub mod spec;

mod boot;
mod fs;
mod item;
mod layout;
mod sector;
mod writer;

pub use boot::{BootEntry, BootMedia, Platform};
pub use error::{Error, Result};
pub use item::Item;
pub use writer::{ImageWriter, DEFAULT_CATALOG};
