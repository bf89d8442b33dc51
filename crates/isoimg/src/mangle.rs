//! ECMA-119 identifier mangling.
//!
//! Path components are normalized one at a time: directory names per
//! ECMA-119 7.6 (d-characters, at most 31 bytes), file names per 7.5
//! (`NAME.EXT;1`, at most 30 bytes including the version suffix).

/// Maximum directory identifier length, ECMA-119 7.6.3.
pub const DIRECTORY_IDENTIFIER_MAX_LEN: usize = 31;

/// Maximum file identifier length, ECMA-119 7.5.
pub const FILE_IDENTIFIER_MAX_LEN: usize = 30;

const D_CHARACTERS: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789_";

const VERSION: &str = "1";

/// Splits `input` on `/`, mangles every component and returns the joined
/// directory path together with the mangled file name (the last
/// component). Empty segments are skipped, so `a//b` and `/a/b/` resolve
/// like `a/b`.
pub fn mangle_path(input: &str) -> (String, String) {
  let mut segments: Vec<&str> = input.split('/').filter(|s| !s.is_empty()).collect();

  let name = segments.pop().unwrap_or_default();
  let dir = segments
    .iter()
    .map(|s| mangle_directory_name(s))
    .collect::<Vec<_>>()
    .join("/");

  (dir, mangle_file_name(name))
}

/// See ECMA-119 7.5.
///
/// Idempotent: feeding an already-mangled name (`FOO.EXT;1`) back in
/// yields the same identifier.
pub fn mangle_file_name(input: &str) -> String {
  let input = input.to_uppercase();
  // strip a previous run's version suffix so re-mangling is stable
  let input = input.strip_suffix(";1").unwrap_or(&input);

  let (stem, extension) = match input.rfind('.') {
    Some(pos) => (input[..pos].replace('.', "_"), &input[pos + 1..]),
    None => (input.to_owned(), ""),
  };

  // enough characters for the `.ignition` extension
  let extension = mangle_d_string(extension, 8);

  let mut stem_budget = FILE_IDENTIFIER_MAX_LEN - (1 + VERSION.len());
  if !extension.is_empty() {
    stem_budget -= 1 + extension.len();
  }
  let stem = mangle_d_string(&stem, stem_budget);

  if extension.is_empty() {
    format!("{stem};{VERSION}")
  } else {
    format!("{stem}.{extension};{VERSION}")
  }
}

/// See ECMA-119 7.6.
pub fn mangle_directory_name(input: &str) -> String {
  mangle_d_string(input, DIRECTORY_IDENTIFIER_MAX_LEN)
}

fn mangle_d_string(input: &str, max_characters: usize) -> String {
  input
    .to_uppercase()
    .chars()
    .take(max_characters)
    .map(|c| if D_CHARACTERS.contains(c) { c } else { '_' })
    .collect()
}
