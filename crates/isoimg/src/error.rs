pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
  #[error("already exists: {0}")]
  AlreadyExists(String),
  #[error("is a directory: {0}")]
  IsDir(String),
  #[error("file is exceeding the maximum file size of 4GB: {0}")]
  FileTooLarge(String),
  #[error("invalid write: sector position is not valid (expected {expected}, at {actual})")]
  InvalidWrite { expected: u32, actual: u32 },
  #[error("encode error: {0}")]
  Encode(&'static str),
  #[error("I/O error: {0}")]
  Io(#[from] std::io::Error),
}
