use thiserror::Error;

#[derive(Error, Debug)]
pub enum BankError {
    #[error("invalid format")]
    InvalidFormat,
    #[error("form type is not PGRD")]
    InvalidFormType,
    #[error("unsupported bank version {0}")]
    UnsupportedVersion(u16),

    #[error("missing header chunk")]
    MissingHead,
    #[error("unknown scale index {0}")]
    UnknownScale(u8),
    #[error("unknown node kind {0}")]
    UnknownNodeKind(String),
    #[error("node at ({0}, {1}) lies outside the grid")]
    OutOfBounds(u16, u16),
    #[error("unknown behavior tag {0}")]
    UnknownBehavior(u8),
    #[error("unknown control kind {0}")]
    UnknownControl(u8),

    #[error("i/o error")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, BankError>;
