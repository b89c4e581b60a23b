use thiserror::Error;

/// Protocol-level failure classes. Pumps treat these as non-fatal (logged,
/// then forwarded or dropped per direction policy) except for WriteFailed
/// and Io, which terminate the pump.
#[derive(Error, Debug)]
pub enum Error {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("read deadline reached")]
    Timeout,

    #[error("connection closed by peer")]
    Closed,

    #[error("CRC mismatch: expected {expected:#06x}, got {got:#06x}")]
    BadCrc { expected: u16, got: u16 },

    #[error("expected body size {expected}, got {got}")]
    BadLength { expected: usize, got: usize },

    #[error("invalid ciphertext length: {0}")]
    BadCipher(usize),

    #[error("invalid cleartext length for {kind}: {got}")]
    BadLayout { kind: &'static str, got: usize },

    #[error("unknown device ID: {}", String::from_utf8_lossy(.0))]
    UnknownDeviceId([u8; 8]),

    #[error("unknown packet type: {0:02x?}")]
    UnknownPacketType([u8; 2]),

    #[error("unknown prefix, discarded {0} bytes")]
    UnknownPrefix(usize),

    #[error("couldn't write out: {0}")]
    WriteFailed(std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
