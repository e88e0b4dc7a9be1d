use thiserror::Error;

/// Errors that can occur during window operations.
#[derive(Error, Debug)]
pub enum Error {
    /// A Win32 call failed with an OS error code.
    #[error("{call} failed: os error {code}")]
    Os {
        /// Name of the failing Win32 call.
        call: &'static str,
        /// OS error / HRESULT code.
        code: i32,
    },

    /// The window handle is no longer valid (destroyed by its owner).
    #[error("window handle no longer valid")]
    WindowGone,

    /// Every placement strategy in the chain was attempted and failed.
    #[error("window could not be repositioned after {attempted} strategies")]
    PlaceExhausted {
        /// Number of strategies attempted.
        attempted: usize,
    },

    /// Every foreground strategy in the chain was attempted and failed.
    #[error("window could not be brought to the foreground after {attempted} strategies")]
    RaiseExhausted {
        /// Number of strategies attempted.
        attempted: usize,
    },

    /// Window operations are not available on this platform.
    #[error("window operations are not supported on this platform")]
    Unsupported,
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
