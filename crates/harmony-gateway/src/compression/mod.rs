//! Transport compression (`zlib-stream`)

mod inflater;
mod pool;

pub use inflater::{is_stream_header, DecompressError, Inflater, ZLIB_SUFFIX};
pub use pool::{DecompressorPool, PooledInflater, DEFAULT_MAX_IDLE};
