//! Network module - transport from the forwarded local port

mod stream;

pub use stream::{connect, pump, CHUNK_SIZE};
