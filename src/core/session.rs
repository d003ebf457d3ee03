//! Session resource lifecycle
//!
//! The interrupt handler may fire at any point, so each handle lives
//! behind its own lock and is released only if it was registered.

use std::net::{Shutdown, TcpStream};
use std::sync::Mutex;

use crate::audio::AudioSink;
use crate::log_debug;

/// Handles that must be released on every exit path, including the
/// signal-triggered one.
#[derive(Default)]
pub struct SessionResources {
    socket: Mutex<Option<TcpStream>>,
    sink: Mutex<Option<AudioSink>>,
}

impl SessionResources {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a clone of the stream socket so teardown can unblock a
    /// pending read.
    pub fn register_socket(&self, socket: &TcpStream) {
        match socket.try_clone() {
            Ok(clone) => *self.socket.lock().unwrap() = Some(clone),
            Err(e) => log_debug!("MAIN", "Could not track socket for teardown: {}", e),
        }
    }

    pub fn register_sink(&self, sink: AudioSink) {
        *self.sink.lock().unwrap() = Some(sink);
    }

    /// Release whatever was registered; idempotent and safe to call from
    /// the interrupt handler while setup is still in progress.
    pub fn release(&self) {
        // Dropping the sink stops the playback thread and releases the
        // output device.
        self.sink.lock().unwrap().take();

        if let Some(socket) = self.socket.lock().unwrap().take() {
            let _ = socket.shutdown(Shutdown::Both);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::net::TcpListener;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn release_tolerates_partial_and_repeated_calls() {
        let resources = SessionResources::new();
        resources.release();
        resources.release();
    }

    #[test]
    fn release_unblocks_a_pending_read() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).unwrap();
        let (_server, _) = listener.accept().unwrap();

        let resources = Arc::new(SessionResources::new());
        resources.register_socket(&client);

        let mut reader = client;
        let pending = thread::spawn(move || {
            let mut buf = [0u8; 16];
            reader.read(&mut buf)
        });

        thread::sleep(Duration::from_millis(50));
        resources.release();

        // Would hang forever if the shutdown did not reach the blocked read.
        let read = pending.join().unwrap().unwrap();
        assert_eq!(read, 0);
    }
}
