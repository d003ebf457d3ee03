//! Audio stream transport
//!
//! Connects to the forwarded port and pumps PCM bytes into the playback
//! sink until the device closes the connection.

use std::io::{self, Read};
use std::net::TcpStream;

use anyhow::{Context, Result};

use crate::audio::SinkWriter;
use crate::log_info;

/// Bytes requested from the socket per read.
pub const CHUNK_SIZE: usize = 4096;

/// Open a blocking connection to the forwarded local port.
pub fn connect(port: u16) -> Result<TcpStream> {
    let stream = TcpStream::connect(("127.0.0.1", port))
        .with_context(|| format!("connection to 127.0.0.1:{} failed", port))?;
    Ok(stream)
}

/// Transfer bytes from the socket to the sink until the peer closes.
///
/// A zero-length read is the normal end of the session; I/O errors are
/// returned to the caller, which logs them and ends the session without
/// treating them as fatal.
pub fn pump(stream: &mut TcpStream, sink: &mut SinkWriter) -> io::Result<u64> {
    let mut chunk = [0u8; CHUNK_SIZE];
    let mut total = 0u64;

    loop {
        let read = stream.read(&mut chunk)?;
        if read == 0 {
            log_info!("NET", "Connection closed by device");
            return Ok(total);
        }
        sink.write(&chunk[..read])?;
        total += read as u64;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;
    use std::io::Write;
    use std::net::TcpListener;

    fn loopback_pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).unwrap();
        let (server, _) = listener.accept().unwrap();
        (client, server)
    }

    #[test]
    fn peer_close_ends_the_loop_normally() {
        let (mut client, server) = loopback_pair();
        drop(server);

        let (tx, _rx) = bounded(4);
        let mut sink = SinkWriter::new(tx);
        assert_eq!(pump(&mut client, &mut sink).unwrap(), 0);
    }

    #[test]
    fn received_bytes_reach_the_sink_before_close() {
        let (mut client, mut server) = loopback_pair();
        let payload: Vec<u8> = (0u8..8).collect();
        server.write_all(&payload).unwrap();
        drop(server);

        let (tx, rx) = bounded(16);
        let mut sink = SinkWriter::new(tx);
        assert_eq!(pump(&mut client, &mut sink).unwrap(), 8);

        let samples: Vec<i16> = rx.try_iter().flatten().collect();
        assert_eq!(
            samples,
            vec![
                i16::from_le_bytes([0, 1]),
                i16::from_le_bytes([2, 3]),
                i16::from_le_bytes([4, 5]),
                i16::from_le_bytes([6, 7]),
            ]
        );
    }

    #[test]
    fn connect_to_a_dead_port_fails() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        assert!(connect(port).is_err());
    }
}
