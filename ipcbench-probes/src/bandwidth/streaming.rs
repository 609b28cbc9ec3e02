//! Chunked send/receive primitives for stream transports
//!
//! Shared by the pipe, FIFO, TCP and Unix-domain-socket probes. Both
//! functions run inside the timed window, so neither allocates: the
//! receiver fills a pre-sized buffer through a caller-provided scratch
//! slice.

use std::io::{Read, Write};

/// Write `payload` in chunks of at most `chunk` bytes, retrying short
/// writes until each chunk completes.
pub(crate) fn send_chunks<W: Write>(
    writer: &mut W,
    payload: &[u8],
    chunk: usize,
) -> std::io::Result<()> {
    let mut sent = 0usize;
    while sent < payload.len() {
        let take = chunk.min(payload.len() - sent);
        let n = writer.write(&payload[sent..sent + take])?;
        if n == 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::WriteZero,
                "peer stopped accepting data",
            ));
        }
        sent += n;
    }
    Ok(())
}

/// Read into `out` until it holds `payload_len` bytes or the stream ends.
///
/// `out` must be empty with at least `payload_len` capacity and `scratch`
/// at least one chunk long. A premature end of stream leaves `out` short;
/// the caller's verification turns that into a failure.
pub(crate) fn recv_chunks<R: Read>(
    reader: &mut R,
    out: &mut Vec<u8>,
    scratch: &mut [u8],
    payload_len: usize,
) -> std::io::Result<()> {
    while out.len() < payload_len {
        let want = scratch.len().min(payload_len - out.len());
        let n = reader.read(&mut scratch[..want])?;
        if n == 0 {
            tracing::debug!(
                received = out.len(),
                expected = payload_len,
                "sender closed the stream prematurely"
            );
            break;
        }
        out.extend_from_slice(&scratch[..n]);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn chunked_roundtrip_over_a_buffer() {
        let payload: Vec<u8> = (0..10_000u32).map(|i| i as u8).collect();

        let mut wire = Vec::new();
        send_chunks(&mut wire, &payload, 256).unwrap();
        assert_eq!(wire, payload);

        let mut out = Vec::with_capacity(payload.len());
        let mut scratch = vec![0u8; 256];
        recv_chunks(&mut Cursor::new(&wire), &mut out, &mut scratch, payload.len()).unwrap();
        assert_eq!(out, payload);
    }

    #[test]
    fn short_stream_stops_without_error() {
        let wire = vec![1u8; 100];
        let mut out = Vec::with_capacity(500);
        let mut scratch = vec![0u8; 64];
        recv_chunks(&mut Cursor::new(&wire), &mut out, &mut scratch, 500).unwrap();
        assert_eq!(out.len(), 100);
    }
}
