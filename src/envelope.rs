//! Converting between gzip envelopes and the raw deflate payloads ZIP stores.

use std::io::{self, Read};

use thiserror::Error;
use tracing::trace;

pub const GZIP_HEADER_LEN: usize = 10;
pub const GZIP_TRAILER_LEN: usize = 8;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const GZIP_METHOD_DEFLATE: u8 = 8;
const GZIP_OS_UNIX: u8 = 3;
const READ_CHUNK_SIZE: usize = 16 * 1024;

/// Why an entry is stored instead of deflated
#[derive(Debug, Error)]
pub enum Fallback {
    #[error("malformed gzip envelope: {0}")]
    MalformedEnvelope(&'static str),

    #[error("compressed size {compressed} does not beat original size {original}")]
    Ineffective { compressed: usize, original: usize },

    #[error("compression service failed: {0}")]
    Service(#[from] io::Error),
}

/// Reads a gzip stream to completion and returns the deflate payload between
/// the 10-byte header and the 8-byte trailer.
///
/// The payload is returned only if it is strictly smaller than
/// `original_len`. Reading stops as soon as that can no longer happen. The
/// trailer's CRC and size are dropped unread.
pub fn strip_gzip_envelope<R: Read>(mut source: R, original_len: usize) -> Result<Vec<u8>, Fallback> {
    // payload + trailer must stay below this for the payload to win
    let limit = original_len.saturating_add(GZIP_TRAILER_LEN);

    let mut header = [0u8; GZIP_HEADER_LEN];
    let mut header_len = 0;
    let mut body = Vec::new();
    let mut chunk = vec![0u8; READ_CHUNK_SIZE];

    loop {
        let n = match source.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(Fallback::Service(e)),
        };
        let mut bytes = &chunk[..n];

        if header_len < GZIP_HEADER_LEN {
            let take = (GZIP_HEADER_LEN - header_len).min(bytes.len());
            header[header_len..header_len + take].copy_from_slice(&bytes[..take]);
            header_len += take;
            bytes = &bytes[take..];

            if header_len == GZIP_HEADER_LEN {
                validate_header(&header)?;
            }
        }

        body.extend_from_slice(bytes);
        if body.len() >= limit {
            trace!(read = body.len(), original_len, "deflate output no longer smaller, aborting");
            return Err(Fallback::Ineffective {
                compressed: body.len().saturating_sub(GZIP_TRAILER_LEN),
                original: original_len,
            });
        }
    }

    if header_len < GZIP_HEADER_LEN {
        return Err(Fallback::MalformedEnvelope("stream ended inside the header"));
    }
    if body.len() < GZIP_TRAILER_LEN {
        return Err(Fallback::MalformedEnvelope("stream ended inside the trailer"));
    }

    body.truncate(body.len() - GZIP_TRAILER_LEN);
    Ok(body)
}

fn validate_header(header: &[u8; GZIP_HEADER_LEN]) -> Result<(), Fallback> {
    if header[..2] != GZIP_MAGIC {
        return Err(Fallback::MalformedEnvelope("bad magic"));
    }
    if header[2] != GZIP_METHOD_DEFLATE {
        return Err(Fallback::MalformedEnvelope("method is not deflate"));
    }
    // FTEXT, FHCRC, FEXTRA, FNAME, FCOMMENT all change the header layout or meaning
    if header[3] != 0 {
        return Err(Fallback::MalformedEnvelope("optional header fields are not supported"));
    }
    Ok(())
}

/// Wraps a raw deflate payload in a minimal gzip envelope.
///
/// The trailer carries `crc32` and `original_len` so a gzip decoder can verify
/// its own output.
pub fn wrap_gzip_envelope(deflate: &[u8], crc32: u32, original_len: u32) -> Vec<u8> {
    let mut out = Vec::with_capacity(GZIP_HEADER_LEN + deflate.len() + GZIP_TRAILER_LEN);
    out.extend_from_slice(&GZIP_MAGIC);
    out.extend_from_slice(&[GZIP_METHOD_DEFLATE, 0, 0, 0, 0, 0, 0, GZIP_OS_UNIX]);
    out.extend_from_slice(deflate);
    out.extend_from_slice(&crc32.to_le_bytes());
    out.extend_from_slice(&original_len.to_le_bytes());
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compression::{CompressionService, DecompressionService, FlateGunzip, FlateGzip};
    use crate::crc::crc32;

    /// Hands out the underlying bytes a few at a time
    struct Trickle<'a> {
        data: &'a [u8],
        step: usize,
    }

    impl Read for Trickle<'_> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = self.step.min(buf.len()).min(self.data.len());
            buf[..n].copy_from_slice(&self.data[..n]);
            self.data = &self.data[n..];
            Ok(n)
        }
    }

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        FlateGzip::default()
            .compress(data)
            .unwrap()
            .read_to_end(&mut out)
            .unwrap();
        out
    }

    fn compressible() -> Vec<u8> {
        b"abcabcabcabc".repeat(200)
    }

    #[test]
    fn test_strips_header_and_trailer() {
        let data = compressible();
        let envelope = gzip(&data);
        let payload = strip_gzip_envelope(&envelope[..], data.len()).unwrap();

        assert_eq!(payload.len(), envelope.len() - GZIP_HEADER_LEN - GZIP_TRAILER_LEN);
        assert_eq!(&payload[..], &envelope[GZIP_HEADER_LEN..envelope.len() - GZIP_TRAILER_LEN]);
    }

    #[test]
    fn test_header_split_across_chunks() {
        let data = compressible();
        let envelope = gzip(&data);
        let whole = strip_gzip_envelope(&envelope[..], data.len()).unwrap();

        for step in [1, 3, 7, 11] {
            let source = Trickle { data: &envelope, step };
            assert_eq!(strip_gzip_envelope(source, data.len()).unwrap(), whole);
        }
    }

    #[test]
    fn test_rewrapped_payload_inflates() {
        let data = compressible();
        let payload = strip_gzip_envelope(&gzip(&data)[..], data.len()).unwrap();
        let wrapped = wrap_gzip_envelope(&payload, crc32(&data, 0), data.len() as u32);

        let mut plain = Vec::new();
        FlateGunzip.decompress(&wrapped).read_to_end(&mut plain).unwrap();
        assert_eq!(plain, data);
    }

    #[test]
    fn test_flagged_header_falls_back() {
        let data = compressible();
        let mut envelope = gzip(&data);
        envelope[3] = 0b0000_1000; // FNAME
        assert!(matches!(
            strip_gzip_envelope(&envelope[..], data.len()),
            Err(Fallback::MalformedEnvelope(_))
        ));
    }

    #[test]
    fn test_bad_magic_falls_back() {
        let data = compressible();
        let mut envelope = gzip(&data);
        envelope[0] = 0;
        assert!(matches!(
            strip_gzip_envelope(&envelope[..], data.len()),
            Err(Fallback::MalformedEnvelope("bad magic"))
        ));
    }

    #[test]
    fn test_truncated_stream_falls_back() {
        assert!(matches!(
            strip_gzip_envelope(&[0x1f, 0x8b, 0x08][..], 100),
            Err(Fallback::MalformedEnvelope(_))
        ));
        let header_only = [0x1f, 0x8b, 0x08, 0, 0, 0, 0, 0, 0, 3, 1, 2];
        assert!(matches!(
            strip_gzip_envelope(&header_only[..], 100),
            Err(Fallback::MalformedEnvelope(_))
        ));
    }

    #[test]
    fn test_incompressible_falls_back() {
        let data: Vec<u8> = (0..64u8).collect();
        assert!(matches!(
            strip_gzip_envelope(&gzip(&data)[..], data.len()),
            Err(Fallback::Ineffective { .. })
        ));
    }

    #[test]
    fn test_empty_input_falls_back() {
        assert!(matches!(
            strip_gzip_envelope(&gzip(&[])[..], 0),
            Err(Fallback::Ineffective { .. })
        ));
    }

    #[test]
    fn test_service_error_falls_back() {
        struct Broken;
        impl Read for Broken {
            fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
                Err(io::Error::new(io::ErrorKind::Other, "service down"))
            }
        }
        assert!(matches!(strip_gzip_envelope(Broken, 10), Err(Fallback::Service(_))));
    }

    #[test]
    fn test_wrap_layout() {
        let wrapped = wrap_gzip_envelope(&[0xAA, 0xBB], 0x1122_3344, 5);
        assert_eq!(
            wrapped,
            vec![
                0x1f, 0x8b, 0x08, 0, 0, 0, 0, 0, 0, 0x03, 0xAA, 0xBB, 0x44, 0x33, 0x22, 0x11, 5, 0, 0, 0
            ]
        );
    }
}
