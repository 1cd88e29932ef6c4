//! Blocking chunked reads over a byte source.

use std::io::{ErrorKind, Read};

use crate::error::Result;
use crate::format::READ_CHUNK_BYTES;

/// Feed `reader` to `f` in chunks until end of input.
/// Returns the total number of bytes read.
pub fn for_each_chunk<R, F>(mut reader: R, mut f: F) -> Result<u64>
where
    R: Read,
    F: FnMut(&[u8]) -> Result<()>,
{
    let mut chunk = [0u8; READ_CHUNK_BYTES];
    let mut total = 0u64;
    loop {
        let n = match reader.read(&mut chunk) {
            Ok(0) => return Ok(total),
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        total += n as u64;
        f(&chunk[..n])?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn visits_everything_once() {
        let data: Vec<u8> = (0u8..=255).cycle().take(3 * READ_CHUNK_BYTES + 17).collect();
        let mut seen = Vec::new();
        let total = for_each_chunk(Cursor::new(&data), |chunk| {
            seen.extend_from_slice(chunk);
            Ok(())
        })
        .unwrap();
        assert_eq!(total, data.len() as u64);
        assert_eq!(seen, data);
    }

    #[test]
    fn callback_error_stops_the_loop() {
        let data = vec![1u8; 10];
        let mut calls = 0;
        let err = for_each_chunk(Cursor::new(&data), |_| {
            calls += 1;
            Err(crate::Error::MalformedInput("stop".into()))
        })
        .unwrap_err();
        assert!(err.is_malformed());
        assert_eq!(calls, 1);
    }
}
