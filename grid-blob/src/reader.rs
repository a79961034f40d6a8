use std::io::ErrorKind;

use futures::io::AsyncReadExt;

use crate::{ChunkReader, GridError, GridResult};

/// 64 KiB
pub const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;

/// Result of one [`ObjectReader::read`] call.
///
/// `done` is only ever set together with `bytes_read == 0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadOutcome {
    pub bytes_read: usize,
    pub done: bool,
}

impl ReadOutcome {
    fn data(bytes_read: usize) -> Self {
        Self {
            bytes_read,
            done: false,
        }
    }

    fn end() -> Self {
        Self {
            bytes_read: 0,
            done: true,
        }
    }
}

/// Pull-based, forward-only reader over one object's chunks.
///
/// Owns a single buffer allocated once at open time; every read fills at most
/// that buffer, whatever the stored chunk size is. The declared object size is
/// enforced: a stream that ends early fails with [`GridError::Truncated`] and
/// one that runs long fails with [`GridError::Overrun`]. After any failure the
/// reader is faulted and never reports a clean end.
pub struct ObjectReader {
    inner: ChunkReader,
    buf: Box<[u8]>,
    filled: usize,
    expected: u64,
    position: u64,
    state: ReaderState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReaderState {
    Open,
    Done,
    Faulted,
}

impl ObjectReader {
    pub fn new(inner: ChunkReader, buffer_size: usize, expected: u64) -> Self {
        Self {
            inner,
            buf: vec![0u8; buffer_size.max(1)].into_boxed_slice(),
            filled: 0,
            expected,
            position: 0,
            state: ReaderState::Open,
        }
    }

    /// Read the next run of bytes into the internal buffer.
    pub async fn read(&mut self) -> GridResult<ReadOutcome> {
        match self.state {
            ReaderState::Done => return Ok(ReadOutcome::end()),
            ReaderState::Faulted => return Err(GridError::StreamFaulted),
            ReaderState::Open => {}
        }

        self.filled = 0;
        let result = loop {
            match self.inner.read(&mut self.buf).await {
                Ok(n) => break Ok(n),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => break Err(GridError::from(e)),
            }
        };

        match result {
            Ok(0) if self.position < self.expected => self.fault(GridError::Truncated {
                expected: self.expected,
                actual: self.position,
            }),
            Ok(0) => {
                self.state = ReaderState::Done;
                Ok(ReadOutcome::end())
            }
            Ok(n) => {
                self.position += n as u64;
                if self.position > self.expected {
                    return self.fault(GridError::Overrun {
                        expected: self.expected,
                    });
                }
                self.filled = n;
                Ok(ReadOutcome::data(n))
            }
            Err(e) => self.fault(e),
        }
    }

    fn fault(&mut self, error: GridError) -> GridResult<ReadOutcome> {
        self.state = ReaderState::Faulted;
        self.filled = 0;
        Err(error)
    }

    /// Bytes produced by the last successful read
    pub fn filled(&self) -> &[u8] {
        &self.buf[..self.filled]
    }

    /// Bytes read so far
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Declared object size
    pub fn expected(&self) -> u64 {
        self.expected
    }

    pub fn buffer_size(&self) -> usize {
        self.buf.len()
    }
}

impl std::fmt::Debug for ObjectReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectReader")
            .field("buffer_size", &self.buf.len())
            .field("expected", &self.expected)
            .field("position", &self.position)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::io::{AsyncReadExt as _, Cursor};
    use bytes::Bytes;
    use futures::{stream, TryStreamExt};
    use tokio_test::{assert_err, assert_ok};

    fn chunked(data: &[u8], chunk: usize) -> ChunkReader {
        let chunks: Vec<std::io::Result<Bytes>> = data
            .chunks(chunk)
            .map(|c| Ok(Bytes::copy_from_slice(c)))
            .collect();
        Box::pin(stream::iter(chunks).into_async_read())
    }

    async fn drain(mut reader: ObjectReader) -> GridResult<Vec<u8>> {
        let mut out = Vec::new();
        loop {
            let outcome = reader.read().await?;
            if outcome.done {
                assert_eq!(outcome.bytes_read, 0);
                return Ok(out);
            }
            assert!(outcome.bytes_read > 0);
            assert!(outcome.bytes_read <= reader.buffer_size());
            out.extend_from_slice(reader.filled());
        }
    }

    #[tokio::test]
    async fn reads_are_independent_of_chunk_size() {
        let data: Vec<u8> = (0..1000u32).map(|i| (i % 251) as u8).collect();
        for chunk in [1, 7, 64, 100, 333, 1000, 4096] {
            for buffer in [1, 10, 64, 999, 2048] {
                let reader = ObjectReader::new(chunked(&data, chunk), buffer, data.len() as u64);
                let out = assert_ok!(drain(reader).await);
                assert_eq!(out, data, "chunk={chunk} buffer={buffer}");
            }
        }
    }

    #[tokio::test]
    async fn empty_object_ends_immediately() {
        let mut reader = ObjectReader::new(Box::pin(Cursor::new(Vec::<u8>::new())), 16, 0);
        let outcome = assert_ok!(reader.read().await);
        assert_eq!(outcome, ReadOutcome { bytes_read: 0, done: true });
        // stays done
        assert!(assert_ok!(reader.read().await).done);
    }

    #[tokio::test]
    async fn short_stream_is_truncation_not_end() {
        let reader = ObjectReader::new(chunked(&[1, 2, 3], 2), 8, 10);
        match drain(reader).await {
            Err(GridError::Truncated { expected, actual }) => {
                assert_eq!(expected, 10);
                assert_eq!(actual, 3);
            }
            other => panic!("expected truncation, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn long_stream_is_overrun() {
        let reader = ObjectReader::new(chunked(&[1, 2, 3, 4], 4), 8, 2);
        assert!(matches!(drain(reader).await, Err(GridError::Overrun { expected: 2 })));
    }

    #[tokio::test]
    async fn read_error_faults_the_reader() {
        let chunks: Vec<std::io::Result<Bytes>> = vec![
            Ok(Bytes::from_static(&[1, 2])),
            Err(std::io::Error::new(ErrorKind::ConnectionReset, "chunk fetch failed")),
        ];
        let inner: ChunkReader = Box::pin(stream::iter(chunks).into_async_read());
        let mut reader = ObjectReader::new(inner, 8, 4);

        assert_eq!(assert_ok!(reader.read().await).bytes_read, 2);
        assert!(matches!(reader.read().await, Err(GridError::Io { .. })));
        assert!(matches!(reader.read().await, Err(GridError::StreamFaulted)));
    }

    #[tokio::test]
    async fn large_objects_use_one_buffer() {
        let total: u64 = 8 * 1024 * 1024;
        let inner: ChunkReader = Box::pin(futures::io::repeat(7).take(total));
        let mut reader = ObjectReader::new(inner, 4096, total);

        let mut seen = 0u64;
        loop {
            let outcome = assert_ok!(reader.read().await);
            if outcome.done {
                break;
            }
            assert!(outcome.bytes_read <= 4096);
            assert_eq!(reader.buffer_size(), 4096);
            seen += outcome.bytes_read as u64;
        }
        assert_eq!(seen, total);
        assert_eq!(reader.position(), reader.expected());
    }

    #[tokio::test]
    async fn failed_reader_never_reports_a_clean_end() {
        let mut reader = ObjectReader::new(chunked(&[9; 5], 5), 8, 6);
        assert_ok!(reader.read().await);
        assert_err!(reader.read().await);
        assert_err!(reader.read().await);
    }
}
