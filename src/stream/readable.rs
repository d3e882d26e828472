//! Async-readable stream: pulls from a `Read` source into pooled buffers,
//! one kernel read in flight at a time.

use std::io::{self, Read};

use crate::buffer_pool::{BufferHandle, BufferPool};

#[derive(Debug)]
pub enum ReadOutcome {
    /// A chunk of data was read into the returned buffer. The caller owns
    /// the handle and must release it once done.
    Data(BufferHandle),
    /// The source reached EOF; no more data will ever arrive.
    End,
    /// The underlying source isn't ready; retry once it signals readable.
    WouldBlock,
    /// The pool has no free buffers right now; retry once one frees up.
    PoolExhausted,
}

pub struct AsyncReadableStream<S> {
    source: S,
    ended: bool,
}

impl<S: Read> AsyncReadableStream<S> {
    pub fn new(source: S) -> Self {
        AsyncReadableStream { source, ended: false }
    }

    pub fn get_ref(&self) -> &S {
        &self.source
    }

    pub fn get_mut(&mut self) -> &mut S {
        &mut self.source
    }

    pub fn into_inner(self) -> S {
        self.source
    }

    pub fn has_ended(&self) -> bool {
        self.ended
    }

    /// Performs at most one non-blocking read, filling a single buffer
    /// checked out from `pool`.
    pub fn poll_read(&mut self, pool: &mut BufferPool) -> io::Result<ReadOutcome> {
        if self.ended {
            return Ok(ReadOutcome::End);
        }
        let Some(handle) = pool.acquire() else {
            return Ok(ReadOutcome::PoolExhausted);
        };

        match self.source.read(pool.get_mut(handle)) {
            Ok(0) => {
                pool.release(handle);
                self.ended = true;
                Ok(ReadOutcome::End)
            }
            Ok(n) => {
                pool.set_len(handle, n);
                Ok(ReadOutcome::Data(handle))
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                pool.release(handle);
                Ok(ReadOutcome::WouldBlock)
            }
            Err(e) => {
                pool.release(handle);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn reads_until_end() {
        let mut pool = BufferPool::new(2, 8);
        let mut stream = AsyncReadableStream::new(Cursor::new(b"hello world".to_vec()));

        let mut collected = Vec::new();
        loop {
            match stream.poll_read(&mut pool).unwrap() {
                ReadOutcome::Data(h) => {
                    collected.extend_from_slice(pool.get(h));
                    pool.release(h);
                }
                ReadOutcome::End => break,
                other => panic!("unexpected: {other:?}"),
            }
        }
        assert_eq!(collected, b"hello world");
        assert!(stream.has_ended());
    }

    #[test]
    fn reports_pool_exhaustion() {
        let mut pool = BufferPool::new(1, 8);
        let held = pool.acquire().unwrap();
        let mut stream = AsyncReadableStream::new(Cursor::new(b"x".to_vec()));
        matches!(stream.poll_read(&mut pool).unwrap(), ReadOutcome::PoolExhausted);
        pool.release(held);
    }
}
