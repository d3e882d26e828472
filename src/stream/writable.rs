//! Async-writable stream: a FIFO queue of pooled buffers drained into a
//! `Write` sink, one kernel write in flight at a time.

use std::collections::VecDeque;
use std::io::{self, Write};

use crate::buffer_pool::{BufferHandle, BufferPool};

#[derive(Debug, PartialEq, Eq)]
pub enum WriteOutcome {
    /// At least one byte was written; the queue may still hold data.
    Progress,
    /// The queue is empty; nothing to do.
    Idle,
    /// The sink isn't ready for more; retry once it signals writable.
    WouldBlock,
}

struct Queued {
    handle: BufferHandle,
    offset: usize,
}

pub struct AsyncWritableStream<S> {
    sink: S,
    queue: VecDeque<Queued>,
}

impl<S: Write> AsyncWritableStream<S> {
    pub fn new(sink: S) -> Self {
        AsyncWritableStream {
            sink,
            queue: VecDeque::new(),
        }
    }

    pub fn get_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn into_inner(self) -> S {
        self.sink
    }

    pub fn is_idle(&self) -> bool {
        self.queue.is_empty()
    }

    /// Enqueues a buffer for writing. Takes ownership of the caller's
    /// reference to `handle`; the stream releases it back to `pool` once
    /// fully written.
    pub fn queue_write(&mut self, handle: BufferHandle) {
        self.queue.push_back(Queued { handle, offset: 0 });
    }

    /// Writes as much of the front of the queue as the sink will accept
    /// right now, releasing fully-written buffers back to `pool`.
    pub fn poll_write(&mut self, pool: &mut BufferPool) -> io::Result<WriteOutcome> {
        let Some(front) = self.queue.front_mut() else {
            return Ok(WriteOutcome::Idle);
        };

        let data = pool.get(front.handle);
        match self.sink.write(&data[front.offset..]) {
            Ok(0) => Ok(WriteOutcome::WouldBlock),
            Ok(n) => {
                front.offset += n;
                if front.offset >= data.len() {
                    let handle = front.handle;
                    self.queue.pop_front();
                    pool.release(handle);
                }
                Ok(WriteOutcome::Progress)
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(WriteOutcome::WouldBlock),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drains_queue_in_order() {
        let mut pool = BufferPool::new(2, 8);
        let mut out = Vec::new();
        let a = pool.acquire().unwrap();
        pool.get_mut(a)[..2].copy_from_slice(b"ab");
        pool.set_len(a, 2);
        let b = pool.acquire().unwrap();
        pool.get_mut(b)[..2].copy_from_slice(b"cd");
        pool.set_len(b, 2);

        let mut stream = AsyncWritableStream::new(&mut out);
        stream.queue_write(a);
        stream.queue_write(b);

        while !stream.is_idle() {
            stream.poll_write(&mut pool).unwrap();
        }
        assert_eq!(out, b"abcd");
        assert_eq!(pool.available(), 2);
    }
}
