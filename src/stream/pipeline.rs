//! Binds one readable source to one or more writable sinks, forwarding
//! buffers with backpressure: a sink that falls behind stalls the whole
//! pipeline rather than dropping data or letting the source run away.

use std::io::{self, Read, Write};

use crate::buffer_pool::BufferPool;
use crate::stream::readable::{AsyncReadableStream, ReadOutcome};
use crate::stream::writable::{AsyncWritableStream, WriteOutcome};

#[derive(Debug, PartialEq, Eq)]
pub enum PipelineStatus {
    /// Forward progress was made this call.
    Progress,
    /// Nothing to do until the source becomes readable again.
    WaitingOnRead,
    /// Nothing to do until a sink becomes writable again.
    WaitingOnWrite,
    /// Source reached EOF and every sink has drained its queue.
    Done,
}

pub struct Pipeline<R, W> {
    source: AsyncReadableStream<R>,
    sinks: Vec<AsyncWritableStream<W>>,
}

impl<R: Read, W: Write> Pipeline<R, W> {
    pub fn new(source: R, sinks: Vec<W>) -> Self {
        Pipeline {
            source: AsyncReadableStream::new(source),
            sinks: sinks.into_iter().map(AsyncWritableStream::new).collect(),
        }
    }

    fn all_sinks_idle(&self) -> bool {
        self.sinks.iter().all(|s| s.is_idle())
    }

    /// Advances the pipeline by at most one read and one write per sink.
    /// Call again whenever the source or a sink reports readiness.
    pub fn pump(&mut self, pool: &mut BufferPool) -> io::Result<PipelineStatus> {
        let mut made_progress = false;
        let mut any_would_block_write = false;

        for sink in &mut self.sinks {
            match sink.poll_write(pool)? {
                WriteOutcome::Progress => made_progress = true,
                WriteOutcome::WouldBlock => any_would_block_write = true,
                WriteOutcome::Idle => {}
            }
        }

        if self.source.has_ended() {
            return if self.all_sinks_idle() {
                Ok(PipelineStatus::Done)
            } else if made_progress {
                Ok(PipelineStatus::Progress)
            } else {
                Ok(PipelineStatus::WaitingOnWrite)
            };
        }

        // Don't pull more off a source that every sink is still chewing on:
        // a fan-out with a slow sink must stop reading, not buffer unbounded.
        if !self.all_sinks_idle() {
            return Ok(if made_progress {
                PipelineStatus::Progress
            } else if any_would_block_write {
                PipelineStatus::WaitingOnWrite
            } else {
                PipelineStatus::Progress
            });
        }

        match self.source.poll_read(pool)? {
            ReadOutcome::Data(handle) => {
                for _ in 1..self.sinks.len() {
                    pool.retain(handle);
                }
                for sink in &mut self.sinks {
                    sink.queue_write(handle);
                }
                Ok(PipelineStatus::Progress)
            }
            ReadOutcome::End => {
                if self.all_sinks_idle() {
                    Ok(PipelineStatus::Done)
                } else {
                    Ok(PipelineStatus::Progress)
                }
            }
            ReadOutcome::WouldBlock => Ok(if made_progress {
                PipelineStatus::Progress
            } else {
                PipelineStatus::WaitingOnRead
            }),
            ReadOutcome::PoolExhausted => Ok(if made_progress {
                PipelineStatus::Progress
            } else {
                PipelineStatus::WaitingOnWrite
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn forwards_single_sink() {
        let mut pool = BufferPool::new(4, 4);
        let source = Cursor::new(b"0123456789".to_vec());
        let mut out = Vec::new();
        {
            let mut pipeline = Pipeline::new(source, vec![&mut out]);
            loop {
                match pipeline.pump(&mut pool).unwrap() {
                    PipelineStatus::Done => break,
                    _ => continue,
                }
            }
        }
        assert_eq!(out, b"0123456789");
    }

    #[test]
    fn fans_out_to_two_sinks() {
        let mut pool = BufferPool::new(4, 4);
        let source = Cursor::new(b"abcdef".to_vec());
        let mut a = Vec::new();
        let mut b = Vec::new();
        {
            let mut pipeline = Pipeline::new(source, vec![&mut a, &mut b]);
            loop {
                match pipeline.pump(&mut pool).unwrap() {
                    PipelineStatus::Done => break,
                    _ => continue,
                }
            }
        }
        assert_eq!(a, b"abcdef");
        assert_eq!(b, b"abcdef");
    }
}
