use alloc::rc::Rc;
use core::cell::RefCell;
use core::fmt;
use std::io::{self, Read, Seek, SeekFrom};

use super::spool::Spool;
use crate::GraphError;

// -----------------------------------------------------------------------------
// Pass

/// Which pass over the stream a decode is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pass {
    First,
    /// The pass after a restart. There is never a third.
    Second,
}

impl Pass {
    /// Suffix for error messages.
    pub(crate) fn describe(self) -> &'static str {
        match self {
            Pass::First => "",
            Pass::Second => " (second pass)",
        }
    }
}

/// How a [`RewindableStream`] gets back to its start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RestartStrategy {
    Seek,
    Recreate,
    Tee,
}

// -----------------------------------------------------------------------------
// BaseReader

/// Anything readable and seekable.
pub trait ReadSeek: Read + Seek {}

impl<T: Read + Seek + ?Sized> ReadSeek for T {}

/// Shared handle to the seekable base of a recreated stream.
///
/// Handed to the wrapper factory of [`RewindableStream::recreate`]. All
/// clones read from and seek the same base.
#[derive(Clone)]
pub struct BaseReader<'a> {
    inner: Rc<RefCell<&'a mut dyn ReadSeek>>,
}

impl Read for BaseReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.borrow_mut().read(buf)
    }
}

impl Seek for BaseReader<'_> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.inner.borrow_mut().seek(pos)
    }
}

type Factory<'a> = Box<dyn FnMut(BaseReader<'a>) -> io::Result<Box<dyn Read + 'a>> + 'a>;

// -----------------------------------------------------------------------------
// RewindableStream

enum Source<'a> {
    Seek {
        inner: &'a mut dyn ReadSeek,
        start: u64,
    },
    Recreate {
        base: BaseReader<'a>,
        start: u64,
        factory: Factory<'a>,
        current: Box<dyn Read + 'a>,
    },
    Tee {
        inner: &'a mut dyn Read,
        spool: Spool,
    },
}

/// A byte source that can be restarted once.
///
/// The first pass reads normally. [`restart`](Self::restart) brings the
/// stream back to where it was created and starts the second pass; a second
/// restart is refused with [`GraphError::Restart`].
pub struct RewindableStream<'a> {
    source: Source<'a>,
    pass: Pass,
}

impl<'a> RewindableStream<'a> {
    /// Restarts by seeking `inner` back to its current position.
    pub fn seekable(inner: &'a mut dyn ReadSeek) -> io::Result<Self> {
        let start = inner.stream_position()?;
        Ok(Self {
            source: Source::Seek { inner, start },
            pass: Pass::First,
        })
    }

    /// Reads through a wrapper built by `factory` over `base`, and restarts by
    /// seeking `base` back and building a fresh wrapper.
    ///
    /// ```
    /// use std::io::{Cursor, Read};
    /// use vc_graph::RewindableStream;
    ///
    /// let mut base = Cursor::new(b"abc".to_vec());
    /// let mut stream = RewindableStream::recreate(&mut base, |base| {
    ///     Ok(Box::new(base.take(2)) as Box<dyn Read + '_>)
    /// })
    /// .unwrap();
    ///
    /// let mut first = String::new();
    /// stream.read_to_string(&mut first).unwrap();
    /// stream.restart().unwrap();
    /// let mut second = String::new();
    /// stream.read_to_string(&mut second).unwrap();
    /// assert_eq!((first.as_str(), second.as_str()), ("ab", "ab"));
    /// ```
    pub fn recreate(
        base: &'a mut dyn ReadSeek,
        mut factory: impl FnMut(BaseReader<'a>) -> io::Result<Box<dyn Read + 'a>> + 'a,
    ) -> io::Result<Self> {
        let start = base.stream_position()?;
        let base = BaseReader {
            inner: Rc::new(RefCell::new(base)),
        };
        let current = factory(base.clone())?;
        Ok(Self {
            source: Source::Recreate {
                base,
                start,
                factory: Box::new(factory),
                current,
            },
            pass: Pass::First,
        })
    }

    /// Restarts by replaying a temporary copy of everything the first pass
    /// read. Works with any reader.
    pub fn tee(inner: &'a mut dyn Read) -> io::Result<Self> {
        Ok(Self {
            source: Source::Tee {
                inner,
                spool: Spool::new()?,
            },
            pass: Pass::First,
        })
    }

    pub fn strategy(&self) -> RestartStrategy {
        match self.source {
            Source::Seek { .. } => RestartStrategy::Seek,
            Source::Recreate { .. } => RestartStrategy::Recreate,
            Source::Tee { .. } => RestartStrategy::Tee,
        }
    }

    #[inline]
    pub fn pass(&self) -> Pass {
        self.pass
    }

    /// Goes back to the start and begins the second pass.
    pub fn restart(&mut self) -> Result<(), GraphError> {
        if self.pass == Pass::Second {
            return Err(GraphError::Restart(
                "the stream was already restarted once".to_owned(),
            ));
        }
        let failed = |err: io::Error| GraphError::Restart(format!("cannot rewind the stream: {err}"));

        match &mut self.source {
            Source::Seek { inner, start } => {
                inner.seek(SeekFrom::Start(*start)).map_err(failed)?;
            }
            Source::Recreate {
                base,
                start,
                factory,
                current,
            } => {
                base.seek(SeekFrom::Start(*start)).map_err(failed)?;
                *current = factory(base.clone()).map_err(failed)?;
            }
            Source::Tee { spool, .. } => spool.rewind().map_err(failed)?,
        }

        log::debug!("restarted the stream ({:?})", self.strategy());
        self.pass = Pass::Second;
        Ok(())
    }
}

impl Read for RewindableStream<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match &mut self.source {
            Source::Seek { inner, .. } => inner.read(buf),
            Source::Recreate { current, .. } => current.read(buf),
            Source::Tee { inner, spool } => {
                if let Some(replayed) = spool.replay(buf) {
                    return replayed;
                }
                let n = inner.read(buf)?;
                if spool.is_recording() {
                    spool.record(&buf[..n])?;
                }
                Ok(n)
            }
        }
    }
}

impl fmt::Debug for RewindableStream<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RewindableStream")
            .field("strategy", &self.strategy())
            .field("pass", &self.pass)
            .finish()
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn drain(stream: &mut RewindableStream<'_>, n: usize) -> Vec<u8> {
        let mut buf = vec![0; n];
        stream.read_exact(&mut buf).unwrap();
        buf
    }

    #[test]
    fn seek_returns_to_creation_point() {
        let mut cursor = Cursor::new(b"xxhello".to_vec());
        cursor.set_position(2);
        let mut stream = RewindableStream::seekable(&mut cursor).unwrap();

        assert_eq!(drain(&mut stream, 3), b"hel");
        stream.restart().unwrap();
        assert_eq!(stream.pass(), Pass::Second);
        assert_eq!(drain(&mut stream, 5), b"hello");
    }

    #[test]
    fn tee_replays_then_continues() {
        let data = b"abcdefgh".to_vec();
        let mut input = &data[..];
        let mut stream = RewindableStream::tee(&mut input).unwrap();
        assert_eq!(stream.strategy(), RestartStrategy::Tee);

        assert_eq!(drain(&mut stream, 3), b"abc");
        stream.restart().unwrap();

        let mut rest = Vec::new();
        stream.read_to_end(&mut rest).unwrap();
        assert_eq!(rest, data);
    }

    #[test]
    fn only_one_restart() {
        let mut cursor = Cursor::new(vec![1, 2, 3]);
        let mut stream = RewindableStream::seekable(&mut cursor).unwrap();
        stream.restart().unwrap();

        let err = stream.restart().unwrap_err();
        assert!(matches!(err, GraphError::Restart(_)));
        assert!(err.is_fatal());
    }
}
