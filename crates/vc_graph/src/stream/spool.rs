use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};

/// Copy of the bytes a first pass consumed.
///
/// Backed by an unnamed temporary file, so the bytes disappear when the
/// spool is dropped, whatever the outcome of the decode.
pub(super) enum Spool {
    Recording { file: BufWriter<File>, len: u64 },
    Replaying { file: BufReader<File>, left: u64 },
    /// Transient state while switching from recording to replay.
    Closed,
}

impl Spool {
    pub fn new() -> io::Result<Self> {
        Ok(Spool::Recording {
            file: BufWriter::new(tempfile::tempfile()?),
            len: 0,
        })
    }

    pub fn record(&mut self, bytes: &[u8]) -> io::Result<()> {
        match self {
            Spool::Recording { file, len } => {
                file.write_all(bytes)?;
                *len += bytes.len() as u64;
                Ok(())
            }
            Spool::Replaying { .. } | Spool::Closed => Ok(()),
        }
    }

    /// Switches to replay. Further reads come from the start of the copy.
    pub fn rewind(&mut self) -> io::Result<()> {
        match core::mem::replace(self, Spool::Closed) {
            Spool::Recording { file, len } => {
                let mut file = file.into_inner().map_err(io::IntoInnerError::into_error)?;
                file.seek(SeekFrom::Start(0))?;
                log::debug!("replaying {len} spooled bytes");
                *self = Spool::Replaying {
                    file: BufReader::new(file),
                    left: len,
                };
                Ok(())
            }
            other => {
                *self = other;
                Err(io::Error::other("the spool was already rewound"))
            }
        }
    }

    /// Reads replayed bytes. Returns `None` once the copy is used up or while
    /// still recording.
    pub fn replay(&mut self, buf: &mut [u8]) -> Option<io::Result<usize>> {
        match self {
            Spool::Replaying { file, left } if *left > 0 => {
                let cap = buf.len().min(usize::try_from(*left).unwrap_or(usize::MAX));
                let result = file.read(&mut buf[..cap]);
                if let Ok(n) = result {
                    *left -= n as u64;
                    if n == 0 {
                        *left = 0;
                    }
                }
                Some(result)
            }
            _ => None,
        }
    }

    pub fn is_recording(&self) -> bool {
        matches!(self, Spool::Recording { .. })
    }
}
