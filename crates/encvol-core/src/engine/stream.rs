//! Buffered content pump shared by copy, import, export and sync.

use std::io::{self, Read, Write};
use thiserror::Error;

use crate::progress::ProgressReporter;

/// Which side of a pump failed.
#[derive(Error, Debug)]
pub(crate) enum PumpError {
    #[error("read failed: {0}")]
    Read(#[source] io::Error),

    #[error("write failed: {0}")]
    Write(#[source] io::Error),
}

/// Copy `reader` into `writer` in `buffer_size` chunks until end of input.
///
/// Reports each chunk to `progress` in bytes. Does not flush or finish
/// `writer`; the caller decides how to commit.
pub(crate) fn pump<R, W>(
    reader: &mut R,
    writer: &mut W,
    buffer_size: usize,
    progress: Option<&dyn ProgressReporter>,
) -> Result<u64, PumpError>
where
    R: Read + ?Sized,
    W: Write + ?Sized,
{
    let mut buffer = vec![0u8; buffer_size.max(1)];
    let mut total = 0u64;
    loop {
        let read = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(PumpError::Read(e)),
        };
        writer.write_all(&buffer[..read]).map_err(PumpError::Write)?;
        total += read as u64;
        if let Some(progress) = progress {
            progress.advance(read as u64);
        }
    }
    writer.flush().map_err(PumpError::Write)?;
    Ok(total)
}
