use std::fs::{File, OpenOptions};
use std::path::Path;

use tracing::debug;

use crate::error::{Result, TransportError};
use crate::io::IoStream;

/// Open a bound RFCOMM tty (e.g. `/dev/rfcomm0`) for reading and writing.
///
/// Binding the device node to the brick's address happens outside this crate.
pub fn open_device(path: impl AsRef<Path>) -> Result<IoStream<File>> {
    let path = path.as_ref();
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)
        .map_err(|e| TransportError::Open {
            path: path.to_path_buf(),
            source: e,
        })?;
    debug!(?path, "opened device node");
    Ok(IoStream::new(file))
}
