/*! Telemetry transports.

A transport takes an encoded frame and blocks until it's fully written. On
the bench that's a serial port, which is just a file or any other writer
here.
*/
use std::io::{BufWriter, Write};
use std::sync::{Arc, Mutex, MutexGuard};

use log::debug;

use crate::Result;

/// Sink for encoded telemetry frames.
pub trait Transport {
    /// Write one whole frame.
    fn send(&mut self, frame: &[u8]) -> Result<()>;
}

/// Arbitrary writer transport, e.g. stdout or an opened serial device.
pub struct WriterTransport {
    writer: Box<dyn Write + Send>,
}

impl WriterTransport {
    /// Create new writer transport.
    pub fn new<W: Write + Send + 'static>(writer: W) -> Self {
        Self {
            writer: Box::new(writer),
        }
    }
}

impl Transport for WriterTransport {
    fn send(&mut self, frame: &[u8]) -> Result<()> {
        self.writer.write_all(frame)?;
        self.writer.flush()?;
        Ok(())
    }
}

/// File write mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    /// Create a new file. Fail if file already exists.
    Create,

    /// Overwrite existing file, or create a new file if it doesn't exist.
    Overwrite,

    /// Append to existing file, or create a new file if it doesn't exist.
    Append,
}

/// Write frames back to back into a file.
pub struct FileTransport {
    f: BufWriter<std::fs::File>,
}

impl FileTransport {
    /// Open file for telemetry.
    pub fn new<P: AsRef<std::path::Path>>(filename: P, mode: Mode) -> Result<Self> {
        let filename = filename.as_ref();
        debug!("Opening telemetry file {}", filename.display());
        let f = BufWriter::new(match mode {
            Mode::Create => std::fs::File::options()
                .read(false)
                .write(true)
                .create_new(true)
                .open(filename)?,
            Mode::Overwrite => std::fs::File::create(filename)?,
            Mode::Append => std::fs::File::options()
                .read(false)
                .create(true)
                .append(true)
                .open(filename)?,
        });
        Ok(Self { f })
    }
}

impl Transport for FileTransport {
    fn send(&mut self, frame: &[u8]) -> Result<()> {
        self.f.write_all(frame)?;
        self.f.flush()?;
        Ok(())
    }
}

/// Keep frames in memory.
///
/// Really only useful for tests. Use [`VecTransport::hook`] to look at
/// the frames from elsewhere, such as another thread.
#[derive(Default)]
pub struct VecTransport {
    frames: Arc<Mutex<Vec<Vec<u8>>>>,
}

/// Handle on the frames written to a [`VecTransport`].
#[derive(Clone)]
pub struct Hook {
    inner: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl Hook {
    /// Lock and get the frames sent so far.
    ///
    /// # Panics
    /// Panics if a thread panicked while holding the lock.
    #[must_use]
    pub fn frames(&self) -> MutexGuard<'_, Vec<Vec<u8>>> {
        self.inner.lock().unwrap()
    }
}

impl VecTransport {
    /// Create new in-memory transport.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a hook into the frames that will be written.
    #[must_use]
    pub fn hook(&self) -> Hook {
        Hook {
            inner: self.frames.clone(),
        }
    }
}

impl Transport for VecTransport {
    fn send(&mut self, frame: &[u8]) -> Result<()> {
        self.frames
            .lock()
            .map_err(|e| crate::Error::msg(format!("frame store poisoned: {e}")))?
            .push(frame.to_vec());
        Ok(())
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&mut self, frame: &[u8]) -> Result<()> {
        (**self).send(frame)
    }
}
