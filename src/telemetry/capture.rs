//! Buffered console channel.
//!
//! `LogCapture` is the single place test output goes: runner announcements
//! through [`LogCapture::print`] and `tracing` events through its
//! [`MakeWriter`] impl. Between [`init`](LogCapture::init) and
//! [`shutdown`](LogCapture::shutdown) everything is held in memory so the
//! runner can discard it for passing tests.

use std::io::{self, Write};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing_subscriber::fmt::MakeWriter;

struct CaptureState {
    active: bool,
    buffer: Vec<u8>,
    sink: Box<dyn Write + Send>,
}

impl CaptureState {
    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        if self.active {
            self.buffer.extend_from_slice(bytes);
            Ok(())
        } else {
            self.sink.write_all(bytes)
        }
    }
}

/// Cloneable handle to the shared console channel.
#[derive(Clone)]
pub struct LogCapture {
    state: Arc<Mutex<CaptureState>>,
}

impl LogCapture {
    /// Channel writing through to stdout while not capturing.
    pub fn stdout() -> Self {
        Self::with_sink(io::stdout())
    }

    pub fn with_sink(sink: impl Write + Send + 'static) -> Self {
        Self {
            state: Arc::new(Mutex::new(CaptureState {
                active: false,
                buffer: Vec::new(),
                sink: Box::new(sink),
            })),
        }
    }

    /// Start buffering. Anything left from a previous capture is dropped.
    pub fn init(&self) {
        let mut state = self.state.lock();
        state.active = true;
        state.buffer.clear();
    }

    /// Everything buffered since `init`.
    pub fn output(&self) -> String {
        String::from_utf8_lossy(&self.state.lock().buffer).into_owned()
    }

    /// Stop buffering and hand back what was captured.
    pub fn shutdown(&self) -> String {
        let mut state = self.state.lock();
        state.active = false;
        let buffer = std::mem::take(&mut state.buffer);
        String::from_utf8_lossy(&buffer).into_owned()
    }

    pub fn is_active(&self) -> bool {
        self.state.lock().active
    }

    /// Write console text, buffered or passed through depending on state.
    pub fn print(&self, text: &str) {
        let mut state = self.state.lock();
        if let Err(e) = state.write(text.as_bytes()) {
            // Nowhere better to report a broken console.
            eprintln!("console write failed: {e}");
        }
    }

    pub fn println(&self, text: &str) {
        self.print(text);
        self.print("\n");
    }

    /// Flush the underlying sink.
    pub fn flush(&self) -> io::Result<()> {
        self.state.lock().sink.flush()
    }
}

impl Default for LogCapture {
    fn default() -> Self {
        Self::stdout()
    }
}

/// Writer handed out to `tracing_subscriber` for one event.
pub struct CaptureWriter {
    state: Arc<Mutex<CaptureState>>,
}

impl Write for CaptureWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.state.lock().write(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.state.lock().sink.flush()
    }
}

impl<'a> MakeWriter<'a> for LogCapture {
    type Writer = CaptureWriter;

    fn make_writer(&'a self) -> Self::Writer {
        CaptureWriter {
            state: Arc::clone(&self.state),
        }
    }
}

/// In-memory sink that can be inspected after handing a clone to a
/// [`LogCapture`].
#[derive(Clone, Default)]
pub struct SharedBuffer {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.bytes.lock()).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.bytes.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_passthrough_when_inactive() {
        let sink = SharedBuffer::new();
        let capture = LogCapture::with_sink(sink.clone());
        capture.println("hello");
        assert_eq!(sink.contents(), "hello\n");
        assert_eq!(capture.output(), "");
    }

    #[test]
    fn test_buffered_between_init_and_shutdown() {
        let sink = SharedBuffer::new();
        let capture = LogCapture::with_sink(sink.clone());

        capture.init();
        assert!(capture.is_active());
        capture.print("one ");
        capture.print("two");
        assert_eq!(capture.output(), "one two");
        assert_eq!(sink.contents(), "");

        assert_eq!(capture.shutdown(), "one two");
        assert_eq!(capture.output(), "");
        capture.print("after");
        assert_eq!(sink.contents(), "after");
    }

    #[test]
    fn test_make_writer_shares_state() {
        let sink = SharedBuffer::new();
        let capture = LogCapture::with_sink(sink.clone());
        capture.init();
        capture.make_writer().write_all(b"event\n").unwrap();
        assert_eq!(capture.shutdown(), "event\n");
    }

    #[test]
    fn test_init_discards_stale_buffer() {
        let capture = LogCapture::with_sink(io::sink());
        capture.init();
        capture.print("stale");
        capture.init();
        assert_eq!(capture.output(), "");
    }
}
