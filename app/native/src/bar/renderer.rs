//! Frame output.
//!
//! Frames are written as one JSON document per line. A frame identical to
//! the previous one is skipped, so the shell on the other end only redraws
//! on real changes.

use std::io::Write;

use eyeball::Subscriber;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::bar::BarFrame;
use crate::error::Result;

/// Writes frames to `out`, skipping repeats.
#[derive(Debug)]
pub struct BarRenderer<W: Write> {
    out: W,
    last: Option<String>,
    written: u64,
}

impl<W: Write> BarRenderer<W> {
    pub const fn new(out: W) -> Self { Self { out, last: None, written: 0 } }

    /// Writes `frame` unless it equals the last one. Returns whether a line
    /// was written.
    ///
    /// # Errors
    ///
    /// Returns an error when serialization or the write fails.
    pub fn render(&mut self, frame: &BarFrame) -> Result<bool> {
        let line = serde_json::to_string(frame)?;
        if self.last.as_deref() == Some(line.as_str()) {
            return Ok(false);
        }

        writeln!(self.out, "{line}")?;
        self.out.flush()?;
        self.last = Some(line);
        self.written += 1;
        Ok(true)
    }

    /// Number of frames written so far.
    #[must_use]
    pub const fn frames_written(&self) -> u64 { self.written }

    #[must_use]
    pub fn into_inner(self) -> W { self.out }
}

/// Sends `()` on `tx` after every update of `subscriber`, until either side
/// goes away.
pub fn notify_on_change<T>(runtime: &Handle, mut subscriber: Subscriber<T>, tx: mpsc::UnboundedSender<()>) -> JoinHandle<()>
where T: Clone + Send + Sync + 'static {
    runtime.spawn(async move {
        while subscriber.next().await.is_some() {
            if tx.send(()).is_err() {
                break;
            }
        }
    })
}
