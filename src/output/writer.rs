//! Snippet writer tracking cumulative output
//!
//! Wraps the output sink, appends the line separator, counts written bytes
//! and refuses further writes once the run is over.

use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Separator written after every snippet
pub const SEPARATOR: &str = "\n";

/// Append-only writer with a byte target
#[derive(Debug)]
pub struct SnippetWriter<W> {
    sink: W,
    written: usize,
    target: usize,
    terminated: bool,
}

impl<W> SnippetWriter<W>
where
    W: AsyncWrite + Unpin,
{
    /// Creates a writer; a `target` of 0 means no size limit
    pub fn new(sink: W, target: usize) -> Self {
        Self {
            sink,
            written: 0,
            target,
            terminated: false,
        }
    }

    /// Writes one snippet followed by the separator
    ///
    /// The snippet and separator go out in a single `write_all`, so snippets
    /// never interleave. Once the writer is terminated nothing is written and
    /// `Ok(0)` is returned.
    ///
    /// # Returns
    ///
    /// * `Ok(usize)` - Bytes written, separator included
    /// * `Err(io::Error)` - The sink failed
    pub async fn write_snippet(&mut self, text: &str) -> std::io::Result<usize> {
        if self.terminated {
            return Ok(0);
        }

        let mut line = String::with_capacity(text.len() + SEPARATOR.len());
        line.push_str(text);
        line.push_str(SEPARATOR);

        self.sink.write_all(line.as_bytes()).await?;
        self.sink.flush().await?;

        self.written += line.len();
        if self.target > 0 && self.written >= self.target {
            self.terminated = true;
        }

        Ok(line.len())
    }

    /// Stops accepting snippets
    pub fn terminate(&mut self) {
        self.terminated = true;
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Whether a positive target was configured and has been met
    pub fn target_reached(&self) -> bool {
        self.target > 0 && self.written >= self.target
    }

    pub fn written(&self) -> usize {
        self.written
    }

    pub fn into_inner(self) -> W {
        self.sink
    }
}
