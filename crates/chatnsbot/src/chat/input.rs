//! Line sources for the chat loop.
//!
//! On a terminal input goes through `rustyline_async::Readline`, which gives
//! line editing and reports Ctrl+D and Ctrl+C as events. Piped input and
//! tests use [`ReaderInput`] over any async reader.

use std::{
    borrow::Cow,
    future::{Future, Pending},
    pin::Pin,
};

use async_trait::async_trait;
use futures::{FutureExt, future::Fuse};
use rustyline_async::{Readline, ReadlineError, ReadlineEvent, SharedWriter};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

/// Events produced by an input source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    /// User submitted a line.
    Line(String),
    /// End of input (Ctrl+D or closed stdin).
    Eof,
    /// Interrupt (Ctrl+C).
    Interrupted,
}

/// Where the chat loop gets its lines from.
#[async_trait(?Send)]
pub trait LineInput {
    /// Wait for the next line or control event.
    ///
    /// Read failures end the input and are reported as [`InputEvent::Eof`].
    async fn read_line(&mut self) -> InputEvent;

    /// Whether this source draws the prompt itself.
    fn shows_prompt(&self) -> bool {
        false
    }
}

/// Terminal input with line editing.
pub struct ChatInput {
    rl: Readline,
}

impl ChatInput {
    /// Put the terminal in raw mode and show `prompt`.
    ///
    /// Returns the input handler and a `SharedWriter` that prints above the
    /// prompt line. Raw mode lasts until [`ChatInput::finish`] or drop.
    ///
    /// # Errors
    /// Returns error if the terminal cannot be set up.
    pub fn new(prompt: String) -> Result<(Self, SharedWriter), ReadlineError> {
        let (rl, writer) = Readline::new(prompt)?;
        Ok((Self { rl }, writer))
    }

    /// Flush pending output and give the terminal back.
    pub fn finish(mut self) {
        if let Err(e) = self.rl.flush() {
            tracing::debug!("Failed to flush terminal output: {e}");
        }
    }
}

#[async_trait(?Send)]
impl LineInput for ChatInput {
    async fn read_line(&mut self) -> InputEvent {
        match self.rl.readline().await {
            Ok(ReadlineEvent::Line(line)) => InputEvent::Line(line),
            Ok(ReadlineEvent::Eof) => InputEvent::Eof,
            Ok(ReadlineEvent::Interrupted) => InputEvent::Interrupted,
            Err(e) => {
                tracing::warn!("Terminal input failed: {e}");
                InputEvent::Eof
            }
        }
    }

    fn shows_prompt(&self) -> bool {
        true
    }
}

/// Newline-delimited input from an async reader.
///
/// Bytes that are not valid UTF-8 are replaced rather than ending the chat.
pub struct ReaderInput<R, I = Pending<()>> {
    reader: R,
    interrupt: Pin<Box<Fuse<I>>>,
    buf: Vec<u8>,
}

impl<R> ReaderInput<R> {
    /// Reader input that is never interrupted.
    #[must_use]
    pub fn new(reader: R) -> Self {
        Self::with_interrupt(reader, std::future::pending())
    }
}

impl<R, I: Future<Output = ()>> ReaderInput<R, I> {
    /// Reader input that reports [`InputEvent::Interrupted`] once `interrupt`
    /// resolves.
    #[must_use]
    pub fn with_interrupt(reader: R, interrupt: I) -> Self {
        Self {
            reader,
            interrupt: Box::pin(interrupt.fuse()),
            buf: Vec::new(),
        }
    }
}

#[async_trait(?Send)]
impl<R, I> LineInput for ReaderInput<R, I>
where
    R: AsyncBufRead + Unpin,
    I: Future<Output = ()>,
{
    async fn read_line(&mut self) -> InputEvent {
        self.buf.clear();
        let read = tokio::select! {
            read = self.reader.read_until(b'\n', &mut self.buf) => read,
            () = &mut self.interrupt => return InputEvent::Interrupted,
        };
        match read {
            Ok(0) => InputEvent::Eof,
            Ok(_) => {
                let line = String::from_utf8_lossy(&self.buf);
                if matches!(line, Cow::Owned(_)) {
                    tracing::debug!("Replaced invalid UTF-8 in input line");
                }
                InputEvent::Line(line.into_owned())
            }
            Err(e) => {
                tracing::warn!("Failed to read input: {e}");
                InputEvent::Eof
            }
        }
    }
}
