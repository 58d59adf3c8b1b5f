//! # Chat loop
//!
//! The interactive front end: read a question, stream the answer, repeat.
//!
//! The loop is generic over its input and output so the same code drives the
//! terminal and the tests. An empty line or end of input ends the session.
//! A failed turn is reported inline and the loop goes back to waiting for
//! input; a partially streamed answer is discarded and not remembered.

use std::io::Write;

use crossterm::{
    queue,
    style::{Attribute, Color, Print, ResetColor, SetAttribute, SetForegroundColor},
};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, error, info};

use crate::{client::ChatClient, error::Result};

const USER_LABEL: &str = "\nUSER: ";
const ASSISTANT_LABEL: &str = "\nASSISTANT: ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    AwaitingInput,
    Streaming,
}

pub struct ChatLoop<'a> {
    client: &'a ChatClient,
    banner: String,
    styled: bool,
    state: LoopState,
}

impl<'a> ChatLoop<'a> {
    pub fn new(client: &'a ChatClient, banner: impl Into<String>) -> Self {
        Self {
            client,
            banner: banner.into(),
            styled: false,
            state: LoopState::AwaitingInput,
        }
    }

    /// Colour the labels with ANSI escapes.
    pub fn styled(mut self, styled: bool) -> Self {
        self.styled = styled;
        self
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Run until end of input or an empty line.
    ///
    /// Only I/O errors on `input`/`output` end the loop early; model and
    /// retrieval failures are reported per turn.
    pub async fn run<R, W>(&mut self, mut input: R, output: &mut W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: Write,
    {
        writeln!(output, "{}", self.banner)?;

        loop {
            self.label(output, USER_LABEL, Color::Green)?;
            output.flush()?;

            let mut line = String::new();
            if input.read_line(&mut line).await? == 0 {
                info!("End of input, leaving chat");
                break;
            }
            let question = line.trim();
            if question.is_empty() {
                info!("Empty input, leaving chat");
                break;
            }

            self.turn(question, output).await?;
        }
        Ok(())
    }

    async fn turn<W: Write>(&mut self, question: &str, output: &mut W) -> Result<()> {
        self.set_state(LoopState::Streaming);
        let client = self.client;

        let mut response = match client.stream(question).await {
            Ok(response) => response,
            Err(e) => {
                error!("Request failed: {}", e);
                writeln!(output, "\nerror: {e}")?;
                self.set_state(LoopState::AwaitingInput);
                return Ok(());
            }
        };

        let mut started = false;
        while let Some(fragment) = response.next_fragment().await {
            match fragment {
                Ok(text) => {
                    if !started {
                        self.label(output, ASSISTANT_LABEL, Color::Blue)?;
                        started = true;
                    }
                    write!(output, "{text}")?;
                    output.flush()?;
                }
                Err(e) => {
                    error!("Stream failed: {}", e);
                    if started {
                        writeln!(output)?;
                        writeln!(output, "error: {e}")?;
                    } else {
                        writeln!(output, "\nerror: {e}")?;
                    }
                    self.set_state(LoopState::AwaitingInput);
                    return Ok(());
                }
            }
        }
        writeln!(output)?;

        if let Err(e) = response.finish().await {
            error!("After-response hooks failed: {}", e);
            writeln!(output, "error: {e}")?;
        }
        self.set_state(LoopState::AwaitingInput);
        Ok(())
    }

    fn label<W: Write>(&self, output: &mut W, text: &str, color: Color) -> Result<()> {
        if self.styled {
            queue!(
                output,
                SetForegroundColor(color),
                SetAttribute(Attribute::Bold),
                Print(text),
                SetAttribute(Attribute::Reset),
                ResetColor
            )?;
        } else {
            write!(output, "{text}")?;
        }
        Ok(())
    }

    fn set_state(&mut self, state: LoopState) {
        debug!("Chat loop {:?} -> {:?}", self.state, state);
        self.state = state;
    }
}
