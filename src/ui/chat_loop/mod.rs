//! The interactive prompt loop: read a line, classify it, then either run the
//! command or stream a reply into the panel.

mod stream;

pub use stream::{stream_reply, StreamOutcome};

use std::future::Future;
use std::io::{self, Write};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::commands::{classify, help_markdown, Command};
use crate::core::session::Session;
use crate::ui::console::Console;
use crate::ui::panel::ReplyView;
use crate::ui::title::panel_title;

pub const DEFAULT_REDRAW_INTERVAL: Duration = Duration::from_millis(100);

const MODEL_PROMPT: &str = "model (partial name okay): ";
const PROVIDER_PROMPT: &str = "provider (partial name okay): ";

/// One line of user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Line(String),
    /// Ctrl-C at the prompt.
    Interrupted,
    /// Ctrl-D or end of piped input.
    Eof,
}

/// Where prompt lines come from.
pub trait LineSource {
    /// Reads the next prompt submission.
    fn read_line(&mut self, prompt: &str) -> io::Result<Input>;

    /// Reads a one-line answer to a sub-prompt, whatever the submission mode.
    fn read_answer(&mut self, prompt: &str) -> io::Result<Input> {
        self.read_line(prompt)
    }

    /// Records a submitted chat line in the persistent history.
    fn remember(&mut self, line: &str);
}

/// Produces the token cancelled when the user interrupts.
pub trait InterruptSource {
    /// Starts watching for interrupts. Called once, before the first prompt.
    fn watch(&mut self) -> CancellationToken;
}

/// Cancels the token on Ctrl-C for as long as it lives.
#[derive(Default)]
pub struct CtrlC {
    watcher: Option<JoinHandle<()>>,
}

impl InterruptSource for CtrlC {
    fn watch(&mut self) -> CancellationToken {
        let token = CancellationToken::new();
        let fired = token.clone();
        if let Some(previous) = self.watcher.replace(tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                debug!("interrupt received");
                fired.cancel();
            }
        })) {
            previous.abort();
        }
        token
    }
}

impl Drop for CtrlC {
    fn drop(&mut self) {
        if let Some(watcher) = self.watcher.take() {
            watcher.abort();
        }
    }
}

/// Runs `work` unless `cancel` fires first.
async fn unless_interrupted<F: Future>(cancel: &CancellationToken, work: F) -> Option<F::Output> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        output = work => Some(output),
    }
}

/// Why the loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    Quit,
    EndOfInput,
    Interrupted,
}

pub struct ChatLoop<'a, S, W, V, I>
where
    S: LineSource,
    W: Write,
    V: ReplyView,
    I: InterruptSource,
{
    session: &'a mut Session,
    input: S,
    console: Console<W>,
    view: V,
    interrupts: I,
    cancel: CancellationToken,
    min_redraw: Duration,
}

impl<'a, S, W, V, I> ChatLoop<'a, S, W, V, I>
where
    S: LineSource,
    W: Write,
    V: ReplyView,
    I: InterruptSource,
{
    pub fn new(session: &'a mut Session, input: S, console: Console<W>, view: V, interrupts: I) -> Self {
        Self {
            session,
            input,
            console,
            view,
            interrupts,
            cancel: CancellationToken::new(),
            min_redraw: DEFAULT_REDRAW_INTERVAL,
        }
    }

    pub fn with_redraw_interval(mut self, interval: Duration) -> Self {
        self.min_redraw = interval;
        self
    }

    pub fn into_parts(self) -> (S, Console<W>, V) {
        (self.input, self.console, self.view)
    }

    /// Runs until quit, end of input or an interrupt. `initial` is handled
    /// before the first prompt, exactly as if it had been typed.
    pub async fn run(&mut self, initial: Option<String>, prompt: &str) -> io::Result<ExitReason> {
        self.cancel = self.interrupts.watch();
        // Let the watcher register its signal handler before anything blocks.
        tokio::task::yield_now().await;
        self.report_warnings()?;
        let mut pending = initial.filter(|text| !text.trim().is_empty());

        loop {
            if self.cancel.is_cancelled() {
                return Ok(ExitReason::Interrupted);
            }
            let line = match pending.take() {
                Some(line) => line,
                None => match self.input.read_line(prompt)? {
                    Input::Line(line) => line,
                    Input::Interrupted => return Ok(ExitReason::Interrupted),
                    Input::Eof => return Ok(ExitReason::EndOfInput),
                },
            };

            let command = classify(&line);
            if command.is_chat() {
                self.input.remember(&line);
            }
            if let Some(reason) = self.execute(command).await? {
                return Ok(reason);
            }
        }
    }

    async fn execute(&mut self, command: Command) -> io::Result<Option<ExitReason>> {
        match command {
            Command::Empty => {}
            Command::Quit => return Ok(Some(ExitReason::Quit)),
            Command::Help => {
                let help = format!(
                    "Just type your message and press enter to start a chat.\n\n{}",
                    help_markdown()
                );
                self.console.markdown(&help)?;
            }
            Command::ListModels => return self.list_models().await,
            Command::NewChat => {
                self.session.reset();
                let identity = self.session.provider().identify();
                self.console.labelled("new chat: ", &identity)?;
            }
            Command::ChangeModel => {
                let Some(name) = self.sub_prompt(MODEL_PROMPT)? else {
                    return Ok(None);
                };
                match self.session.switch_model(&name) {
                    Ok(_) => {
                        let identity = self.session.provider().identify();
                        self.console.labelled("using: ", &identity)?;
                    }
                    Err(err) => self.console.error(&err.to_string())?,
                }
            }
            Command::ChangeProvider(hint) => {
                let hint = match hint {
                    Some(hint) => hint,
                    None => match self.sub_prompt(PROVIDER_PROMPT)? {
                        Some(hint) => hint,
                        None => return Ok(None),
                    },
                };
                let cancel = self.cancel.clone();
                let Some(switched) =
                    unless_interrupted(&cancel, self.session.switch_provider(&hint)).await
                else {
                    return Ok(Some(ExitReason::Interrupted));
                };
                match switched {
                    Ok(provider) => {
                        let identity = format!("{} (new chat)", provider.identify());
                        self.console.labelled("using: ", &identity)?;
                    }
                    Err(err) => self.console.error(&err.to_string())?,
                }
                self.report_warnings()?;
            }
            Command::Chat(text) => return self.chat(&text).await,
        }
        Ok(None)
    }

    /// Reads one answer; blank input or Ctrl-C cancels.
    fn sub_prompt(&mut self, prompt: &str) -> io::Result<Option<String>> {
        match self.input.read_answer(prompt)? {
            Input::Line(line) if !line.trim().is_empty() => Ok(Some(line.trim().to_string())),
            _ => Ok(None),
        }
    }

    async fn list_models(&mut self) -> io::Result<Option<ExitReason>> {
        let cancel = self.cancel.clone();
        let Some(listing) = unless_interrupted(&cancel, self.session.list_models()).await else {
            return Ok(Some(ExitReason::Interrupted));
        };
        if let Some(warning) = &listing.warning {
            self.console.warning(warning)?;
        }
        let active = self.session.provider().model();
        let list = listing
            .models
            .iter()
            .map(|model| {
                if model == active {
                    format!("- **{model}** *(current)*")
                } else {
                    format!("- {model}")
                }
            })
            .collect::<Vec<_>>()
            .join("\n");
        self.console.markdown(&list)?;
        Ok(None)
    }

    async fn chat(&mut self, text: &str) -> io::Result<Option<ExitReason>> {
        let provider = self.session.provider();
        let title = panel_title(&provider.identify(), provider.user_turn_count());

        let cancel = self.cancel.clone();
        let fragments = match unless_interrupted(&cancel, self.session.send(text)).await {
            Some(Ok(fragments)) => fragments,
            Some(Err(err)) => {
                debug!(error = %err, "chat request failed");
                self.console.error(&err.to_string())?;
                return Ok(None);
            }
            None => {
                self.session.abandon_turn();
                debug!("interrupted while opening the reply");
                return Ok(Some(ExitReason::Interrupted));
            }
        };

        let outcome = stream_reply(fragments, &mut self.view, &title, self.min_redraw, &cancel).await;

        match outcome {
            Ok(StreamOutcome::Completed(reply)) => {
                self.session.complete_turn(reply);
                Ok(None)
            }
            Ok(StreamOutcome::Failed(err)) => {
                self.session.abandon_turn();
                debug!(error = %err, "reply stream failed");
                self.console.error(&err.to_string())?;
                Ok(None)
            }
            Ok(StreamOutcome::Interrupted) => {
                self.session.abandon_turn();
                debug!("interrupted during reply");
                Ok(Some(ExitReason::Interrupted))
            }
            Err(err) => {
                self.session.abandon_turn();
                Err(err)
            }
        }
    }

    fn report_warnings(&mut self) -> io::Result<()> {
        for warning in self.session.take_warnings() {
            self.console.warning(&warning)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests;
