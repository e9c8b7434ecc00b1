use super::*;
use crate::core::backend::BackendKind;
use crate::core::config::Config;
use crate::core::error::ChatError;
use crate::core::message::Role;
use crate::core::model_cache::ModelCache;
use crate::core::registry::Registry;
use crate::core::session::AppContext;
use crate::core::testing::{credentials_for, ScriptedBackend, ScriptedFactory};
use crate::ui::panel::PanelView;
use crate::ui::theme::Theme;
use ratatui::backend::TestBackend;
use ratatui::Terminal;
use std::collections::VecDeque;

#[derive(Default)]
struct ScriptedLines {
    lines: VecDeque<Input>,
    prompts: Vec<String>,
    answers: Vec<String>,
    remembered: Vec<String>,
}

impl ScriptedLines {
    fn new(lines: &[&str]) -> Self {
        Self {
            lines: lines.iter().map(|l| Input::Line(l.to_string())).collect(),
            ..Self::default()
        }
    }

    fn then(mut self, input: Input) -> Self {
        self.lines.push_back(input);
        self
    }
}

impl LineSource for ScriptedLines {
    fn read_line(&mut self, prompt: &str) -> io::Result<Input> {
        self.prompts.push(prompt.to_string());
        Ok(self.lines.pop_front().unwrap_or(Input::Eof))
    }

    fn read_answer(&mut self, prompt: &str) -> io::Result<Input> {
        self.answers.push(prompt.to_string());
        Ok(self.lines.pop_front().unwrap_or(Input::Eof))
    }

    fn remember(&mut self, line: &str) {
        self.remembered.push(line.to_string());
    }
}

struct NoInterrupt;

impl InterruptSource for NoInterrupt {
    fn watch(&mut self) -> CancellationToken {
        CancellationToken::new()
    }
}

/// Fires once `after` has elapsed.
struct InterruptAfter {
    after: Duration,
}

impl InterruptSource for InterruptAfter {
    fn watch(&mut self) -> CancellationToken {
        let token = CancellationToken::new();
        let fire = token.clone();
        let after = self.after;
        tokio::spawn(async move {
            tokio::time::sleep(after).await;
            fire.cancel();
        });
        token
    }
}

async fn session_with(factory: ScriptedFactory, kinds: &[BackendKind]) -> Session {
    let context = AppContext {
        registry: Registry::from_lookup(credentials_for(kinds), Box::new(factory)),
        config: Config::default(),
        cache: ModelCache::in_memory(),
        primer: None,
    };
    Session::start(context, None, None).await.expect("session")
}

fn openai(backend: ScriptedBackend) -> ScriptedFactory {
    ScriptedFactory::default().with(backend)
}

fn panel() -> PanelView<TestBackend> {
    let terminal = Terminal::new(TestBackend::new(50, 8)).expect("terminal");
    PanelView::new(terminal, Theme::plain())
}

fn console() -> Console<Vec<u8>> {
    Console::new(Vec::new(), Theme::plain(), false)
}

fn screen(view: &PanelView<TestBackend>) -> Vec<String> {
    let buffer = view.terminal().backend().buffer();
    (0..buffer.area.height)
        .map(|y| {
            (0..buffer.area.width)
                .map(|x| buffer[(x, y)].symbol().to_string())
                .collect::<String>()
                .trim_end()
                .to_string()
        })
        .collect()
}

struct Finished {
    reason: ExitReason,
    lines: ScriptedLines,
    output: String,
    view: PanelView<TestBackend>,
}

async fn drive<I: InterruptSource>(
    session: &mut Session,
    lines: ScriptedLines,
    interrupts: I,
    initial: Option<&str>,
) -> Finished {
    let mut chat = ChatLoop::new(session, lines, console(), panel(), interrupts)
        .with_redraw_interval(Duration::ZERO);
    let reason = chat
        .run(initial.map(str::to_string), "azc> ")
        .await
        .expect("loop");
    let (lines, console, view) = chat.into_parts();
    Finished {
        reason,
        lines,
        output: String::from_utf8(console.into_inner()).expect("utf8"),
        view,
    }
}

#[tokio::test]
async fn chat_turn_streams_into_panel_and_extends_history() {
    let backend = ScriptedBackend::new(BackendKind::OpenAi).reply(&["Paris", " is the capital."]);
    let mut session = session_with(openai(backend.clone()), &[BackendKind::OpenAi]).await;

    let done = drive(
        &mut session,
        ScriptedLines::new(&["capital of France?"]),
        NoInterrupt,
        None,
    )
    .await;

    assert_eq!(done.reason, ExitReason::EndOfInput);
    let screen = screen(&done.view);
    assert_eq!(screen[0], "openai:gpt-4o-mini (1st message)");
    assert_eq!(screen[1], "Paris is the capital.");

    let conversation = session.provider().conversation();
    assert_eq!(conversation.len(), 2);
    assert_eq!(conversation.messages()[1].role, Role::Assistant);
    assert_eq!(conversation.messages()[1].content, "Paris is the capital.");
    assert_eq!(session.provider().user_turn_count(), 1);
    assert_eq!(backend.requests()[0][0].content, "capital of France?");
}

#[tokio::test]
async fn second_turn_title_counts_previous_turns() {
    let backend = ScriptedBackend::new(BackendKind::OpenAi)
        .reply(&["one"])
        .reply(&["two"]);
    let mut session = session_with(openai(backend.clone()), &[BackendKind::OpenAi]).await;

    let done = drive(&mut session, ScriptedLines::new(&["a", "b"]), NoInterrupt, None).await;

    assert_eq!(screen(&done.view)[0], "openai:gpt-4o-mini (2nd message)");
    assert_eq!(backend.requests()[1].len(), 3);
}

#[tokio::test]
async fn quit_stops_before_reading_further() {
    let mut session = session_with(ScriptedFactory::default(), &[BackendKind::OpenAi]).await;
    let done = drive(&mut session, ScriptedLines::new(&["  Quit ", "hello"]), NoInterrupt, None).await;

    assert_eq!(done.reason, ExitReason::Quit);
    assert_eq!(done.lines.prompts, vec!["azc> "]);
    assert!(done.lines.remembered.is_empty());
}

#[tokio::test]
async fn ctrl_c_at_the_prompt_ends_the_loop() {
    let mut session = session_with(ScriptedFactory::default(), &[BackendKind::OpenAi]).await;
    let lines = ScriptedLines::default().then(Input::Interrupted);
    let done = drive(&mut session, lines, NoInterrupt, None).await;
    assert_eq!(done.reason, ExitReason::Interrupted);
}

#[tokio::test]
async fn only_chat_lines_are_remembered() {
    let backend = ScriptedBackend::new(BackendKind::OpenAi).reply(&["hi"]);
    let mut session = session_with(openai(backend), &[BackendKind::OpenAi]).await;

    let done = drive(
        &mut session,
        ScriptedLines::new(&["l", "hello there", "?", "m", "4o", "q"]),
        NoInterrupt,
        None,
    )
    .await;

    assert_eq!(done.lines.remembered, vec!["hello there"]);
}

#[tokio::test]
async fn failed_stream_rolls_back_and_keeps_prompting() {
    let backend = ScriptedBackend::new(BackendKind::OpenAi).reply_then_fail(
        &["Par"],
        ChatError::request("openai", "stream interrupted: connection reset"),
    );
    let mut session = session_with(openai(backend), &[BackendKind::OpenAi]).await;

    let done = drive(&mut session, ScriptedLines::new(&["capital?"]), NoInterrupt, None).await;

    assert_eq!(done.reason, ExitReason::EndOfInput);
    assert!(done
        .output
        .contains("openai request failed: stream interrupted: connection reset"));
    assert!(session.provider().conversation().is_empty());
    assert_eq!(done.lines.prompts.len(), 2);
}

#[tokio::test]
async fn refused_request_is_reported() {
    let backend = ScriptedBackend::new(BackendKind::OpenAi)
        .refuse(ChatError::request("openai", "HTTP 401"));
    let mut session = session_with(openai(backend), &[BackendKind::OpenAi]).await;

    let done = drive(&mut session, ScriptedLines::new(&["hello"]), NoInterrupt, None).await;

    assert!(done.output.contains("openai request failed: HTTP 401"));
    assert_eq!(session.provider().user_turn_count(), 0);
}

#[tokio::test]
async fn interrupt_during_reply_discards_the_turn() {
    let backend = ScriptedBackend::new(BackendKind::OpenAi).reply_then_hang(&["Partial"]);
    let mut session = session_with(openai(backend), &[BackendKind::OpenAi]).await;

    let done = drive(
        &mut session,
        ScriptedLines::new(&["tell me a story", "never read"]),
        InterruptAfter {
            after: Duration::from_millis(20),
        },
        None,
    )
    .await;

    assert_eq!(done.reason, ExitReason::Interrupted);
    assert_eq!(screen(&done.view)[1], "Partial");
    assert!(session.provider().conversation().is_empty());
    assert_eq!(done.lines.prompts.len(), 1);
}

#[tokio::test]
async fn unknown_provider_keeps_current_one() {
    let mut session = session_with(
        ScriptedFactory::default(),
        &[BackendKind::OpenAi, BackendKind::Anthropic],
    )
    .await;

    let done = drive(&mut session, ScriptedLines::new(&["p x"]), NoInterrupt, None).await;

    assert!(done.output.contains("Cannot find provider with"));
    assert_eq!(session.provider().kind(), BackendKind::OpenAi);
}

#[tokio::test]
async fn provider_sub_prompt_switches_backend() {
    let mut session = session_with(
        ScriptedFactory::default(),
        &[BackendKind::OpenAi, BackendKind::Anthropic],
    )
    .await;

    let done = drive(&mut session, ScriptedLines::new(&["p", "anth"]), NoInterrupt, None).await;

    assert_eq!(done.lines.prompts, vec!["azc> ", "azc> "]);
    assert_eq!(done.lines.answers, vec!["provider (partial name okay): "]);
    assert!(done
        .output
        .contains("using: anthropic:claude-3-5-sonnet-20240620 (new chat)"));
    assert_eq!(session.provider().kind(), BackendKind::Anthropic);
}

#[tokio::test]
async fn blank_sub_prompt_answer_cancels() {
    let mut session = session_with(ScriptedFactory::default(), &[BackendKind::OpenAi]).await;

    let done = drive(&mut session, ScriptedLines::new(&["m", "  "]), NoInterrupt, None).await;

    assert_eq!(done.output, "");
    assert_eq!(session.provider().model(), "gpt-4o-mini");
}

#[tokio::test]
async fn model_change_reports_new_identity_or_error() {
    let backend =
        ScriptedBackend::new(BackendKind::OpenAi).with_models(&["gpt-4o-mini", "gpt-4o", "o1"]);
    let mut session = session_with(openai(backend), &[BackendKind::OpenAi]).await;

    let done = drive(
        &mut session,
        ScriptedLines::new(&["m", "o1", "m", "zzz"]),
        NoInterrupt,
        None,
    )
    .await;

    assert!(done.output.contains("using: openai:o1"));
    assert!(done.output.contains("Model zzz not found for openai"));
    assert_eq!(session.provider().model(), "o1");
}

#[tokio::test]
async fn listing_marks_the_current_model() {
    let backend = ScriptedBackend::new(BackendKind::OpenAi).with_models(&["gpt-4o-mini", "gpt-4o"]);
    let mut session = session_with(openai(backend), &[BackendKind::OpenAi]).await;

    let done = drive(&mut session, ScriptedLines::new(&["l"]), NoInterrupt, None).await;

    assert_eq!(done.output, "• gpt-4o-mini (current)\n• gpt-4o\n");
}

#[tokio::test]
async fn listing_failure_shows_last_known_models() {
    let backend = ScriptedBackend::new(BackendKind::OpenAi).with_models(&["gpt-4o-mini"]);
    let mut session = session_with(openai(backend.clone()), &[BackendKind::OpenAi]).await;
    backend.set_models(Err(ChatError::request("openai", "offline")));

    let done = drive(&mut session, ScriptedLines::new(&["l"]), NoInterrupt, None).await;

    assert!(done
        .output
        .starts_with("warning: openai request failed: offline; showing last known models\n"));
    assert!(done.output.contains("• gpt-4o-mini (current)"));
}

#[tokio::test]
async fn new_chat_clears_history() {
    let backend = ScriptedBackend::new(BackendKind::OpenAi).reply(&["hi"]);
    let mut session = session_with(openai(backend), &[BackendKind::OpenAi]).await;

    let done = drive(&mut session, ScriptedLines::new(&["hello", "n"]), NoInterrupt, None).await;

    assert!(done.output.contains("new chat: openai:gpt-4o-mini"));
    assert!(session.provider().conversation().is_empty());
}

#[tokio::test]
async fn help_lists_every_command() {
    let mut session = session_with(ScriptedFactory::default(), &[BackendKind::OpenAi]).await;
    let done = drive(&mut session, ScriptedLines::new(&["h"]), NoInterrupt, None).await;

    for description in ["List models", "New chat", "Change model", "Quit"] {
        assert!(done.output.contains(description), "missing {description}");
    }
}

#[tokio::test]
async fn initial_message_runs_before_the_first_prompt() {
    let backend = ScriptedBackend::new(BackendKind::OpenAi).reply(&["4"]);
    let mut session = session_with(openai(backend.clone()), &[BackendKind::OpenAi]).await;

    let done = drive(&mut session, ScriptedLines::default(), NoInterrupt, Some("2+2?")).await;

    assert_eq!(backend.requests()[0][0].content, "2+2?");
    assert_eq!(done.lines.remembered, vec!["2+2?"]);
    assert_eq!(done.lines.prompts, vec!["azc> "]);
}

#[tokio::test]
async fn interrupt_while_request_opens_discards_the_turn() {
    let backend = ScriptedBackend::new(BackendKind::OpenAi)
        .reply_after(Duration::from_millis(400), &["late reply"]);
    let mut session = session_with(openai(backend), &[BackendKind::OpenAi]).await;

    let done = drive(
        &mut session,
        ScriptedLines::new(&["hello", "never read"]),
        InterruptAfter {
            after: Duration::from_millis(50),
        },
        None,
    )
    .await;

    assert_eq!(done.reason, ExitReason::Interrupted);
    assert!(session.provider().conversation().is_empty());
    assert_eq!(done.lines.prompts.len(), 1);
    assert!(screen(&done.view).iter().all(String::is_empty));
}

#[tokio::test]
async fn interrupt_during_model_listing_ends_the_loop() {
    let backend = ScriptedBackend::new(BackendKind::OpenAi);
    let mut session = session_with(openai(backend.clone()), &[BackendKind::OpenAi]).await;
    backend.set_listing_delay(Duration::from_millis(400));

    let done = drive(
        &mut session,
        ScriptedLines::new(&["l", "never read"]),
        InterruptAfter {
            after: Duration::from_millis(50),
        },
        None,
    )
    .await;

    assert_eq!(done.reason, ExitReason::Interrupted);
    assert_eq!(done.output, "");
}

#[tokio::test]
async fn interrupt_while_switching_provider_keeps_the_current_one() {
    let anthropic = ScriptedBackend::new(BackendKind::Anthropic);
    anthropic.set_listing_delay(Duration::from_millis(400));
    let mut session = session_with(
        ScriptedFactory::default().with(anthropic),
        &[BackendKind::OpenAi, BackendKind::Anthropic],
    )
    .await;

    let done = drive(
        &mut session,
        ScriptedLines::new(&["p anth"]),
        InterruptAfter {
            after: Duration::from_millis(50),
        },
        None,
    )
    .await;

    assert_eq!(done.reason, ExitReason::Interrupted);
    assert_eq!(session.provider().kind(), BackendKind::OpenAi);
}

#[tokio::test]
async fn sub_prompts_use_single_line_answers() {
    let mut session = session_with(ScriptedFactory::default(), &[BackendKind::OpenAi]).await;

    let done = drive(&mut session, ScriptedLines::new(&["m", "4o", "p"]), NoInterrupt, None).await;

    assert_eq!(
        done.lines.answers,
        vec!["model (partial name okay): ", "provider (partial name okay): "]
    );
    assert_eq!(done.lines.prompts, vec!["azc> ", "azc> ", "azc> "]);
}
