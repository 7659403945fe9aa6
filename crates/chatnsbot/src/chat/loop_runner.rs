//! Turn-by-turn chat driver.
//!
//! `ChatBot` owns the gateway connection, the session and the transcript.
//! One turn is in flight at a time; the transcript only ever holds
//! completed exchanges.

use std::{
    future::Future,
    io::{self, Write},
};

use chatns_core::{
    ChatArguments, Completion, Conversation, Credentials, GatewayError, GenerationParams, Session,
    ToolGateway, ToolResult, completion::CHAT_TOOL,
};

use super::{
    banner,
    commands::{self, ChatCommand, Input},
    input::{InputEvent, LineInput},
};

/// Why the input loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    /// `/quit` or `/exit`.
    Quit,
    /// Input stream ended.
    EndOfInput,
    /// Ctrl+C at the prompt.
    Interrupted,
}

/// Interactive chat bound to one gateway session.
pub struct ChatBot<G: ToolGateway> {
    gateway: G,
    session: Session,
    conversation: Conversation,
    params: GenerationParams,
}

impl<G: ToolGateway> ChatBot<G> {
    /// Connect and create the session.
    ///
    /// The session is only requested once `connect` succeeds. If the gateway
    /// rejects the session the connection is released before returning.
    ///
    /// # Errors
    /// Returns the connection or session error that prevented startup.
    pub async fn start<F>(
        connect: F,
        provider: &str,
        credentials: &Credentials,
        params: GenerationParams,
    ) -> Result<Self, GatewayError>
    where
        F: Future<Output = Result<G, GatewayError>>,
    {
        let mut gateway = connect.await?;
        match gateway.create_session(provider, credentials).await {
            Ok(session) => Ok(Self {
                gateway,
                session,
                conversation: Conversation::new(),
                params,
            }),
            Err(e) => {
                tracing::debug!("Failed to create {provider} session: {e}");
                gateway.disconnect().await;
                Err(e)
            }
        }
    }

    #[must_use]
    pub const fn session(&self) -> &Session {
        &self.session
    }

    #[must_use]
    pub const fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    #[must_use]
    pub const fn params(&self) -> &GenerationParams {
        &self.params
    }

    /// Empty the transcript.
    pub fn clear_history(&mut self) {
        self.conversation.clear();
    }

    /// Run one turn and return the reply text.
    ///
    /// On failure the user entry is rolled back, leaving the transcript as it
    /// was before the call.
    ///
    /// # Errors
    /// Returns error if the invocation fails or the result carries no reply.
    pub async fn send_message(&mut self, text: &str) -> Result<String, GatewayError> {
        self.conversation.begin_turn(text);
        match self.invoke().await {
            Ok(completion) => {
                if let Some(usage) = completion.usage {
                    tracing::debug!(
                        model = completion.model.as_deref().unwrap_or("unknown"),
                        prompt_tokens = usage.prompt_tokens,
                        completion_tokens = usage.completion_tokens,
                        total_tokens = usage.total_tokens,
                        "Turn completed"
                    );
                }
                self.conversation.complete_turn(completion.text.clone());
                Ok(completion.text)
            }
            Err(e) => {
                tracing::debug!("Turn failed, rolling back: {e}");
                self.conversation.abandon_turn();
                Err(e)
            }
        }
    }

    async fn invoke(&mut self) -> Result<Completion, GatewayError> {
        let arguments = ChatArguments::new(self.conversation.messages(), &self.params).to_value()?;
        let raw = self
            .gateway
            .call_tool(&self.session, CHAT_TOOL, arguments)
            .await?;
        ToolResult::from_value(&raw)?.into_completion()
    }

    /// Read lines from `input` until quit, end of input or interrupt.
    ///
    /// Turn failures are printed and never end the loop.
    ///
    /// # Errors
    /// Returns error only if writing output fails.
    pub async fn run<L, W>(&mut self, input: &mut L, out: &mut W) -> io::Result<Exit>
    where
        L: LineInput,
        W: Write,
    {
        loop {
            if !input.shows_prompt() {
                write!(out, "{}", banner::PROMPT)?;
                out.flush()?;
            }

            let line = match input.read_line().await {
                InputEvent::Line(line) => line,
                InputEvent::Eof => {
                    writeln!(out)?;
                    return Ok(Exit::EndOfInput);
                }
                InputEvent::Interrupted => {
                    writeln!(out)?;
                    return Ok(Exit::Interrupted);
                }
            };

            match commands::parse(&line) {
                Input::Empty => {}
                Input::Command(ChatCommand::Clear) => {
                    self.clear_history();
                    banner::print_cleared(out)?;
                }
                Input::Command(ChatCommand::Help) => banner::print_help(out)?,
                Input::Command(ChatCommand::Quit) => return Ok(Exit::Quit),
                Input::Message(text) => match self.send_message(text).await {
                    Ok(reply) => banner::print_reply(out, &self.session.provider, &reply)?,
                    Err(e) => banner::print_turn_error(out, &e)?,
                },
            }
        }
    }

    /// Destroy the session and close the connection.
    ///
    /// Teardown failures are logged, never returned.
    ///
    /// # Errors
    /// Returns error only if writing output fails.
    pub async fn shutdown<W: Write>(mut self, out: &mut W) -> io::Result<()> {
        match self.gateway.destroy_session(&self.session).await {
            Ok(true) => writeln!(out, "Session destroyed: {}", self.session.id)?,
            Ok(false) => {
                tracing::warn!("Gateway did not confirm destroying session {}", self.session.id);
            }
            Err(e) => tracing::warn!("Failed to destroy session {}: {e}", self.session.id),
        }
        self.gateway.disconnect().await;
        banner::print_goodbye(out)
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::VecDeque,
        sync::{Arc, Mutex},
    };

    use async_trait::async_trait;
    use chatns_core::{ChatMessage, Role};
    use serde_json::{Value, json};
    use tokio::io::BufReader;

    use super::*;
    use crate::chat::input::ReaderInput;

    #[derive(Debug, Default)]
    struct Calls {
        create: usize,
        tool_arguments: Vec<Value>,
        destroy: usize,
        disconnect: usize,
    }

    enum Reply {
        Result(Value),
        Error(GatewayError),
    }

    struct FakeGateway {
        calls: Arc<Mutex<Calls>>,
        replies: VecDeque<Reply>,
        reject_session: bool,
        fail_destroy: bool,
    }

    impl FakeGateway {
        fn new(replies: impl IntoIterator<Item = Reply>) -> (Self, Arc<Mutex<Calls>>) {
            let calls = Arc::new(Mutex::new(Calls::default()));
            let gateway = Self {
                calls: Arc::clone(&calls),
                replies: replies.into_iter().collect(),
                reject_session: false,
                fail_destroy: false,
            };
            (gateway, calls)
        }
    }

    #[async_trait]
    impl ToolGateway for FakeGateway {
        async fn create_session(
            &mut self,
            provider: &str,
            _credentials: &Credentials,
        ) -> Result<Session, GatewayError> {
            self.calls.lock().unwrap().create += 1;
            if self.reject_session {
                return Err(GatewayError::Session(format!("unknown server type {provider}")));
            }
            Ok(Session {
                id: "session-1".into(),
                provider: provider.to_string(),
                created: None,
            })
        }

        async fn call_tool(
            &mut self,
            _session: &Session,
            tool_name: &str,
            arguments: Value,
        ) -> Result<Value, GatewayError> {
            assert_eq!(tool_name, CHAT_TOOL);
            self.calls.lock().unwrap().tool_arguments.push(arguments);
            match self.replies.pop_front() {
                Some(Reply::Result(value)) => Ok(value),
                Some(Reply::Error(e)) => Err(e),
                None => Err(GatewayError::Invocation("no scripted reply".into())),
            }
        }

        async fn destroy_session(&mut self, _session: &Session) -> Result<bool, GatewayError> {
            self.calls.lock().unwrap().destroy += 1;
            if self.fail_destroy {
                return Err(GatewayError::Session("session already gone".into()));
            }
            Ok(true)
        }

        async fn disconnect(&mut self) {
            self.calls.lock().unwrap().disconnect += 1;
        }
    }

    fn success(text: &str) -> Reply {
        Reply::Result(json!({"status": "success", "response": text, "model": "gpt-4.1-mini"}))
    }

    async fn start(gateway: FakeGateway) -> ChatBot<FakeGateway> {
        ChatBot::start(
            async { Ok(gateway) },
            "ChatNS",
            &Credentials::new(),
            GenerationParams::default(),
        )
        .await
        .unwrap()
    }

    fn scripted_input(bytes: &[u8]) -> ReaderInput<BufReader<tokio_test::io::Mock>> {
        ReaderInput::new(BufReader::new(
            tokio_test::io::Builder::new().read(bytes).build(),
        ))
    }

    async fn chat(bot: &mut ChatBot<FakeGateway>, text: &str) -> (Exit, String) {
        let mut out = Vec::new();
        let exit = bot
            .run(&mut scripted_input(text.as_bytes()), &mut out)
            .await
            .unwrap();
        (exit, String::from_utf8(out).unwrap())
    }

    /// Events a line editor would report.
    struct ScriptedEvents(VecDeque<InputEvent>);

    #[async_trait(?Send)]
    impl LineInput for ScriptedEvents {
        async fn read_line(&mut self) -> InputEvent {
            self.0.pop_front().unwrap_or(InputEvent::Eof)
        }

        fn shows_prompt(&self) -> bool {
            true
        }
    }

    #[tokio::test]
    async fn test_hello_displays_reply_and_records_exchange() {
        let (gateway, _) = FakeGateway::new([success("Hi there!")]);
        let mut bot = start(gateway).await;

        let (exit, output) = chat(&mut bot, "Hello\n").await;

        assert_eq!(exit, Exit::EndOfInput);
        assert!(output.lines().any(|line| line == "Hi there!"));
        assert!(!output.contains("gpt-4.1-mini"));
        assert!(!output.contains("success"));
        assert_eq!(
            bot.conversation().messages(),
            [ChatMessage::user("Hello"), ChatMessage::assistant("Hi there!")]
        );
    }

    #[tokio::test]
    async fn test_error_result_is_shown_and_history_unchanged() {
        let (gateway, _) = FakeGateway::new([Reply::Result(
            json!({"status": "error", "error": "model unavailable"}),
        )]);
        let mut bot = start(gateway).await;

        let (exit, output) = chat(&mut bot, "Hello\n").await;

        assert_eq!(exit, Exit::EndOfInput);
        assert!(output.contains("model unavailable"));
        assert!(bot.conversation().is_empty());
        // Prompted again after the failed turn.
        assert_eq!(output.matches(banner::PROMPT).count(), 2);
    }

    #[tokio::test]
    async fn test_turns_accumulate_and_send_full_transcript() {
        let (gateway, calls) = FakeGateway::new([success("one"), success("two"), success("three")]);
        let mut bot = start(gateway).await;

        chat(&mut bot, "first\nsecond\nthird\n").await;

        let messages = bot.conversation().messages();
        assert_eq!(messages.len(), 6);
        for (i, message) in messages.iter().enumerate() {
            let expected = if i % 2 == 0 { Role::User } else { Role::Assistant };
            assert_eq!(message.role, expected);
        }

        let calls = calls.lock().unwrap();
        let sent: Vec<usize> = calls
            .tool_arguments
            .iter()
            .map(|args| args["messages"].as_array().unwrap().len())
            .collect();
        assert_eq!(sent, [1, 3, 5]);
        assert_eq!(calls.tool_arguments[2]["messages"][3]["content"], "two");
        assert_eq!(calls.tool_arguments[0]["model"], "gpt-4.1-mini");
        assert_eq!(calls.tool_arguments[0]["max_tokens"], 1000);
    }

    #[tokio::test]
    async fn test_failed_turn_between_successes_is_invisible() {
        let (gateway, calls) = FakeGateway::new([
            success("one"),
            Reply::Error(GatewayError::Invocation("request timed out after 60s".into())),
            success("three"),
        ]);
        let mut bot = start(gateway).await;

        let (_, output) = chat(&mut bot, "a\nb\nc\n").await;

        assert!(output.contains("timed out"));
        let contents: Vec<&str> = bot
            .conversation()
            .messages()
            .iter()
            .map(|m| m.content.as_str())
            .collect();
        assert_eq!(contents, ["a", "one", "c", "three"]);
        // The retry after the failure did not carry the failed user entry.
        let calls = calls.lock().unwrap();
        assert_eq!(calls.tool_arguments[2]["messages"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_malformed_result_is_a_turn_failure() {
        let (gateway, _) = FakeGateway::new([Reply::Result(json!({"status": "success"}))]);
        let mut bot = start(gateway).await;

        let (_, output) = chat(&mut bot, "Hello\n").await;

        assert!(output.contains("Malformed tool result"));
        assert!(bot.conversation().is_empty());
    }

    #[tokio::test]
    async fn test_clear_resets_and_is_idempotent() {
        let (gateway, calls) = FakeGateway::new([success("one"), success("two")]);
        let mut bot = start(gateway).await;

        let (_, output) = chat(&mut bot, "a\nb\n/clear\n/clear\n").await;

        assert!(bot.conversation().is_empty());
        assert_eq!(output.matches("Conversation history cleared").count(), 2);
        assert_eq!(calls.lock().unwrap().tool_arguments.len(), 2);
    }

    #[tokio::test]
    async fn test_empty_lines_and_help_do_not_invoke() {
        let (gateway, calls) = FakeGateway::new([]);
        let mut bot = start(gateway).await;

        let (_, output) = chat(&mut bot, "\n   \n/help\n").await;

        assert!(output.contains("/clear"));
        assert!(calls.lock().unwrap().tool_arguments.is_empty());
    }

    #[tokio::test]
    async fn test_quit_destroys_session_exactly_once() {
        let (gateway, calls) = FakeGateway::new([success("never sent")]);
        let mut bot = start(gateway).await;

        let (exit, _) = chat(&mut bot, "/quit\nHello\n").await;
        assert_eq!(exit, Exit::Quit);

        let mut out = Vec::new();
        bot.shutdown(&mut out).await.unwrap();

        let calls = calls.lock().unwrap();
        assert_eq!(calls.destroy, 1);
        assert_eq!(calls.disconnect, 1);
        assert!(calls.tool_arguments.is_empty());
        assert!(String::from_utf8(out).unwrap().contains("Goodbye!"));
    }

    #[tokio::test]
    async fn test_exit_alias() {
        let (gateway, _) = FakeGateway::new([]);
        let mut bot = start(gateway).await;
        let (exit, _) = chat(&mut bot, "/exit\n").await;
        assert_eq!(exit, Exit::Quit);
    }

    #[tokio::test]
    async fn test_teardown_failure_is_suppressed() {
        let (mut gateway, calls) = FakeGateway::new([]);
        gateway.fail_destroy = true;
        let bot = start(gateway).await;

        let mut out = Vec::new();
        bot.shutdown(&mut out).await.unwrap();

        let output = String::from_utf8(out).unwrap();
        assert!(output.contains("Goodbye!"));
        assert!(!output.contains("Session destroyed"));
        assert_eq!(calls.lock().unwrap().disconnect, 1);
    }

    #[tokio::test]
    async fn test_interrupt_while_awaiting_input() {
        let (gateway, calls) = FakeGateway::new([]);
        let mut bot = start(gateway).await;
        // Input that never produces a line.
        let (_writer, reader) = tokio::io::duplex(64);
        let mut input = ReaderInput::with_interrupt(BufReader::new(reader), async {});

        let mut out = Vec::new();
        let exit = bot.run(&mut input, &mut out).await.unwrap();
        assert_eq!(exit, Exit::Interrupted);

        bot.shutdown(&mut out).await.unwrap();
        assert_eq!(calls.lock().unwrap().destroy, 1);
    }

    #[tokio::test]
    async fn test_line_editor_interrupt_ends_loop_after_turn() {
        let (gateway, calls) = FakeGateway::new([success("one"), success("never sent")]);
        let mut bot = start(gateway).await;
        let mut input = ScriptedEvents(VecDeque::from([
            InputEvent::Line("first".into()),
            InputEvent::Interrupted,
            InputEvent::Line("second".into()),
        ]));

        let mut out = Vec::new();
        let exit = bot.run(&mut input, &mut out).await.unwrap();

        assert_eq!(exit, Exit::Interrupted);
        assert_eq!(bot.conversation().len(), 2);
        // The line editor draws its own prompt.
        assert!(!String::from_utf8(out).unwrap().contains(banner::PROMPT));

        let mut out = Vec::new();
        bot.shutdown(&mut out).await.unwrap();
        let calls = calls.lock().unwrap();
        assert_eq!(calls.tool_arguments.len(), 1);
        assert_eq!(calls.destroy, 1);
    }

    #[tokio::test]
    async fn test_invalid_utf8_line_does_not_end_the_chat() {
        let (gateway, calls) = FakeGateway::new([success("unclear"), success("Hi there!")]);
        let mut bot = start(gateway).await;

        let mut out = Vec::new();
        let exit = bot
            .run(&mut scripted_input(b"caf\xe9\nHello\n"), &mut out)
            .await
            .unwrap();

        assert_eq!(exit, Exit::EndOfInput);
        assert_eq!(bot.conversation().len(), 4);
        let calls = calls.lock().unwrap();
        assert_eq!(calls.tool_arguments.len(), 2);
        assert_eq!(calls.tool_arguments[1]["messages"][2]["content"], "Hello");
        assert!(String::from_utf8(out).unwrap().contains("Hi there!"));
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_failures_are_reported_once_at_default_verbosity() {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::new(
                crate::logging::default_directive(0),
            ))
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let (gateway, _) = FakeGateway::new([Reply::Error(GatewayError::Invocation(
            "model unavailable".into(),
        ))]);
        let mut bot = start(gateway).await;
        let (_, output) = chat(&mut bot, "Hello\n").await;

        let (mut rejecting, _) = FakeGateway::new([]);
        rejecting.reject_session = true;
        let rejected = ChatBot::start(
            async { Ok(rejecting) },
            "Nope",
            &Credentials::new(),
            GenerationParams::default(),
        )
        .await;
        assert!(rejected.is_err());

        assert_eq!(output.matches("model unavailable").count(), 1);
        assert!(output.contains("Error: Tool invocation failed: model unavailable"));
        let logged = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        assert!(!logged.contains("model unavailable"), "{logged}");
        assert!(!logged.contains("unknown server type"), "{logged}");
    }

    #[tokio::test]
    async fn test_connection_failure_never_creates_session() {
        let (gateway, calls) = FakeGateway::new([]);
        let result = ChatBot::<FakeGateway>::start(
            async move {
                drop(gateway);
                Err(GatewayError::Connection {
                    addr: "localhost:8700".into(),
                    reason: "connection refused".into(),
                })
            },
            "ChatNS",
            &Credentials::new(),
            GenerationParams::default(),
        )
        .await;

        let Err(err) = result else {
            panic!("startup succeeded without a gateway");
        };
        assert!(matches!(err, GatewayError::Connection { .. }));
        assert!(err.is_fatal_at_startup());
        assert_eq!(calls.lock().unwrap().create, 0);
    }

    #[tokio::test]
    async fn test_rejected_session_releases_connection() {
        let (mut gateway, calls) = FakeGateway::new([]);
        gateway.reject_session = true;

        let result = ChatBot::start(
            async { Ok(gateway) },
            "Nope",
            &Credentials::new(),
            GenerationParams::default(),
        )
        .await;

        let Err(err) = result else {
            panic!("rejected session produced a bot");
        };
        assert!(matches!(err, GatewayError::Session(_)));
        let calls = calls.lock().unwrap();
        assert_eq!(calls.create, 1);
        assert_eq!(calls.disconnect, 1);
        assert_eq!(calls.destroy, 0);
    }
}
