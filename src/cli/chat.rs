//! The interactive session: server startup, model choice, and the prompt loop.

use std::error::Error;
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tracing::{debug, warn};

use crate::api::models::fetch_models;
use crate::core::directives::{extract_and_write_in, DirectiveOutcome};
use crate::core::readiness::wait_until_ready;
use crate::core::session::{custom_system_preamble, default_system_preamble, Session};
use crate::core::supervisor::{shutdown_signal, ServerSupervisor};
use crate::core::transport::{HttpTransport, Transport, DEFAULT_CONNECT_TIMEOUT};
use crate::core::turn::{run_turn, TurnOutcome};
use crate::ui::console::{Console, Tone};
use crate::ui::logo::{load_art, show_logo, ArtMap};
use crate::ui::picker::{pick_model, print_no_models_help};
use crate::utils::color::{detect_color_depth, ColorDepth};
use crate::utils::logging::LoggingState;

#[derive(Debug, Clone)]
pub struct ChatOptions {
    pub model: Option<String>,
    pub base_url: String,
    pub spawn_server: bool,
    pub server_command: (String, Vec<String>),
    pub ready_timeout: Duration,
    pub poll_interval: Duration,
    pub logos_path: PathBuf,
    pub system_prompt: Option<String>,
    pub log_file: Option<PathBuf>,
    pub color: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    Exit,
    Reset,
    Help,
    Empty,
    Prompt(String),
}

pub fn parse_command(input: &str) -> ChatCommand {
    match input.trim() {
        "" => ChatCommand::Empty,
        "exit" | "quit" => ChatCommand::Exit,
        "clear" | "reset" => ChatCommand::Reset,
        "help" | "/help" => ChatCommand::Help,
        text => ChatCommand::Prompt(text.to_string()),
    }
}

const HELP_TEXT: &str = "Commands:\n  exit, quit     leave the session\n  clear, reset   clear the screen and start a fresh conversation\n  help           show this list\nAsk for a file and the model will answer with <file:name> blocks; they are saved to the current directory.";

pub async fn run_chat(options: ChatOptions) -> Result<(), Box<dyn Error>> {
    let mut console = Console::stdout(options.color);
    console.clear_screen()?;

    let art = match load_art(&options.logos_path) {
        Ok(art) => art,
        Err(err) => {
            console.error(&format!("Warning: {err}"))?;
            console.info("Continuing without logos...")?;
            ArtMap::new()
        }
    };

    let logging = match &options.log_file {
        Some(path) => LoggingState::new(path)?,
        None => LoggingState::disabled(),
    };

    let mut supervisor = if options.spawn_server {
        console.info("Starting the Ollama server...")?;
        let (program, args) = &options.server_command;
        let supervisor = ServerSupervisor::spawn(program, args)?;
        let pid = supervisor
            .pid()
            .map(|pid| pid.to_string())
            .unwrap_or_else(|| "?".to_string());
        console.info(&format!(
            "Ollama server started (PID: {pid}). Waiting for it to be ready..."
        ))?;
        Some(supervisor)
    } else {
        None
    };

    let client = reqwest::Client::builder()
        .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
        .build()?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    let result = tokio::select! {
        result = session_flow(&mut console, &client, &options, &art, &logging, &mut lines) => Some(result),
        _ = shutdown_signal() => None,
    };

    let result = match result {
        Some(result) => result,
        None => {
            console.newline()?;
            console.error("Interrupt received. Stopping...")?;
            Ok(())
        }
    };

    if let Some(supervisor) = supervisor.as_mut() {
        if !supervisor.is_running() {
            console.error("The Ollama server exited on its own. Run 'ollama serve' to see its output.")?;
        }
        console.newline()?;
        console.info("Stopping the Ollama server...")?;
        match supervisor.shutdown().await {
            Ok(()) => console.success("Ollama server stopped.")?,
            Err(err) => console.error(&format!(
                "Could not stop the Ollama server ({}): {err}",
                supervisor.command_line()
            ))?,
        }
    }

    result
}

async fn session_flow<R, W>(
    console: &mut Console<W>,
    client: &reqwest::Client,
    options: &ChatOptions,
    art: &ArtMap,
    logging: &LoggingState,
    lines: &mut Lines<R>,
) -> Result<(), Box<dyn Error>>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let ready = wait_until_ready(
        client,
        &options.base_url,
        options.ready_timeout,
        options.poll_interval,
    )
    .await;
    if !ready {
        console.error("Ollama did not respond in time.")?;
        return Err(format!(
            "server at {} was not ready after {}s",
            options.base_url,
            options.ready_timeout.as_secs()
        )
        .into());
    }
    console.success("Ollama is ready and responding!")?;

    let model = match &options.model {
        Some(model) => model.clone(),
        None => {
            let available = fetch_models(client, &options.base_url).await?;
            if available.models.is_empty() {
                print_no_models_help(console)?;
                return Ok(());
            }
            match pick_model(console, lines, &available.models).await? {
                Some(model) => model,
                None => {
                    console.info("No model selected. Exiting.")?;
                    return Ok(());
                }
            }
        }
    };

    let preamble = match &options.system_prompt {
        Some(prompt) => custom_system_preamble(prompt),
        None => default_system_preamble(&model),
    };
    let transport = HttpTransport::new(client.clone(), options.base_url.clone());
    let mut chat = ChatLoop {
        console,
        transport: &transport,
        session: Session::with_preamble(model, preamble),
        art,
        depth: detect_color_depth(),
        logging,
        output_dir: PathBuf::from("."),
    };

    chat.console.clear_screen()?;
    chat.show_banner()?;
    if let Err(err) = logging.log_session_start(chat.session.model()) {
        warn!(error = %err, "could not write transcript");
    }
    chat.console
        .info("System prompt loaded. Type 'exit' to quit, 'clear' to reset, 'help' for commands.")?;
    chat.run(lines).await?;

    chat.console.newline()?;
    chat.console.info("Session finished.")?;
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopControl {
    Continue,
    Stop,
}

pub(crate) struct ChatLoop<'a, T: Transport + ?Sized, W: Write> {
    pub(crate) console: &'a mut Console<W>,
    pub(crate) transport: &'a T,
    pub(crate) session: Session,
    pub(crate) art: &'a ArtMap,
    pub(crate) depth: ColorDepth,
    pub(crate) logging: &'a LoggingState,
    /// Where file directives are written.
    pub(crate) output_dir: PathBuf,
}

impl<T: Transport + ?Sized, W: Write> ChatLoop<'_, T, W> {
    pub(crate) async fn run<R>(&mut self, lines: &mut Lines<R>) -> io::Result<()>
    where
        R: AsyncBufRead + Unpin,
    {
        loop {
            self.console.newline()?;
            self.console.write(Tone::Prompt, ">>> ")?;
            let Some(line) = lines.next_line().await? else {
                return Ok(());
            };
            if self.handle_line(&line).await? == LoopControl::Stop {
                return Ok(());
            }
        }
    }

    async fn handle_line(&mut self, line: &str) -> io::Result<LoopControl> {
        match parse_command(line) {
            ChatCommand::Exit => return Ok(LoopControl::Stop),
            ChatCommand::Empty => {}
            ChatCommand::Help => {
                self.console.info(HELP_TEXT)?;
                self.console
                    .info(&format!("Transcript logging: {}", self.logging.status()))?;
            }
            ChatCommand::Reset => {
                self.session.reset();
                self.console.clear_screen()?;
                self.show_banner()?;
                self.console.info("System prompt loaded. Context reset.")?;
                self.note("Context reset");
            }
            ChatCommand::Prompt(text) => self.turn(&text).await?,
        }
        Ok(LoopControl::Continue)
    }

    async fn turn(&mut self, text: &str) -> io::Result<()> {
        if let Err(err) = self.logging.log_user(text) {
            warn!(error = %err, "could not write transcript");
        }

        self.console.write(Tone::Model, "AI: ")?;
        let result = {
            let mut sink = self.console.reply_sink();
            run_turn(&mut self.session, self.transport, text, &mut sink).await
        };

        match result {
            Ok(TurnOutcome::Completed(turn)) => {
                self.console.newline()?;
                if let Some(rate) = turn.stats.and_then(|stats| stats.tokens_per_second()) {
                    debug!(tokens_per_second = rate, "generation speed");
                }
                if let Err(err) = self.logging.log_assistant(&turn.reply) {
                    warn!(error = %err, "could not write transcript");
                }
                let outcomes = extract_and_write_in(&turn.reply, &self.output_dir);
                report_directives(self.console, &outcomes)?;
            }
            Ok(TurnOutcome::Skipped) => {}
            Err(err) => {
                self.console.newline()?;
                self.console
                    .error(&format!("Failed to generate a reply: {err}"))?;
                self.console.error("Context reset because of the error.")?;
                self.note(&format!("Turn failed: {err}"));
            }
        }
        Ok(())
    }

    fn show_banner(&mut self) -> io::Result<()> {
        show_logo(self.console, self.session.model(), self.art, self.depth)?;
        self.console.newline()?;
        self.console.write(Tone::Info, "Selected model: ")?;
        self.console.success(self.session.model())
    }

    fn note(&self, note: &str) {
        if let Err(err) = self.logging.log_note(note) {
            warn!(error = %err, "could not write transcript");
        }
    }
}

/// Summarize what happened to each directive in the last reply.
pub fn report_directives<W: Write>(
    console: &mut Console<W>,
    outcomes: &[DirectiveOutcome],
) -> io::Result<()> {
    let mut written = Vec::new();
    for outcome in outcomes {
        match outcome {
            DirectiveOutcome::Written { path } => written.push(path.display().to_string()),
            DirectiveOutcome::Rejected { path, reason } => console.error(&format!(
                "SECURITY WARNING: blocked writing '{path}' ({reason})."
            ))?,
            DirectiveOutcome::Failed { path, error } => console.error(&format!(
                "Error writing file '{}': {error}",
                path.display()
            ))?,
        }
    }

    if !written.is_empty() {
        console.success(&format!("✅ File(s) saved: {}", written.join(", ")))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::GenerateRequest;
    use crate::core::error::TurnError;
    use crate::core::transport::ChunkStream;
    use async_trait::async_trait;
    use futures_util::{stream, StreamExt};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    struct CannedTransport {
        bodies: Mutex<VecDeque<Option<&'static str>>>,
        contexts: Mutex<Vec<Option<Vec<i64>>>>,
    }

    impl CannedTransport {
        /// `None` simulates a refused connection.
        fn new(bodies: Vec<Option<&'static str>>) -> Self {
            Self {
                bodies: Mutex::new(bodies.into()),
                contexts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Transport for CannedTransport {
        async fn open(&self, request: &GenerateRequest) -> Result<ChunkStream, TurnError> {
            self.contexts.lock().unwrap().push(request.context.clone());
            match self.bodies.lock().unwrap().pop_front().flatten() {
                Some(body) => Ok(stream::iter(vec![Ok(body.as_bytes().to_vec())]).boxed()),
                None => Err(TurnError::transport("connection refused")),
            }
        }
    }

    async fn drive(
        transport: &CannedTransport,
        input: &str,
        output_dir: PathBuf,
    ) -> (String, Session) {
        let art = ArtMap::new();
        let logging = LoggingState::disabled();
        let mut console = Console::new(Vec::new(), false);
        let mut lines = input.as_bytes().lines();
        let session = {
            let mut chat = ChatLoop {
                console: &mut console,
                transport,
                session: Session::with_preamble("llama3", "sys"),
                art: &art,
                depth: ColorDepth::X16,
                logging: &logging,
                output_dir,
            };
            chat.run(&mut lines).await.expect("loop");
            chat.session.clone()
        };
        (String::from_utf8(console.into_inner()).unwrap(), session)
    }

    #[test]
    fn parse_command_recognizes_keywords() {
        assert_eq!(parse_command(" exit "), ChatCommand::Exit);
        assert_eq!(parse_command("quit"), ChatCommand::Exit);
        assert_eq!(parse_command("reset"), ChatCommand::Reset);
        assert_eq!(parse_command("clear"), ChatCommand::Reset);
        assert_eq!(parse_command("/help"), ChatCommand::Help);
        assert_eq!(parse_command("   "), ChatCommand::Empty);
        assert_eq!(
            parse_command("  exit the vim editor? "),
            ChatCommand::Prompt("exit the vim editor?".to_string())
        );
    }

    #[tokio::test]
    async fn conversation_writes_directives_and_carries_context() {
        let dir = tempfile::tempdir().expect("tempdir");
        let transport = CannedTransport::new(vec![
            Some("{\"response\":\"<file:a.txt>\\nhello\\n</file>\",\"done\":true,\"context\":[1,2]}\n"),
            Some("{\"response\":\"ok\",\"done\":true,\"context\":[1,2,3]}\n"),
        ]);

        let (shown, session) = drive(&transport, "make a file\n\nagain\nexit\nnever read\n", dir.path().to_path_buf()).await;

        assert_eq!(std::fs::read_to_string(dir.path().join("a.txt")).unwrap(), "hello");
        assert!(shown.contains("✅ File(s) saved: a.txt"));
        assert!(shown.contains("AI: ok"));
        assert_eq!(session.continuation_token(), Some(&[1, 2, 3][..]));
        assert_eq!(
            *transport.contexts.lock().unwrap(),
            vec![None, Some(vec![1, 2])]
        );
    }

    #[tokio::test]
    async fn failed_turn_reports_and_resets() {
        let dir = tempfile::tempdir().expect("tempdir");
        let transport = CannedTransport::new(vec![
            Some("{\"response\":\"a\",\"done\":true,\"context\":[5]}\n"),
            None,
            Some("{\"response\":\"b\",\"done\":true,\"context\":[6]}\n"),
        ]);

        let (shown, session) = drive(&transport, "one\ntwo\nthree\n", dir.path().to_path_buf()).await;

        assert!(shown.contains("Failed to generate a reply: request failed: connection refused"));
        assert!(shown.contains("Context reset because of the error."));
        assert_eq!(session.continuation_token(), Some(&[6][..]));
        assert_eq!(
            *transport.contexts.lock().unwrap(),
            vec![None, Some(vec![5]), None]
        );
    }

    #[tokio::test]
    async fn reset_command_forgets_context() {
        let dir = tempfile::tempdir().expect("tempdir");
        let transport = CannedTransport::new(vec![
            Some("{\"response\":\"a\",\"done\":true,\"context\":[5]}\n"),
            Some("{\"response\":\"b\",\"done\":true,\"context\":[6]}\n"),
        ]);

        let (shown, _) = drive(&transport, "one\nreset\ntwo\n", dir.path().to_path_buf()).await;

        assert!(shown.contains("Context reset."));
        assert!(shown.contains("Selected model: llama3"));
        assert_eq!(*transport.contexts.lock().unwrap(), vec![None, None]);
    }

    #[tokio::test]
    async fn help_lists_commands_and_transcript_state() {
        let dir = tempfile::tempdir().expect("tempdir");
        let transport = CannedTransport::new(vec![]);

        let (shown, _) = drive(&transport, "help
exit
", dir.path().to_path_buf()).await;

        assert!(shown.contains("clear, reset"));
        assert!(shown.contains("Transcript logging: disabled"));
        assert!(transport.contexts.lock().unwrap().is_empty());
    }

    #[test]
    fn report_lists_rejections_before_summary() {
        let mut console = Console::new(Vec::new(), false);
        let outcomes = vec![
            DirectiveOutcome::Written {
                path: PathBuf::from("a.txt"),
            },
            DirectiveOutcome::Rejected {
                path: "../x".to_string(),
                reason: crate::core::directives::RejectReason::ParentTraversal,
            },
            DirectiveOutcome::Written {
                path: PathBuf::from("b/c.txt"),
            },
        ];
        report_directives(&mut console, &outcomes).unwrap();
        let text = String::from_utf8(console.into_inner()).unwrap();
        assert_eq!(
            text,
            "SECURITY WARNING: blocked writing '../x' (path escapes the working directory).\n✅ File(s) saved: a.txt, b/c.txt\n"
        );
    }
}
