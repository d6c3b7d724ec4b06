//! One-shot prompt rendered to an append-only log.
//!
//! The prompt is taken from the free arguments, or from standard input when there are
//! none.  The streamed turn is written to standard output using the log-channel
//! conventions, which makes the output suitable for appending to a file.
//!
//! # Usage
//!
//! ```bash
//! convocode-log "Why is the sky blue?"
//! echo "Summarize this" | convocode-log --model qwen3:8b >> session.log
//! ```

use std::fs::OpenOptions;
use std::io::{self, Read};
use std::process::ExitCode;
use std::sync::Arc;

use arrrg::CommandLine;

use convocode::chat::{ChatArgs, ChatConfig, ChatSession, LogChannelSink, TurnOutcome};
use convocode::{JsonLinesLogger, Ollama};

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let (args, free) = ChatArgs::from_command_line_relaxed("convocode-log [OPTIONS] [PROMPT...]");
    let config = ChatConfig::resolve(args)?;

    let prompt = if free.is_empty() {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer
    } else {
        free.join(" ")
    };

    let client = Arc::new(Ollama::from_config(&config.client_config())?);
    let mut session = ChatSession::new(client, config.clone());
    if let Some(path) = &config.log_file {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        session = session.with_logger(Arc::new(JsonLinesLogger::new(file)));
    }

    let canceler = session.canceler();
    ctrlc::set_handler(move || {
        canceler.cancel();
    })?;

    let Some(turn) = session.start_turn(&prompt).await? else {
        eprintln!("convocode-log: empty prompt");
        return Ok(ExitCode::FAILURE);
    };

    let mut sink = LogChannelSink::new(io::stdout());
    sink.append_line(&format!("You: {}", turn.prompt()));
    sink.append_line(&format!("Model: {}", session.model()));
    let outcome = turn.run(&mut sink).await;
    if let Some(err) = sink.take_error() {
        eprintln!("convocode-log: failed to write the log: {err}");
        return Ok(ExitCode::FAILURE);
    }
    match outcome {
        TurnOutcome::Completed => Ok(ExitCode::SUCCESS),
        TurnOutcome::Failed(_) | TurnOutcome::Canceled => Ok(ExitCode::FAILURE),
    }
}
