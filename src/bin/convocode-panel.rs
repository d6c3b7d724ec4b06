//! Stdio bridge between a webview panel and the model server.
//!
//! Requests arrive on standard input as JSON lines:
//!
//! ```json
//! {"command":"ask","text":"Why is the sky blue?","model":"qwen3:8b"}
//! {"command":"cancel"}
//! ```
//!
//! Every render event is written to standard output as one [`PanelMessage`] JSON line,
//! with answer text already rendered to HTML.  A new `ask` cancels the turn in flight
//! before its own turn starts.

use std::io;
use std::sync::Arc;

use arrrg::CommandLine;
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::task::JoinHandle;

use convocode::chat::{
    ChatArgs, ChatConfig, ChatSession, PanelCommand, PanelMessage, PanelSink, TurnOutcome,
};
use convocode::{JsonLinesLogger, Ollama, RenderFormat};

/// A request from the panel host.
#[derive(Debug, Deserialize)]
#[serde(tag = "command", rename_all = "camelCase")]
enum PanelRequest {
    /// Start a turn, optionally switching models first.
    Ask {
        text: String,
        #[serde(default)]
        model: Option<String>,
    },
    /// Cancel the turn in flight.
    Cancel,
}

fn post_error(tx: &UnboundedSender<PanelMessage>, message: String) {
    let _ = tx.send(PanelMessage {
        command: PanelCommand::Error,
        text: Some(message),
    });
}

async fn finish(active: &mut Option<JoinHandle<TurnOutcome>>) {
    if let Some(handle) = active.take() {
        let _ = handle.await;
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (args, _) = ChatArgs::from_command_line_relaxed("convocode-panel [OPTIONS]");
    let config = ChatConfig::resolve(args)?;

    let client = Arc::new(Ollama::from_config(&config.client_config())?);
    let mut session = ChatSession::new(client, config.clone()).with_format(RenderFormat::Html);
    if let Some(path) = &config.log_file {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        session = session.with_logger(Arc::new(JsonLinesLogger::new(file)));
    }

    let (tx, mut rx) = mpsc::unbounded_channel::<PanelMessage>();
    let writer = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(message) = rx.recv().await {
            let mut line = serde_json::to_string(&message)?;
            line.push('\n');
            stdout.write_all(line.as_bytes()).await?;
            stdout.flush().await?;
        }
        Ok::<(), io::Error>(())
    });

    let mut active: Option<JoinHandle<TurnOutcome>> = None;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let request = match serde_json::from_str::<PanelRequest>(&line) {
            Ok(request) => request,
            Err(err) => {
                post_error(&tx, format!("Invalid request: {err}"));
                continue;
            }
        };
        match request {
            PanelRequest::Ask { text, model } => {
                session.cancel_active();
                finish(&mut active).await;
                if let Some(model) = model
                    && let Err(err) = session.set_model(model)
                {
                    post_error(&tx, err.to_string());
                    continue;
                }
                match session.start_turn(&text).await {
                    Ok(Some(turn)) => {
                        let mut sink = PanelSink::new(tx.clone());
                        active = Some(tokio::spawn(async move { turn.run(&mut sink).await }));
                    }
                    Ok(None) => {}
                    Err(err) => post_error(&tx, err.to_string()),
                }
            }
            PanelRequest::Cancel => {
                session.cancel_active();
                finish(&mut active).await;
            }
        }
    }

    // The host closed its end; let the last turn finish streaming.
    finish(&mut active).await;
    drop(tx);
    writer.await??;
    Ok(())
}
