//! Interactive terminal chat with a locally-hosted model.
//!
//! # Usage
//!
//! ```bash
//! # Basic usage with default settings
//! convocode-chat
//!
//! # Talk to another server and model
//! convocode-chat --base-url http://gpu-box:11434 --model qwen3:8b
//!
//! # Only show the first reasoning update, without colors
//! convocode-chat --reasoning first --no-color
//! ```
//!
//! While a response streams, Ctrl+C cancels it and returns to the prompt.

use std::fs::OpenOptions;
use std::sync::Arc;

use arrrg::CommandLine;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

use convocode::chat::{
    ChatArgs, ChatCommand, ChatConfig, ChatSession, TerminalSink, TurnOutcome, help_text,
    parse_command,
};
use convocode::{JsonLinesLogger, Ollama};

/// Main entry point for the convocode-chat application.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (args, _) = ChatArgs::from_command_line_relaxed("convocode-chat [OPTIONS]");
    let config = ChatConfig::resolve(args)?;

    let client = Arc::new(Ollama::from_config(&config.client_config())?);
    let mut session = ChatSession::new(client.clone(), config.clone());
    if let Some(path) = &config.log_file {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        session = session.with_logger(Arc::new(JsonLinesLogger::new(file)));
    }
    let mut sink = TerminalSink::with_color(config.use_color);
    let mut rl = DefaultEditor::new()?;

    // Ctrl+C while streaming cancels the turn; at the prompt rustyline sees it first.
    let canceler = session.canceler();
    ctrlc::set_handler(move || {
        canceler.cancel();
    })?;

    match client.probe().await {
        Ok(version) => println!(
            "ConvoCode Chat (model: {}, server: {} v{version})",
            session.model(),
            client.base_url()
        ),
        Err(err) => {
            println!("ConvoCode Chat (model: {})", session.model());
            sink.print_error(&format!(
                "Model server at {} is not reachable: {err}",
                client.base_url()
            ));
        }
    }
    println!("Type /help for commands, /quit to exit\n");

    loop {
        let readline = rl.readline("You: ");

        match readline {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                let _ = rl.add_history_entry(line);

                if let Some(cmd) = parse_command(line) {
                    match cmd {
                        ChatCommand::Quit => {
                            println!("Goodbye!");
                            break;
                        }
                        ChatCommand::Help => {
                            for line in help_text().lines() {
                                println!("    {}", line);
                            }
                        }
                        ChatCommand::Model(model_name) => match session.set_model(&model_name) {
                            Ok(()) => sink.print_info(&format!("Model changed to: {model_name}")),
                            Err(err) => sink.print_error(&err.to_string()),
                        },
                        ChatCommand::Models => print_models(&session, &client, &mut sink).await,
                        ChatCommand::Reasoning(mode) => {
                            session.set_reasoning_updates(mode);
                            sink.print_info(&format!("Reasoning updates: {mode}"));
                        }
                        ChatCommand::Thinking(on) => {
                            session.set_think(Some(on));
                            if on {
                                sink.print_info("Reasoning requested from the model.");
                            } else {
                                sink.print_info("Reasoning disabled for the model.");
                            }
                        }
                        ChatCommand::ShowConfig => print_config(&session, &client),
                        ChatCommand::Invalid(message) => sink.print_error(&message),
                    }
                    continue;
                }

                let turn = match session.start_turn(line).await {
                    Ok(Some(turn)) => turn,
                    Ok(None) => continue,
                    Err(err) => {
                        sink.print_error(&err.to_string());
                        continue;
                    }
                };
                if let TurnOutcome::Failed(_) = turn.run(&mut sink).await {
                    sink.print_info(&format!(
                        "Is the model server running at {}?",
                        client.base_url()
                    ));
                }
                println!();
            }
            Err(ReadlineError::Interrupted) => {
                // Ctrl+C at prompt - soft interrupt
                println!();
                continue;
            }
            Err(ReadlineError::Eof) => {
                // Ctrl+D - exit
                println!("\nGoodbye!");
                break;
            }
            Err(err) => {
                sink.print_error(&format!("Input error: {}", err));
                break;
            }
        }
    }

    Ok(())
}

async fn print_models(session: &ChatSession, client: &Ollama, sink: &mut TerminalSink) {
    let models = if session.models().is_empty() {
        match client.list_models().await {
            Ok(models) => models,
            Err(err) => {
                sink.print_error(&format!("Failed to list models: {err}"));
                return;
            }
        }
    } else {
        session.models().to_vec()
    };
    if models.is_empty() {
        println!("    No models installed.");
        return;
    }
    println!("    Models:");
    for model in models {
        let marker = if model == session.model() { "*" } else { " " };
        println!("    {marker} {model}");
    }
}

fn print_config(session: &ChatSession, client: &Ollama) {
    let config = session.config();
    println!("    Current Configuration:");
    println!("      Server: {}", client.base_url());
    println!("      Model: {}", config.model);
    println!("      Reasoning updates: {}", config.reasoning_updates);
    println!(
        "      Reasoning requested: {}",
        match config.think {
            Some(true) => "yes",
            Some(false) => "no",
            None => "server default",
        }
    );
    println!(
        "      Colors: {}",
        if config.use_color { "on" } else { "off" }
    );
    match &config.log_file {
        Some(path) => println!("      Turn log: {}", path.display()),
        None => println!("      Turn log: (disabled)"),
    }
}
