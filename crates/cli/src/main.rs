mod playground;

use std::sync::{Arc, Mutex};

use anyhow::Context;
use colored::Colorize;
use robo_core::capability::CapabilityRegistry;
use robo_core::config::RoboCfg;
use robo_core::io::input::{self, InputSender};
use robo_core::io::output::OutputReceiver;
use robo_core::io::{OutputMessage, Tone};
use robo_core::runtime::Runtime;
use robo_llm::provider::LlmProvider;
use rustyline::error::ReadlineError;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const LOG_PATH: &str = "/tmp/robo.log";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Tracing: write to file when RUST_LOG is set so logs don't break the prompt
    if std::env::var("RUST_LOG").is_ok() {
        let file = std::fs::File::create(LOG_PATH).with_context(|| format!("cannot create {LOG_PATH}"))?;
        tracing_subscriber::registry()
            .with(EnvFilter::from_default_env())
            .with(fmt::layer().json().with_target(true).with_writer(file))
            .init();
    }

    let mut cfg = RoboCfg::from_env();
    if let Ok(model) = std::env::var("ROBO_LLM_MODEL") {
        cfg.standard_model = model;
    }
    if let Ok(model) = std::env::var("ROBO_LLM_EXTENDED_MODEL") {
        cfg.extended_model = model;
    }
    for (key, value, about) in cfg.to_entries() {
        tracing::debug!(key, %value, about, "config");
    }

    let provider = robo_llm::http::from_env(&cfg.standard_model).context("ROBO_LLM_API_KEY is not set")?;
    tracing::info!(name = provider.name(), model = provider.model(), "LLM provider initialized");
    let provider: Arc<dyn LlmProvider> = Arc::new(provider);

    let scene = Arc::new(Mutex::new(playground::Scene::kitchen()));
    let capabilities = CapabilityRegistry::new(playground::robot(scene.clone()))?;
    let (mut runtime, input_tx, output_rx) = Runtime::with_channels(Arc::new(cfg), provider, capabilities);
    if let Ok(scene) = scene.lock() {
        for knowledge in scene.seed_knowledge() {
            runtime.orchestrator_mut().objects_mut().insert(knowledge);
        }
    }
    let token = runtime.token();

    let repl_token = token.clone();
    let runtime_fut = runtime.run();
    let repl_fut = run_repl(input_tx, output_rx, repl_token);
    tokio::pin!(runtime_fut);
    tokio::pin!(repl_fut);

    tokio::select! {
        _ = &mut runtime_fut => {
            token.cancel();
            (&mut repl_fut).await
        }
        result = &mut repl_fut => {
            token.cancel();
            (&mut runtime_fut).await;
            result
        }
    }
}

async fn run_repl(input_tx: InputSender, mut output_rx: OutputReceiver, token: CancellationToken) -> anyhow::Result<()> {
    println!("{}", "Robo is listening. Type /help for commands.".bold());

    let (line_tx, mut line_rx) = mpsc::unbounded_channel::<InputEvent>();
    let (ready_tx, ready_rx) = std::sync::mpsc::channel::<()>();
    spawn_input_thread(line_tx, ready_rx);
    request_next_prompt(&ready_tx);

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            line = line_rx.recv() => {
                let Some(line) = line else {
                    break;
                };
                match line {
                    InputEvent::Line(line) => {
                        let text = line.trim();
                        if !text.is_empty() && input::submit_line(&input_tx, text).await.is_err() {
                            break;
                        }
                        request_next_prompt(&ready_tx);
                    }
                    InputEvent::Interrupted => {
                        token.cancel();
                        break;
                    }
                    InputEvent::Eof => break,
                    InputEvent::Error(err) => {
                        eprintln!("input error: {err}");
                        break;
                    }
                }
            }
            msg = output_rx.recv() => {
                let Some(msg) = msg else {
                    break;
                };
                println!("{}", render(&msg));
            }
        }
    }
    drop(ready_tx);

    // Flush whatever the session said while shutting down.
    while let Ok(msg) = output_rx.try_recv() {
        println!("{}", render(&msg));
    }
    Ok(())
}

fn render(msg: &OutputMessage) -> String {
    let content = msg.content.as_str();
    match msg.tone {
        Tone::Info => content.normal().to_string(),
        Tone::Success => content.green().to_string(),
        Tone::Error => content.red().to_string(),
        Tone::Question => content.yellow().bold().to_string(),
        Tone::Detail => content.dimmed().to_string(),
    }
}

fn request_next_prompt(ready_tx: &std::sync::mpsc::Sender<()>) {
    let _ = ready_tx.send(());
}

fn spawn_input_thread(line_tx: mpsc::UnboundedSender<InputEvent>, ready_rx: std::sync::mpsc::Receiver<()>) {
    std::thread::spawn(move || {
        let mut editor = match rustyline::DefaultEditor::new() {
            Ok(editor) => editor,
            Err(e) => {
                let _ = line_tx.send(InputEvent::Error(e.to_string()));
                return;
            }
        };

        while ready_rx.recv().is_ok() {
            match editor.readline("You> ") {
                Ok(line) => {
                    let _ = editor.add_history_entry(line.as_str());
                    if line_tx.send(InputEvent::Line(line)).is_err() {
                        break;
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    let _ = line_tx.send(InputEvent::Interrupted);
                    break;
                }
                Err(ReadlineError::Eof) => {
                    let _ = line_tx.send(InputEvent::Eof);
                    break;
                }
                Err(e) => {
                    let _ = line_tx.send(InputEvent::Error(e.to_string()));
                    break;
                }
            }
        }
    });
}

enum InputEvent {
    Line(String),
    Interrupted,
    Eof,
    Error(String),
}
