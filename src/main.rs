// labelkit - keyboard-driven text annotation client
//
// A client for an HTTP labeling backend: one corpus, a fixed set of
// paginated views over it, optimistic label writes with rollback, and a
// background model whose training status is polled and folded into view
// invalidation.
//
// Architecture:
// - Engine: single state container, Action in / Command out, owned by one task
// - Driver: executes Commands (reqwest) and feeds results back as Actions
// - Poll timer: ticks the model-status poll on a fixed interval
// - Input thread: raw-mode key events mapped to Actions
// - Notices: bounded ring for transient user-visible errors

mod api;
mod arena;
mod cli;
mod config;
mod elements;
mod engine;
mod focus;
mod input;
mod model_status;
mod mutation;
mod notify;
mod panels;

use anyhow::{Context, Result};
use api::ApiClient;
use config::{Config, LogRotation};
use crossterm::event::{Event, KeyCode, KeyEventKind};
use engine::{Action, Command, Engine};
use notify::NoticeBuffer;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Handle CLI subcommands first (config --show, --reset, ...)
    // If a command was handled, exit early
    let Some(cli) = cli::handle_cli() else {
        return Ok(());
    };

    // Ensure config template exists (helps users discover options)
    Config::ensure_config_exists();

    let mut config = Config::from_env();
    cli.apply(&mut config);

    if config.workspace.is_empty() {
        anyhow::bail!("no workspace configured; pass --workspace or set it in the config file");
    }

    // Initialize tracing/logging
    // Precedence: RUST_LOG env var > config file > default "info"
    let default_filter = format!("labelkit={}", config.logging.level);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into());

    // Optional rotating file logging (non-blocking writer; the guard must
    // stay alive so logs flush on exit)
    let _file_guard: Option<tracing_appender::non_blocking::WorkerGuard> =
        if config.logging.file_enabled {
            std::fs::create_dir_all(&config.logging.file_dir).with_context(|| {
                format!(
                    "could not create log directory {:?}",
                    config.logging.file_dir
                )
            })?;
            let file_appender = match config.logging.file_rotation {
                LogRotation::Hourly => tracing_appender::rolling::hourly(
                    &config.logging.file_dir,
                    &config.logging.file_prefix,
                ),
                LogRotation::Daily => tracing_appender::rolling::daily(
                    &config.logging.file_dir,
                    &config.logging.file_prefix,
                ),
                LogRotation::Never => tracing_appender::rolling::never(
                    &config.logging.file_dir,
                    &config.logging.file_prefix,
                ),
            };
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(non_blocking)
                        .with_ansi(false),
                )
                .init();
            Some(guard)
        } else {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
            None
        };

    tracing::info!(
        workspace = %config.workspace,
        base_url = %config.base_url,
        "starting labelkit"
    );

    let client = ApiClient::new(&config.base_url, &config.workspace)?;

    if matches!(cli.command, Some(cli::Commands::Categories)) {
        let response = client.fetch_categories().await?;
        for category in response.categories {
            if category.description.is_empty() {
                println!("{:>4}  {}", category.id, category.name);
            } else {
                println!("{:>4}  {}  ({})", category.id, category.name, category.description);
            }
        }
        return Ok(());
    }

    let notices = NoticeBuffer::new();

    // Action inbox: everything that happens to the engine flows through here
    let (action_tx, action_rx) = mpsc::channel::<Action>(1000);

    // Quit signal from the input thread
    let (quit_tx, quit_rx) = tokio::sync::oneshot::channel::<()>();

    // Seed the session: category selection kicks off the status poll and
    // the first panel fetches; document selection fills the main view.
    // Category goes first so its teardown cannot discard the document fetch.
    let _ = action_tx
        .send(Action::SelectCategory(config.category))
        .await;
    if let Some(doc) = config.document.clone() {
        let _ = action_tx.send(Action::SwitchDocument(doc)).await;
    }

    // Engine task: owns all state; each reduction is atomic. It feeds its
    // own inbox through a weak sender so the channel still closes once the
    // external senders drop.
    let engine_handle = {
        let engine = Engine::new(config.engine_config(), notices.clone());
        let client = client.clone();
        let tx = action_tx.downgrade();
        tokio::spawn(run_engine(engine, action_rx, client, tx))
    };

    // Model-status poll timer. The engine decides whether a tick actually
    // polls; the timer dies when the engine drops the inbox.
    let poll_handle = {
        let tx = action_tx.clone();
        let interval = std::time::Duration::from_secs(config.poll_interval_secs);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if tx.send(Action::PollTick).await.is_err() {
                    break;
                }
            }
        })
    };

    // Input thread: crossterm reads, mapped to actions. The shutdown flag
    // lets the thread exit (and restore the terminal) on the Ctrl+C path,
    // where no key event arrives to break the loop.
    let shutdown = Arc::new(AtomicBool::new(false));
    let input_thread = {
        let tx = action_tx.clone();
        let shutdown = shutdown.clone();
        std::thread::spawn(move || run_input(tx, quit_tx, shutdown))
    };

    // Wait for quit ('q') or Ctrl+C
    tokio::select! {
        _ = quit_rx => tracing::info!("quit requested"),
        _ = tokio::signal::ctrl_c() => tracing::info!("interrupted"),
    }

    // Drop our senders so the engine task and poll timer wind down
    shutdown.store(true, Ordering::Relaxed);
    drop(action_tx);
    poll_handle.abort();
    let _ = engine_handle.await;
    let _ = input_thread.join();

    tracing::info!("shutdown complete");
    Ok(())
}

/// The engine loop: reduce actions, spawn a driver per command, surface new
/// notices in the log. The feedback sender is weak: only live driver tasks
/// hold it upgraded, so the loop ends when the external senders drop.
async fn run_engine(
    mut engine: Engine,
    mut inbox: mpsc::Receiver<Action>,
    client: ApiClient,
    tx: mpsc::WeakSender<Action>,
) {
    let mut seen_notices = 0;
    while let Some(action) = inbox.recv().await {
        let commands = engine.handle(action);
        for command in commands {
            tokio::spawn(run_command(command, client.clone(), tx.clone()));
        }

        // Surface notices pushed during this reduction
        let notices = engine.notices().snapshot();
        for notice in notices.iter().skip(seen_notices) {
            match notice.kind {
                notify::NoticeKind::Error => tracing::warn!("{}", notice.message),
                notify::NoticeKind::Info => tracing::info!("{}", notice.message),
            }
        }
        seen_notices = notices.len();
    }
    tracing::debug!("engine inbox closed");
}

/// Execute one network effect and feed the result back as an action.
/// The sender upgrades only for the send; a failed upgrade means the engine
/// already shut down and the result has nowhere to go.
async fn run_command(command: Command, client: ApiClient, tx: mpsc::WeakSender<Action>) {
    let action = match command {
        Command::Fetch {
            panel,
            token,
            request,
        } => match client.fetch(&request).await {
            Ok(response) => Action::FetchResolved {
                panel,
                token,
                response,
            },
            Err(e) => Action::FetchFailed {
                panel,
                token,
                error: e.to_string(),
            },
        },
        Command::PutLabel {
            mutation_id,
            element_id,
            category_id,
            value,
            update_counter,
        } => match client
            .put_label(&element_id, category_id, value, update_counter)
            .await
        {
            Ok(()) => Action::LabelAccepted { mutation_id },
            Err(e) => Action::LabelRejected {
                mutation_id,
                error: e.to_string(),
            },
        },
        Command::FetchStatus { category_id } => match client.fetch_iterations(category_id).await {
            Ok(response) => Action::StatusResolved {
                iterations: response.iterations,
            },
            Err(e) => Action::StatusFailed {
                error: e.to_string(),
            },
        },
        Command::SubmitEvaluation {
            category_id,
            submission,
        } => match client.submit_evaluation(category_id, &submission).await {
            Ok(result) => Action::EvaluationSubmitted {
                score: result.score,
            },
            Err(e) => Action::EvaluationSubmitFailed {
                error: e.to_string(),
            },
        },
    };
    let Some(tx) = tx.upgrade() else { return };
    let _ = tx.send(action).await;
}

/// Key-event loop. Raw mode gives us press/release events; the handler
/// debounces action keys and repeats navigation keys. Reads go through
/// `poll` with a timeout so the loop can notice a Ctrl+C shutdown, where no
/// key event arrives, and still restore the terminal on the way out.
fn run_input(
    tx: mpsc::Sender<Action>,
    quit: tokio::sync::oneshot::Sender<()>,
    shutdown: Arc<AtomicBool>,
) {
    if crossterm::terminal::enable_raw_mode().is_err() {
        tracing::warn!("no terminal available; keyboard input disabled");
        // Keep the quit sender alive so Ctrl+C remains the only exit
        std::mem::forget(quit);
        return;
    }

    let mut handler = input::InputHandler::default();
    loop {
        if shutdown.load(Ordering::Relaxed) {
            break;
        }
        match crossterm::event::poll(std::time::Duration::from_millis(100)) {
            Ok(true) => {}
            Ok(false) => continue,
            Err(e) => {
                tracing::warn!("input poll failed: {e}");
                break;
            }
        }
        let event = match crossterm::event::read() {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!("input read failed: {e}");
                break;
            }
        };
        let Event::Key(key) = event else { continue };
        match key.kind {
            KeyEventKind::Press | KeyEventKind::Repeat => {
                if !handler.handle_key_press(key.code) {
                    continue;
                }
                if key.code == KeyCode::Char('q') {
                    break;
                }
                if let Some(action) = input::map_key(key.code) {
                    if tx.blocking_send(action).is_err() {
                        break;
                    }
                }
            }
            KeyEventKind::Release => handler.handle_key_release(key.code),
        }
    }

    let _ = crossterm::terminal::disable_raw_mode();
    let _ = quit.send(());
}
