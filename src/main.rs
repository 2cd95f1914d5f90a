use kgw::app;
use kgw::cli;
use kgw::config;
use kgw::events;
use kgw::input;
use kgw::kaggle;
use kgw::notify;
use kgw::runlog;
use kgw::tui;

use app::AppState;
use clap::Parser;
use cli::{Cli, Command};
use color_eyre::eyre::{eyre, Result};
use config::{KernelMetadata, ProjectConfig};
use crossterm::execute;
use crossterm::terminal::{self, EnterAlternateScreen, LeaveAlternateScreen};
use events::{AppEvent, EventHandler, PushGuard};
use indicatif::{ProgressBar, ProgressStyle};
use input::Action;
use kaggle::executor::{self, KaggleExecutor, KernelCli};
use kaggle::poller::{self, PollOutcome, Poller};
use kaggle::resolver;
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Cli::parse();
    let root = match args.root.clone() {
        Some(r) => r,
        None => std::env::current_dir()?,
    };

    match args.command {
        Some(Command::Init { slug, code_file }) => {
            init_tracing();
            init_project(&root, slug, code_file).await
        }
        Some(Command::Push {
            no_wait,
            interval,
            timeout,
        }) => {
            init_tracing();
            push(&root, no_wait, interval, timeout).await
        }
        Some(Command::Status) => {
            init_tracing();
            status(&root).await
        }
        Some(Command::Outputs) => {
            init_tracing();
            let dest = download_outputs_now(&KaggleExecutor, &root).await?;
            println!("Outputs downloaded to {}", dest.display());
            Ok(())
        }
        Some(Command::Submit {
            competition,
            file,
            message,
        }) => {
            init_tracing();
            submit(&competition, &file, &message).await
        }
        Some(Command::Dataset { dataset_ref }) => {
            init_tracing();
            dataset(&root, &dataset_ref).await
        }
        Some(Command::Watch) | None => watch(root).await,
    }
}

/// Stderr logger for one-shot commands. The watch TUI owns the terminal
/// and installs nothing.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .try_init();
}

async fn init_project(root: &Path, slug: Option<String>, code_file: Option<String>) -> Result<()> {
    let cfg_path = root.join(config::CONFIG_FILE);
    if tokio::fs::try_exists(&cfg_path).await.unwrap_or(false) {
        return Err(eyre!("{} already exists", config::CONFIG_FILE));
    }

    let project = root
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "kaggle-project".to_string());
    let cfg = ProjectConfig {
        project,
        kernel_slug: slug.unwrap_or_default(),
        code_file: code_file.unwrap_or_else(|| "notebook.ipynb".to_string()),
        ..Default::default()
    };
    cfg.save(root).await?;

    let mut meta = KernelMetadata::default();
    meta.sync_from(&cfg);
    meta.save(root).await?;

    let out_dir = cfg.output_dir(root);
    tokio::fs::create_dir_all(&out_dir).await?;
    tokio::fs::write(out_dir.join(resolver::KEEPALIVE_FILE), b"").await?;

    println!("Initialized Kaggle project in {}", root.display());
    if cfg.kernel_slug.is_empty() {
        println!("Set kernel_slug in {} before pushing.", config::CONFIG_FILE);
    }
    Ok(())
}

/// Loads the yml, carries its settings into the metadata file, and
/// persists the result so the CLI sees what the user configured.
async fn sync_project(root: &Path) -> Result<(ProjectConfig, KernelMetadata)> {
    let cfg = ProjectConfig::load(root).await?;
    let mut meta = KernelMetadata::load_or_default(root).await;
    meta.sync_from(&cfg);
    meta.save(root).await?;
    Ok((cfg, meta))
}

async fn push(root: &Path, no_wait: bool, interval: u64, timeout: u64) -> Result<()> {
    let (cfg, meta) = sync_project(root).await?;
    let cli = KaggleExecutor;

    println!("Pushing to Kaggle...");
    let stdout = cli.push_kernel(root).await?;
    let url = resolver::extract_run_url(&stdout);
    runlog::append(root, url.as_deref()).await?;
    match &url {
        Some(u) => println!("Run triggered: {u}"),
        None => println!("Push finished (no run URL reported)."),
    }

    if no_wait {
        return Ok(());
    }
    let kernel_ref = meta
        .kernel_ref()
        .map(str::to_string)
        .or_else(|| url.as_deref().and_then(resolver::kernel_ref_from_url));
    let Some(kernel_ref) = kernel_ref else {
        tracing::warn!("no kernel handle available, skipping the wait");
        return Ok(());
    };

    let dest = cfg.output_dir(root);
    let bar = ProgressBar::new(100);
    bar.set_style(ProgressStyle::with_template("{bar:30} {pos:>3}% {msg}")?);
    let outcome = poller::poll_and_download(&cli, &kernel_ref, &dest, interval, timeout, |msg, pct| {
        bar.set_position(u64::from(pct));
        bar.set_message(msg.to_string());
    })
    .await;
    bar.finish_and_clear();

    match outcome {
        PollOutcome::Completed => {
            println!("Run completed. Outputs downloaded to {}", dest.display());
        }
        PollOutcome::TimedOut => {
            eprintln!(
                "Warning: timed out waiting for the Kaggle run. \
                 Check `kgw status` and download outputs later."
            );
        }
    }
    Ok(())
}

async fn status(root: &Path) -> Result<()> {
    let cfg = ProjectConfig::load_or_default(root).await;
    let records = runlog::read_all(root).await;
    let Some(latest) = records.last() else {
        println!("No runs logged yet.");
        return Ok(());
    };

    let status = resolver::resolve(&KaggleExecutor, latest, root, &cfg).await;
    match &latest.url {
        Some(url) => println!("{} | {url}", latest.label),
        None => println!("{}", latest.label),
    }
    println!("{} {} ({})", status.icon(), status.label(), status.tooltip());
    Ok(())
}

async fn download_outputs_now(cli: &dyn KernelCli, root: &Path) -> Result<PathBuf> {
    let cfg = ProjectConfig::load(root).await?;
    let meta = KernelMetadata::load(root).await?;
    let kernel_ref = meta
        .kernel_ref()
        .ok_or_else(|| eyre!("no kernel id configured; set kernel_slug in {}", config::CONFIG_FILE))?;
    let dest = cfg.output_dir(root);
    tokio::fs::create_dir_all(&dest).await?;
    cli.download_outputs(kernel_ref, &dest).await?;
    Ok(dest)
}

async fn submit(competition: &str, file: &Path, message: &str) -> Result<()> {
    let out = KaggleExecutor
        .submit_competition(competition, file, message)
        .await?;
    let out = out.trim();
    if !out.is_empty() {
        println!("{out}");
    }
    println!("Submission uploaded to {competition}.");
    Ok(())
}

async fn dataset(root: &Path, dataset_ref: &str) -> Result<()> {
    let safe = dataset_ref.replace(['/', '\\'], "__");
    let dest = root.join(".kaggle-datasets").join(safe);
    tokio::fs::create_dir_all(&dest).await?;
    KaggleExecutor.download_dataset(dataset_ref, &dest).await?;
    println!("Dataset downloaded to {}", dest.display());
    Ok(())
}

async fn watch(root: PathBuf) -> Result<()> {
    let meta = KernelMetadata::load_or_default(&root).await;
    let mut state = AppState::new(root.clone(), meta.kernel_ref().map(str::to_string));
    state.is_loading = true;

    // Terminal setup with panic hook
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let _ = terminal::disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        original_hook(panic_info);
    }));

    terminal::enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;

    let events = EventHandler::new(Duration::from_millis(100));
    let tx = events.sender();
    let cli: Arc<dyn KernelCli> = Arc::new(KaggleExecutor);

    // Passive refresh: re-reads the log and re-resolves the latest run
    // every ten seconds, whether or not a push is in flight.
    tokio::spawn(Poller::new(root.clone(), cli.clone(), tx.clone()).run());

    let result = run_app(&mut terminal, &mut state, events, &tx, &cli, &root).await;

    terminal::disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    state: &mut AppState,
    mut events: EventHandler,
    tx: &mpsc::UnboundedSender<AppEvent>,
    cli: &Arc<dyn KernelCli>,
    root: &Path,
) -> Result<()> {
    let mut last_tick = Instant::now();
    let mut refresh_start = Instant::now();

    loop {
        terminal.draw(|f| tui::render::render(f, state))?;

        let elapsed = refresh_start.elapsed().as_secs();
        state.next_refresh_in = app::TREE_REFRESH_SECS.saturating_sub(elapsed);

        state.prune_notifications();
        state.prune_error();

        if let Some(event) = events.next().await {
            match event {
                AppEvent::Key(key) => {
                    let ctx = input::InputContext {
                        has_error: state.error.is_some(),
                        is_loading: state.is_loading,
                        is_pushing: state.is_pushing,
                    };
                    match input::map_key(key, &ctx) {
                        Action::Quit => state.should_quit = true,
                        Action::DismissError => state.clear_error(),
                        Action::MoveUp => state.move_cursor_up(),
                        Action::MoveDown => state.move_cursor_down(),
                        Action::Refresh => {
                            state.is_loading = true;
                            let tx2 = tx.clone();
                            let cli2 = cli.clone();
                            let root2 = root.to_path_buf();
                            tokio::spawn(async move {
                                poller::refresh_runs(&*cli2, &root2, &tx2).await;
                            });
                            refresh_start = Instant::now();
                        }
                        Action::OpenBrowser => {
                            if let Some(url) = state.current_url() {
                                let url = url.to_string();
                                tokio::spawn(async move {
                                    let _ = executor::open_in_browser(&url).await;
                                });
                            }
                        }
                        Action::Push => {
                            let tx2 = tx.clone();
                            let cli2 = cli.clone();
                            let root2 = root.to_path_buf();
                            tokio::spawn(async move {
                                let _guard = PushGuard::begin(&tx2);
                                if let Err(e) = push_and_wait(&*cli2, &root2, &tx2).await {
                                    let _ = tx2.send(AppEvent::Error(format!("{e}")));
                                }
                            });
                        }
                        Action::DownloadOutputs => {
                            let tx2 = tx.clone();
                            let cli2 = cli.clone();
                            let root2 = root.to_path_buf();
                            tokio::spawn(async move {
                                match download_outputs_now(&*cli2, &root2).await {
                                    Ok(dest) => {
                                        let _ = tx2.send(AppEvent::Info(format!(
                                            "Outputs downloaded to {}",
                                            dest.display()
                                        )));
                                        poller::refresh_runs(&*cli2, &root2, &tx2).await;
                                    }
                                    Err(e) => {
                                        let _ = tx2.send(AppEvent::Error(format!("{e}")));
                                    }
                                }
                            });
                        }
                        Action::None => {}
                    }
                }
                AppEvent::Tick => {
                    if last_tick.elapsed() >= Duration::from_millis(100) {
                        state.advance_spinner();
                        last_tick = Instant::now();
                    }
                }
                AppEvent::RunsResult {
                    records,
                    latest_status,
                } => {
                    if let Some(terminal_status) = state.apply_runs_result(records, latest_status) {
                        notify::send_desktop(terminal_status);
                    }
                    refresh_start = Instant::now();
                }
                AppEvent::PushState(active) => {
                    state.is_pushing = active;
                    if !active {
                        state.push_progress = None;
                    }
                }
                AppEvent::PollProgress { message, percent } => {
                    state.push_progress = Some((message, percent));
                }
                AppEvent::Info(message) => {
                    state.notifications.push(app::Notification {
                        message,
                        timestamp: Instant::now(),
                    });
                }
                AppEvent::Error(e) => {
                    state.is_loading = false;
                    state.set_error(e);
                }
            }
        }

        if state.should_quit {
            return Ok(());
        }
    }
}

/// The in-TUI push flow: sync config, push, log the run, then follow it
/// with the poll-and-download loop, reporting progress as events. The
/// caller holds a [`PushGuard`], so the pushing indicator clears on
/// every exit path.
async fn push_and_wait(
    cli: &dyn KernelCli,
    root: &Path,
    tx: &mpsc::UnboundedSender<AppEvent>,
) -> Result<()> {
    let (cfg, meta) = sync_project(root).await?;

    let stdout = cli.push_kernel(root).await?;
    let url = resolver::extract_run_url(&stdout);
    runlog::append(root, url.as_deref()).await?;
    let _ = tx.send(AppEvent::Info(match &url {
        Some(u) => format!("Run triggered: {u}"),
        None => "Push finished (no run URL reported).".to_string(),
    }));
    poller::refresh_runs(cli, root, tx).await;

    let kernel_ref = meta
        .kernel_ref()
        .map(str::to_string)
        .or_else(|| url.as_deref().and_then(resolver::kernel_ref_from_url));
    let Some(kernel_ref) = kernel_ref else {
        return Ok(());
    };

    let dest = cfg.output_dir(root);
    let outcome = poller::poll_and_download(
        cli,
        &kernel_ref,
        &dest,
        app::DEFAULT_POLL_INTERVAL_SECS,
        app::DEFAULT_POLL_TIMEOUT_SECS,
        |msg, pct| {
            let _ = tx.send(AppEvent::PollProgress {
                message: msg.to_string(),
                percent: pct,
            });
        },
    )
    .await;

    match outcome {
        PollOutcome::Completed => {
            let _ = tx.send(AppEvent::Info(format!(
                "Outputs downloaded to {}",
                dest.display()
            )));
        }
        PollOutcome::TimedOut => {
            let _ = tx.send(AppEvent::Error(
                "Timed out waiting for the Kaggle run. Check status and download outputs later."
                    .to_string(),
            ));
        }
    }
    poller::refresh_runs(cli, root, tx).await;
    Ok(())
}
