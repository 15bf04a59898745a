use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use opwatch::command::{self, CommandOutcome, CommandSink, NoCommands, StreamCommandSink};
use opwatch::config::Settings;
use opwatch::data::session::{MatchStrategy, SessionReconstructor};
use opwatch::poll::{PollHandle, Scheduler};
use opwatch::source::{Feed, FeedKind, FeedUpdate, FileFeed, StreamFeeds};
use opwatch::ui::Theme;
use opwatch::{events, export, logging, ui, App};
use opwatch_types::AdminCommand;

/// Bounded so a stalled UI turns into skipped ticks upstream.
const UPDATE_BUFFER: usize = 64;
const COMMAND_BUFFER: usize = 16;

#[derive(Parser, Debug)]
#[command(name = "opwatch")]
#[command(about = "Terminal dashboard for data operations: sessions, live activity and resource metrics")]
struct Args {
    /// JSON file with phase records
    #[arg(short, long, conflicts_with = "connect")]
    phases: Option<PathBuf>,

    /// JSON file with monitoring items (queries, transfers, jobs)
    #[arg(short, long, conflicts_with = "connect")]
    items: Option<PathBuf>,

    /// JSON file with a metric sample or metric history
    #[arg(short, long, conflicts_with = "connect")]
    metrics: Option<PathBuf>,

    /// Connect to a TCP endpoint streaming tagged feed messages (host:port)
    #[arg(short, long)]
    connect: Option<String>,

    /// Settings file (TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Pairing window between an in-progress record and its outcome (e.g. "24h")
    #[arg(long)]
    match_window: Option<String>,

    /// Pair with the closest candidate in time instead of the first found
    #[arg(long)]
    nearest: bool,

    /// Log file (overrides the settings file)
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Reconstruct sessions from --phases, write them to this JSON file and exit
    #[arg(short, long, requires = "phases", conflicts_with = "connect")]
    export: Option<PathBuf>,
}

impl Args {
    /// Command-line flags win over every other settings layer.
    fn apply(&self, settings: &mut Settings) {
        if let Some(window) = &self.match_window {
            settings.sessions.match_window = window.clone();
        }
        if self.nearest {
            settings.sessions.match_strategy = MatchStrategy::Nearest;
        }
        if let Some(path) = &self.log_file {
            settings.logging.file = path.clone();
        }
    }
}

/// Everything the TUI needs from the chosen data source.
struct Wiring {
    description: String,
    feeds: Vec<(FeedKind, Arc<dyn Feed>)>,
    sink: Arc<dyn CommandSink>,
}

/// Channels between the TUI thread and the runtime.
struct Channels {
    updates: mpsc::Receiver<FeedUpdate>,
    commands: mpsc::Sender<AdminCommand>,
    outcomes: mpsc::Receiver<CommandOutcome>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut settings = Settings::load(args.config.as_deref())?;
    args.apply(&mut settings);

    // Handle export mode (non-interactive)
    if let Some(export_path) = &args.export {
        let phases = args.phases.as_deref().context("--export requires --phases")?;
        let reconstructor = SessionReconstructor::new(settings.sessions.match_window())
            .with_strategy(settings.sessions.match_strategy);
        let summary = export::export_phases_file(phases, export_path, &reconstructor)?;
        println!(
            "Exported {} sessions ({} merged) to: {}",
            summary.total,
            summary.merged,
            export_path.display()
        );
        return Ok(());
    }

    if let Err(e) = logging::init(&settings.logging) {
        eprintln!("Logging disabled: {:#}", e);
    }

    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
    let wiring = runtime.block_on(connect(&args))?;
    info!(source = %wiring.description, "Starting dashboard");

    let token = CancellationToken::new();
    let (update_tx, update_rx) = mpsc::channel(UPDATE_BUFFER);
    let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
    let (outcome_tx, outcome_rx) = mpsc::channel(COMMAND_BUFFER);

    let scheduler = Scheduler::new(token.clone(), update_tx)
        .with_fetch_timeout(settings.poll.fetch_timeout());

    let handles: Vec<PollHandle> = {
        let _enter = runtime.enter();
        wiring
            .feeds
            .into_iter()
            .map(|(kind, feed)| scheduler.spawn(feed, kind, settings.poll.interval(kind)))
            .collect()
    };
    runtime.spawn(command::dispatch(wiring.sink, command_rx, outcome_tx, token.clone()));

    let app = App::new(&settings, &wiring.description, token.clone())
        .with_theme(Theme::auto_detect());
    let channels = Channels {
        updates: update_rx,
        commands: command_tx,
        outcomes: outcome_rx,
    };

    let result = run_tui(app, channels);

    // Signal shutdown
    scheduler.shutdown();
    runtime.block_on(async {
        for handle in handles {
            info!(feed = %handle.kind(), skipped = handle.skipped_ticks(), "Feed stopped");
            handle.join().await;
        }
    });
    runtime.shutdown_timeout(Duration::from_secs(1));

    result
}

/// Build feeds and a command sink for the selected mode.
async fn connect(args: &Args) -> Result<Wiring> {
    // TCP mode: one connection carries all feeds in and commands out
    if let Some(addr) = &args.connect {
        use tokio::net::TcpStream;

        println!("Connecting to {}...", addr);
        let stream = TcpStream::connect(addr)
            .await
            .with_context(|| format!("Failed to connect to {}", addr))?;
        println!("Connected!");

        let (read_half, write_half) = stream.into_split();
        let feeds = StreamFeeds::spawn(read_half, addr);
        return Ok(Wiring {
            description: format!("tcp: {}", addr),
            feeds: vec![
                (FeedKind::Phases, Arc::new(feeds.phases) as Arc<dyn Feed>),
                (FeedKind::Items, Arc::new(feeds.items)),
                (FeedKind::Metrics, Arc::new(feeds.metrics)),
            ],
            sink: Arc::new(StreamCommandSink::new(write_half)),
        });
    }

    // File mode: whichever files were given
    let files = [
        (FeedKind::Phases, &args.phases),
        (FeedKind::Items, &args.items),
        (FeedKind::Metrics, &args.metrics),
    ];
    let feeds: Vec<(FeedKind, Arc<dyn Feed>)> = files
        .into_iter()
        .filter_map(|(kind, path)| {
            path.as_ref()
                .map(|p| (kind, Arc::new(FileFeed::new(p, kind)) as Arc<dyn Feed>))
        })
        .collect();

    if feeds.is_empty() {
        bail!("Nothing to watch: pass --phases, --items, --metrics or --connect");
    }

    let description = feeds
        .iter()
        .map(|(_, feed)| feed.description())
        .collect::<Vec<_>>()
        .join(", ");

    Ok(Wiring {
        description,
        feeds,
        sink: Arc::new(NoCommands),
    })
}

/// Run the TUI until the user quits.
fn run_tui(mut app: App, channels: Channels) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Setup panic hook to restore terminal
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        original_hook(panic);
    }));

    let result = run_app(&mut terminal, &mut app, channels);

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    result
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    mut channels: Channels,
) -> Result<()> {
    while app.running {
        app.drain_updates(&mut channels.updates);
        while let Ok(outcome) = channels.outcomes.try_recv() {
            app.apply_command_outcome(outcome);
        }
        for command in app.take_outbox() {
            if channels.commands.try_send(command).is_err() {
                app.set_status_message("Command queue full, try again".to_string());
            }
        }

        terminal.draw(|frame| ui::draw(frame, app))?;

        if let Some(event) = events::poll_event(Duration::from_millis(100))? {
            match event {
                Event::Key(key) => events::handle_key_event(app, key),
                Event::Mouse(mouse) => events::handle_mouse_event(app, mouse),
                _ => {}
            }
        }
    }

    Ok(())
}
