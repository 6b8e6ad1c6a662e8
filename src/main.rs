use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};
use tokio::sync::mpsc;

use storyspark_narrator::audio::{
    CpalProvider, DeviceManager, NarrationEngine, PlayOutcome, SilentProvider, SinkProvider,
    SystemClock, TransportState,
};
use storyspark_narrator::cli::{CliApp, Commands, ParseError, ReaderCommand, StatusDisplay};
use storyspark_narrator::config::{ConfigManager, NarratorConfig};
use storyspark_narrator::error::NarrationError;
use storyspark_narrator::logging::NarrationLogger;
use storyspark_narrator::reader::StoryReader;
use storyspark_narrator::story::StoryNarration;

/// Prompt loop poll period; also drives the playhead when automatic ticking is off
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Interactive reader: one story, one narration engine
pub struct AppController<P: SinkProvider> {
    reader: StoryReader<P>,
    last_state: TransportState,
}

impl<P: SinkProvider> AppController<P> {
    pub fn new(
        provider: P,
        story: StoryNarration,
        config: &NarratorConfig,
        logger: NarrationLogger,
    ) -> Result<Self, NarrationError> {
        let engine = NarrationEngine::with_config(provider, config, logger)?;
        info!(
            "Opened '{}' ({} pages, {} narrated)",
            story.story_title,
            story.page_count(),
            story.narrated_pages()
        );

        Ok(Self {
            reader: StoryReader::new(story, engine),
            last_state: TransportState::Stopped,
        })
    }

    /// Execute a single command; returns false once the reader should close
    pub async fn execute_command(&mut self, command: ReaderCommand) -> Result<bool, NarrationError> {
        match command {
            ReaderCommand::Play => {
                let outcome = self.reader.play().await;
                self.report_outcome(outcome);
            }
            ReaderCommand::Pause => {
                if self.reader.pause() {
                    let snapshot = self.reader.snapshot();
                    println!("⏸ Paused at {}", StatusDisplay::format_time(snapshot.playhead));
                } else {
                    println!("Nothing is being narrated");
                }
            }
            ReaderCommand::Stop => {
                self.reader.stop();
                println!("⏹ Narration stopped");
            }
            ReaderCommand::Next => {
                if self.reader.is_last_page() {
                    self.reader.finish();
                    println!("✨ The End! Adventure complete.");
                } else {
                    self.reader.next_page()?;
                }
                StatusDisplay::display_page(&self.reader);
            }
            ReaderCommand::Prev => {
                self.reader.previous_page()?;
                StatusDisplay::display_page(&self.reader);
            }
            ReaderCommand::Page { number } => {
                self.reader.go_to_page(number.saturating_sub(1))?;
                StatusDisplay::display_page(&self.reader);
            }
            ReaderCommand::Status => StatusDisplay::display_full_status(&self.reader),
            ReaderCommand::Watch => {
                let snapshot = self.reader.snapshot();
                StatusDisplay::display_position_update(&snapshot, self.reader.is_narration_available());
                println!();
            }
            ReaderCommand::Quit => return Ok(false),
        }

        self.last_state = self.reader.snapshot().state;
        Ok(true)
    }

    fn report_outcome(&self, outcome: PlayOutcome) {
        let page = self.reader.current_page() + 1;
        match outcome {
            PlayOutcome::Started => {
                let snapshot = self.reader.snapshot();
                println!(
                    "▶ Narrating page {} ({})",
                    page,
                    StatusDisplay::format_time(snapshot.duration)
                );
            }
            PlayOutcome::Resumed => {
                let snapshot = self.reader.snapshot();
                println!("▶ Resumed at {}", StatusDisplay::format_time(snapshot.playhead));
            }
            PlayOutcome::Ignored => println!("Deciphering magic..."),
            PlayOutcome::AlreadyPlaying => println!("Already narrating page {}", page),
            PlayOutcome::Unavailable => println!("Audio Unavailable for page {}", page),
            PlayOutcome::Superseded => println!("Narration for page {} was cancelled", page),
            PlayOutcome::Failed(error) => self.handle_error(&error),
        }
    }

    /// Follow the playhead until narration settles, Enter is pressed or Ctrl-C
    async fn watch(&mut self, input: &mut mpsc::UnboundedReceiver<String>, shutdown: &AtomicBool) {
        let mut updates = self.reader.engine().subscribe();
        let available = self.reader.is_narration_available();
        let mut poll = tokio::time::interval(POLL_INTERVAL);

        println!("Watching narration (press Enter to stop watching)");
        loop {
            let snapshot = updates.borrow_and_update().clone();
            StatusDisplay::display_position_update(&snapshot, available);
            if !snapshot.is_playing() && !snapshot.is_loading() {
                break;
            }

            tokio::select! {
                changed = updates.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = input.recv() => break,
                _ = poll.tick() => {
                    if shutdown.load(Ordering::Relaxed) {
                        break;
                    }
                    self.reader.engine().tick();
                }
            }
        }
        println!();
        self.last_state = self.reader.snapshot().state;
    }

    /// Announce narration that reached its end since the last look
    fn poll_engine(&mut self) {
        self.reader.engine().tick();

        let state = self.reader.snapshot().state;
        if self.last_state == TransportState::Playing && state == TransportState::Stopped {
            println!();
            println!("✓ Page {} narration finished", self.reader.current_page() + 1);
            print!("> ");
            let _ = std::io::Write::flush(&mut std::io::stdout());
        }
        self.last_state = state;
    }

    /// Run interactive mode
    pub async fn run_interactive_mode(&mut self) {
        println!("StorySpark Narrator v{}", env!("CARGO_PKG_VERSION"));
        println!("Type 'help' for available commands, 'exit' or 'quit' to close the book.");
        println!();
        StatusDisplay::display_page(&self.reader);

        // Set up graceful shutdown handling
        let shutdown_flag = Arc::new(AtomicBool::new(false));
        let shutdown_flag_clone = shutdown_flag.clone();
        let engine = self.reader.engine().clone();

        if let Err(e) = ctrlc::set_handler(move || {
            println!("\nReceived interrupt signal. Stopping narration...");
            engine.stop();
            shutdown_flag_clone.store(true, Ordering::Relaxed);
        }) {
            warn!("Could not install Ctrl-C handler: {}", e);
        }

        // Blocking stdin reads stay off the runtime
        let mut interval = tokio::time::interval(POLL_INTERVAL);
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        std::thread::spawn(move || {
            let stdin = std::io::stdin();
            let mut line = String::new();
            loop {
                line.clear();
                match stdin.read_line(&mut line) {
                    Ok(0) | Err(_) => break,
                    Ok(_) => {
                        if tx.send(line.trim().to_string()).is_err() {
                            break;
                        }
                    }
                }
            }
        });
        let mut awaiting_input = false;

        loop {
            if shutdown_flag.load(Ordering::Relaxed) {
                break;
            }

            if !awaiting_input {
                print!("> ");
                let _ = std::io::Write::flush(&mut std::io::stdout());
                awaiting_input = true;
            }

            tokio::select! {
                biased;

                line = rx.recv() => {
                    awaiting_input = false;
                    let Some(line) = line else {
                        // EOF
                        println!();
                        break;
                    };
                    if line.is_empty() {
                        continue;
                    }

                    match CliApp::parse_command(&line) {
                        Ok(ReaderCommand::Watch) => self.watch(&mut rx, &shutdown_flag).await,
                        Ok(command) => match self.execute_command(command).await {
                            Ok(true) => {}
                            Ok(false) => {
                                println!("Goodbye!");
                                break;
                            }
                            Err(e) => self.handle_error(&e),
                        },
                        Err(ParseError::HelpRequested) => CliApp::display_help(),
                        Err(e) => {
                            eprintln!("Error: {}", e);
                            println!("Type 'help' for available commands.");
                        }
                    }
                }

                _ = interval.tick() => self.poll_engine(),
            }
        }

        self.shutdown();
    }

    pub fn shutdown(&mut self) {
        self.reader.stop();
        let stats = self.reader.engine().logger().event_statistics();
        info!(
            "Session summary: {} started, {} completed, {} page changes, {} failures",
            stats.playbacks_started, stats.completions, stats.page_changes, stats.failures
        );
    }

    fn handle_error(&self, error: &NarrationError) {
        log::log!(error.severity().log_level(), "{}", error);
        StatusDisplay::display_error(error);
    }
}

fn list_devices() -> Result<(), NarrationError> {
    let mut manager = DeviceManager::new()?;
    let default = match manager.select_default_device() {
        Ok(()) => manager.current_device_name().ok().flatten(),
        Err(_) => None,
    };
    let devices = manager.list_devices();

    if devices.is_empty() {
        println!("No audio output devices found");
        return Ok(());
    }

    println!("Audio output devices:");
    for device in devices {
        let marker = if default.as_deref() == Some(device.as_str()) { "*" } else { " " };
        println!(" {} {}", marker, device);
    }
    Ok(())
}

fn load_config(cli: &CliApp) -> NarratorConfig {
    let manager = match &cli.config {
        Some(path) => ConfigManager::with_path(CliApp::expand_path(&path.to_string_lossy())),
        None => ConfigManager::new(),
    };

    match manager {
        Ok(manager) => {
            info!("Configuration loaded from {}", manager.config_path().display());
            manager.get_config().clone()
        }
        Err(e) => {
            StatusDisplay::display_simple_error(&e.into());
            NarratorConfig::default()
        }
    }
}

async fn run_reader<P: SinkProvider>(
    provider: P,
    story: StoryNarration,
    config: &NarratorConfig,
    start_page: usize,
) -> Result<(), NarrationError> {
    let mut app = AppController::new(provider, story, config, NarrationLogger::new())?;
    if start_page > 0 {
        app.reader.go_to_page(start_page)?;
    }
    app.run_interactive_mode().await;
    Ok(())
}

async fn run(cli: CliApp) -> Result<(), NarrationError> {
    if let Some(Commands::Devices) = cli.command {
        return list_devices();
    }

    let Some(story_path) = &cli.story else {
        eprintln!("Usage: narrate <story.json> [--silent] [--device NAME] [--page N]");
        eprintln!("       narrate devices");
        std::process::exit(2);
    };

    let config = load_config(&cli);
    let story = StoryNarration::load(&CliApp::expand_path(&story_path.to_string_lossy()))?;

    if cli.silent {
        let provider = SilentProvider::new(Arc::new(SystemClock::new()));
        run_reader(provider, story, &config, cli.start_page()).await
    } else {
        let device = cli.device.clone().or_else(|| config.preferred_device.clone());
        let provider = CpalProvider::new(device, config.volume);
        run_reader(provider, story, &config, cli.start_page()).await
    }
}

#[tokio::main]
async fn main() {
    // Quiet by default so log lines don't interleave with the prompt
    if std::env::var("STORYSPARK_LOG_LEVEL").is_err() {
        std::env::set_var("STORYSPARK_LOG_LEVEL", "warn");
    }
    if let Err(e) = NarrationLogger::init() {
        eprintln!("Warning: Failed to initialize logging: {}", e);
    }

    let cli = CliApp::parse();
    if let Err(e) = run(cli).await {
        StatusDisplay::display_error(&e);
        std::process::exit(1);
    }
}
