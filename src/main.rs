mod app;
mod backend;
mod card;
mod config;
mod theme;
mod ui;

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    event::{
        self, DisableBracketedPaste, EnableBracketedPaste, Event, KeyCode, KeyEventKind,
    },
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io;
use std::sync::{Arc, Mutex};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use app::App;
use backend::session::SessionStore;
use backend::supabase::SupabaseBackend;
use backend::{Backend, Session};
use card::share::share_url;
use card::NewCard;
use config::AppConfig;
use theme::Theme;

#[derive(Parser, Debug)]
#[command(name = "stampcards")]
#[command(author = "Sean Fournier")]
#[command(version = "0.1.0")]
#[command(about = "Timestamped, shareable text cards in your terminal")]
struct Args {
    /// Print your cards as JSON
    #[arg(short, long)]
    list: bool,

    /// Create a card with the given text and print its share link
    #[arg(short, long, value_name = "TEXT")]
    create: Option<String>,

    /// Print the card behind a share id
    #[arg(long, value_name = "SHARE_ID")]
    show: Option<String>,

    /// Forget the saved session
    #[arg(long)]
    sign_out: bool,

    /// Supabase project URL (overrides config)
    #[arg(long)]
    url: Option<String>,

    /// Supabase anon key (overrides config)
    #[arg(long)]
    anon_key: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let tui = !(args.list || args.create.is_some() || args.show.is_some() || args.sign_out);

    init_logging(tui);

    let mut config = AppConfig::load().unwrap_or_default();
    if let Some(url) = args.url.clone() {
        config.supabase_url = url;
    }
    if let Some(key) = args.anon_key.clone() {
        config.supabase_anon_key = key;
    }

    let backend = SupabaseBackend::new(&config.supabase_url, &config.supabase_anon_key);

    // Handle CLI-only commands
    if args.sign_out {
        // The local session goes even when there is no backend to tell
        let remote = backend.as_ref().ok().map(|b| b as &dyn Backend);
        return sign_out(remote, &SessionStore::open()?).await;
    }

    let backend: Arc<dyn Backend> = Arc::new(
        backend.context("Set supabase_url and supabase_anon_key in the config file or environment")?,
    );

    if let Some(share_id) = args.show {
        return show_shared(backend.as_ref(), &SessionStore::open()?, &share_id).await;
    }

    if args.list {
        return list_cards(backend.as_ref(), &SessionStore::open()?).await;
    }

    if let Some(text) = args.create {
        return create_card(backend.as_ref(), &SessionStore::open()?, &config, &text).await;
    }

    run_tui(backend, &config).await
}

/// Logs go to a file while the TUI owns the terminal, stderr otherwise
fn init_logging(tui: bool) {
    let registry = tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::from_default_env());

    let log_file = if tui {
        backend::session::data_dir()
            .ok()
            .and_then(|dir| std::fs::OpenOptions::new().create(true).append(true).open(dir.join("stampcards.log")).ok())
    } else {
        None
    };

    match log_file {
        Some(file) => registry
            .with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
            .init(),
        None if tui => registry.init(),
        None => registry
            .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
            .init(),
    }
}

/// Saved session, refreshed if it has expired
async fn saved_session(backend: &dyn Backend, store: &SessionStore) -> Result<Session> {
    let session = store.load().ok_or_else(|| anyhow::anyhow!("not signed in (run stampcards to sign in)"))?;
    if !session.is_expired() {
        return Ok(session);
    }

    let fresh = backend.refresh(&session).await.context("Session expired; sign in again")?;
    store.save(&fresh)?;
    Ok(fresh)
}

async fn list_cards(backend: &dyn Backend, store: &SessionStore) -> Result<()> {
    let session = saved_session(backend, store).await?;
    let cards = backend.list_cards(&session).await.context("Error loading cards")?;
    println!("{}", serde_json::to_string_pretty(&cards)?);
    Ok(())
}

async fn create_card(backend: &dyn Backend, store: &SessionStore, config: &AppConfig, text: &str) -> Result<()> {
    let session = saved_session(backend, store).await?;
    let new_card = NewCard::from_input(text, session.user.id)
        .ok_or_else(|| anyhow::anyhow!("Card content is empty"))?;

    let card = backend.insert_card(&session, &new_card).await.context("Error creating card")?;
    let url = share_url(&config.share_base(), &card.share_id);
    println!("{}", url);

    if config.notifications {
        notify("stampcards", &format!("Card created: {}", url))?;
    }
    Ok(())
}

/// Signed-in users read through their own token, everyone else with the anon key
async fn show_shared(backend: &dyn Backend, store: &SessionStore, share_id: &str) -> Result<()> {
    let session = match store.load() {
        Some(_) => saved_session(backend, store).await.ok(),
        None => None,
    };
    let card = backend
        .fetch_shared(session.as_ref(), share_id)
        .await
        .context("Card not found")?;
    println!("{}", card::format_timestamp(card.created_at));
    println!();
    println!("{}", card.content);
    Ok(())
}

async fn sign_out(backend: Option<&dyn Backend>, store: &SessionStore) -> Result<()> {
    match (backend, store.load()) {
        (Some(backend), Some(session)) => {
            if let Err(e) = backend.sign_out(&session).await {
                tracing::warn!("Sign out request failed: {}", e);
            }
        }
        (None, Some(_)) => tracing::warn!("Backend not configured; only removing the local session"),
        (_, None) => {}
    }
    store.clear()?;
    tracing::debug!("Removed {}", store.path().display());
    println!("Signed out successfully");
    Ok(())
}

async fn run_tui(backend: Arc<dyn Backend>, config: &AppConfig) -> Result<()> {
    ui::init_theme(Theme::from_config(&config.theme));

    let sessions = if config.remember_session {
        Some(SessionStore::open()?)
    } else {
        None
    };

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableBracketedPaste)?;
    let backend_term = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend_term)?;

    let mut app = App::new(backend, config, sessions);

    // Main loop
    let result = run_app(&mut terminal, &mut app).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableBracketedPaste)?;
    terminal.show_cursor()?;

    result
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
) -> Result<()> {
    loop {
        terminal.draw(|f| ui::draw(f, app))?;

        // Network work runs after the frame above shows its loading state
        if app.has_pending() {
            if let Err(e) = app.run_pending().await {
                tracing::error!("Action failed: {}", e);
            }
            continue;
        }

        if event::poll(std::time::Duration::from_millis(100))? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => match key.code {
                    KeyCode::Char('q') if app.accepts_quit_key() => return Ok(()),
                    KeyCode::Char('c') if key.modifiers.contains(event::KeyModifiers::CONTROL) => {
                        return Ok(())
                    }
                    _ => {
                        if let Err(e) = app.handle_key(key) {
                            tracing::error!("Key handling failed: {}", e);
                        }
                    }
                },
                Event::Paste(text) => app.handle_paste(&text),
                _ => {}
            }
        }

        app.tick();
    }
}

fn notify(summary: &str, body: &str) -> Result<()> {
    notify_rust::Notification::new()
        .summary(summary)
        .body(body)
        .icon("accessories-text-editor")
        .show()?;
    Ok(())
}
