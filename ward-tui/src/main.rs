//! WARD terminal client entry point.

use crossterm::{
    event::{self, Event as CrosstermEvent, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io::{self, Stdout};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use ward_cache::Transport;
use ward_core::CanonicalizationError;
use ward_tui::api_client::RestClient;
use ward_tui::config::TuiConfig;
use ward_tui::error::TuiError;
use ward_tui::events::TuiEvent;
use ward_tui::keys::{map_key, Action};
use ward_tui::logging::init_logging;
use ward_tui::nav::{InputMode, Screen};
use ward_tui::notifications::NotificationLevel;
use ward_tui::state::App;
use ward_tui::views::render_view;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), TuiError> {
    let config = TuiConfig::load()?;
    init_logging(&config)?;
    let transport: Arc<dyn Transport> = Arc::new(RestClient::new(&config)?);

    let (event_tx, mut event_rx) = mpsc::channel::<TuiEvent>(256);
    let mut app = App::new(config, transport, event_tx.clone());

    let mut terminal = setup_terminal()?;
    let _guard = TerminalGuard;

    spawn_input_reader(event_tx);
    if let Err(err) = app.load_list() {
        app.notify(NotificationLevel::Error, format!("Initial load failed: {}", err));
    }

    let mut ticker = tokio::time::interval(app.config.refresh_interval());

    loop {
        terminal.draw(|f| render_view(f, &app))?;

        tokio::select! {
            _ = ticker.tick() => {
                handle_event(&mut app, TuiEvent::Tick);
            }
            Some(event) = event_rx.recv() => {
                if handle_event(&mut app, event) {
                    break;
                }
            }
        }
    }

    tracing::info!(stats = ?app.cache_stats(), "Shutting down");
    Ok(())
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>, TuiError> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    Ok(Terminal::new(backend)?)
}

struct TerminalGuard;

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let mut stdout = io::stdout();
        let _ = execute!(stdout, LeaveAlternateScreen);
    }
}

fn spawn_input_reader(sender: mpsc::Sender<TuiEvent>) {
    std::thread::spawn(move || loop {
        if let Ok(true) = event::poll(Duration::from_millis(200)) {
            let sent = match event::read() {
                Ok(CrosstermEvent::Key(key)) if key.kind == KeyEventKind::Press => {
                    sender.blocking_send(TuiEvent::Input(key))
                }
                Ok(CrosstermEvent::Resize(width, height)) => {
                    sender.blocking_send(TuiEvent::Resize { width, height })
                }
                _ => Ok(()),
            };
            if sent.is_err() {
                break;
            }
        }
    });
}

/// Returns `true` when the app should quit.
fn handle_event(app: &mut App, event: TuiEvent) -> bool {
    match event {
        TuiEvent::Input(key) => {
            if let Some(action) = map_key(key, app.input_mode) {
                return handle_action(app, action);
            }
        }
        TuiEvent::CacheUpdated(key) => app.on_cache_updated(&key),
        TuiEvent::Tick => app.on_tick(),
        TuiEvent::Resize { .. } => {}
    }
    false
}

fn handle_action(app: &mut App, action: Action) -> bool {
    if action == Action::Quit {
        return true;
    }
    let result = if matches!(app.screen, Screen::PatientList) {
        list_action(app, action)
    } else {
        detail_action(app, action)
    };
    if let Err(err) = result {
        tracing::warn!(error = %err, "Invalid query");
        app.notify(NotificationLevel::Error, err.to_string());
    }
    false
}

fn list_action(app: &mut App, action: Action) -> Result<(), CanonicalizationError> {
    match action {
        Action::FocusSearch => app.input_mode = InputMode::Editing,
        Action::InsertChar(c) => app.push_search_char(c),
        Action::DeleteChar => app.pop_search_char(),
        Action::Confirm if app.input_mode == InputMode::Editing => app.submit_search()?,
        Action::Confirm => {
            app.open_selected()?;
        }
        Action::Cancel => {
            if !app.clear_search()? {
                app.dismiss_notification();
            }
        }
        Action::MoveUp => app.select_previous(),
        Action::MoveDown => app.select_next(),
        Action::Refresh => app.retry_active()?,
        Action::Quit
        | Action::NextTab
        | Action::PrevTab
        | Action::SwitchTab(_)
        | Action::Back => {}
    }
    Ok(())
}

fn detail_action(app: &mut App, action: Action) -> Result<(), CanonicalizationError> {
    match action {
        Action::NextTab => app.next_tab(),
        Action::PrevTab => app.previous_tab(),
        Action::SwitchTab(index) => app.switch_tab(index),
        Action::Cancel | Action::Back => app.back_to_list()?,
        Action::Refresh => app.retry_active()?,
        Action::Quit
        | Action::MoveUp
        | Action::MoveDown
        | Action::FocusSearch
        | Action::InsertChar(_)
        | Action::DeleteChar
        | Action::Confirm => {}
    }
    Ok(())
}
