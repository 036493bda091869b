pub mod form;
pub mod render;
pub mod state;

use crate::engine::features::RawInputs;
use anyhow::Result;
use crossterm::{
    event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use form::FormState;
use futures_util::StreamExt;
use ratatui::prelude::*;
use state::AppState;
use std::io::stdout;
use std::time::Duration;
use tokio::sync::{mpsc, watch};

/// Commands the TUI can send back to the controller.
#[derive(Debug, Clone, PartialEq)]
pub enum TuiCommand {
    Quit,
    /// Snapshot of the form at the moment of submission.
    Predict(RawInputs),
    HealthCheck,
}

/// Display state owned by the TUI task.
#[derive(Debug, Clone)]
pub struct View {
    pub form: FormState,
    pub charts: bool,
    pub payload: bool,
}

/// What a key press asks the loop to do.
#[derive(Debug, PartialEq)]
enum KeyOutcome {
    Continue,
    Send(TuiCommand),
    Exit,
}

/// Run the TUI. Reads state from `state_rx`, sends commands on `cmd_tx`.
pub async fn run_tui(
    state_rx: watch::Receiver<AppState>,
    cmd_tx: mpsc::Sender<TuiCommand>,
    view: View,
) -> Result<()> {
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let result = tui_loop(&mut terminal, state_rx, cmd_tx, view).await;

    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    result
}

async fn tui_loop(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    mut state_rx: watch::Receiver<AppState>,
    cmd_tx: mpsc::Sender<TuiCommand>,
    mut view: View,
) -> Result<()> {
    let mut events = EventStream::new();
    let mut spinner = tokio::time::interval(Duration::from_millis(100));
    spinner.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut spinner_frame: u8 = 0;

    loop {
        let state = state_rx.borrow().clone();
        terminal.draw(|f| render::draw(f, &state, &view, spinner_frame))?;

        tokio::select! {
            maybe_event = events.next() => {
                let Some(event) = maybe_event else { return Ok(()) };
                if let Event::Key(key) = event? {
                    match handle_key(&mut view, key) {
                        KeyOutcome::Continue => {}
                        KeyOutcome::Send(cmd) => {
                            let _ = cmd_tx.send(cmd).await;
                        }
                        KeyOutcome::Exit => {
                            let _ = cmd_tx.send(TuiCommand::Quit).await;
                            return Ok(());
                        }
                    }
                }
            }
            changed = state_rx.changed() => {
                if changed.is_err() {
                    // Controller is gone.
                    return Ok(());
                }
            }
            _ = spinner.tick() => {
                if state.predict_in_flight || state.health_in_flight {
                    spinner_frame = spinner_frame.wrapping_add(1);
                }
            }
        }
    }
}

fn handle_key(view: &mut View, key: KeyEvent) -> KeyOutcome {
    if key.kind != KeyEventKind::Press {
        return KeyOutcome::Continue;
    }

    let form = &mut view.form;
    if form.editing {
        match key.code {
            KeyCode::Enter => {
                let _ = form.commit_edit();
            }
            KeyCode::Esc => form.cancel_edit(),
            KeyCode::Backspace => form.pop_char(),
            KeyCode::Char(c) => form.push_char(c),
            _ => {}
        }
        return KeyOutcome::Continue;
    }

    match key.code {
        KeyCode::Char('q') => return KeyOutcome::Exit,
        KeyCode::Char('p') => return KeyOutcome::Send(TuiCommand::Predict(form.snapshot())),
        KeyCode::Char('t') => return KeyOutcome::Send(TuiCommand::HealthCheck),
        KeyCode::Up | KeyCode::Char('k') => form.select_prev(),
        KeyCode::Down | KeyCode::Char('j') => form.select_next(),
        KeyCode::Left | KeyCode::Char('h') | KeyCode::Char('-') => form.step(-1),
        KeyCode::Right | KeyCode::Char('l') | KeyCode::Char('+') => form.step(1),
        KeyCode::Enter => form.begin_edit(),
        KeyCode::Esc => form.error = None,
        KeyCode::Char('r') => form.reset(),
        KeyCode::Char('v') => view.charts = !view.charts,
        KeyCode::Char('d') => view.payload = !view.payload,
        _ => {}
    }
    KeyOutcome::Continue
}
