use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use ratatui::crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tui_textarea::Input as TAInput;

use super::executors::{ExecutorContext, LoopControl, SessionWorker};
use super::lifecycle::{restore_terminal, setup_terminal};
use crate::core::app::{apply_actions, App, AppAction, AppActionDispatcher};
use crate::core::provider_client::ProviderClient;
use crate::core::session::SessionStore;
use crate::ui::renderer::{ui, ChatView};

const PAGE_ROWS: u16 = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyOutcome {
    Edited,
    Submit(String),
    Quit,
    Ignored,
}

/// Applies a key press to the input box. Enter submits; Alt/Shift+Enter
/// inserts a newline.
pub fn handle_key(view: &mut ChatView, key: KeyEvent) -> KeyOutcome {
    if key.kind != KeyEventKind::Press {
        return KeyOutcome::Ignored;
    }

    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        KeyCode::Char('c') if ctrl => KeyOutcome::Quit,
        KeyCode::Char('d') if ctrl && view.input_text().is_empty() => KeyOutcome::Quit,
        KeyCode::Enter
            if key
                .modifiers
                .intersects(KeyModifiers::ALT | KeyModifiers::SHIFT) =>
        {
            view.textarea.insert_newline();
            KeyOutcome::Edited
        }
        KeyCode::Enter => {
            let text = view.take_input();
            if text.trim().is_empty() {
                KeyOutcome::Ignored
            } else {
                KeyOutcome::Submit(text)
            }
        }
        KeyCode::PageUp => {
            view.scroll_up(PAGE_ROWS);
            KeyOutcome::Edited
        }
        KeyCode::PageDown => {
            view.scroll_down(PAGE_ROWS);
            KeyOutcome::Edited
        }
        _ => {
            view.textarea.input(TAInput::from(key));
            KeyOutcome::Edited
        }
    }
}

/// Waits for one action, then takes whatever else is already queued.
pub(super) async fn next_actions(
    action_rx: &mut mpsc::UnboundedReceiver<AppAction>,
) -> Option<Vec<AppAction>> {
    let first = action_rx.recv().await?;
    let mut pending = vec![first];
    while let Ok(action) = action_rx.try_recv() {
        pending.push(action);
    }
    Some(pending)
}

pub(super) fn apply_and_execute(
    app: &mut App,
    ctx: &ExecutorContext,
    actions: Vec<AppAction>,
) -> LoopControl {
    let commands = apply_actions(app, actions);
    ctx.run_commands(commands)
}

fn handle_terminal_event(
    app: &mut App,
    ctx: &ExecutorContext,
    view: &mut ChatView,
    event: Event,
) -> LoopControl {
    match event {
        Event::Key(key) => match handle_key(view, key) {
            KeyOutcome::Submit(text) => {
                view.scroll_back = 0;
                apply_and_execute(app, ctx, vec![AppAction::SubmitInput { text }])
            }
            KeyOutcome::Quit => LoopControl::Quit,
            KeyOutcome::Edited | KeyOutcome::Ignored => LoopControl::Continue,
        },
        Event::Paste(text) => {
            view.textarea.insert_str(text);
            LoopControl::Continue
        }
        _ => LoopControl::Continue,
    }
}

fn spawn_event_reader(
    event_tx: mpsc::UnboundedSender<Event>,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while !cancel.is_cancelled() {
            if let Ok(true) = event::poll(Duration::from_millis(10)) {
                match event::read() {
                    Ok(ev) => {
                        if event_tx.send(ev).is_err() {
                            break;
                        }
                    }
                    Err(_) => continue,
                }
            } else {
                tokio::task::yield_now().await;
            }
        }
    })
}

pub async fn run_chat(
    mut app: App,
    client: Arc<dyn ProviderClient>,
    store: Arc<dyn SessionStore>,
) -> Result<(), Box<dyn Error>> {
    let (action_tx, mut action_rx) = mpsc::unbounded_channel::<AppAction>();
    let dispatcher = AppActionDispatcher::new(action_tx);
    let (sessions, worker_handle) = SessionWorker::spawn(store, dispatcher.clone());
    let ctx = ExecutorContext::new(dispatcher, client, app.executor.clone(), sessions);

    info!(
        session = %app.session.id,
        endpoint = %app.session.endpoint,
        model = %app.session.model,
        skills = app.skills_enabled,
        "Chat started"
    );

    let mut terminal = setup_terminal()?;
    let cancel = CancellationToken::new();
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<Event>();
    let event_reader_handle = spawn_event_reader(event_tx, cancel.clone());

    let mut view = ChatView::default();
    let mut request_redraw = true;

    let result: Result<(), Box<dyn Error>> = loop {
        if request_redraw {
            if let Err(err) = terminal.draw(|f| ui(f, &app, &view)) {
                break Err(err.into());
            }
            request_redraw = false;
        }

        let control = tokio::select! {
            Some(event) = event_rx.recv() => {
                request_redraw = true;
                handle_terminal_event(&mut app, &ctx, &mut view, event)
            }
            Some(actions) = next_actions(&mut action_rx) => {
                request_redraw = true;
                apply_and_execute(&mut app, &ctx, actions)
            }
            else => LoopControl::Quit,
        };

        if control == LoopControl::Quit {
            break Ok(());
        }
    };

    cancel.cancel();
    event_reader_handle.abort();
    let restored = restore_terminal(&mut terminal);

    // Dropping the last worker handle lets the queue drain and the task exit.
    drop(ctx);
    if let Err(err) = worker_handle.await {
        warn!(error = %err, "Session worker did not finish cleanly");
    }
    info!(session = %app.session.id, "Chat ended");

    result.and(restored)
}
