use tracing::warn;

use super::AppCommand;
use crate::core::app::App;
use crate::core::session::{PersistenceError, Session, SessionSummary};

const LISTED_SESSIONS: usize = 20;

pub(super) fn handle_listed(
    app: &mut App,
    result: Result<Vec<SessionSummary>, PersistenceError>,
) -> Vec<AppCommand> {
    let summaries = match result {
        Ok(summaries) => summaries,
        Err(err) => {
            warn!(error = %err, "Listing sessions failed");
            app.error(format!("Could not list sessions: {err}"));
            return Vec::new();
        }
    };
    if summaries.is_empty() {
        app.info("No saved sessions.");
        return Vec::new();
    }

    let mut listing = String::from("Saved sessions, newest first:");
    for summary in summaries.iter().take(LISTED_SESSIONS) {
        let marker = if summary.id == app.session.id { "*" } else { " " };
        listing.push_str(&format!(
            "\n {marker} {} · {} messages · {} / {} · {}",
            summary.id,
            summary.message_count,
            summary.endpoint,
            summary.model,
            summary.updated_at.format("%Y-%m-%d %H:%M UTC"),
        ));
    }
    if summaries.len() > LISTED_SESSIONS {
        listing.push_str(&format!(
            "\n   … and {} older",
            summaries.len() - LISTED_SESSIONS
        ));
    }
    listing.push_str("\nResume one with /session resume <id>.");
    app.info(listing);
    Vec::new()
}

pub(super) fn handle_loaded(
    app: &mut App,
    id: &str,
    result: Result<Box<Session>, PersistenceError>,
) -> Vec<AppCommand> {
    match result {
        Ok(session) => {
            let message = app.resume_session(*session);
            app.info(message);
        }
        Err(PersistenceError::NotFound(_)) => {
            app.error(format!("No saved session '{id}'. See /session list."));
        }
        Err(err) => {
            warn!(session = %id, error = %err, "Loading session failed");
            app.error(format!("Could not load session '{id}': {err}"));
        }
    }
    Vec::new()
}
