use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::core::app::{AppAction, AppActionDispatcher};
use crate::core::session::{Session, SessionStore};

enum StoreRequest {
    Save(Session),
    List,
    Load(String),
}

/// Funnels every store access through one task, so saves land in the order
/// they were taken and a read never sees a store with saves still queued.
#[derive(Clone)]
pub struct SessionWorker {
    tx: mpsc::UnboundedSender<StoreRequest>,
}

impl SessionWorker {
    /// Read results come back through `dispatcher`. The returned handle
    /// finishes once every worker clone is dropped and the queue is flushed.
    pub fn spawn(
        store: Arc<dyn SessionStore>,
        dispatcher: AppActionDispatcher,
    ) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<StoreRequest>();
        let handle = tokio::spawn(async move {
            let mut next = rx.recv().await;
            while let Some(request) = next.take() {
                match request {
                    StoreRequest::Save(mut session) => {
                        // Only the newest queued snapshot of a session needs writing.
                        while let Ok(queued) = rx.try_recv() {
                            match queued {
                                StoreRequest::Save(newer) => {
                                    if newer.id != session.id {
                                        write_snapshot(&store, session).await;
                                    }
                                    session = newer;
                                }
                                other => {
                                    next = Some(other);
                                    break;
                                }
                            }
                        }
                        write_snapshot(&store, session).await;
                    }
                    StoreRequest::List => list_sessions(&store, &dispatcher).await,
                    StoreRequest::Load(id) => load_session(&store, &dispatcher, id).await,
                }
                if next.is_none() {
                    next = rx.recv().await;
                }
            }
        });
        (Self { tx }, handle)
    }

    pub fn save(&self, session: Session) {
        self.send(StoreRequest::Save(session));
    }

    pub fn list(&self) {
        self.send(StoreRequest::List);
    }

    pub fn load(&self, id: String) {
        self.send(StoreRequest::Load(id));
    }

    fn send(&self, request: StoreRequest) {
        if self.tx.send(request).is_err() {
            warn!("Session worker stopped; request dropped");
        }
    }
}

async fn write_snapshot(store: &Arc<dyn SessionStore>, session: Session) {
    let store = Arc::clone(store);
    let id = session.id.clone();
    match tokio::task::spawn_blocking(move || store.save(&session)).await {
        Ok(Ok(())) => debug!(session = %id, "Session saved"),
        Ok(Err(err)) => warn!(session = %id, error = %err, "Session save failed"),
        Err(err) => warn!(session = %id, error = %err, "Session save task aborted"),
    }
}

async fn list_sessions(store: &Arc<dyn SessionStore>, dispatcher: &AppActionDispatcher) {
    let store = Arc::clone(store);
    match tokio::task::spawn_blocking(move || store.list()).await {
        Ok(result) => dispatcher.dispatch(AppAction::SessionsListed { result }),
        Err(err) => warn!(error = %err, "Session list task aborted"),
    }
}

async fn load_session(
    store: &Arc<dyn SessionStore>,
    dispatcher: &AppActionDispatcher,
    id: String,
) {
    let store = Arc::clone(store);
    let lookup = id.clone();
    match tokio::task::spawn_blocking(move || store.load(&lookup)).await {
        Ok(result) => dispatcher.dispatch(AppAction::SessionLoaded {
            id,
            result: result.map(Box::new),
        }),
        Err(err) => warn!(session = %id, error = %err, "Session load task aborted"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::message::ConversationMessage;
    use crate::core::session::{PersistenceError, SessionSummary};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingStore {
        saved: Mutex<Vec<Session>>,
    }

    impl SessionStore for RecordingStore {
        fn save(&self, session: &Session) -> Result<(), PersistenceError> {
            self.saved.lock().unwrap().push(session.clone());
            Ok(())
        }

        fn load(&self, id: &str) -> Result<Session, PersistenceError> {
            self.saved
                .lock()
                .unwrap()
                .iter()
                .rev()
                .find(|session| session.id == id)
                .cloned()
                .ok_or_else(|| PersistenceError::NotFound(id.to_string()))
        }

        fn latest(&self) -> Result<Option<Session>, PersistenceError> {
            Ok(self.saved.lock().unwrap().last().cloned())
        }

        fn list(&self) -> Result<Vec<SessionSummary>, PersistenceError> {
            Ok(self
                .saved
                .lock()
                .unwrap()
                .iter()
                .rev()
                .map(SessionSummary::from)
                .collect())
        }
    }

    struct FailingStore;

    impl SessionStore for FailingStore {
        fn save(&self, session: &Session) -> Result<(), PersistenceError> {
            Err(PersistenceError::NotFound(session.id.clone()))
        }

        fn load(&self, id: &str) -> Result<Session, PersistenceError> {
            Err(PersistenceError::NotFound(id.to_string()))
        }

        fn latest(&self) -> Result<Option<Session>, PersistenceError> {
            Ok(None)
        }

        fn list(&self) -> Result<Vec<SessionSummary>, PersistenceError> {
            Ok(Vec::new())
        }
    }

    fn spawn_worker(
        store: Arc<dyn SessionStore>,
    ) -> (
        SessionWorker,
        JoinHandle<()>,
        mpsc::UnboundedReceiver<AppAction>,
    ) {
        let (action_tx, action_rx) = mpsc::unbounded_channel();
        let (worker, handle) = SessionWorker::spawn(store, AppActionDispatcher::new(action_tx));
        (worker, handle, action_rx)
    }

    #[tokio::test]
    async fn last_snapshot_wins() {
        let store = Arc::new(RecordingStore::default());
        let (worker, handle, _actions) = spawn_worker(store.clone());

        let mut session = Session::new("openai", "gpt-4o-mini");
        for text in ["one", "two", "three"] {
            session.push(ConversationMessage::user(text));
            worker.save(session.clone());
        }
        drop(worker);
        handle.await.expect("writer");

        let latest = store.latest().unwrap().expect("saved");
        assert_eq!(latest.messages.len(), 3);
        assert_eq!(latest.messages[2].content, "three");
    }

    #[tokio::test]
    async fn switching_sessions_keeps_both_final_snapshots() {
        let store = Arc::new(RecordingStore::default());
        let (worker, handle, _actions) = spawn_worker(store.clone());

        let mut first = Session::new("openai", "gpt-4o-mini");
        first.push(ConversationMessage::user("old"));
        let mut second = Session::new("openai", "gpt-4o-mini");
        second.id = format!("{}-b", first.id);
        worker.save(first.clone());
        worker.save(second.clone());
        drop(worker);
        handle.await.expect("writer");

        let saved = store.saved.lock().unwrap();
        assert!(saved.iter().any(|s| s.id == first.id && s.messages.len() == 1));
        assert_eq!(saved.last().map(|s| s.id.clone()), Some(second.id));
    }

    #[tokio::test]
    async fn failed_saves_do_not_stop_the_writer() {
        let (worker, handle, _actions) = spawn_worker(Arc::new(FailingStore));
        worker.save(Session::new("openai", "gpt-4o-mini"));
        worker.save(Session::new("grok", "grok-4-1-fast"));
        drop(worker);
        handle.await.expect("writer survives failures");
    }

    #[tokio::test]
    async fn loads_see_saves_queued_before_them() {
        let store = Arc::new(RecordingStore::default());
        let (worker, handle, mut actions) = spawn_worker(store.clone());

        let mut session = Session::new("openai", "gpt-4o-mini");
        session.push(ConversationMessage::user("first"));
        worker.save(session.clone());
        session.push(ConversationMessage::user("second"));
        worker.save(session.clone());
        worker.load(session.id.clone());
        worker.list();
        drop(worker);
        handle.await.expect("worker");

        match actions.recv().await {
            Some(AppAction::SessionLoaded { id, result }) => {
                assert_eq!(id, session.id);
                assert_eq!(result.expect("loaded").messages.len(), 2);
            }
            other => panic!("expected a loaded session, got {other:?}"),
        }
        match actions.recv().await {
            Some(AppAction::SessionsListed { result }) => {
                let listed = result.expect("listed");
                assert!(!listed.is_empty());
                assert!(listed.iter().all(|summary| summary.id == session.id));
            }
            other => panic!("expected a listing, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_sessions_are_reported_back() {
        let (worker, handle, mut actions) = spawn_worker(Arc::new(FailingStore));
        worker.load("nope".to_string());
        drop(worker);
        handle.await.expect("worker");

        assert!(matches!(
            actions.recv().await,
            Some(AppAction::SessionLoaded {
                result: Err(PersistenceError::NotFound(_)),
                ..
            })
        ));
    }
}
