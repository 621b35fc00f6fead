use super::*;
use crate::core::message::ConversationMessage;
use crate::core::session::{PersistenceError, SessionSummary};
use std::sync::Mutex;

#[derive(Default)]
struct StubStore {
    latest: Mutex<Option<Session>>,
    fail: bool,
}

impl SessionStore for StubStore {
    fn save(&self, session: &Session) -> Result<(), PersistenceError> {
        *self.latest.lock().unwrap() = Some(session.clone());
        Ok(())
    }

    fn load(&self, id: &str) -> Result<Session, PersistenceError> {
        Err(PersistenceError::NotFound(id.to_string()))
    }

    fn latest(&self) -> Result<Option<Session>, PersistenceError> {
        if self.fail {
            return Err(PersistenceError::NotFound("latest".to_string()));
        }
        Ok(self.latest.lock().unwrap().clone())
    }

    fn list(&self) -> Result<Vec<SessionSummary>, PersistenceError> {
        Ok(self
            .latest
            .lock()
            .unwrap()
            .iter()
            .map(SessionSummary::from)
            .collect())
    }
}

fn args(argv: &[&str]) -> Args {
    Args::try_parse_from(std::iter::once("parley").chain(argv.iter().copied())).expect("args")
}

fn registry() -> Arc<SkillRegistry> {
    let registry = Arc::new(SkillRegistry::new());
    register_builtin_skills(&registry);
    registry
}

#[test]
fn defaults_start_on_the_default_endpoint() {
    let app = build_app(&args(&[]), Config::default(), &StubStore::default(), registry())
        .expect("app");
    assert_eq!(app.session.endpoint, "openai");
    assert_eq!(app.session.model, "gpt-4o-mini");
    assert!(app.skills_enabled);
    assert!(app.session.messages.is_empty());
}

#[test]
fn endpoint_flag_selects_the_tool_model() {
    let app = build_app(
        &args(&["-e", "GROK"]),
        Config::default(),
        &StubStore::default(),
        registry(),
    )
    .expect("app");
    assert_eq!(app.session.endpoint, "grok");
    assert_eq!(app.session.model, "grok-4-1-fast");
}

#[test]
fn model_flag_overrides_and_rechecks_tool_support() {
    let app = build_app(
        &args(&["--endpoint", "openai", "--model", "o1-mini"]),
        Config::default(),
        &StubStore::default(),
        registry(),
    )
    .expect("app");
    assert_eq!(app.session.model, "o1-mini");
    assert!(!app.skills_enabled);
}

#[test]
fn unknown_endpoint_is_a_startup_error() {
    let result = build_app(
        &args(&["-e", "nowhere"]),
        Config::default(),
        &StubStore::default(),
        registry(),
    );
    let err = result.err().expect("error");
    assert!(err.to_string().contains("Unknown endpoint 'nowhere'"));
}

#[test]
fn no_skills_flag_wins() {
    let app = build_app(
        &args(&["--no-skills"]),
        Config::default(),
        &StubStore::default(),
        registry(),
    )
    .expect("app");
    assert!(!app.skills_enabled);
    assert!(app.skills_disabled_by_user);
}

#[test]
fn resume_restores_latest_session() {
    let store = StubStore::default();
    let mut saved = Session::new("grok", "grok-4-1-fast");
    saved.push(ConversationMessage::user("earlier"));
    saved.push(ConversationMessage::assistant("reply"));
    store.save(&saved).unwrap();

    let app = build_app(&args(&["--resume"]), Config::default(), &store, registry())
        .expect("app");
    assert_eq!(app.session.id, saved.id);
    assert_eq!(app.session.endpoint, "grok");
    assert_eq!(app.session.messages.len(), 2);
    assert!(app
        .notices
        .iter()
        .any(|notice| notice.text.starts_with("Resumed session")));
}

#[test]
fn resume_without_sessions_starts_fresh() {
    for store in [
        StubStore::default(),
        StubStore {
            fail: true,
            ..StubStore::default()
        },
    ] {
        let app = build_app(&args(&["--resume"]), Config::default(), &store, registry())
            .expect("app");
        assert!(app.session.messages.is_empty());
        assert!(app
            .notices
            .iter()
            .any(|notice| notice.text.starts_with("No saved session")));
    }
}

#[test]
fn configured_default_endpoint_must_exist() {
    let config = Config {
        default_endpoint: Some("missing".to_string()),
        ..Config::default()
    };
    assert!(build_app(&args(&[]), config, &StubStore::default(), registry()).is_err());
}

#[test]
fn write_default_config_refuses_to_overwrite() {
    let dir = tempfile::TempDir::new().expect("tempdir");
    let path = dir.path().join("config.toml");
    write_default_config(&path).expect("first write");
    assert!(path.exists());
    assert!(write_default_config(&path).is_err());
}
