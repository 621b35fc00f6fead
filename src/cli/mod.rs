//! Command-line parsing and program entry.

use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{info, warn};

use crate::core::app::App;
use crate::core::config::{data::path_display, Config};
use crate::core::provider_client::HttpProviderClient;
use crate::core::session::{FileSessionStore, Session, SessionStore};
use crate::skills::builtin::register_builtin_skills;
use crate::skills::SkillRegistry;
use crate::ui::chat_loop::run_chat;
use crate::utils::logging::init_logging;

#[derive(Parser, Debug)]
#[command(name = "parley", version)]
#[command(about = "Terminal chat where the model can call local skills")]
#[command(
    long_about = "Parley is a full-screen terminal chat client for OpenAI-compatible APIs. \
Models that support tool calling can invoke local skills mid-conversation; results are \
sent back automatically before the final answer is shown.\n\n\
API keys:\n\
  <ENDPOINT>_API_KEY   e.g. OPENAI_API_KEY, GROK_API_KEY, VENICE_API_KEY\n\
  or api_key / api_key_env in config.toml\n\n\
Logging:\n\
  PARLEY_LOG           tracing filter for --log-file (default: info)\n\n\
Controls:\n\
  Enter                Send the message\n\
  Alt+Enter            Insert a newline\n\
  PgUp/PgDn            Scroll the transcript\n\
  Ctrl+C               Quit\n\n\
Commands:\n\
  /help                List every command"
)]
pub struct Args {
    /// Endpoint to start on (openai, grok, venice, anthropic, openrouter,
    /// digitalocean, or an id from config.toml)
    #[arg(short = 'e', long, value_name = "ENDPOINT")]
    pub endpoint: Option<String>,

    /// Model to use on the chosen endpoint
    #[arg(short = 'm', long, value_name = "MODEL")]
    pub model: Option<String>,

    /// Continue the most recently updated session
    #[arg(long)]
    pub resume: bool,

    /// Write diagnostics to this file
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Read configuration from this file instead of the default location
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Never send skills to the model
    #[arg(long)]
    pub no_skills: bool,

    /// Write a config.toml with the defaults filled in, then exit
    #[arg(long)]
    pub write_default_config: bool,
}

pub fn main() -> Result<(), Box<dyn Error>> {
    tokio::runtime::Runtime::new()?.block_on(async_main())
}

async fn async_main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    init_logging(args.log_file.as_deref())?;

    let config_path = args.config.clone().or_else(Config::default_path);

    if args.write_default_config {
        let path = config_path.ok_or("Could not determine a config directory; pass --config")?;
        write_default_config(&path)?;
        println!("Wrote {}", path_display(&path));
        return Ok(());
    }

    let config = match &config_path {
        Some(path) => Config::load_from_path(path)?,
        None => Config::default(),
    };

    let sessions_dir =
        FileSessionStore::default_dir().ok_or("Could not determine a data directory for sessions")?;
    let store: Arc<dyn SessionStore> = Arc::new(FileSessionStore::new(sessions_dir));

    let registry = Arc::new(SkillRegistry::new());
    register_builtin_skills(&registry);

    let app = build_app(&args, config, store.as_ref(), registry)?;
    let client = Arc::new(HttpProviderClient::default());
    run_chat(app, client, store).await
}

fn write_default_config(path: &std::path::Path) -> Result<(), Box<dyn Error>> {
    if path.exists() {
        return Err(format!("{} already exists", path_display(path)).into());
    }
    Config::starter().save_to_path(path)
}

/// Resolves the starting session and applies the endpoint/model flags.
pub fn build_app(
    args: &Args,
    config: Config,
    store: &dyn SessionStore,
    registry: Arc<SkillRegistry>,
) -> Result<App, Box<dyn Error>> {
    let resumed = if args.resume {
        match store.latest() {
            Ok(found) => found,
            Err(err) => {
                warn!(error = %err, "Could not read saved sessions");
                None
            }
        }
    } else {
        None
    };
    let resuming = resumed.is_some();

    let session = match resumed {
        Some(session) => session,
        None => {
            let endpoint = config.default_endpoint().to_string();
            let model = config.initial_model(&endpoint).unwrap_or_default();
            Session::new(endpoint, model)
        }
    };

    let mut app = App::new(config, registry, session, args.no_skills);

    if let Some(endpoint) = args.endpoint.as_deref() {
        app.switch_endpoint(endpoint)?;
    } else if !resuming && !app.config.is_known_endpoint(&app.session.endpoint) {
        return Err(format!(
            "default_endpoint '{}' is not a known endpoint",
            app.session.endpoint
        )
        .into());
    }
    if let Some(model) = args.model.as_deref() {
        app.set_model(model);
    }
    if app.session.model.is_empty() {
        return Err(format!(
            "No model configured for endpoint '{}'; pass --model",
            app.session.endpoint
        )
        .into());
    }

    if resuming {
        app.info(format!(
            "Resumed session {} ({} messages).",
            app.session.id,
            app.session.messages.len()
        ));
    } else if args.resume {
        app.info("No saved session to resume; starting a new one.");
    }

    let resolved = app.config.resolve_endpoint(&app.session.endpoint);
    if resolved.api_key.is_none() {
        app.warn(format!(
            "No API key found for {}. Set {} or add api_key to config.toml.",
            resolved.id,
            crate::core::config::data::default_key_var(&resolved.id)
        ));
    }

    info!(
        session = %app.session.id,
        endpoint = %app.session.endpoint,
        model = %app.session.model,
        resumed = resuming,
        "Session ready"
    );
    Ok(app)
}

#[cfg(test)]
mod tests;
