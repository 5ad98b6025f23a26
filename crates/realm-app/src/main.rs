//! Interactive shell for the Collectible Realm client.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `realm-config.yaml` (or `REALM_CONFIG`)
//! 2. Initialize structured logging with the in-memory history
//! 3. Choose the backend: the hosted one when configured, else the demo realm
//! 4. Open the preferences file
//! 5. Bootstrap the client
//! 6. Read commands from stdin until `quit` or end of input

use std::path::{Path, PathBuf};
use std::sync::Arc;

use realm_app::demo::{demo_backend, DEMO_CODE, DEMO_EMAIL, DEMO_PASSWORD};
use realm_app::shell::{self, Command, Reply};
use realm_app::{App, AppError, Preferences, Region, RenderFrame, Surface};
use realm_backend::Backend;
use realm_core::{init_tracing, AppConfig, LogHistory};
use realm_types::Theme;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

const CONFIG_PATH: &str = "realm-config.yaml";
const LOCAL_CONFIG_PATH: &str = "realm-config.local.yaml";
const PREFERENCES_PATH: &str = ".realm-preferences.json";

/// Prints frames as pretty JSON.
struct ConsoleSurface;

impl Surface for ConsoleSurface {
    fn render(&self, region: Region, frame: &RenderFrame) {
        match serde_json::to_string_pretty(frame) {
            Ok(body) => println!("── {region} · {} ──\n{body}", frame.kind()),
            Err(error) => println!("── {region} · unrenderable frame: {error}"),
        }
    }

    fn set_theme(&self, theme: Theme) {
        println!("theme: {}", theme.as_str());
    }

    fn set_status_pill(&self, label: &str, _connected: bool) {
        println!("status: {label}");
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Configuration.
    let config = load_config()?;

    // 2. Logging.
    let history = LogHistory::new(config.logging.history_capacity);
    init_tracing(&config.logging, &history).map_err(|e| AppError::Tracing {
        message: e.to_string(),
    })?;
    info!(version = %config.app_version, "realm-shell starting");

    // 3. Backend.
    let backend = if config.backend.is_configured() {
        Backend::from_config(&config.backend).map_err(AppError::from)?
    } else {
        info!(
            email = DEMO_EMAIL,
            password = DEMO_PASSWORD,
            code = DEMO_CODE,
            "Backend not configured, using the demo realm"
        );
        Backend::Memory(demo_backend())
    };

    // 4. Preferences.
    let preferences = Preferences::open(PREFERENCES_PATH)?;

    // 5. Bootstrap.
    let app = App::bootstrap(
        config,
        backend,
        Arc::new(ConsoleSurface),
        preferences,
        history,
    )
    .await?;
    for failure in &app.report().failed {
        println!("module {} failed to {}: {}", failure.name, failure.stage, failure.error);
    }

    // 6. Prompt.
    println!("{}", shell::HELP);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let command = match Command::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(error) => {
                println!("error: {error}");
                continue;
            }
        };
        match shell::execute(&app, command).await? {
            Reply::Continue(text) => println!("{text}"),
            Reply::Quit => break,
        }
        app.settle().await;
    }

    app.shutdown();
    Ok(())
}

fn load_config() -> Result<AppConfig, AppError> {
    let path = std::env::var_os("REALM_CONFIG")
        .map_or_else(|| PathBuf::from(CONFIG_PATH), PathBuf::from);
    if path.exists() {
        Ok(AppConfig::load(&path, Some(Path::new(LOCAL_CONFIG_PATH)))?)
    } else {
        let mut config = AppConfig::default();
        config.apply_env_overrides();
        Ok(config)
    }
}
