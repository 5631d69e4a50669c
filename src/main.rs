//! mailaider - Offline development session
//!
//! Runs one action against the offline mail host and prints the output:
//!
//! ```text
//! mailaider [action] [instruction...]
//! ```

use std::sync::Arc;

use anyhow::Context;
use mailaider::app::AppDeps;
use mailaider::config::Settings;
use mailaider::domain::Action;
use mailaider::services::{ClipboardService, MailHostService, MemoryClipboard};
use mailaider::storage::{FlagStore, KeychainAccess};
use mailaider::App;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let action = match args.next() {
        Some(raw) => raw.parse::<Action>().map_err(anyhow::Error::msg)?,
        None => Action::Summarize,
    };
    let instruction = args.collect::<Vec<_>>().join(" ");

    let settings_path = Settings::default_path()?;
    let settings = Settings::load_or_default(&settings_path)
        .with_context(|| format!("loading {}", settings_path.display()))?;
    let flags = FlagStore::open(FlagStore::default_path()?)?;

    tracing::info!(%action, "Starting mailaider offline session");

    let deps = AppDeps {
        host: Arc::new(MailHostService::detached(&settings.host)),
        secrets: Arc::new(KeychainAccess::new()),
        flags,
        clipboard: ClipboardService::new(Arc::new(MemoryClipboard::new())),
        settings_path: Some(settings_path),
    };
    let app = App::start(settings, deps).await?;

    if !app.select_action(action) {
        anyhow::bail!("action {action} is not available in the current mode");
    }
    let instruction = (!instruction.trim().is_empty()).then_some(instruction.as_str());
    if let Err(e) = app.run_action(instruction, None).await {
        tracing::error!(error = %e, "Action failed");
    }
    println!("{}", app.output().display_text());

    Ok(())
}
