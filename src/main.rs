use anyhow::{Context, Result};
use arc1610::{
    api::AskClient,
    config::{get_config, initialize_config, set_config, validate_config},
    logging::init_logging,
    panel::{cancellation_pair, PanelAssets},
    ui::run_ui,
    App, ChatClient, PanelHost,
};
use clap::Parser;
use std::{fs, path::PathBuf, sync::Arc};

#[derive(Parser)]
#[command(name = "arc1610")]
#[command(about = "Chat panel for a local codebase assistant")]
#[command(version)]
struct Cli {
    /// Answer service endpoint, e.g. http://127.0.0.1:8000/ask
    #[arg(long)]
    endpoint: Option<String>,

    /// Directory the panel's local assets are served from
    #[arg(long, default_value = ".")]
    extension_root: PathBuf,

    /// Write the panel's HTML document to this file on exit
    #[arg(long)]
    export_html: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let mut config = initialize_config().context("Failed to load configuration")?;
    if let Some(endpoint) = cli.endpoint {
        config.endpoint = endpoint;
        validate_config(&config)?;
        set_config(config);
    }
    let config = get_config();

    let _logger = init_logging(&config)?;
    log::info!("Starting arc1610 against {}", config.endpoint);

    let source = Arc::new(AskClient::from_config(&config)?);
    let mut panel = PanelHost::new(&cli.extension_root, PanelAssets::default())?;
    let (host, cancellation) = cancellation_pair();
    let cancellation = panel.resolve_view(cancellation).cancellation();

    let client = ChatClient::from_config(source, &config).with_cancellation(cancellation);
    let mut app = App::new(client, panel);

    let result = run_ui(&mut app).await;

    host.cancel();
    app.cancel_active();

    if let Some(path) = cli.export_html {
        let document = app
            .panel
            .content_document(app.client.scrollback(), app.stylesheet());
        fs::write(&path, document)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        log::info!("Exported panel document to {}", path.display());
    }

    result?;
    log::info!("Shutting down");
    Ok(())
}
