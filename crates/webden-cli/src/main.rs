use std::path::PathBuf;

use clap::{Parser, Subcommand};

use webden_core::config::Config;

#[derive(Parser)]
#[command(
    name = "webden",
    about = "Isolated browser sessions for concurrent AI agents over one Chrome process",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run two concurrent agent sessions against a live browser
    /// (requires building with --features browser)
    Demo {
        /// URL the first agent visits
        #[arg(long, default_value = "https://en.wikipedia.org/wiki/Jazz")]
        first_url: String,

        /// URL the second agent visits
        #[arg(long, default_value = "https://en.wikipedia.org/wiki/Game_theory")]
        second_url: String,
    },

    /// Validate the configuration file
    CheckConfig,

    /// Print the browser tool definitions as sent to the LLM
    Tools,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .init();

    let config_path = cli
        .config
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("webden.json"));
    let config = Config::load(&config_path)?;

    match cli.command {
        Commands::Demo {
            first_url,
            second_url,
        } => run_demo(config, first_url, second_url).await,
        Commands::CheckConfig => {
            let warnings = config.validate();
            for warning in &warnings {
                println!("warning: {warning}");
            }
            if warnings.is_empty() {
                println!("Config OK: {}", config_path.display());
            }
            Ok(())
        }
        Commands::Tools => {
            let mut registry = webden_tools::ToolRegistry::new();
            for tool in webden_tools::browser::browser_tools() {
                registry.register(tool);
            }
            println!(
                "{}",
                serde_json::to_string_pretty(&registry.to_llm_tools())?
            );
            Ok(())
        }
    }
}

/// The original two-agents scenario: both sessions share one Chrome
/// process yet never see each other's navigation or cookies.
#[cfg(feature = "browser")]
async fn run_demo(config: Config, first_url: String, second_url: String) -> anyhow::Result<()> {
    use std::sync::Arc;

    use webden_browser::cdp::CdpDriver;
    use webden_browser::{BrowserRegistry, WebBrowser};

    let settings = config.browser();
    let driver = Arc::new(CdpDriver::new(settings.clone()));
    let registry = Arc::new(BrowserRegistry::new(driver, settings));
    registry.start().await?;
    let web = Arc::new(WebBrowser::new(registry.clone()));

    let first = tokio::spawn(agent_task(web.clone(), 1, first_url));
    let second = tokio::spawn(agent_task(web.clone(), 2, second_url));
    let (first, second) = (first.await?, second.await?);

    registry.shutdown().await?;
    first?;
    second?;
    Ok(())
}

#[cfg(feature = "browser")]
async fn agent_task(
    web: std::sync::Arc<webden_browser::WebBrowser>,
    agent: u32,
    url: String,
) -> anyhow::Result<()> {
    use webden_tools::browser::{get_page_content, go_to_url};

    web.isolated_session(|| async {
        tracing::info!(agent, url = %url, "agent navigating");
        let content = go_to_url(&web, &url).await?;
        let preview: String = content.chars().take(300).collect();
        println!("[agent {agent}] {url}\n{preview}\n");

        // Re-reading must reflect only this session's navigation.
        let again = get_page_content(&web).await?;
        anyhow::ensure!(again == content, "session observed foreign navigation");
        tracing::info!(agent, "agent finished, session closing");
        Ok(())
    })
    .await?
}

#[cfg(not(feature = "browser"))]
async fn run_demo(_config: Config, _first_url: String, _second_url: String) -> anyhow::Result<()> {
    anyhow::bail!("the demo drives a real browser; rebuild with --features browser")
}
