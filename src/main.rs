use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use webscribe::core::LoginCredentials;
use webscribe::report;
use webscribe::{ChromeBrowser, ScrapeConfig, ScribeSession};

/// Capture every visible element of a web page into a JSON snapshot.
#[derive(Parser, Debug)]
#[command(name = "webscribe", version, about)]
struct Cli {
    /// URL to scrape
    url: String,

    /// Output JSON file
    #[arg(short, long, default_value = "output.json")]
    output: PathBuf,

    /// Also write a browsable HTML report
    #[arg(long)]
    html: Option<PathBuf>,

    /// Run the browser headless
    #[arg(long)]
    headless: bool,

    /// Page-load wait budget in seconds
    #[arg(long, default_value_t = 10)]
    wait: u64,

    /// Maximum traversal depth
    #[arg(long, default_value_t = 50)]
    max_depth: usize,

    /// Maximum number of collected elements
    #[arg(long, default_value_t = 10_000)]
    max_elements: usize,

    /// Synthesize an XPath locator per element (slow on large pages)
    #[arg(long)]
    xpath: bool,

    /// Synthesize a CSS path per element (slow on large pages)
    #[arg(long)]
    css_selector: bool,

    /// Log in through this URL before scraping
    #[arg(long, requires = "username", requires = "password")]
    login_url: Option<String>,

    #[arg(long)]
    username: Option<String>,

    #[arg(long)]
    password: Option<String>,

    /// Seconds to wait after submitting the login form
    #[arg(long, default_value_t = 3)]
    post_login_wait: u64,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    if let Err(err) = run(cli).await {
        error!(%err, "scrape failed");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> webscribe::Result<()> {
    let mut config = ScrapeConfig::default();
    config.browser.headless = cli.headless;
    config.stability.wait_seconds = cli.wait;
    config.traversal.max_depth = cli.max_depth;
    config.traversal.max_elements = cli.max_elements;
    config.traversal.include_xpath = cli.xpath;
    config.traversal.include_css_selector = cli.css_selector;

    if let (Some(login_url), Some(username), Some(password)) =
        (cli.login_url, cli.username, cli.password)
    {
        config.login = Some(LoginCredentials {
            login_url,
            username,
            password,
            username_locator: None,
            password_locator: None,
            submit_locator: None,
            post_login_wait_seconds: cli.post_login_wait,
        });
    }

    let mut session = ScribeSession::new(ChromeBrowser::new(), config).await?;
    let outcome = session.scrape(&cli.url).await;
    session.close().await?;
    let result = outcome?;

    report::save_json(&result, &cli.output)?;
    if let Some(html_path) = &cli.html {
        report::save_html(&result, html_path)?;
    }

    info!(
        total_elements = result.total_elements,
        output = %cli.output.display(),
        "done"
    );
    Ok(())
}
