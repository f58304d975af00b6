use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use crossterm::style::Stylize;
use proxy_sieve::{
    proxy::{
        event_channel, CancelToken, CheckerConfig, FileSink, OutputMode, ProxyParser, ProxyType,
        RunEvent, ValidationEngine,
    },
    tui::ProxyCheckerApp,
    SieveError,
};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Validate proxy lists by sending a test request through every proxy
#[derive(Parser)]
#[command(name = "proxy-sieve")]
#[command(about = "A multi-threaded proxy list validator")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Print debug diagnostics to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Check proxies and sort them into valid and invalid files
    Check {
        /// Input file containing proxies, one per line
        input: PathBuf,
        /// URL to test proxies against
        #[arg(short, long, default_value = "https://api.botprod.ru/ip")]
        url: String,
        /// Output file for valid proxies
        #[arg(long, default_value = "valid.txt")]
        valid: PathBuf,
        /// Output file for invalid proxies
        #[arg(long, default_value = "invalid.txt")]
        invalid: PathBuf,
        /// Number of concurrent threads
        #[arg(short = 'n', long, default_value = "10")]
        threads: usize,
        /// Timeout in seconds for each probe
        #[arg(long, default_value = "5")]
        timeout: u64,
        /// Proxy type for lines without a scheme (http, https, socks4, socks5)
        #[arg(short = 't', long, default_value = "http")]
        proxy_type: String,
        /// Empty the output files instead of appending to them
        #[arg(long)]
        truncate: bool,
        /// Show the interactive progress screen
        #[arg(long)]
        tui: bool,
    },
    /// Normalize a proxy list to canonical URLs without checking it
    Parse {
        /// Input file containing proxies
        input: PathBuf,
        /// Output file for parsed proxies
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Proxy type for lines without a scheme (http, https, socks4, socks5)
        #[arg(short = 't', long, default_value = "http")]
        proxy_type: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let tui_mode = matches!(cli.command, Commands::Check { tui: true, .. });
    if !tui_mode || std::env::var_os("RUST_LOG").is_some() {
        init_tracing(cli.verbose);
    }

    match cli.command {
        Commands::Check {
            input,
            url,
            valid,
            invalid,
            threads,
            timeout,
            proxy_type,
            truncate,
            tui,
        } => {
            let config = CheckerConfig::new()
                .with_test_url(url)
                .with_concurrency(threads)
                .with_timeout(Duration::from_secs(timeout))
                .with_default_type(parse_proxy_type(&proxy_type)?);
            config.validate()?;
            require_path("valid output", &valid)?;
            require_path("invalid output", &invalid)?;

            let descriptors = ProxyParser::load_descriptors(&input)?;
            let mode = if truncate {
                OutputMode::Truncate
            } else {
                OutputMode::Append
            };

            if tui {
                let mut app = ProxyCheckerApp::new(descriptors, config, valid, invalid, mode);
                let state = app.run().await?;
                println!(
                    "Checked: {}/{} | Valid: {} | Invalid: {}",
                    state.checked, state.total, state.valid_count, state.invalid_count
                );
                return Ok(());
            }

            println!("Loaded {} proxies from {:?}", descriptors.len(), input);
            println!("Checking with {} threads, timeout: {}s", threads, timeout);
            println!("Test URL: {}", config.test_url);
            println!();

            run_plain(descriptors, config, &valid, &invalid, mode).await?;
        }
        Commands::Parse {
            input,
            output,
            proxy_type,
        } => {
            let ptype = parse_proxy_type(&proxy_type)?;
            let descriptors = ProxyParser::load_descriptors(&input)?;
            let (proxies, errors) = ProxyParser::parse_all(&descriptors, ptype);

            for error in &errors {
                eprintln!("{}", error);
            }
            println!(
                "Parsed {} proxies from {:?} ({} malformed)",
                proxies.len(),
                input,
                errors.len()
            );

            if let Some(output_path) = output {
                ProxyParser::save_to_file(&proxies, &output_path)?;
                println!("Saved parsed proxies to {:?}", output_path);
            } else {
                for proxy in &proxies {
                    println!("{}", proxy.url());
                }
            }
        }
    }

    Ok(())
}

/// Run the engine and print colored log lines as events arrive
async fn run_plain(
    descriptors: Vec<String>,
    config: CheckerConfig,
    valid: &Path,
    invalid: &Path,
    mode: OutputMode,
) -> Result<()> {
    let mut valid_sink = FileSink::open(valid, mode)
        .with_context(|| format!("failed to open {}", valid.display()))?;
    let mut invalid_sink = FileSink::open(invalid, mode)
        .with_context(|| format!("failed to open {}", invalid.display()))?;

    let cancel = CancelToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("Stopping after in-flight checks finish...");
                cancel.cancel();
            }
        }
    });

    let engine = ValidationEngine::new(config);
    let (tx, mut rx) = event_channel();
    let run = tokio::spawn(async move {
        engine
            .run(descriptors, &mut valid_sink, &mut invalid_sink, Some(tx), cancel)
            .await
    });

    let mut checked = 0;
    while let Some(event) = rx.recv().await {
        match event {
            RunEvent::Log { message, is_valid } => {
                if is_valid {
                    println!("{}", message.green());
                } else {
                    println!("{}", message.red());
                }
            }
            RunEvent::Progress { checked_delta, .. } => checked += checked_delta,
        }
    }

    let state = run
        .await
        .map_err(|e| anyhow!("validation task failed: {}", e))??;
    info!(checked, "event stream closed");

    println!();
    println!(
        "[{}/{} {}%] Valid: {} | Invalid: {}",
        state.checked,
        state.total,
        state.percent(),
        state.valid_count,
        state.invalid_count
    );
    println!("Valid proxies saved to {:?}", valid);
    println!("Invalid proxies saved to {:?}", invalid);

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn require_path(what: &str, path: &Path) -> Result<()> {
    if path.as_os_str().is_empty() {
        bail!(SieveError::configuration(format!("{} path is empty", what)));
    }
    Ok(())
}

fn parse_proxy_type(s: &str) -> Result<ProxyType> {
    s.parse::<ProxyType>().map_err(|e| anyhow!(SieveError::configuration(e)))
}
