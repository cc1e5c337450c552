use std::path::PathBuf;

use clap::{Parser, Subcommand};
use reqwest::Method;

use idempotency_gateway::client::IdempotentClient;
use idempotency_gateway::config::{load_config, ConfigHandle, GatewayConfig};
use idempotency_gateway::observability::logging;

#[derive(Parser)]
#[command(name = "idem-cli")]
#[command(about = "Send HTTP requests with a stable idempotency key", long_about = None)]
struct Cli {
    /// Configuration file supplying the header name and retry policy.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send a request, retrying retryable failures with the same key
    Send {
        #[arg(short = 'X', long, default_value = "POST")]
        method: String,

        #[arg(short, long)]
        url: String,

        /// Request body
        #[arg(short, long)]
        data: Option<String>,

        /// Reuse a key instead of generating one
        #[arg(short, long)]
        key: Option<String>,

        /// Extra header in `Name: value` form (repeatable)
        #[arg(short = 'H', long = "header")]
        headers: Vec<String>,
    },
    /// Print a freshly generated key
    Key,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };
    logging::init_logging(&config.observability);
    let header = config.idempotency.header.clone();
    let client = IdempotentClient::new(reqwest::Client::new(), ConfigHandle::new(config));

    match cli.command {
        Commands::Key => {
            println!("{}", idempotency_gateway::IdempotencyKey::generate());
        }
        Commands::Send {
            method,
            url,
            data,
            key,
            headers,
        } => {
            let method = Method::from_bytes(method.to_uppercase().as_bytes())?;
            let mut builder = client.request(method, &url);

            for raw in &headers {
                let (name, value) = raw
                    .split_once(':')
                    .ok_or_else(|| format!("header `{raw}` is not in `Name: value` form"))?;
                builder = builder.header(name.trim(), value.trim());
            }
            if let Some(key) = key {
                builder = builder.header(header.as_str(), key);
            }
            if let Some(data) = data {
                builder = builder.body(data);
            }

            let sent = client.execute(builder.build()?).await?;
            let status = sent.response.status();

            match &sent.key {
                Some(key) => eprintln!("{header}: {key}"),
                None => eprintln!("(method not eligible, no idempotency key sent)"),
            }
            eprintln!("attempts: {}", sent.attempts);
            eprintln!("status: {status}");
            println!("{}", sent.response.text().await?);

            if !status.is_success() {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
