use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "workgate-cli")]
#[command(about = "Operator CLI for a running workgate instance", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    /// Correlation id to send as X-Request-Id.
    #[arg(short = 't', long)]
    tx_id: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Liveness check
    Health,
    /// Readiness check
    Ready,
    /// Dump the metrics exposition
    Metrics,
    /// Round-trip through the pipeline
    Ping,
    /// Echo a message through the primary worker pool
    Echo {
        message: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    if let Some(tx_id) = &cli.tx_id {
        headers.insert("x-request-id", HeaderValue::from_str(tx_id)?);
    }

    match cli.command {
        Commands::Health => {
            let res = client.get(format!("{}/healthz", cli.url)).headers(headers).send().await?;
            print_envelope(res).await?;
        }
        Commands::Ready => {
            let res = client.get(format!("{}/readyz", cli.url)).headers(headers).send().await?;
            print_envelope(res).await?;
        }
        Commands::Metrics => {
            let res = client.get(format!("{}/metrics", cli.url)).headers(headers).send().await?;
            let status = res.status();
            let text = res.text().await?;
            if !status.is_success() {
                eprintln!("Error: metrics endpoint returned status {}", status);
            }
            println!("{}", text);
        }
        Commands::Ping => {
            let res = client.get(format!("{}/api/v1/ping", cli.url)).headers(headers).send().await?;
            print_envelope(res).await?;
        }
        Commands::Echo { message } => {
            let res = client
                .post(format!("{}/api/v1/echo", cli.url))
                .headers(headers)
                .json(&json!({ "message": message }))
                .send()
                .await?;
            print_envelope(res).await?;
        }
    }

    Ok(())
}

async fn print_envelope(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;
    match serde_json::from_str::<Value>(&text) {
        Ok(json) => {
            if !status.is_success() {
                eprintln!("Error: server returned status {}", status);
            }
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        Err(_) => {
            eprintln!("Error: server returned status {}", status);
            eprintln!("Response: {}", text);
        }
    }
    Ok(())
}
