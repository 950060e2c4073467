use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Method;
use serde_json::Value;

#[derive(Parser)]
#[command(name = "breaker-cli")]
#[command(about = "Management CLI for the breaker-guard sidecar", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8081")]
    url: String,

    #[arg(short, long, env = "BREAKER_GUARD_API_KEY", default_value = "CHANGE_ME_IN_PRODUCTION")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check sidecar status
    Status,
    /// List every circuit with its state and counters
    Circuits,
    /// Show one circuit
    Circuit { name: String },
    /// Force a circuit closed
    Reset { name: String },
    /// Forget a circuit and stop its health checks
    Remove { name: String },
    /// Fleet-wide aggregate metrics
    Metrics,
    /// Probe every circuit with a health check target now
    Check,
}

impl Commands {
    fn request(&self) -> (Method, String) {
        match self {
            Commands::Status => (Method::GET, "/admin/status".to_string()),
            Commands::Circuits => (Method::GET, "/admin/circuits".to_string()),
            Commands::Circuit { name } => (Method::GET, format!("/admin/circuits/{name}")),
            Commands::Reset { name } => (Method::POST, format!("/admin/circuits/{name}/reset")),
            Commands::Remove { name } => (Method::DELETE, format!("/admin/circuits/{name}")),
            Commands::Metrics => (Method::GET, "/admin/metrics".to_string()),
            Commands::Check => (Method::POST, "/admin/health/check".to_string()),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
    );

    let (method, path) = cli.command.request();
    let res = client
        .request(method, format!("{}{}", cli.url.trim_end_matches('/'), path))
        .headers(headers)
        .send()
        .await?;
    print_response(res).await?;

    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        std::process::exit(1);
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
