use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "gate-cli")]
#[command(about = "Management CLI for the inference gate", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8081")]
    #[arg(env = "GATE_ADMIN_URL")]
    url: String,

    #[arg(short, long, env = "GATE_ADMIN_KEY")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check gate status and store health
    Status,
    /// List circuit breakers and their state
    Breakers,
    /// Close a breaker and clear its failure history
    Reset { dependency: String },
    /// Trip a breaker immediately
    Open { dependency: String },
    /// Show a tenant's spend for the current period
    Budget { tenant: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
    );
    let client = reqwest::Client::builder().default_headers(headers).build()?;

    let base = cli.url.trim_end_matches('/');
    let request = match &cli.command {
        Commands::Status => client.get(format!("{base}/admin/status")),
        Commands::Breakers => client.get(format!("{base}/admin/breakers")),
        Commands::Reset { dependency } => {
            client.post(format!("{base}/admin/breakers/{dependency}/reset"))
        }
        Commands::Open { dependency } => {
            client.post(format!("{base}/admin/breakers/{dependency}/open"))
        }
        Commands::Budget { tenant } => client.get(format!("{base}/admin/budget/{tenant}")),
    };

    print_response(request.send().await?).await
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

    if status == reqwest::StatusCode::NO_CONTENT {
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
