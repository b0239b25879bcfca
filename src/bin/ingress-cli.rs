use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "ingress-cli")]
#[command(about = "Inspect the live configuration of an ingress-sync controller", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8081")]
    url: String,

    #[arg(short, long, env = "INGRESS_ADMIN_KEY")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show generation, content hash and reconciler state
    Status,
    /// Print the rendered configuration document
    Config,
    /// List every server block
    Servers,
    /// Show the server block for one host ("_" for the default)
    Server { host: String },
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

    let path = match &cli.command {
        Commands::Status => "/admin/status".to_string(),
        Commands::Config => "/admin/config".to_string(),
        Commands::Servers => "/admin/servers".to_string(),
        Commands::Server { host } => format!("/admin/servers/{}", host),
    };

    let res = client
        .get(format!("{}{}", cli.url.trim_end_matches('/'), path))
        .headers(headers)
        .send()
        .await?;

    match cli.command {
        Commands::Config => print_text(res).await,
        _ => print_json(res).await,
    }
}

async fn check(res: reqwest::Response) -> Result<Option<reqwest::Response>, Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        if let Ok(text) = res.text().await {
            if !text.is_empty() {
                eprintln!("Response: {}", text);
            }
        }
        return Ok(None);
    }
    Ok(Some(res))
}

async fn print_text(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(res) = check(res).await? {
        print!("{}", res.text().await?);
    }
    Ok(())
}

async fn print_json(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(res) = check(res).await? {
        let json: Value = res.json().await?;
        println!("{}", serde_json::to_string_pretty(&json)?);
    }
    Ok(())
}
