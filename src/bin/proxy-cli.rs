use clap::{Parser, Subcommand};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "proxy-cli")]
#[command(about = "Management CLI for the load balancer admin interface", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:9000")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show every backend with liveness and in-flight requests
    Status,
    /// Add a backend (it starts dead until probed)
    Add { backend: String },
    /// Remove a backend
    Remove { backend: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let endpoint = format!("{}/backends", cli.url.trim_end_matches('/'));

    let res = match cli.command {
        Commands::Status => {
            client
                .get(format!("{}/status", cli.url.trim_end_matches('/')))
                .send()
                .await?
        }
        Commands::Add { backend } => {
            client
                .post(&endpoint)
                .json(&json!({ "url": backend }))
                .send()
                .await?
        }
        Commands::Remove { backend } => {
            client
                .delete(&endpoint)
                .json(&json!({ "url": backend }))
                .send()
                .await?
        }
    };

    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let body: Value = res.json().await.unwrap_or(Value::Null);
    if !status.is_success() {
        eprintln!("Error: admin interface returned {}", status);
        if let Some(msg) = body.get("error").and_then(Value::as_str) {
            eprintln!("{}", msg);
        }
        std::process::exit(1);
    }

    println!("{}", serde_json::to_string_pretty(&body)?);
    Ok(())
}
