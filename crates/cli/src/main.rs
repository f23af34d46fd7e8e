//! carddock CLI - Command-line interface for the carddock daemon

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::PathBuf;
use tabled::{Table, Tabled};

const DEFAULT_RPC_URL: &str = "http://127.0.0.1:9530";

#[derive(Parser)]
#[command(name = "carddock")]
#[command(about = "Contact import/export client for the carddock daemon", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// RPC server URL
    #[arg(long, env = "CARDDOCK_RPC_URL", default_value = DEFAULT_RPC_URL)]
    rpc_url: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Import vCard files
    Import {
        /// Files to import (read by the daemon)
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Send file content inline instead of a path
        #[arg(long)]
        inline: bool,

        /// Format version: auto, 2.1 or 3.0
        #[arg(short = 'v', long = "version", default_value = "auto")]
        vcard_version: String,

        /// Source charset (utf-8 or iso-8859-1)
        #[arg(long)]
        charset: Option<String>,

        /// Target account name (requires --account-type)
        #[arg(long, requires = "account_type")]
        account_name: Option<String>,

        /// Target account type
        #[arg(long, requires = "account_name")]
        account_type: Option<String>,
    },

    /// Export every stored contact
    Export {
        /// Destination path (default: next free name in the export directory)
        destination: Option<String>,

        /// Output format: v21 or v30
        #[arg(short, long)]
        format: Option<String>,
    },

    /// Cancel a job
    Cancel {
        /// Job ID
        job_id: u64,
    },

    /// Show job status
    Status {
        /// Job ID (default: every known job)
        job_id: Option<u64>,
    },

    /// Show the path the next automatic export would use
    Destination,
}

#[derive(Serialize)]
struct JsonRpcRequest {
    jsonrpc: String,
    method: String,
    params: serde_json::Value,
    id: u64,
}

#[derive(Deserialize)]
struct JsonRpcResponse {
    #[allow(dead_code)]
    jsonrpc: String,
    #[allow(dead_code)]
    id: u64,
    result: Option<serde_json::Value>,
    error: Option<JsonRpcError>,
}

#[derive(Deserialize)]
struct JsonRpcError {
    code: i32,
    message: String,
}

#[derive(Deserialize, Tabled)]
struct SubmitResult {
    job_id: u64,
    #[serde(alias = "source", alias = "destination")]
    target: String,
}

#[derive(Deserialize, Tabled)]
struct JobRow {
    job_id: u64,
    kind: String,
    label: String,
    state: String,
    current: u64,
    total: u64,
    #[serde(default)]
    #[tabled(display_with = "display_error")]
    error_message: Option<String>,
}

fn display_error(error: &Option<String>) -> String {
    error.clone().unwrap_or_default()
}

fn version_param(version: &str) -> Result<&'static str> {
    match version.to_ascii_lowercase().as_str() {
        "auto" => Ok("auto"),
        "2.1" | "v21" => Ok("2.1"),
        "3.0" | "v30" => Ok("3.0"),
        other => anyhow::bail!("Unknown version {:?} (expected auto, 2.1 or 3.0)", other),
    }
}

fn format_param(format: &str) -> Result<&'static str> {
    match format.to_ascii_lowercase().as_str() {
        "v21" | "2.1" | "v21_generic" => Ok("v21_generic"),
        "v30" | "3.0" | "v30_generic" => Ok("v30_generic"),
        other => anyhow::bail!("Unknown format {:?} (expected v21 or v30)", other),
    }
}

async fn call_rpc(url: &str, method: &str, params: serde_json::Value) -> Result<serde_json::Value> {
    let request = JsonRpcRequest {
        jsonrpc: "2.0".to_string(),
        method: method.to_string(),
        params,
        id: 1,
    };

    let client = reqwest::Client::new();
    let response: JsonRpcResponse = client
        .post(url)
        .json(&request)
        .send()
        .await
        .context("Failed to connect to daemon")?
        .json()
        .await
        .context("Failed to parse response")?;

    if let Some(error) = response.error {
        anyhow::bail!("RPC error ({}): {}", error.code, error.message);
    }

    response
        .result
        .ok_or_else(|| anyhow::anyhow!("No result in response"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Import {
            files,
            inline,
            vcard_version,
            charset,
            account_name,
            account_type,
        } => {
            let version = version_param(&vcard_version)?;
            let mut submitted = Vec::with_capacity(files.len());

            for file in &files {
                let mut params = json!({
                    "version": version,
                    "charset": charset,
                    "account_name": account_name,
                    "account_type": account_type,
                });
                if inline {
                    let content = std::fs::read_to_string(file)
                        .with_context(|| format!("Failed to read {}", file.display()))?;
                    params["content"] = json!(content);
                    params["display_name"] = json!(file.display().to_string());
                } else {
                    let path = std::fs::canonicalize(file)
                        .with_context(|| format!("Failed to resolve {}", file.display()))?;
                    params["path"] = json!(path.display().to_string());
                }

                let result = call_rpc(&cli.rpc_url, "import.submit.v1", params).await?;
                let mut row: SubmitResult = serde_json::from_value(result)?;
                if inline {
                    row.target = file.display().to_string();
                }
                submitted.push(row);
            }

            println!("{}", "✓ Import queued".green().bold());
            println!();
            println!("{}", Table::new(submitted));
        }

        Commands::Export {
            destination,
            format,
        } => {
            let format = format.as_deref().map(format_param).transpose()?;
            let params = json!({
                "destination": destination,
                "format": format,
            });

            let result = call_rpc(&cli.rpc_url, "export.submit.v1", params).await?;
            let row: SubmitResult = serde_json::from_value(result)?;

            println!("{}", "✓ Export queued".green().bold());
            println!();
            println!("{}", Table::new(vec![row]));
        }

        Commands::Cancel { job_id } => {
            let result = call_rpc(&cli.rpc_url, "job.cancel.v1", json!({ "job_id": job_id })).await?;

            if result["canceled"].as_bool().unwrap_or(false) {
                println!("{}", format!("✓ Job {} canceled", job_id).green().bold());
            } else {
                println!(
                    "{}",
                    format!("Job {} already finished or canceled", job_id).yellow()
                );
            }
        }

        Commands::Status { job_id } => {
            let result = call_rpc(&cli.rpc_url, "job.status.v1", json!({ "job_id": job_id })).await?;
            let rows: Vec<JobRow> = serde_json::from_value(result["jobs"].clone())?;

            if rows.is_empty() {
                println!("{}", "No jobs".yellow());
            } else {
                println!("{}", Table::new(rows));
            }
        }

        Commands::Destination => {
            let result = call_rpc(&cli.rpc_url, "export.destination.v1", json!({})).await?;
            let destination = result["destination"].as_str().unwrap_or_default();
            println!("{} {}", "Next export:".bold(), destination);
        }
    }

    Ok(())
}
