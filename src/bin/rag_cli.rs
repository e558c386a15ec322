//! Command-line client for a running instance of the functions.
//!
//! Posts a document to `process_document` or a question to `get_answer` and prints the JSON
//! response. Works against the local custom handler as well as a deployed Function App.
use std::{fs, path::PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use serde_json::{Value, json};

#[derive(Parser)]
#[command(
    name = "rag-cli",
    about = "Send documents and questions to the RAG functions"
)]
struct Cli {
    /// Base URL of the function host.
    #[arg(long, default_value = "http://127.0.0.1:7071")]
    base_url: String,
    /// Function key sent as `x-functions-key`.
    #[arg(long)]
    function_key: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Index the contents of a text file.
    Ingest {
        #[arg(long)]
        input: PathBuf,
    },
    /// Ask a question against the indexed documents.
    Ask {
        query: String,
        #[arg(long)]
        system_prompt: Option<String>,
    },
}

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

#[tokio::main]
async fn run() -> Result<()> {
    let cli = Cli::parse();
    let client = reqwest::Client::builder()
        .user_agent("rag-cli/0.1")
        .build()
        .context("failed to build HTTP client")?;
    let base_url = cli.base_url.trim_end_matches('/');

    let request = match cli.command {
        Command::Ingest { input } => {
            let content = fs::read_to_string(&input)
                .with_context(|| format!("failed to read {}", input.display()))?;
            client
                .post(format!("{base_url}/api/process_document"))
                .header("content-type", "text/plain; charset=utf-8")
                .body(content)
        }
        Command::Ask {
            query,
            system_prompt,
        } => {
            let mut body = json!({ "query": query });
            if let Some(prompt) = system_prompt {
                body["system_prompt"] = Value::String(prompt);
            }
            client
                .post(format!("{base_url}/api/get_answer"))
                .json(&body)
        }
    };

    let request = match cli.function_key {
        Some(key) => request.header("x-functions-key", key),
        None => request,
    };

    let response = request.send().await.context("request failed")?;
    let status = response.status();
    let text = response.text().await.context("failed to read response body")?;
    let rendered = match serde_json::from_str::<Value>(&text) {
        Ok(value) => serde_json::to_string_pretty(&value)?,
        Err(_) => text,
    };
    println!("{rendered}");

    if !status.is_success() {
        bail!("server returned {status}");
    }
    Ok(())
}
