//! cfmid - command-line client for the CFM-ID wrapper

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::io::Write;
use std::path::PathBuf;

const DEFAULT_URL: &str = "http://127.0.0.1:5001";

#[derive(Parser)]
#[command(name = "cfmid")]
#[command(about = "Client for the CFM-ID prediction wrapper", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Wrapper base URL
    #[arg(long, env = "CFMID_URL", default_value = DEFAULT_URL)]
    url: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Predict the MS/MS spectrum of a molecule
    Predict {
        /// Molecule in SMILES notation
        #[arg(short, long)]
        smiles: String,

        /// Probability threshold in (0, 1]; server default when omitted
        #[arg(short, long)]
        prob_thresh: Option<String>,

        /// Write the spectrum to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Check that the wrapper is up
    Health,
}

fn endpoint(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path)
}

fn form_fields(smiles: &str, prob_thresh: Option<&str>) -> Vec<(&'static str, String)> {
    let mut fields = vec![("smiles", smiles.to_string())];
    if let Some(thresh) = prob_thresh {
        fields.push(("prob_thresh", thresh.to_string()));
    }
    fields
}

async fn predict(
    client: &reqwest::Client,
    base: &str,
    smiles: &str,
    prob_thresh: Option<&str>,
    output: Option<PathBuf>,
) -> Result<()> {
    let mut response = client
        .post(endpoint(base, "predict"))
        .form(&form_fields(smiles, prob_thresh))
        .send()
        .await
        .context("Failed to connect to wrapper")?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        anyhow::bail!("Prediction rejected ({}): {}", status, body.trim());
    }

    let mut sink: Box<dyn Write> = match &output {
        Some(path) => Box::new(
            std::fs::File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?,
        ),
        None => Box::new(std::io::stdout().lock()),
    };

    // Chunks are written as they arrive so streaming mode shows progress
    while let Some(chunk) = response
        .chunk()
        .await
        .context("Connection dropped mid-spectrum")?
    {
        sink.write_all(&chunk)?;
    }
    sink.flush()?;

    if let Some(path) = output {
        eprintln!(
            "{}",
            format!("✓ Spectrum written to {}", path.display())
                .green()
                .bold()
        );
    }
    Ok(())
}

async fn health(client: &reqwest::Client, base: &str) -> Result<()> {
    match client.get(endpoint(base, "healthz")).send().await {
        Ok(response) if response.status().is_success() => {
            println!("  {} {}", "URL:".bold(), base);
            println!("  {} {}", "Status:".bold(), "ONLINE".green());
            Ok(())
        }
        Ok(response) => {
            println!("  {} {}", "URL:".bold(), base);
            println!("  {} {}", "Status:".bold(), "UNHEALTHY".red());
            anyhow::bail!("Health check returned {}", response.status())
        }
        Err(e) => {
            println!("  {} {}", "URL:".bold(), base);
            println!("  {} {}", "Status:".bold(), "OFFLINE".red());
            Err(e).context("Failed to connect to wrapper")
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    match cli.command {
        Commands::Predict {
            smiles,
            prob_thresh,
            output,
        } => predict(&client, &cli.url, &smiles, prob_thresh.as_deref(), output).await,
        Commands::Health => health(&client, &cli.url).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_endpoint_joins_paths() {
        assert_eq!(
            endpoint("http://localhost:5001/", "predict"),
            "http://localhost:5001/predict"
        );
        assert_eq!(
            endpoint("http://localhost:5001", "healthz"),
            "http://localhost:5001/healthz"
        );
    }

    #[test]
    fn test_form_fields_omit_missing_threshold() {
        assert_eq!(form_fields("CCO", None), vec![("smiles", "CCO".to_string())]);
        assert_eq!(
            form_fields("CCO", Some("0.01")),
            vec![
                ("smiles", "CCO".to_string()),
                ("prob_thresh", "0.01".to_string())
            ]
        );
    }

    #[test]
    fn test_predict_args() {
        let cli = Cli::try_parse_from([
            "cfmid",
            "--url",
            "http://wrapper:5001",
            "predict",
            "--smiles",
            "CCO",
            "--prob-thresh",
            "0.05",
        ])
        .unwrap();

        assert_eq!(cli.url, "http://wrapper:5001");
        match cli.command {
            Commands::Predict {
                smiles,
                prob_thresh,
                output,
            } => {
                assert_eq!(smiles, "CCO");
                assert_eq!(prob_thresh.as_deref(), Some("0.05"));
                assert!(output.is_none());
            }
            Commands::Health => panic!("expected predict"),
        }
    }
}
