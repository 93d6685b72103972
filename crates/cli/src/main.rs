use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use serde::Deserialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use citetrace_client::{AttachmentRef, VerifyClient, VerifyRequest};
use citetrace_core::{
    classify, compress_prompt_ids, decompress_prompt_ids, replace_citations, scan, visible_text,
    PrefixMap,
};

const VERSION: &str = env!("CARGO_PKG_VERSION");

const DEFAULT_CONFIG: &str = "citetrace.toml";

#[derive(Parser, Debug)]
#[command(name = "citetrace", version = VERSION, about = "Citation parsing and verification CLI")]
struct Cli {
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Deserialize, Default)]
struct AppConfig {
    #[serde(default)]
    defaults: ConfigDefaults,
}

#[derive(Debug, Deserialize, Default)]
struct ConfigDefaults {
    map_out: Option<PathBuf>,
    attachments: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Scan a text file for citation tags and print what was found.
    Parse {
        input: PathBuf,
        #[arg(long = "json-out")]
        json_out: Option<PathBuf>,
        #[arg(long, action = ArgAction::SetTrue)]
        quiet: bool,
    },
    /// Print the user-visible text with citation markup removed.
    Strip {
        input: PathBuf,
        #[arg(short = 'o', long = "out")]
        out: Option<PathBuf>,
    },
    /// Shorten attachment ids inside citation tags before a prompt round trip.
    Compress {
        input: PathBuf,
        #[arg(long = "id", required = true)]
        ids: Vec<String>,
        #[arg(short = 'o', long = "out")]
        out: Option<PathBuf>,
        #[arg(long = "map-out")]
        map_out: Option<PathBuf>,
    },
    /// Restore full attachment ids using a saved prefix map.
    Decompress {
        input: PathBuf,
        #[arg(long = "map")]
        map: PathBuf,
        #[arg(short = 'o', long = "out")]
        out: Option<PathBuf>,
    },
    /// Parse a text file and check its citations against the hosted API.
    Verify {
        input: PathBuf,
        #[arg(long = "attachments")]
        attachments: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG));
    let file_config = load_config(&config_path)?;
    match cli.command {
        Commands::Parse {
            input,
            json_out,
            quiet,
        } => {
            let text = read_input(&input)?;
            let outcome = scan(&text);
            info!(
                citations = outcome.citations.len(),
                "parsed {}",
                input.display()
            );
            if let Some(path) = json_out {
                let json = serde_json::to_string_pretty(&outcome.citations)?;
                fs::write(&path, json)
                    .with_context(|| format!("failed to write {}", path.display()))?;
            }
            if !quiet {
                let (rendered, by_key) = replace_citations(&text, |citation| {
                    format!("[{}]", citation.citation_number)
                });
                println!("{rendered}");
                for (key, citation) in &by_key {
                    println!(
                        "[{}] key={} attachment={} page={}",
                        citation.citation_number,
                        key,
                        citation.attachment_id.as_deref().unwrap_or("-"),
                        citation
                            .page_number
                            .map(|p| p.to_string())
                            .unwrap_or_else(|| "-".to_string()),
                    );
                }
            }
        }
        Commands::Strip { input, out } => {
            let text = read_input(&input)?;
            write_output(out.as_deref(), &visible_text(&text))?;
        }
        Commands::Compress {
            input,
            ids,
            out,
            map_out,
        } => {
            let text = read_input(&input)?;
            let compressed = compress_prompt_ids(&text, &ids)?;
            write_output(out.as_deref(), &compressed.text)?;
            let map_out = map_out
                .or_else(|| file_config.defaults.map_out.clone())
                .unwrap_or_else(|| PathBuf::from("prefix_map.json"));
            let map_json = serde_json::to_string_pretty(&compressed.prefix_map)?;
            fs::write(&map_out, map_json)
                .with_context(|| format!("failed to write {}", map_out.display()))?;
            info!(
                ids = compressed.prefix_map.len(),
                "compressed {}, map written to {}",
                input.display(),
                map_out.display()
            );
        }
        Commands::Decompress { input, map, out } => {
            let text = read_input(&input)?;
            let map_raw = fs::read_to_string(&map)
                .with_context(|| format!("failed to read map {}", map.display()))?;
            let prefix_map: PrefixMap =
                serde_json::from_str(&map_raw).context("invalid prefix map")?;
            let restored = decompress_prompt_ids(&text, &prefix_map)?;
            write_output(out.as_deref(), &restored)?;
        }
        Commands::Verify { input, attachments } => {
            let text = read_input(&input)?;
            let outcome = scan(&text);
            if outcome.by_key.is_empty() {
                return Err(anyhow!("no citations found in {}", input.display()));
            }
            let attachments = attachments.or_else(|| file_config.defaults.attachments.clone());
            let attachments = load_attachments(attachments.as_deref())?;
            let client = VerifyClient::from_env()?;
            let request = VerifyRequest {
                attachments,
                citations: outcome.by_key.clone(),
            };
            let verifications = client.verify_blocking(&request)?;
            for (key, citation) in &outcome.by_key {
                let status = classify(verifications.get(key));
                let label = if status.is_pending {
                    "pending"
                } else if status.is_miss {
                    "miss"
                } else if status.is_partial_match {
                    "partial"
                } else if status.is_verified {
                    "verified"
                } else {
                    "unknown"
                };
                println!("[{}] {} {}", citation.citation_number, key, label);
            }
        }
    }
    Ok(())
}

fn read_input(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn write_output(out: Option<&Path>, text: &str) -> Result<()> {
    match out {
        Some(path) => fs::write(path, text)
            .with_context(|| format!("failed to write {}", path.display())),
        None => {
            println!("{text}");
            Ok(())
        }
    }
}

fn load_attachments(path: Option<&Path>) -> Result<Vec<AttachmentRef>> {
    match path {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("failed to read attachments {}", path.display()))?;
            serde_json::from_str(&raw).context("invalid attachments manifest")
        }
        None => Ok(Vec::new()),
    }
}

fn load_config(path: &Path) -> Result<AppConfig> {
    if !path.exists() {
        return Ok(AppConfig::default());
    }
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    toml::from_str(&contents).map_err(|e| anyhow!("invalid config {}: {e}", path.display()))
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
