//! Mock API workbench CLI
//!
//! Manages a file-backed catalog of mock projects and resolves requests
//! against it. The catalog lives in a single JSON document; every command
//! loads it, applies its change, and persists it back.

use anyhow::{bail, Context};
use castlemock_lite::catalog::persistence::JsonFilePersistence;
use castlemock_lite::catalog::ProjectStatus;
use castlemock_lite::{CatalogStore, RequestDescriptor, Workbench};
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

/// Mock REST API workbench
#[derive(Parser, Debug)]
#[command(name = "castlemock-lite")]
#[command(author, version, about = "Define mock REST APIs and resolve requests against them")]
struct Args {
    /// Path to the catalog file
    #[arg(short, long, default_value = "castlemock.json", env = "CASTLEMOCK_STORE")]
    store: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List all projects with their endpoints
    Projects,
    /// Create an empty project
    Create {
        name: String,
        #[arg(short, long, default_value = "")]
        description: String,
    },
    /// Import an OpenAPI document (JSON or YAML) into a project
    Import {
        project_id: String,
        /// Path to the OpenAPI document
        file: PathBuf,
    },
    /// Resolve a request against a project and print the outcome
    Send {
        project_id: String,
        method: String,
        path: String,
        /// Request body
        #[arg(short, long)]
        body: Option<String>,
        /// Request header as `Name: value`, repeatable
        #[arg(short = 'H', long = "header")]
        headers: Vec<String>,
    },
    /// Mark a project as running
    Start { project_id: String },
    /// Mark a project as stopped
    Stop { project_id: String },
    /// Export a project as a backup document to stdout
    Export { project_id: String },
    /// Restore a project from a backup document
    Restore {
        /// Path to the backup file
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let store = Arc::new(CatalogStore::open(Box::new(JsonFilePersistence::new(
        &args.store,
    )))?);

    match args.command {
        Command::Projects => {
            for project in store.projects() {
                println!(
                    "{}  {}  [{}]  {}",
                    project.id,
                    project.name,
                    match project.status {
                        ProjectStatus::Running => "running",
                        ProjectStatus::Stopped => "stopped",
                    },
                    project.base_url
                );
                for endpoint in store.endpoints(&project.id) {
                    println!("    {} {}  {}", endpoint.method, endpoint.path, endpoint.name);
                }
            }
        }
        Command::Create { name, description } => {
            let project = store.create_project(&name, &description)?;
            println!("{}", project.id);
        }
        Command::Import { project_id, file } => {
            let raw = std::fs::read_to_string(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            let document = parse_document(&raw)?;
            let bench = Workbench::new(Arc::clone(&store));
            let result = bench.import_document(&project_id, document).await?;
            println!("imported {} endpoint(s)", result.endpoints.len());
        }
        Command::Send {
            project_id,
            method,
            path,
            body,
            headers,
        } => {
            let bench = Workbench::new(Arc::clone(&store));
            store.subscribe_logs(|entry| {
                println!(
                    "{} {} {} -> {} ({})",
                    entry.method,
                    entry.path,
                    entry.request_body.as_deref().unwrap_or("-"),
                    entry.status,
                    entry.response_name.as_deref().unwrap_or("-")
                );
            });
            let request = RequestDescriptor {
                project_id,
                method: method.to_uppercase(),
                path,
                body,
                headers: parse_headers(&headers)?,
            };
            match bench.send_request(request).await? {
                Some(result) => {
                    println!("strategy: {}", result.matched_strategy);
                    println!("{}", result.response.body);
                }
                None => println!("no match"),
            }
        }
        Command::Start { project_id } => {
            store.update_project_status(&project_id, ProjectStatus::Running)?;
        }
        Command::Stop { project_id } => {
            store.update_project_status(&project_id, ProjectStatus::Stopped)?;
        }
        Command::Export { project_id } => {
            let bench = Workbench::new(Arc::clone(&store));
            let backup = bench.export_project(&project_id)?;
            println!("{}", serde_json::to_string_pretty(&backup)?);
        }
        Command::Restore { file } => {
            let raw = std::fs::read_to_string(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            let document: Value = serde_json::from_str(&raw)?;
            let bench = Workbench::new(Arc::clone(&store));
            let project = bench.restore_backup(&document)?;
            println!("{}", project.id);
        }
    }

    Ok(())
}

/// OpenAPI documents come as JSON or YAML; try JSON first.
fn parse_document(raw: &str) -> anyhow::Result<Value> {
    match serde_json::from_str(raw) {
        Ok(value) => Ok(value),
        Err(_) => serde_yaml::from_str(raw).context("document is neither valid JSON nor YAML"),
    }
}

fn parse_headers(raw: &[String]) -> anyhow::Result<Option<HashMap<String, String>>> {
    if raw.is_empty() {
        return Ok(None);
    }
    let mut headers = HashMap::new();
    for header in raw {
        let Some((name, value)) = header.split_once(':') else {
            bail!("malformed header {header:?}, expected `Name: value`");
        };
        headers.insert(name.trim().to_string(), value.trim().to_string());
    }
    Ok(Some(headers))
}
