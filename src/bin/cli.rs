use anyhow::Context;
use clap::{Parser, Subcommand};
use mcp_registry::{
    client::RegistryClient,
    models::{HttpMethod, RegisterServerRequest, SearchRequest, TransportKind},
};
use serde::Serialize;

#[derive(Parser)]
#[command(name = "registry-cli")]
#[command(about = "CLI tool for talking to an MCP registry", long_about = None)]
struct Cli {
    /// Base URL of the registry
    #[arg(long, env = "REGISTRY_URL", default_value = "http://127.0.0.1:8080")]
    registry_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that the registry is up
    Health,

    /// Register (or re-register) a tool server
    Register {
        /// Display name
        #[arg(short, long)]
        name: String,

        /// What the server offers
        #[arg(short, long)]
        description: String,

        /// Base URL of the server
        #[arg(short, long)]
        url: String,

        /// Stable id; generated by the registry when omitted
        #[arg(long)]
        id: Option<String>,

        /// Keyword tag, repeatable
        #[arg(short, long = "tag")]
        tags: Vec<String>,

        /// Introspection transport: sse or http
        #[arg(long, default_value = "sse", value_parser = parse_transport)]
        transport: TransportKind,

        /// Tool listing sub-path
        #[arg(long)]
        list_tools_endpoint: Option<String>,

        /// Preferred listing method: POST or GET
        #[arg(long, value_parser = parse_method)]
        list_method: Option<HttpMethod>,
    },

    /// Refresh a server's heartbeat
    Heartbeat {
        /// Server id
        server_id: String,
    },

    /// Rank tools matching a query
    Search {
        query: String,

        /// Number of results (1-50)
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
    },

    /// Find the single best server for a query
    Find { query: String },

    /// List every registered server
    List,

    /// Show one server record
    Show {
        /// Server id
        id: String,
    },
}

fn parse_transport(value: &str) -> Result<TransportKind, String> {
    serde_json::from_value(serde_json::Value::String(value.to_ascii_lowercase()))
        .map_err(|_| format!("unknown transport '{}', expected sse or http", value))
}

fn parse_method(value: &str) -> Result<HttpMethod, String> {
    serde_json::from_value(serde_json::Value::String(value.to_ascii_uppercase()))
        .map_err(|_| format!("unknown method '{}', expected POST or GET", value))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Parse CLI arguments
    let cli = Cli::parse();

    let client = RegistryClient::new(&cli.registry_url)
        .with_context(|| format!("cannot use registry URL {}", cli.registry_url))?;

    match cli.command {
        Commands::Health => match client.health().await {
            Ok(status) => print_json(&status)?,
            Err(err) => {
                eprintln!("❌ Registry is not healthy: {}", err);
                std::process::exit(1);
            }
        },

        Commands::Register {
            name,
            description,
            url,
            id,
            tags,
            transport,
            list_tools_endpoint,
            list_method,
        } => {
            let mut request = RegisterServerRequest::new(name, description, url);
            request.id = id;
            request.tags = tags;
            request.transport = transport;
            request.list_tools_endpoint = list_tools_endpoint;
            request.list_tools_endpoint_method = list_method;

            match client.register(&request).await {
                Ok(receipt) => {
                    eprintln!("✅ Server registered with {} tools", receipt.tool_count);
                    print_json(&receipt)?;
                }
                Err(err) => {
                    eprintln!("❌ Failed to register server: {}", err);
                    std::process::exit(1);
                }
            }
        }

        Commands::Heartbeat { server_id } => match client.heartbeat(&server_id).await {
            Ok(receipt) => print_json(&receipt)?,
            Err(err) => {
                eprintln!("❌ Heartbeat failed: {}", err);
                std::process::exit(1);
            }
        },

        Commands::Search { query, top_k } => {
            let mut request = SearchRequest::new(query);
            request.top_k = top_k;

            match client.search_tools(&request).await {
                Ok(matches) => {
                    if matches.is_empty() {
                        eprintln!("No matching tools.");
                    }
                    print_json(&matches)?;
                }
                Err(err) => {
                    eprintln!("❌ Search failed: {}", err);
                    std::process::exit(1);
                }
            }
        }

        Commands::Find { query } => match client.find_server(&SearchRequest::new(query)).await {
            Ok(found) => print_json(&found)?,
            Err(err) => {
                eprintln!("❌ No server found: {}", err);
                std::process::exit(1);
            }
        },

        Commands::List => match client.list_servers().await {
            Ok(servers) => print_json(&servers)?,
            Err(err) => {
                eprintln!("❌ Failed to list servers: {}", err);
                std::process::exit(1);
            }
        },

        Commands::Show { id } => match client.get_server(&id).await {
            Ok(server) => print_json(&server)?,
            Err(err) => {
                eprintln!("❌ Failed to fetch server '{}': {}", id, err);
                std::process::exit(1);
            }
        },
    }

    Ok(())
}
