//! Command-line client for a search cluster.
//!
//! ```text
//! search-transport --host localhost:9200 request GET /_cluster/health
//! search-transport --config transport.toml sniff
//! ```

use clap::{Parser, Subcommand};
use reqwest::Method;
use serde_json::Value;
use std::path::PathBuf;

use search_transport::config::{load_config, TransportConfig};
use search_transport::observability::init_logging;
use search_transport::{Request, Response, Transport};

#[derive(Parser)]
#[command(name = "search-transport")]
#[command(about = "Send requests to a search cluster with failover and sniffing", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Node address; repeat for several nodes (overrides the config's hosts)
    #[arg(long = "host")]
    hosts: Vec<String>,

    /// Sniff the cluster before running the command
    #[arg(long)]
    sniff_on_start: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Perform a single request
    Request {
        /// HTTP method, e.g. GET or PUT
        method: String,
        /// Path such as /_cluster/health
        path: String,
        /// JSON request body
        #[arg(short, long)]
        body: Option<String>,
        /// Query parameter as key=value; repeatable
        #[arg(short = 'p', long = "param")]
        params: Vec<String>,
    },
    /// Sniff the cluster and print the discovered nodes
    Sniff,
    /// Print the current connection pool
    Nodes,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => TransportConfig::default(),
    };
    if !cli.hosts.is_empty() {
        config.hosts = cli.hosts.clone();
    }
    if cli.sniff_on_start {
        config.sniff.on_start = true;
    }

    init_logging(&config.observability);

    let transport = Transport::connect(config).await?;

    match cli.command {
        Commands::Request {
            method,
            path,
            body,
            params,
        } => {
            let method = Method::from_bytes(method.to_uppercase().as_bytes())?;
            let mut request = Request::new(method, path);
            for param in params {
                let (key, value) = param
                    .split_once('=')
                    .ok_or_else(|| format!("invalid parameter '{}', expected key=value", param))?;
                request = request.param(key, value);
            }
            if let Some(body) = body {
                request = request.body(body);
            }
            let response = transport.perform_request(request).await?;
            print_response(&response)?;
        }
        Commands::Sniff => {
            let count = transport.sniff().await?;
            println!("Discovered {} node(s)", count);
            print_nodes(&transport);
        }
        Commands::Nodes => print_nodes(&transport),
    }

    transport.close().await;
    Ok(())
}

fn print_response(response: &Response) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("{} from {}", response.status, response.node);
    match response.json::<Value>() {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{}", response.text()),
    }
    Ok(())
}

fn print_nodes(transport: &Transport) {
    for conn in transport.connections() {
        let health = conn.health();
        println!(
            "{}\t{:?}\tfailures={}",
            conn.host().base_url(),
            health.state,
            health.consecutive_failures
        );
    }
}
