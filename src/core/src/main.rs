use std::error::Error;
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use log::{error, info};
use promptlog::configuration::config::Config;
use promptlog::controller::controller_handler::Controller;
use promptlog::storage::types::SessionSummary;

#[derive(Parser)]
#[command(name = "promptlog")]
#[command(version)]
#[command(about = "Records LLM completion traffic and streams new sessions live")]
struct Args {
    /// TOML configuration file
    #[arg(short, long, global = true, env = "PROMPTLOG_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the recording proxy
    Start {
        /// Listen address, e.g. 127.0.0.1:8080
        #[arg(long)]
        addr: Option<String>,
        /// Upstream base URL
        #[arg(long)]
        backend: Option<String>,
    },
    /// Run the control server (session API and live event stream)
    Serve {
        /// Listen address, e.g. 127.0.0.1:5140
        #[arg(long)]
        addr: Option<String>,
    },
    /// List recorded sessions, newest first
    #[command(
        long_about = "List recorded sessions, newest first.\n\nThe --filter flag takes one clause such as 'request.model=gpt-4', \
                      'origin=modelkit', 'metadata.tags~qa', 'metadata.published!=null', \
                      'metadata.timestamp>2025-07-01T00:00:00Z' or 'metadata.latency_ms<1000'."
    )]
    List {
        /// Query expression using = != ~ < >
        #[arg(long, default_value = "")]
        filter: String,
        /// Maximum number of results
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        output: OutputFormat,
    },
    /// Show one session in full
    View {
        id: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .format_target(false)
        .init();

    let args = Args::parse();
    if let Err(e) = run(args).await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), Box<dyn Error>> {
    let mut config = match &args.config {
        Some(path) => {
            info!("Importing configuration from {}", path.display());
            Config::from_file(path)?
        }
        None => Config::default(),
    };

    match args.command {
        Command::Start { addr, backend } => {
            if let Some(addr) = addr {
                config.proxy.bind_address = addr;
            }
            if let Some(backend) = backend {
                config.proxy.upstream_url = backend;
            }
            Controller::new(config)?.run_proxy().await?;
        }
        Command::Serve { addr } => {
            if let Some(addr) = addr {
                config.control.bind_address = addr;
            }
            Controller::new(config)?.run_control_server().await?;
        }
        Command::List { filter, limit, output } => {
            let summaries = Controller::new(config)?.list_sessions(&filter, limit.filter(|l| *l > 0))?;
            match output {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summaries)?),
                OutputFormat::Table => print_table(&summaries),
            }
        }
        Command::View { id } => match Controller::new(config)?.view_session(&id)? {
            Some(session) => println!("{}", serde_json::to_string_pretty(&session)?),
            None => return Err(format!("session '{}' not found", id).into()),
        },
    }
    Ok(())
}

fn print_table(summaries: &[SessionSummary]) {
    let rows: Vec<Vec<String>> = summaries
        .iter()
        .map(|s| {
            vec![
                s.id.clone(),
                s.model.clone(),
                s.origin.to_string(),
                s.tokens.to_string(),
                format!("{}ms", s.latency_ms),
                s.tags.join(", "),
                s.published.clone().unwrap_or_default(),
            ]
        })
        .collect();
    let header: Vec<String> = ["ID", "Model", "Origin", "Tokens", "Latency", "Tags", "Published"]
        .iter()
        .map(|h| h.to_string())
        .collect();
    let rule: Vec<String> = header.iter().map(|h| "-".repeat(h.len())).collect();

    let mut widths: Vec<usize> = header.iter().map(String::len).collect();
    for row in &rows {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.len());
        }
    }

    print_row(&header, &widths);
    print_row(&rule, &widths);
    for row in &rows {
        print_row(row, &widths);
    }
}

fn print_row(cells: &[String], widths: &[usize]) {
    let padded: Vec<String> = cells
        .iter()
        .zip(widths)
        .map(|(cell, w)| format!("{:<width$}", cell, width = *w))
        .collect();
    println!("{}", padded.join("  ").trim_end());
}
