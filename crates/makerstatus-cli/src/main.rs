//! Command-line status reader for MakerBot printers.

use anyhow::{bail, Context, Result};
use clap::Parser;
use makerstatus_core::prelude::*;
use makerstatus_core::protocol::{
    find_makerbot_ports, list_ports, Link, PortInfo, DEFAULT_BAUD_RATE, DEFAULT_TIMEOUT_MS,
};
use serde::Serialize;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "makerstatus", version, about = "Read build and temperature status from a MakerBot printer")]
struct Cli {
    /// Serial port (defaults to the first MakerBot found)
    #[arg(short, long)]
    port: Option<String>,

    /// Baud rate
    #[arg(short, long, default_value_t = DEFAULT_BAUD_RATE)]
    baud: u32,

    /// Response timeout in milliseconds
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_MS)]
    timeout_ms: u64,

    /// Toolhead index
    #[arg(short, long, default_value_t = 0)]
    tool: u8,

    /// Print the status as JSON
    #[arg(long)]
    json: bool,

    /// List serial ports and exit
    #[arg(long)]
    list: bool,
}

/// Everything one status run reads from the printer
#[derive(Debug, Serialize)]
struct StatusReport {
    port: String,
    build_name: String,
    build_state: Option<BuildState>,
    state_label: &'static str,
    elapsed_hours: u8,
    elapsed_minutes: u8,
    tool: u8,
    temperature: u16,
    /// `None` when the firmware does not answer the target query
    target_temperature: Option<u16>,
}

impl StatusReport {
    fn render(&self) -> String {
        let name = if self.build_name.is_empty() {
            "(none)"
        } else {
            self.build_name.as_str()
        };
        let target = match self.target_temperature {
            Some(celsius) => format!("{celsius}°C"),
            None => "n/a".to_string(),
        };
        format!(
            "Printer:     {}\nBuild:       {}\nState:       {}\nElapsed:     {}h {:02}m\nTool {}:      {}°C / {}",
            self.port,
            name,
            self.state_label,
            self.elapsed_hours,
            self.elapsed_minutes,
            self.tool,
            self.temperature,
            target,
        )
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(Cli::parse()).await {
        eprintln!("makerstatus: {e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    if cli.list {
        print_ports(&list_ports());
        return Ok(());
    }

    let port_name = match cli.port {
        Some(port) => port,
        None => {
            let found = find_makerbot_ports();
            debug!(count = found.len(), "discovered MakerBot ports");
            match found.into_iter().next() {
                Some(port) => port.name,
                None => bail!("no MakerBot printer found; pass --port to choose one"),
            }
        }
    };

    let config = ConnectionConfig {
        port_name: port_name.clone(),
        baud_rate: cli.baud,
        timeout_ms: cli.timeout_ms,
    };
    let mut conn = Connection::new(config);
    conn.open()
        .with_context(|| format!("failed to open {port_name}"))?;

    let report = query_status(&mut conn, cli.tool).await;
    conn.close().await;
    let report = report?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", report.render());
    }
    Ok(())
}

async fn query_status<L: Link>(conn: &mut Connection<L>, tool: u8) -> Result<StatusReport> {
    let name = conn
        .get_build_name()
        .await
        .context("reading build name")?;
    let stats = conn
        .get_build_statistics()
        .await
        .context("reading build statistics")?;
    let temperature = conn
        .get_toolhead_temperature(tool)
        .await
        .context("reading toolhead temperature")?;
    let target = match conn.get_toolhead_target_temperature(tool).await {
        Ok(target) => Some(target.celsius),
        Err(e) if e.kind() == ErrorKind::Device => {
            debug!(error = %e, "target temperature unavailable");
            None
        }
        Err(e) => return Err(e).context("reading toolhead target temperature"),
    };

    info!(state = stats.state_label(), celsius = temperature.celsius, "status read");

    Ok(StatusReport {
        port: conn.config().port_name.clone(),
        build_name: name.name,
        build_state: stats.state,
        state_label: stats.state_label(),
        elapsed_hours: stats.hours,
        elapsed_minutes: stats.minutes,
        tool,
        temperature: temperature.celsius,
        target_temperature: target,
    })
}

fn print_ports(ports: &[PortInfo]) {
    if ports.is_empty() {
        println!("No serial ports found.");
        return;
    }
    for port in ports {
        let marker = if port.is_makerbot() { "*" } else { " " };
        let product = port.product.as_deref().unwrap_or("");
        match (port.vid, port.pid) {
            (Some(vid), Some(pid)) => {
                println!("{marker} {:<20} {vid:04x}:{pid:04x} {product}", port.name)
            }
            _ => println!("{marker} {}", port.name),
        }
    }
}
