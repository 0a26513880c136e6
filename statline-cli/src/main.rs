//! statline: push downloaded CAMT.053 statements into Odoo.
//!
//! A separate job fetches the statement files from the bank; this binary
//! only triages a directory of them and feeds the new ones to Odoo's
//! statement-import model over XML-RPC.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use statline_odoo::{OdooClient, OdooLedger};
use tracing::{debug, error};

mod report;
mod workflow;

#[derive(Parser, Debug)]
#[command(name = "statline", version, about = "Import CAMT.053 bank statements into Odoo")]
struct Cli {
    /// Directory containing downloaded CAMT.053 files
    directory: PathBuf,

    /// Odoo instance URL, e.g. https://odoo.example.com
    #[arg(long, required_unless_present = "blank")]
    odoo_url: Option<String>,

    /// Odoo database name
    #[arg(long, required_unless_present = "blank")]
    db: Option<String>,

    /// Odoo login
    #[arg(long, required_unless_present = "blank")]
    username: Option<String>,

    /// Odoo password or API key
    #[arg(long, required_unless_present = "blank")]
    password: Option<String>,

    /// Validate the Odoo credentials and exit without touching any file
    #[arg(long)]
    test_connection: bool,

    /// Only report blank statements; needs no Odoo connection
    #[arg(long)]
    blank: bool,

    /// Verbose logging
    #[arg(long)]
    debug: bool,

    /// Print the batch report as JSON instead of a one-line summary
    #[arg(long)]
    json: bool,
}

fn init_logging(debug_mode: bool) {
    let default = if debug_mode { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| default.to_string()))
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.debug);

    if cli.blank {
        debug!("blank triage only; skipping Odoo connection");
        let blank = workflow::find_blank_statements(&cli.directory)?;
        for name in &blank {
            println!("Blank file detected: {name}");
        }
        if blank.is_empty() {
            println!("No blank files found.");
        }
        return Ok(());
    }

    // clap guarantees these are present when --blank is absent
    let url = cli.odoo_url.as_deref().context("--odoo-url is required")?;
    let db = cli.db.as_deref().context("--db is required")?;
    let username = cli.username.as_deref().context("--username is required")?;
    let password = cli.password.as_deref().context("--password is required")?;
    let client = OdooClient::new(url, db, username, password);

    // One authentication round gates the whole run; no file is touched when
    // it fails.
    let session = match client.authenticate().await {
        Ok(session) => {
            println!("Connection successful: user id {}", session.uid);
            session
        }
        Err(e) => {
            error!("Odoo authentication failed: {e}");
            bail!("failed to connect to Odoo: {e}");
        }
    };

    if cli.test_connection {
        return Ok(());
    }

    let ledger = OdooLedger::new(client, session);
    let report = workflow::import_directory(&cli.directory, &ledger).await?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", report.summary());
    }

    if report.failed() > 0 {
        std::process::exit(1);
    }
    Ok(())
}
