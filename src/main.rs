//! CLI entry point for smtp-send.

use clap::{Parser, Subcommand};
use smtp_send::{
    run_batch, test_connection, BatchOptions, Credentials, JsonFields, PresetTable, Record,
};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "smtp-send")]
#[command(about = "Send a batch of emails over SMTP and optionally archive them")]
struct Cli {
    /// JSON file with SMTP credentials
    #[arg(short = 'c', long, global = true)]
    credentials: Option<PathBuf>,

    /// SMTP host
    #[arg(long, env = "SMTP_HOST", global = true)]
    host: Option<String>,

    /// SMTP port
    #[arg(long, env = "SMTP_PORT", global = true)]
    port: Option<u16>,

    /// Use implicit TLS (true) or STARTTLS when offered (false)
    #[arg(long, env = "SMTP_SECURE", global = true, value_name = "BOOL")]
    secure: Option<bool>,

    /// SMTP user
    #[arg(long, env = "SMTP_USER", global = true)]
    user: Option<String>,

    /// SMTP password
    #[arg(long, env = "SMTP_PASSWORD", global = true, hide_env_values = true)]
    password: Option<String>,

    /// Accept invalid TLS certificates
    #[arg(long, env = "SMTP_ALLOW_UNAUTHORIZED_CERTS", global = true, value_name = "BOOL")]
    allow_unauthorized_certs: Option<bool>,

    /// JSON file with extra provider presets, tried before the built-in ones
    #[arg(long, global = true)]
    presets: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Send one email per record
    Send {
        /// JSON array of records (`{"json": {...}, "binary": {...}}`)
        #[arg(short = 'i', long)]
        input: PathBuf,

        /// JSON object of default send fields, overridden by each record's json
        #[arg(short = 'f', long)]
        fields: Option<PathBuf>,

        /// Write the results here instead of stdout
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        /// Record failures in the results instead of aborting
        #[arg(long)]
        continue_on_fail: bool,
    },
    /// Check that the SMTP server accepts the credentials
    TestConnection,
}

impl Cli {
    fn credentials(&self) -> smtp_send::Result<Credentials> {
        let mut creds = match &self.credentials {
            Some(path) => Credentials::from_file(path)?,
            None => Credentials::default(),
        };
        if let Some(host) = &self.host {
            creds.host.clone_from(host);
        }
        if let Some(port) = self.port {
            creds.port = port;
        }
        if let Some(secure) = self.secure {
            creds.secure = secure;
        }
        if let Some(user) = &self.user {
            creds.user.clone_from(user);
        }
        if let Some(password) = &self.password {
            creds.password.clone_from(password);
        }
        if let Some(allow) = self.allow_unauthorized_certs {
            creds.allow_unauthorized_certs = allow;
        }
        Ok(creds)
    }

    fn presets(&self) -> smtp_send::Result<PresetTable> {
        let table = PresetTable::default();
        match &self.presets {
            Some(path) => Ok(table.with_overrides(PresetTable::load_overrides(path)?)),
            None => Ok(table),
        }
    }
}

fn read_json(path: &Path) -> std::io::Result<serde_json::Value> {
    let data = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&data).map_err(smtp_send::Error::from)?)
}

fn emit(output: Option<&Path>, value: &serde_json::Value) -> std::io::Result<()> {
    let rendered = serde_json::to_string_pretty(value).map_err(smtp_send::Error::from)?;
    match output {
        Some(path) => std::fs::write(path, rendered),
        None => {
            println!("{rendered}");
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let credentials = cli.credentials()?;
    let presets = cli.presets()?;

    match &cli.command {
        Command::Send {
            input,
            fields,
            output,
            continue_on_fail,
        } => {
            let records: Vec<Record> =
                serde_json::from_value(read_json(input)?).map_err(smtp_send::Error::from)?;
            let defaults = match fields {
                Some(path) => read_json(path)?,
                None => serde_json::Value::Null,
            };
            let accessor = JsonFields::new(defaults)?;
            let options = BatchOptions {
                continue_on_fail: *continue_on_fail,
            };

            let outcome = run_batch(&records, &accessor, &credentials, &presets, options).await?;
            emit(output.as_deref(), &outcome.to_json())
        }
        Command::TestConnection => {
            let result = test_connection(&credentials, &presets).await;
            let value = serde_json::to_value(&result).map_err(smtp_send::Error::from)?;
            emit(None, &value)
        }
    }
}
