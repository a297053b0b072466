//! # Command Line Interface
//!
//! `sealedsecret` fetches the controller certificate and seals secrets from
//! flags or from an existing Secret manifest.

use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use rsa::traits::PublicKeyParts;
use rsa::RsaPublicKey;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::Settings;
use crate::errors::Error;
use crate::keys::{fingerprint, public_key_from_pem_bytes};
use crate::observability::{init_logging, log_settings};
use crate::seal::{SealOptions, SealingScope, MEDIA_TYPE_JSON, MEDIA_TYPE_YAML};
use crate::secret::SecretRecord;
use crate::services::{seal_record, seal_request, SealRequest, SealService, SealedOutput};

#[derive(Parser)]
#[command(name = "sealedsecret")]
#[command(about = "Seal Kubernetes secrets for the sealed-secrets controller")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Settings file (TOML). Defaults to ./sealedsecret.toml when present
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Controller service name override
    #[arg(long, global = true)]
    pub controller_name: Option<String>,

    /// Controller namespace override
    #[arg(long, global = true)]
    pub controller_namespace: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fetch the controller certificate and print its key fingerprint
    FetchCert {
        /// Read the certificate from a file instead of the cluster
        #[arg(long)]
        cert: Option<PathBuf>,
    },

    /// Seal a secret given on the command line
    Seal {
        /// Secret name
        #[arg(long)]
        name: String,

        /// Secret namespace
        #[arg(long)]
        namespace: String,

        /// Secret type (defaults to Opaque)
        #[arg(long = "type", default_value = "")]
        secret_type: String,

        /// Entry stored base64-encoded, as KEY=VALUE (repeatable)
        #[arg(long = "data", value_parser = parse_key_val)]
        data: Vec<(String, String)>,

        /// Entry stored literally, as KEY=VALUE (repeatable)
        #[arg(long = "string-data", value_parser = parse_key_val)]
        string_data: Vec<(String, String)>,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Print the effective settings as TOML
    ShowConfig,

    /// Seal an existing v1/Secret manifest
    SealManifest {
        /// Manifest file, or `-` for stdin
        file: PathBuf,

        #[command(flatten)]
        output: OutputArgs,
    },
}

#[derive(Args)]
pub struct OutputArgs {
    /// Controller certificate file; skips the cluster lookup
    #[arg(long)]
    pub cert: Option<PathBuf>,

    /// Sealing scope: strict, namespace-wide or cluster-wide
    #[arg(long)]
    pub scope: Option<SealingScope>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Yaml)]
    pub format: OutputFormat,

    /// Write the sealed manifest here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Yaml,
    Json,
}

impl OutputFormat {
    pub fn media_type(&self) -> &'static str {
        match self {
            Self::Yaml => MEDIA_TYPE_YAML,
            Self::Json => MEDIA_TYPE_JSON,
        }
    }
}

/// Run CLI commands
pub async fn run_cli() -> anyhow::Result<()> {
    // Load .env if present; a missing file is not an error
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Warning: Error loading .env file: {}", e);
        }
    }

    let cli = Cli::parse();

    let mut settings = Settings::load(cli.config.as_deref())?;
    if let Some(name) = cli.controller_name {
        settings.controller.name = name;
    }
    if let Some(namespace) = cli.controller_namespace {
        settings.controller.namespace = namespace;
    }
    if cli.verbose {
        settings.logging.level = "debug".to_string();
    }
    settings.validate()?;

    init_logging(&settings.logging);
    log_settings(&settings);

    let cancel = CancellationToken::new();
    spawn_interrupt_handler(cancel.clone());

    match cli.command {
        Commands::ShowConfig => print!("{}", settings.to_toml_redacted()?),
        Commands::FetchCert { cert } => {
            let key = load_key(&settings, cert.as_deref(), &cancel).await?;
            println!("{}  {} bits", fingerprint(&key), key.size() * 8);
        }
        Commands::Seal { name, namespace, secret_type, data, string_data, output } => {
            let mut request = SealRequest::new(name, namespace)
                .with_type(secret_type)
                .with_scope(output.scope.unwrap_or_default())
                .with_media_type(output.format.media_type());
            request.data = collect_pairs(data);
            request.string_data = collect_pairs(string_data);

            let key = load_key(&settings, output.cert.as_deref(), &cancel).await?;
            let sealed = seal_request(&request, &key).map_err(nothing_to_seal)?;
            write_output(&sealed, output.output.as_deref())?;
        }
        Commands::SealManifest { file, output } => {
            let bytes = read_input(&file)?;
            let record = SecretRecord::from_manifest(&bytes)
                .map_err(Error::from)
                .map_err(nothing_to_seal)?;

            let options = SealOptions {
                scope: output.scope,
                media_type: output.format.media_type().to_string(),
            };
            let key = load_key(&settings, output.cert.as_deref(), &cancel).await?;
            let sealed = seal_record(&record, &key, &options)?;
            write_output(&sealed, output.output.as_deref())?;
        }
    }

    Ok(())
}

/// Public key from `cert` if given, otherwise from the configured controller.
async fn load_key(
    settings: &Settings,
    cert: Option<&Path>,
    cancel: &CancellationToken,
) -> anyhow::Result<Arc<RsaPublicKey>> {
    if let Some(path) = cert {
        debug!(path = %path.display(), "Reading controller certificate from file");
        let pem = std::fs::read(path)
            .with_context(|| format!("Failed to read certificate: {}", path.display()))?;
        return Ok(Arc::new(public_key_from_pem_bytes(&pem)?));
    }

    let service = SealService::from_settings(settings)?;
    service.resolver().resolve(cancel).await.with_context(|| {
        format!(
            "Failed to fetch certificate from {}/{}",
            settings.controller.namespace, settings.controller.name
        )
    })
}

fn nothing_to_seal(err: Error) -> anyhow::Error {
    if err.is_empty_payload() {
        anyhow::anyhow!("Nothing to seal: the secret has no data or stringData entries")
    } else {
        err.into()
    }
}

fn spawn_interrupt_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling");
            cancel.cancel();
        }
    });
}

/// Parse a `KEY=VALUE` argument. The value may itself contain `=`.
fn parse_key_val(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, _)) if key.is_empty() => Err(format!("empty key in '{}'", s)),
        Some((key, value)) => Ok((key.to_string(), value.to_string())),
        None => Err(format!("expected KEY=VALUE, got '{}'", s)),
    }
}

/// Later pairs win on duplicate keys.
fn collect_pairs(pairs: Vec<(String, String)>) -> BTreeMap<String, String> {
    pairs.into_iter().collect()
}

fn read_input(path: &Path) -> anyhow::Result<Vec<u8>> {
    if path == Path::new("-") {
        let mut buf = Vec::new();
        std::io::stdin().read_to_end(&mut buf).context("Failed to read stdin")?;
        return Ok(buf);
    }
    std::fs::read(path).with_context(|| format!("Failed to read manifest: {}", path.display()))
}

fn write_output(sealed: &SealedOutput, path: Option<&Path>) -> anyhow::Result<()> {
    debug!(fingerprint = %sealed.key_fingerprint, media_type = %sealed.media_type, "Writing sealed manifest");
    match path {
        Some(path) => std::fs::write(path, &sealed.manifest)
            .with_context(|| format!("Failed to write output: {}", path.display())),
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&sealed.manifest).context("Failed to write to stdout")?;
            stdout.flush().context("Failed to write to stdout")
        }
    }
}
