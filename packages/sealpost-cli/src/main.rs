//! SealPost command-line client
//!
//! Generates and stores a local key pair, seals messages for a recipient's
//! published key and opens envelopes with the stored private key.
//!
//! Envelopes are read and written as the relay's wire JSON, so the output
//! of `sealpost seal` can be posted to a relay as-is and a relay's message
//! listing can be piped straight into `sealpost open`.
//!
//! Logs go to stderr; stdout carries only command output.

use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{bail, eyre, Result, WrapErr};
use serde_json::json;

use sealpost_core::crypto::{self, CryptoProvider};
use sealpost_core::envelope::{parse_envelope, parse_envelopes_json, ParsedEnvelope};
use sealpost_core::{
    Account, CoreConfig, DecryptedMessage, FileKeyStore, KeyMaterialStore, MemoryKeyStore,
    MemoryRelay, MessageCryptoPipeline, NativeCryptoProvider, RelayApi, WireEnvelope,
};

// ── CLI Arguments ─────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "sealpost", version, about = "End-to-end encrypted message envelopes")]
struct Args {
    /// Directory holding private key files
    #[arg(long, env = "SEALPOST_KEY_DIR", global = true)]
    key_dir: Option<PathBuf>,

    /// Local identity whose private key is used
    #[arg(short, long, env = "SEALPOST_IDENTITY", global = true)]
    identity: Option<String>,

    /// Log at debug level (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a key pair, store the private key, print the public key
    Keygen {
        /// Replace an existing stored key
        #[arg(long)]
        force: bool,

        /// Print the public key as PEM instead of JWK
        #[arg(long)]
        pem: bool,
    },

    /// Print the fingerprint of a public key
    Fingerprint {
        /// Public key file (JWK or PEM); stdin if omitted
        key: Option<PathBuf>,
    },

    /// Encrypt a message and print the wire envelope
    Seal {
        /// Recipient identity
        #[arg(long)]
        to: String,

        /// Recipient's public key file (JWK or PEM)
        #[arg(long)]
        key: PathBuf,

        /// Message text; stdin if omitted
        message: Option<String>,
    },

    /// Decrypt a wire envelope or a JSON array of them
    Open {
        /// Envelope file; stdin if omitted
        input: Option<PathBuf>,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Erase the stored private key
    Logout,

    /// Show whether a private key is stored
    Status,

    /// Run an Alice and Bob exchange through an in-memory relay
    Demo,
}

// ── Entry Point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();
    let config = CoreConfig {
        key_dir: args.key_dir.clone(),
        verbose_logging: args.verbose,
    };
    init_tracing(&config);

    let provider: Arc<dyn CryptoProvider> = Arc::new(NativeCryptoProvider::new());

    let output = match args.command {
        Command::Keygen { force, pem } => {
            let store = key_store(&config, args.identity.as_deref())?;
            keygen(provider.as_ref(), &store, force, pem).await?
        }
        Command::Fingerprint { key } => {
            let text = read_input(key.as_deref())?;
            let public_key = provider
                .import_public_key(&text)
                .await
                .wrap_err("Not a usable public key")?;
            public_key.fingerprint()
        }
        Command::Seal { to, key, message } => {
            let identity = require_identity(args.identity.as_deref())?;
            let recipient_key = read_input(Some(key.as_path()))?;
            let message = match message {
                Some(message) => message,
                None => read_input(None)?,
            };
            seal(provider, &recipient_key, identity, &to, &message).await?
        }
        Command::Open { input, json } => {
            let store = key_store(&config, args.identity.as_deref())?;
            let text = read_input(input.as_deref())?;
            open(provider, &store, &text, json).await?
        }
        Command::Logout => {
            let store = key_store(&config, args.identity.as_deref())?;
            store.erase().wrap_err("Failed to erase private key")?;
            tracing::info!(path = %store.path().display(), "Private key erased");
            "Logged out".to_string()
        }
        Command::Status => {
            let store = key_store(&config, args.identity.as_deref())?;
            if store.contains()? {
                format!("Private key stored at {}", store.path().display())
            } else {
                "No private key stored".to_string()
            }
        }
        Command::Demo => demo(provider).await?,
    };

    println!("{}", output);
    Ok(())
}

fn init_tracing(config: &CoreConfig) {
    let default_filter = if config.verbose_logging {
        "sealpost=debug,sealpost_core=debug"
    } else {
        "sealpost=info,sealpost_core=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with_writer(io::stderr)
        .init();
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn require_identity(identity: Option<&str>) -> Result<&str> {
    identity.ok_or_else(|| eyre!("No identity given; pass --identity or set SEALPOST_IDENTITY"))
}

fn key_store(config: &CoreConfig, identity: Option<&str>) -> Result<FileKeyStore> {
    let identity = require_identity(identity)?;
    let default_dir = dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("sealpost")
        .join("keys");

    let dir = config.key_dir_or(default_dir);
    tracing::debug!(dir = %dir.display(), identity, "Using key store");
    Ok(FileKeyStore::new(dir, identity)?)
}

fn read_input(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(path)
            .wrap_err_with(|| format!("Failed to read {}", path.display())),
        None => {
            let mut text = String::new();
            io::stdin()
                .read_to_string(&mut text)
                .wrap_err("Failed to read stdin")?;
            Ok(text)
        }
    }
}

// ── Commands ──────────────────────────────────────────────────────────────────

async fn keygen(
    provider: &dyn CryptoProvider,
    store: &dyn KeyMaterialStore,
    force: bool,
    pem: bool,
) -> Result<String> {
    if !force && store.contains()? {
        bail!("A private key is already stored; pass --force to replace it");
    }

    let pair = provider.generate_key_pair().await?;
    let private_text = provider.export_private_key(pair.private()).await?;
    store.save(&private_text).wrap_err("Failed to store private key")?;

    tracing::info!(fingerprint = %pair.public().fingerprint(), "Key pair generated");

    let public_text = if pem {
        crypto::export_public_key_pem(pair.public())?
    } else {
        provider.export_public_key(pair.public()).await?
    };
    Ok(public_text)
}

async fn seal(
    provider: Arc<dyn CryptoProvider>,
    recipient_key: &str,
    sender: &str,
    recipient: &str,
    message: &str,
) -> Result<String> {
    let envelope = MessageCryptoPipeline::new(provider)
        .seal(message, recipient_key, sender, recipient)
        .await
        .wrap_err("Failed to seal message")?;

    Ok(envelope.to_wire().to_json()?)
}

fn parse_input(text: &str) -> Result<Vec<ParsedEnvelope>> {
    let parsed = if text.trim_start().starts_with('[') {
        parse_envelopes_json(text)?
    } else {
        vec![parse_envelope(WireEnvelope::from_json(text)?)]
    };
    Ok(parsed)
}

async fn open(
    provider: Arc<dyn CryptoProvider>,
    store: &dyn KeyMaterialStore,
    text: &str,
    as_json: bool,
) -> Result<String> {
    let envelopes = parse_input(text).wrap_err("Input is not a wire envelope")?;
    let messages = MessageCryptoPipeline::new(provider)
        .open_batch(&envelopes, store)
        .await;

    if as_json {
        let rows: Vec<_> = messages
            .iter()
            .map(|m| {
                json!({
                    "id": m.id,
                    "sender": m.sender,
                    "outcome": m.outcome().as_str(),
                    "text": m.body.display_text(),
                })
            })
            .collect();
        return Ok(serde_json::to_string_pretty(&rows)?);
    }

    Ok(render(&messages))
}

fn render(messages: &[DecryptedMessage]) -> String {
    messages
        .iter()
        .map(|m| match m.id {
            Some(id) => format!("#{} {}: {}", id, m.sender, m.body.display_text()),
            None => format!("{}: {}", m.sender, m.body.display_text()),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

async fn demo(provider: Arc<dyn CryptoProvider>) -> Result<String> {
    let relay = Arc::new(MemoryRelay::new());
    let account = |name: &str| {
        Account::new(
            name,
            Arc::new(MemoryKeyStore::new()),
            provider.clone(),
            relay.clone(),
        )
    };

    let alice = account("alice");
    let bob = account("bob");
    alice.register().await?;
    bob.register().await?;

    alice.send_message("bob", "Hi Bob, only you can read this.").await?;
    bob.send_message("alice", "Hi Alice!").await?;

    // A message from a client that never encrypted its bodies
    relay.register_user("legacy")?;
    relay
        .send(WireEnvelope {
            id: None,
            sender: "legacy".into(),
            receiver: "bob".into(),
            encrypted_msg: "plain text from an old client".into(),
            encrypted_key: None,
            iv: None,
        })
        .await?;

    let mut lines = vec!["bob's inbox:".to_string(), render(&bob.inbox().await?)];

    bob.logout()?;
    lines.push("bob's inbox after logout:".to_string());
    lines.push(render(&bob.inbox().await?));

    Ok(lines.join("\n"))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
