//! OTAR CLI tools: key generation, fingerprints, protocol demo.
//!
//! The demo wires two in-process parties together; it stands in for the
//! external transport that normally carries the wire records.

#![forbid(unsafe_code)]

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;

use otar_core::config::ProtocolConfig;
use otar_crypto::{transport, IdentityKeypair, SecureChannel, SessionKey};

#[derive(Parser, Debug)]
#[command(name = "otar")]
#[command(about = "OTAR CLI tools")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a new RSA identity keypair
    Keygen {
        /// Output file path (without extension)
        #[arg(short, long, default_value = "otar")]
        output: String,

        /// Modulus size in bits
        #[arg(short, long, default_value_t = otar_core::config::DEFAULT_ASYMMETRIC_KEY_BITS)]
        bits: usize,
    },

    /// Show the fingerprint of a public key file
    Fingerprint {
        /// Public key PEM file path
        #[arg(short, long)]
        key: String,
    },

    /// Run a two-party rekey and message exchange in process
    Demo {
        /// Freshness window in seconds
        #[arg(short, long, default_value_t = 30)]
        window: u64,
    },

    /// Show version information
    Version,
}

fn main() -> Result<()> {
    init_tracing();

    let args = Args::parse();

    match args.command {
        Command::Keygen { output, bits } => {
            println!("Generating {}-bit RSA keypair...", bits);

            let keypair = IdentityKeypair::generate(bits)?;
            let fingerprint = keypair.public().fingerprint()?;

            let private_path = format!("{}.key", output);
            let public_path = format!("{}.pub", output);

            keypair.save(&private_path, &public_path)?;

            println!("Private key: {}", private_path);
            println!("Public key:  {}", public_path);
            println!("Fingerprint: {}", fingerprint);
        }
        Command::Fingerprint { key } => {
            let public = IdentityKeypair::load_public(&key)?;
            println!("{}", public.fingerprint()?);
        }
        Command::Demo { window } => {
            let config = ProtocolConfig {
                freshness_window: std::time::Duration::from_secs(window),
                ..ProtocolConfig::default()
            };
            run_demo(config)?;
        }
        Command::Version => {
            println!("otar {}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}

/// Two in-process parties, a radio (session key holder) and a client,
/// running one full rekey followed by a bidirectional exchange.
fn run_demo(config: ProtocolConfig) -> Result<()> {
    info!(bits = config.asymmetric_key_bits, "generating identities");

    let client = IdentityKeypair::generate(config.asymmetric_key_bits)?;
    let radio = IdentityKeypair::generate(config.asymmetric_key_bits)?;

    let client_fingerprint = client.public().fingerprint()?;
    let radio_fingerprint = radio.public().fingerprint()?;
    info!(client = %client_fingerprint, "client identity ready");
    info!(radio = %radio_fingerprint, "radio identity ready");

    // Key transport: radio -> client
    let session_key = SessionKey::generate()?;
    let record = transport::seal(&radio, client.public(), &session_key, config.hash)?;
    info!(
        ciphertext_len = record.ciphertext.len(),
        signature_len = record.signature.len(),
        "session key sealed and signed"
    );

    let recovered = transport::open(&record, radio.public(), &client, config.hash)?;
    info!("client verified the radio's signature and recovered the session key");

    let radio_channel = SecureChannel::new(session_key, config.clone());
    let client_channel = SecureChannel::new(recovered, config);

    // Radio -> client
    let envelope = radio_channel.seal_envelope(b"This is the secret message.")?;
    let message = client_channel.open_envelope(&envelope)?;
    println!("client received: {}", String::from_utf8_lossy(&message));

    // Client -> radio
    let envelope = client_channel.seal_envelope(b"Received secret message.")?;
    let message = radio_channel.open_envelope(&envelope)?;
    println!("radio received:  {}", String::from_utf8_lossy(&message));

    info!("demo complete: all checks passed");
    Ok(())
}

/// Initialize tracing with sensible defaults.
///
/// Log level is controlled by the `RUST_LOG` environment variable.
/// Defaults to `info` if not set.
fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}
