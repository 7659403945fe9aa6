//! Command-line and environment configuration.
//!
//! Everything is read once at startup; nothing here changes while chatting.

use std::time::Duration;

use chatns_core::{Credentials, GenerationParams};
use chatns_core::completion::{DEFAULT_MAX_TOKENS, DEFAULT_MODEL, DEFAULT_TEMPERATURE};
use chatns_gateway::DEFAULT_PORT;
use clap::Parser;

/// Chat with a language model through the local tool gateway.
#[derive(Debug, Parser)]
#[command(name = "chatnsbot", version, about, long_about = None)]
pub struct Cli {
    /// Gateway hostname.
    #[arg(long, env = "CHATNS_GATEWAY_HOST", default_value = "localhost")]
    pub host: String,

    /// Gateway TCP port.
    #[arg(long, env = "CHATNS_GATEWAY_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Bound in seconds on connecting and on every gateway request.
    #[arg(
        long,
        env = "CHATNS_TIMEOUT_SECS",
        default_value_t = 60,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub timeout_secs: u64,

    /// Tool provider to open the session against.
    #[arg(long, env = "CHATNS_PROVIDER", default_value = "ChatNS")]
    pub provider: String,

    /// Logical model identifier sent with every turn.
    #[arg(long, env = "CHATNS_MODEL", default_value = DEFAULT_MODEL)]
    pub model: String,

    /// Sampling temperature (0.0 to 2.0).
    #[arg(long, default_value_t = DEFAULT_TEMPERATURE, value_parser = parse_temperature)]
    pub temperature: f64,

    /// Output length cap in tokens.
    #[arg(
        long,
        default_value_t = DEFAULT_MAX_TOKENS,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub max_tokens: u32,

    /// Credential injected into the provider, as KEY=VALUE. Repeatable.
    #[arg(long = "credential", value_name = "KEY=VALUE", value_parser = parse_credential)]
    pub credentials: Vec<(String, String)>,

    /// Print the gateway's configured servers and exit.
    #[arg(long)]
    pub list_servers: bool,

    /// Diagnostic output on stderr (-v for info, -vv for debug).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    #[must_use]
    pub fn credentials(&self) -> Credentials {
        self.credentials.iter().cloned().collect()
    }

    #[must_use]
    pub fn generation_params(&self) -> GenerationParams {
        GenerationParams {
            model: self.model.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }
}

fn parse_temperature(raw: &str) -> Result<f64, String> {
    let value: f64 = raw
        .parse()
        .map_err(|_| format!("`{raw}` is not a number"))?;
    if (0.0..=2.0).contains(&value) {
        Ok(value)
    } else {
        Err(format!("temperature must be between 0.0 and 2.0, got {value}"))
    }
}

fn parse_credential(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected KEY=VALUE, got `{raw}`")),
    }
}
