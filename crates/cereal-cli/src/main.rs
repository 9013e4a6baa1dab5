//! `cereal` CLI: encode, decode, and edit store tokens from the command line.
//!
//! ## Usage
//!
//! ```sh
//! # Encode a JSON object (stdin → stdout)
//! echo '{"1":"text","2":true}' | cereal encode
//!
//! # Decode a token back to pretty-printed JSON
//! cereal decode -i token.txt
//!
//! # Decode the token carried by a raw query string (first parameter key)
//! echo "?$TOKEN&edit" | cereal decode --query
//!
//! # Apply form-style edits to a token and print the new token
//! cereal set -t "$TOKEN" 3=Y 4=two --remove 2
//!
//! # Read one value
//! cereal get -t "$TOKEN" 3
//!
//! # Show size statistics
//! cereal stats -i settings.json
//! ```
//!
//! Set `RUST_LOG=debug` to see why a token was rejected.

use anyhow::{Context, Result};
use cereal_core::{OrderedStore, Value};
use clap::{Parser, Subcommand};
use percent_encoding::percent_decode_str;
use std::io::{self, Read};
use std::process;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cereal", version, about = "Ordered key/value store tokens CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encode a JSON object or array into a token
    Encode {
        /// Input file (reads from stdin if omitted)
        #[arg(short, long)]
        input: Option<String>,
        /// Output file (writes to stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Decode a token back to JSON
    Decode {
        /// Input file (reads from stdin if omitted)
        #[arg(short, long)]
        input: Option<String>,
        /// Output file (writes to stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,
        /// Treat the input as a query string and use its first parameter key as the token
        #[arg(long)]
        query: bool,
        /// Fail on an unusable token instead of printing an empty store
        #[arg(long)]
        strict: bool,
    },
    /// Apply KEY=VALUE assignments to a token and print the new token
    Set {
        /// Token to start from (an empty store if omitted)
        #[arg(short, long)]
        token: Option<String>,
        /// Keys to remove after the assignments are applied
        #[arg(long = "remove", value_name = "KEY")]
        remove: Vec<String>,
        /// Assignments; VALUE is parsed as JSON when possible, else kept as a string
        #[arg(value_name = "KEY=VALUE")]
        assignments: Vec<String>,
    },
    /// Print one value from a token as JSON (exit code 1 if absent)
    Get {
        /// Token to read
        #[arg(short, long)]
        token: String,
        /// Key to look up
        key: String,
    },
    /// Show encoding statistics (JSON size, token size, ratio)
    Stats {
        /// Input JSON file (reads from stdin if omitted)
        #[arg(short, long)]
        input: Option<String>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Encode { input, output } => {
            let store = read_json_store(input.as_deref())?;
            let token = store.encode().context("Failed to encode store")?;
            write_output(output.as_deref(), &token)?;
        }
        Commands::Decode {
            input,
            output,
            query,
            strict,
        } => {
            let raw = read_input(input.as_deref())?;
            let raw = raw.trim();
            let token = if query {
                token_from_query(raw)
            } else {
                raw.to_string()
            };
            debug!(len = token.len(), query, strict, "decoding token");
            let store = if strict {
                OrderedStore::try_decode(&token).context("Failed to decode token")?
            } else {
                OrderedStore::from_token(&token)
            };
            let pretty = serde_json::to_string_pretty(&store)?;
            write_output(output.as_deref(), &pretty)?;
        }
        Commands::Set {
            token,
            remove,
            assignments,
        } => {
            let mut store = token
                .as_deref()
                .map(OrderedStore::from_token)
                .unwrap_or_default();
            let pairs = parse_assignments(&assignments)?;
            store.add_all(pairs);
            for key in &remove {
                store.remove(key);
            }
            let token = store.encode().context("Failed to encode store")?;
            write_output(None, &token)?;
        }
        Commands::Get { token, key } => {
            let store = OrderedStore::from_token(&token);
            match store.get(&key) {
                Some(value) => println!("{}", serde_json::to_string(value)?),
                None => {
                    eprintln!("Key not found: {key}");
                    process::exit(1);
                }
            }
        }
        Commands::Stats { input } => {
            let store = read_json_store(input.as_deref())?;
            let json_bytes = serde_json::to_vec(&store)?.len();
            let token_bytes = store.encode().context("Failed to encode store")?.len();
            let ratio = if json_bytes > 0 {
                (1.0 - (token_bytes as f64 / json_bytes as f64)) * 100.0
            } else {
                0.0
            };
            println!("Entries:    {}", store.len());
            println!("JSON size:  {} bytes", json_bytes);
            println!("Token size: {} bytes", token_bytes);
            println!("Reduction:  {:.1}%", ratio);
        }
    }

    Ok(())
}

/// Parse JSON input into a store; only objects and arrays are accepted.
fn read_json_store(path: Option<&str>) -> Result<OrderedStore> {
    let json = read_input(path)?;
    let value: Value = serde_json::from_str(&json).context("Input is not valid JSON")?;
    OrderedStore::from_value(value).context("Input must be a JSON object or array")
}

/// Split `KEY=VALUE` arguments. VALUE is JSON if it parses, otherwise a string,
/// so `2=true` stores a boolean and `4=two` stores the string "two".
fn parse_assignments(raw: &[String]) -> Result<Vec<(String, Value)>> {
    raw.iter()
        .map(|arg| {
            let (key, value) = arg
                .split_once('=')
                .with_context(|| format!("Expected KEY=VALUE, got '{}'", arg))?;
            let value = serde_json::from_str(value).unwrap_or_else(|_| Value::from(value));
            Ok((key.to_string(), value))
        })
        .collect()
}

/// The first parameter key of a query string, percent-decoded.
///
/// `?TOKEN&edit` and `TOKEN=&edit` both yield `TOKEN`. A `+` is kept as-is
/// rather than read as a space, since it belongs to the token alphabet.
fn token_from_query(query: &str) -> String {
    let query = query.strip_prefix('?').unwrap_or(query);
    let first = query.split('&').next().unwrap_or_default();
    let key = first.split_once('=').map_or(first, |(key, _)| key);
    percent_decode_str(key).decode_utf8_lossy().into_owned()
}

fn read_input(path: Option<&str>) -> Result<String> {
    match path {
        Some(path) => {
            std::fs::read_to_string(path).with_context(|| format!("Failed to read file: {}", path))
        }
        None => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read from stdin")?;
            Ok(buf)
        }
    }
}

fn write_output(path: Option<&str>, content: &str) -> Result<()> {
    match path {
        Some(path) => {
            std::fs::write(path, content)
                .with_context(|| format!("Failed to write file: {}", path))?;
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_token_is_first_key() {
        assert_eq!(token_from_query("?abc+/=&edit"), "abc+/");
        assert_eq!(token_from_query("abc%2B%2F%3D%3D&edit"), "abc+/==");
        assert_eq!(token_from_query("abc"), "abc");
        assert_eq!(token_from_query(""), "");
    }

    #[test]
    fn query_token_leaves_stray_percent() {
        assert_eq!(token_from_query("100%&edit"), "100%");
        assert_eq!(token_from_query("%zz"), "%zz");
        assert_eq!(token_from_query("%41%4"), "A%4");
        assert_eq!(token_from_query("%E2%82%AC="), "€");
    }

    #[test]
    fn assignments_parse_json_or_string() {
        let pairs = parse_assignments(&["2=true".into(), "4=two".into(), "n=[1]".into()]).unwrap();
        assert_eq!(pairs[0].1, Value::Bool(true));
        assert_eq!(pairs[1].1, Value::from("two"));
        assert_eq!(pairs[2].1, serde_json::json!([1]));
        assert!(parse_assignments(&["no-equals".into()]).is_err());
    }
}
