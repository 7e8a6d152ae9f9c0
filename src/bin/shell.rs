//! tuplekv Shell
//!
//! Line-oriented shell over an in-memory store.
//!
//! ## Commands
//! - `get <key>`
//! - `set <key> <json>`
//! - `setex <key> <ttl_ms> <json>`
//! - `del <key>`
//! - `list <prefix> [--reverse] [--limit N] [--cursor C]`
//! - `help`, `quit`
//!
//! Keys are `/`-separated parts: `true`/`false` are booleans, numeric
//! literals are numbers, `"quoted"` text and everything else are strings.
//! A lone `/` is the root key.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{fmt, EnvFilter};
use tuplekv::{Config, Cursor, Key, KeyPart, Kv, KvError, ListOptions, Lookup, MemoryStore, Value};

/// tuplekv Shell
#[derive(Parser, Debug)]
#[command(name = "tuplekv-shell")]
#[command(about = "Interactive shell for typed tuple keys over an in-memory store")]
#[command(version)]
struct Args {
    /// Entries fetched per list round-trip
    #[arg(short, long, default_value = "100")]
    batch_size: usize,

    /// Suppress the prompt (for piped input)
    #[arg(short, long)]
    quiet: bool,
}

#[tokio::main]
async fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tuplekv=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    tracing::info!("tuplekv shell v{}", tuplekv::VERSION);

    let config = Config::builder().list_batch_size(args.batch_size).build();
    let store = Arc::new(MemoryStore::with_config(config.clone()));
    let kv = match Kv::with_config(store, config) {
        Ok(kv) => kv,
        Err(e) => {
            tracing::error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        if !args.quiet {
            eprint!("tuplekv> ");
        }

        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                tracing::error!("Failed to read input: {}", e);
                std::process::exit(1);
            }
        };

        match run_command(&kv, line.trim()).await {
            Ok(Flow::Continue) => {}
            Ok(Flow::Quit) => break,
            Err(e) => eprintln!("error: {}", e),
        }
    }

    tracing::info!("Shell stopped");
}

enum Flow {
    Continue,
    Quit,
}

async fn run_command(kv: &Kv, line: &str) -> Result<Flow, KvError> {
    let mut words = line.split_whitespace();
    let command = match words.next() {
        Some(command) => command,
        None => return Ok(Flow::Continue),
    };

    match command {
        "get" => {
            let key = parse_key(required(words.next(), "key")?)?;
            match kv.get(&key).await? {
                Lookup::Hit(entry) => {
                    println!("{} = {} @ {}", entry.key, entry.value.to_json(), entry.versionstamp)
                }
                Lookup::Miss(key) => println!("{} (miss)", key),
            }
        }
        "set" | "setex" => {
            let key = parse_key(required(words.next(), "key")?)?;
            let ttl = if command == "setex" {
                let ms = required(words.next(), "ttl")?;
                let ms = ms
                    .parse::<u64>()
                    .map_err(|e| KvError::Config(format!("bad ttl {:?}: {}", ms, e)))?;
                Some(Duration::from_millis(ms))
            } else {
                None
            };
            let rest = words.collect::<Vec<_>>().join(" ");
            if rest.is_empty() {
                return Err(KvError::InvalidKey("missing value".to_string()));
            }
            let json: serde_json::Value = serde_json::from_str(&rest)?;
            let versionstamp = kv.set(&key, Value::from(json), ttl).await?;
            println!("ok @ {}", versionstamp);
        }
        "del" => {
            let key = parse_key(required(words.next(), "key")?)?;
            kv.delete(&key).await?;
            println!("ok");
        }
        "list" => {
            let prefix = parse_key(required(words.next(), "prefix")?)?;
            let mut options = ListOptions::new();
            while let Some(flag) = words.next() {
                options = match flag {
                    "--reverse" => options.reverse(true),
                    "--limit" => {
                        let n = required(words.next(), "limit")?;
                        options.limit(n.parse().map_err(|_| {
                            KvError::Config(format!("bad limit {:?}", n))
                        })?)
                    }
                    "--cursor" => options.cursor(required(words.next(), "cursor")?.parse::<Cursor>()?),
                    other => return Err(KvError::Config(format!("unknown flag {:?}", other))),
                };
            }

            let page = kv.list(&prefix, options)?.page().await?;
            for entry in &page.entries {
                println!("{} = {} @ {}", entry.key, entry.value.to_json(), entry.versionstamp);
            }
            match page.cursor {
                Some(cursor) => println!("({} entries, cursor {})", page.entries.len(), cursor),
                None => println!("({} entries)", page.entries.len()),
            }
        }
        "help" => println!("commands: get <key> | set <key> <json> | setex <key> <ttl_ms> <json> | del <key> | list <prefix> [--reverse] [--limit N] [--cursor C] | quit"),
        "quit" | "exit" => return Ok(Flow::Quit),
        other => eprintln!("unknown command {:?} (try help)", other),
    }

    Ok(Flow::Continue)
}

fn required<'a>(word: Option<&'a str>, what: &str) -> Result<&'a str, KvError> {
    word.ok_or_else(|| KvError::InvalidKey(format!("missing {}", what)))
}

/// Parse `users/42/true` style paths into keys
fn parse_key(path: &str) -> Result<Key, KvError> {
    if path == "/" {
        return Ok(Key::root());
    }

    path.split('/')
        .filter(|segment| !segment.is_empty())
        .map(parse_part)
        .collect::<Result<Vec<_>, _>>()
        .map(Key::from)
}

fn parse_part(segment: &str) -> Result<KeyPart, KvError> {
    if let Some(quoted) = segment.strip_prefix('"') {
        return quoted
            .strip_suffix('"')
            .map(KeyPart::from)
            .ok_or_else(|| KvError::InvalidKeyPart(format!("unterminated quote in {:?}", segment)));
    }

    Ok(match segment {
        "true" => KeyPart::Boolean(true),
        "false" => KeyPart::Boolean(false),
        _ => match segment.parse::<f64>() {
            Ok(n) if n.is_finite() => KeyPart::Number(n),
            _ => KeyPart::from(segment),
        },
    })
}
