use std::{env, fs, process};

use n3chain::{Engine, EngineConfig, LogConfig};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage: n3chain <file.n3> [--json] [--trace] [--format <name>]";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut path = None;
    let mut json = false;
    let mut trace = false;
    let mut format = String::from("n3");

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--json" => json = true,
            "--trace" => trace = true,
            "--format" => format = args.next().ok_or(USAGE)?,
            _ if path.is_none() => path = Some(arg),
            _ => {
                eprintln!("{USAGE}");
                process::exit(2);
            }
        }
    }
    let Some(path) = path else {
        eprintln!("{USAGE}");
        process::exit(2);
    };

    let default_level = if trace { "n3chain=trace" } else { "n3chain=warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = EngineConfig {
        format: format.parse()?,
        log: if trace { LogConfig::verbose() } else { LogConfig::default() },
    };
    let mut engine = Engine::with_config(config);

    let input = fs::read_to_string(&path)?;
    engine.load_ontology_as(&input, &format)?;
    let output = engine.reason()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        for line in &output.triples {
            println!("{line}");
        }
        eprintln!("{}", output.message);
    }

    Ok(())
}
