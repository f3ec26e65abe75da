mod debug_report;

use std::io::{self, IsTerminal, Read};
use std::path::PathBuf;
use tessera::{GeocoderDefinition, Options};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).with_writer(io::stderr).init();

    let config = match parse_args() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(2);
        }
    };

    let geocoder = match GeocoderDefinition::from_path(&config.index).and_then(GeocoderDefinition::build) {
        Ok(geocoder) => geocoder,
        Err(err) => {
            eprintln!("error: failed to load '{}': {err}", config.index.display());
            std::process::exit(1);
        }
    };

    match geocoder.geocode(&config.query, &config.options) {
        Ok(response) => debug_report::print_response(&config.query, &response, config.color),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(1);
        }
    }
}

struct CliConfig {
    index: PathBuf,
    query: String,
    options: Options,
    color: bool,
}

fn parse_args() -> Result<CliConfig, String> {
    let mut index: Option<PathBuf> = None;
    let mut query: Option<String> = None;
    let mut options = Options { debug: true, ..Options::default() };
    let mut color = io::stdout().is_terminal();
    let mut args = std::env::args().skip(1).peekable();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            "-V" | "--version" => {
                println!("tessera {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--color" => color = true,
            "--no-color" => color = false,
            "--no-autocomplete" => options.autocomplete = false,
            "--no-fuzzy" => options.fuzzy_match = false,
            "--index" => {
                let value = args.next().ok_or_else(|| "error: --index expects a value".to_string())?;
                index = Some(PathBuf::from(value));
            }
            "--limit" => {
                let value = args.next().ok_or_else(|| "error: --limit expects a value".to_string())?;
                options.limit = parse_count("--limit", &value)?;
            }
            "--limit-verify" => {
                let value = args.next().ok_or_else(|| "error: --limit-verify expects a value".to_string())?;
                options.limit_verify = parse_count("--limit-verify", &value)?;
            }
            "--proximity" => {
                let value = args.next().ok_or_else(|| "error: --proximity expects a value".to_string())?;
                options.proximity = Some(parse_point(&value)?);
            }
            "--" => {
                let rest = args.collect::<Vec<_>>().join(" ");
                if !rest.trim().is_empty() {
                    if query.is_some() {
                        return Err("error: query provided multiple times".to_string());
                    }
                    query = Some(rest);
                }
                break;
            }
            _ if arg.starts_with("--index=") => {
                index = Some(PathBuf::from(arg.trim_start_matches("--index=")));
            }
            _ if arg.starts_with("--limit=") => {
                options.limit = parse_count("--limit", arg.trim_start_matches("--limit="))?;
            }
            _ if arg.starts_with("--limit-verify=") => {
                options.limit_verify = parse_count("--limit-verify", arg.trim_start_matches("--limit-verify="))?;
            }
            _ if arg.starts_with("--proximity=") => {
                options.proximity = Some(parse_point(arg.trim_start_matches("--proximity="))?);
            }
            _ if arg.starts_with('-') && !looks_numeric(&arg) => {
                return Err(format!("error: unknown option '{arg}'"));
            }
            _ => {
                let rest = std::iter::once(arg).chain(args).collect::<Vec<_>>().join(" ");
                if query.is_some() {
                    return Err("error: query provided multiple times".to_string());
                }
                query = Some(rest);
                break;
            }
        }
    }

    let index = index.ok_or_else(|| format!("error: --index is required\n\n{}", help_text()))?;
    let query = match query {
        Some(value) => value,
        None => read_stdin_query()?,
    };

    if query.trim().is_empty() {
        return Err(format!("error: no query provided\n\n{}", help_text()));
    }

    Ok(CliConfig { index, query: query.trim().to_string(), options, color })
}

/// Reverse queries like `-87.6,41.8` start with a dash.
fn looks_numeric(arg: &str) -> bool {
    arg[1..].starts_with(|c: char| c.is_ascii_digit())
}

fn read_stdin_query() -> Result<String, String> {
    let mut buffer = String::new();
    io::stdin().read_to_string(&mut buffer).map_err(|err| format!("error: failed to read stdin: {err}"))?;
    Ok(buffer)
}

fn parse_count(flag: &str, value: &str) -> Result<usize, String> {
    value.parse().map_err(|_| format!("error: invalid {flag} '{value}' (expected a non-negative integer)"))
}

fn parse_point(value: &str) -> Result<[f64; 2], String> {
    let invalid = || format!("error: invalid --proximity '{value}' (expected LON,LAT)");
    let (lon, lat) = value.split_once(',').ok_or_else(invalid)?;
    let lon: f64 = lon.trim().parse().map_err(|_| invalid())?;
    let lat: f64 = lat.trim().parse().map_err(|_| invalid())?;
    Ok([lon, lat])
}

fn print_help() {
    println!("{}", help_text());
}

fn help_text() -> String {
    format!(
        "tessera {version}

Multi-source geocoder CLI.

Usage:
  tessera [OPTIONS] --index <file.json> [--] <query...>

Options:
  --index <file.json>        Geocoder definition: sources in order, with features.
  --limit <n>                Results returned. Default: {limit}
  --limit-verify <n>         Spatialmatches verified. Default: {limit_verify}
  --proximity <lon,lat>      Bias results toward a point.
  --no-autocomplete          Match the last word exactly.
  --no-fuzzy                 Disable typo tolerance.
  --color                    Force ANSI color output.
  --no-color                 Disable ANSI color output.
  -h, --help                 Show this help message.
  -V, --version              Print version information.

A query of the form LON,LAT is reverse geocoded. Set RUST_LOG=tessera=debug
for pipeline traces.

Exit codes:
  0  Success.
  1  Index or query error.
  2  Invalid arguments or missing query.
",
        version = env!("CARGO_PKG_VERSION"),
        limit = Options::default().limit,
        limit_verify = Options::default().limit_verify,
    )
}
