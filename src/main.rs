use std::fs;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{arg, command, value_parser, ArgAction, ArgMatches, Command};
use urlfetch::config::{Config, CONFIG_ENV};
use urlfetch::execute::RequestPipeline;
use urlfetch::highlight::{format_filepath, format_timestamp, render};
use urlfetch::http_request::HttpMethod;
use urlfetch::logger::TracingLogger;
use urlfetch::logging;
use urlfetch::request_parser::parse_query_parameters;
use urlfetch::response_store::{FsResponseStore, ResponseStore, SnapshotListing};

fn main() -> Result<()> {
    let cmd = Command::new("urlfetch")
        .author(clap::crate_authors!())
        .version(clap::crate_version!())
        .about(clap::crate_description!())
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            arg!(-c --config <FILE>)
                .required(false)
                .help("TOML configuration file")
                .env(CONFIG_ENV)
                .value_parser(value_parser!(PathBuf))
                .global(true),
        )
        .arg(
            arg!(--store <DIR>)
                .required(false)
                .help("Directory snapshots are stored in, overrides the configuration")
                .value_parser(value_parser!(PathBuf))
                .global(true),
        )
        .arg(
            arg!(--"log-level" <LEVEL>)
                .required(false)
                .help("trace, debug, info, warn, error or off")
                .global(true),
        )
        .arg(
            arg!(--"no-color")
                .help("Print JSON without syntax highlighting")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .subcommand(
            command!("fetch")
                .about("request an url, show the JSON response and save it")
                .arg(arg!(<URL> "url to request"))
                .arg(
                    arg!(-X --method <METHOD>)
                        .required(false)
                        .help("GET, POST, PUT, DELETE or PATCH")
                        .value_parser(value_parser!(HttpMethod)),
                )
                .arg(
                    arg!(-H --header <HEADER>)
                        .required(false)
                        .help("'Name: value' header, can be given multiple times")
                        .action(ArgAction::Append),
                )
                .arg(
                    arg!(--"headers-file" <FILE>)
                        .required(false)
                        .help("file with one 'Name: value' header per line")
                        .value_parser(value_parser!(PathBuf)),
                )
                .arg(
                    arg!(--timeout <SECS>)
                        .required(false)
                        .help("request timeout in seconds")
                        .value_parser(value_parser!(u64).range(1..)),
                ),
        )
        .subcommand(
            command!("params")
                .about("show the query parameters of an url")
                .arg(arg!(<URL> "url to inspect")),
        )
        .subcommand(
            command!("list")
                .about("list saved responses, newest first")
                .arg(arg!(--full "show absolute file paths").action(ArgAction::SetTrue)),
        )
        .subcommand(
            command!("show")
                .about("print a saved response")
                .arg(arg!(<FILE> "snapshot file").value_parser(value_parser!(PathBuf))),
        );

    let matches = cmd.get_matches();
    let mut config = Config::discover(matches.get_one::<PathBuf>("config").map(PathBuf::as_path))?;
    if let Some(store) = matches.get_one::<PathBuf>("store") {
        config.store_root = Some(store.clone());
    }
    logging::init(&config, matches.get_one::<String>("log-level").map(String::as_str))?;

    let color = !matches.get_flag("no-color") && std::io::stdout().is_terminal();

    let result = match matches.subcommand() {
        Some(("fetch", matches)) => fetch(&config, matches, color),
        Some(("params", matches)) => {
            print_parameters(matches.get_one::<String>("URL").expect("required"));
            Ok(())
        }
        Some(("list", matches)) => list(&config, matches.get_flag("full")),
        Some(("show", matches)) => show(
            &config,
            matches.get_one::<PathBuf>("FILE").expect("required"),
            color,
        ),
        _ => unreachable!("this should've been prevented"),
    };
    return result;
}

fn fetch(config: &Config, matches: &ArgMatches, color: bool) -> Result<()> {
    let url = matches.get_one::<String>("URL").expect("required");
    let method = match matches.get_one::<HttpMethod>("method") {
        Some(method) => *method,
        None => config.default_method()?,
    };

    let mut raw_headers = String::new();
    if let Some(path) = matches.get_one::<PathBuf>("headers-file") {
        raw_headers = fs::read_to_string(path)
            .with_context(|| format!("read headers file {}", path.display()))?;
        raw_headers.push('\n');
    }
    if let Some(headers) = matches.get_many::<String>("header") {
        for header in headers {
            raw_headers.push_str(header);
            raw_headers.push('\n');
        }
    }

    let mut pipeline = RequestPipeline::from_config(config, Arc::new(TracingLogger))?;
    if let Some(secs) = matches.get_one::<u64>("timeout") {
        pipeline = pipeline.with_timeout(Duration::from_secs(*secs));
    }
    let refreshed = Arc::new(AtomicBool::new(false));
    let flag = refreshed.clone();
    pipeline.on_saved(move || flag.store(true, Ordering::SeqCst));

    print_parameters(url);
    let outcome = pipeline.run(url, method, &raw_headers)?;

    println!("{}", render(&outcome.payload, color));
    println!();
    println!("Request successful. Data saved to {}", outcome.saved_to.display());

    if refreshed.load(Ordering::SeqCst) {
        let listing = pipeline.store().list_all()?;
        println!("{} saved response(s) in store", listing.entries.len());
    }
    Ok(())
}

fn print_parameters(url: &str) {
    println!("URL Parameters:\n");
    for line in parse_query_parameters(url).summary_lines() {
        println!("{}", line);
    }
    println!();
}

fn list(config: &Config, full: bool) -> Result<()> {
    let store = FsResponseStore::open(config.store_root())?.with_logger(Arc::new(TracingLogger));
    let SnapshotListing { entries, skipped } = store.list_all()?;

    if entries.is_empty() {
        println!("No saved responses in {}", store.root().display());
    }
    for entry in &entries {
        let path = if full {
            entry.filepath.display().to_string()
        } else {
            format_filepath(&entry.filepath)
        };
        println!("{}  {}", format_timestamp(&entry.timestamp), path);
    }
    if !skipped.is_empty() {
        eprintln!("{} unreadable snapshot(s) skipped:", skipped.len());
        for path in &skipped {
            eprintln!("  {}", path.display());
        }
    }
    Ok(())
}

fn show(config: &Config, file: &Path, color: bool) -> Result<()> {
    let store = FsResponseStore::open(config.store_root())?;
    let data = store.load(file)?;
    println!("File: {}\n", file.display());
    println!("{}", render(&data, color));
    Ok(())
}
