//! Declutter CLI
//!
//! Tooling around the core engine: apply a rule file to a saved HTML
//! page, sanitize a capture target, validate rule files, and fetch a
//! page's favicon as a data URI.

use std::fs;
use std::path::Path;

use clap::{Parser, Subcommand};

use dc_core::bridge::data_uri;
use dc_core::engine::{host_of, resolve_href};
use dc_core::rules::{RemovalRule, RuleSet};
use dc_core::sanitize::capture;
use dc_core::selector::Selector;
use dc_core::{reconcile, Document};

#[derive(Parser)]
#[command(name = "dc-cli")]
#[command(about = "Declutter rule tooling")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply a removal rule file to an HTML page
    Apply {
        /// Input HTML file
        #[arg(short, long)]
        input: String,

        /// Rule file (JSON array of removal rules)
        #[arg(short, long)]
        rules: String,

        /// Output file; stdout when omitted
        #[arg(short, long)]
        output: Option<String>,

        /// Print per-rule diagnostics
        #[arg(short, long)]
        verbose: bool,
    },

    /// Sanitize one element of an HTML page into static markup
    Sanitize {
        /// Input HTML file
        #[arg(short, long)]
        input: String,

        /// CSS selector of the capture target
        #[arg(short, long)]
        selector: String,

        /// Output file; stdout when omitted
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Validate the selectors in a rule file
    Check {
        /// Rule file to validate
        #[arg(short, long)]
        input: String,
    },

    /// Fetch a page's declared favicon as a base64 data URI
    Favicon {
        /// Page URL
        #[arg(short, long)]
        url: String,
    },
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Apply {
            input,
            rules,
            output,
            verbose,
        } => cmd_apply(&input, &rules, output.as_deref(), verbose),
        Commands::Sanitize {
            input,
            selector,
            output,
        } => cmd_sanitize(&input, &selector, output.as_deref()),
        Commands::Check { input } => cmd_check(&input),
        Commands::Favicon { url } => cmd_favicon(&url),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn load_rules(path: &str) -> Result<Vec<RemovalRule>, String> {
    let text = fs::read_to_string(path).map_err(|e| format!("failed to read {path}: {e}"))?;
    serde_json::from_str(&text).map_err(|e| format!("failed to parse {path}: {e}"))
}

fn write_output(output: Option<&str>, content: &str) -> Result<(), String> {
    match output {
        Some(path) => fs::write(Path::new(path), content)
            .map_err(|e| format!("failed to write {path}: {e}")),
        None => {
            println!("{content}");
            Ok(())
        }
    }
}

fn cmd_apply(
    input: &str,
    rules_path: &str,
    output: Option<&str>,
    verbose: bool,
) -> Result<(), String> {
    let html = fs::read_to_string(input).map_err(|e| format!("failed to read {input}: {e}"))?;
    let rules = RuleSet::from_rules(load_rules(rules_path)?);

    let mut doc = Document::parse(&html);
    let report = reconcile(&rules, &mut doc);

    if verbose {
        for hit in &report.hits {
            eprintln!("{} ({} removed)", hit.label, hit.count);
        }
        for err in &report.errors {
            eprintln!("skipped: {err}");
        }
    }
    eprintln!(
        "{} element(s) removed, {} rule(s) skipped",
        report.removed_total(),
        report.errors.len()
    );

    write_output(output, &doc.inner_html(doc.root()))
}

fn cmd_sanitize(input: &str, selector: &str, output: Option<&str>) -> Result<(), String> {
    let html = fs::read_to_string(input).map_err(|e| format!("failed to read {input}: {e}"))?;
    let mut doc = Document::parse(&html);
    let sanitized = capture(&mut doc, selector).map_err(|e| e.to_string())?;
    write_output(output, &sanitized)
}

fn cmd_check(input: &str) -> Result<(), String> {
    let rules = load_rules(input)?;
    let mut invalid = 0usize;
    for (index, rule) in rules.iter().enumerate() {
        match Selector::parse(&rule.selector) {
            Ok(_) => println!("rule {index}: ok ({})", rule.selector),
            Err(e) => {
                invalid += 1;
                println!("rule {index}: {e}");
            }
        }
    }
    if invalid > 0 {
        Err(format!("{invalid} invalid rule(s) of {}", rules.len()))
    } else {
        println!("{} rule(s), all valid", rules.len());
        Ok(())
    }
}

fn cmd_favicon(url: &str) -> Result<(), String> {
    let page = reqwest::blocking::get(url)
        .and_then(|r| r.text())
        .map_err(|e| format!("failed to fetch {url}: {e}"))?;

    let doc = Document::parse(&page);
    let href = Selector::parse("link[rel~=icon]")
        .ok()
        .and_then(|sel| sel.query_first(&doc, doc.root()))
        .and_then(|link| doc.attr(link, "href").map(str::to_string))
        .ok_or_else(|| format!("no icon declared at {url}"))?;

    let icon_url = resolve_href(url, &href);
    let response = reqwest::blocking::get(&icon_url)
        .map_err(|e| format!("failed to fetch {icon_url}: {e}"))?;
    let mime = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("image/x-icon")
        .to_string();
    let bytes = response
        .bytes()
        .map_err(|e| format!("failed to read {icon_url}: {e}"))?;

    println!("{}", data_uri(&bytes, &mime));
    if let Some(host) = host_of(url) {
        eprintln!("domain: {host}");
    }
    Ok(())
}
