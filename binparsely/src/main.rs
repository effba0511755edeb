//! Parsely command-line tool for checking and transcoding Parsely documents.
//!
//! Usage: parsely [OPTIONS] [FILE|DIR]
//!
//! Reads a document (or every `.prs`/`.md` file in a directory), resolves
//! its lookups and writes the result as JSON, YAML, TOML, CBOR or Parsely.
//! JSON, YAML and TOML input is accepted too, so the tool can also turn
//! data files into Parsely documents.

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser, ValueEnum};
use libparsely::{
    parse_document, parse_file, serialize_with, transcode, AppContext, Diagnostic, ParseOptions,
    SerializeOptions, Value,
};
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{debug, Level};
use tracing_subscriber::EnvFilter;

mod cbor;

#[derive(Parser, Debug)]
#[command(name = "parsely")]
#[command(version)]
#[command(about = "Check and transcode Parsely documents")]
struct Cli {
    /// Input file or directory (reads stdin if omitted or `-`)
    input: Option<PathBuf>,

    /// Input format [default: inferred from the file extension, else parsely]
    #[arg(short, long, value_enum)]
    from: Option<InputFormat>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    to: OutputFormat,

    /// Write output to this file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Write output next to each input file, with the output format's extension
    #[arg(short, long)]
    write: bool,

    /// Directory for --write output instead of the input's directory
    #[arg(long, env = "PARSELY_OUTPUT")]
    out_dir: Option<PathBuf>,

    /// Only check the input: exit non-zero on errors or diagnostics
    #[arg(long)]
    check: bool,

    /// Base directory for `$dir/` lookups in text read from stdin
    #[arg(long, env = "PARSELY_CONTENTS")]
    contents: Option<PathBuf>,

    /// Base directory for `$data/` lookups
    #[arg(long, env = "PARSELY_DATASTORE")]
    datastore: Option<PathBuf>,

    /// Spaces per indentation level
    #[arg(long, env = "PARSELY_TAB_WIDTH", default_value_t = libparsely::DEFAULT_TAB_WIDTH)]
    tab_width: usize,

    /// Largest document, in bytes, that will be read (files, lookups and stdin)
    #[arg(long, env = "PARSELY_MAX_FILE_SIZE")]
    max_file_size: Option<u64>,

    /// Nest Parsely output under this key
    #[arg(long)]
    namespace: Option<String>,

    /// Write Parsely output with dotted keys instead of nested blocks
    #[arg(long)]
    inline: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum InputFormat {
    #[value(alias = "prs")]
    Parsely,
    Json,
    #[value(alias = "yml")]
    Yaml,
    Toml,
}

impl InputFormat {
    fn from_path(path: &Path) -> Self {
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        match extension.as_str() {
            "json" => InputFormat::Json,
            "yaml" | "yml" => InputFormat::Yaml,
            "toml" => InputFormat::Toml,
            _ => InputFormat::Parsely,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    #[value(alias = "prs")]
    Parsely,
    Json,
    #[value(alias = "yml")]
    Yaml,
    Toml,
    Cbor,
}

impl OutputFormat {
    fn extension(self) -> &'static str {
        match self {
            OutputFormat::Parsely => "prs",
            OutputFormat::Json => "json",
            OutputFormat::Yaml => "yaml",
            OutputFormat::Toml => "toml",
            OutputFormat::Cbor => "cbor",
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(&cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_target(false)
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .init();
}

fn build_context(cli: &Cli) -> AppContext {
    let cwd = PathBuf::from(".");
    let mut options = ParseOptions::default().with_tab_width(cli.tab_width);
    if let Some(limit) = cli.max_file_size {
        options = options.with_max_file_size(limit);
    }
    let mut context = AppContext::new(&cwd).with_options(options);
    if let Some(dir) = &cli.contents {
        context = context.with_contents_dir(dir);
    }
    if let Some(dir) = &cli.datastore {
        context = context.with_datastore_dir(dir);
    }
    if let Some(dir) = &cli.out_dir {
        context = context.with_output_dir(dir);
    }
    context
}

/// Returns `Ok(false)` when every input was read but some had problems.
fn run(cli: &Cli) -> Result<bool> {
    let context = build_context(cli);

    match &cli.input {
        Some(path) if path.is_dir() => process_directory(cli, &context, path),
        Some(path) if path.as_os_str() != "-" => process_input(cli, &context, Some(path)),
        _ => process_input(cli, &context, None),
    }
}

fn process_directory(cli: &Cli, context: &AppContext, dir: &Path) -> Result<bool> {
    if cli.output.is_some() {
        bail!("--output cannot be used with a directory; use --write instead");
    }

    let mut paths: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("reading directory {}", dir.display()))?
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .is_some_and(|e| e == "prs" || e == "md")
        })
        .collect();
    paths.sort();

    let mut all_ok = true;
    for path in &paths {
        match process_input(cli, context, Some(path)) {
            Ok(ok) => all_ok &= ok,
            Err(e) => {
                eprintln!("Error: {:#}", e);
                all_ok = false;
            }
        }
    }
    Ok(all_ok)
}

fn process_input(cli: &Cli, context: &AppContext, path: Option<&Path>) -> Result<bool> {
    let format = cli
        .from
        .or_else(|| path.map(InputFormat::from_path))
        .unwrap_or(InputFormat::Parsely);
    let name = path.map_or_else(|| "<stdin>".to_string(), |p| p.display().to_string());
    debug!(input = %name, ?format, "processing input");

    let (value, diagnostics) = match format {
        InputFormat::Parsely => {
            let parsed = match path {
                Some(path) => parse_file(path, context)?,
                None => parse_document(&read_stdin(context)?, context)?,
            };
            (parsed.value, parsed.diagnostics)
        }
        data_format => {
            let text = match path {
                Some(path) => fs::read_to_string(path)
                    .with_context(|| format!("reading {}", path.display()))?,
                None => read_stdin(context)?,
            };
            let decoded = match data_format {
                InputFormat::Json => transcode::json::decode(&text),
                InputFormat::Yaml => transcode::yaml::decode(&text),
                _ => transcode::toml::decode(&text),
            };
            (decoded.map_err(anyhow::Error::msg).with_context(|| name.clone())?, Vec::new())
        }
    };

    if cli.check {
        return Ok(report_check(&name, &diagnostics));
    }

    let bytes = encode_output(cli, &value).with_context(|| format!("converting {}", name))?;
    write_output(cli, context, path, &bytes)?;
    Ok(true)
}

fn report_check(name: &str, diagnostics: &[Diagnostic]) -> bool {
    if diagnostics.is_empty() {
        return true;
    }
    eprintln!("{}: {} problem(s)", name, diagnostics.len());
    for diagnostic in diagnostics {
        eprintln!("  - {}", diagnostic);
    }
    false
}

fn encode_output(cli: &Cli, value: &Value) -> Result<Vec<u8>> {
    let text = match cli.to {
        OutputFormat::Parsely => {
            let options = SerializeOptions {
                namespace: cli.namespace.clone(),
                inline: cli.inline,
                blob_keys: Vec::new(),
            };
            serialize_with(value, &options)?
        }
        OutputFormat::Json => transcode::json::encode(value).map_err(anyhow::Error::msg)?,
        OutputFormat::Yaml => transcode::yaml::encode(value).map_err(anyhow::Error::msg)?,
        OutputFormat::Toml => transcode::toml::encode(value).map_err(anyhow::Error::msg)?,
        OutputFormat::Cbor => {
            return cbor::encode(value).map_err(anyhow::Error::msg);
        }
    };
    let mut bytes = text.into_bytes();
    if bytes.last() != Some(&b'\n') {
        bytes.push(b'\n');
    }
    Ok(bytes)
}

fn write_output(cli: &Cli, context: &AppContext, input: Option<&Path>, bytes: &[u8]) -> Result<()> {
    let target = if let Some(path) = &cli.output {
        Some(path.clone())
    } else if cli.write {
        let Some(input) = input else {
            bail!("--write requires an input file");
        };
        let file_name = input.with_extension(cli.to.extension());
        Some(match (&context.output_dir, file_name.file_name()) {
            (Some(dir), Some(name)) => dir.join(name),
            _ => file_name,
        })
    } else {
        None
    };

    match target {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
            fs::write(&path, bytes).with_context(|| format!("writing {}", path.display()))
        }
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            handle.write_all(bytes).context("writing to stdout")
        }
    }
}

fn read_stdin(context: &AppContext) -> Result<String> {
    let limit = context.options.max_file_size;
    let mut bytes = Vec::new();
    io::stdin()
        .take(limit.saturating_add(1))
        .read_to_end(&mut bytes)
        .context("reading stdin")?;
    if bytes.len() as u64 > limit {
        bail!("stdin is larger than the limit of {} bytes", limit);
    }
    String::from_utf8(bytes).context("stdin is not valid UTF-8")
}
