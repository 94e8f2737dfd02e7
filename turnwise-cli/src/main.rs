// Turnwise CLI - transcript processing from the command line
// Reads a raw entry batch, runs the pipeline, and writes display-ready turns

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand, ValueEnum};
use color_eyre::{eyre::Context, Result};
use tracing_subscriber::EnvFilter;
use turnwise_core::adapters::{DocumentSource, JsonlSource};
use turnwise_core::{CanonicalMessage, EntrySource, Pipeline, PipelineStats, Preset, ProcessOptions};

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match &cli.command {
        Command::Process(args) => handle_process(args)?,
        Command::Stats(args) => handle_stats(args)?,
    }
    Ok(())
}

#[derive(Parser, Debug)]
#[command(
    name = "turnwise",
    author,
    version,
    about = "Turnwise: display-ready conversation turns from raw transcripts",
    long_about = "Normalize raw user/assistant/system/tool entries, join tool results to their calls,\nand fold split assistant fragments into single turns."
)]
struct Cli {
    /// Log pipeline diagnostics to stderr (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Process a raw batch and write the resulting messages
    Process(ProcessArgs),
    /// Print aggregate counters for a processed batch
    Stats(StatsArgs),
}

#[derive(Args, Debug)]
struct InputArgs {
    /// Input file (.json, .jsonl) or - for stdin
    #[arg(short, long, default_value = "-")]
    input: String,
    /// Named option set (quick, deep, inline)
    #[arg(short, long, default_value_t = Preset::Quick)]
    preset: Preset,
    /// JSON file with {filterToolMessages, mergeAssistantMessages, enhanceToolCalls, preserveOrder}
    #[arg(long)]
    options: Option<PathBuf>,
    /// Keep tool-role entries in the output
    #[arg(long)]
    no_filter: bool,
    /// Merge content-only assistant fragments into tool-call turns
    #[arg(long)]
    merge: bool,
    /// Attach tool results to their calls
    #[arg(long)]
    enhance: bool,
    /// Leave messages in input order instead of sorting by timestamp
    #[arg(long)]
    no_order: bool,
}

#[derive(Args, Debug)]
struct ProcessArgs {
    #[command(flatten)]
    input: InputArgs,
    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Json)]
    format: OutputFormat,
    /// Write output here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Print a summary of the processed batch to stderr
    #[arg(long)]
    stats: bool,
}

#[derive(Args, Debug)]
struct StatsArgs {
    #[command(flatten)]
    input: InputArgs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// Pretty-printed JSON array
    Json,
    /// One message per line
    Jsonl,
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn handle_process(args: &ProcessArgs) -> Result<()> {
    let options = resolve_options(&args.input)?;
    let entries = open_source(&args.input.input).read_entries()?;
    let input_count = entries.len();

    let (messages, stats) = Pipeline::new(options).run_with_stats(&entries);

    match args.output {
        Some(ref path) => {
            let file = fs::File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
            write_messages(io::BufWriter::new(file), &messages, args.format)?;
        }
        None => write_messages(io::stdout().lock(), &messages, args.format)?,
    }

    if args.stats {
        print_summary(input_count, &stats);
    }

    if let Some(ref path) = args.output {
        eprintln!("✓ Wrote {} messages to {}", messages.len(), path.display());
    }

    Ok(())
}

fn handle_stats(args: &StatsArgs) -> Result<()> {
    let options = resolve_options(&args.input)?;
    let entries = open_source(&args.input.input).read_entries()?;

    let (_, stats) = Pipeline::new(options).run_with_stats(&entries);

    let mut stdout = io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, &stats)?;
    writeln!(stdout)?;
    Ok(())
}

/// Preset first, then the options file, then individual flags
fn resolve_options(args: &InputArgs) -> Result<ProcessOptions> {
    let mut options = match args.options {
        Some(ref path) => load_options_file(path)?,
        None => args.preset.options(),
    };

    if args.no_filter {
        options.filter_tool_messages = false;
    }
    if args.merge {
        options.merge_assistant_messages = true;
    }
    if args.enhance {
        options.enhance_tool_calls = true;
    }
    if args.no_order {
        options.preserve_order = false;
    }

    tracing::debug!(?options, "resolved pipeline options");
    Ok(options)
}

fn load_options_file(path: &Path) -> Result<ProcessOptions> {
    let content = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid options in {}", path.display()))
}

fn open_source(input: &str) -> Box<dyn EntrySource> {
    if input.ends_with(".jsonl") {
        Box::new(JsonlSource::new(PathBuf::from(input)))
    } else {
        Box::new(DocumentSource::from_arg(input))
    }
}

fn write_messages<W: Write>(mut writer: W, messages: &[CanonicalMessage], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut writer, messages)?;
            writeln!(writer)?;
        }
        OutputFormat::Jsonl => {
            for message in messages {
                serde_json::to_writer(&mut writer, message)?;
                writeln!(writer)?;
            }
        }
    }
    writer.flush()?;
    Ok(())
}

fn print_summary(input_count: usize, stats: &PipelineStats) {
    eprintln!("\n📊 Processed {} entries into {} messages", input_count, stats.total_messages);
    eprintln!(
        "  user: {}  assistant: {}  system: {}  tool: {}",
        stats.user_messages, stats.assistant_messages, stats.system_messages, stats.tool_messages
    );
    eprintln!(
        "  tool calls: {} across {} messages ({} ms total, {} ms estimated)",
        stats.total_tool_calls,
        stats.messages_with_tool_calls,
        stats.total_execution_time(),
        stats.estimated_execution_time
    );
    eprintln!(
        "  pending: {}  running: {}  success: {}  error: {}\n",
        stats.pending.count, stats.running.count, stats.success.count, stats.error.count
    );
}
