//! FastDeltaMap CLI entry point
//!
//! Translates positional records between assemblies using a MUMmer delta file.

use anyhow::Context;
use clap::{Parser, Subcommand};
use fast_deltamap::core::{decode_file, DeltaFile, Lookup, Orientation};
use fast_deltamap::formats::{lift_file, OutputPaths, TranslateOptions};
use std::path::{Path, PathBuf};
use std::time::Instant;

#[derive(Parser)]
#[command(name = "fast-deltamap")]
#[command(about = "Translate genomic positions through MUMmer delta alignments")]
#[command(version)]
#[command(author = "FastDeltaMap Contributors")]
struct Cli {
    /// Translate reference coordinates into query coordinates instead of query into reference
    #[arg(short = 'r', long, global = true)]
    reverse: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Translate a tab-delimited record file (VCF or similar)
    Records {
        /// Delta file produced by nucmer
        delta: PathBuf,
        /// Input record file; first two fields are sequence name and position
        input: PathBuf,
        /// Output prefix (default: input path); writes <prefix>.map and <prefix>.gap
        #[arg(short = 'o', long = "output-prefix")]
        output_prefix: Option<PathBuf>,
        /// Lines starting with this character are copied to both outputs
        #[arg(long = "comment-char", default_value = "#")]
        comment_char: char,
    },
    /// Translate individual positions given as SEQ:POS
    Lookup {
        /// Delta file produced by nucmer
        delta: PathBuf,
        /// Positions to translate
        #[arg(required = true)]
        positions: Vec<String>,
    },
    /// Decode a delta file and report mapping statistics
    Stats {
        /// Delta file produced by nucmer
        delta: PathBuf,
    },
}

fn load_delta(delta_path: &Path, orientation: Orientation) -> anyhow::Result<DeltaFile> {
    let start = Instant::now();
    log::info!("Creating mapping from {:?} ({})", delta_path, orientation.label());

    let delta = decode_file(delta_path, orientation)
        .with_context(|| format!("Failed to decode delta file {:?}", delta_path))?;

    log::info!("Delta file decoded in {:.2}s", start.elapsed().as_secs_f64());
    Ok(delta)
}

/// Split `SEQ:POS` on its last colon
fn parse_position(text: &str) -> anyhow::Result<(&str, u64)> {
    let (seq, pos) = text
        .rsplit_once(':')
        .with_context(|| format!("Expected SEQ:POS, got '{}'", text))?;
    let pos = pos
        .parse::<u64>()
        .with_context(|| format!("Invalid position in '{}'", text))?;
    Ok((seq, pos))
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    let start = Instant::now();
    let orientation = Orientation::from_reverse(cli.reverse);

    match cli.command {
        Commands::Records { delta, input, output_prefix, comment_char } => {
            anyhow::ensure!(
                comment_char.is_ascii(),
                "Comment character must be ASCII, got '{}'",
                comment_char
            );
            let options = TranslateOptions { comment_marker: comment_char as u8 };

            let outputs = match output_prefix {
                Some(prefix) => OutputPaths::with_prefix(prefix),
                None => OutputPaths::for_input(&input),
            };

            log::info!("Creating mapping from {:?} ({})", delta, orientation.label());
            log::info!("Translating {:?} -> {:?}, {:?}", input, outputs.mapped, outputs.gap);
            let (_, stats) = lift_file(&delta, &input, &outputs, orientation, &options)
                .with_context(|| format!("Failed to lift {:?} through {:?}", input, delta))?;

            eprintln!("\n=== Conversion Statistics ===");
            eprintln!("Total records:   {}", stats.total);
            eprintln!("Mapped:          {}", stats.mapped);
            eprintln!("In gaps:         {}", stats.gap);
            eprintln!("Unmapped:        {}", stats.unmapped);
            eprintln!("Malformed:       {}", stats.malformed);
            eprintln!("Time elapsed:    {:.2}s", start.elapsed().as_secs_f64());
        }

        Commands::Lookup { delta, positions } => {
            let delta = load_delta(&delta, orientation)?;

            for text in &positions {
                let (seq, pos) = parse_position(text)?;
                match delta.mapping.lookup_at(seq, pos) {
                    Some(Lookup::Direct(target)) => println!("{}\t{}\tdirect", text, target),
                    Some(Lookup::Gap(anchor)) => println!("{}\t{}\tgap", text, anchor),
                    None => println!("{}\t.\tunmapped", text),
                }
            }
        }

        Commands::Stats { delta } => {
            let delta = load_delta(&delta, orientation)?;
            let stats = delta.mapping.stats();

            eprintln!("\n=== Delta Statistics ===");
            if let Some(program) = &delta.preamble.program {
                eprintln!("Program:         {}", program);
            }
            eprintln!("Orientation:     {}", orientation.label());
            eprintln!("Alignments:      {}", stats.alignments);
            eprintln!("Blocks:          {}", stats.blocks);
            eprintln!("Indels:          {}", stats.indels);
            eprintln!("Direct entries:  {}", delta.mapping.positions().len());
            eprintln!("Gap entries:     {}", delta.mapping.gaps().len());
            eprintln!("  - No anchor:   {}", stats.gaps_without_anchor);
            eprintln!("  - Superseded:  {}", stats.superseded_gaps);
            eprintln!("Overwritten:     {}", stats.overwritten);
            eprintln!("Time elapsed:    {:.2}s", start.elapsed().as_secs_f64());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_position() {
        assert_eq!(parse_position("chr1:100").unwrap(), ("chr1", 100));
        assert_eq!(parse_position("HLA:A:7").unwrap(), ("HLA:A", 7));
        assert!(parse_position("chr1").is_err());
        assert!(parse_position("chr1:x").is_err());
    }

    #[test]
    fn test_cli_parses_records_command() {
        let cli = Cli::try_parse_from([
            "fast-deltamap", "records", "-r", "a.delta", "calls.vcf", "--comment-char", "@",
        ])
        .unwrap();
        assert!(cli.reverse);
        match cli.command {
            Commands::Records { comment_char, output_prefix, .. } => {
                assert_eq!(comment_char, '@');
                assert!(output_prefix.is_none());
            }
            _ => panic!("expected records command"),
        }
    }
}
