//! csv-filter - Filter CSV lines and columns for words or numerical interval
//!
//! Main entry point for the command-line application.

use clap::Parser;
use std::process;

use csv_filter::cli::Args;
use csv_filter::processor::{FilterConfig, Processor};
use csv_filter::progress::{print_banner, print_error, print_header, print_info};

fn main() {
    // Parse command-line arguments
    let args = Args::parse();

    // Set up logging
    if std::env::var_os("RUST_LOG").is_none() {
        if args.verbose {
            std::env::set_var("RUST_LOG", "debug");
        } else if !args.quiet {
            std::env::set_var("RUST_LOG", "info");
        } else {
            std::env::set_var("RUST_LOG", "error");
        }
    }
    env_logger::init();

    // Run the application
    if let Err(e) = run(args) {
        print_error(&format!("Error: {}", e));

        // Print chain of errors
        for cause in e.chain().skip(1) {
            print_error(&format!("  Caused by: {}", cause));
        }

        process::exit(1);
    }
}

fn run(args: Args) -> anyhow::Result<()> {
    // Print banner unless quiet mode
    if !args.quiet {
        print_banner();
    }

    // Validate arguments
    validate_args(&args)?;

    // Create filter configuration
    let config = FilterConfig::from_args(&args)?;

    // Show configuration
    if !args.quiet && args.verbose {
        print_config(&config);
    }

    let processor = Processor::new(config);
    processor.process()?;

    Ok(())
}

/// Validate command-line arguments
fn validate_args(args: &Args) -> anyhow::Result<()> {
    // Check that input exists
    if !args.input.is_file() {
        anyhow::bail!("Input file does not exist: {:?}", args.input);
    }

    if args.separator.is_empty() {
        anyhow::bail!("String separator must not be empty");
    }

    Ok(())
}

/// Print configuration summary
fn print_config(config: &FilterConfig) {
    print_header("Configuration");

    print_info(&format!("Input:        {:?}", config.input));
    if let Some(ref output) = config.output {
        print_info(&format!("Output:       {:?}", output));
    }
    print_info(&format!("Mode:         {}", config.mode.name()));
    if let Some(ref columns) = config.columns {
        print_info(&format!("Columns:      {:?}", columns));
    }
    print_info(&format!("All words:    {}", config.match_options.all_words));
    print_info(&format!("Whole words:  {}", config.match_options.whole_words));
    print_info(&format!("Ignore case:  {}", config.match_options.ignore_case));
    print_info(&format!("Invert:       {}", config.invert));
    print_info(&format!("Quoting:      {}", config.quoting));
    print_info(&format!("Encoding:     {}", config.encoding));
    print_info(&format!("Short rows:   {:?}", config.on_short_row));
}
