use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "cohort",
    about = "Cohort screening pipeline: ingest, validate, transform and distribute participant files",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run cohort files through every pipeline stage
    Process(ProcessArgs),
    /// Process cohort files, then extract the pending distribution records
    Extract(ExtractArgs),
    /// Serve the pipeline over HTTP
    Serve(ServeArgs),
}

/// Files to ingest and the configuration to run them under.
#[derive(Args, Debug)]
pub struct InputArgs {
    /// Cohort files, processed in the order given
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,
    #[arg(long = "type", default_value = "json")]
    pub file_type: String,
    /// TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct ProcessArgs {
    #[command(flatten)]
    pub input: InputArgs,
    /// Also print the status row of every record
    #[arg(long)]
    pub records: bool,
}

#[derive(Args, Debug)]
pub struct ExtractArgs {
    #[command(flatten)]
    pub input: InputArgs,
    #[arg(short = 'n', long)]
    pub limit: Option<usize>,
    /// Replay the extraction and check ledger integrity
    #[arg(long)]
    pub verify: bool,
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Overrides `bind_addr` from the config file
    #[arg(long)]
    pub bind: Option<SocketAddr>,
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_process() {
        let cli = Cli::try_parse_from(["cohort", "process", "a.json", "b.json"]).unwrap();
        if let Command::Process(args) = cli.command {
            assert_eq!(args.input.paths, vec![PathBuf::from("a.json"), PathBuf::from("b.json")]);
            assert_eq!(args.input.file_type, "json");
            assert!(args.input.config.is_none());
            assert!(!args.records);
        } else {
            panic!("wrong command");
        }
        assert_eq!(cli.format, OutputFormat::Text);
        assert!(!cli.verbose);
    }

    #[test]
    fn parse_process_options() {
        let cli = Cli::try_parse_from([
            "cohort", "process", "in.csv", "--type", "csv", "-c", "pipeline.toml", "--records",
        ])
        .unwrap();
        if let Command::Process(args) = cli.command {
            assert_eq!(args.input.file_type, "csv");
            assert_eq!(args.input.config, Some(PathBuf::from("pipeline.toml")));
            assert!(args.records);
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn process_needs_a_path() {
        assert!(Cli::try_parse_from(["cohort", "process"]).is_err());
    }

    #[test]
    fn parse_extract() {
        let cli = Cli::try_parse_from(["cohort", "extract", "a.json", "-n", "10", "--verify"]).unwrap();
        if let Command::Extract(args) = cli.command {
            assert_eq!(args.limit, Some(10));
            assert!(args.verify);
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_serve() {
        let cli = Cli::try_parse_from(["cohort", "serve", "--bind", "0.0.0.0:9000"]).unwrap();
        if let Command::Serve(args) = cli.command {
            assert_eq!(args.bind.unwrap().port(), 9000);
            assert!(args.config.is_none());
        } else {
            panic!("wrong command");
        }
        assert!(Cli::try_parse_from(["cohort", "serve", "--bind", "nowhere"]).is_err());
    }

    #[test]
    fn global_flags() {
        let cli = Cli::try_parse_from(["cohort", "extract", "a.json", "--format", "json", "-v"]).unwrap();
        assert_eq!(cli.format, OutputFormat::Json);
        assert!(cli.verbose);
        assert!(Cli::try_parse_from(["cohort", "serve", "--format", "yaml"]).is_err());
    }
}
