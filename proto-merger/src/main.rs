use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use parser::load_descriptor_set;
use proto_merger::{MergeOptions, merge};
use tracing::info;

/// Merge a root .proto file and every type it depends on into one file.
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// YAML file with main_proto, additional_message, additional_enum and omit_package_name
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Root file name, relative to its include directory (defaults to the first input)
    #[arg(long)]
    root: Option<String>,

    /// Extra message to emit, by full name
    #[arg(long = "message", value_name = "NAME")]
    messages: Vec<String>,

    /// Extra enum to emit, by full name
    #[arg(long = "enum", value_name = "NAME")]
    enums: Vec<String>,

    /// Package prefix removed from emitted type names
    #[arg(long, value_name = "PKG")]
    omit_package: Option<String>,

    /// Directory searched for imports
    #[arg(short = 'I', long = "proto-path", value_name = "DIR")]
    include_dirs: Vec<PathBuf>,

    /// Write the merged file here instead of stdout
    #[arg(short, long, value_name = "OUT_DIR")]
    out_dir: Option<PathBuf>,

    /// Raise log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    #[arg(required = true)]
    files: Vec<PathBuf>,
}

impl Cli {
    /// Config file values, extended and overridden by the flags.
    fn options(&self) -> Result<MergeOptions> {
        let mut options = match &self.config {
            Some(path) => MergeOptions::load(path)
                .with_context(|| format!("loading config {}", path.display()))?,
            None => MergeOptions::default(),
        };
        if let Some(root) = &self.root {
            options.main_proto = root.clone();
        }
        options.additional_message.extend(self.messages.iter().cloned());
        options.additional_enum.extend(self.enums.iter().cloned());
        if let Some(omit) = &self.omit_package {
            options.omit_package_name = omit.clone();
        }
        Ok(options)
    }

    fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_level())?;

    let mut options = cli.options()?;
    let set = load_descriptor_set(&cli.files, &cli.include_dirs).context("loading proto files")?;
    if options.main_proto.is_empty()
        && let Some(first) = set.files.first()
    {
        options.main_proto = first.name.clone();
    }

    let generated = merge(&set, &options)
        .with_context(|| format!("merging {}", options.main_proto))?;

    match &cli.out_dir {
        Some(dir) => {
            fs::create_dir_all(dir)
                .with_context(|| format!("creating output directory {}", dir.display()))?;
            let path = dir.join(&generated.name);
            fs::write(&path, &generated.content)
                .with_context(|| format!("writing {}", path.display()))?;
            info!(path = %path.display(), "wrote merged file");
        }
        None => io::stdout()
            .write_all(generated.content.as_bytes())
            .context("writing to stdout")?,
    }
    Ok(())
}

fn init_tracing(level: &str) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .context("invalid log filter")?;

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(io::stderr))
        .with(filter)
        .init();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn flags_fill_the_options() {
        let cli = Cli::try_parse_from([
            "proto-merge",
            "--root",
            "api/s.proto",
            "--message",
            "pkg.A",
            "--message",
            "pkg.B",
            "--enum",
            "pkg.E",
            "--omit-package",
            "pkg",
            "-I",
            "protos",
            "-vv",
            "protos/api/s.proto",
        ])
        .unwrap();

        assert_eq!(cli.include_dirs, vec![PathBuf::from("protos")]);
        assert_eq!(cli.log_level(), "debug");
        assert_eq!(
            cli.options().unwrap(),
            MergeOptions {
                main_proto: "api/s.proto".into(),
                additional_message: vec!["pkg.A".into(), "pkg.B".into()],
                additional_enum: vec!["pkg.E".into()],
                omit_package_name: "pkg".into(),
            }
        );
    }

    #[test]
    fn flags_extend_the_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("merge.yaml");
        fs::write(
            &config,
            "main_proto: a.proto\nadditional_message: [pkg.A]\nomit_package_name: pkg\n",
        )
        .unwrap();

        let cli = Cli::try_parse_from([
            "proto-merge",
            "--config",
            config.to_str().unwrap(),
            "--message",
            "pkg.B",
            "a.proto",
        ])
        .unwrap();
        let options = cli.options().unwrap();

        assert_eq!(options.main_proto, "a.proto");
        assert_eq!(options.additional_message, vec!["pkg.A", "pkg.B"]);
        assert_eq!(options.omit_package_name, "pkg");
        assert_eq!(cli.log_level(), "warn");
    }

    #[test]
    fn input_files_are_required() {
        assert!(Cli::try_parse_from(["proto-merge"]).is_err());
    }
}
