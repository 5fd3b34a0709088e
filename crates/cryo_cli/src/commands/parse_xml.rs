//! `cryo warp parse-xml`

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{ArgMatches, Args, Command, FromArgMatches};
use cryo_core::config::Settings;
use cryo_core::metadata::TiltXml;

#[derive(Args, Debug)]
pub struct ParseXmlArgs {
    /// Warp per-tilt XML file
    file: PathBuf,

    /// Single-line output
    #[arg(long)]
    compact: bool,
}

pub fn args(cmd: Command) -> Command {
    ParseXmlArgs::augment_args(cmd)
}

pub fn run(matches: &ArgMatches, _settings: &Settings) -> anyhow::Result<ExitCode> {
    let args = ParseXmlArgs::from_arg_matches(matches)?;
    let xml = TiltXml::from_file(&args.file)?;

    let json = if args.compact {
        serde_json::to_string(&xml)
    } else {
        serde_json::to_string_pretty(&xml)
    }
    .context("serializing XML parameters")?;

    println!("{json}");
    Ok(ExitCode::SUCCESS)
}
