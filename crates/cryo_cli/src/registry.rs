//! Static command tree.
//!
//! Every command is listed here at compile time. Groups only nest;
//! leaves carry their argument definition and handler.

use std::process::ExitCode;

use clap::{Arg, ArgMatches, Command};
use cryo_core::config::Settings;

use crate::commands;

/// Handler of a leaf command.
pub type RunFn = fn(&ArgMatches, &Settings) -> anyhow::Result<ExitCode>;

/// A node of the command tree.
pub enum CommandNode {
    Leaf {
        name: &'static str,
        about: &'static str,
        /// Adds the leaf's arguments (usually `Args::augment_args`).
        args: fn(Command) -> Command,
        run: RunFn,
    },
    Group {
        name: &'static str,
        about: &'static str,
        children: &'static [CommandNode],
    },
}

impl CommandNode {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Leaf { name, .. } | Self::Group { name, .. } => name,
        }
    }

    fn to_command(&self) -> Command {
        match self {
            Self::Leaf {
                name, about, args, ..
            } => args(Command::new(*name).about(*about)),
            Self::Group {
                name,
                about,
                children,
            } => children.iter().fold(
                Command::new(*name)
                    .about(*about)
                    .subcommand_required(true)
                    .arg_required_else_help(true),
                |cmd, child| cmd.subcommand(child.to_command()),
            ),
        }
    }
}

pub static COMMANDS: &[CommandNode] = &[
    CommandNode::Group {
        name: "aretomo",
        about: "Tomogram alignment and reconstruction with AreTomo",
        children: &[CommandNode::Leaf {
            name: "batch-warp",
            about: "Run AreTomo in batch on data preprocessed in Warp",
            args: commands::batch_warp::args,
            run: commands::batch_warp::run,
        }],
    },
    CommandNode::Group {
        name: "warp",
        about: "Utilities for Warp projects",
        children: &[CommandNode::Leaf {
            name: "parse-xml",
            about: "Print the parameters of a Warp tilt XML as JSON",
            args: commands::parse_xml::args,
            run: commands::parse_xml::run,
        }],
    },
    CommandNode::Group {
        name: "config",
        about: "Manage the settings file",
        children: &[CommandNode::Leaf {
            name: "init",
            about: "Write a settings file with every default spelled out",
            args: commands::config::args,
            run: commands::config::run,
        }],
    },
];

/// Root command with the global `--config` option and the whole tree.
pub fn build_cli(nodes: &[CommandNode]) -> Command {
    let root = Command::new("cryo")
        .version(cryo_core::version())
        .about("Batch processing of cryo-ET tilt series")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_name("FILE")
                .value_parser(clap::value_parser!(std::path::PathBuf))
                .help("Settings file [default: .config/cryo.toml]"),
        );

    nodes
        .iter()
        .fold(root, |cmd, node| cmd.subcommand(node.to_command()))
}

/// Walk the matched subcommand path down to a leaf and run it.
pub fn dispatch(
    nodes: &[CommandNode],
    matches: &ArgMatches,
    settings: &Settings,
) -> anyhow::Result<ExitCode> {
    let Some((name, sub_matches)) = matches.subcommand() else {
        anyhow::bail!("no command given");
    };
    let node = nodes
        .iter()
        .find(|n| n.name() == name)
        .ok_or_else(|| anyhow::anyhow!("unknown command '{}'", name))?;

    match node {
        CommandNode::Leaf { run, .. } => run(sub_matches, settings),
        CommandNode::Group { children, .. } => dispatch(children, sub_matches, settings),
    }
}
