//! `cryo aretomo batch-warp`
//!
//! Needs Warp's IMOD stack export (`<warp_dir>/imod/`) and, depending on
//! the steps, ccderaser, AreTomo, newstack and topaz on PATH.

use std::fs;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;
use clap::{ArgMatches, Args, Command, FromArgMatches};
use cryo_core::config::Settings;
use cryo_core::gpu::parse_gpu_list;
use cryo_core::metadata::{extract, ExtractOptions, ExtractionReport};
use cryo_core::orchestrator::{
    create_standard_pipeline, PipelineOptions, PipelineRunResult, ProcessingStep, StartFrom,
    StepPlan,
};
use cryo_core::runner::{LogProgress, ProgressSink};
use cryo_core::tools::{CommandExecutor, DryRunExecutor, SystemExecutor};

use crate::progress::TerminalProgress;

/// Comma-separated GPU ids.
#[derive(Debug, Clone)]
pub struct GpuList(Vec<u32>);

impl FromStr for GpuList {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_gpu_list(s).map(GpuList).map_err(|e| e.to_string())
    }
}

/// Run AreTomo in batch on data preprocessed in Warp.
#[derive(Args, Debug)]
pub struct BatchWarpArgs {
    /// Warp project directory
    warp_dir: PathBuf,

    /// Directory with the mdoc files [default: WARP_DIR]
    #[arg(short, long)]
    mdoc_dir: Option<PathBuf>,

    /// Output directory for all processing [default: WARP_DIR/stemia]
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Directory with AreTomo ROI files named after each tilt series
    #[arg(short, long)]
    roi_dir: Option<PathBuf>,

    /// Only print what would run, without running the commands
    #[arg(short, long)]
    dry_run: bool,

    /// Print individual commands
    #[arg(short, long)]
    verbose: bool,

    /// Only process this tilt series (repeatable)
    #[arg(short, long)]
    just: Vec<String>,

    /// Skip this tilt series (repeatable)
    #[arg(short, long)]
    exclude: Vec<String>,

    /// Unbinned thickness of the sample; reconstructions are 30% thicker
    #[arg(short, long)]
    thickness: Option<u32>,

    /// Binning for AreTomo reconstruction, relative to the Warp stack
    #[arg(short, long)]
    binning: Option<u32>,

    /// Starting tilt axis angle for AreTomo
    #[arg(short = 'a', long, allow_hyphen_values = true)]
    tilt_axis: Option<f64>,

    /// NxN patches for local alignment
    #[arg(short, long)]
    patches: Option<u32>,

    /// Do not correct the tilt angle offset
    #[arg(long)]
    no_tilt_correction: bool,

    /// Overwrite outputs of previous runs
    #[arg(short = 'f', long)]
    overwrite: bool,

    /// Prepare even/odd half tomograms for denoiser training
    #[arg(long)]
    train: bool,

    /// Patch size for topaz denoising; lower it if the GPU runs out of memory
    #[arg(long)]
    topaz_patch_size: Option<u32>,

    /// First step to run, or `auto` to resume after the last complete step
    #[arg(long, default_value = "fix")]
    start_from: StartFrom,

    /// Last step to run
    #[arg(long, default_value = "denoise")]
    stop_at: ProcessingStep,

    /// Command for ccderaser
    #[arg(long)]
    ccderaser: Option<String>,

    /// Command for AreTomo
    #[arg(long)]
    aretomo: Option<String>,

    /// Command for newstack
    #[arg(long)]
    newstack: Option<String>,

    /// Command for topaz
    #[arg(long)]
    topaz: Option<String>,

    /// GPU ids to use, e.g. `0,1` [default: all detected]
    #[arg(long)]
    gpus: Option<GpuList>,

    /// Worker threads for CPU steps
    #[arg(short, long)]
    workers: Option<usize>,

    /// Kill any external process running longer than this
    #[arg(long)]
    timeout_secs: Option<u64>,
}

impl BatchWarpArgs {
    /// File settings with command-line overrides applied.
    fn pipeline_options(&self, settings: &Settings) -> PipelineOptions {
        let mut options = PipelineOptions::from_settings(settings);

        if let Some(cmd) = &self.ccderaser {
            options.fix.command = cmd.clone();
        }
        if let Some(cmd) = &self.aretomo {
            options.aretomo.command = cmd.clone();
        }
        if let Some(cmd) = &self.newstack {
            options.stack.command = cmd.clone();
        }
        if let Some(cmd) = &self.topaz {
            options.denoise.command = cmd.clone();
        }

        let aretomo = &mut options.aretomo;
        aretomo.thickness = self.thickness.unwrap_or(aretomo.thickness);
        aretomo.binning = self.binning.unwrap_or(aretomo.binning);
        aretomo.tilt_axis = self.tilt_axis.or(aretomo.tilt_axis);
        aretomo.patches = self.patches.or(aretomo.patches);
        aretomo.tilt_correction &= !self.no_tilt_correction;

        if let Some(size) = self.topaz_patch_size {
            options.denoise.patch_size = size;
        }

        let run = &mut options.run;
        run.overwrite = self.overwrite;
        run.dry_run = self.dry_run;
        run.verbose = self.verbose;
        run.workers = self.workers.unwrap_or(run.workers).max(1);
        if let Some(secs) = self.timeout_secs {
            run.timeout = Some(Duration::from_secs(secs));
        }

        if let Some(GpuList(ids)) = &self.gpus {
            options.gpus = Some(ids.clone());
        }
        options
    }
}

pub fn args(cmd: Command) -> Command {
    BatchWarpArgs::augment_args(cmd)
}

pub fn run(matches: &ArgMatches, settings: &Settings) -> anyhow::Result<ExitCode> {
    let args = BatchWarpArgs::from_arg_matches(matches)?;
    let options = args.pipeline_options(settings);

    let warp_dir = args
        .warp_dir
        .canonicalize()
        .with_context(|| format!("Warp directory {}", args.warp_dir.display()))?;
    let mdoc_dir = match &args.mdoc_dir {
        Some(dir) => canonical_dir("mdoc", dir)?,
        None => warp_dir.clone(),
    };
    // AreTomo runs inside the output directory; ROI paths must be absolute
    let roi_dir = args
        .roi_dir
        .as_deref()
        .map(|dir| canonical_dir("ROI", dir))
        .transpose()?;
    let output_dir = args
        .output_dir
        .clone()
        .unwrap_or_else(|| warp_dir.join("stemia"));
    fs::create_dir_all(&output_dir)
        .with_context(|| format!("creating output directory {}", output_dir.display()))?;
    let output_dir = output_dir.canonicalize()?;

    let progress: Box<dyn ProgressSink> = if std::io::stderr().is_terminal() {
        Box::new(TerminalProgress::new())
    } else {
        Box::new(LogProgress::new(settings.logging.progress_step))
    };

    let extract_options = ExtractOptions {
        warp_dir: warp_dir.clone(),
        mdoc_dir: Some(mdoc_dir),
        output_dir,
        roi_dir,
        just: args.just.clone(),
        exclude: args.exclude.clone(),
        train: args.train,
    };
    let report = extract(&extract_options, progress.as_ref())?;

    let plan = StepPlan::resolve(args.start_from, args.stop_at, args.train, &report.jobs)?;
    print_overview(&extract_options, &report, &plan, &options);

    let executor: Box<dyn CommandExecutor> = if options.run.dry_run {
        Box::new(DryRunExecutor::default())
    } else {
        Box::new(SystemExecutor::new().with_timeout(options.run.timeout))
    };

    let result = create_standard_pipeline(&options).run(
        &plan,
        &report.jobs,
        &options,
        executor.as_ref(),
        progress.as_ref(),
    )?;

    print_summary(&result);
    Ok(if result.succeeded() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(2)
    })
}

fn canonical_dir(what: &str, dir: &Path) -> anyhow::Result<PathBuf> {
    dir.canonicalize()
        .with_context(|| format!("{} directory {}", what, dir.display()))
}

fn print_list<I, S>(title: &str, items: I)
where
    I: IntoIterator<Item = S>,
    S: std::fmt::Display,
{
    println!("{title}:");
    for item in items {
        println!("    - {item}");
    }
}

fn print_overview(
    extract: &ExtractOptions,
    report: &ExtractionReport,
    plan: &StepPlan,
    options: &PipelineOptions,
) {
    println!("Started: {}", chrono::Local::now().format("%Y-%m-%d %H:%M:%S"));
    println!("Warp directory: {}", extract.warp_dir.display());
    println!("Mdoc directory: {}", extract.mdoc_dir().display());
    println!("Output directory: {}", extract.output_dir.display());
    print_list("Tilt series - NOT READY", &report.unprocessed);
    print_list("Tilt series - EXCLUDED", &report.excluded);
    print_list("Tilt series - READY", report.jobs.iter().map(|j| &j.name));
    print_list(
        "Processing steps",
        plan.entries()
            .iter()
            .map(|(step, on)| format!("[{}] {}", if *on { "x" } else { " " }, step)),
    );

    let run = &options.run;
    print_list(
        "Run options",
        [
            format!("overwrite: {}", run.overwrite),
            format!("dry_run: {}", run.dry_run),
            format!("verbose: {}", run.verbose),
            format!("workers: {}", run.workers),
            format!(
                "timeout: {}",
                run.timeout
                    .map_or_else(|| "none".to_string(), |t| format!("{}s", t.as_secs()))
            ),
        ],
    );

    let aretomo = &options.aretomo;
    let optional = |v: Option<String>| v.unwrap_or_else(|| "none".to_string());
    print_list(
        "AreTomo options",
        [
            format!("cmd: {}", aretomo.command),
            format!("tilt_axis: {}", optional(aretomo.tilt_axis.map(|a| a.to_string()))),
            format!("patches: {}", optional(aretomo.patches.map(|p| p.to_string()))),
            format!("thickness_align: {}", aretomo.thickness),
            format!("thickness_recon: {}", aretomo.recon_thickness()),
            format!("binning: {}", aretomo.binning),
            format!("tilt_correction: {}", aretomo.tilt_correction),
        ],
    );
    println!();
}

fn print_summary(result: &PipelineRunResult) {
    println!();
    println!("{:<30} {:>9} {:>7} {:>6} {:>8}", "Batch", "completed", "skipped", "failed", "time");
    for summary in &result.summaries {
        println!(
            "{:<30} {:>9} {:>7} {:>6} {:>7.1}s",
            summary.label,
            summary.completed_count(),
            summary.skipped_count(),
            summary.failed_count(),
            summary.elapsed.as_secs_f64()
        );
    }
    if result.total_failed() > 0 {
        println!("\n{} jobs failed; see the log above for details.", result.total_failed());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Cli {
        #[command(flatten)]
        args: BatchWarpArgs,
    }

    fn parse(argv: &[&str]) -> BatchWarpArgs {
        let mut full = vec!["batch-warp"];
        full.extend_from_slice(argv);
        Cli::try_parse_from(full).unwrap().args
    }

    #[test]
    fn defaults_match_settings() {
        let args = parse(&["/data/warp"]);
        let options = args.pipeline_options(&Settings::default());

        assert_eq!(args.start_from, StartFrom::Step(ProcessingStep::Fix));
        assert_eq!(args.stop_at, ProcessingStep::Denoise);
        assert_eq!(options.aretomo.thickness, 1200);
        assert_eq!(options.aretomo.binning, 4);
        assert_eq!(options.aretomo.recon_thickness(), 1560);
        assert_eq!(options.denoise.patch_size, 32);
        assert!(options.gpus.is_none());
        assert!(!options.run.dry_run);
    }

    #[test]
    fn flags_override_settings() {
        let mut settings = Settings::default();
        settings.aretomo.binning = 8;
        settings.aretomo.patches = Some(3);

        let args = parse(&[
            "/data/warp",
            "-b",
            "2",
            "--tilt-axis",
            "-85.2",
            "--gpus",
            "0,2",
            "--aretomo",
            "AreTomo2",
            "--no-tilt-correction",
            "-j",
            "TS_01.mrc",
            "-j",
            "TS_02.mrc",
            "--start-from",
            "auto",
            "--stop-at",
            "reconstruct",
            "-df",
        ]);
        let options = args.pipeline_options(&settings);

        assert_eq!(options.aretomo.binning, 2);
        assert_eq!(options.aretomo.patches, Some(3));
        assert_eq!(options.aretomo.tilt_axis, Some(-85.2));
        assert_eq!(options.aretomo.command, "AreTomo2");
        assert!(!options.aretomo.tilt_correction);
        assert_eq!(options.gpus, Some(vec![0, 2]));
        assert_eq!(args.just, vec!["TS_01.mrc", "TS_02.mrc"]);
        assert_eq!(args.start_from, StartFrom::Auto);
        assert_eq!(args.stop_at, ProcessingStep::Reconstruct);
        assert!(options.run.dry_run);
        assert!(options.run.overwrite);
    }

    #[test]
    fn relative_directories_become_absolute() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("x")).unwrap();
        let resolved = canonical_dir("ROI", &dir.path().join("x").join("..")).unwrap();
        assert!(resolved.is_absolute());
        assert_eq!(resolved, dir.path().canonicalize().unwrap());

        assert!(canonical_dir("ROI", Path::new("definitely/not/here")).is_err());
    }

    #[test]
    fn rejects_unknown_step_and_bad_gpu_list() {
        let cli = |argv: &[&str]| Cli::try_parse_from(argv.iter().copied());
        assert!(cli(&["batch-warp", "/w", "--stop-at", "normalize"]).is_err());
        assert!(cli(&["batch-warp", "/w", "--gpus", "a,b"]).is_err());
    }
}
