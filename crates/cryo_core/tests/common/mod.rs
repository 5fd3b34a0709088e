//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use tempfile::TempDir;

use cryo_core::metadata::ExtractOptions;
use cryo_core::orchestrator::{PipelineOptions, RunOptions};
use cryo_core::runner::{JobError, JobResult};
use cryo_core::tools::{CommandExecutor, CommandOutput, ToolCommand};

/// Warp project on disk: mdocs, stacks, per-tilt XMLs and half averages.
pub struct WarpProject {
    dir: TempDir,
}

impl WarpProject {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("imod")).unwrap();
        Self { dir }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn output_dir(&self) -> PathBuf {
        self.path().join("stemia")
    }

    pub fn extract_options(&self) -> ExtractOptions {
        fs::create_dir_all(self.output_dir()).unwrap();
        ExtractOptions {
            warp_dir: self.path().to_path_buf(),
            output_dir: self.output_dir(),
            ..Default::default()
        }
    }

    /// A fully preprocessed series; `unselected[i]` marks tilt `i`.
    pub fn add_series(&self, name: &str, unselected: &[bool]) {
        let mut mdoc = format!("PixelSpacing = 1.0\nImageFile = {name}\n\n");
        for (i, flag) in unselected.iter().enumerate() {
            mdoc.push_str(&format!(
                "[ZValue = {i}]\nTiltAngle = {}\nExposureDose = 2.5\nPixelSpacing = 1.0\n\
                 SubFramePath = D:\\session\\{name}_{i:03}.tif\n\n",
                i as f64 * 3.0
            ));

            let unselect = if *flag { "True" } else { "False" };
            fs::write(
                self.path().join(format!("{name}_{i:03}.xml")),
                format!(
                    r#"<Movie UnselectManual="{unselect}"><OptionsCTF><Param Name="BinTimes" Value="2" /><Param Name="Voltage" Value="300" /><Param Name="Cs" Value="2.7" /></OptionsCTF><CTF><Param Name="Defocus" Value="4.0" /></CTF></Movie>"#
                ),
            )
            .unwrap();

            for half in ["even", "odd"] {
                let dir = self.path().join("average").join(half);
                fs::create_dir_all(&dir).unwrap();
                fs::write(dir.join(format!("{name}_{i:03}.mrc")), b"").unwrap();
            }
        }
        fs::write(self.path().join(format!("{name}.mdoc")), mdoc).unwrap();

        let stack_dir = self.path().join("imod").join(name);
        fs::create_dir_all(&stack_dir).unwrap();
        fs::write(stack_dir.join(format!("{name}.st")), b"").unwrap();
        fs::write(stack_dir.join(format!("{name}.rawtlt")), b"").unwrap();
    }
}

/// Pipeline options pointing every tool at `sh` so the PATH check passes.
pub fn stub_options(gpus: &[u32]) -> PipelineOptions {
    let mut options = PipelineOptions {
        run: RunOptions {
            workers: 4,
            ..Default::default()
        },
        gpus: Some(gpus.to_vec()),
        ..Default::default()
    };
    options.fix.command = "sh".to_string();
    options.aretomo.command = "sh".to_string();
    options.stack.command = "sh".to_string();
    options.denoise.command = "sh".to_string();
    options
}

/// One recorded tool call.
#[derive(Debug, Clone)]
pub struct Call {
    pub kind: &'static str,
    pub args: Vec<String>,
    pub gpu: Option<u32>,
}

/// Executor that writes the outputs a real tool would and records calls.
///
/// Also checks that no GPU id is used by two calls at once.
#[derive(Default)]
pub struct StubExecutor {
    calls: Mutex<Vec<Call>>,
    gpus_in_use: Mutex<HashSet<u32>>,
    peak_gpu_jobs: Mutex<usize>,
    fail_kind: Option<&'static str>,
}

impl StubExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every call of this kind with exit code 1.
    pub fn failing(kind: &'static str) -> Self {
        Self {
            fail_kind: Some(kind),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn calls_of(&self, kind: &str) -> Vec<Call> {
        self.calls().into_iter().filter(|c| c.kind == kind).collect()
    }

    pub fn peak_gpu_jobs(&self) -> usize {
        *self.peak_gpu_jobs.lock()
    }

    pub fn gpus_in_use(&self) -> usize {
        self.gpus_in_use.lock().len()
    }

    fn classify(args: &[String]) -> &'static str {
        let has = |flag: &str| args.iter().any(|a| a == flag);
        if has("-input") {
            "ccderaser"
        } else if has("-AngFile") {
            "align"
        } else if has("-AlnFile") {
            "reconstruct"
        } else if has("denoise3d") {
            "denoise"
        } else {
            "newstack"
        }
    }

    fn value_after(args: &[String], flag: &str) -> Option<String> {
        args.iter()
            .position(|a| a == flag)
            .and_then(|i| args.get(i + 1))
            .cloned()
    }

    fn write_outputs(kind: &str, args: &[String], cwd: &Path) {
        let touch = |path: PathBuf| {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).unwrap();
            }
            fs::write(path, b"stub").unwrap();
        };

        match kind {
            "ccderaser" => touch(cwd.join(Self::value_after(args, "-output").unwrap())),
            "align" => {
                let out = Self::value_after(args, "-OutMrc").unwrap();
                let stripped = out.split('.').next().unwrap().to_string();
                touch(cwd.join(&out));
                touch(cwd.join(format!("{stripped}.aln")));
                touch(cwd.join(format!("{stripped}_Imod")).join(format!("{stripped}.xf")));
            }
            "reconstruct" => touch(cwd.join(Self::value_after(args, "-OutMrc").unwrap())),
            "denoise" => {
                let out_dir = cwd.join(Self::value_after(args, "-o").unwrap());
                let input = PathBuf::from(args.last().unwrap());
                touch(out_dir.join(input.file_name().unwrap()));
            }
            _ => touch(cwd.join(args.last().unwrap())),
        }
    }
}

impl CommandExecutor for StubExecutor {
    fn execute(&self, command: &ToolCommand) -> JobResult<CommandOutput> {
        let args: Vec<String> = command
            .get_args()
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        let kind = Self::classify(&args);
        let gpu = Self::value_after(&args, "-Gpu")
            .or_else(|| Self::value_after(&args, "-d"))
            .and_then(|g| g.parse().ok());

        if let Some(id) = gpu {
            let mut in_use = self.gpus_in_use.lock();
            assert!(in_use.insert(id), "GPU {id} leased twice");
            let mut peak = self.peak_gpu_jobs.lock();
            *peak = (*peak).max(in_use.len());
        }

        self.calls.lock().push(Call {
            kind,
            args: args.clone(),
            gpu,
        });
        thread::sleep(Duration::from_millis(20));

        let result = if self.fail_kind == Some(kind) {
            Err(JobError::command_failed(command.command_line(), Some(1), "stub failure"))
        } else {
            Self::write_outputs(kind, &args, command.cwd().unwrap_or(Path::new("")));
            Ok(CommandOutput::default())
        };

        if let Some(id) = gpu {
            self.gpus_in_use.lock().remove(&id);
        }
        result
    }
}
