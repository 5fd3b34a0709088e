//! Fixtures shared by unit tests.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use super::extractor::ExtractOptions;
use super::types::{AcquisitionParams, TiltSeriesJob, TiltSeriesPaths};

/// A job with fixed paths under `/warp` and `/out` and three tilts.
pub(crate) fn sample_job(name: &str) -> TiltSeriesJob {
    let paths = TiltSeriesPaths::new(
        name,
        Path::new("/warp"),
        Path::new("/out"),
        PathBuf::from(format!("/warp/{name}.mdoc")),
    );
    let frames = |half: &str| {
        (0..3)
            .map(|i| PathBuf::from(format!("/warp/average/{half}/tilt_{i:03}.mrc")))
            .collect()
    };

    TiltSeriesJob {
        name: name.to_string(),
        paths,
        skipped_tilts: Vec::new(),
        frames_even: frames("even"),
        frames_odd: frames("odd"),
        acquisition: AcquisitionParams {
            dose: 3.0,
            pixel_size: 1.35,
            cs: 2.7,
            voltage_kv: 300,
            defocus: 35_000.0,
        },
    }
}

/// Minimal Warp project in a temporary directory.
pub(crate) struct WarpFixture {
    dir: TempDir,
}

impl WarpFixture {
    pub(crate) fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("imod")).unwrap();
        Self { dir }
    }

    pub(crate) fn warp_dir(&self) -> &Path {
        self.dir.path()
    }

    pub(crate) fn options(&self) -> ExtractOptions {
        ExtractOptions {
            warp_dir: self.warp_dir().to_path_buf(),
            output_dir: self.warp_dir().join("stemia"),
            ..Default::default()
        }
    }

    /// Mdoc, stack and one XML per tilt; `unselected[i]` flags tilt `i`.
    pub(crate) fn add_series(&self, name: &str, unselected: &[bool]) {
        self.add_mdoc_only(name, unselected.len());

        let stack_dir = self.warp_dir().join("imod").join(name);
        fs::create_dir_all(&stack_dir).unwrap();
        fs::write(stack_dir.join(format!("{name}.st")), b"").unwrap();

        for (i, flag) in unselected.iter().enumerate() {
            let unselect = if *flag { "True" } else { "null" };
            let xml = format!(
                r#"<Movie UnselectManual="{unselect}">
  <OptionsCTF>
    <Param Name="BinTimes" Value="1" />
    <Param Name="Voltage" Value="300" />
    <Param Name="Cs" Value="2.7" />
  </OptionsCTF>
  <CTF>
    <Param Name="Defocus" Value="3.21" />
  </CTF>
</Movie>"#
            );
            fs::write(self.warp_dir().join(format!("{name}_{i:03}.xml")), xml).unwrap();
        }
    }

    /// Only the mdoc, as if Warp had not exported the stack yet.
    pub(crate) fn add_mdoc_only(&self, name: &str, tilts: usize) {
        let mut mdoc = format!("PixelSpacing = 0.675\nImageFile = {name}\n\n");
        for i in 0..tilts {
            mdoc.push_str(&format!(
                "[ZValue = {i}]\nTiltAngle = {}\nExposureDose = 3.0\nPixelSpacing = 0.675\n\
                 SubFramePath = X:\\frames\\{name}_{i:03}.tif\n\n",
                i as f64 * 3.0
            ));
        }
        fs::write(self.warp_dir().join(format!("{name}.mdoc")), mdoc).unwrap();
    }

    /// Even and odd averages for the first `tilts` tilts.
    pub(crate) fn add_half_frames(&self, name: &str, tilts: usize) {
        for half in ["even", "odd"] {
            let dir = self.warp_dir().join("average").join(half);
            fs::create_dir_all(&dir).unwrap();
            for i in 0..tilts {
                fs::write(dir.join(format!("{name}_{i:03}.mrc")), b"").unwrap();
            }
        }
    }
}
