//! Builds tilt-series jobs from a Warp project directory.

use std::fs;
use std::path::{Path, PathBuf};

use super::mdoc::Mdoc;
use super::types::{
    AcquisitionParams, ExtractionReport, MetadataError, MetadataResult, TiltSeriesJob,
    TiltSeriesPaths,
};
use super::warp_xml::TiltXml;
use crate::runner::ProgressSink;

/// Where to look for data and which series to take.
#[derive(Debug, Clone, Default)]
pub struct ExtractOptions {
    pub warp_dir: PathBuf,
    /// Directory holding `*.mdoc` files. Defaults to `warp_dir`.
    pub mdoc_dir: Option<PathBuf>,
    pub output_dir: PathBuf,
    /// Directory with per-series AreTomo ROI files.
    pub roi_dir: Option<PathBuf>,
    /// Only read these series (`<name>.mdoc`).
    pub just: Vec<String>,
    /// Skip these series.
    pub exclude: Vec<String>,
    /// Require half-average frames for every kept tilt.
    pub train: bool,
}

impl ExtractOptions {
    pub fn mdoc_dir(&self) -> &Path {
        self.mdoc_dir.as_deref().unwrap_or(&self.warp_dir)
    }
}

/// Read all mdocs and Warp XMLs and classify every series.
///
/// Fails on a missing `imod` directory, when no mdoc matches, or on any
/// unreadable or malformed sidecar. Series without a Warp stack, or with
/// every tilt unselected, are reported as unprocessed.
pub fn extract(options: &ExtractOptions, progress: &dyn ProgressSink) -> MetadataResult<ExtractionReport> {
    let imod_dir = options.warp_dir.join("imod");
    if !imod_dir.is_dir() {
        return Err(MetadataError::missing_directory("Warp imod", imod_dir));
    }

    let mdocs = find_mdocs(options)?;
    let task = progress.register("Reading mdocs", mdocs.len());
    let mut report = ExtractionReport::default();

    for mdoc_path in &mdocs {
        let result = read_series(options, mdoc_path);
        progress.advance(task);

        match result? {
            Classified::Ready(job) => report.jobs.push(*job),
            Classified::Excluded(name) => report.excluded.push(name),
            Classified::Unprocessed(name) => report.unprocessed.push(name),
        }
    }
    progress.finish(task);

    tracing::info!(
        "Found {} tilt series ready, {} not preprocessed, {} excluded",
        report.jobs.len(),
        report.unprocessed.len(),
        report.excluded.len()
    );
    Ok(report)
}

enum Classified {
    Ready(Box<TiltSeriesJob>),
    Excluded(String),
    Unprocessed(String),
}

fn find_mdocs(options: &ExtractOptions) -> MetadataResult<Vec<PathBuf>> {
    let mdoc_dir = options.mdoc_dir();

    if !options.just.is_empty() {
        return options
            .just
            .iter()
            .map(|name| {
                let path = mdoc_dir.join(format!("{name}.mdoc"));
                if path.is_file() {
                    Ok(path)
                } else {
                    Err(MetadataError::MissingSidecar {
                        name: name.clone(),
                        path,
                    })
                }
            })
            .collect();
    }

    if !mdoc_dir.is_dir() {
        return Err(MetadataError::missing_directory("mdoc", mdoc_dir));
    }

    let entries = fs::read_dir(mdoc_dir).map_err(|e| MetadataError::io(mdoc_dir, e))?;
    let mut mdocs = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| MetadataError::io(mdoc_dir, e))?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "mdoc") {
            mdocs.push(path);
        }
    }
    mdocs.sort();

    if mdocs.is_empty() {
        return Err(MetadataError::NoSidecars(mdoc_dir.to_path_buf()));
    }
    Ok(mdocs)
}

/// Series name from `ImageFile`, or the mdoc file name minus `.mdoc`.
fn series_name(mdoc: &Mdoc, mdoc_path: &Path) -> String {
    mdoc.image_file_name().map(str::to_string).unwrap_or_else(|| {
        mdoc_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    })
}

fn is_excluded(options: &ExtractOptions, name: &str) -> bool {
    options.exclude.iter().any(|e| e == name)
}

fn read_series(options: &ExtractOptions, mdoc_path: &Path) -> MetadataResult<Classified> {
    // Match the file stem first; excluded mdocs are never parsed
    if let Some(stem) = mdoc_path.file_stem().and_then(|s| s.to_str()) {
        if is_excluded(options, stem) {
            tracing::debug!("{}: excluded", stem);
            return Ok(Classified::Excluded(stem.to_string()));
        }
    }

    let mdoc = Mdoc::from_file(mdoc_path)?;
    let name = series_name(&mdoc, mdoc_path);

    if is_excluded(options, &name) {
        tracing::debug!("{}: excluded", name);
        return Ok(Classified::Excluded(name));
    }

    let mut paths = TiltSeriesPaths::new(
        &name,
        &options.warp_dir,
        &options.output_dir,
        mdoc_path.to_path_buf(),
    );
    if !paths.stack.is_file() {
        tracing::debug!("{}: no stack at {}", name, paths.stack.display());
        return Ok(Classified::Unprocessed(name));
    }

    let even_dir = options.warp_dir.join("average").join("even");
    let odd_dir = options.warp_dir.join("average").join("odd");

    let mut skipped_tilts = Vec::new();
    let mut frames_even = Vec::new();
    let mut frames_odd = Vec::new();
    let mut last_valid: Option<TiltXml> = None;

    for (index, frame) in mdoc.sub_frame_names()?.into_iter().enumerate() {
        let frame = Path::new(frame);
        let xml = TiltXml::from_file(&options.warp_dir.join(frame).with_extension("xml"))?;

        if xml.unselect_manual {
            skipped_tilts.push(index);
            continue;
        }

        let mut average = frame.file_stem().unwrap_or(frame.as_os_str()).to_os_string();
        average.push(".mrc");
        frames_even.push(even_dir.join(&average));
        frames_odd.push(odd_dir.join(&average));
        last_valid = Some(xml);
    }

    let Some(xml) = last_valid else {
        tracing::warn!("{}: every tilt was unselected in Warp", name);
        return Ok(Classified::Unprocessed(name));
    };

    if options.train {
        if let Some(missing) = frames_even.iter().chain(&frames_odd).find(|f| !f.is_file()) {
            return Err(MetadataError::MissingFrame(missing.clone()));
        }
    }

    // CTF options are shared across tilts; the last kept tilt is representative
    let bin = xml.bin_times()?;
    let acquisition = AcquisitionParams {
        dose: mdoc.first_f64("ExposureDose")?,
        pixel_size: mdoc.first_f64("PixelSpacing")? * 2f64.powf(bin),
        cs: xml.cs()?,
        voltage_kv: xml.voltage()?,
        defocus: xml.defocus_angstrom()?,
    };

    if let Some(roi_dir) = &options.roi_dir {
        paths.roi = find_roi(roi_dir, &name)?;
    }

    if !skipped_tilts.is_empty() {
        tracing::debug!("{}: skipping tilts {:?}", name, skipped_tilts);
    }

    Ok(Classified::Ready(Box::new(TiltSeriesJob {
        name,
        paths,
        skipped_tilts,
        frames_even,
        frames_odd,
        acquisition,
    })))
}

/// The single file in `roi_dir` whose name starts with the series name.
fn find_roi(roi_dir: &Path, name: &str) -> MetadataResult<Option<PathBuf>> {
    let entries = fs::read_dir(roi_dir).map_err(|e| MetadataError::io(roi_dir, e))?;
    let mut matches = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| MetadataError::io(roi_dir, e))?;
        if entry.file_name().to_string_lossy().starts_with(name) {
            matches.push(entry.path());
        }
    }

    if matches.len() == 1 {
        Ok(matches.pop())
    } else {
        if matches.len() > 1 {
            tracing::warn!("{}: {} ROI files match, using none", name, matches.len());
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::test_support::WarpFixture;
    use crate::runner::{NullProgress, RecordingProgress};

    #[test]
    fn builds_jobs_for_ready_series() {
        let fixture = WarpFixture::new();
        fixture.add_series("TS_01.mrc", &[false, false, false]);
        fixture.add_series("TS_02.mrc", &[false, false]);

        let progress = RecordingProgress::new();
        let report = extract(&fixture.options(), &progress).unwrap();

        assert_eq!(report.jobs.len(), 2);
        let job = &report.jobs[0];
        assert_eq!(job.name, "TS_01.mrc");
        assert_eq!(job.frames_even.len(), 3);
        assert!(job.skipped_tilts.is_empty());
        assert_eq!(job.acquisition.voltage_kv, 300);
        assert_eq!(job.acquisition.dose, 3.0);
        assert_eq!(job.acquisition.pixel_size, 1.35);
        assert_eq!(job.acquisition.defocus, 32_100.0);
        assert_eq!(progress.tasks()[0].advanced, 2);
    }

    #[test]
    fn unselected_tilts_are_skipped_and_dropped_from_halves() {
        let fixture = WarpFixture::new();
        fixture.add_series("TS_01.mrc", &[false, true, false]);

        let report = extract(&fixture.options(), &NullProgress).unwrap();
        let job = &report.jobs[0];

        assert_eq!(job.skipped_tilts, vec![1]);
        assert_eq!(job.frames_odd.len(), 2);
        assert!(job
            .frames_even
            .iter()
            .chain(&job.frames_odd)
            .all(|f| !f.to_string_lossy().contains("TS_01.mrc_001")));
    }

    #[test]
    fn missing_stack_is_unprocessed() {
        let fixture = WarpFixture::new();
        fixture.add_series("TS_01.mrc", &[false]);
        fixture.add_mdoc_only("TS_02.mrc", 2);

        let report = extract(&fixture.options(), &NullProgress).unwrap();
        assert_eq!(report.jobs.len(), 1);
        assert_eq!(report.unprocessed, vec!["TS_02.mrc".to_string()]);
    }

    #[test]
    fn all_tilts_unselected_is_unprocessed() {
        let fixture = WarpFixture::new();
        fixture.add_series("TS_01.mrc", &[true, true]);

        let report = extract(&fixture.options(), &NullProgress).unwrap();
        assert!(report.jobs.is_empty());
        assert_eq!(report.unprocessed, vec!["TS_01.mrc".to_string()]);
    }

    #[test]
    fn exclude_and_just_select_series() {
        let fixture = WarpFixture::new();
        fixture.add_series("TS_01.mrc", &[false]);
        fixture.add_series("TS_02.mrc", &[false]);
        fixture.add_series("TS_03.mrc", &[false]);

        let mut options = fixture.options();
        options.exclude = vec!["TS_02.mrc".to_string()];
        let report = extract(&options, &NullProgress).unwrap();
        assert_eq!(report.jobs.len(), 2);
        assert_eq!(report.excluded, vec!["TS_02.mrc".to_string()]);

        let mut options = fixture.options();
        options.just = vec!["TS_03.mrc".to_string()];
        let report = extract(&options, &NullProgress).unwrap();
        assert_eq!(report.jobs.len(), 1);
        assert_eq!(report.jobs[0].name, "TS_03.mrc");
    }

    #[test]
    fn excluded_series_is_not_parsed() {
        let fixture = WarpFixture::new();
        fixture.add_series("TS_01.mrc", &[false]);
        fs::write(fixture.warp_dir().join("TS_02.mrc.mdoc"), "not an mdoc\n").unwrap();

        assert!(matches!(
            extract(&fixture.options(), &NullProgress),
            Err(MetadataError::Malformed { .. })
        ));

        let mut options = fixture.options();
        options.exclude = vec!["TS_02.mrc".to_string()];
        let report = extract(&options, &NullProgress).unwrap();
        assert_eq!(report.jobs.len(), 1);
        assert_eq!(report.excluded, vec!["TS_02.mrc".to_string()]);
    }

    #[test]
    fn requested_series_without_mdoc_is_fatal() {
        let fixture = WarpFixture::new();
        fixture.add_series("TS_01.mrc", &[false]);

        let mut options = fixture.options();
        options.just = vec!["TS_09.mrc".to_string()];
        let err = extract(&options, &NullProgress).unwrap_err();
        assert!(matches!(err, MetadataError::MissingSidecar { .. }));
    }

    #[test]
    fn fatal_directory_errors() {
        let dir = tempfile::tempdir().unwrap();
        let options = ExtractOptions {
            warp_dir: dir.path().to_path_buf(),
            output_dir: dir.path().join("out"),
            ..Default::default()
        };
        assert!(matches!(
            extract(&options, &NullProgress),
            Err(MetadataError::MissingDirectory { .. })
        ));

        fs::create_dir(dir.path().join("imod")).unwrap();
        assert!(matches!(
            extract(&options, &NullProgress),
            Err(MetadataError::NoSidecars(_))
        ));
    }

    #[test]
    fn malformed_xml_aborts() {
        let fixture = WarpFixture::new();
        fixture.add_series("TS_01.mrc", &[false, false]);
        fs::write(fixture.warp_dir().join("TS_01.mrc_001.xml"), "<Movie").unwrap();

        let err = extract(&fixture.options(), &NullProgress).unwrap_err();
        assert!(matches!(err, MetadataError::Malformed { .. }));
    }

    #[test]
    fn training_requires_half_frames() {
        let fixture = WarpFixture::new();
        fixture.add_series("TS_01.mrc", &[false, false]);

        let mut options = fixture.options();
        options.train = true;
        assert!(matches!(
            extract(&options, &NullProgress),
            Err(MetadataError::MissingFrame(_))
        ));

        fixture.add_half_frames("TS_01.mrc", 2);
        assert!(extract(&options, &NullProgress).is_ok());
    }

    #[test]
    fn single_matching_roi_is_used() {
        let fixture = WarpFixture::new();
        fixture.add_series("TS_01.mrc", &[false]);
        fixture.add_series("TS_02.mrc", &[false]);
        let roi_dir = fixture.warp_dir().join("roi");
        fs::create_dir(&roi_dir).unwrap();
        fs::write(roi_dir.join("TS_01.mrc_roi.txt"), "").unwrap();

        let mut options = fixture.options();
        options.roi_dir = Some(roi_dir.clone());
        let report = extract(&options, &NullProgress).unwrap();

        assert_eq!(report.jobs[0].paths.roi, Some(roi_dir.join("TS_01.mrc_roi.txt")));
        assert_eq!(report.jobs[1].paths.roi, None);
    }
}
