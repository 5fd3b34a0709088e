//! Tilt-series metadata extraction.
//!
//! Reads the sidecar files Warp and SerialEM leave next to the data and
//! turns them into one [`TiltSeriesJob`] per tilt series:
//!
//! ```text
//! <mdoc_dir>/TS_01.mrc.mdoc          -> series name, dose, pixel size, frames
//! <warp_dir>/<frame>.xml             -> manual exclusion, CTF parameters
//! <warp_dir>/imod/TS_01.mrc/*.st     -> stack exported by Warp (required)
//! <warp_dir>/average/{even,odd}/     -> half averages for denoiser training
//! ```
//!
//! Series whose stack is missing are reported as unprocessed rather than
//! failing the whole extraction.

mod extractor;
mod mdoc;
#[cfg(test)]
pub(crate) mod test_support;
mod types;
mod warp_xml;

pub use extractor::{extract, ExtractOptions};
pub use mdoc::{Mdoc, MdocSection};
pub use types::{
    AcquisitionParams, ExtractionReport, Half, MetadataError, MetadataResult, TiltSeriesJob,
    TiltSeriesPaths,
};
pub use warp_xml::TiltXml;
