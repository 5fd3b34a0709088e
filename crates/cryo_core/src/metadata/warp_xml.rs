//! Warp per-tilt XML reader.
//!
//! Warp writes one XML per movie. Only the root `UnselectManual` attribute
//! and the `<OptionsCTF>` / `<CTF>` parameter blocks are read:
//!
//! ```xml
//! <Movie UnselectManual="True" ...>
//!   <OptionsCTF>
//!     <Param Name="BinTimes" Value="1" />
//!     <Param Name="Voltage" Value="300" />
//!   </OptionsCTF>
//!   <CTF>
//!     <Param Name="Defocus" Value="3.21" />
//!   </CTF>
//! </Movie>
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use super::types::{MetadataError, MetadataResult};

/// Angstrom per micrometer.
const ANGSTROM_PER_MICRON: f64 = 1e4;

/// Parameters of one Warp tilt XML.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TiltXml {
    #[serde(skip)]
    path: PathBuf,
    /// `UnselectManual == "True"`. Warp writes "null" or "False" otherwise.
    pub unselect_manual: bool,
    pub options_ctf: BTreeMap<String, String>,
    pub ctf: BTreeMap<String, String>,
}

impl TiltXml {
    /// Read and parse an XML file.
    pub fn from_file(path: &Path) -> MetadataResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| MetadataError::io(path, e))?;
        Self::parse(path, &content)
    }

    /// Parse XML content. `path` is only used for error messages.
    pub fn parse(path: &Path, content: &str) -> MetadataResult<Self> {
        let doc = roxmltree::Document::parse(content)
            .map_err(|e| MetadataError::malformed(path, e.to_string()))?;
        let root = doc.root_element();

        Ok(Self {
            path: path.to_path_buf(),
            unselect_manual: root.attribute("UnselectManual") == Some("True"),
            options_ctf: read_params(&root, "OptionsCTF"),
            ctf: read_params(&root, "CTF"),
        })
    }

    /// Path the XML was read from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Binning exponent applied by Warp (`BinTimes`).
    pub fn bin_times(&self) -> MetadataResult<f64> {
        self.number(&self.options_ctf, "BinTimes")
    }

    /// Acceleration voltage in kV.
    pub fn voltage(&self) -> MetadataResult<u32> {
        let value = self.number(&self.options_ctf, "Voltage")?;
        Ok(value.round() as u32)
    }

    /// Spherical aberration in mm.
    pub fn cs(&self) -> MetadataResult<f64> {
        self.number(&self.options_ctf, "Cs")
    }

    /// Fitted defocus converted from Warp's µm to the Å AreTomo expects.
    pub fn defocus_angstrom(&self) -> MetadataResult<f64> {
        Ok(self.number(&self.ctf, "Defocus")? * ANGSTROM_PER_MICRON)
    }

    fn number(&self, block: &BTreeMap<String, String>, name: &str) -> MetadataResult<f64> {
        let raw = block
            .get(name)
            .ok_or_else(|| MetadataError::missing_parameter(&self.path, name))?;
        raw.trim().parse().map_err(|_| {
            MetadataError::malformed(&self.path, format!("{} is not a number: '{}'", name, raw))
        })
    }
}

/// Collect `Param Name/Value` pairs of the first child element named `block`.
fn read_params(root: &roxmltree::Node<'_, '_>, block: &str) -> BTreeMap<String, String> {
    root.children()
        .find(|n| n.has_tag_name(block))
        .map(|node| {
            node.children()
                .filter(|n| n.is_element())
                .filter_map(|param| {
                    let name = param.attribute("Name")?;
                    let value = param.attribute("Value")?;
                    Some((name.to_string(), value.to_string()))
                })
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<Movie DataDirectory="" UnselectFilter="False" UnselectManual="null">
  <OptionsCTF>
    <Param Name="Window" Value="512" />
    <Param Name="BinTimes" Value="1" />
    <Param Name="Voltage" Value="300" />
    <Param Name="Cs" Value="2.7" />
  </OptionsCTF>
  <CTF>
    <Param Name="Defocus" Value="3.25" />
    <Param Name="DefocusDelta" Value="0.05" />
  </CTF>
</Movie>"#;

    #[test]
    fn reads_ctf_blocks() {
        let xml = TiltXml::parse(Path::new("a.xml"), SAMPLE).unwrap();
        assert!(!xml.unselect_manual);
        assert_eq!(xml.bin_times().unwrap(), 1.0);
        assert_eq!(xml.voltage().unwrap(), 300);
        assert_eq!(xml.cs().unwrap(), 2.7);
    }

    #[test]
    fn defocus_is_converted_to_angstrom() {
        let xml = TiltXml::parse(Path::new("a.xml"), SAMPLE).unwrap();
        assert!((xml.defocus_angstrom().unwrap() - 32500.0).abs() < 1e-6);
    }

    #[test]
    fn detects_manual_unselect() {
        let content = SAMPLE.replace("UnselectManual=\"null\"", "UnselectManual=\"True\"");
        let xml = TiltXml::parse(Path::new("a.xml"), &content).unwrap();
        assert!(xml.unselect_manual);

        let content = SAMPLE.replace("UnselectManual=\"null\"", "UnselectManual=\"False\"");
        let xml = TiltXml::parse(Path::new("a.xml"), &content).unwrap();
        assert!(!xml.unselect_manual);
    }

    #[test]
    fn missing_parameter_is_reported() {
        let content = SAMPLE.replace("<Param Name=\"Cs\" Value=\"2.7\" />", "");
        let xml = TiltXml::parse(Path::new("a.xml"), &content).unwrap();
        assert!(matches!(xml.cs(), Err(MetadataError::MissingParameter { .. })));
    }

    #[test]
    fn malformed_xml_is_rejected() {
        let result = TiltXml::parse(Path::new("a.xml"), "<Movie><OptionsCTF></Movie>");
        assert!(matches!(result, Err(MetadataError::Malformed { .. })));
    }
}
