//! SerialEM mdoc reader.
//!
//! An mdoc is a flat `key = value` file. Lines before the first
//! `[ZValue = N]` header are global; each header opens a per-tilt section.
//! `[T = ...]` lines are free-text titles and are ignored.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use super::types::{MetadataError, MetadataResult};

/// One `[ZValue = N]` section.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MdocSection {
    pub z_value: usize,
    values: HashMap<String, String>,
}

impl MdocSection {
    /// Raw value of a key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }
}

/// Parsed mdoc file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mdoc {
    path: PathBuf,
    global: HashMap<String, String>,
    pub sections: Vec<MdocSection>,
}

impl Mdoc {
    /// Read and parse an mdoc file.
    pub fn from_file(path: &Path) -> MetadataResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| MetadataError::io(path, e))?;
        Self::parse(path, &content)
    }

    /// Parse mdoc content. `path` is only used for error messages.
    pub fn parse(path: &Path, content: &str) -> MetadataResult<Self> {
        let mut mdoc = Mdoc {
            path: path.to_path_buf(),
            ..Default::default()
        };

        for (lineno, raw) in content.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }

            if let Some(header) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
                let Some((key, value)) = header.split_once('=') else {
                    return Err(MetadataError::malformed(
                        path,
                        format!("line {}: invalid header '{}'", lineno + 1, line),
                    ));
                };
                match key.trim() {
                    "ZValue" => {
                        let z_value = value.trim().parse().map_err(|_| {
                            MetadataError::malformed(
                                path,
                                format!("line {}: invalid ZValue '{}'", lineno + 1, value.trim()),
                            )
                        })?;
                        mdoc.sections.push(MdocSection {
                            z_value,
                            values: HashMap::new(),
                        });
                    }
                    // Titles and other bracketed annotations
                    _ => {}
                }
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim().to_string();
            let value = value.trim().to_string();

            match mdoc.sections.last_mut() {
                Some(section) => section.values.insert(key, value),
                None => mdoc.global.insert(key, value),
            };
        }

        if mdoc.sections.is_empty() {
            return Err(MetadataError::malformed(path, "no [ZValue] sections"));
        }

        Ok(mdoc)
    }

    /// Path the mdoc was read from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Raw global value.
    pub fn global(&self, key: &str) -> Option<&str> {
        self.global.get(key).map(String::as_str)
    }

    /// File name of the `ImageFile` entry, if present.
    ///
    /// SerialEM writes Windows paths, so both separators are honored.
    pub fn image_file_name(&self) -> Option<&str> {
        self.global("ImageFile")
            .map(windows_file_name)
            .filter(|name| !name.is_empty())
    }

    /// File names of every tilt's `SubFramePath`, in section order.
    pub fn sub_frame_names(&self) -> MetadataResult<Vec<&str>> {
        self.sections
            .iter()
            .map(|section| {
                section
                    .get("SubFramePath")
                    .map(windows_file_name)
                    .ok_or_else(|| MetadataError::missing_parameter(&self.path, "SubFramePath"))
            })
            .collect()
    }

    /// Numeric value from the first section, falling back to the global block.
    pub fn first_f64(&self, key: &str) -> MetadataResult<f64> {
        let raw = self
            .sections
            .first()
            .and_then(|s| s.get(key))
            .or_else(|| self.global(key))
            .ok_or_else(|| MetadataError::missing_parameter(&self.path, key))?;

        // PixelSpacing may be written as "x y"; the first value is used
        let first = raw.split_whitespace().next().unwrap_or(raw);
        first.parse().map_err(|_| {
            MetadataError::malformed(&self.path, format!("{} is not a number: '{}'", key, raw))
        })
    }
}

/// Last component of a path that may use `\` or `/` separators.
fn windows_file_name(path: &str) -> &str {
    path.rsplit(['\\', '/']).next().unwrap_or(path).trim()
}
