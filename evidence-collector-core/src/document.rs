//! Generated evidence files and their temporary-file lifecycle.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use sha2::{Digest, Sha256};
use tempfile::TempPath;
use tracing::{debug, info};

use crate::config::OutputSettings;
use crate::error::DocumentGenerationError;

/// File formats the collectors produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvidenceFormat {
    Csv,
    Xlsx,
}

impl EvidenceFormat {
    pub fn extension(self) -> &'static str {
        match self {
            EvidenceFormat::Csv => "csv",
            EvidenceFormat::Xlsx => "xlsx",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            EvidenceFormat::Csv => "text/csv",
            EvidenceFormat::Xlsx => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }
        }
    }
}

/// A generated evidence file waiting to be uploaded.
///
/// The bytes live in a temporary file that is removed by [`EvidenceDocument::discard`],
/// or when the document is dropped.
#[derive(Debug)]
pub struct EvidenceDocument {
    name: String,
    format: EvidenceFormat,
    path: TempPath,
    sha256: String,
}

impl EvidenceDocument {
    /// Write `contents` to a fresh temporary file and, when a local output path
    /// is configured, to `<local_output_path>/<name>.<ext>` as well.
    pub fn persist(
        name: impl Into<String>,
        format: EvidenceFormat,
        contents: &[u8],
        output: &OutputSettings,
    ) -> Result<Self, DocumentGenerationError> {
        let name = name.into();
        let file_name = format!("{}.{}", name, format.extension());

        if let Some(dir) = &output.local_output_path {
            fs::create_dir_all(dir)?;
            let local_path = dir.join(&file_name);
            fs::write(&local_path, contents)?;
            info!(path = %local_path.display(), "Saved local copy of evidence document");
        }

        let mut tmp = tempfile::Builder::new()
            .prefix("evidence-")
            .suffix(&format!(".{}", format.extension()))
            .tempfile()?;
        tmp.write_all(contents)?;
        tmp.flush()?;
        let path = tmp.into_temp_path();
        let sha256 = format!("{:x}", Sha256::digest(contents));
        debug!(name = %name, path = %path.display(), size = contents.len(), sha256 = %sha256, "Wrote temporary evidence file");

        Ok(Self {
            name,
            format,
            path,
            sha256,
        })
    }

    /// Human readable name, without extension.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn format(&self) -> EvidenceFormat {
        self.format
    }

    /// Name the file is uploaded and saved under, e.g. `pull_request-abc.csv`.
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.name, self.format.extension())
    }

    /// Hex SHA-256 of the document bytes.
    pub fn sha256(&self) -> &str {
        &self.sha256
    }

    /// Location of the temporary file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read(&self) -> io::Result<Vec<u8>> {
        fs::read(&self.path)
    }

    /// Delete the temporary file.
    pub fn discard(self) -> io::Result<()> {
        self.path.close()
    }
}
