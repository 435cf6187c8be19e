use std::path::{Path, PathBuf};
use std::process::Command;

use log::debug;

use crate::error::{Error, Result};

use super::{base_name, ConversionProvider, DOCX_EXTENSION, PAGES_EXTENSION};

pub const DEFAULT_BINARY: &str = "soffice";
const NAME: &str = "libreoffice";

/// Headless LibreOffice (`soffice --convert-to docx`) run inside a scratch directory.
pub struct LibreOfficeProvider {
    binary: PathBuf,
}

impl Default for LibreOfficeProvider {
    fn default() -> Self {
        Self::new(DEFAULT_BINARY)
    }
}

impl LibreOfficeProvider {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// The configured binary when it is a path, otherwise the first match on `PATH`.
    pub fn resolve_binary(&self) -> Option<PathBuf> {
        if self.binary.components().count() > 1 || self.binary.is_absolute() {
            return self.binary.is_file().then(|| self.binary.clone());
        }
        let path_var = std::env::var_os("PATH")?;
        std::env::split_paths(&path_var).find_map(|dir| find_in_dir(&dir, &self.binary))
    }
}

fn find_in_dir(dir: &Path, binary: &Path) -> Option<PathBuf> {
    let cand = dir.join(binary);
    if cand.is_file() {
        return Some(cand);
    }
    if cfg!(windows) {
        let exe = cand.with_extension("exe");
        if exe.is_file() {
            return Some(exe);
        }
    }
    None
}

/// Name used inside the scratch directory; never escapes it.
fn scratch_file_name(file_name: &str) -> String {
    let name = base_name(file_name).trim();
    if name.is_empty() || name.starts_with('.') {
        format!("input{PAGES_EXTENSION}")
    } else {
        name.to_string()
    }
}

/// `-env:UserInstallation` pointing at a per-run profile, so parallel runs never share a lock.
fn user_installation_arg(profile_dir: &Path) -> Result<String> {
    let url = url::Url::from_directory_path(profile_dir).map_err(|_| {
        Error::provider(NAME, format!("bad profile dir {}", profile_dir.display()))
    })?;
    Ok(format!("-env:UserInstallation={url}"))
}

impl ConversionProvider for LibreOfficeProvider {
    fn name(&self) -> &str {
        NAME
    }

    fn is_available(&self) -> bool {
        self.resolve_binary().is_some()
    }

    fn convert(&self, input: &[u8], file_name: &str) -> Result<Vec<u8>> {
        let binary = self
            .resolve_binary()
            .ok_or_else(|| Error::provider(NAME, format!("{} not found", self.binary.display())))?;

        let dir = tempfile::Builder::new().prefix("toolhub-lo-").tempdir()?;
        let input_name = scratch_file_name(file_name);
        let input_path = dir.path().join(&input_name);
        std::fs::write(&input_path, input)?;

        let profile = user_installation_arg(&dir.path().join("profile"))?;

        debug!("running {} on {}", binary.display(), input_path.display());
        let output = Command::new(&binary)
            .arg(profile)
            .arg("--headless")
            .arg("--convert-to")
            .arg("docx")
            .arg("--outdir")
            .arg(dir.path())
            .arg(&input_path)
            .output()
            .map_err(|e| Error::provider(NAME, format!("spawn {}: {e}", binary.display())))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::provider(
                NAME,
                format!("exit status {}: {}", output.status, stderr.trim()),
            ));
        }

        let stem = Path::new(&input_name)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "input".to_string());
        let out_path = dir.path().join(format!("{stem}{DOCX_EXTENSION}"));
        std::fs::read(&out_path).map_err(|e| {
            Error::provider(NAME, format!("no output at {}: {e}", out_path.display()))
        })
    }
}
