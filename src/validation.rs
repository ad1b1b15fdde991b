//! Presamples package directory validation
//!
//! Confirms that a directory holds a readable `datapackage.json` and that every
//! file it references exists and, optionally, still matches its recorded MD5 digest.

use crate::error::{PresamplesError, Result};
use crate::package::Datapackage;
use std::fs;
use std::path::{Component, Path};
use tracing::{debug, warn};

/// Hex MD5 digest of a file's contents
pub fn md5_file(path: &Path) -> Result<String> {
    let bytes = fs::read(path).map_err(|e| PresamplesError::io(path, e))?;
    Ok(format!("{:x}", md5::compute(bytes)))
}

/// Resource files must be relative paths that stay inside the package directory
fn is_package_relative(filepath: &str) -> bool {
    let path = Path::new(filepath);
    path.components().next().is_some()
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

/// Validate a package directory and return its parsed metadata
pub fn validate_presamples_dirpath(
    dirpath: &Path,
    verify_checksums: bool,
    max_metadata_bytes: u64,
) -> Result<Datapackage> {
    if !dirpath.is_dir() {
        return Err(PresamplesError::invalid_package(
            dirpath,
            "not an existing directory",
        ));
    }

    let package = Datapackage::read(dirpath, max_metadata_bytes)?;

    for resource in &package.resources {
        for file in resource.files() {
            if !is_package_relative(&file.filepath) {
                warn!(package_id = %package.id, file = %file.filepath, "Referenced file escapes package");
                return Err(PresamplesError::invalid_package(
                    dirpath,
                    format!("file path '{}' must stay inside the package", file.filepath),
                ));
            }
            let path = dirpath.join(&file.filepath);
            if !path.is_file() {
                warn!(package_id = %package.id, file = %file.filepath, "Referenced file is missing");
                return Err(PresamplesError::invalid_package(
                    dirpath,
                    format!("missing file '{}'", file.filepath),
                ));
            }
            if verify_checksums {
                let actual = md5_file(&path)?;
                if actual != file.md5 {
                    warn!(package_id = %package.id, file = %file.filepath, "Checksum mismatch");
                    return Err(PresamplesError::ChecksumMismatch {
                        path,
                        expected: file.md5.clone(),
                        actual,
                    });
                }
            }
        }
    }

    debug!(
        package_id = %package.id,
        resources = package.resources.len(),
        verify_checksums,
        "Validated presamples directory"
    );
    Ok(package)
}
