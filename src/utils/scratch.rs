//! Scratch storage for the capture log.

use std::path::Path;

use log::debug;
use tempfile::TempDir;

use crate::error::Error;

/// A uniquely named temporary directory created at startup. It is removed by
/// [`remove`](Scratch::remove), or when dropped.
#[derive(Debug)]
pub struct Scratch {
    dir: TempDir,
}
impl Scratch {
    pub fn create() -> Result<Self, Error> {
        let dir = tempfile::Builder::new().prefix("flashloop-").tempdir()?;
        debug!("scratch directory: {}", dir.path().display());
        Ok(Scratch { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn remove(self) -> Result<(), Error> {
        debug!("removing scratch directory {}", self.dir.path().display());
        self.dir.close().map_err(Error::from)
    }
}

#[test]
fn remove_deletes_the_directory_and_its_content() {
    let scratch = Scratch::create().unwrap();
    let path = scratch.path().to_path_buf();
    std::fs::write(path.join("screenlog.0"), b"boot").unwrap();
    assert!(path
        .file_name()
        .unwrap()
        .to_string_lossy()
        .starts_with("flashloop-"));

    scratch.remove().unwrap();
    assert!(!path.exists());
}
