use std::{fs::{self, File, OpenOptions}, io::{self, Write}, path::{Path, PathBuf}};

use chrono::Local;
use tracing::info;

use crate::error::Result;

/// Raw response dumps: bytes exactly as received, no header.
///
/// The file name carries the only metadata,
/// `<command-slug>_<YYYYmmdd_HHMMSS_mmm>.bin`.
///
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn save(&self, name: &str, data: &[u8]) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;

        let stem = format!("{}_{}", slug(name), Local::now().format("%Y%m%d_%H%M%S_%3f"));
        let (path, mut file) = create_unique(&self.dir, &stem)?;
        file.write_all(data)?;
        info!(path = %path.display(), len = data.len(), "saved");

        Ok(path)
    }
}

/// Creates `<stem>.bin`, or the first free `<stem>_<n>.bin`, without ever
/// opening an existing file.
fn create_unique(dir: &Path, stem: &str) -> io::Result<(PathBuf, File)> {
    let mut n = 0;
    loop {
        let path = if n == 0 {
            dir.join(format!("{stem}.bin"))
        } else {
            dir.join(format!("{stem}_{n}.bin"))
        };

        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => return Ok((path, file)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => n += 1,
            Err(e) => return Err(e),
        }
    }
}

/// Lowercase alphanumerics, everything else collapsed to single underscores.
pub fn slug(name: &str) -> String {
    let mut s = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            s.push(c.to_ascii_lowercase());
        } else if !s.is_empty() && !s.ends_with('_') {
            s.push('_');
        }
    }
    while s.ends_with('_') {
        s.pop();
    }
    if s.is_empty() {
        s.push_str("response");
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugs() {
        assert_eq!(slug("POST_INIT 18 - IMAGE CAPTURE"), "post_init_18_image_capture");
        assert_eq!(slug("  Repeat 9 "), "repeat_9");
        assert_eq!(slug("--"), "response");
    }

    #[test]
    fn save_is_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path().join("captures"));
        let data = [0x53, 0x49, 0x47, 0x45, 0x00, 0xff];

        let path = store.save("Finger Capture", &data).unwrap();

        assert_eq!(fs::read(&path).unwrap(), data);
        let file_name = path.file_name().unwrap().to_str().unwrap();
        assert!(file_name.starts_with("finger_capture_"));
        assert!(file_name.ends_with(".bin"));
        assert_eq!(path.parent(), Some(store.dir()));
    }

    #[test]
    fn save_never_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());

        let a = store.save("capture", &[1]).unwrap();
        let b = store.save("capture", &[2]).unwrap();

        assert_ne!(a, b);
        assert_eq!(fs::read(&a).unwrap(), [1]);
        assert_eq!(fs::read(&b).unwrap(), [2]);
    }

    #[test]
    fn existing_files_are_skipped_not_truncated() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("capture.bin"), [0xaa]).unwrap();
        fs::write(dir.path().join("capture_1.bin"), [0xbb]).unwrap();

        let (path, _) = create_unique(dir.path(), "capture").unwrap();

        assert_eq!(path, dir.path().join("capture_2.bin"));
        assert_eq!(fs::read(dir.path().join("capture.bin")).unwrap(), [0xaa]);
        assert_eq!(fs::read(dir.path().join("capture_1.bin")).unwrap(), [0xbb]);
    }
}
