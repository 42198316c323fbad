// Artifact naming and exclusive-create writes

use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::error::DumpError;

/// File name of the artifact for `input`: the last path component (either
/// separator) with its last extension replaced by `extension`
pub fn artifact_name(input: &str, extension: &str) -> String {
    let file = input.rsplit(['/', '\\']).next().unwrap_or(input);
    let stem = match file.rfind('.') {
        Some(dot) if dot > 0 => &file[..dot],
        _ => file,
    };
    format!("{}.{}", stem, extension)
}

pub fn artifact_path(output_dir: &Path, input: &str, extension: &str) -> PathBuf {
    output_dir.join(artifact_name(input, extension))
}

/// Result of [`write_artifact`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactWrite {
    Written { bytes: u64 },
    /// Someone else created the artifact first; nothing was replaced
    AlreadyExists,
}

/// Write an artifact without ever replacing an existing one.
///
/// The content goes to a temporary file in the same directory, which is then
/// linked into place with no-clobber semantics. On any failure the temporary
/// file is removed.
pub fn write_artifact<F>(path: &Path, fill: F) -> Result<ArtifactWrite, DumpError>
where
    F: FnOnce(&mut dyn Write) -> Result<(), DumpError>,
{
    let io_error = |source: io::Error| DumpError::Io {
        path: path.to_path_buf(),
        source,
    };

    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(io_error)?;

    let mut temp = NamedTempFile::new_in(dir).map_err(io_error)?;
    {
        let mut writer = BufWriter::new(temp.as_file_mut());
        fill(&mut writer)?;
        writer.flush().map_err(io_error)?;
    }
    let bytes = temp.as_file().metadata().map_err(io_error)?.len();

    match temp.persist_noclobber(path) {
        Ok(_) => Ok(ArtifactWrite::Written { bytes }),
        Err(err) if err.error.kind() == io::ErrorKind::AlreadyExists => Ok(ArtifactWrite::AlreadyExists),
        Err(err) => Err(io_error(err.error)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn test_artifact_name() {
        assert_eq!(artifact_name("main/main.c", "obj"), "main.obj");
        assert_eq!(artifact_name("C:\\src\\Zend\\zend.c", "obj"), "zend.obj");
        assert_eq!(artifact_name("ext/std/file.c.ipp", "obj"), "file.c.obj");
        assert_eq!(artifact_name("Makefile", "obj"), "Makefile.obj");
        assert_eq!(artifact_name(".hidden", "json"), ".hidden.json");
    }

    #[test]
    fn test_write_then_refuse_to_clobber() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("a.obj");

        let first = write_artifact(&path, |w| {
            w.write_all(b"{}").map_err(|source| DumpError::Io {
                path: PathBuf::from("a.obj"),
                source,
            })
        })
        .unwrap();
        assert_eq!(first, ArtifactWrite::Written { bytes: 2 });

        let second = write_artifact(&path, |w| {
            w.write_all(b"[1]").map_err(|source| DumpError::Io {
                path: PathBuf::from("a.obj"),
                source,
            })
        })
        .unwrap();
        assert_eq!(second, ArtifactWrite::AlreadyExists);
        assert_eq!(fs::read_to_string(&path).unwrap(), "{}");
        assert_eq!(fs::read_dir(path.parent().unwrap()).unwrap().count(), 1);
    }

    #[test]
    fn test_failed_fill_leaves_nothing_behind() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("b.obj");

        let result = write_artifact(&path, |_| {
            Err(DumpError::Io {
                path: PathBuf::from("b.obj"),
                source: io::Error::new(io::ErrorKind::Other, "boom"),
            })
        });
        assert!(result.is_err());
        assert!(!path.exists());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
