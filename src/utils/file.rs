use std::fs::{self, File};
use std::io::{self, BufWriter};
use std::path::Path;
use log::warn;
use crate::config::defs::PipelineError;


/// Ensures `path` exists as a directory, creating missing parents.
/// An existing directory is left untouched and only produces a warning.
///
/// # Arguments
/// * `path` - Directory to create.
///
/// # Returns
/// true if the directory was created, false if it already existed.
pub fn ensure_dir(path: &Path) -> Result<bool, PipelineError> {
    match fs::metadata(path) {
        Ok(meta) if meta.is_dir() => {
            warn!("Directory {} exists.", path.display());
            Ok(false)
        }
        Ok(_) => Err(PipelineError::NotADirectory(path.to_path_buf())),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            match fs::create_dir_all(path) {
                Ok(()) => Ok(true),
                // Lost a race with another creator.
                Err(_) if path.is_dir() => {
                    warn!("Directory {} exists.", path.display());
                    Ok(false)
                }
                Err(e) => Err(PipelineError::io(path, e)),
            }
        }
        Err(e) => Err(PipelineError::io(path, e)),
    }
}


/// Creates (truncating) the file that receives script-mode command lines.
pub fn create_script_file(path: &Path) -> Result<BufWriter<File>, PipelineError> {
    let file = File::create(path).map_err(|e| PipelineError::io(path, e))?;
    Ok(BufWriter::new(file))
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_dir_creates_nested() -> anyhow::Result<()> {
        let tmp = tempfile::tempdir()?;
        let nested = tmp.path().join("a").join("b").join("c");
        assert!(ensure_dir(&nested)?);
        assert!(nested.is_dir());
        Ok(())
    }

    #[test]
    fn test_ensure_dir_idempotent() -> anyhow::Result<()> {
        let tmp = tempfile::tempdir()?;
        let dir = tmp.path().join("S1-RepA");
        assert!(ensure_dir(&dir)?);
        fs::write(dir.join("keep.txt"), "data")?;

        assert!(!ensure_dir(&dir)?);
        assert_eq!(fs::read_to_string(dir.join("keep.txt"))?, "data");
        Ok(())
    }

    #[test]
    fn test_ensure_dir_on_file_fails() -> anyhow::Result<()> {
        let tmp = tempfile::tempdir()?;
        let file = tmp.path().join("not_a_dir");
        fs::write(&file, "")?;
        let err = ensure_dir(&file).unwrap_err();
        assert!(matches!(err, PipelineError::NotADirectory(_)));
        Ok(())
    }

    #[test]
    fn test_create_script_file_truncates() -> anyhow::Result<()> {
        use std::io::Write;
        let tmp = tempfile::tempdir()?;
        let path = tmp.path().join("run.sh");
        fs::write(&path, "old contents\n")?;
        let mut writer = create_script_file(&path)?;
        writer.write_all(b"new\n")?;
        writer.flush()?;
        assert_eq!(fs::read_to_string(&path)?, "new\n");
        Ok(())
    }
}
