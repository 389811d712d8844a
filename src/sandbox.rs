// ABOUTME: Capability-based file sandbox backing the file and CSV natives

use crate::config::FsConfig;
use crate::error::{codes, StepsError};
use cap_std::fs::{Dir, OpenOptions};
use std::io::Write;

/// Sandbox for the file natives. All paths are resolved inside a single
/// capability directory (normally the project root); absolute paths and
/// `..` traversal are rejected before cap-std ever sees them.
pub struct Sandbox {
    root: Dir,
    config: FsConfig,
}

impl Sandbox {
    pub fn new(config: FsConfig) -> Result<Self, StepsError> {
        std::fs::create_dir_all(&config.root).map_err(|e| {
            StepsError::internal(format!("cannot create {}: {}", config.root.display(), e))
        })?;
        let root = Dir::open_ambient_dir(&config.root, cap_std::ambient_authority())
            .map_err(|e| {
                StepsError::internal(format!("cannot open {}: {}", config.root.display(), e))
            })?;
        Ok(Self { root, config })
    }

    fn validate(&self, path: &str) -> Result<(), StepsError> {
        if path.starts_with('/') || path.starts_with('\\') || path.contains(':') {
            return Err(StepsError::runtime(
                codes::NATIVE_ARG,
                format!("`{}` is outside the project directory", path),
            )
            .with_hint("file paths are relative to the project root"));
        }
        if path.split(['/', '\\']).any(|part| part == "..") {
            return Err(StepsError::runtime(
                codes::NATIVE_ARG,
                format!("`{}` is outside the project directory", path),
            )
            .with_hint("file paths cannot use `..`"));
        }
        Ok(())
    }

    pub fn read_file(&self, path: &str) -> Result<String, StepsError> {
        self.validate(path)?;
        self.root.read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StepsError::runtime(codes::NATIVE_ARG, format!("file `{}` does not exist", path))
                    .with_hint("check the path with `file_exists` first")
            } else {
                StepsError::runtime(codes::NATIVE_ARG, format!("cannot read `{}`: {}", path, e))
            }
        })
    }

    pub fn write_file(&self, path: &str, contents: &str) -> Result<(), StepsError> {
        self.validate(path)?;
        self.check_size(path, contents.len())?;
        self.root
            .write(path, contents)
            .map_err(|e| {
                StepsError::runtime(codes::NATIVE_ARG, format!("cannot write `{}`: {}", path, e))
            })
    }

    pub fn append_file(&self, path: &str, contents: &str) -> Result<(), StepsError> {
        self.validate(path)?;
        self.check_size(path, contents.len())?;
        let mut file = self
            .root
            .open_with(
                path,
                OpenOptions::new().create(true).append(true),
            )
            .map_err(|e| {
                StepsError::runtime(codes::NATIVE_ARG, format!("cannot open `{}`: {}", path, e))
            })?;
        file.write_all(contents.as_bytes()).map_err(|e| {
            StepsError::runtime(codes::NATIVE_ARG, format!("cannot append to `{}`: {}", path, e))
        })
    }

    pub fn file_exists(&self, path: &str) -> Result<bool, StepsError> {
        self.validate(path)?;
        match self.root.metadata(path) {
            Ok(metadata) => Ok(metadata.is_file()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StepsError::runtime(
                codes::NATIVE_ARG,
                format!("cannot check `{}`: {}", path, e),
            )),
        }
    }

    fn check_size(&self, path: &str, incoming: usize) -> Result<(), StepsError> {
        if incoming > self.config.max_file_size {
            return Err(StepsError::runtime(
                codes::NATIVE_ARG,
                format!(
                    "writing {} bytes to `{}` exceeds the limit of {} bytes",
                    incoming, path, self.config.max_file_size
                ),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;
    use std::path::PathBuf;

    fn create_test_sandbox() -> (Sandbox, PathBuf) {
        let test_dir = PathBuf::from("./steps_sandbox_test");
        let _ = fs::remove_dir_all(&test_dir);
        fs::create_dir_all(&test_dir).unwrap();

        let config = FsConfig {
            root: test_dir.clone(),
            ..Default::default()
        };
        (Sandbox::new(config).unwrap(), test_dir)
    }

    fn cleanup(test_dir: &PathBuf) {
        let _ = fs::remove_dir_all(test_dir);
    }

    #[test]
    #[serial]
    fn test_write_then_read() {
        let (sandbox, dir) = create_test_sandbox();
        sandbox.write_file("notes.txt", "hello").unwrap();
        assert_eq!(sandbox.read_file("notes.txt").unwrap(), "hello");
        cleanup(&dir);
    }

    #[test]
    #[serial]
    fn test_append() {
        let (sandbox, dir) = create_test_sandbox();
        sandbox.write_file("log.txt", "one\n").unwrap();
        sandbox.append_file("log.txt", "two\n").unwrap();
        assert_eq!(sandbox.read_file("log.txt").unwrap(), "one\ntwo\n");
        cleanup(&dir);
    }

    #[test]
    #[serial]
    fn test_file_exists() {
        let (sandbox, dir) = create_test_sandbox();
        sandbox.write_file("here.txt", "x").unwrap();
        assert!(sandbox.file_exists("here.txt").unwrap());
        assert!(!sandbox.file_exists("gone.txt").unwrap());
        cleanup(&dir);
    }

    #[test]
    #[serial]
    fn test_traversal_rejected() {
        let (sandbox, dir) = create_test_sandbox();
        assert!(sandbox.read_file("../../etc/passwd").is_err());
        assert!(sandbox.read_file("/etc/passwd").is_err());
        cleanup(&dir);
    }

    #[test]
    #[serial]
    fn test_missing_file_is_catchable_runtime_error() {
        let (sandbox, dir) = create_test_sandbox();
        let err = sandbox.read_file("absent.txt").unwrap_err();
        assert!(err.kind.catchable());
        cleanup(&dir);
    }
}
