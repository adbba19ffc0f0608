//! Backend selection and session lifetime
//!
//! [`open_file`] prefers a document already open in a running application
//! and falls back to editing the file itself. The returned [`Cleanup`] undoes
//! whatever the chosen backend acquired.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use sheetlink_excel_com::ExcelBridgeConfig;

use crate::backend::Workbook;
use crate::error::{Error, Result};
use crate::file::FileWorkbook;
use crate::live::{self, LiveCleanup};

/// Which backends [`open_file_with`] may use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendPreference {
    /// Live session if the document is open, otherwise the file
    #[default]
    Auto,
    FileOnly,
    LiveOnly,
}

impl FromStr for BackendPreference {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "file" => Ok(Self::FileOnly),
            "live" => Ok(Self::LiveOnly),
            other => Err(format!("unknown backend {other:?}, expected auto, file or live")),
        }
    }
}

impl fmt::Display for BackendPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Auto => "auto",
            Self::FileOnly => "file",
            Self::LiveOnly => "live",
        })
    }
}

/// How the live backend finds its application
#[derive(Debug, Clone)]
pub struct LiveOptions {
    /// Registered program id of the application
    pub prog_id: String,
    /// Start the application and open the document when it is not running
    pub launch_if_missing: bool,
    /// Turn off screen updating and events for the session
    pub suppress_ui: bool,
}

impl Default for LiveOptions {
    fn default() -> Self {
        Self {
            prog_id: "Excel.Application".to_string(),
            launch_if_missing: false,
            suppress_ui: true,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    pub backend: BackendPreference,
    pub bridge: ExcelBridgeConfig,
    pub live: LiveOptions,
}

/// Releases what a session acquired. Runs at most once, on [`Cleanup::run`]
/// or on drop.
#[must_use = "dropping the cleanup ends the session"]
pub struct Cleanup {
    live: Option<LiveCleanup>,
}

impl Cleanup {
    /// Cleanup for a backend that holds nothing outside the workbook
    pub fn none() -> Self {
        Self { live: None }
    }

    fn live(cleanup: LiveCleanup) -> Self {
        Self {
            live: Some(cleanup),
        }
    }

    /// Release everything now. Later calls do nothing.
    pub fn run(&mut self) -> Result<()> {
        match self.live.take() {
            Some(live) => live.close(),
            None => Ok(()),
        }
    }

    pub fn is_done(&self) -> bool {
        self.live.is_none()
    }
}

impl Drop for Cleanup {
    fn drop(&mut self) {
        if let Err(e) = self.run() {
            tracing::warn!("session cleanup failed: {e}");
        }
    }
}

impl fmt::Debug for Cleanup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cleanup")
            .field("live", &self.live.is_some())
            .finish()
    }
}

/// Open the workbook at `path` with the default [`SessionConfig`]
pub fn open_file(path: impl AsRef<Path>) -> Result<(Box<dyn Workbook>, Cleanup)> {
    open_file_with(path, &SessionConfig::default())
}

/// Open the workbook at `path`, choosing the backend per `config`
///
/// `path` must be absolute. With [`BackendPreference::Auto`] any failure of
/// the live backend falls back to the file.
pub fn open_file_with(
    path: impl AsRef<Path>,
    config: &SessionConfig,
) -> Result<(Box<dyn Workbook>, Cleanup)> {
    let path = path.as_ref();
    if !path.is_absolute() {
        return Err(Error::InvalidPath(path.display().to_string()));
    }

    match config.backend {
        BackendPreference::FileOnly => open_file_backend(path),
        BackendPreference::LiveOnly => match live::attach(path, &config.bridge, &config.live)? {
            Some((workbook, cleanup)) => Ok((Box::new(workbook), Cleanup::live(cleanup))),
            None => Err(Error::WorkbookNotFound(path.display().to_string())),
        },
        BackendPreference::Auto => match live::attach(path, &config.bridge, &config.live) {
            Ok(Some((workbook, cleanup))) => Ok((Box::new(workbook), Cleanup::live(cleanup))),
            Ok(None) => {
                tracing::info!(path = %path.display(), "workbook not open in the application, using the file");
                open_file_backend(path)
            }
            Err(e) => {
                tracing::info!(path = %path.display(), "live session unavailable ({e}), using the file");
                open_file_backend(path)
            }
        },
    }
}

fn open_file_backend(path: &Path) -> Result<(Box<dyn Workbook>, Cleanup)> {
    let workbook = FileWorkbook::open(path)?;
    Ok((Box::new(workbook), Cleanup::none()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sheetlink_xlsx::Document;
    use std::path::PathBuf;

    fn unreachable_bridge() -> SessionConfig {
        SessionConfig {
            bridge: ExcelBridgeConfig {
                bridge_exe_path: Some(PathBuf::from("/nonexistent/excel-com-bridge.exe")),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn workbook_file(dir: &Path) -> PathBuf {
        let path = dir.join("book.xlsx");
        Document::new().write_file(&path).unwrap();
        path
    }

    #[test]
    fn test_relative_paths_are_rejected() {
        match open_file("book.xlsx") {
            Err(e) => {
                assert!(matches!(e, Error::InvalidPath(_)));
                assert!(e.is_validation());
            }
            Ok(_) => panic!("relative path was accepted"),
        }
    }

    #[test]
    fn test_file_only_skips_the_application() {
        let dir = tempfile::tempdir().unwrap();
        let path = workbook_file(dir.path());
        let config = SessionConfig {
            backend: BackendPreference::FileOnly,
            ..unreachable_bridge()
        };
        let (workbook, mut cleanup) = open_file_with(&path, &config).unwrap();
        assert_eq!(workbook.backend_name(), "file");
        assert!(cleanup.is_done());
        cleanup.run().unwrap();
        cleanup.run().unwrap();
    }

    #[test]
    fn test_auto_falls_back_to_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = workbook_file(dir.path());
        let (workbook, _cleanup) = open_file_with(&path, &unreachable_bridge()).unwrap();
        assert_eq!(workbook.backend_name(), "file");
        assert_eq!(workbook.sheet_names().unwrap(), vec!["Sheet1"]);
    }

    #[test]
    fn test_live_only_reports_bridge_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = workbook_file(dir.path());
        let config = SessionConfig {
            backend: BackendPreference::LiveOnly,
            ..unreachable_bridge()
        };
        assert!(matches!(open_file_with(&path, &config), Err(Error::Bridge(_))));
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.xlsx");
        let result = open_file_with(&path, &unreachable_bridge());
        assert!(matches!(result, Err(Error::WorkbookNotFound(_))));
    }

    #[test]
    fn test_backend_preference_parses() {
        assert_eq!("auto".parse::<BackendPreference>(), Ok(BackendPreference::Auto));
        assert_eq!("File".parse::<BackendPreference>(), Ok(BackendPreference::FileOnly));
        assert_eq!("live".parse::<BackendPreference>(), Ok(BackendPreference::LiveOnly));
        assert!("excel".parse::<BackendPreference>().is_err());
        assert_eq!(BackendPreference::LiveOnly.to_string(), "live");
    }
}
