//! Subprocess management and JSON IPC for the bridge process.

use std::cell::{Cell, RefCell};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Stdio};
use std::rc::Rc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use excel_com_protocol::{Command, Request, Response, ResponseData, ResponseResult, Variant};

use crate::error::{BridgeError, Result};
use crate::object::RemoteObject;

/// Environment variable naming the bridge executable.
pub const BRIDGE_EXE_ENV: &str = "SHEETLINK_EXCEL_BRIDGE";

const BRIDGE_EXE_NAME: &str = "excel-com-bridge.exe";

/// Configuration for the Excel COM bridge.
#[derive(Debug, Clone)]
pub struct ExcelBridgeConfig {
    /// Path to the `excel-com-bridge.exe` Windows executable.
    /// If None, `SHEETLINK_EXCEL_BRIDGE` and the directory of the current
    /// binary are searched.
    pub bridge_exe_path: Option<PathBuf>,

    /// WINE executable used to run the bridge; `None` runs it directly.
    pub wine_path: Option<PathBuf>,

    /// Optional WINEPREFIX to use (for isolating the WINE environment).
    pub wine_prefix: Option<PathBuf>,

    /// How long to wait for the bridge to answer its first command.
    pub startup_timeout: Duration,
}

impl Default for ExcelBridgeConfig {
    fn default() -> Self {
        Self {
            bridge_exe_path: None,
            wine_path: if cfg!(windows) {
                None
            } else {
                Some(PathBuf::from("wine"))
            },
            wine_prefix: None,
            startup_timeout: Duration::from_secs(30),
        }
    }
}

impl ExcelBridgeConfig {
    /// Locate the bridge executable.
    pub fn resolve_bridge_exe(&self) -> Result<PathBuf> {
        let explicit = self
            .bridge_exe_path
            .clone()
            .or_else(|| std::env::var_os(BRIDGE_EXE_ENV).map(PathBuf::from));
        if let Some(path) = explicit {
            return if path.exists() {
                Ok(path)
            } else {
                Err(BridgeError::BridgeExeNotFound(path.display().to_string()))
            };
        }
        find_bridge_exe().ok_or_else(|| BridgeError::BridgeExeNotFound(BRIDGE_EXE_NAME.into()))
    }
}

/// Handle to a running bridge process.
///
/// Clones share one connection. The connection is single-threaded: remote
/// objects are only meaningful on the thread that owns the COM apartment.
#[derive(Clone)]
pub struct ExcelBridge {
    inner: Rc<Connection>,
}

struct Connection {
    child: RefCell<Option<Child>>,
    writer: RefCell<Box<dyn Write>>,
    lines: Receiver<std::io::Result<String>>,
    next_id: Cell<u64>,
    closed: Cell<bool>,
    wine_hosted: bool,
}

impl ExcelBridge {
    /// Start the bridge process and initialize COM.
    pub fn start(config: &ExcelBridgeConfig) -> Result<Self> {
        let exe_path = config.resolve_bridge_exe()?;

        let mut cmd = match &config.wine_path {
            Some(wine) => {
                let mut cmd = std::process::Command::new(wine);
                if let Some(prefix) = &config.wine_prefix {
                    cmd.env("WINEPREFIX", prefix);
                }
                cmd.arg(&exe_path);
                cmd
            }
            None => std::process::Command::new(&exe_path),
        };
        cmd.stdin(Stdio::piped());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::inherit()); // Bridge diagnostics go to our stderr

        let mut child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound && config.wine_path.is_some() {
                BridgeError::WineNotFound
            } else {
                BridgeError::SpawnFailed(e)
            }
        })?;

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            let _ = child.kill();
            return Err(BridgeError::NotRunning);
        };
        tracing::info!(exe = %exe_path.display(), pid = child.id(), "started excel bridge");

        let bridge = Self::connect(
            Box::new(stdin),
            BufReader::new(stdout),
            Some(child),
            config.wine_path.is_some(),
        );
        bridge
            .inner
            .send(Command::Init, Some(config.startup_timeout))?;
        Ok(bridge)
    }

    /// Talk to a bridge over already-open streams. No `init` is sent.
    pub fn from_streams<W, R>(writer: W, reader: R) -> Self
    where
        W: Write + 'static,
        R: BufRead + Send + 'static,
    {
        Self::connect(Box::new(writer), reader, None, false)
    }

    fn connect<R: BufRead + Send + 'static>(
        writer: Box<dyn Write>,
        reader: R,
        child: Option<Child>,
        wine_hosted: bool,
    ) -> Self {
        // responses are read on a separate thread so start-up can time out
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            for line in reader.lines() {
                if tx.send(line).is_err() {
                    break;
                }
            }
        });

        Self {
            inner: Rc::new(Connection {
                child: RefCell::new(child),
                writer: RefCell::new(writer),
                lines: rx,
                next_id: Cell::new(1),
                closed: Cell::new(false),
                wine_hosted,
            }),
        }
    }

    /// Path of a local file as the application sees it.
    pub fn host_path(&self, path: &Path) -> String {
        if self.inner.wine_hosted {
            linux_to_wine_path(path)
        } else {
            path.display().to_string()
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.get()
    }

    /// Attach to the running application registered under `prog_id`.
    pub fn attach_application(&self, prog_id: &str) -> Result<RemoteObject> {
        self.application(Command::AttachApplication {
            prog_id: prog_id.to_string(),
        })
    }

    /// Start a new application instance; it is quit when the bridge shuts down.
    pub fn launch_application(&self, prog_id: &str) -> Result<RemoteObject> {
        self.application(Command::LaunchApplication {
            prog_id: prog_id.to_string(),
        })
    }

    fn application(&self, command: Command) -> Result<RemoteObject> {
        match self.inner.send(command, None)? {
            Some(ResponseData::Application { handle, launched }) => {
                tracing::debug!(handle, launched, "application handle");
                Ok(RemoteObject::new(self.clone(), handle))
            }
            _ => Err(BridgeError::UnexpectedResponse("application")),
        }
    }

    /// Base64 BMP of the bitmap currently on the clipboard.
    pub fn capture_clipboard_image(&self) -> Result<String> {
        match self.inner.send(Command::CaptureClipboardImage, None)? {
            Some(ResponseData::Image { bmp_base64 }) => Ok(bmp_base64),
            _ => Err(BridgeError::UnexpectedResponse("clipboard image")),
        }
    }

    /// Shut down the bridge: release all handles, quit a launched
    /// application and wait for the process to exit. Idempotent.
    pub fn shutdown(&self) -> Result<()> {
        self.inner.shutdown()
    }

    pub(crate) fn get_property(&self, target: u64, name: &str, args: Vec<Variant>) -> Result<Variant> {
        let data = self.inner.send(
            Command::GetProperty {
                target,
                name: name.to_string(),
                args,
            },
            None,
        )?;
        value_of(data, "get_property")
    }

    pub(crate) fn set_property(
        &self,
        target: u64,
        name: &str,
        args: Vec<Variant>,
        value: Variant,
    ) -> Result<()> {
        self.inner.send(
            Command::SetProperty {
                target,
                name: name.to_string(),
                args,
                value,
            },
            None,
        )?;
        Ok(())
    }

    pub(crate) fn call_method(&self, target: u64, name: &str, args: Vec<Variant>) -> Result<Variant> {
        let data = self.inner.send(
            Command::CallMethod {
                target,
                name: name.to_string(),
                args,
            },
            None,
        )?;
        value_of(data, "call_method")
    }

    pub(crate) fn release(&self, handle: u64) -> Result<()> {
        if self.is_closed() {
            return Ok(());
        }
        self.inner.send(Command::Release { handle }, None)?;
        tracing::debug!(handle, "released remote object");
        Ok(())
    }
}

fn value_of(data: Option<ResponseData>, context: &'static str) -> Result<Variant> {
    match data {
        Some(ResponseData::Value { value }) => Ok(value),
        None => Ok(Variant::Empty),
        _ => Err(BridgeError::UnexpectedResponse(context)),
    }
}

impl Connection {
    /// Send a command and wait for its response.
    fn send(&self, command: Command, timeout: Option<Duration>) -> Result<Option<ResponseData>> {
        if self.closed.get() {
            return Err(BridgeError::NotRunning);
        }
        let id = self.next_id.get();
        self.next_id.set(id + 1);

        let request = Request { id, command };
        let json = serde_json::to_string(&request)?;
        tracing::trace!(%json, "bridge request");

        {
            let mut writer = self.writer.borrow_mut();
            writeln!(writer, "{json}").map_err(|e| BridgeError::SendFailed(e.to_string()))?;
            writer
                .flush()
                .map_err(|e| BridgeError::SendFailed(e.to_string()))?;
        }

        let line = match timeout {
            Some(limit) => self.lines.recv_timeout(limit).map_err(|e| match e {
                RecvTimeoutError::Timeout => BridgeError::StartupTimeout(limit),
                RecvTimeoutError::Disconnected => BridgeError::NotRunning,
            })?,
            None => self.lines.recv().map_err(|_| BridgeError::NotRunning)?,
        };
        let line = line.map_err(|e| BridgeError::ReadFailed(e.to_string()))?;
        let response: Response = serde_json::from_str(&line)?;
        if response.id != id {
            return Err(BridgeError::ResponseMismatch {
                expected: id,
                got: response.id,
            });
        }

        match response.result {
            ResponseResult::Ok { data } => Ok(data),
            ResponseResult::Error { message } => Err(BridgeError::Remote(message)),
        }
    }

    fn shutdown(&self) -> Result<()> {
        if self.closed.get() {
            return Ok(());
        }
        let result = self.send(Command::Shutdown, None).map(|_| ());
        self.closed.set(true);

        // Wait for the child process to exit
        if let Some(mut child) = self.child.borrow_mut().take() {
            match child.wait() {
                Ok(status) => tracing::info!(%status, "excel bridge exited"),
                Err(e) => tracing::warn!("failed to wait for excel bridge: {e}"),
            }
        }
        result
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            tracing::warn!("excel bridge shutdown on drop failed: {e}");
            if let Some(mut child) = self.child.borrow_mut().take() {
                let _ = child.kill();
                let _ = child.wait();
            }
        }
    }
}

/// Convert a Linux filesystem path to a WINE (Windows) path.
///
/// WINE maps `/` to `Z:\`, so `/home/user/file.xlsx` becomes `Z:\home\user\file.xlsx`.
pub fn linux_to_wine_path(linux_path: &Path) -> String {
    let abs = if linux_path.is_absolute() {
        linux_path.to_path_buf()
    } else {
        std::env::current_dir().unwrap_or_default().join(linux_path)
    };

    // WINE maps the root filesystem to Z:
    format!("Z:{}", abs.display()).replace('/', "\\")
}

/// Look for the bridge next to the current executable, then in the cargo
/// target directories used during development.
fn find_bridge_exe() -> Option<PathBuf> {
    let beside_exe = std::env::current_exe().ok().and_then(|mut exe| {
        exe.pop();
        let candidate = exe.join(BRIDGE_EXE_NAME);
        candidate.exists().then_some(candidate)
    });

    beside_exe.or_else(|| {
        ["release", "debug"]
            .iter()
            .map(|profile| {
                PathBuf::from(format!("target/x86_64-pc-windows-gnu/{profile}/{BRIDGE_EXE_NAME}"))
            })
            .find(|p| p.exists())
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    /// Captures everything the client writes
    #[derive(Clone, Default)]
    pub(crate) struct Sent(pub Rc<RefCell<Vec<u8>>>);

    impl Write for Sent {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.borrow_mut().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl Sent {
        pub(crate) fn commands(&self) -> Vec<Command> {
            String::from_utf8(self.0.borrow().clone())
                .unwrap()
                .lines()
                .map(|l| serde_json::from_str::<Request>(l).unwrap().command)
                .collect()
        }
    }

    /// A bridge whose responses are scripted in order
    pub(crate) fn scripted(responses: &[Response]) -> (ExcelBridge, Sent) {
        let script: String = responses
            .iter()
            .map(|r| serde_json::to_string(r).unwrap() + "\n")
            .collect();
        let sent = Sent::default();
        let bridge = ExcelBridge::from_streams(sent.clone(), Cursor::new(script.into_bytes()));
        (bridge, sent)
    }

    #[test]
    fn test_attach_returns_application_object() {
        let (bridge, sent) = scripted(&[
            Response::ok(
                1,
                Some(ResponseData::Application {
                    handle: 4,
                    launched: false,
                }),
            ),
            Response::ok(2, None),
        ]);
        let app = bridge.attach_application("Excel.Application").unwrap();
        assert_eq!(app.handle(), 4);
        drop(app);

        assert_eq!(
            sent.commands(),
            vec![
                Command::AttachApplication {
                    prog_id: "Excel.Application".into()
                },
                Command::Release { handle: 4 },
            ]
        );
    }

    #[test]
    fn test_remote_error_is_reported() {
        let (bridge, _) = scripted(&[Response::error(1, "no running instance")]);
        match bridge.attach_application("Excel.Application") {
            Err(BridgeError::Remote(message)) => assert_eq!(message, "no running instance"),
            other => panic!("unexpected result: {:?}", other.map(|o| o.handle())),
        }
    }

    #[test]
    fn test_mismatched_response_id() {
        let (bridge, _) = scripted(&[Response::ok(9, None)]);
        assert!(matches!(
            bridge.capture_clipboard_image(),
            Err(BridgeError::ResponseMismatch { expected: 1, got: 9 })
        ));
    }

    #[test]
    fn test_closed_stream_means_not_running() {
        let (bridge, _) = scripted(&[]);
        assert!(matches!(
            bridge.capture_clipboard_image(),
            Err(BridgeError::NotRunning)
        ));
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let (bridge, sent) = scripted(&[Response::ok(1, None)]);
        bridge.shutdown().unwrap();
        bridge.shutdown().unwrap();
        assert!(bridge.is_closed());
        assert_eq!(sent.commands(), vec![Command::Shutdown]);
    }

    #[test]
    fn test_linux_to_wine_path() {
        assert_eq!(
            linux_to_wine_path(Path::new("/home/user/book.xlsx")),
            "Z:\\home\\user\\book.xlsx"
        );
    }

    #[test]
    fn test_explicit_missing_bridge_exe() {
        let config = ExcelBridgeConfig {
            bridge_exe_path: Some(PathBuf::from("/nonexistent/excel-com-bridge.exe")),
            ..Default::default()
        };
        assert!(matches!(
            config.resolve_bridge_exe(),
            Err(BridgeError::BridgeExeNotFound(_))
        ));
    }
}
