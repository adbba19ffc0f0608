//! Live workbooks: a document open in a running Excel, driven through the
//! COM bridge
//!
//! The session owns the application, workbook collection and workbook
//! handles. Worksheets hold their own sheet handle plus a reference to the
//! session, so releasing a worksheet never releases its parents. Closing the
//! session releases its handles even while worksheets are still alive; they
//! fail with [`Error::SessionClosed`] from then on.

mod apartment;
mod path;
mod style;
mod worksheet;

pub use worksheet::LiveWorksheet;

use std::cell::{Cell, Ref, RefCell};
use std::path::Path;
use std::rc::Rc;

use sheetlink_excel_com::{ExcelBridge, ExcelBridgeConfig, RemoteObject, Variant};
use sheetlink_xlsx::{validate_sheet_name, MAX_SHEET_NAME_LEN};

use crate::backend::{Workbook, Worksheet};
use crate::error::{Error, Result};
use crate::session::LiveOptions;
use apartment::ApartmentGuard;

pub(crate) const BACKEND_NAME: &str = "live";

/// `xlGeneralFormatName` index of `Application.International`
const XL_GENERAL_FORMAT_NAME: i32 = 26;

/// Session-owned handles. Fields drop child first.
struct Handles {
    workbook: RemoteObject,
    workbooks: RemoteObject,
    app: RemoteObject,
}

impl Handles {
    /// Release in reverse order of acquisition, attempting all three
    fn release(self) -> Result<()> {
        let workbook = self.workbook.release();
        let workbooks = self.workbooks.release();
        let app = self.app.release();
        Ok(workbook.and(workbooks).and(app)?)
    }
}

/// Handles shared by a live workbook and its worksheets
pub(crate) struct LiveSession {
    bridge: ExcelBridge,
    /// `None` once the session is closed
    handles: RefCell<Option<Handles>>,
    ui_suppressed: Cell<bool>,
}

impl LiveSession {
    fn new(bridge: &ExcelBridge, app: RemoteObject, workbooks: RemoteObject, workbook: RemoteObject) -> Self {
        Self {
            bridge: bridge.clone(),
            handles: RefCell::new(Some(Handles {
                workbook,
                workbooks,
                app,
            })),
            ui_suppressed: Cell::new(false),
        }
    }

    pub(crate) fn bridge(&self) -> &ExcelBridge {
        &self.bridge
    }

    fn handles(&self) -> Result<Ref<'_, Handles>> {
        Ref::filter_map(self.handles.borrow(), Option::as_ref).map_err(|_| Error::SessionClosed)
    }

    fn app(&self) -> Result<Ref<'_, RemoteObject>> {
        Ok(Ref::map(self.handles()?, |h| &h.app))
    }

    fn workbook(&self) -> Result<Ref<'_, RemoteObject>> {
        Ok(Ref::map(self.handles()?, |h| &h.workbook))
    }

    /// Release the session handles now, whoever else still holds the session
    fn release_handles(&self) -> Result<()> {
        match self.handles.take() {
            Some(handles) => handles.release(),
            None => Ok(()),
        }
    }

    fn normal_font(&self) -> Result<RemoteObject> {
        let normal = self
            .workbook()?
            .get_object_with("Styles", vec![Variant::from("Normal")])?;
        Ok(normal.get_object("Font")?)
    }

    fn general_format_name(&self) -> Result<String> {
        let value = self
            .app()?
            .get_with("International", vec![Variant::Int(XL_GENERAL_FORMAT_NAME)])?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    /// Marks the UI as suppressed as soon as the first flag is off, so a
    /// partial failure is still undone by [`LiveSession::restore_ui`]
    fn suppress_ui(&self) -> Result<()> {
        let app = self.app()?;
        app.set("ScreenUpdating", false)?;
        self.ui_suppressed.set(true);
        app.set("EnableEvents", false)?;
        Ok(())
    }

    fn restore_ui(&self) -> Result<()> {
        if !self.ui_suppressed.replace(false) {
            return Ok(());
        }
        let app = self.app()?;
        let events = app.set("EnableEvents", true);
        let screen = app.set("ScreenUpdating", true);
        events?;
        Ok(screen?)
    }

    fn worksheets(&self) -> Result<RemoteObject> {
        Ok(self.workbook()?.get_object("Worksheets")?)
    }

    /// Handles with their names from the workbook collection `collection`,
    /// in tab order
    fn handles_in(&self, collection: &str) -> Result<Vec<(String, RemoteObject)>> {
        let items = self.workbook()?.get_object(collection)?;
        let mut sheets = Vec::new();
        for i in 1..=items.get_i64("Count")? {
            let sheet = items.get_object_with("Item", vec![Variant::Int(i as i32)])?;
            sheets.push((sheet.get_string("Name")?, sheet));
        }
        Ok(sheets)
    }

    /// Worksheet handles with their names, in tab order
    fn sheet_handles(&self) -> Result<Vec<(String, RemoteObject)>> {
        self.handles_in("Worksheets")
    }

    /// Names of every sheet, chart sheets included
    fn all_sheet_names(&self) -> Result<Vec<String>> {
        Ok(self
            .handles_in("Sheets")?
            .into_iter()
            .map(|(name, _)| name)
            .collect())
    }

    fn find_handle(&self, name: &str) -> Result<Option<RemoteObject>> {
        let mut sheets = self.sheet_handles()?;
        let index = sheets
            .iter()
            .position(|(n, _)| n == name)
            .or_else(|| sheets.iter().position(|(n, _)| n.to_lowercase() == name.to_lowercase()));
        Ok(index.map(|i| sheets.swap_remove(i).1))
    }
}

/// Resources held by an attached session, released by [`LiveCleanup::close`]
pub(crate) struct LiveCleanup {
    session: Rc<LiveSession>,
    apartment: ApartmentGuard,
}

impl LiveCleanup {
    /// Restore the UI flags, release the session's handles in reverse order
    /// of acquisition, stop the bridge and free the apartment slot
    pub(crate) fn close(self) -> Result<()> {
        let Self { session, apartment } = self;
        let restored = session.restore_ui();
        let released = session.release_handles();
        if Rc::strong_count(&session) > 1 {
            tracing::debug!("closing live session while the workbook or worksheets are still held");
        }
        let stopped = session.bridge.shutdown();
        drop(apartment);
        tracing::info!("live session closed");
        restored?;
        released?;
        Ok(stopped?)
    }
}

/// A document open in a running application
pub struct LiveWorkbook {
    session: Rc<LiveSession>,
}

/// Attach to the application and find the document at `path`
///
/// `Ok(None)` means the application is reachable but does not have the
/// document open (and launching was not requested); the bridge is shut down.
pub(crate) fn attach(
    path: &Path,
    bridge_config: &ExcelBridgeConfig,
    options: &LiveOptions,
) -> Result<Option<(LiveWorkbook, LiveCleanup)>> {
    let apartment = ApartmentGuard::acquire()?;
    let bridge = ExcelBridge::start(bridge_config)?;
    match attach_with(&bridge, path, options) {
        Ok(Some(session)) => {
            let session = Rc::new(session);
            let workbook = LiveWorkbook {
                session: Rc::clone(&session),
            };
            Ok(Some((workbook, LiveCleanup { session, apartment })))
        }
        Ok(None) => {
            bridge.shutdown()?;
            Ok(None)
        }
        Err(e) => {
            if let Err(stop) = bridge.shutdown() {
                tracing::warn!("failed to stop bridge after attach error: {stop}");
            }
            Err(e)
        }
    }
}

fn attach_with(bridge: &ExcelBridge, path: &Path, options: &LiveOptions) -> Result<Option<LiveSession>> {
    let (app, launched) = match bridge.attach_application(&options.prog_id) {
        Ok(app) => (app, false),
        Err(e) if options.launch_if_missing => {
            tracing::info!("no running {} ({e}), launching one", options.prog_id);
            (bridge.launch_application(&options.prog_id)?, true)
        }
        Err(e) => return Err(e.into()),
    };
    let workbooks = app.get_object("Workbooks")?;
    let host_path = bridge.host_path(path);

    let mut found = None;
    for i in 1..=workbooks.get_i64("Count")? {
        let workbook = workbooks.get_object_with("Item", vec![Variant::Int(i as i32)])?;
        let full_name = workbook.get_string("FullName")?;
        if path::matches_document(&full_name, &host_path, path) {
            tracing::info!(full_name, "attached to open workbook");
            found = Some(workbook);
            break;
        }
    }

    let workbook = match found {
        Some(workbook) => workbook,
        None if launched || options.launch_if_missing => {
            tracing::info!(path = %host_path, "opening workbook in the application");
            workbooks.call_object("Open", vec![Variant::from(host_path.as_str())])?
        }
        None => return Ok(None),
    };

    let session = LiveSession::new(bridge, app, workbooks, workbook);
    if options.suppress_ui {
        if let Err(e) = session.suppress_ui() {
            if let Err(restore) = session.restore_ui() {
                tracing::warn!("failed to restore UI after suppress error: {restore}");
            }
            return Err(e);
        }
    }
    Ok(Some(session))
}

/// `wanted`, or `wanted (2)`, `wanted (3)`, ... whichever is free
fn unused_sheet_name(wanted: &str, taken: &[String]) -> String {
    let is_taken = |candidate: &str| taken.iter().any(|t| t.to_lowercase() == candidate.to_lowercase());
    if !is_taken(wanted) {
        return wanted.to_string();
    }
    (2..)
        .map(|n| {
            let suffix = format!(" ({n})");
            let keep = MAX_SHEET_NAME_LEN.saturating_sub(suffix.chars().count());
            let base: String = wanted.chars().take(keep).collect();
            format!("{base}{suffix}")
        })
        .find(|candidate| !is_taken(candidate))
        .unwrap_or_else(|| wanted.to_string())
}

impl LiveWorkbook {
    fn worksheet(&self, sheet: RemoteObject) -> Box<dyn Worksheet> {
        Box::new(LiveWorksheet::new(Rc::clone(&self.session), sheet))
    }
}

impl Workbook for LiveWorkbook {
    fn backend_name(&self) -> &'static str {
        BACKEND_NAME
    }

    fn sheet_names(&self) -> Result<Vec<String>> {
        Ok(self
            .session
            .sheet_handles()?
            .into_iter()
            .map(|(name, _)| name)
            .collect())
    }

    fn sheets(&self) -> Result<Vec<Box<dyn Worksheet>>> {
        Ok(self
            .session
            .sheet_handles()?
            .into_iter()
            .map(|(_, sheet)| self.worksheet(sheet))
            .collect())
    }

    fn find_sheet(&self, name: &str) -> Result<Box<dyn Worksheet>> {
        let sheet = self
            .session
            .find_handle(name)?
            .ok_or_else(|| Error::SheetNotFound(name.to_string()))?;
        Ok(self.worksheet(sheet))
    }

    fn create_new_sheet(&self, name: &str) -> Result<()> {
        validate_sheet_name(name)?;
        let lowered = name.to_lowercase();
        if self
            .session
            .all_sheet_names()?
            .iter()
            .any(|n| n.to_lowercase() == lowered)
        {
            return Err(Error::DuplicateSheetName(name.to_string()));
        }
        let active = self.session.workbook()?.get_object("ActiveSheet")?;
        let sheet = self
            .session
            .worksheets()?
            .call_object("Add", vec![Variant::Missing, active.as_arg()])?;
        sheet.set("Name", name)?;
        tracing::debug!("created sheet {name:?}");
        Ok(())
    }

    fn copy_sheet(&self, src: &str, dst: &str) -> Result<String> {
        validate_sheet_name(dst)?;
        let source = self
            .session
            .find_handle(src)?
            .ok_or_else(|| Error::SourceNotFound(src.to_string()))?;
        let name = unused_sheet_name(dst, &self.session.all_sheet_names()?);

        let index = source.get_i64("Index")?;
        source.call("Copy", vec![Variant::Missing, source.as_arg()])?;
        let copy = self
            .session
            .workbook()?
            .get_object("Sheets")?
            .get_object_with("Item", vec![Variant::Int(index as i32 + 1)])?;
        copy.set("Name", name.as_str())?;
        tracing::debug!("copied sheet {src:?} to {name:?}");
        Ok(name)
    }

    fn save(&self) -> Result<()> {
        self.session.workbook()?.call("Save", Vec::new())?;
        tracing::info!("saved live workbook");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use excel_com_protocol::{Command, Request, Response, ResponseData};
    use pretty_assertions::assert_eq;
    use std::cell::{Cell, RefCell};
    use std::io::{BufReader, Cursor, Read, Write};
    use std::sync::mpsc::{self, Receiver, Sender};

    /// Everything written to the bridge. Complete lines are also passed on
    /// to `requests` when set.
    #[derive(Clone, Default)]
    struct Sent {
        bytes: Rc<RefCell<Vec<u8>>>,
        forwarded: Rc<Cell<usize>>,
        requests: Option<Sender<String>>,
    }

    impl Write for Sent {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.bytes.borrow_mut().extend_from_slice(buf);
            if let Some(tx) = &self.requests {
                let bytes = self.bytes.borrow();
                let mut start = self.forwarded.get();
                while let Some(len) = bytes[start..].iter().position(|&b| b == b'\n') {
                    tx.send(String::from_utf8_lossy(&bytes[start..start + len]).into_owned())
                        .ok();
                    start += len + 1;
                }
                self.forwarded.set(start);
            }
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl Sent {
        fn commands(&self) -> Vec<Command> {
            String::from_utf8(self.bytes.borrow().clone())
                .unwrap()
                .lines()
                .map(|l| serde_json::from_str::<Request>(l).unwrap().command)
                .collect()
        }
    }

    /// A bridge answering with `data`, one response per request in order
    fn scripted(data: Vec<Option<ResponseData>>) -> (ExcelBridge, Sent) {
        let script: String = data
            .into_iter()
            .enumerate()
            .map(|(i, d)| serde_json::to_string(&Response::ok(i as u64 + 1, d)).unwrap() + "\n")
            .collect();
        let sent = Sent::default();
        let bridge = ExcelBridge::from_streams(sent.clone(), Cursor::new(script.into_bytes()));
        (bridge, sent)
    }

    type Answer = Box<dyn FnMut(&Command) -> std::result::Result<Option<ResponseData>, String> + Send>;

    /// Response stream computed from each request as it is written
    struct Answering {
        requests: Receiver<String>,
        answer: Answer,
        pending: Vec<u8>,
    }

    impl Read for Answering {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.pending.is_empty() {
                let Ok(line) = self.requests.recv() else {
                    return Ok(0);
                };
                let request: Request = serde_json::from_str(&line).unwrap();
                let response = match (self.answer)(&request.command) {
                    Ok(data) => Response::ok(request.id, data),
                    Err(message) => Response::error(request.id, message),
                };
                self.pending = (serde_json::to_string(&response).unwrap() + "\n").into_bytes();
            }
            let n = buf.len().min(self.pending.len());
            buf[..n].copy_from_slice(&self.pending[..n]);
            self.pending = self.pending.split_off(n);
            Ok(n)
        }
    }

    /// A bridge whose responses come from `answer`, called per request
    fn answering(
        answer: impl FnMut(&Command) -> std::result::Result<Option<ResponseData>, String> + Send + 'static,
    ) -> (ExcelBridge, Sent) {
        let (tx, rx) = mpsc::channel();
        let sent = Sent {
            requests: Some(tx),
            ..Sent::default()
        };
        let reader = BufReader::new(Answering {
            requests: rx,
            answer: Box::new(answer),
            pending: Vec::new(),
        });
        (ExcelBridge::from_streams(sent.clone(), reader), sent)
    }

    /// One open workbook at `C:\Data\Book.xlsx`: application 1, workbooks 2,
    /// workbook 3. Worksheets (10) hold "Data" (11); Sheets (20) also hold the
    /// chart sheet "Chart1" (22).
    fn book(command: &Command) -> std::result::Result<Option<ResponseData>, String> {
        let int = |n: i32| value(Variant::Int(n));
        Ok(match command {
            Command::AttachApplication { .. } => application(1),
            Command::GetProperty { target, name, args } => match (*target, name.as_str()) {
                (1, "Workbooks") => object(2),
                (2, "Count") => int(1),
                (2, "Item") => object(3),
                (3, "FullName") => value("C:\\Data\\Book.xlsx"),
                (3, "Worksheets") => object(10),
                (3, "Sheets") => object(20),
                (10, "Count") => int(1),
                (10, "Item") => object(11),
                (20, "Count") => int(2),
                (20, "Item") => match args.first() {
                    Some(Variant::Int(i)) => object(20 + *i as u64),
                    _ => return Err("bad index".to_string()),
                },
                (11 | 21, "Name") => value("Data"),
                (22, "Name") => value("Chart1"),
                (11, "Index") => int(1),
                (target, name) => return Err(format!("unexpected get {target}.{name}")),
            },
            _ => None,
        })
    }

    fn value(v: impl Into<Variant>) -> Option<ResponseData> {
        Some(ResponseData::Value { value: v.into() })
    }

    fn object(handle: u64) -> Option<ResponseData> {
        Some(ResponseData::Value {
            value: Variant::Object(handle),
        })
    }

    fn application(handle: u64) -> Option<ResponseData> {
        Some(ResponseData::Application {
            handle,
            launched: false,
        })
    }

    fn options() -> LiveOptions {
        LiveOptions {
            suppress_ui: false,
            ..Default::default()
        }
    }

    #[test]
    fn test_attach_matches_full_name() {
        let (bridge, sent) = scripted(vec![
            application(1),
            object(2),                          // Workbooks
            value(Variant::Int(2)),             // Count
            object(3),                          // Item(1)
            value("C:\\Data\\Other.xlsx"),      // FullName
            None,                               // release 3
            object(4),                          // Item(2)
            value("c:\\data\\BOOK.xlsx"),       // FullName
        ]);
        let session = attach_with(&bridge, Path::new("C:\\Data\\Book.xlsx"), &options())
            .unwrap()
            .expect("workbook should match");
        assert_eq!(session.workbook().unwrap().handle(), 4);

        let commands = sent.commands();
        assert_eq!(commands.len(), 8);
        assert_eq!(commands[5], Command::Release { handle: 3 });
        bridge.shutdown().ok();
    }

    #[test]
    fn test_attach_without_match_is_none() {
        let (bridge, _) = scripted(vec![
            application(1),
            object(2),
            value(Variant::Int(0)),
            None, // release 2
            None, // release 1
        ]);
        let session = attach_with(&bridge, Path::new("C:\\Data\\Book.xlsx"), &options()).unwrap();
        assert!(session.is_none());
    }

    #[test]
    fn test_close_releases_handles_while_workbook_is_held() {
        let (bridge, sent) = answering(book);
        let session = attach_with(&bridge, Path::new("C:\\Data\\Book.xlsx"), &options())
            .unwrap()
            .expect("workbook should match");
        let session = Rc::new(session);
        let workbook = LiveWorkbook {
            session: Rc::clone(&session),
        };
        let cleanup = LiveCleanup {
            session,
            apartment: ApartmentGuard::acquire().unwrap(),
        };
        let before = sent.commands().len();

        cleanup.close().unwrap();

        let commands = sent.commands();
        assert_eq!(
            &commands[before..],
            &[
                Command::Release { handle: 3 },
                Command::Release { handle: 2 },
                Command::Release { handle: 1 },
                Command::Shutdown,
            ]
        );
        assert!(matches!(workbook.save(), Err(Error::SessionClosed)));
        assert!(matches!(workbook.sheet_names(), Err(Error::SessionClosed)));
        drop(workbook);
        assert_eq!(sent.commands().len(), before + 4);
        assert!(ApartmentGuard::acquire().is_ok());
    }

    #[test]
    fn test_partial_ui_suppression_is_undone() {
        let (bridge, sent) = answering(|command| match command {
            Command::SetProperty { name, value, .. }
                if name == "EnableEvents" && *value == Variant::Bool(false) =>
            {
                Err("events are locked".to_string())
            }
            other => book(other),
        });
        let options = LiveOptions {
            suppress_ui: true,
            ..Default::default()
        };
        let result = attach_with(&bridge, Path::new("C:\\Data\\Book.xlsx"), &options);
        assert!(matches!(result, Err(Error::Bridge(_))));

        let flags: Vec<(String, Variant)> = sent
            .commands()
            .into_iter()
            .filter_map(|c| match c {
                Command::SetProperty { target: 1, name, value, .. } => Some((name, value)),
                _ => None,
            })
            .collect();
        assert_eq!(
            flags,
            vec![
                ("ScreenUpdating".to_string(), Variant::Bool(false)),
                ("EnableEvents".to_string(), Variant::Bool(false)),
                ("EnableEvents".to_string(), Variant::Bool(true)),
                ("ScreenUpdating".to_string(), Variant::Bool(true)),
            ]
        );
        bridge.shutdown().ok();
    }

    #[test]
    fn test_copy_avoids_chart_sheet_names() {
        let (bridge, sent) = answering(book);
        let session = attach_with(&bridge, Path::new("C:\\Data\\Book.xlsx"), &options())
            .unwrap()
            .expect("workbook should match");
        let workbook = LiveWorkbook {
            session: Rc::new(session),
        };

        assert_eq!(workbook.sheet_names().unwrap(), vec!["Data"]);
        assert_eq!(workbook.copy_sheet("Data", "chart1").unwrap(), "chart1 (2)");
        assert!(sent.commands().contains(&Command::SetProperty {
            target: 22,
            name: "Name".to_string(),
            args: Vec::new(),
            value: Variant::from("chart1 (2)"),
        }));
        assert!(matches!(
            workbook.create_new_sheet("CHART1"),
            Err(Error::DuplicateSheetName(_))
        ));
        bridge.shutdown().ok();
    }

    #[test]
    fn test_unused_sheet_name() {
        let taken = vec!["Data".to_string(), "data (2)".to_string()];
        assert_eq!(unused_sheet_name("Fresh", &taken), "Fresh");
        assert_eq!(unused_sheet_name("DATA", &taken), "DATA (3)");

        let long = "x".repeat(MAX_SHEET_NAME_LEN);
        let taken = vec![long.clone()];
        let name = unused_sheet_name(&long, &taken);
        assert_eq!(name.chars().count(), MAX_SHEET_NAME_LEN);
        assert!(name.ends_with(" (2)"));
    }
}
