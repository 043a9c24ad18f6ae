use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::time::{Duration, Instant};

use dear_portal_dialog::{
    CallBody, DialogMode, FileDialog, FileManagerMode, IncomingMessage, MatchRule, MethodCall,
    OptionValue, Portal, PortalConfig, PortalError, PortalResult, Transport, Value,
    request_object_path,
};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;

const UNIQUE_NAME: &str = ":1.5";

type Responder = Box<dyn FnMut(&str) -> Vec<IncomingMessage> + Send>;

enum Ack {
    /// Reply with the path predicted from the handle token
    Predicted,
    /// Reply with a different request path (portal ignored the token)
    Path(String),
    /// Reply with something that is not an object path
    NotAPath,
}

#[derive(Default)]
struct Log {
    calls: Vec<MethodCall>,
    /// `+path` for added match rules, `-path` for removed ones
    matches: Vec<String>,
    ack_paths: Vec<String>,
}

struct ScriptedBus {
    unique_name: Option<String>,
    refuse_match: bool,
    ack: Ack,
    responder: Responder,
    later: Receiver<IncomingMessage>,
    queue: VecDeque<IncomingMessage>,
    log: Arc<Mutex<Log>>,
}

impl ScriptedBus {
    fn new(responder: Responder) -> (Self, Sender<IncomingMessage>, Arc<Mutex<Log>>) {
        let (tx, rx) = mpsc::channel();
        let log = Arc::new(Mutex::new(Log::default()));
        let bus = Self {
            unique_name: Some(UNIQUE_NAME.to_owned()),
            refuse_match: false,
            ack: Ack::Predicted,
            responder,
            later: rx,
            queue: VecDeque::new(),
            log: Arc::clone(&log),
        };
        (bus, tx, log)
    }

    fn answering(status: u32, results: Value) -> (Self, Sender<IncomingMessage>, Arc<Mutex<Log>>) {
        let mut results = Some(results);
        Self::new(Box::new(move |path: &str| {
            let noise = IncomingMessage::signal(
                "/org/freedesktop/portal/desktop/request/1_5/someone_else",
                "org.freedesktop.portal.Request",
                "Response",
                vec![Value::U32(0), uris(&["file:///wrong"])],
            );
            match results.take() {
                Some(r) => vec![noise, IncomingMessage::response(path, status, r)],
                None => vec![noise],
            }
        }))
    }
}

impl Transport for ScriptedBus {
    fn unique_name(&self) -> Option<String> {
        self.unique_name.clone()
    }

    fn add_match(&mut self, rule: &MatchRule) -> PortalResult<()> {
        assert_eq!(rule.destination, UNIQUE_NAME);
        if self.refuse_match {
            return Err(PortalError::transport("Match rule refused."));
        }
        self.log.lock().matches.push(format!("+{}", rule.path));
        Ok(())
    }

    fn remove_match(&mut self, rule: &MatchRule) -> PortalResult<()> {
        self.log.lock().matches.push(format!("-{}", rule.path));
        Ok(())
    }

    fn call(&mut self, call: &MethodCall) -> PortalResult<Vec<Value>> {
        self.log.lock().calls.push(call.clone());
        let CallBody::Dialog(body) = &call.body else {
            return Ok(Vec::new());
        };
        let Some(OptionValue::Str(token)) = body.option("handle_token") else {
            panic!("request without handle_token");
        };
        let path = match &self.ack {
            Ack::Predicted => request_object_path(UNIQUE_NAME, token),
            Ack::Path(p) => p.clone(),
            Ack::NotAPath => return Ok(vec![Value::from("not a path")]),
        };
        self.log.lock().ack_paths.push(path.clone());
        let replies = (self.responder)(&path);
        self.queue.extend(replies);
        Ok(vec![Value::ObjectPath(path)])
    }

    fn pop_message(&mut self) -> Option<IncomingMessage> {
        self.queue.pop_front()
    }

    fn read_write(&mut self) -> bool {
        match self.later.recv() {
            Ok(msg) => {
                self.queue.push_back(msg);
                true
            }
            Err(_) => false,
        }
    }
}

fn uris(list: &[&str]) -> Value {
    Value::Array(list.iter().map(|&u| Value::from(u)).collect())
}

fn results(list: &[&str]) -> Value {
    Value::string_dict([("uris", uris(list))])
}

fn predicted_path(log: &Mutex<Log>) -> String {
    log.lock().ack_paths[0].clone()
}

fn unique_temp_dir(prefix: &str) -> PathBuf {
    let mut p = std::env::temp_dir();
    let pid = std::process::id();
    let t = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    p.push(format!("dear-portal-dialog-{prefix}-{pid}-{t}"));
    p
}

#[test]
fn open_file_returns_decoded_path() {
    let (bus, _tx, log) = ScriptedBus::answering(0, results(&["file:///home/u/My%20Doc.txt"]));
    let portal = Portal::with_transport(bus).unwrap();

    let paths = portal
        .open_blocking(&FileDialog::new(DialogMode::OpenFile))
        .unwrap();
    assert_eq!(paths.to_vec(), vec![PathBuf::from("/home/u/My Doc.txt")]);
    assert_eq!(portal.last_error(), None);

    let log = log.lock();
    assert_eq!(log.calls.len(), 1);
    assert_eq!(log.calls[0].member, "OpenFile");
    assert_eq!(log.calls[0].interface, "org.freedesktop.portal.FileChooser");
    let path = &log.ack_paths[0];
    assert!(path.starts_with("/org/freedesktop/portal/desktop/request/1_5/"));
    assert_eq!(log.matches, vec![format!("+{path}"), format!("-{path}")]);
}

#[test]
fn cancel_is_not_recorded_as_error() {
    let (bus, _tx, _log) = ScriptedBus::answering(1, Value::string_dict::<_, &str>([]));
    let portal = Portal::with_transport(bus).unwrap();
    let err = portal
        .open_blocking(&FileDialog::new(DialogMode::PickFolder))
        .unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(portal.last_error(), None);
}

#[test]
fn abrupt_end_is_recorded() {
    let (bus, _tx, _log) = ScriptedBus::answering(2, Value::string_dict::<_, &str>([]));
    let portal = Portal::with_transport(bus).unwrap();
    let err = portal
        .open_blocking(&FileDialog::new(DialogMode::OpenFile))
        .unwrap_err();
    assert!(matches!(err, PortalError::Protocol { .. }));
    assert_eq!(
        portal.last_error().as_deref(),
        Some("D-Bus file dialog interaction was ended abruptly.")
    );
    portal.clear_error();
    assert_eq!(portal.last_error(), None);
}

#[test]
fn subscription_moves_when_portal_ignores_token() {
    let legacy = "/org/freedesktop/portal/desktop/request/1_5/t42".to_owned();
    let (mut bus, _tx, log) = ScriptedBus::answering(0, results(&["file:///tmp/a"]));
    bus.ack = Ack::Path(legacy.clone());
    let portal = Portal::with_transport(bus).unwrap();

    let paths = portal
        .open_blocking(&FileDialog::new(DialogMode::OpenFile))
        .unwrap();
    assert_eq!(paths.first(), PathBuf::from("/tmp/a"));

    let log = log.lock();
    assert_eq!(log.matches.len(), 4);
    let predicted = log.matches[0].trim_start_matches('+').to_owned();
    assert_ne!(predicted, legacy);
    assert_eq!(
        log.matches,
        vec![
            format!("+{predicted}"),
            format!("-{predicted}"),
            format!("+{legacy}"),
            format!("-{legacy}"),
        ]
    );
}

#[test]
fn closed_connection_without_reply_fails() {
    let (bus, tx, log) = ScriptedBus::new(Box::new(|_| Vec::new()));
    drop(tx);
    let portal = Portal::with_transport(bus).unwrap();
    let err = portal
        .open_blocking(&FileDialog::new(DialogMode::OpenFile))
        .unwrap_err();
    assert!(matches!(err, PortalError::Transport { .. }));
    assert_eq!(
        portal.last_error().as_deref(),
        Some("D-Bus freedesktop portal did not give us a reply.")
    );
    assert_eq!(log.lock().matches.len(), 2);
}

#[test]
fn reply_without_object_path_unsubscribes() {
    let (mut bus, _tx, log) = ScriptedBus::new(Box::new(|_| Vec::new()));
    bus.ack = Ack::NotAPath;
    let portal = Portal::with_transport(bus).unwrap();
    let err = portal
        .open_blocking(&FileDialog::new(DialogMode::OpenFile))
        .unwrap_err();
    assert_eq!(err.to_string(), "D-Bus reply is not an object path.");
    let log = log.lock();
    assert_eq!(log.matches.len(), 2);
    assert!(log.matches[1].starts_with('-'));
}

#[test]
fn missing_unique_name_is_reported() {
    let (mut bus, _tx, _log) = ScriptedBus::new(Box::new(|_| Vec::new()));
    bus.unique_name = None;
    let err = Portal::with_transport(bus).err().unwrap();
    assert_eq!(
        err.to_string(),
        "Unable to get the unique name of our D-Bus connection."
    );
}

#[test]
fn open_files_share_one_directory() {
    let (bus, _tx, log) =
        ScriptedBus::answering(0, results(&["file:///a/b/x.txt", "file:///a/b/y.txt"]));
    let portal = Portal::with_transport(bus).unwrap();
    let dialog = FileDialog::new(DialogMode::OpenFiles).filter(("Text", "txt"));
    let paths = portal.open_blocking(&dialog).unwrap();
    assert_eq!(paths.len(), 2);
    assert_eq!(paths.as_bytes(), b"/a/b\0x.txt\0y.txt\0\0");

    let log = log.lock();
    let CallBody::Dialog(body) = &log.calls[0].body else {
        panic!("expected a dialog call");
    };
    assert_eq!(body.title, "Open Files");
    assert_eq!(body.option("multiple"), Some(&OptionValue::Bool(true)));
}

fn save_response(uri: &str) -> Value {
    Value::string_dict([
        ("uris", uris(&[uri])),
        (
            "current_filter",
            Value::Struct(vec![
                "PNG (png)".into(),
                Value::Array(vec![Value::Struct(vec![0u32.into(), "*.png".into()])]),
            ]),
        ),
    ])
}

#[test]
fn save_appends_extension_only_when_enabled() {
    let dialog = FileDialog::new(DialogMode::SaveFile).filter(("PNG", "png"));

    let (bus, _tx, log) = ScriptedBus::answering(0, save_response("file:///tmp/out"));
    let portal = Portal::with_transport(bus).unwrap();
    assert_eq!(
        portal.open_blocking(&dialog).unwrap().first(),
        PathBuf::from("/tmp/out")
    );
    assert_eq!(log.lock().calls[0].member, "SaveFile");

    let (bus, _tx, _log) = ScriptedBus::answering(0, save_response("file:///tmp/out"));
    let config = PortalConfig {
        append_extension: true,
        ..PortalConfig::default()
    };
    let portal = Portal::with_transport_and_config(bus, config).unwrap();
    assert_eq!(
        portal.open_blocking(&dialog).unwrap().first(),
        PathBuf::from("/tmp/out.png")
    );

    let (bus, _tx, _log) = ScriptedBus::answering(0, save_response("file:///tmp/out.jpg"));
    let config = PortalConfig {
        append_extension: true,
        ..PortalConfig::default()
    };
    let portal = Portal::with_transport_and_config(bus, config).unwrap();
    assert_eq!(
        portal.open_blocking(&dialog).unwrap().first(),
        PathBuf::from("/tmp/out.jpg")
    );
}

#[test]
fn save_hints_existing_file() {
    let dir = unique_temp_dir("save_hint");
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("notes.txt"), b"hello").unwrap();

    let (bus, _tx, log) = ScriptedBus::answering(0, results(&["file:///tmp/x"]));
    let portal = Portal::with_transport(bus).unwrap();
    let dialog = FileDialog::new(DialogMode::SaveFile)
        .directory(&dir)
        .default_file_name("notes.txt");
    portal.open_blocking(&dialog).unwrap();

    let log = log.lock();
    let CallBody::Dialog(body) = &log.calls[0].body else {
        panic!("expected a dialog call");
    };
    let mut expected = dir.join("notes.txt").into_os_string().into_encoded_bytes();
    expected.push(0);
    assert_eq!(body.option("current_file"), Some(&OptionValue::Bytes(expected)));
    assert_eq!(
        body.option("current_name"),
        Some(&OptionValue::Str("notes.txt".into()))
    );

    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn pollable_dialog_reports_progress() {
    let (bus, tx, log) = ScriptedBus::new(Box::new(|_| Vec::new()));
    let portal = Portal::with_transport(bus).unwrap();
    let pending = portal
        .open_pollable(&FileDialog::new(DialogMode::OpenFile))
        .unwrap();

    assert!(!pending.is_ready());
    assert!(matches!(pending.try_take(), Err(PortalError::NotReady)));
    assert_eq!(portal.last_error().as_deref(), Some("response not ready"));

    let path = predicted_path(&log);
    tx.send(IncomingMessage::response(&path, 0, results(&["file:///srv/picked"])))
        .unwrap();

    let deadline = Instant::now() + Duration::from_secs(10);
    while !pending.is_ready() {
        assert!(Instant::now() < deadline, "monitor never completed");
        std::thread::sleep(Duration::from_millis(5));
    }
    let paths = pending.try_take().unwrap();
    assert_eq!(paths.first(), PathBuf::from("/srv/picked"));
    assert!(matches!(pending.try_take(), Err(PortalError::AlreadyTaken)));
    assert_eq!(log.lock().matches, vec![format!("+{path}"), format!("-{path}")]);
}

#[test]
fn pollable_cancel_is_taken_once() {
    let (bus, tx, log) = ScriptedBus::new(Box::new(|_| Vec::new()));
    let portal = Portal::with_transport(bus).unwrap();
    let pending = portal
        .open_pollable(&FileDialog::new(DialogMode::SaveFile))
        .unwrap();
    let path = predicted_path(&log);
    tx.send(IncomingMessage::response(
        &path,
        1,
        Value::string_dict::<_, &str>([]),
    ))
    .unwrap();

    let deadline = Instant::now() + Duration::from_secs(10);
    while !pending.is_ready() {
        assert!(Instant::now() < deadline, "monitor never completed");
        std::thread::sleep(Duration::from_millis(5));
    }
    assert!(pending.try_take().unwrap_err().is_cancelled());
    assert_eq!(portal.last_error(), None);
    assert!(matches!(pending.try_take(), Err(PortalError::AlreadyTaken)));
    assert_eq!(
        portal.last_error().as_deref(),
        Some("response already taken")
    );
}

#[test]
fn refused_subscription_sends_nothing() {
    let (mut bus, _tx, log) = ScriptedBus::answering(0, results(&["file:///tmp/a"]));
    bus.refuse_match = true;
    let portal = Portal::with_transport(bus).unwrap();
    let err = portal
        .open_blocking(&FileDialog::new(DialogMode::OpenFile))
        .unwrap_err();
    assert!(matches!(err, PortalError::Transport { .. }));
    assert_eq!(portal.last_error().as_deref(), Some("Match rule refused."));
    let log = log.lock();
    assert!(log.calls.is_empty());
    assert!(log.matches.is_empty());
}

#[test]
fn pollable_reports_bad_acknowledgement_immediately() {
    let (mut bus, _tx, log) = ScriptedBus::new(Box::new(|_| Vec::new()));
    bus.ack = Ack::NotAPath;
    let portal = Portal::with_transport(bus).unwrap();
    let err = portal
        .open_pollable(&FileDialog::new(DialogMode::OpenFile))
        .err()
        .unwrap();
    assert_eq!(err.to_string(), "D-Bus reply is not an object path.");
    assert_eq!(
        portal.last_error().as_deref(),
        Some("D-Bus reply is not an object path.")
    );
    let log = log.lock();
    assert_eq!(log.calls.len(), 1);
    assert_eq!(log.matches.len(), 2);
    assert!(log.matches[1].starts_with('-'));
}

#[test]
fn pollable_open_files_share_one_directory() {
    let (bus, tx, log) = ScriptedBus::new(Box::new(|_| Vec::new()));
    let portal = Portal::with_transport(bus).unwrap();
    let pending = portal
        .open_pollable(&FileDialog::new(DialogMode::OpenFiles))
        .unwrap();
    let path = predicted_path(&log);
    tx.send(IncomingMessage::response(
        &path,
        0,
        results(&["file:///srv/in/a.png", "file:///srv/in/b%20c.png"]),
    ))
    .unwrap();

    let deadline = Instant::now() + Duration::from_secs(10);
    while !pending.is_ready() {
        assert!(Instant::now() < deadline, "monitor never completed");
        std::thread::sleep(Duration::from_millis(5));
    }
    let paths = pending.try_take().unwrap();
    assert_eq!(paths.as_bytes(), b"/srv/in\0a.png\0b c.png\0\0");
    assert_eq!(
        paths.to_vec(),
        vec![
            PathBuf::from("/srv/in/a.png"),
            PathBuf::from("/srv/in/b c.png")
        ]
    );
}

#[test]
fn file_manager_reveals_item() {
    let (bus, _tx, log) = ScriptedBus::new(Box::new(|_| Vec::new()));
    let portal = Portal::with_transport(bus).unwrap();
    portal
        .show_in_file_manager("/srv/a b.txt", FileManagerMode::SelectFile, false)
        .unwrap();

    let log = log.lock();
    assert_eq!(log.calls[0].member, "ShowItems");
    assert_eq!(
        log.calls[0].body,
        CallBody::ShowItems {
            uris: vec!["file:///srv/a%20b.txt".into()],
            startup_id: String::new(),
        }
    );
    assert!(log.matches.is_empty());
}
