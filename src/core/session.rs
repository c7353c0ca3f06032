//! RPC session management
//!
//! Owns the embedded editor process and the msgpack-RPC channel to it. A
//! reader thread decodes inbound frames: responses are matched to pending
//! requests by sequence id, notifications and editor-initiated requests
//! are forwarded over an mpsc channel to the event pump. Stream errors
//! and EOF are reported as a terminal disconnect; the session never
//! reconnects.

use std::collections::HashMap;
use std::io::BufReader;
use std::path::PathBuf;
use std::process::{ChildStdin, ChildStdout};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use rmpv::Value;
use thiserror::Error;
use tracing::{debug, warn};

use super::process::{EditorProcess, ProcessError};
use super::rpc::{self, RpcError, RpcMessage};
use crate::config::EditorConfig;
use crate::geometry::{GridSize, ResizeTarget};

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("failed to spawn editor: {0}")]
    Spawn(#[from] ProcessError),

    #[error("attach handshake failed: {0}")]
    Attach(String),

    #[error("remote call `{method}` failed: {error}")]
    Remote { method: String, error: String },

    #[error("session is disconnected")]
    Disconnected,

    #[error(transparent)]
    Rpc(#[from] RpcError),
}

pub type Result<T> = std::result::Result<T, SessionError>;

/// Startup and lifetime states of a session.
///
/// The happy path is Unstarted → Spawning → Attaching → AttachingUi →
/// Ready → Disconnected. Any attach-phase failure lands in Failed, which
/// is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Unstarted,
    Spawning,
    Attaching,
    AttachingUi,
    Ready,
    Disconnected,
    Failed,
}

/// Inbound traffic delivered to the event pump.
#[derive(Debug)]
pub enum SessionEvent {
    /// A notification from the editor (redraw, plugin channel, ...).
    Notification { method: String, params: Vec<Value> },
    /// An editor-initiated request; answer it with [`Session::respond`].
    Request {
        msgid: u64,
        method: String,
        params: Vec<Value>,
    },
    /// The channel is gone. Terminal; the host is expected to shut down.
    Disconnected,
}

/// What to do with the response to an outbound request.
enum Pending {
    /// A blocked `call`: hand the outcome to this sender.
    Call(Sender<std::result::Result<Value, String>>),
    /// Fire-and-forget: log a rejection, apply nothing.
    Logged { method: String },
}

type PendingMap = Arc<Mutex<HashMap<u64, Pending>>>;

/// One live RPC session with an embedded editor.
pub struct Session {
    process: EditorProcess,
    writer: Mutex<ChildStdin>,
    pending: PendingMap,
    events_rx: Receiver<SessionEvent>,
    running: Arc<AtomicBool>,
    reader: Option<JoinHandle<()>>,
    next_msgid: AtomicU64,
    state: SessionState,
    /// Grid size most recently requested from the backend.
    grid: Option<GridSize>,
}

impl Session {
    /// Spawn the editor and start the reader thread. The session is live
    /// but not yet attached; call [`Session::attach`] next.
    pub fn start(editor: &EditorConfig, files: &[PathBuf]) -> Result<Self> {
        let mut process = EditorProcess::spawn(
            &editor.path,
            &editor.args,
            editor.init_script.as_deref(),
            files,
        )?;
        let stdin = process.take_stdin()?;
        let stdout = process.take_stdout()?;

        let (events_tx, events_rx) = mpsc::channel();
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let running = Arc::new(AtomicBool::new(true));

        let reader = {
            let pending = pending.clone();
            let running = running.clone();
            thread::spawn(move || reader_loop(stdout, pending, events_tx, running))
        };

        Ok(Self {
            process,
            writer: Mutex::new(stdin),
            pending,
            events_rx,
            running,
            reader: Some(reader),
            next_msgid: AtomicU64::new(1),
            state: SessionState::Spawning,
            grid: None,
        })
    }

    /// Perform the protocol handshake and enable UI notifications.
    ///
    /// Both phases are fatal on failure: an editor UI has no degraded
    /// mode without an attached backend.
    pub fn attach(&mut self, cols: u16, rows: u16) -> Result<()> {
        self.state = SessionState::Attaching;
        if let Err(err) = self.call("nvim_get_api_info", vec![]) {
            self.state = SessionState::Failed;
            return Err(SessionError::Attach(format!("api handshake: {err}")));
        }

        self.state = SessionState::AttachingUi;
        let options = Value::Map(vec![(Value::from("rgb"), Value::from(true))]);
        match self.call(
            "nvim_ui_attach",
            vec![Value::from(cols), Value::from(rows), options],
        ) {
            Ok(_) => {
                self.state = SessionState::Ready;
                self.grid = Some(GridSize { rows, cols });
                Ok(())
            }
            Err(err) => {
                self.state = SessionState::Failed;
                Err(SessionError::Attach(format!("ui attach: {err}")))
            }
        }
    }

    /// Synchronous request/response call.
    ///
    /// Blocks the caller until the backend answers; the reader thread
    /// keeps draining the stream in the meantime, so notification
    /// processing is never stalled by a pending call.
    pub fn call(&self, method: &str, params: Vec<Value>) -> Result<Value> {
        if !self.running.load(Ordering::SeqCst) {
            return Err(SessionError::Disconnected);
        }

        let msgid = self.next_msgid.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::channel();
        self.pending.lock().unwrap().insert(msgid, Pending::Call(tx));

        if let Err(err) = self.write_request(msgid, method, params) {
            self.pending.lock().unwrap().remove(&msgid);
            return Err(err);
        }

        match rx.recv() {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(error)) => Err(SessionError::Remote {
                method: method.to_string(),
                error,
            }),
            // The reader dropped the pending table: disconnected.
            Err(_) => Err(SessionError::Disconnected),
        }
    }

    /// Fire-and-forget request. A rejection from the backend is logged by
    /// the reader thread and its effect simply not applied.
    pub fn request(&self, method: &str, params: Vec<Value>) -> Result<()> {
        if !self.running.load(Ordering::SeqCst) {
            return Err(SessionError::Disconnected);
        }

        let msgid = self.next_msgid.fetch_add(1, Ordering::SeqCst);
        self.pending.lock().unwrap().insert(
            msgid,
            Pending::Logged {
                method: method.to_string(),
            },
        );

        if let Err(err) = self.write_request(msgid, method, params) {
            self.pending.lock().unwrap().remove(&msgid);
            return Err(err);
        }
        Ok(())
    }

    /// Answer an editor-initiated request.
    pub fn respond(&self, msgid: u64, error: Value, result: Value) -> Result<()> {
        let mut writer = self.writer.lock().unwrap();
        rpc::write_response(&mut *writer, msgid, error, result)?;
        Ok(())
    }

    /// Feed keys through to the editor's input queue.
    pub fn input(&self, keys: &str) -> Result<Value> {
        self.call("nvim_input", vec![Value::from(keys)])
    }

    /// Execute an ex command.
    pub fn command(&self, command: &str) -> Result<Value> {
        self.call("nvim_command", vec![Value::from(command)])
    }

    /// Non-blocking poll of the event channel.
    pub fn try_event(&self) -> Option<SessionEvent> {
        self.events_rx.try_recv().ok()
    }

    /// Wait for the next event, up to `timeout`.
    pub fn wait_event(&self, timeout: Duration) -> Option<SessionEvent> {
        self.events_rx.recv_timeout(timeout).ok()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Grid size most recently requested from the backend.
    pub fn grid(&self) -> Option<GridSize> {
        self.grid
    }

    #[allow(dead_code)]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Record the disconnect reported by the reader thread.
    pub fn mark_disconnected(&mut self) {
        self.state = SessionState::Disconnected;
        self.running.store(false, Ordering::SeqCst);
    }

    /// Ask the editor to quit, then tear the process down.
    pub fn shutdown(&mut self) {
        if self.running.load(Ordering::SeqCst) {
            // Best effort; the kill below is the backstop.
            let _ = self.request("nvim_command", vec![Value::from("qa!")]);
        }
        self.running.store(false, Ordering::SeqCst);
        self.state = SessionState::Disconnected;
        self.process.kill();
    }

    fn write_request(&self, msgid: u64, method: &str, params: Vec<Value>) -> Result<()> {
        let mut writer = self.writer.lock().unwrap();
        rpc::write_request(&mut *writer, msgid, method, params)?;
        Ok(())
    }
}

impl ResizeTarget for Session {
    fn request_resize(&mut self, cols: u16, rows: u16) -> Result<()> {
        self.request(
            "nvim_ui_try_resize",
            vec![Value::from(cols), Value::from(rows)],
        )?;
        self.grid = Some(GridSize { rows, cols });
        Ok(())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        // Killing the child closes its stdout, which unblocks the reader.
        self.process.kill();
        if let Some(handle) = self.reader.take() {
            let _ = handle.join();
        }
    }
}

/// Decode frames until the stream dies, then report the disconnect.
fn reader_loop(
    stdout: ChildStdout,
    pending: PendingMap,
    events: Sender<SessionEvent>,
    running: Arc<AtomicBool>,
) {
    let mut reader = BufReader::new(stdout);

    while running.load(Ordering::SeqCst) {
        match rpc::read_message(&mut reader) {
            Ok(RpcMessage::Notification { method, params }) => {
                if events
                    .send(SessionEvent::Notification { method, params })
                    .is_err()
                {
                    break;
                }
            }
            Ok(RpcMessage::Request {
                msgid,
                method,
                params,
            }) => {
                if events
                    .send(SessionEvent::Request {
                        msgid,
                        method,
                        params,
                    })
                    .is_err()
                {
                    break;
                }
            }
            Ok(RpcMessage::Response {
                msgid,
                error,
                result,
            }) => dispatch_response(&pending, msgid, error, result),
            Err(err) => {
                debug!("rpc stream closed: {err}");
                break;
            }
        }
    }

    running.store(false, Ordering::SeqCst);
    // Fail any calls still blocked on a response before reporting the
    // disconnect, so no caller is left waiting forever.
    pending.lock().unwrap().clear();
    let _ = events.send(SessionEvent::Disconnected);
}

/// Route one response to whoever is waiting on its sequence id.
fn dispatch_response(pending: &PendingMap, msgid: u64, error: Value, result: Value) {
    let entry = pending.lock().unwrap().remove(&msgid);
    match entry {
        Some(Pending::Call(tx)) => {
            let outcome = if error.is_nil() {
                Ok(result)
            } else {
                Err(format_remote_error(&error))
            };
            let _ = tx.send(outcome);
        }
        Some(Pending::Logged { method }) => {
            if !error.is_nil() {
                warn!(
                    method = %method,
                    error = %format_remote_error(&error),
                    "backend rejected request"
                );
            }
        }
        None => warn!(msgid, "response for unknown request id"),
    }
}

/// The backend reports errors as `[code, message]` pairs; fall back to
/// the raw value for anything else.
fn format_remote_error(error: &Value) -> String {
    if let Value::Array(items) = error {
        if let Some(message) = items.get(1).and_then(Value::as_str) {
            return message.to_string();
        }
    }
    error.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn editor(path: &str) -> EditorConfig {
        EditorConfig {
            path: path.to_string(),
            args: Vec::new(),
            init_script: None,
        }
    }

    #[test]
    fn spawn_failure_is_fatal() {
        let err = Session::start(&editor("/nonexistent/editor-binary"), &[]).err();
        assert!(matches!(err, Some(SessionError::Spawn(_))));
    }

    #[test]
    fn response_routing_completes_a_pending_call() {
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let (tx, rx) = mpsc::channel();
        pending.lock().unwrap().insert(3, Pending::Call(tx));

        dispatch_response(&pending, 3, Value::Nil, Value::from("pong"));

        assert_eq!(rx.recv().unwrap(), Ok(Value::from("pong")));
        assert!(pending.lock().unwrap().is_empty());
    }

    #[test]
    fn response_routing_surfaces_backend_errors() {
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let (tx, rx) = mpsc::channel();
        pending.lock().unwrap().insert(9, Pending::Call(tx));

        let error = Value::Array(vec![Value::from(1u64), Value::from("no such method")]);
        dispatch_response(&pending, 9, error, Value::Nil);

        assert_eq!(rx.recv().unwrap(), Err("no such method".to_string()));
    }

    // The loopback pair below run against real child processes and are
    // platform-gated.

    #[test]
    #[cfg(unix)]
    fn echoed_request_comes_back_as_inbound_request() {
        // `cat` mirrors our outbound request frame straight back, which
        // the reader must decode as an editor-initiated request.
        let session = Session::start(&editor("/bin/cat"), &[]).expect("cat should spawn");
        session
            .request("nvim_input", vec![Value::from("x")])
            .expect("write should succeed");

        match session.wait_event(Duration::from_secs(5)) {
            Some(SessionEvent::Request { method, params, .. }) => {
                assert_eq!(method, "nvim_input");
                assert_eq!(params, vec![Value::from("x")]);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    #[cfg(unix)]
    fn child_exit_reports_disconnect() {
        let session = Session::start(&editor("/bin/true"), &[]).expect("true should spawn");
        match session.wait_event(Duration::from_secs(5)) {
            Some(SessionEvent::Disconnected) => {}
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
