//! Dedicated control thread that delivers completion events.

use super::{UpdateCompletedEvent, UpdateCompletionListener};
use crate::core::UpdaterError;
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle, ThreadId};
use tokio::sync::oneshot;
use tracing::{debug, error};

/// Messages accepted by the control thread.
enum ControlMessage {
    /// Deliver an event to every listener, then acknowledge
    Deliver(UpdateCompletedEvent, oneshot::Sender<()>),
    /// Stop after draining earlier messages
    Shutdown,
}

/// The host's single designated thread for completion callbacks.
///
/// Fetch and Download run on the async runtime; only delivery crosses onto
/// this thread. [`dispatch`](Self::dispatch) waits for the acknowledgement,
/// so an install step completes only after every listener has seen the event.
pub struct ControlThread {
    sender: Mutex<Option<Sender<ControlMessage>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
    thread_id: ThreadId,
}

impl ControlThread {
    /// Spawn the control thread with its listeners.
    ///
    /// # Errors
    ///
    /// Fails when the OS refuses to spawn a thread.
    pub fn spawn(name: &str, listeners: Vec<Arc<dyn UpdateCompletionListener>>) -> std::io::Result<Self> {
        let (sender, receiver) = mpsc::channel::<ControlMessage>();

        let handle = thread::Builder::new().name(name.to_string()).spawn(move || {
            while let Ok(message) = receiver.recv() {
                match message {
                    ControlMessage::Deliver(event, ack) => {
                        for listener in &listeners {
                            let delivered = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                                listener.on_update_completed(&event);
                            }));
                            if delivered.is_err() {
                                error!("Completion listener panicked while handling {}", event.source);
                            }
                        }
                        let _ = ack.send(());
                    }
                    ControlMessage::Shutdown => break,
                }
            }
            debug!("Control thread stopped");
        })?;

        Ok(Self {
            thread_id: handle.thread().id(),
            sender: Mutex::new(Some(sender)),
            handle: Mutex::new(Some(handle)),
        })
    }

    /// Whether the caller is running on the control thread.
    pub fn is_current(&self) -> bool {
        thread::current().id() == self.thread_id
    }

    /// Deliver `event` on the control thread and wait until every listener
    /// has handled it.
    ///
    /// # Errors
    ///
    /// [`UpdaterError::Io`] when the control thread has stopped.
    pub async fn dispatch(&self, event: UpdateCompletedEvent) -> Result<(), UpdaterError> {
        let (ack_tx, ack_rx) = oneshot::channel();
        {
            let guard = self.sender.lock().map_err(|_| stopped())?;
            let sender = guard.as_ref().ok_or_else(stopped)?;
            sender.send(ControlMessage::Deliver(event, ack_tx)).map_err(|_| stopped())?;
        }
        ack_rx.await.map_err(|_| stopped())
    }

    /// Stop the thread after it drains pending deliveries.
    pub fn shutdown(&self) {
        if let Ok(mut guard) = self.sender.lock()
            && let Some(sender) = guard.take()
        {
            let _ = sender.send(ControlMessage::Shutdown);
        }
        if let Ok(mut guard) = self.handle.lock()
            && let Some(handle) = guard.take()
            && handle.thread().id() != thread::current().id()
        {
            let _ = handle.join();
        }
    }
}

impl Drop for ControlThread {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for ControlThread {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControlThread").field("thread_id", &self.thread_id).finish_non_exhaustive()
    }
}

fn stopped() -> UpdaterError {
    UpdaterError::Io(std::io::Error::other("control thread is not running"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::RecordingListener;
    use std::path::PathBuf;

    fn event(source: &str) -> UpdateCompletedEvent {
        UpdateCompletedEvent {
            source: source.into(),
            destination: PathBuf::from("/srv/a.jar"),
            version: "1.0".into(),
            build: 3,
            artifact_path: PathBuf::from("/srv/a.jar"),
            download_url: "https://x/a.jar".into(),
        }
    }

    struct PanickingListener;

    impl UpdateCompletionListener for PanickingListener {
        fn on_update_completed(&self, _event: &UpdateCompletedEvent) {
            panic!("listener bug");
        }
    }

    #[tokio::test]
    async fn test_events_are_delivered_on_the_control_thread() {
        let listener = Arc::new(RecordingListener::new());
        let listeners: Vec<Arc<dyn UpdateCompletionListener>> = vec![listener.clone()];
        let control = ControlThread::spawn("updraft-control-test", listeners).unwrap();
        assert!(!control.is_current());

        control.dispatch(event("a")).await.unwrap();
        control.dispatch(event("b")).await.unwrap();

        let seen = listener.deliveries();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].0.source, "a");
        assert!(seen.iter().all(|(_, thread)| thread.as_deref() == Some("updraft-control-test")));
    }

    #[tokio::test]
    async fn test_panicking_listener_does_not_stop_delivery() {
        let listener = Arc::new(RecordingListener::new());
        let listeners: Vec<Arc<dyn UpdateCompletionListener>> = vec![Arc::new(PanickingListener), listener.clone()];
        let control = ControlThread::spawn("updraft-control-panic", listeners).unwrap();
        control.dispatch(event("a")).await.unwrap();
        control.dispatch(event("b")).await.unwrap();
        assert_eq!(listener.events().len(), 2);
    }

    #[tokio::test]
    async fn test_dispatch_after_shutdown_fails() {
        let control = ControlThread::spawn("updraft-control-stop", vec![]).unwrap();
        control.shutdown();
        assert!(control.dispatch(event("a")).await.is_err());
    }
}
