use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::store::SnapshotStore;

enum WriteCommand {
    Put { key: String, value: String },
    Flush(Sender<()>),
    Shutdown,
}

/// Background writer that owns the store. Writes are applied in the order
/// they were enqueued; queued writes for the same key collapse to the latest
/// one, so the last enqueued snapshot is always what ends up stored.
pub struct SnapshotWriter {
    tx: Sender<WriteCommand>,
    handle: Option<JoinHandle<()>>,
}

impl SnapshotWriter {
    pub fn spawn<S: SnapshotStore>(store: S) -> Self {
        let (tx, rx) = mpsc::channel();
        let handle = thread::spawn(move || run(store, rx));

        Self {
            tx,
            handle: Some(handle),
        }
    }

    /// Fire-and-forget write
    pub fn enqueue(&self, key: &str, value: String) {
        let cmd = WriteCommand::Put {
            key: key.to_string(),
            value,
        };
        if self.tx.send(cmd).is_err() {
            warn!(key, "snapshot writer gone, dropping write");
        }
    }

    /// Blocks until every write enqueued so far has been attempted
    pub fn flush(&self) -> Result<()> {
        let (ack_tx, ack_rx) = mpsc::channel();
        self.tx
            .send(WriteCommand::Flush(ack_tx))
            .map_err(|_| Error::WriterClosed)?;
        ack_rx.recv().map_err(|_| Error::WriterClosed)
    }
}

impl Drop for SnapshotWriter {
    fn drop(&mut self) {
        let _ = self.tx.send(WriteCommand::Shutdown);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("snapshot writer thread panicked");
            }
        }
    }
}

fn run<S: SnapshotStore>(mut store: S, rx: Receiver<WriteCommand>) {
    while let Ok(first) = rx.recv() {
        let mut pending: Vec<(String, String)> = Vec::new();
        let mut acks = Vec::new();
        let mut shutdown = false;

        // take everything already queued so stale snapshots are never written
        let mut next = Some(first);
        while let Some(cmd) = next {
            match cmd {
                WriteCommand::Put { key, value } => {
                    match pending.iter_mut().find(|(k, _)| *k == key) {
                        Some(slot) => slot.1 = value,
                        None => pending.push((key, value)),
                    }
                }
                WriteCommand::Flush(ack) => acks.push(ack),
                WriteCommand::Shutdown => shutdown = true,
            }
            next = rx.try_recv().ok();
        }

        for (key, value) in pending {
            match store.save(&key, &value) {
                Ok(()) => debug!(key = %key, bytes = value.len(), "snapshot written"),
                Err(err) => warn!(key = %key, error = %err, "snapshot write failed"),
            }
        }

        for ack in acks {
            let _ = ack.send(());
        }

        if shutdown {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use std::sync::{Arc, Mutex};

    /// Records every save so ordering can be checked
    #[derive(Clone, Default)]
    struct RecordingStore {
        saves: Arc<Mutex<Vec<(String, String)>>>,
    }

    impl SnapshotStore for RecordingStore {
        fn load(&self, _key: &str) -> Result<Option<String>> {
            Ok(None)
        }

        fn save(&mut self, key: &str, value: &str) -> Result<()> {
            self.saves
                .lock()
                .unwrap()
                .push((key.to_string(), value.to_string()));
            Ok(())
        }
    }

    struct FailingStore;

    impl SnapshotStore for FailingStore {
        fn load(&self, _key: &str) -> Result<Option<String>> {
            Ok(None)
        }

        fn save(&mut self, _key: &str, _value: &str) -> Result<()> {
            Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "disk full",
            )))
        }
    }

    #[test]
    fn last_enqueued_write_wins() {
        let store = MemoryStore::new();
        let writer = SnapshotWriter::spawn(store.clone());
        for i in 0..100 {
            writer.enqueue("k", i.to_string());
        }
        writer.flush().unwrap();
        assert_eq!(store.get("k").as_deref(), Some("99"));
    }

    #[test]
    fn writes_for_a_key_never_go_backwards() {
        let store = RecordingStore::default();
        let writer = SnapshotWriter::spawn(store.clone());
        for i in 0..50 {
            writer.enqueue("k", i.to_string());
        }
        writer.flush().unwrap();

        let values: Vec<u32> = store
            .saves
            .lock()
            .unwrap()
            .iter()
            .map(|(_, v)| v.parse().unwrap())
            .collect();
        assert!(values.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(values.last(), Some(&49));
    }

    #[test]
    fn drop_drains_the_queue() {
        let store = MemoryStore::new();
        {
            let writer = SnapshotWriter::spawn(store.clone());
            writer.enqueue("a", "1".into());
            writer.enqueue("b", "2".into());
        }
        assert_eq!(store.get("a").as_deref(), Some("1"));
        assert_eq!(store.get("b").as_deref(), Some("2"));
    }

    #[test]
    fn failed_writes_are_not_fatal() {
        let writer = SnapshotWriter::spawn(FailingStore);
        writer.enqueue("k", "v".into());
        assert!(writer.flush().is_ok());
    }
}
