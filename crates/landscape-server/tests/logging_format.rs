// SPDX-License-Identifier: Apache-2.0

use std::io;
use std::sync::{Arc, Mutex};

use landscape_server::{AggregationError, ErrorHandler, EventStore};
use tracing::Level;
use tracing_subscriber::fmt::MakeWriter;

#[derive(Clone, Default)]
struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

struct BufferWriter(Arc<Mutex<Vec<u8>>>);

impl<'a> MakeWriter<'a> for SharedBuffer {
    type Writer = BufferWriter;

    fn make_writer(&'a self) -> Self::Writer {
        BufferWriter(Arc::clone(&self.0))
    }
}

impl io::Write for BufferWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut guard = self
            .0
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "lock poisoned"))?;
        guard.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn json_lines(sink: &SharedBuffer) -> Vec<serde_json::Value> {
    let bytes = sink.0.lock().expect("lock output").clone();
    let text = String::from_utf8(bytes).expect("utf8 log output");
    text.lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| serde_json::from_str(l).expect("json log line"))
        .collect()
}

#[test]
fn diagnostic_events_are_logged_as_structured_json() {
    let sink = SharedBuffer::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(sink.clone())
        .json()
        .with_max_level(Level::INFO)
        .finish();
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("runtime");
    let store = Arc::new(EventStore::new());
    let handler = ErrorHandler::new(Arc::clone(&store));

    tracing::subscriber::with_default(subscriber, || {
        runtime.block_on(async {
            handler
                .handle_node_warning("inventory", "no instances found for service inventory")
                .await;
            let cause = AggregationError::Transport {
                url: "http://billing/health".to_string(),
                message: "connection refused".to_string(),
            };
            handler
                .handle_node_error("billing", "call failed", &cause)
                .await;
        });
    });

    let lines = json_lines(&sink);
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0].get("level").and_then(|v| v.as_str()), Some("WARN"));
    let fields = lines[0].get("fields").expect("fields object");
    assert_eq!(
        fields.get("service_id").and_then(|v| v.as_str()),
        Some("inventory")
    );
    assert_eq!(lines[1].get("level").and_then(|v| v.as_str()), Some("ERROR"));
    let fields = lines[1].get("fields").expect("fields object");
    assert_eq!(
        fields.get("message").and_then(|v| v.as_str()),
        Some("call failed")
    );
    assert!(fields
        .get("cause")
        .and_then(|v| v.as_str())
        .is_some_and(|c| c.contains("connection refused")));
    assert_eq!(store.published_total(), 2);
}
