use human_repr::HumanCount;
use ipld_core::cid::Cid;
use tokio::sync::mpsc;

/// Receiving end of the import progress channel is owned by the caller,
/// the importer only ever holds the sender and drops it when the import finishes.
pub type EventSink = mpsc::Sender<ImportEvent>;

/// Progress notification, sent whenever a file, symlink or directory root is committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportEvent {
    /// Path of the committed entry, empty for byte and stream inputs.
    pub name: String,
    pub cid: Cid,
    /// Content bytes processed so far, across the whole import.
    pub bytes: u64,
    /// Human readable size of the DAG below `cid`.
    pub size: String,
}

impl ImportEvent {
    pub(crate) fn new(name: String, cid: Cid, bytes: u64, dag_size: u64) -> Self {
        Self {
            name,
            cid,
            bytes,
            size: human_size(dag_size),
        }
    }
}

/// Format a byte count using SI units (e.g. `10.8 kB`, `1.5 MB`).
pub fn human_size(bytes: u64) -> String {
    bytes.human_count_bytes().to_string()
}

/// Send `event` to `sink`, waiting for capacity.
///
/// A closed receiver is not an import failure.
pub(crate) async fn emit(sink: Option<&EventSink>, event: ImportEvent) {
    let Some(sink) = sink else {
        return;
    };
    tracing::trace!(name = %event.name, cid = %event.cid, "emitting import event");
    if let Err(err) = sink.send(event).await {
        tracing::debug!(cid = %err.0.cid, "event receiver dropped");
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::human_size;

    #[rstest]
    #[case(0, "0 B")]
    #[case(9, "9 B")]
    #[case(144, "144 B")]
    #[case(999, "999 B")]
    #[case(1000, "1 kB")]
    #[case(1500, "1.5 kB")]
    #[case(262144, "262.1 kB")]
    #[case(1048576, "1 MB")]
    #[case(2_500_000, "2.5 MB")]
    #[case(5_000_000_000, "5 GB")]
    fn labels(#[case] bytes: u64, #[case] expected: &str) {
        assert_eq!(human_size(bytes), expected);
    }
}
