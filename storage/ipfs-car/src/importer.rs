use std::{
    fmt,
    io::Cursor,
    path::{Component, Path, PathBuf},
};

use bytes::Bytes;
use futures::{Stream, StreamExt};
use ipld_core::cid::Cid;
use tokio::io::AsyncRead;
use tokio_util::sync::CancellationToken;

use crate::{
    events::{emit, EventSink, ImportEvent},
    fs::{Filter, FsNode, FsNodeKind},
    options::{Config, ImportOptions, Layout},
    stores::{BlockService, Blockstore, Exchange},
    unixfs::{
        stream_balanced_tree, stream_trickle_tree, DirEntry, EncodedNode, LeafFormat, TreeNode,
    },
    Error,
};

/// Content to import.
pub enum Input {
    /// An in-memory buffer, imported as a single file.
    Bytes(Bytes),
    /// An arbitrary reader, imported as a single file.
    Stream(Box<dyn AsyncRead + Send + Unpin>),
    /// A file, directory or symlink on the local filesystem.
    Path(PathBuf),
}

impl Input {
    pub fn reader<R>(reader: R) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        Self::Stream(Box::new(reader))
    }
}

impl fmt::Debug for Input {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bytes(bytes) => f.debug_tuple("Bytes").field(&bytes.len()).finish(),
            Self::Stream(_) => f.write_str("Stream"),
            Self::Path(path) => f.debug_tuple("Path").field(path).finish(),
        }
    }
}

impl From<Bytes> for Input {
    fn from(value: Bytes) -> Self {
        Self::Bytes(value)
    }
}

impl From<Vec<u8>> for Input {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value.into())
    }
}

impl From<&'static [u8]> for Input {
    fn from(value: &'static [u8]) -> Self {
        Self::Bytes(Bytes::from_static(value))
    }
}

impl From<PathBuf> for Input {
    fn from(value: PathBuf) -> Self {
        Self::Path(value)
    }
}

impl From<&Path> for Input {
    fn from(value: &Path) -> Self {
        Self::Path(value.to_path_buf())
    }
}

/// Strings are interpreted as filesystem paths.
impl From<&str> for Input {
    fn from(value: &str) -> Self {
        Self::Path(value.into())
    }
}

/// Imports content into a UnixFS DAG, keeping every block in memory.
///
/// Blocks from successive imports accumulate in the same store,
/// they live as long as the [`Importer`].
#[derive(Debug, Default)]
pub struct Importer {
    service: BlockService,
}

impl Importer {
    pub fn new() -> Self {
        Default::default()
    }

    /// Construct an [`Importer`] that announces new blocks to `exchange`.
    pub fn with_exchange(exchange: Box<dyn Exchange>) -> Self {
        Self {
            service: BlockService::new(Blockstore::new(), exchange),
        }
    }

    /// Import `input`, returning the root [`Cid`].
    ///
    /// The options are validated before any I/O happens.
    /// The event sink, if any, is dropped when this function returns, successful or not.
    #[tracing::instrument(skip_all, fields(input = ?input, version = ?options.cid_version, layout = ?options.layout))]
    pub async fn import(&mut self, input: Input, options: ImportOptions) -> Result<Cid, Error> {
        let config = options.validate()?;
        let ImportOptions {
            events,
            cancellation,
            ignore_file,
            include_hidden,
            ..
        } = options;

        let mut session = Session {
            service: &mut self.service,
            config,
            events,
            cancellation,
            processed: 0,
        };

        let root = match input {
            Input::Bytes(bytes) => session.import_file(Cursor::new(bytes), "").await?,
            Input::Stream(reader) => session.import_file(reader, "").await?,
            Input::Path(path) => {
                let mut filter = Filter::new(session.config.ignore.clone(), include_hidden);
                if let Some(ignore_file) = ignore_file {
                    filter = filter.with_ignore_file(ignore_file).await?;
                }
                let tree = FsNode::load(&path, &filter).await?;
                session.import_tree(tree, &path).await?
            }
        };

        tracing::debug!(root = %root.cid, stored = session.service.blockstore().len(), "import finished");
        Ok(root.cid)
    }

    pub fn blockstore(&self) -> &Blockstore {
        self.service.blockstore()
    }

    pub fn block_service(&self) -> &BlockService {
        &self.service
    }
}

/// State of a single [`Importer::import`] call.
struct Session<'a> {
    service: &'a mut BlockService,
    config: Config,
    events: Option<EventSink>,
    cancellation: CancellationToken,
    /// Content bytes imported so far.
    processed: u64,
}

/// Directory being imported.
struct DirFrame {
    name: String,
    relative: PathBuf,
    pending: std::vec::IntoIter<FsNode>,
    entries: Vec<DirEntry>,
}

impl DirFrame {
    fn new(name: String, relative: PathBuf, children: Vec<FsNode>) -> Self {
        Self {
            name,
            relative,
            pending: children.into_iter(),
            entries: vec![],
        }
    }
}

impl Session<'_> {
    async fn commit(&mut self, node: &EncodedNode) -> Result<(), Error> {
        if self.cancellation.is_cancelled() {
            return Err(Error::Cancelled);
        }
        tracing::trace!(cid = %node.cid, len = node.data.len(), "committing block");
        self.service.put(node.cid, node.data.clone()).await
    }

    /// Commit every node in `nodes`, returning the last one, the root.
    async fn commit_all<S>(&mut self, nodes: S) -> Result<EncodedNode, Error>
    where
        S: Stream<Item = Result<EncodedNode, Error>>,
    {
        tokio::pin!(nodes);
        let mut root = None;
        while let Some(node) = nodes.next().await {
            let node = node?;
            self.commit(&node).await?;
            root = Some(node);
        }
        root.ok_or(Error::EmptyRootsError)
    }

    async fn notify(&mut self, name: String, node: &EncodedNode) {
        let event = ImportEvent::new(
            name,
            node.cid,
            self.processed,
            node.link.encoded_data_length,
        );
        emit(self.events.as_ref(), event).await;
    }

    async fn import_file<R>(&mut self, reader: R, name: &str) -> Result<EncodedNode, Error>
    where
        R: AsyncRead + Send + Unpin,
    {
        let chunks = self
            .config
            .chunker
            .stream(reader, self.cancellation.clone());
        let builder = self.config.cid_builder;
        let width = self.config.max_links;
        let raw_leaves = self.config.raw_leaves;

        let root = match self.config.layout {
            Layout::Balanced => {
                let leaf_format = LeafFormat::new(raw_leaves, LeafFormat::File);
                self.commit_all(stream_balanced_tree(chunks, width, builder, leaf_format))
                    .await?
            }
            Layout::Trickle => {
                let leaf_format = LeafFormat::new(raw_leaves, LeafFormat::PbRaw);
                self.commit_all(stream_trickle_tree(chunks, width, builder, leaf_format))
                    .await?
            }
        };

        self.processed += root.link.raw_data_length;
        tracing::debug!(name, cid = %root.cid, size = root.link.raw_data_length, "file imported");
        self.notify(name.to_string(), &root).await;
        Ok(root)
    }

    async fn import_symlink(&mut self, target: &Path, name: String) -> Result<EncodedNode, Error> {
        let target = Bytes::from(target.to_string_lossy().into_owned());
        let node = TreeNode::Symlink(target).encode(&self.config.cid_builder)?;
        self.commit(&node).await?;
        self.notify(name, &node).await;
        Ok(node)
    }

    /// Import a filesystem tree, directories are committed after all their children.
    async fn import_tree(&mut self, root: FsNode, base: &Path) -> Result<EncodedNode, Error> {
        let display = |relative: &Path| clean(&base.join(relative)).to_string_lossy().into_owned();

        let children = match root.kind {
            FsNodeKind::File(path) => {
                let file = tokio::fs::File::open(path).await?;
                return self.import_file(file, &base.to_string_lossy()).await;
            }
            FsNodeKind::Symlink(target) => {
                let name = base.to_string_lossy().into_owned();
                return self.import_symlink(&target, name).await;
            }
            FsNodeKind::Directory(children) => children,
        };

        let mut stack = vec![DirFrame::new(root.name, PathBuf::new(), children)];
        loop {
            let Some(frame) = stack.last_mut() else {
                return Err(Error::EmptyRootsError);
            };

            let Some(child) = frame.pending.next() else {
                let Some(done) = stack.pop() else {
                    return Err(Error::EmptyRootsError);
                };
                let node = TreeNode::Directory(done.entries).encode(&self.config.cid_builder)?;
                self.commit(&node).await?;
                self.notify(display(&done.relative), &node).await;

                match stack.last_mut() {
                    Some(parent) => parent.entries.push(DirEntry {
                        name: done.name,
                        cid: node.cid,
                        link: node.link,
                    }),
                    None => return Ok(node),
                }
                continue;
            };

            let relative = frame.relative.join(&child.name);
            let node = match child.kind {
                FsNodeKind::Directory(children) => {
                    stack.push(DirFrame::new(child.name, relative, children));
                    continue;
                }
                FsNodeKind::File(path) => {
                    let file = tokio::fs::File::open(path).await?;
                    self.import_file(file, &display(&relative)).await?
                }
                FsNodeKind::Symlink(target) => {
                    self.import_symlink(&target, display(&relative)).await?
                }
            };

            if let Some(parent) = stack.last_mut() {
                parent.entries.push(DirEntry {
                    name: child.name,
                    cid: node.cid,
                    link: node.link,
                });
            }
        }
    }
}

/// Lexically normalize `path`: drop `.` components and fold `..` into
/// the preceding component where there is one.
fn clean(path: &Path) -> PathBuf {
    let mut cleaned: Vec<Component> = vec![];
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match cleaned.last() {
                Some(Component::Normal(_)) => {
                    cleaned.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => cleaned.push(component),
            },
            _ => cleaned.push(component),
        }
    }
    if cleaned.is_empty() {
        return PathBuf::from(".");
    }
    cleaned.into_iter().collect()
}
