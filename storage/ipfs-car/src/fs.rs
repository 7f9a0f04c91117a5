//! Filesystem source for the importer.
//!
//! The whole tree is discovered upfront, so that filtering errors
//! surface before any block is produced.

use std::path::{Path, PathBuf};

use glob::Pattern;
use walkdir::{DirEntry, WalkDir};

use crate::Error;

/// Decides which filesystem entries are skipped during discovery.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    rules: Vec<Pattern>,
    include_hidden: bool,
}

impl Filter {
    pub fn new(rules: Vec<Pattern>, include_hidden: bool) -> Self {
        Self {
            rules,
            include_hidden,
        }
    }

    /// Parse ignore rules, one glob per line; empty lines and `#` comments are skipped.
    pub fn parse_rules(contents: &str) -> Result<Vec<Pattern>, Error> {
        contents
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(|line| Pattern::new(line).map_err(Error::from))
            .collect()
    }

    /// Extend the rules with the ones in `path`.
    pub async fn with_ignore_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self, Error> {
        let contents = tokio::fs::read_to_string(path).await?;
        self.rules.extend(Self::parse_rules(&contents)?);
        Ok(self)
    }

    /// Whether the entry at `relative` (relative to the import root) should be skipped.
    ///
    /// Rules are matched against the entry name and its relative path.
    pub fn is_excluded(&self, relative: &Path) -> bool {
        let name = relative
            .file_name()
            .map(|name| name.to_string_lossy())
            .unwrap_or_default();
        if !self.include_hidden && name.starts_with('.') && name != "." && name != ".." {
            return true;
        }
        self.rules
            .iter()
            .any(|rule| rule.matches(&name) || rule.matches_path(relative))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FsNodeKind {
    File(PathBuf),
    /// Children, sorted by name.
    Directory(Vec<FsNode>),
    /// The link target, links are never followed.
    Symlink(PathBuf),
}

/// A discovered filesystem entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsNode {
    pub name: String,
    pub kind: FsNodeKind,
}

impl FsNode {
    /// Discover the tree rooted at `path`, the root itself is never filtered.
    pub async fn load<P: AsRef<Path>>(path: P, filter: &Filter) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();
        let filter = filter.clone();
        tokio::task::spawn_blocking(move || load_blocking(&path, &filter)).await?
    }

    pub fn is_dir(&self) -> bool {
        matches!(self.kind, FsNodeKind::Directory(_))
    }

    fn push(&mut self, child: FsNode) {
        if let FsNodeKind::Directory(children) = &mut self.kind {
            children.push(child);
        }
    }
}

fn load_blocking(root: &Path, filter: &Filter) -> Result<FsNode, Error> {
    let walker = WalkDir::new(root)
        .follow_links(false)
        .follow_root_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0
                || entry
                    .path()
                    .strip_prefix(root)
                    .map_or(true, |relative| !filter.is_excluded(relative))
        });

    // Open directories, `stack[i]` lives at depth `i`
    let mut stack: Vec<FsNode> = vec![];
    for entry in walker {
        let entry = entry?;
        let depth = entry.depth();
        close_until(&mut stack, depth);

        let node = to_node(&entry)?;
        match (node.is_dir(), stack.last_mut()) {
            (true, _) => stack.push(node),
            (false, Some(parent)) => parent.push(node),
            (false, None) => return Ok(node),
        }
    }

    close_until(&mut stack, 1);
    stack.pop().ok_or_else(|| {
        Error::IoError(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("nothing found at {}", root.display()),
        ))
    })
}

/// Pop the directories deeper than `depth - 1`, attaching them to their parents.
fn close_until(stack: &mut Vec<FsNode>, depth: usize) {
    while stack.len() > depth.max(1) {
        if let Some(done) = stack.pop() {
            if let Some(parent) = stack.last_mut() {
                parent.push(done);
            }
        }
    }
}

fn to_node(entry: &DirEntry) -> Result<FsNode, Error> {
    let name = entry.file_name().to_string_lossy().into_owned();
    let file_type = entry.file_type();
    let kind = if file_type.is_symlink() {
        FsNodeKind::Symlink(std::fs::read_link(entry.path())?)
    } else if file_type.is_dir() {
        FsNodeKind::Directory(vec![])
    } else {
        FsNodeKind::File(entry.path().to_path_buf())
    };
    Ok(FsNode { name, kind })
}
