//! Platform-independent view of what the user dropped.
//!
//! Drop targets hand over a mix of hierarchical entries (files and whole
//! directories) and, when the host cannot resolve entries, flat files.
//! Directory listings are paged: a reader returns one page per call and an
//! empty page once it is exhausted.

use crate::task::FileHandle;
use async_trait::async_trait;
use futures::stream::{self, BoxStream, Stream, StreamExt};
use std::collections::VecDeque;
use std::io;
use std::path::{Path, PathBuf};

pub const DEFAULT_PAGE_SIZE: usize = 100;

#[async_trait]
pub trait FileEntry: Send {
    fn name(&self) -> &str;

    /// Resolve the entry into an uploadable handle.
    async fn open(self: Box<Self>) -> io::Result<FileHandle>;
}

#[async_trait]
pub trait DirectoryReader: Send {
    fn name(&self) -> &str;

    /// Read the next page of children. An empty page means no more entries.
    async fn read_entries(&mut self) -> io::Result<Vec<Entry>>;
}

pub enum Entry {
    File(Box<dyn FileEntry>),
    Directory(Box<dyn DirectoryReader>),
}

impl Entry {
    pub fn file(entry: impl FileEntry + 'static) -> Self {
        Entry::File(Box::new(entry))
    }

    pub fn directory(reader: impl DirectoryReader + 'static) -> Self {
        Entry::Directory(Box::new(reader))
    }

    pub fn name(&self) -> &str {
        match self {
            Entry::File(f) => f.name(),
            Entry::Directory(d) => d.name(),
        }
    }

    /// Resolve a local path into a file or directory entry.
    pub async fn from_path(path: impl AsRef<Path>) -> io::Result<Entry> {
        let path = path.as_ref();
        let meta = tokio::fs::metadata(path).await?;
        if meta.is_dir() {
            Ok(Entry::directory(FsDirectory::new(path)))
        } else {
            Ok(Entry::file(FsFile::new(path)))
        }
    }
}

impl std::fmt::Debug for Entry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Entry::File(e) => write!(f, "File({})", e.name()),
            Entry::Directory(d) => write!(f, "Directory({})", d.name()),
        }
    }
}

#[async_trait]
impl FileEntry for FileHandle {
    fn name(&self) -> &str {
        &self.name
    }

    async fn open(self: Box<Self>) -> io::Result<FileHandle> {
        Ok(*self)
    }
}

/// Stream every child of `reader`, reading pages until one comes back empty.
/// A failed read ends the stream as if the directory were exhausted.
pub fn entries(reader: Box<dyn DirectoryReader>) -> impl Stream<Item = Entry> + Send {
    stream::unfold(Some((reader, VecDeque::new())), |state| async move {
        let (mut reader, mut page) = state?;
        loop {
            if let Some(entry) = page.pop_front() {
                return Some((entry, Some((reader, page))));
            }
            match reader.read_entries().await {
                Ok(batch) if !batch.is_empty() => page.extend(batch),
                Ok(_) => return None,
                Err(e) => {
                    tracing::debug!(dir = reader.name(), error = %e, "directory read failed, treating as end of entries");
                    return None;
                }
            }
        }
    })
}

enum Frame {
    Entry(Entry),
    Listing(BoxStream<'static, Entry>),
}

/// Depth-first walk of `entry`, yielding every file it contains.
///
/// Files are yielded as soon as they are found, so a consumer can act on
/// the first file before the rest of the tree has been listed. Files that
/// cannot be opened are skipped.
pub fn walk(entry: Entry) -> impl Stream<Item = FileHandle> + Send {
    stream::unfold(vec![Frame::Entry(entry)], |mut stack| async move {
        loop {
            match stack.pop()? {
                Frame::Entry(Entry::File(file)) => {
                    let name = file.name().to_string();
                    match file.open().await {
                        Ok(handle) => return Some((handle, stack)),
                        Err(e) => tracing::debug!(file = %name, error = %e, "cannot read dropped file"),
                    }
                }
                Frame::Entry(Entry::Directory(reader)) => {
                    stack.push(Frame::Listing(entries(reader).boxed()));
                }
                Frame::Listing(mut listing) => {
                    if let Some(child) = listing.next().await {
                        stack.push(Frame::Listing(listing));
                        stack.push(Frame::Entry(child));
                    }
                }
            }
        }
    })
}

/// Everything delivered by one drop.
#[derive(Debug, Default)]
pub struct DropPayload {
    pub entries: Vec<Entry>,
    pub files: Vec<FileHandle>,
}

impl DropPayload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(mut self, entry: Entry) -> Self {
        self.entries.push(entry);
        self
    }

    pub fn with_file(mut self, file: FileHandle) -> Self {
        self.files.push(file);
        self
    }

    /// Build a payload from local paths. Paths that cannot be resolved are
    /// logged and left out.
    pub async fn from_paths<P: AsRef<Path>>(paths: &[P]) -> Self {
        let mut payload = DropPayload::new();
        for path in paths {
            match Entry::from_path(path).await {
                Ok(entry) => payload.entries.push(entry),
                Err(e) => tracing::warn!(path = %path.as_ref().display(), error = %e, "cannot read dropped path"),
            }
        }
        payload
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.files.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct FsFile {
    path: PathBuf,
    name: String,
}

impl FsFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = display_name(&path);
        Self { path, name }
    }
}

#[async_trait]
impl FileEntry for FsFile {
    fn name(&self) -> &str {
        &self.name
    }

    async fn open(self: Box<Self>) -> io::Result<FileHandle> {
        let meta = tokio::fs::metadata(&self.path).await?;
        Ok(FileHandle::local(self.name, self.path, meta.len()))
    }
}

/// Paged reader over a local directory.
pub struct FsDirectory {
    path: PathBuf,
    name: String,
    page_size: usize,
    listing: Option<tokio::fs::ReadDir>,
    exhausted: bool,
}

impl FsDirectory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_page_size(path, DEFAULT_PAGE_SIZE)
    }

    pub fn with_page_size(path: impl Into<PathBuf>, page_size: usize) -> Self {
        let path = path.into();
        let name = display_name(&path);
        Self {
            path,
            name,
            page_size: page_size.max(1),
            listing: None,
            exhausted: false,
        }
    }
}

#[async_trait]
impl DirectoryReader for FsDirectory {
    fn name(&self) -> &str {
        &self.name
    }

    async fn read_entries(&mut self) -> io::Result<Vec<Entry>> {
        if self.exhausted {
            return Ok(Vec::new());
        }
        if self.listing.is_none() {
            self.listing = Some(tokio::fs::read_dir(&self.path).await?);
        }
        let Some(listing) = self.listing.as_mut() else {
            return Ok(Vec::new());
        };

        let (page, done) = fill_page(listing, self.page_size).await;
        self.exhausted = done;
        Ok(page)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChildKind {
    Directory,
    File,
    Symlink,
    Other,
}

impl From<std::fs::FileType> for ChildKind {
    fn from(file_type: std::fs::FileType) -> Self {
        if file_type.is_dir() {
            ChildKind::Directory
        } else if file_type.is_file() {
            ChildKind::File
        } else if file_type.is_symlink() {
            ChildKind::Symlink
        } else {
            ChildKind::Other
        }
    }
}

/// One child at a time from an open directory listing.
#[async_trait]
trait Listing: Send {
    async fn next_child(&mut self) -> io::Result<Option<(PathBuf, io::Result<ChildKind>)>>;
}

#[async_trait]
impl Listing for tokio::fs::ReadDir {
    async fn next_child(&mut self) -> io::Result<Option<(PathBuf, io::Result<ChildKind>)>> {
        let Some(child) = self.next_entry().await? else {
            return Ok(None);
        };
        let kind = child.file_type().await.map(ChildKind::from);
        Ok(Some((child.path(), kind)))
    }
}

/// Collect up to `page_size` children. The flag is true once the listing is done.
///
/// A child whose type cannot be read is skipped. A failing listing keeps the
/// children already collected and ends there.
async fn fill_page<L: Listing + ?Sized>(listing: &mut L, page_size: usize) -> (Vec<Entry>, bool) {
    let mut page = Vec::with_capacity(page_size);
    while page.len() < page_size {
        let (path, kind) = match listing.next_child().await {
            Ok(Some(child)) => child,
            Ok(None) => return (page, true),
            Err(e) => {
                tracing::debug!(error = %e, "directory listing failed, ending it early");
                return (page, true);
            }
        };
        match kind {
            Ok(ChildKind::Directory) => {
                page.push(Entry::directory(FsDirectory::with_page_size(path, page_size)))
            }
            Ok(ChildKind::File) => page.push(Entry::file(FsFile::new(path))),
            Ok(ChildKind::Symlink) => {
                // Only follow links to plain files; linked directories can cycle.
                match tokio::fs::metadata(&path).await {
                    Ok(meta) if meta.is_file() => page.push(Entry::file(FsFile::new(path))),
                    _ => tracing::debug!(path = %path.display(), "skipping symlink"),
                }
            }
            Ok(ChildKind::Other) => {}
            Err(e) => tracing::debug!(path = %path.display(), error = %e, "skipping unreadable entry"),
        }
    }
    (page, false)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}
