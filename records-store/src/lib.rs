//! The records store: one CSV file of posts, header row first.
//!
//! A crawl writes through [`RecordsWriter`], which flushes after every
//! appended batch so that an aborted run leaves only complete rows behind.
//! Analysis reads the whole file back with [`load_records`].

use postpulse_core::{Post, StoreError};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::{debug, info};


/// Column order of the records file; matches the field order of [`Post`].
pub const HEADERS: [&str; 12] = [
    "id",
    "bid",
    "timestamp",
    "text",
    "is_retweet",
    "repost_count",
    "comment_count",
    "like_count",
    "user_name",
    "user_followers",
    "source",
    "category",
];

/// Destination for posts accepted by a crawl.
pub trait RecordSink {
    /// Persist `posts` durably before returning.
    fn append(&mut self, posts: &[Post]) -> Result<(), StoreError>;
}

impl RecordSink for Vec<Post> {
    fn append(&mut self, posts: &[Post]) -> Result<(), StoreError> {
        self.extend_from_slice(posts);
        Ok(())
    }
}

pub struct RecordsWriter {
    path: PathBuf,
    writer: csv::Writer<File>,
    written: usize,
}

impl RecordsWriter {
    /// Create (or truncate) the records file and write the header row.
    pub fn create(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = File::create(&path).map_err(|source| StoreError::Open {
            path: path.clone(),
            source,
        })?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        writer.write_record(HEADERS)?;
        writer.flush()?;

        debug!("Created records file {}", path.display());
        Ok(Self {
            path,
            writer,
            written: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn written(&self) -> usize {
        self.written
    }

    /// Flush and close the file, returning the number of rows written.
    pub fn finish(mut self) -> Result<usize, StoreError> {
        self.writer.flush()?;
        info!(
            "Records file {} finalized with {} records",
            self.path.display(),
            self.written
        );
        Ok(self.written)
    }
}

impl RecordSink for RecordsWriter {
    fn append(&mut self, posts: &[Post]) -> Result<(), StoreError> {
        for post in posts {
            self.writer.serialize(post)?;
        }
        self.writer.flush()?;
        self.written += posts.len();
        debug!(
            "Appended {} records to {} ({} total)",
            posts.len(),
            self.path.display(),
            self.written
        );
        Ok(())
    }
}

/// Read every record of a records file, in file order.
pub fn load_records(path: impl AsRef<Path>) -> Result<Vec<Post>, StoreError> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(StoreError::NotFound {
            path: path.to_path_buf(),
        });
    }

    let file = File::open(path).map_err(|source| StoreError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = csv::ReaderBuilder::new().has_headers(true).from_reader(file);

    let mut posts = Vec::new();
    for result in reader.deserialize::<Post>() {
        let post = result.map_err(|e| match e.position() {
            Some(position) => StoreError::MalformedRecord {
                line: position.line(),
                details: e.to_string(),
            },
            None => StoreError::Csv(e),
        })?;
        posts.push(post);
    }

    info!("Loaded {} records from {}", posts.len(), path.display());
    Ok(posts)
}
