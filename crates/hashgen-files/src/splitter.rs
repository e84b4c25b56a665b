//! Sequential block splitting.
//!
//! The splitter reads a file front to back without seeking and hands out
//! owned [`Block`]s. Every block is exactly `block_size` bytes except the
//! last, which may be shorter but is never empty.

use crate::error::{HashgenError, Result};
use crate::{Block, DEFAULT_BLOCK_SIZE};
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

/// Splits one file into indexed blocks
pub struct BlockSplitter<R = File> {
    reader: R,
    path: PathBuf,
    block_size: usize,
    next_index: u64,
    finished: bool,
}

impl BlockSplitter<File> {
    /// Open a file for splitting
    ///
    /// # Errors
    ///
    /// Returns an error if the block size is zero or the file cannot be opened.
    pub fn open<P: AsRef<Path>>(path: P, block_size: usize) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| HashgenError::io(path, e))?;
        Self::from_reader(file, path, block_size)
    }

    /// Open a file with the default block size
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn with_default_size<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open(path, DEFAULT_BLOCK_SIZE)
    }
}

impl<R: Read> BlockSplitter<R> {
    /// Split an arbitrary reader; `path` is only used in error reports
    ///
    /// # Errors
    ///
    /// Returns an error if the block size is zero.
    pub fn from_reader(reader: R, path: impl Into<PathBuf>, block_size: usize) -> Result<Self> {
        if block_size == 0 {
            return Err(HashgenError::InvalidConfig(
                "block size must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            reader,
            path: path.into(),
            block_size,
            next_index: 0,
            finished: false,
        })
    }

    /// Block size in bytes
    #[must_use]
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Number of blocks emitted so far.
    ///
    /// Once [`next_block`](Self::next_block) has returned `None` this is the
    /// total block count of the file.
    #[must_use]
    pub fn blocks_emitted(&self) -> u64 {
        self.next_index
    }

    /// Read the next block
    ///
    /// Short reads are accumulated until the block is full or the stream ends.
    /// Returns `None` once the stream is exhausted; a trailing empty block is
    /// never produced.
    ///
    /// # Errors
    ///
    /// Returns an error if reading from the underlying file fails.
    pub fn next_block(&mut self) -> Result<Option<Block>> {
        if self.finished {
            return Ok(None);
        }

        let mut body = vec![0u8; self.block_size];
        let mut filled = 0;

        while filled < self.block_size {
            match self.reader.read(&mut body[filled..]) {
                Ok(0) => {
                    self.finished = true;
                    break;
                }
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(HashgenError::io(&self.path, e)),
            }
        }

        if filled == 0 {
            return Ok(None);
        }

        body.truncate(filled);
        let block = Block {
            index: self.next_index,
            body,
        };
        self.next_index += 1;

        Ok(Some(block))
    }
}

impl<R: Read> Iterator for BlockSplitter<R> {
    type Item = Result<Block>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_block().transpose()
    }
}
