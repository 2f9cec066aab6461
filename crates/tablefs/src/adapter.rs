// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Virtual filesystem adapter
//!
//! `TableFs` implements the path-keyed filesystem operations a kernel bridge
//! needs. It owns the inode table and an overlay byte buffer per path. Files
//! whose path is bound to a table are re-materialized on every read: the
//! query runs, the rows are encoded, and the result replaces whatever the
//! buffer held before, including bytes written by callers.
//!
//! All state sits behind one mutex, held for the whole of each operation.
//! In particular `read` keeps it across query, encode, replace and slice, so
//! concurrent readers never observe a half-replaced buffer.

use crate::error::{Error, Result};
use crate::format::{TableBinding, TableFormat};
use crate::inode::{Inode, InodeTable, Owner, ROOT};
use crate::kind::InodeKind;
use crate::source::QuerySource;
use diagnostics::{log_debug, log_info, log_warn};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::SystemTime;

/// Mode of the files registered for each table
pub const TABLE_FILE_MODE: u32 = 0o755;

/// Capacity figures reported by `statfs`; synthetic, not derived from content
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatFs {
    pub block_size: u32,
    pub blocks: u64,
    pub blocks_free: u64,
    pub blocks_available: u64,
}

impl StatFs {
    pub const SYNTHETIC: StatFs = StatFs {
        block_size: 512,
        blocks: 4096,
        blocks_free: 2048,
        blocks_available: 2048,
    };
}

struct State {
    inodes: InodeTable,
    buffers: HashMap<String, Vec<u8>>,
}

impl State {
    /// Overlay buffer for `path`, empty when none was ever stored
    fn buffer(&self, path: &str) -> &[u8] {
        self.buffers.get(path).map(Vec::as_slice).unwrap_or(&[])
    }

    fn replace_buffer(&mut self, path: &str, bytes: Vec<u8>) -> Result<()> {
        self.inodes.get_mut(path)?.set_content_len(bytes.len());
        let _ = self.buffers.insert(path.to_string(), bytes);
        Ok(())
    }

    /// Buffer of an existing non-directory record, created on demand
    fn content_mut(&mut self, path: &str) -> Result<&mut Vec<u8>> {
        if self.inodes.get(path)?.kind().is_dir() {
            return Err(Error::is_directory(path));
        }
        Ok(self.buffers.entry(path.to_string()).or_default())
    }

    fn finish_content_change(&mut self, path: &str) -> Result<()> {
        let len = self.buffer(path).len();
        self.inodes.get_mut(path)?.set_content_len(len);
        Ok(())
    }
}

/// Query-backed in-memory filesystem
pub struct TableFs {
    state: Mutex<State>,
    source: Box<dyn QuerySource>,
    owner: Owner,
    next_handle: AtomicU64,
}

impl TableFs {
    /// Filesystem holding only the root directory, owned by 0:0
    pub fn new<S: QuerySource + 'static>(source: S) -> Self {
        Self::with_owner(source, Owner::default())
    }

    /// Filesystem whose new records belong to `owner`
    pub fn with_owner<S: QuerySource + 'static>(source: S, owner: Owner) -> Self {
        Self {
            state: Mutex::new(State {
                inodes: InodeTable::new(owner),
                buffers: HashMap::new(),
            }),
            source: Box::new(source),
            owner,
            next_handle: AtomicU64::new(0),
        }
    }

    /// Filesystem with every table in `tables` registered
    pub fn with_tables<S, I, T>(source: S, owner: Owner, tables: I) -> Result<Self>
    where
        S: QuerySource + 'static,
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        let fs = Self::with_owner(source, owner);
        for table in tables {
            fs.register_table(table.as_ref())?;
        }
        Ok(fs)
    }

    pub fn owner(&self) -> Owner {
        self.owner
    }

    fn state(&self) -> Result<MutexGuard<'_, State>> {
        Ok(self.state.lock()?)
    }

    fn allocate_handle(&self) -> u64 {
        self.next_handle.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Register the json and arrow files for `table` and materialize both
    /// from a single query.
    ///
    /// A failing query leaves both files registered and empty; the next
    /// read tries again.
    pub fn register_table(&self, table: &str) -> Result<()> {
        if table.is_empty() || table.contains('/') {
            return Err(Error::invalid_path(table));
        }

        let mut state = self.state()?;
        for format in TableFormat::ALL {
            let path = format.path_for(table);
            let _ = state.buffers.remove(&path);
            let _ = state.inodes.insert(path, Inode::file(TABLE_FILE_MODE, self.owner));
        }

        match self.source.query(table) {
            Ok(rows) => {
                for format in TableFormat::ALL {
                    let path = format.path_for(table);
                    match format.encode(&rows) {
                        Ok(bytes) => state.replace_buffer(&path, bytes)?,
                        Err(err) => {
                            let error = err.to_string();
                            log_warn!(
                                "Could not encode {path}: {error}",
                                path: path.as_str(),
                                error: error
                            );
                        }
                    }
                }
                let row_count = rows.len();
                log_info!(
                    "Registered table {table} with {row_count} rows",
                    table: table,
                    row_count: row_count
                );
            }
            Err(err) => {
                let error = err.to_string();
                log_warn!(
                    "Registered table {table} without content: {error}",
                    table: table,
                    error: error
                );
            }
        }
        Ok(())
    }

    /// Run the query behind `binding` and encode the result
    fn materialize(&self, binding: &TableBinding) -> Result<Vec<u8>> {
        let rows = self.source.query(binding.table())?;
        let bytes = binding.format().encode(&rows)?;

        let row_count = rows.len();
        let byte_count = bytes.len();
        log_debug!(
            "Materialized {table} as {format}: {row_count} rows, {byte_count} bytes",
            table: binding.table(),
            format: binding.format().to_string(),
            row_count: row_count,
            byte_count: byte_count
        );
        Ok(bytes)
    }

    /// Metadata of `path`
    pub fn attributes(&self, path: &str) -> Result<Inode> {
        Ok(self.state()?.inodes.get(path)?.clone())
    }

    /// Create an empty regular file and return a fresh handle
    ///
    /// An existing non-directory record at `path` is replaced.
    pub fn create(&self, path: &str, mode: u32) -> Result<u64> {
        let mut state = self.state()?;
        if let Ok(existing) = state.inodes.get(path) {
            if existing.kind().is_dir() {
                return Err(Error::is_directory(path));
            }
        }
        let _ = state.inodes.insert(path, Inode::file(mode, self.owner));
        let _ = state.buffers.remove(path);
        Ok(self.allocate_handle())
    }

    /// Return a fresh handle for an existing record; flags are not checked
    pub fn open(&self, path: &str, _flags: i32) -> Result<u64> {
        let _ = self.state()?.inodes.get(path)?;
        Ok(self.allocate_handle())
    }

    /// Register a directory record. Parents are not checked.
    pub fn mkdir(&self, path: &str, mode: u32) -> Result<()> {
        let mut state = self.state()?;
        if state.inodes.contains(path) {
            return Err(Error::already_exists(path));
        }
        let _ = state.inodes.insert(path, Inode::directory(mode, self.owner));
        let _ = state.inodes.adjust_link_count(ROOT, 1)?;
        Ok(())
    }

    /// Remove a directory record. Entries below it are left in place.
    pub fn rmdir(&self, path: &str) -> Result<()> {
        let mut state = self.state()?;
        if !state.inodes.get(path)?.kind().is_dir() {
            return Err(Error::not_a_directory(path));
        }
        let _ = state.inodes.remove(path)?;
        let _ = state.buffers.remove(path);
        let _ = state.inodes.adjust_link_count(ROOT, -1)?;
        Ok(())
    }

    /// `.`, `..`, then every non-root path without its leading separator,
    /// in registration order
    pub fn readdir(&self, path: &str) -> Result<Vec<String>> {
        let state = self.state()?;
        if !state.inodes.get(path)?.kind().is_dir() {
            return Err(Error::not_a_directory(path));
        }

        let mut entries = vec![".".to_string(), "..".to_string()];
        entries.extend(
            state
                .inodes
                .paths()
                .map(|p| p.strip_prefix('/').unwrap_or(p).to_string()),
        );
        Ok(entries)
    }

    /// Read up to `size` bytes at `offset`
    ///
    /// Table-bound files are re-materialized first. When the query or the
    /// encoding fails, the previous content is served unchanged and the
    /// failure does not reach the caller.
    pub fn read(&self, path: &str, size: usize, offset: usize) -> Result<Vec<u8>> {
        let mut state = self.state()?;
        let kind = state.inodes.get(path)?.kind();
        if kind.is_dir() {
            return Err(Error::is_directory(path));
        }

        if kind == InodeKind::File {
            match TableBinding::from_path(path) {
                Ok(binding) => match self.materialize(&binding) {
                    Ok(bytes) => state.replace_buffer(path, bytes)?,
                    Err(err) => {
                        let error = err.to_string();
                        log_warn!(
                            "Serving previous content of {path}: {error}",
                            path: path,
                            error: error
                        );
                    }
                },
                Err(_) => log_debug!("{path} is not bound to a table", path: path),
            }
        }

        let buffer = state.buffer(path);
        if offset >= buffer.len() {
            return Ok(Vec::new());
        }
        let end = offset.saturating_add(size).min(buffer.len());
        Ok(buffer[offset..end].to_vec())
    }

    /// Splice `data` into the buffer at `offset`, zero-filling any gap
    pub fn write(&self, path: &str, data: &[u8], offset: usize) -> Result<usize> {
        let mut state = self.state()?;
        {
            let buffer = state.content_mut(path)?;
            let end = offset.saturating_add(data.len());
            if buffer.len() < end {
                buffer.resize(end, 0);
            }
            buffer[offset..end].copy_from_slice(data);
        }
        state.finish_content_change(path)?;
        Ok(data.len())
    }

    /// Cut or zero-extend the buffer to `length` bytes
    pub fn truncate(&self, path: &str, length: usize) -> Result<()> {
        let mut state = self.state()?;
        state.content_mut(path)?.resize(length, 0);
        state.finish_content_change(path)
    }

    /// Move record and buffer from `old` to `new`, replacing whatever
    /// `new` held
    pub fn rename(&self, old: &str, new: &str) -> Result<()> {
        if old == ROOT || new == ROOT {
            return Err(Error::immutable(ROOT));
        }

        let mut state = self.state()?;
        if !state.inodes.contains(old) {
            return Err(Error::not_found(old));
        }
        if old == new {
            return Ok(());
        }

        let inode = state.inodes.remove(old)?;
        let buffer = state.buffers.remove(old);
        if let Some(replaced) = state.inodes.insert(new, inode) {
            if replaced.kind().is_dir() {
                let _ = state.inodes.adjust_link_count(ROOT, -1)?;
            }
        }
        match buffer {
            Some(bytes) => {
                let _ = state.buffers.insert(new.to_string(), bytes);
            }
            None => {
                let _ = state.buffers.remove(new);
            }
        }
        log_debug!("Renamed {old} to {new}", old: old, new: new);
        Ok(())
    }

    /// Remove a file or symlink record with its buffer
    pub fn unlink(&self, path: &str) -> Result<()> {
        let mut state = self.state()?;
        if state.inodes.get(path)?.kind().is_dir() {
            return Err(Error::is_directory(path));
        }
        let _ = state.inodes.remove(path)?;
        let _ = state.buffers.remove(path);
        Ok(())
    }

    /// Create a symlink at `link` pointing to `target`; the buffer holds
    /// the target string
    pub fn symlink(&self, link: &str, target: &str) -> Result<()> {
        let mut state = self.state()?;
        if state.inodes.contains(link) {
            return Err(Error::already_exists(link));
        }
        let _ = state.inodes.insert(link, Inode::symlink(target, self.owner));
        let _ = state
            .buffers
            .insert(link.to_string(), target.as_bytes().to_vec());
        Ok(())
    }

    /// Stored target of a symlink
    pub fn readlink(&self, path: &str) -> Result<Vec<u8>> {
        let state = self.state()?;
        if state.inodes.get(path)?.kind() != InodeKind::Symlink {
            return Err(Error::not_a_symlink(path));
        }
        Ok(state.buffer(path).to_vec())
    }

    pub fn chmod(&self, path: &str, mode: u32) -> Result<()> {
        self.state()?.inodes.get_mut(path)?.set_mode(mode);
        Ok(())
    }

    /// Change owner; `None` keeps the current value
    pub fn chown(&self, path: &str, uid: Option<u32>, gid: Option<u32>) -> Result<()> {
        let mut state = self.state()?;
        let inode = state.inodes.get_mut(path)?;
        if let Some(uid) = uid {
            inode.uid = uid;
        }
        if let Some(gid) = gid {
            inode.gid = gid;
        }
        inode.ctime = SystemTime::now();
        Ok(())
    }

    /// Set access and modification times, both to now when `times` is None
    pub fn utimens(&self, path: &str, times: Option<(SystemTime, SystemTime)>) -> Result<()> {
        let mut state = self.state()?;
        let inode = state.inodes.get_mut(path)?;
        let (atime, mtime) = times.unwrap_or_else(|| {
            let now = SystemTime::now();
            (now, now)
        });
        inode.atime = atime;
        inode.mtime = mtime;
        Ok(())
    }

    /// Value of an extended attribute; a missing name yields an empty value
    pub fn getxattr(&self, path: &str, name: &str) -> Result<Vec<u8>> {
        let state = self.state()?;
        let inode = state.inodes.get(path)?;
        Ok(inode.xattrs.get(name).cloned().unwrap_or_default())
    }

    pub fn listxattr(&self, path: &str) -> Result<Vec<String>> {
        let state = self.state()?;
        Ok(state.inodes.get(path)?.xattrs.keys().cloned().collect())
    }

    /// Store an extended attribute, replacing any previous value
    pub fn setxattr(&self, path: &str, name: &str, value: &[u8]) -> Result<()> {
        let mut state = self.state()?;
        let inode = state.inodes.get_mut(path)?;
        let _ = inode.xattrs.insert(name.to_string(), value.to_vec());
        inode.ctime = SystemTime::now();
        Ok(())
    }

    /// Drop an extended attribute; a missing name is not an error
    pub fn removexattr(&self, path: &str, name: &str) -> Result<()> {
        let mut state = self.state()?;
        let inode = state.inodes.get_mut(path)?;
        if inode.xattrs.remove(name).is_some() {
            inode.ctime = SystemTime::now();
        }
        Ok(())
    }

    pub fn statfs(&self, _path: &str) -> StatFs {
        StatFs::SYNTHETIC
    }
}

impl std::fmt::Debug for TableFs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TableFs{{owner: {}:{}}}", self.owner.uid, self.owner.gid)
    }
}
