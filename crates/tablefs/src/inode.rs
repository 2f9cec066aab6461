// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Path-keyed inode table
//!
//! Every record lives under its absolute path. The table never performs I/O
//! and knows nothing about tables or queries; it only keeps the records
//! well-formed: the root is always present, always a directory, and cannot
//! be removed.

use crate::error::{Error, Result};
use crate::kind::InodeKind;
use indexmap::IndexMap;
use std::collections::BTreeMap;
use std::time::SystemTime;

/// Path of the root directory
pub const ROOT: &str = "/";

/// Permission bits kept by `chmod`
pub const PERMISSION_MASK: u32 = 0o7777;

/// Owner assigned to records the adapter creates
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Owner {
    pub uid: u32,
    pub gid: u32,
}

impl Owner {
    pub fn new(uid: u32, gid: u32) -> Self {
        Self { uid, gid }
    }
}

/// Metadata for one path
#[derive(Debug, Clone, PartialEq)]
pub struct Inode {
    kind: InodeKind,

    /// Permission bits only; the kind lives in `kind`
    pub mode: u32,
    pub nlink: u32,
    /// Length of the overlay buffer once materialized
    pub size: u64,
    pub uid: u32,
    pub gid: u32,
    pub atime: SystemTime,
    pub mtime: SystemTime,
    pub ctime: SystemTime,
    pub xattrs: BTreeMap<String, Vec<u8>>,
}

impl Inode {
    fn new(kind: InodeKind, mode: u32, owner: Owner) -> Self {
        let now = SystemTime::now();
        Self {
            kind,
            mode: mode & PERMISSION_MASK,
            nlink: kind.initial_link_count(),
            size: 0,
            uid: owner.uid,
            gid: owner.gid,
            atime: now,
            mtime: now,
            ctime: now,
            xattrs: BTreeMap::new(),
        }
    }

    /// Empty regular file
    pub fn file(mode: u32, owner: Owner) -> Self {
        Self::new(InodeKind::File, mode, owner)
    }

    pub fn directory(mode: u32, owner: Owner) -> Self {
        Self::new(InodeKind::Directory, mode, owner)
    }

    /// Symbolic link; links are always `0o777` and sized by their target.
    /// The target itself is content, kept by whoever owns the bytes.
    pub fn symlink(target: &str, owner: Owner) -> Self {
        let mut inode = Self::new(InodeKind::Symlink, 0o777, owner);
        inode.size = target.len() as u64;
        inode
    }

    pub fn kind(&self) -> InodeKind {
        self.kind
    }

    /// Replace the permission bits, leaving the kind untouched
    pub fn set_mode(&mut self, mode: u32) {
        self.mode = mode & PERMISSION_MASK;
        self.ctime = SystemTime::now();
    }

    /// Record a content change of the given length
    pub fn set_content_len(&mut self, len: usize) {
        self.size = len as u64;
        self.mtime = SystemTime::now();
    }
}

/// Mapping from absolute path to inode record, in insertion order
#[derive(Debug, Clone)]
pub struct InodeTable {
    entries: IndexMap<String, Inode>,
}

impl InodeTable {
    /// Table holding only the root directory
    pub fn new(owner: Owner) -> Self {
        let mut entries = IndexMap::new();
        entries.insert(ROOT.to_string(), Inode::directory(0o755, owner));
        Self { entries }
    }

    /// Insert or replace the record at `path`, returning the previous one
    pub fn insert<P: Into<String>>(&mut self, path: P, inode: Inode) -> Option<Inode> {
        self.entries.insert(path.into(), inode)
    }

    pub fn get(&self, path: &str) -> Result<&Inode> {
        self.entries.get(path).ok_or_else(|| Error::not_found(path))
    }

    pub fn get_mut(&mut self, path: &str) -> Result<&mut Inode> {
        self.entries.get_mut(path).ok_or_else(|| Error::not_found(path))
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    /// Remove the record at `path`; the root is refused
    pub fn remove(&mut self, path: &str) -> Result<Inode> {
        if path == ROOT {
            return Err(Error::immutable(path));
        }
        self.entries
            .shift_remove(path)
            .ok_or_else(|| Error::not_found(path))
    }

    /// Every registered path except the root
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries
            .keys()
            .map(String::as_str)
            .filter(|path| *path != ROOT)
    }

    /// Add `delta` to a directory's link count, never dropping below 1
    pub fn adjust_link_count(&mut self, path: &str, delta: i32) -> Result<u32> {
        let inode = self.get_mut(path)?;
        if !inode.kind().is_dir() {
            return Err(Error::not_a_directory(path));
        }
        inode.nlink = inode.nlink.saturating_add_signed(delta).max(1);
        Ok(inode.nlink)
    }

    /// Number of records, root included
    pub fn record_count(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_table_has_root() {
        let table = InodeTable::new(Owner::default());
        let root = table.get(ROOT).unwrap();
        assert_eq!(root.kind(), InodeKind::Directory);
        assert_eq!(root.nlink, 2);
        assert_eq!(root.mode, 0o755);
        assert_eq!(table.record_count(), 1);
        assert_eq!(table.paths().count(), 0);
    }

    #[test]
    fn test_root_is_not_removable() {
        let mut table = InodeTable::new(Owner::default());
        assert!(matches!(table.remove(ROOT), Err(Error::Immutable(_))));
        assert!(table.contains(ROOT));
    }

    #[test]
    fn test_get_missing_is_not_found() {
        let table = InodeTable::new(Owner::default());
        assert!(matches!(table.get("/missing"), Err(Error::NotFound(p)) if p == "/missing"));
    }

    #[test]
    fn test_paths_keep_insertion_order() {
        let mut table = InodeTable::new(Owner::default());
        table.insert("/zeta", Inode::file(0o644, Owner::default()));
        table.insert("/alpha", Inode::file(0o644, Owner::default()));
        table.insert("/mid", Inode::directory(0o755, Owner::default()));

        let paths: Vec<&str> = table.paths().collect();
        assert_eq!(paths, vec!["/zeta", "/alpha", "/mid"]);

        table.remove("/zeta").unwrap();
        let paths: Vec<&str> = table.paths().collect();
        assert_eq!(paths, vec!["/alpha", "/mid"]);
    }

    #[test]
    fn test_insert_replaces_record() {
        let mut table = InodeTable::new(Owner::default());
        assert!(table.insert("/f", Inode::file(0o600, Owner::default())).is_none());
        let previous = table.insert("/f", Inode::file(0o644, Owner::default()));
        assert_eq!(previous.map(|inode| inode.mode), Some(0o600));
        assert_eq!(table.get("/f").unwrap().mode, 0o644);
        assert_eq!(table.record_count(), 2);
    }

    #[test]
    fn test_adjust_link_count() {
        let mut table = InodeTable::new(Owner::default());
        assert_eq!(table.adjust_link_count(ROOT, 1).unwrap(), 3);
        assert_eq!(table.adjust_link_count(ROOT, -1).unwrap(), 2);
        assert_eq!(table.adjust_link_count(ROOT, -5).unwrap(), 1);

        table.insert("/f", Inode::file(0o644, Owner::default()));
        assert!(matches!(
            table.adjust_link_count("/f", 1),
            Err(Error::NotADirectory(_))
        ));
    }

    #[test]
    fn test_symlink_record() {
        let link = Inode::symlink("/users.json", Owner::new(1000, 100));
        assert_eq!(link.kind(), InodeKind::Symlink);
        assert_eq!(link.size, 11);
        assert_eq!(link.mode, 0o777);
        assert_eq!(link.nlink, 1);
        assert_eq!((link.uid, link.gid), (1000, 100));
    }

    #[test]
    fn test_set_mode_keeps_kind() {
        let mut dir = Inode::directory(0o755, Owner::default());
        dir.set_mode(0o100644);
        assert_eq!(dir.mode, 0o644);
        assert_eq!(dir.kind(), InodeKind::Directory);
    }
}
