// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Kernel bridge: serves a `TableFs` through FUSE
//!
//! The kernel speaks inode numbers and (parent, name) pairs; the adapter
//! speaks absolute paths. `InodeMap` translates between the two, and every
//! adapter error is turned into an errno here.

mod inodes;

pub use inodes::{InodeMap, ROOT_INO, file_name, join, parent_of};

use anyhow::{Context, Result};
use diagnostics::{log_debug, log_info};
use fuser::consts::FOPEN_DIRECT_IO;
use fuser::{
    FileAttr, FileType, Filesystem, MountOption, ReplyAttr, ReplyCreate, ReplyData,
    ReplyDirectory, ReplyEmpty, ReplyEntry, ReplyOpen, ReplyStatfs, ReplyWrite, ReplyXattr,
    Request, TimeOrNow,
};
use libc::{EBUSY, EEXIST, EFBIG, EINVAL, EIO, EISDIR, ENOENT, ENOTDIR, ERANGE, c_int};
use std::ffi::OsStr;
use std::path::Path;
use std::time::{Duration, SystemTime};
use tablefs::{Error, Inode, InodeKind, ROOT, StatFs, TableBinding, TableFs};

const TTL: Duration = Duration::from_secs(1);
const GENERATION: u64 = 0;
const BLOCK_SIZE: u32 = StatFs::SYNTHETIC.block_size;
const NAME_MAX: u32 = 255;

/// How the filesystem is presented to the kernel
#[derive(Debug, Clone)]
pub struct MountSettings {
    pub fs_name: String,
    pub allow_other: bool,
}

impl Default for MountSettings {
    fn default() -> Self {
        Self {
            fs_name: "tablefs".to_string(),
            allow_other: false,
        }
    }
}

/// Mount `fs` at `mountpoint` and serve requests until it is unmounted
pub fn mount(fs: TableFs, mountpoint: &Path, settings: &MountSettings) -> Result<()> {
    let mut options = vec![MountOption::FSName(settings.fs_name.clone())];
    if settings.allow_other {
        options.push(MountOption::AllowOther);
    }

    let target = mountpoint.display().to_string();
    log_info!(
        "Mounting {fs_name} at {target}",
        fs_name: settings.fs_name.as_str(),
        target: target.as_str()
    );
    fuser::mount2(TableFsBridge::new(fs), mountpoint, &options)
        .with_context(|| format!("could not mount at {target}"))?;
    log_info!("Unmounted {target}", target: target);
    Ok(())
}

/// errno reported to the kernel for an adapter error
pub fn errno(err: &Error) -> c_int {
    match err {
        Error::NotFound(_) => ENOENT,
        Error::InvalidPath(_) | Error::NotASymlink(_) => EINVAL,
        Error::AlreadyExists(_) => EEXIST,
        Error::IsDirectory(_) => EISDIR,
        Error::NotADirectory(_) => ENOTDIR,
        Error::Immutable(_) => EBUSY,
        Error::Query { .. }
        | Error::Arrow(_)
        | Error::SerdeArrow(_)
        | Error::Json(_)
        | Error::Lock(_) => EIO,
    }
}

fn reject(op: &str, path: &str, err: &Error) -> c_int {
    let code = errno(err);
    let error = err.to_string();
    log_debug!(
        "Rejected {op} on {path} with errno {code}: {error}",
        op: op,
        path: path,
        code: code,
        error: error
    );
    code
}

fn file_type(kind: InodeKind) -> FileType {
    match kind {
        InodeKind::File => FileType::RegularFile,
        InodeKind::Directory => FileType::Directory,
        InodeKind::Symlink => FileType::Symlink,
    }
}

pub fn file_attr(ino: u64, inode: &Inode) -> FileAttr {
    FileAttr {
        ino,
        size: inode.size,
        blocks: inode.size.div_ceil(u64::from(BLOCK_SIZE)),
        atime: inode.atime,
        mtime: inode.mtime,
        ctime: inode.ctime,
        crtime: inode.ctime,
        kind: file_type(inode.kind()),
        perm: (inode.mode & 0o7777) as u16,
        nlink: inode.nlink,
        uid: inode.uid,
        gid: inode.gid,
        rdev: 0,
        blksize: BLOCK_SIZE,
        flags: 0,
    }
}

/// Table-bound files skip the page cache: their size changes on every read
fn open_flags(path: &str) -> u32 {
    if TableBinding::from_path(path).is_ok() {
        FOPEN_DIRECT_IO
    } else {
        0
    }
}

/// Paths from an adapter listing that sit directly under `dir`
pub fn children(listing: &[String], dir: &str) -> Vec<String> {
    listing
        .iter()
        .filter(|entry| entry.as_str() != "." && entry.as_str() != "..")
        .map(|entry| format!("/{entry}"))
        .filter(|path| parent_of(path) == dir)
        .collect()
}

fn resolve_time(time: TimeOrNow) -> SystemTime {
    match time {
        TimeOrNow::SpecificTime(time) => time,
        TimeOrNow::Now => SystemTime::now(),
    }
}

pub struct TableFsBridge {
    fs: TableFs,
    inodes: InodeMap,
}

impl TableFsBridge {
    pub fn new(fs: TableFs) -> Self {
        Self {
            fs,
            inodes: InodeMap::new(),
        }
    }

    fn path(&self, ino: u64) -> std::result::Result<String, c_int> {
        self.inodes.path(ino).map(str::to_string).ok_or(ENOENT)
    }

    fn child(&self, parent: u64, name: &OsStr) -> std::result::Result<String, c_int> {
        let name = name.to_str().ok_or(EINVAL)?;
        self.inodes.child_path(parent, name).ok_or(ENOENT)
    }

    fn entry(&mut self, path: &str) -> std::result::Result<FileAttr, c_int> {
        let inode = self
            .fs
            .attributes(path)
            .map_err(|e| reject("getattr", path, &e))?;
        let ino = self.inodes.ino_for(path);
        Ok(file_attr(ino, &inode))
    }

    fn apply_setattr(
        &self,
        path: &str,
        mode: Option<u32>,
        uid: Option<u32>,
        gid: Option<u32>,
        size: Option<u64>,
        atime: Option<TimeOrNow>,
        mtime: Option<TimeOrNow>,
    ) -> std::result::Result<(), c_int> {
        let fail = |e: Error| reject("setattr", path, &e);
        if let Some(mode) = mode {
            self.fs.chmod(path, mode).map_err(fail)?;
        }
        if uid.is_some() || gid.is_some() {
            self.fs.chown(path, uid, gid).map_err(fail)?;
        }
        if let Some(size) = size {
            let length = usize::try_from(size).map_err(|_| EFBIG)?;
            self.fs.truncate(path, length).map_err(fail)?;
        }
        if atime.is_some() || mtime.is_some() {
            let current = self.fs.attributes(path).map_err(fail)?;
            let atime = atime.map_or(current.atime, resolve_time);
            let mtime = mtime.map_or(current.mtime, resolve_time);
            self.fs.utimens(path, Some((atime, mtime))).map_err(fail)?;
        }
        Ok(())
    }
}

impl Filesystem for TableFsBridge {
    fn lookup(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEntry) {
        match self.child(parent, name).and_then(|path| self.entry(&path)) {
            Ok(attr) => reply.entry(&TTL, &attr, GENERATION),
            Err(code) => reply.error(code),
        }
    }

    fn getattr(&mut self, _req: &Request<'_>, ino: u64, _fh: Option<u64>, reply: ReplyAttr) {
        match self.path(ino).and_then(|path| self.entry(&path)) {
            Ok(attr) => reply.attr(&TTL, &attr),
            Err(code) => reply.error(code),
        }
    }

    fn setattr(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        mode: Option<u32>,
        uid: Option<u32>,
        gid: Option<u32>,
        size: Option<u64>,
        atime: Option<TimeOrNow>,
        mtime: Option<TimeOrNow>,
        _ctime: Option<SystemTime>,
        _fh: Option<u64>,
        _crtime: Option<SystemTime>,
        _chgtime: Option<SystemTime>,
        _bkuptime: Option<SystemTime>,
        _flags: Option<u32>,
        reply: ReplyAttr,
    ) {
        let result = self.path(ino).and_then(|path| {
            self.apply_setattr(&path, mode, uid, gid, size, atime, mtime)?;
            self.entry(&path)
        });
        match result {
            Ok(attr) => reply.attr(&TTL, &attr),
            Err(code) => reply.error(code),
        }
    }

    fn readlink(&mut self, _req: &Request<'_>, ino: u64, reply: ReplyData) {
        let path = match self.path(ino) {
            Ok(path) => path,
            Err(code) => return reply.error(code),
        };
        match self.fs.readlink(&path) {
            Ok(target) => reply.data(&target),
            Err(e) => reply.error(reject("readlink", &path, &e)),
        }
    }

    fn mkdir(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        mode: u32,
        umask: u32,
        reply: ReplyEntry,
    ) {
        let result = self.child(parent, name).and_then(|path| {
            self.fs
                .mkdir(&path, mode & !umask)
                .map_err(|e| reject("mkdir", &path, &e))?;
            self.entry(&path)
        });
        match result {
            Ok(attr) => reply.entry(&TTL, &attr, GENERATION),
            Err(code) => reply.error(code),
        }
    }

    fn unlink(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        let path = match self.child(parent, name) {
            Ok(path) => path,
            Err(code) => return reply.error(code),
        };
        match self.fs.unlink(&path) {
            Ok(()) => {
                self.inodes.forget(&path);
                reply.ok();
            }
            Err(e) => reply.error(reject("unlink", &path, &e)),
        }
    }

    fn rmdir(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        let path = match self.child(parent, name) {
            Ok(path) => path,
            Err(code) => return reply.error(code),
        };
        match self.fs.rmdir(&path) {
            Ok(()) => {
                self.inodes.forget(&path);
                reply.ok();
            }
            Err(e) => reply.error(reject("rmdir", &path, &e)),
        }
    }

    fn symlink(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        link_name: &OsStr,
        target: &Path,
        reply: ReplyEntry,
    ) {
        let Some(target) = target.to_str() else {
            return reply.error(EINVAL);
        };
        let result = self.child(parent, link_name).and_then(|path| {
            self.fs
                .symlink(&path, target)
                .map_err(|e| reject("symlink", &path, &e))?;
            self.entry(&path)
        });
        match result {
            Ok(attr) => reply.entry(&TTL, &attr, GENERATION),
            Err(code) => reply.error(code),
        }
    }

    fn rename(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        newparent: u64,
        newname: &OsStr,
        _flags: u32,
        reply: ReplyEmpty,
    ) {
        let paths = self
            .child(parent, name)
            .and_then(|old| Ok((old, self.child(newparent, newname)?)));
        let (old, new) = match paths {
            Ok(paths) => paths,
            Err(code) => return reply.error(code),
        };
        match self.fs.rename(&old, &new) {
            Ok(()) => {
                self.inodes.rename(&old, &new);
                reply.ok();
            }
            Err(e) => reply.error(reject("rename", &old, &e)),
        }
    }

    fn open(&mut self, _req: &Request<'_>, ino: u64, flags: i32, reply: ReplyOpen) {
        let path = match self.path(ino) {
            Ok(path) => path,
            Err(code) => return reply.error(code),
        };
        match self.fs.open(&path, flags) {
            Ok(fh) => reply.opened(fh, open_flags(&path)),
            Err(e) => reply.error(reject("open", &path, &e)),
        }
    }

    fn read(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        let path = match self.path(ino) {
            Ok(path) => path,
            Err(code) => return reply.error(code),
        };
        let Ok(offset) = usize::try_from(offset) else {
            return reply.error(EINVAL);
        };
        match self.fs.read(&path, size as usize, offset) {
            Ok(data) => reply.data(&data),
            Err(e) => reply.error(reject("read", &path, &e)),
        }
    }

    fn write(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        data: &[u8],
        _write_flags: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyWrite,
    ) {
        let path = match self.path(ino) {
            Ok(path) => path,
            Err(code) => return reply.error(code),
        };
        let Ok(offset) = usize::try_from(offset) else {
            return reply.error(EINVAL);
        };
        match self.fs.write(&path, data, offset) {
            Ok(written) => reply.written(u32::try_from(written).unwrap_or(u32::MAX)),
            Err(e) => reply.error(reject("write", &path, &e)),
        }
    }

    fn readdir(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        mut reply: ReplyDirectory,
    ) {
        let path = match self.path(ino) {
            Ok(path) => path,
            Err(code) => return reply.error(code),
        };
        let listing = match self.fs.readdir(&path) {
            Ok(listing) => listing,
            Err(e) => return reply.error(reject("readdir", &path, &e)),
        };

        let parent_ino = self.inodes.ino_for(parent_of(&path));
        let mut entries = vec![
            (ino, FileType::Directory, ".".to_string()),
            (parent_ino, FileType::Directory, "..".to_string()),
        ];
        for child in children(&listing, &path) {
            // Removed between listing and lookup
            let Ok(inode) = self.fs.attributes(&child) else {
                continue;
            };
            let child_ino = self.inodes.ino_for(&child);
            entries.push((child_ino, file_type(inode.kind()), file_name(&child).to_string()));
        }

        let skip = usize::try_from(offset).unwrap_or(0);
        for (index, (ino, kind, name)) in entries.into_iter().enumerate().skip(skip) {
            if reply.add(ino, (index + 1) as i64, kind, name) {
                break;
            }
        }
        reply.ok();
    }

    fn statfs(&mut self, _req: &Request<'_>, ino: u64, reply: ReplyStatfs) {
        let path = self.path(ino).unwrap_or_else(|_| ROOT.to_string());
        let stats = self.fs.statfs(&path);
        reply.statfs(
            stats.blocks,
            stats.blocks_free,
            stats.blocks_available,
            0,
            0,
            stats.block_size,
            NAME_MAX,
            stats.block_size,
        );
    }

    fn setxattr(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        name: &OsStr,
        value: &[u8],
        _flags: i32,
        _position: u32,
        reply: ReplyEmpty,
    ) {
        let path = match self.path(ino) {
            Ok(path) => path,
            Err(code) => return reply.error(code),
        };
        let Some(name) = name.to_str() else {
            return reply.error(EINVAL);
        };
        match self.fs.setxattr(&path, name, value) {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(reject("setxattr", &path, &e)),
        }
    }

    fn getxattr(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        name: &OsStr,
        size: u32,
        reply: ReplyXattr,
    ) {
        let path = match self.path(ino) {
            Ok(path) => path,
            Err(code) => return reply.error(code),
        };
        let Some(name) = name.to_str() else {
            return reply.error(EINVAL);
        };
        match self.fs.getxattr(&path, name) {
            Ok(value) => reply_xattr(reply, size, &value),
            Err(e) => reply.error(reject("getxattr", &path, &e)),
        }
    }

    fn listxattr(&mut self, _req: &Request<'_>, ino: u64, size: u32, reply: ReplyXattr) {
        let path = match self.path(ino) {
            Ok(path) => path,
            Err(code) => return reply.error(code),
        };
        match self.fs.listxattr(&path) {
            Ok(names) => reply_xattr(reply, size, &xattr_list(&names)),
            Err(e) => reply.error(reject("listxattr", &path, &e)),
        }
    }

    fn removexattr(&mut self, _req: &Request<'_>, ino: u64, name: &OsStr, reply: ReplyEmpty) {
        let path = match self.path(ino) {
            Ok(path) => path,
            Err(code) => return reply.error(code),
        };
        let Some(name) = name.to_str() else {
            return reply.error(EINVAL);
        };
        match self.fs.removexattr(&path, name) {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(reject("removexattr", &path, &e)),
        }
    }

    fn create(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        mode: u32,
        umask: u32,
        _flags: i32,
        reply: ReplyCreate,
    ) {
        let result = self.child(parent, name).and_then(|path| {
            let fh = self
                .fs
                .create(&path, mode & !umask)
                .map_err(|e| reject("create", &path, &e))?;
            Ok((self.entry(&path)?, fh, open_flags(&path)))
        });
        match result {
            Ok((attr, fh, flags)) => reply.created(&TTL, &attr, GENERATION, fh, flags),
            Err(code) => reply.error(code),
        }
    }
}

/// Names as the kernel expects them: each one NUL-terminated
pub fn xattr_list(names: &[String]) -> Vec<u8> {
    let mut bytes = Vec::new();
    for name in names {
        bytes.extend_from_slice(name.as_bytes());
        bytes.push(0);
    }
    bytes
}

/// A zero `size` asks for the length only
fn reply_xattr(reply: ReplyXattr, size: u32, value: &[u8]) {
    let len = u32::try_from(value.len()).unwrap_or(u32::MAX);
    if size == 0 {
        reply.size(len);
    } else if len > size {
        reply.error(ERANGE);
    } else {
        reply.data(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tablefs::Owner;
    use tablefs::testing::StaticSource;

    #[test]
    fn test_errno_mapping() {
        assert_eq!(errno(&Error::not_found("/x")), ENOENT);
        assert_eq!(errno(&Error::invalid_path("/x")), EINVAL);
        assert_eq!(errno(&Error::already_exists("/x")), EEXIST);
        assert_eq!(errno(&Error::is_directory("/x")), EISDIR);
        assert_eq!(errno(&Error::not_a_directory("/x")), ENOTDIR);
        assert_eq!(errno(&Error::not_a_symlink("/x")), EINVAL);
        assert_eq!(errno(&Error::immutable("/")), EBUSY);
        assert_eq!(errno(&Error::query("users", "down")), EIO);
    }

    #[test]
    fn test_file_attr_conversion() {
        let fs = TableFs::with_owner(StaticSource::new(), Owner::new(1000, 100));
        fs.create("/f", 0o100640).unwrap();
        fs.write("/f", &[7u8; 1000], 0).unwrap();

        let attr = file_attr(42, &fs.attributes("/f").unwrap());
        assert_eq!(attr.ino, 42);
        assert_eq!(attr.size, 1000);
        assert_eq!(attr.blocks, 2);
        assert_eq!(attr.kind, FileType::RegularFile);
        assert_eq!(attr.perm, 0o640);
        assert_eq!((attr.uid, attr.gid), (1000, 100));
        assert_eq!(attr.blksize, 512);

        let root = file_attr(ROOT_INO, &fs.attributes(ROOT).unwrap());
        assert_eq!(root.kind, FileType::Directory);
        assert_eq!(root.nlink, 2);
    }

    #[test]
    fn test_children_are_flat() {
        let listing: Vec<String> = [".", "..", "users.json", "d", "d/f", "d/e/g"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(children(&listing, "/"), vec!["/users.json", "/d"]);
        assert_eq!(children(&listing, "/d"), vec!["/d/f"]);
        assert_eq!(children(&listing, "/d/e"), vec!["/d/e/g"]);
    }

    #[test]
    fn test_direct_io_for_table_files() {
        assert_eq!(open_flags("/users.json"), FOPEN_DIRECT_IO);
        assert_eq!(open_flags("/users.arrow"), FOPEN_DIRECT_IO);
        assert_eq!(open_flags("/notes.txt"), 0);
    }

    #[test]
    fn test_xattr_list_encoding() {
        let names = vec!["user.a".to_string(), "user.b".to_string()];
        assert_eq!(xattr_list(&names), b"user.a\0user.b\0");
        assert!(xattr_list(&[]).is_empty());
    }
}
