// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Inode numbers handed to the kernel, mapped to adapter paths

use std::collections::HashMap;
use tablefs::ROOT;

/// Inode number of `/`
pub const ROOT_INO: u64 = fuser::FUSE_ROOT_ID;

#[derive(Debug)]
pub struct InodeMap {
    paths: HashMap<u64, String>,
    inos: HashMap<String, u64>,
    next: u64,
}

impl InodeMap {
    pub fn new() -> Self {
        let mut map = Self {
            paths: HashMap::new(),
            inos: HashMap::new(),
            next: ROOT_INO + 1,
        };
        let _ = map.paths.insert(ROOT_INO, ROOT.to_string());
        let _ = map.inos.insert(ROOT.to_string(), ROOT_INO);
        map
    }

    pub fn path(&self, ino: u64) -> Option<&str> {
        self.paths.get(&ino).map(String::as_str)
    }

    /// Number for `path`, allocated on first use and stable afterwards
    pub fn ino_for(&mut self, path: &str) -> u64 {
        if let Some(ino) = self.inos.get(path) {
            return *ino;
        }
        let ino = self.next;
        self.next += 1;
        let _ = self.paths.insert(ino, path.to_string());
        let _ = self.inos.insert(path.to_string(), ino);
        ino
    }

    /// Path of `name` inside the directory numbered `parent`
    pub fn child_path(&self, parent: u64, name: &str) -> Option<String> {
        let parent = self.path(parent)?;
        Some(join(parent, name))
    }

    /// Keep the number of `from` for `to`; whatever `to` had is dropped
    pub fn rename(&mut self, from: &str, to: &str) {
        self.forget(to);
        if let Some(ino) = self.inos.remove(from) {
            let _ = self.paths.insert(ino, to.to_string());
            let _ = self.inos.insert(to.to_string(), ino);
        }
    }

    pub fn forget(&mut self, path: &str) {
        if let Some(ino) = self.inos.remove(path) {
            let _ = self.paths.remove(&ino);
        }
    }
}

impl Default for InodeMap {
    fn default() -> Self {
        Self::new()
    }
}

pub fn join(parent: &str, name: &str) -> String {
    if parent == ROOT {
        format!("/{name}")
    } else {
        format!("{parent}/{name}")
    }
}

/// Directory holding `path`; the root is its own parent
pub fn parent_of(path: &str) -> &str {
    match path.rsplit_once('/') {
        Some(("", _)) | None => ROOT,
        Some((parent, _)) => parent,
    }
}

/// Last component of `path`
pub fn file_name(path: &str) -> &str {
    path.rsplit_once('/').map_or(path, |(_, name)| name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_is_preassigned() {
        let mut map = InodeMap::new();
        assert_eq!(map.path(ROOT_INO), Some("/"));
        assert_eq!(map.ino_for("/"), ROOT_INO);
    }

    #[test]
    fn test_numbers_are_stable() {
        let mut map = InodeMap::new();
        let users = map.ino_for("/users.json");
        let groups = map.ino_for("/groups.json");
        assert_ne!(users, groups);
        assert_eq!(map.ino_for("/users.json"), users);
        assert_eq!(map.path(groups), Some("/groups.json"));
    }

    #[test]
    fn test_child_path() {
        let mut map = InodeMap::new();
        assert_eq!(map.child_path(ROOT_INO, "users.json").as_deref(), Some("/users.json"));
        let dir = map.ino_for("/d");
        assert_eq!(map.child_path(dir, "f").as_deref(), Some("/d/f"));
        assert_eq!(map.child_path(999, "f"), None);
    }

    #[test]
    fn test_rename_keeps_number() {
        let mut map = InodeMap::new();
        let a = map.ino_for("/a");
        let b = map.ino_for("/b");
        map.rename("/a", "/b");
        assert_eq!(map.ino_for("/b"), a);
        assert_eq!(map.path(b), None);
        assert_eq!(map.path(a), Some("/b"));
    }

    #[test]
    fn test_forget() {
        let mut map = InodeMap::new();
        let a = map.ino_for("/a");
        map.forget("/a");
        assert_eq!(map.path(a), None);
        assert_ne!(map.ino_for("/a"), a);
    }

    #[test]
    fn test_path_helpers() {
        assert_eq!(parent_of("/users.json"), "/");
        assert_eq!(parent_of("/d/f"), "/d");
        assert_eq!(parent_of("/"), "/");
        assert_eq!(file_name("/d/f"), "f");
        assert_eq!(file_name("/users.json"), "users.json");
        assert_eq!(join("/", "a"), "/a");
        assert_eq!(join("/a", "b"), "/a/b");
    }
}
