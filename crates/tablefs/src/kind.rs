// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

/// Kind of an inode record
///
/// The kind is stored apart from the permission bits, so `chmod` can never
/// turn a file into a directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InodeKind {
    /// Regular file backed by an overlay buffer
    File,
    /// Directory; only ever holds metadata
    Directory,
    /// Symbolic link whose buffer is the target string
    Symlink,
}

impl InodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InodeKind::File => "file",
            InodeKind::Directory => "directory",
            InodeKind::Symlink => "symlink",
        }
    }

    /// Link count a fresh record of this kind starts with
    pub fn initial_link_count(&self) -> u32 {
        match self {
            InodeKind::Directory => 2,
            InodeKind::File | InodeKind::Symlink => 1,
        }
    }

    pub fn is_dir(&self) -> bool {
        matches!(self, InodeKind::Directory)
    }
}

impl std::fmt::Display for InodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for InodeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "file" => Ok(InodeKind::File),
            "directory" => Ok(InodeKind::Directory),
            "symlink" => Ok(InodeKind::Symlink),
            other => Err(format!("Unknown inode kind: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_string_conversion() {
        assert_eq!(InodeKind::File.as_str(), "file");
        assert_eq!(InodeKind::Directory.to_string(), "directory");
        assert_eq!("symlink".parse::<InodeKind>(), Ok(InodeKind::Symlink));
        assert!("fifo".parse::<InodeKind>().is_err());
    }

    #[test]
    fn test_initial_link_counts() {
        assert_eq!(InodeKind::Directory.initial_link_count(), 2);
        assert_eq!(InodeKind::File.initial_link_count(), 1);
        assert_eq!(InodeKind::Symlink.initial_link_count(), 1);
    }

    #[test]
    fn test_serde_serialization() {
        let json = serde_json::to_string(&InodeKind::Directory).unwrap();
        assert_eq!(json, "\"directory\"");

        let parsed: InodeKind = serde_json::from_str("\"file\"").unwrap();
        assert_eq!(parsed, InodeKind::File);
    }
}
