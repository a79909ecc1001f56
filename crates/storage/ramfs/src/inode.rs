//! The tagged inode record ramfs stores in its B-tree, and the mapping to
//! the shared `vfs::InodeRecord`/`InodePayload` shape every driver reports
//! through `stat`. Grounded on `vfs.c`'s `struct inode` union; reshaped per
//! spec.md's Design Notes into a sum type with one variant per file kind.

use alloc::vec::Vec;

use vfs::{DeviceId, FileType, Ino, InodePayload, InodeRecord, Mode};

use crate::dirtable::DirTable;

/// Inline symlink buffer size, matching the source's 60-byte inline
/// target before falling back to an out-of-line allocation.
pub const SYMLINK_INLINE_MAX: usize = 60;

pub enum RamPayload {
    /// Backing bytes for a regular file. The on-disk block/indirection
    /// layout spec.md reserves is left unimplemented in memory; this
    /// `Vec<u8>` is the in-memory backend's actual storage.
    Regular { data: Vec<u8> },
    Directory { table: DirTable },
    Device(DeviceId),
    Symlink { target: Vec<u8> },
    Fifo,
    Socket,
}

pub struct RamInode {
    pub ino: Ino,
    pub mode: Mode,
    pub nlinks: u32,
    pub size: u64,
    pub payload: RamPayload,
}

impl RamInode {
    pub fn file_type(&self) -> FileType {
        self.mode.file_type()
    }

    /// Project into the shared `vfs` record shape for `stat`/`inode_data`.
    pub fn to_record(&self) -> InodeRecord {
        let payload = match &self.payload {
            RamPayload::Regular { .. } => InodePayload::Regular { blocks: 0 },
            RamPayload::Directory { .. } => InodePayload::Directory,
            RamPayload::Device(dev) => InodePayload::Device(*dev),
            RamPayload::Symlink { target } => InodePayload::Symlink {
                inline_len: target.len().min(SYMLINK_INLINE_MAX) as u8,
            },
            RamPayload::Fifo => InodePayload::Fifo,
            RamPayload::Socket => InodePayload::Socket,
        };
        InodeRecord {
            ino: self.ino,
            mode: self.mode,
            nlinks: self.nlinks,
            size: self.size,
            payload,
        }
    }

    pub fn as_directory(&self) -> Option<&DirTable> {
        match &self.payload {
            RamPayload::Directory { table } => Some(table),
            _ => None,
        }
    }

    pub fn as_directory_mut(&mut self) -> Option<&mut DirTable> {
        match &mut self.payload {
            RamPayload::Directory { table } => Some(table),
            _ => None,
        }
    }
}

/// The shared sentinel that occupies slot 0 of every B-tree and is never
/// handed back to a caller (spec.md invariant 1).
pub fn invalid_inode() -> RamInode {
    RamInode {
        ino: 0,
        mode: Mode::new(FileType::Unknown, 0),
        nlinks: 0,
        size: 0,
        payload: RamPayload::Fifo,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn regular_payload_reports_zero_reserved_blocks() {
        let inode = RamInode {
            ino: 1,
            mode: Mode::new(FileType::Regular, 0o644),
            nlinks: 1,
            size: 4,
            payload: RamPayload::Regular { data: alloc::vec![1, 2, 3, 4] },
        };
        match inode.to_record().payload {
            InodePayload::Regular { blocks } => assert_eq!(blocks, 0),
            _ => panic!("wrong payload kind"),
        }
    }

    #[test]
    fn directory_payload_round_trips_through_as_directory() {
        let mut inode = RamInode {
            ino: 2,
            mode: Mode::new(FileType::Directory, 0o755),
            nlinks: 2,
            size: 0,
            payload: RamPayload::Directory { table: DirTable::new() },
        };
        inode.as_directory_mut().unwrap().insert(b".", 2).unwrap();
        assert_eq!(inode.as_directory().unwrap().lookup(b"."), Some(2));
    }
}
