//! Chained hashtable of directory entries, owned by one directory inode.
//! Grounded on `vfs.c`'s `struct ramfs_directory`/`ramfs_directory_insert`
//! /`ramfs_get_direntry`, reshaped per spec.md's Design Notes into owned
//! `Vec<Vec<DirEntry>>` buckets rather than an intrusive `htnext` chain.

use alloc::vec;
use alloc::vec::Vec;

use vfs::{DirEntryInfo, FileType, Ino, VfsError, VfsResult};
use vfs::hash::hash_bytes;

/// Initial (and, in this implementation, permanent — spec.md's
/// hashtable-growth open question, resolved here in favour of the
/// "acceptable for a bootstrap" fixed-capacity branch) bucket count.
pub const INITIAL_CAPACITY: usize = 8;

/// Fixed overhead of a directory-entry record before the name bytes and
/// its trailing NUL: the `ino` and `record_len` fields themselves. Mirrors
/// the source's `d_reclen = sizeof(struct dirent) - UCHAR_MAX + d_namlen +
/// 1` (`original_source/src/fs/vfs.c:1006`) — a record size distinct from
/// the name length, sized for this crate's own `DirEntryInfo` rather than
/// the source's fixed-capacity `struct dirent`.
const DIRENT_RECORD_OVERHEAD: u32 = 8;

struct Entry {
    name_hash: u32,
    name: Vec<u8>,
    ino: Ino,
}

pub struct DirTable {
    capacity: usize,
    count: usize,
    buckets: Vec<Vec<Entry>>,
}

impl DirTable {
    pub fn new() -> Self {
        DirTable {
            capacity: INITIAL_CAPACITY,
            count: 0,
            buckets: (0..INITIAL_CAPACITY).map(|_| Vec::new()).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    fn bucket_of(&self, hash: u32) -> usize {
        (hash as usize) % self.capacity
    }

    /// Insert `(name, ino)`. Fails `AlreadyExists` if `name` is already
    /// bound; a differing name that happens to collide on hash is simply
    /// appended to the same chain.
    pub fn insert(&mut self, name: &[u8], ino: Ino) -> VfsResult<()> {
        let hash = hash_bytes(name);
        let bucket = self.bucket_of(hash);
        if self.buckets[bucket].iter().any(|e| e.name_hash == hash && e.name == name) {
            return Err(VfsError::AlreadyExists);
        }
        self.buckets[bucket].push(Entry {
            name_hash: hash,
            name: name.to_vec(),
            ino,
        });
        self.count += 1;
        Ok(())
    }

    /// Look up by exact byte-for-byte name. No normalisation.
    pub fn lookup(&self, name: &[u8]) -> Option<Ino> {
        let hash = hash_bytes(name);
        let bucket = self.bucket_of(hash);
        self.buckets[bucket]
            .iter()
            .find(|e| e.name_hash == hash && e.name == name)
            .map(|e| e.ino)
    }

    pub fn remove(&mut self, name: &[u8]) -> Option<Ino> {
        let hash = hash_bytes(name);
        let bucket = self.bucket_of(hash);
        let pos = self.buckets[bucket]
            .iter()
            .position(|e| e.name_hash == hash && e.name == name)?;
        let entry = self.buckets[bucket].remove(pos);
        self.count -= 1;
        Some(entry.ino)
    }

    /// Fetches the entry at `cursor` (1-based flat bucket-major,
    /// chain-minor position; `0` always means "give me the first entry",
    /// which is safe because every directory has at least `.` and `..`)
    /// and advances `cursor` to the next position, or to `0` after the
    /// last entry. `file_type_of` resolves the entry's inode kind for the
    /// `DirEntryInfo.file_type` field.
    pub fn get_direntry(
        &self,
        cursor: &mut u64,
        file_type_of: impl Fn(Ino) -> FileType,
    ) -> Option<DirEntryInfo> {
        let flat: Vec<(usize, usize)> = self
            .buckets
            .iter()
            .enumerate()
            .flat_map(|(b, chain)| (0..chain.len()).map(move |c| (b, c)))
            .collect();
        let pos = if *cursor == 0 { 0 } else { (*cursor - 1) as usize };
        if pos >= flat.len() {
            *cursor = 0;
            return None;
        }
        let (b, c) = flat[pos];
        let entry = &self.buckets[b][c];
        let next = pos + 1;
        *cursor = if next >= flat.len() { 0 } else { (next + 1) as u64 };
        Some(DirEntryInfo {
            ino: entry.ino,
            name: entry.name.clone(),
            record_len: DIRENT_RECORD_OVERHEAD + entry.name.len() as u32 + 1,
            file_type: file_type_of(entry.ino),
        })
    }

    /// All `(name, ino)` pairs in bucket-major, chain-minor order — used
    /// internally when a directory must be rebuilt (e.g. relinking `..`).
    pub fn iter_all(&self) -> impl Iterator<Item = (&[u8], Ino)> {
        self.buckets.iter().flatten().map(|e| (e.name.as_slice(), e.ino))
    }
}

impl Default for DirTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_then_lookup_roundtrips() {
        let mut table = DirTable::new();
        table.insert(b"foo", 5).unwrap();
        assert_eq!(table.lookup(b"foo"), Some(5));
    }

    #[test]
    fn duplicate_name_fails_already_exists() {
        let mut table = DirTable::new();
        table.insert(b"foo", 5).unwrap();
        let err = table.insert(b"foo", 6).unwrap_err();
        assert_eq!(err, VfsError::AlreadyExists);
        assert_eq!(table.lookup(b"foo"), Some(5));
    }

    #[test]
    fn iteration_visits_every_inserted_entry_exactly_once() {
        let mut table = DirTable::new();
        let names: [&[u8]; 5] = [b".", b"..", b"a", b"bb", b"ccc"];
        for (i, n) in names.iter().enumerate() {
            table.insert(n, i as Ino).unwrap();
        }
        let mut seen = Vec::new();
        let mut cursor = 0u64;
        loop {
            match table.get_direntry(&mut cursor, |_| FileType::Regular) {
                Some(e) => seen.push(e.ino),
                None => break,
            }
            if cursor == 0 {
                break;
            }
        }
        seen.sort_unstable();
        assert_eq!(seen, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn remove_then_lookup_misses() {
        let mut table = DirTable::new();
        table.insert(b"foo", 1).unwrap();
        assert_eq!(table.remove(b"foo"), Some(1));
        assert_eq!(table.lookup(b"foo"), None);
    }
}
