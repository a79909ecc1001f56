//! In-memory filesystem driver
//!
//! Implements `vfs::FsDriver` on top of a B-tree inode index ([`btree`]), a
//! chained directory hashtable ([`dirtable`]), and a tagged inode record
//! ([`inode`]). Grounded throughout on `examples/original_source/src/fs/vfs.c`'s
//! `ramfs_*` functions — the only concrete filesystem backend the source
//! defines.

#![no_std]

extern crate alloc;

use alloc::boxed::Box;
use alloc::vec::Vec;

use vfs::{
    DeviceId, DirCursor, DirEntryInfo, FileType, FsDriver, Ino, InodeRecord, MakeInodeInfo, Mode,
    Superblock, VfsError, VfsResult,
};

pub mod btree;
pub mod dirtable;
pub mod inode;

use btree::BTree;
use inode::{invalid_inode, RamInode, RamPayload};

/// `"RAM\0"`, little-endian, as a 32-bit driver id (spec.md section 6).
pub const RAMFS_ID: u32 = 0x004d_4152;

/// Fixed B-tree fanout for every ramfs mount.
pub const FANOUT: usize = 64;

struct RamFsState {
    tree: BTree,
}

/// The `ramfs` driver. Stateless itself — all per-mount state lives in the
/// superblock's `private` slot — so a single `'static` instance can be
/// registered and used for every mount.
pub struct RamFs;

pub static RAMFS: RamFs = RamFs;

impl RamFs {
    fn state<'a>(sb: &'a Superblock) -> VfsResult<&'a RamFsState> {
        sb.private_as::<RamFsState>().ok_or(VfsError::BadFs)
    }

    fn state_mut<'a>(sb: &'a mut Superblock) -> VfsResult<&'a mut RamFsState> {
        sb.private_as_mut::<RamFsState>().ok_or(VfsError::BadFs)
    }
}

impl FsDriver for RamFs {
    fn name(&self) -> &str {
        "ramfs"
    }

    fn id(&self) -> u32 {
        RAMFS_ID
    }

    fn read_superblock(&self, sb: &mut Superblock) -> VfsResult<()> {
        let mut tree = BTree::new(FANOUT);
        let zero = tree.insert(invalid_inode());
        debug_assert_eq!(zero, 0, "slot 0 of a fresh B-tree must be the invalid sentinel");
        sb.block_size = 0;
        sb.private = Some(Box::new(RamFsState { tree }));
        sb.root_ino = self.make_directory(sb, b"", Mode::new(FileType::Directory, 0o755))?;
        vfs::vfs_debug!("ramfs: mounted, root inode {}", sb.root_ino);
        Ok(())
    }

    fn make_directory(&self, sb: &mut Superblock, path: &[u8], mode: Mode) -> VfsResult<Ino> {
        let dir_mode = Mode::new(FileType::Directory, mode.permissions());
        let is_root = path.is_empty();

        // Resolve and validate the parent before allocating anything, so a
        // rejected `mkdir` never leaves an orphan inode behind.
        let parent_ino = if is_root {
            None
        } else {
            let (parent_path, basename) = vfs::path::split_last_component(path);
            let parent_ino = self.lookup_inode(sb, parent_path)?;
            let state = Self::state(sb)?;
            let parent = state.tree.lookup(parent_ino).ok_or(VfsError::BadFs).inspect_err(|_| {
                vfs::vfs_error!("ramfs: parent inode {} vanished from the tree mid-lookup", parent_ino)
            })?;
            let table = parent.as_directory().ok_or(VfsError::NotADir)?;
            if table.lookup(basename).is_some() {
                return Err(VfsError::AlreadyExists);
            }
            Some(parent_ino)
        };

        let state = Self::state_mut(sb)?;
        let new_ino = state.tree.insert(RamInode {
            ino: 0,
            mode: dir_mode,
            nlinks: 0,
            size: 0,
            payload: RamPayload::Directory {
                table: dirtable::DirTable::new(),
            },
        });

        // "." always points at the new directory itself; hold one mutable
        // borrow of its record for both the insert and the nlinks bump.
        {
            let inode = state.tree.lookup_mut(new_ino).ok_or(VfsError::BadFs)?;
            inode.ino = new_ino;
            inode.as_directory_mut().ok_or(VfsError::BadFs)?.insert(b".", new_ino)?;
            inode.nlinks += 1;
        }

        match parent_ino {
            None => {
                // Filesystem root: ".." points at self too.
                let inode = state.tree.lookup_mut(new_ino).ok_or(VfsError::BadFs)?;
                inode.as_directory_mut().ok_or(VfsError::BadFs)?.insert(b"..", new_ino)?;
                inode.nlinks += 1;
            }
            Some(parent_ino) => {
                let (_, basename) = vfs::path::split_last_component(path);

                // ".." in the new directory's table points at the parent,
                // so the parent's nlinks (not the new directory's) goes up.
                state
                    .tree
                    .lookup_mut(new_ino)
                    .ok_or(VfsError::BadFs)?
                    .as_directory_mut()
                    .ok_or(VfsError::BadFs)?
                    .insert(b"..", parent_ino)?;

                // Parent's table gains `basename -> new_ino`; same borrow
                // covers both the insert and the parent's nlinks bump.
                let parent = state.tree.lookup_mut(parent_ino).ok_or(VfsError::BadFs)?;
                parent.nlinks += 1;
                parent.as_directory_mut().ok_or(VfsError::BadFs)?.insert(basename, new_ino)?;

                // The basename entry points at new_ino, so its nlinks rises too.
                state.tree.lookup_mut(new_ino).ok_or(VfsError::BadFs)?.nlinks += 1;
            }
        }

        Ok(new_ino)
    }

    fn make_inode(&self, sb: &mut Superblock, mode: Mode, info: MakeInodeInfo) -> VfsResult<Ino> {
        let payload = match mode.file_type() {
            FileType::Regular => RamPayload::Regular { data: Vec::new() },
            FileType::CharDevice | FileType::BlockDevice => match info {
                MakeInodeInfo::Device(dev) => RamPayload::Device(dev),
                _ => return Err(VfsError::InvalidArg),
            },
            FileType::Symlink => RamPayload::Symlink { target: Vec::new() },
            FileType::Fifo => RamPayload::Fifo,
            FileType::Socket => RamPayload::Socket,
            FileType::Directory | FileType::Unknown => return Err(VfsError::InvalidArg),
        };
        let state = Self::state_mut(sb)?;
        let ino = state.tree.insert(RamInode {
            ino: 0,
            mode,
            nlinks: 0,
            size: 0,
            payload,
        });
        state.tree.lookup_mut(ino).ok_or(VfsError::BadFs)?.ino = ino;
        Ok(ino)
    }

    fn free_inode(&self, sb: &mut Superblock, ino: Ino) -> VfsResult<()> {
        let state = Self::state_mut(sb)?;
        state.tree.free(ino).ok_or(VfsError::NotFound)?;
        Ok(())
    }

    fn inode_data(&self, sb: &Superblock, ino: Ino) -> VfsResult<InodeRecord> {
        let state = Self::state(sb)?;
        let inode = state.tree.lookup(ino).ok_or(VfsError::NotFound)?;
        Ok(inode.to_record())
    }

    fn read_inode(&self, sb: &Superblock, ino: Ino, pos: u64, buf: &mut [u8]) -> VfsResult<usize> {
        let state = Self::state(sb)?;
        let inode = state.tree.lookup(ino).ok_or(VfsError::NotFound)?;
        if inode.mode.is_dir() {
            return Err(VfsError::IsDir);
        }
        let data = match &inode.payload {
            RamPayload::Regular { data } => data,
            _ => return Err(VfsError::InvalidArg),
        };
        let pos = pos as usize;
        if pos >= data.len() {
            return Ok(0);
        }
        let n = core::cmp::min(buf.len(), data.len() - pos);
        buf[..n].copy_from_slice(&data[pos..pos + n]);
        Ok(n)
    }

    fn write_inode(&self, sb: &mut Superblock, ino: Ino, pos: u64, buf: &[u8]) -> VfsResult<usize> {
        let state = Self::state_mut(sb)?;
        let inode = state.tree.lookup_mut(ino).ok_or(VfsError::NotFound)?;
        if inode.mode.is_dir() {
            return Err(VfsError::IsDir);
        }
        let data = match &mut inode.payload {
            RamPayload::Regular { data } => data,
            _ => return Err(VfsError::InvalidArg),
        };
        let pos = pos as usize;
        let end = pos.checked_add(buf.len()).ok_or(VfsError::InvalidArg)?;
        if end > data.len() {
            data.resize(end, 0);
        }
        data[pos..end].copy_from_slice(buf);
        let new_len = data.len() as u64;
        inode.size = new_len;
        Ok(buf.len())
    }

    fn get_direntry(&self, sb: &Superblock, ino: Ino, cursor: &mut DirCursor) -> VfsResult<Option<DirEntryInfo>> {
        let state = Self::state(sb)?;
        let inode = state.tree.lookup(ino).ok_or(VfsError::NotFound)?;
        let table = inode.as_directory().ok_or(VfsError::NotADir)?;
        Ok(table.get_direntry(cursor, |child_ino| {
            state
                .tree
                .lookup(child_ino)
                .map(RamInode::file_type)
                .unwrap_or(FileType::Unknown)
        }))
    }

    fn lookup_inode(&self, sb: &Superblock, path: &[u8]) -> VfsResult<Ino> {
        if path.is_empty() {
            return Ok(sb.root_ino);
        }
        let state = Self::state(sb)?;
        let mut current = sb.root_ino;
        let mut rest = path;
        loop {
            let (name, next_rest, _had_sep) = vfs::path::next_component(rest);
            if name.is_empty() {
                return Ok(current);
            }
            let inode = state.tree.lookup(current).ok_or(VfsError::BadFs)?;
            let table = inode.as_directory().ok_or(VfsError::NotADir)?;
            let ino = table.lookup(name).ok_or(VfsError::NotFound)?;
            if next_rest.is_empty() {
                return Ok(ino);
            }
            current = ino;
            rest = next_rest;
        }
    }

    fn link_inode(&self, sb: &mut Superblock, ino: Ino, dir_ino: Ino, name: &[u8]) -> VfsResult<()> {
        {
            let state = Self::state(sb)?;
            let dir = state.tree.lookup(dir_ino).ok_or(VfsError::NotFound)?;
            if !dir.mode.is_dir() {
                return Err(VfsError::NotADir);
            }
        }
        let state = Self::state_mut(sb)?;
        state
            .tree
            .lookup_mut(dir_ino)
            .ok_or(VfsError::BadFs)?
            .as_directory_mut()
            .ok_or(VfsError::NotADir)?
            .insert(name, ino)?;
        state.tree.lookup_mut(ino).ok_or(VfsError::NotFound)?.nlinks += 1;
        Ok(())
    }

    fn unlink_inode(&self, sb: &mut Superblock, path: &[u8]) -> VfsResult<()> {
        let (parent_path, basename) = vfs::path::split_last_component(path);
        if basename.is_empty() {
            return Err(VfsError::InvalidArg);
        }
        let parent_ino = self.lookup_inode(sb, parent_path)?;
        let state = Self::state_mut(sb)?;
        {
            let parent = state.tree.lookup(parent_ino).ok_or(VfsError::NotFound)?;
            if !parent.mode.is_dir() {
                return Err(VfsError::NotADir);
            }
        }
        let ino = state
            .tree
            .lookup_mut(parent_ino)
            .ok_or(VfsError::BadFs)?
            .as_directory_mut()
            .ok_or(VfsError::NotADir)?
            .remove(basename)
            .ok_or(VfsError::NotFound)?;
        let nlinks_after = {
            let inode = state.tree.lookup_mut(ino).ok_or(VfsError::BadFs)?;
            inode.nlinks = inode.nlinks.saturating_sub(1);
            inode.nlinks
        };
        if nlinks_after == 0 {
            state.tree.free(ino);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vfs::{MountOptions, Vfs};

    fn mounted() -> Vfs {
        let mut vfs = Vfs::new();
        vfs.register_filesystem(&RAMFS);
        vfs.mount(DeviceId::make(0, 0), b"/", MountOptions { fs_id: RAMFS_ID }).unwrap();
        vfs
    }

    #[test]
    fn root_mount_has_well_formed_root_directory() {
        let vfs = mounted();
        let st = vfs.stat(b"/").unwrap();
        assert!(st.mode.is_dir());
        assert_eq!(st.mode.permissions(), 0o755);
        assert!(st.nlinks >= 2);
    }

    #[test]
    fn make_nested_directories_and_look_them_up() {
        let mut vfs = mounted();
        vfs.mkdir(b"/a", Mode::new(FileType::Directory, 0o755)).unwrap();
        vfs.mkdir(b"/a/b", Mode::new(FileType::Directory, 0o755)).unwrap();
        vfs.mkdir(b"/a/b/c", Mode::new(FileType::Directory, 0o755)).unwrap();

        let a = vfs.stat(b"/a").unwrap();
        let b = vfs.stat(b"/a/b").unwrap();
        let c = vfs.stat(b"/a/b/c").unwrap();
        assert_ne!(a.ino, b.ino);
        assert_ne!(b.ino, c.ino);

        let b_trailing = vfs.stat(b"/a/b/").unwrap();
        assert_eq!(b.ino, b_trailing.ino);
    }

    #[test]
    fn device_node_appears_in_directory_listing() {
        let mut vfs = mounted();
        vfs.mkdir(b"/dev", Mode::new(FileType::Directory, 0o755)).unwrap();
        vfs.mknod(
            b"/dev/tty0",
            Mode::new(FileType::CharDevice, 0o600),
            DeviceId::make(4, 0),
        )
        .unwrap();

        let entries = vfs.readdir(b"/dev").unwrap();
        let mut names: Vec<&[u8]> = entries.iter().map(|e| e.name.as_slice()).collect();
        names.sort_unstable();
        assert_eq!(names, alloc::vec![b".".as_slice(), b"..".as_slice(), b"tty0".as_slice()]);

        let st = vfs.stat(b"/dev/tty0").unwrap();
        assert_eq!(st.rdev, DeviceId::make(4, 0));
    }

    #[test]
    fn duplicate_directory_name_fails_already_exists() {
        let mut vfs = mounted();
        vfs.mkdir(b"/x", Mode::new(FileType::Directory, 0o755)).unwrap();
        let first = vfs.stat(b"/x").unwrap();
        let err = vfs.mkdir(b"/x", Mode::new(FileType::Directory, 0o755)).unwrap_err();
        assert_eq!(err, VfsError::AlreadyExists);
        assert_eq!(vfs.stat(b"/x").unwrap().ino, first.ino);
    }

    #[test]
    fn mkdir_under_a_device_node_fails_not_a_dir() {
        let mut vfs = mounted();
        vfs.mkdir(b"/dev", Mode::new(FileType::Directory, 0o755)).unwrap();
        vfs.mknod(
            b"/dev/tty0",
            Mode::new(FileType::CharDevice, 0o600),
            DeviceId::make(4, 0),
        )
        .unwrap();
        let err = vfs.mkdir(b"/dev/tty0/x", Mode::new(FileType::Directory, 0o755)).unwrap_err();
        assert_eq!(err, VfsError::NotADir);
    }

    #[test]
    fn write_then_read_round_trips_bytes() {
        let mut vfs = mounted();
        vfs.mknod(b"/f", Mode::new(FileType::Regular, 0o644), DeviceId::default())
            .unwrap();
        vfs.inode_write(b"/f", 0, b"hello").unwrap();
        let mut buf = [0u8; 5];
        let n = vfs.inode_read(b"/f", 0, &mut buf).unwrap();
        assert_eq!(n, 5);
        assert_eq!(&buf, b"hello");
    }

    #[test]
    fn unlink_drops_nlinks_to_zero_and_frees() {
        let mut vfs = mounted();
        vfs.mknod(b"/f", Mode::new(FileType::Regular, 0o644), DeviceId::default())
            .unwrap();
        vfs.unlink(b"/f").unwrap();
        assert_eq!(vfs.stat(b"/f").unwrap_err(), VfsError::NotFound);
    }
}
