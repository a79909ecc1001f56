//! WATOS Virtual File System core
//!
//! A uniform, path-addressed namespace over pluggable filesystem drivers.
//! This crate owns the mount tree, the driver registry, and the dispatch
//! shims (`mkdir`/`mknod`/`stat`/`inode_read`/`inode_write`/directory
//! iteration) that locate a superblock for a path and forward to its
//! driver. The non-trivial storage engineering — the B-tree inode index,
//! the directory hashtable, the ramfs backend itself — lives in the
//! `ramfs` crate, which implements the [`FsDriver`] trait published here.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────┐
//! │           User Applications          │
//! └──────────────────┬───────────────────┘
//!                    │ mkdir/mknod/stat/read/write
//! ┌──────────────────▼───────────────────┐
//! │              VFS Layer               │
//! │  - Driver registry                   │
//! │  - Mount tree / path resolution      │
//! └──────────────────┬───────────────────┘
//!                    │ FsDriver trait
//! ┌─────────┬────────┴────────┬──────────┐
//! │  ramfs  │   (future fs)   │   ...    │
//! └─────────┴─────────────────┴──────────┘
//! ```

#![no_std]

extern crate alloc;

use alloc::vec::Vec;
use spin::Mutex;

pub mod debug;
pub mod driver;
pub mod error;
pub mod hash;
pub mod mode;
pub mod mount;
pub mod path;

pub use driver::{DirCursor, DirEntryInfo, DriverRegistry, FsDriver, Ino, InodePayload, InodeRecord, MakeInodeInfo};
pub use error::{VfsError, VfsResult};
pub use mode::{DeviceId, FileType, Mode};
pub use mount::{MountTree, SbFlags, SbHandle, Superblock};

/// Options accepted by [`Vfs::mount`].
#[derive(Debug, Clone, Copy)]
pub struct MountOptions {
    pub fs_id: u32,
}

/// The standard POSIX-shaped record returned by `stat`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stat {
    pub ino: Ino,
    pub mode: Mode,
    pub nlinks: u32,
    pub size: u64,
    /// Populated for character/block device inodes; zero otherwise.
    pub rdev: DeviceId,
}

/// Virtual File System manager: driver registry + mount tree.
pub struct Vfs {
    drivers: DriverRegistry,
    mounts: MountTree,
}

impl Vfs {
    pub const fn new() -> Self {
        Vfs {
            drivers: DriverRegistry::new(),
            mounts: MountTree::new(),
        }
    }

    /// Register a filesystem driver, making its id available to `mount`.
    pub fn register_filesystem(&mut self, driver: &'static dyn FsDriver) {
        self.drivers.register(driver);
    }

    pub fn filesystem_by_id(&self, id: u32) -> Option<&'static dyn FsDriver> {
        self.drivers.by_id(id)
    }

    /// Mount a filesystem at `target_path`. Only the root mount
    /// (`target_path == b"/"`, no prior root) is supported; spec.md
    /// inherits the source's non-root-mount limitation.
    pub fn mount(&mut self, dev: DeviceId, target_path: &[u8], opts: MountOptions) -> VfsResult<()> {
        if target_path != b"/" {
            vfs_error!("mount: non-root mount of {:?} rejected", target_path);
            return Err(VfsError::NotSupported);
        }
        let driver = self.drivers.by_id(opts.fs_id).ok_or(VfsError::NotFound)?;
        let mut sb = Superblock::new_root(dev, driver.id());
        driver.read_superblock(&mut sb)?;
        self.mounts.mount_root(sb)?;
        vfs_debug!("mounted driver {:#x} at /", opts.fs_id);
        Ok(())
    }

    /// Tear down the root mount.
    pub fn unmount_root(&mut self) -> VfsResult<()> {
        self.mounts.unmount_root()?;
        Ok(())
    }

    /// Resolve `path` to `(superblock, driver)`.
    fn resolve<'a>(&self, path: &'a [u8]) -> VfsResult<(SbHandle, &'a [u8], &'static dyn FsDriver)> {
        let (handle, rel) = self.mounts.resolve(path)?;
        let sb = self.mounts.get(handle);
        let driver = self
            .drivers
            .by_id(sb.driver_id)
            .ok_or(VfsError::BadFs)
            .inspect_err(|_| vfs_error!("resolve: superblock driver id {:#x} not registered", sb.driver_id))?;
        Ok((handle, rel, driver))
    }

    pub fn mkdir(&mut self, path: &[u8], mode: Mode) -> VfsResult<Ino> {
        let (handle, rel, driver) = self.resolve(path)?;
        let rel = rel.to_vec();
        driver.make_directory(self.mounts.get_mut(handle), &rel, mode)
    }

    /// `mknod` refuses directory and symlink types, redirecting callers to
    /// `mkdir`/a future `symlink` op.
    pub fn mknod(&mut self, path: &[u8], mode: Mode, dev: DeviceId) -> VfsResult<Ino> {
        if mode.is_dir() || mode.is_symlink() {
            return Err(VfsError::InvalidArg);
        }
        let (handle, rel, driver) = self.resolve(path)?;
        let rel = rel.to_vec();
        let info = if mode.is_device() {
            MakeInodeInfo::Device(dev)
        } else {
            MakeInodeInfo::None
        };
        let sb = self.mounts.get_mut(handle);
        let ino = driver.make_inode(sb, mode, info)?;
        let (parent_path, basename) = path::split_last_component(&rel);
        let linked = driver
            .lookup_inode(sb, parent_path)
            .and_then(|dir_ino| driver.link_inode(sb, ino, dir_ino, basename));
        if let Err(e) = linked {
            // Undo the partial creation, mirroring the source's
            // `vfs_mknod` (`free_inode` before returning the link error)
            // rather than leaving an orphan nlinks=0 inode in the tree.
            let _ = driver.free_inode(sb, ino);
            return Err(e);
        }
        Ok(ino)
    }

    /// Remove a hard link, freeing the inode once `nlinks` reaches zero.
    pub fn unlink(&mut self, path: &[u8]) -> VfsResult<()> {
        let (handle, rel, driver) = self.resolve(path)?;
        let rel = rel.to_vec();
        driver.unlink_inode(self.mounts.get_mut(handle), &rel)
    }

    pub fn stat(&self, path: &[u8]) -> VfsResult<Stat> {
        let (handle, rel, driver) = self.resolve(path)?;
        let sb = self.mounts.get(handle);
        let ino = driver.lookup_inode(sb, rel)?;
        let record = driver.inode_data(sb, ino)?;
        let rdev = match record.payload {
            InodePayload::Device(dev) => dev,
            _ => DeviceId::default(),
        };
        Ok(Stat {
            ino: record.ino,
            mode: record.mode,
            nlinks: record.nlinks,
            size: record.size,
            rdev,
        })
    }

    pub fn inode_read(&self, path: &[u8], pos: u64, buf: &mut [u8]) -> VfsResult<usize> {
        let (handle, rel, driver) = self.resolve(path)?;
        let sb = self.mounts.get(handle);
        let ino = driver.lookup_inode(sb, rel)?;
        driver.read_inode(sb, ino, pos, buf)
    }

    pub fn inode_write(&mut self, path: &[u8], pos: u64, buf: &[u8]) -> VfsResult<usize> {
        let (handle, rel, driver) = self.resolve(path)?;
        let rel = rel.to_vec();
        let sb = self.mounts.get_mut(handle);
        let ino = driver.lookup_inode(sb, &rel)?;
        driver.write_inode(sb, ino, pos, buf)
    }

    /// List the entries of the directory at `path`, in bucket-major,
    /// chain-minor order.
    pub fn readdir(&self, path: &[u8]) -> VfsResult<Vec<DirEntryInfo>> {
        let (handle, rel, driver) = self.resolve(path)?;
        let sb = self.mounts.get(handle);
        let ino = driver.lookup_inode(sb, rel)?;
        let mut cursor: DirCursor = 0;
        let mut out = Vec::new();
        loop {
            match driver.get_direntry(sb, ino, &mut cursor)? {
                Some(entry) => out.push(entry),
                None => break,
            }
            if cursor == 0 {
                break;
            }
        }
        Ok(out)
    }

    /// Convenience reader equivalent to the source's `print_ls` — not part
    /// of the driver contract, just `readdir` with entries sorted by name
    /// for stable display.
    pub fn print_ls(&self, path: &[u8]) -> VfsResult<Vec<DirEntryInfo>> {
        let mut entries = self.readdir(path)?;
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    /// Convenience reader equivalent to the source's `print_mount`: a
    /// one-line summary of the root mount.
    pub fn print_mount(&self) -> VfsResult<MountSummary> {
        let handle = self.mounts.root().ok_or(VfsError::NotFound)?;
        let sb = self.mounts.get(handle);
        let driver = self.drivers.by_id(sb.driver_id).ok_or(VfsError::BadFs)?;
        Ok(MountSummary {
            driver_name: driver.name(),
            dev: sb.dev,
            root_ino: sb.root_ino,
        })
    }
}

impl Default for Vfs {
    fn default() -> Self {
        Self::new()
    }
}

/// Summary returned by [`Vfs::print_mount`].
#[derive(Debug, Clone, Copy)]
pub struct MountSummary {
    pub driver_name: &'static str,
    pub dev: DeviceId,
    pub root_ino: Ino,
}

/// Global VFS instance. Single-threaded-cooperative kernels (spec.md
/// section 5) can take this lock around every VFS entry point; it is not
/// reentrant and callers reached from interrupt context must not take it.
static VFS: Mutex<Vfs> = Mutex::new(Vfs::new());

/// Run `f` with exclusive access to the global VFS.
pub fn with_vfs<R>(f: impl FnOnce(&mut Vfs) -> R) -> R {
    let mut guard = VFS.lock();
    f(&mut guard)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;
    use core::sync::atomic::{AtomicU32, Ordering};

    struct CountingDriver {
        id: u32,
        next_ino: AtomicU32,
    }

    impl FsDriver for CountingDriver {
        fn name(&self) -> &str {
            "counting"
        }
        fn id(&self) -> u32 {
            self.id
        }
        fn read_superblock(&self, sb: &mut Superblock) -> VfsResult<()> {
            sb.root_ino = 1;
            self.next_ino.store(2, Ordering::SeqCst);
            Ok(())
        }
        fn make_directory(&self, _sb: &mut Superblock, _path: &[u8], _mode: Mode) -> VfsResult<Ino> {
            Ok(self.next_ino.fetch_add(1, Ordering::SeqCst))
        }
        fn inode_data(&self, _sb: &Superblock, ino: Ino) -> VfsResult<InodeRecord> {
            Ok(InodeRecord {
                ino,
                mode: Mode::new(FileType::Directory, 0o755),
                nlinks: 2,
                size: 0,
                payload: InodePayload::Directory,
            })
        }
        fn lookup_inode(&self, sb: &Superblock, path: &[u8]) -> VfsResult<Ino> {
            if path.is_empty() {
                Ok(sb.root_ino)
            } else {
                Err(VfsError::NotFound)
            }
        }
    }

    static DRIVER: CountingDriver = CountingDriver {
        id: 0x0042_0042,
        next_ino: AtomicU32::new(2),
    };

    /// A driver whose `link_inode` always fails with `AlreadyExists`
    /// (simulating a duplicate name) and whose `free_inode` records the
    /// ino it was asked to free, so `mknod`'s cleanup-on-error path can be
    /// observed.
    struct LeakCheckDriver {
        next_ino: AtomicU32,
        freed_ino: AtomicU32,
    }

    impl FsDriver for LeakCheckDriver {
        fn name(&self) -> &str {
            "leak-check"
        }
        fn id(&self) -> u32 {
            0x4c45_414b
        }
        fn read_superblock(&self, sb: &mut Superblock) -> VfsResult<()> {
            sb.root_ino = 1;
            self.next_ino.store(2, Ordering::SeqCst);
            Ok(())
        }
        fn make_inode(&self, _sb: &mut Superblock, _mode: Mode, _info: MakeInodeInfo) -> VfsResult<Ino> {
            Ok(self.next_ino.fetch_add(1, Ordering::SeqCst))
        }
        fn free_inode(&self, _sb: &mut Superblock, ino: Ino) -> VfsResult<()> {
            self.freed_ino.store(ino, Ordering::SeqCst);
            Ok(())
        }
        fn lookup_inode(&self, sb: &Superblock, path: &[u8]) -> VfsResult<Ino> {
            if path.is_empty() {
                Ok(sb.root_ino)
            } else {
                Err(VfsError::NotFound)
            }
        }
        fn link_inode(&self, _sb: &mut Superblock, _ino: Ino, _dir_ino: Ino, _name: &[u8]) -> VfsResult<()> {
            Err(VfsError::AlreadyExists)
        }
    }

    static LEAK_DRIVER: LeakCheckDriver = LeakCheckDriver {
        next_ino: AtomicU32::new(2),
        freed_ino: AtomicU32::new(0),
    };

    #[test]
    fn mknod_frees_the_inode_when_link_fails() {
        let mut vfs = Vfs::new();
        vfs.register_filesystem(&LEAK_DRIVER);
        vfs.mount(DeviceId::make(0, 0), b"/", MountOptions { fs_id: LEAK_DRIVER.id() })
            .unwrap();
        let err = vfs
            .mknod(b"/dup", Mode::new(FileType::Regular, 0o644), DeviceId::default())
            .unwrap_err();
        assert_eq!(err, VfsError::AlreadyExists);
        // The inode make_inode assigned (2) must have been handed back to
        // free_inode rather than left as an nlinks=0 orphan in the tree.
        assert_eq!(LEAK_DRIVER.freed_ino.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn mount_then_stat_root() {
        let mut vfs = Vfs::new();
        vfs.register_filesystem(&DRIVER);
        vfs.mount(DeviceId::make(0, 0), b"/", MountOptions { fs_id: DRIVER.id }).unwrap();
        let st = vfs.stat(b"/").unwrap();
        assert_eq!(st.ino, 1);
        assert!(st.mode.is_dir());
    }

    #[test]
    fn non_root_mount_rejected() {
        let mut vfs = Vfs::new();
        vfs.register_filesystem(&DRIVER);
        let err = vfs
            .mount(DeviceId::make(0, 0), b"/mnt", MountOptions { fs_id: DRIVER.id })
            .unwrap_err();
        assert_eq!(err, VfsError::NotSupported);
    }

    #[test]
    fn mknod_on_directory_mode_is_rejected() {
        let mut vfs = Vfs::new();
        vfs.register_filesystem(&DRIVER);
        vfs.mount(DeviceId::make(0, 0), b"/", MountOptions { fs_id: DRIVER.id }).unwrap();
        let err = vfs
            .mknod(b"/x", Mode::new(FileType::Directory, 0o755), DeviceId::default())
            .unwrap_err();
        assert_eq!(err, VfsError::InvalidArg);
    }

    #[test]
    fn unregistered_fs_id_fails_not_found() {
        let mut vfs = Vfs::new();
        let err = vfs.mount(DeviceId::make(0, 0), b"/", MountOptions { fs_id: 0xffff_ffff }).unwrap_err();
        assert_eq!(err, VfsError::NotFound);
    }

    #[test]
    fn global_vfs_is_reachable_through_with_vfs() {
        with_vfs(|vfs| {
            vfs.register_filesystem(&DRIVER);
        });
        let _ = vec![0u8; 0]; // silence unused-import warning in some configs
    }
}
