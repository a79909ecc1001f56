//! The operation contract every filesystem backend implements, and the
//! registry that looks drivers up by id.

use alloc::vec::Vec;

use crate::error::{VfsError, VfsResult};
use crate::mode::{DeviceId, FileType, Mode};
use crate::mount::Superblock;

/// A hard inode number. `0` is reserved as the "invalid" sentinel and is
/// never handed back to a caller.
pub type Ino = u32;

/// Opaque cursor for [`FsDriver::get_direntry`]. `0` means "before first";
/// the driver resets it to `0` after the final entry.
pub type DirCursor = u64;

/// Kind-specific creation info passed to [`FsDriver::make_inode`].
#[derive(Debug, Clone, Copy)]
pub enum MakeInodeInfo {
    /// No extra info (regular file, fifo, socket).
    None,
    /// `(major, minor)` for `S_IFCHR`/`S_IFBLK`.
    Device(DeviceId),
    /// Symlink target, stored inline if it fits the 60-byte buffer.
    SymlinkTarget,
}

/// Tagged per-type payload of an [`InodeRecord`].
///
/// `Directory`'s actual table is backend-private (ramfs keeps it indexed by
/// `ino` in its own state); this variant is a marker so `stat`-shaped
/// records can still report the type without the `vfs` crate knowing the
/// table's representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InodePayload {
    /// Block count and 12 direct blocks + 3 indirection levels, reserved
    /// for a future disk-backed driver; an in-memory backend leaves these
    /// zero.
    Regular { blocks: u32 },
    Directory,
    Device(DeviceId),
    /// Inline symlink bytes up to 60, overflow handled out of line by the
    /// driver; the VFS layer never follows the link.
    Symlink { inline_len: u8 },
    Fifo,
    Socket,
}

/// The metadata record for one filesystem object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InodeRecord {
    pub ino: Ino,
    pub mode: Mode,
    pub nlinks: u32,
    pub size: u64,
    pub payload: InodePayload,
}

/// One entry produced by [`FsDriver::get_direntry`].
#[derive(Debug, Clone)]
pub struct DirEntryInfo {
    pub ino: Ino,
    pub name: Vec<u8>,
    /// Size in bytes of this entry's on-the-wire record (fixed overhead +
    /// name + NUL terminator) — distinct from `name.len()`.
    pub record_len: u32,
    pub file_type: FileType,
}

/// The operation contract of spec section 4.3. A backend may leave any
/// operation unimplemented; the default falls through to
/// [`VfsError::NotSupported`], which the dispatch layer propagates as-is.
pub trait FsDriver: Send + Sync {
    /// Human-readable name, for `print_mount`.
    fn name(&self) -> &str;

    /// The 32-bit id this driver registers under (e.g. `0x004d4152` for
    /// ramfs's `"RAM\0"`).
    fn id(&self) -> u32;

    /// Initialise a freshly allocated superblock: set `block_size`,
    /// `root_ino`, `private`, and create the root directory.
    fn read_superblock(&self, sb: &mut Superblock) -> VfsResult<()>;

    /// Create a directory at `path` (driver-local, i.e. relative to this
    /// superblock's root) and link it into its parent. Returns the new
    /// inode number.
    fn make_directory(&self, sb: &mut Superblock, path: &[u8], mode: Mode) -> VfsResult<Ino> {
        let _ = (sb, path, mode);
        Err(VfsError::NotSupported)
    }

    /// Create a non-directory inode with the given mode and kind-specific
    /// info. Does not link it into any directory.
    fn make_inode(&self, sb: &mut Superblock, mode: Mode, info: MakeInodeInfo) -> VfsResult<Ino> {
        let _ = (sb, mode, info);
        Err(VfsError::NotSupported)
    }

    /// Remove the inode's record and payload.
    fn free_inode(&self, sb: &mut Superblock, ino: Ino) -> VfsResult<()> {
        let _ = (sb, ino);
        Err(VfsError::NotSupported)
    }

    /// Copy the inode record for `ino`.
    fn inode_data(&self, sb: &Superblock, ino: Ino) -> VfsResult<InodeRecord> {
        let _ = (sb, ino);
        Err(VfsError::NotSupported)
    }

    /// Read up to `buf.len()` bytes starting at `pos`. Fails `IsDir` on
    /// directories. Returns the number of bytes actually read.
    fn read_inode(&self, sb: &Superblock, ino: Ino, pos: u64, buf: &mut [u8]) -> VfsResult<usize> {
        let _ = (sb, ino, pos, buf);
        Err(VfsError::NotSupported)
    }

    /// Write `buf` at `pos`, extending `size` if necessary. Returns the
    /// number of bytes actually written.
    fn write_inode(&self, sb: &mut Superblock, ino: Ino, pos: u64, buf: &[u8]) -> VfsResult<usize> {
        let _ = (sb, ino, pos, buf);
        Err(VfsError::NotSupported)
    }

    /// Fetch the directory entry at `cursor`, advancing it. A cursor of
    /// `0` means "before first"; the driver resets it to `0` after the
    /// final entry.
    fn get_direntry(
        &self,
        sb: &Superblock,
        ino: Ino,
        cursor: &mut DirCursor,
    ) -> VfsResult<Option<DirEntryInfo>> {
        let _ = (sb, ino, cursor);
        Err(VfsError::NotSupported)
    }

    /// Resolve a driver-local path to an inode number.
    fn lookup_inode(&self, sb: &Superblock, path: &[u8]) -> VfsResult<Ino> {
        let _ = (sb, path);
        Err(VfsError::NotSupported)
    }

    /// Add a hard link `name` inside `dir_ino` pointing at `ino`,
    /// incrementing `nlinks`.
    fn link_inode(&self, sb: &mut Superblock, ino: Ino, dir_ino: Ino, name: &[u8]) -> VfsResult<()> {
        let _ = (sb, ino, dir_ino, name);
        Err(VfsError::NotSupported)
    }

    /// Remove a hard link by path, freeing the inode if `nlinks` reaches
    /// zero.
    fn unlink_inode(&self, sb: &mut Superblock, path: &[u8]) -> VfsResult<()> {
        let _ = (sb, path);
        Err(VfsError::NotSupported)
    }
}

/// The set of known drivers, searched linearly by id — the source keeps a
/// circular list with a process-wide head; an owned `Vec` replaces it.
pub struct DriverRegistry {
    drivers: Vec<&'static dyn FsDriver>,
}

impl DriverRegistry {
    pub const fn new() -> Self {
        DriverRegistry { drivers: Vec::new() }
    }

    /// Register a driver. Re-registering the same id replaces the prior
    /// entry rather than creating a duplicate.
    pub fn register(&mut self, driver: &'static dyn FsDriver) {
        if let Some(slot) = self.drivers.iter_mut().find(|d| d.id() == driver.id()) {
            *slot = driver;
        } else {
            self.drivers.push(driver);
        }
    }

    pub fn by_id(&self, id: u32) -> Option<&'static dyn FsDriver> {
        self.drivers.iter().copied().find(|d| d.id() == id)
    }
}

impl Default for DriverRegistry {
    fn default() -> Self {
        Self::new()
    }
}
