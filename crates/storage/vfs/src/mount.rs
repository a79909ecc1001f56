//! Mount tree: superblocks linked by parent/first_child/next_sibling index
//! handles into an arena, replacing the source's circular sibling list
//! (Design Notes: "owned sequences or intrusive lists using index handles").

use core::any::Any;

use alloc::boxed::Box;
use alloc::vec::Vec;

use crate::error::{VfsError, VfsResult};
use crate::hash::hash_bytes;
use crate::mode::DeviceId;
use crate::path::{match_prefix_component, SEPARATOR};

/// Index of a [`Superblock`] inside a [`MountTree`]'s arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SbHandle(usize);

bitflags::bitflags! {
    /// `flags` field of a superblock, spec.md section 3.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SbFlags: u8 {
        const DIRTY = 0b01;
        const READ_ONLY = 0b10;
    }
}

/// A mounted filesystem instance.
pub struct Superblock {
    pub dev: DeviceId,
    pub driver_id: u32,
    pub block_size: u32,
    pub flags: SbFlags,
    pub root_ino: u32,
    /// Driver-private state (for ramfs: the inode B-tree + free list).
    pub private: Option<Box<dyn Any + Send + Sync>>,
    pub mount_path: Vec<u8>,
    pub mount_path_hash: u32,
    pub parent: Option<SbHandle>,
    pub first_child: Option<SbHandle>,
    pub next_sibling: Option<SbHandle>,
}

impl Superblock {
    /// A freshly allocated, not-yet-initialised root superblock. The
    /// driver's `read_superblock` is expected to fill in `root_ino` and
    /// `private` before the mount completes.
    pub fn new_root(dev: DeviceId, driver_id: u32) -> Self {
        Superblock {
            dev,
            driver_id,
            block_size: 0,
            flags: SbFlags::empty(),
            root_ino: 0,
            private: None,
            mount_path: Vec::new(),
            mount_path_hash: hash_bytes(&[]),
            parent: None,
            first_child: None,
            next_sibling: None,
        }
    }

    pub fn private_as<T: 'static>(&self) -> Option<&T> {
        self.private.as_ref().and_then(|p| p.downcast_ref())
    }

    pub fn private_as_mut<T: 'static>(&mut self) -> Option<&mut T> {
        self.private.as_mut().and_then(|p| p.downcast_mut())
    }
}

/// Tree of superblocks, rooted at the global root mount. Only root-mount
/// creation is implemented; spec.md inherits the source's "TODO: non-root"
/// limitation.
pub struct MountTree {
    arena: Vec<Superblock>,
    root: Option<SbHandle>,
}

impl MountTree {
    pub const fn new() -> Self {
        MountTree {
            arena: Vec::new(),
            root: None,
        }
    }

    /// Install `sb` as the global root. Fails `AlreadyExists` if a root is
    /// already mounted (spec.md invariant 5: "the global root is unique").
    pub fn mount_root(&mut self, sb: Superblock) -> VfsResult<SbHandle> {
        if self.root.is_some() {
            return Err(VfsError::AlreadyExists);
        }
        self.arena.push(sb);
        let handle = SbHandle(self.arena.len() - 1);
        self.root = Some(handle);
        Ok(handle)
    }

    /// Tear down the root mount. Non-root unmount is out of scope
    /// (spec.md section 3 Lifecycle); since non-root mounts are never
    /// created, the root never has children to worry about.
    pub fn unmount_root(&mut self) -> VfsResult<Superblock> {
        let handle = self.root.take().ok_or(VfsError::NotFound)?;
        Ok(self.arena.remove(handle.0))
    }

    pub fn get(&self, handle: SbHandle) -> &Superblock {
        &self.arena[handle.0]
    }

    pub fn get_mut(&mut self, handle: SbHandle) -> &mut Superblock {
        &mut self.arena[handle.0]
    }

    pub fn root(&self) -> Option<SbHandle> {
        self.root
    }

    /// Resolve an absolute path to `(superblock, driver-local relpath)`.
    /// Mirrors `vfs_match_mountpath`: strip the leading `/`, then at each
    /// level walk the current node's children for one whose `mount_path`
    /// prefix-matches the remaining path; stop at the first node with no
    /// matching child.
    pub fn resolve<'a>(&self, path: &'a [u8]) -> VfsResult<(SbHandle, &'a [u8])> {
        if path.first() != Some(&SEPARATOR) {
            return Err(VfsError::InvalidArg);
        }
        let mut current = self.root.ok_or(VfsError::NotFound)?;
        let mut rest = &path[1..];
        loop {
            let mut child = self.get(current).first_child;
            let mut matched = None;
            while let Some(h) = child {
                let sb = self.get(h);
                if let Some(remainder) = match_prefix_component(rest, &sb.mount_path) {
                    matched = Some((h, remainder));
                    break;
                }
                child = sb.next_sibling;
            }
            match matched {
                Some((h, remainder)) => {
                    current = h;
                    rest = remainder;
                }
                None => return Ok((current, rest)),
            }
        }
    }
}

impl Default for MountTree {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mounting_a_second_root_fails() {
        let mut tree = MountTree::new();
        tree.mount_root(Superblock::new_root(DeviceId::make(0, 0), 1)).unwrap();
        let err = tree
            .mount_root(Superblock::new_root(DeviceId::make(0, 0), 1))
            .unwrap_err();
        assert_eq!(err, VfsError::AlreadyExists);
    }

    #[test]
    fn resolve_with_no_children_returns_root_and_full_relpath() {
        let mut tree = MountTree::new();
        let mut sb = Superblock::new_root(DeviceId::make(0, 0), 1);
        sb.root_ino = 1;
        let root = tree.mount_root(sb).unwrap();
        let (h, rel) = tree.resolve(b"/a/b/c").unwrap();
        assert_eq!(h, root);
        assert_eq!(rel, b"a/b/c");
    }

    #[test]
    fn resolve_rejects_relative_paths() {
        let mut tree = MountTree::new();
        tree.mount_root(Superblock::new_root(DeviceId::make(0, 0), 1)).unwrap();
        assert_eq!(tree.resolve(b"a/b").unwrap_err(), VfsError::InvalidArg);
    }
}
