//! VFS error taxonomy

use core::fmt;

/// VFS result type
pub type VfsResult<T> = Result<T, VfsError>;

/// Errors every layer of the VFS maps its failures into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VfsError {
    /// The allocator returned null.
    NoMemory,
    /// A path component or inode index does not exist.
    NotFound,
    /// A name collision on insert (directory entry or mount path).
    AlreadyExists,
    /// A directory-only operation was attempted on a non-directory inode.
    NotADir,
    /// A file-only operation was attempted on a directory inode.
    IsDir,
    /// Null pointer, a relative path where absolute is required, or a
    /// `mknod` type that should have gone through `mkdir`/`symlink`.
    InvalidArg,
    /// The driver does not implement the requested operation.
    NotSupported,
    /// An internal invariant was violated (missing root inode, dangling
    /// child superblock, ...). Logged via [`crate::vfs_error!`] before
    /// being returned.
    BadFs,
    /// Placeholder for a feature that is intentionally unimplemented.
    NotImplemented,
}

impl VfsError {
    /// Map to a glibc-style errno, for callers that want POSIX-shaped
    /// return codes at the syscall boundary.
    pub fn to_errno(self) -> i32 {
        match self {
            VfsError::NoMemory => -12,       // ENOMEM
            VfsError::NotFound => -2,        // ENOENT
            VfsError::AlreadyExists => -17,  // EEXIST
            VfsError::NotADir => -20,        // ENOTDIR
            VfsError::IsDir => -21,          // EISDIR
            VfsError::InvalidArg => -22,     // EINVAL
            VfsError::NotSupported => -38,   // ENOSYS
            VfsError::BadFs => -5,           // EIO
            VfsError::NotImplemented => -38, // ENOSYS
        }
    }
}

impl fmt::Display for VfsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            VfsError::NoMemory => "out of memory",
            VfsError::NotFound => "no such file or directory",
            VfsError::AlreadyExists => "already exists",
            VfsError::NotADir => "not a directory",
            VfsError::IsDir => "is a directory",
            VfsError::InvalidArg => "invalid argument",
            VfsError::NotSupported => "operation not supported",
            VfsError::BadFs => "filesystem invariant violated",
            VfsError::NotImplemented => "not implemented",
        };
        f.write_str(msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errno_mapping_is_negative() {
        assert!(VfsError::NotFound.to_errno() < 0);
        assert!(VfsError::AlreadyExists.to_errno() < 0);
    }
}
