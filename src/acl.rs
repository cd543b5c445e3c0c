//! Access-control metadata capability.
//!
//! The provider is chosen once per run by [`platform_provider`]; callers never
//! check the platform themselves.

use std::io;
use std::path::Path;
use std::sync::Arc;

/// Reads, compares and copies access-control metadata between files
pub trait AclProvider: Send + Sync {
    /// Short name shown in the start banner
    fn name(&self) -> &'static str;

    /// Serialized access-control descriptor, `None` when the file carries none
    fn descriptor(&self, path: &Path) -> io::Result<Option<Vec<u8>>>;

    /// Replace the descriptor on `target` with the one found on `source`
    fn copy(&self, source: &Path, target: &Path) -> io::Result<()>;

    /// Whether both files carry the same descriptor
    fn same(&self, source: &Path, target: &Path) -> io::Result<bool> {
        Ok(self.descriptor(source)? == self.descriptor(target)?)
    }
}

/// Provider for platforms (or builds) without ACL support
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopAclProvider;

impl AclProvider for NoopAclProvider {
    fn name(&self) -> &'static str {
        "none"
    }

    fn descriptor(&self, _path: &Path) -> io::Result<Option<Vec<u8>>> {
        Ok(None)
    }

    fn copy(&self, _source: &Path, _target: &Path) -> io::Result<()> {
        Ok(())
    }

    fn same(&self, _source: &Path, _target: &Path) -> io::Result<bool> {
        Ok(true)
    }
}

/// POSIX ACLs stored in the `system.posix_acl_*` extended attributes
#[cfg(all(unix, feature = "acl"))]
#[derive(Debug, Default, Clone, Copy)]
pub struct PosixAclProvider;

#[cfg(all(unix, feature = "acl"))]
impl PosixAclProvider {
    const ATTRIBUTES: [&'static str; 2] = ["system.posix_acl_access", "system.posix_acl_default"];

    fn read(path: &Path, name: &str) -> io::Result<Option<Vec<u8>>> {
        match xattr::get(path, name) {
            Ok(value) => Ok(value),
            Err(e) if is_absent(&e) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[cfg(all(unix, feature = "acl", any(target_os = "linux", target_os = "android")))]
const NO_ATTRIBUTE: i32 = libc::ENODATA;
#[cfg(all(unix, feature = "acl", not(any(target_os = "linux", target_os = "android"))))]
const NO_ATTRIBUTE: i32 = libc::ENOATTR;

/// Missing attribute, or a filesystem without extended attribute support
#[cfg(all(unix, feature = "acl"))]
fn is_absent(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::NotFound
        || matches!(
            err.raw_os_error(),
            Some(code) if code == NO_ATTRIBUTE || code == libc::ENOTSUP || code == libc::EOPNOTSUPP
        )
}

#[cfg(all(unix, feature = "acl"))]
impl AclProvider for PosixAclProvider {
    fn name(&self) -> &'static str {
        "posix"
    }

    fn descriptor(&self, path: &Path) -> io::Result<Option<Vec<u8>>> {
        let mut descriptor = Vec::new();
        let mut found = false;

        for name in Self::ATTRIBUTES {
            if let Some(value) = Self::read(path, name)? {
                found = true;
                descriptor.extend_from_slice(name.as_bytes());
                descriptor.push(0);
                descriptor.extend_from_slice(&(value.len() as u32).to_le_bytes());
                descriptor.extend_from_slice(&value);
            }
        }

        Ok(found.then_some(descriptor))
    }

    fn copy(&self, source: &Path, target: &Path) -> io::Result<()> {
        for name in Self::ATTRIBUTES {
            match Self::read(source, name)? {
                Some(value) => xattr::set(target, name, &value)?,
                None => match xattr::remove(target, name) {
                    Ok(()) => {}
                    Err(e) if is_absent(&e) => {}
                    Err(e) => return Err(e),
                },
            }
        }
        Ok(())
    }
}

/// Provider matching the capabilities of this build and platform
pub fn platform_provider() -> Arc<dyn AclProvider> {
    #[cfg(all(unix, feature = "acl"))]
    {
        if xattr::SUPPORTED_PLATFORM {
            return Arc::new(PosixAclProvider);
        }
    }
    Arc::new(NoopAclProvider)
}
