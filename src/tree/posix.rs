//! On-disk metadata layout
//!
//! Namespaces live under a metadata root, nested through `MDAL_subspaces`
//! directories. A file's tag is stored in the `user.MDAL_MARFS-FTAG`
//! extended attribute.

use super::store::{namespace_location, DirEntry, DirHandle, EntryKind, MetaContext, MetadataStore, RESERVED_PREFIX};
use crate::error::{MetaError, MetaOp, MetaResult};
use crate::tag::TAG_ATTR_NAME;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::trace;

/// Metadata store backed by a POSIX directory tree
#[derive(Debug, Clone)]
pub struct PosixStore {
    meta_root: PathBuf,
    tag_attr: String,
}

impl PosixStore {
    pub fn new(meta_root: impl Into<PathBuf>) -> Self {
        Self {
            meta_root: meta_root.into(),
            tag_attr: format!("user.{}{}", RESERVED_PREFIX, TAG_ATTR_NAME),
        }
    }

    pub fn meta_root(&self) -> &Path {
        &self.meta_root
    }

    /// Name of the extended attribute holding file tags
    pub fn tag_attr(&self) -> &str {
        &self.tag_attr
    }
}

fn kind_of(file_type: fs::FileType) -> EntryKind {
    if file_type.is_dir() {
        EntryKind::Directory
    } else if file_type.is_file() {
        EntryKind::File
    } else if file_type.is_symlink() {
        EntryKind::Symlink
    } else {
        EntryKind::Other
    }
}

impl MetadataStore for PosixStore {
    fn fortify(&self, namespace_path: &str, dir: &Path) -> MetaResult<MetaContext> {
        let location = namespace_location(&self.meta_root, namespace_path, dir);
        let dir_path = location.display().to_string();
        let meta = fs::metadata(&location).map_err(|e| MetaError::from_io(&dir_path, &e, MetaOp::Stat))?;
        if !meta.is_dir() {
            return Err(MetaError::NotADirectory { path: dir_path });
        }
        Ok(MetaContext::new(location))
    }

    fn open_dir<'a>(&'a self, ctxt: &MetaContext) -> MetaResult<DirHandle<'a>> {
        let dir_path = ctxt.location().display().to_string();
        let reader = fs::read_dir(ctxt.location())
            .map_err(|e| MetaError::from_io(&dir_path, &e, MetaOp::ReadDir))?;

        trace!(path = %dir_path, "Directory opened");
        Ok(Box::new(reader.map(move |entry| {
            let entry = entry.map_err(|e| MetaError::from_io(&dir_path, &e, MetaOp::ReadDir))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            let file_type = entry
                .file_type()
                .map_err(|e| MetaError::from_io(entry.path().display().to_string(), &e, MetaOp::Stat))?;
            Ok(DirEntry::new(name, kind_of(file_type)))
        })))
    }

    fn entry_kind(&self, ctxt: &MetaContext, name: &str) -> MetaResult<EntryKind> {
        let path = ctxt.entry(name);
        let meta = fs::symlink_metadata(&path)
            .map_err(|e| MetaError::from_io(path.display().to_string(), &e, MetaOp::Stat))?;
        Ok(kind_of(meta.file_type()))
    }

    fn file_tag(&self, ctxt: &MetaContext, name: &str) -> MetaResult<String> {
        let path = ctxt.entry(name);
        let raw = xattr::get(&path, &self.tag_attr)?;
        String::from_utf8(raw).map_err(|e| MetaError::TagReadFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    }
}

#[cfg(target_os = "linux")]
mod xattr {
    use crate::error::{MetaError, MetaOp, MetaResult};
    use std::ffi::CString;
    use std::io;
    use std::os::unix::ffi::OsStrExt;
    use std::path::Path;

    pub fn get(path: &Path, attr: &str) -> MetaResult<Vec<u8>> {
        let file_path = path.display().to_string();
        let invalid = |reason: String| MetaError::TagReadFailed {
            path: file_path.clone(),
            reason,
        };
        let c_path = CString::new(path.as_os_str().as_bytes()).map_err(|e| invalid(e.to_string()))?;
        let c_attr = CString::new(attr).map_err(|e| invalid(e.to_string()))?;

        // First call sizes the value, second reads it. The value may grow in
        // between, so retry on ERANGE.
        loop {
            let size = unsafe { libc::getxattr(c_path.as_ptr(), c_attr.as_ptr(), std::ptr::null_mut(), 0) };
            if size < 0 {
                return Err(classify(&file_path, io::Error::last_os_error()));
            }
            // An empty tag is the same as no tag
            if size == 0 {
                return Err(MetaError::MissingTag { path: file_path });
            }

            let mut buf = vec![0u8; size as usize];
            let read = unsafe {
                libc::getxattr(
                    c_path.as_ptr(),
                    c_attr.as_ptr(),
                    buf.as_mut_ptr().cast(),
                    buf.len(),
                )
            };
            if read < 0 {
                let err = io::Error::last_os_error();
                if err.raw_os_error() == Some(libc::ERANGE) {
                    continue;
                }
                return Err(classify(&file_path, err));
            }
            if read == 0 {
                return Err(MetaError::MissingTag { path: file_path });
            }
            buf.truncate(read as usize);
            return Ok(buf);
        }
    }

    fn classify(path: &str, err: io::Error) -> MetaError {
        if err.raw_os_error() == Some(libc::ENODATA) {
            MetaError::MissingTag {
                path: path.to_string(),
            }
        } else {
            MetaError::from_io(path, &err, MetaOp::Tag)
        }
    }
}

#[cfg(not(target_os = "linux"))]
mod xattr {
    use crate::error::{MetaError, MetaResult};
    use std::path::Path;

    pub fn get(_path: &Path, _attr: &str) -> MetaResult<Vec<u8>> {
        Err(MetaError::Unsupported { op: "getxattr" })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_tag_attr_name() {
        let store = PosixStore::new("/meta");
        assert_eq!(store.tag_attr(), "user.MDAL_MARFS-FTAG");
    }

    #[test]
    fn test_fortify_and_list() {
        let dir = tempdir().unwrap();
        let ns = dir.path().join("MDAL_subspaces").join("proj");
        fs::create_dir_all(ns.join("data")).unwrap();
        fs::write(ns.join("data").join("f1"), b"").unwrap();
        fs::create_dir(ns.join("data").join("sub")).unwrap();

        let store = PosixStore::new(dir.path());
        let ctxt = store.fortify("/proj", Path::new("data")).unwrap();
        assert_eq!(ctxt.location(), ns.join("data"));

        let mut entries: Vec<_> = store
            .open_dir(&ctxt)
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        assert_eq!(
            entries,
            vec![
                DirEntry::new("f1", EntryKind::File),
                DirEntry::new("sub", EntryKind::Directory),
            ]
        );
        assert_eq!(store.entry_kind(&ctxt, "sub").unwrap(), EntryKind::Directory);
    }

    #[test]
    fn test_fortify_missing_and_not_dir() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("plain"), b"").unwrap();
        let store = PosixStore::new(dir.path());

        assert!(matches!(
            store.fortify("/", Path::new("absent")),
            Err(MetaError::NotFound { .. })
        ));
        assert!(matches!(
            store.fortify("/", Path::new("plain")),
            Err(MetaError::NotADirectory { .. })
        ));
    }

    #[cfg(target_os = "linux")]
    fn set_tag(path: &Path, attr: &str, value: &[u8]) -> bool {
        use std::ffi::CString;
        use std::os::unix::ffi::OsStrExt;

        let c_path = CString::new(path.as_os_str().as_bytes()).unwrap();
        let c_attr = CString::new(attr).unwrap();
        let rc = unsafe {
            libc::setxattr(
                c_path.as_ptr(),
                c_attr.as_ptr(),
                value.as_ptr().cast(),
                value.len(),
                0,
            )
        };
        rc == 0
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_empty_tag_is_missing() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("empty-tag"), b"").unwrap();
        fs::write(dir.path().join("tagged"), b"").unwrap();

        let store = PosixStore::new(dir.path());
        let attr = store.tag_attr().to_string();
        if !set_tag(&dir.path().join("empty-tag"), &attr, b"")
            || !set_tag(&dir.path().join("tagged"), &attr, b"ver=1")
        {
            // Filesystem without user xattrs
            return;
        }

        let ctxt = store.fortify("/", Path::new("")).unwrap();
        assert!(matches!(
            store.file_tag(&ctxt, "empty-tag"),
            Err(MetaError::MissingTag { .. })
        ));
        assert_eq!(store.file_tag(&ctxt, "tagged").unwrap(), "ver=1");
    }

    #[test]
    fn test_reserved_names_filtered() {
        let store = PosixStore::new("/meta");
        assert!(store.path_filter("MDAL_subspaces"));
        assert!(!store.path_filter("results.h5"));
    }
}
