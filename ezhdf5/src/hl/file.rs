use std::fmt::{self, Debug};
use std::mem;
use std::path::Path;

use hdf5_sys::h5f::{
    H5F_libver_t, H5Fclose, H5Fcreate, H5Fflush, H5Fget_filesize, H5Fget_intent, H5Fget_name,
    H5Fopen, H5F_ACC_DEFAULT, H5F_ACC_RDONLY, H5F_ACC_RDWR, H5F_ACC_TRUNC, H5F_SCOPE_LOCAL,
};
use hdf5_sys::h5p::{H5Pcreate, H5Pset_libver_bounds};

use crate::globals::H5P_FILE_ACCESS;
use crate::internal_prelude::*;

#[cfg(not(feature = "1.10.0"))]
const LIBVER_LATEST: H5F_libver_t = H5F_libver_t::H5F_LIBVER_LATEST;
#[cfg(all(feature = "1.10.0", not(feature = "1.12.0")))]
const LIBVER_LATEST: H5F_libver_t = H5F_libver_t::H5F_LIBVER_V110;
#[cfg(all(feature = "1.12.0", not(feature = "1.14.0")))]
const LIBVER_LATEST: H5F_libver_t = H5F_libver_t::H5F_LIBVER_V112;
#[cfg(feature = "1.14.0")]
const LIBVER_LATEST: H5F_libver_t = H5F_libver_t::H5F_LIBVER_V114;

/// File opening mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OpenMode {
    /// Open an existing file for reading only.
    ReadOnly,
    /// Open an existing file for reading and writing, creating it if
    /// missing.
    ReadWrite,
    /// Create a fresh file, truncating any existing content.
    Truncate,
}

/// HDF5 file object.
#[repr(transparent)]
#[derive(Clone)]
pub struct File(Handle);

impl ObjectClass for File {
    const NAME: &'static str = "file";
    const VALID_TYPES: &'static [H5I_type_t] = &[H5I_FILE];

    fn from_handle(handle: Handle) -> Self {
        Self(handle)
    }

    fn handle(&self) -> &Handle {
        &self.0
    }

    fn short_repr(&self) -> Option<String> {
        let basename = match Path::new(&self.filename()).file_name() {
            Some(s) => s.to_string_lossy().into_owned(),
            None => String::new(),
        };
        let mode = if self.is_read_only() { "read-only" } else { "read/write" };
        Some(format!("\"{basename}\" ({mode})"))
    }
}

impl Debug for File {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.debug_fmt(f)
    }
}

impl File {
    /// Opens an existing file as read-only.
    pub fn open<P: AsRef<Path>>(filename: P) -> Result<Self> {
        Self::open_as(filename, OpenMode::ReadOnly)
    }

    /// Opens a file as read/write, creating it if missing.
    pub fn open_rw<P: AsRef<Path>>(filename: P) -> Result<Self> {
        Self::open_as(filename, OpenMode::ReadWrite)
    }

    /// Opens a file in a given mode with default options.
    pub fn open_as<P: AsRef<Path>>(filename: P, mode: OpenMode) -> Result<Self> {
        FileBuilder::new().open_as(filename, mode)
    }

    /// Opens a file with custom options.
    pub fn with_options() -> FileBuilder {
        FileBuilder::new()
    }

    /// Returns the file name on disk.
    pub fn filename(&self) -> String {
        h5lock_s!(get_h5_str(|m, s| unsafe { H5Fget_name(self.id(), m, s) })
            .unwrap_or_else(|_| String::new()))
    }

    /// Returns the file size in bytes (or 0 if the file handle is invalid).
    pub fn size(&self) -> u64 {
        h5get_d!(H5Fget_filesize(self.id()): hsize_t) as _
    }

    /// Returns true if the file was opened in a read-only mode.
    pub fn is_read_only(&self) -> bool {
        h5get!(H5Fget_intent(self.id()): c_uint).unwrap_or(H5F_ACC_DEFAULT) != H5F_ACC_RDWR
    }

    /// Flushes the file to the storage medium.
    pub fn flush(&self) -> Result<()> {
        h5call!(H5Fflush(self.id(), H5F_SCOPE_LOCAL)).and(Ok(()))
    }

    /// Closes the file and invalidates all open handles for contained objects.
    pub fn close(self) -> Result<()> {
        let id = self.id();
        // Ensure we only decref once
        mem::forget(self.0);
        h5call!(H5Fclose(id)).map(|_| ())
    }
}

/// File builder allowing to customize how the file is opened.
#[derive(Default, Clone, Debug)]
pub struct FileBuilder {
    latest_format: bool,
}

impl FileBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Produce files in the latest available file format. This may
    /// improve performance or space consumption, but older versions of
    /// the library will no longer be able to read the file. Required
    /// for external links.
    pub fn latest_format(mut self, latest_format: bool) -> Self {
        self.latest_format = latest_format;
        self
    }

    fn build_fapl(&self) -> Result<Option<Handle>> {
        if !self.latest_format {
            return Ok(None);
        }
        h5lock_s!({
            let fapl = Handle::try_new(h5check(unsafe { H5Pcreate(*H5P_FILE_ACCESS) })?)?;
            h5check(unsafe {
                H5Pset_libver_bounds(fapl.id(), LIBVER_LATEST, LIBVER_LATEST)
            })?;
            Ok(Some(fapl))
        })
    }

    /// Opens a file in a given mode.
    pub fn open_as<P: AsRef<Path>>(&self, filename: P, mode: OpenMode) -> Result<File> {
        let filename = filename.as_ref();
        if mode == OpenMode::ReadWrite && !filename.exists() {
            return self.open_as(filename, OpenMode::Truncate);
        }
        let filename = to_cstring(
            filename.to_str().ok_or_else(|| format!("Invalid UTF-8 in file name: {filename:?}"))?,
        )?;
        let fname_ptr = filename.as_ptr();
        h5lock_s!({
            let fapl = self.build_fapl()?;
            let fapl_id = fapl.as_ref().map_or(H5P_DEFAULT, Handle::id);
            match mode {
                OpenMode::ReadOnly => {
                    File::from_id(h5try!(H5Fopen(fname_ptr, H5F_ACC_RDONLY, fapl_id)))
                }
                OpenMode::ReadWrite => {
                    File::from_id(h5try!(H5Fopen(fname_ptr, H5F_ACC_RDWR, fapl_id)))
                }
                OpenMode::Truncate => File::from_id(h5try!(H5Fcreate(
                    fname_ptr,
                    H5F_ACC_TRUNC,
                    H5P_DEFAULT,
                    fapl_id
                ))),
            }
        })
    }
}

#[cfg(test)]
pub mod tests {
    use crate::internal_prelude::*;
    use crate::test::with_tmp_dir;
    use std::fs;

    #[test]
    pub fn test_is_read_only() {
        with_tmp_path(|path| {
            assert!(!File::open_as(&path, OpenMode::Truncate).unwrap().is_read_only());
            assert!(File::open(&path).unwrap().is_read_only());
            assert!(!File::open_rw(&path).unwrap().is_read_only());
        });
        with_tmp_path(|path| {
            // read-write mode creates a missing file
            assert!(!File::open_rw(&path).unwrap().is_read_only());
            assert!(path.exists());
        });
    }

    #[test]
    pub fn test_unable_to_open() {
        with_tmp_dir(|dir| {
            assert_err_re!(File::open(&dir), "unable to (?:synchronously )?open file");
        });
        with_tmp_path(|path| {
            fs::write(&path, b"not an hdf5 file").unwrap();
            assert_err_re!(File::open(&path), "unable to (?:synchronously )?open file");
        });
    }

    #[test]
    pub fn test_flush_and_size() {
        with_tmp_file(|file| {
            assert!(file.size() > 0);
            assert!(file.flush().is_ok());
            let disk_size = fs::metadata(file.filename()).unwrap().len();
            assert_eq!(file.size(), disk_size);
        });
    }

    #[test]
    pub fn test_debug_repr() {
        with_tmp_path(|path| {
            let file = File::open_as(&path, OpenMode::Truncate).unwrap();
            assert_eq!(format!("{file:?}"), "<HDF5 file: \"foo.h5\" (read/write)>");
            file.close().unwrap();
            let invalid = File::from_handle(Handle::invalid());
            assert_eq!(format!("{invalid:?}"), "<HDF5 file: invalid id>");
        });
    }

    #[test]
    pub fn test_latest_format() {
        with_tmp_path(|path| {
            let file =
                File::with_options().latest_format(true).open_as(&path, OpenMode::Truncate);
            assert!(file.is_ok());
        });
    }
}
