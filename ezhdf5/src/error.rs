use std::error::Error as StdError;
use std::fmt;
use std::io;
use std::ops::Deref;
use std::panic;
use std::ptr::{self, addr_of_mut};

#[cfg(not(feature = "1.10.0"))]
use hdf5_sys::h5::hssize_t;
use hdf5_sys::h5e::{
    H5E_auto2_t, H5E_error2_t, H5Eget_current_stack, H5Eget_msg, H5Eprint2, H5Eset_auto2, H5Ewalk2,
    H5E_DEFAULT, H5E_WALK_DOWNWARD,
};

use ezhdf5_types::{EnumError, MemberError, ShapeError};

use crate::internal_prelude::*;

/// Silence errors emitted by `hdf5`
///
/// Safety: This version is not thread-safe and must be synchronised
/// with other calls to `hdf5`
pub(crate) unsafe fn silence_errors_no_sync(silence: bool) {
    let h5eprint: Option<unsafe extern "C" fn(hid_t, *mut libc::FILE) -> herr_t> =
        Some(H5Eprint2 as _);
    let h5eprint: H5E_auto2_t = std::mem::transmute(h5eprint);
    H5Eset_auto2(H5E_DEFAULT, if silence { None } else { h5eprint }, ptr::null_mut());
}

/// Silence errors emitted by `hdf5`
pub fn silence_errors(silence: bool) {
    h5lock!(silence_errors_no_sync(silence));
}

#[repr(transparent)]
#[derive(Clone)]
pub struct ErrorStack(Handle);

impl ObjectClass for ErrorStack {
    const NAME: &'static str = "errorstack";
    const VALID_TYPES: &'static [H5I_type_t] = &[H5I_ERROR_STACK];

    fn from_handle(handle: Handle) -> Self {
        Self(handle)
    }

    fn handle(&self) -> &Handle {
        &self.0
    }
}

impl ErrorStack {
    pub(crate) fn from_current() -> Result<Self> {
        let stack_id = h5lock!(H5Eget_current_stack());
        Handle::try_new(stack_id).map(Self)
    }

    /// Expands the error stack to a format which is easier to handle
    // known HDF5 bug: H5Eget_msg() used in this function may corrupt
    // the current stack, so we use self over &self
    pub fn expand(self) -> Result<ExpandedErrorStack> {
        struct CallbackData {
            stack: ExpandedErrorStack,
            err: Option<Error>,
        }
        extern "C" fn callback(
            _: c_uint, err_desc: *const H5E_error2_t, data: *mut c_void,
        ) -> herr_t {
            panic::catch_unwind(|| unsafe {
                let data = &mut *(data.cast::<CallbackData>());
                if data.err.is_some() {
                    return 0;
                }
                let closure = |e: H5E_error2_t| -> Result<ErrorFrame> {
                    let (desc, func) = (string_from_cstr(e.desc), string_from_cstr(e.func_name));
                    let major = get_h5_str(|m, s| H5Eget_msg(e.maj_num, ptr::null_mut(), m, s))?;
                    let minor = get_h5_str(|m, s| H5Eget_msg(e.min_num, ptr::null_mut(), m, s))?;
                    Ok(ErrorFrame::new(&desc, &func, &major, &minor, (e.maj_num, e.min_num)))
                };
                match closure(*err_desc) {
                    Ok(frame) => {
                        data.stack.push(frame);
                    }
                    Err(err) => {
                        data.err = Some(err);
                    }
                }
                0
            })
            .unwrap_or(-1)
        }

        let mut data = CallbackData { stack: ExpandedErrorStack::new(), err: None };
        let data_ptr: *mut c_void = addr_of_mut!(data).cast::<c_void>();

        let stack_id = self.handle().id();
        h5lock!({
            H5Ewalk2(stack_id, H5E_WALK_DOWNWARD, Some(callback), data_ptr);
        });

        data.err.map_or(Ok(data.stack), Err)
    }
}

/// One frame of a native error stack, with the major/minor error codes
/// preserved.
#[derive(Clone, Debug)]
pub struct ErrorFrame {
    desc: String,
    func: String,
    major: String,
    minor: String,
    codes: (hid_t, hid_t),
    description: String,
}

impl ErrorFrame {
    pub(crate) fn new(
        desc: &str, func: &str, major: &str, minor: &str, codes: (hid_t, hid_t),
    ) -> Self {
        Self {
            desc: desc.into(),
            func: func.into(),
            major: major.into(),
            minor: minor.into(),
            codes,
            description: format!("{func}(): {desc}"),
        }
    }

    pub fn desc(&self) -> &str {
        self.desc.as_ref()
    }

    pub fn description(&self) -> &str {
        self.description.as_ref()
    }

    /// Native (major, minor) error code ids of this frame.
    pub fn codes(&self) -> (hid_t, hid_t) {
        self.codes
    }

    pub fn detail(&self) -> Option<String> {
        Some(format!("Error in {}(): {} [{}: {}]", self.func, self.desc, self.major, self.minor))
    }
}

#[derive(Clone, Debug, Default)]
pub struct ExpandedErrorStack {
    frames: Vec<ErrorFrame>,
    description: Option<String>,
}

impl Deref for ExpandedErrorStack {
    type Target = [ErrorFrame];

    fn deref(&self) -> &Self::Target {
        &self.frames
    }
}

impl ExpandedErrorStack {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, frame: ErrorFrame) {
        self.frames.push(frame);
        if !self.is_empty() {
            let top_desc = self.frames[0].description().to_owned();
            if self.len() == 1 {
                self.description = Some(top_desc);
            } else {
                self.description =
                    Some(format!("{}: {}", top_desc, self.frames[self.len() - 1].desc()));
            }
        }
    }

    pub fn top(&self) -> Option<&ErrorFrame> {
        self.get(0)
    }

    pub fn description(&self) -> &str {
        match self.description {
            None => "unknown library error",
            Some(ref desc) => desc.as_ref(),
        }
    }

    pub fn detail(&self) -> Option<String> {
        self.top().and_then(ErrorFrame::detail)
    }
}

/// The error type for all operations of this crate.
#[derive(Clone)]
pub enum Error {
    /// The path does not resolve to an object.
    NoSuchObject(String),
    /// The object at the path is not a dataset.
    NotADataset(String),
    /// The object at the path is not a group.
    NotAGroup(String),
    /// The value at the path is not an object reference.
    NotAReference(String),
    /// Requested rank differs from the stored rank.
    RankMismatch { expected: usize, actual: usize },
    /// Dimensions or a selection do not fit.
    ShapeMismatch(String),
    /// The on-disk datatype is incompatible with the requested type.
    TypeMismatch(String),
    /// A committed enumeration's values differ from the requested ones.
    EnumIncompatible(String),
    /// An enumeration ordinal is outside the type's value range.
    OrdinalOutOfRange { ordinal: i64, cardinality: usize },
    /// An enumeration value name is not part of the type.
    UnknownEnumValue(String),
    /// Narrowing an enumeration array would lose ordinals.
    NarrowingOverflow(String),
    /// The requested layout/options combination is invalid.
    LayoutUnsupported(String),
    /// An error occurred in the C API of the HDF5 library. Full error
    /// stack is captured.
    Hdf5(ErrorStack),
    /// A filesystem-level failure.
    Io(String),
    /// A user error in the high-level API (e.g., invalid input).
    Internal(String),
}

/// A type for results generated by this crate's functions where the
/// `Err` type is set to `ezhdf5::Error`.
pub type Result<T, E = Error> = ::std::result::Result<T, E>;

impl Error {
    /// Obtain the current native error stack. The stack might be empty,
    /// which still yields a valid error value.
    pub fn query() -> Result<Self> {
        if let Ok(stack) = ErrorStack::from_current() {
            Ok(Self::Hdf5(stack))
        } else {
            Err(Self::Internal("Could not get errorstack".to_owned()))
        }
    }

    fn write(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Self::NoSuchObject(ref path) => write!(f, "object '{path}' does not exist"),
            Self::NotADataset(ref path) => write!(f, "object '{path}' is not a data set"),
            Self::NotAGroup(ref path) => write!(f, "object '{path}' is not a group"),
            Self::NotAReference(ref path) => write!(f, "object '{path}' is not a reference"),
            Self::RankMismatch { expected, actual } => write!(
                f,
                "data set is supposed to be of rank {expected}, but is of rank {actual}"
            ),
            Self::ShapeMismatch(ref desc) => write!(f, "shape mismatch: {desc}"),
            Self::TypeMismatch(ref desc) => write!(f, "type mismatch: {desc}"),
            Self::EnumIncompatible(ref desc) => write!(f, "incompatible enum type: {desc}"),
            Self::OrdinalOutOfRange { ordinal, cardinality } => write!(
                f,
                "ordinal {ordinal} out of range for enum with {cardinality} values"
            ),
            Self::UnknownEnumValue(ref desc) => write!(f, "unknown enum value: {desc}"),
            Self::NarrowingOverflow(ref desc) => write!(f, "narrowing overflow: {desc}"),
            Self::LayoutUnsupported(ref desc) => write!(f, "unsupported layout: {desc}"),
            Self::Io(ref desc) => write!(f, "i/o error: {desc}"),
            Self::Internal(ref desc) => f.write_str(desc),
            Self::Hdf5(ref stack) => match stack.clone().expand() {
                Ok(stack) => f.write_str(stack.description()),
                Err(_) => f.write_str("Could not get error stack"),
            },
        }
    }
}

impl From<&str> for Error {
    fn from(desc: &str) -> Self {
        Self::Internal(desc.into())
    }
}

impl From<String> for Error {
    fn from(desc: String) -> Self {
        Self::Internal(desc)
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<ShapeError> for Error {
    fn from(err: ShapeError) -> Self {
        match err {
            ShapeError::RankMismatch { expected, actual } => {
                Self::RankMismatch { expected, actual }
            }
            ShapeError::SizeMismatch { .. } => Self::ShapeMismatch(err.to_string()),
        }
    }
}

impl From<EnumError> for Error {
    fn from(err: EnumError) -> Self {
        match err {
            EnumError::OrdinalOutOfRange { ordinal, cardinality } => {
                Self::OrdinalOutOfRange { ordinal, cardinality }
            }
            EnumError::UnknownValue { .. } => Self::UnknownEnumValue(err.to_string()),
            EnumError::NarrowingOverflow { .. } => Self::NarrowingOverflow(err.to_string()),
        }
    }
}

impl From<MemberError> for Error {
    fn from(err: MemberError) -> Self {
        Self::TypeMismatch(err.to_string())
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.write(f)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.write(f)
    }
}

impl StdError for Error {}

impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        Self::new(io::ErrorKind::Other, err.to_string())
    }
}

pub fn h5check<T: H5ErrorCode>(value: T) -> Result<T> {
    H5ErrorCode::h5check(value)
}

pub trait H5ErrorCode: Copy {
    fn is_err_code(value: Self) -> bool;

    fn h5check(value: Self) -> Result<Self> {
        if Self::is_err_code(value) {
            Err(Error::query().unwrap_or_else(|e| e))
        } else {
            Ok(value)
        }
    }
}

impl H5ErrorCode for hsize_t {
    fn is_err_code(value: Self) -> bool {
        value == 0
    }
}

impl H5ErrorCode for libc::size_t {
    fn is_err_code(value: Self) -> bool {
        value == 0
    }
}

impl H5ErrorCode for herr_t {
    fn is_err_code(value: Self) -> bool {
        value < 0
    }
}

#[cfg(feature = "1.10.0")]
impl H5ErrorCode for hid_t {
    fn is_err_code(value: Self) -> bool {
        value < 0
    }
}

#[cfg(not(feature = "1.10.0"))]
impl H5ErrorCode for hssize_t {
    fn is_err_code(value: Self) -> bool {
        value < 0
    }
}

impl H5ErrorCode for libc::ssize_t {
    fn is_err_code(value: Self) -> bool {
        value < 0
    }
}

#[cfg(test)]
pub mod tests {
    use hdf5_sys::h5p::{H5Pclose, H5Pcreate};

    use crate::globals::H5P_ROOT;
    use crate::internal_prelude::*;

    #[test]
    pub fn test_error_stack() {
        let stack = h5lock!({
            let plist_id = H5Pcreate(*H5P_ROOT);
            H5Pclose(plist_id);
            H5Pclose(plist_id);
            Error::query()
        })
        .unwrap();
        let stack = match stack {
            Error::Hdf5(stack) => stack,
            other => panic!("Expected hdf5 error, not {}", other),
        }
        .expand()
        .unwrap();
        assert_eq!(stack.description(), "H5Pclose(): can't close: can't locate ID");
        assert!(!stack.is_empty());
        let (maj, min) = stack[0].codes();
        assert!(maj > 0 && min > 0);
    }

    #[test]
    pub fn test_h5call() {
        let result_no_error = h5call!({
            let plist_id = H5Pcreate(*H5P_ROOT);
            H5Pclose(plist_id)
        });
        assert!(result_no_error.is_ok());

        let result_error = h5call!({
            let plist_id = H5Pcreate(*H5P_ROOT);
            H5Pclose(plist_id);
            H5Pclose(plist_id)
        });
        assert!(result_error.is_err());
    }

    #[test]
    pub fn test_h5try() {
        fn f1() -> Result<herr_t> {
            h5try!(H5Pcreate(*H5P_ROOT));
            Ok(100)
        }

        assert_eq!(f1().unwrap(), 100);

        fn f2() -> Result<herr_t> {
            h5try!(H5Pcreate(123456));
            Ok(100)
        }

        assert!(f2().is_err());
    }

    #[test]
    pub fn test_typed_errors_display() {
        let err = Error::RankMismatch { expected: 2, actual: 3 };
        assert_eq!(err.to_string(), "data set is supposed to be of rank 2, but is of rank 3");
        let err = Error::NoSuchObject("/a/b".into());
        assert_eq!(err.to_string(), "object '/a/b' does not exist");
    }
}
