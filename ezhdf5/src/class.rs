use std::fmt;

use crate::internal_prelude::*;

/// Common behavior of all wrappers around an HDF5 object handle.
pub trait ObjectClass: Sized {
    const NAME: &'static str;
    const VALID_TYPES: &'static [H5I_type_t];

    fn from_handle(handle: Handle) -> Self;

    fn handle(&self) -> &Handle;

    fn short_repr(&self) -> Option<String> {
        None
    }

    fn from_id(id: hid_t) -> Result<Self> {
        h5lock_s!({
            let handle = Handle::try_new(id)?;
            if Self::is_valid_id_type(handle.id_type()) {
                Ok(Self::from_handle(handle))
            } else {
                Err(From::from(format!("Invalid {} id: {}", Self::NAME, id)))
            }
        })
    }

    fn id(&self) -> hid_t {
        self.handle().id()
    }

    fn is_valid(&self) -> bool {
        self.handle().is_valid_user_id()
    }

    fn is_valid_id_type(tp: H5I_type_t) -> bool {
        Self::VALID_TYPES.is_empty() || Self::VALID_TYPES.contains(&tp)
    }

    fn try_borrow(&self) -> Result<Handle> {
        Handle::try_borrow(self.id())
    }

    fn debug_fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        h5lock_s!({
            if !self.handle().is_valid_user_id() {
                write!(f, "<HDF5 {}: invalid id>", Self::NAME)
            } else if let Some(d) = self.short_repr() {
                write!(f, "<HDF5 {}: {}>", Self::NAME, d)
            } else {
                write!(f, "<HDF5 {}>", Self::NAME)
            }
        })
    }
}
