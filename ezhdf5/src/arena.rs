//! Scoped ownership of handles acquired during one operation.

use std::cell::RefCell;

use crate::internal_prelude::*;

/// Owns every handle acquired while a public operation runs and
/// releases them in LIFO order when dropped, on all exit paths.
///
/// A release never aborts its siblings: each handle close runs on its
/// own under the global lock and swallows close failures, so a failed
/// close can never mask the operation's primary error. Arenas nest
/// freely; an inner arena releases its handles before the outer one.
#[derive(Default)]
pub struct Arena {
    handles: RefCell<Vec<Handle>>,
}

impl Arena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes ownership of a raw object id; fails if the id is invalid.
    /// Returns the id for direct use in subsequent calls.
    pub fn adopt(&self, id: hid_t) -> Result<hid_t> {
        let handle = Handle::try_new(id)?;
        self.handles.borrow_mut().push(handle);
        Ok(id)
    }

    /// Takes ownership of an already-wrapped handle.
    pub fn own(&self, handle: Handle) -> hid_t {
        let id = handle.id();
        self.handles.borrow_mut().push(handle);
        id
    }

    /// Number of handles currently owned by this arena.
    pub fn len(&self) -> usize {
        self.handles.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.borrow().is_empty()
    }
}

impl Drop for Arena {
    fn drop(&mut self) {
        let mut handles = self.handles.borrow_mut();
        while let Some(handle) = handles.pop() {
            drop(handle);
        }
    }
}

#[cfg(test)]
pub mod tests {
    use hdf5_sys::h5i::H5Iis_valid;
    use hdf5_sys::h5s::{H5Screate, H5S_class_t};

    use super::Arena;
    use crate::internal_prelude::*;

    fn new_space_id() -> hid_t {
        h5call!(H5Screate(H5S_class_t::H5S_SCALAR)).unwrap()
    }

    #[test]
    pub fn test_release_on_drop() {
        let id = {
            let arena = Arena::new();
            let id = arena.adopt(new_space_id()).unwrap();
            assert_eq!(arena.len(), 1);
            assert_eq!(h5lock!(H5Iis_valid(id)), 1);
            id
        };
        assert_ne!(h5lock!(H5Iis_valid(id)), 1);
    }

    #[test]
    pub fn test_release_on_failure_path() {
        fn failing(ids: &mut Vec<hid_t>) -> Result<()> {
            let arena = Arena::new();
            ids.push(arena.adopt(new_space_id())?);
            ids.push(arena.adopt(new_space_id())?);
            fail!("boom");
        }
        let mut ids = vec![];
        assert!(failing(&mut ids).is_err());
        assert_eq!(ids.len(), 2);
        for id in ids {
            assert_ne!(h5lock!(H5Iis_valid(id)), 1);
        }
    }

    #[test]
    pub fn test_adopt_invalid() {
        let arena = Arena::new();
        assert!(arena.adopt(H5I_INVALID_HID).is_err());
        assert!(arena.is_empty());
    }

    #[test]
    pub fn test_nested_scopes() {
        let outer = Arena::new();
        let outer_id = outer.adopt(new_space_id()).unwrap();
        {
            let inner = Arena::new();
            let inner_id = inner.adopt(new_space_id()).unwrap();
            drop(inner);
            assert_ne!(h5lock!(H5Iis_valid(inner_id)), 1);
            // the outer handle survives the inner scope
            assert_eq!(h5lock!(H5Iis_valid(outer_id)), 1);
        }
        drop(outer);
        assert_ne!(h5lock!(H5Iis_valid(outer_id)), 1);
    }
}
