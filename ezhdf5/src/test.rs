use std::path::PathBuf;

use crate::{File, OpenMode};

pub fn with_tmp_dir<F: Fn(PathBuf)>(func: F) {
    let dir = tempfile::Builder::new().prefix("ezhdf5-").tempdir().unwrap();
    func(dir.path().to_path_buf());
}

pub fn with_tmp_path<F: Fn(PathBuf)>(func: F) {
    with_tmp_dir(|dir| func(dir.join("foo.h5")));
}

pub fn with_tmp_file<F: Fn(File)>(func: F) {
    with_tmp_path(|path| {
        let file = File::open_as(&path, OpenMode::Truncate).unwrap();
        func(file);
    });
}
