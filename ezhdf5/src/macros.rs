macro_rules! fail {
    ($err:expr) => {
        return Err(From::from($err))
    };
    ($fmt:literal, $($arg:tt)*) => {
        fail!(format!($fmt, $($arg)*))
    };
}

macro_rules! ensure {
    ($expr:expr, $err:expr) => {
        if !($expr) {
            fail!($err);
        }
    };
    ($expr:expr, $fmt:literal, $($arg:tt)*) => {
        if !($expr) {
            fail!(format!($fmt, $($arg)*));
        }
    };
}

/// Guards the expression with the global reentrant mutex (safe variant).
macro_rules! h5lock_s {
    ($expr:expr) => {
        $crate::sync::sync(|| $expr)
    };
}

/// Guards the unsafe expression with the global reentrant mutex.
macro_rules! h5lock {
    ($expr:expr) => {
        h5lock_s!(unsafe { $expr })
    };
}

macro_rules! h5call_s {
    ($expr:expr) => {
        h5lock_s!($crate::error::h5check($expr))
    };
}

/// Runs a library call under the lock and converts its return code into
/// a `Result`.
macro_rules! h5call {
    ($expr:expr) => {
        h5call_s!(unsafe { $expr })
    };
}

/// Like `h5call!`, but returns from the enclosing function on error.
macro_rules! h5try {
    ($expr:expr) => {
        match h5call!($expr) {
            Ok(value) => value,
            Err(err) => fail!(err),
        }
    };
}

/// Calls a getter of the form `func(args..., &mut out)` and returns the
/// output value.
macro_rules! h5get {
    ($func:ident($($arg:expr),+): $ty:ty) => {{
        let mut out: $ty = Default::default();
        h5call!($func($($arg,)+ &mut out)).map(|_| out)
    }};
}

macro_rules! h5get_d {
    ($func:ident($($arg:expr),+): $ty:ty) => {
        h5get!($func($($arg),+): $ty).unwrap_or_default()
    };
}

#[cfg(test)]
macro_rules! assert_err {
    ($expr:expr, $msg:expr) => {
        match $expr {
            Ok(_) => panic!("assertion failed: `{}` is not an error", stringify!($expr)),
            Err(ref err) => {
                let desc = err.to_string();
                if !desc.contains($msg) {
                    panic!(
                        "assertion failed: \"{}\" does not contain \"{}\" in `{}`",
                        desc,
                        $msg,
                        stringify!($expr)
                    );
                }
            }
        }
    };
}

#[cfg(test)]
macro_rules! assert_err_re {
    ($expr:expr, $re:expr) => {
        match $expr {
            Ok(_) => panic!("assertion failed: `{}` is not an error", stringify!($expr)),
            Err(ref err) => {
                let re = ::regex::Regex::new($re).unwrap();
                let desc = err.to_string();
                if !re.is_match(&desc) {
                    panic!(
                        "assertion failed: \"{}\" does not match \"{}\" in `{}`",
                        desc,
                        re,
                        stringify!($expr)
                    );
                }
            }
        }
    };
}
