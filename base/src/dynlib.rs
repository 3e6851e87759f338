// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Runtime binding of C libraries.
//!
//! The graphics stack (libdrm, libgbm, libEGL, libGLESv2) is resolved when the program starts
//! rather than at link time, so the crates that wrap it build and test on hosts that have no GPU
//! userspace installed.
//!
//! # Examples
//!
//! ```
//! use std::os::raw::c_char;
//!
//! base::dynamic_library! {
//!     /// A tiny slice of libc.
//!     pub struct LibC("libc.so.6") {
//!         fn strlen(s: *const c_char) -> usize;
//!     }
//! }
//!
//! let libc = LibC::load()?;
//! // SAFETY: the argument is a valid nul terminated string.
//! let len = unsafe { (libc.strlen)(b"cube\0".as_ptr() as *const c_char) };
//! assert_eq!(len, 4);
//! # Ok::<(), base::dynlib::LoadError>(())
//! ```

use libloading::Library;
use remain::sorted;
use thiserror::Error;

/// Errors produced while binding a shared object.
#[sorted]
#[derive(Error, Debug)]
pub enum LoadError {
    /// The shared object itself could not be opened.
    #[error("failed to open {soname}: {source}")]
    Open {
        soname: &'static str,
        source: libloading::Error,
    },
    /// A required entry point is missing from the shared object.
    #[error("{soname} does not export {symbol}: {source}")]
    Symbol {
        soname: &'static str,
        symbol: &'static str,
        source: libloading::Error,
    },
}

/// Opens `soname` with the dynamic loader.
///
/// # Safety
///
/// Running the library's initialisers must be sound. This holds for the system graphics
/// libraries this crate family loads.
pub unsafe fn open(soname: &'static str) -> Result<Library, LoadError> {
    Library::new(soname).map_err(|source| LoadError::Open { soname, source })
}

/// Copies the function pointer named `symbol` out of `library`.
///
/// # Safety
///
/// `T` must match the C signature of `symbol`, and the returned pointer must not be called after
/// `library` is dropped.
pub unsafe fn symbol<T: Copy>(
    library: &Library,
    soname: &'static str,
    symbol: &'static str,
) -> Result<T, LoadError> {
    library
        .get::<T>(symbol.as_bytes())
        .map(|sym| *sym)
        .map_err(|source| LoadError::Symbol {
            soname,
            symbol,
            source,
        })
}

/// Declares a table of C entry points resolved from a shared object at runtime.
///
/// Every listed function becomes a public `unsafe extern "C" fn` field named exactly like the C
/// symbol. The generated `load()` opens the library and resolves each symbol, failing on the first
/// one that is missing. The table keeps the library mapped for as long as it lives.
#[macro_export]
macro_rules! dynamic_library {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident($soname:expr) {
            $(
                $(#[$fmeta:meta])*
                fn $func:ident($($arg:ident: $argty:ty),* $(,)?) $(-> $ret:ty)?;
            )*
        }
    ) => {
        $(#[$meta])*
        #[allow(non_snake_case)]
        $vis struct $name {
            _library: $crate::libloading::Library,
            $(
                $(#[$fmeta])*
                pub $func: unsafe extern "C" fn($($argty),*) $(-> $ret)?,
            )*
        }

        impl $name {
            /// The shared object this table is resolved from.
            pub const SONAME: &'static str = $soname;

            /// Opens the shared object and resolves every entry point of the table.
            #[allow(non_snake_case)]
            pub fn load() -> ::std::result::Result<Self, $crate::dynlib::LoadError> {
                // SAFETY:
                // Loading the system library only runs its initialisers.
                let library = unsafe { $crate::dynlib::open($soname)? };
                $(
                    // SAFETY:
                    // The field type was declared from the C prototype of the symbol and the
                    // pointer is stored next to the library that keeps it valid.
                    let $func = unsafe {
                        $crate::dynlib::symbol::<unsafe extern "C" fn($($argty),*) $(-> $ret)?>(
                            &library,
                            $soname,
                            stringify!($func),
                        )?
                    };
                )*
                Ok($name {
                    _library: library,
                    $($func,)*
                })
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use std::os::raw::c_char;
    use std::os::raw::c_int;

    use super::*;

    crate::dynamic_library! {
        struct LibC("libc.so.6") {
            fn strlen(s: *const c_char) -> usize;
            fn abs(v: c_int) -> c_int;
        }
    }

    crate::dynamic_library! {
        struct Missing("libc.so.6") {
            fn textured_cube_does_not_exist();
        }
    }

    crate::dynamic_library! {
        struct NoSuchLibrary("libtextured-cube-missing.so.0") {
            fn anything();
        }
    }

    #[test]
    fn resolves_functions() {
        let libc = LibC::load().expect("failed to load libc");
        // SAFETY: valid nul terminated string.
        let len = unsafe { (libc.strlen)(b"textured\0".as_ptr() as *const c_char) };
        assert_eq!(len, 8);
        // SAFETY: abs has no preconditions.
        assert_eq!(unsafe { (libc.abs)(-7) }, 7);
        assert_eq!(LibC::SONAME, "libc.so.6");
    }

    #[test]
    fn missing_symbol() {
        match Missing::load() {
            Err(LoadError::Symbol { soname, symbol, .. }) => {
                assert_eq!(soname, "libc.so.6");
                assert_eq!(symbol, "textured_cube_does_not_exist");
            }
            Err(e) => panic!("unexpected error: {}", e),
            Ok(_) => panic!("symbol should not resolve"),
        }
    }

    #[test]
    fn missing_library() {
        assert!(matches!(
            NoSuchLibrary::load(),
            Err(LoadError::Open {
                soname: "libtextured-cube-missing.so.0",
                ..
            })
        ));
    }
}
