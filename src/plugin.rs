//! Dynamic-library plugin ABI (spec §4.14/§6), gated behind the
//! `dylib-plugins` feature (off by default — spec §9's design note prefers
//! a static trait-object registry as the primary path; this is kept only
//! for interop with externally built codec bundles, as the note allows).
//!
//! Grounded in `dccl::Codec::load_library` (`examples/original_source/src/dccl.cpp`),
//! which resolves a single `goby_dccl_load` symbol via `dlsym`. This port
//! exposes the pair the spec names explicitly (`dccl3_load`/`dccl3_unload`)
//! so a plugin can also reverse its registrations at unload time, which the
//! original's one-way `dlsym` call never supported.

use crate::engine::Engine;
use crate::result::{Error, Result};

/// C ABI entry points a plugin `cdylib` must export.
pub type LoadFn = unsafe extern "C" fn(*mut Engine);
pub type UnloadFn = unsafe extern "C" fn(*mut Engine);

/// A mounted plugin library. Held by the engine until teardown or an
/// explicit [`Engine::unload_library`] call; libraries are closed in LIFO
/// order (spec §5).
pub struct PluginHandle {
    library: libloading::Library,
    unload: Option<UnloadFn>,
}

impl PluginHandle {
    /// Opens `path`, resolves `dccl3_load`, and calls it immediately with
    /// `engine`. Fails with [`Error::Plugin`] if the library can't be
    /// opened or is missing the load entry point.
    pub fn open(path: &str, engine: *mut Engine) -> Result<Self> {
        let library = unsafe { libloading::Library::new(path) }.map_err(|e| Error::Plugin(format!("failed to open `{path}`: {e}")))?;
        let load: LoadFn = unsafe {
            *library
                .get::<LoadFn>(b"dccl3_load\0")
                .map_err(|e| Error::Plugin(format!("`{path}` has no `dccl3_load` entry point: {e}")))?
        };
        let unload: Option<UnloadFn> = unsafe { library.get::<UnloadFn>(b"dccl3_unload\0").ok().map(|s| *s) };
        unsafe { load(engine) };
        Ok(Self { library, unload })
    }

    /// Calls the plugin's `dccl3_unload` (if it exported one) before the
    /// library itself is dropped.
    pub fn close(self, engine: *mut Engine) {
        if let Some(unload) = self.unload {
            unsafe { unload(engine) };
        }
        drop(self.library);
    }
}
