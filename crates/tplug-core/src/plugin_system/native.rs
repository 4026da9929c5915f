use std::ffi::{c_char, c_void};
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use libloading::{Library, Symbol};

use crate::kernel::module::ModuleRegistry;
use crate::plugin_system::engine::PluginEngine;
use crate::plugin_system::error::{PluginSystemError, Result};
use crate::plugin_system::ffi::{
    ffi_string_from_ptr, panic_message, CreatePluginFn, FfiModuleRegistrar, FfiPluginInfoBuf,
    FfiPluginVTable, FfiResult, ModuleFinalizeFn, ModuleInitializeFn, RegisterModulesFn,
    CREATE_PLUGIN_SYMBOL, REGISTER_MODULES_SYMBOL,
};
use crate::plugin_system::info::PluginInfo;
use crate::plugin_system::traits::Plugin;
use crate::utils::join_confined;

fn ffi_error(plugin: &str, operation: &str, message: impl Into<String>) -> PluginSystemError {
    PluginSystemError::Ffi {
        plugin: plugin.to_string(),
        operation: operation.to_string(),
        message: message.into(),
    }
}

#[derive(Debug, Clone, Copy)]
struct UnsafeVTablePtr(*mut FfiPluginVTable);
unsafe impl Send for UnsafeVTablePtr {}

/// Live plugin backed by a shared library
struct NativePluginHandle {
    info: PluginInfo,
    vtable: UnsafeVTablePtr,
    // keeps the code behind `vtable` mapped; dropped after `destroy` runs
    _library: Arc<Library>,
}

impl NativePluginHandle {
    fn call(&self, call: impl FnOnce(&FfiPluginVTable) -> FfiResult) -> std::result::Result<(), String> {
        let vtable = unsafe { &*self.vtable.0 };
        match panic::catch_unwind(AssertUnwindSafe(|| call(vtable))) {
            Ok(FfiResult::Ok) => Ok(()),
            Ok(code) => Err(format!("plugin returned {:?}", code)),
            Err(payload) => Err(format!("panic: {}", panic_message(&*payload))),
        }
    }
}

impl Plugin for NativePluginHandle {
    fn info(&self) -> &PluginInfo {
        &self.info
    }

    fn is_started(&self) -> bool {
        let vtable = unsafe { &*self.vtable.0 };
        panic::catch_unwind(AssertUnwindSafe(|| (vtable.is_started)(vtable.instance))).unwrap_or(false)
    }

    fn startup(&mut self) -> Result<()> {
        self.call(|vt| (vt.startup)(vt.instance))
            .map_err(|message| PluginSystemError::Startup {
                plugin: self.info.name.clone(),
                message,
            })
    }

    fn shutdown(&mut self) -> Result<()> {
        self.call(|vt| (vt.shutdown)(vt.instance))
            .map_err(|message| PluginSystemError::Shutdown {
                plugin: self.info.name.clone(),
                message,
            })
    }
}

impl Drop for NativePluginHandle {
    fn drop(&mut self) {
        let vtable = self.vtable.0;
        if vtable.is_null() {
            return;
        }
        let destroy = unsafe { (*vtable).destroy };
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| destroy(vtable))) {
            log::error!(
                "Plugin '{}' panicked while being destroyed: {}",
                self.info.name,
                panic_message(&*payload)
            );
        }
        self.vtable.0 = std::ptr::null_mut();
    }
}

struct RegistrarContext<'a> {
    modules: &'a mut ModuleRegistry,
    library: Arc<Library>,
    error: Option<PluginSystemError>,
}

extern "C-unwind" fn host_register_module(
    context: *mut c_void,
    name: *const c_char,
    initialize: ModuleInitializeFn,
    finalize: ModuleFinalizeFn,
) -> FfiResult {
    let Some(ctx) = (unsafe { (context as *mut RegistrarContext<'_>).as_mut() }) else {
        return FfiResult::NullPointer;
    };
    let name = match unsafe { ffi_string_from_ptr(name) } {
        Ok(name) => name,
        Err(code) => return code,
    };

    // each hook owns a reference to the library so its code stays mapped
    let init_library = Arc::clone(&ctx.library);
    let finalize_library = Arc::clone(&ctx.library);
    let registered = ctx.modules.register(
        &name,
        move || {
            let _library = &init_library;
            match panic::catch_unwind(|| initialize()) {
                Ok(FfiResult::Ok) => Ok(()),
                Ok(code) => Err(format!("initializer returned {:?}", code)),
                Err(payload) => Err(format!("panic: {}", panic_message(&*payload))),
            }
        },
        move || {
            let _library = &finalize_library;
            if panic::catch_unwind(|| finalize()).is_err() {
                log::error!("Module finalizer panicked");
            }
        },
    );

    match registered {
        Ok(()) => FfiResult::Ok,
        Err(e) => {
            if ctx.error.is_none() {
                ctx.error = Some(e);
            }
            FfiResult::Duplicate
        }
    }
}

/// Loads plugins from shared libraries through the C ABI in
/// [`ffi`](crate::plugin_system::ffi).
#[derive(Debug, Default)]
pub struct NativeEngine;

impl NativeEngine {
    pub fn new() -> Self {
        NativeEngine
    }

    /// Where the shared library of `info` lives.
    ///
    /// The `SharedLibraryName` resource (or the plugin name) is taken relative
    /// to the descriptor's folder. A bare name gets the platform's prefix and
    /// suffix, so `hello_plugin` becomes `libhello_plugin.so` on Linux.
    pub fn library_path(info: &PluginInfo) -> Result<PathBuf> {
        let name = info.library_name();
        let relative = join_confined(Path::new(""), name).ok_or_else(|| PluginSystemError::InvalidPath {
            path: PathBuf::from(name),
            reason: "shared library name must be a relative path inside the plugin folder".to_string(),
        })?;
        let file_name = relative.file_name().ok_or_else(|| PluginSystemError::InvalidPath {
            path: relative.clone(),
            reason: "shared library name has no file name".to_string(),
        })?;

        let has_platform_suffix = relative
            .extension()
            .map(|ext| ext == std::env::consts::DLL_EXTENSION)
            .unwrap_or(false);
        let file_name = if has_platform_suffix {
            file_name.to_os_string()
        } else {
            libloading::library_filename(file_name)
        };

        Ok(info.folder.join(relative.with_file_name(file_name)))
    }

    fn register_modules(info: &PluginInfo, library: &Arc<Library>, modules: &mut ModuleRegistry) -> Result<()> {
        let symbol: std::result::Result<Symbol<RegisterModulesFn>, _> =
            unsafe { library.get(REGISTER_MODULES_SYMBOL) };
        let Ok(symbol) = symbol else {
            // optional symbol
            return Ok(());
        };
        let register: RegisterModulesFn = *symbol;

        let mut context = RegistrarContext {
            modules,
            library: Arc::clone(library),
            error: None,
        };
        let mut registrar = FfiModuleRegistrar {
            context: &mut context as *mut RegistrarContext<'_> as *mut c_void,
            register: host_register_module,
        };

        panic::catch_unwind(AssertUnwindSafe(|| unsafe { register(&mut registrar) }))
            .map_err(|payload| {
                ffi_error(&info.name, "register_modules", format!("panic: {}", panic_message(&*payload)))
            })?;

        match context.error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl PluginEngine for NativeEngine {
    fn load(&self, info: &PluginInfo, modules: &mut ModuleRegistry) -> Result<Box<dyn Plugin>> {
        let path = Self::library_path(info)?;
        if !path.is_file() {
            return Err(PluginSystemError::InvalidPath {
                path,
                reason: "shared library not found".to_string(),
            });
        }

        log::debug!("Opening shared library {} for plugin '{}'", path.display(), info.name);
        let library = unsafe { Library::new(&path) }
            .map_err(|e| ffi_error(&info.name, "open library", format!("libloading error: {}", e)))?;
        let library = Arc::new(library);

        Self::register_modules(info, &library, modules)?;

        let create: CreatePluginFn = {
            let symbol: Symbol<CreatePluginFn> = unsafe { library.get(CREATE_PLUGIN_SYMBOL) }
                .map_err(|e| ffi_error(&info.name, "resolve factory", format!("missing symbol tplug_create_plugin: {}", e)))?;
            *symbol
        };

        let marshalled = FfiPluginInfoBuf::new(info)
            .map_err(|e| ffi_error(&info.name, "marshal descriptor", e.to_string()))?;
        let raw_info = marshalled.raw();

        let vtable = panic::catch_unwind(AssertUnwindSafe(|| unsafe { create(&raw_info) }))
            .map_err(|payload| ffi_error(&info.name, "create", format!("panic: {}", panic_message(&*payload))))?;
        if vtable.is_null() {
            return Err(ffi_error(&info.name, "create", "factory returned a null vtable"));
        }

        Ok(Box::new(NativePluginHandle {
            info: info.clone(),
            vtable: UnsafeVTablePtr(vtable),
            _library: library,
        }))
    }

    fn unload(&self, plugin: Box<dyn Plugin>) -> Result<()> {
        log::debug!("Closing shared library of plugin '{}'", plugin.info().name);
        drop(plugin);
        Ok(())
    }
}
