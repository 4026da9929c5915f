//! # Native plugin ABI
//!
//! A native plugin is a shared library exporting two C-linkage symbols:
//!
//! - `tplug_create_plugin(info: *const FfiPluginInfo) -> *mut FfiPluginVTable`,
//!   the factory. It must return null on failure.
//! - `tplug_register_modules(registrar: *mut FfiModuleRegistrar)`, optional.
//!   Called before the factory so the plugin can register host modules.
//!
//! Everything crossing the boundary is `#[repr(C)]`. Strings are
//! NUL-terminated UTF-8 and owned by the side that allocated them; pointers in
//! [`FfiPluginInfo`] are only valid for the duration of the factory call.
//!
//! Plugin authors written in Rust implement [`NativePlugin`] and invoke
//! [`export_plugin!`](crate::export_plugin) instead of writing the symbols by hand.
use std::any::Any;
use std::ffi::{c_char, c_void, CStr, CString, NulError};
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::ptr;

use crate::kernel::constants::NATIVE_ENGINE;
use crate::plugin_system::info::PluginInfo;

/// Resource naming the shared library of a native plugin
pub const NATIVE_LIBRARY_RESOURCE: &str = "SharedLibraryName";

/// Factory symbol, NUL-terminated for `libloading`
pub const CREATE_PLUGIN_SYMBOL: &[u8] = b"tplug_create_plugin\0";

/// Optional module registration symbol
pub const REGISTER_MODULES_SYMBOL: &[u8] = b"tplug_register_modules\0";

/// Status codes returned across the boundary
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiResult {
    Ok = 0,
    Error = 1,
    NullPointer = 2,
    Utf8Error = 3,
    Panic = 4,
    Duplicate = 5,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct FfiNameValue {
    pub name: *const c_char,
    pub value: *const c_char,
}

/// Subset of the descriptor handed to the factory
#[repr(C)]
#[derive(Debug)]
pub struct FfiPluginInfo {
    pub name: *const c_char,
    pub version: *const c_char,
    pub folder: *const c_char,
    pub parameters: *const FfiNameValue,
    pub parameters_len: usize,
}

/// Function table returned by the factory.
///
/// `destroy` receives the table itself and frees both the instance and the
/// table, so all deallocation happens inside the plugin.
#[repr(C)]
pub struct FfiPluginVTable {
    pub instance: *mut c_void,
    pub startup: extern "C-unwind" fn(instance: *mut c_void) -> FfiResult,
    pub shutdown: extern "C-unwind" fn(instance: *mut c_void) -> FfiResult,
    pub is_started: extern "C-unwind" fn(instance: *const c_void) -> bool,
    pub destroy: extern "C-unwind" fn(vtable: *mut FfiPluginVTable),
}

pub type ModuleInitializeFn = extern "C-unwind" fn() -> FfiResult;
pub type ModuleFinalizeFn = extern "C-unwind" fn();

/// Host callback table passed to `tplug_register_modules`
#[repr(C)]
pub struct FfiModuleRegistrar {
    pub context: *mut c_void,
    pub register: extern "C-unwind" fn(
        context: *mut c_void,
        name: *const c_char,
        initialize: ModuleInitializeFn,
        finalize: ModuleFinalizeFn,
    ) -> FfiResult,
}

pub type CreatePluginFn = unsafe extern "C-unwind" fn(info: *const FfiPluginInfo) -> *mut FfiPluginVTable;
pub type RegisterModulesFn = unsafe extern "C-unwind" fn(registrar: *mut FfiModuleRegistrar);

/// Safely converts an FFI C string pointer to a Rust String.
/// # Safety
/// `ptr` must be null or point to a NUL-terminated string that stays valid
/// for the duration of this call.
pub unsafe fn ffi_string_from_ptr(ptr: *const c_char) -> Result<String, FfiResult> {
    if ptr.is_null() {
        return Err(FfiResult::NullPointer);
    }
    unsafe { CStr::from_ptr(ptr) }
        .to_str()
        .map(|s| s.to_owned())
        .map_err(|_| FfiResult::Utf8Error)
}

/// Like [`ffi_string_from_ptr`] but a null pointer yields an empty string.
/// # Safety
/// Same contract as [`ffi_string_from_ptr`].
unsafe fn ffi_string_or_empty(ptr: *const c_char) -> Result<String, FfiResult> {
    if ptr.is_null() {
        Ok(String::new())
    } else {
        unsafe { ffi_string_from_ptr(ptr) }
    }
}

/// Best-effort text of a caught panic payload
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic reason".to_string()
    }
}

impl FfiPluginInfo {
    /// Rebuild an owned descriptor on the plugin side.
    /// # Safety
    /// Every non-null pointer must satisfy the contract of
    /// [`ffi_string_from_ptr`]; `parameters` must point to `parameters_len`
    /// valid entries when non-null.
    pub unsafe fn to_info(&self) -> Result<PluginInfo, FfiResult> {
        let name = unsafe { ffi_string_from_ptr(self.name) }?;
        let mut info = PluginInfo::new(&name, NATIVE_ENGINE);
        info.version = unsafe { ffi_string_or_empty(self.version) }?;
        info.folder = PathBuf::from(unsafe { ffi_string_or_empty(self.folder) }?);

        if !self.parameters.is_null() && self.parameters_len > 0 {
            let entries = unsafe { std::slice::from_raw_parts(self.parameters, self.parameters_len) };
            for entry in entries {
                let key = unsafe { ffi_string_from_ptr(entry.name) }?;
                let value = unsafe { ffi_string_or_empty(entry.value) }?;
                info.parameters.push((key, value));
            }
        }
        Ok(info)
    }
}

/// Host-side storage keeping the strings behind an [`FfiPluginInfo`] alive
pub(crate) struct FfiPluginInfoBuf {
    name: CString,
    version: CString,
    folder: CString,
    _strings: Vec<(CString, CString)>,
    entries: Vec<FfiNameValue>,
}

impl FfiPluginInfoBuf {
    pub(crate) fn new(info: &PluginInfo) -> Result<Self, NulError> {
        let strings = info
            .parameters
            .iter()
            .map(|(k, v)| -> Result<(CString, CString), NulError> {
                Ok((CString::new(k.as_str())?, CString::new(v.as_str())?))
            })
            .collect::<Result<Vec<_>, NulError>>()?;
        let entries = strings
            .iter()
            .map(|(k, v)| FfiNameValue { name: k.as_ptr(), value: v.as_ptr() })
            .collect();

        Ok(Self {
            name: CString::new(info.name.as_str())?,
            version: CString::new(info.version.as_str())?,
            folder: CString::new(info.folder.to_string_lossy().as_bytes())?,
            _strings: strings,
            entries,
        })
    }

    /// Borrowed view, valid while `self` is alive
    pub(crate) fn raw(&self) -> FfiPluginInfo {
        FfiPluginInfo {
            name: self.name.as_ptr(),
            version: self.version.as_ptr(),
            folder: self.folder.as_ptr(),
            parameters: self.entries.as_ptr(),
            parameters_len: self.entries.len(),
        }
    }
}

/// A host module contributed by a native plugin
#[derive(Debug, Clone, Copy)]
pub struct NativeModule {
    pub name: &'static str,
    pub initialize: ModuleInitializeFn,
    pub finalize: ModuleFinalizeFn,
}

/// Implemented by plugins built as Rust `cdylib`s and exported with
/// [`export_plugin!`](crate::export_plugin).
pub trait NativePlugin: Send + Sized + 'static {
    fn create(info: &PluginInfo) -> Self;

    fn startup(&mut self) -> Result<(), String>;

    fn shutdown(&mut self) -> Result<(), String> {
        Ok(())
    }

    /// Modules registered with the host before the plugin is created
    fn modules() -> Vec<NativeModule> {
        Vec::new()
    }
}

struct NativeInstance<T> {
    plugin: T,
    started: bool,
}

extern "C-unwind" fn instance_startup<T: NativePlugin>(instance: *mut c_void) -> FfiResult {
    if instance.is_null() {
        return FfiResult::NullPointer;
    }
    let state = unsafe { &mut *(instance as *mut NativeInstance<T>) };
    if state.started {
        return FfiResult::Ok;
    }
    match panic::catch_unwind(AssertUnwindSafe(|| state.plugin.startup())) {
        Ok(Ok(())) => {
            state.started = true;
            FfiResult::Ok
        }
        Ok(Err(_)) => FfiResult::Error,
        Err(_) => FfiResult::Panic,
    }
}

extern "C-unwind" fn instance_shutdown<T: NativePlugin>(instance: *mut c_void) -> FfiResult {
    if instance.is_null() {
        return FfiResult::NullPointer;
    }
    let state = unsafe { &mut *(instance as *mut NativeInstance<T>) };
    if !state.started {
        return FfiResult::Ok;
    }
    match panic::catch_unwind(AssertUnwindSafe(|| state.plugin.shutdown())) {
        Ok(Ok(())) => {
            state.started = false;
            FfiResult::Ok
        }
        Ok(Err(_)) => FfiResult::Error,
        Err(_) => FfiResult::Panic,
    }
}

extern "C-unwind" fn instance_is_started<T: NativePlugin>(instance: *const c_void) -> bool {
    if instance.is_null() {
        return false;
    }
    unsafe { &*(instance as *const NativeInstance<T>) }.started
}

extern "C-unwind" fn instance_destroy<T: NativePlugin>(vtable: *mut FfiPluginVTable) {
    if vtable.is_null() {
        return;
    }
    let vtable = unsafe { Box::from_raw(vtable) };
    if !vtable.instance.is_null() {
        drop(unsafe { Box::from_raw(vtable.instance as *mut NativeInstance<T>) });
    }
}

/// Body of the generated `tplug_create_plugin`.
/// # Safety
/// `info` must be null or satisfy the contract of [`FfiPluginInfo::to_info`].
pub unsafe fn create_plugin<T: NativePlugin>(info: *const FfiPluginInfo) -> *mut FfiPluginVTable {
    let Some(raw) = (unsafe { info.as_ref() }) else {
        return ptr::null_mut();
    };
    let Ok(info) = (unsafe { raw.to_info() }) else {
        return ptr::null_mut();
    };

    panic::catch_unwind(AssertUnwindSafe(|| {
        let instance = Box::new(NativeInstance {
            plugin: T::create(&info),
            started: false,
        });
        Box::into_raw(Box::new(FfiPluginVTable {
            instance: Box::into_raw(instance) as *mut c_void,
            startup: instance_startup::<T>,
            shutdown: instance_shutdown::<T>,
            is_started: instance_is_started::<T>,
            destroy: instance_destroy::<T>,
        }))
    }))
    .unwrap_or(ptr::null_mut())
}

/// Body of the generated `tplug_register_modules`.
/// # Safety
/// `registrar` must be null or point to a registrar valid for this call.
pub unsafe fn register_modules<T: NativePlugin>(registrar: *mut FfiModuleRegistrar) {
    let Some(registrar) = (unsafe { registrar.as_mut() }) else {
        return;
    };
    for module in T::modules() {
        let Ok(name) = CString::new(module.name) else {
            continue;
        };
        // the host records rejected registrations itself
        let _ = (registrar.register)(registrar.context, name.as_ptr(), module.initialize, module.finalize);
    }
}

/// Export a [`NativePlugin`] implementation under the well-known symbols.
///
/// ```ignore
/// struct Hello;
/// impl tplug_core::plugin_system::ffi::NativePlugin for Hello { /* ... */ }
/// tplug_core::export_plugin!(Hello);
/// ```
#[macro_export]
macro_rules! export_plugin {
    ($plugin:ty) => {
        #[unsafe(no_mangle)]
        pub extern "C-unwind" fn tplug_create_plugin(
            info: *const $crate::plugin_system::ffi::FfiPluginInfo,
        ) -> *mut $crate::plugin_system::ffi::FfiPluginVTable {
            unsafe { $crate::plugin_system::ffi::create_plugin::<$plugin>(info) }
        }

        #[unsafe(no_mangle)]
        pub extern "C-unwind" fn tplug_register_modules(
            registrar: *mut $crate::plugin_system::ffi::FfiModuleRegistrar,
        ) {
            unsafe { $crate::plugin_system::ffi::register_modules::<$plugin>(registrar) }
        }
    };
}
