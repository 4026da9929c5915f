//! Minimal native plugin: one host module and a greeting on startup.
use std::sync::atomic::{AtomicBool, Ordering};

use tplug_core::plugin_system::ffi::{FfiResult, NativeModule, NativePlugin};
use tplug_core::PluginInfo;

pub const GREETINGS_MODULE: &str = "example.hello.greetings";

static GREETINGS_READY: AtomicBool = AtomicBool::new(false);

extern "C-unwind" fn greetings_initialize() -> FfiResult {
    GREETINGS_READY.store(true, Ordering::SeqCst);
    FfiResult::Ok
}

extern "C-unwind" fn greetings_finalize() {
    GREETINGS_READY.store(false, Ordering::SeqCst);
}

/// Whether the host has initialized the greetings module
pub fn greetings_ready() -> bool {
    GREETINGS_READY.load(Ordering::SeqCst)
}

pub struct HelloPlugin {
    name: String,
    greeting: String,
}

impl HelloPlugin {
    pub fn greeting(&self) -> String {
        format!("{} from {}!", self.greeting, self.name)
    }
}

impl NativePlugin for HelloPlugin {
    fn create(info: &PluginInfo) -> Self {
        HelloPlugin {
            name: info.name.clone(),
            greeting: info.parameter("greeting").unwrap_or("Hello").to_string(),
        }
    }

    fn startup(&mut self) -> Result<(), String> {
        if !greetings_ready() {
            return Err(format!("module '{}' is not initialized", GREETINGS_MODULE));
        }
        println!("{}", self.greeting());
        Ok(())
    }

    fn shutdown(&mut self) -> Result<(), String> {
        println!("Goodbye from {}.", self.name);
        Ok(())
    }

    fn modules() -> Vec<NativeModule> {
        vec![NativeModule {
            name: GREETINGS_MODULE,
            initialize: greetings_initialize,
            finalize: greetings_finalize,
        }]
    }
}

tplug_core::export_plugin!(HelloPlugin);

#[cfg(test)]
mod tests;
