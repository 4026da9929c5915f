/// Extension of plugin descriptor files
pub const DESCRIPTOR_EXTENSION: &str = "teplg";

/// Root element every descriptor must have
pub const DESCRIPTOR_ROOT: &str = "PluginInfo";

/// Conventional plugins subdirectory, relative to a prefix
pub const PLUGINS_SUBDIR: &str = "share/tplug/plugins";

/// Environment variable naming the user's tplug home
pub const HOME_ENV_VAR: &str = "TPLUG_HOME";

/// Install prefix baked in at build time, if any
pub const INSTALL_PREFIX: Option<&str> = option_env!("TPLUG_INSTALL_PREFIX");

/// Engine key for plugins loaded from shared libraries
pub const NATIVE_ENGINE: &str = "native";

/// Legacy engine key accepted for native plugins
pub const NATIVE_ENGINE_ALIAS: &str = "C++";

/// Engine key for plugins compiled into the host
pub const BUILTIN_ENGINE: &str = "builtin";

/// Default name of the persisted plugin state file
pub const STATE_FILE_NAME: &str = "plugins.json";
