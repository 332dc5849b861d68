use std::ffi::OsString;
use std::sync::{Mutex, OnceLock};
use tempfile::TempDir;

/// Variables the config loader reads; cleared for every test.
const CONFIG_ENV_VARS: &[&str] = &[
    "SHAREGATE_TRANSPORT",
    "SHAREGATE_SERVER_PORT",
    "SHAREGATE_SHARE_TIMEOUT",
    "SHAREGATE_NGROK_AUTHTOKEN",
];

fn env_lock() -> &'static Mutex<()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(()))
}

struct EnvRestore {
    saved: Vec<(&'static str, Option<OsString>)>,
}

impl EnvRestore {
    fn capture() -> Self {
        let saved = std::iter::once("XDG_CONFIG_HOME")
            .chain(CONFIG_ENV_VARS.iter().copied())
            .map(|key| (key, std::env::var_os(key)))
            .collect();
        Self { saved }
    }
}

impl Drop for EnvRestore {
    fn drop(&mut self) {
        for (key, value) in self.saved.drain(..) {
            match value {
                Some(value) => std::env::set_var(key, value),
                None => std::env::remove_var(key),
            }
        }
    }
}

fn write_config(temp_dir: &TempDir, contents: &str) {
    let app_config_dir = temp_dir.path().join("sharegate");
    std::fs::create_dir_all(&app_config_dir).expect("create config dir");
    std::fs::write(app_config_dir.join("config.toml"), contents).expect("write config");
}

/// Run `f` with an isolated config dir holding `config_toml` and no
/// `SHAREGATE_*` variables set. Tests may set variables inside `f`.
pub fn with_config_env<T>(config_toml: &str, f: impl FnOnce() -> T) -> T {
    let _guard = env_lock().lock().unwrap_or_else(|e| e.into_inner());
    let temp_dir = TempDir::new().expect("temp dir");

    write_config(&temp_dir, config_toml);

    let restore = EnvRestore::capture();
    std::env::set_var("XDG_CONFIG_HOME", temp_dir.path());
    for key in CONFIG_ENV_VARS {
        std::env::remove_var(key);
    }

    let result = f();
    drop(restore);
    result
}
