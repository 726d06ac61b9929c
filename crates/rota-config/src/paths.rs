use std::ffi::OsString;
use std::path::PathBuf;

/// XDG app name used for config and data directories.
pub const APP_NAME: &str = "rota";
/// Overrides the rotations file location.
pub const ROTATIONS_FILE_ENV: &str = "ROTA_ROTATIONS_FILE";
/// Overrides the maps directory location.
pub const MAPS_DIR_ENV: &str = "ROTA_MAPS_DIR";

const ROTATIONS_FILE_NAME: &str = "rotations.toml";
const MAPS_DIR_NAME: &str = "maps";

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("", "", APP_NAME)
}

/// Non-empty env value wins over the platform default.
fn resolve_with_override(env_value: Option<OsString>, fallback: Option<PathBuf>) -> Option<PathBuf> {
    match env_value {
        Some(value) if !value.is_empty() => Some(PathBuf::from(value)),
        _ => fallback,
    }
}

/// `~/.config/rota` on Linux. `None` when no home directory can be found.
pub fn config_dir() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().to_path_buf())
}

/// `$ROTA_ROTATIONS_FILE`, else `{config_dir}/rotations.toml`.
pub fn rotations_path() -> Option<PathBuf> {
    resolve_with_override(
        std::env::var_os(ROTATIONS_FILE_ENV),
        config_dir().map(|dir| dir.join(ROTATIONS_FILE_NAME)),
    )
}

/// `$ROTA_MAPS_DIR`, else `{data_dir}/maps`.
pub fn maps_dir() -> Option<PathBuf> {
    resolve_with_override(
        std::env::var_os(MAPS_DIR_ENV),
        project_dirs().map(|dirs| dirs.data_dir().join(MAPS_DIR_NAME)),
    )
}
