//! Environment variable utilities
//!
//! `SCRIPT_LOADER_*` overrides applied on top of a loaded `LoaderConfig`.

/// Read an override, `None` when unset or not valid unicode
pub fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Read a boolean override
///
/// "true", "1", "yes" and "on" (any case, surrounding whitespace ignored)
/// count as set; anything else, or an unset variable, is `false`.
pub fn env_bool(key: &str) -> bool {
    env_opt(key)
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes" | "on"))
        .unwrap_or(false)
}
