use std::path::PathBuf;

// Recursion is bounded by the host stack; fail with a script error well
// before that
pub const MAX_CALL_DEPTH: usize = 1000;

pub struct RuntimeConfig {
    /// Where `use` looks for modules that are not plain file paths.
    pub lib_root: PathBuf,
    pub max_call_depth: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            lib_root: default_lib_root(),
            max_call_depth: MAX_CALL_DEPTH,
        }
    }
}

pub fn default_lib_root() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".ez").join("lib"))
        .unwrap_or_else(|| PathBuf::from(".ez/lib"))
}
