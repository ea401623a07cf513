mod store;

pub use store::{Script, ScriptStore};

/// Extension of saved layout scripts
pub const LAYOUT_EXT: &str = "conf";

/// Extension of hand-written executable scripts
pub const LEGACY_EXT: &str = "sh";

/// Seed for new layout scripts
pub const LAYOUT_TEMPLATE: &str = "template.conf";

/// Seed for new executable scripts
pub const TEMPLATE_FILE: &str = "template.sh";

/// Files in the sessions directory that are not session scripts
pub const RESERVED_FILES: &[&str] = &["build.sh", LAYOUT_TEMPLATE, TEMPLATE_FILE];
