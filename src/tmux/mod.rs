mod executor;
mod manager;
mod script;
mod window;

pub use executor::{execute, CapturedOutput, COMMAND_NOT_FOUND, DEFAULT_CAPTURE_LIMIT};
pub use manager::TmuxManager;
pub use script::{quote_arg, render_script, save_windows};
pub use window::{
    build_window_list, parse_window_line, Window, WindowList, NAME_CAPACITY, PATH_CAPACITY,
    WINDOW_FORMAT,
};
