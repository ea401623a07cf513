use std::borrow::Cow;
use std::path::Path;

use tokio::fs;
use tokio::io::AsyncWriteExt;

use super::window::{Window, WindowList};
use crate::error::Result;

/// The window tmux creates together with a new session
const FIRST_WINDOW: i32 = 1;

/// Render the tmux commands that rebuild `windows` as session `session`.
///
/// Every returned line ends with `\n`.
pub fn render_script(session: &str, windows: &WindowList) -> Vec<String> {
    let mut lines = Vec::with_capacity(windows.len() + 1);
    lines.push(format!("new -s {}\n", quote_arg(session)));
    lines.extend(windows.iter().map(window_command));
    lines
}

fn window_command(window: &Window) -> String {
    if window.index == FIRST_WINDOW {
        // Already exists once the session is up; only its name can differ.
        // A leading `-` would be read as a flag, quoted or not.
        let end_of_flags = if window.name.starts_with('-') { "-- " } else { "" };
        format!(
            "renamew -t {} {}{}\n",
            FIRST_WINDOW,
            end_of_flags,
            quote_arg(&window.name)
        )
    } else {
        format!(
            "new-window -n {} -c {} -t {}\n",
            quote_arg(&window.name),
            quote_arg(&window.working_dir),
            window.index
        )
    }
}

/// Write the session script for `windows` to `path`, truncating any
/// previous content.
pub async fn save_windows(path: &Path, session: &str, windows: &WindowList) -> Result<()> {
    let mut file = fs::File::create(path).await?;
    for line in render_script(session, windows) {
        file.write_all(line.as_bytes()).await?;
    }
    file.flush().await?;
    file.sync_all().await?;

    tracing::debug!(
        "wrote {} windows of {} to {}",
        windows.len(),
        session,
        path.display()
    );
    Ok(())
}

/// Single-quote `arg` if tmux would otherwise split or expand it.
pub fn quote_arg(arg: &str) -> Cow<'_, str> {
    let plain = !arg.is_empty()
        && !arg.chars().any(|c| {
            c.is_whitespace()
                || matches!(c, '\'' | '"' | ';' | '#' | '$' | '~' | '\\' | '{' | '}')
        });
    if plain {
        return Cow::Borrowed(arg);
    }
    Cow::Owned(format!("'{}'", arg.replace('\'', "'\\''")))
}
