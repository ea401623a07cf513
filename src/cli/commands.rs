use std::io;
use std::path::Path;

use tokio::process::Command as TokioCommand;

use crate::cli::{Args, Command};
use crate::config::{Config, ConfigFile};
use crate::error::{Error, Result};
use crate::scripts::{Script, ScriptStore};
use crate::tmux::{save_windows, TmuxManager, WindowList};

pub async fn run_cli(args: Args) -> Result<()> {
    if let Command::Version = args.command {
        println!("tss v{}", crate::VERSION);
        return Ok(());
    }

    let file = ConfigFile::load().await?;
    let config = Config::resolve(args.dir, args.socket, file)?;
    let store = ScriptStore::new(&config.sessions_dir);
    let manager = TmuxManager::new()
        .with_socket(config.tmux_socket.clone())
        .with_capture_limit(config.capture_limit);

    match args.command {
        Command::Ls { filter } => handle_ls(&store, filter.as_deref()).await,
        Command::Ps => handle_ps(&store, &manager).await,
        Command::Run { name } => handle_run(&store, &manager, &name).await,
        Command::Save { session } => handle_save(&store, &manager, session).await,
        Command::Windows { session, json } => handle_windows(&manager, session, json).await,
        Command::New { name } => handle_new(&store, &name).await,
        Command::Rm { name } => handle_rm(&store, &name).await,
        Command::Edit { name } => handle_edit(&store, &config, &name).await,
        // Printed before config resolution
        Command::Version => Ok(()),
    }
}

async fn handle_ls(store: &ScriptStore, filter: Option<&str>) -> Result<()> {
    let names = match filter {
        Some(f) => store.list_matching(f).await?,
        None => store.list().await?,
    };
    for name in names {
        println!("{}", name);
    }
    Ok(())
}

async fn handle_ps(store: &ScriptStore, manager: &TmuxManager) -> Result<()> {
    let scripts = store.list().await?;
    for session in manager.list_sessions().await? {
        if scripts.contains(&session) {
            println!("{}", session);
        }
    }
    Ok(())
}

async fn handle_run(store: &ScriptStore, manager: &TmuxManager, name: &str) -> Result<()> {
    let script = store
        .find(name)
        .await?
        .ok_or_else(|| Error::SessionNotFound(name.to_string()))?;

    let path = match script {
        Script::Executable(path) => return run_executable(&path).await,
        Script::Layout(path) => path,
    };

    if !manager.has_session(name).await? {
        // The script's `new -s` attaches the sourcing client itself when it
        // has a terminal, and only returns once that client detaches.
        manager.start_server().await?;
        manager.source_script(&path).await?;
        tracing::debug!("restored {} from {}", name, path.display());
        return Ok(());
    }

    tracing::debug!("{} already running, attaching", name);
    if std::env::var_os("TMUX").is_some() {
        manager.switch_client(name).await
    } else {
        manager.attach(name).await
    }
}

async fn run_executable(path: &Path) -> Result<()> {
    let status = TokioCommand::new(path)
        .status()
        .await
        .map_err(|e| Error::spawn(path.display().to_string(), e))?;
    if !status.success() {
        return Err(Error::CommandFailed(format!(
            "{} exited with {}",
            path.display(),
            status
        )));
    }
    Ok(())
}

async fn target_session(manager: &TmuxManager, session: Option<String>) -> Result<String> {
    match session {
        Some(s) => Ok(s),
        None => manager.current_session().await,
    }
}

async fn capture(manager: &TmuxManager, session: &str) -> Result<WindowList> {
    if !manager.has_session(session).await? {
        return Err(Error::SessionNotFound(session.to_string()));
    }
    manager.capture_windows(session).await.map_err(|e| match e {
        Error::MalformedReport { line, fields } => Error::MalformedReport {
            line: format!("{}: {}", session, line),
            fields,
        },
        other => other,
    })
}

async fn handle_save(
    store: &ScriptStore,
    manager: &TmuxManager,
    session: Option<String>,
) -> Result<()> {
    let session = target_session(manager, session).await?;
    let path = store.script_path(&session)?;
    let windows = capture(manager, &session).await?;

    save_windows(&path, &session, &windows)
        .await
        .map_err(|e| with_path(e, &path))?;

    println!("✓ Saved session: {}", session);
    println!("  Windows: {}", windows.len());
    println!("  Path:    {}", path.display());
    Ok(())
}

async fn handle_windows(manager: &TmuxManager, session: Option<String>, json: bool) -> Result<()> {
    let session = target_session(manager, session).await?;
    let windows = capture(manager, &session).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&windows.to_vec())?);
        return Ok(());
    }

    for w in &windows {
        println!("{}\t{}\t{}", w.index, w.name, w.working_dir);
    }
    Ok(())
}

async fn handle_new(store: &ScriptStore, name: &str) -> Result<()> {
    let script = store.create(name).await.map_err(|e| with_path(e, store.dir()))?;
    println!("✓ Created session script: {}", name);
    println!("  Path: {}", script.path().display());
    Ok(())
}

async fn handle_rm(store: &ScriptStore, name: &str) -> Result<()> {
    let path = store.remove(name).await?;
    println!("✓ Removed session script: {}", name);
    println!("  Path: {}", path.display());
    Ok(())
}

async fn handle_edit(store: &ScriptStore, config: &Config, name: &str) -> Result<()> {
    let script = store
        .find(name)
        .await?
        .ok_or_else(|| Error::SessionNotFound(name.to_string()))?;

    let mut words = config.editor.split_whitespace();
    let program = words
        .next()
        .ok_or_else(|| Error::config("editor is empty"))?;

    let status = TokioCommand::new(program)
        .args(words)
        .arg(script.path())
        .status()
        .await
        .map_err(|e| Error::spawn(program, e))?;

    if !status.success() {
        return Err(Error::CommandFailed(format!(
            "{} exited with {}",
            program, status
        )));
    }
    Ok(())
}

/// Attach `path` to a bare IO error so the user sees which file failed
fn with_path(err: Error, path: &Path) -> Error {
    match err {
        Error::Io(e) => Error::Io(io::Error::new(
            e.kind(),
            format!("{}: {}", path.display(), e),
        )),
        other => other,
    }
}
