//! Wire a loaded deck to the terminal device and run until input ends.

use std::{fs, sync::Arc, time::Duration};

use config::Deck;
use deckd_engine::{
    CommandRunner, Engine, EngineCfg, EngineEvent, HandlerRegistry, ShellRunner,
};
use tokio::runtime::Runtime;
use tracing::{info, warn};

use crate::{
    cli::Cli,
    error::{Error, Result},
    term::TermDevice,
};

/// Runner that reports launches without spawning anything.
struct DryRunner;

impl CommandRunner for DryRunner {
    fn run(&self, command: &str) -> deckd_engine::Result<()> {
        info!(%command, "dry_run_launch");
        Ok(())
    }
}

/// Map the 1-based `--page` flag onto a page index of a deck with `count` pages.
fn start_page(page: usize, count: usize) -> Result<usize> {
    page.checked_sub(1)
        .filter(|p| *p < count)
        .ok_or(Error::StartPage { page, count })
}

/// Engine tunables with the command prefixes taken from the CLI.
fn engine_cfg(cli: &Cli) -> EngineCfg {
    EngineCfg {
        keybind_command: cli.keybind_command.clone(),
        url_command: cli.url_command.clone(),
        ..EngineCfg::default()
    }
}

/// How long pending blocking work, such as the stdin reader, may hold up exit.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(250);

/// Load the configuration and drive it until stdin closes or Ctrl-C.
pub fn run(cli: &Cli) -> Result<()> {
    let path = config::resolve_config_path(cli.config.as_deref())?;
    let deck = config::load_from_path(&path)?;
    info!(path = %path.display(), pages = deck.pages.len(), "config_loaded");
    let start = start_page(cli.page, deck.pages.len())?;
    if let Some(dir) = &cli.dump_dir {
        fs::create_dir_all(dir)?;
    }
    let runtime = Runtime::new()?;
    let result = runtime.block_on(simulate(cli, deck, start));
    release(runtime);
    result
}

/// Tear the runtime down without waiting on a stdin read that may never return.
fn release(runtime: Runtime) {
    runtime.shutdown_timeout(SHUTDOWN_GRACE);
}

/// Build the engine over a terminal deck, show `start`, and pump input until it ends.
async fn simulate(cli: &Cli, deck: Deck, start: usize) -> Result<()> {
    let device = Arc::new(TermDevice::new(
        cli.pixels,
        cli.cols,
        cli.rows,
        cli.dump_dir.clone(),
    ));
    let runner: Arc<dyn CommandRunner> = if cli.dry_run {
        Arc::new(DryRunner)
    } else {
        Arc::new(ShellRunner::new(cli.shell.as_str()))
    };
    let cfg = engine_cfg(cli);
    let registry = HandlerRegistry::with_builtins(&cfg);
    let (tx, mut events) = deckd_engine::event_channel();
    let engine = Engine::new_with_parts(deck, device, runner, tx, cfg, registry);

    let observer = tokio::spawn(async move {
        while let Some(ev) = events.recv().await {
            match ev {
                EngineEvent::PageChanged { page } => info!(page = page + 1, "page_shown"),
                EngineEvent::Disconnected => info!("deck_disconnected"),
            }
        }
    });

    engine.activate_page(start)?;
    info!("Type `press N`, `release N`, `tap N` or `quit`");
    tokio::select! {
        () = engine.listen() => {}
        res = tokio::signal::ctrl_c() => {
            if let Err(e) = res {
                warn!(error = %e, "signal handler failed");
            }
            info!("interrupted");
        }
    }
    engine.shutdown();
    // The observer ends once every engine handle, and so the event sender, is gone.
    drop(engine);
    if tokio::time::timeout(SHUTDOWN_GRACE, observer).await.is_err() {
        warn!("event observer still running at exit");
    }
    Ok(())
}
