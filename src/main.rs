//! Binary entrypoint for the HDRI browser.
//!
//! Runs the browser panel headless against an in-process scene: lists a
//! folder, waits for the thumbnails and prints the grid the way a front end
//! would lay it out.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{ArgAction, Parser};
use tracing::{Level, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use hdri_browser::config::Configuration;
use hdri_browser::host::SceneGraph;
use hdri_browser::panel::BrowserPanel;

/// Simple CLI
#[derive(Debug, Parser)]
#[command(name = "hdri-browser", about = "Browse HDRI environment maps")]
struct Cli {
    /// Path to YAML config file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Folder to browse; defaults to the last browsed folder
    #[arg(value_name = "FOLDER")]
    folder_arg: Option<PathBuf>,

    /// Same as the positional folder
    #[arg(long, value_name = "DIR", conflicts_with = "folder_arg")]
    folder: Option<PathBuf>,

    /// File name in the folder to assign to the environment light
    #[arg(long, value_name = "NAME")]
    select: Option<String>,

    /// Light rotation in degrees
    #[arg(long, value_name = "DEGREES", allow_negative_numbers = true)]
    rotation: Option<i32>,

    /// Light intensity slider value (0-100)
    #[arg(long, value_name = "VALUE")]
    intensity: Option<u32>,

    /// Give up waiting for thumbnails after this many seconds
    #[arg(long, value_name = "SECS", default_value_t = 120)]
    timeout_secs: u64,

    /// Increase log verbosity (repeatable)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbosity: u8) -> Result<()> {
    // map -v to log level
    let level = match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let filter = EnvFilter::from_default_env()
        .add_directive(format!("hdri_browser={level}").parse()?)
        .add_directive("exr=warn".parse()?);
    fmt().with_env_filter(filter).with_target(true).init();
    Ok(())
}

fn load_config(path: Option<&PathBuf>) -> Result<Configuration> {
    let cfg = match path {
        Some(path) => Configuration::from_yaml_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => Configuration::default(),
    };
    cfg.validated().context("validating configuration")
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;

    let cfg = load_config(cli.config.as_ref())?;
    let scene = Arc::new(SceneGraph::for_light(&cfg.light));
    let mut panel = BrowserPanel::new(cfg, scene.clone()).context("starting thumbnail workers")?;

    let opened = match cli.folder.as_ref().or(cli.folder_arg.as_ref()) {
        Some(folder) => Some(panel.browse(folder)),
        None => panel.restore_last_folder(),
    };
    match opened {
        Some(Ok(count)) => info!(count, "listing folder"),
        Some(Err(err)) => warn!(error = %err, "could not open folder"),
        None => bail!("no folder given and no last folder to restore"),
    }

    if !panel.wait_idle(Duration::from_secs(cli.timeout_secs)) {
        warn!(
            completed = panel.session().completed(),
            total = panel.session().total(),
            "timed out waiting for thumbnails"
        );
    }

    for ((row, col), item) in panel.session().grid() {
        match item.placeholder().filter(|_| item.error().is_some()) {
            Some(marker) => println!("[{row},{col}] {}  {marker}: {}", item.name, item.caption()),
            None => println!("[{row},{col}] {}  {}", item.name, item.caption()),
        }
    }
    println!("{}", panel.status().text);

    if let Some(name) = &cli.select {
        let path = panel
            .session()
            .items()
            .iter()
            .find(|item| &item.name == name)
            .map(|item| item.path.clone())
            .with_context(|| format!("{name} is not in the listed folder"))?;
        match panel.click_card(&path) {
            Some(tooltip) => println!("{tooltip}"),
            None => warn!(path = %path.display(), "environment light not updated"),
        }
    }
    if let Some(degrees) = cli.rotation {
        println!("rotation {}", panel.set_rotation(degrees));
    }
    if let Some(value) = cli.intensity {
        println!("intensity {}", panel.set_intensity(value));
    }

    for light in scene.children(&panel.config().light.parent_path, None) {
        info!(light = %light, "scene light");
    }
    Ok(())
}
