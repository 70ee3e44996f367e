mod adjust;
mod cli;
mod export;
mod info;
mod pipeline;

use anyhow::{bail, Context};
use clap::Parser;
use glcs_container::FileSource;
use glcs_core::{logging, Clock};

use cli::{Action, Cli};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init_from_env(Clock::new());
    log::set_max_level(verbosity_to_level(cli.verbosity));

    if cli.rtprio {
        log::warn!(target: "glc-play", "-P/--rtprio requested but this build has no rt-priority collaborator wired");
    }
    if let Some(resize) = &cli.resize {
        let parsed = adjust::parse_resize(resize).context("--resize")?;
        log::info!(target: "glc-play", "resize requested: {parsed:?} (no scaler collaborator wired)");
    }
    if let Some(color) = &cli.color {
        let parsed = adjust::parse_color(color).context("--color")?;
        log::info!(target: "glc-play", "color adjust requested: {parsed:?} (no color-filter collaborator wired)");
    }

    let action = cli.action();
    if matches!(action, Action::Wav(_) | Action::Image(..)) && cli.out.is_none() {
        bail!("-o/--out is required for -a/-b/-p/-y");
    }

    let (source, header) = FileSource::open_source(&cli.file)
        .with_context(|| format!("opening {}", cli.file.display()))?;

    match action {
        Action::Info(level) => info::run_info(source, &header, level),
        Action::Show(key) => {
            source.close_source();
            info::run_show(&header, &key)
        }
        Action::Play | Action::Wav(_) | Action::Image(..) => {
            let mut cfg = pipeline::PipelineConfig::default();
            if let Some(mib) = cli.uncompressed {
                cfg.uncompressed_bytes = mib as usize * 1024 * 1024;
            }
            pipeline::run(source, action, cli.out.clone(), cfg)
        }
    }
}

fn verbosity_to_level(v: u32) -> log::LevelFilter {
    match v {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    }
}
