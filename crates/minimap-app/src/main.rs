//! Snapshot renderer entry point (native).

#[cfg(feature = "native")]
mod cli {
    use clap::Parser;
    use minimap_app::snapshot::{encode_png, load_config, load_document, render_snapshot};
    use minimap_app::MinimapResult;
    use minimap_core::config::MinimapConfig;
    use std::path::PathBuf;

    /// Render a document snapshot into a minimap PNG.
    #[derive(Parser, Debug)]
    #[command(name = "minimap", about = "Render a live-minimap PNG from a document snapshot")]
    pub struct Cli {
        /// Document snapshot (JSON).
        pub snapshot: PathBuf,

        /// Output file.
        #[arg(short, long, default_value = "minimap.png")]
        pub output: PathBuf,

        /// Minimap configuration (JSON).
        #[arg(long)]
        pub config: Option<PathBuf>,

        /// Override the snapshot's scroll offset.
        #[arg(long)]
        pub scroll: Option<f64>,
    }

    pub fn run(cli: Cli) -> MinimapResult<()> {
        let config = match &cli.config {
            Some(path) => load_config(path)?,
            None => MinimapConfig::default(),
        };

        let mut document = load_document(&cli.snapshot)?;
        if let Some(scroll) = cli.scroll {
            let max = document.metrics.max_scroll();
            document.set_scroll_top(scroll.clamp(0.0, max));
        }
        log::info!(
            "Loaded {} elements from {}",
            document.elements.len(),
            cli.snapshot.display()
        );

        let snapshot = render_snapshot(&document, config)?;
        let report = &snapshot.report;
        log::info!(
            "{:?} pass: {} samples, {} highlights, {}x{} canvas in {:?}",
            report.fidelity,
            report.samples,
            report.highlights.len(),
            report.canvas.width,
            report.canvas.height,
            report.elapsed
        );
        log::info!(
            "Viewport indicator at {:.1}px, {:.1}px tall",
            report.viewport.top,
            report.viewport.height
        );

        let png = encode_png(&snapshot.image)?;
        std::fs::write(&cli.output, png)?;
        log::info!("Wrote {}", cli.output.display());
        Ok(())
    }
}

#[cfg(feature = "native")]
fn main() {
    use clap::Parser;

    env_logger::init();
    log::info!("Starting minimap snapshot renderer");

    if let Err(e) = cli::run(cli::Cli::parse()) {
        log::error!("{}", e);
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

#[cfg(not(feature = "native"))]
fn main() {
    panic!("Native feature not enabled. Use `cargo run --features native`");
}
