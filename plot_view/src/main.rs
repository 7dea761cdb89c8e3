//! Standalone plot view binary.
//!
//! Usage:
//!   cargo run -p plot_view -- [--config view.json] [--scene saved.plot]
//!                             [--out plot.svg] [--width 800] [--height 600]
//!
//! Reads console commands from stdin, animates camera momentum on a fixed
//! tick, and rewrites the SVG output whenever the picture changes. Type
//! `help` for the command list and `quit` to exit.

use std::env;
use std::io::{BufRead, Write};
use std::path::PathBuf;

use anyhow::Context;
use plot_shared::config::ViewConfig;
use plot_view::{console::Console, controller::TickOutcome, svg::SvgSurface, PlotView};
use tokio::sync::mpsc;
use tracing::{info, warn};

#[derive(Debug, Default)]
struct Args {
    config: Option<PathBuf>,
    scene: Option<PathBuf>,
    out: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
}

fn parse_args() -> anyhow::Result<Args> {
    let mut parsed = Args::default();
    let args: Vec<String> = env::args().collect();
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" if i + 1 < args.len() => {
                parsed.config = Some(PathBuf::from(&args[i + 1]));
                i += 2;
            }
            "--scene" if i + 1 < args.len() => {
                parsed.scene = Some(PathBuf::from(&args[i + 1]));
                i += 2;
            }
            "--out" if i + 1 < args.len() => {
                parsed.out = Some(args[i + 1].clone());
                i += 2;
            }
            "--width" if i + 1 < args.len() => {
                parsed.width = Some(args[i + 1].parse().context("--width")?);
                i += 2;
            }
            "--height" if i + 1 < args.len() => {
                parsed.height = Some(args[i + 1].parse().context("--height")?);
                i += 2;
            }
            other => {
                warn!(arg = %other, "Ignoring argument");
                i += 1;
            }
        }
    }
    Ok(parsed)
}

fn render_frame(view: &mut PlotView, path: &str) -> anyhow::Result<()> {
    let (w, h) = (view.config().width, view.config().height);
    let mut svg = SvgSurface::new(w, h);
    let stats = view.render(w, h, &mut svg)?;
    svg.write_to(path)?;
    info!(
        path,
        elements = stats.elements,
        culled = stats.culled,
        "Frame written"
    );
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = parse_args()?;
    let mut cfg = match &args.config {
        Some(path) => ViewConfig::load(path)?,
        None => ViewConfig::default(),
    };
    if let Some(out) = args.out {
        cfg.output = out;
    }
    if let Some(w) = args.width {
        cfg.width = w;
    }
    if let Some(h) = args.height {
        cfg.height = h;
    }
    info!(width = cfg.width, height = cfg.height, out = %cfg.output, "Starting plot view");

    let output = cfg.output.clone();
    let mut view = PlotView::new(cfg).context("building view")?;
    if let Some(scene) = &args.scene {
        view.load(scene)?;
    } else {
        view.add_function();
    }
    let mut console = Console::new(&output);

    // Set up console input channel.
    let (console_tx, mut console_rx) = mpsc::channel::<String>(32);

    // Spawn stdin reader thread.
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        let mut stdout = std::io::stdout();
        loop {
            print!("] ");
            let _ = stdout.flush();
            let mut line = String::new();
            match stdin.lock().read_line(&mut line) {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            }
            let line = line.trim().to_string();
            if !line.is_empty() && console_tx.blocking_send(line).is_err() {
                break;
            }
        }
    });

    println!("Plot view ready. Type 'help' for commands, 'quit' to exit.");
    println!();

    let tick = view.tick_interval();
    let mut ticker = tokio::time::interval(tick);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        if view.take_dirty() {
            if let Err(e) = render_frame(&mut view, &output) {
                println!("Render error: {:#}", e);
            }
        }

        tokio::select! {
            line = console_rx.recv() => {
                let Some(line) = line else { break };
                if matches!(line.as_str(), "quit" | "exit") {
                    break;
                }
                match console.exec(&mut view, &line) {
                    Ok(output) => {
                        for line in output {
                            println!("{}", line);
                        }
                    }
                    Err(e) => {
                        println!("Error: {:#}", e);
                    }
                }
            }
            _ = ticker.tick(), if view.is_animating() => {
                if view.tick(tick) == TickOutcome::Settled {
                    info!(eye = ?view.camera_position(), "Camera settled");
                }
            }
        }
    }

    info!("Shutting down");
    Ok(())
}
