use crate::config::load_config;
use crate::render::{render_svg, write_output_png, write_output_svg};
use crate::scene_dump::write_scene_dump;
use crate::text_metrics::audit_canvas;
use crate::workflow::react_workflow;
use anyhow::Result;
use clap::{Parser, ValueEnum};
use log::{LevelFilter, debug, info, warn};
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Parser, Debug)]
#[command(
    name = "react-diagram",
    version,
    about = "Render the ReAct agent workflow diagram"
)]
pub struct Args {
    /// Output file. Defaults to the configured output path.
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Output format
    #[arg(short = 'e', long = "outputFormat", value_enum, default_value = "png")]
    pub output_format: OutputFormat,

    /// Config file (JSON or JSON5)
    #[arg(short = 'c', long = "configFile")]
    pub config: Option<PathBuf>,

    /// Raster resolution in dots per inch
    #[arg(long = "dpi")]
    pub dpi: Option<f32>,

    /// Also write the canvas primitives as JSON
    #[arg(long = "dump-scene")]
    pub dump_scene: Option<PathBuf>,

    /// Log level (off, error, warn, info, debug, trace)
    #[arg(long = "log-level", default_value = "warn")]
    pub log_level: String,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Svg,
    Png,
}

pub fn run() -> Result<()> {
    let args = Args::parse();
    init_logger(&args.log_level);
    debug!(args:?; "Parsed arguments");
    let output = run_with(&args)?;
    println!("✅ Diagram written to {}", output.display());
    Ok(())
}

/// Renders according to `args` and returns the path written.
pub fn run_with(args: &Args) -> Result<PathBuf> {
    let mut config = load_config(args.config.as_deref())?;
    if let Some(dpi) = args.dpi {
        if !(dpi.is_finite() && dpi > 0.0) {
            return Err(anyhow::anyhow!("--dpi must be a positive number, got {dpi}"));
        }
        config.render.dpi = dpi;
    }
    let output = resolve_output(args, &config.render.output);

    let canvas = react_workflow(&config.theme)?;
    info!(primitives = canvas.primitives().len(); "Built workflow canvas");

    for issue in audit_canvas(&canvas, &config.theme.font_family) {
        warn!("{issue}");
    }

    if let Some(path) = args.dump_scene.as_deref() {
        write_scene_dump(path, &canvas)?;
        info!(path:? = path; "Wrote scene dump");
    }

    let svg = render_svg(&canvas, &config.theme);
    match args.output_format {
        OutputFormat::Svg => write_output_svg(&svg, &output)?,
        OutputFormat::Png => write_output_png(&svg, &output, &config.render, &config.theme)?,
    }
    info!(path:? = output, format:? = args.output_format; "Wrote diagram");
    Ok(output)
}

fn resolve_output(args: &Args, configured: &std::path::Path) -> PathBuf {
    if let Some(path) = &args.output {
        return path.clone();
    }
    match args.output_format {
        OutputFormat::Png => configured.to_path_buf(),
        OutputFormat::Svg => configured.with_extension("svg"),
    }
}

fn init_logger(level: &str) {
    let level = LevelFilter::from_str(level).unwrap_or_else(|_| {
        eprintln!("Invalid log level: {level}. Using 'warn' instead.");
        LevelFilter::Warn
    });
    env_logger::Builder::from_env(env_logger::Env::default())
        .filter_level(level)
        .init();
}
