#[cfg(all(feature = "cli", feature = "png"))]
pub mod cli;
pub mod config;
pub mod ir;
pub mod render;
pub mod scene_dump;
pub mod text_metrics;
pub mod theme;
pub mod workflow;

#[cfg(all(feature = "cli", feature = "png"))]
pub use cli::run;
pub use config::{Config, RenderConfig, load_config};
pub use ir::Canvas;
pub use render::render_svg;
#[cfg(feature = "png")]
pub use render::{render_png, write_output_png};
pub use theme::Theme;
pub use workflow::react_workflow;
