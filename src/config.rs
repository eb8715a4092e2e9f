use crate::theme::Theme;
use anyhow::{Context, bail};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

static HEX_COLOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#(?:[0-9A-Fa-f]{3}|[0-9A-Fa-f]{6})$").unwrap());

pub const DEFAULT_OUTPUT: &str = "react-workflow.png";
/// Upper bound for `render.padInches`.
pub const MAX_PAD_INCHES: f32 = 10.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    pub dpi: f32,
    pub background: String,
    /// Padding kept around the trimmed content, in inches.
    pub pad_inches: f32,
    pub output: PathBuf,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            dpi: 300.0,
            background: "#FFFFFF".to_string(),
            pad_inches: 0.1,
            output: PathBuf::from(DEFAULT_OUTPUT),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub theme: Theme,
    pub render: RenderConfig,
}

impl Default for Config {
    fn default() -> Self {
        let theme = Theme::react();
        let render = RenderConfig {
            background: theme.background.clone(),
            ..Default::default()
        };
        Self { theme, render }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    theme: Option<ThemeFile>,
    render: Option<RenderFile>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ThemeFile {
    font_family: Option<String>,
    text_color: Option<String>,
    node_border: Option<String>,
    line_color: Option<String>,
    llm_background: Option<String>,
    llm_border: Option<String>,
    env_background: Option<String>,
    env_border: Option<String>,
    thought: Option<String>,
    action: Option<String>,
    pause: Option<String>,
    tool: Option<String>,
    observation: Option<String>,
    final_answer: Option<String>,
    exit_color: Option<String>,
    background: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RenderFile {
    dpi: Option<f32>,
    background: Option<String>,
    pad_inches: Option<f32>,
    output: Option<PathBuf>,
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let mut config = Config::default();
    let Some(path) = path else {
        return Ok(config);
    };

    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let parsed: ConfigFile = json5::from_str(&contents)
        .with_context(|| format!("failed to parse config file {}", path.display()))?;

    if let Some(vars) = parsed.theme {
        apply_theme(&mut config.theme, vars)?;
        // The raster background follows the theme unless render overrides it.
        config.render.background = config.theme.background.clone();
    }

    if let Some(render) = parsed.render {
        if let Some(v) = render.dpi {
            if !(v.is_finite() && v > 0.0) {
                bail!("render.dpi must be a positive number, got {v}");
            }
            config.render.dpi = v;
        }
        if let Some(v) = render.pad_inches {
            if !(v.is_finite() && (0.0..=MAX_PAD_INCHES).contains(&v)) {
                bail!("render.padInches must be between 0 and {MAX_PAD_INCHES}, got {v}");
            }
            config.render.pad_inches = v;
        }
        if let Some(v) = render.background {
            config.render.background = checked_color("render.background", v)?;
            // The SVG page is painted with the theme background; keep them equal.
            config.theme.background = config.render.background.clone();
        }
        if let Some(v) = render.output {
            config.render.output = v;
        }
    }

    log::debug!(path:? = path; "Loaded config file");
    Ok(config)
}

fn apply_theme(theme: &mut Theme, vars: ThemeFile) -> anyhow::Result<()> {
    if let Some(v) = vars.font_family {
        theme.font_family = v;
    }
    let colors = [
        ("theme.textColor", vars.text_color, &mut theme.text_color),
        ("theme.nodeBorder", vars.node_border, &mut theme.node_border),
        ("theme.lineColor", vars.line_color, &mut theme.line_color),
        ("theme.llmBackground", vars.llm_background, &mut theme.llm_background),
        ("theme.llmBorder", vars.llm_border, &mut theme.llm_border),
        ("theme.envBackground", vars.env_background, &mut theme.env_background),
        ("theme.envBorder", vars.env_border, &mut theme.env_border),
        ("theme.thought", vars.thought, &mut theme.thought),
        ("theme.action", vars.action, &mut theme.action),
        ("theme.pause", vars.pause, &mut theme.pause),
        ("theme.tool", vars.tool, &mut theme.tool),
        ("theme.observation", vars.observation, &mut theme.observation),
        ("theme.finalAnswer", vars.final_answer, &mut theme.final_answer),
        ("theme.exitColor", vars.exit_color, &mut theme.exit_color),
        ("theme.background", vars.background, &mut theme.background),
    ];
    for (key, value, slot) in colors {
        if let Some(v) = value {
            *slot = checked_color(key, v)?;
        }
    }
    Ok(())
}

fn checked_color(key: &str, value: String) -> anyhow::Result<String> {
    if !HEX_COLOR_RE.is_match(&value) {
        bail!("{key} must be a #RGB or #RRGGBB colour, got {value:?}");
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn defaults_without_a_file() {
        let config = load_config(None).unwrap();
        assert_eq!(config.render.dpi, 300.0);
        assert_eq!(config.render.background, "#FFFFFF");
        assert_eq!(config.render.output, PathBuf::from(DEFAULT_OUTPUT));
        assert_eq!(config.theme.llm_border, "#1976D2");
    }

    #[test]
    fn json5_overrides_theme_and_render() {
        let file = write_config(
            r##"{
                // comments are allowed
                theme: { pause: "#F00", fontFamily: "DejaVu Sans" },
                render: { dpi: 150, padInches: 0, output: "out/diagram.png" },
            }"##,
        );
        let config = load_config(Some(file.path())).unwrap();
        assert_eq!(config.theme.pause, "#F00");
        assert_eq!(config.theme.font_family, "DejaVu Sans");
        assert_eq!(config.theme.thought, "#FFF9C4");
        assert_eq!(config.render.dpi, 150.0);
        assert_eq!(config.render.pad_inches, 0.0);
        assert_eq!(config.render.output, PathBuf::from("out/diagram.png"));
    }

    #[test]
    fn theme_background_carries_into_render() {
        let file = write_config(r##"{"theme": {"background": "#000000"}}"##);
        let config = load_config(Some(file.path())).unwrap();
        assert_eq!(config.render.background, "#000000");
    }

    #[test]
    fn render_background_repaints_the_page() {
        let file = write_config(r##"{"render": {"background": "#FAFAFA"}}"##);
        let config = load_config(Some(file.path())).unwrap();
        assert_eq!(config.theme.background, "#FAFAFA");
        assert_eq!(config.render.background, "#FAFAFA");
    }

    #[test]
    fn rejects_malformed_colour() {
        let file = write_config(r#"{"theme": {"thought": "yellow"}}"#);
        let err = load_config(Some(file.path())).unwrap_err();
        assert!(err.to_string().contains("theme.thought"));
    }

    #[test]
    fn rejects_non_positive_dpi() {
        let file = write_config(r#"{"render": {"dpi": 0}}"#);
        assert!(load_config(Some(file.path())).is_err());
    }

    #[test]
    fn rejects_out_of_range_padding() {
        let file = write_config(r#"{"render": {"padInches": 100000000}}"#);
        let err = load_config(Some(file.path())).unwrap_err();
        assert!(err.to_string().contains("render.padInches"));

        let file = write_config(r#"{"render": {"padInches": -0.5}}"#);
        assert!(load_config(Some(file.path())).is_err());
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(load_config(Some(Path::new("/nonexistent/react-config.json"))).is_err());
    }
}
