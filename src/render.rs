use crate::ir::{
    Annotation, Canvas, Connector, ConnectorKind, FontWeight, HAlign, LineStyle, Node, Point,
    Primitive, Region, VAlign,
};
use crate::theme::Theme;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[cfg(feature = "png")]
use crate::config::RenderConfig;
#[cfg(feature = "png")]
use resvg::tiny_skia::{IntRect, Pixmap, Transform};

/// SVG user units per canvas unit: the document is laid out in points.
pub const POINTS_PER_UNIT: f32 = 72.0;
const LINE_SPACING: f32 = 1.2;
const ARROW_HEAD_LENGTH: f32 = 8.0;
const ARROW_HEAD_HALF_WIDTH: f32 = 4.0;
const ARROW_SHRINK: f32 = 2.0;
const DASH_ON: f32 = 3.7;
const DASH_OFF: f32 = 1.6;
const METERS_PER_INCH: f32 = 0.0254;

#[derive(Debug, Error)]
pub enum RenderError {
    #[cfg(feature = "png")]
    #[error("failed to parse generated SVG: {0}")]
    Svg(#[from] usvg::Error),
    #[error("failed to allocate {width}x{height} surface")]
    Allocation { width: u32, height: u32 },
    #[error("rendered image has no content to trim to")]
    EmptyContent,
    #[error("invalid colour {0:?}")]
    InvalidColor(String),
    #[cfg(feature = "png")]
    #[error("failed to encode PNG: {0}")]
    Encode(#[from] png::EncodingError),
    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub fn render_svg(canvas: &Canvas, theme: &Theme) -> String {
    let mut svg = String::new();
    let width = canvas.width() * POINTS_PER_UNIT;
    let height = canvas.height() * POINTS_PER_UNIT;

    svg.push_str(&format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{width}\" height=\"{height}\" viewBox=\"0 0 {width} {height}\">",
    ));
    svg.push_str(&format!(
        "<rect width=\"100%\" height=\"100%\" fill=\"{}\"/>",
        theme.background
    ));

    let page = Page::new(canvas);
    for primitive in canvas.paint_order() {
        match primitive {
            Primitive::Region(region) => svg.push_str(&region_svg(&page, region)),
            Primitive::Node(node) => svg.push_str(&node_svg(&page, node)),
            Primitive::Connector(connector) => svg.push_str(&connector_svg(&page, connector)),
            Primitive::Annotation(_) => {}
        }
    }
    // Node labels share the text layer with annotations.
    for primitive in canvas.primitives() {
        match primitive {
            Primitive::Node(node) => svg.push_str(&node_label_svg(&page, node, theme)),
            Primitive::Annotation(annotation) => {
                svg.push_str(&annotation_svg(&page, annotation, theme))
            }
            Primitive::Region(_) | Primitive::Connector(_) => {}
        }
    }

    svg.push_str("</svg>");
    svg
}

/// Maps canvas coordinates (y up) to SVG user space (y down, points).
struct Page {
    height: f32,
}

impl Page {
    fn new(canvas: &Canvas) -> Self {
        Self {
            height: canvas.height(),
        }
    }

    fn point(&self, p: Point) -> (f32, f32) {
        (p.x * POINTS_PER_UNIT, (self.height - p.y) * POINTS_PER_UNIT)
    }

    /// Top-left corner and size of a box given by its lower-left corner.
    fn rect(&self, x: f32, y: f32, width: f32, height: f32) -> (f32, f32, f32, f32) {
        let (left, top) = self.point(Point::new(x, y + height));
        (left, top, width * POINTS_PER_UNIT, height * POINTS_PER_UNIT)
    }
}

fn rounded_rect_svg(
    rect: (f32, f32, f32, f32),
    radius: f32,
    fill: &str,
    stroke: &str,
    line_width: f32,
) -> String {
    let (x, y, w, h) = rect;
    format!(
        "<rect x=\"{x:.2}\" y=\"{y:.2}\" width=\"{w:.2}\" height=\"{h:.2}\" rx=\"{radius:.2}\" ry=\"{radius:.2}\" fill=\"{fill}\" stroke=\"{stroke}\" stroke-width=\"{line_width}\"/>",
    )
}

fn region_svg(page: &Page, region: &Region) -> String {
    let rect = page.rect(
        region.x - region.pad,
        region.y - region.pad,
        region.width + 2.0 * region.pad,
        region.height + 2.0 * region.pad,
    );
    rounded_rect_svg(
        rect,
        region.pad * POINTS_PER_UNIT,
        &region.fill,
        &region.stroke,
        region.line_width,
    )
}

fn node_svg(page: &Page, node: &Node) -> String {
    let rect = page.rect(
        node.center.x - node.width / 2.0 - node.pad,
        node.center.y - node.height / 2.0 - node.pad,
        node.width + 2.0 * node.pad,
        node.height + 2.0 * node.pad,
    );
    rounded_rect_svg(
        rect,
        node.pad * POINTS_PER_UNIT,
        &node.fill,
        &node.stroke,
        node.line_width,
    )
}

fn node_label_svg(page: &Page, node: &Node, theme: &Theme) -> String {
    let (cx, cy) = page.point(node.center);
    let lines: Vec<&str> = node.label_lines().collect();
    text_block_svg(
        cx,
        cy,
        &lines,
        TextStyle {
            font_family: &theme.font_family,
            font_size: node.font_size,
            weight: FontWeight::Bold,
            color: &node.text_color,
            h_align: HAlign::Center,
            v_align: VAlign::Center,
        },
    )
}

fn connector_svg(page: &Page, connector: &Connector) -> String {
    let mut points: Vec<(f32, f32)> = connector
        .points()
        .into_iter()
        .map(|p| page.point(p))
        .collect();
    let headed = connector.has_arrowhead();
    if let ConnectorKind::Straight { .. } = connector.kind {
        points[0] = pull_towards(points[0], points[1], ARROW_SHRINK);
    }
    if headed {
        let last = points.len() - 1;
        points[last] = pull_towards(points[last], points[last - 1], ARROW_SHRINK);
    }

    let dash = match connector.style {
        LineStyle::Solid => String::new(),
        LineStyle::Dashed => format!(
            " stroke-dasharray=\"{:.2} {:.2}\"",
            DASH_ON * connector.line_width,
            DASH_OFF * connector.line_width
        ),
    };
    let mut svg = format!(
        "<path d=\"{}\" fill=\"none\" stroke=\"{}\" stroke-width=\"{}\" stroke-opacity=\"{}\" stroke-linejoin=\"round\"{dash}/>",
        points_to_path(&points),
        connector.color,
        connector.line_width,
        connector.opacity,
    );

    if headed {
        let last = points.len() - 1;
        let head = arrow_head(points[last - 1], points[last]);
        svg.push_str(&format!(
            "<path d=\"{}\" fill=\"none\" stroke=\"{}\" stroke-width=\"{}\" stroke-linejoin=\"miter\"/>",
            points_to_path(&head),
            connector.color,
            connector.line_width,
        ));
    }
    svg
}

fn annotation_svg(page: &Page, annotation: &Annotation, theme: &Theme) -> String {
    let (x, y) = page.point(annotation.at);
    let lines: Vec<&str> = annotation.text.split('\n').collect();
    text_block_svg(
        x,
        y,
        &lines,
        TextStyle {
            font_family: &theme.font_family,
            font_size: annotation.font_size,
            weight: annotation.weight,
            color: &annotation.color,
            h_align: annotation.h_align,
            v_align: annotation.v_align,
        },
    )
}

struct TextStyle<'a> {
    font_family: &'a str,
    font_size: f32,
    weight: FontWeight,
    color: &'a str,
    h_align: HAlign,
    v_align: VAlign,
}

fn text_block_svg(x: f32, y: f32, lines: &[&str], style: TextStyle<'_>) -> String {
    let line_height = style.font_size * LINE_SPACING;
    let (start_y, baseline) = match style.v_align {
        VAlign::Center => (
            y - (lines.len().saturating_sub(1)) as f32 * line_height / 2.0,
            "central",
        ),
        VAlign::Baseline => (y, "alphabetic"),
    };
    let anchor = match style.h_align {
        HAlign::Left => "start",
        HAlign::Center => "middle",
    };
    let weight = match style.weight {
        FontWeight::Normal => "normal",
        FontWeight::Bold => "bold",
    };

    let mut text = String::new();
    text.push_str(&format!(
        "<text x=\"{x:.2}\" y=\"{start_y:.2}\" text-anchor=\"{anchor}\" dominant-baseline=\"{baseline}\" font-family=\"{}\" font-size=\"{}\" font-weight=\"{weight}\" fill=\"{}\">",
        escape_xml(style.font_family),
        style.font_size,
        style.color,
    ));
    for (idx, line) in lines.iter().enumerate() {
        let dy = if idx == 0 { 0.0 } else { line_height };
        text.push_str(&format!(
            "<tspan x=\"{x:.2}\" dy=\"{dy:.2}\">{}</tspan>",
            escape_xml(line)
        ));
    }
    text.push_str("</text>");
    text
}

fn pull_towards(from: (f32, f32), towards: (f32, f32), distance: f32) -> (f32, f32) {
    let dx = towards.0 - from.0;
    let dy = towards.1 - from.1;
    let len = (dx * dx + dy * dy).sqrt();
    if len <= distance {
        return from;
    }
    (from.0 + dx / len * distance, from.1 + dy / len * distance)
}

/// Open chevron whose tip sits at `tip`, pointing away from `tail`.
fn arrow_head(tail: (f32, f32), tip: (f32, f32)) -> Vec<(f32, f32)> {
    let dx = tip.0 - tail.0;
    let dy = tip.1 - tail.1;
    let len = (dx * dx + dy * dy).sqrt().max(f32::EPSILON);
    let (ux, uy) = (dx / len, dy / len);
    let (nx, ny) = (-uy, ux);
    let base = (tip.0 - ux * ARROW_HEAD_LENGTH, tip.1 - uy * ARROW_HEAD_LENGTH);
    vec![
        (
            base.0 + nx * ARROW_HEAD_HALF_WIDTH,
            base.1 + ny * ARROW_HEAD_HALF_WIDTH,
        ),
        tip,
        (
            base.0 - nx * ARROW_HEAD_HALF_WIDTH,
            base.1 - ny * ARROW_HEAD_HALF_WIDTH,
        ),
    ]
}

fn points_to_path(points: &[(f32, f32)]) -> String {
    if points.is_empty() {
        return String::new();
    }
    let mut d = String::new();
    d.push_str(&format!("M {:.2} {:.2}", points[0].0, points[0].1));
    for point in points.iter().skip(1) {
        d.push_str(&format!(" L {:.2} {:.2}", point.0, point.1));
    }
    d
}

fn escape_xml(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

/// Parses `#RGB` or `#RRGGBB`.
pub fn parse_hex_color(value: &str) -> Option<[u8; 3]> {
    let hex = value.strip_prefix('#')?;
    let channel = |s: &str| u8::from_str_radix(s, 16).ok();
    match hex.len() {
        3 => {
            let mut rgb = [0u8; 3];
            for (slot, idx) in rgb.iter_mut().zip(0..3) {
                let v = channel(&hex[idx..idx + 1])?;
                *slot = v * 17;
            }
            Some(rgb)
        }
        6 => Some([
            channel(&hex[0..2])?,
            channel(&hex[2..4])?,
            channel(&hex[4..6])?,
        ]),
        _ => None,
    }
}

pub fn write_output_svg(svg: &str, output: &Path) -> Result<(), RenderError> {
    std::fs::write(output, svg).map_err(|source| RenderError::Write {
        path: output.to_path_buf(),
        source,
    })
}

/// Rasterizes the SVG at `render_cfg.dpi`, scaling from points.
#[cfg(feature = "png")]
pub fn rasterize(svg: &str, render_cfg: &RenderConfig, theme: &Theme) -> Result<Pixmap, RenderError> {
    let mut opt = usvg::Options::default();
    let named = theme.named_families();
    if let Some(last) = named.last() {
        opt.font_family = last.clone();
    }
    let db = opt.fontdb_mut();
    db.load_system_fonts();
    let has_named = named
        .iter()
        .any(|name| db.faces().any(|face| face.families.iter().any(|(f, _)| f == name)));
    if !has_named {
        // Point the generic family at whatever is installed.
        let substitute = db
            .faces()
            .find_map(|face| face.families.first().map(|(name, _)| name.clone()));
        if let Some(name) = substitute {
            log::debug!(family = name.as_str(); "Substituting sans-serif family");
            db.set_sans_serif_family(name);
        }
    }

    let tree = usvg::Tree::from_str(svg, &opt)?;
    let scale = render_cfg.dpi / POINTS_PER_UNIT;
    let size = tree.size();
    let width = (size.width() * scale).ceil() as u32;
    let height = (size.height() * scale).ceil() as u32;
    let mut pixmap = Pixmap::new(width, height).ok_or(RenderError::Allocation { width, height })?;

    resvg::render(
        &tree,
        Transform::from_scale(scale, scale),
        &mut pixmap.as_mut(),
    );
    log::debug!(width = width, height = height, dpi = render_cfg.dpi; "Rasterized diagram");
    Ok(pixmap)
}

/// Crops to the pixels that differ from `background`, keeping `pad_px` of margin.
#[cfg(feature = "png")]
pub fn trim_to_content(
    pixmap: &Pixmap,
    background: [u8; 3],
    pad_px: u32,
) -> Result<Pixmap, RenderError> {
    let width = pixmap.width();
    let mut bounds: Option<(u32, u32, u32, u32)> = None;
    for (idx, px) in pixmap.pixels().iter().enumerate() {
        let color = px.demultiply();
        let is_background = color.alpha() == 255
            && [color.red(), color.green(), color.blue()] == background;
        if is_background {
            continue;
        }
        let x = idx as u32 % width;
        let y = idx as u32 / width;
        bounds = Some(match bounds {
            None => (x, y, x, y),
            Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
        });
    }
    let (x0, y0, x1, y1) = bounds.ok_or(RenderError::EmptyContent)?;

    let left = x0.saturating_sub(pad_px);
    let top = y0.saturating_sub(pad_px);
    let right = x1.saturating_add(1).saturating_add(pad_px).min(width);
    let bottom = y1.saturating_add(1).saturating_add(pad_px).min(pixmap.height());
    let crop_w = right - left;
    let crop_h = bottom - top;
    IntRect::from_xywh(left as i32, top as i32, crop_w, crop_h)
        .and_then(|rect| pixmap.clone_rect(rect))
        .ok_or(RenderError::Allocation {
            width: crop_w,
            height: crop_h,
        })
}

/// Encodes RGBA8 with a pHYs chunk recording `dpi`.
#[cfg(feature = "png")]
pub fn encode_png(pixmap: &Pixmap, dpi: f32) -> Result<Vec<u8>, RenderError> {
    let mut data = Vec::with_capacity(pixmap.pixels().len() * 4);
    for px in pixmap.pixels() {
        let color = px.demultiply();
        data.extend_from_slice(&[color.red(), color.green(), color.blue(), color.alpha()]);
    }

    let ppu = (dpi / METERS_PER_INCH).round() as u32;
    let mut out = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut out, pixmap.width(), pixmap.height());
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        encoder.set_pixel_dims(Some(png::PixelDimensions {
            xppu: ppu,
            yppu: ppu,
            unit: png::Unit::Meter,
        }));
        let mut writer = encoder.write_header()?;
        writer.write_image_data(&data)?;
        writer.finish()?;
    }
    Ok(out)
}

/// Full raster pipeline: rasterize, trim, encode.
#[cfg(feature = "png")]
pub fn render_png(svg: &str, render_cfg: &RenderConfig, theme: &Theme) -> Result<Vec<u8>, RenderError> {
    let background = parse_hex_color(&render_cfg.background)
        .ok_or_else(|| RenderError::InvalidColor(render_cfg.background.clone()))?;
    let pixmap = rasterize(svg, render_cfg, theme)?;
    let pad_px = (render_cfg.pad_inches * render_cfg.dpi).round() as u32;
    let trimmed = trim_to_content(&pixmap, background, pad_px)?;
    log::debug!(
        width = trimmed.width(),
        height = trimmed.height();
        "Trimmed to content"
    );
    encode_png(&trimmed, render_cfg.dpi)
}

/// Encodes fully in memory before touching `output`.
#[cfg(feature = "png")]
pub fn write_output_png(
    svg: &str,
    output: &Path,
    render_cfg: &RenderConfig,
    theme: &Theme,
) -> Result<(), RenderError> {
    let bytes = render_png(svg, render_cfg, theme)?;
    std::fs::write(output, bytes).map_err(|source| RenderError::Write {
        path: output.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::react_workflow;

    fn workflow_svg() -> String {
        let theme = Theme::react();
        let canvas = react_workflow(&theme).unwrap();
        render_svg(&canvas, &theme)
    }

    #[test]
    fn render_svg_basic() {
        let svg = workflow_svg();
        assert!(svg.starts_with("<svg"));
        assert!(svg.ends_with("</svg>"));
        assert!(svg.contains("width=\"1008\" height=\"576\""));
        for label in ["Input", "Thought", "PAUSE", "Observation", "Final Answer", "LLM"] {
            assert!(svg.contains(&format!(">{label}</tspan>")), "missing {label}");
        }
        // Two-line label is split into tspans
        assert!(svg.contains(">Action</tspan><tspan"));
    }

    #[test]
    fn dashed_exit_is_translucent() {
        let svg = workflow_svg();
        assert_eq!(svg.matches("stroke-dasharray=\"7.40 3.20\"").count(), 1);
        assert!(svg.contains("stroke=\"#4CAF50\" stroke-width=\"2\" stroke-opacity=\"0.7\""));
    }

    #[test]
    fn text_is_painted_after_shapes() {
        let svg = workflow_svg();
        let last_rect = svg.rfind("<rect").unwrap();
        let last_path = svg.rfind("<path").unwrap();
        let first_text = svg.find("<text").unwrap();
        assert!(first_text > last_rect);
        assert!(first_text > last_path);
    }

    #[test]
    fn y_axis_is_flipped() {
        let page = Page { height: 8.0 };
        assert_eq!(page.point(Point::new(0.0, 8.0)), (0.0, 0.0));
        assert_eq!(page.point(Point::new(14.0, 0.0)), (1008.0, 576.0));
        assert_eq!(page.rect(0.5, 4.5, 13.0, 3.0), (36.0, 36.0, 936.0, 216.0));
    }

    #[test]
    fn arrow_head_points_along_the_segment() {
        let head = arrow_head((0.0, 0.0), (10.0, 0.0));
        assert_eq!(head[1], (10.0, 0.0));
        assert_eq!(head[0], (2.0, 4.0));
        assert_eq!(head[2], (2.0, -4.0));
    }

    #[test]
    fn pull_towards_keeps_short_segments() {
        assert_eq!(pull_towards((0.0, 0.0), (10.0, 0.0), 2.0), (2.0, 0.0));
        assert_eq!(pull_towards((0.0, 0.0), (1.0, 0.0), 2.0), (0.0, 0.0));
    }

    #[test]
    fn escapes_markup_in_labels() {
        assert_eq!(escape_xml("a<b & 'c'"), "a&lt;b &amp; &apos;c&apos;");
    }

    #[test]
    fn parses_short_and_long_hex() {
        assert_eq!(parse_hex_color("#FFF"), Some([255, 255, 255]));
        assert_eq!(parse_hex_color("#1976D2"), Some([0x19, 0x76, 0xD2]));
        assert_eq!(parse_hex_color("1976D2"), None);
        assert_eq!(parse_hex_color("#12345"), None);
    }

    #[cfg(feature = "png")]
    mod raster {
        use super::*;
        use crate::config::RenderConfig;
        use resvg::tiny_skia::{Color, Paint, Pixmap, Rect, Transform};

        fn white_with_block(size: u32, block: Rect) -> Pixmap {
            let mut pixmap = Pixmap::new(size, size).unwrap();
            pixmap.fill(Color::WHITE);
            let mut paint = Paint::default();
            paint.set_color_rgba8(0, 0, 0, 255);
            pixmap.fill_rect(block, &paint, Transform::identity(), None);
            pixmap
        }

        #[test]
        fn trims_to_content_with_padding() {
            let pixmap = white_with_block(100, Rect::from_xywh(40.0, 30.0, 20.0, 10.0).unwrap());
            let trimmed = trim_to_content(&pixmap, [255, 255, 255], 5).unwrap();
            assert_eq!((trimmed.width(), trimmed.height()), (30, 20));
        }

        #[test]
        fn padding_is_clamped_to_the_image() {
            let pixmap = white_with_block(50, Rect::from_xywh(0.0, 0.0, 10.0, 10.0).unwrap());
            let trimmed = trim_to_content(&pixmap, [255, 255, 255], 8).unwrap();
            assert_eq!((trimmed.width(), trimmed.height()), (18, 18));
        }

        #[test]
        fn oversized_padding_keeps_the_whole_image() {
            let pixmap = white_with_block(40, Rect::from_xywh(10.0, 10.0, 5.0, 5.0).unwrap());
            let trimmed = trim_to_content(&pixmap, [255, 255, 255], u32::MAX).unwrap();
            assert_eq!((trimmed.width(), trimmed.height()), (40, 40));
        }

        #[test]
        fn huge_pad_inches_renders_untrimmed() {
            let theme = Theme::react();
            let render_cfg = RenderConfig {
                dpi: 72.0,
                pad_inches: 1.0e8,
                ..RenderConfig::default()
            };
            let bytes = render_png(&workflow_svg(), &render_cfg, &theme).unwrap();
            let reader = png::Decoder::new(bytes.as_slice()).read_info().unwrap();
            assert_eq!((reader.info().width, reader.info().height), (1008, 576));
        }

        #[test]
        fn blank_image_has_no_content() {
            let mut pixmap = Pixmap::new(10, 10).unwrap();
            pixmap.fill(Color::WHITE);
            assert!(matches!(
                trim_to_content(&pixmap, [255, 255, 255], 0),
                Err(RenderError::EmptyContent)
            ));
        }

        #[test]
        fn encoded_png_records_dpi() {
            let pixmap = white_with_block(16, Rect::from_xywh(4.0, 4.0, 4.0, 4.0).unwrap());
            let bytes = encode_png(&pixmap, 300.0).unwrap();
            let decoder = png::Decoder::new(bytes.as_slice());
            let reader = decoder.read_info().unwrap();
            let info = reader.info();
            assert_eq!((info.width, info.height), (16, 16));
            let dims = info.pixel_dims.unwrap();
            assert_eq!(dims.unit, png::Unit::Meter);
            assert_eq!((dims.xppu, dims.yppu), (11811, 11811));
        }

        #[test]
        fn workflow_rasterizes_at_requested_dpi() {
            let theme = Theme::react();
            let render_cfg = RenderConfig {
                dpi: 72.0,
                ..RenderConfig::default()
            };
            let pixmap = rasterize(&workflow_svg(), &render_cfg, &theme).unwrap();
            assert_eq!((pixmap.width(), pixmap.height()), (1008, 576));
        }
    }
}
