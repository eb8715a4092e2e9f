use serde::Serialize;
use thiserror::Error;

/// Logical width of the canvas, in inches.
pub const CANVAS_WIDTH: f32 = 14.0;
/// Logical height of the canvas, in inches.
pub const CANVAS_HEIGHT: f32 = 8.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LineStyle {
    Solid,
    Dashed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FontWeight {
    Normal,
    Bold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HAlign {
    Left,
    Center,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VAlign {
    Baseline,
    Center,
}

/// Rounded box grouping a set of nodes. Positioned by its lower-left corner.
#[derive(Debug, Clone)]
pub struct Region {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub pad: f32,
    pub fill: String,
    pub stroke: String,
    pub line_width: f32,
}

/// Labelled rounded rectangle. Positioned by its centre.
#[derive(Debug, Clone)]
pub struct Node {
    pub center: Point,
    pub width: f32,
    pub height: f32,
    pub label: String,
    pub font_size: f32,
    pub pad: f32,
    pub fill: String,
    pub stroke: String,
    pub text_color: String,
    pub line_width: f32,
}

impl Node {
    pub fn label_lines(&self) -> impl Iterator<Item = &str> {
        self.label.split('\n')
    }
}

#[derive(Debug, Clone)]
pub enum ConnectorKind {
    /// Two-point arrow, always headed at `to`.
    Straight { from: Point, to: Point },
    Polyline { points: Vec<Point>, arrow_end: bool },
}

#[derive(Debug, Clone)]
pub struct Connector {
    pub kind: ConnectorKind,
    pub color: String,
    pub line_width: f32,
    pub style: LineStyle,
    pub opacity: f32,
}

impl Connector {
    pub fn points(&self) -> Vec<Point> {
        match &self.kind {
            ConnectorKind::Straight { from, to } => vec![*from, *to],
            ConnectorKind::Polyline { points, .. } => points.clone(),
        }
    }

    pub fn has_arrowhead(&self) -> bool {
        match &self.kind {
            ConnectorKind::Straight { .. } => true,
            ConnectorKind::Polyline { arrow_end, .. } => *arrow_end,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Annotation {
    pub at: Point,
    pub text: String,
    pub font_size: f32,
    pub weight: FontWeight,
    pub color: String,
    pub h_align: HAlign,
    pub v_align: VAlign,
}

#[derive(Debug, Clone)]
pub enum Primitive {
    Region(Region),
    Node(Node),
    Connector(Connector),
    Annotation(Annotation),
}

impl Primitive {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Primitive::Region(_) => "region",
            Primitive::Node(_) => "node",
            Primitive::Connector(_) => "connector",
            Primitive::Annotation(_) => "annotation",
        }
    }

    /// Stacking layer: patches first, free-standing lines next, text on top.
    pub fn z_order(&self) -> u8 {
        match self {
            Primitive::Region(_) | Primitive::Node(_) => 1,
            Primitive::Connector(connector) => match connector.kind {
                ConnectorKind::Straight { .. } => 1,
                ConnectorKind::Polyline { .. } => 2,
            },
            Primitive::Annotation(_) => 3,
        }
    }

    /// Points that must fall inside the canvas for this primitive to be valid.
    fn extent_points(&self) -> Vec<Point> {
        match self {
            Primitive::Region(region) => vec![
                Point::new(region.x - region.pad, region.y - region.pad),
                Point::new(
                    region.x + region.width + region.pad,
                    region.y + region.height + region.pad,
                ),
            ],
            Primitive::Node(node) => {
                let half_w = node.width / 2.0 + node.pad;
                let half_h = node.height / 2.0 + node.pad;
                vec![
                    Point::new(node.center.x - half_w, node.center.y - half_h),
                    Point::new(node.center.x + half_w, node.center.y + half_h),
                ]
            }
            Primitive::Connector(connector) => connector.points(),
            Primitive::Annotation(annotation) => vec![annotation.at],
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum CanvasError {
    #[error("{kind} reaches ({x}, {y}), outside the {width}x{height} canvas")]
    OutOfBounds {
        kind: &'static str,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    },
    #[error("polyline needs at least two points, got {0}")]
    DegeneratePolyline(usize),
}

/// Append-only drawing surface with fixed logical bounds.
#[derive(Debug, Clone)]
pub struct Canvas {
    width: f32,
    height: f32,
    primitives: Vec<Primitive>,
}

impl Canvas {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            width,
            height,
            primitives: Vec::new(),
        }
    }

    pub fn width(&self) -> f32 {
        self.width
    }

    pub fn height(&self) -> f32 {
        self.height
    }

    pub fn push(&mut self, primitive: Primitive) -> Result<(), CanvasError> {
        if let Primitive::Connector(Connector {
            kind: ConnectorKind::Polyline { points, .. },
            ..
        }) = &primitive
            && points.len() < 2
        {
            return Err(CanvasError::DegeneratePolyline(points.len()));
        }
        for point in primitive.extent_points() {
            if !self.contains(point) {
                return Err(CanvasError::OutOfBounds {
                    kind: primitive.kind_name(),
                    x: point.x,
                    y: point.y,
                    width: self.width,
                    height: self.height,
                });
            }
        }
        self.primitives.push(primitive);
        Ok(())
    }

    pub fn add_region(&mut self, region: Region) -> Result<(), CanvasError> {
        self.push(Primitive::Region(region))
    }

    pub fn add_node(&mut self, node: Node) -> Result<(), CanvasError> {
        self.push(Primitive::Node(node))
    }

    pub fn add_connector(&mut self, connector: Connector) -> Result<(), CanvasError> {
        self.push(Primitive::Connector(connector))
    }

    pub fn add_annotation(&mut self, annotation: Annotation) -> Result<(), CanvasError> {
        self.push(Primitive::Annotation(annotation))
    }

    /// Primitives in insertion order.
    pub fn primitives(&self) -> &[Primitive] {
        &self.primitives
    }

    /// Primitives in paint order: by layer, then insertion order.
    pub fn paint_order(&self) -> Vec<&Primitive> {
        let mut ordered: Vec<&Primitive> = self.primitives.iter().collect();
        ordered.sort_by_key(|primitive| primitive.z_order());
        ordered
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.primitives.iter().filter_map(|primitive| match primitive {
            Primitive::Node(node) => Some(node),
            _ => None,
        })
    }

    pub fn regions(&self) -> impl Iterator<Item = &Region> {
        self.primitives.iter().filter_map(|primitive| match primitive {
            Primitive::Region(region) => Some(region),
            _ => None,
        })
    }

    pub fn connectors(&self) -> impl Iterator<Item = &Connector> {
        self.primitives.iter().filter_map(|primitive| match primitive {
            Primitive::Connector(connector) => Some(connector),
            _ => None,
        })
    }

    pub fn annotations(&self) -> impl Iterator<Item = &Annotation> {
        self.primitives.iter().filter_map(|primitive| match primitive {
            Primitive::Annotation(annotation) => Some(annotation),
            _ => None,
        })
    }

    fn contains(&self, point: Point) -> bool {
        point.x.is_finite()
            && point.y.is_finite()
            && (0.0..=self.width).contains(&point.x)
            && (0.0..=self.height).contains(&point.y)
    }
}

impl Default for Canvas {
    fn default() -> Self {
        Self::new(CANVAS_WIDTH, CANVAS_HEIGHT)
    }
}
