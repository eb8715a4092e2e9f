use crate::ir::{Canvas, ConnectorKind, FontWeight, HAlign, LineStyle, Primitive, VAlign};
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

#[derive(Debug, Serialize)]
pub struct SceneDump {
    pub width: f32,
    pub height: f32,
    pub regions: Vec<RegionDump>,
    pub nodes: Vec<NodeDump>,
    pub connectors: Vec<ConnectorDump>,
    pub annotations: Vec<AnnotationDump>,
}

#[derive(Debug, Serialize)]
pub struct RegionDump {
    pub order: usize,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub fill: String,
    pub stroke: String,
}

#[derive(Debug, Serialize)]
pub struct NodeDump {
    pub order: usize,
    pub label_lines: Vec<String>,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub fill: String,
}

#[derive(Debug, Serialize)]
pub struct ConnectorDump {
    pub order: usize,
    pub kind: &'static str,
    pub points: Vec<[f32; 2]>,
    pub arrow_end: bool,
    pub style: LineStyle,
    pub color: String,
    pub opacity: f32,
}

#[derive(Debug, Serialize)]
pub struct AnnotationDump {
    pub order: usize,
    pub text: String,
    pub x: f32,
    pub y: f32,
    pub font_size: f32,
    pub weight: FontWeight,
    pub h_align: HAlign,
    pub v_align: VAlign,
    pub color: String,
}

impl SceneDump {
    pub fn from_canvas(canvas: &Canvas) -> Self {
        let mut dump = SceneDump {
            width: canvas.width(),
            height: canvas.height(),
            regions: Vec::new(),
            nodes: Vec::new(),
            connectors: Vec::new(),
            annotations: Vec::new(),
        };

        for (order, primitive) in canvas.primitives().iter().enumerate() {
            match primitive {
                Primitive::Region(region) => dump.regions.push(RegionDump {
                    order,
                    x: region.x,
                    y: region.y,
                    width: region.width,
                    height: region.height,
                    fill: region.fill.clone(),
                    stroke: region.stroke.clone(),
                }),
                Primitive::Node(node) => dump.nodes.push(NodeDump {
                    order,
                    label_lines: node.label_lines().map(str::to_string).collect(),
                    x: node.center.x,
                    y: node.center.y,
                    width: node.width,
                    height: node.height,
                    fill: node.fill.clone(),
                }),
                Primitive::Connector(connector) => dump.connectors.push(ConnectorDump {
                    order,
                    kind: match connector.kind {
                        ConnectorKind::Straight { .. } => "straight",
                        ConnectorKind::Polyline { .. } => "polyline",
                    },
                    points: connector.points().iter().map(|p| [p.x, p.y]).collect(),
                    arrow_end: connector.has_arrowhead(),
                    style: connector.style,
                    color: connector.color.clone(),
                    opacity: connector.opacity,
                }),
                Primitive::Annotation(annotation) => dump.annotations.push(AnnotationDump {
                    order,
                    text: annotation.text.clone(),
                    x: annotation.at.x,
                    y: annotation.at.y,
                    font_size: annotation.font_size,
                    weight: annotation.weight,
                    h_align: annotation.h_align,
                    v_align: annotation.v_align,
                    color: annotation.color.clone(),
                }),
            }
        }
        dump
    }
}

pub fn write_scene_dump(path: &Path, canvas: &Canvas) -> anyhow::Result<()> {
    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    let dump = SceneDump::from_canvas(canvas);
    serde_json::to_writer_pretty(writer, &dump)?;
    Ok(())
}
