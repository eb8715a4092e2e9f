//! Fixed placement of the ReAct agent loop figure.
//!
//! Every coordinate below is a literal in canvas units (inches, y up). The
//! loop-back and exit connectors are hand-routed polylines.

use crate::ir::{
    Annotation, Canvas, CanvasError, Connector, ConnectorKind, FontWeight, HAlign, LineStyle,
    Node, Point, Region, VAlign,
};
use crate::theme::Theme;

const REGION_PAD: f32 = 0.1;
const REGION_LINE_WIDTH: f32 = 2.0;
const NODE_PAD: f32 = 0.05;
const NODE_LINE_WIDTH: f32 = 1.5;
const NODE_FONT_SIZE: f32 = 11.0;
const NODE_HEIGHT: f32 = 0.8;
const CONNECTOR_WIDTH: f32 = 2.0;
const TITLE_FONT_SIZE: f32 = 14.0;
const EXIT_OPACITY: f32 = 0.7;

pub const REGION_TITLES: [&str; 2] = ["LLM", "Human / Execution Environment"];

/// Builds the complete ReAct workflow canvas.
pub fn react_workflow(theme: &Theme) -> Result<Canvas, CanvasError> {
    let mut canvas = Canvas::default();

    // Grouping regions and their titles
    canvas.add_region(region(0.5, 4.5, 13.0, 3.0, &theme.llm_background, &theme.llm_border))?;
    canvas.add_annotation(title(7.0, 7.3, REGION_TITLES[0], theme))?;
    canvas.add_region(region(0.5, 0.5, 13.0, 3.5, &theme.env_background, &theme.env_border))?;
    canvas.add_annotation(title(7.0, 3.7, REGION_TITLES[1], theme))?;

    // LLM layer
    canvas.add_node(node(1.5, 6.5, 1.5, "Input", &theme.thought, theme))?;
    canvas.add_node(node(3.5, 6.5, 1.5, "Thought", &theme.thought, theme))?;
    canvas.add_node(node(6.0, 6.5, 1.5, "Action", &theme.action, theme))?;
    canvas.add_node(node(8.5, 6.5, 1.8, "Action\nInput", &theme.action, theme))?;
    canvas.add_node(node(11.5, 6.5, 1.5, "PAUSE", &theme.pause, theme))?;

    // Execution environment
    canvas.add_node(node(11.5, 2.5, 1.8, "Tool Execution", &theme.tool, theme))?;
    canvas.add_node(node(8.5, 2.5, 2.0, "Observation", &theme.observation, theme))?;
    canvas.add_node(node(3.5, 1.2, 2.2, "Final Answer", &theme.final_answer, theme))?;

    canvas.add_connector(arrow((2.25, 6.5), (2.75, 6.5), &theme.line_color))?;
    canvas.add_connector(arrow((4.25, 6.5), (5.25, 6.5), &theme.line_color))?;
    canvas.add_connector(arrow((6.75, 6.5), (7.6, 6.5), &theme.line_color))?;
    canvas.add_connector(arrow((9.4, 6.5), (10.75, 6.5), &theme.line_color))?;

    // PAUSE hands off to the environment, which reports back
    canvas.add_connector(arrow((11.5, 6.1), (11.5, 2.9), &theme.env_border))?;
    canvas.add_connector(arrow((10.6, 2.5), (9.5, 2.5), &theme.env_border))?;

    // Observation loops back to Thought: down, left, then up
    canvas.add_connector(Connector {
        kind: ConnectorKind::Polyline {
            points: vec![
                Point::new(8.5, 2.1),
                Point::new(8.5, 1.5),
                Point::new(3.5, 1.5),
                Point::new(3.5, 4.0),
                Point::new(3.5, 6.1),
            ],
            arrow_end: true,
        },
        color: theme.llm_border.clone(),
        line_width: CONNECTOR_WIDTH,
        style: LineStyle::Solid,
        opacity: 1.0,
    })?;

    // Conditional exit from Thought to Final Answer
    canvas.add_connector(Connector {
        kind: ConnectorKind::Polyline {
            points: vec![Point::new(3.5, 6.1), Point::new(3.5, 1.6)],
            arrow_end: true,
        },
        color: theme.exit_color.clone(),
        line_width: CONNECTOR_WIDTH,
        style: LineStyle::Dashed,
        opacity: EXIT_OPACITY,
    })?;

    canvas.add_annotation(marker(12.5, 4.3, "①", 16.0, &theme.env_border))?;
    canvas.add_annotation(marker(10.0, 2.8, "②", 16.0, &theme.env_border))?;
    canvas.add_annotation(marker(6.0, 1.5, "③ Loop", 12.0, &theme.llm_border))?;
    canvas.add_annotation(marker(4.5, 4.0, "④ Done", 12.0, &theme.exit_color))?;

    Ok(canvas)
}

fn region(x: f32, y: f32, width: f32, height: f32, fill: &str, stroke: &str) -> Region {
    Region {
        x,
        y,
        width,
        height,
        pad: REGION_PAD,
        fill: fill.to_string(),
        stroke: stroke.to_string(),
        line_width: REGION_LINE_WIDTH,
    }
}

fn node(x: f32, y: f32, width: f32, label: &str, fill: &str, theme: &Theme) -> Node {
    Node {
        center: Point::new(x, y),
        width,
        height: NODE_HEIGHT,
        label: label.to_string(),
        font_size: NODE_FONT_SIZE,
        pad: NODE_PAD,
        fill: fill.to_string(),
        stroke: theme.node_border.clone(),
        text_color: theme.text_color.clone(),
        line_width: NODE_LINE_WIDTH,
    }
}

fn arrow(from: (f32, f32), to: (f32, f32), color: &str) -> Connector {
    Connector {
        kind: ConnectorKind::Straight {
            from: Point::new(from.0, from.1),
            to: Point::new(to.0, to.1),
        },
        color: color.to_string(),
        line_width: CONNECTOR_WIDTH,
        style: LineStyle::Solid,
        opacity: 1.0,
    }
}

fn title(x: f32, y: f32, text: &str, theme: &Theme) -> Annotation {
    Annotation {
        at: Point::new(x, y),
        text: text.to_string(),
        font_size: TITLE_FONT_SIZE,
        weight: FontWeight::Bold,
        color: theme.text_color.clone(),
        h_align: HAlign::Center,
        v_align: VAlign::Baseline,
    }
}

fn marker(x: f32, y: f32, text: &str, font_size: f32, color: &str) -> Annotation {
    Annotation {
        at: Point::new(x, y),
        text: text.to_string(),
        font_size,
        weight: FontWeight::Bold,
        color: color.to_string(),
        h_align: HAlign::Left,
        v_align: VAlign::Baseline,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{CANVAS_HEIGHT, CANVAS_WIDTH};

    #[test]
    fn builds_every_stage_once() {
        let canvas = react_workflow(&Theme::react()).unwrap();
        let labels: Vec<&str> = canvas.nodes().map(|node| node.label.as_str()).collect();
        assert_eq!(
            labels,
            vec![
                "Input",
                "Thought",
                "Action",
                "Action\nInput",
                "PAUSE",
                "Tool Execution",
                "Observation",
                "Final Answer",
            ]
        );
        assert_eq!(canvas.regions().count(), 2);
        assert_eq!(canvas.connectors().count(), 8);
        assert_eq!(canvas.annotations().count(), 6);
    }

    #[test]
    fn loop_back_and_exit_are_headed_polylines() {
        let canvas = react_workflow(&Theme::react()).unwrap();
        let polylines: Vec<&Connector> = canvas
            .connectors()
            .filter(|c| matches!(c.kind, ConnectorKind::Polyline { .. }))
            .collect();
        assert_eq!(polylines.len(), 2);
        assert!(polylines.iter().all(|c| c.has_arrowhead()));

        let loop_back = polylines[0].points();
        assert_eq!(loop_back.first(), Some(&Point::new(8.5, 2.1)));
        assert_eq!(loop_back.last(), Some(&Point::new(3.5, 6.1)));

        let exit = polylines[1];
        assert_eq!(exit.style, LineStyle::Dashed);
        assert_eq!(exit.color, "#4CAF50");
        assert!(exit.opacity < 1.0);
    }

    #[test]
    fn stages_are_colour_coded_from_the_theme() {
        let mut theme = Theme::react();
        theme.pause = "#FF0000".to_string();
        let canvas = react_workflow(&theme).unwrap();
        let pause = canvas.nodes().find(|node| node.label == "PAUSE").unwrap();
        assert_eq!(pause.fill, "#FF0000");
        let input = canvas.nodes().find(|node| node.label == "Input").unwrap();
        assert_eq!(input.fill, theme.thought);
    }

    #[test]
    fn everything_stays_inside_the_logical_bounds() {
        let canvas = react_workflow(&Theme::react()).unwrap();
        assert_eq!(canvas.width(), CANVAS_WIDTH);
        assert_eq!(canvas.height(), CANVAS_HEIGHT);
        for connector in canvas.connectors() {
            for point in connector.points() {
                assert!(point.x > 0.0 && point.x < CANVAS_WIDTH);
                assert!(point.y > 0.0 && point.y < CANVAS_HEIGHT);
            }
        }
    }
}
