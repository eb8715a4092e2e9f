//! Font resolution and label measurement against the system font database.
//!
//! The rasterizer substitutes missing fonts on its own; this module only
//! detects when that is going to happen so it can be reported.
//!
//! The measurer keeps its own `fontdb` database: usvg builds against a
//! different `fontdb` major version, so the rasterizer's database type is not
//! interchangeable with this one.

use crate::ir::{Canvas, FontWeight};
use crate::theme::{is_generic_family, split_families};
use fontdb::{Database, Family, Query, Stretch, Style, Weight};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;
use ttf_parser::Face;

static TEXT_MEASURER: Lazy<Mutex<TextMeasurer>> = Lazy::new(|| Mutex::new(TextMeasurer::new()));

/// Points per canvas unit.
const POINTS_PER_UNIT: f32 = 72.0;

pub fn measure_text_width(
    text: &str,
    font_size: f32,
    font_family: &str,
    weight: FontWeight,
) -> Option<f32> {
    if text.is_empty() || font_size <= 0.0 {
        return Some(0.0);
    }
    let mut guard = TEXT_MEASURER.lock().ok()?;
    let face = guard.face(font_family, weight)?;
    face.measure_width(text, font_size)
}

/// Characters of `text` the face chosen for `font_family` cannot draw.
pub fn missing_glyphs(text: &str, font_family: &str, weight: FontWeight) -> Option<Vec<char>> {
    let mut guard = TEXT_MEASURER.lock().ok()?;
    let face = guard.face(font_family, weight)?;
    let parsed = face.parse()?;
    Some(uncovered_chars(text, |ch| parsed.glyph_index(ch).is_some()))
}

/// Distinct non-whitespace characters of `text` failing `has_glyph`, sorted.
fn uncovered_chars(text: &str, has_glyph: impl Fn(char) -> bool) -> Vec<char> {
    let mut missing: Vec<char> = text
        .chars()
        .filter(|ch| !ch.is_whitespace() && !has_glyph(*ch))
        .collect();
    missing.sort_unstable();
    missing.dedup();
    missing
}

/// First named family of `font_family` present on the system.
pub fn resolve_named_family(font_family: &str) -> Option<String> {
    let mut guard = TEXT_MEASURER.lock().ok()?;
    guard.ensure_system_fonts();
    split_families(font_family)
        .into_iter()
        .filter(|name| !is_generic_family(name))
        .find(|name| {
            let families = [Family::Name(name.as_str())];
            guard.db.query(&query(&families, Weight::NORMAL)).is_some()
        })
}

#[derive(Debug, Clone, PartialEq)]
pub enum FontIssue {
    NoPreferredFamily { requested: String },
    MissingGlyphs { text: String, glyphs: Vec<char> },
    LabelOverflow { label: String, text_width: f32, box_width: f32 },
}

impl fmt::Display for FontIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FontIssue::NoPreferredFamily { requested } => {
                write!(f, "none of the fonts [{requested}] are installed; a fallback will be used")
            }
            FontIssue::MissingGlyphs { text, glyphs } => {
                let glyphs: String = glyphs.iter().collect();
                write!(f, "font has no glyphs for {glyphs:?} in {text:?}")
            }
            FontIssue::LabelOverflow {
                label,
                text_width,
                box_width,
            } => write!(
                f,
                "label {label:?} is {text_width:.1}pt wide but its node is {box_width:.1}pt"
            ),
        }
    }
}

/// Checks every piece of text on the canvas against the installed fonts.
///
/// When no face loads at all, only the missing-family issue is reported since
/// nothing can be measured.
pub fn audit_canvas(canvas: &Canvas, font_family: &str) -> Vec<FontIssue> {
    let mut issues = Vec::new();
    if resolve_named_family(font_family).is_none() {
        issues.push(FontIssue::NoPreferredFamily {
            requested: font_family.to_string(),
        });
    }

    let mut texts: Vec<(&str, FontWeight)> = Vec::new();
    for node in canvas.nodes() {
        texts.extend(node.label_lines().map(|line| (line, FontWeight::Bold)));
        let widest = node
            .label_lines()
            .filter_map(|line| measure_text_width(line, node.font_size, font_family, FontWeight::Bold))
            .fold(0.0f32, f32::max);
        let box_width = (node.width + 2.0 * node.pad) * POINTS_PER_UNIT;
        if widest > box_width {
            issues.push(FontIssue::LabelOverflow {
                label: node.label.clone(),
                text_width: widest,
                box_width,
            });
        }
    }
    for annotation in canvas.annotations() {
        texts.push((annotation.text.as_str(), annotation.weight));
    }

    for (text, weight) in texts {
        if let Some(glyphs) = missing_glyphs(text, font_family, weight)
            && !glyphs.is_empty()
        {
            issues.push(FontIssue::MissingGlyphs {
                text: text.to_string(),
                glyphs,
            });
        }
    }
    issues
}

fn query<'a>(families: &'a [Family<'a>], weight: Weight) -> Query<'a> {
    Query {
        families,
        weight,
        stretch: Stretch::Normal,
        style: Style::Normal,
    }
}

struct TextMeasurer {
    db: Database,
    loaded_system_fonts: bool,
    cache: HashMap<(String, u16), Option<FontFace>>,
}

impl TextMeasurer {
    fn new() -> Self {
        Self {
            db: Database::new(),
            loaded_system_fonts: false,
            cache: HashMap::new(),
        }
    }

    fn ensure_system_fonts(&mut self) {
        if !self.loaded_system_fonts {
            self.db.load_system_fonts();
            self.loaded_system_fonts = true;
            log::debug!(faces = self.db.len(); "Loaded system fonts");
        }
    }

    fn face(&mut self, font_family: &str, weight: FontWeight) -> Option<&mut FontFace> {
        let weight = match weight {
            FontWeight::Normal => Weight::NORMAL,
            FontWeight::Bold => Weight::BOLD,
        };
        let key = (font_family.trim().to_string(), weight.0);
        if !self.cache.contains_key(&key) {
            let face = self.load_face(font_family, weight);
            self.cache.insert(key.clone(), face);
        }
        self.cache.get_mut(&key).and_then(|face| face.as_mut())
    }

    fn load_face(&mut self, font_family: &str, weight: Weight) -> Option<FontFace> {
        self.ensure_system_fonts();

        let names = split_families(font_family);
        let mut families: Vec<Family<'_>> = names
            .iter()
            .map(|name| match name.to_ascii_lowercase().as_str() {
                "serif" => Family::Serif,
                "sans-serif" | "system-ui" => Family::SansSerif,
                "monospace" => Family::Monospace,
                "cursive" => Family::Cursive,
                "fantasy" => Family::Fantasy,
                _ => Family::Name(name.as_str()),
            })
            .collect();
        if families.is_empty() {
            families.push(Family::SansSerif);
        }

        let id = self.db.query(&query(&families, weight))?;
        let mut loaded = None;
        self.db.with_face_data(id, |data, index| {
            if let Ok(face) = Face::parse(data, index) {
                let units_per_em = face.units_per_em().max(1);
                loaded = Some(FontFace::new(data.to_vec(), index, units_per_em));
            }
        });
        loaded
    }
}

struct FontFace {
    data: Vec<u8>,
    index: u32,
    units_per_em: u16,
    advance_cache: HashMap<char, Option<u16>>,
}

impl FontFace {
    fn new(data: Vec<u8>, index: u32, units_per_em: u16) -> Self {
        Self {
            data,
            index,
            units_per_em,
            advance_cache: HashMap::new(),
        }
    }

    fn parse(&self) -> Option<Face<'_>> {
        Face::parse(&self.data, self.index).ok()
    }

    fn measure_width(&mut self, text: &str, font_size: f32) -> Option<f32> {
        let scale = font_size / self.units_per_em as f32;
        let fallback = font_size * 0.56;
        let face = Face::parse(&self.data, self.index).ok()?;

        let mut width = 0.0f32;
        for ch in text.chars() {
            if ch == '\n' {
                continue;
            }
            let advance = *self.advance_cache.entry(ch).or_insert_with(|| {
                face.glyph_index(ch)
                    .and_then(|glyph| face.glyph_hor_advance(glyph))
            });
            width += match advance {
                Some(advance) if advance > 0 => advance as f32 * scale,
                _ => fallback,
            };
        }
        Some(width.max(0.0))
    }
}
