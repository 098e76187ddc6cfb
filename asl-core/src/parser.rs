//! Depth-first walk over an [`AslDocument`] that turns nodes into catcher
//! calls. Colours, points, curves, pattern references and gradients are
//! recognised by class id and delivered whole; everything else is recursed.

use crate::catcher::ObjectCatcher;
use crate::ir::{AslDocument, Descriptor, Node, Value, INFO_CLASS_ID};
use crate::pattern::PatternTile;
use crate::types::{Color, Curve, Gradient, GradientStop, PatternRef, Point, StopKind};

/// Path and array mode of the container currently being walked.
#[derive(Debug, Clone, Default)]
struct Traversal {
    path: String,
    array_mode: bool,
}

impl Traversal {
    fn child(&self, segment: &str, array_mode: bool) -> Traversal {
        let path = if segment.is_empty() {
            self.path.clone()
        } else {
            format!("{}/{}", self.path, segment)
        };
        Traversal { path, array_mode }
    }
}

pub fn walk_document<C: ObjectCatcher + ?Sized>(doc: &AslDocument, catcher: &mut C) {
    let root = Traversal::default();
    for node in &doc.children {
        walk_node(node, &root, catcher);
    }
}

fn walk_node<C: ObjectCatcher + ?Sized>(node: &Node, parent: &Traversal, catcher: &mut C) {
    let here = parent.child(node.container_name(), parent.array_mode);
    let path = here.path.as_str();
    match &node.value {
        Value::Descriptor(d) => walk_descriptor(node, d, &here, catcher),
        Value::List(items) => {
            let inner = Traversal {
                path: here.path.clone(),
                array_mode: true,
            };
            if !parent.array_mode {
                catcher.set_array_mode(true);
            }
            for item in items {
                walk_node(item, &inner, catcher);
            }
            if !parent.array_mode {
                catcher.set_array_mode(false);
            }
        }
        Value::Double(v) => catcher.add_double(path, *v),
        Value::UnitFloat { unit, value } => catcher.add_unit_float(path, unit, *value),
        Value::Text(s) => catcher.add_text(path, s),
        Value::Enum { type_id, value } => catcher.add_enum(path, type_id, value),
        Value::Integer(v) => catcher.add_integer(path, *v),
        Value::Boolean(v) => catcher.add_boolean(path, *v),
        Value::Pattern(p) => match PatternTile::from_payload(p) {
            Ok(tile) => catcher.add_pattern(path, &tile, &p.uuid),
            Err(e) => log::warn!("dropping pattern {:?} at {:?}: {}", p.uuid, path, e),
        },
    }
}

const COLOR_CLASSES: [&str; 5] = ["RGBC", "HSBC", "CMYC", "LbCl", "Grsc"];

fn walk_descriptor<C: ObjectCatcher + ?Sized>(
    node: &Node,
    d: &Descriptor,
    here: &Traversal,
    catcher: &mut C,
) {
    let path = here.path.as_str();
    match d.class_id.as_str() {
        INFO_CLASS_ID => {
            catcher.new_style_started();
            for child in &d.children {
                walk_node(child, here, catcher);
            }
        }
        class if COLOR_CLASSES.contains(&class) || node.key == "Clr " => {
            catcher.add_color(path, parse_color(d))
        }
        "ShpC" => catcher.add_curve(path, &parse_curve(d)),
        "CrPt" => {
            if here.array_mode {
                catcher.add_point(path, parse_point(d));
            } else {
                log::warn!("curve point outside a list at {:?}", path);
            }
        }
        "Pnt " => catcher.add_point(path, parse_point(d)),
        "Ptrn" => match parse_pattern_ref(d) {
            Some(pattern) => catcher.add_pattern_ref(path, &pattern),
            None => log::warn!("pattern reference without an id at {:?}", path),
        },
        "Grdn" => {
            if let Some(gradient) = parse_gradient(d) {
                catcher.add_gradient(path, &gradient);
            }
        }
        _ => {
            for child in &d.children {
                walk_node(child, here, catcher);
            }
        }
    }
}

fn number(d: &Descriptor, key: &str) -> Option<f64> {
    match d.child(key)? {
        Value::Double(v) => Some(*v),
        Value::UnitFloat { value, .. } => Some(*value),
        Value::Integer(v) => Some(*v as f64),
        _ => None,
    }
}

fn text(d: &Descriptor, key: &str) -> Option<String> {
    match d.child(key)? {
        Value::Text(s) => Some(s.clone()),
        _ => None,
    }
}

fn enum_value<'a>(d: &'a Descriptor, key: &str) -> Option<&'a str> {
    match d.child(key)? {
        Value::Enum { value, .. } => Some(value),
        _ => None,
    }
}

pub fn parse_color(d: &Descriptor) -> Color {
    let n = |key| number(d, key).unwrap_or(0.0);
    match d.class_id.as_str() {
        "RGBC" => {
            if d.child("redFloat").is_some() {
                Color::from_f64(
                    n("redFloat") * 255.0,
                    n("greenFloat") * 255.0,
                    n("blueFloat") * 255.0,
                )
            } else {
                Color::from_f64(n("Rd  "), n("Grn "), n("Bl  "))
            }
        }
        "HSBC" => hsb_to_rgb(n("H   "), n("Strt"), n("Brgh")),
        "CMYC" => {
            let k = 1.0 - n("Blck") / 100.0;
            Color::from_f64(
                255.0 * (1.0 - n("Cyn ") / 100.0) * k,
                255.0 * (1.0 - n("Mgnt") / 100.0) * k,
                255.0 * (1.0 - n("Ylw ") / 100.0) * k,
            )
        }
        "LbCl" => lab_to_rgb(n("Lmnc"), n("A   "), n("B   ")),
        "Grsc" => {
            let v = 255.0 * (1.0 - n("Gry ") / 100.0);
            Color::from_f64(v, v, v)
        }
        other => {
            log::warn!("unsupported colour model {:?}, using red", other);
            Color::RED
        }
    }
}

fn hsb_to_rgb(hue: f64, saturation: f64, brightness: f64) -> Color {
    let s = (saturation / 100.0).clamp(0.0, 1.0);
    let v = (brightness / 100.0).clamp(0.0, 1.0);
    let h = hue.rem_euclid(360.0) / 60.0;
    let c = v * s;
    let x = c * (1.0 - (h % 2.0 - 1.0).abs());
    let (r, g, b) = match h as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    let m = v - c;
    Color::from_f64((r + m) * 255.0, (g + m) * 255.0, (b + m) * 255.0)
}

fn lab_to_rgb(l: f64, a: f64, b: f64) -> Color {
    // CIE L*a*b* (D65) to sRGB.
    let fy = (l + 16.0) / 116.0;
    let fx = fy + a / 500.0;
    let fz = fy - b / 200.0;
    let inv = |t: f64| {
        if t.powi(3) > 0.008856 {
            t.powi(3)
        } else {
            (t - 16.0 / 116.0) / 7.787
        }
    };
    let (x, y, z) = (0.95047 * inv(fx), inv(fy), 1.08883 * inv(fz));
    let linear = [
        3.2406 * x - 1.5372 * y - 0.4986 * z,
        -0.9689 * x + 1.8758 * y + 0.0415 * z,
        0.0557 * x - 0.2040 * y + 1.0570 * z,
    ];
    let gamma = |c: f64| {
        let c = c.clamp(0.0, 1.0);
        let v = if c <= 0.0031308 {
            12.92 * c
        } else {
            1.055 * c.powf(1.0 / 2.4) - 0.055
        };
        v * 255.0
    };
    Color::from_f64(gamma(linear[0]), gamma(linear[1]), gamma(linear[2]))
}

pub fn parse_point(d: &Descriptor) -> Point {
    Point::new(
        number(d, "Hrzn").unwrap_or(0.0),
        number(d, "Vrtc").unwrap_or(0.0),
    )
}

pub fn parse_curve(d: &Descriptor) -> Curve {
    let mut points = Vec::new();
    if let Some(Value::List(items)) = d.child("Crv ") {
        for item in items {
            let Value::Descriptor(point) = &item.value else {
                log::warn!("unexpected {} in a curve", item.value.type_name());
                continue;
            };
            if point.child("Cnty").is_some() {
                log::warn!("curve point continuity flag is not supported, ignoring it");
            }
            points.push(parse_point(point));
        }
    }
    Curve {
        name: text(d, "Nm  ").unwrap_or_default(),
        points,
    }
}

pub fn parse_pattern_ref(d: &Descriptor) -> Option<PatternRef> {
    Some(PatternRef {
        name: text(d, "Nm  ").unwrap_or_default(),
        uuid: text(d, "Idnt")?,
    })
}

fn list_descriptors<'a>(d: &'a Descriptor, key: &str) -> Vec<&'a Descriptor> {
    match d.child(key) {
        Some(Value::List(items)) => items
            .iter()
            .filter_map(|n| match &n.value {
                Value::Descriptor(d) => Some(d),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// Reads a custom (`CstS`) gradient. Colour and transparency stops are paired
/// by index; the shorter list is padded with its last entry.
pub fn parse_gradient(d: &Descriptor) -> Option<Gradient> {
    let name = text(d, "Nm  ").unwrap_or_default();
    let form = enum_value(d, "GrdF").unwrap_or("CstS");
    if form != "CstS" {
        log::warn!("gradient {:?} of form {:?} is not supported, skipping it", name, form);
        return None;
    }

    let colors: Vec<(f64, f64, Color, StopKind)> = list_descriptors(d, "Clrs")
        .into_iter()
        .map(|stop| {
            let kind = match enum_value(stop, "Type") {
                None => StopKind::User,
                Some(code) => StopKind::from_code(code).unwrap_or_else(|| {
                    log::warn!("unknown gradient stop type {:?}", code);
                    StopKind::User
                }),
            };
            let color = match stop.child("Clr ") {
                Some(Value::Descriptor(c)) => parse_color(c),
                _ if kind == StopKind::Background => Color::WHITE,
                _ => Color::BLACK,
            };
            (
                number(stop, "Lctn").unwrap_or(0.0) / 4096.0,
                number(stop, "Mdpn").unwrap_or(50.0) / 100.0,
                color,
                kind,
            )
        })
        .collect();
    let opacities: Vec<f64> = list_descriptors(d, "Trns")
        .into_iter()
        .map(|stop| number(stop, "Opct").unwrap_or(100.0) / 100.0)
        .collect();

    if colors.is_empty() {
        log::warn!("gradient {:?} has no colour stops, skipping it", name);
        return None;
    }
    if !opacities.is_empty() && opacities.len() != colors.len() {
        log::warn!(
            "gradient {:?} has {} colour stops and {} transparency stops",
            name,
            colors.len(),
            opacities.len()
        );
    }

    let count = colors.len().max(opacities.len());
    let mut stops: Vec<GradientStop> = (0..count)
        .map(|i| {
            let (location, midpoint, color, kind) = colors[i.min(colors.len() - 1)];
            let opacity = opacities
                .get(i.min(opacities.len().saturating_sub(1)))
                .copied()
                .unwrap_or(1.0);
            GradientStop {
                location,
                midpoint,
                color,
                kind,
                opacity,
            }
        })
        .collect();
    if stops.len() == 1 {
        let mut last = stops[0];
        last.location = 1.0;
        stops.push(last);
    }

    Some(Gradient {
        name,
        interpolation: number(d, "Intr").unwrap_or(4096.0),
        stops,
    })
}
