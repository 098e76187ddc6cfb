use crate::error::{WriteError, WriteResult};
use crate::ir::{AslDocument, Descriptor, Node, Unit, Value};
use crate::pattern::PatternTile;
use crate::types::{Color, Curve, Gradient, PatternRef, Point};

enum Frame {
    Descriptor { key: String, descriptor: Descriptor },
    List { key: String, items: Vec<Node> },
}

/// Assembles an [`AslDocument`] through nested enter/leave calls, in the order
/// the nodes appear in the stream.
///
/// Misuse (unbalanced calls, leaves outside any container) is remembered and
/// reported by [`AslBuilder::finish`].
#[derive(Default)]
pub struct AslBuilder {
    root: Vec<Node>,
    stack: Vec<Frame>,
    error: Option<String>,
}

impl AslBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn fail(&mut self, message: String) {
        if self.error.is_none() {
            self.error = Some(message);
        }
    }

    fn push(&mut self, key: &str, value: Value) {
        if let Some(frame) = self.stack.last_mut() {
            match frame {
                Frame::Descriptor { descriptor, .. } => descriptor.children.push(Node::new(key, value)),
                Frame::List { items, .. } => items.push(Node::new("", value)),
            }
            return;
        }
        match value {
            Value::Descriptor(_) | Value::List(_) => self.root.push(Node::new(key, value)),
            other => self.fail(format!(
                "{} {:?} written outside any container",
                other.type_name(),
                key
            )),
        }
    }

    pub fn enter_descriptor(&mut self, key: &str, name: &str, class_id: &str) {
        self.stack.push(Frame::Descriptor {
            key: key.to_string(),
            descriptor: Descriptor::new(name, class_id),
        });
    }

    pub fn leave_descriptor(&mut self) {
        match self.stack.pop() {
            Some(Frame::Descriptor { key, descriptor }) => self.push(&key, Value::Descriptor(descriptor)),
            Some(frame @ Frame::List { .. }) => {
                self.stack.push(frame);
                self.fail("leave_descriptor inside a list".to_string());
            }
            None => self.fail("leave_descriptor without a matching enter".to_string()),
        }
    }

    pub fn enter_list(&mut self, key: &str) {
        self.stack.push(Frame::List {
            key: key.to_string(),
            items: Vec::new(),
        });
    }

    pub fn leave_list(&mut self) {
        match self.stack.pop() {
            Some(Frame::List { key, items }) => self.push(&key, Value::List(items)),
            Some(frame @ Frame::Descriptor { .. }) => {
                self.stack.push(frame);
                self.fail("leave_list inside a descriptor".to_string());
            }
            None => self.fail("leave_list without a matching enter".to_string()),
        }
    }

    pub fn write_double(&mut self, key: &str, value: f64) {
        self.push(key, Value::Double(value));
    }

    pub fn write_integer(&mut self, key: &str, value: i32) {
        self.push(key, Value::Integer(value));
    }

    pub fn write_boolean(&mut self, key: &str, value: bool) {
        self.push(key, Value::Boolean(value));
    }

    pub fn write_text(&mut self, key: &str, value: &str) {
        self.push(key, Value::Text(value.to_string()));
    }

    pub fn write_enum(&mut self, key: &str, type_id: &str, value: &str) {
        self.push(
            key,
            Value::Enum {
                type_id: type_id.to_string(),
                value: value.to_string(),
            },
        );
    }

    pub fn write_unit_float(&mut self, key: &str, unit: Unit, value: f64) {
        self.push(key, Value::UnitFloat { unit, value });
    }

    pub fn write_color(&mut self, key: &str, color: Color) {
        self.enter_descriptor(key, "", "RGBC");
        self.write_double("Rd  ", color.red as f64);
        self.write_double("Grn ", color.green as f64);
        self.write_double("Bl  ", color.blue as f64);
        self.leave_descriptor();
    }

    /// A curve point (`CrPt`).
    pub fn write_point(&mut self, key: &str, point: Point) {
        self.enter_descriptor(key, "", "CrPt");
        self.write_double("Hrzn", point.x);
        self.write_double("Vrtc", point.y);
        self.leave_descriptor();
    }

    /// A pattern phase, in pixels.
    pub fn write_phase_point(&mut self, key: &str, point: Point) {
        self.enter_descriptor(key, "", "Pnt ");
        self.write_double("Hrzn", point.x);
        self.write_double("Vrtc", point.y);
        self.leave_descriptor();
    }

    /// A gradient offset, in percent.
    pub fn write_offset_point(&mut self, key: &str, point: Point) {
        self.enter_descriptor(key, "", "Pnt ");
        self.write_unit_float("Hrzn", Unit::Percent, point.x);
        self.write_unit_float("Vrtc", Unit::Percent, point.y);
        self.leave_descriptor();
    }

    pub fn write_curve(&mut self, key: &str, curve: &Curve) {
        self.enter_descriptor(key, "", "ShpC");
        self.write_text("Nm  ", &curve.name);
        self.enter_list("Crv ");
        for point in &curve.points {
            self.write_point("", *point);
        }
        self.leave_list();
        self.leave_descriptor();
    }

    /// Embeds a tile under an identifier derived from its contents and returns it.
    pub fn write_pattern(&mut self, key: &str, tile: &PatternTile) -> String {
        let uuid = tile.content_uuid();
        self.write_pattern_with_uuid(key, &uuid, tile);
        uuid
    }

    pub fn write_pattern_with_uuid(&mut self, key: &str, uuid: &str, tile: &PatternTile) {
        self.push(key, Value::Pattern(tile.to_payload(uuid)));
    }

    pub fn write_pattern_ref(&mut self, key: &str, pattern: &PatternRef) {
        self.enter_descriptor(key, "", "Ptrn");
        self.write_text("Nm  ", &pattern.name);
        self.write_text("Idnt", &pattern.uuid);
        self.leave_descriptor();
    }

    pub fn write_gradient(&mut self, key: &str, gradient: &Gradient) {
        self.enter_descriptor(key, "Gradient", "Grdn");
        self.write_text("Nm  ", &gradient.name);
        self.write_enum("GrdF", "GrdF", "CstS");
        self.write_double("Intr", gradient.interpolation);

        self.enter_list("Clrs");
        for stop in &gradient.stops {
            self.enter_descriptor("", "", "Clrt");
            self.write_color("Clr ", stop.color);
            self.write_enum("Type", "Clry", stop.kind.code());
            self.write_integer("Lctn", (stop.location * 4096.0).round() as i32);
            self.write_integer("Mdpn", (stop.midpoint * 100.0).round() as i32);
            self.leave_descriptor();
        }
        self.leave_list();

        self.enter_list("Trns");
        for stop in &gradient.stops {
            self.enter_descriptor("", "", "TrnS");
            self.write_unit_float("Opct", Unit::Percent, stop.opacity * 100.0);
            self.write_integer("Lctn", (stop.location * 4096.0).round() as i32);
            self.write_integer("Mdpn", (stop.midpoint * 100.0).round() as i32);
            self.leave_descriptor();
        }
        self.leave_list();

        self.leave_descriptor();
    }

    pub fn finish(self) -> WriteResult<AslDocument> {
        if let Some(message) = self.error {
            return Err(WriteError::InvalidDocument(message));
        }
        if !self.stack.is_empty() {
            return Err(WriteError::InvalidDocument(format!(
                "{} containers left open",
                self.stack.len()
            )));
        }
        Ok(AslDocument { children: self.root })
    }
}
