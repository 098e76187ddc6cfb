//! The push-based visitor fed by [`crate::parser::walk_document`], plus two
//! catchers: one that records everything it sees and one that routes values
//! to handlers registered per path.

use std::collections::HashMap;
use std::fmt;
use std::mem;

use crate::error::SubscribeError;
use crate::ir::Unit;
use crate::pattern::PatternTile;
use crate::types::{Color, Curve, Gradient, PatternRef, Point};

/// Receives typed values by slash-delimited path. Every method defaults to a
/// no-op so implementors only pick what they need.
pub trait ObjectCatcher {
    fn add_double(&mut self, _path: &str, _value: f64) {}
    fn add_integer(&mut self, _path: &str, _value: i32) {}
    fn add_enum(&mut self, _path: &str, _type_id: &str, _value: &str) {}
    fn add_unit_float(&mut self, _path: &str, _unit: &Unit, _value: f64) {}
    fn add_text(&mut self, _path: &str, _value: &str) {}
    fn add_boolean(&mut self, _path: &str, _value: bool) {}
    fn add_color(&mut self, _path: &str, _color: Color) {}
    fn add_point(&mut self, _path: &str, _point: Point) {}
    fn add_curve(&mut self, _path: &str, _curve: &Curve) {}
    fn add_pattern(&mut self, _path: &str, _pattern: &PatternTile, _uuid: &str) {}
    fn add_pattern_ref(&mut self, _path: &str, _pattern: &PatternRef) {}
    fn add_gradient(&mut self, _path: &str, _gradient: &Gradient) {}

    /// Called when the walk enters (`true`) or leaves (`false`) the outermost list.
    fn set_array_mode(&mut self, _enabled: bool) {}

    /// Called once per info descriptor, before any of its values.
    fn new_style_started(&mut self) {}
}

#[derive(Debug, Clone, PartialEq)]
pub struct DumpRecord {
    pub path: String,
    pub kind: &'static str,
    pub value: String,
}

impl fmt::Display for DumpRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.path, self.kind, self.value)
    }
}

/// Records every call in order.
#[derive(Debug, Default)]
pub struct DumpCatcher {
    pub records: Vec<DumpRecord>,
}

impl DumpCatcher {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&mut self, path: &str, kind: &'static str, value: String) {
        log::trace!("{} {} {}", path, kind, value);
        self.records.push(DumpRecord {
            path: path.to_string(),
            kind,
            value,
        });
    }
}

impl ObjectCatcher for DumpCatcher {
    fn add_double(&mut self, path: &str, value: f64) {
        self.record(path, "double", value.to_string());
    }

    fn add_integer(&mut self, path: &str, value: i32) {
        self.record(path, "integer", value.to_string());
    }

    fn add_enum(&mut self, path: &str, type_id: &str, value: &str) {
        self.record(path, "enum", format!("{type_id}:{value}"));
    }

    fn add_unit_float(&mut self, path: &str, unit: &Unit, value: f64) {
        self.record(path, "unitfloat", format!("{value}{unit}"));
    }

    fn add_text(&mut self, path: &str, value: &str) {
        self.record(path, "text", format!("{value:?}"));
    }

    fn add_boolean(&mut self, path: &str, value: bool) {
        self.record(path, "boolean", value.to_string());
    }

    fn add_color(&mut self, path: &str, color: Color) {
        self.record(
            path,
            "color",
            format!("#{:02x}{:02x}{:02x}", color.red, color.green, color.blue),
        );
    }

    fn add_point(&mut self, path: &str, point: Point) {
        self.record(path, "point", format!("({}, {})", point.x, point.y));
    }

    fn add_curve(&mut self, path: &str, curve: &Curve) {
        let points: Vec<String> = curve.points.iter().map(|p| format!("({}, {})", p.x, p.y)).collect();
        self.record(path, "curve", format!("{:?} [{}]", curve.name, points.join(" ")));
    }

    fn add_pattern(&mut self, path: &str, pattern: &PatternTile, uuid: &str) {
        self.record(
            path,
            "pattern",
            format!("{uuid} {:?} {}x{}", pattern.name, pattern.width, pattern.height),
        );
    }

    fn add_pattern_ref(&mut self, path: &str, pattern: &PatternRef) {
        self.record(path, "patternref", format!("{} {:?}", pattern.uuid, pattern.name));
    }

    fn add_gradient(&mut self, path: &str, gradient: &Gradient) {
        self.record(
            path,
            "gradient",
            format!("{:?} {} stops", gradient.name, gradient.stops.len()),
        );
    }

    fn set_array_mode(&mut self, enabled: bool) {
        self.record("", "arraymode", enabled.to_string());
    }

    fn new_style_started(&mut self) {
        self.record("", "newstyle", String::new());
    }
}

type Setter<T, V> = Box<dyn FnMut(&mut T, V)>;
type RefSetter<T, V> = Box<dyn FnMut(&mut T, &V)>;
type TextSetter<T> = Box<dyn FnMut(&mut T, &str)>;

enum Handler<T> {
    Double(Setter<T, f64>),
    Integer(Setter<T, i32>),
    Enum { type_id: String, set: TextSetter<T> },
    UnitFloat { unit: Unit, set: Setter<T, f64> },
    Text(TextSetter<T>),
    Boolean(Setter<T, bool>),
    Color(Setter<T, Color>),
    Point(Setter<T, Point>),
    Curve(RefSetter<T, Curve>),
    Pattern(Box<dyn FnMut(&mut T, &PatternTile, &str)>),
    PatternRef(RefSetter<T, PatternRef>),
    Gradient(RefSetter<T, Gradient>),
}

impl<T> Handler<T> {
    fn kind(&self) -> &'static str {
        match self {
            Handler::Double(_) => "double",
            Handler::Integer(_) => "integer",
            Handler::Enum { .. } => "enum",
            Handler::UnitFloat { .. } => "unit float",
            Handler::Text(_) => "text",
            Handler::Boolean(_) => "boolean",
            Handler::Color(_) => "color",
            Handler::Point(_) => "point",
            Handler::Curve(_) => "curve",
            Handler::Pattern(_) => "pattern",
            Handler::PatternRef(_) => "pattern ref",
            Handler::Gradient(_) => "gradient",
        }
    }
}

/// Routes values to closures registered per exact path. Each path holds at
/// most one handler per value kind; a second registration is rejected.
/// Values arriving at paths nobody subscribed to are dropped silently.
pub struct CallbackCatcher<T> {
    state: T,
    handlers: HashMap<String, Vec<Handler<T>>>,
    on_new_style: Option<Box<dyn FnMut(&mut T)>>,
}

impl<T> CallbackCatcher<T> {
    pub fn new(state: T) -> Self {
        Self {
            state,
            handlers: HashMap::new(),
            on_new_style: None,
        }
    }

    pub fn state(&self) -> &T {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut T {
        &mut self.state
    }

    pub fn into_state(self) -> T {
        self.state
    }

    pub fn subscription_count(&self) -> usize {
        self.handlers.values().map(Vec::len).sum()
    }

    fn register(&mut self, path: impl Into<String>, handler: Handler<T>) -> Result<(), SubscribeError> {
        let path = path.into();
        let slot = self.handlers.entry(path.clone()).or_default();
        if slot
            .iter()
            .any(|h| mem::discriminant(h) == mem::discriminant(&handler))
        {
            return Err(SubscribeError::Duplicate {
                path,
                kind: handler.kind(),
            });
        }
        slot.push(handler);
        Ok(())
    }

    pub fn subscribe_double(
        &mut self,
        path: impl Into<String>,
        f: impl FnMut(&mut T, f64) + 'static,
    ) -> Result<(), SubscribeError> {
        self.register(path, Handler::Double(Box::new(f)))
    }

    pub fn subscribe_integer(
        &mut self,
        path: impl Into<String>,
        f: impl FnMut(&mut T, i32) + 'static,
    ) -> Result<(), SubscribeError> {
        self.register(path, Handler::Integer(Box::new(f)))
    }

    /// Delivers only enums whose type id equals `type_id`.
    pub fn subscribe_enum(
        &mut self,
        path: impl Into<String>,
        type_id: &str,
        f: impl FnMut(&mut T, &str) + 'static,
    ) -> Result<(), SubscribeError> {
        self.register(
            path,
            Handler::Enum {
                type_id: type_id.to_string(),
                set: Box::new(f),
            },
        )
    }

    /// Delivers only unit floats carrying `unit`.
    pub fn subscribe_unit_float(
        &mut self,
        path: impl Into<String>,
        unit: Unit,
        f: impl FnMut(&mut T, f64) + 'static,
    ) -> Result<(), SubscribeError> {
        self.register(
            path,
            Handler::UnitFloat {
                unit,
                set: Box::new(f),
            },
        )
    }

    pub fn subscribe_text(
        &mut self,
        path: impl Into<String>,
        f: impl FnMut(&mut T, &str) + 'static,
    ) -> Result<(), SubscribeError> {
        self.register(path, Handler::Text(Box::new(f)))
    }

    pub fn subscribe_boolean(
        &mut self,
        path: impl Into<String>,
        f: impl FnMut(&mut T, bool) + 'static,
    ) -> Result<(), SubscribeError> {
        self.register(path, Handler::Boolean(Box::new(f)))
    }

    pub fn subscribe_color(
        &mut self,
        path: impl Into<String>,
        f: impl FnMut(&mut T, Color) + 'static,
    ) -> Result<(), SubscribeError> {
        self.register(path, Handler::Color(Box::new(f)))
    }

    pub fn subscribe_point(
        &mut self,
        path: impl Into<String>,
        f: impl FnMut(&mut T, Point) + 'static,
    ) -> Result<(), SubscribeError> {
        self.register(path, Handler::Point(Box::new(f)))
    }

    pub fn subscribe_curve(
        &mut self,
        path: impl Into<String>,
        f: impl FnMut(&mut T, &Curve) + 'static,
    ) -> Result<(), SubscribeError> {
        self.register(path, Handler::Curve(Box::new(f)))
    }

    pub fn subscribe_pattern(
        &mut self,
        path: impl Into<String>,
        f: impl FnMut(&mut T, &PatternTile, &str) + 'static,
    ) -> Result<(), SubscribeError> {
        self.register(path, Handler::Pattern(Box::new(f)))
    }

    pub fn subscribe_pattern_ref(
        &mut self,
        path: impl Into<String>,
        f: impl FnMut(&mut T, &PatternRef) + 'static,
    ) -> Result<(), SubscribeError> {
        self.register(path, Handler::PatternRef(Box::new(f)))
    }

    pub fn subscribe_gradient(
        &mut self,
        path: impl Into<String>,
        f: impl FnMut(&mut T, &Gradient) + 'static,
    ) -> Result<(), SubscribeError> {
        self.register(path, Handler::Gradient(Box::new(f)))
    }

    pub fn subscribe_new_style(&mut self, f: impl FnMut(&mut T) + 'static) -> Result<(), SubscribeError> {
        if self.on_new_style.is_some() {
            return Err(SubscribeError::Duplicate {
                path: String::new(),
                kind: "new style",
            });
        }
        self.on_new_style = Some(Box::new(f));
        Ok(())
    }
}

impl<T> ObjectCatcher for CallbackCatcher<T> {
    fn add_double(&mut self, path: &str, value: f64) {
        for handler in self.handlers.get_mut(path).into_iter().flatten() {
            if let Handler::Double(set) = handler {
                set(&mut self.state, value);
            }
        }
    }

    fn add_integer(&mut self, path: &str, value: i32) {
        for handler in self.handlers.get_mut(path).into_iter().flatten() {
            if let Handler::Integer(set) = handler {
                set(&mut self.state, value);
            }
        }
    }

    fn add_enum(&mut self, path: &str, type_id: &str, value: &str) {
        for handler in self.handlers.get_mut(path).into_iter().flatten() {
            if let Handler::Enum { type_id: expected, set } = handler {
                if expected == type_id {
                    set(&mut self.state, value);
                } else {
                    log::warn!(
                        "enum at {:?} has type {:?}, expected {:?}; value {:?} dropped",
                        path,
                        type_id,
                        expected,
                        value
                    );
                }
            }
        }
    }

    fn add_unit_float(&mut self, path: &str, unit: &Unit, value: f64) {
        for handler in self.handlers.get_mut(path).into_iter().flatten() {
            if let Handler::UnitFloat { unit: expected, set } = handler {
                if expected == unit {
                    set(&mut self.state, value);
                } else {
                    log::warn!(
                        "unit float at {:?} is in {}, expected {}; value {} dropped",
                        path,
                        unit,
                        expected,
                        value
                    );
                }
            }
        }
    }

    fn add_text(&mut self, path: &str, value: &str) {
        for handler in self.handlers.get_mut(path).into_iter().flatten() {
            if let Handler::Text(set) = handler {
                set(&mut self.state, value);
            }
        }
    }

    fn add_boolean(&mut self, path: &str, value: bool) {
        for handler in self.handlers.get_mut(path).into_iter().flatten() {
            if let Handler::Boolean(set) = handler {
                set(&mut self.state, value);
            }
        }
    }

    fn add_color(&mut self, path: &str, color: Color) {
        for handler in self.handlers.get_mut(path).into_iter().flatten() {
            if let Handler::Color(set) = handler {
                set(&mut self.state, color);
            }
        }
    }

    fn add_point(&mut self, path: &str, point: Point) {
        for handler in self.handlers.get_mut(path).into_iter().flatten() {
            if let Handler::Point(set) = handler {
                set(&mut self.state, point);
            }
        }
    }

    fn add_curve(&mut self, path: &str, curve: &Curve) {
        for handler in self.handlers.get_mut(path).into_iter().flatten() {
            if let Handler::Curve(set) = handler {
                set(&mut self.state, curve);
            }
        }
    }

    fn add_pattern(&mut self, path: &str, pattern: &PatternTile, uuid: &str) {
        for handler in self.handlers.get_mut(path).into_iter().flatten() {
            if let Handler::Pattern(set) = handler {
                set(&mut self.state, pattern, uuid);
            }
        }
    }

    fn add_pattern_ref(&mut self, path: &str, pattern: &PatternRef) {
        for handler in self.handlers.get_mut(path).into_iter().flatten() {
            if let Handler::PatternRef(set) = handler {
                set(&mut self.state, pattern);
            }
        }
    }

    fn add_gradient(&mut self, path: &str, gradient: &Gradient) {
        for handler in self.handlers.get_mut(path).into_iter().flatten() {
            if let Handler::Gradient(set) = handler {
                set(&mut self.state, gradient);
            }
        }
    }

    fn new_style_started(&mut self) {
        if let Some(f) = self.on_new_style.as_mut() {
            f(&mut self.state);
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[derive(Default)]
    struct Model {
        opacity: f64,
        mode: String,
        styles: usize,
    }

    #[test]
    fn routes_by_path_and_discriminator() {
        let mut catcher = CallbackCatcher::new(Model::default());
        catcher
            .subscribe_unit_float("/Styl/Lefx/SoFi/Opct", Unit::Percent, |m, v| m.opacity = v)
            .unwrap();
        catcher
            .subscribe_enum("/Styl/Lefx/SoFi/Md  ", "BlnM", |m, v| m.mode = v.to_string())
            .unwrap();
        catcher.subscribe_new_style(|m| m.styles += 1).unwrap();

        catcher.new_style_started();
        catcher.add_unit_float("/Styl/Lefx/SoFi/Opct", &Unit::Pixels, 10.0);
        catcher.add_unit_float("/Styl/Lefx/SoFi/Opct", &Unit::Percent, 50.0);
        catcher.add_enum("/Styl/Lefx/SoFi/Md  ", "Clry", "UsrS");
        catcher.add_enum("/Styl/Lefx/SoFi/Md  ", "BlnM", "Mltp");
        catcher.add_double("/Styl/Lefx/SoFi/Unknown", 1.0);

        let model = catcher.into_state();
        assert_eq!(model.opacity, 50.0);
        assert_eq!(model.mode, "Mltp");
        assert_eq!(model.styles, 1);
    }

    #[test]
    fn duplicate_subscription_is_rejected() {
        let mut catcher = CallbackCatcher::new(Model::default());
        catcher.subscribe_double("/a", |m, v| m.opacity = v).unwrap();
        catcher.subscribe_text("/a", |m, v| m.mode = v.to_string()).unwrap();
        let err = catcher.subscribe_double("/a", |_, _| {}).unwrap_err();
        assert!(matches!(err, SubscribeError::Duplicate { ref path, kind: "double" } if path == "/a"));
        assert_eq!(catcher.subscription_count(), 2);
    }

    #[test]
    fn dump_catcher_formats_records() {
        let mut dump = DumpCatcher::new();
        dump.add_color("/x/Clr ", Color::RED);
        dump.add_enum("/x/Md  ", "BlnM", "Nrml");
        assert_eq!(dump.records[0].to_string(), "/x/Clr  color #ff0000");
        assert_eq!(dump.records[1].to_string(), "/x/Md   enum BlnM:Nrml");
    }
}
