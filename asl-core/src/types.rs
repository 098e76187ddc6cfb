//! Composite values delivered to catchers and accepted by the builder.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Color {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl Color {
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const WHITE: Color = Color::rgb(255, 255, 255);
    pub const RED: Color = Color::rgb(255, 0, 0);

    pub const fn rgb(red: u8, green: u8, blue: u8) -> Self {
        Self { red, green, blue }
    }

    /// Builds a colour from channel values in the 0..=255 range, rounding and clamping.
    pub fn from_f64(red: f64, green: f64, blue: f64) -> Self {
        fn channel(v: f64) -> u8 {
            if v.is_nan() {
                return 0;
            }
            v.round().clamp(0.0, 255.0) as u8
        }
        Self::rgb(channel(red), channel(green), channel(blue))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A transfer curve ("contour") over the 0..=255 range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Curve {
    pub name: String,
    pub points: Vec<Point>,
}

impl Curve {
    pub fn linear() -> Self {
        Self {
            name: "Linear".to_string(),
            points: vec![Point::new(0.0, 0.0), Point::new(255.0, 255.0)],
        }
    }
}

impl Default for Curve {
    fn default() -> Self {
        Self::linear()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PatternRef {
    pub name: String,
    pub uuid: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StopKind {
    #[default]
    User,
    Foreground,
    Background,
}

impl StopKind {
    pub fn code(self) -> &'static str {
        match self {
            StopKind::User => "UsrS",
            StopKind::Foreground => "FrgC",
            StopKind::Background => "BckC",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "UsrS" => Some(StopKind::User),
            "FrgC" => Some(StopKind::Foreground),
            "BckC" => Some(StopKind::Background),
            _ => None,
        }
    }
}

/// One gradient stop; location, midpoint and opacity are in 0..=1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GradientStop {
    pub location: f64,
    pub midpoint: f64,
    pub color: Color,
    pub kind: StopKind,
    pub opacity: f64,
}

impl GradientStop {
    pub fn new(location: f64, color: Color) -> Self {
        Self {
            location,
            midpoint: 0.5,
            color,
            kind: StopKind::User,
            opacity: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gradient {
    pub name: String,
    /// Smoothness, 4096 being 100%.
    pub interpolation: f64,
    pub stops: Vec<GradientStop>,
}

impl Gradient {
    pub fn two_color(name: impl Into<String>, from: Color, to: Color) -> Self {
        Self {
            name: name.into(),
            interpolation: 4096.0,
            stops: vec![GradientStop::new(0.0, from), GradientStop::new(1.0, to)],
        }
    }
}
