//! Typed layer-style model filled in by the serializer.

use std::fmt;

use asl_core::{Color, Curve, Gradient, PatternRef, Point};
use serde::{Deserialize, Serialize};

/// A closed set of four-character (or camelCase) enum codes.
pub trait PsdEnum: Sized + Copy + Default + fmt::Debug {
    fn from_code(code: &str) -> Option<Self>;
    fn code(self) -> &'static str;

    /// Falls back to the default value for unknown codes.
    fn from_code_or_default(code: &str) -> Self {
        Self::from_code(code).unwrap_or_else(|| {
            let fallback = Self::default();
            log::warn!("unknown {} code {:?}, using {:?}", std::any::type_name::<Self>(), code, fallback);
            fallback
        })
    }
}

macro_rules! psd_enum {
    ($(#[$meta:meta])* $name:ident, default $default:ident { $($variant:ident => $code:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $($variant,)+
        }

        impl Default for $name {
            fn default() -> Self {
                $name::$default
            }
        }

        impl PsdEnum for $name {
            fn from_code(code: &str) -> Option<Self> {
                match code {
                    $($code => Some($name::$variant),)+
                    _ => None,
                }
            }

            fn code(self) -> &'static str {
                match self {
                    $($name::$variant => $code,)+
                }
            }
        }
    };
}

psd_enum!(
    /// Blend mode, stored under the `BlnM` enum type.
    BlendMode, default Normal {
        Normal => "Nrml",
        Dissolve => "Dslv",
        Darken => "Drkn",
        Multiply => "Mltp",
        ColorBurn => "CBrn",
        LinearBurn => "linearBurn",
        DarkerColor => "darkerColor",
        Lighten => "Lghn",
        Screen => "Scrn",
        ColorDodge => "CDdg",
        LinearDodge => "linearDodge",
        LighterColor => "lighterColor",
        Overlay => "Ovrl",
        SoftLight => "SftL",
        HardLight => "HrdL",
        VividLight => "vividLight",
        LinearLight => "linearLight",
        PinLight => "pinLight",
        HardMix => "hardMix",
        Difference => "Dfrn",
        Exclusion => "Xclu",
        Subtract => "Sbtr",
        Divide => "divide",
        Hue => "H   ",
        Saturation => "Strt",
        Color => "Clr ",
        Luminosity => "Lmns",
    }
);

psd_enum!(
    /// Glow (`BETE`) and bevel (`bvlT`) technique. Slope limit is bevel only.
    Technique, default Softer {
        Softer => "SfBL",
        Precise => "PrBL",
        SlopeLimit => "Slmt",
    }
);

psd_enum!(
    BevelStyle, default OuterBevel {
        OuterBevel => "OtrB",
        InnerBevel => "InrB",
        Emboss => "Embs",
        PillowEmboss => "PlEb",
        StrokeEmboss => "strokeEmboss",
    }
);

psd_enum!(
    GradientStyle, default Linear {
        Linear => "Lnr ",
        Radial => "Rdl ",
        Angle => "Angl",
        Reflected => "Rflc",
        Diamond => "Dmnd",
    }
);

psd_enum!(
    StrokePosition, default Outside {
        Outside => "OutF",
        Inside => "InsF",
        Center => "CtrF",
    }
);

psd_enum!(
    FillType, default Solid {
        Solid => "SClr",
        Gradient => "GrFl",
        Pattern => "Ptrn",
    }
);

psd_enum!(
    GlowSource, default Edge {
        Center => "SrcC",
        Edge => "SrcE",
    }
);

psd_enum!(
    BevelDirection, default Up {
        Up => "In  ",
        Down => "Out ",
    }
);

/// Drop shadow (`DrSh`) or inner shadow (`IrSh`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shadow {
    pub enabled: bool,
    pub blend_mode: BlendMode,
    pub color: Color,
    pub opacity: f64,
    pub use_global_light: bool,
    pub angle: f64,
    pub distance: f64,
    pub spread: f64,
    pub size: f64,
    pub noise: f64,
    pub anti_aliased: bool,
    pub contour: Curve,
    /// `layerConceals`, drop shadow only.
    pub knocks_out: bool,
}

impl Default for Shadow {
    fn default() -> Self {
        Self {
            enabled: false,
            blend_mode: BlendMode::Multiply,
            color: Color::BLACK,
            opacity: 75.0,
            use_global_light: true,
            angle: 120.0,
            distance: 5.0,
            spread: 0.0,
            size: 5.0,
            noise: 0.0,
            anti_aliased: false,
            contour: Curve::linear(),
            knocks_out: true,
        }
    }
}

/// Outer glow (`OrGl`) or inner glow (`IrGl`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Glow {
    pub enabled: bool,
    pub blend_mode: BlendMode,
    pub color: Color,
    pub gradient: Option<Gradient>,
    pub fill_type: FillType,
    pub opacity: f64,
    pub technique: Technique,
    pub spread: f64,
    pub size: f64,
    pub noise: f64,
    pub jitter: f64,
    pub anti_aliased: bool,
    pub contour: Curve,
    pub range: f64,
    /// `glwS`, inner glow only.
    pub source: GlowSource,
}

impl Default for Glow {
    fn default() -> Self {
        Self {
            enabled: false,
            blend_mode: BlendMode::Screen,
            color: Color::rgb(255, 255, 190),
            gradient: None,
            fill_type: FillType::Solid,
            opacity: 75.0,
            technique: Technique::Softer,
            spread: 0.0,
            size: 5.0,
            noise: 0.0,
            jitter: 0.0,
            anti_aliased: false,
            contour: Curve::linear(),
            range: 50.0,
            source: GlowSource::Edge,
        }
    }
}

/// Bevel and emboss (`ebbl`), including its contour and texture sub-effects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BevelEmboss {
    pub enabled: bool,
    pub highlight_blend_mode: BlendMode,
    pub highlight_color: Color,
    pub highlight_opacity: f64,
    pub shadow_blend_mode: BlendMode,
    pub shadow_color: Color,
    pub shadow_opacity: f64,
    pub technique: Technique,
    pub style: BevelStyle,
    pub use_global_light: bool,
    pub angle: f64,
    pub altitude: f64,
    pub depth: f64,
    pub size: f64,
    pub direction: BevelDirection,
    pub contour: Curve,
    pub gloss_anti_aliased: bool,
    pub soften: f64,

    pub contour_enabled: bool,
    pub gloss_contour: Curve,
    pub anti_aliased: bool,
    pub contour_range: f64,

    pub texture_enabled: bool,
    pub texture_invert: bool,
    pub texture_align_with_layer: bool,
    pub texture_scale: f64,
    pub texture_depth: f64,
    pub texture_pattern: Option<PatternRef>,
    pub texture_phase: Point,
}

impl Default for BevelEmboss {
    fn default() -> Self {
        Self {
            enabled: false,
            highlight_blend_mode: BlendMode::Screen,
            highlight_color: Color::WHITE,
            highlight_opacity: 75.0,
            shadow_blend_mode: BlendMode::Multiply,
            shadow_color: Color::BLACK,
            shadow_opacity: 75.0,
            technique: Technique::Softer,
            style: BevelStyle::InnerBevel,
            use_global_light: true,
            angle: 120.0,
            altitude: 30.0,
            depth: 100.0,
            size: 5.0,
            direction: BevelDirection::Up,
            contour: Curve::linear(),
            gloss_anti_aliased: false,
            soften: 0.0,
            contour_enabled: false,
            gloss_contour: Curve::linear(),
            anti_aliased: false,
            contour_range: 50.0,
            texture_enabled: false,
            texture_invert: false,
            texture_align_with_layer: true,
            texture_scale: 100.0,
            texture_depth: 100.0,
            texture_pattern: None,
            texture_phase: Point::default(),
        }
    }
}

/// Satin (`ChFX`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Satin {
    pub enabled: bool,
    pub blend_mode: BlendMode,
    pub color: Color,
    pub anti_aliased: bool,
    pub invert: bool,
    pub opacity: f64,
    pub angle: f64,
    pub distance: f64,
    pub size: f64,
    pub contour: Curve,
}

impl Default for Satin {
    fn default() -> Self {
        Self {
            enabled: false,
            blend_mode: BlendMode::Multiply,
            color: Color::BLACK,
            anti_aliased: true,
            invert: true,
            opacity: 50.0,
            angle: 19.0,
            distance: 11.0,
            size: 14.0,
            contour: Curve::linear(),
        }
    }
}

/// Colour overlay (`SoFi`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorOverlay {
    pub enabled: bool,
    pub blend_mode: BlendMode,
    pub opacity: f64,
    pub color: Color,
}

impl Default for ColorOverlay {
    fn default() -> Self {
        Self {
            enabled: false,
            blend_mode: BlendMode::Normal,
            opacity: 100.0,
            color: Color::RED,
        }
    }
}

/// Gradient overlay (`GrFl`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientOverlay {
    pub enabled: bool,
    pub blend_mode: BlendMode,
    pub opacity: f64,
    pub gradient: Option<Gradient>,
    pub angle: f64,
    pub style: GradientStyle,
    pub reverse: bool,
    pub align_with_layer: bool,
    pub scale: f64,
    pub offset: Point,
    pub dither: bool,
}

impl Default for GradientOverlay {
    fn default() -> Self {
        Self {
            enabled: false,
            blend_mode: BlendMode::Normal,
            opacity: 100.0,
            gradient: None,
            angle: 90.0,
            style: GradientStyle::Linear,
            reverse: false,
            align_with_layer: true,
            scale: 100.0,
            offset: Point::default(),
            dither: false,
        }
    }
}

/// Pattern overlay (`patternFill`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternOverlay {
    pub enabled: bool,
    pub blend_mode: BlendMode,
    pub opacity: f64,
    pub pattern: Option<PatternRef>,
    pub scale: f64,
    pub align_with_layer: bool,
    pub phase: Point,
}

impl Default for PatternOverlay {
    fn default() -> Self {
        Self {
            enabled: false,
            blend_mode: BlendMode::Normal,
            opacity: 100.0,
            pattern: None,
            scale: 100.0,
            align_with_layer: true,
            phase: Point::default(),
        }
    }
}

/// Stroke (`FrFX`). Only the fields of the active fill type are written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    pub enabled: bool,
    pub position: StrokePosition,
    pub fill_type: FillType,
    pub blend_mode: BlendMode,
    pub opacity: f64,
    pub size: f64,
    pub color: Color,
    pub gradient: Option<Gradient>,
    pub angle: f64,
    pub style: GradientStyle,
    pub reverse: bool,
    pub scale: f64,
    pub align_with_layer: bool,
    pub offset: Point,
    pub dither: bool,
    pub pattern: Option<PatternRef>,
    pub phase: Point,
}

impl Default for Stroke {
    fn default() -> Self {
        Self {
            enabled: false,
            position: StrokePosition::Outside,
            fill_type: FillType::Solid,
            blend_mode: BlendMode::Normal,
            opacity: 100.0,
            size: 3.0,
            color: Color::BLACK,
            gradient: None,
            angle: 90.0,
            style: GradientStyle::Linear,
            reverse: false,
            scale: 100.0,
            align_with_layer: true,
            offset: Point::default(),
            dither: false,
            pattern: None,
            phase: Point::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerStyle {
    pub name: String,
    /// Identifier stored under `Idnt` in the info descriptor.
    pub uuid: String,
    /// `masterFXSwitch`.
    pub enabled: bool,
    /// Set after reading: at least one effect is enabled.
    pub valid: bool,

    pub drop_shadow: Shadow,
    pub inner_shadow: Shadow,
    pub outer_glow: Glow,
    pub inner_glow: Glow,
    pub bevel_emboss: BevelEmboss,
    pub satin: Satin,
    pub color_overlay: ColorOverlay,
    pub gradient_overlay: GradientOverlay,
    pub pattern_overlay: PatternOverlay,
    pub stroke: Stroke,
}

impl Default for LayerStyle {
    fn default() -> Self {
        Self::new("")
    }
}

impl LayerStyle {
    /// A style with every effect disabled and a fresh random identifier.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            uuid: uuid::Uuid::new_v4().to_string(),
            enabled: true,
            valid: false,
            drop_shadow: Shadow::default(),
            inner_shadow: Shadow {
                knocks_out: false,
                ..Default::default()
            },
            outer_glow: Glow::default(),
            inner_glow: Glow::default(),
            bevel_emboss: BevelEmboss::default(),
            satin: Satin::default(),
            color_overlay: ColorOverlay::default(),
            gradient_overlay: GradientOverlay::default(),
            pattern_overlay: PatternOverlay::default(),
            stroke: Stroke::default(),
        }
    }

    pub fn is_empty(&self) -> bool {
        !(self.drop_shadow.enabled
            || self.inner_shadow.enabled
            || self.outer_glow.enabled
            || self.inner_glow.enabled
            || self.bevel_emboss.enabled
            || self.satin.enabled
            || self.color_overlay.enabled
            || self.gradient_overlay.enabled
            || self.pattern_overlay.enabled
            || self.stroke.enabled)
    }

    /// Pattern references of the enabled effects that use one.
    pub fn pattern_refs(&self) -> Vec<&PatternRef> {
        let mut refs = Vec::new();
        if self.pattern_overlay.enabled {
            refs.extend(self.pattern_overlay.pattern.as_ref());
        }
        if self.stroke.enabled && self.stroke.fill_type == FillType::Pattern {
            refs.extend(self.stroke.pattern.as_ref());
        }
        if self.bevel_emboss.enabled && self.bevel_emboss.texture_enabled {
            refs.extend(self.bevel_emboss.texture_pattern.as_ref());
        }
        refs
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn blend_mode_table_is_complete() {
        let codes = [
            "Nrml", "Dslv", "Drkn", "Mltp", "CBrn", "linearBurn", "darkerColor", "Lghn", "Scrn",
            "CDdg", "linearDodge", "lighterColor", "Ovrl", "SftL", "HrdL", "vividLight",
            "linearLight", "pinLight", "hardMix", "Dfrn", "Xclu", "Sbtr", "divide", "H   ", "Strt",
            "Clr ", "Lmns",
        ];
        for code in codes {
            let mode = BlendMode::from_code(code).unwrap();
            assert_eq!(mode.code(), code);
        }
    }

    #[test]
    fn unknown_codes_fall_back() {
        assert_eq!(BlendMode::from_code_or_default("wat?"), BlendMode::Normal);
        assert_eq!(Technique::from_code_or_default(""), Technique::Softer);
        assert_eq!(BevelStyle::from_code_or_default("Nope"), BevelStyle::OuterBevel);
        assert_eq!(GradientStyle::from_code_or_default("Spkl"), GradientStyle::Linear);
    }

    #[test]
    fn new_style_is_empty_with_random_id() {
        let a = LayerStyle::new("a");
        let b = LayerStyle::new("b");
        assert!(a.is_empty());
        assert_ne!(a.uuid, b.uuid);
    }

    #[test]
    fn pattern_refs_follow_enabled_effects() {
        let texture = PatternRef {
            name: "Texture".into(),
            uuid: "t".into(),
        };
        let mut style = LayerStyle::new("s");
        style.bevel_emboss.texture_pattern = Some(texture.clone());
        style.bevel_emboss.enabled = true;
        assert!(style.pattern_refs().is_empty());

        style.bevel_emboss.texture_enabled = true;
        assert_eq!(style.pattern_refs(), vec![&texture]);
    }
}
