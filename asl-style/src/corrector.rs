//! Fill kinds are not stored for every effect, so after a read they are
//! inferred from which of pattern and gradient ended up populated.

use crate::model::{FillType, LayerStyle};

pub fn infer_fill_type(has_pattern: bool, has_gradient: bool) -> FillType {
    if has_pattern {
        FillType::Pattern
    } else if has_gradient {
        FillType::Gradient
    } else {
        FillType::Solid
    }
}

/// Glows can only be solid or gradient; the stroke can also be a pattern.
pub fn correct_fill_types(style: &mut LayerStyle) {
    for glow in [&mut style.outer_glow, &mut style.inner_glow] {
        glow.fill_type = infer_fill_type(false, glow.gradient.is_some());
    }
    let stroke = &mut style.stroke;
    stroke.fill_type = infer_fill_type(stroke.pattern.is_some(), stroke.gradient.is_some());
}

#[cfg(test)]
mod tests {
    use asl_core::{Color, Gradient, PatternRef};
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn stroke_prefers_pattern_over_gradient() {
        let mut style = LayerStyle::new("s");
        style.stroke.pattern = Some(PatternRef {
            name: "p".into(),
            uuid: "u".into(),
        });
        style.stroke.gradient = Some(Gradient::two_color("g", Color::BLACK, Color::WHITE));
        correct_fill_types(&mut style);
        assert_eq!(style.stroke.fill_type, FillType::Pattern);

        style.stroke.pattern = None;
        correct_fill_types(&mut style);
        assert_eq!(style.stroke.fill_type, FillType::Gradient);

        style.stroke.gradient = None;
        correct_fill_types(&mut style);
        assert_eq!(style.stroke.fill_type, FillType::Solid);
    }

    #[test]
    fn glows_are_solid_or_gradient() {
        let mut style = LayerStyle::new("s");
        style.inner_glow.fill_type = FillType::Pattern;
        style.outer_glow.gradient = Some(Gradient::two_color("g", Color::BLACK, Color::WHITE));
        correct_fill_types(&mut style);
        assert_eq!(style.inner_glow.fill_type, FillType::Solid);
        assert_eq!(style.outer_glow.fill_type, FillType::Gradient);
    }
}
