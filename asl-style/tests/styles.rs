use std::io::Cursor;

use asl_core::{write_document, AslBuilder, CodecConfig, Color, PatternRef, PatternTile, Point, Unit};
use asl_style::{
    BevelStyle, BlendMode, FillType, GradientStyle, LayerStyle, ResourceRegistry, StrokePosition,
    StyleSerializer,
};
use pretty_assertions::assert_eq;

/// A file laid out the way Photoshop writes it, with a few values the
/// writer in this crate never produces.
fn foreign_file() -> Vec<u8> {
    let tile = PatternTile::filled("Canvas", 6, 6, [200, 190, 170, 255]);
    let mut b = AslBuilder::new();
    b.enter_list("Patterns");
    b.write_pattern_with_uuid("", "canvas-0001", &tile);
    b.write_pattern_with_uuid("", "canvas-0001", &PatternTile::filled("Copy", 2, 2, [0, 0, 0, 255]));
    b.leave_list();

    b.enter_descriptor("", "", "null");
    b.write_text("Nm  ", "Embossed");
    b.write_text("Idnt", "style-0001");
    b.leave_descriptor();

    b.enter_descriptor("", "", "Styl");
    b.enter_descriptor("documentMode", "", "documentMode");
    b.leave_descriptor();
    b.enter_descriptor("Lefx", "", "Lefx");
    b.write_unit_float("Scl ", Unit::Percent, 100.0);
    b.write_boolean("masterFXSwitch", true);

    b.enter_descriptor("ebbl", "", "ebbl");
    b.write_boolean("enab", true);
    b.write_enum("hglM", "BlnM", "Scrn");
    b.enter_descriptor("hglC", "", "HSBC");
    b.write_unit_float("H   ", Unit::Angle, 0.0);
    b.write_double("Strt", 0.0);
    b.write_double("Brgh", 100.0);
    b.leave_descriptor();
    b.write_enum("sdwM", "BlnM", "notAMode");
    b.write_enum("bvlS", "BESl", "PlEb");
    b.write_unit_float("Lald", Unit::Angle, 45.0);
    b.write_boolean("useTexture", true);
    b.write_unit_float("textureDepth", Unit::Percent, -80.0);
    b.write_pattern_ref(
        "Ptrn",
        &PatternRef {
            name: "Canvas".into(),
            uuid: "canvas-0001".into(),
        },
    );
    b.write_phase_point("phase", Point::new(1.0, 2.0));
    b.leave_descriptor();

    b.enter_descriptor("FrFX", "", "FrFX");
    b.write_boolean("enab", true);
    b.write_enum("Styl", "FStl", "CtrF");
    b.write_enum("PntT", "FrFl", "GrFl");
    b.write_unit_float("Sz  ", Unit::Pixels, 7.0);
    b.write_gradient(
        "Grad",
        &asl_core::Gradient::two_color("Sunset", Color::rgb(255, 128, 0), Color::rgb(64, 0, 128)),
    );
    b.write_enum("Type", "GrdT", "Rdl ");
    b.write_offset_point("Ofst", Point::new(10.0, -5.0));
    b.leave_descriptor();

    b.leave_descriptor();
    b.leave_descriptor();
    write_document(&b.finish().unwrap()).unwrap()
}

#[test]
fn reads_a_foreign_file() {
    let mut serializer = StyleSerializer::new(CodecConfig::default());
    serializer.read_from_device(&mut Cursor::new(foreign_file())).unwrap();

    assert!(serializer.is_valid());
    let [style] = serializer.styles() else {
        panic!("expected one style, got {}", serializer.styles().len());
    };
    assert_eq!(style.name, "Embossed");
    assert_eq!(style.uuid, "style-0001");
    assert!(style.valid);

    let bevel = &style.bevel_emboss;
    assert!(bevel.enabled && bevel.texture_enabled);
    assert_eq!(bevel.highlight_color, Color::WHITE);
    assert_eq!(bevel.shadow_blend_mode, BlendMode::Normal);
    assert_eq!(bevel.style, BevelStyle::PillowEmboss);
    assert_eq!(bevel.altitude, 45.0);
    assert_eq!(bevel.texture_depth, -80.0);
    assert_eq!(bevel.texture_phase, Point::new(1.0, 2.0));

    let stroke = &style.stroke;
    assert_eq!(stroke.position, StrokePosition::Center);
    assert_eq!(stroke.fill_type, FillType::Gradient);
    assert_eq!(stroke.style, GradientStyle::Radial);
    assert_eq!(stroke.offset, Point::new(10.0, -5.0));
    assert_eq!(stroke.gradient.as_ref().map(|g| g.name.as_str()), Some("Sunset"));

    // The first tile registered under a duplicated identifier is kept.
    let texture = serializer.resources().resolve_pattern("canvas-0001").unwrap();
    assert_eq!(texture.name, "Canvas");
    assert_eq!(serializer.resources().pattern_count(), 1);
}

#[test]
fn rewritten_file_reads_back_identically() {
    let mut first = StyleSerializer::default();
    first.read_from_bytes(&foreign_file()).unwrap();
    let bytes = first.save_to_bytes().unwrap();

    let mut second = StyleSerializer::default();
    second.read_from_bytes(&bytes).unwrap();
    assert_eq!(second.styles(), first.styles());
    assert_eq!(second.save_to_bytes().unwrap(), bytes);
}

#[test]
fn shared_pattern_is_embedded_once() {
    let tile = PatternTile::filled("Shared", 3, 3, [1, 2, 3, 255]);
    let shared = PatternRef {
        name: "Shared".into(),
        uuid: "shared".into(),
    };
    let styles: Vec<LayerStyle> = (0..3)
        .map(|i| {
            let mut style = LayerStyle::new(format!("Style {i}"));
            style.pattern_overlay.enabled = true;
            style.pattern_overlay.pattern = Some(shared.clone());
            style
        })
        .collect();

    let mut serializer = StyleSerializer::default();
    serializer.resources_mut().register_pattern("shared", tile);
    serializer.set_styles(styles);
    let doc = serializer.form_document().unwrap();

    assert_eq!(doc.patterns().count(), 1);
    assert_eq!(doc.styles().len(), 3);
}

#[test]
fn disabled_effects_are_not_written() {
    let mut style = LayerStyle::new("Quiet");
    style.drop_shadow.enabled = true;
    style.gradient_overlay.enabled = true;
    let mut serializer = StyleSerializer::default();
    serializer.set_styles(vec![style]);
    let doc = serializer.form_document().unwrap();

    let (_, effects) = doc.styles()[0];
    let Some(asl_core::Value::Descriptor(lefx)) = effects.and_then(|styl| styl.child("Lefx")) else {
        panic!("style has no Lefx descriptor");
    };
    let keys: Vec<&str> = lefx.children.iter().map(|n| n.key.as_str()).collect();
    // The gradient overlay is enabled but has no gradient to write.
    assert_eq!(keys, vec!["Scl ", "masterFXSwitch", "DrSh"]);
}

/// One pattern overlay style embedding a tile of `rgba` under a fixed id.
fn overlay_file(rgba: [u8; 4]) -> Vec<u8> {
    let mut style = LayerStyle::new("Overlay");
    style.pattern_overlay.enabled = true;
    style.pattern_overlay.pattern = Some(PatternRef {
        name: "Swatch".into(),
        uuid: "swatch".into(),
    });
    let mut serializer = StyleSerializer::default();
    serializer
        .resources_mut()
        .register_pattern("swatch", PatternTile::filled("Swatch", 2, 2, rgba));
    serializer.set_styles(vec![style]);
    serializer.save_to_bytes().unwrap()
}

#[test]
fn second_read_replaces_patterns_of_the_first() {
    let mut serializer = StyleSerializer::default();
    serializer.read_from_bytes(&overlay_file([255, 0, 0, 255])).unwrap();
    let red = serializer.resources().resolve_pattern("swatch").unwrap();
    assert_eq!(&red.pixels[..4], &[0, 0, 255, 255]);

    serializer.read_from_bytes(&overlay_file([0, 0, 255, 255])).unwrap();
    assert!(serializer.is_valid());
    assert_eq!(serializer.resources().pattern_count(), 1);
    let blue = serializer.resources().resolve_pattern("swatch").unwrap();
    assert_eq!(&blue.pixels[..4], &[255, 0, 0, 255]);
}
