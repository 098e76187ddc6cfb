use std::io::Cursor;

use asl_core::pattern::{write_virtual_array_list, PLANE_HEADER_LEN};
use asl_core::{
    read_document, write_document, xml_to_document, AslBuilder, AslDocument, CodecConfig, Color,
    Curve, DumpCatcher, Gradient, ParseError, PatternRef, PatternTile, Point, Unit,
};
use byteorder::{BigEndian, ByteOrder};
use pretty_assertions::assert_eq;

fn gradient_tile() -> PatternTile {
    let mut rgba = Vec::new();
    for y in 0..6u8 {
        for x in 0..5u8 {
            rgba.extend_from_slice(&[x * 40, y * 30, 200, 255]);
        }
    }
    PatternTile::from_rgba("Ramp", 5, 6, &rgba).unwrap()
}

fn style(b: &mut AslBuilder, name: &str, uuid: &str, pattern: &PatternRef) {
    b.enter_descriptor("", "", "null");
    b.write_text("Nm  ", name);
    b.write_text("Idnt", uuid);
    b.leave_descriptor();

    b.enter_descriptor("", "", "Styl");
    b.enter_descriptor("documentMode", "", "documentMode");
    b.leave_descriptor();
    b.enter_descriptor("Lefx", "", "Lefx");
    b.write_unit_float("Scl ", Unit::Percent, 100.0);
    b.write_boolean("masterFXSwitch", true);

    b.enter_descriptor("DrSh", "", "DrSh");
    b.write_boolean("enab", true);
    b.write_enum("Md  ", "BlnM", "Mltp");
    b.write_color("Clr ", Color::rgb(10, 20, 30));
    b.write_unit_float("Opct", Unit::Percent, 75.0);
    b.write_unit_float("lagl", Unit::Angle, 120.0);
    b.write_curve("TrnS", &Curve::linear());
    b.leave_descriptor();

    b.enter_descriptor("GrFl", "", "GrFl");
    b.write_boolean("enab", true);
    b.write_gradient("Grad", &Gradient::two_color("Black, White", Color::BLACK, Color::WHITE));
    b.write_offset_point("Ofst", Point::new(0.0, 0.0));
    b.leave_descriptor();

    b.enter_descriptor("patternFill", "", "patternFill");
    b.write_boolean("enab", true);
    b.write_pattern_ref("Ptrn", pattern);
    b.write_phase_point("phase", Point::new(3.0, 4.0));
    b.leave_descriptor();

    b.enter_descriptor("ebbl", "", "ebbl");
    b.write_boolean("enab", true);
    b.write_enum("bvlS", "BESl", "InrB");
    b.write_unit_float("srgR", Unit::Percent, 100.0);
    b.write_boolean("useTexture", true);
    b.write_unit_float("textureDepth", Unit::Percent, 50.0);
    b.write_pattern_ref("Ptrn", pattern);
    b.write_phase_point("phase", Point::new(-2.0, 8.0));
    b.leave_descriptor();

    b.enter_descriptor("FrFX", "", "FrFX");
    b.write_boolean("enab", true);
    b.write_enum("Styl", "FStl", "OutF");
    b.write_enum("PntT", "FrFl", "GrFl");
    b.write_unit_float("Sz  ", Unit::Pixels, 3.0);
    b.write_gradient("Grad", &Gradient::two_color("Copper", Color::rgb(151, 70, 26), Color::rgb(251, 216, 197)));
    b.write_enum("Type", "GrdT", "Lnr ");
    b.leave_descriptor();

    b.leave_descriptor();
    b.leave_descriptor();
}

fn sample_document() -> AslDocument {
    let tile = gradient_tile();
    let mut b = AslBuilder::new();
    b.enter_list("Patterns");
    let uuid = b.write_pattern("", &tile);
    b.leave_list();
    let pattern = PatternRef {
        name: tile.name.clone(),
        uuid,
    };
    style(&mut b, "First", "3b0f6d6e-0000-4000-8000-000000000001", &pattern);
    style(&mut b, "Second", "3b0f6d6e-0000-4000-8000-000000000002", &pattern);
    b.finish().unwrap()
}

#[test]
fn bytes_survive_the_xml_form() {
    let original = write_document(&sample_document()).unwrap();

    let doc = read_document(&original, &CodecConfig::strict()).unwrap();
    let xml = asl_core::document_to_xml(&doc).unwrap();
    let restored = xml_to_document(&xml).unwrap();
    assert_eq!(restored, doc);

    let rewritten = write_document(&restored).unwrap();
    assert_eq!(rewritten, original);
}

#[test]
fn decoded_document_matches_the_built_one() {
    let doc = sample_document();
    let bytes = write_document(&doc).unwrap();
    assert_eq!(read_document(&bytes, &CodecConfig::strict()).unwrap(), doc);
    assert_eq!(bytes.len() % 4, 0);
}

#[test]
fn walk_reports_patterns_and_references() {
    let bytes = write_document(&sample_document()).unwrap();
    let doc = read_document(&bytes, &CodecConfig::default()).unwrap();
    let mut dump = DumpCatcher::new();
    asl_core::walk_document(&doc, &mut dump);

    let pattern = dump.records.iter().find(|r| r.kind == "pattern").unwrap();
    assert_eq!(pattern.path, "/Patterns/KisPattern");
    let refs: Vec<_> = dump.records.iter().filter(|r| r.kind == "patternref").collect();
    assert_eq!(refs.len(), 4);
    assert_eq!(refs[0].path, "/Styl/Lefx/patternFill/Ptrn");
    assert_eq!(refs[1].path, "/Styl/Lefx/ebbl/Ptrn");
    assert_eq!(dump.records.iter().filter(|r| r.kind == "newstyle").count(), 2);
}

fn two_styles_with_a_broken_first() -> Vec<u8> {
    let mut b = AslBuilder::new();
    let pattern = PatternRef {
        name: "none".into(),
        uuid: "none".into(),
    };
    style(&mut b, "First", "a", &pattern);
    style(&mut b, "Second", "b", &pattern);
    let mut bytes = write_document(&b.finish().unwrap()).unwrap();

    // Corrupt the type tag of the first text value, which belongs to the first style.
    let at = bytes.windows(4).position(|w| w == b"TEXT").unwrap();
    bytes[at..at + 4].copy_from_slice(b"XXXX");
    bytes
}

#[test]
fn lenient_reader_skips_a_broken_style() {
    let bytes = two_styles_with_a_broken_first();
    let doc = read_document(&bytes, &CodecConfig::default()).unwrap();

    let styles = doc.styles();
    assert_eq!(styles.len(), 1);
    let name = styles[0].0.child("Nm  ");
    assert_eq!(name, Some(&asl_core::Value::Text("Second".into())));
}

#[test]
fn strict_reader_rejects_a_broken_style() {
    let bytes = two_styles_with_a_broken_first();
    let err = read_document(&bytes, &CodecConfig::strict()).unwrap_err();
    assert!(matches!(err, ParseError::UnsupportedOsType { ref tag } if tag == "XXXX"));
}

#[test]
fn truncated_stream_is_reported() {
    let bytes = write_document(&sample_document()).unwrap();
    let err = read_document(&bytes[..bytes.len() / 2], &CodecConfig::strict()).unwrap_err();
    assert!(matches!(err, ParseError::Truncated));
}

// Offsets inside a virtual array list written at position 0.
const FIRST_PLANE_LEN_AT: usize = 32;
const FIRST_PLANE_COMPRESSION_AT: usize = 58;

fn first_plane(tile: &PatternTile) -> Vec<u8> {
    let mut cursor = Cursor::new(Vec::new());
    write_virtual_array_list::<_, BigEndian>(&mut cursor, tile).unwrap();
    cursor.into_inner()
}

#[test]
fn flat_tile_is_run_length_encoded() {
    let tile = PatternTile::filled("Flat", 8, 4, [12, 34, 56, 255]);
    let bytes = first_plane(&tile);

    assert_eq!(bytes[FIRST_PLANE_COMPRESSION_AT], 1);
    let plane_len = BigEndian::read_u32(&bytes[FIRST_PLANE_LEN_AT..]);
    let table = &bytes[FIRST_PLANE_COMPRESSION_AT + 1..];
    let rows: u32 = (0..4).map(|i| BigEndian::read_u16(&table[i * 2..]) as u32).sum();
    assert_eq!(rows + 2 * 4, plane_len - PLANE_HEADER_LEN);
}

#[test]
fn noisy_tile_is_stored_raw() {
    let mut rgba = Vec::new();
    for i in 0..16u8 {
        rgba.extend_from_slice(&[i.wrapping_mul(97), i.wrapping_mul(31), i, 255]);
    }
    let tile = PatternTile::from_rgba("Noise", 4, 4, &rgba).unwrap();
    let bytes = first_plane(&tile);

    assert_eq!(bytes[FIRST_PLANE_COMPRESSION_AT], 0);
    let plane_len = BigEndian::read_u32(&bytes[FIRST_PLANE_LEN_AT..]);
    assert_eq!(plane_len, PLANE_HEADER_LEN + 16);
}
