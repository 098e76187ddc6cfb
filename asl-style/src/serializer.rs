//! Reads and writes [`LayerStyle`]s through the descriptor codec.
//!
//! Reading walks the decoded document into a [`CallbackCatcher`] whose
//! handlers are bound once per read; every style-level value is routed to the
//! style opened by the most recent info descriptor. Embedded patterns are
//! registered as they are met, which relies on the pattern list preceding the
//! style bodies in the stream.

use std::io::{Cursor, Read, Seek, Write};
use std::mem;

use asl_core::ir::{INFO_CLASS_ID, PATTERNS_KEY};
use asl_core::{
    walk_document, AslBuilder, AslDocument, AslReader, AslWriter, CallbackCatcher, CodecConfig,
    Gradient, PatternRef, PatternTile, SubscribeError, Unit, Value,
};
use byteorder::ByteOrder;

use crate::corrector::correct_fill_types;
use crate::error::{Result, StyleError};
use crate::model::{
    BevelDirection, BevelStyle, BlendMode, FillType, Glow, GlowSource, GradientStyle, LayerStyle,
    PsdEnum, Shadow, StrokePosition, Technique,
};
use crate::resources::{LocalResources, ResourceRegistry};

/// Where effects live in a standalone `.asl` file.
pub const STYLE_PREFIX: &str = "/Styl/Lefx";
/// Where effects live in a PSD `lfx2` section.
pub const PSD_PREFIX: &str = "/null";

const PLACEHOLDER_SIZE: u32 = 32;
const PLACEHOLDER_NAME: &str = "invalid";
const INVALID_SUFFIX: &str = "_invalid";

#[derive(Default)]
struct ReadState {
    styles: Vec<LayerStyle>,
    resources: LocalResources,
    valid: bool,
}

impl ReadState {
    fn current(&mut self) -> &mut LayerStyle {
        if self.styles.is_empty() {
            log::warn!("effect values before any info descriptor, opening an unnamed style");
            self.styles.push(LayerStyle::new(""));
        }
        let last = self.styles.len() - 1;
        &mut self.styles[last]
    }

    fn register_pattern(&mut self, tile: &PatternTile, uuid: &str) {
        log::debug!("registering pattern {:?} as {}", tile.name, uuid);
        self.resources.register_pattern(uuid, tile.clone());
    }

    /// Unknown identifiers resolve to a red placeholder and mark the read invalid.
    fn resolve_pattern(&mut self, pattern: &PatternRef) -> PatternRef {
        if self.resources.resolve_pattern(&pattern.uuid).is_some() {
            return pattern.clone();
        }
        log::warn!(
            "style references a missing pattern {:?} (name {:?})",
            pattern.uuid,
            pattern.name
        );
        let uuid = format!("{}{}", pattern.uuid, INVALID_SUFFIX);
        if self.resources.resolve_pattern(&uuid).is_none() {
            let placeholder =
                PatternTile::filled(PLACEHOLDER_NAME, PLACEHOLDER_SIZE, PLACEHOLDER_SIZE, [255, 0, 0, 255]);
            self.resources.register_pattern(&uuid, placeholder);
        }
        self.valid = false;
        PatternRef {
            name: PLACEHOLDER_NAME.to_string(),
            uuid,
        }
    }

    fn assign_gradient(&mut self, gradient: &Gradient) -> Gradient {
        self.resources.register_gradient(gradient.clone());
        gradient.clone()
    }
}

type Catcher = CallbackCatcher<ReadState>;
type Bind = std::result::Result<(), SubscribeError>;

fn bind_patterns(c: &mut Catcher) -> Bind {
    for path in ["/Patterns/KisPattern", "/patterns/KisPattern"] {
        c.subscribe_pattern(path, |s, tile, uuid| s.register_pattern(tile, uuid))?;
    }
    Ok(())
}

fn bind_style(c: &mut Catcher, prefix: &str) -> Bind {
    c.subscribe_new_style(|s| s.styles.push(LayerStyle::new("")))?;
    c.subscribe_text("/null/Nm  ", |s, v| s.current().name = v.to_string())?;
    c.subscribe_text("/null/Idnt", |s, v| s.current().uuid = v.to_string())?;
    c.subscribe_boolean(format!("{prefix}/masterFXSwitch"), |s, v| s.current().enabled = v)?;

    bind_shadow(c, &format!("{prefix}/DrSh"), |s| &mut s.drop_shadow, true)?;
    bind_shadow(c, &format!("{prefix}/IrSh"), |s| &mut s.inner_shadow, false)?;
    bind_glow(c, &format!("{prefix}/OrGl"), |s| &mut s.outer_glow, false)?;
    bind_glow(c, &format!("{prefix}/IrGl"), |s| &mut s.inner_glow, true)?;
    bind_bevel(c, &format!("{prefix}/ebbl"))?;
    bind_satin(c, &format!("{prefix}/ChFX"))?;
    bind_color_overlay(c, &format!("{prefix}/SoFi"))?;
    bind_gradient_overlay(c, &format!("{prefix}/GrFl"))?;
    bind_pattern_overlay(c, &format!("{prefix}/patternFill"))?;
    bind_stroke(c, &format!("{prefix}/FrFX"))
}

fn bind_shadow(c: &mut Catcher, base: &str, get: fn(&mut LayerStyle) -> &mut Shadow, drop: bool) -> Bind {
    let at = |leaf: &str| format!("{base}/{leaf}");
    c.subscribe_boolean(at("enab"), move |s, v| get(s.current()).enabled = v)?;
    c.subscribe_enum(at("Md  "), "BlnM", move |s, v| {
        get(s.current()).blend_mode = BlendMode::from_code_or_default(v)
    })?;
    c.subscribe_color(at("Clr "), move |s, v| get(s.current()).color = v)?;
    c.subscribe_unit_float(at("Opct"), Unit::Percent, move |s, v| get(s.current()).opacity = v)?;
    c.subscribe_boolean(at("uglg"), move |s, v| get(s.current()).use_global_light = v)?;
    c.subscribe_unit_float(at("lagl"), Unit::Angle, move |s, v| get(s.current()).angle = v)?;
    c.subscribe_unit_float(at("Dstn"), Unit::Pixels, move |s, v| get(s.current()).distance = v)?;
    c.subscribe_unit_float(at("Ckmt"), Unit::Pixels, move |s, v| get(s.current()).spread = v)?;
    c.subscribe_unit_float(at("blur"), Unit::Pixels, move |s, v| get(s.current()).size = v)?;
    c.subscribe_unit_float(at("Nose"), Unit::Percent, move |s, v| get(s.current()).noise = v)?;
    c.subscribe_boolean(at("AntA"), move |s, v| get(s.current()).anti_aliased = v)?;
    c.subscribe_curve(at("TrnS"), move |s, v| get(s.current()).contour = v.clone())?;
    if drop {
        c.subscribe_boolean(at("layerConceals"), move |s, v| get(s.current()).knocks_out = v)?;
    }
    Ok(())
}

fn bind_glow(c: &mut Catcher, base: &str, get: fn(&mut LayerStyle) -> &mut Glow, inner: bool) -> Bind {
    let at = |leaf: &str| format!("{base}/{leaf}");
    c.subscribe_boolean(at("enab"), move |s, v| get(s.current()).enabled = v)?;
    c.subscribe_enum(at("Md  "), "BlnM", move |s, v| {
        get(s.current()).blend_mode = BlendMode::from_code_or_default(v)
    })?;
    c.subscribe_color(at("Clr "), move |s, v| get(s.current()).color = v)?;
    c.subscribe_gradient(at("Grad"), move |s, v| {
        let gradient = s.assign_gradient(v);
        get(s.current()).gradient = Some(gradient);
    })?;
    c.subscribe_unit_float(at("Opct"), Unit::Percent, move |s, v| get(s.current()).opacity = v)?;
    c.subscribe_enum(at("GlwT"), "BETE", move |s, v| {
        get(s.current()).technique = Technique::from_code_or_default(v)
    })?;
    c.subscribe_unit_float(at("Ckmt"), Unit::Pixels, move |s, v| get(s.current()).spread = v)?;
    c.subscribe_unit_float(at("blur"), Unit::Pixels, move |s, v| get(s.current()).size = v)?;
    c.subscribe_unit_float(at("Nose"), Unit::Percent, move |s, v| get(s.current()).noise = v)?;
    c.subscribe_unit_float(at("ShdN"), Unit::Percent, move |s, v| get(s.current()).jitter = v)?;
    c.subscribe_boolean(at("AntA"), move |s, v| get(s.current()).anti_aliased = v)?;
    c.subscribe_curve(at("TrnS"), move |s, v| get(s.current()).contour = v.clone())?;
    c.subscribe_unit_float(at("Inpr"), Unit::Percent, move |s, v| get(s.current()).range = v)?;
    if inner {
        c.subscribe_enum(at("glwS"), "IGSr", move |s, v| {
            get(s.current()).source = GlowSource::from_code_or_default(v)
        })?;
    }
    Ok(())
}

fn bind_bevel(c: &mut Catcher, base: &str) -> Bind {
    let at = |leaf: &str| format!("{base}/{leaf}");
    c.subscribe_boolean(at("enab"), |s, v| s.current().bevel_emboss.enabled = v)?;
    c.subscribe_enum(at("hglM"), "BlnM", |s, v| {
        s.current().bevel_emboss.highlight_blend_mode = BlendMode::from_code_or_default(v)
    })?;
    c.subscribe_color(at("hglC"), |s, v| s.current().bevel_emboss.highlight_color = v)?;
    c.subscribe_unit_float(at("hglO"), Unit::Percent, |s, v| {
        s.current().bevel_emboss.highlight_opacity = v
    })?;
    c.subscribe_enum(at("sdwM"), "BlnM", |s, v| {
        s.current().bevel_emboss.shadow_blend_mode = BlendMode::from_code_or_default(v)
    })?;
    c.subscribe_color(at("sdwC"), |s, v| s.current().bevel_emboss.shadow_color = v)?;
    c.subscribe_unit_float(at("sdwO"), Unit::Percent, |s, v| {
        s.current().bevel_emboss.shadow_opacity = v
    })?;
    c.subscribe_enum(at("bvlT"), "bvlT", |s, v| {
        s.current().bevel_emboss.technique = Technique::from_code_or_default(v)
    })?;
    c.subscribe_enum(at("bvlS"), "BESl", |s, v| {
        s.current().bevel_emboss.style = BevelStyle::from_code_or_default(v)
    })?;
    c.subscribe_boolean(at("uglg"), |s, v| s.current().bevel_emboss.use_global_light = v)?;
    c.subscribe_unit_float(at("lagl"), Unit::Angle, |s, v| s.current().bevel_emboss.angle = v)?;
    c.subscribe_unit_float(at("Lald"), Unit::Angle, |s, v| s.current().bevel_emboss.altitude = v)?;
    c.subscribe_unit_float(at("srgR"), Unit::Percent, |s, v| s.current().bevel_emboss.depth = v)?;
    c.subscribe_unit_float(at("blur"), Unit::Pixels, |s, v| s.current().bevel_emboss.size = v)?;
    c.subscribe_enum(at("bvlD"), "BESs", |s, v| {
        s.current().bevel_emboss.direction = BevelDirection::from_code_or_default(v)
    })?;
    c.subscribe_curve(at("TrnS"), |s, v| s.current().bevel_emboss.contour = v.clone())?;
    c.subscribe_boolean(at("antialiasGloss"), |s, v| {
        s.current().bevel_emboss.gloss_anti_aliased = v
    })?;
    c.subscribe_unit_float(at("Sftn"), Unit::Pixels, |s, v| s.current().bevel_emboss.soften = v)?;

    c.subscribe_boolean(at("useShape"), |s, v| s.current().bevel_emboss.contour_enabled = v)?;
    c.subscribe_curve(at("MpgS"), |s, v| s.current().bevel_emboss.gloss_contour = v.clone())?;
    c.subscribe_boolean(at("AntA"), |s, v| s.current().bevel_emboss.anti_aliased = v)?;
    c.subscribe_unit_float(at("Inpr"), Unit::Percent, |s, v| {
        s.current().bevel_emboss.contour_range = v
    })?;

    c.subscribe_boolean(at("useTexture"), |s, v| s.current().bevel_emboss.texture_enabled = v)?;
    c.subscribe_boolean(at("InvT"), |s, v| s.current().bevel_emboss.texture_invert = v)?;
    c.subscribe_boolean(at("Algn"), |s, v| {
        s.current().bevel_emboss.texture_align_with_layer = v
    })?;
    c.subscribe_unit_float(at("Scl "), Unit::Percent, |s, v| {
        s.current().bevel_emboss.texture_scale = v
    })?;
    c.subscribe_unit_float(at("textureDepth"), Unit::Percent, |s, v| {
        s.current().bevel_emboss.texture_depth = v
    })?;
    c.subscribe_pattern_ref(at("Ptrn"), |s, v| {
        let pattern = s.resolve_pattern(v);
        s.current().bevel_emboss.texture_pattern = Some(pattern);
    })?;
    c.subscribe_point(at("phase"), |s, v| s.current().bevel_emboss.texture_phase = v)?;
    Ok(())
}

fn bind_satin(c: &mut Catcher, base: &str) -> Bind {
    let at = |leaf: &str| format!("{base}/{leaf}");
    c.subscribe_boolean(at("enab"), |s, v| s.current().satin.enabled = v)?;
    c.subscribe_enum(at("Md  "), "BlnM", |s, v| {
        s.current().satin.blend_mode = BlendMode::from_code_or_default(v)
    })?;
    c.subscribe_color(at("Clr "), |s, v| s.current().satin.color = v)?;
    c.subscribe_boolean(at("AntA"), |s, v| s.current().satin.anti_aliased = v)?;
    c.subscribe_boolean(at("Invr"), |s, v| s.current().satin.invert = v)?;
    c.subscribe_unit_float(at("Opct"), Unit::Percent, |s, v| s.current().satin.opacity = v)?;
    c.subscribe_unit_float(at("lagl"), Unit::Angle, |s, v| s.current().satin.angle = v)?;
    c.subscribe_unit_float(at("Dstn"), Unit::Pixels, |s, v| s.current().satin.distance = v)?;
    c.subscribe_unit_float(at("blur"), Unit::Pixels, |s, v| s.current().satin.size = v)?;
    c.subscribe_curve(at("MpgS"), |s, v| s.current().satin.contour = v.clone())?;
    Ok(())
}

fn bind_color_overlay(c: &mut Catcher, base: &str) -> Bind {
    let at = |leaf: &str| format!("{base}/{leaf}");
    c.subscribe_boolean(at("enab"), |s, v| s.current().color_overlay.enabled = v)?;
    c.subscribe_enum(at("Md  "), "BlnM", |s, v| {
        s.current().color_overlay.blend_mode = BlendMode::from_code_or_default(v)
    })?;
    c.subscribe_unit_float(at("Opct"), Unit::Percent, |s, v| s.current().color_overlay.opacity = v)?;
    c.subscribe_color(at("Clr "), |s, v| s.current().color_overlay.color = v)?;
    Ok(())
}

fn bind_gradient_overlay(c: &mut Catcher, base: &str) -> Bind {
    let at = |leaf: &str| format!("{base}/{leaf}");
    c.subscribe_boolean(at("enab"), |s, v| s.current().gradient_overlay.enabled = v)?;
    c.subscribe_enum(at("Md  "), "BlnM", |s, v| {
        s.current().gradient_overlay.blend_mode = BlendMode::from_code_or_default(v)
    })?;
    c.subscribe_unit_float(at("Opct"), Unit::Percent, |s, v| {
        s.current().gradient_overlay.opacity = v
    })?;
    c.subscribe_gradient(at("Grad"), |s, v| {
        let gradient = s.assign_gradient(v);
        s.current().gradient_overlay.gradient = Some(gradient);
    })?;
    c.subscribe_unit_float(at("Angl"), Unit::Angle, |s, v| s.current().gradient_overlay.angle = v)?;
    c.subscribe_enum(at("Type"), "GrdT", |s, v| {
        s.current().gradient_overlay.style = GradientStyle::from_code_or_default(v)
    })?;
    c.subscribe_boolean(at("Rvrs"), |s, v| s.current().gradient_overlay.reverse = v)?;
    c.subscribe_boolean(at("Algn"), |s, v| s.current().gradient_overlay.align_with_layer = v)?;
    c.subscribe_unit_float(at("Scl "), Unit::Percent, |s, v| s.current().gradient_overlay.scale = v)?;
    c.subscribe_point(at("Ofst"), |s, v| s.current().gradient_overlay.offset = v)?;
    c.subscribe_boolean(at("Dthr"), |s, v| s.current().gradient_overlay.dither = v)?;
    Ok(())
}

fn bind_pattern_overlay(c: &mut Catcher, base: &str) -> Bind {
    let at = |leaf: &str| format!("{base}/{leaf}");
    c.subscribe_boolean(at("enab"), |s, v| s.current().pattern_overlay.enabled = v)?;
    c.subscribe_enum(at("Md  "), "BlnM", |s, v| {
        s.current().pattern_overlay.blend_mode = BlendMode::from_code_or_default(v)
    })?;
    c.subscribe_unit_float(at("Opct"), Unit::Percent, |s, v| s.current().pattern_overlay.opacity = v)?;
    c.subscribe_pattern_ref(at("Ptrn"), |s, v| {
        let pattern = s.resolve_pattern(v);
        s.current().pattern_overlay.pattern = Some(pattern);
    })?;
    c.subscribe_unit_float(at("Scl "), Unit::Percent, |s, v| s.current().pattern_overlay.scale = v)?;
    c.subscribe_boolean(at("Algn"), |s, v| s.current().pattern_overlay.align_with_layer = v)?;
    c.subscribe_point(at("phase"), |s, v| s.current().pattern_overlay.phase = v)?;
    Ok(())
}

fn bind_stroke(c: &mut Catcher, base: &str) -> Bind {
    let at = |leaf: &str| format!("{base}/{leaf}");
    c.subscribe_boolean(at("enab"), |s, v| s.current().stroke.enabled = v)?;
    c.subscribe_enum(at("Styl"), "FStl", |s, v| {
        s.current().stroke.position = StrokePosition::from_code_or_default(v)
    })?;
    c.subscribe_enum(at("PntT"), "FrFl", |s, v| {
        s.current().stroke.fill_type = FillType::from_code_or_default(v)
    })?;
    c.subscribe_enum(at("Md  "), "BlnM", |s, v| {
        s.current().stroke.blend_mode = BlendMode::from_code_or_default(v)
    })?;
    c.subscribe_unit_float(at("Opct"), Unit::Percent, |s, v| s.current().stroke.opacity = v)?;
    c.subscribe_unit_float(at("Sz  "), Unit::Pixels, |s, v| s.current().stroke.size = v)?;
    c.subscribe_color(at("Clr "), |s, v| s.current().stroke.color = v)?;
    c.subscribe_gradient(at("Grad"), |s, v| {
        let gradient = s.assign_gradient(v);
        s.current().stroke.gradient = Some(gradient);
    })?;
    c.subscribe_unit_float(at("Angl"), Unit::Angle, |s, v| s.current().stroke.angle = v)?;
    c.subscribe_unit_float(at("Scl "), Unit::Percent, |s, v| s.current().stroke.scale = v)?;
    c.subscribe_enum(at("Type"), "GrdT", |s, v| {
        s.current().stroke.style = GradientStyle::from_code_or_default(v)
    })?;
    c.subscribe_boolean(at("Rvrs"), |s, v| s.current().stroke.reverse = v)?;
    c.subscribe_boolean(at("Algn"), |s, v| s.current().stroke.align_with_layer = v)?;
    c.subscribe_point(at("Ofst"), |s, v| s.current().stroke.offset = v)?;
    c.subscribe_boolean(at("Dthr"), |s, v| s.current().stroke.dither = v)?;
    c.subscribe_pattern_ref(at("Ptrn"), |s, v| {
        let pattern = s.resolve_pattern(v);
        s.current().stroke.pattern = Some(pattern);
    })?;
    // Pattern strokes store the alignment flag under a different key.
    c.subscribe_boolean(at("Lnkd"), |s, v| s.current().stroke.align_with_layer = v)?;
    c.subscribe_point(at("phase"), |s, v| s.current().stroke.phase = v)?;
    Ok(())
}

/// Converts between [`LayerStyle`]s and the binary format.
#[derive(Debug, Clone, Default)]
pub struct StyleSerializer {
    config: CodecConfig,
    styles: Vec<LayerStyle>,
    resources: LocalResources,
    valid: bool,
}

impl StyleSerializer {
    pub fn new(config: CodecConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    pub fn styles(&self) -> &[LayerStyle] {
        &self.styles
    }

    pub fn into_styles(self) -> Vec<LayerStyle> {
        self.styles
    }

    pub fn set_styles(&mut self, styles: Vec<LayerStyle>) {
        self.styles = styles;
        self.valid = true;
    }

    pub fn resources(&self) -> &LocalResources {
        &self.resources
    }

    pub fn resources_mut(&mut self) -> &mut LocalResources {
        &mut self.resources
    }

    /// `false` once a read had to substitute a missing pattern.
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn read_from_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.read_from_device(&mut Cursor::new(bytes))
    }

    /// Reads a standalone `.asl` stream. On failure the serializer is left
    /// without styles and the error is logged as well as returned.
    pub fn read_from_device<R: Read + Seek + ?Sized>(&mut self, r: &mut R) -> Result<()> {
        self.styles.clear();
        self.resources = LocalResources::new();
        self.valid = false;
        let doc = AslReader::new(self.config.clone())
            .read_file(r)
            .map_err(|e| warn_failed(e.into()))?;
        self.read_document(&doc)
    }

    /// Reads styles out of an already decoded standalone document. Patterns
    /// registered by an earlier read are dropped first.
    pub fn read_document(&mut self, doc: &AslDocument) -> Result<()> {
        self.resources = LocalResources::new();
        self.apply(doc, STYLE_PREFIX)
    }

    /// Reads the layer-effect sections of a PSD: the optional `Patt` block
    /// first, then the `lfx2` descriptor.
    pub fn read_psd_sections<B: ByteOrder>(&mut self, lfx2: &[u8], patterns: Option<&[u8]>) -> Result<()> {
        self.styles.clear();
        self.resources = LocalResources::new();
        self.valid = false;
        let reader = AslReader::new(self.config.clone());
        if let Some(block) = patterns {
            let doc = reader
                .read_pattern_section::<_, B>(&mut Cursor::new(block), block.len() as u64)
                .map_err(|e| warn_failed(e.into()))?;
            self.register_patterns(&doc)?;
        }
        let doc = reader
            .read_lfx2_section::<_, B>(&mut Cursor::new(lfx2))
            .map_err(|e| warn_failed(e.into()))?;
        self.apply(&doc, PSD_PREFIX)
    }

    /// Registers every embedded pattern of `doc` without touching the styles.
    pub fn register_patterns(&mut self, doc: &AslDocument) -> Result<()> {
        let mut catcher = CallbackCatcher::new(ReadState::default());
        bind_patterns(&mut catcher)?;
        catcher.state_mut().resources = mem::take(&mut self.resources);
        walk_document(doc, &mut catcher);
        self.resources = catcher.into_state().resources;
        Ok(())
    }

    fn apply(&mut self, doc: &AslDocument, prefix: &str) -> Result<()> {
        let mut catcher = CallbackCatcher::new(ReadState::default());
        bind_patterns(&mut catcher)?;
        bind_style(&mut catcher, prefix)?;
        log::debug!("bound {} layer style fields under {:?}", catcher.subscription_count(), prefix);

        let state = catcher.state_mut();
        state.resources = mem::take(&mut self.resources);
        state.valid = true;
        walk_document(doc, &mut catcher);

        let state = catcher.into_state();
        self.resources = state.resources;
        self.valid = state.valid;
        self.styles = state.styles;
        for style in &mut self.styles {
            correct_fill_types(style);
            style.valid = !style.is_empty();
        }
        log::debug!("read {} layer styles", self.styles.len());
        Ok(())
    }

    /// Builds the standalone document: distinct referenced patterns first,
    /// then an info descriptor and an effects descriptor per style.
    pub fn form_document(&self) -> Result<AslDocument> {
        if self.styles.is_empty() {
            return Err(StyleError::Empty);
        }

        let mut embedded: Vec<(&str, &PatternTile)> = Vec::new();
        for pattern in self.styles.iter().flat_map(LayerStyle::pattern_refs) {
            if embedded.iter().any(|(uuid, _)| *uuid == pattern.uuid) {
                continue;
            }
            match self.resources.resolve_pattern(&pattern.uuid) {
                Some(tile) => embedded.push((&pattern.uuid, tile)),
                None => log::warn!("pattern {:?} is not registered, not embedding it", pattern.uuid),
            }
        }

        let mut w = AslBuilder::new();
        if !embedded.is_empty() {
            w.enter_list(PATTERNS_KEY);
            for (uuid, tile) in &embedded {
                w.write_pattern_with_uuid("", uuid, tile);
            }
            w.leave_list();
        }
        for style in &self.styles {
            write_style(&mut w, style, &self.resources);
        }
        Ok(w.finish()?)
    }

    /// Same as [`Self::form_document`] with the effects of the first style
    /// moved into its info descriptor, the layout of a PSD `lfx2` section.
    pub fn form_psd_document(&self) -> Result<AslDocument> {
        let mut doc = self.form_document()?;
        hoist_effects(&mut doc);
        Ok(doc)
    }

    pub fn save<W: Write + Seek + ?Sized>(&self, w: &mut W) -> Result<()> {
        let doc = self.form_document()?;
        AslWriter::new().write_file(w, &doc)?;
        Ok(())
    }

    pub fn save_to_bytes(&self) -> Result<Vec<u8>> {
        let mut cursor = Cursor::new(Vec::new());
        self.save(&mut cursor)?;
        Ok(cursor.into_inner())
    }

    /// Returns the `lfx2` section and the `Patt` block of the first style.
    pub fn write_psd_sections<B: ByteOrder>(&self) -> Result<(Vec<u8>, Vec<u8>)> {
        let doc = self.form_psd_document()?;
        let writer = AslWriter::new();
        let mut lfx2 = Vec::new();
        writer.write_lfx2_section::<_, B>(&mut lfx2, &doc)?;
        let mut patterns = Cursor::new(Vec::new());
        writer.write_pattern_section::<_, B>(&mut patterns, &doc)?;
        Ok((lfx2, patterns.into_inner()))
    }
}

fn warn_failed(err: StyleError) -> StyleError {
    log::warn!("{}", err);
    err
}

fn hoist_effects(doc: &mut AslDocument) {
    let mut effects = Vec::new();
    for node in &mut doc.children {
        if let Value::Descriptor(styl) = &mut node.value {
            if styl.class_id != "Styl" {
                continue;
            }
            if let Some(pos) = styl.children.iter().position(|n| n.key == "Lefx") {
                if let Value::Descriptor(lefx) = styl.children.remove(pos).value {
                    effects = lefx.children;
                }
            }
            break;
        }
    }
    let info = doc.children.iter_mut().find_map(|n| match &mut n.value {
        Value::Descriptor(d) if d.class_id == INFO_CLASS_ID => Some(d),
        _ => None,
    });
    if let Some(info) = info {
        info.children = effects;
    }
}

fn write_pattern_ref(
    w: &mut AslBuilder,
    key: &str,
    pattern: Option<&PatternRef>,
    resources: &dyn ResourceRegistry,
) {
    match pattern {
        Some(pattern) => {
            if resources.resolve_pattern(&pattern.uuid).is_none() {
                log::warn!("writing a reference to unknown pattern {:?}", pattern.uuid);
            }
            w.write_pattern_ref(key, pattern);
        }
        None => {
            log::warn!("effect uses a pattern but has none set");
            w.write_pattern_ref(
                key,
                &PatternRef {
                    name: PLACEHOLDER_NAME.to_string(),
                    uuid: "invalid-uuid".to_string(),
                },
            );
        }
    }
}

fn write_blend_mode(w: &mut AslBuilder, key: &str, mode: BlendMode) {
    w.write_enum(key, "BlnM", mode.code());
}

fn write_shadow(w: &mut AslBuilder, key: &str, shadow: &Shadow, drop: bool) {
    w.enter_descriptor(key, "", key);
    w.write_boolean("enab", shadow.enabled);
    write_blend_mode(w, "Md  ", shadow.blend_mode);
    w.write_color("Clr ", shadow.color);
    w.write_unit_float("Opct", Unit::Percent, shadow.opacity);
    w.write_boolean("uglg", shadow.use_global_light);
    w.write_unit_float("lagl", Unit::Angle, shadow.angle);
    w.write_unit_float("Dstn", Unit::Pixels, shadow.distance);
    w.write_unit_float("Ckmt", Unit::Pixels, shadow.spread);
    w.write_unit_float("blur", Unit::Pixels, shadow.size);
    w.write_unit_float("Nose", Unit::Percent, shadow.noise);
    w.write_boolean("AntA", shadow.anti_aliased);
    w.write_curve("TrnS", &shadow.contour);
    if drop {
        w.write_boolean("layerConceals", shadow.knocks_out);
    }
    w.leave_descriptor();
}

fn write_glow(w: &mut AslBuilder, key: &str, glow: &Glow, inner: bool) {
    w.enter_descriptor(key, "", key);
    w.write_boolean("enab", glow.enabled);
    write_blend_mode(w, "Md  ", glow.blend_mode);
    match (&glow.gradient, glow.fill_type) {
        (Some(gradient), FillType::Gradient) => w.write_gradient("Grad", gradient),
        (None, FillType::Gradient) => {
            log::warn!("{} glow is gradient filled without a gradient, writing its colour", key);
            w.write_color("Clr ", glow.color);
        }
        _ => w.write_color("Clr ", glow.color),
    }
    w.write_unit_float("Opct", Unit::Percent, glow.opacity);
    w.write_enum("GlwT", "BETE", glow.technique.code());
    w.write_unit_float("Ckmt", Unit::Pixels, glow.spread);
    w.write_unit_float("blur", Unit::Pixels, glow.size);
    if inner {
        w.write_unit_float("ShdN", Unit::Percent, glow.jitter);
        w.write_unit_float("Nose", Unit::Percent, glow.noise);
    } else {
        w.write_unit_float("Nose", Unit::Percent, glow.noise);
        w.write_unit_float("ShdN", Unit::Percent, glow.jitter);
    }
    w.write_boolean("AntA", glow.anti_aliased);
    if inner {
        w.write_enum("glwS", "IGSr", glow.source.code());
    }
    w.write_curve("TrnS", &glow.contour);
    w.write_unit_float("Inpr", Unit::Percent, glow.range);
    w.leave_descriptor();
}

fn write_style(w: &mut AslBuilder, style: &LayerStyle, resources: &dyn ResourceRegistry) {
    w.enter_descriptor("", "", INFO_CLASS_ID);
    w.write_text("Nm  ", &style.name);
    w.write_text("Idnt", &style.uuid);
    w.leave_descriptor();

    w.enter_descriptor("", "", "Styl");
    w.enter_descriptor("documentMode", "", "documentMode");
    w.leave_descriptor();

    w.enter_descriptor("Lefx", "", "Lefx");
    w.write_unit_float("Scl ", Unit::Percent, 100.0);
    w.write_boolean("masterFXSwitch", style.enabled);

    if style.drop_shadow.enabled {
        write_shadow(w, "DrSh", &style.drop_shadow, true);
    }
    if style.inner_shadow.enabled {
        write_shadow(w, "IrSh", &style.inner_shadow, false);
    }
    if style.outer_glow.enabled {
        write_glow(w, "OrGl", &style.outer_glow, false);
    }
    if style.inner_glow.enabled {
        write_glow(w, "IrGl", &style.inner_glow, true);
    }

    let bevel = &style.bevel_emboss;
    if bevel.enabled {
        w.enter_descriptor("ebbl", "", "ebbl");
        w.write_boolean("enab", bevel.enabled);
        write_blend_mode(w, "hglM", bevel.highlight_blend_mode);
        w.write_color("hglC", bevel.highlight_color);
        w.write_unit_float("hglO", Unit::Percent, bevel.highlight_opacity);
        write_blend_mode(w, "sdwM", bevel.shadow_blend_mode);
        w.write_color("sdwC", bevel.shadow_color);
        w.write_unit_float("sdwO", Unit::Percent, bevel.shadow_opacity);
        w.write_enum("bvlT", "bvlT", bevel.technique.code());
        w.write_enum("bvlS", "BESl", bevel.style.code());
        w.write_boolean("uglg", bevel.use_global_light);
        w.write_unit_float("lagl", Unit::Angle, bevel.angle);
        w.write_unit_float("Lald", Unit::Angle, bevel.altitude);
        w.write_unit_float("srgR", Unit::Percent, bevel.depth);
        w.write_unit_float("blur", Unit::Pixels, bevel.size);
        w.write_enum("bvlD", "BESs", bevel.direction.code());
        w.write_curve("TrnS", &bevel.contour);
        w.write_boolean("antialiasGloss", bevel.gloss_anti_aliased);
        w.write_unit_float("Sftn", Unit::Pixels, bevel.soften);
        if bevel.contour_enabled {
            w.write_boolean("useShape", bevel.contour_enabled);
            w.write_curve("MpgS", &bevel.gloss_contour);
            w.write_boolean("AntA", bevel.anti_aliased);
            w.write_unit_float("Inpr", Unit::Percent, bevel.contour_range);
        }
        w.write_boolean("useTexture", bevel.texture_enabled);
        if bevel.texture_enabled {
            w.write_boolean("InvT", bevel.texture_invert);
            w.write_boolean("Algn", bevel.texture_align_with_layer);
            w.write_unit_float("Scl ", Unit::Percent, bevel.texture_scale);
            w.write_unit_float("textureDepth", Unit::Percent, bevel.texture_depth);
            write_pattern_ref(w, "Ptrn", bevel.texture_pattern.as_ref(), resources);
            w.write_phase_point("phase", bevel.texture_phase);
        }
        w.leave_descriptor();
    }

    let satin = &style.satin;
    if satin.enabled {
        w.enter_descriptor("ChFX", "", "ChFX");
        w.write_boolean("enab", satin.enabled);
        write_blend_mode(w, "Md  ", satin.blend_mode);
        w.write_color("Clr ", satin.color);
        w.write_boolean("AntA", satin.anti_aliased);
        w.write_boolean("Invr", satin.invert);
        w.write_unit_float("Opct", Unit::Percent, satin.opacity);
        w.write_unit_float("lagl", Unit::Angle, satin.angle);
        w.write_unit_float("Dstn", Unit::Pixels, satin.distance);
        w.write_unit_float("blur", Unit::Pixels, satin.size);
        w.write_curve("MpgS", &satin.contour);
        w.leave_descriptor();
    }

    let overlay = &style.color_overlay;
    if overlay.enabled {
        w.enter_descriptor("SoFi", "", "SoFi");
        w.write_boolean("enab", overlay.enabled);
        write_blend_mode(w, "Md  ", overlay.blend_mode);
        w.write_unit_float("Opct", Unit::Percent, overlay.opacity);
        w.write_color("Clr ", overlay.color);
        w.leave_descriptor();
    }

    let overlay = &style.gradient_overlay;
    match (&overlay.gradient, overlay.enabled) {
        (Some(gradient), true) => {
            w.enter_descriptor("GrFl", "", "GrFl");
            w.write_boolean("enab", overlay.enabled);
            write_blend_mode(w, "Md  ", overlay.blend_mode);
            w.write_unit_float("Opct", Unit::Percent, overlay.opacity);
            w.write_gradient("Grad", gradient);
            w.write_unit_float("Angl", Unit::Angle, overlay.angle);
            w.write_enum("Type", "GrdT", overlay.style.code());
            w.write_boolean("Rvrs", overlay.reverse);
            w.write_boolean("Algn", overlay.align_with_layer);
            w.write_unit_float("Scl ", Unit::Percent, overlay.scale);
            w.write_offset_point("Ofst", overlay.offset);
            w.write_boolean("Dthr", overlay.dither);
            w.leave_descriptor();
        }
        (None, true) => log::warn!("gradient overlay of {:?} has no gradient, skipping it", style.name),
        _ => {}
    }

    let overlay = &style.pattern_overlay;
    if overlay.enabled {
        w.enter_descriptor("patternFill", "", "patternFill");
        w.write_boolean("enab", overlay.enabled);
        write_blend_mode(w, "Md  ", overlay.blend_mode);
        w.write_unit_float("Opct", Unit::Percent, overlay.opacity);
        write_pattern_ref(w, "Ptrn", overlay.pattern.as_ref(), resources);
        w.write_unit_float("Scl ", Unit::Percent, overlay.scale);
        w.write_boolean("Algn", overlay.align_with_layer);
        w.write_phase_point("phase", overlay.phase);
        w.leave_descriptor();
    }

    let stroke = &style.stroke;
    if stroke.enabled {
        w.enter_descriptor("FrFX", "", "FrFX");
        w.write_boolean("enab", stroke.enabled);
        w.write_enum("Styl", "FStl", stroke.position.code());
        w.write_enum("PntT", "FrFl", stroke.fill_type.code());
        write_blend_mode(w, "Md  ", stroke.blend_mode);
        w.write_unit_float("Opct", Unit::Percent, stroke.opacity);
        w.write_unit_float("Sz  ", Unit::Pixels, stroke.size);
        match stroke.fill_type {
            FillType::Solid => w.write_color("Clr ", stroke.color),
            FillType::Gradient => {
                match &stroke.gradient {
                    Some(gradient) => w.write_gradient("Grad", gradient),
                    None => {
                        log::warn!("gradient stroke without a gradient, writing its colour");
                        w.write_color("Clr ", stroke.color);
                    }
                }
                w.write_unit_float("Angl", Unit::Angle, stroke.angle);
                w.write_enum("Type", "GrdT", stroke.style.code());
                w.write_boolean("Rvrs", stroke.reverse);
                w.write_unit_float("Scl ", Unit::Percent, stroke.scale);
                w.write_boolean("Algn", stroke.align_with_layer);
                w.write_offset_point("Ofst", stroke.offset);
                w.write_boolean("Dthr", stroke.dither);
            }
            FillType::Pattern => {
                write_pattern_ref(w, "Ptrn", stroke.pattern.as_ref(), resources);
                w.write_unit_float("Scl ", Unit::Percent, stroke.scale);
                w.write_boolean("Lnkd", stroke.align_with_layer);
                w.write_phase_point("phase", stroke.phase);
            }
        }
        w.leave_descriptor();
    }

    w.leave_descriptor();
    w.leave_descriptor();
}

#[cfg(test)]
mod tests {
    use asl_core::{Color, Descriptor, Node, Point};
    use byteorder::{BigEndian, LittleEndian};
    use pretty_assertions::assert_eq;

    use super::*;

    fn lefx(doc: &AslDocument) -> &Descriptor {
        let styl = doc
            .children
            .iter()
            .find_map(|n| match &n.value {
                Value::Descriptor(d) if d.class_id == "Styl" => Some(d),
                _ => None,
            })
            .unwrap();
        match styl.child("Lefx") {
            Some(Value::Descriptor(d)) => d,
            other => panic!("expected Lefx, got {other:?}"),
        }
    }

    fn effect_descriptors(d: &Descriptor) -> Vec<&Descriptor> {
        d.children
            .iter()
            .filter_map(|n: &Node| match &n.value {
                Value::Descriptor(d) => Some(d),
                _ => None,
            })
            .collect()
    }

    fn color_overlay_style() -> LayerStyle {
        let mut style = LayerStyle::new("Red overlay");
        style.color_overlay.enabled = true;
        style.color_overlay.color = Color::RED;
        style.color_overlay.opacity = 50.0;
        style.color_overlay.blend_mode = BlendMode::Multiply;
        style
    }

    #[test]
    fn single_color_overlay_is_one_sofi_descriptor() {
        let mut serializer = StyleSerializer::default();
        serializer.set_styles(vec![color_overlay_style()]);

        let bytes = serializer.save_to_bytes().unwrap();
        let doc = asl_core::read_document(&bytes, &CodecConfig::strict()).unwrap();
        let effects = effect_descriptors(lefx(&doc));
        assert_eq!(effects.len(), 1);

        let sofi = effects[0];
        assert_eq!(sofi.class_id, "SoFi");
        let Some(Value::Descriptor(color)) = sofi.child("Clr ") else {
            panic!("SoFi has no colour");
        };
        assert_eq!(color.class_id, "RGBC");
        assert_eq!(color.child("Rd  "), Some(&Value::Double(255.0)));
        assert_eq!(color.child("Grn "), Some(&Value::Double(0.0)));
        assert_eq!(color.child("Bl  "), Some(&Value::Double(0.0)));
        assert_eq!(
            sofi.child("Opct"),
            Some(&Value::UnitFloat {
                unit: Unit::Percent,
                value: 50.0
            })
        );
        assert_eq!(
            sofi.child("Md  "),
            Some(&Value::Enum {
                type_id: "BlnM".into(),
                value: "Mltp".into()
            })
        );
    }

    #[test]
    fn styles_survive_a_save_and_read() {
        let texture = PatternTile::filled("Dots", 4, 4, [10, 20, 30, 255]);
        let mut serializer = StyleSerializer::default();
        serializer.resources_mut().register_pattern("dots-uuid", texture);
        let dots = PatternRef {
            name: "Dots".into(),
            uuid: "dots-uuid".into(),
        };

        let mut style = color_overlay_style();
        style.valid = true;
        style.drop_shadow.enabled = true;
        style.drop_shadow.angle = 90.0;
        style.outer_glow.enabled = true;
        style.outer_glow.gradient = Some(Gradient::two_color("Glow", Color::WHITE, Color::BLACK));
        style.outer_glow.fill_type = FillType::Gradient;
        style.bevel_emboss.enabled = true;
        style.bevel_emboss.texture_enabled = true;
        style.bevel_emboss.texture_pattern = Some(dots.clone());
        style.bevel_emboss.texture_phase = Point::new(2.0, 3.0);
        style.stroke.enabled = true;
        style.stroke.fill_type = FillType::Pattern;
        style.stroke.pattern = Some(dots);
        serializer.set_styles(vec![style.clone()]);

        let bytes = serializer.save_to_bytes().unwrap();
        let mut reread = StyleSerializer::new(CodecConfig::strict());
        reread.read_from_bytes(&bytes).unwrap();

        assert!(reread.is_valid());
        assert_eq!(reread.styles(), &[style][..]);
        assert_eq!(reread.resources().pattern_count(), 1);
        assert_eq!(reread.resources().gradients().len(), 1);
    }

    #[test]
    fn missing_pattern_gets_a_placeholder() {
        let mut style = LayerStyle::new("broken");
        style.pattern_overlay.enabled = true;
        style.pattern_overlay.pattern = Some(PatternRef {
            name: "Gone".into(),
            uuid: "gone".into(),
        });
        let mut serializer = StyleSerializer::default();
        serializer.set_styles(vec![style]);
        let bytes = serializer.save_to_bytes().unwrap();

        let mut reread = StyleSerializer::default();
        reread.read_from_bytes(&bytes).unwrap();
        assert!(!reread.is_valid());
        let pattern = reread.styles()[0].pattern_overlay.pattern.clone().unwrap();
        assert_eq!(pattern.uuid, "gone_invalid");
        let tile = reread.resources().resolve_pattern("gone_invalid").unwrap();
        assert_eq!((tile.width, tile.height), (32, 32));
        assert_eq!(tile.pixel_rgba(5, 5), Some([255, 0, 0, 255]));
    }

    #[test]
    fn several_styles_stay_apart() {
        let mut second = LayerStyle::new("Second");
        second.satin.enabled = true;
        let empty = LayerStyle::new("Empty");
        let mut serializer = StyleSerializer::default();
        serializer.set_styles(vec![color_overlay_style(), second, empty]);
        let bytes = serializer.save_to_bytes().unwrap();

        let mut reread = StyleSerializer::default();
        reread.read_from_bytes(&bytes).unwrap();
        let styles = reread.styles();
        assert_eq!(styles.len(), 3);
        assert!(styles[0].color_overlay.enabled && !styles[0].satin.enabled);
        assert!(styles[1].satin.enabled && !styles[1].color_overlay.enabled);
        assert_eq!(styles[1].name, "Second");
        assert!(!styles[2].valid);
    }

    #[test]
    fn psd_sections_round_trip() {
        let mut style = color_overlay_style();
        style.pattern_overlay.enabled = true;
        style.pattern_overlay.pattern = Some(PatternRef {
            name: "Flat".into(),
            uuid: "flat".into(),
        });
        let mut serializer = StyleSerializer::default();
        serializer
            .resources_mut()
            .register_pattern("flat", PatternTile::filled("Flat", 3, 3, [0, 128, 0, 255]));
        serializer.set_styles(vec![style]);

        let (lfx2, patt) = serializer.write_psd_sections::<LittleEndian>().unwrap();
        let mut reread = StyleSerializer::default();
        reread
            .read_psd_sections::<LittleEndian>(&lfx2, Some(&patt))
            .unwrap();

        assert!(reread.is_valid());
        let style = &reread.styles()[0];
        assert!(style.color_overlay.enabled);
        assert_eq!(style.color_overlay.blend_mode, BlendMode::Multiply);
        assert_eq!(style.pattern_overlay.pattern.as_ref().unwrap().uuid, "flat");
        assert!(reread.resources().resolve_pattern("flat").is_some());
    }

    #[test]
    fn failed_read_leaves_no_styles() {
        let mut serializer = StyleSerializer::default();
        serializer.set_styles(vec![color_overlay_style()]);
        let mut bytes = serializer.save_to_bytes().unwrap();
        bytes[2] = b'X';

        assert!(serializer.read_from_bytes(&bytes).is_err());
        assert!(serializer.styles().is_empty());
        assert!(!serializer.is_valid());
    }

    #[test]
    fn empty_serializer_cannot_save() {
        let err = StyleSerializer::default().save_to_bytes().unwrap_err();
        assert!(matches!(err, StyleError::Empty));
        assert!(StyleSerializer::default()
            .write_psd_sections::<BigEndian>()
            .is_err());
    }
}
