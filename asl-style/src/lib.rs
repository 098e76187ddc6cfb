//! Typed layer styles on top of the `asl-core` descriptor codec.

pub mod corrector;
pub mod error;
pub mod model;
pub mod resources;
pub mod serializer;

pub use corrector::{correct_fill_types, infer_fill_type};
pub use error::{Result, StyleError};
pub use model::{
    BevelDirection, BevelEmboss, BevelStyle, BlendMode, ColorOverlay, FillType, Glow, GlowSource,
    GradientOverlay, GradientStyle, LayerStyle, PatternOverlay, PsdEnum, Satin, Shadow, Stroke,
    StrokePosition, Technique,
};
pub use resources::{LocalResources, ResourceRegistry};
pub use serializer::{StyleSerializer, PSD_PREFIX, STYLE_PREFIX};
