#![forbid(unsafe_code)]

pub mod blend;
pub mod blur;
pub mod compositor;
pub mod encode;
pub mod error;
pub mod model;
pub mod palette;
pub mod pipeline;
pub mod plan;
pub mod quantize;
pub mod source;
pub mod stage;
pub mod text;
pub mod text_raster;

pub use compositor::{Compositor, Disposal};
pub use encode::{EncodeConfig, EncodeSummary, GifSink};
pub use error::{GifwrightError, GifwrightResult};
pub use model::{
    BackgroundStyle, CropConfig, EditConfig, FillStyle, ResizeConfig, Rgb, RotateConfig,
    ShadowStyle, SizeMode, StrokeStyle, TextAnimation, TextAnimationKind, TextStyle, TrimConfig,
};
pub use palette::Palette;
pub use pipeline::{
    CancelToken, NullProgress, ProgressEvent, ProgressSink, ProgressStep, compose_images, run_edit,
};
pub use plan::{OutputPlan, PlanEntry};
pub use quantize::Quantizer;
pub use source::{LoopCount, SourceFrame, SourceGif};
pub use stage::{FrameBuffer, FrameContext, Stage, output_dimensions};
pub use text::TextRasterizer;
pub use text_raster::CpuTextRasterizer;
