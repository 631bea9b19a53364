//! Built-in pipelines for the common ad-video flows.

use std::fmt;
use std::str::FromStr;

use adforge_core::{CodecProfile, StageParams, TargetResolution, TransitionKind};
use adforge_pipeline::PipelineSpec;

/// A named, ready-to-run pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum Preset {
    /// Join clips with a 1s fade.
    Concat,
    /// Upscale to 4K.
    Upscale,
    /// Upscale to 4K, then transcode to ProRes 422 HQ.
    UpscaleProres,
    /// Interpolate to 60 fps.
    Interpolate,
    /// Interpolate to 60 fps, then upscale to 4K.
    InterpolateUpscale,
    /// Join clips, upscale to 4K, then transcode to ProRes 422 HQ.
    ConcatUpscaleProres,
}

impl Preset {
    pub const ALL: [Preset; 6] = [
        Preset::Concat,
        Preset::Upscale,
        Preset::UpscaleProres,
        Preset::Interpolate,
        Preset::InterpolateUpscale,
        Preset::ConcatUpscaleProres,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Preset::Concat => "concat",
            Preset::Upscale => "upscale",
            Preset::UpscaleProres => "upscale-prores",
            Preset::Interpolate => "interpolate",
            Preset::InterpolateUpscale => "interpolate-upscale",
            Preset::ConcatUpscaleProres => "concat-upscale-prores",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Preset::Concat => "Join clips with a 1s fade",
            Preset::Upscale => "Upscale to 4K",
            Preset::UpscaleProres => "Upscale to 4K, then transcode to ProRes 422 HQ",
            Preset::Interpolate => "Interpolate to 60 fps",
            Preset::InterpolateUpscale => "Interpolate to 60 fps, then upscale to 4K",
            Preset::ConcatUpscaleProres => {
                "Join clips, upscale to 4K, then transcode to ProRes 422 HQ"
            }
        }
    }

    /// Whether the first stage takes several clips instead of one source.
    pub fn takes_clips(&self) -> bool {
        matches!(self, Preset::Concat | Preset::ConcatUpscaleProres)
    }

    pub fn spec(&self) -> PipelineSpec {
        let concat = || StageParams::concatenate(TransitionKind::Fade, 1.0);
        let upscale = || StageParams::upscale(TargetResolution::Uhd4k);
        let interpolate = || StageParams::interpolate("rife-v4");
        let prores = || StageParams::transcode(CodecProfile::Prores422Hq);

        let stages = match self {
            Preset::Concat => vec![concat()],
            Preset::Upscale => vec![upscale()],
            Preset::UpscaleProres => vec![upscale(), prores()],
            Preset::Interpolate => vec![interpolate()],
            Preset::InterpolateUpscale => vec![interpolate(), upscale()],
            Preset::ConcatUpscaleProres => vec![concat(), upscale(), prores()],
        };

        let mut spec = PipelineSpec::from_params(stages);
        spec.name = Some(self.name().to_string());
        spec
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Preset {
    type Err = adforge_core::Error;

    fn from_str(s: &str) -> adforge_core::Result<Self> {
        find(s).ok_or_else(|| {
            adforge_core::Error::Validation(format!(
                "unknown preset '{s}' (available: {})",
                Preset::ALL.map(|p| p.name()).join(", ")
            ))
        })
    }
}

/// Look up a preset by name.
pub fn find(name: &str) -> Option<Preset> {
    Preset::ALL.into_iter().find(|p| p.name() == name.trim())
}

pub fn all() -> &'static [Preset] {
    &Preset::ALL
}
