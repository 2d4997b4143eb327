//! Option lists offered for converter parameters.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Generates `names()`, `Display` and `FromStr` from one name table.
macro_rules! named_options {
    ($ty:ident { $($variant:ident => $name:literal),+ $(,)? }) => {
        impl $ty {
            pub const ALL: &'static [$ty] = &[$($ty::$variant),+];

            /// Display names, in menu order.
            pub fn names() -> Vec<&'static str> {
                vec![$($name),+]
            }

            pub fn name(&self) -> &'static str {
                match self {
                    $($ty::$variant => $name),+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.name())
            }
        }

        impl FromStr for $ty {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let wanted = s.trim().replace(['-', '_'], " ").to_ascii_lowercase();
                $ty::ALL
                    .iter()
                    .copied()
                    .find(|v| v.name() == wanted)
                    .ok_or_else(|| {
                        format!(
                            "unknown {} '{}', expected one of: {}",
                            stringify!($ty).to_ascii_lowercase(),
                            s,
                            $ty::names().join(", ")
                        )
                    })
            }
        }
    };
}

/// Glyph columns in text-art output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resolution {
    Small,
    #[default]
    Medium,
    Big,
}

impl Resolution {
    pub fn columns(&self) -> u32 {
        match self {
            Resolution::Small => 50,
            Resolution::Medium => 100,
            Resolution::Big => 500,
        }
    }
}

named_options!(Resolution {
    Small => "small",
    Medium => "medium",
    Big => "big",
});

/// Colour scheme of text-art output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RenderMode {
    #[default]
    BlackOnWhite,
    WhiteOnBlack,
}

named_options!(RenderMode {
    BlackOnWhite => "black on white",
    WhiteOnBlack => "white on black",
});

/// How fast the generated video's latent drifts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speed {
    Slow,
    #[default]
    Medium,
    Fast,
}

impl Speed {
    pub fn factor(&self) -> u32 {
        match self {
            Speed::Slow => 1,
            Speed::Medium => 3,
            Speed::Fast => 6,
        }
    }
}

named_options!(Speed {
    Slow => "slow",
    Medium => "medium",
    Fast => "fast",
});

/// How consecutive latents of a generated video relate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transition {
    /// Small random steps from the previous latent.
    #[default]
    Random,
    /// Linear interpolation between random key latents.
    Sequences,
    /// One latent for every frame.
    Constant,
}

named_options!(Transition {
    Random => "random",
    Sequences => "sequences",
    Constant => "constant",
});

/// Training set of a generative model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dataset {
    #[default]
    Cats,
    Flowers,
    Pokemon,
    Anime,
    Microscope,
    Textures,
    AbstractArt1,
    AbstractArt2,
    FigureDrawings,
}

impl Dataset {
    /// File stem of the model trained on this dataset.
    pub fn model_stem(&self) -> String {
        self.name().replace(' ', "_")
    }
}

named_options!(Dataset {
    Cats => "cats",
    Flowers => "flowers",
    Pokemon => "pokemon",
    Anime => "anime",
    Microscope => "microscope",
    Textures => "textures",
    AbstractArt1 => "abstract art 1",
    AbstractArt2 => "abstract art 2",
    FigureDrawings => "figure drawings",
});
