use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Tone {
    #[default]
    Neutral,
    Suspenseful,
    Inspiring,
}

impl Tone {
    pub const ALL: [Tone; 3] = [Tone::Neutral, Tone::Suspenseful, Tone::Inspiring];

    pub fn name(self) -> &'static str {
        match self {
            Tone::Neutral => "Neutral",
            Tone::Suspenseful => "Suspenseful",
            Tone::Inspiring => "Inspiring",
        }
    }

    /// Phrase spliced into the rewrite prompt.
    pub fn description(self) -> &'static str {
        match self {
            Tone::Neutral => "neutral and clear",
            Tone::Suspenseful => "suspenseful and dramatic",
            Tone::Inspiring => "inspiring and motivational",
        }
    }
}

impl fmt::Display for Tone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Tone {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Tone::ALL
            .into_iter()
            .find(|tone| tone.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| AppError::validation(format!("Unknown tone '{}'", wanted)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Voice {
    #[default]
    Allison,
    Lisa,
    Michael,
    Kate,
}

impl Voice {
    pub const ALL: [Voice; 4] = [Voice::Allison, Voice::Lisa, Voice::Michael, Voice::Kate];

    pub fn name(self) -> &'static str {
        match self {
            Voice::Allison => "Allison",
            Voice::Lisa => "Lisa",
            Voice::Michael => "Michael",
            Voice::Kate => "Kate",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Voice::Allison => "Allison (en-US)",
            Voice::Lisa => "Lisa (en-US)",
            Voice::Michael => "Michael (en-US)",
            Voice::Kate => "Kate (en-GB)",
        }
    }

    /// Identifier understood by the synthesis service.
    pub fn id(self) -> &'static str {
        match self {
            Voice::Allison => "en-US_AllisonV3Voice",
            Voice::Lisa => "en-US_LisaV3Voice",
            Voice::Michael => "en-US_MichaelV3Voice",
            Voice::Kate => "en-GB_KateV3Voice",
        }
    }
}

impl fmt::Display for Voice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Voice {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Voice::ALL
            .into_iter()
            .find(|voice| {
                voice.name().eq_ignore_ascii_case(wanted) || voice.label().eq_ignore_ascii_case(wanted)
            })
            .ok_or_else(|| AppError::validation(format!("Unknown voice '{}'", wanted)))
    }
}
