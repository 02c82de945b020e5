use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AspectRatio {
    #[default]
    #[serde(rename = "1:1")]
    Square,
    #[serde(rename = "3:4")]
    Portrait3x4,
    #[serde(rename = "4:3")]
    Landscape4x3,
    #[serde(rename = "9:16")]
    Portrait9x16,
    #[serde(rename = "16:9")]
    Landscape16x9,
}

impl AspectRatio {
    pub const ALL: [AspectRatio; 5] = [
        AspectRatio::Square,
        AspectRatio::Portrait3x4,
        AspectRatio::Landscape4x3,
        AspectRatio::Portrait9x16,
        AspectRatio::Landscape16x9,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AspectRatio::Square => "1:1",
            AspectRatio::Portrait3x4 => "3:4",
            AspectRatio::Landscape4x3 => "4:3",
            AspectRatio::Portrait9x16 => "9:16",
            AspectRatio::Landscape16x9 => "16:9",
        }
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AspectRatio {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = raw.trim().to_ascii_lowercase();
        let normalized = match normalized.as_str() {
            "square" => "1:1",
            "portrait" | "tall" => "9:16",
            "landscape" | "wide" => "16:9",
            other => other,
        };
        AspectRatio::ALL
            .into_iter()
            .find(|ratio| ratio.as_str() == normalized)
            .ok_or_else(|| {
                format!("unsupported aspect ratio '{raw}' (expected one of 1:1, 3:4, 4:3, 9:16, 16:9)")
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Resolution {
    #[default]
    #[serde(rename = "1K")]
    OneK,
    #[serde(rename = "2K")]
    TwoK,
    #[serde(rename = "4K")]
    FourK,
}

impl Resolution {
    pub const ALL: [Resolution; 3] = [Resolution::OneK, Resolution::TwoK, Resolution::FourK];

    pub fn as_str(self) -> &'static str {
        match self {
            Resolution::OneK => "1K",
            Resolution::TwoK => "2K",
            Resolution::FourK => "4K",
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Resolution {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = raw.trim().to_ascii_uppercase();
        Resolution::ALL
            .into_iter()
            .find(|tier| tier.as_str() == normalized)
            .ok_or_else(|| format!("unsupported resolution '{raw}' (expected 1K, 2K or 4K)"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StudioMode {
    #[default]
    Generate,
    Edit,
}

impl StudioMode {
    pub fn as_str(self) -> &'static str {
        match self {
            StudioMode::Generate => "generate",
            StudioMode::Edit => "edit",
        }
    }
}

impl fmt::Display for StudioMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StudioMode {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "generate" | "gen" => Ok(StudioMode::Generate),
            "edit" => Ok(StudioMode::Edit),
            _ => Err(format!("unknown mode '{raw}' (expected generate or edit)")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{AspectRatio, Resolution, StudioMode};

    #[test]
    fn aspect_ratio_parses_fixed_set_and_aliases() {
        assert_eq!("16:9".parse::<AspectRatio>(), Ok(AspectRatio::Landscape16x9));
        assert_eq!(" 3:4 ".parse::<AspectRatio>(), Ok(AspectRatio::Portrait3x4));
        assert_eq!("square".parse::<AspectRatio>(), Ok(AspectRatio::Square));
        assert!("21:9".parse::<AspectRatio>().is_err());
    }

    #[test]
    fn resolution_parses_case_insensitively() {
        assert_eq!("2k".parse::<Resolution>(), Ok(Resolution::TwoK));
        assert_eq!("4K".parse::<Resolution>(), Ok(Resolution::FourK));
        assert!("8K".parse::<Resolution>().is_err());
    }

    #[test]
    fn options_serialize_as_wire_strings() {
        assert_eq!(
            serde_json::to_string(&AspectRatio::Portrait9x16).unwrap(),
            "\"9:16\""
        );
        assert_eq!(serde_json::to_string(&Resolution::OneK).unwrap(), "\"1K\"");
        assert_eq!(
            serde_json::to_string(&StudioMode::Edit).unwrap(),
            "\"EDIT\""
        );
    }
}
