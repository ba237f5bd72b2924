use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Metal {
    Arsenic,
    Lead,
    Cadmium,
    Chromium,
    Mercury,
    Nickel,
    Copper,
    Zinc,
    Iron,
    Manganese,
}

impl Metal {
    pub const ALL: [Self; 10] = [
        Self::Arsenic,
        Self::Lead,
        Self::Cadmium,
        Self::Chromium,
        Self::Mercury,
        Self::Nickel,
        Self::Copper,
        Self::Zinc,
        Self::Iron,
        Self::Manganese,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Self::Arsenic => "arsenic",
            Self::Lead => "lead",
            Self::Cadmium => "cadmium",
            Self::Chromium => "chromium",
            Self::Mercury => "mercury",
            Self::Nickel => "nickel",
            Self::Copper => "copper",
            Self::Zinc => "zinc",
            Self::Iron => "iron",
            Self::Manganese => "manganese",
        }
    }

    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Arsenic => "As",
            Self::Lead => "Pb",
            Self::Cadmium => "Cd",
            Self::Chromium => "Cr",
            Self::Mercury => "Hg",
            Self::Nickel => "Ni",
            Self::Copper => "Cu",
            Self::Zinc => "Zn",
            Self::Iron => "Fe",
            Self::Manganese => "Mn",
        }
    }

    /// Accepts the English name or the chemical symbol, in any case.
    pub fn parse(raw: &str) -> Option<Self> {
        let key = raw.trim();
        if key.is_empty() {
            return None;
        }
        Self::ALL
            .into_iter()
            .find(|m| key.eq_ignore_ascii_case(m.name()) || key.eq_ignore_ascii_case(m.symbol()))
    }
}

impl fmt::Display for Metal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
