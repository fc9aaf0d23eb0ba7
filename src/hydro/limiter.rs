use log::warn;

/**
 * The pluggable slope-limiter strategy used by the piecewise-linear
 * reconstruction. Selected by name from the parameters file; an unknown
 * name falls back to the default with a logged warning.
 */
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlopeLimiter {
    MinMod,
    Superbee,
    VanLeer,
    MonotonisedCentral,
}




// ============================================================================
impl SlopeLimiter {

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "MINMOD" => Some(Self::MinMod),
            "SUPERBEE" => Some(Self::Superbee),
            "VANLEER" | "VAN_LEER" => Some(Self::VanLeer),
            "MC" | "MONOTONISED_CENTRAL" => Some(Self::MonotonisedCentral),
            _ => None,
        }
    }

    pub fn from_name_or_default(name: &str) -> Self {
        Self::from_name(name).unwrap_or_else(|| {
            warn!("unknown slope limiter '{}', using {}", name, Self::default().name());
            Self::default()
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::MinMod => "MINMOD",
            Self::Superbee => "SUPERBEE",
            Self::VanLeer => "VANLEER",
            Self::MonotonisedCentral => "MONOTONISED_CENTRAL",
        }
    }

    /// Limited slope from the backward and forward differences of one field.
    pub fn limit(&self, dm: f64, dp: f64) -> f64 {
        match self {
            Self::MinMod => minmod(dm, dp),
            Self::Superbee => maxmod(minmod(2.0 * dm, dp), minmod(dm, 2.0 * dp)),
            Self::VanLeer => {
                if dm * dp > 0.0 {
                    2.0 * dm * dp / (dm + dp)
                } else {
                    0.0
                }
            }
            Self::MonotonisedCentral => minmod(0.5 * (dm + dp), minmod(2.0 * dm, 2.0 * dp)),
        }
    }
}

impl Default for SlopeLimiter {
    fn default() -> Self {
        Self::MinMod
    }
}

fn minmod(a: f64, b: f64) -> f64 {
    if a * b <= 0.0 {
        0.0
    } else if a.abs() < b.abs() {
        a
    } else {
        b
    }
}

fn maxmod(a: f64, b: f64) -> f64 {
    if a * b <= 0.0 {
        0.0
    } else if a.abs() > b.abs() {
        a
    } else {
        b
    }
}
