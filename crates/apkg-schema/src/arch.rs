//! Target architectures accepted by the firmware.

/// Target architecture declared in `general.architecture`.
///
/// The NAS firmware only accepts these three values. `Any` marks packages
/// made of scripts and data that run on every model.
///
/// # Example
///
/// ```
/// use apkg_schema::Arch;
///
/// let arch: Arch = "x86-64".parse().unwrap();
/// assert_eq!(arch.as_str(), "x86-64");
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize, Default,
)]
pub enum Arch {
    /// Intel/AMD 64-bit models
    #[default]
    #[serde(rename = "x86-64")]
    X86_64,
    /// ARM64 models (AS11xx, AS33xx, ...)
    #[serde(rename = "arm64")]
    Arm64,
    /// Architecture-independent package
    #[serde(rename = "any")]
    Any,
}

impl Arch {
    /// Every architecture value the firmware accepts.
    pub const ALL: [Arch; 3] = [Arch::X86_64, Arch::Arm64, Arch::Any];

    /// Convert to the manifest string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::X86_64 => "x86-64",
            Self::Arm64 => "arm64",
            Self::Any => "any",
        }
    }

    /// Model codes a build for this architecture is restricted to.
    ///
    /// Only ARM64 builds carry a model filter; the other variants return an
    /// empty slice and leave `general.model` untouched.
    pub fn model_filter(&self) -> &'static [&'static str] {
        match self {
            Self::Arm64 => &crate::model::ARM64_MODELS,
            Self::X86_64 | Self::Any => &[],
        }
    }
}

impl std::fmt::Display for Arch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Arch {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "x86-64" => Ok(Self::X86_64),
            "arm64" => Ok(Self::Arm64),
            "any" => Ok(Self::Any),
            _ => Err(format!(
                "Unknown architecture: {s} (valid: x86-64, arm64, any)"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_names() {
        for arch in Arch::ALL {
            assert_eq!(arch.as_str().parse::<Arch>().unwrap(), arch);
        }
    }

    #[test]
    fn test_rejects_rust_style_names() {
        assert!("x86_64".parse::<Arch>().is_err());
        assert!("aarch64".parse::<Arch>().is_err());
        assert!("ARM64".parse::<Arch>().is_err());
    }

    #[test]
    fn test_serde_uses_manifest_names() {
        let json = serde_json::to_string(&Arch::X86_64).unwrap();
        assert_eq!(json, "\"x86-64\"");
        let back: Arch = serde_json::from_str("\"any\"").unwrap();
        assert_eq!(back, Arch::Any);
    }

    #[test]
    fn test_model_filter_only_for_arm64() {
        assert_eq!(Arch::Arm64.model_filter().len(), 5);
        assert!(Arch::X86_64.model_filter().is_empty());
        assert!(Arch::Any.model_filter().is_empty());
    }
}
