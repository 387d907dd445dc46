//! Hardware model codes accepted in `general.model`.

/// Model families known to the firmware.
pub const VALID_MODELS: [&str; 16] = [
    "11xx", "33xx", "52xx", "53xx", "54xx", "63xx", "64xx", "65xx", "66xx", "67xx", "68xx",
    "71xx", "72xx", "1axx", "3axx", "12xx",
];

/// Model filter written into ARM64 variant builds (AS33v2, AS11TL, AS12, AS33, AS11).
pub const ARM64_MODELS: [&str; 5] = ["33xx", "11xx", "1axx", "3axx", "12xx"];

/// Check whether a model code belongs to the known set.
pub fn is_known_model(code: &str) -> bool {
    VALID_MODELS.contains(&code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arm64_models_are_known() {
        assert!(ARM64_MODELS.iter().all(|m| is_known_model(m)));
    }

    #[test]
    fn test_unknown_model() {
        assert!(!is_known_model("99xx"));
        assert!(!is_known_model(""));
    }
}
