/// Classes the toxicity model was trained on, in class-id order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToxicityClass {
    Neutral,
    Toxic,
    Offensive,
}

impl ToxicityClass {
    pub fn from_class_id(class_id: u32) -> Option<Self> {
        match class_id {
            0 => Some(Self::Neutral),
            1 => Some(Self::Toxic),
            2 => Some(Self::Offensive),
            _ => None,
        }
    }

    pub fn class_id(self) -> u32 {
        self as u32
    }

    /// Human-readable label shown to bot users.
    pub fn label(self) -> &'static str {
        match self {
            Self::Neutral => "нейтральный",
            Self::Toxic => "токсичный",
            Self::Offensive => "оскорбительный",
        }
    }
}

/// Map a class id to its label. Unknown ids read as neutral.
pub fn map_class_id_to_text(class_id: i64) -> &'static str {
    u32::try_from(class_id)
        .ok()
        .and_then(ToxicityClass::from_class_id)
        .unwrap_or(ToxicityClass::Neutral)
        .label()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_ids() {
        assert_eq!(map_class_id_to_text(0), "нейтральный");
        assert_eq!(map_class_id_to_text(1), "токсичный");
        assert_eq!(map_class_id_to_text(2), "оскорбительный");
    }

    #[test]
    fn test_unknown_ids_fall_back_to_neutral() {
        for id in [3, 42, -1, i64::MAX, i64::MIN] {
            assert_eq!(map_class_id_to_text(id), "нейтральный", "id {id}");
        }
    }

    #[test]
    fn test_class_id_round_trip() {
        for class in [ToxicityClass::Neutral, ToxicityClass::Toxic, ToxicityClass::Offensive] {
            assert_eq!(ToxicityClass::from_class_id(class.class_id()), Some(class));
        }
    }
}
