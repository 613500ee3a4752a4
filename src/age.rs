/// The 8-way bracket labels the age model predicts over, youngest first.
pub const BRACKETS: [&str; 8] = [
    "(0-2)",
    "(4-6)",
    "(8-12)",
    "(15-20)",
    "(25-32)",
    "(38-43)",
    "(48-53)",
    "(60-100)",
];

/// Coarse category returned by the on-demand age endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AgeCategory {
    Joven,
    Adulto,
}

impl AgeCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgeCategory::Joven => "Joven",
            AgeCategory::Adulto => "Adulto",
        }
    }
}

/// Buckets a predicted bracket index into the two coarse categories: the
/// four youngest brackets are `Joven`, everything else `Adulto`.
pub fn bucket(bracket: usize) -> AgeCategory {
    if bracket < 4 {
        AgeCategory::Joven
    } else {
        AgeCategory::Adulto
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_bracket_maps_to_exactly_one_category() {
        for (index, _label) in BRACKETS.iter().enumerate() {
            let category = bucket(index);
            if index < 4 {
                assert_eq!(category, AgeCategory::Joven);
            } else {
                assert_eq!(category, AgeCategory::Adulto);
            }
        }
    }

    #[test]
    fn out_of_range_bracket_is_adulto() {
        assert_eq!(bucket(BRACKETS.len()), AgeCategory::Adulto);
    }
}
