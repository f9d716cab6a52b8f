use std::fmt::Display;

/// Read-out commands accepted by the balance in remote mode.
///
/// The FCB command set also covers taring and display control; only the
/// passive read-out side is used here.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Command {
    /// Current readout, settled or not (`w`).
    Weight,
    /// Next stable readout; the balance replies once the value has
    /// settled (`s`).
    StableWeight,
}

impl Command {
    pub(crate) fn token(self) -> &'static str {
        match self {
            Command::Weight => "w",
            Command::StableWeight => "s",
        }
    }
}

impl Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::Weight => f.write_str("weight"),
            Command::StableWeight => f.write_str("stable"),
        }
    }
}

impl clap::ValueEnum for Command {
    fn value_variants<'a>() -> &'a [Self] {
        &[Self::Weight, Self::StableWeight]
    }

    fn to_possible_value(&self) -> Option<clap::builder::PossibleValue> {
        Some(match self {
            Self::Weight => clap::builder::PossibleValue::new("weight"),
            Self::StableWeight => clap::builder::PossibleValue::new("stable"),
        })
    }
}
