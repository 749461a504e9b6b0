use crate::Error;

use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

const INFINITY_SYMBOL: &str = "Infinity";

/// A single card value.
///
/// A value of `None` is the "?" card, positive infinity is the "too large to
/// estimate" card. Equality and hashing compare the underlying value.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(into = "EstimationRepr", try_from = "EstimationRepr")]
pub struct Estimation {
    value: Option<f64>,
}

impl Estimation {
    /// Creates a numeric estimation.
    ///
    /// # Errors
    /// Returns an error if `value` is NaN or negative infinity.
    pub fn new(value: f64) -> Result<Self, Error> {
        if value.is_nan() || value == f64::NEG_INFINITY {
            return Err(Error::InvalidEstimation(value));
        }

        // -0.0 and 0.0 must compare and hash the same
        let value = if value == 0.0 { 0.0 } else { value };
        Ok(Self { value: Some(value) })
    }

    /// The "?" card.
    #[must_use]
    pub const fn question_mark() -> Self {
        Self { value: None }
    }

    /// The infinity card.
    #[must_use]
    pub const fn infinity() -> Self {
        Self {
            value: Some(f64::INFINITY),
        }
    }

    /// The numeric value, or `None` for the "?" card.
    #[must_use]
    pub const fn value(self) -> Option<f64> {
        self.value
    }

    /// Whether this is the infinity card.
    #[must_use]
    pub fn is_infinite(self) -> bool {
        self.value == Some(f64::INFINITY)
    }

    const fn card(value: f64) -> Self {
        Self { value: Some(value) }
    }

    fn bits(self) -> Option<u64> {
        self.value.map(f64::to_bits)
    }
}

impl PartialEq for Estimation {
    fn eq(&self, other: &Self) -> bool {
        self.bits() == other.bits()
    }
}

impl Eq for Estimation {}

impl Hash for Estimation {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.bits().hash(state);
    }
}

impl fmt::Display for Estimation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.value {
            None => write!(f, "?"),
            Some(value) if value.is_infinite() => write!(f, "\u{221e}"),
            Some(value) => write!(f, "{value}"),
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum EstimationValue {
    Number(f64),
    Symbol(String),
}

#[derive(Serialize, Deserialize)]
struct EstimationRepr {
    value: Option<EstimationValue>,
}

impl From<Estimation> for EstimationRepr {
    fn from(estimation: Estimation) -> Self {
        let value = estimation.value.map(|value| {
            if value.is_infinite() {
                EstimationValue::Symbol(INFINITY_SYMBOL.to_string())
            } else {
                EstimationValue::Number(value)
            }
        });
        Self { value }
    }
}

impl TryFrom<EstimationRepr> for Estimation {
    type Error = Error;

    fn try_from(repr: EstimationRepr) -> Result<Self, Self::Error> {
        match repr.value {
            None => Ok(Self::question_mark()),
            Some(EstimationValue::Number(value)) => Self::new(value),
            Some(EstimationValue::Symbol(symbol)) if symbol == INFINITY_SYMBOL => {
                Ok(Self::infinity())
            }
            Some(EstimationValue::Symbol(symbol)) => Err(Error::UnknownEstimationSymbol(symbol)),
        }
    }
}

const STANDARD: [Estimation; 13] = [
    Estimation::card(0.0),
    Estimation::card(0.5),
    Estimation::card(1.0),
    Estimation::card(2.0),
    Estimation::card(3.0),
    Estimation::card(5.0),
    Estimation::card(8.0),
    Estimation::card(13.0),
    Estimation::card(20.0),
    Estimation::card(40.0),
    Estimation::card(100.0),
    Estimation::infinity(),
    Estimation::question_mark(),
];

const FIBONACCI: [Estimation; 13] = [
    Estimation::card(0.0),
    Estimation::card(1.0),
    Estimation::card(2.0),
    Estimation::card(3.0),
    Estimation::card(5.0),
    Estimation::card(8.0),
    Estimation::card(13.0),
    Estimation::card(21.0),
    Estimation::card(34.0),
    Estimation::card(55.0),
    Estimation::card(89.0),
    Estimation::infinity(),
    Estimation::question_mark(),
];

const RATING: [Estimation; 10] = [
    Estimation::card(1.0),
    Estimation::card(2.0),
    Estimation::card(3.0),
    Estimation::card(4.0),
    Estimation::card(5.0),
    Estimation::card(6.0),
    Estimation::card(7.0),
    Estimation::card(8.0),
    Estimation::card(9.0),
    Estimation::card(10.0),
];

// XS, S, M, L, XL
const TSHIRT: [Estimation; 5] = [
    Estimation::card(-999_509.0),
    Estimation::card(-999_508.0),
    Estimation::card(-999_507.0),
    Estimation::card(-999_506.0),
    Estimation::card(-999_505.0),
];

// Rock, Paper, Scissors, Lizard, Spock
const ROCK_PAPER_SCISSORS_LIZARD_SPOCK: [Estimation; 5] = [
    Estimation::card(-999_909.0),
    Estimation::card(-999_908.0),
    Estimation::card(-999_907.0),
    Estimation::card(-999_906.0),
    Estimation::card(-999_905.0),
];

/// The card decks a team can pick from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Deck {
    /// 0, ½, 1, 2, 3, 5, 8, 13, 20, 40, 100, ∞ and ?.
    #[default]
    Standard,

    /// 0, 1, 2, 3, 5, 8, 13, 21, 34, 55, 89, ∞ and ?.
    Fibonacci,

    /// 1 to 10.
    Rating,

    /// T-shirt sizes from XS to XL.
    Tshirt,

    /// Rock, paper, scissors, lizard, Spock.
    RockPaperScissorsLizardSpock,
}

impl Deck {
    /// Every deck.
    pub const ALL: [Self; 5] = [
        Self::Standard,
        Self::Fibonacci,
        Self::Rating,
        Self::Tshirt,
        Self::RockPaperScissorsLizardSpock,
    ];

    /// The cards of this deck.
    #[must_use]
    pub fn estimations(self) -> Vec<Estimation> {
        match self {
            Self::Standard => STANDARD.to_vec(),
            Self::Fibonacci => FIBONACCI.to_vec(),
            Self::Rating => RATING.to_vec(),
            Self::Tshirt => TSHIRT.to_vec(),
            Self::RockPaperScissorsLizardSpock => ROCK_PAPER_SCISSORS_LIZARD_SPOCK.to_vec(),
        }
    }

    /// The kebab-case name of the deck.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Fibonacci => "fibonacci",
            Self::Rating => "rating",
            Self::Tshirt => "tshirt",
            Self::RockPaperScissorsLizardSpock => "rock-paper-scissors-lizard-spock",
        }
    }
}

impl fmt::Display for Deck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Deck {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|deck| deck.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::UnknownDeck(s.to_string()))
    }
}
