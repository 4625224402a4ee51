use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Neg;

/// Number of tinyunits in one whole unit of the network currency.
pub const TINYUNITS_PER_UNIT: i64 = 100_000_000;

/// An amount of the network currency, stored in tinyunits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Amount(i64);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    pub const fn from_tinyunits(tinyunits: i64) -> Self {
        Amount(tinyunits)
    }

    pub const fn from_units(units: i64) -> Self {
        Amount(units * TINYUNITS_PER_UNIT)
    }

    pub const fn to_tinyunits(self) -> i64 {
        self.0
    }
}

impl Neg for Amount {
    type Output = Amount;

    fn neg(self) -> Amount {
        Amount(-self.0)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} tinyunits", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_units_conversion() {
        assert_eq!(Amount::from_units(2).to_tinyunits(), 200_000_000);
        assert_eq!(-Amount::from_tinyunits(25), Amount::from_tinyunits(-25));
    }

    #[test]
    fn test_display() {
        assert_eq!(Amount::from_tinyunits(25).to_string(), "25 tinyunits");
    }
}
