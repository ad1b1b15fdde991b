//! Mapping database ids to matrix indices.

use std::collections::HashMap;

/// Marker written into index arrays for ids the mapping does not know
pub const MISSING_INDEX: i64 = u32::MAX as i64;

/// Database id to matrix row or column
pub type IdMapping = HashMap<i64, i64>;

/// Exchange type codes stored in the `type` field of technosphere indices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ExchangeType {
    Production = 0,
    Technosphere = 1,
    Biosphere = 2,
    Substitution = 3,
}

impl ExchangeType {
    pub fn code(self) -> i64 {
        self as i64
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::Production),
            1 => Some(Self::Technosphere),
            2 => Some(Self::Biosphere),
            3 => Some(Self::Substitution),
            _ => None,
        }
    }
}

/// Write `mapping[from[i]]` into `to[i]`, or [`MISSING_INDEX`] for unmapped ids.
///
/// Returns the number of unmapped ids.
pub fn index_with_arrays(from: &[i64], to: &mut [i64], mapping: &IdMapping) -> usize {
    let mut missing = 0;
    for (key, slot) in from.iter().zip(to.iter_mut()) {
        *slot = match mapping.get(key) {
            Some(index) => *index,
            None => {
                missing += 1;
                MISSING_INDEX
            }
        };
    }
    missing
}

/// Technosphere inputs are consumed, so their values become negative
pub fn fix_supply_use(types: &[i64], values: &mut [f64]) {
    let technosphere = ExchangeType::Technosphere.code();
    for (kind, value) in types.iter().zip(values.iter_mut()) {
        if *kind == technosphere {
            *value = -*value;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_with_arrays() {
        let mapping: IdMapping = (0..5).map(|x| (x, 2 * x)).collect();
        let from = [1, 1, 4, 9];
        let mut to = [0; 4];
        let missing = index_with_arrays(&from, &mut to, &mapping);
        assert_eq!(to, [2, 2, 8, MISSING_INDEX]);
        assert_eq!(missing, 1);
    }

    #[test]
    fn test_fix_supply_use_negates_only_technosphere_inputs() {
        let types = [0, 1, 3, 1];
        let mut values = [10.0, 11.0, 12.0, -2.0];
        fix_supply_use(&types, &mut values);
        assert_eq!(values, [10.0, -11.0, 12.0, 2.0]);
    }

    #[test]
    fn test_exchange_type_codes() {
        assert_eq!(ExchangeType::from_code(3), Some(ExchangeType::Substitution));
        assert_eq!(ExchangeType::from_code(7), None);
        assert_eq!(ExchangeType::Production.code(), 0);
    }
}
