// crates/nacre-core/src/amount.rs
//
// Token units and fixed-point precision constants for the Nacre ledger.
//
// The base stake token (NTN) is accounted in "atto" (10^-18 NTN). All
// economic arithmetic is integer-only so that every node derives an
// identical state from identical inputs. Rates use basis-point style
// fixed point against RATE_PRECISION; the treasury fee uses a finer
// 10^18 precision; per-share reward accrual uses FEE_FACTOR_UNIT.

/// Amount of tokens in atto (the smallest denomination). 1 NTN = 10^18 atto.
pub type Amount = u128;

/// Number of atto in one NTN.
pub const ATTO_PER_NTN: Amount = 1_000_000_000_000_000_000;

/// Precision for commission rates and slashing rates. A rate of 10_000
/// means 100%.
pub const RATE_PRECISION: u64 = 10_000;

/// Precision for the global treasury fee rate. A rate of 10^18 means 100%.
pub const TREASURY_FEE_PRECISION: Amount = 1_000_000_000_000_000_000;

/// Fixed-point unit for the per-share reward accrual accumulator of the
/// liquid share ledger. One accrual tick of FEE_FACTOR_UNIT credits one
/// atto per share held.
pub const FEE_FACTOR_UNIT: Amount = 1_000_000_000;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_relations() {
        assert_eq!(ATTO_PER_NTN, 10u128.pow(18));
        assert_eq!(TREASURY_FEE_PRECISION, ATTO_PER_NTN);
        assert_eq!(FEE_FACTOR_UNIT, 10u128.pow(9));
    }
}
