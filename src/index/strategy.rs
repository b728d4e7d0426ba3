//! Index-strategy vocabulary (spec.md §4.6): the operator-class glue used
//! to express what an index entry matches.

/// One predicate shape an index access method can be asked to serve.
/// `Not*` variants are negation strategies and require the caller to wrap
/// the index's positive result with an anti-match (spec.md §4.6:
/// "Strategies whose name starts with `not-`...").
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IndexStrategy {
    Equal,
    Greater,
    GreaterEqual,
    Less,
    LessEqual,
    In,
    NotEqual,
    NotIn,
    Regex,
    Exists,
    Size,
    Type,
    All,
    BitsAllClear,
    BitsAnyClear,
    BitsAllSet,
    BitsAnySet,
    Mod,
    OrderBy,
    Text,
    GeoWithin,
    GeoIntersects,
    Range,
    NotGt,
    NotGte,
    NotLt,
    NotLte,
    GeoNear,
    GeoNearRange,
    CompositeQuery,
    IsMultikey,
    OrderByReverse,
    HasTruncatedTerms,
}

impl IndexStrategy {
    /// Whether this strategy's positive match must be inverted by the
    /// caller before it represents the predicate it's named for.
    pub fn is_negation(self) -> bool {
        matches!(
            self,
            IndexStrategy::NotEqual
                | IndexStrategy::NotIn
                | IndexStrategy::NotGt
                | IndexStrategy::NotGte
                | IndexStrategy::NotLt
                | IndexStrategy::NotLte
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_prefixed_strategies_are_negations() {
        assert!(IndexStrategy::NotEqual.is_negation());
        assert!(IndexStrategy::NotGte.is_negation());
        assert!(!IndexStrategy::Equal.is_negation());
        assert!(!IndexStrategy::Range.is_negation());
    }
}
