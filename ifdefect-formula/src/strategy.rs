//! Proptest strategies for generating boolean expressions.

use proptest::prelude::*;

use crate::expr::BoolExpr;

/// Generate an expression over variables `V0 .. V<max_vars>`.
pub fn expr(max_vars: usize, depth: u32) -> impl Strategy<Value = BoolExpr> {
    let leaf = prop_oneof![
        1 => any::<bool>().prop_map(BoolExpr::constant),
        4 => (0..max_vars).prop_map(|index| BoolExpr::var(format!("V{}", index))),
    ];
    leaf.prop_recursive(depth, 64, 2, |inner| {
        prop_oneof![
            inner.clone().prop_map(BoolExpr::not),
            (inner.clone(), inner.clone()).prop_map(|(l, r)| BoolExpr::and(l, r)),
            (inner.clone(), inner.clone()).prop_map(|(l, r)| BoolExpr::or(l, r)),
            (inner.clone(), inner.clone()).prop_map(|(l, r)| BoolExpr::implies(l, r)),
            (inner.clone(), inner.clone()).prop_map(|(l, r)| BoolExpr::iff(l, r)),
        ]
    })
}
