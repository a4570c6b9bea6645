use super::cfg_if;
use crate::error::MatchingError;
use crate::util::*;

/// whether the crate was compiled against the blossom V library
pub fn is_available() -> bool {
    cfg!(feature = "blossom_v")
}

/// the largest edge weight passed to the library; keeps the doubled dual variables inside `c_int`
pub const MAX_SAFE_WEIGHT: Weight = (i32::MAX / 8) as Weight;

cfg_if::cfg_if! {
    if #[cfg(feature="blossom_v")] {

        use super::libc;
        use libc::{c_int};
        use std::collections::BTreeSet;

        #[link(name = "blossomV")]
        extern {
            fn minimum_weight_perfect_matching(node_num: c_int, edge_num: c_int, edges: *const c_int, weights: *const c_int, matched: *mut c_int);
        }

        pub fn safe_minimum_weight_perfect_matching(node_num: NodeNum, weighted_edges: &[(NodeIndex, NodeIndex, Weight)]) -> Result<Vec<NodeIndex>, MatchingError> {
            let edge_num = weighted_edges.len();
            let mut edges = Vec::with_capacity(2 * edge_num);
            let mut weights = Vec::with_capacity(edge_num);
            let mut existing_edges = BTreeSet::new();
            for &(i, j, weight) in weighted_edges.iter() {
                if i == j || i >= node_num || j >= node_num || !existing_edges.insert((i.min(j), i.max(j))) {
                    return Err(MatchingError::InvalidEdge(i, j));
                }
                if !(0..=MAX_SAFE_WEIGHT).contains(&weight) {
                    return Err(MatchingError::WeightOverflow { weight, max_safe_weight: MAX_SAFE_WEIGHT });
                }
                edges.push(i as c_int);
                edges.push(j as c_int);
                weights.push(weight as c_int);
            }
            if node_num % 2 == 1 {
                return Err(MatchingError::NoPerfectMatching { node_num });
            }
            if node_num == 0 {
                return Ok(vec![]);
            }
            let mut output = Vec::<c_int>::with_capacity(node_num);
            unsafe {
                minimum_weight_perfect_matching(node_num as c_int, edge_num as c_int, edges.as_ptr(), weights.as_ptr(), output.as_mut_ptr());
                output.set_len(node_num);
            }
            Ok(output.iter().map(|x| *x as usize).collect())
        }

    } else {

        pub fn safe_minimum_weight_perfect_matching(_node_num: NodeNum, _weighted_edges: &[(NodeIndex, NodeIndex, Weight)]) -> Result<Vec<NodeIndex>, MatchingError> {
            Err(MatchingError::BlossomVUnavailable)
        }

    }
}
