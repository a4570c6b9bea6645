//! Serial Blossom
//!
//! Edmonds' weighted matching with the primal-dual blossom method, `O(n^3)`. Vertices carry dual variables; blossoms
//! are shrunk into pseudo-vertices `n..2n` when an odd alternating cycle becomes tight and expanded again when their
//! dual drops to zero. Every stage either augments the matching by one edge or proves that no augmenting path exists.
//!
//! Endpoints are indexed `2k` and `2k+1` for edge `k`, so `p ^ 1` is the opposite endpoint of `p`.
//!

use crate::error::MatchingError;
use crate::util::*;

const NONE: usize = usize::MAX;

/// vertex label: free, outer (S), inner (T), and the temporary breadcrumb used while scanning for a blossom base
const FREE: i8 = 0;
const OUTER: i8 = 1;
const INNER: i8 = 2;
const BREADCRUMB: i8 = 5;
const EXPANDED: i8 = -1;

/// index into a cyclic child list with negative offsets counting from the end
fn cyclic<T: Copy>(list: &[T], index: isize) -> T {
    let len = list.len() as isize;
    list[(if index < 0 { index + len } else { index }) as usize]
}

struct MaxWeightMatching<'a> {
    edges: &'a [(usize, usize, i64)],
    vertex_num: usize,
    max_cardinality: bool,
    endpoint: Vec<usize>,
    neighbor_endpoints: Vec<Vec<usize>>,
    /// endpoint a vertex is matched through, `NONE` if single
    mate: Vec<usize>,
    label: Vec<i8>,
    label_end: Vec<usize>,
    in_blossom: Vec<usize>,
    blossom_parent: Vec<usize>,
    blossom_children: Vec<Vec<usize>>,
    blossom_base: Vec<usize>,
    blossom_endpoints: Vec<Vec<usize>>,
    best_edge: Vec<usize>,
    blossom_best_edges: Vec<Option<Vec<usize>>>,
    unused_blossoms: Vec<usize>,
    dual_var: Vec<i64>,
    allow_edge: Vec<bool>,
    queue: Vec<usize>,
}

impl<'a> MaxWeightMatching<'a> {
    fn new(vertex_num: usize, edges: &'a [(usize, usize, i64)], max_cardinality: bool) -> Self {
        let endpoint: Vec<usize> = (0..2 * edges.len())
            .map(|p| if p % 2 == 0 { edges[p / 2].0 } else { edges[p / 2].1 })
            .collect();
        let mut neighbor_endpoints = vec![vec![]; vertex_num];
        for (k, &(i, j, _)) in edges.iter().enumerate() {
            neighbor_endpoints[i].push(2 * k + 1);
            neighbor_endpoints[j].push(2 * k);
        }
        let max_weight = edges.iter().map(|&(_, _, w)| w).max().unwrap_or(0).max(0);
        let mut dual_var = vec![max_weight; vertex_num];
        dual_var.extend(std::iter::repeat(0).take(vertex_num));
        let mut blossom_base: Vec<usize> = (0..vertex_num).collect();
        blossom_base.extend(std::iter::repeat(NONE).take(vertex_num));
        Self {
            edges,
            vertex_num,
            max_cardinality,
            endpoint,
            neighbor_endpoints,
            mate: vec![NONE; vertex_num],
            label: vec![FREE; 2 * vertex_num],
            label_end: vec![NONE; 2 * vertex_num],
            in_blossom: (0..vertex_num).collect(),
            blossom_parent: vec![NONE; 2 * vertex_num],
            blossom_children: vec![vec![]; 2 * vertex_num],
            blossom_base,
            blossom_endpoints: vec![vec![]; 2 * vertex_num],
            best_edge: vec![NONE; 2 * vertex_num],
            blossom_best_edges: vec![None; 2 * vertex_num],
            unused_blossoms: (vertex_num..2 * vertex_num).collect(),
            dual_var,
            allow_edge: vec![false; edges.len()],
            queue: vec![],
        }
    }

    fn slack(&self, k: usize) -> i64 {
        let (i, j, weight) = self.edges[k];
        self.dual_var[i] + self.dual_var[j] - 2 * weight
    }

    fn blossom_leaves(&self, b: usize) -> Vec<usize> {
        let mut leaves = vec![];
        self.collect_leaves(b, &mut leaves);
        leaves
    }

    fn collect_leaves(&self, b: usize, leaves: &mut Vec<usize>) {
        if b < self.vertex_num {
            leaves.push(b);
        } else {
            for &t in self.blossom_children[b].iter() {
                if t < self.vertex_num {
                    leaves.push(t);
                } else {
                    self.collect_leaves(t, leaves);
                }
            }
        }
    }

    /// label the top-level blossom containing `w` and, for an inner label, its mate as outer
    fn assign_label(&mut self, w: usize, t: i8, p: usize) {
        let b = self.in_blossom[w];
        debug_assert!(self.label[w] == FREE && self.label[b] == FREE);
        self.label[w] = t;
        self.label[b] = t;
        self.label_end[w] = p;
        self.label_end[b] = p;
        self.best_edge[w] = NONE;
        self.best_edge[b] = NONE;
        if t == OUTER {
            let leaves = self.blossom_leaves(b);
            self.queue.extend(leaves);
        } else if t == INNER {
            let base = self.blossom_base[b];
            let mate_endpoint = self.mate[base];
            debug_assert_ne!(mate_endpoint, NONE, "the base of an inner blossom must be matched");
            self.assign_label(self.endpoint[mate_endpoint], OUTER, mate_endpoint ^ 1);
        }
    }

    /// trace back from `v` and `w` to find either a new blossom base or an augmenting path (`NONE`)
    fn scan_blossom(&mut self, v: usize, w: usize) -> usize {
        let mut path = vec![];
        let mut base = NONE;
        let (mut v, mut w) = (v, w);
        while v != NONE || w != NONE {
            let mut b = self.in_blossom[v];
            if self.label[b] & 4 != 0 {
                base = self.blossom_base[b];
                break;
            }
            debug_assert_eq!(self.label[b], OUTER);
            path.push(b);
            self.label[b] = BREADCRUMB;
            if self.label_end[b] == NONE {
                // reached a single vertex, stop this branch
                v = NONE;
            } else {
                v = self.endpoint[self.label_end[b]];
                b = self.in_blossom[v];
                debug_assert_eq!(self.label[b], INNER);
                v = self.endpoint[self.label_end[b]];
            }
            if w != NONE {
                std::mem::swap(&mut v, &mut w);
            }
        }
        for b in path {
            self.label[b] = OUTER;
        }
        base
    }

    /// shrink the odd cycle closed by edge `k` into a new outer blossom with the given base
    fn add_blossom(&mut self, base: usize, k: usize) {
        let (v, w, _) = self.edges[k];
        let bb = self.in_blossom[base];
        let mut bv = self.in_blossom[v];
        let mut bw = self.in_blossom[w];
        let b = self.unused_blossoms.pop().expect("at most n blossoms exist at any time");
        self.blossom_base[b] = base;
        self.blossom_parent[b] = NONE;
        self.blossom_parent[bb] = b;
        let mut path = vec![];
        let mut endpoints = vec![];
        while bv != bb {
            self.blossom_parent[bv] = b;
            path.push(bv);
            endpoints.push(self.label_end[bv]);
            let v = self.endpoint[self.label_end[bv]];
            bv = self.in_blossom[v];
        }
        path.push(bb);
        path.reverse();
        endpoints.reverse();
        endpoints.push(2 * k);
        while bw != bb {
            self.blossom_parent[bw] = b;
            path.push(bw);
            endpoints.push(self.label_end[bw] ^ 1);
            let w = self.endpoint[self.label_end[bw]];
            bw = self.in_blossom[w];
        }
        debug_assert_eq!(self.label[bb], OUTER);
        self.label[b] = OUTER;
        self.label_end[b] = self.label_end[bb];
        self.dual_var[b] = 0;
        self.blossom_children[b] = path.clone();
        self.blossom_endpoints[b] = endpoints;
        for v in self.blossom_leaves(b) {
            if self.label[self.in_blossom[v]] == INNER {
                // former inner vertices become outer and must be scanned
                self.queue.push(v);
            }
            self.in_blossom[v] = b;
        }
        // least-slack edges from the new blossom to each neighbouring outer blossom
        let mut best_edge_to = vec![NONE; 2 * self.vertex_num];
        for &bv in path.iter() {
            let neighbor_lists: Vec<Vec<usize>> = match self.blossom_best_edges[bv].take() {
                Some(list) => vec![list],
                None => self
                    .blossom_leaves(bv)
                    .into_iter()
                    .map(|v| self.neighbor_endpoints[v].iter().map(|p| p / 2).collect())
                    .collect(),
            };
            for neighbor_list in neighbor_lists {
                for k in neighbor_list {
                    let (i, j, _) = self.edges[k];
                    let j = if self.in_blossom[j] == b { i } else { j };
                    let bj = self.in_blossom[j];
                    if bj != b
                        && self.label[bj] == OUTER
                        && (best_edge_to[bj] == NONE || self.slack(k) < self.slack(best_edge_to[bj]))
                    {
                        best_edge_to[bj] = k;
                    }
                }
            }
            self.best_edge[bv] = NONE;
        }
        let best_edges: Vec<usize> = best_edge_to.into_iter().filter(|&k| k != NONE).collect();
        self.best_edge[b] = NONE;
        for &k in best_edges.iter() {
            if self.best_edge[b] == NONE || self.slack(k) < self.slack(self.best_edge[b]) {
                self.best_edge[b] = k;
            }
        }
        self.blossom_best_edges[b] = Some(best_edges);
    }

    fn expand_blossom(&mut self, b: usize, end_stage: bool) {
        let children = self.blossom_children[b].clone();
        for &s in children.iter() {
            self.blossom_parent[s] = NONE;
            if s < self.vertex_num {
                self.in_blossom[s] = s;
            } else if end_stage && self.dual_var[s] == 0 {
                self.expand_blossom(s, end_stage);
            } else {
                for v in self.blossom_leaves(s) {
                    self.in_blossom[v] = s;
                }
            }
        }
        if !end_stage && self.label[b] == INNER {
            // relabel the even-length path from the entry child to the base
            let endpoints = self.blossom_endpoints[b].clone();
            let entry_child = self.in_blossom[self.endpoint[self.label_end[b] ^ 1]];
            let mut j = children
                .iter()
                .position(|&c| c == entry_child)
                .expect("entry child belongs to the blossom") as isize;
            let (j_step, endpoint_trick): (isize, usize) = if j & 1 != 0 {
                j -= children.len() as isize;
                (1, 0)
            } else {
                (-1, 1)
            };
            let mut p = self.label_end[b];
            while j != 0 {
                self.label[self.endpoint[p ^ 1]] = FREE;
                let q = cyclic(&endpoints, j - endpoint_trick as isize);
                self.label[self.endpoint[q ^ endpoint_trick ^ 1]] = FREE;
                self.assign_label(self.endpoint[p ^ 1], INNER, p);
                self.allow_edge[q / 2] = true;
                j += j_step;
                p = cyclic(&endpoints, j - endpoint_trick as isize) ^ endpoint_trick;
                self.allow_edge[p / 2] = true;
                j += j_step;
            }
            let bv = cyclic(&children, j);
            self.label[self.endpoint[p ^ 1]] = INNER;
            self.label[bv] = INNER;
            self.label_end[self.endpoint[p ^ 1]] = p;
            self.label_end[bv] = p;
            self.best_edge[bv] = NONE;
            j += j_step;
            while cyclic(&children, j) != entry_child {
                let bv = cyclic(&children, j);
                if self.label[bv] == OUTER {
                    j += j_step;
                    continue;
                }
                let labeled = self.blossom_leaves(bv).into_iter().find(|&v| self.label[v] != FREE);
                if let Some(v) = labeled {
                    debug_assert_eq!(self.label[v], INNER);
                    self.label[v] = FREE;
                    self.label[self.endpoint[self.mate[self.blossom_base[bv]]]] = FREE;
                    self.assign_label(v, INNER, self.label_end[v]);
                }
                j += j_step;
            }
        }
        self.label[b] = EXPANDED;
        self.label_end[b] = NONE;
        self.blossom_children[b] = vec![];
        self.blossom_endpoints[b] = vec![];
        self.blossom_base[b] = NONE;
        self.blossom_best_edges[b] = None;
        self.best_edge[b] = NONE;
        self.unused_blossoms.push(b);
    }

    /// swap matched and unmatched edges along the path from `v` to the base of blossom `b`
    fn augment_blossom(&mut self, b: usize, v: usize) {
        let mut t = v;
        while self.blossom_parent[t] != b {
            t = self.blossom_parent[t];
        }
        if t >= self.vertex_num {
            self.augment_blossom(t, v);
        }
        let i = self.blossom_children[b]
            .iter()
            .position(|&c| c == t)
            .expect("child belongs to the blossom");
        let mut j = i as isize;
        let (j_step, endpoint_trick): (isize, usize) = if i & 1 != 0 {
            j -= self.blossom_children[b].len() as isize;
            (1, 0)
        } else {
            (-1, 1)
        };
        while j != 0 {
            j += j_step;
            let t = cyclic(&self.blossom_children[b], j);
            let p = cyclic(&self.blossom_endpoints[b], j - endpoint_trick as isize) ^ endpoint_trick;
            if t >= self.vertex_num {
                self.augment_blossom(t, self.endpoint[p]);
            }
            j += j_step;
            let t = cyclic(&self.blossom_children[b], j);
            if t >= self.vertex_num {
                self.augment_blossom(t, self.endpoint[p ^ 1]);
            }
            self.mate[self.endpoint[p]] = p ^ 1;
            self.mate[self.endpoint[p ^ 1]] = p;
        }
        self.blossom_children[b].rotate_left(i);
        self.blossom_endpoints[b].rotate_left(i);
        self.blossom_base[b] = self.blossom_base[self.blossom_children[b][0]];
        debug_assert_eq!(self.blossom_base[b], v);
    }

    /// augment along the path through edge `k` connecting two single outer vertices
    fn augment_matching(&mut self, k: usize) {
        let (v, w, _) = self.edges[k];
        for (s, p) in [(v, 2 * k + 1), (w, 2 * k)] {
            let (mut s, mut p) = (s, p);
            loop {
                let bs = self.in_blossom[s];
                debug_assert_eq!(self.label[bs], OUTER);
                if bs >= self.vertex_num {
                    self.augment_blossom(bs, s);
                }
                self.mate[s] = p;
                if self.label_end[bs] == NONE {
                    break;
                }
                let t = self.endpoint[self.label_end[bs]];
                let bt = self.in_blossom[t];
                debug_assert_eq!(self.label[bt], INNER);
                s = self.endpoint[self.label_end[bt]];
                let j = self.endpoint[self.label_end[bt] ^ 1];
                if bt >= self.vertex_num {
                    self.augment_blossom(bt, j);
                }
                self.mate[j] = self.label_end[bt];
                p = self.label_end[bt] ^ 1;
            }
        }
    }

    fn scan_queue(&mut self) -> bool {
        while let Some(v) = self.queue.pop() {
            debug_assert_eq!(self.label[self.in_blossom[v]], OUTER);
            for index in 0..self.neighbor_endpoints[v].len() {
                let p = self.neighbor_endpoints[v][index];
                let k = p / 2;
                let w = self.endpoint[p];
                if self.in_blossom[v] == self.in_blossom[w] {
                    continue;
                }
                let mut k_slack = 0;
                if !self.allow_edge[k] {
                    k_slack = self.slack(k);
                    if k_slack <= 0 {
                        self.allow_edge[k] = true;
                    }
                }
                if self.allow_edge[k] {
                    if self.label[self.in_blossom[w]] == FREE {
                        self.assign_label(w, INNER, p ^ 1);
                    } else if self.label[self.in_blossom[w]] == OUTER {
                        let base = self.scan_blossom(v, w);
                        if base != NONE {
                            self.add_blossom(base, k);
                        } else {
                            self.augment_matching(k);
                            return true;
                        }
                    } else if self.label[w] == FREE {
                        // w is inside an inner blossom but not yet reached from outside
                        self.label[w] = INNER;
                        self.label_end[w] = p ^ 1;
                    }
                } else if self.label[self.in_blossom[w]] == OUTER {
                    let b = self.in_blossom[v];
                    if self.best_edge[b] == NONE || k_slack < self.slack(self.best_edge[b]) {
                        self.best_edge[b] = k;
                    }
                } else if self.label[w] == FREE
                    && (self.best_edge[w] == NONE || k_slack < self.slack(self.best_edge[w]))
                {
                    self.best_edge[w] = k;
                }
            }
        }
        false
    }

    /// one stage: grow alternating trees until an augmenting path is found or the duals prove none exists
    fn stage(&mut self) -> bool {
        let n = self.vertex_num;
        self.label.iter_mut().for_each(|l| *l = FREE);
        self.best_edge.iter_mut().for_each(|e| *e = NONE);
        for b in n..2 * n {
            self.blossom_best_edges[b] = None;
        }
        self.allow_edge.iter_mut().for_each(|a| *a = false);
        self.queue.clear();
        for v in 0..n {
            if self.mate[v] == NONE && self.label[self.in_blossom[v]] == FREE {
                self.assign_label(v, OUTER, NONE);
            }
        }
        loop {
            if self.scan_queue() {
                return true;
            }
            // no progress possible with tight edges, compute the dual step
            let mut delta_type = 0;
            let mut delta: i64 = 0;
            let mut delta_edge = NONE;
            let mut delta_blossom = NONE;
            if !self.max_cardinality {
                delta_type = 1;
                delta = self.dual_var[..n].iter().copied().min().unwrap_or(0);
            }
            for v in 0..n {
                if self.label[self.in_blossom[v]] == FREE && self.best_edge[v] != NONE {
                    let d = self.slack(self.best_edge[v]);
                    if delta_type == 0 || d < delta {
                        delta = d;
                        delta_type = 2;
                        delta_edge = self.best_edge[v];
                    }
                }
            }
            for b in 0..2 * n {
                if self.blossom_parent[b] == NONE && self.label[b] == OUTER && self.best_edge[b] != NONE {
                    let k_slack = self.slack(self.best_edge[b]);
                    debug_assert_eq!(k_slack % 2, 0, "integer weights keep the slack between outer vertices even");
                    let d = k_slack / 2;
                    if delta_type == 0 || d < delta {
                        delta = d;
                        delta_type = 3;
                        delta_edge = self.best_edge[b];
                    }
                }
            }
            for b in n..2 * n {
                if self.blossom_base[b] != NONE
                    && self.blossom_parent[b] == NONE
                    && self.label[b] == INNER
                    && (delta_type == 0 || self.dual_var[b] < delta)
                {
                    delta = self.dual_var[b];
                    delta_type = 4;
                    delta_blossom = b;
                }
            }
            if delta_type == 0 {
                // only reachable in max-cardinality mode: the matching is maximum, finish optimizing the duals
                delta_type = 1;
                delta = self.dual_var[..n].iter().copied().min().unwrap_or(0).max(0);
            }
            for v in 0..n {
                match self.label[self.in_blossom[v]] {
                    OUTER => self.dual_var[v] -= delta,
                    INNER => self.dual_var[v] += delta,
                    _ => {}
                }
            }
            for b in n..2 * n {
                if self.blossom_base[b] != NONE && self.blossom_parent[b] == NONE {
                    match self.label[b] {
                        OUTER => self.dual_var[b] += delta,
                        INNER => self.dual_var[b] -= delta,
                        _ => {}
                    }
                }
            }
            match delta_type {
                1 => return false,
                2 => {
                    self.allow_edge[delta_edge] = true;
                    let (i, j, _) = self.edges[delta_edge];
                    let i = if self.label[self.in_blossom[i]] == FREE { j } else { i };
                    debug_assert_eq!(self.label[self.in_blossom[i]], OUTER);
                    self.queue.push(i);
                }
                3 => {
                    self.allow_edge[delta_edge] = true;
                    let (i, _, _) = self.edges[delta_edge];
                    debug_assert_eq!(self.label[self.in_blossom[i]], OUTER);
                    self.queue.push(i);
                }
                _ => self.expand_blossom(delta_blossom, false),
            }
        }
    }

    fn solve(mut self) -> Vec<Option<usize>> {
        let n = self.vertex_num;
        for _ in 0..n {
            if !self.stage() {
                break;
            }
            // outer blossoms with zero dual are no longer needed
            for b in n..2 * n {
                if self.blossom_parent[b] == NONE
                    && self.blossom_base[b] != NONE
                    && self.label[b] == OUTER
                    && self.dual_var[b] == 0
                {
                    self.expand_blossom(b, true);
                }
            }
        }
        self.mate
            .iter()
            .map(|&p| if p == NONE { None } else { Some(self.endpoint[p]) })
            .collect()
    }
}

/// maximum-weight matching over `vertex_num` vertices; with `max_cardinality` only maximum-cardinality matchings are
/// considered. Returns the partner of every vertex, `None` if single.
pub fn max_weight_matching(
    vertex_num: usize,
    weighted_edges: &[(usize, usize, i64)],
    max_cardinality: bool,
) -> Vec<Option<usize>> {
    for &(i, j, _) in weighted_edges.iter() {
        assert!(i != j && i < vertex_num && j < vertex_num, "invalid edge ({i}, {j})");
    }
    MaxWeightMatching::new(vertex_num, weighted_edges, max_cardinality).solve()
}

/// minimum-weight perfect matching restricted to the supplied edges
pub fn minimum_weight_perfect_matching(
    node_num: usize,
    weighted_edges: &[(NodeIndex, NodeIndex, Weight)],
) -> Result<Vec<NodeIndex>, MatchingError> {
    for &(i, j, _) in weighted_edges.iter() {
        if i == j || i >= node_num || j >= node_num {
            return Err(MatchingError::InvalidEdge(i, j));
        }
    }
    // every perfect matching has `node_num / 2` edges, so maximizing `max - w` over maximum-cardinality matchings
    // minimizes the total weight; doubling keeps all dual variables integral
    let max_weight = weighted_edges.iter().map(|&(_, _, w)| w as i64).max().unwrap_or(0);
    let transformed: Vec<(usize, usize, i64)> = weighted_edges
        .iter()
        .map(|&(i, j, w)| (i, j, 2 * (max_weight - w as i64)))
        .collect();
    let mate = max_weight_matching(node_num, &transformed, true);
    mate.into_iter()
        .collect::<Option<Vec<usize>>>()
        .ok_or(MatchingError::NoPerfectMatching { node_num })
}
