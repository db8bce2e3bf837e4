//! Dependency tracking: which cells a formula reads, and the order cells
//! must recalculate in. Cycle detection uses an iterative Tarjan's SCC (no
//! recursion, so a long linear chain of references can't blow the stack);
//! recalculation order uses Kahn's algorithm with a deterministic tie-break
//! so two sheets with the same formulas always recalculate in the same
//! order.

use ahash::{AHashMap, AHashSet};
use calcsheet_core::{CellAddress, CellValue, Sheet};
use std::cmp::Reverse;
use std::collections::BinaryHeap;

use crate::ast::FormulaExpr;
use crate::error::EvalError;

fn sort_key(addr: &CellAddress) -> (String, u32, u16) {
    (addr.sheet.as_deref().unwrap_or("").to_string(), addr.row, addr.col)
}

/// A directed graph of cell references: an edge `dependent -> precedent`
/// means `dependent`'s formula reads `precedent`.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    precedents: AHashMap<CellAddress, AHashSet<CellAddress>>,
    dependents: AHashMap<CellAddress, AHashSet<CellAddress>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `dependent`'s formula reads `precedent`.
    pub fn add_dependency(&mut self, dependent: CellAddress, precedent: CellAddress) {
        self.precedents.entry(dependent.clone()).or_default().insert(precedent.clone());
        self.dependents.entry(dependent.clone()).or_default();
        self.dependents.entry(precedent).or_default().insert(dependent);
    }

    /// Build a graph from every formula cell in `sheet`: parse each
    /// `Formula(source, _)`'s source, extract every `Ref` and range it
    /// reads, expand each range to its contained addresses, and populate
    /// both the precedent and dependent adjacency maps. Non-formula cells
    /// (constants) never become keys of `precedents` — they're leaves, not
    /// nodes to recalculate.
    pub fn from_sheet(sheet: &Sheet) -> Result<Self, EvalError> {
        let mut graph = Self::new();
        for (addr, value) in sheet.iter() {
            let CellValue::Formula { source, .. } = value else {
                continue;
            };
            let expr = crate::parser::parse(source)?;
            graph.precedents.entry(addr.clone()).or_default();
            graph.dependents.entry(addr.clone()).or_default();

            let mut deps = AHashSet::new();
            collect_dependencies(&expr, &mut deps);
            for dep in deps {
                graph.add_dependency(addr.clone(), dep);
            }
        }
        Ok(graph)
    }

    /// Build a graph from `(dependent, [precedents])` pairs, e.g. produced by
    /// walking every formula cell's AST with `collect_ranges`/`Ref` nodes.
    pub fn from_edges(edges: impl IntoIterator<Item = (CellAddress, Vec<CellAddress>)>) -> Self {
        let mut graph = Self::new();
        for (dependent, precedents) in edges {
            graph.precedents.entry(dependent.clone()).or_default();
            graph.dependents.entry(dependent.clone()).or_default();
            for precedent in precedents {
                graph.add_dependency(dependent.clone(), precedent);
            }
        }
        graph
    }

    pub fn precedents(&self, cell: &CellAddress) -> impl Iterator<Item = &CellAddress> {
        self.precedents.get(cell).into_iter().flat_map(|s| s.iter())
    }

    pub fn dependents(&self, cell: &CellAddress) -> impl Iterator<Item = &CellAddress> {
        self.dependents.get(cell).into_iter().flat_map(|s| s.iter())
    }

    fn nodes(&self) -> AHashSet<CellAddress> {
        let mut out: AHashSet<CellAddress> = self.precedents.keys().cloned().collect();
        out.extend(self.dependents.keys().cloned());
        for set in self.precedents.values() {
            out.extend(set.iter().cloned());
        }
        for set in self.dependents.values() {
            out.extend(set.iter().cloned());
        }
        out
    }

    /// Every strongly connected component with more than one member, plus
    /// any single-cell self-loop (`A1` referring to itself), each
    /// canonicalized to start at its lexicographically smallest address and
    /// closed by repeating that address at the end.
    pub fn detect_cycles(&self) -> Vec<Vec<CellAddress>> {
        let mut tarjan = Tarjan::new(self);
        let mut nodes: Vec<CellAddress> = self.nodes().into_iter().collect();
        nodes.sort_by_key(sort_key);
        for node in &nodes {
            if !tarjan.indices.contains_key(node) {
                tarjan.run(node.clone());
            }
        }
        tarjan
            .sccs
            .into_iter()
            .filter(|scc| scc.len() > 1 || self.precedents.get(&scc[0]).is_some_and(|p| p.contains(&scc[0])))
            .map(|scc| self.extract_cycle(scc))
            .collect()
    }

    /// Reconstruct one simple cycle through an SCC, starting at its
    /// lexicographically smallest address and closing by repeating it.
    fn extract_cycle(&self, scc: Vec<CellAddress>) -> Vec<CellAddress> {
        let members: AHashSet<CellAddress> = scc.iter().cloned().collect();
        let mut start = scc;
        start.sort_by_key(sort_key);
        let start = start.into_iter().next().unwrap();

        let mut path = vec![start.clone()];
        let mut visited: AHashSet<CellAddress> = AHashSet::new();
        visited.insert(start.clone());
        let mut current = start.clone();
        loop {
            let mut next_candidates: Vec<CellAddress> = self
                .precedents(&current)
                .filter(|p| members.contains(*p))
                .cloned()
                .collect();
            next_candidates.sort_by_key(sort_key);

            if next_candidates.contains(&start) && path.len() > 1 {
                path.push(start);
                break;
            }
            match next_candidates.into_iter().find(|c| !visited.contains(c)) {
                Some(next) => {
                    visited.insert(next.clone());
                    path.push(next.clone());
                    current = next;
                }
                None => {
                    // Single-node self-loop, or nothing left to extend: close here.
                    path.push(start);
                    break;
                }
            }
        }
        path
    }

    /// A full recalculation order honoring every dependency, or the
    /// offending cycle if the graph is not a DAG.
    pub fn topological_sort(&self) -> Result<Vec<CellAddress>, EvalError> {
        let cycles = self.detect_cycles();
        if let Some(cycle) = cycles.into_iter().next() {
            return Err(EvalError::CircularRef { cycle });
        }

        let nodes = self.nodes();
        let mut indegree: AHashMap<CellAddress, usize> =
            nodes.iter().map(|n| (n.clone(), 0)).collect();
        for (dependent, precedents) in &self.precedents {
            *indegree.entry(dependent.clone()).or_insert(0) = precedents.len();
        }

        let mut heap: BinaryHeap<Reverse<(String, u32, u16)>> = BinaryHeap::new();
        let key_of: AHashMap<(String, u32, u16), CellAddress> =
            nodes.iter().map(|n| (sort_key(n), n.clone())).collect();
        for (node, deg) in &indegree {
            if *deg == 0 {
                heap.push(Reverse(sort_key(node)));
            }
        }

        let mut order = Vec::with_capacity(nodes.len());
        while let Some(Reverse(key)) = heap.pop() {
            let node = key_of[&key].clone();
            order.push(node.clone());
            for dependent in self.dependents(&node).cloned().collect::<Vec<_>>() {
                let deg = indegree.get_mut(&dependent).unwrap();
                *deg -= 1;
                if *deg == 0 {
                    heap.push(Reverse(sort_key(&dependent)));
                }
            }
        }

        if order.len() != nodes.len() {
            return Err(EvalError::InternalError(
                "topological_sort: graph has a cycle detect_cycles did not find".into(),
            ));
        }

        // Only formula cells recalculate; leaf constants are never a key of
        // `precedents` (see `add_dependency`/`from_sheet`), so this also
        // drops them from the returned order.
        Ok(order.into_iter().filter(|n| self.precedents.contains_key(n)).collect())
    }
}

/// Every cell address `expr` reads: single `Ref`s plus every address
/// contained in a `Local`/`Cross` range, expanded out.
fn collect_dependencies(expr: &FormulaExpr, out: &mut AHashSet<CellAddress>) {
    match expr {
        FormulaExpr::Lit(_) | FormulaExpr::Today | FormulaExpr::Now => {}
        FormulaExpr::Ref { addr, .. } => {
            out.insert(addr.clone());
        }
        FormulaExpr::Local(range) => out.extend(range.cells()),
        FormulaExpr::Cross(sheet, range) => {
            out.extend(range.cells().map(|addr| addr.with_sheet(sheet.clone())));
        }
        FormulaExpr::Neg(e)
        | FormulaExpr::Percent(e)
        | FormulaExpr::Not(e)
        | FormulaExpr::DateToSerial(e)
        | FormulaExpr::Transpose(e) => collect_dependencies(e, out),
        FormulaExpr::Add(a, b)
        | FormulaExpr::Sub(a, b)
        | FormulaExpr::Mul(a, b)
        | FormulaExpr::Div(a, b)
        | FormulaExpr::Pow(a, b)
        | FormulaExpr::Eq(a, b)
        | FormulaExpr::Neq(a, b)
        | FormulaExpr::Lt(a, b)
        | FormulaExpr::Lte(a, b)
        | FormulaExpr::Gt(a, b)
        | FormulaExpr::Gte(a, b) => {
            collect_dependencies(a, out);
            collect_dependencies(b, out);
        }
        FormulaExpr::And(items) | FormulaExpr::Or(items) | FormulaExpr::Concatenate(items) | FormulaExpr::SumProduct(items) => {
            for i in items {
                collect_dependencies(i, out);
            }
        }
        FormulaExpr::If(c, t, e) => {
            collect_dependencies(c, out);
            collect_dependencies(t, out);
            collect_dependencies(e, out);
        }
        FormulaExpr::Call { args, .. } => {
            for a in args {
                collect_dependencies(a, out);
            }
        }
        FormulaExpr::Date(y, m, d) => {
            collect_dependencies(y, out);
            collect_dependencies(m, out);
            collect_dependencies(d, out);
        }
        FormulaExpr::Aggregate { args, .. } => {
            for a in args {
                collect_dependencies(a, out);
            }
        }
        FormulaExpr::SumIf { range, criteria, sum_range } => {
            collect_dependencies(range, out);
            collect_dependencies(criteria, out);
            if let Some(sr) = sum_range {
                collect_dependencies(sr, out);
            }
        }
        FormulaExpr::CountIf { range, criteria } => {
            collect_dependencies(range, out);
            collect_dependencies(criteria, out);
        }
        FormulaExpr::SumIfs { sum_range, criteria } => {
            collect_dependencies(sum_range, out);
            for (range, crit) in criteria {
                collect_dependencies(range, out);
                collect_dependencies(crit, out);
            }
        }
        FormulaExpr::CountIfs { criteria } => {
            for (range, crit) in criteria {
                collect_dependencies(range, out);
                collect_dependencies(crit, out);
            }
        }
    }
}

struct Tarjan<'a> {
    graph: &'a DependencyGraph,
    indices: AHashMap<CellAddress, usize>,
    lowlink: AHashMap<CellAddress, usize>,
    on_stack: AHashSet<CellAddress>,
    stack: Vec<CellAddress>,
    next_index: usize,
    sccs: Vec<Vec<CellAddress>>,
}

enum Frame {
    Enter(CellAddress),
    Exit(CellAddress),
}

impl<'a> Tarjan<'a> {
    fn new(graph: &'a DependencyGraph) -> Self {
        Self {
            graph,
            indices: AHashMap::new(),
            lowlink: AHashMap::new(),
            on_stack: AHashSet::new(),
            stack: Vec::new(),
            next_index: 0,
            sccs: Vec::new(),
        }
    }

    /// Iterative Tarjan's algorithm rooted at `start`. Follows the
    /// dependency edges (`dependent -> precedent`, i.e. `precedents()`).
    fn run(&mut self, start: CellAddress) {
        let mut work: Vec<Frame> = vec![Frame::Enter(start)];
        let mut child_iters: AHashMap<CellAddress, Vec<CellAddress>> = AHashMap::new();

        while let Some(frame) = work.pop() {
            match frame {
                Frame::Enter(v) => {
                    if self.indices.contains_key(&v) {
                        continue;
                    }
                    self.indices.insert(v.clone(), self.next_index);
                    self.lowlink.insert(v.clone(), self.next_index);
                    self.next_index += 1;
                    self.stack.push(v.clone());
                    self.on_stack.insert(v.clone());

                    let mut children: Vec<CellAddress> = self.graph.precedents(&v).cloned().collect();
                    children.sort_by_key(sort_key);
                    child_iters.insert(v.clone(), children);

                    work.push(Frame::Exit(v.clone()));
                    let children = child_iters.get(&v).unwrap().clone();
                    for w in children.into_iter().rev() {
                        if !self.indices.contains_key(&w) {
                            work.push(Frame::Enter(w));
                        } else if self.on_stack.contains(&w) {
                            let v_low = self.lowlink[&v];
                            let w_idx = self.indices[&w];
                            self.lowlink.insert(v, v_low.min(w_idx));
                        }
                    }
                }
                Frame::Exit(v) => {
                    let children = child_iters.get(&v).cloned().unwrap_or_default();
                    for w in &children {
                        if self.on_stack.contains(w) {
                            let v_low = self.lowlink[&v];
                            let w_low = self.lowlink[w];
                            self.lowlink.insert(v.clone(), v_low.min(w_low));
                        }
                    }

                    if self.lowlink[&v] == self.indices[&v] {
                        let mut scc = Vec::new();
                        loop {
                            let w = self.stack.pop().unwrap();
                            self.on_stack.remove(&w);
                            let is_v = w == v;
                            scc.push(w);
                            if is_v {
                                break;
                            }
                        }
                        self.sccs.push(scc);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(row: u32, col: u16) -> CellAddress {
        CellAddress::new(row, col)
    }

    #[test]
    fn diamond_topo_order_is_stable() {
        // A1 -> B1, A1 -> C1, B1 -> D1, C1 -> D1. A1 is a leaf constant here
        // (never recorded as a dependent), so it must not appear in the order.
        let mut g = DependencyGraph::new();
        g.add_dependency(addr(1, 0), addr(0, 0)); // B1 depends on A1
        g.add_dependency(addr(2, 0), addr(0, 0)); // C1 depends on A1
        g.add_dependency(addr(3, 0), addr(1, 0)); // D1 depends on B1
        g.add_dependency(addr(3, 0), addr(2, 0)); // D1 depends on C1

        let order = g.topological_sort().unwrap();
        assert_eq!(order.len(), 3);
        assert!(!order.contains(&addr(0, 0)));
        let pos = |a: &CellAddress| order.iter().position(|x| x == a).unwrap();
        assert!(pos(&addr(1, 0)) < pos(&addr(3, 0)));
        assert!(pos(&addr(2, 0)) < pos(&addr(3, 0)));
    }

    #[test]
    fn from_sheet_expands_ranges_and_excludes_leaf_constants() {
        let mut sheet = Sheet::new("Sheet1");
        sheet = sheet.put(&addr(0, 0), CellValue::from(10i64)); // A1 = 10
        sheet = sheet.put(&addr(1, 0), CellValue::formula("=A1+5")); // B1
        sheet = sheet.put(&addr(2, 0), CellValue::formula("=SUM(A1:A1)")); // C1, a 1-cell range

        let graph = DependencyGraph::from_sheet(&sheet).unwrap();
        let order = graph.topological_sort().unwrap();

        assert_eq!(order.len(), 2);
        assert!(order.contains(&addr(1, 0)));
        assert!(order.contains(&addr(2, 0)));
        assert!(!order.contains(&addr(0, 0)));
        assert!(graph.precedents(&addr(1, 0)).any(|p| *p == addr(0, 0)));
        assert!(graph.precedents(&addr(2, 0)).any(|p| *p == addr(0, 0)));
    }

    #[test]
    fn self_reference_is_a_cycle() {
        let mut g = DependencyGraph::new();
        g.add_dependency(addr(0, 0), addr(0, 0));
        let cycles = g.detect_cycles();
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].first(), cycles[0].last());
    }

    #[test]
    fn three_cycle_is_detected_and_topo_sort_fails() {
        let mut g = DependencyGraph::new();
        g.add_dependency(addr(0, 0), addr(1, 0));
        g.add_dependency(addr(1, 0), addr(2, 0));
        g.add_dependency(addr(2, 0), addr(0, 0));

        let cycles = g.detect_cycles();
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].len(), 4);

        assert!(g.topological_sort().is_err());
    }
}
