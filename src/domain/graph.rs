/// Grid adjacency graph and trap-aware reachability.
///
/// Nodes are grid cells indexed `row * size + col`. Every node links to its
/// (up to) 8 geometric neighbours, diagonals included, in a fixed order:
///
///   (-1,-1) (-1,0) (-1,1)
///   ( 0,-1)        ( 0,1)
///   ( 1,-1) ( 1,0) ( 1,1)
///
/// Adjacency is computed per node from geometry alone, so the graph is
/// symmetric by construction.

use std::collections::HashSet;

const DIRS: [(i32, i32); 8] = [
    (-1, -1), (-1, 0), (-1, 1),
    (0, -1),           (0, 1),
    (1, -1),  (1, 0),  (1, 1),
];

#[derive(Clone, Debug)]
pub struct Graph {
    size: usize,
    adjacency: Vec<Vec<usize>>,
}

impl Graph {
    /// Build the 8-connected graph for a `size × size` grid.
    pub fn generate(size: usize) -> Self {
        let total = size * size;
        let mut adjacency = Vec::with_capacity(total);

        for node in 0..total {
            let row = (node / size) as i32;
            let col = (node % size) as i32;
            let mut neighbors = Vec::with_capacity(8);
            for &(dr, dc) in &DIRS {
                let r = row + dr;
                let c = col + dc;
                if r >= 0 && r < size as i32 && c >= 0 && c < size as i32 {
                    neighbors.push(r as usize * size + c as usize);
                }
            }
            adjacency.push(neighbors);
        }

        Graph { size, adjacency }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn node_count(&self) -> usize {
        self.adjacency.len()
    }

    /// Neighbours of `node` in direction order. Empty for out-of-range nodes.
    pub fn neighbors(&self, node: usize) -> &[usize] {
        self.adjacency.get(node).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Depth-first search from `start` to `target` that never steps on a trap.
///
/// The trap check runs before the target check, so a trapped target (or a
/// trapped start) is never reachable.
pub fn can_reach(graph: &Graph, traps: &HashSet<usize>, start: usize, target: usize) -> bool {
    if start >= graph.node_count() {
        return false;
    }

    let mut visited = vec![false; graph.node_count()];
    let mut stack = vec![start];

    while let Some(current) = stack.pop() {
        if visited[current] { continue; }
        if traps.contains(&current) { continue; }
        if current == target { return true; }
        visited[current] = true;

        // Reverse push keeps the visiting order equal to a recursive DFS.
        for &next in graph.neighbors(current).iter().rev() {
            if !visited[next] {
                stack.push(next);
            }
        }
    }

    false
}

// ══════════════════════════════════════════════════════════════
// Unit tests
// ══════════════════════════════════════════════════════════════
