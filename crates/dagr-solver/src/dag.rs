//! Dependency graph views over the task arena.
//!
//! The graph works on arena indices, not id strings: edges are `usize`
//! adjacency lists, and back-edges (`predecessors`) are derived from the
//! forward `depends_on` sets at build time, never stored in the model.

use dagr_core::{Error, Project, Result, TaskId};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashSet, VecDeque};

/// Flattened dependency relation of a project, topologically ordered.
#[derive(Debug)]
pub struct DepGraph {
    /// Topological order of arena indices. Ties break on ascending
    /// numeric id suffix so every downstream pass is deterministic.
    order: Vec<usize>,
    /// `successors[i]` = indices depending on task `i`.
    successors: Vec<Vec<usize>>,
    /// `predecessors[i]` = indices task `i` depends on.
    predecessors: Vec<Vec<usize>>,
}

impl DepGraph {
    /// Build and validate the graph for a project.
    ///
    /// Fails with [`Error::UnknownTask`] for a dangling dependency and
    /// [`Error::CycleDetected`] (carrying one offending path) when the
    /// relation is not acyclic.
    pub fn build(project: &Project) -> Result<Self> {
        let tasks = project.tasks();
        let mut predecessors: Vec<Vec<usize>> = vec![Vec::new(); tasks.len()];
        let mut successors: Vec<Vec<usize>> = vec![Vec::new(); tasks.len()];

        for (idx, task) in tasks.iter().enumerate() {
            for dep in &task.depends_on {
                let dep_idx = project.index_of(*dep).ok_or(Error::UnknownTask(*dep))?;
                predecessors[idx].push(dep_idx);
                successors[dep_idx].push(idx);
            }
        }
        for list in predecessors.iter_mut().chain(successors.iter_mut()) {
            list.sort_by_key(|&i| tasks[i].id.suffix());
        }

        let order = topological_sort(project, &successors, &predecessors)?;

        Ok(Self {
            order,
            successors,
            predecessors,
        })
    }

    pub fn topological_order(&self) -> &[usize] {
        &self.order
    }

    pub fn reverse_topological_order(&self) -> impl Iterator<Item = usize> + '_ {
        self.order.iter().rev().copied()
    }

    pub fn successors(&self, idx: usize) -> &[usize] {
        &self.successors[idx]
    }

    pub fn predecessors(&self, idx: usize) -> &[usize] {
        &self.predecessors[idx]
    }

    /// Every index reachable by following dependencies backwards.
    pub fn reachable_ancestors(&self, idx: usize) -> HashSet<usize> {
        reachable(idx, &self.predecessors)
    }

    /// Every index reachable by following dependents forwards.
    pub fn reachable_descendants(&self, idx: usize) -> HashSet<usize> {
        reachable(idx, &self.successors)
    }
}

fn reachable(from: usize, adjacency: &[Vec<usize>]) -> HashSet<usize> {
    let mut seen = HashSet::new();
    let mut queue: VecDeque<usize> = adjacency[from].iter().copied().collect();
    while let Some(next) = queue.pop_front() {
        if seen.insert(next) {
            queue.extend(adjacency[next].iter().copied());
        }
    }
    seen
}

/// Kahn's algorithm with a min-heap on id suffix for deterministic ties.
fn topological_sort(
    project: &Project,
    successors: &[Vec<usize>],
    predecessors: &[Vec<usize>],
) -> Result<Vec<usize>> {
    let tasks = project.tasks();
    let mut in_degree: Vec<usize> = predecessors.iter().map(Vec::len).collect();

    let mut heap: BinaryHeap<Reverse<(u32, usize)>> = in_degree
        .iter()
        .enumerate()
        .filter(|(_, &deg)| deg == 0)
        .map(|(i, _)| Reverse((tasks[i].id.suffix(), i)))
        .collect();

    let mut order = Vec::with_capacity(tasks.len());
    while let Some(Reverse((_, idx))) = heap.pop() {
        order.push(idx);
        for &succ in &successors[idx] {
            in_degree[succ] -= 1;
            if in_degree[succ] == 0 {
                heap.push(Reverse((tasks[succ].id.suffix(), succ)));
            }
        }
    }

    if order.len() != tasks.len() {
        return Err(Error::CycleDetected(extract_cycle(
            project,
            predecessors,
            &in_degree,
        )));
    }
    Ok(order)
}

/// Recover one concrete cycle among the nodes Kahn's algorithm could not
/// order: walk predecessors inside the remainder until a node repeats.
fn extract_cycle(
    project: &Project,
    predecessors: &[Vec<usize>],
    in_degree: &[usize],
) -> Vec<TaskId> {
    let tasks = project.tasks();
    let remaining: HashSet<usize> = in_degree
        .iter()
        .enumerate()
        .filter(|&(i, _)| {
            // Nodes already emitted had their degree driven to zero and
            // were popped; survivors still have unresolved predecessors.
            in_degree[i] > 0
        })
        .map(|(i, _)| i)
        .collect();

    let Some(&start) = remaining.iter().min() else {
        return Vec::new();
    };

    let mut path = vec![start];
    let mut seen_at = vec![usize::MAX; tasks.len()];
    seen_at[start] = 0;
    let mut current = start;
    loop {
        let next = predecessors[current]
            .iter()
            .copied()
            .find(|p| remaining.contains(p))
            .expect("node in a cycle has a predecessor in the cycle");
        if seen_at[next] != usize::MAX {
            let mut cycle: Vec<TaskId> = path[seen_at[next]..]
                .iter()
                .map(|&i| tasks[i].id)
                .collect();
            cycle.reverse();
            cycle.insert(0, tasks[next].id);
            return cycle;
        }
        seen_at[next] = path.len();
        path.push(next);
        current = next;
    }
}
