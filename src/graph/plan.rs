// src/graph/plan.rs

//! Prerequisite resolution.
//!
//! Depth-first over prerequisites in declared order, with memoization: a
//! task reached through several paths appears once, at the position of its
//! first completion. A task reached again while still on the traversal stack
//! closes a cycle.

use std::collections::{HashMap, HashSet, VecDeque};

use petgraph::algo::tarjan_scc;
use petgraph::graphmap::DiGraphMap;

use crate::engine::TaskName;
use crate::errors::{PipelineError, Result};
use crate::graph::task_graph::TaskGraph;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

/// Resolve `targets` into an execution order.
pub fn resolve_plan<S: AsRef<str>>(graph: &TaskGraph, targets: &[S]) -> Result<Vec<TaskName>> {
    let mut marks: HashMap<String, Mark> = HashMap::new();
    let mut order = Vec::new();
    let mut path = Vec::new();

    for target in targets {
        visit(graph, target.as_ref(), &mut marks, &mut path, &mut order)?;
    }

    Ok(order)
}

fn visit(
    graph: &TaskGraph,
    name: &str,
    marks: &mut HashMap<String, Mark>,
    path: &mut Vec<String>,
    order: &mut Vec<TaskName>,
) -> Result<()> {
    match marks.get(name) {
        Some(Mark::Done) => return Ok(()),
        Some(Mark::Visiting) => {
            let start = path.iter().position(|p| p == name).unwrap_or(0);
            let mut cycle: Vec<&str> = path[start..].iter().map(String::as_str).collect();
            cycle.push(name);
            return Err(PipelineError::GraphCycle(cycle.join(" -> ")));
        }
        None => {}
    }

    if !graph.contains(name) {
        return Err(PipelineError::TaskNotFound(name.to_string()));
    }

    marks.insert(name.to_string(), Mark::Visiting);
    path.push(name.to_string());

    for dep in graph.dependencies_of(name) {
        visit(graph, dep, marks, path, order)?;
    }

    path.pop();
    marks.insert(name.to_string(), Mark::Done);
    order.push(name.to_string());
    Ok(())
}

/// Reject `start` chains that lead back to their origin.
///
/// Starting a task runs its prerequisites too, so `a` reaches every task in
/// the plan of each task it starts. A chain that reaches `a` again would
/// re-trigger it forever once chained runs are detached.
pub fn check_chains(graph: &TaskGraph) -> Result<()> {
    let mut reach: DiGraphMap<&str, ()> = DiGraphMap::new();
    for name in graph.tasks() {
        reach.add_node(name);
        let started = graph.starts_of(name);
        if started.is_empty() {
            continue;
        }
        for reached in resolve_plan(graph, started)? {
            if let Some(target) = graph.tasks().find(|t| *t == reached) {
                reach.add_edge(name, target, ());
            }
        }
    }

    for component in tarjan_scc(&reach) {
        let Some(&first) = component.iter().min() else { continue };
        if component.len() == 1 && !reach.contains_edge(first, first) {
            continue;
        }
        let members: HashSet<&str> = component.iter().copied().collect();
        let cycle = cycle_through(&reach, first, &members);
        return Err(PipelineError::GraphCycle(format!(
            "{} (through `start`)",
            cycle.join(" -> ")
        )));
    }
    Ok(())
}

/// Shortest path `from -> ... -> from` inside one strongly connected
/// component.
fn cycle_through<'a>(
    graph: &DiGraphMap<&'a str, ()>,
    from: &'a str,
    members: &HashSet<&'a str>,
) -> Vec<&'a str> {
    let mut parent: HashMap<&str, &str> = HashMap::new();
    let mut queue = VecDeque::from([from]);

    while let Some(node) = queue.pop_front() {
        for next in graph.neighbors(node) {
            if !members.contains(next) {
                continue;
            }
            if next == from {
                let mut path = vec![from];
                let mut cur = node;
                while cur != from {
                    path.push(cur);
                    cur = parent.get(cur).copied().unwrap_or(from);
                }
                path.push(from);
                let len = path.len();
                path[1..len - 1].reverse();
                return path;
            }
            if !parent.contains_key(next) {
                parent.insert(next, node);
                queue.push_back(next);
            }
        }
    }
    vec![from, from]
}
