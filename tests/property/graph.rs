use std::collections::{BTreeSet, HashSet};

use assetpipe::config::ConfigFile;
use assetpipe::engine::TaskOutcome;
use assetpipe::graph::{Scheduler, TaskGraph};
use assetpipe::types::ChainMode;
use assetpipe_test_utils::builders::{ConfigFileBuilder, TaskConfigBuilder};
use proptest::prelude::*;

/// Valid task graphs: task N may only depend on tasks 0..N, so the graph is
/// acyclic by construction.
fn dag_config_strategy(max_tasks: usize) -> impl Strategy<Value = ConfigFile> {
    (1..=max_tasks).prop_flat_map(|num_tasks| {
        let deps_strat = proptest::collection::vec(
            proptest::collection::vec(any::<usize>(), 0..num_tasks),
            num_tasks,
        );

        deps_strat.prop_map(move |raw_deps| {
            let mut builder = ConfigFileBuilder::new();
            for (i, potential_deps) in raw_deps.into_iter().enumerate() {
                let mut task = TaskConfigBuilder::new();
                let mut seen = HashSet::new();
                for dep_idx in potential_deps {
                    if i > 0 && seen.insert(dep_idx % i) {
                        task = task.after(&format!("task_{:02}", dep_idx % i));
                    }
                }
                builder = builder.with_task(&format!("task_{:02}", i), task.build());
            }
            builder.build()
        })
    })
}

/// Transitive prerequisites of `target`, including itself.
fn closure(graph: &TaskGraph, target: &str) -> BTreeSet<String> {
    let mut out = BTreeSet::new();
    let mut stack = vec![target.to_string()];
    while let Some(name) = stack.pop() {
        if out.insert(name.clone()) {
            stack.extend(graph.dependencies_of(&name).iter().cloned());
        }
    }
    out
}

proptest! {
    #[test]
    fn plan_runs_each_prerequisite_once_before_its_dependents(
        cfg in dag_config_strategy(12),
        target_idx in 0..12usize,
    ) {
        let graph = TaskGraph::from_config(&cfg);
        let names: Vec<String> = graph.tasks().map(str::to_string).collect();
        let target = &names[target_idx % names.len()];

        let plan = graph.plan(&[target.as_str()]).expect("acyclic graphs always plan");

        let unique: BTreeSet<String> = plan.iter().cloned().collect();
        prop_assert_eq!(unique.len(), plan.len(), "duplicate task in plan {:?}", plan);
        prop_assert_eq!(unique, closure(&graph, target));
        prop_assert_eq!(plan.last(), Some(target));

        for (pos, task) in plan.iter().enumerate() {
            for dep in graph.dependencies_of(task) {
                let dep_pos = plan.iter().position(|t| t == dep);
                prop_assert!(dep_pos.is_some_and(|p| p < pos), "{} before {}", dep, task);
            }
        }
    }

    #[test]
    fn scheduler_terminates_and_dispatches_each_task_at_most_once(
        cfg in dag_config_strategy(10),
        target_idx in 0..10usize,
        failing in proptest::collection::vec(0..10usize, 0..3),
        parallel in any::<bool>(),
    ) {
        let graph = TaskGraph::from_config(&cfg);
        let names: Vec<String> = graph.tasks().map(str::to_string).collect();
        let target = names[target_idx % names.len()].clone();
        let failing: HashSet<String> = failing
            .into_iter()
            .map(|i| names[i % names.len()].clone())
            .collect();

        let mut scheduler = Scheduler::new(graph, parallel, ChainMode::Sync);
        let mut ready = scheduler.handle_request(&target);
        let mut dispatched = Vec::new();
        let mut summary = None;

        let mut guard = 0;
        while let Some(task) = ready.pop() {
            guard += 1;
            prop_assert!(guard <= 100, "scheduler did not terminate");
            dispatched.push(task.name.clone());

            let outcome = if failing.contains(&task.name) {
                TaskOutcome::Failed(1)
            } else {
                TaskOutcome::Success
            };
            let step = scheduler.step_completion(&task.name, outcome);
            ready.extend(step.newly_scheduled);
            if step.finished.is_some() {
                summary = step.finished;
            }
        }

        let summary = summary.expect("run finishes once nothing is ready");
        let unique: HashSet<&String> = dispatched.iter().collect();
        prop_assert_eq!(unique.len(), dispatched.len());
        prop_assert!(scheduler.is_idle());

        let accounted = summary.succeeded.len() + summary.failed.len() + summary.blocked.len();
        prop_assert_eq!(accounted, closure(scheduler.graph(), &target).len());
        prop_assert_eq!(summary.succeeded.len() + summary.failed.len(), dispatched.len());
        for task in summary.failed.iter() {
            prop_assert!(failing.contains(task));
        }
        prop_assert_eq!(summary.is_success(), summary.failed.is_empty() && summary.blocked.is_empty());
    }
}
