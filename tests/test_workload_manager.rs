mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use fleet_scheduler::api::world_dto::NodeDto;
use fleet_scheduler::domain::scheduler::allocation::{AllocationOutcome, BookkeepingMode};
use fleet_scheduler::domain::scheduler::config::SchedulerConfig;
use fleet_scheduler::domain::scheduler::node::Node;
use fleet_scheduler::domain::scheduler::policy::ExecutionPolicy;
use fleet_scheduler::domain::scheduler::task::{Batch, TaskArg, Workload};
use fleet_scheduler::domain::simulator::simulator::Simulator;
use fleet_scheduler::domain::simulator::simulator_mock::MockSimulator;
use fleet_scheduler::domain::utils::id::NodeName;
use fleet_scheduler::domain::world::topology::NodeCategory;

use common::{FailingSink, chain_world, job, manager, manager_with, work};

fn privileged(name: &str, capacity: f64) -> NodeDto {
    NodeDto { categories: vec!["Privileged".to_string()], ..NodeDto::new(name, capacity) }
}

#[test]
fn two_node_scenario_fills_the_first_node_first() {
    let world = chain_world(vec![NodeDto::new("A", 100.0), NodeDto::new("B", 50.0)], vec![job("work.js", 10.0)], vec![]);
    let mut manager = manager(&world);

    let mut workload = Workload::Task(work(&world, "work.js", 12));
    let result = manager.assign(&mut workload, false);

    assert_eq!(result.outcome, AllocationOutcome::Satisfied);
    assert_eq!(result.power_delivered, 12);
    let placements: Vec<(String, i64)> = result.placements.iter().map(|p| (p.node.to_string(), p.concurrency)).collect();
    assert_eq!(placements, vec![("A".to_string(), 10), ("B".to_string(), 2)]);
    assert_eq!(workload.as_task().unwrap().power_needed, 0);
}

#[test]
fn multi_core_overshoot_is_counted_in_full() {
    let world = chain_world(vec![NodeDto { cores: 4, ..NodeDto::new("quad", 10.0) }], vec![job("work.js", 10.0)], vec![]);
    let mut manager = manager(&world);

    let mut workload = Workload::Task(work(&world, "work.js", 3));
    let result = manager.assign(&mut workload, false);

    assert_eq!(result.power_delivered, 4);
    assert_eq!(result.placements[0].concurrency, 1);

    let task = workload.as_task().unwrap();
    assert_eq!(task.power_needed, -1);
    assert_eq!(task.overshoot(), 1);
}

#[test]
fn forbidden_category_receives_nothing() {
    let world = chain_world(vec![privileged("home", 1000.0)], vec![job("hack.js", 1.7)], vec![]);
    let mut manager = manager(&world);

    let task = work(&world, "hack.js", 5).with_policy(ExecutionPolicy::default().forbidding(NodeCategory::PRIVILEGED));
    let result = manager.assign(&mut Workload::Task(task), false);

    assert_eq!(result.power_delivered, 0);
    assert_eq!(result.outcome, AllocationOutcome::Exhausted);
    assert!(world.launches().is_empty());
}

#[test]
fn cached_capacity_stays_within_bounds() {
    let world = chain_world(vec![NodeDto::new("a", 64.0), NodeDto::new("b", 32.0), NodeDto::new("c", 8.0)], vec![job("w.js", 3.0)], vec![]);
    let mut manager = manager(&world);
    let total = manager.cached_total_capacity();

    for power in [5, 11, 2, 40, 7, 3] {
        manager.assign(&mut Workload::Task(work(&world, "w.js", power)), false);
        let available = manager.cached_available_capacity();
        assert!(available >= 0.0, "available capacity went negative: {}", available);
        assert!(available <= total);
    }
}

#[test]
fn identical_pools_produce_identical_placements() {
    let nodes = || vec![NodeDto::new("a", 20.0), NodeDto { cores: 2, ..NodeDto::new("b", 35.0) }, NodeDto::new("c", 50.0)];

    let placements: Vec<Vec<(String, i64)>> = (0..2)
        .map(|_| {
            let world = chain_world(nodes(), vec![job("w.js", 5.0)], vec![]);
            let mut manager = manager(&world);
            let result = manager.assign(&mut Workload::Task(work(&world, "w.js", 17)), false);
            result.placements.iter().map(|p| (p.node.to_string(), p.concurrency)).collect()
        })
        .collect();

    assert_eq!(placements[0], placements[1]);
    assert_eq!(placements[0], vec![("a".to_string(), 4), ("b".to_string(), 7)]);
}

#[test]
fn batch_delivers_the_sum_of_its_children() {
    let nodes = || vec![NodeDto::new("a", 500.0), NodeDto { cores: 3, ..NodeDto::new("b", 500.0) }];
    let jobs = || vec![job("weaken.js", 1.75), job("grow.js", 1.75), job("hack.js", 1.7)];
    let children = [("weaken.js", 4), ("grow.js", 30), ("hack.js", 9)];

    let world = chain_world(nodes(), jobs(), vec![]);
    let mut shared = manager(&world);
    let batch = Batch::new(children.iter().map(|(j, p)| Workload::Task(work(&world, j, *p))).collect());
    let batch_result = shared.assign(&mut Workload::Batch(batch), false);

    let independent: i64 = children
        .iter()
        .map(|(j, p)| {
            let world = chain_world(nodes(), jobs(), vec![]);
            let mut manager = manager(&world);
            manager.assign(&mut Workload::Task(work(&world, j, *p)), false).power_delivered
        })
        .sum();

    assert_eq!(batch_result.power_delivered, independent);
    assert_eq!(batch_result.power_delivered, 43);
    assert!(batch_result.is_satisfied());
}

#[test]
fn hopeless_task_returns_within_the_timeout() {
    let world = chain_world(vec![NodeDto::new("tiny", 4.0)], vec![job("big.js", 8.0)], vec![]);
    let mut manager = manager_with(&world, Arc::new(world.clone()), Arc::new(Simulator::real_time()), SchedulerConfig::default());

    let started = Instant::now();
    let result = manager.assign(&mut Workload::Task(work(&world, "big.js", 1_000_000)), false);

    assert!(started.elapsed() <= Duration::from_millis(2100));
    assert_eq!(result.power_delivered, 0);
    assert_ne!(result.outcome, AllocationOutcome::Satisfied);
}

#[test]
fn failed_launches_are_absorbed() {
    let world = chain_world(vec![NodeDto::new("a", 40.0), NodeDto::new("b", 40.0)], vec![job("w.js", 2.0)], vec![]);
    let sink = Arc::new(FailingSink::default());
    let mut manager = manager_with(&world, sink.clone(), Arc::new(MockSimulator::new(0)), SchedulerConfig::default());

    let result = manager.assign(&mut Workload::Task(work(&world, "w.js", 10)), false);

    assert_eq!(result.power_delivered, 0);
    assert_eq!(result.outcome, AllocationOutcome::Exhausted);
    assert_eq!(*sink.attempts.lock().unwrap(), vec![NodeName::new("a"), NodeName::new("b")]);
}

#[test]
fn vanished_node_is_skipped_and_dropped_on_refresh() {
    let world = chain_world(vec![NodeDto::new("gone", 100.0), NodeDto::new("stays", 100.0)], vec![job("w.js", 10.0)], vec![]);
    let mut manager = manager(&world);
    world.remove_node(&NodeName::new("gone")).unwrap();

    let result = manager.assign(&mut Workload::Task(work(&world, "w.js", 3)), false);
    assert!(result.is_satisfied());
    assert_eq!(result.placements.len(), 1);
    assert_eq!(result.placements[0].node, NodeName::new("stays"));
    assert!(manager.node(&NodeName::new("gone")).unwrap().stale);

    manager.update_network();
    assert!(manager.node(&NodeName::new("gone")).is_none());
    assert_eq!(manager.nodes().len(), 1);
}

#[test]
fn update_network_merges_new_nodes_and_filters_unusable_ones() {
    let world = chain_world(
        vec![privileged("home", 100.0), NodeDto::new("locked", 64.0), NodeDto::new("empty", 0.0), NodeDto::new("far", 16.0)],
        vec![],
        vec![],
    );
    world.set_admin_access(&NodeName::new("locked"), false).unwrap();

    let mut manager = manager(&world);
    let names: Vec<String> = manager.nodes().iter().map(|n| n.name.to_string()).collect();
    assert_eq!(names, vec!["home", "far"]);
    // The privileged node keeps a fifth of its memory.
    assert_eq!(manager.cached_total_capacity(), 96.0);

    world.add_node(NodeDto { neighbours: vec!["home".to_string()], ..NodeDto::new("bought", 32.0) }).unwrap();
    world.set_admin_access(&NodeName::new("locked"), true).unwrap();
    manager.update_network();

    let names: Vec<String> = manager.nodes().iter().map(|n| n.name.to_string()).collect();
    assert_eq!(names, vec!["home", "far", "locked", "bought"]);
    assert_eq!(manager.cached_total_capacity(), 192.0);
    assert_eq!(manager.cached_available_capacity(), 192.0);
}

#[test]
fn map_runs_once_on_every_allowed_node() {
    let world = chain_world(
        vec![NodeDto { cores: 2, ..NodeDto::new("a", 8.0) }, NodeDto::new("b", 8.0), NodeDto::new("c", 8.0)],
        vec![job("share.js", 4.0)],
        vec![],
    );
    let mut manager = manager(&world);

    let task = work(&world, "share.js", 1).with_policy(ExecutionPolicy::default().allowing_only(["a", "c"]));
    let result = manager.map(&task);

    assert_eq!(result.power_delivered, 3);
    assert_eq!(result.outcome, AllocationOutcome::Satisfied);

    let launches = world.launches();
    let nodes: Vec<String> = launches.iter().map(|l| l.node.to_string()).collect();
    assert_eq!(nodes, vec!["a", "c"]);
    assert!(launches.iter().all(|l| l.concurrency == 1 && l.tag == result.generation));
    assert_eq!(manager.cached_available_capacity(), 16.0);
}

#[test]
fn fill_exhausts_the_pool() {
    let world = chain_world(vec![NodeDto::new("a", 30.0), NodeDto::new("b", 20.0)], vec![job("w.js", 10.0)], vec![]);
    let mut manager = manager(&world);

    let result = manager.fill(&work(&world, "w.js", 2), false);

    assert_eq!(result.power_delivered, 5);
    assert_eq!(result.outcome, AllocationOutcome::Exhausted);
    assert_eq!(world.launches().len(), 4);
    assert_eq!(manager.available_capacity(), 0.0);
}

#[test]
fn fill_on_a_full_pool_does_nothing() {
    let world = chain_world(vec![NodeDto { used_capacity: 28.0, ..NodeDto::new("a", 30.0) }], vec![job("w.js", 10.0)], vec![]);
    let mut manager = manager(&world);

    let result = manager.fill(&work(&world, "w.js", 2), false);
    assert_eq!(result.power_delivered, 0);
    assert_eq!(result.outcome, AllocationOutcome::Exhausted);
    assert!(world.launches().is_empty());
}

#[test]
fn fill_mode_occupies_the_whole_node() {
    let world = chain_world(vec![NodeDto::new("a", 50.0), NodeDto::new("b", 50.0)], vec![job("w.js", 10.0)], vec![]);
    let mut manager = manager(&world);

    let result = manager.assign(&mut Workload::Task(work(&world, "w.js", 1)), true);

    assert_eq!(result.power_delivered, 5);
    assert_eq!(result.placements.len(), 1);
    assert_eq!(manager.cached_available_capacity(), 50.0);
}

#[test]
fn forwarded_concurrency_reaches_the_job() {
    let world = chain_world(vec![NodeDto::new("a", 30.0)], vec![job("w.js", 10.0)], vec![]);
    let mut manager = manager(&world);

    let mut task = work(&world, "w.js", 2).with_policy(ExecutionPolicy::default().forwarding_concurrency());
    task.args.push(TaskArg::from("n00dles"));
    manager.assign(&mut Workload::Task(task), false);

    assert_eq!(world.launches()[0].args, vec![TaskArg::from("n00dles"), TaskArg::Integer(2)]);
}

#[test]
fn strict_and_optimistic_bookkeeping_agree_on_placements() {
    let nodes = || vec![NodeDto::new("a", 25.0), NodeDto::new("b", 25.0), NodeDto::new("c", 25.0)];
    let run = |mode: BookkeepingMode| {
        let world = chain_world(nodes(), vec![job("w.js", 5.0)], vec![]);
        let config = SchedulerConfig { bookkeeping: mode, ..Default::default() };
        let mut manager = manager_with(&world, Arc::new(world.clone()), Arc::new(MockSimulator::new(0)), config);
        let result = manager.assign(&mut Workload::Task(work(&world, "w.js", 12)), false);
        (result.placements, manager.cached_available_capacity())
    };

    let (optimistic, optimistic_available) = run(BookkeepingMode::Optimistic);
    let (strict, strict_available) = run(BookkeepingMode::Strict);
    assert_eq!(optimistic, strict);
    assert_eq!(optimistic_available, 15.0);
    assert_eq!(strict_available, 15.0);
}

#[test]
fn added_nodes_join_the_end_of_the_pool() {
    let world = chain_world(vec![NodeDto::new("a", 10.0)], vec![job("w.js", 10.0)], vec![]);
    let mut manager = manager(&world);
    world.add_node(NodeDto::new("b", 10.0)).unwrap();

    assert!(manager.add_node(Node::new(NodeName::new("b"), 0.2)));
    assert!(!manager.add_node(Node::new(NodeName::new("a"), 0.2)));
    assert_eq!(manager.cached_total_capacity(), 20.0);

    let result = manager.assign(&mut Workload::Task(work(&world, "w.js", 2)), false);
    let nodes: Vec<String> = result.placements.iter().map(|p| p.node.to_string()).collect();
    assert_eq!(nodes, vec!["a", "b"]);
}
