// tests/property_state.rs

mod common;
use crate::common::fixture;

use std::collections::HashSet;

use proptest::prelude::*;

// Each step either creates a task or adds a wait edge between two existing
// tasks (picked by index modulo the current count).
#[derive(Debug, Clone)]
enum Step {
    NewTask,
    Wait(usize, usize),
}

fn steps() -> impl Strategy<Value = Vec<Step>> {
    proptest::collection::vec(
        prop_oneof![
            1 => Just(Step::NewTask),
            2 => (any::<usize>(), any::<usize>()).prop_map(|(a, b)| Step::Wait(a, b)),
        ],
        1..40,
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn wait_edges_stay_symmetric_and_ids_increase(steps in steps()) {
        let f = fixture();
        let st = &f.state;
        st.lock();

        let chg = st.new_change("install", "Property");
        let mut tasks = Vec::new();
        let mut last_id = chg.id().parse::<u64>().unwrap();

        for step in steps {
            match step {
                Step::NewTask => {
                    let t = st.new_task("t", "task");
                    let id = t.id().parse::<u64>().unwrap();
                    prop_assert!(id > last_id);
                    last_id = id;
                    chg.add_task(&t);
                    tasks.push(t);
                }
                Step::Wait(a, b) if !tasks.is_empty() => {
                    let waiter = &tasks[a % tasks.len()];
                    let target = &tasks[b % tasks.len()];
                    waiter.wait_for(target);
                }
                Step::Wait(..) => {}
            }

            for t in &tasks {
                for w in t.wait_tasks() {
                    prop_assert!(w.halt_tasks().contains(t));
                }
                for h in t.halt_tasks() {
                    prop_assert!(h.wait_tasks().contains(t));
                }
            }
        }

        let ids: HashSet<String> = st.tasks().iter().map(|t| t.id().to_string()).collect();
        prop_assert_eq!(ids.len(), tasks.len());
        st.unlock();

        let r = f.reload();
        r.state.lock();
        for t in r.state.tasks() {
            for w in t.wait_tasks() {
                prop_assert!(w.halt_tasks().contains(&t));
            }
        }
        let next = r.state.new_task("t", "after reload");
        prop_assert!(next.id().parse::<u64>().unwrap() > last_id);
        r.state.unlock();
    }
}
