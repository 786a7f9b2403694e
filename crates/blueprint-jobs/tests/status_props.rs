use blueprint_jobs::{Job, JobId, JobStore, JobUpdate};
use blueprint_utils::{JobStatus, ProjectId, StepKind};
use proptest::prelude::*;

fn arb_update() -> impl Strategy<Value = JobUpdate> {
    prop_oneof![
        Just(JobUpdate::Processing),
        any::<u8>().prop_map(|n| JobUpdate::Completed(serde_json::json!(n))),
        "[a-z]{1,8}".prop_map(JobUpdate::Failed),
    ]
}

fn rank(status: JobStatus) -> u8 {
    match status {
        JobStatus::Pending => 0,
        JobStatus::Processing => 1,
        JobStatus::Completed | JobStatus::Failed => 2,
    }
}

proptest! {
    #[test]
    fn observed_status_never_moves_backward(updates in prop::collection::vec(arb_update(), 1..12)) {
        let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let observed = rt.block_on(async {
            let store = JobStore::new();
            let id = JobId::generate();
            store
                .register(Job::pending(id.clone(), ProjectId::new("p").unwrap(), StepKind::Analyze))
                .await
                .unwrap();

            let mut observed = vec![JobStatus::Pending];
            for update in updates {
                let _ = store.transition(&id, update).await;
                observed.push(store.get(&id).await.unwrap().status);
            }
            observed
        });

        if let Some(done) = observed.iter().position(|s| *s == JobStatus::Completed) {
            prop_assert!(observed[..done].contains(&JobStatus::Processing));
        }
        for pair in observed.windows(2) {
            prop_assert!(rank(pair[0]) <= rank(pair[1]));
            if pair[0].is_terminal() {
                prop_assert_eq!(pair[0], pair[1]);
            }
        }
    }
}
