// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use tokio::time::Instant;
    use tokio_util::sync::CancellationToken;

    use chunkprov_lib::{
        barrier::*,
        store::memory::MemoryStore,
        task::{prepare::prepare_task, TaskStatus},
        test_env::*,
    };

    /// Put one task per device of `two_node_spec()` into the store, all still running.
    fn running_tasks(store: &MemoryStore) -> Vec<String> {
        let spec = two_node_spec();
        let mut names = Vec::new();
        for node in spec.node_names() {
            for device in spec.devices_for(node) {
                let def = prepare_task(&spec, node, device);
                store.put_task(
                    &def,
                    TaskStatus {
                        active: 1,
                        ..Default::default()
                    },
                );
                names.push(def.name);
            }
        }
        names
    }

    fn config() -> BarrierConfig {
        BarrierConfig {
            interval: Duration::from_secs(20),
            deadline: Duration::from_secs(600),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn releases_when_all_tasks_succeed() {
        let store = Arc::new(MemoryStore::new());
        let names = running_tasks(&store);

        let start = Instant::now();
        let rx = spawn_watcher(
            store.clone(),
            TEST_NAMESPACE,
            names,
            config(),
            CancellationToken::new(),
        );

        tokio::time::sleep(Duration::from_secs(70)).await;
        store.complete_all();

        assert!(released(rx).await);
        // The next tick after completing is at 80s.
        assert!(start.elapsed() >= Duration::from_secs(80));
        assert!(start.elapsed() < Duration::from_secs(100));
    }

    #[tokio::test(start_paused = true)]
    async fn partial_completion_does_not_release() {
        let store = Arc::new(MemoryStore::new());
        let names = running_tasks(&store);
        store.set_task_status(
            TEST_NAMESPACE,
            &names[0],
            TaskStatus {
                succeeded: 1,
                ..Default::default()
            },
        );

        let rx = spawn_watcher(
            store.clone(),
            TEST_NAMESPACE,
            names,
            config(),
            CancellationToken::new(),
        );

        let start = Instant::now();
        assert!(!released(rx).await);
        assert!(start.elapsed() >= Duration::from_secs(600));
    }

    #[tokio::test(start_paused = true)]
    async fn first_check_is_immediate() {
        let store = Arc::new(MemoryStore::new());
        let names = running_tasks(&store);
        store.complete_all();

        let start = Instant::now();
        let rx = spawn_watcher(
            store.clone(),
            TEST_NAMESPACE,
            names,
            config(),
            CancellationToken::new(),
        );

        assert!(released(rx).await);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_aggregate_releases() {
        let store = Arc::new(MemoryStore::new());

        let rx = spawn_watcher(
            store,
            TEST_NAMESPACE,
            Vec::new(),
            config(),
            CancellationToken::new(),
        );

        assert!(released(rx).await);
    }

    #[tokio::test(start_paused = true)]
    async fn status_fetch_failure_fails() {
        let store = Arc::new(MemoryStore::new());
        let names = running_tasks(&store);
        store.fail_get(&names[3]);

        let rx = spawn_watcher(
            store.clone(),
            TEST_NAMESPACE,
            names,
            config(),
            CancellationToken::new(),
        );

        assert!(!released(rx).await);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_fails() {
        let store = Arc::new(MemoryStore::new());
        let names = running_tasks(&store);

        let start = Instant::now();
        let rx = spawn_watcher(
            store.clone(),
            TEST_NAMESPACE,
            names,
            BarrierConfig::default(),
            CancellationToken::new(),
        );

        assert!(!released(rx).await);
        assert!(start.elapsed() >= Duration::from_secs(24 * 60 * 60));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_fails() {
        let store = Arc::new(MemoryStore::new());
        let names = running_tasks(&store);
        let cancel = CancellationToken::new();

        let rx = spawn_watcher(
            store.clone(),
            TEST_NAMESPACE,
            names,
            config(),
            cancel.clone(),
        );

        tokio::time::sleep(Duration::from_secs(30)).await;
        cancel.cancel();

        let start = Instant::now();
        assert!(!released(rx).await);
        assert!(start.elapsed() < Duration::from_secs(20));
    }

    #[tokio::test(start_paused = true)]
    async fn releases_after_the_last_task_finishes() {
        let store = Arc::new(MemoryStore::new());
        let names = running_tasks(&store);

        let rx = spawn_watcher(
            store.clone(),
            TEST_NAMESPACE,
            names.clone(),
            config(),
            CancellationToken::new(),
        );

        for name in &names {
            tokio::time::sleep(Duration::from_secs(25)).await;
            store.set_task_status(
                TEST_NAMESPACE,
                name,
                TaskStatus {
                    succeeded: 1,
                    ..Default::default()
                },
            );
        }

        assert!(released(rx).await);
    }

    #[tokio::test(start_paused = true)]
    async fn hung_status_lookup_still_hits_deadline() {
        let store = Arc::new(MemoryStore::new());
        let names = running_tasks(&store);
        store.stall_get(&names[1]);

        let start = Instant::now();
        let rx = spawn_watcher(
            store.clone(),
            TEST_NAMESPACE,
            names,
            config(),
            CancellationToken::new(),
        );

        let verdict = tokio::time::timeout(Duration::from_secs(100_000), released(rx)).await;
        assert_eq!(verdict, Ok(false));
        assert!(start.elapsed() >= Duration::from_secs(600));
        assert!(start.elapsed() < Duration::from_secs(620));
    }

    #[tokio::test(start_paused = true)]
    async fn hung_status_lookup_can_be_cancelled() {
        let store = Arc::new(MemoryStore::new());
        let names = running_tasks(&store);
        store.stall_get(&names[0]);
        let cancel = CancellationToken::new();

        let rx = spawn_watcher(
            store.clone(),
            TEST_NAMESPACE,
            names,
            BarrierConfig::default(),
            cancel.clone(),
        );

        tokio::time::sleep(Duration::from_secs(30)).await;
        cancel.cancel();

        let start = Instant::now();
        let verdict = tokio::time::timeout(Duration::from_secs(100_000), released(rx)).await;
        assert_eq!(verdict, Ok(false));
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
