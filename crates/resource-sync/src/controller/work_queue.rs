//! 按键去重的工作队列
//!
//! - 同一个键不会同时交给两个工作协程
//! - 处理期间再次加入的键，在 `done` 之后重新入队（只入队一次）
//! - 排队中重复加入的键被合并

use std::collections::{HashSet, VecDeque};

use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::resource::ResourceKey;

#[derive(Default)]
struct QueueState {
    queue: VecDeque<ResourceKey>,
    /// 等待处理的键（含处理中被再次加入的键）
    dirty: HashSet<ResourceKey>,
    processing: HashSet<ResourceKey>,
    shutting_down: bool,
}

#[derive(Default)]
pub struct WorkQueue {
    state: Mutex<QueueState>,
    notify: Notify,
}

impl WorkQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// 加入一个键；关闭后忽略
    pub fn add(&self, key: ResourceKey) {
        let mut state = self.state.lock();
        if state.shutting_down || state.dirty.contains(&key) {
            return;
        }
        state.dirty.insert(key.clone());
        if state.processing.contains(&key) {
            return;
        }
        state.queue.push_back(key);
        drop(state);
        self.notify.notify_one();
    }

    /// 取出下一个键；队列关闭时返回 None
    ///
    /// 取出的键必须调用 [`WorkQueue::done`] 归还。
    pub async fn get(&self) -> Option<ResourceKey> {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.state.lock();
                if let Some(key) = state.queue.pop_front() {
                    state.dirty.remove(&key);
                    state.processing.insert(key.clone());
                    let more = !state.queue.is_empty();
                    drop(state);
                    if more {
                        self.notify.notify_one();
                    }
                    return Some(key);
                }
                if state.shutting_down {
                    return None;
                }
            }

            notified.await;
        }
    }

    /// 处理结束
    pub fn done(&self, key: &ResourceKey) {
        let mut state = self.state.lock();
        state.processing.remove(key);
        if state.dirty.contains(key) && !state.shutting_down {
            state.queue.push_back(key.clone());
            drop(state);
            self.notify.notify_one();
        }
    }

    /// 关闭队列并唤醒所有等待者；已排队的键仍可取出
    pub fn shutdown(&self) {
        self.state.lock().shutting_down = true;
        self.notify.notify_waiters();
    }

    pub fn is_shutting_down(&self) -> bool {
        self.state.lock().shutting_down
    }

    /// 排队中的键数量（不含处理中）
    pub fn len(&self) -> usize {
        self.state.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    fn key(name: &str) -> ResourceKey {
        ResourceKey::new(name)
    }

    #[tokio::test]
    async fn test_fifo_and_dedup() {
        let queue = WorkQueue::new();
        queue.add(key("a"));
        queue.add(key("b"));
        queue.add(key("a"));
        assert_eq!(queue.len(), 2);

        assert_eq!(queue.get().await, Some(key("a")));
        assert_eq!(queue.get().await, Some(key("b")));
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_readd_during_processing_is_deferred() {
        let queue = WorkQueue::new();
        queue.add(key("a"));
        let taken = queue.get().await.unwrap();

        queue.add(key("a"));
        queue.add(key("a"));
        // 处理中，不会交给第二个工作协程
        assert!(queue.is_empty());

        queue.done(&taken);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.get().await, Some(key("a")));
        queue.done(&key("a"));
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_get_waits_for_add() {
        let queue = Arc::new(WorkQueue::new());
        let waiter = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.get().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.add(key("late"));

        let got = tokio::time::timeout(Duration::from_secs(5), waiter)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(got, Some(key("late")));
    }

    #[tokio::test]
    async fn test_shutdown_wakes_all_waiters() {
        let queue = Arc::new(WorkQueue::new());
        let waiters: Vec<_> = (0..3)
            .map(|_| {
                let queue = queue.clone();
                tokio::spawn(async move { queue.get().await })
            })
            .collect();

        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.shutdown();

        for waiter in waiters {
            let got = tokio::time::timeout(Duration::from_secs(5), waiter)
                .await
                .unwrap()
                .unwrap();
            assert_eq!(got, None);
        }

        queue.add(key("ignored"));
        assert!(queue.is_empty());
        assert!(queue.is_shutting_down());
    }

    #[tokio::test]
    async fn test_many_waiters_each_get_one_key() {
        let queue = Arc::new(WorkQueue::new());
        let waiters: Vec<_> = (0..4)
            .map(|_| {
                let queue = queue.clone();
                tokio::spawn(async move { queue.get().await })
            })
            .collect();

        tokio::time::sleep(Duration::from_millis(20)).await;
        for name in ["a", "b", "c", "d"] {
            queue.add(key(name));
        }

        let mut got = Vec::new();
        for waiter in waiters {
            let key = tokio::time::timeout(Duration::from_secs(5), waiter)
                .await
                .unwrap()
                .unwrap()
                .unwrap();
            got.push(key.name);
        }
        got.sort();
        assert_eq!(got, vec!["a", "b", "c", "d"]);
    }
}
