//! 变更流：单生产者、可取消、零容量交接的事件通道
//!
//! - 生产者 [`ChangeSender::send`] 在消费者取走数据之前不会返回（唯一的背压机制）
//! - [`ChangeSender::close`] 可在多个任务中并发调用，只有第一次生效：通道只关闭一次，只保留一个错误
//! - 终止错误在通道关闭之后才对读取方可见；关闭前调用 [`ChangeStream::err`] 可能返回 None

use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::task::{Context, Poll};

use futures::Stream;
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};

use crate::error::{Result, SyncError};

/// 一次交接：值 + 消费者取走后的确认
struct Handoff<T> {
    value: T,
    taken: oneshot::Sender<()>,
}

impl<T> Handoff<T> {
    fn accept(self) -> T {
        let _ = self.taken.send(());
        self.value
    }
}

/// 流的一次性终止状态
#[derive(Default)]
struct Terminal {
    finished: AtomicBool,
    error: OnceLock<SyncError>,
}

struct SenderInner<T> {
    tx: Mutex<Option<mpsc::Sender<Handoff<T>>>>,
    terminal: Arc<Terminal>,
}

/// 生产者一端
///
/// 只允许一个任务调用 `send`；克隆仅用于在其他路径（取消、异常恢复）上调用 `close`。
pub struct ChangeSender<T> {
    inner: Arc<SenderInner<T>>,
}

impl<T> Clone for ChangeSender<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

/// 消费者一端
pub struct ChangeStream<T> {
    rx: mpsc::Receiver<Handoff<T>>,
    terminal: Arc<Terminal>,
}

/// 创建一条新的变更流
pub fn change_stream<T>() -> (ChangeSender<T>, ChangeStream<T>) {
    // 容量 1 + 取走确认 = 零容量交接
    let (tx, rx) = mpsc::channel(1);
    let terminal = Arc::new(Terminal::default());
    let sender = ChangeSender {
        inner: Arc::new(SenderInner {
            tx: Mutex::new(Some(tx)),
            terminal: terminal.clone(),
        }),
    };
    (sender, ChangeStream { rx, terminal })
}

impl<T> ChangeSender<T> {
    /// 发送一个值，直到消费者取走才返回
    ///
    /// 流已关闭或消费者已丢弃时返回 [`SyncError::StreamClosed`]。
    pub async fn send(&self, value: T) -> Result<()> {
        let tx = self
            .inner
            .tx
            .lock()
            .clone()
            .ok_or(SyncError::StreamClosed)?;
        let (taken, taken_rx) = oneshot::channel();
        tx.send(Handoff { value, taken })
            .await
            .map_err(|_| SyncError::StreamClosed)?;
        drop(tx);
        taken_rx.await.map_err(|_| SyncError::StreamClosed)
    }

    /// 关闭流并记录终止错误（None 表示正常结束）
    ///
    /// 返回本次调用是否真正关闭了流。
    pub fn close(&self, error: Option<SyncError>) -> bool {
        let terminal = &self.inner.terminal;
        if terminal
            .finished
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        if let Some(error) = error {
            let _ = terminal.error.set(error);
        }
        // 错误先写入，再丢弃发送端：读取方观察到关闭时错误已可见
        self.inner.tx.lock().take();
        true
    }

    pub fn is_closed(&self) -> bool {
        self.inner.terminal.finished.load(Ordering::Acquire)
    }
}

impl<T> ChangeStream<T> {
    /// 一条已经关闭、携带错误的流（订阅建立失败时返回）
    pub fn failed(error: SyncError) -> Self {
        let (sender, stream) = change_stream();
        sender.close(Some(error));
        stream
    }

    /// 读取下一个值；None 表示流已关闭
    pub async fn recv(&mut self) -> Option<T> {
        self.rx.recv().await.map(Handoff::accept)
    }

    /// 读取直到关闭，返回全部值与终止错误
    pub async fn all(mut self) -> (Vec<T>, Option<SyncError>) {
        let mut values = Vec::new();
        while let Some(value) = self.recv().await {
            values.push(value);
        }
        let error = self.err();
        (values, error)
    }

    /// 终止错误；仅在观察到流关闭之后有意义
    pub fn err(&self) -> Option<SyncError> {
        self.terminal.error.get().cloned()
    }

    pub fn is_finished(&self) -> bool {
        self.terminal.finished.load(Ordering::Acquire)
    }
}

impl<T> Stream for ChangeStream<T> {
    type Item = T;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        self.rx.poll_recv(cx).map(|handoff| handoff.map(Handoff::accept))
    }
}
