// ── UI-thread scheduling ──
//
// Background tasks never touch state cells directly. They post closures to
// the thread that owns the cells, which runs them in posting order.

use std::fmt;

use tokio::sync::mpsc;

/// A unit of work to run on the UI thread against its context `C`.
pub type UiTask<C> = Box<dyn FnOnce(&mut C) + Send>;

/// Create a connected handle/queue pair.
pub fn ui_channel<C>() -> (UiHandle<C>, UiQueue<C>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (UiHandle { tx }, UiQueue { rx })
}

/// `Send` half: post work from any thread.
pub struct UiHandle<C> {
    tx: mpsc::UnboundedSender<UiTask<C>>,
}

impl<C> Clone for UiHandle<C> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<C> fmt::Debug for UiHandle<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UiHandle")
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}

impl<C> UiHandle<C> {
    /// Queue `task`. Returns `false` when the UI thread has gone away.
    pub fn post(&self, task: impl FnOnce(&mut C) + Send + 'static) -> bool {
        self.tx.send(Box::new(task)).is_ok()
    }
}

/// Receiving half, owned by the UI thread.
pub struct UiQueue<C> {
    rx: mpsc::UnboundedReceiver<UiTask<C>>,
}

impl<C> UiQueue<C> {
    /// Wait for the next posted task.
    pub async fn next(&mut self) -> Option<UiTask<C>> {
        self.rx.recv().await
    }

    /// Run everything already posted. Returns how many tasks ran.
    pub fn drain(&mut self, ctx: &mut C) -> usize {
        let mut ran = 0;
        while let Ok(task) = self.rx.try_recv() {
            task(ctx);
            ran += 1;
        }
        ran
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn drain_runs_in_posting_order() {
        let (handle, mut queue) = ui_channel::<Vec<u32>>();
        for i in 0..3 {
            assert!(handle.post(move |v| v.push(i)));
        }
        let mut ctx = Vec::new();
        assert_eq!(queue.drain(&mut ctx), 3);
        assert_eq!(ctx, vec![0, 1, 2]);
        assert_eq!(queue.drain(&mut ctx), 0);
    }

    #[test]
    fn post_fails_after_queue_dropped() {
        let (handle, queue) = ui_channel::<()>();
        drop(queue);
        assert!(!handle.post(|()| {}));
    }

    #[tokio::test]
    async fn posts_from_other_threads_arrive() {
        let (handle, mut queue) = ui_channel::<String>();
        std::thread::spawn(move || {
            handle.post(|s| s.push_str("hello"));
        })
        .join()
        .unwrap();

        let mut ctx = String::new();
        let task = queue.next().await.unwrap();
        task(&mut ctx);
        assert_eq!(ctx, "hello");
    }
}
