//! The window's single event source.
//!
//! Terminal input and the tick/render timers are read by a background task.
//! [`Events`] merges them with work posted to the UI thread, tray
//! activations and root cancellation, so the app loop handles exactly one
//! [`Event`] at a time and never needs a `select!` of its own.

use std::time::Duration;

use crossterm::event::{Event as CrosstermEvent, EventStream, KeyEvent, KeyEventKind};
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use trayscale_core::TrayEvent;
use trayscale_core::state::{UiQueue, UiTask};

/// Terminal input and timers.
#[derive(Debug)]
pub enum Input {
    Key(KeyEvent),
    /// The terminal changed size; redraw.
    Resize,
    /// Housekeeping tick (toast expiry).
    Tick,
    Render,
}

pub enum Event<C> {
    Input(Input),
    /// Work posted to the UI thread: snapshots, command results, questions.
    Task(UiTask<C>),
    Tray(TrayEvent),
    /// The root token was cancelled.
    Shutdown,
}

pub struct Events<C> {
    queue: UiQueue<C>,
    tray: mpsc::UnboundedReceiver<TrayEvent>,
    input: Option<mpsc::UnboundedReceiver<Input>>,
    root: CancellationToken,
    reader: CancellationToken,
}

impl<C> Events<C> {
    /// Events from the UI queue and the tray only. See
    /// [`with_terminal`](Self::with_terminal).
    pub fn new(
        queue: UiQueue<C>,
        tray: mpsc::UnboundedReceiver<TrayEvent>,
        root: CancellationToken,
    ) -> Self {
        let reader = root.child_token();
        Self {
            queue,
            tray,
            input: None,
            root,
            reader,
        }
    }

    /// Start reading the terminal, with `Tick` and `Render` at fixed rates.
    pub fn with_terminal(mut self, tick_rate: Duration, render_rate: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(read_terminal(tx, tick_rate, render_rate, self.reader.clone()));
        self.input = Some(rx);
        self
    }

    /// The next event, or `None` once the UI queue has closed.
    pub async fn next(&mut self) -> Option<Event<C>> {
        tokio::select! {
            () = self.root.cancelled() => Some(Event::Shutdown),
            task = self.queue.next() => task.map(Event::Task),
            Some(event) = self.tray.recv() => Some(Event::Tray(event)),
            Some(input) = next_input(&mut self.input) => Some(Event::Input(input)),
        }
    }

    /// Run every task already posted, so a burst of snapshots costs one
    /// redraw.
    pub fn drain(&mut self, ctx: &mut C) -> usize {
        self.queue.drain(ctx)
    }
}

impl<C> Drop for Events<C> {
    fn drop(&mut self) {
        self.reader.cancel();
    }
}

async fn next_input(input: &mut Option<mpsc::UnboundedReceiver<Input>>) -> Option<Input> {
    match input {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn read_terminal(
    tx: mpsc::UnboundedSender<Input>,
    tick_rate: Duration,
    render_rate: Duration,
    cancel: CancellationToken,
) {
    let mut stream = EventStream::new();
    let mut tick = tokio::time::interval(tick_rate);
    let mut render = tokio::time::interval(render_rate);
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
    render.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        let input = tokio::select! {
            () = cancel.cancelled() => break,
            _ = tick.tick() => Input::Tick,
            _ = render.tick() => Input::Render,
            Some(Ok(event)) = stream.next() => match event {
                CrosstermEvent::Key(key) if key.kind == KeyEventKind::Press => Input::Key(key),
                CrosstermEvent::Resize(..) => Input::Resize,
                _ => continue,
            },
        };
        if tx.send(input).is_err() {
            break;
        }
    }
    debug!("terminal reader stopped");
}
