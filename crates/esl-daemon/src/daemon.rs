//! Listener, worker pool and supervisor.
//!
//! One listener moves frames from the [`Feed`] onto an unbounded queue.
//! `num_workers` workers take frames off the queue and hand them to the
//! [`NotificationHandler`]. The supervisor checks every task at a fixed
//! interval and stops the daemon as soon as any of them has exited.
//!
//! Shutdown cancels every task, waits for them, then processes whatever is
//! still queued one frame at a time, so no notification is lost. The
//! returned status is the sum of every task's tally plus the drain's.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::config::FeedConfig;
use crate::feed::Feed;
use crate::handler::NotificationHandler;

type Frame = Vec<u8>;
type Queue = Arc<Mutex<UnboundedReceiver<Frame>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DaemonOptions {
    pub num_workers: usize,
    pub worker_timeout: Duration,
    pub supervisor_interval: Duration,
    pub startup_delay: Duration,
}

impl From<&FeedConfig> for DaemonOptions {
    fn from(config: &FeedConfig) -> Self {
        Self {
            num_workers: config.num_workers,
            worker_timeout: config.worker_timeout(),
            supervisor_interval: config.supervisor_interval(),
            startup_delay: config.startup_delay(),
        }
    }
}

pub struct Daemon {
    handler: Arc<dyn NotificationHandler>,
    options: DaemonOptions,
    stop: CancellationToken,
}

impl Daemon {
    pub fn new(handler: Arc<dyn NotificationHandler>, options: DaemonOptions) -> Self {
        Self {
            handler,
            options,
            stop: CancellationToken::new(),
        }
    }

    /// Cancelling this token stops the daemon, e.g. from a signal handler.
    pub fn stop_token(&self) -> CancellationToken {
        self.stop.clone()
    }

    pub fn stop(&self) {
        tracing::info!("stop requested");
        self.stop.cancel();
    }

    /// Run until stopped or until a task exits; returns the final tally.
    pub async fn run(&self, feed: Box<dyn Feed>) -> u32 {
        tracing::info!(state = "starting", workers = self.options.num_workers, "daemon starting");

        let (sender, receiver) = mpsc::unbounded_channel();
        let queue: Queue = Arc::new(Mutex::new(receiver));

        let mut tasks: Vec<(String, JoinHandle<u32>)> = Vec::with_capacity(self.options.num_workers + 1);
        tasks.push((
            "listener".to_string(),
            tokio::spawn(listen(feed, sender, self.stop.clone())),
        ));
        for i in 0..self.options.num_workers {
            let name = format!("worker-{i}");
            let worker = work(
                name.clone(),
                queue.clone(),
                self.handler.clone(),
                self.options.worker_timeout,
                self.stop.clone(),
            );
            tasks.push((name, tokio::spawn(worker)));
        }
        tracing::info!(workers = self.options.num_workers, "started workers");

        tokio::select! {
            () = tokio::time::sleep(self.options.startup_delay) => {}
            () = self.stop.cancelled() => {}
        }
        tracing::info!(state = "running", "daemon running");
        self.supervise(&tasks).await;

        tracing::info!(state = "draining", "daemon draining");
        let mut status = 0;
        for (name, handle) in tasks {
            status += task_status(&name, handle.await);
        }
        status += drain(&queue, &*self.handler).await;

        tracing::info!(state = "stopped", status, "daemon stopped");
        status
    }

    async fn supervise(&self, tasks: &[(String, JoinHandle<u32>)]) {
        let mut ticker = tokio::time::interval(self.options.supervisor_interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                () = self.stop.cancelled() => return,
            }
            if let Some((name, _)) = tasks.iter().find(|(_, handle)| handle.is_finished()) {
                tracing::warn!(task = %name, "task not running, stopping");
                self.stop.cancel();
                return;
            }
        }
    }
}

async fn listen(mut feed: Box<dyn Feed>, queue: UnboundedSender<Frame>, stop: CancellationToken) -> u32 {
    loop {
        tokio::select! {
            biased;
            () = stop.cancelled() => {
                tracing::info!("listener cancelled, closing feed");
                feed.close().await;
                return 0;
            }
            frame = feed.next_frame() => match frame {
                Some(frame) => {
                    tracing::debug!(bytes = frame.len(), "queued notification");
                    if queue.send(frame).is_err() {
                        tracing::error!("notification queue closed");
                        return 1;
                    }
                }
                None => {
                    tracing::warn!("feed closed");
                    return 0;
                }
            }
        }
    }
}

async fn work(
    name: String,
    queue: Queue,
    handler: Arc<dyn NotificationHandler>,
    idle: Duration,
    stop: CancellationToken,
) -> u32 {
    let mut status = 0;
    loop {
        let next = tokio::select! {
            biased;
            () = stop.cancelled() => {
                tracing::info!(worker = %name, "worker cancelled, finishing");
                break;
            }
            next = tokio::time::timeout(idle, next_frame(&queue)) => next,
        };
        match next {
            Err(_) => tracing::debug!(worker = %name, "no notification, waiting again"),
            Ok(None) => {
                tracing::info!(worker = %name, "queue closed, finishing");
                break;
            }
            Ok(Some(frame)) => status += process(&*handler, &frame).await,
        }
    }
    status
}

async fn next_frame(queue: &Queue) -> Option<Frame> {
    queue.lock().await.recv().await
}

/// Failures for one frame; handler errors count as one.
async fn process(handler: &dyn NotificationHandler, frame: &[u8]) -> u32 {
    match handler.handle(frame).await {
        Ok(status) => status.unwrap_or(0),
        Err(e) => {
            tracing::error!(error = %e, "notification failed");
            1
        }
    }
}

async fn drain(queue: &Queue, handler: &dyn NotificationHandler) -> u32 {
    let mut pending = Vec::new();
    {
        let mut receiver = queue.lock().await;
        while let Ok(frame) = receiver.try_recv() {
            pending.push(frame);
        }
    }
    tracing::info!(size = pending.len(), "draining queue");

    let mut status = 0;
    for frame in &pending {
        status += process(handler, frame).await;
    }
    tracing::info!(processed = pending.len(), "queue drained");
    status
}

fn task_status(name: &str, result: Result<u32, JoinError>) -> u32 {
    match result {
        Ok(status) => status,
        Err(e) if e.is_cancelled() => 0,
        Err(e) => {
            tracing::warn!(task = %name, error = %e, "task failed");
            1
        }
    }
}
