//! Prioritized outbound queue and its drain loop.
//!
//! Producers (hooks, modules, the control surface) push onto a shared heap
//! and never block. One drain future per session pops the lowest
//! `(priority, sequence)` item, paces it through the burst bucket, announces
//! it on the `_SEND` pseudo-event and writes it. The drain is the only
//! writer to the transport.

use crate::hooks::{HookRegistry, events};
use crate::network::ratelimit::BurstBucket;
use futures_util::SinkExt;
use parking_lot::Mutex;
use relaybot_proto::{Command, Event, LineCodec};
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::sync::Arc;
use std::sync::atomic::{self, AtomicU64};
use tokio::io::AsyncWrite;
use tokio::sync::{Notify, oneshot};
use tokio_util::codec::FramedWrite;
use tracing::{debug, info, warn};

/// Reserved lowest priority value; overtakes everything else.
pub const PRIORITY_URGENT: i64 = i64::MIN;

/// One queued line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub payload: String,
    pub priority: i64,
    pub sequence: u64,
}

impl Ord for OutboundMessage {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.priority, self.sequence).cmp(&(other.priority, other.sequence))
    }
}

impl PartialOrd for OutboundMessage {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Shared priority queue of outbound lines.
#[derive(Debug, Default)]
pub struct OutputQueue {
    heap: Mutex<BinaryHeap<Reverse<OutboundMessage>>>,
    sequence: AtomicU64,
    notify: Notify,
}

impl OutputQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a raw line.
    ///
    /// Without an explicit priority the insertion counter is used, which
    /// keeps unprioritized sends in FIFO order.
    pub fn enqueue(&self, payload: impl Into<String>, priority: Option<i64>) {
        let sequence = self.sequence.fetch_add(1, atomic::Ordering::Relaxed);
        let message = OutboundMessage {
            payload: payload.into(),
            priority: priority.unwrap_or(sequence as i64),
            sequence,
        };
        let depth = {
            let mut heap = self.heap.lock();
            heap.push(Reverse(message));
            heap.len()
        };
        crate::metrics::set_queue_depth(depth);
        self.notify.notify_one();
    }

    /// Queue a command.
    pub fn send(&self, command: Command, priority: Option<i64>) {
        self.enqueue(command.to_string(), priority);
    }

    pub fn len(&self) -> usize {
        self.heap.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.lock().is_empty()
    }

    /// Drop everything still queued.
    pub fn clear(&self) {
        self.heap.lock().clear();
        crate::metrics::set_queue_depth(0);
    }

    fn pop(&self) -> Option<OutboundMessage> {
        let mut heap = self.heap.lock();
        let message = heap.pop().map(|Reverse(m)| m);
        crate::metrics::set_queue_depth(heap.len());
        message
    }

    /// Wait for and remove the lowest-ordered message.
    pub async fn next(&self) -> OutboundMessage {
        loop {
            let notified = self.notify.notified();
            if let Some(message) = self.pop() {
                return message;
            }
            notified.await;
        }
    }

    // ------------------------------------------------------------------
    // Command builders
    // ------------------------------------------------------------------

    pub fn pass(&self, password: &str, priority: Option<i64>) {
        self.send(Command::Pass(password.to_string()), priority);
    }

    pub fn nick(&self, nick: &str, priority: Option<i64>) {
        self.send(Command::Nick(nick.to_string()), priority);
    }

    pub fn user(&self, user: &str, realname: &str, priority: Option<i64>) {
        self.send(
            Command::User {
                user: user.to_string(),
                realname: realname.to_string(),
            },
            priority,
        );
    }

    pub fn pong(&self, token: &str, priority: Option<i64>) {
        self.send(Command::Pong(token.to_string()), priority);
    }

    pub fn join(&self, channel: &str, key: Option<&str>, priority: Option<i64>) {
        self.send(
            Command::Join {
                channel: channel.to_string(),
                key: key.map(str::to_string),
            },
            priority,
        );
    }

    pub fn part(&self, channel: &str, reason: Option<&str>, priority: Option<i64>) {
        self.send(
            Command::Part {
                channel: channel.to_string(),
                reason: reason.map(str::to_string),
            },
            priority,
        );
    }

    pub fn privmsg(&self, target: &str, text: &str, priority: Option<i64>) {
        self.send(
            Command::Privmsg {
                target: target.to_string(),
                text: text.to_string(),
            },
            priority,
        );
    }

    pub fn notice(&self, target: &str, text: &str, priority: Option<i64>) {
        self.send(
            Command::Notice {
                target: target.to_string(),
                text: text.to_string(),
            },
            priority,
        );
    }

    pub fn action(&self, target: &str, text: &str, priority: Option<i64>) {
        self.send(
            Command::Action {
                target: target.to_string(),
                text: text.to_string(),
            },
            priority,
        );
    }

    pub fn mode(&self, target: &str, args: &[&str], priority: Option<i64>) {
        self.send(
            Command::Mode {
                target: target.to_string(),
                args: args.iter().map(|a| a.to_string()).collect(),
            },
            priority,
        );
    }

    pub fn kick(&self, channel: &str, nick: &str, reason: Option<&str>, priority: Option<i64>) {
        self.send(
            Command::Kick {
                channel: channel.to_string(),
                nick: nick.to_string(),
                reason: reason.map(str::to_string),
            },
            priority,
        );
    }

    pub fn quit(&self, message: Option<&str>, priority: Option<i64>) {
        self.send(Command::Quit(message.map(str::to_string)), priority);
    }

    pub fn raw(&self, line: &str, priority: Option<i64>) {
        self.send(Command::Raw(line.to_string()), priority);
    }
}

/// How a drain task is asked to stop.
#[derive(Debug)]
pub enum DrainStop {
    /// Close the writer without a final line.
    Close,
    /// Write this line immediately (no rate limit), flush, then close.
    Final(String),
}

/// Drive `queue` onto `writer` until told to stop.
///
/// `DrainStop::Close` also cuts short a write the transport is not
/// accepting; the writer is then dropped without a graceful close.
/// `DrainStop::Final` lets an in-flight write finish first, so callers
/// should bound the whole future with a timeout.
pub async fn drain<W>(
    queue: Arc<OutputQueue>,
    hooks: Arc<HookRegistry>,
    mut limiter: Option<BurstBucket>,
    mut writer: FramedWrite<W, LineCodec>,
    mut stop: oneshot::Receiver<DrainStop>,
) where
    W: AsyncWrite + Unpin,
{
    let reason = loop {
        if let Some(bucket) = limiter.as_mut() {
            let mut stopped = None;
            loop {
                let wait = bucket.get();
                if wait.is_zero() {
                    break;
                }
                crate::metrics::record_rate_limit_wait();
                debug!(wait_ms = wait.as_millis() as u64, "Output rate limited");
                tokio::select! {
                    _ = tokio::time::sleep(wait) => {}
                    reason = &mut stop => {
                        stopped = Some(reason.unwrap_or(DrainStop::Close));
                        break;
                    }
                }
            }
            if let Some(reason) = stopped {
                break reason;
            }
        }

        let message = tokio::select! {
            message = queue.next() => message,
            reason = &mut stop => break reason.unwrap_or(DrainStop::Close),
        };

        let write = write_line(&hooks, &mut writer, message.payload);
        tokio::pin!(write);
        let interrupted = tokio::select! {
            _ = &mut write => None,
            reason = &mut stop => Some(reason.unwrap_or(DrainStop::Close)),
        };
        match interrupted {
            None => {}
            Some(DrainStop::Close) => {
                // The peer stopped reading; a graceful close would stall too.
                warn!(pending = queue.len(), "Abandoning stalled write");
                return;
            }
            Some(reason) => {
                write.await;
                break reason;
            }
        }
    };

    if let DrainStop::Final(line) = reason {
        write_line(&hooks, &mut writer, line).await;
    }
    if let Err(e) = SinkExt::<String>::close(&mut writer).await {
        debug!(error = %e, "Error closing writer");
    }
    info!(pending = queue.len(), "Output drain stopped");
}

async fn write_line<W>(hooks: &HookRegistry, writer: &mut FramedWrite<W, LineCodec>, payload: String)
where
    W: AsyncWrite + Unpin,
{
    hooks.dispatch(&Event::new(events::SEND).with_trailing(payload.clone()));
    match writer.send(payload).await {
        Ok(()) => crate::metrics::record_sent(),
        Err(e) => {
            // Dropped, not requeued: the read side will notice the dead
            // transport and reconnect.
            crate::metrics::record_send_failure();
            warn!(error = %e, "Failed to send line");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::{Hook, Matcher, MetricsReporter, NickHandle};
    use futures_util::StreamExt;
    use relaybot_proto::parse_bytes;
    use std::time::Duration;
    use tokio::io::DuplexStream;
    use tokio_util::codec::FramedRead;

    fn hooks() -> Arc<HookRegistry> {
        Arc::new(HookRegistry::new(
            Matcher::new(".", NickHandle::new("relay")),
            Arc::new(MetricsReporter),
        ))
    }

    struct Harness {
        stop: Option<oneshot::Sender<DrainStop>>,
        task: tokio::task::JoinHandle<()>,
        reader: FramedRead<DuplexStream, LineCodec>,
    }

    impl Harness {
        fn start(queue: &Arc<OutputQueue>, hooks: Arc<HookRegistry>, limiter: Option<BurstBucket>) -> Self {
            let (ours, theirs) = tokio::io::duplex(4096);
            let (stop_tx, stop_rx) = oneshot::channel();
            let writer = FramedWrite::new(ours, LineCodec::new());
            let task = tokio::spawn(drain(queue.clone(), hooks, limiter, writer, stop_rx));
            Self {
                stop: Some(stop_tx),
                task,
                reader: FramedRead::new(theirs, LineCodec::new()),
            }
        }

        async fn line(&mut self) -> String {
            let raw = self.reader.next().await.unwrap().unwrap();
            String::from_utf8(raw.to_vec()).unwrap()
        }

        async fn stop(mut self, how: DrainStop) -> FramedRead<DuplexStream, LineCodec> {
            let _ = self.stop.take().unwrap().send(how);
            self.task.await.unwrap();
            self.reader
        }
    }

    #[tokio::test]
    async fn test_explicit_priorities_drain_lowest_first() {
        let queue = Arc::new(OutputQueue::new());
        queue.enqueue("five", Some(5));
        queue.enqueue("one", Some(1));
        queue.enqueue("three", Some(3));

        let mut h = Harness::start(&queue, hooks(), None);
        assert_eq!(h.line().await, "one");
        assert_eq!(h.line().await, "three");
        assert_eq!(h.line().await, "five");
        h.stop(DrainStop::Close).await;
    }

    #[tokio::test]
    async fn test_unprioritized_sends_stay_fifo() {
        let queue = Arc::new(OutputQueue::new());
        queue.privmsg("#c", "first", None);
        queue.privmsg("#c", "second", None);
        queue.pong("srv", Some(PRIORITY_URGENT));

        let mut h = Harness::start(&queue, hooks(), None);
        assert_eq!(h.line().await, "PONG :srv");
        assert_eq!(h.line().await, "PRIVMSG #c :first");
        assert_eq!(h.line().await, "PRIVMSG #c :second");
        h.stop(DrainStop::Close).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_then_paced() {
        let queue = Arc::new(OutputQueue::new());
        for i in 0..3 {
            queue.enqueue(format!("PRIVMSG #c :{}", i), None);
        }

        let start = tokio::time::Instant::now();
        let bucket = BurstBucket::new(2, Duration::from_secs(1));
        let mut h = Harness::start(&queue, hooks(), Some(bucket));
        h.line().await;
        h.line().await;
        assert!(start.elapsed() < Duration::from_secs(1));
        h.line().await;
        assert!(start.elapsed() >= Duration::from_secs(1));
        h.stop(DrainStop::Close).await;
    }

    #[tokio::test]
    async fn test_pre_send_notification() {
        let hooks = hooks();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = seen.clone();
        hooks.add_hook(
            "watcher",
            Hook::on(&[events::SEND], move |event| {
                log.lock().push(event.trailing.clone().unwrap_or_default());
                Ok(())
            }),
        );

        let queue = Arc::new(OutputQueue::new());
        queue.join("#rust", None, None);
        let mut h = Harness::start(&queue, hooks, None);
        assert_eq!(h.line().await, "JOIN #rust");
        assert_eq!(*seen.lock(), vec!["JOIN #rust".to_string()]);
        h.stop(DrainStop::Close).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_final_line_bypasses_limiter_and_closes() {
        let queue = Arc::new(OutputQueue::new());
        let mut bucket = BurstBucket::new(1, Duration::from_secs(60));
        assert!(bucket.get().is_zero());

        let h = Harness::start(&queue, hooks(), Some(bucket));
        let mut reader = h.stop(DrainStop::Final("QUIT :bye".to_string())).await;

        let raw = reader.next().await.unwrap().unwrap();
        assert_eq!(parse_bytes(&raw).unwrap().command, "QUIT");
        assert!(reader.next().await.is_none());
    }

    #[tokio::test]
    async fn test_close_abandons_stalled_write() {
        let queue = Arc::new(OutputQueue::new());
        // The far end never reads, so a line larger than the pipe blocks.
        let (ours, _theirs) = tokio::io::duplex(64);
        let (stop_tx, stop_rx) = oneshot::channel();
        let writer = FramedWrite::new(ours, LineCodec::new());
        let task = tokio::spawn(drain(queue.clone(), hooks(), None, writer, stop_rx));

        queue.privmsg("#c", &"x".repeat(4096), None);
        queue.privmsg("#c", "never sent", None);
        tokio::time::timeout(Duration::from_secs(1), async {
            while queue.len() > 1 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();

        let _ = stop_tx.send(DrainStop::Close);
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(queue.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_write_is_dropped() {
        let queue = Arc::new(OutputQueue::new());
        let h = Harness::start(&queue, hooks(), None);
        let Harness { stop, task, reader } = h;
        drop(reader);

        queue.privmsg("#c", "into the void", None);
        tokio::time::timeout(Duration::from_secs(1), async {
            while !queue.is_empty() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();

        let _ = stop.unwrap().send(DrainStop::Close);
        task.await.unwrap();
        assert!(queue.is_empty());
    }
}
