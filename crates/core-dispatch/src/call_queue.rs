//! FIFO call serializer for backends that cannot tolerate overlapping calls
//!
//! Callers [`submit`](CallQueue::submit) requests from any task and get a
//! [`PendingCall`] back immediately. A single drain worker wakes on a fixed
//! tick, pops at most one request from the head of the queue, awaits the
//! [`Dispatcher`] and settles that request's future. Because the worker awaits
//! each call before it looks at the queue again, the backend never sees two
//! calls in flight, and calls settle in exactly the order they were submitted.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::ready;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::DispatchError;

/// Executes one request against the backend
///
/// The error type must be able to carry [`DispatchError`] so that a call
/// refused by a closed queue settles with the dispatcher's own error type.
#[async_trait::async_trait]
pub trait Dispatcher<Req: Send + 'static>: Send + Sync + 'static {
    /// Value produced by a successful call
    type Output: Send + 'static;
    /// Error produced by a failed call
    type Error: From<DispatchError> + Send + 'static;

    /// Execute a single request
    async fn dispatch(&self, request: Req) -> Result<Self::Output, Self::Error>;
}

/// Configuration for the drain worker
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Interval between drain steps; at most one call starts per tick
    pub tick: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(250),
        }
    }
}

impl QueueConfig {
    /// Create a configuration with the given drain interval
    pub fn with_tick(tick: Duration) -> Self {
        Self { tick }
    }

    /// Reject a zero tick, which tokio's interval cannot represent
    pub fn validate(&self) -> Result<(), DispatchError> {
        if self.tick.is_zero() {
            return Err(DispatchError::InvalidConfig(
                "queue tick must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// A request waiting in the queue together with its reply channel
struct QueuedCall<Req, T, E> {
    seq: u64,
    request: Req,
    reply: oneshot::Sender<Result<T, E>>,
}

/// Future returned by [`CallQueue::submit`]
///
/// Dropping it does not remove the request from the queue: the call still
/// executes and its result is discarded.
#[derive(Debug)]
pub struct PendingCall<T, E> {
    seq: u64,
    rx: oneshot::Receiver<Result<T, E>>,
}

impl<T, E> PendingCall<T, E> {
    /// Position of this call in submission order
    pub fn sequence(&self) -> u64 {
        self.seq
    }
}

impl<T, E: From<DispatchError>> Future for PendingCall<T, E> {
    type Output = Result<T, E>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let settled = ready!(Pin::new(&mut self.rx).poll(cx));
        Poll::Ready(settled.unwrap_or_else(|_| Err(DispatchError::Abandoned.into())))
    }
}

#[derive(Debug, Default)]
struct QueueCounters {
    queued: AtomicUsize,
    in_flight: AtomicUsize,
    executed: AtomicU64,
    failed: AtomicU64,
}

/// Snapshot of queue activity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueStats {
    /// Calls waiting to be drained
    pub queued: usize,
    /// Calls currently executing (0 or 1)
    pub in_flight: usize,
    /// Calls that settled successfully
    pub executed: u64,
    /// Calls that settled with an error
    pub failed: u64,
}

/// Single-flight FIFO call serializer
///
/// # Example
/// ```no_run
/// use odoo_core_dispatch::{CallQueue, DispatchError, Dispatcher, QueueConfig};
/// use std::sync::Arc;
///
/// struct Echo;
///
/// #[async_trait::async_trait]
/// impl Dispatcher<String> for Echo {
///     type Output = String;
///     type Error = DispatchError;
///
///     async fn dispatch(&self, request: String) -> Result<String, DispatchError> {
///         Ok(request)
///     }
/// }
///
/// # async fn example() -> Result<(), DispatchError> {
/// let queue = CallQueue::start(Arc::new(Echo), QueueConfig::default())?;
///
/// let first = queue.submit("a".to_string());
/// let second = queue.submit("b".to_string());
/// assert_eq!(first.await?, "a");
/// assert_eq!(second.await?, "b");
/// # Ok(())
/// # }
/// ```
pub struct CallQueue<Req, D>
where
    Req: Send + 'static,
    D: Dispatcher<Req>,
{
    tx: mpsc::UnboundedSender<QueuedCall<Req, D::Output, D::Error>>,
    shutdown: CancellationToken,
    counters: Arc<QueueCounters>,
    next_seq: AtomicU64,
    worker: Mutex<Option<JoinHandle<()>>>,
    config: QueueConfig,
}

impl<Req, D> CallQueue<Req, D>
where
    Req: Send + 'static,
    D: Dispatcher<Req>,
{
    /// Start the drain worker on the current tokio runtime
    pub fn start(dispatcher: Arc<D>, config: QueueConfig) -> Result<Self, DispatchError> {
        config.validate()?;

        let (tx, rx) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();
        let counters = Arc::new(QueueCounters::default());

        let worker = tokio::spawn(drain_loop(
            dispatcher,
            rx,
            config.tick,
            shutdown.clone(),
            counters.clone(),
        ));

        info!(
            "Call queue started (drain interval {}ms)",
            config.tick.as_millis()
        );

        Ok(Self {
            tx,
            shutdown,
            counters,
            next_seq: AtomicU64::new(0),
            worker: Mutex::new(Some(worker)),
            config,
        })
    }

    /// Append a request to the tail of the queue
    ///
    /// The request is enqueued before this returns, so submission order is
    /// fixed by call order, not by when the returned future is first polled.
    pub fn submit(&self, request: Req) -> PendingCall<D::Output, D::Error> {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let (reply, rx) = oneshot::channel();

        if self.shutdown.is_cancelled() {
            let _ = reply.send(Err(DispatchError::QueueClosed.into()));
            return PendingCall { seq, rx };
        }

        self.counters.queued.fetch_add(1, Ordering::SeqCst);
        if let Err(mpsc::error::SendError(call)) = self.tx.send(QueuedCall {
            seq,
            request,
            reply,
        }) {
            self.counters.queued.fetch_sub(1, Ordering::SeqCst);
            let _ = call.reply.send(Err(DispatchError::QueueClosed.into()));
        } else {
            debug!(
                "Queued call #{} ({} waiting)",
                seq,
                self.counters.queued.load(Ordering::SeqCst)
            );
        }

        PendingCall { seq, rx }
    }

    /// Current queue activity
    pub fn stats(&self) -> QueueStats {
        QueueStats {
            queued: self.counters.queued.load(Ordering::SeqCst),
            in_flight: self.counters.in_flight.load(Ordering::SeqCst),
            executed: self.counters.executed.load(Ordering::SeqCst),
            failed: self.counters.failed.load(Ordering::SeqCst),
        }
    }

    /// Configured drain interval
    pub fn tick(&self) -> Duration {
        self.config.tick
    }

    /// Whether the worker has been asked to stop
    pub fn is_closed(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Stop the drain worker
    ///
    /// A call already executing finishes and settles normally. Calls still
    /// waiting in the queue, and any submitted afterwards, settle with
    /// [`DispatchError::QueueClosed`].
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        if let Some(worker) = self.worker.lock().await.take() {
            let _ = worker.await;
        }
        info!("Call queue stopped");
    }
}

async fn drain_loop<Req, D>(
    dispatcher: Arc<D>,
    mut rx: mpsc::UnboundedReceiver<QueuedCall<Req, D::Output, D::Error>>,
    tick: Duration,
    shutdown: CancellationToken,
    counters: Arc<QueueCounters>,
) where
    Req: Send + 'static,
    D: Dispatcher<Req>,
{
    let mut interval = tokio::time::interval(tick);
    // A slow call must not be followed by a burst of catch-up ticks
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = interval.tick() => {}
        }

        let call = match rx.try_recv() {
            Ok(call) => call,
            Err(mpsc::error::TryRecvError::Empty) => continue,
            Err(mpsc::error::TryRecvError::Disconnected) => break,
        };

        counters.queued.fetch_sub(1, Ordering::SeqCst);
        counters.in_flight.store(1, Ordering::SeqCst);
        debug!("Executing call #{}", call.seq);

        let result = dispatcher.dispatch(call.request).await;

        counters.in_flight.store(0, Ordering::SeqCst);
        if result.is_ok() {
            counters.executed.fetch_add(1, Ordering::SeqCst);
        } else {
            counters.failed.fetch_add(1, Ordering::SeqCst);
            debug!("Call #{} failed", call.seq);
        }

        if call.reply.send(result).is_err() {
            debug!("Caller of #{} went away, result discarded", call.seq);
        }
    }

    rx.close();
    while let Ok(call) = rx.try_recv() {
        counters.queued.fetch_sub(1, Ordering::SeqCst);
        let _ = call.reply.send(Err(DispatchError::QueueClosed.into()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    #[derive(Debug, PartialEq)]
    enum TestError {
        Rejected(u32),
        Dispatch(DispatchError),
    }

    impl From<DispatchError> for TestError {
        fn from(err: DispatchError) -> Self {
            TestError::Dispatch(err)
        }
    }

    /// Records execution order and the highest number of overlapping calls
    #[derive(Default)]
    struct Recorder {
        order: StdMutex<Vec<u32>>,
        active: AtomicUsize,
        max_active: AtomicUsize,
        delay: Duration,
        reject: Vec<u32>,
    }

    #[async_trait::async_trait]
    impl Dispatcher<u32> for Recorder {
        type Output = u32;
        type Error = TestError;

        async fn dispatch(&self, request: u32) -> Result<u32, TestError> {
            let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_active.fetch_max(now_active, Ordering::SeqCst);

            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.order.lock().unwrap().push(request);
            self.active.fetch_sub(1, Ordering::SeqCst);

            if self.reject.contains(&request) {
                Err(TestError::Rejected(request))
            } else {
                Ok(request * 10)
            }
        }
    }

    fn quick() -> QueueConfig {
        QueueConfig::with_tick(Duration::from_millis(10))
    }

    fn start(recorder: Arc<Recorder>, config: QueueConfig) -> CallQueue<u32, Recorder> {
        CallQueue::start(recorder, config).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_execution_order_matches_submission_order() {
        let recorder = Arc::new(Recorder::default());
        let queue = start(recorder.clone(), quick());

        let pending: Vec<_> = (0..20).map(|i| queue.submit(i)).collect();
        let results = futures::future::join_all(pending).await;

        let expected: Vec<u32> = (0..20).collect();
        assert_eq!(*recorder.order.lock().unwrap(), expected);
        for (i, result) in results.into_iter().enumerate() {
            assert_eq!(result, Ok(i as u32 * 10));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_never_two_calls_in_flight() {
        let recorder = Arc::new(Recorder {
            delay: Duration::from_millis(35),
            ..Default::default()
        });
        let queue = Arc::new(start(recorder.clone(), quick()));

        let mut handles = Vec::new();
        for i in 0..10 {
            let queue = queue.clone();
            handles.push(tokio::spawn(async move { queue.submit(i).await }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(recorder.max_active.load(Ordering::SeqCst), 1);
        assert_eq!(recorder.order.lock().unwrap().len(), 10);
        assert_eq!(queue.stats().executed, 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_settles_only_its_own_call() {
        let recorder = Arc::new(Recorder {
            reject: vec![1],
            ..Default::default()
        });
        let queue = start(recorder.clone(), quick());

        let first = queue.submit(0);
        let second = queue.submit(1);
        let third = queue.submit(2);

        assert_eq!(first.await, Ok(0));
        assert_eq!(second.await, Err(TestError::Rejected(1)));
        assert_eq!(third.await, Ok(20));

        let stats = queue.stats();
        assert_eq!(stats.executed, 2);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.queued, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_call_per_tick() {
        let recorder = Arc::new(Recorder::default());
        let queue = start(recorder.clone(), QueueConfig::with_tick(Duration::from_secs(1)));

        let start = tokio::time::Instant::now();
        let pending: Vec<_> = (0..3).map(|i| queue.submit(i)).collect();
        futures::future::join_all(pending).await;

        // First tick fires immediately, the other two wait a full interval each
        assert!(start.elapsed() >= Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_orphaned_call_still_executes() {
        let recorder = Arc::new(Recorder::default());
        let queue = start(recorder.clone(), quick());

        drop(queue.submit(7));
        queue.submit(8).await.unwrap();

        assert_eq!(*recorder.order.lock().unwrap(), vec![7, 8]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_closes_queue() {
        let recorder = Arc::new(Recorder::default());
        let queue = start(recorder.clone(), QueueConfig::with_tick(Duration::from_secs(5)));

        queue.submit(1).await.unwrap();
        let waiting = queue.submit(2);
        queue.shutdown().await;

        assert!(queue.is_closed());
        assert_eq!(
            waiting.await,
            Err(TestError::Dispatch(DispatchError::QueueClosed))
        );
        assert_eq!(
            queue.submit(3).await,
            Err(TestError::Dispatch(DispatchError::QueueClosed))
        );
        assert_eq!(*recorder.order.lock().unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn test_zero_tick_rejected() {
        let result = CallQueue::<u32, Recorder>::start(
            Arc::new(Recorder::default()),
            QueueConfig::with_tick(Duration::ZERO),
        );
        assert!(matches!(result, Err(DispatchError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_sequence_numbers_follow_submission() {
        let queue = start(Arc::new(Recorder::default()), quick());
        let a = queue.submit(1);
        let b = queue.submit(2);
        assert_eq!(a.sequence(), 0);
        assert_eq!(b.sequence(), 1);
        queue.shutdown().await;
    }
}
