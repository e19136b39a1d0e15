//! Functional tests for multi-backend dispatch over the shared history

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use trio_relay::backend::{BackendAdapter, BackendRegistry};
use trio_relay::error::ProviderError;
use trio_relay::relay::{
    Author, BackendId, Dispatcher, HistoryStore, LabeledMessage, ProviderRole, RetryPolicy, Role, SendRequest, Tag,
};

/// Fails the first `failures` calls, then answers with `reply`; records every context it sees
struct Flaky {
    id: BackendId,
    reply: String,
    failures: usize,
    calls: AtomicUsize,
    contexts: Mutex<Vec<Vec<LabeledMessage>>>,
    timeouts: Mutex<Vec<Duration>>,
}

impl Flaky {
    fn new(id: BackendId, reply: &str, failures: usize) -> Arc<Self> {
        Arc::new(Self {
            id,
            reply: reply.to_string(),
            failures,
            calls: AtomicUsize::new(0),
            contexts: Mutex::new(Vec::new()),
            timeouts: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl BackendAdapter for Flaky {
    fn backend(&self) -> BackendId {
        self.id
    }

    async fn call(&self, messages: &[LabeledMessage], timeout: Duration) -> Result<String, ProviderError> {
        self.contexts.lock().push(messages.to_vec());
        self.timeouts.lock().push(timeout);
        // Yield so concurrent requests really interleave
        tokio::task::yield_now().await;
        if self.calls.fetch_add(1, Ordering::SeqCst) < self.failures {
            Err(ProviderError::status(self.id, 503, "try again"))
        } else {
            Ok(self.reply.clone())
        }
    }
}

fn dispatcher(adapters: Vec<Arc<Flaky>>, retry: RetryPolicy) -> Dispatcher {
    let registry = Arc::new(BackendRegistry::new());
    for adapter in adapters {
        registry.register(adapter);
    }
    Dispatcher::new(Arc::new(HistoryStore::new()), registry, retry)
}

fn instant_retries() -> RetryPolicy {
    RetryPolicy {
        backoff_base: Duration::ZERO,
        ..RetryPolicy::default()
    }
}

fn send(content: &str, tags: &[BackendId]) -> SendRequest {
    SendRequest {
        content: content.to_string(),
        tags: tags.iter().copied().map(Tag).collect(),
    }
}

#[tokio::test]
async fn test_round_trip_stores_unlabeled_messages() {
    let gpt = Flaky::new(BackendId::Gpt, "world", 0);
    let dispatcher = dispatcher(vec![gpt.clone()], instant_retries());

    let outcome = dispatcher.send(send("hello", &[BackendId::Gpt])).await.unwrap();

    let history = dispatcher.history().snapshot();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].id, outcome.user_message_id);
    assert_eq!((history[0].author, history[0].role), (Author::User, Role::User));
    assert_eq!(history[0].content, "hello");
    assert_eq!((history[1].author, history[1].role), (Author::Gpt, Role::Assistant));
    assert_eq!(history[1].content, "world");
    assert!(history[0].ts <= history[1].ts);
    assert!(history.iter().all(|m| !m.content.contains("[SPEAKER:")));

    assert_eq!(outcome.replies.len(), 1);
    assert_eq!(outcome.replies[0].id, history[1].id);

    let contexts = gpt.contexts.lock();
    assert_eq!(contexts[0].len(), 1);
    assert_eq!(contexts[0][0].content, "[SPEAKER: USER] hello");
}

#[tokio::test]
async fn test_replies_follow_tag_order() {
    let gpt = Flaky::new(BackendId::Gpt, "from gpt", 0);
    let claude = Flaky::new(BackendId::Claude, "from claude", 0);
    let dispatcher = dispatcher(vec![gpt.clone(), claude.clone()], instant_retries());

    let outcome = dispatcher
        .send(send("who first?", &[BackendId::Claude, BackendId::Gpt]))
        .await
        .unwrap();

    let authors: Vec<Author> = outcome.replies.iter().map(|r| r.author).collect();
    assert_eq!(authors, vec![Author::Claude, Author::Gpt]);

    // gpt answers second and sees claude's reply, labeled
    let seen = gpt.contexts.lock();
    let last = seen[0].last().unwrap();
    assert_eq!(last.role, ProviderRole::Assistant);
    assert_eq!(last.content, "[SPEAKER: CLAUDE] from claude");
    assert_eq!(claude.contexts.lock()[0].len(), 1);
}

#[tokio::test]
async fn test_same_backend_may_be_tagged_twice() {
    let gpt = Flaky::new(BackendId::Gpt, "again", 0);
    let dispatcher = dispatcher(vec![gpt.clone()], instant_retries());

    let outcome = dispatcher
        .send(send("twice", &[BackendId::Gpt, BackendId::Gpt]))
        .await
        .unwrap();

    assert_eq!(outcome.replies.len(), 2);
    assert_eq!(gpt.contexts.lock()[1].len(), 2);
}

#[tokio::test]
async fn test_exhausted_backend_becomes_error_reply() {
    let gpt = Flaky::new(BackendId::Gpt, "never", usize::MAX);
    let claude = Flaky::new(BackendId::Claude, "still here", 0);
    let dispatcher = dispatcher(vec![gpt.clone(), claude.clone()], instant_retries());

    let outcome = dispatcher
        .send(send("hello", &[BackendId::Gpt, BackendId::Claude]))
        .await
        .unwrap();

    assert_eq!(gpt.calls.load(Ordering::SeqCst), 3);
    assert_eq!(
        *gpt.timeouts.lock(),
        vec![
            Duration::from_millis(20_000),
            Duration::from_millis(30_000),
            Duration::from_millis(40_000)
        ]
    );
    assert_eq!(outcome.replies[0].author, Author::Gpt);
    assert_eq!(
        outcome.replies[0].content,
        "(error from Gpt: backend returned 503: try again)"
    );
    assert_eq!(outcome.replies[1].content, "still here");

    let history = dispatcher.history().snapshot();
    assert_eq!(history.len(), 3);
    assert_eq!(history[1].role, Role::Assistant);
    assert_eq!(history[1].content, outcome.replies[0].content);
}

#[tokio::test(start_paused = true)]
async fn test_recovers_after_backoff() {
    let claude = Flaky::new(BackendId::Claude, "third time lucky", 2);
    let dispatcher = dispatcher(vec![claude.clone()], RetryPolicy::default());
    let started = tokio::time::Instant::now();

    let outcome = dispatcher.send(send("hello", &[BackendId::Claude])).await.unwrap();

    let waited = started.elapsed();
    assert!(waited >= Duration::from_secs(3));
    assert!(waited < Duration::from_millis(3_100));
    assert_eq!(outcome.replies[0].content, "third time lucky");
    assert!(!outcome.replies[0].content.starts_with("(error from"));
    assert_eq!(dispatcher.history().len(), 2);
}

#[tokio::test]
async fn test_reset_empties_history() {
    let gpt = Flaky::new(BackendId::Gpt, "world", 0);
    let dispatcher = dispatcher(vec![gpt], instant_retries());
    dispatcher.send(send("hello", &[BackendId::Gpt])).await.unwrap();

    dispatcher.history().reset();

    assert!(dispatcher.history().snapshot().is_empty());
}

#[tokio::test]
async fn test_later_requests_see_earlier_turns() {
    let gpt = Flaky::new(BackendId::Gpt, "noted", 0);
    let dispatcher = dispatcher(vec![gpt.clone()], instant_retries());

    dispatcher.send(send("first", &[BackendId::Gpt])).await.unwrap();
    dispatcher.send(send("second", &[BackendId::Gpt])).await.unwrap();

    let contexts = gpt.contexts.lock();
    let contents: Vec<&str> = contexts[1].iter().map(|m| m.content.as_str()).collect();
    assert_eq!(
        contents,
        vec!["[SPEAKER: USER] first", "[SPEAKER: GPT] noted", "[SPEAKER: USER] second"]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_sends_lose_nothing() {
    let gpt = Flaky::new(BackendId::Gpt, "gpt", 0);
    let claude = Flaky::new(BackendId::Claude, "claude", 0);
    let dispatcher = Arc::new(dispatcher(vec![gpt, claude], instant_retries()));

    let tasks = (0..10).map(|i| {
        let dispatcher = dispatcher.clone();
        tokio::spawn(async move {
            dispatcher
                .send(send(&format!("msg {i}"), &[BackendId::Gpt, BackendId::Claude]))
                .await
                .unwrap()
        })
    });
    let outcomes: Vec<_> = futures::future::join_all(tasks)
        .await
        .into_iter()
        .map(Result::unwrap)
        .collect();

    let history = dispatcher.history().snapshot();
    assert_eq!(history.len(), 30);
    assert!(history.windows(2).all(|w| w[0].ts <= w[1].ts));

    for outcome in outcomes {
        let position = |id: &str| history.iter().position(|m| m.id == id).unwrap();
        let user = position(outcome.user_message_id.as_str());
        let first = position(outcome.replies[0].id.as_str());
        let second = position(outcome.replies[1].id.as_str());
        assert!(user < first && first < second);
        assert_eq!(history[first].author, Author::Gpt);
        assert_eq!(history[second].author, Author::Claude);
    }

    let mut ids: Vec<&str> = history.iter().map(|m| m.id.as_str()).collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), 30);
}
