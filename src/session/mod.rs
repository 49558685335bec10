//! Stream sessions: one cancellable generation per user turn
//!
//! A [`StreamSession`] is created by [`SessionRegistry::begin`] and consumed
//! by [`StreamSession::drive`], which relays light-normalized fragments from
//! a [`FragmentStream`] and finishes with exactly one terminal
//! [`SessionEvent`]. The registry entry is removed when the session reaches
//! a terminal state, and also if the driving stream is dropped early.

pub mod registry;

pub use registry::SessionRegistry;

use futures::stream::BoxStream;
use futures::StreamExt;
use std::fmt;
use tokio_util::sync::CancellationToken;

use crate::normalize::{deep_normalize_with, light_normalize, NormalizeOptions};
use crate::providers::FragmentStream;

/// Item produced while driving a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A light-normalized fragment, in source order
    Fragment(String),
    /// Source exhausted; carries the deep-normalized full reply
    Completed(String),
    /// The session was cancelled; nothing should be persisted
    Interrupted,
    /// The fragment source faulted; nothing should be persisted
    Failed(String),
}

impl SessionEvent {
    /// Whether this event ends the session
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SessionEvent::Fragment(_))
    }
}

/// Lifecycle state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Generation in progress
    Active,
    /// Source exhausted normally
    Completed,
    /// Cancelled through the registry
    Cancelled,
    /// Source faulted
    Failed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Active => write!(f, "active"),
            SessionState::Completed => write!(f, "completed"),
            SessionState::Cancelled => write!(f, "cancelled"),
            SessionState::Failed => write!(f, "failed"),
        }
    }
}

impl From<&SessionEvent> for SessionState {
    fn from(event: &SessionEvent) -> Self {
        match event {
            SessionEvent::Fragment(_) => SessionState::Active,
            SessionEvent::Completed(_) => SessionState::Completed,
            SessionEvent::Interrupted => SessionState::Cancelled,
            SessionEvent::Failed(_) => SessionState::Failed,
        }
    }
}

/// Removes the registry entry exactly once, on release or drop.
#[derive(Debug)]
struct RegistryGuard {
    registry: SessionRegistry,
    id: String,
    released: bool,
}

impl RegistryGuard {
    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.registry.remove(&self.id);
            tracing::debug!("Stream session {} removed from registry", self.id);
        }
    }
}

impl Drop for RegistryGuard {
    fn drop(&mut self) {
        self.release();
    }
}

/// A registered, not yet driven, stream session
#[derive(Debug)]
pub struct StreamSession {
    id: String,
    token: CancellationToken,
    guard: RegistryGuard,
}

impl StreamSession {
    pub(crate) fn new(id: String, token: CancellationToken, registry: SessionRegistry) -> Self {
        let guard = RegistryGuard {
            registry,
            id: id.clone(),
            released: false,
        };
        Self { id, token, guard }
    }

    /// Session identifier used for cancellation
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Whether cancellation has been requested
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Drive the session over a fragment source
    ///
    /// For every fragment the cancellation flag is checked first. Raw
    /// fragments are accumulated and their light-normalized form is yielded
    /// as [`SessionEvent::Fragment`]; empty fragments are skipped. The stream
    /// ends with exactly one terminal event:
    ///
    /// - [`SessionEvent::Completed`] with the deep-normalized accumulation
    ///   when the source is exhausted,
    /// - [`SessionEvent::Interrupted`] as soon as cancellation is observed,
    ///   without waiting for the source's next fragment,
    /// - [`SessionEvent::Failed`] when the source yields an error.
    ///
    /// The source is dropped before the terminal event is yielded.
    pub fn drive(
        self,
        source: FragmentStream,
        options: NormalizeOptions,
    ) -> BoxStream<'static, SessionEvent> {
        let StreamSession {
            id,
            token,
            mut guard,
        } = self;

        Box::pin(async_stream::stream! {
            let mut source = source;
            let mut accumulated = String::new();
            let mut fragments = 0usize;

            let outcome = loop {
                let next = tokio::select! {
                    biased;
                    _ = token.cancelled() => break SessionEvent::Interrupted,
                    next = source.next() => next,
                };

                match next {
                    Some(Ok(fragment)) => {
                        if token.is_cancelled() {
                            break SessionEvent::Interrupted;
                        }
                        if fragment.is_empty() {
                            continue;
                        }
                        accumulated.push_str(&fragment);
                        fragments += 1;

                        let cleaned = light_normalize(&fragment);
                        if !cleaned.is_empty() {
                            yield SessionEvent::Fragment(cleaned);
                        }
                    }
                    Some(Err(e)) => {
                        tracing::warn!("Fragment source for session {} failed: {:#}", id, e);
                        break SessionEvent::Failed(e.to_string());
                    }
                    None => {
                        break SessionEvent::Completed(deep_normalize_with(&accumulated, &options));
                    }
                }
            };

            drop(source);
            guard.release();
            tracing::info!(
                "Stream session {} {} after {} fragments",
                id,
                SessionState::from(&outcome),
                fragments
            );

            yield outcome;
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn source(fragments: &[&str]) -> FragmentStream {
        let items: Vec<crate::Result<String>> =
            fragments.iter().map(|f| Ok(f.to_string())).collect();
        Box::pin(stream::iter(items))
    }

    async fn collect(stream: BoxStream<'static, SessionEvent>) -> Vec<SessionEvent> {
        stream.collect().await
    }

    #[tokio::test]
    async fn test_drive_completes_with_deep_normalized_text() {
        let registry = SessionRegistry::new();
        let session = registry.begin();

        let events = collect(
            session.drive(source(&["你好", "你好", "你好"]), NormalizeOptions::default()),
        )
        .await;

        assert_eq!(
            events,
            vec![
                SessionEvent::Fragment("你好".into()),
                SessionEvent::Fragment("你好".into()),
                SessionEvent::Fragment("你好".into()),
                SessionEvent::Completed("你好".into()),
            ]
        );
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_drive_light_normalizes_fragments_but_accumulates_raw() {
        let registry = SessionRegistry::new();
        let events = collect(
            registry
                .begin()
                .drive(source(&["nooooo"]), NormalizeOptions::default()),
        )
        .await;

        assert_eq!(
            events,
            vec![
                SessionEvent::Fragment("no".into()),
                SessionEvent::Completed("noo".into()),
            ]
        );
    }

    #[tokio::test]
    async fn test_drive_skips_empty_fragments() {
        let registry = SessionRegistry::new();
        let events = collect(
            registry
                .begin()
                .drive(source(&["", "Hi", ""]), NormalizeOptions::default()),
        )
        .await;

        assert_eq!(
            events,
            vec![
                SessionEvent::Fragment("Hi".into()),
                SessionEvent::Completed("Hi".into()),
            ]
        );
    }

    #[tokio::test]
    async fn test_session_registered_until_terminal() {
        let registry = SessionRegistry::new();
        let session = registry.begin();
        let id = session.id().to_string();
        assert!(registry.contains(&id));

        let mut events = session.drive(source(&["a", "b"]), NormalizeOptions::default());
        assert_eq!(events.next().await, Some(SessionEvent::Fragment("a".into())));
        assert!(registry.contains(&id));

        assert_eq!(events.next().await, Some(SessionEvent::Fragment("b".into())));
        assert_eq!(events.next().await, Some(SessionEvent::Completed("ab".into())));
        assert!(!registry.contains(&id));
        assert_eq!(events.next().await, None);
    }

    #[tokio::test]
    async fn test_cancel_before_drive_interrupts_immediately() {
        let registry = SessionRegistry::new();
        let session = registry.begin();
        assert!(registry.cancel(session.id()));

        let events = collect(session.drive(source(&["a", "b"]), NormalizeOptions::default())).await;

        assert_eq!(events, vec![SessionEvent::Interrupted]);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_cancel_mid_stream_abandons_source() {
        let registry = SessionRegistry::new();
        let session = registry.begin();
        let id = session.id().to_string();

        let (tx, rx) = futures::channel::mpsc::unbounded::<crate::Result<String>>();
        tx.unbounded_send(Ok("first".into())).unwrap();

        let mut events = session.drive(Box::pin(rx), NormalizeOptions::default());
        assert_eq!(
            events.next().await,
            Some(SessionEvent::Fragment("first".into()))
        );

        // The source stays open and silent; cancellation must not wait for it.
        assert!(registry.cancel(&id));
        assert_eq!(events.next().await, Some(SessionEvent::Interrupted));
        assert_eq!(events.next().await, None);

        assert!(!registry.contains(&id));
        assert!(tx.is_closed());
    }

    #[tokio::test]
    async fn test_source_fault_fails_session() {
        let registry = SessionRegistry::new();
        let items: Vec<crate::Result<String>> =
            vec![Ok("partial".into()), Err(anyhow::anyhow!("model crashed"))];

        let events = collect(
            registry
                .begin()
                .drive(Box::pin(stream::iter(items)), NormalizeOptions::default()),
        )
        .await;

        assert_eq!(
            events,
            vec![
                SessionEvent::Fragment("partial".into()),
                SessionEvent::Failed("model crashed".into()),
            ]
        );
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_dropping_stream_removes_session() {
        let registry = SessionRegistry::new();
        let session = registry.begin();
        let id = session.id().to_string();

        let mut events = session.drive(source(&["a", "b", "c"]), NormalizeOptions::default());
        let _ = events.next().await;
        drop(events);

        assert!(!registry.contains(&id));
    }

    #[tokio::test]
    async fn test_dropping_undriven_session_removes_it() {
        let registry = SessionRegistry::new();
        let session = registry.begin();
        let _stream = session;
        drop(_stream);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_sessions_are_independent() {
        let registry = SessionRegistry::new();
        let cancelled = registry.begin();
        let healthy = registry.begin();
        registry.cancel(cancelled.id());

        let cancelled_events =
            collect(cancelled.drive(source(&["x"]), NormalizeOptions::default())).await;
        let healthy_events =
            collect(healthy.drive(source(&["ok"]), NormalizeOptions::default())).await;

        assert_eq!(cancelled_events, vec![SessionEvent::Interrupted]);
        assert_eq!(
            healthy_events.last(),
            Some(&SessionEvent::Completed("ok".into()))
        );
        assert!(registry.is_empty());
    }

    #[test]
    fn test_terminal_events() {
        assert!(!SessionEvent::Fragment("x".into()).is_terminal());
        assert!(SessionEvent::Completed("x".into()).is_terminal());
        assert!(SessionEvent::Interrupted.is_terminal());
        assert!(SessionEvent::Failed("x".into()).is_terminal());
    }

    #[test]
    fn test_state_from_event() {
        assert_eq!(
            SessionState::from(&SessionEvent::Interrupted),
            SessionState::Cancelled
        );
        assert_eq!(SessionState::Completed.to_string(), "completed");
    }
}
