//! Review session registry
//!
//! One session per file name: flagged data, submitted decisions, the waiter
//! the suspended pipeline task listens on, and a per-file notice channel for
//! side-channel subscribers. Locks are never held across an await.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use tokio::sync::{broadcast, oneshot};
use tracing::{debug, info, warn};

use crate::models::{CourseDecision, FlaggedDegree, NoticeStatus, ReviewNotice, ReviewState};

/// Notices buffered per file channel
const NOTICE_CAPACITY: usize = 16;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReviewError {
    #[error("no active review session for {0}")]
    NoSession(String),

    #[error("decisions for {0} are empty")]
    EmptyDecisions(String),

    #[error("decisions for {0} were already submitted")]
    AlreadyResolved(String),

    #[error("a review session for {0} is already open")]
    AlreadyOpen(String),

    #[error("{0} is already being processed")]
    InProgress(String),
}

struct ReviewSession {
    state: ReviewState,
    flagged: Vec<FlaggedDegree>,
    decisions: Option<Vec<CourseDecision>>,
    waiter: Option<oneshot::Sender<Vec<CourseDecision>>>,
    opened_at: DateTime<Utc>,
}

struct NoticeChannel {
    sender: broadcast::Sender<ReviewNotice>,
    last: Option<ReviewNotice>,
}

/// Summary of one open session, for diagnostics
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionInfo {
    pub file_name: String,
    pub state: ReviewState,
    pub opened_at: DateTime<Utc>,
}

#[derive(Default)]
pub struct ReviewRegistry {
    sessions: Mutex<HashMap<String, ReviewSession>>,
    channels: Mutex<HashMap<String, NoticeChannel>>,
    /// File names owned by a running pipeline task
    claimed: Mutex<HashSet<String>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl ReviewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// NONE → PENDING_REVIEW: publish flagged data and notify `ready`
    ///
    /// The returned receiver resolves when decisions are submitted.
    pub fn open(
        &self,
        file_name: &str,
        flagged: Vec<FlaggedDegree>,
    ) -> Result<oneshot::Receiver<Vec<CourseDecision>>, ReviewError> {
        let (tx, rx) = oneshot::channel();
        {
            let mut sessions = lock(&self.sessions);
            if sessions.contains_key(file_name) {
                return Err(ReviewError::AlreadyOpen(file_name.to_string()));
            }
            sessions.insert(
                file_name.to_string(),
                ReviewSession {
                    state: ReviewState::PendingReview,
                    flagged,
                    decisions: None,
                    waiter: Some(tx),
                    opened_at: Utc::now(),
                },
            );
        }

        info!(file_name = %file_name, "Review: session opened, awaiting decisions");
        self.notify(file_name, NoticeStatus::Ready);
        Ok(rx)
    }

    /// NONE → CLOSED without suspending
    pub fn skip(&self, file_name: &str) {
        debug!(file_name = %file_name, "Review: no flagged courses");
        self.notify(file_name, NoticeStatus::NoFlaggedCourses);
    }

    /// Flagged data, available only while the session awaits decisions
    pub fn flagged(&self, file_name: &str) -> Option<Vec<FlaggedDegree>> {
        lock(&self.sessions)
            .get(file_name)
            .filter(|s| s.state == ReviewState::PendingReview)
            .map(|s| s.flagged.clone())
    }

    /// `None` both before a session opens and after it closes
    pub fn state(&self, file_name: &str) -> ReviewState {
        lock(&self.sessions)
            .get(file_name)
            .map(|s| s.state)
            .unwrap_or(ReviewState::None)
    }

    /// PENDING_REVIEW → RESOLVED: hand decisions to the suspended task
    pub fn submit(&self, file_name: &str, decisions: Vec<CourseDecision>) -> Result<usize, ReviewError> {
        let mut sessions = lock(&self.sessions);
        let session = sessions
            .get_mut(file_name)
            .ok_or_else(|| ReviewError::NoSession(file_name.to_string()))?;

        if session.state != ReviewState::PendingReview {
            return Err(ReviewError::AlreadyResolved(file_name.to_string()));
        }
        if decisions.is_empty() {
            return Err(ReviewError::EmptyDecisions(file_name.to_string()));
        }

        let waiter = session
            .waiter
            .take()
            .ok_or_else(|| ReviewError::NoSession(file_name.to_string()))?;

        let count = decisions.len();
        session.decisions = Some(decisions.clone());
        session.state = ReviewState::Resolved;

        if waiter.send(decisions).is_err() {
            // Task gave up (timeout or failure); its guard removes the session
            warn!(file_name = %file_name, "Review: decisions arrived after the task stopped waiting");
            return Err(ReviewError::NoSession(file_name.to_string()));
        }

        info!(file_name = %file_name, decisions = count, "Review: decisions submitted");
        Ok(count)
    }

    /// → CLOSED: drop all per-file state and close the side channel
    fn close(&self, file_name: &str) {
        let removed = lock(&self.sessions).remove(file_name).is_some();
        let channel = lock(&self.channels).remove(file_name);

        if let Some(channel) = channel {
            let _ = channel
                .sender
                .send(ReviewNotice::new(NoticeStatus::IntentionalClosure, file_name));
        }
        if removed {
            debug!(file_name = %file_name, "Review: session closed");
        }
    }

    /// Subscribe to a file's notices; the latest notice is replayed first
    pub fn subscribe(&self, file_name: &str) -> (broadcast::Receiver<ReviewNotice>, Option<ReviewNotice>) {
        let mut channels = lock(&self.channels);
        let channel = channels
            .entry(file_name.to_string())
            .or_insert_with(|| NoticeChannel {
                sender: broadcast::channel(NOTICE_CAPACITY).0,
                last: None,
            });
        (channel.sender.subscribe(), channel.last.clone())
    }

    /// Remove a subscriber-created channel nobody needs any more
    pub fn release(&self, file_name: &str) {
        let session_active = lock(&self.sessions).contains_key(file_name);
        let mut channels = lock(&self.channels);
        let idle = channels
            .get(file_name)
            .map(|c| c.sender.receiver_count() == 0 && c.last.is_none())
            .unwrap_or(false);
        if idle && !session_active {
            channels.remove(file_name);
        }
    }

    fn notify(&self, file_name: &str, status: NoticeStatus) {
        let notice = ReviewNotice::new(status, file_name);
        let mut channels = lock(&self.channels);
        let channel = channels
            .entry(file_name.to_string())
            .or_insert_with(|| NoticeChannel {
                sender: broadcast::channel(NOTICE_CAPACITY).0,
                last: None,
            });
        channel.last = Some(notice.clone());
        let _ = channel.sender.send(notice);
    }

    /// Number of sessions waiting on a reviewer
    pub fn pending_count(&self) -> usize {
        lock(&self.sessions)
            .values()
            .filter(|s| s.state == ReviewState::PendingReview)
            .count()
    }

    /// Open sessions, oldest first
    pub fn sessions(&self) -> Vec<SessionInfo> {
        let mut sessions: Vec<SessionInfo> = lock(&self.sessions)
            .iter()
            .map(|(name, s)| SessionInfo {
                file_name: name.clone(),
                state: s.state,
                opened_at: s.opened_at,
            })
            .collect();
        sessions.sort_by_key(|s| s.opened_at);
        sessions
    }

    /// Decisions recorded for a resolved session
    pub fn decisions(&self, file_name: &str) -> Option<Vec<CourseDecision>> {
        lock(&self.sessions)
            .get(file_name)
            .and_then(|s| s.decisions.clone())
    }

    /// Whether any per-file state (claim, session or channel) remains
    pub fn is_tracked(&self, file_name: &str) -> bool {
        lock(&self.claimed).contains(file_name)
            || lock(&self.sessions).contains_key(file_name)
            || lock(&self.channels).contains_key(file_name)
    }

    /// Take ownership of `file_name` for one pipeline run
    ///
    /// Only one run may own a name at a time. The returned guard closes the
    /// file's review state and gives the name back when dropped.
    pub fn claim(self: &Arc<Self>, file_name: &str) -> Result<ReviewGuard, ReviewError> {
        if !lock(&self.claimed).insert(file_name.to_string()) {
            warn!(file_name = %file_name, "Review: file name already owned by another run");
            return Err(ReviewError::InProgress(file_name.to_string()));
        }
        Ok(ReviewGuard {
            registry: Arc::clone(self),
            file_name: file_name.to_string(),
        })
    }
}

/// Closes a claimed file's review state on every exit path
pub struct ReviewGuard {
    registry: Arc<ReviewRegistry>,
    file_name: String,
}

impl Drop for ReviewGuard {
    fn drop(&mut self) {
        self.registry.close(&self.file_name);
        lock(&self.registry.claimed).remove(&self.file_name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decision() -> CourseDecision {
        CourseDecision {
            degree: "BS".into(),
            major: "Biology".into(),
            course_name: "Genetics".into(),
            credits_earned: Some(3.0),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_open_submit_resumes_waiter() {
        let registry = ReviewRegistry::new();
        let (mut notices, _) = registry.subscribe("a.pdf");

        let rx = registry.open("a.pdf", Vec::new()).unwrap();
        assert_eq!(notices.recv().await.unwrap().status, NoticeStatus::Ready);
        assert_eq!(registry.state("a.pdf"), ReviewState::PendingReview);
        assert_eq!(registry.pending_count(), 1);
        assert!(registry.flagged("a.pdf").is_some());

        assert_eq!(registry.submit("a.pdf", vec![decision()]), Ok(1));
        let received = rx.await.unwrap();
        assert_eq!(received, vec![decision()]);
        assert_eq!(registry.state("a.pdf"), ReviewState::Resolved);
        assert!(registry.flagged("a.pdf").is_none());
        assert_eq!(registry.decisions("a.pdf"), Some(vec![decision()]));
    }

    #[test]
    fn test_submit_rejections() {
        let registry = ReviewRegistry::new();
        assert_eq!(
            registry.submit("nobody.pdf", vec![decision()]),
            Err(ReviewError::NoSession("nobody.pdf".into()))
        );

        let _rx = registry.open("a.pdf", Vec::new()).unwrap();
        assert_eq!(
            registry.submit("a.pdf", Vec::new()),
            Err(ReviewError::EmptyDecisions("a.pdf".into()))
        );
        assert_eq!(registry.submit("a.pdf", vec![decision()]), Ok(1));
        assert_eq!(
            registry.submit("a.pdf", vec![decision()]),
            Err(ReviewError::AlreadyResolved("a.pdf".into()))
        );
    }

    #[test]
    fn test_duplicate_open_is_rejected() {
        let registry = ReviewRegistry::new();
        let _rx = registry.open("a.pdf", Vec::new()).unwrap();
        assert!(matches!(
            registry.open("a.pdf", Vec::new()),
            Err(ReviewError::AlreadyOpen(_))
        ));
    }

    #[tokio::test]
    async fn test_guard_cleans_up_and_closes_channel() {
        let registry = Arc::new(ReviewRegistry::new());
        let (mut notices, _) = registry.subscribe("a.pdf");
        {
            let _guard = registry.claim("a.pdf").unwrap();
            let _rx = registry.open("a.pdf", Vec::new()).unwrap();
        }

        assert_eq!(notices.recv().await.unwrap().status, NoticeStatus::Ready);
        assert_eq!(
            notices.recv().await.unwrap().status,
            NoticeStatus::IntentionalClosure
        );
        assert!(notices.recv().await.is_err());
        assert!(!registry.is_tracked("a.pdf"));
        assert_eq!(registry.state("a.pdf"), ReviewState::None);
    }

    #[tokio::test]
    async fn test_second_claim_leaves_pending_session_alone() {
        let registry = Arc::new(ReviewRegistry::new());
        let _owner = registry.claim("jane.pdf").unwrap();
        let rx = registry.open("jane.pdf", Vec::new()).unwrap();

        assert!(matches!(
            registry.claim("jane.pdf"),
            Err(ReviewError::InProgress(_))
        ));

        assert_eq!(registry.state("jane.pdf"), ReviewState::PendingReview);
        assert_eq!(registry.submit("jane.pdf", vec![decision()]), Ok(1));
        assert_eq!(rx.await.unwrap(), vec![decision()]);
    }

    #[test]
    fn test_claim_is_released_with_guard() {
        let registry = Arc::new(ReviewRegistry::new());
        drop(registry.claim("a.pdf").unwrap());
        assert!(!registry.is_tracked("a.pdf"));
        assert!(registry.claim("a.pdf").is_ok());
    }

    #[test]
    fn test_late_subscriber_gets_last_notice() {
        let registry = ReviewRegistry::new();
        registry.skip("b.csv");

        let (_rx, last) = registry.subscribe("b.csv");
        assert_eq!(last.unwrap().status, NoticeStatus::NoFlaggedCourses);
    }

    #[test]
    fn test_submit_after_waiter_dropped() {
        let registry = ReviewRegistry::new();
        let rx = registry.open("a.pdf", Vec::new()).unwrap();
        drop(rx);
        assert!(matches!(
            registry.submit("a.pdf", vec![decision()]),
            Err(ReviewError::NoSession(_))
        ));
    }

    #[test]
    fn test_release_prunes_idle_subscriber_channel() {
        let registry = ReviewRegistry::new();
        let (rx, _) = registry.subscribe("c.pdf");
        drop(rx);
        registry.release("c.pdf");
        assert!(!registry.is_tracked("c.pdf"));
    }
}
