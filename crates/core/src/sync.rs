//! At-most-once push of accumulated chat data into the CRM.
//!
//! A chat moves `Idle -> ReadyToSync -> Synced`. [`SyncCoordinator::try_sync`]
//! is called after every conversation event that touches the phone or the
//! selected course and is a no-op until both phone and city are known. A
//! failed attempt leaves the chat in `ReadyToSync` so the next event retries
//! from scratch.
//!
//! Locks on the session map and on the synced-chat set are only held for the
//! in-memory read or write, never across the CRM round trip. Two triggers for
//! the same chat that race past the synced check before either completes can
//! therefore both reach the CRM.

use std::collections::HashSet;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::domain::lead::{ChatId, DealRef, LeadSession};
use crate::errors::{CrmError, SyncError};
use crate::phone;
use crate::session::SessionStore;

pub const DEFAULT_SYNC_TIMEOUT: Duration = Duration::from_secs(15);
pub const DEFAULT_CONTACT_NAME: &str = "Пользователь Telegram";
pub const UNSPECIFIED_COURSE: &str = "не указан";

#[async_trait]
pub trait CrmGateway: Send + Sync {
    /// Finds or creates the contact for `phone`, then creates a deal item linked to it.
    async fn sync_deal(
        &self,
        phone: &str,
        contact_name: &str,
        course_title: &str,
    ) -> Result<DealRef, CrmError>;
}

#[async_trait]
pub trait ChatNotifier: Send + Sync {
    async fn notify(&self, chat_id: ChatId, text: &str);
}

type GatewayFactory = Box<dyn Fn() -> Result<Arc<dyn CrmGateway>, CrmError> + Send + Sync>;

/// Builds the CRM gateway on first use and caches the result, including a failure.
pub struct LazyGateway {
    factory: GatewayFactory,
    cell: OnceLock<Result<Arc<dyn CrmGateway>, CrmError>>,
}

impl LazyGateway {
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn() -> Result<Arc<dyn CrmGateway>, CrmError> + Send + Sync + 'static,
    {
        Self { factory: Box::new(factory), cell: OnceLock::new() }
    }

    pub fn ready(gateway: Arc<dyn CrmGateway>) -> Self {
        Self::new(move || Ok(gateway.clone()))
    }

    pub fn get(&self) -> Result<Arc<dyn CrmGateway>, CrmError> {
        self.cell.get_or_init(|| (self.factory)()).clone()
    }
}

/// Chats whose lead already reached the CRM. Entries are never removed.
#[derive(Debug, Default)]
pub struct SyncFlags {
    synced: Mutex<HashSet<ChatId>>,
}

impl SyncFlags {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn is_synced(&self, chat_id: ChatId) -> bool {
        self.synced.lock().await.contains(&chat_id)
    }

    pub async fn mark_synced(&self, chat_id: ChatId) -> bool {
        self.synced.lock().await.insert(chat_id)
    }

    pub async fn count(&self) -> usize {
        self.synced.lock().await.len()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncState {
    Idle,
    ReadyToSync,
    Synced,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SyncOutcome {
    AlreadySynced,
    NotReady,
    Synced(DealRef),
    Failed(SyncError),
}

pub struct SyncCoordinator {
    sessions: Arc<SessionStore>,
    flags: Arc<SyncFlags>,
    gateway: LazyGateway,
    notifier: Arc<dyn ChatNotifier>,
    sync_timeout: Duration,
}

impl SyncCoordinator {
    pub fn new(
        sessions: Arc<SessionStore>,
        flags: Arc<SyncFlags>,
        gateway: LazyGateway,
        notifier: Arc<dyn ChatNotifier>,
    ) -> Self {
        Self { sessions, flags, gateway, notifier, sync_timeout: DEFAULT_SYNC_TIMEOUT }
    }

    pub fn with_sync_timeout(mut self, sync_timeout: Duration) -> Self {
        self.sync_timeout = sync_timeout;
        self
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    pub async fn state(&self, chat_id: ChatId) -> SyncState {
        if self.flags.is_synced(chat_id).await {
            return SyncState::Synced;
        }
        match self.sessions.snapshot(chat_id).await {
            Some(session) if session.is_ready() => SyncState::ReadyToSync,
            _ => SyncState::Idle,
        }
    }

    pub async fn try_sync(&self, chat_id: ChatId) -> SyncOutcome {
        if self.flags.is_synced(chat_id).await {
            return SyncOutcome::AlreadySynced;
        }

        let Some(session) = self.sessions.snapshot(chat_id).await else {
            return SyncOutcome::NotReady;
        };
        if !session.is_ready() {
            return SyncOutcome::NotReady;
        }

        let formatted_phone = match phone::normalize(session.phone.trim()) {
            Ok(formatted) => formatted,
            Err(phone_error) => {
                warn!(
                    event_name = "crm.sync.phone_rejected",
                    chat_id = %chat_id,
                    phone = %session.phone,
                    error = %phone_error,
                    "phone normalization failed"
                );
                return self.fail(chat_id, SyncError::from(phone_error)).await;
            }
        };

        let gateway = match self.gateway.get() {
            Ok(gateway) => gateway,
            Err(init_error) => {
                error!(
                    event_name = "crm.sync.init_failed",
                    chat_id = %chat_id,
                    error = %init_error,
                    "crm client unavailable"
                );
                return self.fail(chat_id, SyncError::from(init_error)).await;
            }
        };

        let contact_name = contact_name(&session);
        let title = course_title(&session.speaker_name, &session.city);

        let attempt = tokio::time::timeout(
            self.sync_timeout,
            gateway.sync_deal(&formatted_phone, &contact_name, &title),
        )
        .await
        .unwrap_or(Err(CrmError::Timeout { secs: self.sync_timeout.as_secs() }));

        match attempt {
            Ok(deal) => {
                self.flags.mark_synced(chat_id).await;
                info!(
                    event_name = "crm.sync.completed",
                    chat_id = %chat_id,
                    contact_id = %deal.contact_id,
                    item_id = %deal.item_id,
                    "synced contact and item"
                );
                SyncOutcome::Synced(deal)
            }
            Err(crm_error) => {
                error!(
                    event_name = "crm.sync.failed",
                    chat_id = %chat_id,
                    error = %crm_error,
                    contract_violation = crm_error.is_contract_violation(),
                    "crm sync failed"
                );
                self.fail(chat_id, SyncError::from(crm_error)).await
            }
        }
    }

    async fn fail(&self, chat_id: ChatId, error: SyncError) -> SyncOutcome {
        self.notifier.notify(chat_id, error.user_message()).await;
        SyncOutcome::Failed(error)
    }
}

fn contact_name(session: &LeadSession) -> String {
    let name = session.contact_name.trim();
    if name.is_empty() {
        DEFAULT_CONTACT_NAME.to_owned()
    } else {
        name.to_owned()
    }
}

pub fn course_title(speaker_name: &str, city: &str) -> String {
    let speaker = speaker_name.trim();
    let city = city.trim();
    match (speaker.is_empty(), city.is_empty()) {
        (false, false) => format!("{speaker} - {city}"),
        (true, false) => city.to_owned(),
        (false, true) => speaker.to_owned(),
        (true, true) => UNSPECIFIED_COURSE.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::sync::Mutex;

    use super::{
        course_title, ChatNotifier, CrmGateway, LazyGateway, SyncCoordinator, SyncFlags,
        SyncOutcome, SyncState, DEFAULT_CONTACT_NAME, UNSPECIFIED_COURSE,
    };
    use crate::domain::lead::{ChatId, DealRef};
    use crate::errors::{
        CrmError, SyncError, CRM_UNAVAILABLE_MESSAGE, PHONE_FORMAT_MESSAGE, SYNC_FAILED_MESSAGE,
    };
    use crate::session::SessionStore;

    #[derive(Default)]
    struct ScriptedGateway {
        results: Mutex<VecDeque<Result<DealRef, CrmError>>>,
        calls: Mutex<Vec<(String, String, String)>>,
        delay: Option<Duration>,
    }

    impl ScriptedGateway {
        fn with_results(results: Vec<Result<DealRef, CrmError>>) -> Self {
            Self { results: Mutex::new(results.into()), ..Self::default() }
        }

        async fn calls(&self) -> Vec<(String, String, String)> {
            self.calls.lock().await.clone()
        }
    }

    #[async_trait]
    impl CrmGateway for ScriptedGateway {
        async fn sync_deal(
            &self,
            phone: &str,
            contact_name: &str,
            course_title: &str,
        ) -> Result<DealRef, CrmError> {
            self.calls.lock().await.push((
                phone.to_owned(),
                contact_name.to_owned(),
                course_title.to_owned(),
            ));
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.results.lock().await.pop_front().unwrap_or_else(|| Ok(deal("1", "1")))
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        messages: Mutex<Vec<(ChatId, String)>>,
    }

    impl RecordingNotifier {
        async fn messages(&self) -> Vec<(ChatId, String)> {
            self.messages.lock().await.clone()
        }
    }

    #[async_trait]
    impl ChatNotifier for RecordingNotifier {
        async fn notify(&self, chat_id: ChatId, text: &str) {
            self.messages.lock().await.push((chat_id, text.to_owned()));
        }
    }

    fn deal(contact_id: &str, item_id: &str) -> DealRef {
        DealRef { contact_id: contact_id.to_owned(), item_id: item_id.to_owned() }
    }

    fn coordinator(
        gateway: Arc<ScriptedGateway>,
        notifier: Arc<RecordingNotifier>,
    ) -> SyncCoordinator {
        SyncCoordinator::new(
            Arc::new(SessionStore::new()),
            Arc::new(SyncFlags::new()),
            LazyGateway::ready(gateway),
            notifier,
        )
    }

    const CHAT: ChatId = ChatId(42);

    #[tokio::test]
    async fn repeated_triggers_before_readiness_never_reach_crm() {
        let gateway = Arc::new(ScriptedGateway::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let coordinator = coordinator(gateway.clone(), notifier.clone());

        assert_eq!(coordinator.try_sync(CHAT).await, SyncOutcome::NotReady);
        coordinator.sessions().record_course(CHAT, "Alex", "").await;
        assert_eq!(coordinator.try_sync(CHAT).await, SyncOutcome::NotReady);
        coordinator.sessions().record_contact(CHAT, "89991234567", "Anna").await;
        assert_eq!(coordinator.try_sync(CHAT).await, SyncOutcome::NotReady);
        assert_eq!(coordinator.state(CHAT).await, SyncState::Idle);

        assert!(gateway.calls().await.is_empty());
        assert!(notifier.messages().await.is_empty());
    }

    #[tokio::test]
    async fn ready_session_syncs_with_normalized_phone_and_title() {
        let gateway = Arc::new(ScriptedGateway::with_results(vec![Ok(deal("17", "301"))]));
        let notifier = Arc::new(RecordingNotifier::default());
        let coordinator = coordinator(gateway.clone(), notifier.clone());

        coordinator.sessions().record_contact(CHAT, "89991234567nobody", "").await;
        coordinator.sessions().record_course(CHAT, "Alex", "Moscow").await;
        assert_eq!(coordinator.state(CHAT).await, SyncState::ReadyToSync);

        let outcome = coordinator.try_sync(CHAT).await;

        assert_eq!(outcome, SyncOutcome::Synced(deal("17", "301")));
        assert_eq!(coordinator.state(CHAT).await, SyncState::Synced);
        assert_eq!(
            gateway.calls().await,
            vec![(
                "+79991234567".to_owned(),
                DEFAULT_CONTACT_NAME.to_owned(),
                "Alex - Moscow".to_owned()
            )]
        );
        assert!(notifier.messages().await.is_empty());
    }

    #[tokio::test]
    async fn synced_chat_short_circuits_later_triggers() {
        let gateway = Arc::new(ScriptedGateway::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let coordinator = coordinator(gateway.clone(), notifier);

        coordinator.sessions().record_contact(CHAT, "9991234567", "Anna").await;
        coordinator.sessions().record_course(CHAT, "Alex", "Moscow").await;
        assert!(matches!(coordinator.try_sync(CHAT).await, SyncOutcome::Synced(_)));

        coordinator.sessions().record_course(CHAT, "Boris", "Kazan").await;
        for _ in 0..3 {
            assert_eq!(coordinator.try_sync(CHAT).await, SyncOutcome::AlreadySynced);
        }
        assert_eq!(gateway.calls().await.len(), 1);
    }

    #[tokio::test]
    async fn failed_sync_notifies_generic_message_and_allows_retry() {
        let gateway = Arc::new(ScriptedGateway::with_results(vec![
            Err(CrmError::Http { status: 500, body: "internal".to_owned() }),
            Ok(deal("5", "6")),
        ]));
        let notifier = Arc::new(RecordingNotifier::default());
        let coordinator = coordinator(gateway.clone(), notifier.clone());

        coordinator.sessions().record_contact(CHAT, "89991234567", "Anna").await;
        coordinator.sessions().record_course(CHAT, "Alex", "Moscow").await;

        let first = coordinator.try_sync(CHAT).await;
        assert!(matches!(
            first,
            SyncOutcome::Failed(SyncError::Crm(CrmError::Http { status: 500, .. }))
        ));
        assert_eq!(coordinator.state(CHAT).await, SyncState::ReadyToSync);
        assert_eq!(notifier.messages().await, vec![(CHAT, SYNC_FAILED_MESSAGE.to_owned())]);

        let second = coordinator.try_sync(CHAT).await;
        assert_eq!(second, SyncOutcome::Synced(deal("5", "6")));
        assert_eq!(gateway.calls().await.len(), 2);
    }

    #[tokio::test]
    async fn unparseable_phone_is_reported_without_crm_call() {
        let gateway = Arc::new(ScriptedGateway::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let coordinator = coordinator(gateway.clone(), notifier.clone());

        coordinator.sessions().record_contact(CHAT, "12-34", "Anna").await;
        coordinator.sessions().record_course(CHAT, "Alex", "Moscow").await;

        let outcome = coordinator.try_sync(CHAT).await;

        assert!(matches!(outcome, SyncOutcome::Failed(SyncError::PhoneFormatInvalid(_))));
        assert!(gateway.calls().await.is_empty());
        assert_eq!(notifier.messages().await, vec![(CHAT, PHONE_FORMAT_MESSAGE.to_owned())]);
        let session = coordinator.sessions().snapshot(CHAT).await.expect("session should exist");
        assert_eq!(session.phone, "12-34");
    }

    #[tokio::test]
    async fn gateway_init_failure_is_cached_and_never_retried() {
        let factory_calls = Arc::new(AtomicUsize::new(0));
        let counter = factory_calls.clone();
        let notifier = Arc::new(RecordingNotifier::default());
        let coordinator = SyncCoordinator::new(
            Arc::new(SessionStore::new()),
            Arc::new(SyncFlags::new()),
            LazyGateway::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(CrmError::ConfigMissing)
            }),
            notifier.clone(),
        );

        coordinator.sessions().record_contact(CHAT, "89991234567", "Anna").await;
        coordinator.sessions().record_course(CHAT, "Alex", "Moscow").await;

        for _ in 0..3 {
            let outcome = coordinator.try_sync(CHAT).await;
            assert_eq!(outcome, SyncOutcome::Failed(SyncError::Crm(CrmError::ConfigMissing)));
        }

        assert_eq!(factory_calls.load(Ordering::SeqCst), 1);
        let messages = notifier.messages().await;
        assert_eq!(messages.len(), 3);
        assert!(messages.iter().all(|(_, text)| text == CRM_UNAVAILABLE_MESSAGE));
    }

    #[tokio::test]
    async fn slow_crm_round_trip_times_out_and_stays_retryable() {
        let gateway = Arc::new(ScriptedGateway {
            delay: Some(Duration::from_millis(200)),
            ..ScriptedGateway::default()
        });
        let notifier = Arc::new(RecordingNotifier::default());
        let coordinator = coordinator(gateway, notifier.clone())
            .with_sync_timeout(Duration::from_millis(10));

        coordinator.sessions().record_contact(CHAT, "89991234567", "Anna").await;
        coordinator.sessions().record_course(CHAT, "Alex", "Moscow").await;

        let outcome = coordinator.try_sync(CHAT).await;

        assert!(matches!(outcome, SyncOutcome::Failed(SyncError::Crm(CrmError::Timeout { .. }))));
        assert_eq!(coordinator.state(CHAT).await, SyncState::ReadyToSync);
        assert_eq!(notifier.messages().await, vec![(CHAT, SYNC_FAILED_MESSAGE.to_owned())]);
    }

    #[tokio::test]
    async fn chats_are_tracked_independently() {
        let gateway = Arc::new(ScriptedGateway::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let coordinator = coordinator(gateway.clone(), notifier);

        for chat in [ChatId(1), ChatId(2)] {
            coordinator.sessions().record_contact(chat, "89991234567", "").await;
            coordinator.sessions().record_course(chat, "Alex", "Moscow").await;
        }

        assert!(matches!(coordinator.try_sync(ChatId(1)).await, SyncOutcome::Synced(_)));
        assert_eq!(coordinator.state(ChatId(2)).await, SyncState::ReadyToSync);
        assert!(matches!(coordinator.try_sync(ChatId(2)).await, SyncOutcome::Synced(_)));
        assert_eq!(gateway.calls().await.len(), 2);
    }

    #[test]
    fn course_title_falls_back_to_available_parts() {
        assert_eq!(course_title(" Alex ", "Moscow"), "Alex - Moscow");
        assert_eq!(course_title("", "Moscow"), "Moscow");
        assert_eq!(course_title("Alex", "  "), "Alex");
        assert_eq!(course_title("", ""), UNSPECIFIED_COURSE);
    }
}
