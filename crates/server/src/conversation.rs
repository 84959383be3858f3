//! Chat flow: greeting, speaker and course selection, booking and contact sharing.
//!
//! Every step that records a phone number or a course city ends with a sync
//! attempt, so the lead reaches the CRM as soon as both are known, in
//! whichever order the user provides them. The attempt runs even when a reply
//! to the user could not be delivered; the send error is returned afterwards.

use std::sync::Arc;

use async_trait::async_trait;
use leadbot_core::domain::catalog::{Catalog, Course};
use leadbot_core::domain::lead::ChatId;
use leadbot_core::domain::profile::ProfileUpdate;
use leadbot_core::sync::{SyncCoordinator, SyncOutcome};
use leadbot_db::repositories::ProfileRepository;
use leadbot_telegram::events::{EventHandler, EventHandlerError, TelegramEvent};
use leadbot_telegram::keyboards;
use leadbot_telegram::types::{Contact, ReplyMarkup, SendMessage, User};
use leadbot_telegram::Messenger;
use tracing::{debug, warn};

pub const GREETING: &str =
    "Привет! 👋 Я помогу тебе найти информацию о наших курсах. Давай начнем!";
pub const CONTACT_THANKS: &str = "💇‍♀️ Спасибо, ждем вас на мастер-классе! 💇🏻";
pub const CITY_PROMPT: &str = "В каком городе и когда ты хочешь пройти обучение?";
pub const PROGRAM_HEADER: &str = "Вот полная программа курса 👇";
pub const ACTION_PROMPT: &str = "Выберите действие:";
pub const BOOKING_INSTRUCTIONS: &str = "Чтобы оставить заявку, нажмите кнопку ниже и поделитесь \
     номером телефона. Мы свяжемся с вами и подтвердим бронь.";
pub const BOOK_BUTTON: &str = "📝 Оставить заявку";
pub const SHARE_CONTACT_BUTTON: &str = "📱 Поделиться номером 📱";

const SPEAKER_PREFIX: &str = "speaker_";
const COURSE_PREFIX: &str = "course_";
const BOOK_COURSE: &str = "book_course";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallbackAction {
    Speaker(usize),
    Course(usize, usize),
    Book,
}

impl CallbackAction {
    pub fn parse(data: &str) -> Option<Self> {
        if data == BOOK_COURSE {
            return Some(Self::Book);
        }
        if let Some(index) = data.strip_prefix(SPEAKER_PREFIX) {
            return index.parse().ok().map(Self::Speaker);
        }
        let (speaker, course) = data.strip_prefix(COURSE_PREFIX)?.split_once('_')?;
        Some(Self::Course(speaker.parse().ok()?, course.parse().ok()?))
    }

    pub fn callback_data(&self) -> String {
        match self {
            Self::Speaker(index) => format!("{SPEAKER_PREFIX}{index}"),
            Self::Course(speaker, course) => format!("{COURSE_PREFIX}{speaker}_{course}"),
            Self::Book => BOOK_COURSE.to_string(),
        }
    }
}

pub struct Conversation {
    catalog: Catalog,
    messenger: Arc<dyn Messenger>,
    profiles: Arc<dyn ProfileRepository>,
    coordinator: Arc<SyncCoordinator>,
}

impl Conversation {
    pub fn new(
        catalog: Catalog,
        messenger: Arc<dyn Messenger>,
        profiles: Arc<dyn ProfileRepository>,
        coordinator: Arc<SyncCoordinator>,
    ) -> Self {
        Self { catalog, messenger, profiles, coordinator }
    }

    async fn on_text(&self, chat_id: ChatId, from: Option<User>) -> Result<(), EventHandlerError> {
        let full_name = from.as_ref().map(User::display_name).unwrap_or_default();
        self.save_profile(chat_id, ProfileUpdate { full_name, ..ProfileUpdate::default() }).await;

        self.send(chat_id, GREETING, Some(self.speaker_keyboard())).await
    }

    async fn on_contact(
        &self,
        chat_id: ChatId,
        from: Option<User>,
        contact: Contact,
    ) -> Result<(), EventHandlerError> {
        let full_name = match from {
            Some(user) => user.display_name(),
            None => User {
                first_name: contact.first_name.clone(),
                last_name: contact.last_name.clone(),
                ..User::default()
            }
            .display_name(),
        };
        let phone = contact.phone_number;

        self.save_profile(chat_id, ProfileUpdate::contact(phone.clone(), full_name.clone())).await;
        self.coordinator.sessions().record_contact(chat_id, &phone, &full_name).await;

        let sent = self.send(chat_id, CONTACT_THANKS, Some(keyboards::remove())).await;
        self.sync(chat_id).await;
        sent
    }

    async fn on_callback(
        &self,
        chat_id: ChatId,
        from: &User,
        data: &str,
    ) -> Result<(), EventHandlerError> {
        let Some(action) = CallbackAction::parse(data) else {
            debug!(
                event_name = "conversation.callback.unknown",
                chat_id = %chat_id,
                data,
                "ignoring callback"
            );
            return Ok(());
        };

        match action {
            CallbackAction::Speaker(speaker_index) => {
                let Some(speaker) = self.catalog.speaker(speaker_index) else {
                    return self.ignore_out_of_range(chat_id, data);
                };

                let update = ProfileUpdate {
                    full_name: from.display_name(),
                    ..ProfileUpdate::speaker(speaker.name.clone())
                };
                self.save_profile(chat_id, update).await;
                self.coordinator.sessions().record_course(chat_id, &speaker.name, "").await;

                let markup = self.course_keyboard(speaker_index);
                self.send(chat_id, CITY_PROMPT, Some(markup)).await
            }
            CallbackAction::Course(speaker_index, course_index) => {
                let Some((speaker, course)) = self.catalog.course(speaker_index, course_index)
                else {
                    return self.ignore_out_of_range(chat_id, data);
                };

                let update = ProfileUpdate {
                    full_name: from.display_name(),
                    ..ProfileUpdate::course(speaker.name.clone(), course.city.clone())
                };
                self.save_profile(chat_id, update).await;
                let sessions = self.coordinator.sessions();
                sessions.record_course(chat_id, &speaker.name, &course.city).await;

                let sent = self.send_program(chat_id, course).await;
                self.sync(chat_id).await;
                sent
            }
            CallbackAction::Book => {
                let markup = keyboards::contact_request(SHARE_CONTACT_BUTTON);
                self.send(chat_id, BOOKING_INSTRUCTIONS, Some(markup)).await
            }
        }
    }

    async fn send_program(
        &self,
        chat_id: ChatId,
        course: &Course,
    ) -> Result<(), EventHandlerError> {
        self.send(chat_id, PROGRAM_HEADER, None).await?;
        if !course.program.trim().is_empty() {
            self.send(chat_id, &course.program, None).await?;
        }
        let markup = keyboards::inline_row(vec![keyboards::button(BOOK_BUTTON, BOOK_COURSE)]);
        self.send(chat_id, ACTION_PROMPT, Some(markup)).await
    }

    fn ignore_out_of_range(&self, chat_id: ChatId, data: &str) -> Result<(), EventHandlerError> {
        warn!(
            event_name = "conversation.callback.out_of_range",
            chat_id = %chat_id,
            data,
            "callback points outside the catalog"
        );
        Ok(())
    }

    fn speaker_keyboard(&self) -> ReplyMarkup {
        let buttons = self
            .catalog
            .speakers()
            .iter()
            .enumerate()
            .map(|(index, speaker)| {
                keyboards::button(
                    format!("🎓 {} ✂️", speaker.name),
                    CallbackAction::Speaker(index).callback_data(),
                )
            })
            .collect();
        keyboards::inline_column(buttons)
    }

    fn course_keyboard(&self, speaker_index: usize) -> ReplyMarkup {
        let courses = self
            .catalog
            .speaker(speaker_index)
            .map(|speaker| speaker.courses.as_slice())
            .unwrap_or_default();
        let buttons = courses
            .iter()
            .enumerate()
            .map(|(index, course)| {
                keyboards::button(
                    course_label(course),
                    CallbackAction::Course(speaker_index, index).callback_data(),
                )
            })
            .collect();
        keyboards::inline_column(buttons)
    }

    async fn send(
        &self,
        chat_id: ChatId,
        text: &str,
        markup: Option<ReplyMarkup>,
    ) -> Result<(), EventHandlerError> {
        let mut message = SendMessage::new(chat_id.0, text);
        message.reply_markup = markup;
        self.messenger.send(message).await?;
        Ok(())
    }

    async fn save_profile(&self, chat_id: ChatId, update: ProfileUpdate) {
        if let Err(error) = self.profiles.upsert(chat_id, update).await {
            warn!(
                event_name = "conversation.profile.save_failed",
                chat_id = %chat_id,
                error = %error,
                "failed to save chat profile"
            );
        }
    }

    async fn sync(&self, chat_id: ChatId) {
        let outcome = self.coordinator.try_sync(chat_id).await;
        if !matches!(outcome, SyncOutcome::Synced(_)) {
            debug!(
                event_name = "conversation.sync.skipped",
                chat_id = %chat_id,
                outcome = ?outcome,
                "lead not pushed on this step"
            );
        }
    }
}

#[async_trait]
impl EventHandler for Conversation {
    async fn handle(&self, event: TelegramEvent) -> Result<(), EventHandlerError> {
        match event {
            TelegramEvent::Text { chat_id, from, .. } => self.on_text(chat_id, from).await,
            TelegramEvent::ContactShared { chat_id, from, contact } => {
                self.on_contact(chat_id, from, contact).await
            }
            TelegramEvent::Callback { query_id, chat_id, from, data } => {
                let result = self.on_callback(chat_id, &from, &data).await;
                if let Err(error) = self.messenger.answer_callback(&query_id).await {
                    warn!(
                        event_name = "conversation.callback.answer_failed",
                        chat_id = %chat_id,
                        error = %error,
                        "failed to answer callback query"
                    );
                }
                result
            }
            TelegramEvent::Unsupported { .. } => Ok(()),
        }
    }
}

fn course_label(course: &Course) -> String {
    let date = course.date.trim();
    if date.is_empty() {
        course.city.clone()
    } else {
        format!("{} · {date}", course.city)
    }
}
