//! Telegram Bot API transport for the lead bot.
//!
//! - **Wire types** (`types`) - the subset of updates and requests the bot uses
//! - **Keyboards** (`keyboards`) - inline and reply keyboard builders
//! - **Events** (`events`) - updates classified into conversation events
//! - **Bot API client** (`api`) - `getUpdates`, `sendMessage`, `answerCallbackQuery`
//! - **Long polling** (`polling`) - update loop with reconnect backoff
//!
//! ```text
//! getUpdates → PollingRunner → TelegramEvent → EventHandler (one task per update)
//!                                                  ↓
//!                                         BotApi::send_message
//! ```

pub mod api;
pub mod events;
pub mod keyboards;
pub mod polling;
pub mod types;

pub use api::{BotApi, BotApiError, Messenger};
pub use events::{EventHandler, EventHandlerError, TelegramEvent};
pub use polling::{PollingRunner, ReconnectPolicy, TransportError, UpdateSource};
