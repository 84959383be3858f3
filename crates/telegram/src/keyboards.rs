use crate::types::{
    InlineKeyboardButton, InlineKeyboardMarkup, KeyboardButton, ReplyKeyboardMarkup,
    ReplyKeyboardRemove, ReplyMarkup,
};

pub fn button(text: impl Into<String>, callback_data: impl Into<String>) -> InlineKeyboardButton {
    InlineKeyboardButton { text: text.into(), callback_data: callback_data.into() }
}

/// One button per row.
pub fn inline_column(buttons: Vec<InlineKeyboardButton>) -> ReplyMarkup {
    ReplyMarkup::Inline(InlineKeyboardMarkup {
        inline_keyboard: buttons.into_iter().map(|button| vec![button]).collect(),
    })
}

pub fn inline_row(buttons: Vec<InlineKeyboardButton>) -> ReplyMarkup {
    ReplyMarkup::Inline(InlineKeyboardMarkup { inline_keyboard: vec![buttons] })
}

/// Reply keyboard with a single button that shares the user's phone number.
pub fn contact_request(label: impl Into<String>) -> ReplyMarkup {
    ReplyMarkup::Reply(ReplyKeyboardMarkup {
        keyboard: vec![vec![KeyboardButton { text: label.into(), request_contact: true }]],
        resize_keyboard: true,
        one_time_keyboard: true,
    })
}

pub fn remove() -> ReplyMarkup {
    ReplyMarkup::Remove(ReplyKeyboardRemove { remove_keyboard: true })
}
