//! Request bodies and response decoding for the Bitrix24 REST methods in use.

use leadbot_core::errors::CrmError;
use serde_json::{json, Value};

use crate::client::CrmSettings;

pub const CONTACT_LIST: &str = "crm.contact.list";
pub const CONTACT_ADD: &str = "crm.contact.add";
pub const ITEM_ADD: &str = "crm.item.add";

const ITEM_TITLE_PREFIX: &str = "Telegram";

pub fn contact_list_request(phone: &str) -> Value {
    json!({
        "filter": { "PHONE": phone },
        "select": ["ID", "NAME", "LAST_NAME", "PHONE"],
    })
}

pub fn contact_add_request(phone: &str, name: &str, settings: &CrmSettings) -> Value {
    json!({
        "fields": {
            "NAME": name,
            "OPENED": "Y",
            "SOURCE_ID": settings.source_id,
            "SOURCE_DESCRIPTION": settings.source_description,
            "ASSIGNED_BY_ID": settings.assigned_by_id,
            "PHONE": [{ "VALUE": phone, "VALUE_TYPE": "WORK" }],
        }
    })
}

pub fn item_add_request(contact_id: i64, course_title: &str, settings: &CrmSettings) -> Value {
    json!({
        "entityTypeId": settings.entity_type_id,
        "fields": {
            "title": item_title(course_title),
            "opened": "Y",
            "contactIds": [contact_id],
            "sourceId": settings.source_id,
            "sourceDescription": settings.source_description,
            "assignedById": settings.assigned_by_id,
        }
    })
}

pub fn item_title(course_title: &str) -> String {
    format!("{ITEM_TITLE_PREFIX} - {course_title}")
}

/// Reads an entity id that the CRM may encode either as a JSON number or a string.
pub fn parse_entity_id(value: &Value) -> Result<String, CrmError> {
    match value {
        Value::String(id) => Ok(id.clone()),
        Value::Number(number) => {
            if let Some(id) = number.as_i64() {
                Ok(id.to_string())
            } else if let Some(id) = number.as_u64() {
                Ok(id.to_string())
            } else {
                match number.as_f64() {
                    Some(id) if id.is_finite() => Ok((id.trunc() as i64).to_string()),
                    _ => Err(CrmError::UnexpectedResponseShape(value.to_string())),
                }
            }
        }
        other => Err(CrmError::UnexpectedResponseShape(other.to_string())),
    }
}

/// Id of the first contact in a `crm.contact.list` response, if any.
pub fn first_contact_id(response: &Value) -> Result<Option<String>, CrmError> {
    let contacts = match response.get("result") {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Array(contacts)) => contacts,
        Some(other) => return Err(CrmError::UnexpectedResponseShape(other.to_string())),
    };

    let Some(first) = contacts.first() else {
        return Ok(None);
    };
    match first.get("ID") {
        None | Some(Value::Null) => Ok(None),
        Some(id) => parse_entity_id(id).map(|id| Some(id).filter(|id| !id.trim().is_empty())),
    }
}

pub fn created_contact_id(response: &Value) -> Result<String, CrmError> {
    parse_entity_id(response.get("result").unwrap_or(&Value::Null))
}

pub fn created_item_id(response: &Value) -> Result<String, CrmError> {
    parse_entity_id(response.pointer("/result/item/id").unwrap_or(&Value::Null))
}

/// Business error carried in a successful HTTP response body.
pub fn api_error(response: &Value) -> Option<CrmError> {
    let code = response.get("error")?.as_str()?.trim();
    if code.is_empty() {
        return None;
    }
    let description = response
        .get("error_description")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    Some(CrmError::Api { code: code.to_string(), description })
}
