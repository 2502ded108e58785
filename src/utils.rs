use chrono::{NaiveDateTime, SecondsFormat, TimeZone, Utc};
use rocket::http::{Header, Status};
use rocket::request::Request;
use rocket::response::{Responder, Response};
use rocket::serde::json::Json;
use serde::{Deserialize, Deserializer, Serializer};
use serde_json::Value;

pub fn try_respond(
    req: &Request,
    json: &Value,
    status: Status,
) -> Result<Response<'static>, Status> {
    let mut response = Response::build_from(Json(json.clone()).respond_to(req)?);
    response.status(status);
    if status == Status::Unauthorized {
        response.header(Header::new("WWW-Authenticate", "Bearer realm=\"api\""));
    }
    response.ok()
}

/// Timestamps are stored as naive UTC and rendered as RFC 3339 with a `Z` suffix.
pub fn serialize_date<S>(date: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let s = Utc
        .from_utc_datetime(date)
        .to_rfc3339_opts(SecondsFormat::Micros, true);
    serializer.serialize_str(&s)
}

pub fn now() -> NaiveDateTime {
    Utc::now().naive_utc()
}

/// Distinguishes an explicit `null` from a missing field: use together with
/// `#[serde(default)]` so a missing field stays `None` and `null` becomes
/// `Some(Value::Null)`.
pub fn deserialize_present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

/// Reads a primary key the way clients send it: a number, a numeric string or
/// `null`. The error is the message for the field.
pub fn parse_pk(value: &Value) -> Result<Option<i32>, String> {
    match value {
        Value::Null => Ok(None),
        Value::Number(n) => n
            .as_i64()
            .and_then(|n| i32::try_from(n).ok())
            .map(Some)
            .ok_or_else(|| format!("Invalid pk \"{}\" - object does not exist.", n)),
        Value::String(s) if s.is_empty() => Ok(None),
        Value::String(s) => s
            .trim()
            .parse::<i32>()
            .map(Some)
            .map_err(|_| "Incorrect type. Expected pk value, received str.".to_string()),
        Value::Bool(_) => Err("Incorrect type. Expected pk value, received bool.".into()),
        Value::Array(_) => Err("Incorrect type. Expected pk value, received list.".into()),
        Value::Object(_) => Err("Incorrect type. Expected pk value, received dict.".into()),
    }
}

/// Reads a required string field, returning the message for the field when it
/// is missing, null, not a string or blank.
pub fn required_text(value: Option<&Value>) -> Result<String, String> {
    match value {
        None | Some(Value::Null) => Err("This field is required.".into()),
        Some(Value::String(s)) if s.trim().is_empty() => Err("This field may not be blank.".into()),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(_) => Err("Not a valid string.".into()),
    }
}
