use super::error::HandlerErr;
use crate::model::parse_date;
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde_json::Value;

pub fn get_required_str<'a>(params: &'a Value, key: &str) -> Result<&'a str, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

pub fn get_required_i64(params: &Value, key: &str) -> Result<i64, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_i64())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing integer {}", key)))
}

pub fn get_optional_i64(params: &Value, key: &str) -> Result<Option<i64>, HandlerErr> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_i64()
            .map(Some)
            .ok_or_else(|| HandlerErr::bad_params(format!("{} must be an integer", key))),
    }
}

pub fn get_limit(params: &Value, default: usize) -> Result<usize, HandlerErr> {
    match get_optional_i64(params, "limit")? {
        None => Ok(default),
        Some(n) if n >= 0 => Ok(n as usize),
        Some(_) => Err(HandlerErr::bad_params("limit must not be negative")),
    }
}

pub fn get_required_date(params: &Value, key: &str) -> Result<NaiveDate, HandlerErr> {
    Ok(parse_date(get_required_str(params, key)?)?)
}

pub fn get_optional_date(params: &Value, key: &str) -> Result<Option<NaiveDate>, HandlerErr> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(_) => get_required_date(params, key).map(Some),
    }
}

/// Deserializes `params[key]` into `T`.
pub fn get_object<T: DeserializeOwned>(params: &Value, key: &str) -> Result<T, HandlerErr> {
    let Some(raw) = params.get(key) else {
        return Err(HandlerErr::bad_params(format!("missing {}", key)));
    };
    serde_json::from_value(raw.clone()).map_err(|e| HandlerErr {
        code: "bad_params",
        message: format!("invalid {}: {}", key, e),
        details: None,
    })
}

/// Like `get_object`, but absent or null yields `None`.
pub fn get_optional_object<T: DeserializeOwned>(
    params: &Value,
    key: &str,
) -> Result<Option<T>, HandlerErr> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(_) => get_object(params, key).map(Some),
    }
}

/// A score cell value sent either as a JSON number or as typed text.
pub fn get_raw_value(params: &Value, key: &str) -> Result<String, HandlerErr> {
    match params.get(key) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        _ => Err(HandlerErr::bad_params(format!("missing {}", key))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn limit_defaults_and_rejects_negatives() {
        assert_eq!(get_limit(&json!({}), 5).expect("default"), 5);
        assert_eq!(get_limit(&json!({ "limit": 2 }), 5).expect("given"), 2);
        assert_eq!(get_limit(&json!({ "limit": -1 }), 5).unwrap_err().code, "bad_params");
    }

    #[test]
    fn raw_value_accepts_numbers_and_text() {
        assert_eq!(get_raw_value(&json!({ "value": 42.5 }), "value").expect("num"), "42.5");
        assert_eq!(get_raw_value(&json!({ "value": " 7 " }), "value").expect("text"), " 7 ");
        assert!(get_raw_value(&json!({ "value": true }), "value").is_err());
    }

    #[test]
    fn dates_must_be_iso() {
        let p = json!({ "date": "2024-01-17", "bad": "17/01/2024" });
        assert_eq!(
            get_required_date(&p, "date").expect("date"),
            NaiveDate::from_ymd_opt(2024, 1, 17).expect("date")
        );
        assert_eq!(get_required_date(&p, "bad").unwrap_err().code, "bad_params");
        assert_eq!(get_optional_date(&p, "missing").expect("none"), None);
    }
}
