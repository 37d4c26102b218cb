//! Pulls dated counts out of the raw payload of each source.

use chrono::NaiveDate;
use serde_json::Value;

use crate::domain::Action;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Observation {
    pub date: NaiveDate,
    pub count: u64,
}

/// pepy.tech: `{"downloads": {"YYYY-MM-DD": {"<version>": n}}}`.
pub fn pypi(payload: &Value) -> Result<Vec<Observation>, String> {
    let days = payload
        .get("downloads")
        .and_then(Value::as_object)
        .ok_or_else(|| "missing \"downloads\" object".to_string())?;

    let mut observations = Vec::with_capacity(days.len());
    for (day, versions) in days {
        let Some(date) = parse_day(day) else {
            tracing::debug!(day = %day, "skipping pypi entry with invalid date");
            continue;
        };
        let count = match versions {
            Value::Object(per_version) => per_version.values().filter_map(as_count).sum(),
            other => match as_count(other) {
                Some(count) => count,
                None => {
                    tracing::debug!(day = %day, "skipping pypi entry with invalid count");
                    continue;
                }
            },
        };
        observations.push(Observation { date, count });
    }
    Ok(observations)
}

/// cranlogs: `[{"package": "...", "downloads": [{"day": "...", "downloads": n}]}]`.
pub fn cran(payload: &Value) -> Result<Vec<Observation>, String> {
    let entries = payload
        .as_array()
        .ok_or_else(|| "expected a JSON array".to_string())?;
    let Some(first) = entries.first() else {
        return Ok(Vec::new());
    };
    let Some(days) = first.get("downloads").and_then(Value::as_array) else {
        // cranlogs answers unknown packages with `downloads: null`
        return Ok(Vec::new());
    };

    let mut observations = Vec::with_capacity(days.len());
    for entry in days {
        let date = entry.get("day").and_then(Value::as_str).and_then(parse_day);
        let count = entry.get("downloads").map_or(Some(0), as_count);
        match (date, count) {
            (Some(date), Some(count)) => observations.push(Observation { date, count }),
            _ => tracing::debug!(?entry, "skipping malformed cran entry"),
        }
    }
    Ok(observations)
}

/// Pre-aggregated monthly counts keyed `('<package>', 'YYYY-MM')` or
/// `YYYY-MM`. Each month becomes an observation on its first day.
pub fn bioconda(payload: &Value) -> Result<Vec<Observation>, String> {
    let months = payload
        .as_object()
        .ok_or_else(|| "expected a JSON object".to_string())?;

    let mut observations = Vec::with_capacity(months.len());
    for (key, count) in months {
        let date = month_from_key(key);
        let count = as_count(count);
        match (date, count) {
            (Some(date), Some(count)) => observations.push(Observation { date, count }),
            _ => tracing::debug!(key = %key, "skipping malformed bioconda entry"),
        }
    }
    Ok(observations)
}

/// GitHub traffic: `{"clones": [{"timestamp": "...", "uniques": n}]}`.
/// Unique visitors/cloners are what gets reported.
pub fn github(payload: &Value, action: Action) -> Result<Vec<Observation>, String> {
    let object = payload
        .as_object()
        .ok_or_else(|| "expected a JSON object".to_string())?;
    let Some(days) = object.get(action.as_str()) else {
        return Err(format!("missing \"{action}\" array"));
    };
    let days = days
        .as_array()
        .ok_or_else(|| format!("\"{action}\" is not an array"))?;

    let mut observations = Vec::with_capacity(days.len());
    for entry in days {
        let date = entry
            .get("timestamp")
            .and_then(Value::as_str)
            .and_then(|stamp| parse_day(stamp.split('T').next().unwrap_or(stamp)));
        let count = entry.get("uniques").map_or(Some(0), as_count);
        match (date, count) {
            (Some(date), Some(count)) => observations.push(Observation { date, count }),
            _ => tracing::debug!(?entry, "skipping malformed github entry"),
        }
    }
    Ok(observations)
}

fn parse_day(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").ok()
}

fn month_from_key(key: &str) -> Option<NaiveDate> {
    let month = match key.trim().strip_prefix("('") {
        Some(rest) => {
            let (_, month) = rest.strip_suffix("')")?.split_once("', '")?;
            month
        }
        None => key.trim(),
    };
    NaiveDate::parse_from_str(&format!("{month}-01"), "%Y-%m-%d").ok()
}

fn as_count(value: &Value) -> Option<u64> {
    if let Some(count) = value.as_u64() {
        return Some(count);
    }
    let float = value.as_f64()?;
    (float.is_finite() && float >= 0.0).then(|| float.round() as u64)
}
