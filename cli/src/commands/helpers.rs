use anyhow::{Context, Result, bail};
use chrono::{Duration, Local};
use serde::Serialize;
use std::io::{self, BufRead, Write};

use carelog_core::models::{now_timestamp, parse_timestamp};

/// Parse a `--at` value into the timestamp string stored on a record.
///
/// `None` leaves the timestamp to the store. "now" stamps the current
/// instant, so it also moves a record on update. "today"/"yesterday"
/// use the current local time of day. Anything else must parse as a
/// date or date-time ("2024-01-15", "2024-01-15T08:00", "2024-01-15 08:00").
pub(crate) fn parse_at(at: Option<String>) -> Result<Option<String>> {
    let Some(s) = at else {
        return Ok(None);
    };
    let s = s.trim();
    let now = Local::now();
    match s {
        "now" => Ok(Some(now_timestamp())),
        "today" => Ok(Some(now.format("%Y-%m-%dT%H:%M").to_string())),
        "yesterday" => Ok(Some(
            (now - Duration::days(1)).format("%Y-%m-%dT%H:%M").to_string(),
        )),
        _ => {
            let normalized = s.replacen(' ', "T", 1);
            if parse_timestamp(&normalized).is_none() {
                bail!("Invalid time '{s}'. Use YYYY-MM-DD, YYYY-MM-DDTHH:MM, today, yesterday or now");
            }
            Ok(Some(normalized))
        }
    }
}

/// Render a stored timestamp as `YYYY-MM-DD HH:MM`, or verbatim if it
/// does not parse.
pub(crate) fn format_at(timestamp: &str) -> String {
    parse_timestamp(timestamp).map_or_else(
        || timestamp.to_string(),
        |t| t.format("%Y-%m-%d %H:%M").to_string(),
    )
}

pub(crate) fn parse_weight(s: &str) -> Result<f64> {
    let trimmed = s.trim().trim_end_matches('g').trim();
    let value: f64 = trimmed
        .parse()
        .with_context(|| format!("Invalid weight: '{s}'. Use a number like '150' or '150g'"))?;
    if value <= 0.0 {
        bail!("Weight must be greater than 0");
    }
    Ok(value)
}

/// Resolve a full id or unique id prefix against `ids`.
pub(crate) fn resolve_id<'a>(
    ids: impl IntoIterator<Item = &'a str>,
    query: &str,
    what: &str,
) -> Result<String> {
    let query = query.trim();
    if query.is_empty() {
        bail!("Empty {what} id");
    }
    let matches: Vec<&str> = ids.into_iter().filter(|id| id.starts_with(query)).collect();
    if let Some(exact) = matches.iter().find(|id| **id == query) {
        return Ok((*exact).to_string());
    }
    match matches.as_slice() {
        [] => bail!("No {what} with id '{query}'"),
        [only] => Ok((*only).to_string()),
        _ => bail!(
            "'{query}' matches {} {what} ids; use more characters",
            matches.len()
        ),
    }
}

/// First 8 characters of an id, enough to pass back to `resolve_id`.
pub(crate) fn short_id(id: &str) -> String {
    id.chars().take(8).collect()
}

pub(crate) fn confirm(question: &str) -> Result<bool> {
    eprint!("{question} [y/N]: ");
    io::stderr().flush()?;
    let stdin = io::stdin();
    let line = stdin.lock().lines().next().context("No input")??;
    Ok(matches!(line.trim().to_lowercase().as_str(), "y" | "yes"))
}

pub(crate) fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub(crate) fn json_error(message: &str) -> String {
    #[derive(Serialize)]
    struct CliError<'a> {
        error: &'a str,
    }
    serde_json::to_string(&CliError { error: message })
        .unwrap_or_else(|_| format!("{{\"error\":\"{message}\"}}"))
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let end = s
            .char_indices()
            .nth(max.saturating_sub(3))
            .map_or(s.len(), |(i, _)| i);
        format!("{}...", &s[..end])
    }
}
