use anyhow::{Result, bail};
use serde::Serialize;
use std::process;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use carelog_core::models::{MAX_SEVERITY, SymptomPatch, validate_name};
use carelog_core::service::CareService;

use super::helpers::{format_at, json_error, parse_at, print_json, resolve_id, short_id, truncate};
use super::{confirm_clear, require_user};

fn resolve_symptom(service: &CareService, id: &str) -> Result<String> {
    resolve_id(
        service.symptoms().items().iter().map(|s| s.id.as_str()),
        id,
        "symptom",
    )
}

/// Severity as a small bar, e.g. `7 #######...`.
fn severity_bar(severity: u8) -> String {
    let filled = usize::from(severity.min(MAX_SEVERITY));
    let empty = usize::from(MAX_SEVERITY) - filled;
    format!("{severity:>2} {}{}", "#".repeat(filled), ".".repeat(empty))
}

pub(crate) fn cmd_symptom_add(
    service: &mut CareService,
    name: &str,
    severity: i64,
    at: Option<String>,
    image: Option<String>,
    json: bool,
) -> Result<()> {
    require_user(service)?;
    let timestamp = parse_at(at)?;
    let symptom = service.add_symptom(name, severity, timestamp, image)?;

    if json {
        print_json(&symptom)?;
    } else {
        println!(
            "Tracking {} at severity {severity}/{MAX_SEVERITY} [{}]",
            symptom.name,
            short_id(&symptom.id)
        );
    }
    Ok(())
}

pub(crate) fn cmd_symptom_log(
    service: &mut CareService,
    symptom: &str,
    severity: i64,
    at: Option<String>,
    image: Option<String>,
    json: bool,
) -> Result<()> {
    require_user(service)?;
    let symptom_id = resolve_symptom(service, symptom)?;
    let timestamp = parse_at(at)?;
    let Some(record) = service.log_severity(&symptom_id, severity, timestamp, image)? else {
        bail!("Symptom {symptom_id} not found");
    };

    if json {
        print_json(&record)?;
    } else {
        let name = service
            .symptoms()
            .get(&symptom_id)
            .map_or("symptom", |s| s.name.as_str());
        println!(
            "Logged {name} at {}/{MAX_SEVERITY} on {} [{}]",
            record.severity,
            format_at(&record.timestamp),
            short_id(&record.id)
        );
    }
    Ok(())
}

pub(crate) fn cmd_symptom_unlog(
    service: &mut CareService,
    symptom: &str,
    record: &str,
    json: bool,
) -> Result<()> {
    require_user(service)?;
    let symptom_id = resolve_symptom(service, symptom)?;
    let record_id = match service.symptoms().get(&symptom_id) {
        Some(s) => resolve_id(s.records.iter().map(|r| r.id.as_str()), record, "reading")?,
        None => bail!("Symptom {symptom_id} not found"),
    };

    if service.symptoms_mut().remove_child(&symptom_id, &record_id)? {
        if json {
            println!("{}", serde_json::json!({ "deleted": record_id }));
        } else {
            println!("Deleted reading {}", short_id(&record_id));
        }
        Ok(())
    } else {
        if json {
            println!("{}", json_error(&format!("Reading {record_id} not found")));
        } else {
            eprintln!("Reading {record_id} not found");
        }
        process::exit(2);
    }
}

pub(crate) fn cmd_symptom_list(service: &CareService, json: bool) -> Result<()> {
    require_user(service)?;
    let symptoms = service.symptoms().items();

    if json {
        return print_json(symptoms);
    }
    if symptoms.is_empty() {
        eprintln!("No symptoms tracked yet. Use `carelog symptom add` to start.");
        return Ok(());
    }

    #[derive(Tabled)]
    struct SymptomRow {
        #[tabled(rename = "ID")]
        id: String,
        #[tabled(rename = "Symptom")]
        name: String,
        #[tabled(rename = "Readings")]
        readings: usize,
        #[tabled(rename = "Latest")]
        latest: String,
        #[tabled(rename = "When")]
        when: String,
    }

    let rows: Vec<SymptomRow> = symptoms
        .iter()
        .map(|s| {
            let last = s.last_record();
            SymptomRow {
                id: short_id(&s.id),
                name: truncate(&s.name, 30),
                readings: s.records.len(),
                latest: last.map_or_else(String::new, |r| severity_bar(r.severity)),
                when: last.map_or_else(String::new, |r| format_at(&r.timestamp)),
            }
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(2..3)).with(Alignment::right()))
        .to_string();
    println!("{table}");
    Ok(())
}

pub(crate) fn cmd_symptom_history(service: &CareService, json: bool) -> Result<()> {
    require_user(service)?;
    let timeline = service.symptoms().timeline();

    if json {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct Reading<'a> {
            symptom_id: &'a str,
            symptom: &'a str,
            id: &'a str,
            severity: u8,
            timestamp: &'a str,
        }
        let readings: Vec<Reading<'_>> = timeline
            .iter()
            .map(|e| Reading {
                symptom_id: &e.parent.id,
                symptom: &e.parent.name,
                id: &e.record.id,
                severity: e.record.severity,
                timestamp: &e.record.timestamp,
            })
            .collect();
        return print_json(&readings);
    }
    if timeline.is_empty() {
        eprintln!("No readings logged yet.");
        return Ok(());
    }

    #[derive(Tabled)]
    struct ReadingRow {
        #[tabled(rename = "When")]
        when: String,
        #[tabled(rename = "Symptom")]
        symptom: String,
        #[tabled(rename = "Severity")]
        severity: String,
        #[tabled(rename = "ID")]
        id: String,
    }

    let rows: Vec<ReadingRow> = timeline
        .iter()
        .map(|e| ReadingRow {
            when: format_at(&e.record.timestamp),
            symptom: truncate(&e.parent.name, 30),
            severity: severity_bar(e.record.severity),
            id: short_id(&e.record.id),
        })
        .collect();
    let table = Table::new(&rows).with(Style::rounded()).to_string();
    println!("{table}");
    Ok(())
}

pub(crate) fn cmd_symptom_update(
    service: &mut CareService,
    id: &str,
    name: &str,
    json: bool,
) -> Result<()> {
    require_user(service)?;
    let patch = SymptomPatch {
        name: Some(validate_name("symptom name", name)?),
    };
    let id = resolve_symptom(service, id)?;
    service.symptoms_mut().update(&id, patch)?;

    let Some(symptom) = service.symptoms().get(&id) else {
        bail!("Symptom {id} not found");
    };
    if json {
        print_json(symptom)?;
    } else {
        println!("Renamed {} to {}", short_id(&symptom.id), symptom.name);
    }
    Ok(())
}

pub(crate) fn cmd_symptom_delete(service: &mut CareService, id: &str, json: bool) -> Result<()> {
    require_user(service)?;
    let id = resolve_symptom(service, id)?;
    if service.symptoms_mut().remove(&id)? {
        if json {
            println!("{}", serde_json::json!({ "deleted": id }));
        } else {
            println!("Deleted symptom {} and its readings", short_id(&id));
        }
        Ok(())
    } else {
        if json {
            println!("{}", json_error(&format!("Symptom {id} not found")));
        } else {
            eprintln!("Symptom {id} not found");
        }
        process::exit(2);
    }
}

pub(crate) fn cmd_symptom_clear(service: &mut CareService, yes: bool, json: bool) -> Result<()> {
    require_user(service)?;
    if !confirm_clear("symptoms", yes)? {
        return Ok(());
    }
    let count = service.symptoms().len();
    service.symptoms_mut().clear()?;
    if json {
        println!("{}", serde_json::json!({ "cleared": count }));
    } else {
        println!("Cleared {count} symptoms");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_bar() {
        assert_eq!(severity_bar(0), " 0 ..........");
        assert_eq!(severity_bar(7), " 7 #######...");
        assert_eq!(severity_bar(10), "10 ##########");
    }
}
