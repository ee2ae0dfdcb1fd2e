use anyhow::{Result, bail};
use serde::Serialize;
use std::process;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use carelog_core::models::{MedicationKind, MedicationPatch, validate_name};
use carelog_core::service::CareService;

use super::helpers::{
    format_at, json_error, parse_at, print_json, resolve_id, short_id, truncate,
};
use super::{confirm_clear, require_user};

fn resolve_medication(service: &CareService, id: &str) -> Result<String> {
    resolve_id(
        service.medications().items().iter().map(|m| m.id.as_str()),
        id,
        "medication",
    )
}

pub(crate) fn cmd_med_add(
    service: &mut CareService,
    name: &str,
    kind: &str,
    missed: bool,
    at: Option<String>,
    image: Option<String>,
    json: bool,
) -> Result<()> {
    require_user(service)?;
    let kind: MedicationKind = kind.parse()?;
    let timestamp = parse_at(at)?;
    let med = service.add_medication(name, kind, !missed, timestamp, image)?;

    if json {
        print_json(&med)?;
    } else {
        let status = if missed { "missed" } else { "taken" };
        println!(
            "Added {} ({}) [{}], first dose marked {status}",
            med.name,
            med.kind,
            short_id(&med.id)
        );
    }
    Ok(())
}

pub(crate) fn cmd_med_log(
    service: &mut CareService,
    medication: &str,
    dosage: &str,
    notes: Option<String>,
    at: Option<String>,
    image: Option<String>,
    json: bool,
) -> Result<()> {
    require_user(service)?;
    let med_id = resolve_medication(service, medication)?;
    let timestamp = parse_at(at)?;
    let Some(record) = service.log_dose(&med_id, dosage, notes, timestamp, image)? else {
        bail!("Medication {med_id} not found");
    };

    if json {
        print_json(&record)?;
    } else {
        let name = service
            .medications()
            .get(&med_id)
            .map_or("medication", |m| m.name.as_str());
        println!(
            "Logged {} of {name} at {} [{}]",
            record.dosage,
            format_at(&record.timestamp),
            short_id(&record.id)
        );
    }
    Ok(())
}

pub(crate) fn cmd_med_unlog(
    service: &mut CareService,
    medication: &str,
    record: &str,
    json: bool,
) -> Result<()> {
    require_user(service)?;
    let med_id = resolve_medication(service, medication)?;
    let record_id = match service.medications().get(&med_id) {
        Some(med) => resolve_id(med.records.iter().map(|r| r.id.as_str()), record, "dose")?,
        None => bail!("Medication {med_id} not found"),
    };

    if service.medications_mut().remove_child(&med_id, &record_id)? {
        if json {
            println!("{}", serde_json::json!({ "deleted": record_id }));
        } else {
            println!("Deleted dose {}", short_id(&record_id));
        }
        Ok(())
    } else {
        if json {
            println!("{}", json_error(&format!("Dose {record_id} not found")));
        } else {
            eprintln!("Dose {record_id} not found");
        }
        process::exit(2);
    }
}

pub(crate) fn cmd_med_list(service: &CareService, json: bool) -> Result<()> {
    require_user(service)?;
    let meds = service.medications().items();

    if json {
        return print_json(meds);
    }
    if meds.is_empty() {
        eprintln!("No medications yet. Use `carelog med add` to add one.");
        return Ok(());
    }

    #[derive(Tabled)]
    struct MedRow {
        #[tabled(rename = "ID")]
        id: String,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Type")]
        kind: String,
        #[tabled(rename = "Doses")]
        doses: usize,
        #[tabled(rename = "Last dose")]
        last: String,
    }

    let rows: Vec<MedRow> = meds
        .iter()
        .map(|m| MedRow {
            id: short_id(&m.id),
            name: truncate(&m.name, 30),
            kind: m.kind.to_string(),
            doses: m.records.len(),
            last: m.records.last().map_or_else(String::new, |r| {
                format!("{} ({})", r.dosage, format_at(&r.timestamp))
            }),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(3..4)).with(Alignment::right()))
        .to_string();
    println!("{table}");
    Ok(())
}

pub(crate) fn cmd_med_history(service: &CareService, json: bool) -> Result<()> {
    require_user(service)?;

    #[derive(Serialize, Tabled)]
    struct DoseRow {
        #[tabled(rename = "When")]
        when: String,
        #[tabled(rename = "Medication")]
        medication: String,
        #[tabled(rename = "Type")]
        kind: String,
        #[tabled(rename = "Dosage")]
        dosage: String,
        #[tabled(rename = "Notes")]
        notes: String,
        #[tabled(skip)]
        medication_id: String,
        #[tabled(rename = "ID")]
        id: String,
    }

    let timeline = service.medications().timeline();
    let rows: Vec<DoseRow> = timeline
        .iter()
        .map(|e| DoseRow {
            when: if json {
                e.record.timestamp.clone()
            } else {
                format_at(&e.record.timestamp)
            },
            medication: e.parent.name.clone(),
            kind: e.parent.kind.to_string(),
            dosage: e.record.dosage.clone(),
            notes: e.record.notes.clone().unwrap_or_default(),
            medication_id: e.parent.id.clone(),
            id: if json {
                e.record.id.clone()
            } else {
                short_id(&e.record.id)
            },
        })
        .collect();

    if json {
        return print_json(&rows);
    }
    if rows.is_empty() {
        eprintln!("No doses logged yet.");
        return Ok(());
    }
    let table = Table::new(&rows).with(Style::rounded()).to_string();
    println!("{table}");
    Ok(())
}

pub(crate) fn cmd_med_update(
    service: &mut CareService,
    id: &str,
    name: Option<&str>,
    kind: Option<&str>,
    json: bool,
) -> Result<()> {
    require_user(service)?;
    if name.is_none() && kind.is_none() {
        bail!("Nothing to update. Provide at least one of --name or --type");
    }
    let patch = MedicationPatch {
        name: name.map(|n| validate_name("medication name", n)).transpose()?,
        kind: kind.map(str::parse::<MedicationKind>).transpose()?,
    };
    let id = resolve_medication(service, id)?;
    service.medications_mut().update(&id, patch)?;

    let Some(med) = service.medications().get(&id) else {
        bail!("Medication {id} not found");
    };
    if json {
        print_json(med)?;
    } else {
        println!("Updated {}: {} ({})", short_id(&med.id), med.name, med.kind);
    }
    Ok(())
}

pub(crate) fn cmd_med_delete(service: &mut CareService, id: &str, json: bool) -> Result<()> {
    require_user(service)?;
    let id = resolve_medication(service, id)?;
    if service.medications_mut().remove(&id)? {
        if json {
            println!("{}", serde_json::json!({ "deleted": id }));
        } else {
            println!("Deleted medication {} and its doses", short_id(&id));
        }
        Ok(())
    } else {
        if json {
            println!("{}", json_error(&format!("Medication {id} not found")));
        } else {
            eprintln!("Medication {id} not found");
        }
        process::exit(2);
    }
}

pub(crate) fn cmd_med_clear(service: &mut CareService, yes: bool, json: bool) -> Result<()> {
    require_user(service)?;
    if !confirm_clear("medications", yes)? {
        return Ok(());
    }
    let count = service.medications().len();
    service.medications_mut().clear()?;
    if json {
        println!("{}", serde_json::json!({ "cleared": count }));
    } else {
        println!("Cleared {count} medications");
    }
    Ok(())
}
