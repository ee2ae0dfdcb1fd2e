use anyhow::Result;
use std::process;
use tabled::{Table, Tabled, settings::Style};

use carelog_core::models::Prescription;
use carelog_core::service::CareService;

use super::helpers::{format_at, json_error, print_json, resolve_id, short_id, truncate};
use super::{confirm_clear, require_user};

/// Which prescriptions `rx list` shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum RxFilter {
    #[default]
    Active,
    Archived,
    All,
}

fn resolve_prescription(service: &CareService, id: &str) -> Result<String> {
    resolve_id(
        service.prescriptions().items().iter().map(|p| p.id.as_str()),
        id,
        "prescription",
    )
}

pub(crate) fn cmd_rx_add(service: &mut CareService, text: &str, json: bool) -> Result<()> {
    require_user(service)?;
    let rx = service.add_prescription(text)?;
    if json {
        print_json(&rx)?;
    } else {
        println!("Saved prescription [{}]", short_id(&rx.id));
    }
    Ok(())
}

pub(crate) fn cmd_rx_archive(service: &mut CareService, id: &str, json: bool) -> Result<()> {
    require_user(service)?;
    let id = resolve_prescription(service, id)?;
    if service.prescriptions_mut().archive(&id)? {
        if let Some(rx) = service.prescriptions().get(&id) {
            if json {
                print_json(rx)?;
            } else {
                println!("Archived prescription {}", short_id(&rx.id));
            }
        }
        Ok(())
    } else {
        if json {
            println!("{}", json_error(&format!("Prescription {id} not found")));
        } else {
            eprintln!("Prescription {id} not found");
        }
        process::exit(2);
    }
}

pub(crate) fn cmd_rx_list(service: &CareService, filter: RxFilter, json: bool) -> Result<()> {
    require_user(service)?;
    let store = service.prescriptions();
    let shown: Vec<&Prescription> = match filter {
        RxFilter::Active => store.active(),
        RxFilter::Archived => store.archived(),
        RxFilter::All => store.items().iter().collect(),
    };

    if json {
        return print_json(&shown);
    }
    if shown.is_empty() {
        match filter {
            RxFilter::Archived => eprintln!("No archived prescriptions."),
            _ => eprintln!("No prescriptions yet. Use `carelog rx add` to save one."),
        }
        return Ok(());
    }

    #[derive(Tabled)]
    struct RxRow {
        #[tabled(rename = "ID")]
        id: String,
        #[tabled(rename = "Created")]
        created: String,
        #[tabled(rename = "Prescription")]
        text: String,
        #[tabled(rename = "Archived")]
        archived: String,
    }

    let rows: Vec<RxRow> = shown
        .iter()
        .map(|p| RxRow {
            id: short_id(&p.id),
            created: format_at(&p.created_date),
            text: truncate(p.text.lines().next().unwrap_or_default(), 50),
            archived: p
                .archived_date
                .as_deref()
                .map(format_at)
                .unwrap_or_default(),
        })
        .collect();

    let table = Table::new(&rows).with(Style::rounded()).to_string();
    println!("{table}");
    Ok(())
}

pub(crate) fn cmd_rx_delete(service: &mut CareService, id: &str, json: bool) -> Result<()> {
    require_user(service)?;
    let id = resolve_prescription(service, id)?;
    if service.prescriptions_mut().remove(&id)? {
        if json {
            println!("{}", serde_json::json!({ "deleted": id }));
        } else {
            println!("Deleted prescription {}", short_id(&id));
        }
        Ok(())
    } else {
        if json {
            println!("{}", json_error(&format!("Prescription {id} not found")));
        } else {
            eprintln!("Prescription {id} not found");
        }
        process::exit(2);
    }
}

pub(crate) fn cmd_rx_clear(service: &mut CareService, yes: bool, json: bool) -> Result<()> {
    require_user(service)?;
    if !confirm_clear("prescriptions", yes)? {
        return Ok(());
    }
    let count = service.prescriptions().len();
    service.prescriptions_mut().clear()?;
    if json {
        println!("{}", serde_json::json!({ "cleared": count }));
    } else {
        println!("Cleared {count} prescriptions");
    }
    Ok(())
}
