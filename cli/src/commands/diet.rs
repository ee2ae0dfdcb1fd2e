use anyhow::{Result, bail};
use std::process;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use carelog_core::models::{DietItemPatch, validate_name, validate_weight};
use carelog_core::service::CareService;

use super::helpers::{
    format_at, json_error, parse_at, parse_weight, print_json, resolve_id, short_id, truncate,
};
use super::{confirm_clear, require_user};

fn resolve_item(service: &CareService, id: &str) -> Result<String> {
    resolve_id(
        service.diet().items().iter().map(|i| i.id.as_str()),
        id,
        "diet entry",
    )
}

pub(crate) fn cmd_diet_add(
    service: &mut CareService,
    name: &str,
    weight: &str,
    at: Option<String>,
    image: Option<String>,
    json: bool,
) -> Result<()> {
    require_user(service)?;
    let grams = parse_weight(weight)?;
    let timestamp = parse_at(at)?;
    let item = service.log_food(name, grams, timestamp, image)?;

    if json {
        print_json(&item)?;
    } else {
        println!(
            "Logged {} ({:.0}g) at {} [{}]",
            item.name,
            item.weight,
            format_at(&item.timestamp),
            short_id(&item.id)
        );
    }
    Ok(())
}

pub(crate) fn cmd_diet_list(service: &CareService, json: bool) -> Result<()> {
    require_user(service)?;
    let items = service.diet().items();

    if json {
        return print_json(items);
    }
    if items.is_empty() {
        eprintln!("No diet entries yet. Use `carelog diet add` to log food.");
        return Ok(());
    }

    #[derive(Tabled)]
    struct DietRow {
        #[tabled(rename = "ID")]
        id: String,
        #[tabled(rename = "When")]
        when: String,
        #[tabled(rename = "Food")]
        name: String,
        #[tabled(rename = "Weight (g)")]
        weight: String,
        #[tabled(rename = "Photo")]
        photo: String,
    }

    let rows: Vec<DietRow> = items
        .iter()
        .map(|i| DietRow {
            id: short_id(&i.id),
            when: format_at(&i.timestamp),
            name: truncate(&i.name, 35),
            weight: format!("{:.0}", i.weight),
            photo: if i.image_uri.is_some() { "yes" } else { "" }.to_string(),
        })
        .collect();

    let total: f64 = items.iter().map(|i| i.weight).sum();
    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(3..4)).with(Alignment::right()))
        .to_string();
    println!("{table}");
    println!("{} entries, {total:.0}g total", items.len());
    Ok(())
}

pub(crate) fn cmd_diet_update(
    service: &mut CareService,
    id: &str,
    name: Option<&str>,
    weight: Option<&str>,
    at: Option<String>,
    json: bool,
) -> Result<()> {
    require_user(service)?;
    if name.is_none() && weight.is_none() && at.is_none() {
        bail!("Nothing to update. Provide at least one of --name, --weight, or --at");
    }

    let patch = DietItemPatch {
        name: name.map(|n| validate_name("food name", n)).transpose()?,
        weight: weight
            .map(|w| parse_weight(w).and_then(validate_weight))
            .transpose()?,
        timestamp: parse_at(at)?,
        image_uri: None,
    };
    let id = resolve_item(service, id)?;
    service.diet_mut().update(&id, patch)?;

    let Some(item) = service.diet().get(&id) else {
        bail!("Diet entry {id} not found");
    };
    if json {
        print_json(item)?;
    } else {
        println!(
            "Updated {}: {} ({:.0}g) at {}",
            short_id(&item.id),
            item.name,
            item.weight,
            format_at(&item.timestamp)
        );
    }
    Ok(())
}

pub(crate) fn cmd_diet_delete(service: &mut CareService, id: &str, json: bool) -> Result<()> {
    require_user(service)?;
    let id = resolve_item(service, id)?;
    if service.diet_mut().remove(&id)? {
        if json {
            println!("{}", serde_json::json!({ "deleted": id }));
        } else {
            println!("Deleted diet entry {}", short_id(&id));
        }
        Ok(())
    } else {
        if json {
            println!("{}", json_error(&format!("Diet entry {id} not found")));
        } else {
            eprintln!("Diet entry {id} not found");
        }
        process::exit(2);
    }
}

pub(crate) fn cmd_diet_clear(service: &mut CareService, yes: bool, json: bool) -> Result<()> {
    require_user(service)?;
    if !confirm_clear("diet entries", yes)? {
        return Ok(());
    }
    let count = service.diet().len();
    service.diet_mut().clear()?;
    if json {
        println!("{}", serde_json::json!({ "cleared": count }));
    } else {
        println!("Cleared {count} diet entries");
    }
    Ok(())
}
