use anyhow::Result;

use carelog_core::service::CareService;

use super::helpers::print_json;
use super::require_user;

pub(crate) fn cmd_signup(
    service: &mut CareService,
    email: &str,
    name: Option<&str>,
    json: bool,
) -> Result<()> {
    let user = service.sign_up(email, name)?;
    if json {
        print_json(&user)?;
    } else {
        println!("Created account for {} and signed in", user.email);
    }
    Ok(())
}

pub(crate) fn cmd_login(service: &mut CareService, email: &str, json: bool) -> Result<()> {
    let user = service.sign_in(email)?;
    if json {
        print_json(&user)?;
    } else {
        let who = user.name.as_deref().unwrap_or(&user.email);
        println!("Signed in as {who}");
    }
    Ok(())
}

pub(crate) fn cmd_logout(service: &mut CareService, json: bool) -> Result<()> {
    service.sign_out()?;
    if json {
        println!("{}", serde_json::json!({ "signed_out": true }));
    } else {
        println!("Signed out");
    }
    Ok(())
}

pub(crate) fn cmd_whoami(service: &CareService, json: bool) -> Result<()> {
    let user = require_user(service)?;
    if json {
        print_json(user)?;
    } else {
        match &user.name {
            Some(name) => println!("{name} <{}>", user.email),
            None => println!("{}", user.email),
        }
        println!("  Diet entries:  {}", service.diet().len());
        println!("  Medications:   {}", service.medications().len());
        println!("  Symptoms:      {}", service.symptoms().len());
        println!("  Prescriptions: {}", service.prescriptions().len());
        println!("  Messages:      {}", service.chat().len());
    }
    Ok(())
}
