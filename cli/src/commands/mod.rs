mod account;
mod chat;
mod diet;
mod helpers;
mod medication;
mod prescription;
mod reset;
mod symptom;

use anyhow::{Result, bail};

use carelog_core::identity::User;
use carelog_core::service::CareService;

pub(crate) use account::{cmd_login, cmd_logout, cmd_signup, cmd_whoami};
pub(crate) use chat::{cmd_chat_clear, cmd_chat_log, cmd_chat_send};
pub(crate) use diet::{cmd_diet_add, cmd_diet_clear, cmd_diet_delete, cmd_diet_list, cmd_diet_update};
pub(crate) use medication::{
    cmd_med_add, cmd_med_clear, cmd_med_delete, cmd_med_history, cmd_med_list, cmd_med_log,
    cmd_med_unlog, cmd_med_update,
};
pub(crate) use prescription::{
    RxFilter, cmd_rx_add, cmd_rx_archive, cmd_rx_clear, cmd_rx_delete, cmd_rx_list,
};
pub(crate) use reset::cmd_reset;
pub(crate) use symptom::{
    cmd_symptom_add, cmd_symptom_clear, cmd_symptom_delete, cmd_symptom_history,
    cmd_symptom_list, cmd_symptom_log, cmd_symptom_unlog, cmd_symptom_update,
};

/// The signed-in user, or a hint on how to sign in.
pub(super) fn require_user(service: &CareService) -> Result<&User> {
    match service.current_user() {
        Some(user) => Ok(user),
        None => bail!("Not signed in. Run `carelog login <email>` or `carelog signup <email>` first"),
    }
}

/// Ask before wiping data unless `--yes` was passed.
pub(super) fn confirm_clear(what: &str, yes: bool) -> Result<bool> {
    if yes {
        return Ok(true);
    }
    let confirmed = helpers::confirm(&format!("Delete all {what}? This cannot be undone."))?;
    if !confirmed {
        eprintln!("Cancelled");
    }
    Ok(confirmed)
}
