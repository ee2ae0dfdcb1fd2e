use anyhow::Result;

use carelog_core::service::CareService;
use carelog_core::toast::ToastKind;

use super::helpers::confirm;
use super::require_user;

/// Wipe every record domain for the signed-in user.
pub(crate) fn cmd_reset(service: &mut CareService, yes: bool, json: bool) -> Result<()> {
    require_user(service)?;
    if !yes
        && !confirm(
            "Delete ALL diet entries, medications, symptoms, prescriptions and messages? \
             This cannot be undone.",
        )?
    {
        eprintln!("Cancelled");
        return Ok(());
    }

    let result = service.reset_all_data();
    if let Some(toast) = service.toaster().current() {
        if json {
            println!(
                "{}",
                serde_json::json!({
                    "ok": toast.kind == ToastKind::Success,
                    "message": toast.message,
                })
            );
        } else if toast.kind == ToastKind::Success {
            println!("{}", toast.message);
        } else {
            eprintln!("{}", toast.message);
        }
    }
    result?;
    Ok(())
}
