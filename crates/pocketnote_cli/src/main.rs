//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `pocketnote_core` linkage.
//! - When `POCKETNOTE_DATA_DIR` is set, run one note lifecycle against that
//!   directory and print the outcome.
//! - Keep output deterministic for quick local sanity checks.

use pocketnote_core::{CoreConfig, CoreContext, DraftField, FederatedDisabled, NoteStore};
use std::process::ExitCode;

const DATA_DIR_ENV: &str = "POCKETNOTE_DATA_DIR";
const DEMO_EMAIL: &str = "smoke@pocketnote.local";
const DEMO_PASSWORD: &str = "smoke-password";

fn main() -> ExitCode {
    println!("pocketnote_core ping={}", pocketnote_core::ping());
    println!("pocketnote_core version={}", pocketnote_core::core_version());

    let Some(data_dir) = std::env::var_os(DATA_DIR_ENV) else {
        return ExitCode::SUCCESS;
    };
    match run_lifecycle(data_dir.into()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("lifecycle status=error error={err}");
            ExitCode::FAILURE
        }
    }
}

fn run_lifecycle(data_dir: std::path::PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let config = CoreConfig::new(&data_dir)?;
    std::fs::create_dir_all(config.log_dir())?;
    pocketnote_core::init_logging(config.log_level(), config.log_dir())?;

    let core = CoreContext::open(config, FederatedDisabled)?;
    let auth = core.auth();
    let user_id = match auth.sign_in_with_password(DEMO_EMAIL, DEMO_PASSWORD) {
        Ok(user_id) => user_id,
        Err(_) => auth.sign_up_with_password(DEMO_EMAIL, DEMO_PASSWORD, "smoke")?,
    };
    println!("lifecycle user_id={user_id}");

    let notes = core.notes();
    let mut session = notes.begin_new();
    session.set_field(DraftField::Title, "smoke");
    session.set_field(DraftField::Body, "created by pocketnote_cli");
    session.set_field(DraftField::Reminder, "01/01/2030");
    let note = notes.save(&mut session)?;
    println!(
        "lifecycle created note_id={} created_at={}",
        note.id,
        note.created_at_display()
    );

    let listed = notes.store().list_by_owner(&user_id)?;
    println!("lifecycle listed count={}", listed.len());

    let report = notes.delete(note.id)?;
    println!("lifecycle deleted removed_files={}", report.removed_files);
    Ok(())
}
