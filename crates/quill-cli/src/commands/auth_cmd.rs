use serde_json::json;

use crate::auth::{AuthSession, FirebaseAuthService};
use crate::cli::AuthCommands;
use crate::commands::common::{print_json, probe_connectivity};
use crate::config::load_client_config;
use crate::error::CliError;

pub async fn run_auth(command: AuthCommands, offline: bool, as_json: bool) -> Result<(), CliError> {
    let config = load_client_config()?;
    let service = FirebaseAuthService::from_config(&config)?.ok_or(CliError::RemoteNotConfigured)?;

    match command {
        AuthCommands::Login { email, password } => {
            let session = service.sign_in(&email, &password).await?;
            report_signed_in(&session, "Signed in", as_json)
        }
        AuthCommands::Signup { email, password } => {
            let session = service.sign_up(&email, &password).await?;
            report_signed_in(&session, "Created account", as_json)
        }
        AuthCommands::Logout => {
            service.sign_out()?;
            if as_json {
                print_json(json!({ "signed_out": true }))
            } else {
                println!("Signed out of project '{}'", service.project_id());
                Ok(())
            }
        }
        AuthCommands::Whoami => {
            let online = !offline && probe_connectivity(&config).await.is_online();
            let session = if online {
                service.restore_session().await?
            } else {
                service.stored_session()?
            };
            let Some(session) = session else {
                return Err(CliError::NotSignedIn);
            };

            let user = if online {
                service.lookup_user(&session).await?
            } else {
                session.user
            };

            if as_json {
                print_json(user)
            } else {
                println!("{}", user.email.as_deref().unwrap_or("(no email)"));
                println!("uid: {}", user.uid);
                if let Some(display_name) = &user.display_name {
                    println!("name: {display_name}");
                }
                Ok(())
            }
        }
    }
}

fn report_signed_in(session: &AuthSession, verb: &str, as_json: bool) -> Result<(), CliError> {
    if as_json {
        return print_json(&session.user);
    }
    let email_label = session.user.email.as_deref().unwrap_or("(no email)");
    println!("{verb} as {email_label}");
    Ok(())
}
