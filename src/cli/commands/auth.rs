use clap::Subcommand;
use serde_json::json;
use uuid::Uuid;

use crate::auth::{AuthService, ProfileUpdate};
use crate::cli::session::{build_client, build_context};
use crate::cli::utils::*;
use crate::cli::OutputFormat;
use crate::profile::{Profile, Role};
use crate::session::SignUpRequest;

#[derive(Subcommand)]
pub enum AuthCommands {
    #[command(about = "Create an account (a confirmation code is emailed)")]
    Signup {
        #[arg(help = "Email address")]
        email: String,
        #[arg(help = "Full name")]
        full_name: String,
        #[arg(long, help = "Phone number")]
        phone: Option<String>,
        #[arg(long, help = "Password (will prompt if not provided)")]
        password: Option<String>,
    },

    #[command(about = "Confirm an email address with the emailed code and sign in")]
    Verify {
        #[arg(help = "Email address")]
        email: String,
        #[arg(help = "Confirmation code")]
        code: String,
    },

    #[command(about = "Sign in with email and password")]
    Login {
        #[arg(help = "Email address")]
        email: String,
        #[arg(long, help = "Password (will prompt if not provided)")]
        password: Option<String>,
    },

    #[command(about = "Sign out and forget the stored session")]
    Logout,

    #[command(about = "Show current authentication status")]
    Status,

    #[command(about = "Show the signed-in identity and profile")]
    Whoami,

    #[command(about = "Refresh the stored session")]
    Refresh,

    #[command(about = "Change a user's role (admin only)")]
    SetRole {
        #[arg(help = "User ID")]
        user_id: Uuid,
        #[arg(help = "New role: admin, agent or client")]
        role: Role,
        #[arg(long, help = "Also activate (true) or deactivate (false) the account")]
        active: Option<bool>,
    },
}

pub async fn handle(cmd: AuthCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let client = build_client()?;

    match cmd {
        AuthCommands::Signup {
            email,
            full_name,
            phone,
            password,
        } => {
            let password = resolve_password(password)?;
            let context = build_context(&client);
            let mut request = SignUpRequest::new(email, password, full_name);
            request.phone = phone;

            let identity = context.sign_up(request).await?;
            let confirmed = identity.email_confirmed_at.is_some();
            let message = if confirmed {
                "Account created and signed in"
            } else {
                "Account created; check your email for the confirmation code, then run 'realty auth verify'"
            };
            output_success(
                &output_format,
                message,
                Some(json!({
                    "user_id": identity.id,
                    "email": identity.email,
                    "confirmed": confirmed
                })),
            )
        }
        AuthCommands::Verify { email, code } => {
            client.verify_email(&email, &code).await?;
            let context = build_context(&client);
            match context.refresh_profile().await? {
                Some(profile) => output_profile(&output_format, "Email confirmed, signed in", &profile),
                None => output_success(&output_format, "Email confirmed, but no profile is available yet", None),
            }
        }
        AuthCommands::Login { email, password } => {
            let password = resolve_password(password)?;
            let context = build_context(&client);
            let profile = context.sign_in(&email, &password).await?;
            let destination = context.routes().after_sign_in(profile.role).to_string();

            output_profile(&output_format, &format!("Signed in (home: {})", destination), &profile)
        }
        AuthCommands::Logout => {
            let context = build_context(&client);
            context.sign_out().await?;
            output_success(&output_format, "Signed out", None)
        }
        AuthCommands::Status => {
            let context = build_context(&client);
            let mounted = context.mount().await;
            let state = context.state();
            mounted.unmount().await;

            let profile = state.profile();
            match output_format {
                OutputFormat::Json => {
                    println!(
                        "{}",
                        serde_json::to_string_pretty(&json!({
                            "state": state.label(),
                            "authenticated": state.is_authenticated(),
                            "role": profile.map(|p| p.role),
                            "email": profile.map(|p| p.email.clone()),
                            "backend": client.base_url().as_str()
                        }))?
                    );
                }
                OutputFormat::Text => {
                    println!("Backend: {}", client.base_url());
                    println!("Status:  {}", state);
                }
            }
            Ok(())
        }
        AuthCommands::Whoami => {
            let identity = client.current_user().await?;
            let context = build_context(&client);
            let profile: Option<Profile> = context.refresh_profile().await?;

            match output_format {
                OutputFormat::Json => {
                    println!(
                        "{}",
                        serde_json::to_string_pretty(&json!({
                            "identity": identity,
                            "profile": profile.as_ref().map(Profile::to_row)
                        }))?
                    );
                    Ok(())
                }
                OutputFormat::Text => match profile {
                    Some(profile) => output_profile(&output_format, "Signed in", &profile),
                    None => {
                        println!("Identity {} has no usable profile", identity.id);
                        Ok(())
                    }
                },
            }
        }
        AuthCommands::Refresh => {
            let session = client.refresh_session().await?;
            output_success(
                &output_format,
                "Session refreshed",
                Some(json!({
                    "user_id": session.user.id,
                    "expires_at": session.expires_at_utc()
                })),
            )
        }
        AuthCommands::SetRole { user_id, role, active } => {
            if client.get_session().await?.is_none() {
                return Err(anyhow::anyhow!("Not signed in. Use 'realty auth login <email>' first"));
            }

            let update = ProfileUpdate {
                is_active: active,
                ..ProfileUpdate::role(role)
            };
            let row = client
                .update_profile(user_id, &update)
                .await?
                .ok_or_else(|| anyhow::anyhow!("No profile {} visible to the current user", user_id))?;

            let profile = Profile::from_row(&row)?;
            output_profile(&output_format, &format!("Role set to {}", profile.role), &profile)
        }
    }
}
