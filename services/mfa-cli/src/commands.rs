//! Command dispatch
//!
//! Each command builds what it needs from the configuration and reports its
//! results through the prompter. Server-side failures are printed here and
//! count as a handled outcome.

use mfa_auth::{
    Error, HttpClient, LoginOutcome, MfaClient, Prompter, Result, SettingsStore, TokenStore,
};
use tracing::{info, warn};

use crate::cli::{AssociateAction, Command};
use crate::config::Config;

pub async fn run(
    command: Command,
    config: &Config,
    http: HttpClient,
    prompter: &dyn Prompter,
) -> Result<()> {
    match command {
        Command::Setup => setup(&settings_store(config), prompter).await,
        Command::Logout => logout(&token_store(config), prompter).await,
        Command::Token => {
            let client = connect(config, http, prompter).await?;
            token(&client, prompter).await
        }
        Command::Associate { action } => {
            let client = connect(config, http, prompter).await?;
            associate(&client, action.unwrap_or(AssociateAction::List), prompter).await
        }
    }
}

fn settings_store(config: &Config) -> SettingsStore {
    SettingsStore::new(config.storage.settings_file.clone())
}

fn token_store(config: &Config) -> TokenStore {
    TokenStore::new(config.storage.token_file.clone())
}

/// Load the tenant settings (running setup if needed) and build the client.
async fn connect(config: &Config, http: HttpClient, prompter: &dyn Prompter) -> Result<MfaClient> {
    let settings = settings_store(config).load_or_setup(prompter).await?;
    Ok(MfaClient::new(http, settings, token_store(config))
        .with_scope(config.grant.scope.clone())
        .with_audience(config.grant.audience.clone())
        .with_poll_interval(config.grant.poll_interval()))
}

async fn setup(store: &SettingsStore, prompter: &dyn Prompter) -> Result<()> {
    let settings = store.setup(prompter).await?;
    prompter.show(&format!(
        "Settings saved to {} (domain {}, client ID {})",
        store.path().display(),
        settings.domain,
        settings.client_id
    ));
    Ok(())
}

async fn logout(store: &TokenStore, prompter: &dyn Prompter) -> Result<()> {
    if !store.clear().await? {
        info!("no stored access token");
    }
    prompter.show("Logged out");
    Ok(())
}

async fn token(client: &MfaClient, prompter: &dyn Prompter) -> Result<()> {
    let outcome = client.login(prompter).await?;
    report_login(&outcome, prompter);
    Ok(())
}

fn report_login(outcome: &LoginOutcome, prompter: &dyn Prompter) {
    match outcome {
        LoginOutcome::StoredToken(token) => {
            prompter.show("Found valid access token in storage");
            prompter.show(&format!("Access token: {token}"));
        }
        LoginOutcome::Granted(grant) => {
            match grant.expires_in {
                Some(secs) => prompter.show(&format!("Got access token, expires in {secs}s")),
                None => prompter.show("Got access token"),
            }
            prompter.show(&format!("Access token: {}", grant.access_token));
        }
        LoginOutcome::Failed(failure) => {
            warn!(%failure, "login failed");
            prompter.show(&format!("Login failed: {failure}"));
        }
    }
}

async fn associate(
    client: &MfaClient,
    action: AssociateAction,
    prompter: &dyn Prompter,
) -> Result<()> {
    let Some(access_token) = client.access_token(prompter).await? else {
        prompter.show("Not logged in, cannot use the authenticator API");
        return Ok(());
    };

    match action {
        AssociateAction::List => {
            let authenticators = client.list_authenticators(&access_token).await?;
            if authenticators.is_empty() {
                prompter.show("No authenticators");
                return Ok(());
            }
            let json = serde_json::to_string_pretty(&authenticators)
                .map_err(|e| Error::UnexpectedResponse(format!("authenticator list: {e}")))?;
            prompter.show(&json);
        }
        AssociateAction::New => {
            let outcome = client.associate_new(&access_token, prompter).await?;
            report_login(&outcome, prompter);
        }
        AssociateAction::Delete { id } => {
            let id = match id {
                Some(id) => id,
                None => prompter.input_validated(
                    "Please enter the authenticator ID",
                    &mfa_auth::prompt::non_empty,
                )?,
            };
            if client.delete_authenticator(&access_token, &id).await? {
                prompter.show(&format!("Deleted authenticator {id}"));
            } else {
                prompter.show(&format!("Could not delete authenticator {id}"));
            }
        }
        AssociateAction::DeleteAll => {
            let report = client.delete_all_authenticators(&access_token).await?;
            prompter.show(&format!(
                "Deleted {} of {} authenticators",
                report.deleted.len(),
                report.attempted()
            ));
            for id in &report.failed {
                prompter.show(&format!("- failed: {id}"));
            }
            for id in &report.skipped {
                prompter.show(&format!("- kept recovery code: {id}"));
            }
        }
    }
    Ok(())
}
