//! Command-line surface

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// A simple app that shows how OAuth 2.0 MFA endpoints work.
#[derive(Debug, Parser)]
#[command(name = "oauth2-mfa-cli", version)]
pub struct Cli {
    /// Print every HTTP request and response (secrets truncated)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to the TOML configuration file
    #[arg(long, global = true, env = "MFA_CLI_CONFIG", value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, PartialEq, Eq)]
pub enum Command {
    /// Perform a resource owner password credentials grant.
    ///
    /// Asks for username and password, then walks through whatever MFA the
    /// tenant requires. The access token is printed and stored in the token
    /// file. A stored token that still validates is reused.
    #[command(alias = "login")]
    Token,

    /// List, enroll or delete authenticators (logs in first if needed).
    #[command(alias = "authenticators")]
    Associate {
        #[command(subcommand)]
        action: Option<AssociateAction>,
    },

    /// Store the Auth0 domain and client ID used by the other commands.
    Setup,

    /// Discard the stored access token, if any.
    Logout,
}

#[derive(Debug, Subcommand, PartialEq, Eq)]
pub enum AssociateAction {
    /// List authenticators (the default).
    List,
    /// Associate a new authenticator.
    New,
    /// Delete an authenticator.
    Delete {
        /// Authenticator ID; prompted for when omitted
        id: Option<String>,
    },
    /// Delete all authenticators except recovery codes.
    DeleteAll,
}
