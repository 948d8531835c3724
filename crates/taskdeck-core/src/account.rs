use std::fmt;

use tracing::{info, instrument, warn};

use crate::error::ClientError;
use crate::gateway::AccountGateway;
use crate::session::Session;
use crate::wire::{Credentials, UserDto};

pub const PASSWORD_REQUIREMENTS_UNMET: &str =
    "Please make sure the password meets all the requirements.";

const SYMBOLS: &str = r#"!@#$%^&*(),.?":{}|<>"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PasswordStrength {
    Weak,
    Medium,
    Strong,
}

impl fmt::Display for PasswordStrength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Weak => "Weak",
            Self::Medium => "Medium",
            Self::Strong => "Strong",
        })
    }
}

/// Result of checking a signup password against the form's rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordCheck {
    pub min_length: bool,
    pub number_or_symbol: bool,
    pub excludes_username: bool,
    pub strength: PasswordStrength,
}

impl PasswordCheck {
    pub fn evaluate(username: &str, password: &str) -> Self {
        let has_number_or_symbol = password
            .chars()
            .any(|c| c.is_ascii_digit() || SYMBOLS.contains(c));
        let contains_username = !username.is_empty()
            && password.to_lowercase().contains(&username.to_lowercase());
        let length = password.chars().count();

        let strength = if contains_username {
            PasswordStrength::Weak
        } else if length >= 8 && has_number_or_symbol {
            PasswordStrength::Strong
        } else if length >= 6 && has_number_or_symbol {
            PasswordStrength::Medium
        } else {
            PasswordStrength::Weak
        };

        Self {
            min_length: length >= 8,
            number_or_symbol: has_number_or_symbol,
            excludes_username: !contains_username,
            strength,
        }
    }

    pub fn passes(&self) -> bool {
        self.min_length && self.number_or_symbol && self.excludes_username
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AccountError {
    #[error("username and password are required")]
    MissingCredentials,
    #[error("Please make sure the password meets all the requirements.")]
    WeakPassword(PasswordCheck),
    #[error(transparent)]
    Client(#[from] ClientError),
}

fn require_credentials(username: &str, password: &str) -> Result<Credentials, AccountError> {
    let username = username.trim();
    if username.is_empty() || password.is_empty() {
        return Err(AccountError::MissingCredentials);
    }
    Ok(Credentials {
        username: username.to_string(),
        password: password.to_string(),
    })
}

/// Register a new account. Refused locally unless the password passes every
/// rule of [`PasswordCheck`].
#[instrument(skip(gateway, password))]
pub async fn signup<G: AccountGateway>(
    gateway: &G,
    username: &str,
    password: &str,
) -> Result<PasswordCheck, AccountError> {
    let credentials = require_credentials(username, password)?;
    let check = PasswordCheck::evaluate(&credentials.username, password);
    if !check.passes() {
        warn!(?check, "signup refused locally");
        return Err(AccountError::WeakPassword(check));
    }
    gateway.signup(&credentials).await?;
    info!(username = %credentials.username, "account created");
    Ok(check)
}

#[instrument(skip(gateway, session, password))]
pub async fn login<G: AccountGateway>(
    gateway: &G,
    session: &mut Session,
    username: &str,
    password: &str,
) -> Result<(), AccountError> {
    let credentials = require_credentials(username, password)?;
    let response = gateway.login(&credentials).await?;
    let name = response.username.unwrap_or(credentials.username);
    session.sign_in(&name, response.token)?;
    Ok(())
}

pub fn logout(session: &mut Session) -> Result<(), ClientError> {
    session.teardown()
}

/// Fetch `/me`. A rejected token tears the session down so the next run
/// starts from the login flow.
#[instrument(skip(gateway, session))]
pub async fn refresh_current_user<G: AccountGateway>(
    gateway: &G,
    session: &mut Session,
) -> Result<UserDto, ClientError> {
    let token = session.require_token()?.to_string();
    match gateway.current_user(&token).await {
        Ok(user) => {
            session.set_current_user(user.clone());
            Ok(user)
        }
        Err(err) => {
            if err.is_auth() {
                warn!(error = %err, "token rejected; clearing session");
                session.teardown()?;
            }
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strength_levels() {
        assert_eq!(PasswordCheck::evaluate("ada", "hunter2!x").strength, PasswordStrength::Strong);
        assert_eq!(PasswordCheck::evaluate("ada", "abc12!").strength, PasswordStrength::Medium);
        assert_eq!(PasswordCheck::evaluate("ada", "abcdefgh").strength, PasswordStrength::Weak);
        assert_eq!(PasswordCheck::evaluate("ada", "a1").strength, PasswordStrength::Weak);
    }

    #[test]
    fn password_containing_username_is_weak_and_fails() {
        let check = PasswordCheck::evaluate("Ada", "myADAsecret#1");
        assert!(!check.excludes_username);
        assert!(check.min_length);
        assert!(check.number_or_symbol);
        assert_eq!(check.strength, PasswordStrength::Weak);
        assert!(!check.passes());
    }

    #[test]
    fn passing_password_meets_every_rule() {
        let check = PasswordCheck::evaluate("ada", "correct-horse-9");
        assert!(check.passes());
        assert!(!PasswordCheck::evaluate("ada", "short1").passes());
        assert!(!PasswordCheck::evaluate("ada", "noDigitsHere").passes());
    }

    #[test]
    fn blank_credentials_are_refused() {
        assert!(matches!(
            require_credentials("  ", "pw"),
            Err(AccountError::MissingCredentials)
        ));
        assert!(matches!(
            require_credentials("ada", ""),
            Err(AccountError::MissingCredentials)
        ));
    }
}
