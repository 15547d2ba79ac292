use anyhow::{anyhow, Result};
use keyring::{Entry, Error as KeyringError};

const SERVICE: &str = "mailmate";

/// Save the OAuth client secret into the OS keyring, keyed by client_id.
/// Per-user access/refresh tokens live in the database; only this app-level
/// secret belongs in the keyring.
pub fn save_client_secret(client_id: &str, client_secret: &str) -> Result<()> {
    let entry = Entry::new(SERVICE, client_id);
    entry?
        .set_password(client_secret)
        .map_err(|e| anyhow!(e.to_string()))?;
    Ok(())
}

/// Load client secret from keyring by client_id
pub fn load_client_secret(client_id: &str) -> Result<Option<String>> {
    let entry = Entry::new(SERVICE, client_id);
    match entry?.get_password() {
        Ok(v) => Ok(Some(v)),
        Err(KeyringError::NoEntry) => Ok(None),
        Err(e) => Err(anyhow!(e.to_string())),
    }
}
