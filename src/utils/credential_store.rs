use keyring::Entry;

use crate::db::ConnectionInfo;

const SERVICE_NAME: &str = "query_wizard";

fn entry_for(connection_name: &str) -> Result<Entry, String> {
    Entry::new(SERVICE_NAME, connection_name).map_err(|e| format!("Keyring error: {}", e))
}

/// Store a password in the OS keyring for the given connection name.
pub fn store_password(connection_name: &str, password: &str) -> Result<(), String> {
    entry_for(connection_name)?
        .set_password(password)
        .map_err(|e| format!("Failed to store password in keyring: {}", e))
}

/// Retrieve a password from the OS keyring for the given connection name.
/// Returns Ok(None) if no credential is found (not an error).
pub fn get_password(connection_name: &str) -> Result<Option<String>, String> {
    match entry_for(connection_name)?.get_password() {
        Ok(password) => Ok(Some(password)),
        Err(keyring::Error::NoEntry) => Ok(None),
        Err(e) => Err(format!("Failed to retrieve password from keyring: {}", e)),
    }
}

/// Delete a password from the OS keyring for the given connection name.
/// Silently succeeds if no credential exists.
pub fn delete_password(connection_name: &str) -> Result<(), String> {
    match entry_for(connection_name)?.delete_credential() {
        Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
        Err(e) => Err(format!("Failed to delete password from keyring: {}", e)),
    }
}

/// Fill in the password of a saved connection, which is never written to
/// the config file. Leaves an already set password alone.
pub fn attach_password(info: &mut ConnectionInfo) -> Result<(), String> {
    if !info.password.is_empty() {
        return Ok(());
    }
    if let Some(password) = get_password(&info.name)? {
        info.password = password;
    } else {
        log::warn!("No stored password for connection '{}'", info.name);
    }
    Ok(())
}
