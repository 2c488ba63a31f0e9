//! Effective credential resolution
//!
//! Precedence: an explicit call-time password wins, then the environment's
//! root password when the user code is `root`, then the master password.
//! Nothing resolvable is a terminal input error raised before any network
//! call; a corrupt stored secret is a hard configuration stop.

use crate::crypto;
use crate::environment::Environment;
use crate::errors::{AutomationError, AutomationResult};

pub const ROOT_USER_CODE: &str = "root";

/// Resolve the plaintext password for `user_code` against `env`.
pub fn resolve_password(
    env: &Environment,
    user_code: &str,
    explicit: Option<&str>,
    key: &[u8; 32],
) -> AutomationResult<String> {
    if let Some(pass) = explicit {
        if !pass.is_empty() {
            return Ok(pass.to_string());
        }
    }

    if user_code == ROOT_USER_CODE {
        if let Some(enc) = &env.root_password_enc {
            return decrypt_stored(enc, key, "root password");
        }
    }

    if let Some(enc) = &env.master_password_enc {
        return decrypt_stored(enc, key, "master password");
    }

    Err(AutomationError::validation(
        "pass",
        format!(
            "no password resolvable for user '{user_code}' on environment '{}'",
            env.name
        ),
    ))
}

fn decrypt_stored(enc: &str, key: &[u8; 32], what: &str) -> AutomationResult<String> {
    crypto::decrypt_from_b64(enc, key)
        .map_err(|e| AutomationError::decryption(format!("{what}: {e}")))
}
