//! User commands beyond search.

use anyhow::Result;
use tracing::warn;

use identity::model::LoginLog;
use identity::IdentityService;

/// Authenticate a directory user and record the attempt.
pub async fn login(svc: &IdentityService, name: &str, password: &str) -> Result<()> {
    let user = svc.get_user(name)?;
    let result = svc.login(&user, password).await;

    let mut entry = LoginLog::new(&user.name, "127.0.0.1", "local");
    entry.success = result.is_ok();
    svc.record_login(entry);

    if let Err(e) = result {
        warn!(user = %user.name, error = %e, "login failed");
        return Err(e.into());
    }
    println!("Login as {} succeeded.", user.name);
    Ok(())
}
