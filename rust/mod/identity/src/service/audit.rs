use kubedeck_core::Page;
use kubedeck_store::{Condition, QueryWindow, Record};
use tracing::warn;

use crate::model::{LoginLog, OperationLog};
use crate::service::{IdentityError, IdentityService};

impl IdentityService {
    fn append<T: Record>(&self, mut entry: T) -> Result<(), IdentityError> {
        let mut tx = self.store.begin(true)?;
        tx.save(&mut entry)?;
        tx.commit()?;
        Ok(())
    }

    /// Record an operation. Storage failures are logged, never returned.
    pub fn record_operation(&self, log: OperationLog) {
        let operator = log.operator.clone();
        if let Err(e) = self.append(log) {
            warn!(operator = %operator, error = %e, "failed to record operation log");
        }
    }

    /// Record a login. Storage failures are logged, never returned.
    pub fn record_login(&self, log: LoginLog) {
        let user = log.user_name.clone();
        if let Err(e) = self.append(log) {
            warn!(user = %user, error = %e, "failed to record login log");
        }
    }

    pub fn search_operation_logs(
        &self,
        conditions: &[Condition],
        window: QueryWindow,
    ) -> Result<Page<OperationLog>, IdentityError> {
        Ok(self.store.search(conditions, window)?)
    }

    pub fn search_login_logs(
        &self,
        conditions: &[Condition],
        window: QueryWindow,
    ) -> Result<Page<LoginLog>, IdentityError> {
        Ok(self.store.search(conditions, window)?)
    }
}
