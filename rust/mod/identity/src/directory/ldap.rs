use std::time::Duration;

use async_trait::async_trait;
use ldap3::{ldap_escape, Ldap, LdapConnAsync, LdapConnSettings, Scope, SearchEntry, SearchOptions, SearchResult};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{DirectoryClient, DirectoryConnector, DirectoryEntry, DirectoryError, SearchRequest};
use crate::model::DirectoryDescriptor;

const RC_SUCCESS: u32 = 0;
const RC_SIZE_LIMIT_EXCEEDED: u32 = 4;
const RC_INVALID_CREDENTIALS: u32 = 49;

/// Filter selecting one user by login name, restricted to the configured
/// search filter when there is one.
pub fn user_filter(base_filter: &str, name_attribute: &str, username: &str) -> String {
    let term = format!("({}={})", name_attribute, ldap_escape(username));
    let base = base_filter.trim();
    if base.is_empty() {
        return term;
    }
    if base.starts_with('(') {
        format!("(&{}{})", base, term)
    } else {
        format!("(&({}){})", base, term)
    }
}

/// Connects to LDAP servers with `ldap3`.
#[derive(Debug, Clone)]
pub struct LdapConnector {
    connect_timeout: Duration,
}

impl LdapConnector {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

#[async_trait]
impl DirectoryConnector for LdapConnector {
    async fn connect(
        &self,
        descriptor: &DirectoryDescriptor,
    ) -> Result<Box<dyn DirectoryClient>, DirectoryError> {
        let url = descriptor.url();
        debug!(url = %url, "connecting to directory");

        let settings = LdapConnSettings::new().set_conn_timeout(self.connect_timeout);
        let (conn, mut ldap) = LdapConnAsync::with_settings(settings, &url)
            .await
            .map_err(|e| DirectoryError::Unavailable(format!("connect {}: {}", url, e)))?;

        tokio::spawn(async move {
            if let Err(e) = conn.drive().await {
                warn!(error = %e, "LDAP connection driver error");
            }
        });

        let result = ldap
            .simple_bind(&descriptor.username, &descriptor.password)
            .await
            .map_err(|e| DirectoryError::Unavailable(format!("bind {}: {}", descriptor.username, e)))?;
        if result.rc != RC_SUCCESS {
            return Err(DirectoryError::Unavailable(format!(
                "service account bind failed with code {}: {}",
                result.rc, result.text
            )));
        }

        info!(url = %url, "directory connection established");
        Ok(Box::new(LdapClient { ldap }))
    }
}

/// A bound `ldap3` session.
pub struct LdapClient {
    ldap: Ldap,
}

impl LdapClient {
    async fn run_search(
        &mut self,
        request: &SearchRequest,
        cancel: &CancellationToken,
    ) -> Result<Vec<DirectoryEntry>, DirectoryError> {
        let options = SearchOptions::new()
            .sizelimit(request.size_limit)
            .timelimit(request.time_limit);
        let search = self.ldap.with_search_options(options).search(
            &request.base_dn,
            Scope::Subtree,
            &request.filter,
            request.attributes.clone(),
        );

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(DirectoryError::Cancelled),
            result = search => result,
        };

        let SearchResult(entries, res) =
            result.map_err(|e| DirectoryError::Unavailable(format!("search: {}", e)))?;
        match res.rc {
            RC_SUCCESS => {}
            RC_SIZE_LIMIT_EXCEEDED => {
                warn!(
                    limit = request.size_limit,
                    returned = entries.len(),
                    "directory size limit reached, result is partial"
                );
            }
            rc => {
                return Err(DirectoryError::Unavailable(format!(
                    "search failed with code {}: {}",
                    rc, res.text
                )));
            }
        }

        Ok(entries
            .into_iter()
            .map(SearchEntry::construct)
            .map(|e| DirectoryEntry {
                dn: e.dn,
                attrs: e.attrs,
            })
            .collect())
    }
}

#[async_trait]
impl DirectoryClient for LdapClient {
    async fn search(
        &mut self,
        request: &SearchRequest,
        cancel: &CancellationToken,
    ) -> Result<Vec<DirectoryEntry>, DirectoryError> {
        let entries = self.run_search(request, cancel).await?;
        debug!(filter = %request.filter, count = entries.len(), "directory search done");
        Ok(entries)
    }

    async fn bind(&mut self, request: &SearchRequest, password: &str) -> Result<(), DirectoryError> {
        // An empty password would be an unauthenticated bind, which servers accept.
        if password.is_empty() {
            return Err(DirectoryError::InvalidCredentials);
        }

        let lookup = SearchRequest {
            attributes: vec!["1.1".to_string()],
            ..request.clone()
        };
        let entries = self.run_search(&lookup, &CancellationToken::new()).await?;
        let dn = match entries.as_slice() {
            [] => return Err(DirectoryError::InvalidCredentials),
            [entry] => entry.dn.clone(),
            _ => {
                return Err(DirectoryError::Unavailable(format!(
                    "user filter {} matched {} entries",
                    request.filter,
                    entries.len()
                )))
            }
        };

        let result = self
            .ldap
            .simple_bind(&dn, password)
            .await
            .map_err(|e| DirectoryError::Unavailable(format!("bind {}: {}", dn, e)))?;
        match result.rc {
            RC_SUCCESS => Ok(()),
            RC_INVALID_CREDENTIALS => Err(DirectoryError::InvalidCredentials),
            rc => Err(DirectoryError::Unavailable(format!(
                "user bind failed with code {}: {}",
                rc, result.text
            ))),
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.ldap.unbind().await {
            warn!(error = %e, "error during LDAP unbind");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_filter_escapes_and_scopes() {
        assert_eq!(user_filter("", "uid", "alice"), "(uid=alice)");
        assert_eq!(
            user_filter("(objectClass=person)", "uid", "alice"),
            "(&(objectClass=person)(uid=alice))"
        );
        assert_eq!(
            user_filter("objectClass=person", "cn", "bob"),
            "(&(objectClass=person)(cn=bob))"
        );
        assert_eq!(user_filter("", "uid", "a*)(x"), "(uid=a\\2a\\29\\28x)");
    }
}
