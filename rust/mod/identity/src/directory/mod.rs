//! Directory client abstraction.
//!
//! The pipeline talks to the external directory only through
//! [`DirectoryConnector`] and [`DirectoryClient`]; [`ldap::LdapConnector`]
//! is the production implementation.

pub mod ldap;

#[cfg(test)]
pub(crate) mod memory;

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::model::DirectoryDescriptor;

#[derive(Debug, Error)]
pub enum DirectoryError {
    /// Connect, bind or search failed.
    #[error("directory unavailable: {0}")]
    Unavailable(String),

    /// The directory rejected the supplied user credentials.
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("directory operation cancelled")]
    Cancelled,
}

/// One search result: a DN and its multi-valued attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub dn: String,
    pub attrs: HashMap<String, Vec<String>>,
}

impl DirectoryEntry {
    pub fn new(dn: impl Into<String>) -> Self {
        Self {
            dn: dn.into(),
            attrs: HashMap::new(),
        }
    }

    /// Builder-style attribute setter.
    pub fn with_attr(mut self, name: impl Into<String>, values: &[&str]) -> Self {
        self.attrs
            .insert(name.into(), values.iter().map(|v| v.to_string()).collect());
        self
    }
}

/// Subtree search parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub base_dn: String,
    pub filter: String,
    pub size_limit: i32,
    pub time_limit: i32,
    /// Attributes to return. Empty returns all user attributes.
    pub attributes: Vec<String>,
}

impl SearchRequest {
    /// The configured search of a descriptor.
    pub fn from_descriptor(descriptor: &DirectoryDescriptor, attributes: Vec<String>) -> Self {
        Self {
            base_dn: descriptor.base_dn.clone(),
            filter: descriptor.filter.clone(),
            size_limit: descriptor.size_limit,
            time_limit: descriptor.time_limit,
            attributes,
        }
    }

    /// Same base and limits, different filter.
    pub fn with_filter(&self, filter: impl Into<String>) -> Self {
        Self {
            filter: filter.into(),
            ..self.clone()
        }
    }
}

/// An open, service-account-authenticated directory session.
#[async_trait]
pub trait DirectoryClient: Send {
    /// Run a subtree search. Zero entries is a valid result.
    async fn search(
        &mut self,
        request: &SearchRequest,
        cancel: &CancellationToken,
    ) -> Result<Vec<DirectoryEntry>, DirectoryError>;

    /// Find the single entry matching `request.filter` and bind as it with
    /// `password`.
    async fn bind(&mut self, request: &SearchRequest, password: &str)
        -> Result<(), DirectoryError>;

    /// Release the session. Errors are logged, not returned.
    async fn close(&mut self) {}
}

/// Opens sessions against a descriptor.
#[async_trait]
pub trait DirectoryConnector: Send + Sync {
    /// Connect and authenticate with the descriptor's service account.
    async fn connect(
        &self,
        descriptor: &DirectoryDescriptor,
    ) -> Result<Box<dyn DirectoryClient>, DirectoryError>;
}
