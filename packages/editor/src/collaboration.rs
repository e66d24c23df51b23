//! # Collaboration
//!
//! Local commits are queued as `RemoteUpdate`s for the transport to carry;
//! a peer's update is applied under the `collaboration` tag. Everything that
//! reacts to edits (interceptor, mode handler, post-effects) checks
//! `is_remote` first, so remote edits are never re-wrapped on this side.
//!
//! Convergence itself is the transport's concern. Mutations carry the keys
//! of the nodes they create, so replaying them in the same order on every
//! site yields the same tree.

use crate::mutations::Mutation;
use crate::transaction::COLLABORATION_TAG;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Whether a transaction with these tags came from a remote peer
pub fn is_remote(tags: &BTreeSet<String>) -> bool {
    tags.contains(COLLABORATION_TAG)
}

/// One committed transaction, as sent to peers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteUpdate {
    /// Site id of the editor that produced it
    pub origin_site: u32,
    /// Version of the producing editor after the commit
    pub version: u64,
    pub mutations: Vec<Mutation>,
}

impl RemoteUpdate {
    pub fn new(origin_site: u32, version: u64, mutations: Vec<Mutation>) -> Self {
        Self {
            origin_site,
            version,
            mutations,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Updates committed locally and not yet taken by the transport
#[derive(Debug, Default)]
pub struct Outbox {
    pending: Vec<RemoteUpdate>,
}

impl Outbox {
    pub fn push(&mut self, update: RemoteUpdate) {
        if !update.is_empty() {
            self.pending.push(update);
        }
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn drain(&mut self) -> Vec<RemoteUpdate> {
        std::mem::take(&mut self.pending)
    }
}
