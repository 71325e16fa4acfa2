//! Connection registry: owns every live backend session.
//!
//! Provides:
//! - `connect` / `connect_many` with per-backend failure isolation
//! - Lookup by backend id
//! - Stable iteration order (sorted by backend id)
//! - `shutdown`, which releases every session exactly once

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use super::errors::ConnectError;
use super::session::{Connector, ToolSession};
use super::types::{ServerEntry, ToolDescriptor, TOOL_NAME_SEPARATOR};

// ─── Connection ──────────────────────────────────────────────────────────────

/// One live backend: its session plus the tool catalog fetched at connect time.
pub struct Connection {
    backend_id: String,
    session: Box<dyn ToolSession>,
    tools: Vec<ToolDescriptor>,
}

impl Connection {
    pub fn backend_id(&self) -> &str {
        &self.backend_id
    }

    pub fn session(&self) -> &dyn ToolSession {
        self.session.as_ref()
    }

    pub fn tools(&self) -> &[ToolDescriptor] {
        &self.tools
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("backend_id", &self.backend_id)
            .field("tools", &self.tools.len())
            .finish_non_exhaustive()
    }
}

/// Result of one entry in [`ConnectionRegistry::connect_many`].
#[derive(Debug)]
pub enum ConnectOutcome {
    /// Registered, with this many tools.
    Connected { tool_count: usize },
    /// Skipped because the entry is marked `disabled`.
    Disabled,
    Failed(ConnectError),
}

impl ConnectOutcome {
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected { .. })
    }
}

// ─── ConnectionRegistry ──────────────────────────────────────────────────────

/// The set of live backend connections, keyed by backend id.
pub struct ConnectionRegistry {
    connector: Arc<dyn Connector>,
    connections: BTreeMap<String, Connection>,
}

impl ConnectionRegistry {
    /// Create an empty registry that opens sessions through `connector`.
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self {
            connector,
            connections: BTreeMap::new(),
        }
    }

    // ─── Connect ─────────────────────────────────────────────────────────

    /// Connect one backend and register it under `backend_id`.
    ///
    /// A duplicate id leaves the existing connection untouched. On any
    /// failure nothing is registered and nothing stays open.
    pub async fn connect(
        &mut self,
        backend_id: &str,
        entry: &ServerEntry,
    ) -> Result<usize, ConnectError> {
        if self.connections.contains_key(backend_id) {
            return Err(ConnectError::DuplicateBackend {
                backend_id: backend_id.to_string(),
            });
        }

        let connection = establish(self.connector.clone(), backend_id.to_string(), entry.clone())
            .await?;
        let tool_count = connection.tools.len();
        self.connections.insert(backend_id.to_string(), connection);
        Ok(tool_count)
    }

    /// Connect every entry concurrently.
    ///
    /// Disabled entries are skipped before any attempt. One backend failing
    /// never cancels or blocks the others; each gets its own outcome, in
    /// input order.
    pub async fn connect_many(
        &mut self,
        entries: impl IntoIterator<Item = (String, ServerEntry)>,
    ) -> Vec<(String, ConnectOutcome)> {
        let mut outcomes: Vec<(String, Option<ConnectOutcome>)> = Vec::new();
        let mut handles = Vec::new();
        let mut claimed: HashSet<String> = HashSet::new();

        for (backend_id, entry) in entries {
            if entry.disabled {
                tracing::info!(backend = %backend_id, "backend disabled, skipping");
                outcomes.push((backend_id, Some(ConnectOutcome::Disabled)));
                continue;
            }

            if self.connections.contains_key(&backend_id) || !claimed.insert(backend_id.clone()) {
                let err = ConnectError::DuplicateBackend {
                    backend_id: backend_id.clone(),
                };
                outcomes.push((backend_id, Some(ConnectOutcome::Failed(err))));
                continue;
            }

            let connector = self.connector.clone();
            let id = backend_id.clone();
            handles.push((
                outcomes.len(),
                tokio::spawn(async move { establish(connector, id, entry).await }),
            ));
            outcomes.push((backend_id, None));
        }

        let (slots, tasks): (Vec<usize>, Vec<_>) = handles.into_iter().unzip();
        let results = futures::future::join_all(tasks).await;

        for (slot, joined) in slots.into_iter().zip(results) {
            let backend_id = outcomes[slot].0.clone();
            let outcome = match joined {
                Ok(Ok(connection)) => {
                    let tool_count = connection.tools.len();
                    self.connections.insert(backend_id, connection);
                    ConnectOutcome::Connected { tool_count }
                }
                Ok(Err(e)) => ConnectOutcome::Failed(e),
                Err(join_err) => {
                    tracing::error!(backend = %backend_id, error = %join_err, "connect task panicked");
                    ConnectOutcome::Failed(ConnectError::HandshakeFailed {
                        backend_id,
                        source: super::errors::McpError::SpawnFailed {
                            name: outcomes[slot].0.clone(),
                            reason: format!("join error: {join_err}"),
                        },
                    })
                }
            };
            outcomes[slot].1 = Some(outcome);
        }

        outcomes
            .into_iter()
            .filter_map(|(id, outcome)| outcome.map(|o| (id, o)))
            .collect()
    }

    // ─── Lookup ──────────────────────────────────────────────────────────

    pub fn lookup(&self, backend_id: &str) -> Option<&Connection> {
        self.connections.get(backend_id)
    }

    /// All connections, ordered by backend id.
    pub fn all_connections(&self) -> impl Iterator<Item = (&str, &Connection)> {
        self.connections.iter().map(|(id, conn)| (id.as_str(), conn))
    }

    pub fn backend_ids(&self) -> Vec<String> {
        self.connections.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Total number of tools across all connections.
    pub fn tool_count(&self) -> usize {
        self.connections.values().map(|c| c.tools.len()).sum()
    }

    // ─── Shutdown ────────────────────────────────────────────────────────

    /// Close every connection and empty the registry.
    ///
    /// A failure closing one backend is logged and does not stop the rest.
    /// Returns the backends whose close failed. Calling it again is a no-op.
    pub async fn shutdown(&mut self) -> Vec<String> {
        let connections = std::mem::take(&mut self.connections);
        let mut failed = Vec::new();

        for (backend_id, mut connection) in connections {
            match connection.session.close().await {
                Ok(()) => tracing::info!(backend = %backend_id, "connection closed"),
                Err(e) => {
                    tracing::warn!(backend = %backend_id, error = %e, "error closing connection");
                    failed.push(backend_id);
                }
            }
        }

        failed
    }
}

// ─── Establish ───────────────────────────────────────────────────────────────

/// Validate, open, and fetch the catalog for one backend.
///
/// Runs without touching the registry so several can run concurrently.
/// If the catalog fetch fails the freshly opened session is closed before
/// the error is returned.
async fn establish(
    connector: Arc<dyn Connector>,
    backend_id: String,
    entry: ServerEntry,
) -> Result<Connection, ConnectError> {
    validate_backend_id(&backend_id)?;
    let config = entry.validate(&backend_id)?;

    tracing::info!(
        backend = %backend_id,
        command = %config.command,
        args = ?config.args,
        "connecting to backend"
    );

    let mut session = connector
        .open(&backend_id, &config)
        .await
        .map_err(|source| {
            tracing::warn!(backend = %backend_id, error = %source, "backend handshake failed");
            ConnectError::HandshakeFailed {
                backend_id: backend_id.clone(),
                source,
            }
        })?;

    let definitions = match session.list_tools().await {
        Ok(defs) => defs,
        Err(source) => {
            tracing::warn!(backend = %backend_id, error = %source, "failed to fetch tool catalog");
            if let Err(e) = session.close().await {
                tracing::warn!(backend = %backend_id, error = %e, "error releasing failed connection");
            }
            return Err(ConnectError::HandshakeFailed { backend_id, source });
        }
    };

    let tools: Vec<ToolDescriptor> = definitions
        .into_iter()
        .map(|def| ToolDescriptor::from_definition(&backend_id, def))
        .collect();

    tracing::info!(
        backend = %backend_id,
        tools = ?tools.iter().map(|t| t.name.as_str()).collect::<Vec<_>>(),
        "backend connected"
    );

    Ok(Connection {
        backend_id,
        session,
        tools,
    })
}

/// Backend ids must be non-empty and free of the tool-name separator,
/// otherwise qualified tool names stop being reversible.
fn validate_backend_id(backend_id: &str) -> Result<(), ConnectError> {
    let reason = if backend_id.trim().is_empty() {
        "backend id is empty".to_string()
    } else if backend_id.contains(TOOL_NAME_SEPARATOR) {
        format!("backend id must not contain '{TOOL_NAME_SEPARATOR}'")
    } else {
        return Ok(());
    };

    Err(ConnectError::InvalidConfig {
        backend_id: backend_id.to_string(),
        reason,
    })
}

// ─── Tests ───────────────────────────────────────────────────────────────────
