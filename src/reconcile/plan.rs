//! Turns deltas into an ordered list of chain writes.

use super::diff::Delta;
use crate::{
    error::ReadError,
    types::{ConnectionId, EnforcedOption, Endpoint, EndpointId},
};
use serde::Serialize;
use std::fmt;

/// A single unit of work in a [`Plan`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlanStep {
    /// Register `peer` on `endpoint`.
    RegisterPeer {
        /// Endpoint to write to.
        endpoint: Endpoint,
        /// Peer to register.
        peer: Endpoint,
    },
    /// Enforce `options` on `endpoint` for messages sent to `peer`.
    SetEnforcedOptions {
        /// Endpoint to write to.
        endpoint: Endpoint,
        /// Peer the options apply to.
        peer: Endpoint,
        /// Options to enforce.
        options: Vec<EnforcedOption>,
        /// Whether the [`PlanStep::RegisterPeer`] for the same pair precedes this step and has
        /// to succeed first.
        depends_on_registration: bool,
    },
    /// The connection could not be planned because its state is unknown.
    Blocked {
        /// The affected connection.
        connection: ConnectionId,
        /// Why the state is unknown.
        #[serde(serialize_with = "serialize_display")]
        cause: ReadError,
    },
}

impl PlanStep {
    /// Endpoint id of the chain the step writes to.
    pub fn eid(&self) -> EndpointId {
        match self {
            Self::RegisterPeer { endpoint, .. } | Self::SetEnforcedOptions { endpoint, .. } => {
                endpoint.eid
            }
            Self::Blocked { connection, .. } => connection.from,
        }
    }

    /// The connection the step belongs to.
    pub fn connection(&self) -> ConnectionId {
        match self {
            Self::RegisterPeer { endpoint, peer }
            | Self::SetEnforcedOptions { endpoint, peer, .. } => {
                ConnectionId::new(endpoint.eid, peer.eid)
            }
            Self::Blocked { connection, .. } => *connection,
        }
    }

    /// Whether the step cannot be executed.
    pub fn is_blocked(&self) -> bool {
        matches!(self, Self::Blocked { .. })
    }

    /// Short name of the step kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RegisterPeer { .. } => "register_peer",
            Self::SetEnforcedOptions { .. } => "set_enforced_options",
            Self::Blocked { .. } => "blocked",
        }
    }
}

impl fmt::Display for PlanStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RegisterPeer { endpoint, peer } => {
                write!(f, "setPeer on {endpoint}: peer {peer}")
            }
            Self::SetEnforcedOptions { endpoint, peer, options, .. } => {
                write!(f, "setEnforcedOptions on {endpoint} for {}: ", peer.eid)?;
                for (index, option) in options.iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{} {}", option.key(), option.value())?;
                }
                Ok(())
            }
            Self::Blocked { connection, cause } => write!(f, "blocked {connection}: {cause}"),
        }
    }
}

/// Ordered list of steps that bring the chains to the desired state.
///
/// For any connection, the [`PlanStep::RegisterPeer`] step comes before its
/// [`PlanStep::SetEnforcedOptions`] step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Plan {
    steps: Vec<PlanStep>,
}

impl Plan {
    /// Builds a plan from `deltas`.
    ///
    /// Connections that are already converged produce no steps. Every option change of one
    /// (endpoint, peer) pair ends up in a single [`PlanStep::SetEnforcedOptions`].
    pub fn build(deltas: &[Delta]) -> Self {
        let mut steps = Vec::new();

        for delta in deltas {
            let delta = match delta {
                Delta::Resolved(delta) if delta.is_empty() => continue,
                Delta::Resolved(delta) => delta,
                Delta::Unresolvable { connection, cause } => {
                    steps.push(PlanStep::Blocked { connection: *connection, cause: cause.clone() });
                    continue;
                }
            };

            if delta.peer_registration_needed {
                steps.push(PlanStep::RegisterPeer { endpoint: delta.endpoint, peer: delta.peer });
            }

            if !delta.option_changes.is_empty() {
                steps.push(PlanStep::SetEnforcedOptions {
                    endpoint: delta.endpoint,
                    peer: delta.peer,
                    options: delta
                        .option_changes
                        .iter()
                        .map(|change| EnforcedOption::from_parts(change.key, change.new_value))
                        .collect(),
                    depends_on_registration: delta.peer_registration_needed,
                });
            }
        }

        Self { steps }
    }

    /// Creates a plan from already ordered steps.
    pub fn from_steps(steps: Vec<PlanStep>) -> Self {
        Self { steps }
    }

    /// The steps, in execution order.
    pub fn steps(&self) -> &[PlanStep] {
        &self.steps
    }

    /// Iterates over the steps.
    pub fn iter(&self) -> std::slice::Iter<'_, PlanStep> {
        self.steps.iter()
    }

    /// Number of steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether there is nothing to do.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Number of steps that write to a chain.
    pub fn executable_len(&self) -> usize {
        self.steps.iter().filter(|step| !step.is_blocked()).count()
    }
}

impl<'a> IntoIterator for &'a Plan {
    type Item = &'a PlanStep;
    type IntoIter = std::slice::Iter<'a, PlanStep>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.steps.is_empty() {
            return writeln!(f, "nothing to do");
        }
        for (index, step) in self.steps.iter().enumerate() {
            writeln!(f, "{:>3}. {step}", index + 1)?;
        }
        Ok(())
    }
}

pub(crate) fn serialize_display<T: fmt::Display, S: serde::Serializer>(
    value: &T,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_str(value)
}
