//! Admission state machine for TemporalCluster requests.
//!
//! Every request starts `Received` and ends in exactly one terminal phase:
//!
//! ```text
//! Received --Defaulted--> Defaulted --Validated--> Validated --Admitted--> Admitted
//!                                                            \--Rejected--> Rejected
//! Received --DeleteRequested--> Admitted
//! Defaulted --Admitted--> Admitted          (mutating endpoint)
//! ```
//!
//! Hard errors (malformed address, corrupted stored version, missing object)
//! abort the request before a terminal phase is reached; the transport turns
//! them into a denial. The machine is synchronous and performs no I/O.

use std::fmt;

use kube::core::admission::Operation;
use tracing::{debug, trace};

use crate::capabilities::CapabilitySnapshot;
use crate::crd::TemporalCluster;
use crate::version::VersionPolicy;
use crate::webhooks::defaulting::default_cluster;
use crate::webhooks::error::{AdmissionError, Result};
use crate::webhooks::field::Rejection;
use crate::webhooks::policies::{aggregate, validate_create, validate_update};

/// Phase of a single admission request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdmissionPhase {
    /// Decoded and waiting to be processed
    Received,
    /// Deprecated fields migrated and defaults applied
    Defaulted,
    /// All applicable policies evaluated
    Validated,
    /// Terminal: the request may be persisted
    Admitted,
    /// Terminal: at least one policy failed
    Rejected,
}

impl AdmissionPhase {
    /// Whether no further transition can leave this phase
    pub fn is_terminal(&self) -> bool {
        matches!(self, AdmissionPhase::Admitted | AdmissionPhase::Rejected)
    }
}

impl fmt::Display for AdmissionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdmissionPhase::Received => write!(f, "Received"),
            AdmissionPhase::Defaulted => write!(f, "Defaulted"),
            AdmissionPhase::Validated => write!(f, "Validated"),
            AdmissionPhase::Admitted => write!(f, "Admitted"),
            AdmissionPhase::Rejected => write!(f, "Rejected"),
        }
    }
}

/// Events that move a request between phases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdmissionEvent {
    /// Defaulting succeeded
    Defaulted,
    /// Validation ran to completion
    Validated,
    /// Validation produced no errors
    Admitted,
    /// Validation produced at least one error
    Rejected,
    /// The request deletes the resource
    DeleteRequested,
}

impl fmt::Display for AdmissionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdmissionEvent::Defaulted => write!(f, "Defaulted"),
            AdmissionEvent::Validated => write!(f, "Validated"),
            AdmissionEvent::Admitted => write!(f, "Admitted"),
            AdmissionEvent::Rejected => write!(f, "Rejected"),
            AdmissionEvent::DeleteRequested => write!(f, "DeleteRequested"),
        }
    }
}

/// A permitted edge of the machine
#[derive(Debug)]
struct Transition {
    from: AdmissionPhase,
    to: AdmissionPhase,
    event: AdmissionEvent,
}

impl Transition {
    const fn new(from: AdmissionPhase, to: AdmissionPhase, event: AdmissionEvent) -> Self {
        Self { from, to, event }
    }
}

const TRANSITIONS: [Transition; 6] = [
    Transition::new(
        AdmissionPhase::Received,
        AdmissionPhase::Defaulted,
        AdmissionEvent::Defaulted,
    ),
    Transition::new(
        AdmissionPhase::Received,
        AdmissionPhase::Admitted,
        AdmissionEvent::DeleteRequested,
    ),
    Transition::new(
        AdmissionPhase::Defaulted,
        AdmissionPhase::Validated,
        AdmissionEvent::Validated,
    ),
    // Mutating endpoint stops after defaulting
    Transition::new(
        AdmissionPhase::Defaulted,
        AdmissionPhase::Admitted,
        AdmissionEvent::Admitted,
    ),
    Transition::new(
        AdmissionPhase::Validated,
        AdmissionPhase::Admitted,
        AdmissionEvent::Admitted,
    ),
    Transition::new(
        AdmissionPhase::Validated,
        AdmissionPhase::Rejected,
        AdmissionEvent::Rejected,
    ),
];

/// Look up the phase reached from `from` on `event`, if the edge exists
pub fn next_phase(from: AdmissionPhase, event: AdmissionEvent) -> Option<AdmissionPhase> {
    TRANSITIONS
        .iter()
        .find(|t| t.from == from && t.event == event)
        .map(|t| t.to)
}

/// Events accepted in a phase
pub fn valid_events(phase: AdmissionPhase) -> Vec<AdmissionEvent> {
    TRANSITIONS
        .iter()
        .filter(|t| t.from == phase)
        .map(|t| t.event)
        .collect()
}

/// Phase tracker for one request
#[derive(Debug)]
struct PhaseTracker {
    phase: AdmissionPhase,
}

impl PhaseTracker {
    fn new() -> Self {
        Self {
            phase: AdmissionPhase::Received,
        }
    }

    fn advance(&mut self, event: AdmissionEvent) -> Result<AdmissionPhase> {
        let to = next_phase(self.phase, event).ok_or(AdmissionError::InvalidTransition {
            from: self.phase,
            event,
        })?;
        trace!(from = %self.phase, to = %to, event = %event, "Admission phase transition");
        self.phase = to;
        Ok(to)
    }
}

/// Final decision for a request
#[derive(Debug, Clone, PartialEq)]
pub enum AdmissionDecision {
    /// The request may proceed. Carries the defaulted object for CREATE and
    /// UPDATE, `None` for DELETE and CONNECT.
    Admitted {
        object: Option<Box<TemporalCluster>>,
    },
    /// The request violates at least one policy
    Rejected(Rejection),
}

impl AdmissionDecision {
    pub fn is_admitted(&self) -> bool {
        matches!(self, AdmissionDecision::Admitted { .. })
    }

    /// Terminal phase the request ended in
    pub fn phase(&self) -> AdmissionPhase {
        match self {
            AdmissionDecision::Admitted { .. } => AdmissionPhase::Admitted,
            AdmissionDecision::Rejected(_) => AdmissionPhase::Rejected,
        }
    }
}

/// Process-wide inputs for deciding admission requests
#[derive(Debug, Clone, Copy)]
pub struct Admission<'a> {
    policy: &'a VersionPolicy,
    capabilities: CapabilitySnapshot,
}

impl<'a> Admission<'a> {
    pub fn new(policy: &'a VersionPolicy, capabilities: CapabilitySnapshot) -> Self {
        Self {
            policy,
            capabilities,
        }
    }

    /// Default the object of a mutating request.
    ///
    /// Returns the defaulted object for CREATE and UPDATE and `None` for
    /// operations that carry nothing to default.
    pub fn mutate(
        &self,
        operation: &Operation,
        object: Option<TemporalCluster>,
    ) -> Result<Option<TemporalCluster>> {
        let mut tracker = PhaseTracker::new();

        match operation {
            Operation::Create | Operation::Update => {
                let mut cluster = object.ok_or(AdmissionError::MissingObject)?;
                default_cluster(&mut cluster)?;
                tracker.advance(AdmissionEvent::Defaulted)?;
                tracker.advance(AdmissionEvent::Admitted)?;
                Ok(Some(cluster))
            }
            Operation::Delete | Operation::Connect => {
                tracker.advance(AdmissionEvent::DeleteRequested)?;
                Ok(None)
            }
        }
    }

    /// Drive a request through defaulting and validation to a decision.
    pub fn run(
        &self,
        operation: &Operation,
        old: Option<TemporalCluster>,
        new: Option<TemporalCluster>,
    ) -> Result<AdmissionDecision> {
        let mut tracker = PhaseTracker::new();

        let (cluster, errors) = match operation {
            Operation::Delete | Operation::Connect => {
                tracker.advance(AdmissionEvent::DeleteRequested)?;
                debug!(operation = ?operation, "Admitting without validation");
                return Ok(AdmissionDecision::Admitted { object: None });
            }
            Operation::Create => {
                let mut cluster = new.ok_or(AdmissionError::MissingObject)?;
                default_cluster(&mut cluster)?;
                tracker.advance(AdmissionEvent::Defaulted)?;

                let errors = validate_create(self.policy, self.capabilities, &cluster);
                (cluster, errors)
            }
            Operation::Update => {
                let mut cluster = new.ok_or(AdmissionError::MissingObject)?;
                let old = old.ok_or(AdmissionError::MissingObject)?;
                default_cluster(&mut cluster)?;
                tracker.advance(AdmissionEvent::Defaulted)?;

                let errors = validate_update(self.policy, self.capabilities, &old, &cluster)?;
                (cluster, errors)
            }
        };
        tracker.advance(AdmissionEvent::Validated)?;

        match aggregate(&cluster, errors) {
            Ok(()) => {
                tracker.advance(AdmissionEvent::Admitted)?;
                Ok(AdmissionDecision::Admitted {
                    object: Some(Box::new(cluster)),
                })
            }
            Err(rejection) => {
                tracker.advance(AdmissionEvent::Rejected)?;
                Ok(AdmissionDecision::Rejected(rejection))
            }
        }
    }
}
