//! Supplier proofing: outbound proof requests and the inbound proof poller.

mod poller;
mod request;

pub use poller::{ArchivedProof, PollReport, ProofPoller, MAX_PROOF_BYTES};
pub use request::{
    supplier_reference, template_id_from_reference, ProofRequestQueue, ProofingRequest,
};
