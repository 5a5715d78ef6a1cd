//! Form 34A write path
//!
//! Duplicate serial numbers are accepted and flagged, never rejected: the new
//! submission and a discrepancy referencing the earlier submission are
//! committed together in one transaction.
//!
//! The serial lookup and the insert are not serialized against other uploads.
//! Two uploads racing on the same serial can both see no earlier submission,
//! in which case neither records a discrepancy. The duplicate report still
//! shows the pair.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use fieldwatch_common::db::{normalize_optional, NewSubmission, SubmissionRecord};
use fieldwatch_common::store::{AgentDirectory, SubmissionProvider};
use fieldwatch_common::{Error, Result};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::extraction::FormExtractor;

/// An upload from an agent, image still base64-encoded
#[derive(Debug, Clone)]
pub struct FormUpload {
    pub agent_code: String,
    pub image_base64: String,
    pub polling_station_code: Option<String>,
    pub polling_station_name: Option<String>,
}

/// Collision with an earlier submission's serial number
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateSerial {
    pub serial_number: String,
    pub existing_submission_id: String,
    pub discrepancy_id: String,
}

/// Outcome of a successful upload
#[derive(Debug, Clone, Serialize)]
pub struct FormSubmission {
    pub submission: SubmissionRecord,
    pub duplicate: Option<DuplicateSerial>,
}

/// Validate, extract, store, and flag a duplicate serial if there is one.
///
/// Checks run in order: request fields, agent lookup, one form per agent,
/// image decoding, extraction. Nothing is persisted unless extraction
/// succeeds.
pub async fn submit_form<S, E>(
    store: &S,
    extractor: &E,
    upload: FormUpload,
) -> Result<FormSubmission>
where
    S: AgentDirectory + SubmissionProvider + ?Sized,
    E: FormExtractor + ?Sized,
{
    let agent_code = upload.agent_code.trim();
    if agent_code.is_empty() {
        return Err(Error::InvalidInput("agent_code is required".to_string()));
    }
    let image_base64 = upload.image_base64.trim();
    if image_base64.is_empty() {
        return Err(Error::InvalidInput("Form image is required".to_string()));
    }

    let agent = store
        .find_by_code(agent_code)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Agent not found: {}", agent_code)))?;

    if store.find_by_agent_code(agent_code).await?.is_some() {
        warn!(agent_code = %agent_code, "Rejected second Form 34A submission");
        return Err(Error::Conflict(format!(
            "Agent {} has already submitted a Form 34A",
            agent_code
        )));
    }

    let image = STANDARD
        .decode(image_base64)
        .map_err(|e| Error::InvalidInput(format!("image_base64 is not valid base64: {}", e)))?;

    let extracted = match extractor.extract(&image).await {
        Ok(form) => form,
        Err(Error::ExtractionFailed(msg)) => {
            warn!(agent_code = %agent_code, error = %msg, "Form extraction failed");
            return Err(Error::ExtractionFailed(msg));
        }
        Err(other) => {
            warn!(agent_code = %agent_code, error = %other, "Form extraction failed");
            return Err(Error::ExtractionFailed(other.to_string()));
        }
    };

    let serial_number = extracted.serial_number.trim().to_string();
    if serial_number.is_empty() {
        return Err(Error::ExtractionFailed(
            "No serial number found on the form".to_string(),
        ));
    }

    let prior = store.find_by_serial_number(&serial_number).await?;

    // Fall back to the agent's assigned station when the upload names none
    let (station_code, station_name) = match normalize_optional(upload.polling_station_code) {
        Some(code) => (Some(code), upload.polling_station_name),
        None => (
            agent.polling_station_code.clone(),
            agent.polling_station_name.clone(),
        ),
    };

    let new = NewSubmission {
        agent_code: agent.agent_code.clone(),
        serial_number: serial_number.clone(),
        location: agent.location(),
        polling_station_code: station_code,
        polling_station_name: station_name,
        image_digest: Some(format!("{:x}", Sha256::digest(&image))),
        candidates: extracted.candidates,
    };

    let Some(prior) = prior else {
        let record = store.create_submission(new).await?;
        info!(
            agent_code = %agent.agent_code,
            submission_id = %record.submission.id,
            serial_number = %serial_number,
            "Form 34A submission stored"
        );
        return Ok(FormSubmission {
            submission: record,
            duplicate: None,
        });
    };

    let (record, discrepancy) = store
        .create_flagged_submission(new, &[prior.id.clone()])
        .await?;
    warn!(
        agent_code = %agent.agent_code,
        serial_number = %serial_number,
        existing_submission_id = %prior.id,
        submission_id = %record.submission.id,
        "Form 34A stored with duplicate serial number, discrepancy recorded"
    );

    Ok(FormSubmission {
        submission: record,
        duplicate: Some(DuplicateSerial {
            serial_number,
            existing_submission_id: prior.id,
            discrepancy_id: discrepancy.id,
        }),
    })
}
