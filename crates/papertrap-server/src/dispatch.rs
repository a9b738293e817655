// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// IPP operation dispatcher.
//
// Routes decoded requests to per-operation handlers and owns the policy
// sequence for job ingestion: error simulation, before-hooks, the
// accepting-jobs gate, custom format restrictions, the process-hook
// chain, and persistence.  Every error is converted into an IPP status
// here — nothing but status codes leaves the process.

use papertrap_core::types::{CapturedJob, JobId, JobState};
use papertrap_ipp::capabilities::{
    PrinterFacts, apply_layer, default_printer_attributes, effective_accepting_jobs,
};
use papertrap_ipp::model::{Attribute, AttributeGroup, DelimiterTag, IppValue};
use papertrap_ipp::operation::{Operation, StatusCode};
use papertrap_ipp::packet::{IppPacket, PacketBuilder};
use papertrap_plugins::api::HookVerdict;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::service::{ServiceState, SimulatedFault};

/// Wire `job-state` for a Send-Document that is not the last document.
const JOB_STATE_INCOMING: i32 = 4;

/// Wire `job-state` for the aborted canned response.
const JOB_STATE_CANCELED: i32 = 7;

/// Dispatch one decoded request.  `raw_body` is the undecoded request
/// body, used when the codec returned an empty document tail.
pub async fn dispatch(state: &ServiceState, request: &IppPacket, raw_body: &[u8]) -> IppPacket {
    let simulation = *state.error_simulation.read().await;
    if simulation.enabled {
        return simulated_response(state, request, simulation.fault).await;
    }

    let Some(operation) = Operation::from_u16(request.code) else {
        // Offer unknown codes to plugins, then answer with a bare OK.
        let name = format!("0x{:04X}", request.code);
        let handled = state
            .registry
            .handle_custom_operation(&name, &request.groups)
            .await;
        debug!(operation = %name, handled, "non-standard operation");
        return ok_response(request.request_id);
    };

    // Required operation attributes (RFC 8011 §4.1.4).
    let has_charset = request
        .operation_attributes()
        .and_then(|g| g.get_str("attributes-charset"))
        .is_some();
    if !has_charset {
        return error_response(
            StatusCode::ClientErrorBadRequest,
            request.request_id,
            "missing required attributes-charset",
        );
    }

    info!(
        category = "IPP_PROTOCOL",
        operation = ?operation,
        request_id = request.request_id,
        "dispatching operation"
    );

    match operation {
        Operation::PrintJob => handle_ingest(state, request, raw_body, false).await,
        Operation::SendDocument => handle_ingest(state, request, raw_body, true).await,
        Operation::ValidateJob => ok_response(request.request_id),
        Operation::CreateJob => handle_create_job(state, request).await,
        Operation::CancelJob => handle_cancel_job(state, request).await,
        Operation::GetJobAttributes => handle_get_job_attributes(state, request).await,
        Operation::GetPrinterAttributes => handle_get_printer_attributes(state, request).await,
    }
}

// ---------------------------------------------------------------------------
// Ingestion (Print-Job, Send-Document)
// ---------------------------------------------------------------------------

async fn handle_ingest(
    state: &ServiceState,
    request: &IppPacket,
    raw_body: &[u8],
    is_send_document: bool,
) -> IppPacket {
    let op_attrs = request.operation_attributes();

    let job_name = op_attrs
        .and_then(|g| g.get_str("job-name"))
        .or_else(|| op_attrs.and_then(|g| g.get_str("document-name")))
        .unwrap_or("Untitled Document")
        .to_string();
    let document_format = op_attrs
        .and_then(|g| g.get_str("document-format"))
        .unwrap_or("application/octet-stream")
        .to_string();
    let originating_user = op_attrs
        .and_then(|g| g.get_str("requesting-user-name"))
        .unwrap_or("anonymous")
        .to_string();
    let last_document = op_attrs
        .and_then(|g| g.get_bool("last-document"))
        .unwrap_or(false);

    // Send-Document may address a job created earlier via Create-Job.
    let existing = if is_send_document {
        let referenced = op_attrs.and_then(|g| g.get_i32("job-id"));
        match referenced {
            Some(id) => state.jobs.read().await.get(&(id as u64)).cloned(),
            None => None,
        }
    } else {
        None
    };

    let mut job = match existing {
        Some(mut job) => {
            job.document_format = document_format.clone();
            job
        }
        None => CapturedJob::new(
            state.id_allocator.next(),
            job_name,
            document_format.clone(),
            originating_user,
        ),
    };

    // Locate the document: the codec's tail, or a scan over the full body.
    let (document, method) = if request.payload.is_empty() {
        papertrap_document::extract_document(raw_body)
    } else {
        papertrap_document::extract_document(&request.payload)
    };
    debug!(
        category = "DOCUMENT_PROCESSING",
        job_id = %job.id,
        bytes = document.len(),
        ?method,
        "document payload located"
    );

    job.size = document.len() as u64;
    job.set_state(JobState::Processing, "processing-to-stop-point");

    // Before-hook chain.
    match state.registry.run_before_hooks(&job).await {
        HookVerdict::Continue => {}
        HookVerdict::Reject(reason) => {
            info!(job_id = %job.id, reason = %reason, "job rejected by plugin");
            state.registry.run_after_hooks(&job, false).await;
            return error_response(
                StatusCode::ServerErrorServiceUnavailable,
                request.request_id,
                &reason,
            );
        }
        HookVerdict::Error { category, message } => {
            info!(
                job_id = %job.id,
                category = %category,
                "job failed by injected error"
            );
            job.set_state(JobState::Aborted, "job-canceled-by-system");
            job.metadata
                .insert("injected-error-category".into(), json!(category.keyword()));
            state.jobs.write().await.insert(job.id.0, job.clone());
            state.registry.run_after_hooks(&job, false).await;
            return aborted_response(state, request.request_id, job.id, &message);
        }
    }

    // Accepting-jobs gate: any composed layer may close the door.
    let composed = compose_printer_groups(state).await;
    if !effective_accepting_jobs(&composed) {
        info!(job_id = %job.id, "printer not accepting jobs");
        return error_response(
            StatusCode::ServerErrorServiceUnavailable,
            request.request_id,
            "printer-is-accepting-jobs is false",
        );
    }

    // Format restriction applies only when custom overrides are active.
    let custom = state.custom_attributes.read().await.clone();
    if let Some(custom) = custom {
        if let Some(formats) = custom.supported_formats() {
            if !formats.iter().any(|f| f == &document_format) {
                info!(
                    job_id = %job.id,
                    format = %document_format,
                    "document format outside restricted list"
                );
                return error_response(
                    StatusCode::ClientErrorDocumentFormatNotSupported,
                    request.request_id,
                    &format!("{document_format} is not in document-format-supported"),
                );
            }
        }
    }

    // Process-hook chain: first non-empty result wins.
    let mut document = document.to_vec();
    if let Some((plugin_id, outcome)) = state.registry.run_process_hooks(&job, &document).await {
        if let Some(mut modified) = outcome.modified_job {
            modified.id = job.id;
            job = modified;
        }
        for (key, value) in outcome.custom_metadata {
            job.metadata.insert(key, value);
        }
        if let Some(bytes) = outcome.processed_bytes {
            debug!(
                job_id = %job.id,
                plugin = %plugin_id,
                bytes = bytes.len(),
                "document replaced by plugin"
            );
            job.size = bytes.len() as u64;
            document = bytes;
        }
        if let Some(custom_response) = outcome.custom_response {
            state.jobs.write().await.insert(job.id.0, job.clone());
            state.registry.run_after_hooks(&job, true).await;
            let mut builder =
                PacketBuilder::new(custom_response.status, request.request_id);
            builder.operation_prelude(&custom_response.message);
            return builder.build();
        }
        if !outcome.should_continue {
            job.set_state(JobState::Aborted, "job-canceled-by-system");
            state.jobs.write().await.insert(job.id.0, job.clone());
            state.registry.run_after_hooks(&job, false).await;
            return aborted_response(
                state,
                request.request_id,
                job.id,
                "processing stopped by plugin",
            );
        }
    }

    // Persist the artifact.
    match state.store.persist(job.id, &job.document_format, &document).await {
        Ok(artifact) => {
            job.size = artifact.size;
            job.metadata.insert(
                "artifact-path".into(),
                json!(artifact.path.display().to_string()),
            );
            job.metadata.insert("sha256".into(), json!(artifact.sha256));

            let (wire_state, reason) = if is_send_document {
                if last_document {
                    job.set_state(JobState::Completed, "job-completed-successfully");
                    (JobState::Completed.ipp_enum_value(), "job-completed-successfully")
                } else {
                    job.set_state(JobState::Processing, "job-incoming");
                    (JOB_STATE_INCOMING, "job-incoming")
                }
            } else {
                (JobState::Processing.ipp_enum_value(), "processing-to-stop-point")
            };

            state.jobs.write().await.insert(job.id.0, job.clone());
            state.registry.run_after_hooks(&job, true).await;

            info!(
                category = "PRINT_JOB",
                job_id = %job.id,
                artifact = %artifact.path.display(),
                "job captured"
            );

            let mut builder = PacketBuilder::new(
                StatusCode::SuccessfulOk.as_u16(),
                request.request_id,
            );
            builder.operation_prelude(StatusCode::SuccessfulOk.message());
            builder
                .begin_group(DelimiterTag::JobAttributes)
                .attr("job-id", IppValue::Integer(job.id.as_ipp_integer()))
                .attr("job-uri", IppValue::Uri(job_uri(state, job.id)))
                .attr("job-state", IppValue::Enum(wire_state))
                .attr("job-state-reasons", IppValue::Keyword(reason.into()));
            builder.build()
        }
        Err(err) => {
            warn!(
                category = "SYSTEM",
                job_id = %job.id,
                error = %err,
                "artifact persistence failed"
            );
            state.registry.handle_error(&err, "persist").await;
            state.registry.run_after_hooks(&job, false).await;
            error_response(
                StatusCode::ServerErrorInternalError,
                request.request_id,
                "failed to persist document",
            )
        }
    }
}

// ---------------------------------------------------------------------------
// Other operations
// ---------------------------------------------------------------------------

async fn handle_create_job(state: &ServiceState, request: &IppPacket) -> IppPacket {
    let op_attrs = request.operation_attributes();
    let job_name = op_attrs
        .and_then(|g| g.get_str("job-name"))
        .unwrap_or("Untitled Document")
        .to_string();
    let originating_user = op_attrs
        .and_then(|g| g.get_str("requesting-user-name"))
        .unwrap_or("anonymous")
        .to_string();

    let job = CapturedJob::new(
        state.id_allocator.next(),
        job_name,
        "application/octet-stream".into(),
        originating_user,
    );
    let id = job.id;
    state.jobs.write().await.insert(id.0, job);

    info!(category = "PRINT_JOB", job_id = %id, "job created");

    let mut builder = PacketBuilder::new(StatusCode::SuccessfulOk.as_u16(), request.request_id);
    builder.operation_prelude(StatusCode::SuccessfulOk.message());
    builder
        .begin_group(DelimiterTag::JobAttributes)
        .attr("job-id", IppValue::Integer(id.as_ipp_integer()))
        .attr("job-uri", IppValue::Uri(job_uri(state, id)))
        .attr("job-state", IppValue::Enum(JobState::Pending.ipp_enum_value()))
        .attr("job-state-reasons", IppValue::Keyword("none".into()));
    builder.build()
}

async fn handle_cancel_job(state: &ServiceState, request: &IppPacket) -> IppPacket {
    let Some(job_id) = request
        .operation_attributes()
        .and_then(|g| g.get_i32("job-id"))
    else {
        return error_response(
            StatusCode::ClientErrorBadRequest,
            request.request_id,
            "missing required job-id",
        );
    };

    let mut jobs = state.jobs.write().await;
    match jobs.get_mut(&(job_id as u64)) {
        Some(job) => {
            job.set_state(JobState::Canceled, "job-canceled-by-user");
            info!(category = "PRINT_JOB", job_id, "job canceled");
            ok_response(request.request_id)
        }
        None => {
            debug!(job_id, "Cancel-Job for unknown id");
            error_response(
                StatusCode::ClientErrorNotFound,
                request.request_id,
                &format!("job {job_id} not found"),
            )
        }
    }
}

async fn handle_get_job_attributes(state: &ServiceState, request: &IppPacket) -> IppPacket {
    let Some(job_id) = request
        .operation_attributes()
        .and_then(|g| g.get_i32("job-id"))
    else {
        return error_response(
            StatusCode::ClientErrorBadRequest,
            request.request_id,
            "missing required job-id",
        );
    };

    let jobs = state.jobs.read().await;
    let Some(job) = jobs.get(&(job_id as u64)) else {
        return error_response(
            StatusCode::ClientErrorNotFound,
            request.request_id,
            &format!("job {job_id} not found"),
        );
    };

    let mut builder = PacketBuilder::new(StatusCode::SuccessfulOk.as_u16(), request.request_id);
    builder.operation_prelude(StatusCode::SuccessfulOk.message());

    let mut group = AttributeGroup::new(DelimiterTag::JobAttributes);
    group.set(Attribute::new(
        "job-id",
        IppValue::Integer(job.id.as_ipp_integer()),
    ));
    group.set(Attribute::new("job-uri", IppValue::Uri(job_uri(state, job.id))));
    group.set(Attribute::new("job-name", IppValue::Name(job.name.clone())));
    group.set(Attribute::new(
        "job-state",
        IppValue::Enum(job.state.ipp_enum_value()),
    ));
    group.set(Attribute::with_values(
        "job-state-reasons",
        job.state_reasons
            .iter()
            .map(|r| IppValue::Keyword(r.clone()))
            .collect(),
    ));
    group.set(Attribute::new(
        "job-originating-user-name",
        IppValue::Name(job.originating_user.clone()),
    ));
    group.set(Attribute::new(
        "document-format",
        IppValue::MimeMediaType(job.document_format.clone()),
    ));
    group.set(Attribute::new(
        "job-k-octets",
        IppValue::Integer(job.size.div_ceil(1024) as i32),
    ));
    group.set(Attribute::new(
        "time-at-creation",
        IppValue::Integer((job.submitted_at / 1000) as i32),
    ));
    builder.group(group);
    builder.build()
}

async fn handle_get_printer_attributes(state: &ServiceState, request: &IppPacket) -> IppPacket {
    let groups = compose_printer_groups(state).await;

    let mut builder = PacketBuilder::new(StatusCode::SuccessfulOk.as_u16(), request.request_id);
    builder.operation_prelude(StatusCode::SuccessfulOk.message());
    for group in groups {
        builder.group(group);
    }
    builder.build()
}

// ---------------------------------------------------------------------------
// Capability composition
// ---------------------------------------------------------------------------

/// Compose the advertised printer attributes: defaults, then the custom
/// override document, then the plugin fold.
pub async fn compose_printer_groups(state: &ServiceState) -> Vec<AttributeGroup> {
    let facts = PrinterFacts {
        printer_name: state.printer_name().await,
        host: state.host.clone(),
        port: state.port,
        uuid_uri: state.uuid_uri.clone(),
        up_time_secs: state.started.elapsed().as_secs() as i32,
        queued_job_count: state.queued_job_count().await,
    };

    let mut printer_group = default_printer_attributes(&facts);

    if let Some(custom) = state.custom_attributes.read().await.as_ref() {
        apply_layer(&mut printer_group, &custom.printer);
    }

    state.registry.customize_attributes(vec![printer_group]).await
}

// ---------------------------------------------------------------------------
// Response shapes
// ---------------------------------------------------------------------------

fn ok_response(request_id: u32) -> IppPacket {
    let mut builder = PacketBuilder::new(StatusCode::SuccessfulOk.as_u16(), request_id);
    builder.operation_prelude(StatusCode::SuccessfulOk.message());
    builder.build()
}

fn error_response(status: StatusCode, request_id: u32, message: &str) -> IppPacket {
    let mut builder = PacketBuilder::new(status.as_u16(), request_id);
    builder.operation_prelude(message);
    builder.build()
}

/// The canned aborted shape: successful-ok status with a canceled job
/// state, mirroring what real firmware reports for system-canceled jobs.
fn aborted_response(state: &ServiceState, request_id: u32, job_id: JobId, message: &str) -> IppPacket {
    let mut builder = PacketBuilder::new(StatusCode::SuccessfulOk.as_u16(), request_id);
    builder.operation_prelude(message);
    builder
        .begin_group(DelimiterTag::JobAttributes)
        .attr("job-id", IppValue::Integer(job_id.as_ipp_integer()))
        .attr("job-uri", IppValue::Uri(job_uri(state, job_id)))
        .attr("job-state", IppValue::Enum(JOB_STATE_CANCELED))
        .attr(
            "job-state-reasons",
            IppValue::Keyword("job-canceled-by-system".into()),
        );
    builder.build()
}

async fn simulated_response(
    state: &ServiceState,
    request: &IppPacket,
    fault: SimulatedFault,
) -> IppPacket {
    warn!(
        category = "SYSTEM",
        ?fault,
        request_id = request.request_id,
        "error simulation active"
    );
    match fault {
        SimulatedFault::InternalError => error_response(
            StatusCode::ServerErrorInternalError,
            request.request_id,
            "simulated internal error",
        ),
        SimulatedFault::NotPossible => error_response(
            StatusCode::ClientErrorNotPossible,
            request.request_id,
            "simulated not-possible error",
        ),
        SimulatedFault::DocumentFormatNotSupported => error_response(
            StatusCode::ClientErrorDocumentFormatNotSupported,
            request.request_id,
            "simulated unsupported document format",
        ),
        SimulatedFault::AbortedJob => {
            let is_job_operation = matches!(
                Operation::from_u16(request.code),
                Some(Operation::PrintJob | Operation::CreateJob | Operation::SendDocument)
            );
            if is_job_operation {
                let job_id = state.id_allocator.next();
                aborted_response(state, request.request_id, job_id, "simulated aborted job")
            } else {
                ok_response(request.request_id)
            }
        }
    }
}

fn job_uri(state: &ServiceState, job_id: JobId) -> String {
    format!(
        "ipp://{}:{}/jobs/{}",
        state.host,
        state.port,
        job_id.as_ipp_integer()
    )
}

// ---------------------------------------------------------------------------
// Tests — end-to-end dispatcher scenarios
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::{ErrorSimulation, PrinterService};
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use papertrap_core::config::ServerConfig;
    use papertrap_ipp::decode;
    use std::io::Write;
    use std::path::Path;
    use std::sync::Arc;

    const PDF_BODY: &[u8] = b"%PDF-1.4\n1 0 obj\n<< >>\nendobj\n%%EOF";

    // -- request builder (binary, client-side view) --------------------------

    fn build_request(
        operation: u16,
        request_id: u32,
        attributes: &[(u8, &str, &[u8])],
        document: &[u8],
    ) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.push(0x01);
        buf.push(0x01);
        buf.extend_from_slice(&operation.to_be_bytes());
        buf.extend_from_slice(&request_id.to_be_bytes());
        buf.push(0x01);
        write_attr(&mut buf, 0x47, "attributes-charset", b"utf-8");
        write_attr(&mut buf, 0x48, "attributes-natural-language", b"en");
        for &(tag, name, value) in attributes {
            write_attr(&mut buf, tag, name, value);
        }
        buf.push(0x03);
        buf.extend_from_slice(document);
        buf
    }

    fn write_attr(buf: &mut Vec<u8>, tag: u8, name: &str, value: &[u8]) {
        buf.push(tag);
        buf.extend_from_slice(&(name.len() as u16).to_be_bytes());
        buf.extend_from_slice(name.as_bytes());
        buf.extend_from_slice(&(value.len() as u16).to_be_bytes());
        buf.extend_from_slice(value);
    }

    async fn service(dir: &Path) -> PrinterService {
        PrinterService::init(ServerConfig {
            port: 8631,
            printer_name: "Papertrap Virtual Printer".into(),
            job_dir: dir.join("jobs"),
            config_dir: dir.join("config"),
            advertise: false,
        })
        .await
        .expect("service init")
    }

    async fn roundtrip(state: &Arc<ServiceState>, raw: &[u8]) -> IppPacket {
        let request = decode(raw).expect("request decodes");
        dispatch(state, &request, raw).await
    }

    fn job_group(response: &IppPacket) -> &AttributeGroup {
        response
            .job_attributes()
            .expect("response has job attributes group")
    }

    fn artifact_files(dir: &Path) -> Vec<std::path::PathBuf> {
        let mut files: Vec<_> = std::fs::read_dir(dir.join("jobs"))
            .map(|entries| {
                entries
                    .filter_map(|e| e.ok())
                    .map(|e| e.path())
                    .collect()
            })
            .unwrap_or_default();
        files.sort();
        files
    }

    // -- S1: PDF Print-Job happy path ----------------------------------------

    #[tokio::test]
    async fn print_job_pdf_happy_path() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path()).await;
        let state = service.state();

        let attrs: Vec<(u8, &str, &[u8])> = vec![
            (0x45, "printer-uri", b"ipp://h:8631/"),
            (0x49, "document-format", b"application/pdf"),
        ];
        let raw = build_request(0x0002, 1, &attrs, PDF_BODY);
        let response = roundtrip(&state, &raw).await;

        assert_eq!(response.code, 0x0000);
        assert_eq!(response.request_id, 1);

        let job = job_group(&response);
        let job_id = job.get_i32("job-id").expect("job-id");
        assert!(job_id > 0);
        assert_eq!(job.get_i32("job-state"), Some(5));
        assert_eq!(
            job.get_str("job-state-reasons"),
            Some("processing-to-stop-point")
        );

        let path = dir.path().join("jobs").join(format!("print_job_{job_id}.pdf"));
        let written = std::fs::read(&path).expect("artifact exists");
        assert_eq!(written, PDF_BODY);
    }

    // -- S2: Send-Document with last-document=true ---------------------------

    #[tokio::test]
    async fn send_document_last_document_completes_job() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path()).await;
        let state = service.state();

        let attrs: Vec<(u8, &str, &[u8])> = vec![
            (0x49, "document-format", b"application/pdf"),
            (0x22, "last-document", &[0x01]),
        ];
        let raw = build_request(0x0006, 2, &attrs, PDF_BODY);
        let response = roundtrip(&state, &raw).await;

        assert_eq!(response.code, 0x0000);
        let job = job_group(&response);
        assert_eq!(job.get_i32("job-state"), Some(9));
        assert_eq!(
            job.get_str("job-state-reasons"),
            Some("job-completed-successfully")
        );
    }

    #[tokio::test]
    async fn send_document_intermediate_reports_incoming() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path()).await;
        let state = service.state();

        let attrs: Vec<(u8, &str, &[u8])> = vec![(0x22, "last-document", &[0x00])];
        let raw = build_request(0x0006, 3, &attrs, PDF_BODY);
        let response = roundtrip(&state, &raw).await;

        let job = job_group(&response);
        assert_eq!(job.get_i32("job-state"), Some(4));
        assert_eq!(job.get_str("job-state-reasons"), Some("job-incoming"));
    }

    // -- S3: gzip-wrapped PDF ------------------------------------------------

    #[tokio::test]
    async fn gzip_wrapped_pdf_persisted_decompressed() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path()).await;
        let state = service.state();

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(PDF_BODY).unwrap();
        let gz = encoder.finish().unwrap();

        let attrs: Vec<(u8, &str, &[u8])> = vec![(0x49, "document-format", b"application/pdf")];
        let raw = build_request(0x0002, 4, &attrs, &gz);
        let response = roundtrip(&state, &raw).await;

        assert_eq!(response.code, 0x0000);
        let job_id = job_group(&response).get_i32("job-id").unwrap();
        let path = dir.path().join("jobs").join(format!("print_job_{job_id}.pdf"));
        assert_eq!(std::fs::read(&path).unwrap(), PDF_BODY);
    }

    // -- S4: unsupported format under custom restriction ---------------------

    #[tokio::test]
    async fn restricted_format_rejected_without_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path()).await;
        let state = service.state();

        let overrides = papertrap_ipp::overrides::parse_override_document(
            r#"[ { "attributes": [
                { "name": "document-format-supported", "values": ["application/pdf"] }
            ] } ]"#,
        )
        .unwrap();
        *state.custom_attributes.write().await = Some(Arc::new(overrides));

        let attrs: Vec<(u8, &str, &[u8])> = vec![(0x49, "document-format", b"text/plain")];
        let raw = build_request(0x0002, 5, &attrs, b"hello\n");
        let response = roundtrip(&state, &raw).await;

        assert_eq!(response.code, 0x040A);
        assert!(artifact_files(dir.path()).is_empty());
    }

    // -- S5: attribute-override plugin ---------------------------------------

    #[tokio::test]
    async fn attribute_override_plugin_shapes_capabilities() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path()).await;
        let state = service.state();

        service.load_plugin("attribute-override").await.unwrap();
        service
            .configure_plugin(
                "attribute-override",
                r#"{"printerName": "Lab-A", "duplexSupported": true}"#,
            )
            .await
            .unwrap();

        let raw = build_request(0x000B, 6, &[], &[]);
        let response = roundtrip(&state, &raw).await;

        assert_eq!(response.code, 0x0000);
        let printer = response
            .printer_attributes()
            .expect("printer attributes group");
        assert_eq!(printer.get_str("printer-name"), Some("Lab-A"));
        assert_eq!(
            printer.get_strings("sides-supported"),
            vec!["one-sided", "two-sided-long-edge", "two-sided-short-edge"]
        );
        assert_eq!(printer.get_str("sides-default"), Some("one-sided"));
    }

    // -- S6: Cancel-Job for unknown id ---------------------------------------

    #[tokio::test]
    async fn cancel_unknown_job_returns_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path()).await;
        let state = service.state();

        let id_bytes = 999_999i32.to_be_bytes();
        let attrs: Vec<(u8, &str, &[u8])> = vec![(0x21, "job-id", &id_bytes)];
        let raw = build_request(0x0008, 7, &attrs, &[]);
        let response = roundtrip(&state, &raw).await;

        assert_eq!(response.code, 0x0406);
    }

    #[tokio::test]
    async fn cancel_existing_job_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path()).await;
        let state = service.state();

        let raw = build_request(0x0002, 8, &[], PDF_BODY);
        let response = roundtrip(&state, &raw).await;
        let job_id = job_group(&response).get_i32("job-id").unwrap();

        let id_bytes = job_id.to_be_bytes();
        let attrs: Vec<(u8, &str, &[u8])> = vec![(0x21, "job-id", &id_bytes)];
        let cancel = build_request(0x0008, 9, &attrs, &[]);
        let response = roundtrip(&state, &cancel).await;

        assert_eq!(response.code, 0x0000);
        let jobs = state.jobs.read().await;
        assert_eq!(jobs[&(job_id as u64)].state, JobState::Canceled);
    }

    // -- Accept-flag gate -----------------------------------------------------

    #[tokio::test]
    async fn accepting_false_gates_ingestion() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path()).await;
        let state = service.state();

        let overrides = papertrap_ipp::overrides::parse_override_document(
            r#"[ { "attributes": [
                { "name": "printer-is-accepting-jobs", "value": false, "type": "BOOLEAN" }
            ] } ]"#,
        )
        .unwrap();
        *state.custom_attributes.write().await = Some(Arc::new(overrides));

        let raw = build_request(0x0002, 10, &[], PDF_BODY);
        let response = roundtrip(&state, &raw).await;

        assert_eq!(response.code, 0x0503);
        assert!(artifact_files(dir.path()).is_empty());
    }

    // -- Priority ordering ----------------------------------------------------

    #[tokio::test]
    async fn custom_overrides_beat_defaults_and_plugins_beat_custom() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path()).await;
        let state = service.state();

        // Custom layer overrides the default printer-name.
        let overrides = papertrap_ipp::overrides::parse_override_document(
            r#"[ { "attributes": [
                { "name": "printer-name", "value": "Custom Layer", "type": "STRING" },
                { "name": "printer-location", "value": "Basement", "type": "STRING" }
            ] } ]"#,
        )
        .unwrap();
        *state.custom_attributes.write().await = Some(Arc::new(overrides));

        let groups = compose_printer_groups(&state).await;
        assert_eq!(groups[0].get_str("printer-name"), Some("Custom Layer"));

        // The plugin layer wins over the custom layer for what it emits.
        service.load_plugin("attribute-override").await.unwrap();
        service
            .configure_plugin("attribute-override", r#"{"printerName": "Plugin Layer"}"#)
            .await
            .unwrap();

        let groups = compose_printer_groups(&state).await;
        assert_eq!(groups[0].get_str("printer-name"), Some("Plugin Layer"));
        // Attributes the plugin does not emit keep the custom value.
        assert_eq!(groups[0].get_str("printer-location"), Some("Basement"));
    }

    // -- Error injection and simulation ---------------------------------------

    #[tokio::test]
    async fn injected_error_yields_aborted_shape_and_no_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path()).await;
        let state = service.state();

        service.load_plugin("error-injector").await.unwrap();
        service
            .configure_plugin(
                "error-injector",
                r#"{"errorProbability": 1.0, "mode": "specific", "errorType": "queue"}"#,
            )
            .await
            .unwrap();

        let raw = build_request(0x0002, 11, &[], PDF_BODY);
        let response = roundtrip(&state, &raw).await;

        assert_eq!(response.code, 0x0000);
        let job = job_group(&response);
        assert_eq!(job.get_i32("job-state"), Some(7));
        assert_eq!(
            job.get_str("job-state-reasons"),
            Some("job-canceled-by-system")
        );
        assert!(artifact_files(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn forced_fault_overrides_normal_path() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path()).await;
        let state = service.state();

        service
            .set_error_simulation(ErrorSimulation {
                enabled: true,
                fault: SimulatedFault::InternalError,
            })
            .await;

        let raw = build_request(0x000B, 12, &[], &[]);
        let response = roundtrip(&state, &raw).await;
        assert_eq!(response.code, 0x0500);

        service
            .set_error_simulation(ErrorSimulation {
                enabled: true,
                fault: SimulatedFault::AbortedJob,
            })
            .await;
        let raw = build_request(0x0002, 13, &[], PDF_BODY);
        let response = roundtrip(&state, &raw).await;
        assert_eq!(response.code, 0x0000);
        assert_eq!(job_group(&response).get_i32("job-state"), Some(7));
        assert!(artifact_files(dir.path()).is_empty());
    }

    // -- Plugin chain interactions --------------------------------------------

    #[tokio::test]
    async fn watermark_plugin_replaces_persisted_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path()).await;
        let state = service.state();

        service.load_plugin("document-modifier").await.unwrap();

        // A structurally valid PDF so the watermarker can parse it.
        let pdf = papertrap_document::pdf::wrap_in_pdf(b"q Q").unwrap();
        let attrs: Vec<(u8, &str, &[u8])> = vec![(0x49, "document-format", b"application/pdf")];
        let raw = build_request(0x0002, 14, &attrs, &pdf);
        let response = roundtrip(&state, &raw).await;

        assert_eq!(response.code, 0x0000);
        let job_id = job_group(&response).get_i32("job-id").unwrap();
        let path = dir.path().join("jobs").join(format!("print_job_{job_id}.pdf"));
        let written = std::fs::read(&path).unwrap();
        assert!(written.starts_with(b"%PDF"));
        assert_ne!(written, pdf, "artifact should be the watermarked bytes");

        let jobs = state.jobs.read().await;
        let job = &jobs[&(job_id as u64)];
        assert_eq!(job.metadata.get("watermarked"), Some(&json!(true)));
    }

    // -- Misc operations -------------------------------------------------------

    #[tokio::test]
    async fn validate_job_returns_plain_ok() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path()).await;
        let state = service.state();

        let raw = build_request(0x0004, 15, &[], &[]);
        let response = roundtrip(&state, &raw).await;
        assert_eq!(response.code, 0x0000);
        assert!(response.job_attributes().is_none());
    }

    #[tokio::test]
    async fn create_job_then_get_job_attributes() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path()).await;
        let state = service.state();

        let attrs: Vec<(u8, &str, &[u8])> = vec![(0x42, "job-name", b"deferred")];
        let raw = build_request(0x0005, 16, &attrs, &[]);
        let response = roundtrip(&state, &raw).await;

        assert_eq!(response.code, 0x0000);
        let job = job_group(&response);
        assert_eq!(job.get_i32("job-state"), Some(3));
        assert_eq!(job.get_str("job-state-reasons"), Some("none"));
        let job_id = job.get_i32("job-id").unwrap();

        let id_bytes = job_id.to_be_bytes();
        let attrs: Vec<(u8, &str, &[u8])> = vec![(0x21, "job-id", &id_bytes)];
        let raw = build_request(0x0009, 17, &attrs, &[]);
        let response = roundtrip(&state, &raw).await;

        assert_eq!(response.code, 0x0000);
        let job = job_group(&response);
        assert_eq!(job.get_str("job-name"), Some("deferred"));
        assert_eq!(job.get_i32("job-state"), Some(3));
    }

    #[tokio::test]
    async fn unknown_operation_answers_ok_without_body() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path()).await;
        let state = service.state();

        let raw = build_request(0x00FF, 18, &[], &[]);
        let response = roundtrip(&state, &raw).await;
        assert_eq!(response.code, 0x0000);
        assert!(response.job_attributes().is_none());
        assert!(response.printer_attributes().is_none());
    }

    #[tokio::test]
    async fn missing_charset_is_a_protocol_violation() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path()).await;
        let state = service.state();

        // Hand-build a request without the charset attribute.
        let mut raw = vec![0x01, 0x01, 0x00, 0x0B, 0x00, 0x00, 0x00, 0x13];
        raw.push(0x01);
        write_attr(&mut raw, 0x48, "attributes-natural-language", b"en");
        raw.push(0x03);

        let response = roundtrip(&state, &raw).await;
        assert_eq!(response.code, 0x0400);
    }

    #[tokio::test]
    async fn get_printer_attributes_reports_live_facts() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path()).await;
        let state = service.state();

        // Capture one job so queued-job-count is non-zero.
        let raw = build_request(0x0002, 19, &[], PDF_BODY);
        roundtrip(&state, &raw).await;

        let raw = build_request(0x000B, 20, &[], &[]);
        let response = roundtrip(&state, &raw).await;
        let printer = response.printer_attributes().unwrap();

        assert_eq!(
            printer.get_str("printer-name"),
            Some("Papertrap Virtual Printer")
        );
        assert_eq!(printer.get_i32("queued-job-count"), Some(1));
        assert_eq!(printer.get_bool("printer-is-accepting-jobs"), Some(true));
        assert_eq!(
            printer.get_str("uri-authentication-supported"),
            Some("none")
        );
    }
}
