//! Bounded test read
//!
//! Drives a retriever under [`TestReadLimits`] and turns everything that
//! happened, failures included, into a [`StreamRead`] report. Nothing a
//! read does can make [`TestReader::read`] fail.

use super::limited::LimitedRetriever;
use super::types::{LogMessage, StreamRead, StreamReadPages, StreamReadSlices, TestReadLimits};
use crate::error::Error;
use crate::http::{AuxiliaryRequest, ExchangeObserver, HttpRequest, HttpResponse};
use crate::retriever::Retriever;
use crate::schema::{DatetimeFormatInferrer, SchemaInferrer};
use crate::secrets::{generate_failed_streams_error_message, SecretRegistry};
use crate::types::{JsonValue, LogLevel};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What to do with the rest of the read after a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Recovery {
    /// Abandon the partition, carry on with the next one
    NextSlice,
    /// Stop the read
    Stop,
}

fn recovery_for(err: &Error) -> Recovery {
    if err.is_config_error()
        || matches!(
            err.inner(),
            Error::RecordExtraction { .. } | Error::Decode { .. } | Error::JsonParse(_)
        )
    {
        Recovery::NextSlice
    } else {
        Recovery::Stop
    }
}

/// Runs bounded test reads and builds their reports
#[derive(Debug, Clone)]
pub struct TestReader {
    limits: TestReadLimits,
    secrets: SecretRegistry,
    observer: ExchangeObserver,
}

impl TestReader {
    /// Create a reader; `observer` must be the one the retriever's
    /// authenticator reports to
    pub fn new(limits: TestReadLimits, secrets: SecretRegistry, observer: ExchangeObserver) -> Self {
        Self {
            limits,
            secrets,
            observer,
        }
    }

    /// Limits applied to every read
    pub fn limits(&self) -> &TestReadLimits {
        &self.limits
    }

    /// Read `retriever` under the limits
    pub async fn read<R: Retriever>(&self, retriever: R) -> StreamRead {
        let mut retriever = LimitedRetriever::new(retriever, &self.limits);
        let stream = retriever.name().to_string();
        info!(
            stream = %stream,
            max_records = self.limits.max_records,
            max_slices = self.limits.max_slices,
            max_pages_per_slice = self.limits.max_pages_per_slice,
            "Starting test read"
        );

        let mut report = StreamRead::default();
        let mut failures: Vec<Error> = Vec::new();
        let mut schema = SchemaInferrer::new();
        let mut datetimes = DatetimeFormatInferrer::new();
        let mut record_count = 0usize;

        let slices = match retriever.stream_slices() {
            Ok(slices) => slices,
            Err(err) => {
                report.logs.push(self.error_log(&err));
                failures.push(err);
                Vec::new()
            }
        };

        for (index, slice) in slices.into_iter().enumerate() {
            let slice = Arc::new(slice);
            let mut pages = Vec::new();
            let mut stop = false;

            match retriever.start_slice(&slice) {
                Ok(mut cursor) => {
                    while cursor.has_more() {
                        match retriever.fetch_next_page(&slice, &mut cursor).await {
                            Ok(page) => {
                                let remaining = self.limits.max_records - record_count;
                                let mut records = page.records;
                                if records.len() >= remaining {
                                    records.truncate(remaining);
                                    report.test_read_limit_reached = true;
                                }
                                for record in &records {
                                    schema.accumulate(&stream, record);
                                    datetimes.accumulate(record);
                                }
                                record_count += records.len();
                                pages.push(StreamReadPages {
                                    records: records.iter().map(|r| r.to_value()).collect(),
                                    request: Some(self.redact_request(&page.request)),
                                    response: Some(self.redact_response(&page.response)),
                                });
                                if report.test_read_limit_reached {
                                    debug!(stream = %stream, records = record_count, "Record limit reached");
                                    stop = true;
                                    break;
                                }
                            }
                            Err(err) => {
                                warn!(stream = %stream, slice = index, "Page fetch failed: {}", self.secrets.filter(&err.to_string()));
                                if let Some(request) = err.request() {
                                    pages.push(StreamReadPages {
                                        records: Vec::new(),
                                        request: Some(self.redact_request(request)),
                                        response: failed_response(&err)
                                            .map(|response| self.redact_response(&response)),
                                    });
                                }
                                report.logs.push(self.error_log(&err));
                                stop = recovery_for(&err) == Recovery::Stop;
                                failures.push(err);
                                break;
                            }
                        }
                    }
                }
                Err(err) => {
                    warn!(stream = %stream, slice = index, "Slice could not start: {}", self.secrets.filter(&err.to_string()));
                    report.logs.push(self.error_log(&err));
                    stop = recovery_for(&err) == Recovery::Stop;
                    failures.push(err);
                }
            }

            report.slices.push(StreamReadSlices {
                pages,
                slice_descriptor: Some(slice.to_value()),
                state: retriever.stream_state().map(JsonValue::Object),
            });
            if stop {
                break;
            }
        }

        if !failures.is_empty() {
            let stream_failures = HashMap::from([(stream.clone(), failures)]);
            report.logs.push(LogMessage::new(
                LogLevel::Error,
                generate_failed_streams_error_message(&self.secrets, &stream_failures),
            ));
        }

        report.auxiliary_requests = self
            .observer
            .auxiliary_requests()
            .into_iter()
            .map(|aux| self.redact_auxiliary(aux))
            .collect();
        report.latest_config_update = self.observer.latest_config_update();
        report.inferred_schema = schema.get_stream_schema(&stream);
        if record_count > 0 {
            report.inferred_datetime_formats = Some(datetimes.get_inferred_datetime_formats());
        }

        info!(
            stream = %stream,
            slices = report.slices.len(),
            records = record_count,
            errors = report.errors().count(),
            limit_reached = report.test_read_limit_reached,
            "Test read finished"
        );
        report
    }

    /// An error-level log entry for `err`, with its cause chain as the
    /// stack trace
    fn error_log(&self, err: &Error) -> LogMessage {
        let inner = err.inner();
        let chain = anyhow::Chain::new(inner)
            .map(ToString::to_string)
            .collect::<Vec<_>>();
        let mut stacktrace = chain.first().cloned().unwrap_or_default();
        if chain.len() > 1 {
            stacktrace.push_str("\n\nCaused by:");
            for (n, cause) in chain.iter().skip(1).enumerate() {
                stacktrace.push_str(&format!("\n    {n}: {cause}"));
            }
        }

        LogMessage {
            message: self.secrets.filter(&err.to_string()),
            level: LogLevel::Error,
            internal_message: Some(self.secrets.filter(&format!("{inner:?}"))),
            stacktrace: Some(self.secrets.filter(&stacktrace)),
        }
    }

    fn redact_request(&self, request: &HttpRequest) -> HttpRequest {
        let mut request = request.clone();
        request.url = self.secrets.filter(&request.url);
        for value in request.headers.values_mut() {
            *value = self.secrets.filter(value);
        }
        request.body = request.body.map(|body| self.secrets.filter(&body));
        request
    }

    fn redact_response(&self, response: &HttpResponse) -> HttpResponse {
        let mut response = response.clone();
        for value in response.headers.values_mut() {
            *value = self.secrets.filter(value);
        }
        response.body = self.secrets.filter(&response.body);
        response
    }

    fn redact_auxiliary(&self, aux: AuxiliaryRequest) -> AuxiliaryRequest {
        AuxiliaryRequest {
            request: self.redact_request(&aux.request),
            response: aux.response.as_ref().map(|r| self.redact_response(r)),
            ..aux
        }
    }
}

/// The response a failed fetch received, if it got that far
fn failed_response(err: &Error) -> Option<HttpResponse> {
    if let Some(response) = err.response() {
        return Some(response.clone());
    }
    match err.inner() {
        Error::HttpStatus { status, body } => Some(HttpResponse::new(*status, body.clone())),
        _ => None,
    }
}
