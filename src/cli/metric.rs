use crate::core::metrics::MetricKind;
use crate::service::{FinHealthService, MetricRequest};
use crate::store::RecordStore;
use anyhow::Result;

pub async fn run<S: RecordStore + ?Sized>(
    service: &FinHealthService<S>,
    kind: MetricKind,
    request: &MetricRequest,
) -> Result<()> {
    super::respond(service.metric(kind, request).await)
}
