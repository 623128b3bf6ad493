use crate::service::FinHealthService;
use crate::store::RecordStore;
use anyhow::Result;

pub fn run<S: RecordStore + ?Sized>(service: &FinHealthService<S>, user_id: Option<&str>) -> Result<()> {
    super::respond(service.more(user_id))
}
