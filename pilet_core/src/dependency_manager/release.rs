use super::{
    manager::LoaderContext,
    registry::ReleaseOutcome,
    session::{lock_ledger, SharedLedger},
    Result,
};
use tracing::{debug, info, warn};

/// Unwind everything a session linked.
///
/// The ledger is drained up front, so a second call is a no-op and a failed
/// release cannot be retried for the same session. Shared files are handed
/// back first, then isolated bundles are torn down, one primitive at a time.
pub(crate) async fn release_session(context: &LoaderContext, ledger: &SharedLedger) -> Result<()> {
    let (references, bundle_ids) = lock_ledger(ledger).drain();

    if references.is_empty() && bundle_ids.is_empty() {
        debug!("Nothing to release");
        return Ok(());
    }

    for name in references {
        match context.shared.release(&name) {
            ReleaseOutcome::Removed(url) => {
                info!(dependency = %name, url = %url, "Unloading shared dependency");
                context.host.unload_resource(&url).await?;
            }
            ReleaseOutcome::Retained(ref_count) => {
                debug!(dependency = %name, ref_count, "Shared dependency kept for other pilets");
            }
            ReleaseOutcome::Unknown => {
                warn!(dependency = %name, "Released dependency is not registered");
            }
        }
    }

    for id in bundle_ids {
        info!(bundle_id = %id, "Unloading isolated bundle");
        context.host.unload_isolated_bundle(&id).await?;
    }

    Ok(())
}
