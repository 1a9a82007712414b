use crate::console;
use crate::pool;
use crate::registry::RegistryClient;
use crate::tree::FlatPackage;
use crate::{NscmError, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Attach a registry score to every package, `concurrency` requests at a time.
///
/// The output keeps the input order. A 401 or transport failure on any
/// package fails the whole batch and no partial list is returned.
pub async fn fetch_scores(
    client: &RegistryClient,
    packages: Vec<FlatPackage>,
    concurrency: usize,
) -> Result<Vec<FlatPackage>> {
    let total = packages.len();
    let done = Arc::new(AtomicUsize::new(0));
    tracing::debug!(total, concurrency, "fetching scores");

    let scored = pool::bounded(packages, concurrency, |mut package| {
        let client = client.clone();
        let done = done.clone();
        async move {
            package.score = client
                .package_score(&package.name, &package.version)
                .await?;

            let current = done.fetch_add(1, Ordering::Relaxed) + 1;
            console::progress("scoring", current, total);
            Ok::<_, NscmError>(package)
        }
    })
    .await;

    console::clear_line();
    scored
}
