use crate::operations::report;
use crate::operations::whitelist::{classify, exclude_whitelisted};
use crate::registry::RegistryClient;
use crate::source::TreeSource;
use crate::tree::FlatPackage;
use crate::Result;

#[derive(Debug, Clone)]
pub struct Verification {
    pub total: usize,
    pub whitelisted: usize,
    pub uncertified: Vec<FlatPackage>,
}

impl Verification {
    pub fn passed(&self) -> bool {
        self.uncertified.is_empty()
    }
}

/// Score the project and list what is neither certified nor whitelisted.
pub async fn verify<S>(
    client: &RegistryClient,
    source: &S,
    manifest_json: &str,
    threshold: f64,
    concurrency: usize,
) -> Result<Verification>
where
    S: TreeSource,
{
    let report = report::build(client, source, manifest_json, concurrency).await?;
    let total = report.total();
    let uncertified = classify(report.packages, threshold).uncertified;

    let (uncertified, whitelisted) = if uncertified.is_empty() {
        (uncertified, 0)
    } else {
        let whitelist = client.whitelist().await?;
        exclude_whitelisted(uncertified, &whitelist)
    };

    tracing::debug!(total, whitelisted, failed = uncertified.len(), "verification");
    Ok(Verification {
        total,
        whitelisted,
        uncertified,
    })
}
