use crate::config::Options;
use crate::pool;
use crate::project::Manifest;
use crate::registry::{RegistryClient, WhitelistEntry};
use crate::scores::fetch_scores;
use crate::source::TreeSource;
use crate::tree::{FlatPackage, PackageSpec, flatten};
use crate::{NscmError, Result, console};
use std::collections::HashSet;

/// A package is certified only when its score is strictly above the threshold.
pub fn is_certified(package: &FlatPackage, threshold: f64) -> bool {
    package.score.is_some_and(|score| score > threshold)
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Classification {
    pub certified: Vec<FlatPackage>,
    pub uncertified: Vec<FlatPackage>,
}

/// Split scored packages around `threshold`, keeping their order.
/// Packages without a score are uncertified.
pub fn classify(packages: Vec<FlatPackage>, threshold: f64) -> Classification {
    let (certified, uncertified) = packages
        .into_iter()
        .partition(|package| is_certified(package, threshold));
    Classification {
        certified,
        uncertified,
    }
}

/// Drop every package whose `name@version` is already on the whitelist.
pub fn exclude_whitelisted(
    packages: Vec<FlatPackage>,
    whitelist: &[WhitelistEntry],
) -> (Vec<FlatPackage>, usize) {
    let known: HashSet<String> = whitelist.iter().map(WhitelistEntry::key).collect();
    let before = packages.len();
    let remaining: Vec<FlatPackage> = packages
        .into_iter()
        .filter(|package| !known.contains(&package.key()))
        .collect();
    let skipped = before - remaining.len();
    (remaining, skipped)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Answer {
    Yes,
    No,
    All,
}

impl Answer {
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_ascii_lowercase().as_str() {
            "y" | "yes" => Some(Answer::Yes),
            "n" | "no" => Some(Answer::No),
            "a" | "all" => Some(Answer::All),
            _ => None,
        }
    }
}

/// Asks whether one package should be whitelisted and returns the raw reply.
pub trait Confirm {
    /// Called once with every pending package before the first question.
    fn begin(&mut self, _pending: &[FlatPackage]) {}

    fn confirm(&mut self, package: &FlatPackage) -> Result<String>;
}

/// Walk `candidates` in order asking about each one. An unrecognised reply
/// repeats the question; `all` accepts the current package and every one
/// after it without asking again.
pub fn select_packages<C>(candidates: &[FlatPackage], prompt: &mut C) -> Result<Vec<FlatPackage>>
where
    C: Confirm + ?Sized,
{
    let mut selected = Vec::new();
    let mut bulk = false;
    let mut index = 0;

    while let Some(package) = candidates.get(index) {
        if bulk {
            selected.push(package.clone());
            index += 1;
            continue;
        }

        match Answer::parse(&prompt.confirm(package)?) {
            Some(Answer::Yes) => {
                selected.push(package.clone());
                index += 1;
            }
            Some(Answer::No) => index += 1,
            Some(Answer::All) => bulk = true,
            None => {}
        }
    }

    Ok(selected)
}

/// Add `packages` to the whitelist, `concurrency` requests at a time.
/// Stops on the first failure; entries added before it stay added.
pub async fn add_packages(
    client: &RegistryClient,
    packages: Vec<FlatPackage>,
    concurrency: usize,
) -> Result<Vec<WhitelistEntry>> {
    pool::bounded(packages, concurrency, |package| {
        let client = client.clone();
        async move {
            console::verbose(&format!("adding {} to the whitelist", package.key()));
            client.add_to_whitelist(&package).await
        }
    })
    .await
}

/// Resolve `spec` and whitelist every package in its tree.
pub async fn add<S>(
    client: &RegistryClient,
    source: &S,
    spec: &PackageSpec,
    concurrency: usize,
) -> Result<Vec<WhitelistEntry>>
where
    S: TreeSource,
{
    let manifest = Manifest::with_dependency(&spec.name, spec.range()).to_json()?;
    let tree = match source.resolve(&manifest).await {
        Ok(tree) => tree,
        Err(NscmError::Resolution { reason }) => {
            tracing::debug!(%spec, %reason, "resolution failed");
            return Err(NscmError::UnresolvablePackage {
                spec: spec.to_string(),
            });
        }
        Err(err) => return Err(err),
    };

    let packages = flatten(&tree);
    if packages.is_empty() {
        return Err(NscmError::UnresolvablePackage {
            spec: spec.to_string(),
        });
    }

    add_packages(client, packages, concurrency).await
}

pub async fn list(client: &RegistryClient) -> Result<Vec<WhitelistEntry>> {
    client.whitelist().await
}

pub async fn delete(client: &RegistryClient, spec: &PackageSpec) -> Result<()> {
    client.delete_from_whitelist(spec).await
}

/// Delete every whitelisted entry. Returns what was removed.
pub async fn reset(client: &RegistryClient, concurrency: usize) -> Result<Vec<WhitelistEntry>> {
    let entries = client.whitelist().await?;

    pool::bounded(entries, concurrency, |entry| {
        let client = client.clone();
        async move {
            let spec = PackageSpec {
                name: entry.name.clone(),
                version: Some(entry.version.clone()),
            };
            client.delete_from_whitelist(&spec).await?;
            Ok::<_, NscmError>(entry)
        }
    })
    .await
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    FetchingTree,
    Scoring,
    Classifying,
    Confirming,
    Submitting,
    Done,
    Failed,
}

/// What a reconciliation run found and did.
#[derive(Debug, Clone, Default)]
pub struct Reconciliation {
    pub scanned: usize,
    pub uncertified: Vec<FlatPackage>,
    pub already_whitelisted: usize,
    pub added: Vec<WhitelistEntry>,
}

/// Drives one whitelist session: find the project's uncertified packages
/// that are not yet whitelisted, let the user pick, submit the picks.
pub struct Reconciler<'a, S> {
    client: &'a RegistryClient,
    source: &'a S,
    options: &'a Options,
    stage: Stage,
}

impl<'a, S> Reconciler<'a, S>
where
    S: TreeSource,
{
    pub fn new(client: &'a RegistryClient, source: &'a S, options: &'a Options) -> Self {
        Reconciler {
            client,
            source,
            options,
            stage: Stage::Idle,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    fn enter(&mut self, stage: Stage) {
        tracing::debug!(from = ?self.stage, to = ?stage, "whitelist stage");
        self.stage = stage;
    }

    pub async fn run<C>(&mut self, manifest_json: &str, prompt: &mut C) -> Result<Reconciliation>
    where
        C: Confirm + ?Sized,
    {
        match self.drive(manifest_json, prompt).await {
            Ok(outcome) => {
                self.enter(Stage::Done);
                Ok(outcome)
            }
            Err(err) => {
                self.enter(Stage::Failed);
                Err(err)
            }
        }
    }

    async fn drive<C>(&mut self, manifest_json: &str, prompt: &mut C) -> Result<Reconciliation>
    where
        C: Confirm + ?Sized,
    {
        self.enter(Stage::FetchingTree);
        let tree = self.source.resolve(manifest_json).await?;
        let packages = flatten(&tree);
        let scanned = packages.len();

        self.enter(Stage::Scoring);
        let scored = fetch_scores(self.client, packages, self.options.concurrency).await?;

        self.enter(Stage::Classifying);
        let Classification { uncertified, .. } = classify(scored, self.options.threshold);
        let whitelist = self.client.whitelist().await?;
        let (uncertified, already_whitelisted) = exclude_whitelisted(uncertified, &whitelist);

        let selected = if self.options.all || uncertified.is_empty() {
            uncertified.clone()
        } else {
            self.enter(Stage::Confirming);
            prompt.begin(&uncertified);
            select_packages(&uncertified, prompt)?
        };

        self.enter(Stage::Submitting);
        let added = add_packages(self.client, selected, self.options.concurrency).await?;

        Ok(Reconciliation {
            scanned,
            uncertified,
            already_whitelisted,
            added,
        })
    }
}
