use nscm_semver::is_valid_range;
use serde::de::{self, IgnoredAny, MapAccess, SeqAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashSet;
use std::fmt;

/// One level of a resolved dependency tree, as produced by a dry-run install
/// or the registry resolution endpoint.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct PackageNode {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(default, skip_serializing_if = "Dependencies::is_empty")]
    pub dependencies: Dependencies,
}

impl PackageNode {
    pub fn new(name: &str, version: &str) -> Self {
        PackageNode {
            name: Some(name.to_string()),
            version: Some(version.to_string()),
            from: None,
            dependencies: Dependencies::default(),
        }
    }

    pub fn with_from(mut self, from: &str) -> Self {
        self.from = Some(from.to_string());
        self
    }

    pub fn with_dependency(mut self, name: &str, node: PackageNode) -> Self {
        self.dependencies.push(name, node);
        self
    }
}

/// Child map that keeps the order the resolver emitted, which is the order
/// packages are reported in.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dependencies(Vec<(String, PackageNode)>);

impl Dependencies {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn push(&mut self, name: &str, node: PackageNode) {
        self.0.push((name.to_string(), node));
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (&str, &PackageNode)> {
        self.0.iter().map(|(name, node)| (name.as_str(), node))
    }
}

impl<'de> Deserialize<'de> for Dependencies {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct OrderedVisitor;

        impl<'de> Visitor<'de> for OrderedVisitor {
            type Value = Dependencies;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of dependency name to node")
            }

            fn visit_unit<E>(self) -> Result<Self::Value, E> {
                Ok(Dependencies::default())
            }

            // Some resolvers emit `[]` for a leaf.
            fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
            where
                A: SeqAccess<'de>,
            {
                if seq.next_element::<IgnoredAny>()?.is_some() {
                    return Err(de::Error::invalid_length(1, &self));
                }
                Ok(Dependencies::default())
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((name, node)) = map.next_entry::<String, PackageNode>()? {
                    entries.push((name, node));
                }
                Ok(Dependencies(entries))
            }
        }

        deserializer.deserialize_any(OrderedVisitor)
    }
}

impl Serialize for Dependencies {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, node) in &self.0 {
            map.serialize_entry(name, node)?;
        }
        map.end()
    }
}

/// A single `name@version` found in the tree, optionally scored.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct FlatPackage {
    pub name: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
}

impl FlatPackage {
    pub fn new(name: &str, version: &str) -> Self {
        FlatPackage {
            name: name.to_string(),
            version: version.to_string(),
            score: None,
            from: None,
        }
    }

    pub fn key(&self) -> String {
        format!("{}@{}", self.name, self.version)
    }
}

/// Walk the tree depth first and list every distinct `name@version`.
///
/// Children are visited in declared order and a package is emitted before
/// its own dependencies. The first occurrence of a key wins; later ones are
/// dropped without merging their `from`. Nodes without a version are
/// skipped but their subtree is still walked.
pub fn flatten(root: &PackageNode) -> Vec<FlatPackage> {
    let mut result = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut stack: Vec<(&str, &PackageNode)> = root.dependencies.iter().rev().collect();

    while let Some((name, node)) = stack.pop() {
        if let Some(version) = node.version.as_deref() {
            let package = FlatPackage {
                name: name.to_string(),
                version: version.to_string(),
                score: None,
                from: node.from.as_deref().map(|range| normalize_range(name, range)),
            };

            if seen.insert(package.key()) {
                result.push(package);
            }
        }

        stack.extend(node.dependencies.iter().rev());
    }

    result
}

/// Strip a leading `name@` from a requested range and fall back to `*` for
/// tags and anything that is not a valid semver range.
pub fn normalize_range(name: &str, range: &str) -> String {
    let range = range.trim();
    let range = range
        .strip_prefix(name)
        .and_then(|rest| rest.strip_prefix('@'))
        .unwrap_or(range);

    if range.is_empty() || range == "latest" || !is_valid_range(range) {
        "*".to_string()
    } else {
        range.to_string()
    }
}

/// `name[@version]` split into its parts; scoped names keep their `@scope/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageSpec {
    pub name: String,
    pub version: Option<String>,
}

impl PackageSpec {
    pub fn parse(spec: &str) -> Self {
        let spec = spec.trim();
        let (scoped, body) = match spec.strip_prefix('@') {
            Some(rest) => (true, rest),
            None => (false, spec),
        };

        let (name, version) = match body.split_once('@') {
            Some((name, version)) => (name, Some(version)),
            None => (body, None),
        };

        PackageSpec {
            name: if scoped {
                format!("@{name}")
            } else {
                name.to_string()
            },
            version: version
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(String::from),
        }
    }

    /// Range used when resolving this spec; a bare name means latest.
    pub fn range(&self) -> &str {
        self.version.as_deref().unwrap_or("*")
    }
}

impl fmt::Display for PackageSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(version) => write!(f, "{}@{}", self.name, version),
            None => f.write_str(&self.name),
        }
    }
}
