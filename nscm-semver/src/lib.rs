use semver::VersionReq;

/// Why a string is not a usable npm range.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
enum RangeError {
    #[error("empty alternative in {0:?}")]
    EmptyAlternative(String),
    #[error("incomplete hyphen range in {0:?}")]
    DanglingHyphen(String),
    #[error("{input:?} is not a range: {reason}")]
    Invalid { input: String, reason: String },
}

/// Parse an npm dependency range (`^1.2.3`, `>= 1.0.0 < 2`,
/// `1.0.0 - 2.0.0`, `^1 || ^2`) into one `VersionReq` per `||` alternative.
fn parse_range(input: &str) -> Result<Vec<VersionReq>, RangeError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(vec![VersionReq::STAR]);
    }

    let mut alternatives = Vec::new();
    for part in trimmed.split("||") {
        let tokens = tokenize(part);
        if tokens.is_empty() {
            return Err(RangeError::EmptyAlternative(input.to_string()));
        }

        let req = to_requirement(&tokens, input)?;
        let parsed = VersionReq::parse(&req).map_err(|err| RangeError::Invalid {
            input: input.to_string(),
            reason: err.to_string(),
        })?;
        alternatives.push(parsed);
    }

    Ok(alternatives)
}

/// True when `input` is a range npm would accept for a registry dependency.
/// Dist-tags (`latest`, `next`), urls and paths are not ranges.
pub fn is_valid_range(input: &str) -> bool {
    parse_range(input).is_ok()
}

const OPERATORS: [&str; 7] = ["=", ">", ">=", "<", "<=", "~", "^"];

// Whitespace separated tokens with a leading `v` dropped from versions.
// A bare operator is glued to the version that follows it.
fn tokenize(part: &str) -> Vec<String> {
    let mut tokens: Vec<String> = Vec::new();
    let mut pending_op: Option<&str> = None;

    for raw in part.split_whitespace() {
        if OPERATORS.contains(&raw) {
            pending_op = Some(raw);
            continue;
        }

        let (op, version) = split_operator(raw);
        let version = version.strip_prefix('v').unwrap_or(version);
        let op = match pending_op.take() {
            Some(pending) if op.is_empty() => pending,
            _ => op,
        };
        tokens.push(format!("{op}{version}"));
    }

    if let Some(op) = pending_op {
        tokens.push(op.to_string());
    }
    tokens
}

fn split_operator(token: &str) -> (&str, &str) {
    let end = token
        .find(|c: char| !matches!(c, '=' | '>' | '<' | '~' | '^'))
        .unwrap_or(token.len());
    token.split_at(end)
}

fn to_requirement(tokens: &[String], input: &str) -> Result<String, RangeError> {
    if let Some(hyphen) = tokens.iter().position(|t| t == "-") {
        return match (hyphen, tokens.len()) {
            (1, 3) => Ok(format!(">={}, <={}", tokens[0], tokens[2])),
            _ => Err(RangeError::DanglingHyphen(input.to_string())),
        };
    }

    if tokens.iter().any(|t| OPERATORS.contains(&t.as_str())) {
        return Err(RangeError::Invalid {
            input: input.to_string(),
            reason: "operator without a version".into(),
        });
    }

    Ok(tokens.join(", "))
}
