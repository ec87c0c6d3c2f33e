use serde::Deserialize;
use serde_json::Value;

use crate::data_access::query::{FindOptions, Filter, Projection, QueryError, Sort};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid {param} parameter")]
pub struct InvalidParameter {
    pub param: &'static str,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListQuery {
    #[serde(rename = "where")]
    pub filter: Option<String>,
    pub sort: Option<String>,
    pub select: Option<String>,
    pub skip: Option<String>,
    pub limit: Option<String>,
    pub count: Option<String>,
}

impl ListQuery {
    pub fn wants_count(&self) -> bool {
        matches!(self.count.as_deref(), Some("true" | "1"))
    }

    pub fn projection(&self) -> Result<Projection, InvalidParameter> {
        Ok(parse_json(self.select.as_deref(), "select", Projection::from_json)?.unwrap_or_default())
    }

    /// `default_limit: None` means unlimited, as does an explicit `limit=0`.
    pub fn find_options(&self, default_limit: Option<u64>) -> Result<FindOptions, InvalidParameter> {
        let filter = parse_json(self.filter.as_deref(), "where", Filter::from_json)?.unwrap_or_default();
        let sort = parse_json(self.sort.as_deref(), "sort", Sort::from_json)?.unwrap_or_default();
        let projection = self.projection()?;

        let skip = parse_integer(self.skip.as_deref()).unwrap_or(0);
        let limit = match parse_integer(self.limit.as_deref()) {
            Some(0) => None,
            Some(n) => Some(n),
            None => default_limit,
        };

        Ok(FindOptions {
            filter,
            sort,
            projection,
            skip,
            limit,
        })
    }
}

fn parse_json<T>(
    raw: Option<&str>,
    param: &'static str,
    build: impl FnOnce(Value) -> Result<T, QueryError>,
) -> Result<Option<T>, InvalidParameter> {
    let Some(raw) = raw.filter(|r| !r.trim().is_empty()) else {
        return Ok(None);
    };
    let value: Value = serde_json::from_str(raw).map_err(|_| InvalidParameter { param })?;
    build(value).map(Some).map_err(|error| {
        tracing::debug!(param, %error, "rejected query parameter");
        InvalidParameter { param }
    })
}

/// Lenient integer parsing: leading sign and digits only, like `parseInt`.
/// Negative values count by magnitude; anything unparsable is ignored.
fn parse_integer(raw: Option<&str>) -> Option<u64> {
    let raw = raw?.trim();
    let digits = raw.strip_prefix(|c: char| c == '-' || c == '+').unwrap_or(raw);
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    digits[..end].parse().ok()
}
