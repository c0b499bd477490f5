use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::util::urljoin;

/// Largest number of records requested per page.
pub const PAGE_SIZE: u64 = 100;

pub(crate) const SEARCH_PATH: &str = "/api/action/datastore/search.json";

const RFC3986_PART: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    /// Token sent in `sort[<field>]=`.
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Ascending => "asc",
            SortDirection::Descending => "desc",
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortDirection {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Ok(SortDirection::Ascending),
            "desc" | "descending" => Ok(SortDirection::Descending),
            other => Err(Error::configuration(format!(
                "invalid sort direction [{}] (expected asc or desc)",
                other
            ))),
        }
    }
}

/// How the assembled query string is escaped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Escape {
    /// Emit keys and values verbatim, only turning spaces into `%20`.
    ///
    /// Commas, quotes and brackets reach the portal untouched.
    #[default]
    Spaces,
    /// Percent-encode every key and value with the RFC 3986 unreserved set.
    Full,
}

/// Parameters of one datastore search.
///
/// ```
/// use dkanapi::{SearchQuery, SortDirection};
///
/// let query = SearchQuery::new("d6d3e5ed-2a1b-4d7c-9fc3-5b2f4c1a7e90")
///     .filter_fields(["state", "year"])
///     .filter_values([vec!["AK", "AL"], vec!["2020"]])
///     .fields(["state", "year", "units"])
///     .sort("units", SortDirection::Descending)
///     .max_records(150);
/// assert_eq!(query.page_limit(), 100);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchQuery {
    resource_id: String,
    filter_fields: Vec<String>,
    filter_values: Vec<Vec<String>>,
    fields: Vec<String>,
    query: Vec<String>,
    sort_field: Option<String>,
    sort_direction: Option<SortDirection>,
    max_records: Option<u64>,
}

impl SearchQuery {
    pub fn new(resource_id: impl Into<String>) -> Self {
        Self {
            resource_id: resource_id.into(),
            ..Self::default()
        }
    }

    /// Fields to filter on. Must line up with [`SearchQuery::filter_values`].
    pub fn filter_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.filter_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Accepted values, one list per filter field, in the same order.
    ///
    /// Values are joined with commas on the wire; a value that itself contains
    /// a comma is split by the portal. Use a full-text query for those.
    pub fn filter_values<I, V, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.filter_values = values
            .into_iter()
            .map(|v| v.into_iter().map(Into::into).collect())
            .collect();
        self
    }

    /// Output columns. All columns are returned when empty.
    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Full-text search terms.
    pub fn query<I, S>(mut self, terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.query = terms.into_iter().map(Into::into).collect();
        self
    }

    pub fn sort_field(mut self, field: impl Into<String>) -> Self {
        self.sort_field = Some(field.into());
        self
    }

    pub fn sort_direction(mut self, direction: SortDirection) -> Self {
        self.sort_direction = Some(direction);
        self
    }

    pub fn sort(self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.sort_field(field).sort_direction(direction)
    }

    pub fn max_records(mut self, max: u64) -> Self {
        self.max_records = Some(max);
        self
    }

    pub fn resource_id(&self) -> &str {
        &self.resource_id
    }

    pub fn max_record_count(&self) -> Option<u64> {
        self.max_records
    }

    /// Records requested per page: the maximum record count clamped to [`PAGE_SIZE`].
    pub fn page_limit(&self) -> u64 {
        self.max_records.map_or(PAGE_SIZE, |m| m.min(PAGE_SIZE))
    }

    /// Checks argument consistency without touching the network.
    pub fn validate(&self) -> Result<()> {
        if self.resource_id.trim().is_empty() {
            return Err(Error::configuration("resource id must not be empty"));
        }

        // Covers fields without values and values without fields.
        if self.filter_fields.len() != self.filter_values.len() {
            return Err(Error::configuration(format!(
                "mismatched filter arguments: {} filter field(s) but {} filter value list(s)",
                self.filter_fields.len(),
                self.filter_values.len()
            )));
        }

        if self.sort_field.is_some() && self.sort_direction.is_none() {
            return Err(Error::configuration(
                "sort field given without a sort direction (asc or desc)",
            ));
        }

        Ok(())
    }

    /// Query parameters in wire order, before any escaping. Offset is not included.
    pub(crate) fn pairs(&self) -> Result<Vec<(String, String)>> {
        self.validate()?;

        let mut pairs = vec![("resource_id".to_string(), self.resource_id.clone())];

        for (field, values) in self.filter_fields.iter().zip(&self.filter_values) {
            pairs.push((format!("filters[{}]", field), values.join(",")));
        }

        if !self.fields.is_empty() {
            pairs.push(("fields[t]".to_string(), self.fields.join(",")));
        }

        if !self.query.is_empty() {
            let terms = self
                .query
                .iter()
                .map(|t| format!("\"{}\"", t))
                .collect::<Vec<_>>()
                .join(",");
            pairs.push(("query".to_string(), terms));
        }

        if let (Some(field), Some(direction)) = (&self.sort_field, self.sort_direction) {
            pairs.push((format!("sort[{}]", field), direction.as_str().to_string()));
        }

        pairs.push(("limit".to_string(), self.page_limit().to_string()));
        Ok(pairs)
    }

    /// The search URL for the first page, as it will be requested.
    pub fn url(&self, base_url: &str, escape: Escape) -> Result<String> {
        let pairs = self.pairs()?;
        Ok(encode_url(base_url, &pairs, escape))
    }
}

pub(crate) fn encode_url(base_url: &str, pairs: &[(String, String)], escape: Escape) -> String {
    let query = pairs
        .iter()
        .map(|(k, v)| match escape {
            Escape::Spaces => format!("{}={}", k, v),
            Escape::Full => format!(
                "{}={}",
                utf8_percent_encode(k, RFC3986_PART),
                utf8_percent_encode(v, RFC3986_PART)
            ),
        })
        .collect::<Vec<_>>()
        .join("&");

    let url = format!("{}?{}", urljoin(base_url, SEARCH_PATH), query);
    url.replace(' ', "%20")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const BASE: &str = "https://data.example.gov";

    fn query_part(url: &str) -> &str {
        url.split_once('?').map(|(_, q)| q).unwrap_or("")
    }

    #[test]
    fn minimal_query_has_resource_and_limit() {
        let url = SearchQuery::new("abc").url(BASE, Escape::Spaces).unwrap();
        assert_eq!(
            url,
            "https://data.example.gov/api/action/datastore/search.json?resource_id=abc&limit=100"
        );
    }

    #[test]
    fn one_filter_segment_per_field_in_order() {
        let url = SearchQuery::new("abc")
            .filter_fields(["state", "year"])
            .filter_values([vec!["AK", "AL", "AZ"], vec!["2020"]])
            .url(BASE, Escape::Spaces)
            .unwrap();

        let q = query_part(&url);
        assert_eq!(q.matches("filters[").count(), 2);
        assert!(q.contains("filters[state]=AK,AL,AZ"));
        assert!(q.contains("filters[year]=2020"));
        assert!(q.find("filters[state]").unwrap() < q.find("filters[year]").unwrap());
    }

    #[test]
    fn fields_query_and_sort_encoding() {
        let url = SearchQuery::new("abc")
            .fields(["state", "units"])
            .query(["flu", "cold"])
            .sort("units", SortDirection::Descending)
            .url(BASE, Escape::Spaces)
            .unwrap();

        assert_eq!(
            query_part(&url),
            "resource_id=abc&fields[t]=state,units&query=\"flu\",\"cold\"&sort[units]=desc&limit=100"
        );
    }

    #[test]
    fn fields_parameter_omitted_without_fields() {
        let url = SearchQuery::new("abc").url(BASE, Escape::Spaces).unwrap();
        assert!(!url.contains("fields[t]"));
        assert!(!url.contains("query="));
        assert!(!url.contains("sort["));
    }

    #[test]
    fn filter_fields_without_values_is_configuration_error() {
        let err = SearchQuery::new("abc")
            .filter_fields(["state"])
            .url(BASE, Escape::Spaces)
            .unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
        assert!(err.to_string().contains("mismatched filter arguments"));

        let err = SearchQuery::new("abc")
            .filter_values([vec!["AK"]])
            .validate()
            .unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
    }

    #[test]
    fn filter_length_mismatch_is_configuration_error() {
        let err = SearchQuery::new("abc")
            .filter_fields(["state", "year"])
            .filter_values([vec!["AK"]])
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("2 filter field(s) but 1 filter value list(s)"));
    }

    #[test]
    fn empty_resource_id_is_rejected() {
        let err = SearchQuery::new("  ").validate().unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
    }

    #[test]
    fn sort_field_requires_direction() {
        let err = SearchQuery::new("abc").sort_field("units").validate().unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));

        // A lone direction has nothing to apply to and is left out.
        let url = SearchQuery::new("abc")
            .sort_direction(SortDirection::Ascending)
            .url(BASE, Escape::Spaces)
            .unwrap();
        assert!(!url.contains("sort["));
    }

    #[test]
    fn page_limit_is_clamped() {
        assert_eq!(SearchQuery::new("a").page_limit(), 100);
        assert_eq!(SearchQuery::new("a").max_records(50).page_limit(), 50);
        assert_eq!(SearchQuery::new("a").max_records(100).page_limit(), 100);
        assert_eq!(SearchQuery::new("a").max_records(150).page_limit(), 100);
        assert_eq!(SearchQuery::new("a").max_records(0).page_limit(), 0);
        assert_eq!(SearchQuery::new("a").max_record_count(), None);
        assert_eq!(SearchQuery::new("a").max_records(150).max_record_count(), Some(150));
    }

    #[test]
    fn spaces_become_percent_20_everywhere() {
        let query = SearchQuery::new("abc")
            .filter_fields(["state name"])
            .filter_values([vec!["New York", "New Jersey"]])
            .fields(["state name"])
            .query(["drug name"])
            .sort("state name", SortDirection::Ascending);

        for escape in [Escape::Spaces, Escape::Full] {
            let url = query.url("https://portal.example.gov/my portal", escape).unwrap();
            assert!(!url.contains(' '), "{url}");
            assert!(url.contains("%20"));
        }

        let url = query.url(BASE, Escape::Spaces).unwrap();
        assert!(url.contains("filters[state%20name]=New%20York,New%20Jersey"));
        assert!(url.contains("query=\"drug%20name\""));
    }

    #[test]
    fn default_escaping_leaves_reserved_characters_alone() {
        let url = SearchQuery::new("abc")
            .filter_fields(["city"])
            .filter_values([vec!["A&B", "C/D"]])
            .url(BASE, Escape::Spaces)
            .unwrap();
        assert!(url.contains("filters[city]=A&B,C/D"));
    }

    #[test]
    fn full_escaping_only_adds_escapes() {
        let query = SearchQuery::new("abc")
            .filter_fields(["city"])
            .filter_values([vec!["A&B", "St. Paul"]])
            .fields(["city", "pop"])
            .query(["x y"]);

        let spaces = query.url(BASE, Escape::Spaces).unwrap();
        let full = query.url(BASE, Escape::Full).unwrap();

        assert_eq!(
            query_part(&full),
            "resource_id=abc&filters%5Bcity%5D=A%26B%2CSt.%20Paul&fields%5Bt%5D=city%2Cpop&query=%22x%20y%22&limit=100"
        );

        // Decoding the fully escaped form yields the default form.
        let decoded = percent_encoding::percent_decode_str(&full)
            .decode_utf8()
            .unwrap()
            .replace(' ', "%20");
        assert_eq!(decoded, spaces);
    }

    #[test]
    fn sort_direction_parses_tokens() {
        assert_eq!("asc".parse::<SortDirection>().unwrap(), SortDirection::Ascending);
        assert_eq!("Descending".parse::<SortDirection>().unwrap(), SortDirection::Descending);
        assert!("sideways".parse::<SortDirection>().is_err());
        assert_eq!(SortDirection::Descending.to_string(), "desc");
    }
}
