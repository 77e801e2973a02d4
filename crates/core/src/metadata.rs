use chrono::{DateTime, SecondsFormat, Utc};
use chrono_tz::Tz;

use crate::types::{Attribute, AttributeValue, Metadata};

pub const TRAIT_DOMAIN_LENGTH: &str = "Domain Length";
pub const TRAIT_TLD: &str = "TLD";
pub const TRAIT_HAS_SUBDOMAIN: &str = "Has Subdomain";
pub const TRAIT_WRAPPED_DATE: &str = "Wrapped Date";

/// Derives token metadata from a domain and its mint timestamp.
///
/// The only configuration is the timezone used to render the human readable
/// wrap date; everything else is a pure function of the inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetadataBuilder {
    timezone: Tz,
}

impl MetadataBuilder {
    pub fn new(timezone: Tz) -> Self {
        Self { timezone }
    }

    pub fn build(&self, domain: &str, minted_at: DateTime<Utc>) -> Metadata {
        let label_count = domain.split('.').count();
        let tld = domain.rsplit('.').next().unwrap_or(domain).to_uppercase();
        let wrapped_date = minted_at
            .with_timezone(&self.timezone)
            .format("%-m/%-d/%Y")
            .to_string();

        Metadata {
            name: format!("Domain NFT: {domain}"),
            description: format!("NFT representing ownership of {domain} domain"),
            domain: domain.to_string(),
            wrapped_at: minted_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            attributes: vec![
                attribute(
                    TRAIT_DOMAIN_LENGTH,
                    AttributeValue::Number(domain.chars().count() as u64),
                ),
                attribute(TRAIT_TLD, AttributeValue::Text(tld)),
                attribute(
                    TRAIT_HAS_SUBDOMAIN,
                    AttributeValue::Text(if label_count > 2 { "Yes" } else { "No" }.to_string()),
                ),
                attribute(TRAIT_WRAPPED_DATE, AttributeValue::Text(wrapped_date)),
            ],
        }
    }
}

impl Default for MetadataBuilder {
    fn default() -> Self {
        Self::new(Tz::UTC)
    }
}

/// Builds metadata rendering dates in UTC.
pub fn build_metadata(domain: &str, minted_at: DateTime<Utc>) -> Metadata {
    MetadataBuilder::default().build(domain, minted_at)
}

fn attribute(trait_type: &str, value: AttributeValue) -> Attribute {
    Attribute {
        trait_type: trait_type.to_string(),
        value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn minted_at() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-03-05T23:30:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn derives_attributes_for_nested_domain() {
        let metadata = build_metadata("shop.example.co.uk", minted_at());

        assert_eq!(
            metadata.attribute(TRAIT_DOMAIN_LENGTH).and_then(AttributeValue::as_number),
            Some(18)
        );
        assert_eq!(
            metadata.attribute(TRAIT_TLD).and_then(AttributeValue::as_text),
            Some("UK")
        );
        assert_eq!(
            metadata.attribute(TRAIT_HAS_SUBDOMAIN).and_then(AttributeValue::as_text),
            Some("Yes")
        );
    }

    #[test]
    fn derives_attributes_for_apex_domain() {
        let metadata = build_metadata("site.io", minted_at());

        assert_eq!(metadata.name, "Domain NFT: site.io");
        assert_eq!(
            metadata.description,
            "NFT representing ownership of site.io domain"
        );
        assert_eq!(
            metadata.attribute(TRAIT_DOMAIN_LENGTH).and_then(AttributeValue::as_number),
            Some(7)
        );
        assert_eq!(
            metadata.attribute(TRAIT_TLD).and_then(AttributeValue::as_text),
            Some("IO")
        );
        assert_eq!(
            metadata.attribute(TRAIT_HAS_SUBDOMAIN).and_then(AttributeValue::as_text),
            Some("No")
        );
    }

    #[test]
    fn serializes_to_stable_document_shape() {
        let metadata = build_metadata("Site.io", minted_at());
        let value = serde_json::to_value(&metadata).expect("serialize");

        assert_eq!(
            value,
            json!({
                "name": "Domain NFT: Site.io",
                "description": "NFT representing ownership of Site.io domain",
                "domain": "Site.io",
                "wrapped_at": "2024-03-05T23:30:00.000Z",
                "attributes": [
                    { "trait_type": "Domain Length", "value": 7 },
                    { "trait_type": "TLD", "value": "IO" },
                    { "trait_type": "Has Subdomain", "value": "No" },
                    { "trait_type": "Wrapped Date", "value": "3/5/2024" }
                ]
            })
        );
    }

    #[test]
    fn wrapped_date_follows_display_timezone() {
        let builder = MetadataBuilder::new(chrono_tz::Asia::Tokyo);
        let metadata = builder.build("site.io", minted_at());

        assert_eq!(
            metadata.attribute(TRAIT_WRAPPED_DATE).and_then(AttributeValue::as_text),
            Some("3/6/2024")
        );
        assert_eq!(metadata.wrapped_at, "2024-03-05T23:30:00.000Z");
    }

    #[test]
    fn identical_inputs_build_identical_metadata() {
        assert_eq!(
            build_metadata("a.com", minted_at()),
            build_metadata("a.com", minted_at())
        );
    }
}
