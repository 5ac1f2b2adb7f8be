//! Canonical field definitions for the condo transaction schema.

pub const CURRENT_SCHEMA_VERSION: &str = "2.0.0";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    String,
    Decimal,
    Integer,
    Date,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Decimal => "decimal",
            FieldType::Integer => "integer",
            FieldType::Date => "date",
        }
    }
}

#[derive(Debug, Clone)]
pub struct CanonicalField {
    pub name: &'static str,
    pub field_type: FieldType,
    pub required: bool,
    /// Header spellings accepted from CSV sources, in addition to the
    /// canonical name itself.
    pub aliases: Vec<String>,
}

impl CanonicalField {
    pub fn all_aliases(&self) -> Vec<&str> {
        let mut out = vec![self.name];
        out.extend(self.aliases.iter().map(|s| s.as_str()));
        out
    }
}

/// A versioned description of the logical input schema.
#[derive(Debug, Clone)]
pub struct SchemaContract {
    pub version: &'static str,
    pub fields: Vec<CanonicalField>,
    /// The tuple of canonical fields making up the natural key, in the
    /// exact order the row hash is computed over.
    pub natural_key_fields: Vec<&'static str>,
}

impl SchemaContract {
    /// The schema this crate implements: schema version 2, the
    /// contract-gated aggregation path.
    pub fn condo_v2() -> Self {
        use FieldType::*;
        let fields = vec![
            field("project_name", String, true, &["Project Name", "project name"]),
            field(
                "sale_date",
                Date,
                true,
                &["Sale Date", "Date of Sale", "transaction_month"],
            ),
            field(
                "property_type",
                String,
                true,
                &["Property Type", "Type"],
            ),
            field(
                "price",
                Decimal,
                true,
                &[
                    "Transacted Price ($)",
                    "Transacted Price",
                    "Price ($)",
                    "Nett Price($)",
                ],
            ),
            field(
                "area_sqft",
                Decimal,
                true,
                &["Area (SQFT)", "Area (Sqft)", "Area (SQM)"],
            ),
            field(
                "district",
                String,
                true,
                &["Postal District", "District"],
            ),
            field(
                "sale_type",
                String,
                true,
                &["Type of Sale", "Sale Type"],
            ),
            field("floor_range", String, false, &["Floor Level", "Floor Range"]),
            field("tenure", String, false, &["Tenure"]),
            field("street", String, false, &["Street Name", "Street"]),
            field("unit_count", Integer, false, &["No. of Units", "Unit Count"]),
            field("nett_price", Decimal, false, &["Nett Price($)"]),
            field("area_type", String, false, &["Area Type"]),
            field("market_segment", String, false, &["Market Segment"]),
        ];

        SchemaContract {
            version: CURRENT_SCHEMA_VERSION,
            fields,
            natural_key_fields: vec![
                "project_name",
                "transaction_month",
                "price",
                "area_sqft_x100",
                "floor_range",
            ],
        }
    }
}

fn field(name: &'static str, ty: FieldType, required: bool, aliases: &[&str]) -> CanonicalField {
    CanonicalField {
        name,
        field_type: ty,
        required,
        aliases: aliases.iter().map(|s| s.to_string()).collect(),
    }
}
