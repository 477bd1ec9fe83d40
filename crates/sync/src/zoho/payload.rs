//! Zoho CRM record layouts.
//!
//! Maps [`NewProduct`] and [`NewDeal`] onto the Zoho field API names and
//! parses the record-level results Zoho returns for writes and searches.

use chrono::{DateTime, Utc};
use fulfillment_core::{Consignee, CrmProductId, FulfillmentType};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::crm::{CrmProduct, DealLine, NewDeal, NewProduct};
use crate::error::CrmError;

/// Distributor every product is sourced from.
const DISTRIBUTOR: &str = "RSR";
/// Timestamp layout of Zoho datetime fields.
const ZOHO_DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";
const DUPLICATE_DATA: &str = "DUPLICATE_DATA";

/// Body of a Zoho insert request.
#[derive(Debug, Serialize)]
pub struct WriteRequest<T> {
    pub data: Vec<T>,
    pub trigger: Vec<&'static str>,
}

impl<T> WriteRequest<T> {
    /// Insert one record and run the module's workflow rules.
    pub fn single(record: T) -> Self {
        Self {
            data: vec![record],
            trigger: vec!["workflow"],
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProductRecord<'a> {
    #[serde(rename = "Product_Name")]
    name: &'a str,
    #[serde(rename = "Product_Code")]
    code: &'a str,
    #[serde(rename = "Mfg_Part_Number")]
    mfg_part_number: &'a str,
    #[serde(rename = "RSR_Stock_Number", skip_serializing_if = "str::is_empty")]
    distributor_part_number: &'a str,
    #[serde(rename = "Manufacturer")]
    manufacturer: &'a str,
    #[serde(rename = "Product_Category")]
    category: &'a str,
    #[serde(rename = "FFL_Required")]
    ffl_required: bool,
    #[serde(rename = "Drop_Ship_Eligible")]
    drop_ship_eligible: bool,
    #[serde(rename = "In_House_Only")]
    in_house_only: bool,
    #[serde(rename = "Distributor")]
    distributor: &'static str,
    #[serde(rename = "UPC", skip_serializing_if = "Option::is_none")]
    upc: Option<&'a str>,
}

impl<'a> From<&'a NewProduct> for ProductRecord<'a> {
    fn from(product: &'a NewProduct) -> Self {
        Self {
            name: &product.name,
            code: &product.sku,
            mfg_part_number: &product.sku,
            distributor_part_number: &product.distributor_part_number,
            manufacturer: &product.manufacturer,
            category: &product.category,
            ffl_required: product.ffl_required,
            drop_ship_eligible: product.drop_ship_eligible,
            in_house_only: product.in_house_only,
            distributor: DISTRIBUTOR,
            upc: product.upc.as_deref(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Lookup<'a> {
    id: &'a str,
}

#[derive(Debug, Serialize)]
pub struct SubformRow<'a> {
    #[serde(rename = "Product_Lookup")]
    product: Lookup<'a>,
    #[serde(rename = "Product_Name")]
    name: &'a str,
    #[serde(rename = "Product_Code")]
    code: &'a str,
    #[serde(rename = "Quantity")]
    quantity: u32,
    #[serde(rename = "Unit_Price", with = "rust_decimal::serde::float")]
    unit_price: Decimal,
    #[serde(rename = "Line_Total", with = "rust_decimal::serde::float")]
    line_total: Decimal,
    #[serde(rename = "FFL_Required")]
    ffl_required: bool,
    #[serde(rename = "Manufacturer")]
    manufacturer: &'a str,
    #[serde(rename = "Product_Category")]
    category: &'a str,
}

impl<'a> From<&'a DealLine> for SubformRow<'a> {
    fn from(line: &'a DealLine) -> Self {
        Self {
            product: Lookup {
                id: line.product_id.as_str(),
            },
            name: &line.product_name,
            code: &line.sku,
            quantity: line.quantity,
            unit_price: line.unit_price,
            line_total: line.line_total,
            ffl_required: line.ffl_required,
            manufacturer: &line.manufacturer,
            category: &line.category,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DealRecord<'a> {
    #[serde(rename = "Deal_Name")]
    deal_name: &'a str,
    #[serde(rename = "Amount", with = "rust_decimal::serde::float")]
    amount: Decimal,
    #[serde(rename = "Stage")]
    stage: &'static str,
    #[serde(rename = "Contact_Name")]
    contact: Lookup<'a>,
    #[serde(rename = "TGF_Order")]
    order_number: &'a str,
    #[serde(rename = "Fulfillment_Type")]
    fulfillment_type: &'static str,
    #[serde(rename = "Consignee")]
    consignee: &'static str,
    #[serde(rename = "Ordering_Account")]
    ordering_account: &'a str,
    #[serde(rename = "Flow")]
    flow: &'static str,
    #[serde(rename = "Order_Status")]
    order_status: &'static str,
    #[serde(rename = "Hold_Type", skip_serializing_if = "Option::is_none")]
    hold_type: Option<&'static str>,
    #[serde(rename = "Hold_Started_At", skip_serializing_if = "Option::is_none")]
    hold_started_at: Option<String>,
    #[serde(rename = "FFL_Dealer_Name", skip_serializing_if = "Option::is_none")]
    ffl_dealer_name: Option<&'a str>,
    #[serde(rename = "FFL_License_Number", skip_serializing_if = "Option::is_none")]
    ffl_license: Option<&'a str>,
    #[serde(rename = "Submitted")]
    submitted: String,
    #[serde(rename = "Subform_1")]
    lines: Vec<SubformRow<'a>>,
}

impl<'a> From<&'a NewDeal> for DealRecord<'a> {
    fn from(deal: &'a NewDeal) -> Self {
        let submitted = format_datetime(deal.submitted_at);
        Self {
            deal_name: &deal.deal_name,
            amount: deal.amount,
            stage: deal.stage.as_str(),
            contact: Lookup {
                id: deal.contact.as_str(),
            },
            order_number: &deal.deal_name,
            fulfillment_type: fulfillment_picklist(deal.fulfillment_type),
            consignee: consignee_picklist(deal.consignee),
            ordering_account: &deal.ordering_account,
            flow: "Outbound",
            order_status: if deal.hold.is_some() { "Hold" } else { "Submitted" },
            hold_type: deal.hold.map(|hold| hold.as_str()),
            hold_started_at: deal.hold.map(|_| submitted.clone()),
            ffl_dealer_name: deal.ffl_dealer_name(),
            ffl_license: deal.ffl_dealer.as_ref().map(|d| d.license.as_str()),
            submitted,
            lines: deal.lines.iter().map(SubformRow::from).collect(),
        }
    }
}

/// `Fulfillment_Type` picklist value. Zoho does not distinguish the
/// drop-ship consignee here; that lives in `Consignee`.
#[must_use]
pub const fn fulfillment_picklist(fulfillment_type: FulfillmentType) -> &'static str {
    if fulfillment_type.is_drop_ship() {
        "Drop-Ship"
    } else {
        "In-House"
    }
}

/// `Consignee` picklist value.
#[must_use]
pub const fn consignee_picklist(consignee: Consignee) -> &'static str {
    match consignee {
        Consignee::RetailerWarehouse => "TGF",
        Consignee::FflDealer => "FFL",
        Consignee::Customer => "Customer",
    }
}

fn format_datetime(at: DateTime<Utc>) -> String {
    at.format(ZOHO_DATETIME_FORMAT).to_string()
}

// =============================================================================
// Responses
// =============================================================================

#[derive(Debug, Deserialize)]
struct WriteResponse {
    #[serde(default)]
    data: Vec<WriteResult>,
}

#[derive(Debug, Deserialize)]
struct WriteResult {
    #[serde(default)]
    code: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    details: WriteDetails,
}

#[derive(Debug, Default, Deserialize)]
struct WriteDetails {
    id: Option<String>,
    duplicate_record: Option<DuplicateRecord>,
}

#[derive(Debug, Deserialize)]
struct DuplicateRecord {
    id: String,
}

/// Top-level error body, e.g. `{"code":"INVALID_TOKEN", ...}`.
#[derive(Debug, Default, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}

impl ApiErrorBody {
    #[must_use]
    pub fn parse(body: &str) -> Self {
        serde_json::from_str(body).unwrap_or_default()
    }

    #[must_use]
    pub fn is_invalid_token(&self) -> bool {
        self.code == "INVALID_TOKEN" || self.code == "AUTHENTICATION_FAILURE"
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Vec<ProductRow>,
}

#[derive(Debug, Deserialize)]
struct ProductRow {
    id: String,
    #[serde(rename = "Product_Name", default)]
    name: Option<String>,
    #[serde(rename = "Mfg_Part_Number", default)]
    mfg_part_number: Option<String>,
    #[serde(rename = "Product_Code", default)]
    code: Option<String>,
}

/// Extract the record id from the result of a single-record insert.
///
/// # Errors
///
/// Returns `CrmError::Duplicate` for `DUPLICATE_DATA`, `CrmError::Rejected`
/// for other record-level errors, and `CrmError::Parse` for a body that is
/// not a Zoho write result.
pub fn parse_write_response(body: &str) -> Result<String, CrmError> {
    let response: WriteResponse =
        serde_json::from_str(body).map_err(|e| CrmError::Parse(e.to_string()))?;
    let result = response
        .data
        .into_iter()
        .next()
        .ok_or_else(|| CrmError::Parse("write response has no data".to_string()))?;

    if result.status.eq_ignore_ascii_case("success") {
        return result
            .details
            .id
            .ok_or_else(|| CrmError::Parse("write succeeded without a record id".to_string()));
    }

    if result.code == DUPLICATE_DATA {
        let existing = result
            .details
            .duplicate_record
            .map(|record| record.id)
            .or(result.details.id);
        return Err(CrmError::Duplicate {
            existing_id: existing.map(CrmProductId::new),
        });
    }

    Err(CrmError::Rejected {
        code: result.code,
        message: result.message,
    })
}

/// Pick the product whose part number matches `sku` exactly.
///
/// # Errors
///
/// Returns `CrmError::Parse` if the body is not a Zoho search result.
pub fn parse_search_response(body: &str, sku: &str) -> Result<Option<CrmProduct>, CrmError> {
    if body.trim().is_empty() {
        return Ok(None);
    }
    let response: SearchResponse =
        serde_json::from_str(body).map_err(|e| CrmError::Parse(e.to_string()))?;

    Ok(response
        .data
        .into_iter()
        .find(|row| {
            row.mfg_part_number.as_deref() == Some(sku) || row.code.as_deref() == Some(sku)
        })
        .map(|row| CrmProduct {
            id: CrmProductId::new(row.id),
            sku: sku.to_string(),
            name: row.name.unwrap_or_default(),
        }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;
    use fulfillment_core::{ContactRef, DealStage, FflDealer, HoldType, OrderStatus};
    use serde_json::json;

    use super::*;

    fn deal(hold: Option<HoldType>) -> NewDeal {
        NewDeal {
            deal_name: "0001234AZ".to_string(),
            amount: Decimal::new(50000, 2),
            stage: DealStage::Qualification,
            contact: ContactRef::new("5843259000000100001"),
            fulfillment_type: FulfillmentType::DropShipFfl,
            consignee: Consignee::FflDealer,
            ordering_account: "99902".to_string(),
            ffl_dealer: Some(FflDealer {
                name: "Lone Star Arms".to_string(),
                license: "5-74-000-00-0A-00000".to_string(),
            }),
            order_status: OrderStatus::Pending,
            hold,
            submitted_at: Utc.with_ymd_and_hms(2025, 3, 14, 9, 26, 53).unwrap(),
            lines: vec![DealLine {
                product_id: CrmProductId::new("5843259000001000001"),
                sku: "GLOCK19".to_string(),
                product_name: "Glock 19 Gen5".to_string(),
                quantity: 1,
                unit_price: Decimal::new(50000, 2),
                line_total: Decimal::new(50000, 2),
                ffl_required: true,
                manufacturer: "Glock".to_string(),
                category: "Handguns".to_string(),
            }],
        }
    }

    #[test]
    fn test_deal_record_fields() {
        let deal = deal(None);
        let value = serde_json::to_value(WriteRequest::single(DealRecord::from(&deal))).unwrap();
        let record = &value["data"][0];

        assert_eq!(value["trigger"], json!(["workflow"]));
        assert_eq!(record["Deal_Name"], "0001234AZ");
        assert_eq!(record["TGF_Order"], "0001234AZ");
        assert_eq!(record["Amount"], json!(500.0));
        assert_eq!(record["Fulfillment_Type"], "Drop-Ship");
        assert_eq!(record["Consignee"], "FFL");
        assert_eq!(record["Contact_Name"]["id"], "5843259000000100001");
        assert_eq!(record["Order_Status"], "Submitted");
        assert_eq!(record["Submitted"], "2025-03-14T09:26:53");
        assert_eq!(record["FFL_Dealer_Name"], "Lone Star Arms");
        assert!(record.get("Hold_Type").is_none());

        let row = &record["Subform_1"][0];
        assert_eq!(row["Product_Lookup"]["id"], "5843259000001000001");
        assert_eq!(row["Quantity"], 1);
        assert_eq!(row["Line_Total"], json!(500.0));
    }

    #[test]
    fn test_held_deal_record() {
        let deal = deal(Some(HoldType::FflNotOnFile));
        let value = serde_json::to_value(DealRecord::from(&deal)).unwrap();

        assert_eq!(value["Order_Status"], "Hold");
        assert_eq!(value["Hold_Type"], "FFL not on file");
        assert_eq!(value["Hold_Started_At"], "2025-03-14T09:26:53");
    }

    #[test]
    fn test_product_record_fields() {
        let product = NewProduct {
            sku: "MAG571".to_string(),
            name: "PMAG 30 AR/M4 Gen M3".to_string(),
            manufacturer: "Magpul".to_string(),
            category: "Magazines".to_string(),
            distributor_part_number: "MPIMAG571BLK".to_string(),
            upc: None,
            ffl_required: false,
            drop_ship_eligible: true,
            in_house_only: false,
        };
        let value = serde_json::to_value(ProductRecord::from(&product)).unwrap();

        assert_eq!(value["Mfg_Part_Number"], "MAG571");
        assert_eq!(value["Product_Code"], "MAG571");
        assert_eq!(value["RSR_Stock_Number"], "MPIMAG571BLK");
        assert_eq!(value["Distributor"], "RSR");
        assert_eq!(value["Drop_Ship_Eligible"], true);
        assert!(value.get("UPC").is_none());
    }

    #[test]
    fn test_parse_write_success() {
        let body = r#"{"data":[{"code":"SUCCESS","details":{"id":"5843259000001234567"},"message":"record added","status":"success"}]}"#;
        assert_eq!(parse_write_response(body).unwrap(), "5843259000001234567");
    }

    #[test]
    fn test_parse_write_duplicate() {
        let body = r#"{"data":[{"code":"DUPLICATE_DATA","details":{"api_name":"Mfg_Part_Number","id":"5843259000000999999"},"message":"duplicate data","status":"error"}]}"#;
        let err = parse_write_response(body).unwrap_err();
        assert!(matches!(
            err,
            CrmError::Duplicate { existing_id: Some(ref id) } if id.as_str() == "5843259000000999999"
        ));
    }

    #[test]
    fn test_parse_write_rejected() {
        let body = r#"{"data":[{"code":"MANDATORY_NOT_FOUND","details":{"api_name":"Deal_Name"},"message":"required field not found","status":"error"}]}"#;
        let err = parse_write_response(body).unwrap_err();
        assert!(matches!(err, CrmError::Rejected { ref code, .. } if code == "MANDATORY_NOT_FOUND"));
    }

    #[test]
    fn test_parse_search_exact_match() {
        let body = r#"{"data":[
            {"id":"1","Product_Name":"PMAG 30 FDE","Mfg_Part_Number":"MAG571FDE"},
            {"id":"2","Product_Name":"PMAG 30","Mfg_Part_Number":"MAG571"}
        ]}"#;
        let product = parse_search_response(body, "MAG571").unwrap().unwrap();
        assert_eq!(product.id.as_str(), "2");
        assert_eq!(product.name, "PMAG 30");
    }

    #[test]
    fn test_parse_search_empty_body() {
        assert!(parse_search_response("", "MAG571").unwrap().is_none());
        assert!(
            parse_search_response(r#"{"data":[]}"#, "MAG571")
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn test_invalid_token_body() {
        let body = ApiErrorBody::parse(
            r#"{"code":"INVALID_TOKEN","details":{},"message":"invalid oauth token","status":"error"}"#,
        );
        assert!(body.is_invalid_token());
        assert!(!ApiErrorBody::parse("not json").is_invalid_token());
    }
}
