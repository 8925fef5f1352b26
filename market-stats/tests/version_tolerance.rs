use market_stats::{
    adapter::Adapter,
    fields::{AggregateResponse, ContractVersion, ExecutionMode, VersionGate},
    period::{sort_ascending, Grain},
    rollup::rollup_rows,
    transforms::{region_breakdown, sale_type_breakdown},
    Field,
};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

fn v1_response() -> Value {
    json!({
        "data": [
            {"year": 2024, "quarter": 2, "sale_type": "Resale", "market_segment": "RCR", "txn_count": 40, "total_value": "52000000", "total_sqft": 30000},
            {"year": 2024, "quarter": 1, "sale_type": "New Sale", "market_segment": "CCR", "txn_count": 12, "total_value": 36000000, "total_sqft": 12000}
        ],
        "meta": {"contract_version": "v1"}
    })
}

fn v2_response() -> Value {
    json!({
        "data": [
            {"period": "2024-Q2", "period_grain": "quarter", "sale_type": "resale", "market_segment": "RCR", "txn_count": 40, "total_value": 52000000, "total_area": 30000},
            {"period": "2024-Q1", "period_grain": "quarter", "sale_type": "new_sale", "market_segment": "CCR", "txn_count": 12, "total_value": 36000000, "total_area": 12000}
        ],
        "meta": {"contractVersion": "v2"}
    })
}

fn v3_response() -> Value {
    json!({
        "data": [
            {"period": "2024-Q2", "periodGrain": "quarter", "saleType": "resale", "region": "RCR", "count": 40, "totalValue": 52000000, "totalArea": 30000},
            {"period": "2024-Q1", "periodGrain": "quarter", "saleType": "new_sale", "region": "CCR", "count": 12, "totalValue": 36000000, "totalArea": 12000}
        ],
        "meta": {"contractVersion": "v3"}
    })
}

fn accept(body: Value) -> Vec<market_stats::AggregateRow> {
    let response: AggregateResponse = serde_json::from_value(body).unwrap();
    let adapter = Adapter::new(VersionGate::new(ContractVersion::ALL, ExecutionMode::Test));
    adapter.accept(response).unwrap()
}

#[test]
fn every_contract_version_yields_the_same_series() {
    let [v1, v2, v3] = [v1_response(), v2_response(), v3_response()].map(accept);

    let sale_types = sale_type_breakdown(&v3, Some(Grain::Quarter));
    assert_eq!(sale_type_breakdown(&v1, Some(Grain::Quarter)), sale_types);
    assert_eq!(sale_type_breakdown(&v2, Some(Grain::Quarter)), sale_types);
    assert_eq!(sale_types.len(), 2);
    assert_eq!(sale_types[0].new_sale_count, 12);
    assert_eq!(sale_types[1].resale_count, 40);

    let regions = region_breakdown(&v3, Some(Grain::Quarter));
    assert_eq!(region_breakdown(&v1, Some(Grain::Quarter)), regions);
    assert_eq!(region_breakdown(&v2, Some(Grain::Quarter)), regions);

    let yearly = rollup_rows(&v3, Some(Grain::Quarter), Grain::Year, &[Field::Region]);
    assert_eq!(
        rollup_rows(&v1, Some(Grain::Quarter), Grain::Year, &[Field::Region]),
        yearly
    );
    assert_eq!(
        rollup_rows(&v2, Some(Grain::Quarter), Grain::Year, &[Field::Region]),
        yearly
    );
}

#[test]
fn sorting_is_shape_independent_and_idempotent() {
    for rows in [v1_response(), v2_response(), v3_response()].map(accept) {
        let sorted = sort_ascending(&rows, Some(Grain::Quarter));
        assert_eq!(sort_ascending(&sorted, Some(Grain::Quarter)), sorted);
        assert_eq!(sorted[0].u64_field(Field::Count), Some(12));
        assert_eq!(sorted[1].u64_field(Field::Count), Some(40));
    }
}

#[test]
fn unknown_version_fails_only_in_test_mode() {
    let body = json!({"data": [{"period": "2024"}], "meta": {"contractVersion": "v0"}});
    let response: AggregateResponse = serde_json::from_value(body).unwrap();

    let strict = Adapter::new(VersionGate::new(ContractVersion::ALL, ExecutionMode::Test));
    assert!(strict.accept(response.clone()).is_err());

    for mode in [ExecutionMode::Development, ExecutionMode::Production] {
        let adapter = Adapter::new(VersionGate::new(ContractVersion::ALL, mode));
        assert_eq!(adapter.accept(response.clone()).unwrap().len(), 1);
    }
}
