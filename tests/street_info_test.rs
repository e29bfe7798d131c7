mod common;

use common::{TestApp, TEST_USRN, UNKNOWN_USRN};
use serde_json::Value;

#[tokio::test]
async fn street_info_returns_summary_for_known_usrn() {
    let app = TestApp::spawn().await;
    app.mock_street_collections().await;

    let response = reqwest::Client::new()
        .get(format!("{}/street-info?usrn={}", app.address, TEST_USRN))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 200);

    let body: Value = response.json().await.expect("Invalid summary body");
    assert_eq!(body["street"]["street_name"], "High Street");
    assert_eq!(body["street"]["town"], "Southampton");
    assert_eq!(body["street"]["authority"]["name"], "Southampton City Council");

    // The base street record is folded into `street`, not listed again.
    let designations = body["designations"].as_array().unwrap();
    assert_eq!(designations.len(), 1);
    assert_eq!(designations[0]["type"], "Traffic Sensitive Street");

    // Works statistics come from the seeded warehouse.
    let last_month = body["stats"]["last_month_work_summary"].as_array().unwrap();
    assert!(!last_month.is_empty());
    assert_ne!(last_month[0], "NO DATA");
    let annual = body["stats"]["2024_work_summary"].as_array().unwrap();
    assert!(annual
        .iter()
        .any(|row| row["sector"] == "Water" && row["promoter_organisation"] == "Wessex Water"));

    assert_eq!(body["metadata"]["number_returned"], 2);
    // Latest collection timestamp wins.
    assert_eq!(body["metadata"]["timestamp"], "2024-05-02T09:00:00Z");
}

#[tokio::test]
async fn street_info_tolerates_a_failed_collection() {
    let app = TestApp::spawn().await;

    // Only the network collection responds; the designation collections all
    // fail with unmatched-mock 404s and are skipped.
    app.ngd
        .mock_async(|when, then| {
            when.method(httpmock::Method::GET)
                .path("/collections/trn-ntwk-street-1/items");
            then.status(200).json_body(serde_json::json!({
                "type": "FeatureCollection",
                "timeStamp": "2024-05-01T10:00:00Z",
                "numberReturned": 1,
                "features": [{
                    "type": "Feature",
                    "geometry": null,
                    "properties": {
                        "usrn": 12345678,
                        "description": "Designated Street Name",
                        "designatedname1_text": "High Street"
                    }
                }]
            }));
        })
        .await;

    let response = reqwest::Client::new()
        .get(format!("{}/street-info?usrn={}", app.address, TEST_USRN))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 200);

    let body: Value = response.json().await.expect("Invalid summary body");
    assert_eq!(body["street"]["street_name"], "High Street");
    assert_eq!(body["metadata"]["number_returned"], 1);
}

#[tokio::test]
async fn street_info_unknown_usrn_is_not_found() {
    let app = TestApp::spawn().await;

    let response = reqwest::Client::new()
        .get(format!("{}/street-info?usrn={}", app.address, UNKNOWN_USRN))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 404);

    let body: Value = response.json().await.expect("Invalid error body");
    assert!(body["error"].as_str().unwrap().contains(UNKNOWN_USRN));
}

#[tokio::test]
async fn street_info_requires_usrn_parameter() {
    let app = TestApp::spawn().await;

    let response = reqwest::Client::new()
        .get(format!("{}/street-info", app.address))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn street_info_rejects_empty_usrn() {
    let app = TestApp::spawn().await;

    let response = reqwest::Client::new()
        .get(format!("{}/street-info?usrn=", app.address))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 422);
}

#[tokio::test]
async fn street_info_rejects_non_numeric_usrn() {
    let app = TestApp::spawn().await;

    let response = reqwest::Client::new()
        .get(format!("{}/street-info?usrn=not-a-usrn", app.address))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 400);

    let body: Value = response.json().await.expect("Invalid error body");
    assert!(body["error"].as_str().unwrap().contains("digits"));
}
