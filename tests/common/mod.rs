use duckdb::Connection;
use httpmock::prelude::*;
use serde_json::{json, Value};
use street_insight_service::config::ServiceConfig;
use street_insight_service::services::metrics;
use street_insight_service::services::ngd::STREET_INFO_COLLECTIONS;
use street_insight_service::startup::Application;
use tempfile::TempDir;

/// USRN seeded into the test warehouse.
pub const TEST_USRN: &str = "12345678";
/// USRN with no warehouse rows at all.
pub const UNKNOWN_USRN: &str = "99999999";
/// Bounding box derived from the seeded geometry with the default 50-unit
/// buffer.
pub const TEST_BBOX: &str = "437250,115450,437450,115650";

pub struct TestApp {
    pub address: String,
    pub ngd: MockServer,
    pub openai: MockServer,
    _warehouse_dir: TempDir,
}

impl TestApp {
    pub async fn spawn() -> Self {
        // Same values in every test, so concurrent spawns never conflict.
        std::env::set_var("OS_KEY", "test-os-key");
        std::env::set_var("OPENAI_API_KEY", "test-openai-key");

        let ngd = MockServer::start_async().await;
        let openai = MockServer::start_async().await;

        let warehouse_dir = TempDir::new().expect("Failed to create warehouse dir");
        let database_path = warehouse_dir
            .path()
            .join("warehouse.duckdb")
            .to_string_lossy()
            .into_owned();
        seed_warehouse(&database_path);

        metrics::init_metrics();

        let mut config = ServiceConfig::load().expect("Failed to load configuration");
        config.common.port = 0; // Random port for testing
        config.ngd.base_url = ngd.base_url();
        config.openai.base_url = openai.base_url();
        config.warehouse.database_url = database_path;

        let app = Application::build(config)
            .await
            .expect("Failed to build test application");

        let port = app.port();
        let address = format!("http://127.0.0.1:{}", port);

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        // Wait for the server to accept requests.
        let client = reqwest::Client::new();
        let health_url = format!("{}/health", address);
        for _ in 0..50 {
            if client.get(&health_url).send().await.is_ok() {
                break;
            }
            tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
        }

        TestApp {
            address,
            ngd,
            openai,
            _warehouse_dir: warehouse_dir,
        }
    }

    /// Mock every street-info collection: the street record in the network
    /// collection, one designation in the line collection, the rest empty.
    pub async fn mock_street_collections(&self) {
        for collection_id in STREET_INFO_COLLECTIONS {
            let body = match *collection_id {
                "trn-ntwk-street-1" => street_network_fixture(),
                "trn-rami-specialdesignationline-1" => designation_fixture(),
                _ => empty_collection_fixture(),
            };

            self.ngd
                .mock_async(|when, then| {
                    when.method(GET)
                        .path(format!("/collections/{}/items", collection_id))
                        .query_param("filter", format!("usrn={}", TEST_USRN));
                    then.status(200).json_body(body.clone());
                })
                .await;
        }
    }

    /// Mock the land-use collection for the seeded bounding box.
    pub async fn mock_land_use_collection(&self) {
        self.ngd
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/collections/lus-fts-site-1/items")
                    .query_param("bbox", TEST_BBOX);
                then.status(200).json_body(land_use_fixture());
            })
            .await;
    }

    /// Mock the chat completions endpoint to return the given analysis
    /// object as structured output.
    pub async fn mock_chat_completion(&self, analysis: Value) {
        let content = serde_json::to_string(&analysis).unwrap();
        self.openai
            .mock_async(move |when, then| {
                when.method(POST).path("/chat/completions");
                then.status(200).json_body(json!({
                    "id": "chatcmpl-test",
                    "object": "chat.completion",
                    "model": "gpt-4o-mini",
                    "choices": [{
                        "index": 0,
                        "message": {"role": "assistant", "content": content},
                        "finish_reason": "stop"
                    }],
                    "usage": {"prompt_tokens": 512, "completion_tokens": 128}
                }));
            })
            .await;
    }

    pub async fn mock_speech(&self) {
        self.openai
            .mock_async(|when, then| {
                when.method(POST).path("/audio/speech");
                then.status(200)
                    .header("content-type", "audio/mpeg")
                    .body("ID3test-audio-bytes");
            })
            .await;
    }
}

pub fn street_analysis_fixture() -> Value {
    json!({
        "location": ["High Street, Southampton"],
        "key_characteristics": ["Managed by Southampton City Council"],
        "special_designations": ["Traffic sensitive on weekday mornings"],
        "past_work_history": ["Two works completed last month, one collaborative"],
        "potential_challenges": ["Peak-hour congestion"],
        "summary": "A busy council-managed street with recent collaborative works."
    })
}

pub fn land_use_analysis_fixture() -> Value {
    json!({
        "location": ["City centre area around High Street"],
        "property_numbers": ["Two sites in the area"],
        "institutional_properties": [],
        "residential_properties": ["Riverside Court"],
        "commercial_properties": ["High Street Retail Park"],
        "recent_changes": ["One site modified recently"],
        "summary": "A mixed residential and commercial area."
    })
}

pub fn collaborative_analysis_fixture() -> Value {
    json!({
        "location": ["High Street, Southampton"],
        "key_characteristics": ["Managed by Southampton City Council"],
        "special_designations": ["Traffic sensitive on weekday mornings"],
        "past_work_history": ["Two works completed last month, one collaborative"],
        "potential_challenges": ["Peak-hour congestion"],
        "property_numbers": ["Two sites in the area"],
        "institutional_properties": [],
        "residential_properties": ["Riverside Court"],
        "commercial_properties": ["High Street Retail Park"],
        "recent_changes": ["One site modified recently"],
        "summary": "Collaboration potential 8 out of 10 given overlapping utility works."
    })
}

fn street_network_fixture() -> Value {
    json!({
        "type": "FeatureCollection",
        "timeStamp": "2024-05-01T10:00:00Z",
        "numberReturned": 1,
        "features": [{
            "type": "Feature",
            "id": "street-1",
            "geometry": {"type": "LineString", "coordinates": [[437300.0, 115500.0], [437400.0, 115600.0]]},
            "properties": {
                "usrn": 12345678,
                "description": "Designated Street Name",
                "designatedname1_text": "High Street",
                "townname1_text": "Southampton",
                "responsibleauthority_name": "Southampton City Council",
                "administrativearea1_text": "Southampton",
                "geometry_length": 142.5,
                "operationalstate": "Open",
                "operationalstatedate": "2020-01-01"
            }
        }]
    })
}

fn designation_fixture() -> Value {
    json!({
        "type": "FeatureCollection",
        "timeStamp": "2024-05-02T09:00:00Z",
        "numberReturned": 1,
        "features": [{
            "type": "Feature",
            "id": "designation-1",
            "geometry": {"type": "LineString", "coordinates": [[437300.0, 115500.0], [437350.0, 115550.0]]},
            "properties": {
                "usrn": 12345678,
                "description": "Traffic Sensitive Street",
                "designation": "Traffic Sensitive",
                "timeinterval": "Monday to Friday 07:30 - 09:30",
                "locationdescription": "Whole street",
                "effectivestartdate": "2019-06-01"
            }
        }]
    })
}

fn empty_collection_fixture() -> Value {
    json!({
        "type": "FeatureCollection",
        "timeStamp": "2024-05-01T08:00:00Z",
        "numberReturned": 0,
        "features": []
    })
}

fn land_use_fixture() -> Value {
    json!({
        "type": "FeatureCollection",
        "timeStamp": "2024-05-03T12:00:00Z",
        "numberReturned": 2,
        "features": [
            {
                "type": "Feature",
                "id": "site-1",
                "geometry": {"type": "Polygon", "coordinates": [[[437300.0, 115500.0], [437310.0, 115500.0], [437310.0, 115510.0], [437300.0, 115500.0]]]},
                "properties": {
                    "name1_text": "Riverside Court",
                    "description": "Residential Site",
                    "geometry_area": 120.5,
                    "oslandusetiera": "Residential Accommodation",
                    "oslandusetierb": ["Multiple Occupancy"],
                    "changetype": "Modified"
                }
            },
            {
                "type": "Feature",
                "id": "site-2",
                "geometry": {"type": "Polygon", "coordinates": [[[437350.0, 115550.0], [437360.0, 115550.0], [437360.0, 115560.0], [437350.0, 115550.0]]]},
                "properties": {
                    "name1_text": "High Street Retail Park",
                    "description": "Commercial Site",
                    "geometry_area": 300.25,
                    "oslandusetiera": "Commercial Activity: Retail",
                    "oslandusetierb": ["Retailing"],
                    "changetype": "New"
                }
            }
        ]
    })
}

/// Create the warehouse fixture database: street geometry, works tables,
/// monthly permit tables and the SWA-code reference table.
fn seed_warehouse(database_path: &str) {
    let conn = Connection::open(database_path).expect("Failed to create warehouse fixture");

    conn.execute_batch(
        r#"
        CREATE SCHEMA os_open_usrns;
        CREATE TABLE os_open_usrns.latest (usrn VARCHAR, geometry VARCHAR);
        INSERT INTO os_open_usrns.latest VALUES
            ('12345678', 'LINESTRING (437300 115500, 437400 115600)');

        CREATE SCHEMA street_manager;
        CREATE TABLE street_manager.completed_works (
            usrn VARCHAR,
            highway_authority VARCHAR,
            promoter_organisation VARCHAR,
            work_category VARCHAR,
            activity_type VARCHAR,
            collaborative_working VARCHAR
        );
        INSERT INTO street_manager.completed_works VALUES
            ('12345678', 'Southampton City Council', 'Wessex Water', 'Standard', 'Utility repair', 'Yes'),
            ('12345678', 'Southampton City Council', 'Openreach', 'Minor', 'New connection', 'No');
        CREATE TABLE street_manager.in_progress_works (
            usrn VARCHAR,
            highway_authority VARCHAR,
            promoter_organisation VARCHAR,
            work_category VARCHAR,
            activity_type VARCHAR,
            collaborative_working VARCHAR
        );
        INSERT INTO street_manager.in_progress_works VALUES
            ('12345678', 'Southampton City Council', 'Wessex Water', 'Major', 'Main replacement', 'No');

        CREATE SCHEMA geoplace_swa_codes;
        CREATE TABLE geoplace_swa_codes.LATEST_ACTIVE (
            swa_code VARCHAR,
            ofwat_licence VARCHAR,
            ofcom_licence VARCHAR,
            ofgem_electricity_licence VARCHAR,
            ofgem_gas_licence VARCHAR
        );
        INSERT INTO geoplace_swa_codes.LATEST_ACTIVE VALUES
            ('201', 'WA201', NULL, NULL, NULL),
            ('305', NULL, 'TC305', NULL, NULL);

        CREATE SCHEMA work_summary;
        "#,
    )
    .expect("Failed to seed warehouse schemas");

    let months = [
        "01_2024", "02_2024", "03_2024", "04_2024", "05_2024", "06_2024", "07_2024", "08_2024",
        "09_2024", "10_2024", "11_2024", "12_2024",
    ];
    for month in months {
        conn.execute_batch(&format!(
            r#"CREATE TABLE work_summary."{month}" (
                permit_reference_number VARCHAR,
                promoter_organisation VARCHAR,
                promoter_swa_code VARCHAR,
                highway_authority VARCHAR,
                work_category VARCHAR,
                collaborative_working VARCHAR,
                work_status_ref VARCHAR,
                event_type VARCHAR,
                usrn VARCHAR
            );"#
        ))
        .expect("Failed to create monthly permit table");
    }

    conn.execute_batch(
        r#"
        INSERT INTO work_summary."03_2024" VALUES
            ('PRN-001', 'Wessex Water', '201', 'Southampton City Council', 'Standard', 'Yes', 'completed', 'WORK_STOP', '12345678');
        INSERT INTO work_summary."07_2024" VALUES
            ('PRN-002', 'Openreach', '305', 'Southampton City Council', 'Minor', 'No', 'completed', 'WORK_STOP', '12345678'),
            ('PRN-003', 'Openreach', '305', 'Southampton City Council', 'Minor', 'No', 'in_progress', 'WORK_START', '12345678');
        "#,
    )
    .expect("Failed to seed monthly permit rows");
}
